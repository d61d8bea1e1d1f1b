mod common;

use chrono::{TimeDelta, Utc};
use clickstream::domain::entities::AggregateQuery;
use clickstream::domain::repositories::AnalyticsRepository;
use clickstream::infrastructure::persistence::PgAnalyticsRepository;
use sqlx::PgPool;
use std::sync::Arc;

fn all(limit: i64, offset: i64) -> AggregateQuery {
    AggregateQuery {
        ad_id: None,
        since: None,
        until: None,
        limit,
        offset,
    }
}

#[sqlx::test]
async fn test_aggregate_orders_by_click_count(pool: PgPool) {
    let repo = PgAnalyticsRepository::new(Arc::new(pool.clone()));

    common::create_test_click(&pool, 1, "10.0.0.1", 10.0, 50.0).await;
    for ip in ["10.0.0.1", "10.0.0.1", "10.0.0.2"] {
        common::create_test_click(&pool, 2, ip, 20.0, 100.0).await;
    }
    common::create_test_click(&pool, 2, "10.0.0.3", 0.0, 0.0).await;

    let rows = repo.aggregate_clicks(all(10, 0)).await.unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].ad_id, 2);
    assert_eq!(rows[0].click_count, 4);
    assert_eq!(rows[0].unique_clicks, 3);
    assert_eq!(rows[0].avg_playback_time, 15.0);
    assert_eq!(rows[0].avg_watch_percent, 75.0);
    assert!(rows[0].ctr.is_none());
    assert_eq!(rows[1].ad_id, 1);
    assert_eq!(rows[1].click_count, 1);
}

#[sqlx::test]
async fn test_aggregate_filters_by_ad_and_time(pool: PgPool) {
    let repo = PgAnalyticsRepository::new(Arc::new(pool.clone()));

    common::create_test_click(&pool, 1, "10.0.0.1", 5.0, 10.0).await;
    common::create_test_click(&pool, 2, "10.0.0.1", 5.0, 10.0).await;
    common::create_old_click(&pool, 1, "10.0.0.9").await;

    let query = AggregateQuery {
        ad_id: Some(1),
        since: Some(Utc::now() - TimeDelta::hours(24)),
        until: None,
        limit: 10,
        offset: 0,
    };
    let rows = repo.aggregate_clicks(query).await.unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].ad_id, 1);
    assert_eq!(rows[0].click_count, 1);

    let rows = repo.aggregate_clicks(all(10, 0)).await.unwrap();
    let ad_one = rows.iter().find(|r| r.ad_id == 1).unwrap();
    assert_eq!(ad_one.click_count, 2);
}

#[sqlx::test]
async fn test_aggregate_pagination(pool: PgPool) {
    let repo = PgAnalyticsRepository::new(Arc::new(pool.clone()));

    for ad_id in 1..=5 {
        for _ in 0..ad_id {
            common::create_test_click(&pool, ad_id, "10.0.0.1", 1.0, 1.0).await;
        }
    }

    let page = repo.aggregate_clicks(all(2, 1)).await.unwrap();
    let ids: Vec<i64> = page.iter().map(|r| r.ad_id).collect();
    assert_eq!(ids, vec![4, 3]);

    let beyond = repo.aggregate_clicks(all(2, 10)).await.unwrap();
    assert!(beyond.is_empty());
}

#[sqlx::test]
async fn test_count_impressions(pool: PgPool) {
    let repo = PgAnalyticsRepository::new(Arc::new(pool.clone()));

    common::create_test_impressions(&pool, 1, 4).await;
    common::create_test_impressions(&pool, 2, 1).await;

    let counts = repo.count_impressions(vec![1, 2, 3]).await.unwrap();

    assert_eq!(counts.get(&1), Some(&4));
    assert_eq!(counts.get(&2), Some(&1));
    assert_eq!(counts.get(&3), None);

    assert!(repo.count_impressions(vec![]).await.unwrap().is_empty());
}
