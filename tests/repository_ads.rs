mod common;

use clickstream::domain::entities::NewAd;
use clickstream::domain::repositories::AdRepository;
use clickstream::infrastructure::persistence::PgAdRepository;
use sqlx::PgPool;
use std::sync::Arc;

#[sqlx::test]
async fn test_create_ad(pool: PgPool) {
    let repo = PgAdRepository::new(Arc::new(pool));

    let ad = repo
        .create(NewAd {
            title: "Summer Sale".to_string(),
            image_url: "https://cdn.example.com/summer.png".to_string(),
            target_url: "https://example.com/summer".to_string(),
        })
        .await
        .unwrap();

    assert!(ad.id > 0);
    assert_eq!(ad.title, "Summer Sale");
    assert_eq!(ad.status, "active");
}

#[sqlx::test]
async fn test_list_newest_first_with_count(pool: PgPool) {
    let repo = PgAdRepository::new(Arc::new(pool.clone()));

    let first = common::create_test_ad(&pool, "First").await;
    let second = common::create_test_ad(&pool, "Second").await;
    let third = common::create_test_ad(&pool, "Third").await;

    assert_eq!(repo.count().await.unwrap(), 3);

    let page = repo.list(0, 2).await.unwrap();
    let ids: Vec<i64> = page.iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![third, second]);

    let rest = repo.list(2, 2).await.unwrap();
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].id, first);
}

#[sqlx::test]
async fn test_list_empty(pool: PgPool) {
    let repo = PgAdRepository::new(Arc::new(pool));

    assert_eq!(repo.count().await.unwrap(), 0);
    assert!(repo.list(0, 10).await.unwrap().is_empty());
}
