mod common;

use axum::{Router, routing::get};
use axum_test::TestServer;
use clickstream::api::handlers::analytics_handler;
use sqlx::PgPool;

fn server(state: clickstream::AppState) -> TestServer {
    let app = Router::new()
        .route("/api/v1/ads/analytics", get(analytics_handler))
        .with_state(state);

    TestServer::new(app).unwrap()
}

#[sqlx::test]
async fn test_analytics_from_store(pool: PgPool) {
    common::create_test_click(&pool, 1, "10.0.0.1", 10.0, 50.0).await;
    common::create_test_click(&pool, 1, "10.0.0.2", 20.0, 100.0).await;
    common::create_test_click(&pool, 2, "10.0.0.1", 5.0, 10.0).await;

    let ctx = common::create_test_state(pool);
    let server = server(ctx.state.clone());

    let response = server.get("/api/v1/ads/analytics").await;

    response.assert_status_ok();
    let json = response.json::<serde_json::Value>();
    assert_eq!(json["source"], "store");
    assert_eq!(json["is_real_time"], false);
    assert_eq!(json["total"], 2);
    assert_eq!(json["data"][0]["ad_id"], 1);
    assert_eq!(json["data"][0]["click_count"], 2);
    assert_eq!(json["data"][0]["unique_clicks"], 2);
    assert!(json["data"][0].get("ctr").is_none());
    assert!(json.get("generated_at").is_some());
}

#[sqlx::test]
async fn test_analytics_with_ctr(pool: PgPool) {
    common::create_test_click(&pool, 1, "10.0.0.1", 10.0, 50.0).await;
    common::create_test_impressions(&pool, 1, 4).await;

    let ctx = common::create_test_state(pool);
    let server = server(ctx.state.clone());

    let response = server
        .get("/api/v1/ads/analytics")
        .add_query_param("include_ctr", "true")
        .await;

    response.assert_status_ok();
    let json = response.json::<serde_json::Value>();
    assert_eq!(json["data"][0]["impressions"], 4);
    assert_eq!(json["data"][0]["ctr"], 25.0);
}

#[sqlx::test]
async fn test_real_time_served_from_cache_after_store_read(pool: PgPool) {
    common::create_test_click(&pool, 7, "10.0.0.1", 10.0, 50.0).await;

    let ctx = common::create_test_state(pool.clone());
    let server = server(ctx.state.clone());

    // The cache is empty, so the first real-time read falls through.
    let first = server
        .get("/api/v1/ads/analytics")
        .add_query_param("real_time", "true")
        .await;
    assert_eq!(first.json::<serde_json::Value>()["source"], "store");

    // Write-back is asynchronous.
    for _ in 0..50 {
        if ctx.cache.stats().await.fresh_entries > 0 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }

    common::create_test_click(&pool, 7, "10.0.0.2", 10.0, 50.0).await;

    let second = server
        .get("/api/v1/ads/analytics")
        .add_query_param("real_time", "true")
        .await;
    let json = second.json::<serde_json::Value>();
    assert_eq!(json["source"], "cache");
    assert_eq!(json["is_real_time"], true);
    assert_eq!(json["data"][0]["click_count"], 1);
}

#[sqlx::test]
async fn test_inverted_range_is_bad_request(pool: PgPool) {
    let ctx = common::create_test_state(pool);
    let server = server(ctx.state.clone());

    let response = server
        .get("/api/v1/ads/analytics")
        .add_query_param("since", "2026-02-01T00:00:00Z")
        .add_query_param("until", "2026-01-01T00:00:00Z")
        .await;

    response.assert_status_bad_request();
}

#[sqlx::test]
async fn test_unparsable_parameters_are_bad_request(pool: PgPool) {
    let ctx = common::create_test_state(pool);
    let server = server(ctx.state.clone());

    server
        .get("/api/v1/ads/analytics")
        .add_query_param("limit", "many")
        .await
        .assert_status_bad_request();

    server
        .get("/api/v1/ads/analytics")
        .add_query_param("time_window", "soon")
        .await
        .assert_status_bad_request();
}
