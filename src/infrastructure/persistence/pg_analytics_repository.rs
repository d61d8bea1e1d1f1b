//! PostgreSQL implementation of the analytics repository.

use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::entities::{AdMetrics, AggregateQuery};
use crate::domain::repositories::AnalyticsRepository;
use crate::error::AppError;

/// PostgreSQL repository for click and impression aggregation.
pub struct PgAnalyticsRepository {
    pool: Arc<PgPool>,
}

impl PgAnalyticsRepository {
    /// Creates a new repository with a database connection pool.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AnalyticsRepository for PgAnalyticsRepository {
    async fn aggregate_clicks(&self, query: AggregateQuery) -> Result<Vec<AdMetrics>, AppError> {
        let rows = sqlx::query_as::<_, AdMetrics>(
            r#"
            SELECT
                ad_id,
                COUNT(*)::BIGINT AS click_count,
                COUNT(DISTINCT user_ip)::BIGINT AS unique_clicks,
                COALESCE(AVG(playback_time_sec), 0)::DOUBLE PRECISION AS avg_playback_time,
                COALESCE(AVG(watched_percent), 0)::DOUBLE PRECISION AS avg_watch_percent,
                MAX(created_at) AS last_updated
            FROM clicks
            WHERE ($1::bigint IS NULL OR ad_id = $1)
              AND ($2::timestamptz IS NULL OR created_at >= $2)
              AND ($3::timestamptz IS NULL OR created_at <= $3)
            GROUP BY ad_id
            ORDER BY click_count DESC, ad_id
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(query.ad_id)
        .bind(query.since)
        .bind(query.until)
        .bind(query.limit)
        .bind(query.offset)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows)
    }

    async fn count_impressions(&self, ad_ids: Vec<i64>) -> Result<HashMap<i64, i64>, AppError> {
        if ad_ids.is_empty() {
            return Ok(HashMap::new());
        }

        // Not bounded by the click query's time range.
        let rows: Vec<(i64, i64)> = sqlx::query_as(
            r#"
            SELECT ad_id, COUNT(*)::BIGINT AS impressions
            FROM impressions
            WHERE ad_id = ANY($1)
            GROUP BY ad_id
            "#,
        )
        .bind(&ad_ids)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows.into_iter().collect())
    }
}
