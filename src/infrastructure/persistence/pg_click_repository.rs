//! PostgreSQL implementation of the click repository.

use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;

use crate::domain::entities::{InsertOutcome, NewClick};
use crate::domain::repositories::ClickRepository;
use crate::error::AppError;
use crate::utils::db_error::is_unique_violation_on;

const EVENT_ID_CONSTRAINT: &str = "clicks_event_id_key";

/// PostgreSQL repository for click inserts.
///
/// Duplicates are detected through the `clicks_event_id_key` unique
/// constraint rather than a prior lookup, so concurrent redeliveries of the
/// same event cannot both insert.
pub struct PgClickRepository {
    pool: Arc<PgPool>,
}

impl PgClickRepository {
    /// Creates a new repository with a database connection pool.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ClickRepository for PgClickRepository {
    async fn insert_click(&self, new_click: NewClick) -> Result<InsertOutcome, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO clicks (
                event_id, ad_id, user_ip, user_agent,
                playback_time_sec, watched_percent, client_timestamp, is_fraudulent
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(new_click.event_id)
        .bind(new_click.ad_id)
        .bind(&new_click.user_ip)
        .bind(&new_click.user_agent)
        .bind(new_click.playback_time_sec)
        .bind(new_click.watched_percent)
        .bind(new_click.client_timestamp)
        .bind(new_click.is_fraudulent)
        .execute(self.pool.as_ref())
        .await;

        match result {
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(e) if is_unique_violation_on(&e, EVENT_ID_CONSTRAINT) => {
                Ok(InsertOutcome::Duplicate)
            }
            Err(e) => Err(e.into()),
        }
    }
}
