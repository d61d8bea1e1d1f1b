//! PostgreSQL implementation of the ads catalogue.

use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;

use crate::domain::entities::{Ad, NewAd};
use crate::domain::repositories::AdRepository;
use crate::error::AppError;

pub struct PgAdRepository {
    pool: Arc<PgPool>,
}

impl PgAdRepository {
    /// Creates a new repository with a database connection pool.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AdRepository for PgAdRepository {
    async fn list(&self, offset: i64, limit: i64) -> Result<Vec<Ad>, AppError> {
        let ads = sqlx::query_as::<_, Ad>(
            r#"
            SELECT id, title, image_url, target_url, status, created_at
            FROM ads
            ORDER BY created_at DESC, id DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(ads)
    }

    async fn count(&self) -> Result<i64, AppError> {
        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*)::BIGINT FROM ads")
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(total)
    }

    async fn create(&self, new_ad: NewAd) -> Result<Ad, AppError> {
        let ad = sqlx::query_as::<_, Ad>(
            r#"
            INSERT INTO ads (title, image_url, target_url)
            VALUES ($1, $2, $3)
            RETURNING id, title, image_url, target_url, status, created_at
            "#,
        )
        .bind(&new_ad.title)
        .bind(&new_ad.image_url)
        .bind(&new_ad.target_url)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(ad)
    }
}
