//! Shared application state injected into every handler.

use sqlx::PgPool;
use std::sync::Arc;

use crate::application::services::{AdService, AnalyticsService, ClickService};
use crate::domain::messaging::EventPublisher;
use crate::infrastructure::persistence::{PgAdRepository, PgAnalyticsRepository};

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<PgPool>,
    pub click_service: Arc<ClickService>,
    pub analytics_service: Arc<AnalyticsService<PgAnalyticsRepository>>,
    pub ad_service: Arc<AdService<PgAdRepository>>,
    /// Kept alongside the click service for health reporting.
    pub publisher: Arc<dyn EventPublisher>,
    pub behind_proxy: bool,
}

impl AppState {
    pub fn new(
        db: Arc<PgPool>,
        publisher: Arc<dyn EventPublisher>,
        analytics_service: Arc<AnalyticsService<PgAnalyticsRepository>>,
        ad_service: Arc<AdService<PgAdRepository>>,
        behind_proxy: bool,
    ) -> Self {
        Self {
            db,
            click_service: Arc::new(ClickService::new(publisher.clone())),
            analytics_service,
            ad_service,
            publisher,
            behind_proxy,
        }
    }
}
