//! Rate limiting middleware using token bucket algorithm.

use anyhow::Context;
use axum::Router;
use std::sync::Arc;
use tower_governor::{
    GovernorLayer,
    governor::GovernorConfigBuilder,
    key_extractor::{PeerIpKeyExtractor, SmartIpKeyExtractor},
};

use crate::state::AppState;

/// Milliseconds between token refills for the requested sustained rate.
fn replenish_period_ms(per_second: u64) -> u64 {
    (1000 / per_second.max(1)).max(1)
}

/// Wraps `router` in a per-client-IP rate limiter.
///
/// # Limits
///
/// - **Rate**: `per_second` requests per second sustained
/// - **Burst**: `burst` requests
///
/// Requests exceeding the limit receive `429 Too Many Requests`.
///
/// # Key Extraction
///
/// With `behind_proxy` the key is read from `X-Forwarded-For`, `X-Real-IP`
/// or `Forwarded`, falling back to the peer address. Otherwise only the peer
/// socket address is used, which requires the server to be started with
/// connect info.
///
/// # Example
///
/// ```rust,ignore
/// let clicks = Router::new().route("/ads/click", post(click_handler));
/// let clicks = rate_limit::apply(clicks, 50, 100, false)?;
/// ```
///
/// # Errors
///
/// Returns an error if `burst` is zero.
pub fn apply(
    router: Router<AppState>,
    per_second: u64,
    burst: u32,
    behind_proxy: bool,
) -> anyhow::Result<Router<AppState>> {
    let period = replenish_period_ms(per_second);

    if behind_proxy {
        let governor_conf = GovernorConfigBuilder::default()
            .per_millisecond(period)
            .burst_size(burst)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .context("Invalid click rate limit configuration")?;

        Ok(router.layer(GovernorLayer::new(Arc::new(governor_conf))))
    } else {
        let governor_conf = GovernorConfigBuilder::default()
            .per_millisecond(period)
            .burst_size(burst)
            .key_extractor(PeerIpKeyExtractor)
            .finish()
            .context("Invalid click rate limit configuration")?;

        Ok(router.layer(GovernorLayer::new(Arc::new(governor_conf))))
    }
}
