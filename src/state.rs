//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds the database pool, the parsed configuration, the media store and the
//! access-code rate limiter. Clone is required by Axum, so every field is
//! cheap to clone.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;

use crate::config::AppConfig;
use crate::rate_limit::RateLimiter;
use crate::services::media::MediaStore;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
    pub media: Arc<dyn MediaStore>,
    /// Per-email limiter for access-code requests.
    pub rate_limiter: RateLimiter,
}

impl AppState {
    #[must_use]
    pub fn new(pool: PgPool, config: AppConfig, media: Arc<dyn MediaStore>) -> Self {
        let rate_limiter = RateLimiter::new(
            config.login_code_rate_limit,
            Duration::from_secs(config.login_code_rate_window_secs),
        );
        Self { pool, config: Arc::new(config), media, rate_limiter }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
