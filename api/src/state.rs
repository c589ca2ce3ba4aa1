use std::sync::Arc;

use common::bootstrap::Services;
use common::config::Settings;
use common::db::{DbPool, RedisPool};
use common::rate_limit::RateLimiter;
use metrics_exporter_prometheus::PrometheusHandle;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub db_pool: DbPool,
    pub redis_pool: RedisPool,
    pub services: Services,
    pub rate_limiter: RateLimiter,
    pub metrics: PrometheusHandle,
    pub config: Arc<Settings>,
}

impl AppState {
    /// Create a new AppState instance
    pub fn new(
        db_pool: DbPool,
        redis_pool: RedisPool,
        services: Services,
        metrics: PrometheusHandle,
        config: Settings,
    ) -> Self {
        Self {
            rate_limiter: RateLimiter::new(redis_pool.clone()),
            db_pool,
            redis_pool,
            services,
            metrics,
            config: Arc::new(config),
        }
    }
}
