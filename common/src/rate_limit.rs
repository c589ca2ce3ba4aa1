// Sliding-window rate limiter over a Redis sorted set

use crate::db::RedisPool;
use crate::errors::StorageError;
use redis::AsyncCommands;
use uuid::Uuid;

#[derive(Clone)]
pub struct RateLimiter {
    pool: RedisPool,
}

impl RateLimiter {
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }

    /// Record one request under `key`; `Ok(false)` means it must be rejected
    #[tracing::instrument(skip(self))]
    pub async fn check_rate_limit(
        &self,
        key: &str,
        max_requests: u32,
        window_seconds: u32,
    ) -> Result<bool, StorageError> {
        let mut conn = self.pool.get_connection();

        let redis_key = format!("rate_limit:{}", key);
        let now = chrono::Utc::now().timestamp_millis();
        let window_start = now - i64::from(window_seconds) * 1000;

        let _: () = conn.zrembyscore(&redis_key, 0, window_start).await?;
        let count: u32 = conn.zcard(&redis_key).await?;

        if count >= max_requests {
            tracing::warn!(key = key, count = count, max_requests = max_requests, "Rate limit exceeded");
            return Ok(false);
        }

        let request_id = Uuid::new_v4().to_string();
        let _: () = conn.zadd(&redis_key, request_id, now).await?;
        let _: () = conn
            .expire(&redis_key, i64::from(window_seconds) + 60)
            .await?;

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RedisConfig;

    #[tokio::test]
    #[ignore] // Requires Redis to be running
    async fn test_rate_limit_blocks_requests_over_limit() {
        let pool = RedisPool::new(&RedisConfig {
            url: "redis://127.0.0.1:6379".to_string(),
        })
        .await
        .unwrap();
        let limiter = RateLimiter::new(pool);
        let key = format!("webhook:test:{}", Uuid::new_v4());

        for _ in 0..3 {
            assert!(limiter.check_rate_limit(&key, 3, 60).await.unwrap());
        }
        assert!(!limiter.check_rate_limit(&key, 3, 60).await.unwrap());

        let other = format!("webhook:test:{}", Uuid::new_v4());
        assert!(limiter.check_rate_limit(&other, 3, 60).await.unwrap());
    }
}
