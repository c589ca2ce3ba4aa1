// Redis connection manager used for sync locks and webhook rate limiting

use crate::config::RedisConfig;
use crate::errors::StorageError;
use redis::aio::ConnectionManager;
use redis::Client;
use tracing::{info, instrument};

#[derive(Clone)]
pub struct RedisPool {
    manager: ConnectionManager,
}

impl RedisPool {
    #[instrument(skip(config))]
    pub async fn new(config: &RedisConfig) -> Result<Self, StorageError> {
        info!("Initializing Redis connection manager");

        let client = Client::open(config.url.as_str()).map_err(|e| {
            StorageError::ConnectionFailed(format!("Failed to create Redis client: {}", e))
        })?;

        let manager = ConnectionManager::new(client).await.map_err(|e| {
            StorageError::ConnectionFailed(format!("Failed to create connection manager: {}", e))
        })?;

        Ok(Self { manager })
    }

    pub fn get_connection(&self) -> ConnectionManager {
        self.manager.clone()
    }

    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), StorageError> {
        let mut conn = self.get_connection();
        let response: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| StorageError::RedisError(format!("Health check failed: {}", e)))?;

        if response != "PONG" {
            return Err(StorageError::RedisError(format!(
                "Unexpected PING response: {}",
                response
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires Redis to be running
    async fn test_redis_health_check() {
        let config = RedisConfig {
            url: "redis://localhost:6379".to_string(),
        };
        let pool = RedisPool::new(&config).await.unwrap();
        assert!(pool.health_check().await.is_ok());
    }

    #[tokio::test]
    async fn test_redis_pool_invalid_url() {
        let config = RedisConfig {
            url: "not-a-redis-url".to_string(),
        };
        assert!(RedisPool::new(&config).await.is_err());
    }
}
