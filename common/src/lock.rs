// Redis-backed exclusive locks (SET NX EX, compare-and-delete release)
// Used to keep a mailbox from being synced by two callers at once

use crate::db::RedisPool;
use crate::errors::StorageError;
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

#[async_trait]
pub trait DistributedLock: Send + Sync {
    /// Acquire `resource` for `ttl`, or fail with `StorageError::LockHeld`
    async fn acquire(&self, resource: &str, ttl: Duration) -> Result<LockGuard, StorageError>;
}

/// Releases the lock when dropped
pub struct LockGuard {
    resource: String,
    lock_value: String,
    pool: RedisPool,
    acquired_at: Instant,
    ttl: Duration,
}

impl LockGuard {
    /// Reset the expiry to `ttl` from now while a long sync is still running
    ///
    /// Fails with `LockHeld` when the lock expired and was taken by someone else.
    #[instrument(skip(self), fields(resource = %self.resource))]
    pub async fn extend(&mut self, ttl: Duration) -> Result<(), StorageError> {
        let mut conn = self.pool.get_connection();

        let script = r#"
            if redis.call("get", KEYS[1]) == ARGV[1] then
                return redis.call("expire", KEYS[1], ARGV[2])
            else
                return 0
            end
        "#;

        let extended: i32 = redis::Script::new(script)
            .key(lock_key(&self.resource))
            .arg(&self.lock_value)
            .arg(ttl.as_secs().max(1))
            .invoke_async(&mut conn)
            .await?;

        if extended != 1 {
            return Err(StorageError::LockHeld(self.resource.clone()));
        }
        self.ttl = ttl;
        debug!(ttl_seconds = ttl.as_secs(), "Lock TTL extended");
        Ok(())
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn elapsed(&self) -> Duration {
        self.acquired_at.elapsed()
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let resource = self.resource.clone();
        let lock_value = self.lock_value.clone();
        let pool = self.pool.clone();

        // Drop may run outside a runtime during shutdown; the TTL covers that case
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Err(e) = release_lock(&pool, &resource, &lock_value).await {
                    warn!(resource = %resource, error = %e, "Failed to release lock on drop");
                }
            });
        }
    }
}

/// Single-attempt lock: a held resource fails immediately instead of waiting
pub struct RedLock {
    pool: RedisPool,
}

impl RedLock {
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DistributedLock for RedLock {
    #[instrument(skip(self), fields(ttl_seconds = ttl.as_secs()))]
    async fn acquire(&self, resource: &str, ttl: Duration) -> Result<LockGuard, StorageError> {
        let mut conn = self.pool.get_connection();
        let key = lock_key(resource);
        let lock_value = Uuid::new_v4().to_string();

        let result: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg(&lock_value)
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await?;

        match result {
            Some(_) => {
                debug!("Lock acquired");
                Ok(LockGuard {
                    resource: resource.to_string(),
                    lock_value,
                    pool: self.pool.clone(),
                    acquired_at: Instant::now(),
                    ttl,
                })
            }
            None => Err(StorageError::LockHeld(resource.to_string())),
        }
    }
}

fn lock_key(resource: &str) -> String {
    format!("lock:{}", resource)
}

async fn release_lock(
    pool: &RedisPool,
    resource: &str,
    lock_value: &str,
) -> Result<(), StorageError> {
    let mut conn = pool.get_connection();

    let script = r#"
        if redis.call("get", KEYS[1]) == ARGV[1] then
            return redis.call("del", KEYS[1])
        else
            return 0
        end
    "#;

    let result: i32 = redis::Script::new(script)
        .key(lock_key(resource))
        .arg(lock_value)
        .invoke_async(&mut conn)
        .await?;

    if result == 1 {
        debug!(resource = %resource, "Lock released");
    } else {
        warn!(resource = %resource, "Lock was not owned or already expired");
    }

    Ok(())
}
