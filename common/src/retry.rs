// Exponential backoff with jitter for outbound provider calls

use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Backoff schedule: `base * 3^attempt`, capped, plus up to `jitter_factor` extra
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    max_attempts: u32,
    base_delay_ms: u64,
    max_delay_ms: u64,
    jitter_factor: f64,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 10_000,
            jitter_factor: 0.1,
        }
    }
}

impl ExponentialBackoff {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(
        max_attempts: u32,
        base_delay_ms: u64,
        max_delay_ms: u64,
        jitter_factor: f64,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay_ms,
            max_delay_ms,
            jitter_factor: jitter_factor.clamp(0.0, 1.0),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    fn base_delay(&self, attempt: u32) -> u64 {
        let factor = 3_u64.saturating_pow(attempt);
        self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms)
    }

    /// Delay before retry number `attempt` (0-based), `None` once attempts are used up
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt + 1 >= self.max_attempts {
            return None;
        }

        let base = self.base_delay(attempt);
        let jitter_range = (base as f64 * self.jitter_factor) as u64;
        let jitter = if jitter_range > 0 {
            rand::thread_rng().gen_range(0..=jitter_range)
        } else {
            0
        };

        Some(Duration::from_millis(base + jitter))
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out
    pub async fn retry<T, E, F, Fut>(&self, is_transient: impl Fn(&E) -> bool, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if is_transient(&e) => match self.next_delay(attempt) {
                    Some(delay) => {
                        tracing::warn!(
                            attempt = attempt + 1,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "Transient failure, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => return Err(e),
                },
                Err(e) => return Err(e),
            }
        }
    }
}
