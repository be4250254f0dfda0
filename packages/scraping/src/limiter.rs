//! Per-domain request throttling.
//!
//! All concurrent jobs share one limiter so that fetches against the
//! same directory domain are serialized across the whole process.

use std::num::NonZeroU32;

use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;

use crate::error::Result;

/// Per-domain throttle consumed by the scraper runner.
#[async_trait]
pub trait DomainRateLimiter: Send + Sync {
    /// Acquire any backing resources. No-op for in-process limiters.
    async fn connect(&self) -> Result<()> {
        Ok(())
    }

    /// Suspend the caller until a request against `domain` is allowed.
    async fn wait_if_needed(&self, domain: &str);

    /// Release any backing resources.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

type KeyedLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Keyed governor limiter: one independent quota per domain.
pub struct GovernorRateLimiter {
    limiter: KeyedLimiter,
}

impl GovernorRateLimiter {
    /// Allow `requests_per_minute` sustained requests against each domain.
    pub fn per_minute(requests_per_minute: u32) -> Self {
        let quota = Quota::per_minute(
            NonZeroU32::new(requests_per_minute).unwrap_or(nonzero!(30u32)),
        );
        Self {
            limiter: RateLimiter::keyed(quota),
        }
    }
}

impl Default for GovernorRateLimiter {
    fn default() -> Self {
        Self::per_minute(30)
    }
}

#[async_trait]
impl DomainRateLimiter for GovernorRateLimiter {
    async fn wait_if_needed(&self, domain: &str) {
        self.limiter.until_key_ready(&domain.to_string()).await;
    }
}

/// Limiter that never throttles. For tests and one-off CLI runs.
pub struct NoopRateLimiter;

#[async_trait]
impl DomainRateLimiter for NoopRateLimiter {
    async fn wait_if_needed(&self, _domain: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn burst_within_quota_is_immediate() {
        let limiter = GovernorRateLimiter::per_minute(60);
        let start = Instant::now();
        limiter.wait_if_needed("a.example").await;
        limiter.wait_if_needed("b.example").await;
        assert!(start.elapsed().as_millis() < 100);
    }

    #[tokio::test]
    async fn noop_limiter_never_waits() {
        let limiter = NoopRateLimiter;
        limiter.connect().await.unwrap();
        limiter.wait_if_needed("a.example").await;
        limiter.close().await.unwrap();
    }
}
