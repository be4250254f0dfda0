//! Anonymizing proxy identity rotation.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tracing::debug;

/// One proxy identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Identity rotation seam. Rotation is process-wide: every job sharing
/// the manager sees the new identity after `rotate_identity`.
#[async_trait]
pub trait ProxyManager: Send + Sync {
    /// Current identity, or None to connect directly.
    async fn proxy_config(&self) -> Option<ProxyConfig>;

    /// Switch to the next identity.
    async fn rotate_identity(&self);
}

/// No proxy at all; rotation is a no-op.
pub struct DirectProxyManager;

#[async_trait]
impl ProxyManager for DirectProxyManager {
    async fn proxy_config(&self) -> Option<ProxyConfig> {
        None
    }

    async fn rotate_identity(&self) {}
}

/// Round-robin rotation over a configured identity pool.
pub struct RotatingProxyManager {
    pool: Vec<ProxyConfig>,
    index: AtomicUsize,
}

impl RotatingProxyManager {
    pub fn new(pool: Vec<ProxyConfig>) -> Self {
        Self {
            pool,
            index: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ProxyManager for RotatingProxyManager {
    async fn proxy_config(&self) -> Option<ProxyConfig> {
        if self.pool.is_empty() {
            return None;
        }
        let index = self.index.load(Ordering::Relaxed) % self.pool.len();
        Some(self.pool[index].clone())
    }

    async fn rotate_identity(&self) {
        if self.pool.is_empty() {
            return;
        }
        let next = self.index.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(identity = next % self.pool.len(), "Rotated proxy identity");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(url: &str) -> ProxyConfig {
        ProxyConfig {
            url: url.to_string(),
            username: None,
            password: None,
        }
    }

    #[tokio::test]
    async fn rotation_cycles_through_pool() {
        let manager = RotatingProxyManager::new(vec![identity("http://p1"), identity("http://p2")]);

        let first = manager.proxy_config().await.unwrap();
        manager.rotate_identity().await;
        let second = manager.proxy_config().await.unwrap();
        manager.rotate_identity().await;
        let third = manager.proxy_config().await.unwrap();

        assert_eq!(first.url, "http://p1");
        assert_eq!(second.url, "http://p2");
        assert_eq!(third.url, "http://p1");
    }

    #[tokio::test]
    async fn empty_pool_yields_direct_connection() {
        let manager = RotatingProxyManager::new(vec![]);
        assert!(manager.proxy_config().await.is_none());
        manager.rotate_identity().await;
    }
}
