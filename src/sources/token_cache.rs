//! Time-boxed bearer token caching for the credentialed upstreams.
//!
//! Not a credential vault: one token per source, reused while it has at least
//! the safety margin left, refreshed through a caller-supplied exchange.
//! The cache mutex is held across the refresh, which gives single-flight
//! semantics: concurrent callers never trigger two simultaneous exchanges.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::debug;

/// Margin subtracted from the reported TTL before a token counts as expired.
pub const EXPIRY_SAFETY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// Cached bearer token with expiry for one upstream.
#[derive(Debug, Clone, Default)]
pub struct TokenCache {
    inner: Arc<Mutex<Option<CachedToken>>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached token, or run `exchange` to obtain a fresh one.
    ///
    /// `exchange` resolves to `(token, ttl)` as reported by the upstream; the
    /// token is cached until `ttl - safety margin` elapses.
    pub async fn get_or_refresh<F, Fut, E>(&self, exchange: F) -> Result<String, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(String, Duration), E>>,
    {
        let mut guard = self.inner.lock().await;
        if let Some(cached) = guard.as_ref() {
            if Instant::now() < cached.expires_at {
                return Ok(cached.token.clone());
            }
        }

        debug!("Cached token missing or expiring, performing credential exchange");
        let (token, ttl) = exchange().await?;
        let lifetime = ttl
            .checked_sub(EXPIRY_SAFETY_MARGIN)
            .unwrap_or(Duration::ZERO);
        *guard = Some(CachedToken {
            token: token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        Ok(token)
    }

    /// Drop the cached token so the next caller performs a fresh exchange.
    /// Used by the retry-once-after-auth-failure path.
    pub async fn invalidate(&self) {
        let mut guard = self.inner.lock().await;
        *guard = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn token_is_reused_within_ttl() {
        let cache = TokenCache::new();
        let exchanges = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let exchanges = exchanges.clone();
            let token: Result<String, ()> = cache
                .get_or_refresh(|| async move {
                    exchanges.fetch_add(1, Ordering::SeqCst);
                    Ok(("tok-1".to_string(), Duration::from_secs(3600)))
                })
                .await;
            assert_eq!(token.unwrap(), "tok-1");
        }
        assert_eq!(exchanges.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn short_ttl_forces_refresh() {
        let cache = TokenCache::new();
        let exchanges = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let exchanges = exchanges.clone();
            // TTL below the safety margin means immediate expiry.
            let _: Result<String, ()> = cache
                .get_or_refresh(|| async move {
                    exchanges.fetch_add(1, Ordering::SeqCst);
                    Ok(("tok".to_string(), Duration::from_secs(30)))
                })
                .await;
        }
        assert_eq!(exchanges.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn invalidate_forces_exchange() {
        let cache = TokenCache::new();
        let exchanges = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let exchanges = exchanges.clone();
            let _: Result<String, ()> = cache
                .get_or_refresh(|| async move {
                    exchanges.fetch_add(1, Ordering::SeqCst);
                    Ok(("tok".to_string(), Duration::from_secs(3600)))
                })
                .await;
            cache.invalidate().await;
        }
        assert_eq!(exchanges.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_exchange() {
        let cache = TokenCache::new();
        let exchanges = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let cache = cache.clone();
                let exchanges = exchanges.clone();
                tokio::spawn(async move {
                    let token: Result<String, ()> = cache
                        .get_or_refresh(|| async move {
                            exchanges.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(20)).await;
                            Ok(("tok".to_string(), Duration::from_secs(3600)))
                        })
                        .await;
                    token.unwrap()
                })
            })
            .collect();
        for task in tasks {
            assert_eq!(task.await.unwrap(), "tok");
        }
        assert_eq!(exchanges.load(Ordering::SeqCst), 1);
    }
}
