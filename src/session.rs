//! Access tokens for authenticated provider APIs.
//!
//! This module provides the [`Session`] trait and an in-process
//! [`TokenCache`] that reuses a token until shortly before it expires.

use crate::Result;
use chrono::{DateTime, Duration, Utc};
use std::future::Future;
use tokio::sync::Mutex;

/// Tokens this close to expiry are treated as expired.
const EXPIRY_LEEWAY_SECS: i64 = 60;

/// Session represents an authenticated session with a provider API.
///
/// # Thread Safety
///
/// All session implementations must be `Send + Sync` to support concurrent
/// access across async tasks.
pub trait Session: Send + Sync {
    /// Returns the bearer token.
    fn token(&self) -> &str;

    /// Checks if the session can still be used.
    fn is_valid(&self) -> bool {
        match self.expires_at() {
            Some(expires) => Utc::now() + Duration::seconds(EXPIRY_LEEWAY_SECS) < expires,
            None => true,
        }
    }

    /// Returns when the session expires, if applicable.
    ///
    /// Returns `None` for non-expiring tokens (static API keys).
    fn expires_at(&self) -> Option<DateTime<Utc>>;
}

/// Bearer token with optional expiry.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    token: String,
    expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    /// Token that never expires.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            expires_at: None,
        }
    }

    /// Token valid for `expires_in_secs` from now.
    pub fn expiring_in(token: impl Into<String>, expires_in_secs: i64) -> Self {
        Self {
            token: token.into(),
            expires_at: Some(Utc::now() + Duration::seconds(expires_in_secs)),
        }
    }
}

// Tokens are never logged.
impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

impl Session for AccessToken {
    fn token(&self) -> &str {
        &self.token
    }

    fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }
}

/// Caches one token and refreshes it when it stops being valid.
///
/// Concurrent callers wait on the same refresh instead of each fetching a
/// token.
///
/// # Example
///
/// ```
/// use walletmux::session::{AccessToken, Session, TokenCache};
///
/// #[tokio::main]
/// async fn main() -> walletmux::Result<()> {
///     let cache = TokenCache::new();
///     let token = cache
///         .get_or_refresh(|| async { Ok(AccessToken::expiring_in("t1", 3600)) })
///         .await?;
///     assert_eq!(token.token(), "t1");
///     Ok(())
/// }
/// ```
#[derive(Debug, Default)]
pub struct TokenCache {
    current: Mutex<Option<AccessToken>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached token, fetching a new one with `refresh` if there
    /// is none or it is about to expire.
    ///
    /// # Errors
    ///
    /// Propagates the error from `refresh`; the cache is left empty.
    pub async fn get_or_refresh<F, Fut>(&self, refresh: F) -> Result<AccessToken>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<AccessToken>>,
    {
        let mut current = self.current.lock().await;
        if let Some(token) = current.as_ref().filter(|t| t.is_valid()) {
            return Ok(token.clone());
        }

        *current = None;
        let token = refresh().await?;
        *current = Some(token.clone());
        Ok(token)
    }

    /// Drops the cached token so the next call refreshes.
    pub async fn invalidate(&self) {
        *self.current.lock().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WalletError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_static_token_never_expires() {
        let token = AccessToken::new("key");
        assert!(token.is_valid());
        assert_eq!(token.expires_at(), None);
        assert!(!format!("{:?}", token).contains("key"));
    }

    #[test]
    fn test_token_inside_leeway_is_invalid() {
        assert!(!AccessToken::expiring_in("t", 30).is_valid());
        assert!(AccessToken::expiring_in("t", 3600).is_valid());
    }

    #[tokio::test]
    async fn test_cache_reuses_valid_token() {
        let cache = TokenCache::new();
        let calls = AtomicUsize::new(0);
        for _ in 0..3 {
            let token = cache
                .get_or_refresh(|| async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(AccessToken::expiring_in("t", 3600))
                })
                .await
                .unwrap();
            assert_eq!(token.token(), "t");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cache_refreshes_expired_token() {
        let cache = TokenCache::new();
        cache
            .get_or_refresh(|| async { Ok(AccessToken::expiring_in("old", 10)) })
            .await
            .unwrap();
        let token = cache
            .get_or_refresh(|| async { Ok(AccessToken::expiring_in("new", 3600)) })
            .await
            .unwrap();
        assert_eq!(token.token(), "new");
    }

    #[tokio::test]
    async fn test_failed_refresh_leaves_cache_empty() {
        let cache = TokenCache::new();
        let result = cache
            .get_or_refresh(|| async { Err(WalletError::provider_api("google", Some(401), "denied")) })
            .await;
        assert!(result.is_err());

        cache.invalidate().await;
        let token = cache
            .get_or_refresh(|| async { Ok(AccessToken::new("fresh")) })
            .await
            .unwrap();
        assert_eq!(token.token(), "fresh");
    }
}
