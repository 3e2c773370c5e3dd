use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("missing marketplace app credentials in env")]
    MissingCredentials,
    #[error("credential exchange failed: {0}")]
    Exchange(String),
}

#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub access_token: String,
    pub expires_in_secs: u64,
}

/// External credential exchange collaborator.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn exchange(&self) -> Result<TokenGrant, AuthError>;
}

struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// Lazily-refreshed bearer-credential holder. The slot mutex is held across
/// the exchange so concurrent expiry performs exactly one refresh and every
/// waiter observes the fresh token.
pub struct TokenCache {
    provider: Arc<dyn TokenProvider>,
    slot: Mutex<Option<CachedToken>>,
}

/// Refresh this long before the reported expiry to avoid using a token
/// that dies mid-request.
const EXPIRY_SLACK_SECS: i64 = 60;

impl TokenCache {
    pub fn new(provider: Arc<dyn TokenProvider>) -> Self {
        Self {
            provider,
            slot: Mutex::new(None),
        }
    }

    pub async fn bearer(&self, now: DateTime<Utc>) -> Result<String, AuthError> {
        let mut slot = self.slot.lock().await;
        if let Some(cached) = slot.as_ref()
            && now < cached.expires_at
        {
            return Ok(cached.token.clone());
        }

        let grant = self.provider.exchange().await?;
        let lifetime = TimeDelta::seconds(
            (grant.expires_in_secs as i64 - EXPIRY_SLACK_SECS).max(0),
        );
        debug!(
            target = "dealscout.token",
            expires_in_secs = grant.expires_in_secs,
            "bearer token refreshed"
        );
        let token = grant.access_token.clone();
        *slot = Some(CachedToken {
            token: grant.access_token,
            expires_at: now + lifetime,
        });
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct CountingProvider {
        exchanges: AtomicU32,
        expires_in_secs: u64,
        delay: Duration,
    }

    impl CountingProvider {
        fn new(expires_in_secs: u64) -> Arc<Self> {
            Arc::new(Self {
                exchanges: AtomicU32::new(0),
                expires_in_secs,
                delay: Duration::ZERO,
            })
        }
    }

    #[async_trait]
    impl TokenProvider for CountingProvider {
        async fn exchange(&self) -> Result<TokenGrant, AuthError> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let n = self.exchanges.fetch_add(1, Ordering::SeqCst);
            Ok(TokenGrant {
                access_token: format!("token-{n}"),
                expires_in_secs: self.expires_in_secs,
            })
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl TokenProvider for FailingProvider {
        async fn exchange(&self) -> Result<TokenGrant, AuthError> {
            Err(AuthError::MissingCredentials)
        }
    }

    #[tokio::test]
    async fn token_is_cached_until_expiry() {
        let provider = CountingProvider::new(7200);
        let cache = TokenCache::new(provider.clone());
        let now = Utc::now();

        assert_eq!(cache.bearer(now).await.unwrap(), "token-0");
        assert_eq!(
            cache.bearer(now + TimeDelta::minutes(30)).await.unwrap(),
            "token-0"
        );
        assert_eq!(provider.exchanges.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_token_triggers_refresh() {
        let provider = CountingProvider::new(7200);
        let cache = TokenCache::new(provider.clone());
        let now = Utc::now();

        assert_eq!(cache.bearer(now).await.unwrap(), "token-0");
        // Past the slack-adjusted expiry.
        assert_eq!(
            cache.bearer(now + TimeDelta::seconds(7200)).await.unwrap(),
            "token-1"
        );
        assert_eq!(provider.exchanges.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn concurrent_expiry_performs_one_exchange() {
        let provider = Arc::new(CountingProvider {
            exchanges: AtomicU32::new(0),
            expires_in_secs: 7200,
            delay: Duration::from_millis(20),
        });
        let cache = Arc::new(TokenCache::new(provider.clone()));
        let now = Utc::now();

        let a = tokio::spawn({
            let cache = cache.clone();
            async move { cache.bearer(now).await }
        });
        let b = tokio::spawn({
            let cache = cache.clone();
            async move { cache.bearer(now).await }
        });

        let (a, b) = (a.await.unwrap().unwrap(), b.await.unwrap().unwrap());
        assert_eq!(a, b);
        assert_eq!(provider.exchanges.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn provider_failure_propagates() {
        let cache = TokenCache::new(Arc::new(FailingProvider));
        let err = cache.bearer(Utc::now()).await.unwrap_err();
        assert!(matches!(err, AuthError::MissingCredentials));
    }
}
