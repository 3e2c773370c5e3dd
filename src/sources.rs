use crate::models::RawListing;
use crate::token::AuthError;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    /// Fatal for the whole run; nothing can be priced without credentials.
    #[error(transparent)]
    Auth(#[from] AuthError),
    /// Upstream overload or transport fault that survived the retry budget.
    #[error("upstream unavailable: {0}")]
    Transient(String),
    /// Response arrived but did not have the expected shape.
    #[error("unexpected response shape: {0}")]
    Parse(String),
    /// Any other non-success response.
    #[error("request failed: {0}")]
    Request(String),
}

/// Keyword search over newly-listed marketplace items.
#[async_trait]
pub trait ListingsSource: Send + Sync {
    async fn search(&self, keyword: &str, limit: u32) -> Result<Vec<RawListing>, SourceError>;
}

/// Sold/completed-listings aggregate, the authoritative fair-value tier.
/// Implementations are typically backed by a single stateful scrape
/// session and must not be driven by more than one caller at a time;
/// wrap them in [`crate::ebay::sold::ExclusiveSoldSession`].
#[async_trait]
pub trait SoldListingsSource: Send + Sync {
    async fn query(&self, search: &str) -> Result<Option<f64>, SourceError>;
}

/// Active-listings search, the fallback fair-value tier. Returns the
/// cheapest observed prices for the search string under one condition.
#[async_trait]
pub trait ActiveListingsSource: Send + Sync {
    async fn query(
        &self,
        search: &str,
        condition_id: &str,
        limit: u32,
    ) -> Result<Vec<f64>, SourceError>;
}
