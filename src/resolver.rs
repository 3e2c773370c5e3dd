use crate::models::{Condition, ExtractedIdentity, PriceQuote, QuoteSource};
use crate::sources::{ActiveListingsSource, SoldListingsSource, SourceError};
use crate::token::AuthError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Process-wide quote cache keyed by (model, condition). No TTL: quotes
/// live for the process, matching the run-scoped freshness gate upstream.
#[derive(Default)]
pub struct PriceCache {
    inner: Mutex<HashMap<(String, Condition), PriceQuote>>,
}

impl PriceCache {
    pub async fn get(&self, model: &str, condition: Condition) -> Option<PriceQuote> {
        let inner = self.inner.lock().await;
        inner.get(&(model.to_string(), condition)).cloned()
    }

    pub async fn insert(&self, model: &str, condition: Condition, quote: PriceQuote) {
        let mut inner = self.inner.lock().await;
        inner.insert((model.to_string(), condition), quote);
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}

static CLOCK_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s+\d+(?:\.\d+)?ghz$").expect("regex"));
static VENDOR_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:amd\s+ryzen\s+|intel\s+core\s+|amd\s+|intel\s+pentium\s+|intel\s+celeron\s+)")
        .expect("regex")
});

/// Search string for the sold tier: the clock-speed suffix hurts recall.
fn sold_search_terms(model: &str) -> String {
    CLOCK_SUFFIX.replace(model, "").trim().to_string()
}

/// Search string for the active tier: additionally drop the vendor prefix.
fn active_search_terms(model: &str) -> String {
    let stripped = sold_search_terms(model);
    VENDOR_PREFIX.replace(&stripped, "").trim().to_string()
}

fn median(input: &[f64]) -> f64 {
    let mut prices = input.to_vec();
    prices.sort_by(|a, b| a.partial_cmp(b).expect("finite prices"));
    let n = prices.len();
    if n % 2 == 1 {
        prices[n / 2]
    } else {
        (prices[n / 2 - 1] + prices[n / 2]) / 2.0
    }
}

/// Tiered fair-market-value resolution: cache, then the authoritative
/// sold-listings source, then the active-listings median fallback.
pub struct PriceResolver {
    cache: Arc<PriceCache>,
    sold: Option<Arc<dyn SoldListingsSource>>,
    active: Arc<dyn ActiveListingsSource>,
    quote_limit: u32,
}

impl PriceResolver {
    pub fn new(
        cache: Arc<PriceCache>,
        sold: Option<Arc<dyn SoldListingsSource>>,
        active: Arc<dyn ActiveListingsSource>,
        quote_limit: u32,
    ) -> Self {
        Self {
            cache,
            sold,
            active,
            quote_limit,
        }
    }

    /// `Ok(None)` means no price could be established for this identity;
    /// the caller excludes the listing. Only auth failures are fatal.
    pub async fn resolve(
        &self,
        identity: &ExtractedIdentity,
        condition: Condition,
    ) -> Result<Option<PriceQuote>, AuthError> {
        if let Some(quote) = self.cache.get(&identity.model, condition).await {
            debug!(
                target = "dealscout.resolver",
                model = %identity.model,
                "cache hit"
            );
            return Ok(Some(quote));
        }

        if let Some(sold) = &self.sold {
            let search = sold_search_terms(&identity.model);
            match sold.query(&search).await {
                Ok(Some(value)) => {
                    let quote = PriceQuote {
                        value,
                        source: QuoteSource::ScrapedSold,
                        low_confidence: false,
                        sample_size: None,
                    };
                    self.cache
                        .insert(&identity.model, condition, quote.clone())
                        .await;
                    return Ok(Some(quote));
                }
                Ok(None) => {}
                Err(SourceError::Auth(err)) => return Err(err),
                Err(err) => {
                    warn!(
                        target = "dealscout.resolver",
                        model = %identity.model,
                        error = %err,
                        "sold tier failed, falling back to active listings"
                    );
                }
            }
        }

        let search = active_search_terms(&identity.model);
        match self
            .active
            .query(&search, condition.condition_id(), self.quote_limit)
            .await
        {
            Ok(prices) => {
                let prices: Vec<f64> = prices.into_iter().filter(|p| *p > 0.0).collect();
                if prices.is_empty() {
                    return Ok(None);
                }
                let sample_size = prices.len();
                // Active-tier quotes are intentionally not written back to
                // the cache; only the sold tier is authoritative enough.
                Ok(Some(PriceQuote {
                    value: median(&prices),
                    source: QuoteSource::ActiveListingsMedian,
                    low_confidence: sample_size < 5,
                    sample_size: Some(sample_size),
                }))
            }
            Err(SourceError::Auth(err)) => Err(err),
            Err(err) => {
                warn!(
                    target = "dealscout.resolver",
                    model = %identity.model,
                    error = %err,
                    "active tier failed, no price for this listing"
                );
                Ok(None)
            }
        }
    }
}
