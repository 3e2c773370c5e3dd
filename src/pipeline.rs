use crate::ebay::auth::EbayTokenProvider;
use crate::ebay::browse::EbayBrowseClient;
use crate::evaluator::{ListingEvaluator, ProfitStrategy};
use crate::models::EvaluatedDeal;
use crate::resolver::{PriceCache, PriceResolver};
use crate::retry::Retrier;
use crate::scheduler::FanOutScheduler;
use crate::sources::{ActiveListingsSource, ListingsSource, SoldListingsSource, SourceError};
use crate::token::{AuthError, TokenCache};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Worker cap when every price comes from the REST API.
pub const API_ONLY_CONCURRENCY: usize = 20;
/// Worker cap whenever the exclusive sold-listings session is engaged.
pub const EXCLUSIVE_SCRAPE_CONCURRENCY: usize = 3;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("invalid configuration: {0}")]
    Config(String),
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Listings older than this are skipped; also the freshness horizon
    /// callers can tighten per run. 4 hours by default.
    pub cache_expiry_secs: u64,
    pub good_threshold: f64,
    pub great_threshold: f64,
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_concurrency: usize,
    /// How many cheapest active listings feed the median.
    pub quote_limit: u32,
    pub profit_strategy: ProfitStrategy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cache_expiry_secs: 14400,
            good_threshold: 10.0,
            great_threshold: 30.0,
            max_attempts: 3,
            base_delay: Duration::from_secs(3),
            max_concurrency: API_ONLY_CONCURRENCY,
            quote_limit: 5,
            profit_strategy: ProfitStrategy::ListSpread,
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            cache_expiry_secs: env_parse("DEALSCOUT_CACHE_EXPIRY_SECS")
                .unwrap_or(defaults.cache_expiry_secs),
            good_threshold: env_parse("DEALSCOUT_GOOD_THRESHOLD")
                .unwrap_or(defaults.good_threshold),
            great_threshold: env_parse("DEALSCOUT_GREAT_THRESHOLD")
                .unwrap_or(defaults.great_threshold),
            max_attempts: env_parse("DEALSCOUT_MAX_ATTEMPTS").unwrap_or(defaults.max_attempts),
            base_delay: env_parse("DEALSCOUT_BASE_DELAY_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.base_delay),
            max_concurrency: env_parse("DEALSCOUT_MAX_CONCURRENCY")
                .filter(|v| *v > 0)
                .unwrap_or(defaults.max_concurrency),
            quote_limit: env_parse("DEALSCOUT_QUOTE_LIMIT").unwrap_or(defaults.quote_limit),
            profit_strategy: defaults.profit_strategy,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}

/// The deal-evaluation pipeline: fetch a batch of raw listings and run
/// them through classification, price resolution, and tiering.
pub struct DealPipeline {
    config: Arc<PipelineConfig>,
    listings: Arc<dyn ListingsSource>,
    scheduler: FanOutScheduler,
    cancel: CancellationToken,
}

impl DealPipeline {
    pub fn new(
        config: PipelineConfig,
        listings: Arc<dyn ListingsSource>,
        sold: Option<Arc<dyn SoldListingsSource>>,
        active: Arc<dyn ActiveListingsSource>,
    ) -> Self {
        // The scrape session cannot be driven concurrently; clamp the pool
        // whenever it is engaged.
        let max_concurrency = if sold.is_some() {
            config.max_concurrency.min(EXCLUSIVE_SCRAPE_CONCURRENCY)
        } else {
            config.max_concurrency
        };

        let cache = Arc::new(PriceCache::default());
        let resolver = Arc::new(PriceResolver::new(cache, sold, active, config.quote_limit));
        let evaluator = Arc::new(ListingEvaluator::new(
            resolver,
            config.profit_strategy.clone(),
            config.good_threshold,
            config.great_threshold,
        ));
        let scheduler = FanOutScheduler::new(evaluator, max_concurrency, config.cache_expiry_secs);

        Self {
            config: Arc::new(config),
            listings,
            scheduler,
            cancel: CancellationToken::new(),
        }
    }

    /// Build an API-only pipeline from env credentials. No sold-listings
    /// session is wired in; tier 1 is skipped and every quote comes from
    /// the active-listings median.
    pub fn from_env() -> Result<Self, PipelineError> {
        if !EbayTokenProvider::credentials_configured() {
            return Err(PipelineError::Config(
                "EBAY_CLIENT_ID and EBAY_CLIENT_SECRET must be set".to_string(),
            ));
        }
        let config = PipelineConfig::from_env();
        let retrier = Retrier::new(config.max_attempts, config.base_delay);
        let tokens = Arc::new(TokenCache::new(Arc::new(EbayTokenProvider::new(
            retrier.clone(),
        ))));
        let browse = Arc::new(EbayBrowseClient::new(tokens, retrier));
        Ok(Self::new(config, browse.clone(), None, browse))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Handle a caller can use to abort remaining work in any mode.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    async fn fetch_batch(&self, keyword: &str, limit: u32) -> Result<Vec<crate::models::RawListing>, PipelineError> {
        match self.listings.search(keyword, limit).await {
            Ok(listings) => Ok(listings),
            Err(SourceError::Auth(err)) => Err(err.into()),
            Err(err) => {
                // Transient feed trouble never crashes a run; the caller
                // just gets an empty batch this time.
                warn!(
                    target = "dealscout.pipeline",
                    keyword,
                    error = %err,
                    "listing fetch failed, returning empty batch"
                );
                Ok(Vec::new())
            }
        }
    }

    /// Collect-all mode: every surviving deal, sorted by tier.
    pub async fn evaluate_all(
        &self,
        keyword: &str,
        limit: u32,
    ) -> Result<Vec<EvaluatedDeal>, PipelineError> {
        let batch = self.fetch_batch(keyword, limit).await?;
        self.scheduler
            .collect_all(batch, &self.cancel)
            .await
            .map_err(Into::into)
    }

    /// Streaming mode: deals arrive in completion order; the channel ends
    /// when the batch is exhausted or the run is cancelled.
    pub async fn evaluate_stream(
        &self,
        keyword: &str,
        limit: u32,
    ) -> Result<mpsc::Receiver<EvaluatedDeal>, PipelineError> {
        let batch = self.fetch_batch(keyword, limit).await?;
        Ok(self.scheduler.stream(batch, self.cancel.clone()))
    }
}
