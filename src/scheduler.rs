use crate::evaluator::ListingEvaluator;
use crate::models::{EvaluatedDeal, RawListing};
use crate::token::AuthError;
use chrono::Utc;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Runs the evaluator over a batch with bounded concurrency, in either
/// collect-all or streaming mode. The cancellation token stops dispatch of
/// new listings and lets in-flight evaluations unwind.
pub struct FanOutScheduler {
    evaluator: Arc<ListingEvaluator>,
    max_concurrency: usize,
    cache_expiry_secs: u64,
}

impl FanOutScheduler {
    pub fn new(
        evaluator: Arc<ListingEvaluator>,
        max_concurrency: usize,
        cache_expiry_secs: u64,
    ) -> Self {
        Self {
            evaluator,
            max_concurrency: max_concurrency.max(1),
            cache_expiry_secs,
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Evaluate every listing, gather the survivors in input order, then
    /// stable-sort by deal tier (great, good, fair). Auth failures abort
    /// the whole run; everything else just drops the affected listing.
    pub async fn collect_all(
        &self,
        listings: Vec<RawListing>,
        cancel: &CancellationToken,
    ) -> Result<Vec<EvaluatedDeal>, AuthError> {
        let now = Utc::now();
        let total = listings.len();
        let expiry = self.cache_expiry_secs;

        let evaluated: Vec<Option<EvaluatedDeal>> = stream::iter(listings)
            .map(|listing| {
                let evaluator = self.evaluator.clone();
                let cancel = cancel.clone();
                async move {
                    if cancel.is_cancelled() {
                        return Ok(None);
                    }
                    tokio::select! {
                        _ = cancel.cancelled() => Ok(None),
                        result = evaluator.evaluate(&listing, now, expiry) => result,
                    }
                }
            })
            .buffered(self.max_concurrency)
            .try_collect()
            .await?;

        let mut deals: Vec<EvaluatedDeal> = evaluated.into_iter().flatten().collect();
        // sort_by_key is stable, so input order survives within a tier.
        deals.sort_by_key(|deal| deal.tier);
        info!(
            target = "dealscout.scheduler",
            total,
            kept = deals.len(),
            "batch evaluated"
        );
        Ok(deals)
    }

    /// Emit deals in completion order as soon as each listing finishes.
    /// The returned receiver is finite and consumed once. An auth failure
    /// cancels the remaining work and ends the stream early.
    pub fn stream(
        &self,
        listings: Vec<RawListing>,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<EvaluatedDeal> {
        let (tx, rx) = mpsc::channel(self.max_concurrency);
        let evaluator = self.evaluator.clone();
        let limit = self.max_concurrency;
        let expiry = self.cache_expiry_secs;

        tokio::spawn(async move {
            let now = Utc::now();
            let semaphore = Arc::new(Semaphore::new(limit));
            let mut workers = JoinSet::new();

            for listing in listings {
                if cancel.is_cancelled() {
                    break;
                }
                // Permit acquired before spawning, so at most `limit`
                // evaluations are ever in flight.
                let permit = match semaphore.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => break,
                };
                let evaluator = evaluator.clone();
                let tx = tx.clone();
                let cancel = cancel.clone();
                workers.spawn(async move {
                    let _permit = permit;
                    let result = tokio::select! {
                        _ = cancel.cancelled() => return,
                        result = evaluator.evaluate(&listing, now, expiry) => result,
                    };
                    match result {
                        Ok(Some(deal)) => {
                            let _ = tx.send(deal).await;
                        }
                        Ok(None) => {}
                        Err(err) => {
                            error!(
                                target = "dealscout.scheduler",
                                error = %err,
                                "auth failure, aborting remaining evaluations"
                            );
                            cancel.cancel();
                        }
                    }
                });
            }

            drop(tx);
            while workers.join_next().await.is_some() {}
        });

        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::ProfitStrategy;
    use crate::models::{Condition, DealTier};
    use crate::resolver::{PriceCache, PriceResolver};
    use crate::sources::{ActiveListingsSource, SourceError};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Quotes a per-model unit price keyed by the model digits.
    struct PriceBook;

    #[async_trait]
    impl ActiveListingsSource for PriceBook {
        async fn query(&self, search: &str, _: &str, _: u32) -> Result<Vec<f64>, SourceError> {
            let price = if search.contains("7500") {
                60.0
            } else if search.contains("9100") {
                25.0
            } else if search.contains("8700") {
                115.0
            } else {
                return Ok(vec![]);
            };
            Ok(vec![price])
        }
    }

    struct CountingActive {
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl ActiveListingsSource for CountingActive {
        async fn query(&self, _: &str, _: &str, _: u32) -> Result<Vec<f64>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![60.0])
        }
    }

    fn scheduler_with(active: Arc<dyn ActiveListingsSource>, limit: usize) -> FanOutScheduler {
        let resolver = Arc::new(PriceResolver::new(
            Arc::new(PriceCache::default()),
            None,
            active,
            5,
        ));
        let evaluator = Arc::new(ListingEvaluator::new(
            resolver,
            ProfitStrategy::ListSpread,
            10.0,
            30.0,
        ));
        FanOutScheduler::new(evaluator, limit, 14400)
    }

    fn cpu_listing(title: &str, price: f64) -> RawListing {
        RawListing {
            title: title.to_string(),
            price,
            shipping_cost: 0.0,
            tax_estimate: 0.0,
            condition: Condition::Used,
            category: "CPUs/Processors".to_string(),
            url: format!("https://www.ebay.com/itm/{title}"),
            creation_timestamp: None,
        }
    }

    fn mixed_batch() -> Vec<RawListing> {
        vec![
            // 25 - 20 = 5 -> fair
            cpu_listing("Intel Core i3-9100 CPU", 20.0),
            // 60 - 25 = 35 -> great
            cpu_listing("Intel Core i5-7500T CPU", 25.0),
            // not a CPU title, excluded
            cpu_listing("Samsung 980 PRO 1TB NVMe SSD", 10.0),
            // 115 - 100 = 15 -> good
            cpu_listing("Intel Core i7-8700K CPU", 100.0),
            // 60 - 45 = 15 -> good (second good, tests stable order)
            cpu_listing("Intel Core i5-7500T CPU bundle", 45.0),
        ]
    }

    #[tokio::test]
    async fn collect_all_sorts_by_tier_stably() {
        let scheduler = scheduler_with(Arc::new(PriceBook), 4);
        let deals = scheduler
            .collect_all(mixed_batch(), &CancellationToken::new())
            .await
            .unwrap();

        let tiers: Vec<DealTier> = deals.iter().map(|d| d.tier).collect();
        assert_eq!(
            tiers,
            vec![DealTier::Great, DealTier::Good, DealTier::Good, DealTier::Fair]
        );
        // The two good deals keep their input order.
        assert!(deals[1].listing.title.contains("i7-8700K"));
        assert!(deals[2].listing.title.contains("bundle"));
    }

    #[tokio::test]
    async fn streaming_delivers_every_evaluable_listing_once() {
        let scheduler = scheduler_with(Arc::new(PriceBook), 3);
        let collected = scheduler
            .collect_all(mixed_batch(), &CancellationToken::new())
            .await
            .unwrap();

        let mut rx = scheduler.stream(mixed_batch(), CancellationToken::new());
        let mut streamed = Vec::new();
        while let Some(deal) = rx.recv().await {
            streamed.push(deal);
        }

        assert_eq!(streamed.len(), collected.len());
        let streamed_urls: HashSet<String> =
            streamed.iter().map(|d| d.listing.url.clone()).collect();
        let collected_urls: HashSet<String> =
            collected.iter().map(|d| d.listing.url.clone()).collect();
        assert_eq!(streamed_urls.len(), streamed.len());
        assert_eq!(streamed_urls, collected_urls);
    }

    #[tokio::test]
    async fn cancelled_token_stops_dispatch() {
        let calls = Arc::new(AtomicU32::new(0));
        let scheduler = scheduler_with(
            Arc::new(CountingActive {
                calls: calls.clone(),
            }),
            2,
        );
        let cancel = CancellationToken::new();
        cancel.cancel();

        let deals = scheduler
            .collect_all(mixed_batch(), &cancel)
            .await
            .unwrap();
        assert!(deals.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let mut rx = scheduler.stream(mixed_batch(), cancel);
        assert!(rx.recv().await.is_none());
    }
}
