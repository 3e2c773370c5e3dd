use crate::classifier;
use crate::models::{DealTier, EvaluatedDeal, RawListing, format_time_ago};
use crate::resolver::PriceResolver;
use crate::token::AuthError;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::debug;

static LOT_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^lot\s+of\s+(\d+)").expect("regex"));

/// Integer quantity from a leading "lot of N" title prefix, default 1.
pub fn lot_multiplier(title: &str) -> u32 {
    LOT_PREFIX
        .captures(title.trim())
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(1)
}

/// Two distinct net-profit formulas exist in this system; they are exposed
/// as named strategies rather than merged. `ListSpread` is authoritative.
#[derive(Debug, Clone, PartialEq)]
pub enum ProfitStrategy {
    /// Fair value times lot size, minus what the listing costs to acquire
    /// (price plus shipping). Tax is deliberately not part of this formula.
    ListSpread,
    /// Assume a resale price (defaults to purchase price + 50.0) and
    /// subtract acquisition costs, tax, and a platform-fee percentage.
    /// Ignores the resolved quote entirely.
    ResaleAssumption {
        platform_fee_rate: f64,
        resale_price: Option<f64>,
    },
}

impl Default for ProfitStrategy {
    fn default() -> Self {
        ProfitStrategy::ListSpread
    }
}

impl ProfitStrategy {
    pub fn net_profit(&self, listing: &RawListing, quote_value: f64, multiplier: u32) -> f64 {
        let profit = match self {
            ProfitStrategy::ListSpread => {
                quote_value * f64::from(multiplier) - (listing.price + listing.shipping_cost)
            }
            ProfitStrategy::ResaleAssumption {
                platform_fee_rate,
                resale_price,
            } => {
                let resale = resale_price.unwrap_or(listing.price + 50.0);
                resale
                    - (listing.price
                        + listing.shipping_cost
                        + listing.tax_estimate
                        + resale * platform_fee_rate)
            }
        };
        (profit * 100.0).round() / 100.0
    }
}

/// Combines the classifier and price resolver with a listing's own costs
/// to produce a profit figure and deal tier.
pub struct ListingEvaluator {
    resolver: Arc<PriceResolver>,
    strategy: ProfitStrategy,
    good_threshold: f64,
    great_threshold: f64,
}

impl ListingEvaluator {
    pub fn new(
        resolver: Arc<PriceResolver>,
        strategy: ProfitStrategy,
        good_threshold: f64,
        great_threshold: f64,
    ) -> Self {
        Self {
            resolver,
            strategy,
            good_threshold,
            great_threshold,
        }
    }

    fn tier(&self, net_profit: f64) -> DealTier {
        if net_profit < self.good_threshold {
            DealTier::Fair
        } else if net_profit < self.great_threshold {
            DealTier::Good
        } else {
            DealTier::Great
        }
    }

    /// `Ok(None)` covers every exclusion: stale, ineligible category, no
    /// identity, or no resolvable price. Only auth failures are fatal.
    pub async fn evaluate(
        &self,
        listing: &RawListing,
        now: DateTime<Utc>,
        cache_expiry_secs: u64,
    ) -> Result<Option<EvaluatedDeal>, AuthError> {
        if let Some(created) = listing.creation_timestamp
            && (now - created).num_seconds() > cache_expiry_secs as i64
        {
            debug!(
                target = "dealscout.evaluator",
                title = %listing.title,
                "listing older than freshness window, skipped"
            );
            return Ok(None);
        }

        let category_match = listing.category.to_lowercase().contains("cpu");
        let title_match = listing.title.to_lowercase().contains("processor");
        if !category_match && !title_match {
            return Ok(None);
        }

        let Some(identity) = classifier::classify(&listing.title) else {
            return Ok(None);
        };

        let Some(quote) = self.resolver.resolve(&identity, listing.condition).await? else {
            debug!(
                target = "dealscout.evaluator",
                model = %identity.model,
                "no fair-market value, listing excluded"
            );
            return Ok(None);
        };

        let multiplier = lot_multiplier(&listing.title);
        let net_profit = self.strategy.net_profit(listing, quote.value, multiplier);
        let tier = self.tier(net_profit);

        Ok(Some(EvaluatedDeal {
            posted_ago: format_time_ago(now, listing.creation_timestamp),
            listing: listing.clone(),
            identity,
            quote,
            multiplier,
            net_profit,
            tier,
        }))
    }
}
