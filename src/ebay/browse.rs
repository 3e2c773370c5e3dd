#![allow(non_snake_case)]

use crate::ebay::config::{BROWSE_SEARCH_URL, CPU_CATEGORY_ID};
use crate::http::build_client;
use crate::models::{Condition, RawListing};
use crate::retry::{Attempt, Retrier};
use crate::sources::{ActiveListingsSource, ListingsSource, SourceError};
use crate::token::TokenCache;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    itemSummaries: Vec<ItemSummary>,
}

#[derive(Debug, Clone, Deserialize)]
struct ItemSummary {
    #[serde(default)]
    title: String,
    #[serde(default)]
    price: Option<Money>,
    #[serde(default)]
    condition: Option<String>,
    #[serde(default)]
    categoryPath: Option<String>,
    #[serde(default)]
    itemWebUrl: Option<String>,
    #[serde(default)]
    itemCreationDate: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct Money {
    #[serde(default)]
    value: Option<String>,
}

/// Browse API client serving both the newly-listed feed and the
/// active-listings fallback price tier.
pub struct EbayBrowseClient {
    http: Client,
    tokens: Arc<TokenCache>,
    retrier: Retrier,
}

impl EbayBrowseClient {
    pub fn new(tokens: Arc<TokenCache>, retrier: Retrier) -> Self {
        Self {
            http: build_client(),
            tokens,
            retrier,
        }
    }

    async fn search_items(&self, query: &[(&str, String)]) -> Result<Vec<ItemSummary>, SourceError> {
        let bearer = self.tokens.bearer(Utc::now()).await?;

        let response = self
            .retrier
            .run(|| {
                let request = self
                    .http
                    .get(BROWSE_SEARCH_URL.as_str())
                    .query(query)
                    .bearer_auth(&bearer);
                async move {
                    match request.send().await {
                        Ok(resp) if resp.status() == StatusCode::SERVICE_UNAVAILABLE => {
                            Ok(Attempt::Busy(resp))
                        }
                        Ok(resp) => Ok(Attempt::Ready(resp)),
                        Err(err) => Err(err.to_string()),
                    }
                }
            })
            .await
            .map_err(|err| SourceError::Transient(err.to_string()))?;

        // The retrier hands the last response back even when it is still an
        // overload; keep that class separate from plain request failures.
        if response.status() == StatusCode::SERVICE_UNAVAILABLE {
            return Err(SourceError::Transient("HTTP 503 after retries".to_string()));
        }
        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(SourceError::Auth(crate::token::AuthError::Exchange(
                "HTTP 401 from browse search".to_string(),
            )));
        }
        if !response.status().is_success() {
            return Err(SourceError::Request(format!("HTTP {}", response.status())));
        }

        let payload: SearchResponse = response
            .json()
            .await
            .map_err(|err| SourceError::Parse(err.to_string()))?;
        Ok(payload.itemSummaries)
    }
}

fn parse_price(price: Option<&Money>) -> f64 {
    price
        .and_then(|money| money.value.as_deref())
        .and_then(|raw| raw.parse::<f64>().ok())
        .unwrap_or(0.0)
}

fn parse_creation_date(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|value| DateTime::parse_from_rfc3339(value).ok())
        .map(|parsed| parsed.with_timezone(&Utc))
}

fn to_raw_listing(item: ItemSummary) -> RawListing {
    let creation_timestamp = parse_creation_date(item.itemCreationDate.as_deref());
    RawListing {
        price: parse_price(item.price.as_ref()),
        title: item.title,
        // The item-summary feed does not carry these; the profit formula
        // treats both as zero unless the caller fills them in.
        shipping_cost: 0.0,
        tax_estimate: 0.0,
        condition: Condition::from_label(item.condition.as_deref().unwrap_or("Not Specified")),
        category: item.categoryPath.unwrap_or_else(|| "Misc".to_string()),
        url: item.itemWebUrl.unwrap_or_default(),
        creation_timestamp,
    }
}

#[async_trait]
impl ListingsSource for EbayBrowseClient {
    async fn search(&self, keyword: &str, limit: u32) -> Result<Vec<RawListing>, SourceError> {
        let query = [
            ("q", keyword.to_string()),
            ("category_ids", CPU_CATEGORY_ID.to_string()),
            ("limit", limit.to_string()),
            ("sort", "newlyListed".to_string()),
        ];
        let items = self.search_items(&query).await?;
        debug!(
            target = "dealscout.browse",
            keyword,
            count = items.len(),
            "newly listed feed fetched"
        );
        Ok(items.into_iter().map(to_raw_listing).collect())
    }
}

#[async_trait]
impl ActiveListingsSource for EbayBrowseClient {
    async fn query(
        &self,
        search: &str,
        condition_id: &str,
        limit: u32,
    ) -> Result<Vec<f64>, SourceError> {
        let query = [
            ("q", search.to_string()),
            ("category_ids", CPU_CATEGORY_ID.to_string()),
            ("filter", format!("conditionIds:{{{condition_id}}}")),
            ("limit", limit.to_string()),
            ("sort", "price".to_string()),
        ];
        let items = self.search_items(&query).await?;
        let prices: Vec<f64> = items
            .iter()
            .map(|item| parse_price(item.price.as_ref()))
            .filter(|value| *value > 0.0)
            .collect();
        debug!(
            target = "dealscout.browse",
            search,
            condition_id,
            samples = prices.len(),
            "active listing prices fetched"
        );
        Ok(prices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_item(json: serde_json::Value) -> ItemSummary {
        serde_json::from_value(json).expect("item summary")
    }

    #[test]
    fn item_summary_maps_to_raw_listing() {
        let item = sample_item(serde_json::json!({
            "title": "Intel Core i5-7500T Processor",
            "price": {"value": "42.50", "currency": "USD"},
            "condition": "Used",
            "categoryPath": "Computers/CPUs, Processors",
            "itemWebUrl": "https://www.ebay.com/itm/1234",
            "itemCreationDate": "2026-08-27T12:00:00.000Z"
        }));
        let listing = to_raw_listing(item);
        assert_eq!(listing.title, "Intel Core i5-7500T Processor");
        assert_eq!(listing.price, 42.5);
        assert_eq!(listing.condition, Condition::Used);
        assert_eq!(listing.category, "Computers/CPUs, Processors");
        assert!(listing.creation_timestamp.is_some());
        assert_eq!(listing.shipping_cost, 0.0);
        assert_eq!(listing.tax_estimate, 0.0);
    }

    #[test]
    fn missing_fields_get_safe_defaults() {
        let item = sample_item(serde_json::json!({
            "title": "Mystery CPU",
            "price": {"value": "not-a-number"}
        }));
        let listing = to_raw_listing(item);
        assert_eq!(listing.price, 0.0);
        assert_eq!(listing.condition, Condition::Used);
        assert_eq!(listing.category, "Misc");
        assert_eq!(listing.url, "");
        assert!(listing.creation_timestamp.is_none());
    }

    #[test]
    fn empty_search_response_deserializes() {
        let payload: SearchResponse = serde_json::from_str("{}").expect("empty body");
        assert!(payload.itemSummaries.is_empty());
    }
}
