use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One raw marketplace listing as fetched from the Browse search feed.
/// Owned by the caller for the duration of a single evaluation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawListing {
    pub title: String,
    pub price: f64,
    pub shipping_cost: f64,
    pub tax_estimate: f64,
    pub condition: Condition,
    pub category: String,
    pub url: String,
    #[serde(default)]
    pub creation_timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Condition {
    New,
    OpenBox,
    #[default]
    Used,
    ForPartsNotWorking,
}

impl Condition {
    /// Browse API `conditionIds` filter code.
    pub fn condition_id(&self) -> &'static str {
        match self {
            Condition::New => "1000",
            Condition::OpenBox => "1500",
            Condition::Used => "3000",
            Condition::ForPartsNotWorking => "7000",
        }
    }

    /// Lenient parse of the free-form condition labels the feed returns.
    /// Anything unrecognized is treated as Used.
    pub fn from_label(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "new" | "brand new" => Condition::New,
            "open box" | "openbox" | "new (open box)" => Condition::OpenBox,
            "for parts or not working" | "for parts" => Condition::ForPartsNotWorking,
            _ => Condition::Used,
        }
    }
}

/// Normalized product identity extracted from a listing title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedIdentity {
    pub model: String,
    pub consumer_grade: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteSource {
    ScrapedSold,
    ActiveListingsMedian,
}

/// Fair-market-value estimate for an identity under a given condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub value: f64,
    pub source: QuoteSource,
    /// Set when the estimate came from fewer than five observed samples.
    pub low_confidence: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_size: Option<usize>,
}

/// Declaration order doubles as sort order: a stable sort on the tier
/// puts great deals first and keeps input order within a tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DealTier {
    Great,
    Good,
    Fair,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluatedDeal {
    #[serde(flatten)]
    pub listing: RawListing,
    pub identity: ExtractedIdentity,
    pub quote: PriceQuote,
    pub multiplier: u32,
    pub net_profit: f64,
    pub tier: DealTier,
    pub posted_ago: String,
}

/// Human-readable age of a listing, "N/A" when no timestamp came through.
pub fn format_time_ago(now: DateTime<Utc>, created: Option<DateTime<Utc>>) -> String {
    let Some(created) = created else {
        return "N/A".to_string();
    };
    let seconds = (now - created).num_seconds().max(0);
    if seconds < 60 {
        format!("{seconds} second(s) ago")
    } else if seconds < 3600 {
        format!("{} minute(s) ago", seconds / 60)
    } else if seconds < 86400 {
        format!("{} hour(s) ago", seconds / 3600)
    } else {
        format!("{} day(s) ago", seconds / 86400)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    #[test]
    fn condition_codes_match_browse_filter_values() {
        assert_eq!(Condition::New.condition_id(), "1000");
        assert_eq!(Condition::OpenBox.condition_id(), "1500");
        assert_eq!(Condition::Used.condition_id(), "3000");
        assert_eq!(Condition::ForPartsNotWorking.condition_id(), "7000");
    }

    #[test]
    fn condition_label_parse_is_lenient() {
        assert_eq!(Condition::from_label("New"), Condition::New);
        assert_eq!(Condition::from_label("Open box"), Condition::OpenBox);
        assert_eq!(
            Condition::from_label("For parts or not working"),
            Condition::ForPartsNotWorking
        );
        assert_eq!(Condition::from_label("Like New"), Condition::Used);
        assert_eq!(Condition::from_label("Not Specified"), Condition::Used);
    }

    #[test]
    fn tier_sort_order_puts_great_first() {
        let mut tiers = vec![DealTier::Fair, DealTier::Great, DealTier::Good];
        tiers.sort();
        assert_eq!(tiers, vec![DealTier::Great, DealTier::Good, DealTier::Fair]);
    }

    #[test]
    fn time_ago_buckets() {
        let now = Utc::now();
        assert_eq!(format_time_ago(now, None), "N/A");
        assert_eq!(
            format_time_ago(now, Some(now - TimeDelta::seconds(30))),
            "30 second(s) ago"
        );
        assert_eq!(
            format_time_ago(now, Some(now - TimeDelta::minutes(5))),
            "5 minute(s) ago"
        );
        assert_eq!(
            format_time_ago(now, Some(now - TimeDelta::hours(7))),
            "7 hour(s) ago"
        );
        assert_eq!(
            format_time_ago(now, Some(now - TimeDelta::days(3))),
            "3 day(s) ago"
        );
    }
}
