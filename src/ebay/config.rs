use once_cell::sync::Lazy;
use std::env;

pub static EBAY_ENV: Lazy<String> =
    Lazy::new(|| env::var("EBAY_ENV").unwrap_or_else(|_| "PROD".to_string()));

pub static CLIENT_ID: Lazy<String> =
    Lazy::new(|| env::var("EBAY_CLIENT_ID").unwrap_or_default());

pub static CLIENT_SECRET: Lazy<String> =
    Lazy::new(|| env::var("EBAY_CLIENT_SECRET").unwrap_or_default());

pub static ROOT: Lazy<String> = Lazy::new(|| {
    if EBAY_ENV.as_str().eq_ignore_ascii_case("PROD") {
        "https://api.ebay.com".to_string()
    } else {
        "https://api.sandbox.ebay.com".to_string()
    }
});

pub static OAUTH_TOKEN_URL: Lazy<String> =
    Lazy::new(|| format!("{}/identity/v1/oauth2/token", *ROOT));

pub static BROWSE_SEARCH_URL: Lazy<String> =
    Lazy::new(|| format!("{}/buy/browse/v1/item_summary/search", *ROOT));

pub const OAUTH_SCOPE: &str = "https://api.ebay.com/oauth/api_scope";

/// Browse category for desktop CPUs / processors.
pub const CPU_CATEGORY_ID: &str = "164";
