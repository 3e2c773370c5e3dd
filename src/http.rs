use reqwest::Client;
use std::time::Duration;

/// Shared HTTP client with env-tunable timeouts. Every upstream call in
/// the pipeline goes through a client built here.
pub fn build_client() -> Client {
    let timeout = std::env::var("DEALSCOUT_HTTP_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(15);
    let connect = std::env::var("DEALSCOUT_HTTP_CONNECT_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(5);
    Client::builder()
        .timeout(Duration::from_secs(timeout))
        .connect_timeout(Duration::from_secs(connect))
        .build()
        .unwrap_or_else(|_| Client::new())
}
