use crate::error::{CrawlerError, Result};
use reqwest::Response;
use std::time::Duration;

const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Shared client for the REST adapters
pub fn build_client() -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(concat!("mog_crawler/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()?;
    Ok(client)
}

/// Turn a non-2xx response into an API error carrying status and body
pub async fn ensure_success(resp: Response, what: &str) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(CrawlerError::Api {
        message: format!("{} failed: {} - {}", what, status, body),
    })
}
