//! Shared HTTP plumbing for the agency adapters.
//!
//! Each adapter owns its `reqwest::Client`; the connection pool is released
//! when the adapter is dropped, on every exit path.

use std::time::Duration;

use tracing::debug;

use crate::error::SourceError;
use crate::schema::DataSource;
use crate::Result;

const USER_AGENT: &str = concat!("econ-sources/", env!("CARGO_PKG_VERSION"));

/// Build the HTTP client used by one adapter.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()?;
    Ok(client)
}

/// Issue a GET and decode the body as JSON.
///
/// Non-success statuses become [`SourceError::Upstream`] with the raw body
/// preserved; undecodable bodies become [`SourceError::UnreadableBody`].
/// Both are retried by [`crate::CachedSource`].
pub async fn get_json(
    client: &reqwest::Client,
    source: DataSource,
    url: &str,
    query: &[(&str, String)],
) -> Result<serde_json::Value> {
    debug!(source = %source, url, "Requesting agency API");

    let response = client
        .get(url)
        .header(reqwest::header::ACCEPT, "application/json")
        .query(query)
        .send()
        .await?;

    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(SourceError::Upstream {
            provider: source,
            status: status.as_u16(),
            body,
        });
    }

    serde_json::from_str(&body).map_err(|e| SourceError::UnreadableBody {
        provider: source,
        reason: format!("{e}; body: {}", truncate(&body, 512)),
    })
}

fn truncate(body: &str, max: usize) -> &str {
    match body.char_indices().nth(max) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
