use std::time::Duration;

use anyhow::{Context, anyhow};
use reqwest::blocking::{Client, RequestBuilder, Response};
use tracing::{debug, warn};

pub const USER_AGENT: &str = concat!("inkdash/", env!("CARGO_PKG_VERSION"));
const TIMEOUT: Duration = Duration::from_secs(30);

/// One client per run; every request shares the timeout.
pub fn client() -> anyhow::Result<Client> {
    Client::builder()
        .timeout(TIMEOUT)
        .user_agent(USER_AGENT)
        .build()
        .context("failed building HTTP client")
}

/// Sends the request and fails on a non-success status, keeping a short
/// excerpt of the body in the error.
pub fn send(request: RequestBuilder, what: &str) -> anyhow::Result<Response> {
    let response = request
        .send()
        .with_context(|| format!("failed requesting {what}"))?;
    let status = response.status();
    if status.is_success() {
        debug!(what, status = %status, "request succeeded");
        return Ok(response);
    }

    let body = response.text().unwrap_or_default();
    let excerpt: String = body.chars().take(200).collect();
    warn!(what, status = %status, body = %excerpt, "request returned non-success status");
    Err(anyhow!("{what} returned HTTP {status}: {excerpt}"))
}

pub fn send_text(request: RequestBuilder, what: &str) -> anyhow::Result<String> {
    send(request, what)?
        .text()
        .with_context(|| format!("failed reading {what} response body"))
}

pub fn send_json<T: serde::de::DeserializeOwned>(
    request: RequestBuilder,
    what: &str,
) -> anyhow::Result<T> {
    let body = send_text(request, what)?;
    serde_json::from_str(&body).with_context(|| format!("failed decoding {what} response"))
}

/// `webcal://` and `webcals://` are plain HTTPS feeds.
pub fn normalize_feed_url(location: &str) -> String {
    let trimmed = location.trim();
    let lower = trimmed.to_ascii_lowercase();
    for scheme in ["webcals://", "webcal://"] {
        if lower.starts_with(scheme) {
            let normalized = format!("https://{}", &trimmed[scheme.len()..]);
            debug!(raw = %trimmed, normalized = %normalized, "rewrote webcal URL");
            return normalized;
        }
    }
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::normalize_feed_url;

    #[test]
    fn rewrites_webcal_schemes() {
        assert_eq!(
            normalize_feed_url("webcal://example.com/cal.ics"),
            "https://example.com/cal.ics"
        );
        assert_eq!(
            normalize_feed_url(" WEBCALS://example.com/x "),
            "https://example.com/x"
        );
        assert_eq!(
            normalize_feed_url("https://example.com/y"),
            "https://example.com/y"
        );
    }
}
