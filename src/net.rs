//! Shared HTTP transport and startup connectivity check

use std::time::Duration;

use crate::config::NetworkConfig;
use crate::{Error, Result};

/// Build the HTTP client shared by every provider
///
/// Every request is bounded by the configured timeout, so a stalled provider
/// surfaces as an error instead of hanging the session loop.
///
/// # Errors
///
/// Returns error if the TLS backend cannot be initialized
pub fn build_client(config: &NetworkConfig) -> Result<reqwest::Client> {
    if config.insecure_tls {
        tracing::warn!("TLS certificate verification disabled");
    }

    let client = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .connect_timeout(config.connect_timeout)
        .danger_accept_invalid_certs(config.insecure_tls)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()?;

    Ok(client)
}

/// Wait until `url` answers, retrying up to `attempts` times
///
/// Any HTTP response counts as connected; only transport failures retry.
///
/// # Errors
///
/// Returns `Error::Connectivity` once all attempts are exhausted
pub async fn wait_for_connectivity(
    client: &reqwest::Client,
    url: &str,
    attempts: u32,
    interval: Duration,
) -> Result<()> {
    tracing::info!(url, attempts, "checking network connectivity");

    let mut last_error = String::from("no attempts made");
    for attempt in 1..=attempts {
        match client.head(url).send().await {
            Ok(response) => {
                tracing::info!(attempt, status = %response.status(), "network connected");
                return Ok(());
            }
            Err(e) => {
                tracing::debug!(attempt, error = %e, "network not reachable yet");
                last_error = e.to_string();
            }
        }

        if attempt < attempts {
            tokio::time::sleep(interval).await;
        }
    }

    Err(Error::Connectivity(format!(
        "{url} unreachable after {attempts} attempts: {last_error}"
    )))
}

/// Pass a successful response through, otherwise `HTTP <code>: <body>`
///
/// # Errors
///
/// Returns the status line and body text of a non-success response
pub async fn check_status(
    response: reqwest::Response,
) -> std::result::Result<reqwest::Response, String> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(format!("HTTP {}: {}", status.as_u16(), body.trim()))
}

/// Short user-facing text for a failed network call
#[must_use]
pub fn describe_failure(error: &Error) -> String {
    match error {
        Error::Http(e) if e.is_timeout() => "(request timed out)".to_string(),
        Error::Http(e) if e.is_connect() => "(no network connection)".to_string(),
        other => other.to_string(),
    }
}
