//! Page fetching: URL normalization plus an HTTP client with a browser-like
//! request profile, hard timeout, redirect following, and retry policy.

use std::time::Duration;

use percent_encoding::percent_decode_str;
use reqwest::Url;

use brickdeal_core::{Retailer, ScrapeConfig};

use crate::error::ScrapeError;
use crate::retry::retry_with_backoff;

/// Validates and normalizes a stored source URL before fetching.
///
/// Only http/https URLs are accepted. LEGO-channel URLs seeded from the
/// Rakuten affiliate feed arrive as LinkShare click-trackers; those are
/// unwrapped to the merchant URL in the `murl` query parameter so the fetch
/// hits lego.com directly.
///
/// # Errors
///
/// Returns [`ScrapeError::InvalidUrl`] for empty, unparseable, or
/// non-http(s) input.
pub fn normalize_source_url(raw: &str, retailer: Retailer) -> Result<String, ScrapeError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ScrapeError::InvalidUrl {
            url: raw.to_owned(),
            reason: "missing source URL".to_owned(),
        });
    }

    let url = Url::parse(trimmed).map_err(|e| ScrapeError::InvalidUrl {
        url: trimmed.to_owned(),
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ScrapeError::InvalidUrl {
                url: trimmed.to_owned(),
                reason: format!("unsupported URL scheme: {other}"),
            })
        }
    }

    if retailer == Retailer::Lego && url.host_str().is_some_and(|h| h.contains("linksynergy.com")) {
        if let Some((_, murl)) = url.query_pairs().find(|(key, _)| key == "murl") {
            let decoded = percent_decode_str(&murl).decode_utf8_lossy().into_owned();
            if !decoded.is_empty() {
                return Ok(decoded);
            }
        }
    }

    Ok(url.to_string())
}

/// HTTP client for retailer product pages.
pub struct PageClient {
    client: reqwest::Client,
    max_retries: u32,
    backoff_base_secs: u64,
}

impl PageClient {
    /// Builds a client with the configured timeout, user agent, and retry
    /// policy. Redirects are followed (reqwest's default policy).
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Http`] if the underlying client cannot be
    /// constructed.
    pub fn new(config: &ScrapeConfig) -> Result<Self, ScrapeError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            client,
            max_retries: config.max_retries,
            backoff_base_secs: config.backoff_base_secs,
        })
    }

    /// Shares the inner reqwest client (e.g. for the catalog lookup).
    #[must_use]
    pub fn http(&self) -> reqwest::Client {
        self.client.clone()
    }

    /// Fetches a page body as text. Non-2xx responses are errors; transient
    /// ones (429/5xx, network failures) are retried per the configured
    /// policy before surfacing.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::UnexpectedStatus`] for non-2xx responses and
    /// [`ScrapeError::Http`] for network-level failures.
    pub async fn fetch_html(&self, url: &str) -> Result<String, ScrapeError> {
        retry_with_backoff(self.max_retries, self.backoff_base_secs, || async {
            let response = self
                .client
                .get(url)
                .header(
                    reqwest::header::ACCEPT,
                    "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
                )
                .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
                .header(reqwest::header::CACHE_CONTROL, "no-cache")
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                return Err(ScrapeError::UnexpectedStatus {
                    status: status.as_u16(),
                    url: url.to_owned(),
                });
            }

            Ok(response.text().await?)
        })
        .await
    }
}
