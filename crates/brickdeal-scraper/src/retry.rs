//! Centralized retry policy for page fetches.
//!
//! Transient failures (network errors, 429, 5xx) are retried with
//! exponential backoff; everything else propagates immediately. The refresh
//! orchestrator itself never retries — this is the single place retry
//! behavior lives.

use std::future::Future;
use std::time::Duration;

use crate::error::ScrapeError;

fn is_retriable(err: &ScrapeError) -> bool {
    match err {
        ScrapeError::Http(_) => true,
        ScrapeError::UnexpectedStatus { status, .. } => *status == 429 || *status >= 500,
        ScrapeError::InvalidUrl { .. } | ScrapeError::Store(_) => false,
    }
}

/// Runs `operation` with up to `max_retries` additional attempts on
/// transient errors, sleeping `backoff_base_secs * 2^attempt` between tries.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_secs: u64,
    mut operation: F,
) -> Result<T, ScrapeError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ScrapeError>>,
{
    let mut attempt = 0u32;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= max_retries {
                    return Err(err);
                }
                let delay_secs = backoff_base_secs.saturating_mul(1u64 << attempt.min(62));
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_secs,
                    error = %err,
                    "transient fetch error, retrying after backoff"
                );
                tokio::time::sleep(Duration::from_secs(delay_secs)).await;
                attempt += 1;
            }
        }
    }
}
