use brickdeal_core::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Malformed or unsupported source URL; surfaced before any fetch.
    #[error("invalid source URL \"{url}\": {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    /// Persistence failures propagate to the caller; they are never
    /// swallowed into a `None` price.
    #[error(transparent)]
    Store(#[from] StoreError),
}
