use grocery_core::{StoreId, UnknownStore};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScraperError {
    /// Navigation or network failure for a whole source run or page.
    #[error("{store} unavailable: {reason}")]
    SourceUnavailable { store: StoreId, reason: String },

    /// An expected field was absent for a single item.
    #[error("extraction mismatch: missing {field}")]
    ExtractionMismatch { field: &'static str },

    #[error(transparent)]
    UnsupportedStore(#[from] UnknownStore),

    /// Anti-automation interstitial did not clear within the bounded wait.
    #[error("{store} interstitial not cleared after {waited_secs}s")]
    ChallengeTimeout { store: StoreId, waited_secs: u64 },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("rate limited by {domain} (retry after {retry_after_secs}s)")]
    RateLimited {
        domain: String,
        retry_after_secs: u64,
    },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    /// WebDriver command failure.
    #[error("browser error during {command}: {message}")]
    Browser { command: String, message: String },

    #[error("catalog error for {path}: {reason}")]
    Catalog { path: String, reason: String },
}

impl ScraperError {
    pub(crate) fn unavailable(store: StoreId, reason: impl Into<String>) -> Self {
        ScraperError::SourceUnavailable {
            store,
            reason: reason.into(),
        }
    }

    /// Errors the caller must see before any fetch begins; everything else is
    /// contained at the adapter boundary.
    #[must_use]
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            ScraperError::UnsupportedStore(_) | ScraperError::InvalidRequest(_)
        )
    }
}
