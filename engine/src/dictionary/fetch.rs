use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::dictionary::{DictionarySet, load_text};
use crate::error::DictionaryLoadError;

/// Retrieves remote dictionary bytes. Implementations own timeouts and
/// retries; the engine calls `fetch` exactly once per URL.
pub trait Fetch {
    fn fetch(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, FetchError>;
}

#[derive(Debug, Error)]
#[error("{message}")]
pub struct FetchError {
    pub message: String,
}

impl FetchError {
    pub fn new(message: impl Into<String>) -> Self {
        FetchError {
            message: message.into(),
        }
    }
}

/// Fetch a dictionary with `fetcher` and load it. The URL names the source.
pub fn load_from_url(
    fetcher: &dyn Fetch,
    url: &str,
    timeout: Duration,
) -> Result<DictionarySet, DictionaryLoadError> {
    debug!(url, ?timeout, "Fetching dictionary");
    let bytes = fetcher
        .fetch(url, timeout)
        .map_err(|e| DictionaryLoadError::Fetch {
            url: url.to_string(),
            message: e.message,
        })?;
    let text = String::from_utf8(bytes).map_err(|e| DictionaryLoadError::Unreadable {
        source_name: url.to_string(),
        message: format!("not UTF-8: {}", e),
    })?;
    load_text(url, &text)
}
