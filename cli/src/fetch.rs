use std::thread;
use std::time::Duration;

use cif_engine::{Fetch, FetchError};
use tracing::{debug, warn};

const ATTEMPTS: u32 = 3;
const BACKOFF: Duration = Duration::from_millis(500);

/// Blocking HTTP(S) fetcher for remote dictionaries.
pub struct HttpFetch;

impl HttpFetch {
    fn attempt(url: &str, timeout: Duration) -> Result<Vec<u8>, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        let response = client.get(url).send()?.error_for_status()?;
        Ok(response.bytes()?.to_vec())
    }
}

impl Fetch for HttpFetch {
    fn fetch(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, FetchError> {
        let mut last_error = None;
        for attempt in 1..=ATTEMPTS {
            match Self::attempt(url, timeout) {
                Ok(bytes) => {
                    debug!(url, attempt, bytes = bytes.len(), "Fetched dictionary");
                    return Ok(bytes);
                }
                Err(error) => {
                    warn!(url, attempt, %error, "Dictionary fetch failed");
                    last_error = Some(error);
                    if attempt < ATTEMPTS {
                        thread::sleep(BACKOFF);
                    }
                }
            }
        }
        Err(FetchError::new(match last_error {
            Some(error) => format!("{} (after {} attempts)", error, ATTEMPTS),
            None => "no attempt was made".to_string(),
        }))
    }
}

pub fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}
