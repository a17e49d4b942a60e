//! Remote retrieval of containers and certificates.
//!
//! Provides a trait-based abstraction over HTTPS retrieval so that the
//! loader can be exercised without network access. The production
//! implementation uses a shared `ureq` agent and never contacts a server
//! over plaintext.

use crate::filesystem::FileSystem;
use crate::location::Location;
use std::time::Duration;
use url::Url;

/// Default network timeout for a single fetch.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on the size of a fetched body.
const MAX_BODY_BYTES: u64 = 64 * 1024 * 1024;

/// The only scheme the transport will speak.
pub const SECURE_SCHEME: &str = "https";

/// Trait for retrieving the raw bytes behind a resolved URL.
///
/// Retries, TLS configuration, and redirect handling are the
/// implementation's concern; callers treat a single call as final.
#[cfg_attr(test, mockall::automock)]
pub trait Transport: Send + Sync {
    /// Fetch the body served at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] when the request fails, the resource is
    /// missing, or the URL does not use the secure scheme.
    fn fetch(&self, url: &Url) -> Result<Vec<u8>, FetchError>;
}

/// Errors arising while reaching a container or certificate.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// HTTP request failed.
    #[error("fetch failed for {url}: {reason}")]
    Http {
        /// The URL that was requested.
        url: String,
        /// A human-readable description of the failure.
        reason: String,
    },

    /// The requested resource was not found (HTTP 404).
    #[error("resource not found: {url}")]
    NotFound {
        /// The URL that returned 404.
        url: String,
    },

    /// The URL was not an `https` URL and was refused without contact.
    #[error("refusing to fetch {url} over an insecure scheme")]
    InsecureScheme {
        /// The refused URL.
        url: String,
    },

    /// Reading a local file failed.
    #[error("failed to read {path}: {source}")]
    Io {
        /// The path that could not be read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// HTTPS transport backed by `ureq`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    agent: ureq::Agent,
}

impl HttpTransport {
    /// Build a transport whose requests time out after `timeout`.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .https_only(true)
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl Transport for HttpTransport {
    fn fetch(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        if url.scheme() != SECURE_SCHEME {
            return Err(FetchError::InsecureScheme {
                url: url.to_string(),
            });
        }
        log::info!("fetching {url}");
        let response = self
            .agent
            .get(url.as_str())
            .call()
            .map_err(|e| map_ureq_error(url.as_str(), &e))?;
        response
            .into_body()
            .with_config()
            .limit(MAX_BODY_BYTES)
            .read_to_vec()
            .map_err(|e| FetchError::Http {
                url: url.to_string(),
                reason: e.to_string(),
            })
    }
}

/// Read the bytes behind a resolved location.
///
/// Remote locations go through `transport`; local paths are read from `fs`
/// on every call.
///
/// # Errors
///
/// Propagates the [`FetchError`] of whichever source was consulted.
pub fn fetch_location(
    location: &Location,
    transport: &dyn Transport,
    fs: &dyn FileSystem,
) -> Result<Vec<u8>, FetchError> {
    match location {
        Location::Local(path) => fs.read(path),
        Location::Remote(url) => transport.fetch(url),
    }
}

/// Map a ureq error to a [`FetchError`].
fn map_ureq_error(url: &str, err: &ureq::Error) -> FetchError {
    match err {
        ureq::Error::StatusCode(404) => FetchError::NotFound {
            url: url.to_owned(),
        },
        other => FetchError::Http {
            url: url.to_owned(),
            reason: other.to_string(),
        },
    }
}
