//! Loader settings read from TOML.
//!
//! A settings file names the container locations to search, the certificate
//! location trusted for each package, and how caching and transport behave:
//!
//! ```toml
//! locations = ["/srv/apps/app.jar", "https://repo.example.org/lib.jar"]
//! derive_trust = ["org.example.lib"]
//!
//! [trust]
//! "org.example.app" = "https://certs.example.org/app.pem"
//!
//! [cache]
//! persistent = true
//!
//! [transport]
//! timeout_secs = 10
//! ```
//!
//! Omitted sections fall back to their defaults; unknown keys are errors.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use thiserror::Error;

use crate::cache::{CacheError, PrivateCaches, default_cache_root};
use crate::dirs::BaseDirs;
use crate::factory::LoaderFactory;
use crate::location::LOCATION_LIST_SEPARATOR;
use crate::transport::{DEFAULT_TIMEOUT, HttpTransport};

/// Errors arising from loading settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file could not be read.
    #[error("failed to read settings {path}: {source}")]
    Read {
        /// The settings path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The settings file is not valid TOML for [`LoaderSettings`].
    #[error("invalid settings {path}: {source}")]
    Parse {
        /// The settings path.
        path: Utf8PathBuf,
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// The settings parse but hold a value that cannot be used.
    #[error("invalid settings {path}: {reason}")]
    Invalid {
        /// The settings path.
        path: Utf8PathBuf,
        /// What is wrong with the value.
        reason: String,
    },

    /// The configured caches could not be opened.
    #[error("cache unavailable: {0}")]
    Cache(#[from] CacheError),
}

/// Settings for building a loader.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LoaderSettings {
    /// Container locations, searched in order.
    pub locations: Vec<String>,
    /// Explicit certificate locations keyed by package name.
    pub trust: BTreeMap<String, String>,
    /// Packages whose certificate location is derived from the name.
    pub derive_trust: Vec<String>,
    /// Cache behaviour.
    pub cache: CacheSettings,
    /// Transport behaviour.
    pub transport: TransportSettings,
}

/// Where fetched certificates and containers are kept.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CacheSettings {
    /// Cache root; defaults to the platform cache directory.
    pub directory: Option<Utf8PathBuf>,
    /// Keep caches on disk between runs.
    pub persistent: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            directory: None,
            persistent: true,
        }
    }
}

/// Network settings for remote fetches.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct TransportSettings {
    /// Timeout for a single fetch, in seconds. Must be positive.
    #[serde(default = "TransportSettings::default_timeout_secs")]
    pub timeout_secs: u64,
}

impl TransportSettings {
    const fn default_timeout_secs() -> u64 {
        DEFAULT_TIMEOUT.as_secs()
    }

    /// Return the fetch timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            timeout_secs: Self::default_timeout_secs(),
        }
    }
}

impl LoaderSettings {
    /// Read settings from the TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] if the file cannot be read or parsed.
    pub fn load(path: &Utf8Path) -> Result<Self, SettingsError> {
        Self::load_with(path, |path| std::fs::read_to_string(path))
    }

    /// Read settings using the supplied reader.
    ///
    /// Exists so tests can supply settings text without touching disk.
    ///
    /// # Examples
    ///
    /// ```
    /// use camino::Utf8Path;
    /// use trustload::config::LoaderSettings;
    ///
    /// let settings = LoaderSettings::load_with(Utf8Path::new("inline.toml"), |_| {
    ///     Ok(String::from("locations = [\"/srv/app.jar\"]\n"))
    /// })
    /// .unwrap();
    /// assert_eq!(settings.locations, ["/srv/app.jar"]);
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] if the reader fails, the text is not
    /// valid settings, or `timeout_secs` is zero.
    pub fn load_with<F>(path: &Utf8Path, reader: F) -> Result<Self, SettingsError>
    where
        F: FnOnce(&Utf8Path) -> std::io::Result<String>,
    {
        let text = reader(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Self = toml::from_str(&text).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        if settings.transport.timeout_secs == 0 {
            return Err(SettingsError::Invalid {
                path: path.to_path_buf(),
                reason: String::from("transport.timeout_secs must be greater than zero"),
            });
        }
        Ok(settings)
    }

    /// Join the configured locations into a location list.
    #[must_use]
    pub fn location_list(&self) -> String {
        let separator = LOCATION_LIST_SEPARATOR.to_string();
        self.locations.join(separator.as_str())
    }

    /// Return the trust entries, explicit locations first.
    ///
    /// A package listed both in `[trust]` and `derive_trust` ends up
    /// derived, because later entries replace earlier ones.
    #[must_use]
    pub fn trust_entries(&self) -> Vec<(&str, Option<&str>)> {
        self.trust
            .iter()
            .map(|(package, location)| (package.as_str(), Some(location.as_str())))
            .chain(
                self.derive_trust
                    .iter()
                    .map(|package| (package.as_str(), None)),
            )
            .collect()
    }

    /// Open the configured caches.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if a persistent cache cannot be opened.
    pub fn open_caches(&self, dirs: &dyn BaseDirs) -> Result<PrivateCaches, CacheError> {
        if !self.cache.persistent {
            return Ok(PrivateCaches::in_memory());
        }
        match &self.cache.directory {
            Some(directory) => PrivateCaches::persistent(directory),
            None => PrivateCaches::persistent(&default_cache_root(dirs)?),
        }
    }

    /// Build a loader factory with the configured caches and transport.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Cache`] if the caches cannot be opened.
    pub fn build_factory(&self, dirs: &dyn BaseDirs) -> Result<LoaderFactory, SettingsError> {
        let caches = self.open_caches(dirs)?;
        Ok(LoaderFactory::new(caches)
            .with_transport(Arc::new(HttpTransport::new(self.transport.timeout()))))
    }
}
