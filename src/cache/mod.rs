//! Private caches for fetched certificates and remote containers.
//!
//! Two independent stores back the loader: certificates keyed by package
//! name and downloaded containers keyed by source URL. Neither store
//! expires entries; they are cleared only through [`PrivateCaches::wipe`].
//! Both stores are injectable objects owned by the loader factory.

pub mod certificate;
pub mod container;
pub mod disk;
pub mod memory;

use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

pub use certificate::CertificateCache;
pub use container::ContainerCache;
pub use disk::DiskStore;
pub use memory::MemoryStore;

use crate::dirs::BaseDirs;

/// Subdirectory of the cache root holding certificates.
pub const CERTIFICATE_DIR: &str = "certificates";

/// Subdirectory of the cache root holding containers.
pub const CONTAINER_DIR: &str = "containers";

/// Errors arising from cache storage.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Reading or writing a cache file failed.
    #[error("cache I/O failed at {path}: {source}")]
    Io {
        /// The path being accessed.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A cache metadata record is unreadable.
    #[error("corrupt cache metadata at {path}: {reason}")]
    Metadata {
        /// The metadata file.
        path: Utf8PathBuf,
        /// Description of the failure.
        reason: String,
    },

    /// A writer panicked while holding the store lock.
    #[error("cache lock poisoned")]
    Poisoned,

    /// No cache directory could be determined.
    #[error("could not determine a cache directory; set TRUSTLOAD_CACHE_DIR")]
    NoCacheDirectory,

    /// The cache directory is not valid UTF-8.
    #[error("cache directory is not valid UTF-8: {path}")]
    NonUtf8Directory {
        /// Lossy rendering of the offending path.
        path: String,
    },
}

/// A cached payload with its provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    payload: Vec<u8>,
    acquired_at: SystemTime,
    source: String,
}

impl CacheEntry {
    /// Record `payload` fetched from `source` now.
    #[must_use]
    pub fn new(payload: Vec<u8>, source: impl Into<String>) -> Self {
        Self::acquired(payload, source, SystemTime::now())
    }

    /// Record `payload` fetched from `source` at `acquired_at`.
    #[must_use]
    pub fn acquired(payload: Vec<u8>, source: impl Into<String>, acquired_at: SystemTime) -> Self {
        Self {
            payload,
            acquired_at,
            source: source.into(),
        }
    }

    /// Return the cached bytes.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Consume the entry, returning the cached bytes.
    #[must_use]
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Return when the payload was acquired.
    #[must_use]
    pub fn acquired_at(&self) -> SystemTime {
        self.acquired_at
    }

    /// Return where the payload was acquired from.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }
}

/// Key/value storage behind a cache.
///
/// Implementations must tolerate concurrent readers and writers. Writes to
/// the same key are last-writer-wins, and [`CacheStore::clear`] must never
/// expose a partially cleared store to readers.
pub trait CacheStore: Send + Sync + fmt::Debug {
    /// Look up the entry stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the store cannot be read.
    fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError>;

    /// Store `entry` under `key`, replacing any previous entry.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the entry cannot be written.
    fn put(&self, key: &str, entry: CacheEntry) -> Result<(), CacheError>;

    /// Remove every entry.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the store cannot be cleared.
    fn clear(&self) -> Result<(), CacheError>;

    /// Count the stored entries.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the store cannot be read.
    fn len(&self) -> Result<usize, CacheError>;
}

/// The certificate and container caches owned by a loader.
#[derive(Debug, Clone)]
pub struct PrivateCaches {
    certificates: Arc<CertificateCache>,
    containers: Arc<ContainerCache>,
}

impl PrivateCaches {
    /// Combine two caches.
    #[must_use]
    pub fn new(certificates: CertificateCache, containers: ContainerCache) -> Self {
        Self {
            certificates: Arc::new(certificates),
            containers: Arc::new(containers),
        }
    }

    /// Create caches that live only as long as this value.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(
            CertificateCache::new(Box::new(MemoryStore::default())),
            ContainerCache::new(Box::new(MemoryStore::default())),
        )
    }

    /// Create on-disk caches below `root`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] if the cache directories cannot be
    /// created.
    pub fn persistent(root: &Utf8Path) -> Result<Self, CacheError> {
        Ok(Self::new(
            CertificateCache::new(Box::new(DiskStore::open(&root.join(CERTIFICATE_DIR))?)),
            ContainerCache::new(Box::new(DiskStore::open(&root.join(CONTAINER_DIR))?)),
        ))
    }

    /// Create on-disk caches in the platform cache directory.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if no cache directory is available or it
    /// cannot be created.
    pub fn open_default(dirs: &dyn BaseDirs) -> Result<Self, CacheError> {
        Self::persistent(&default_cache_root(dirs)?)
    }

    /// Return the certificate cache.
    #[must_use]
    pub fn certificates(&self) -> &CertificateCache {
        &self.certificates
    }

    /// Return the container cache.
    #[must_use]
    pub fn containers(&self) -> &ContainerCache {
        &self.containers
    }

    /// Clear the container cache, the certificate cache, or both.
    ///
    /// Each flag selects one store; a `false` flag leaves that store
    /// untouched. Both requested stores are attempted even if the first
    /// fails.
    ///
    /// # Errors
    ///
    /// Returns the first [`CacheError`] encountered.
    pub fn wipe(&self, containers: bool, certificates: bool) -> Result<(), CacheError> {
        let container_result = self.containers.wipe(containers);
        let certificate_result = self.certificates.wipe(certificates);
        container_result.and(certificate_result)
    }
}

/// Resolve the cache root from `dirs` as a UTF-8 path.
///
/// # Errors
///
/// Returns [`CacheError::NoCacheDirectory`] or
/// [`CacheError::NonUtf8Directory`].
pub fn default_cache_root(dirs: &dyn BaseDirs) -> Result<Utf8PathBuf, CacheError> {
    let dir = dirs.cache_dir().ok_or(CacheError::NoCacheDirectory)?;
    Utf8PathBuf::from_path_buf(dir).map_err(|path| CacheError::NonUtf8Directory {
        path: path.display().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certificate::Certificate;
    use crate::dirs::MockBaseDirs;
    use crate::location::Location;
    use crate::names::PackageName;
    use crate::signing::SigningIdentity;
    use rstest::rstest;
    use std::path::PathBuf;

    fn remote() -> Location {
        Location::Remote(url::Url::parse("https://example.org/app.jar").expect("valid URL"))
    }

    fn populated() -> (PrivateCaches, PackageName, Certificate) {
        let caches = PrivateCaches::in_memory();
        let package = PackageName::try_from("org.example").expect("valid package");
        let certificate = SigningIdentity::generate_root("CN=Dev").certificate().clone();
        caches
            .certificates()
            .put(&package, &certificate, &remote())
            .expect("put certificate");
        caches
            .containers()
            .put(&remote(), b"zip".to_vec())
            .expect("put container");
        (caches, package, certificate)
    }

    #[rstest]
    #[case::neither(false, false, true, true)]
    #[case::containers_only(true, false, false, true)]
    #[case::certificates_only(false, true, true, false)]
    #[case::both(true, true, false, false)]
    fn wipe_flags_select_stores(
        #[case] containers: bool,
        #[case] certificates: bool,
        #[case] container_survives: bool,
        #[case] certificate_survives: bool,
    ) {
        let (caches, package, _) = populated();
        caches.wipe(containers, certificates).expect("wipe");

        assert_eq!(caches.containers().get(&remote()).is_some(), container_survives);
        assert_eq!(
            caches.certificates().get(&package).is_some(),
            certificate_survives
        );
    }

    #[test]
    fn wipe_is_idempotent() {
        let (caches, package, _) = populated();
        caches.wipe(true, true).expect("first wipe");
        caches.wipe(true, true).expect("second wipe");

        assert!(caches.certificates().get(&package).is_none());
        assert_eq!(caches.containers().len().expect("len"), 0);
    }

    #[test]
    fn default_root_requires_a_directory() {
        let mut dirs = MockBaseDirs::new();
        dirs.expect_cache_dir().return_once(|| None);
        assert!(matches!(
            default_cache_root(&dirs),
            Err(CacheError::NoCacheDirectory)
        ));
    }

    #[test]
    fn open_default_creates_store_directories() {
        let temp = tempfile::tempdir().expect("temp dir");
        let root = temp.path().to_path_buf();
        let mut dirs = MockBaseDirs::new();
        dirs.expect_cache_dir()
            .return_once(move || Some(PathBuf::from(root)));

        PrivateCaches::open_default(&dirs).expect("open caches");
        assert!(temp.path().join(CERTIFICATE_DIR).is_dir());
        assert!(temp.path().join(CONTAINER_DIR).is_dir());
    }
}
