//! Certificate cache keyed by package name.

use super::{CacheEntry, CacheError, CacheStore};
use crate::certificate::Certificate;
use crate::location::CertificateLocation;
use crate::names::PackageName;

/// Trusted certificates previously fetched for each package.
///
/// Lookups never fetch. A stored payload that no longer parses, or a store
/// that cannot be read, is reported as a miss and logged.
#[derive(Debug)]
pub struct CertificateCache {
    store: Box<dyn CacheStore>,
}

impl CertificateCache {
    /// Wrap a store.
    #[must_use]
    pub fn new(store: Box<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// Return the cached certificate for `package`, if any.
    #[must_use]
    pub fn get(&self, package: &PackageName) -> Option<Certificate> {
        let entry = match self.store.get(package.as_str()) {
            Ok(entry) => entry?,
            Err(e) => {
                log::warn!("certificate cache read failed for {package}: {e}");
                return None;
            }
        };
        match Certificate::from_pem(entry.payload()) {
            Ok(certificate) => Some(certificate),
            Err(e) => {
                log::warn!(
                    "ignoring unreadable cached certificate for {package} from {}: {e}",
                    entry.source()
                );
                None
            }
        }
    }

    /// Store `certificate` for `package`, replacing any previous entry.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the store rejects the write.
    pub fn put(
        &self,
        package: &PackageName,
        certificate: &Certificate,
        source: &CertificateLocation,
    ) -> Result<(), CacheError> {
        let entry = CacheEntry::new(certificate.to_pem().into_bytes(), source.to_string());
        self.store.put(package.as_str(), entry)
    }

    /// Clear every cached certificate when `include` is set.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the store cannot be cleared.
    pub fn wipe(&self, include: bool) -> Result<(), CacheError> {
        if !include {
            return Ok(());
        }
        log::debug!("wiping certificate cache");
        self.store.clear()
    }

    /// Count the cached certificates.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the store cannot be read.
    pub fn len(&self) -> Result<usize, CacheError> {
        self.store.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use crate::location::Location;
    use crate::signing::SigningIdentity;

    fn cache() -> CertificateCache {
        CertificateCache::new(Box::new(MemoryStore::default()))
    }

    fn package() -> PackageName {
        PackageName::try_from("it.polimi.example").expect("valid package")
    }

    fn source() -> Location {
        Location::Remote(
            url::Url::parse("https://example.polimi.it/certificate.pem").expect("valid URL"),
        )
    }

    #[test]
    fn round_trips_certificate_identity() {
        let cache = cache();
        let certificate = SigningIdentity::generate_root("CN=Dev").certificate().clone();
        cache
            .put(&package(), &certificate, &source())
            .expect("put certificate");

        let cached = cache.get(&package()).expect("cache hit");
        assert!(cached.same_identity(&certificate));
    }

    #[test]
    fn wipe_false_keeps_entries() {
        let cache = cache();
        let certificate = SigningIdentity::generate_root("CN=Dev").certificate().clone();
        cache
            .put(&package(), &certificate, &source())
            .expect("put certificate");

        cache.wipe(false).expect("no-op wipe");
        assert!(cache.get(&package()).is_some());
        cache.wipe(true).expect("wipe");
        assert!(cache.get(&package()).is_none());
    }

    #[test]
    fn unreadable_payload_is_a_miss() {
        let store = MemoryStore::default();
        store
            .put(
                package().as_str(),
                CacheEntry::new(b"<html>".to_vec(), "https://example.org"),
            )
            .expect("seed store");
        let cache = CertificateCache::new(Box::new(store));

        assert!(cache.get(&package()).is_none());
    }
}
