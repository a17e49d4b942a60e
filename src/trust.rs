//! Trust maps and certificate resolution.
//!
//! A [`TrustMap`] tells the loader which certificate vouches for each
//! package. Resolution picks the certificate location (explicit, or
//! derived from the package name), consults the certificate cache, and
//! only then fetches. A freshly fetched certificate is cached before it is
//! returned.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::cache::CertificateCache;
use crate::certificate::{Certificate, CertificateError};
use crate::filesystem::FileSystem;
use crate::location::{
    CertificateLocation, LocationError, derive_default_certificate_location,
};
use crate::names::PackageName;
use crate::transport::{FetchError, Transport, fetch_location};

/// How a package's certificate is located.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustEntry {
    /// Fetch the certificate from this location.
    Explicit(CertificateLocation),
    /// The package is listed without a location; derive it from the name.
    Derive,
    /// A location was supplied but failed to resolve.
    Rejected(LocationError),
}

/// Package-to-certificate trust assignments, fixed once a loader is built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustMap {
    entries: BTreeMap<PackageName, TrustEntry>,
}

impl TrustMap {
    /// Create an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign `entry` to `package`, returning any entry it replaces.
    pub fn insert(&mut self, package: PackageName, entry: TrustEntry) -> Option<TrustEntry> {
        self.entries.insert(package, entry)
    }

    /// Trust the certificate at `location` for `package`.
    pub fn insert_explicit(&mut self, package: PackageName, location: CertificateLocation) {
        self.insert(package, TrustEntry::Explicit(location));
    }

    /// Trust the derived default certificate for `package`.
    pub fn insert_derived(&mut self, package: PackageName) {
        self.insert(package, TrustEntry::Derive);
    }

    /// Record that the location supplied for `package` was rejected.
    pub fn insert_rejected(&mut self, package: PackageName, error: LocationError) {
        self.insert(package, TrustEntry::Rejected(error));
    }

    /// Return the entry for `package`.
    #[must_use]
    pub fn get(&self, package: &PackageName) -> Option<&TrustEntry> {
        self.entries.get(package)
    }

    /// Iterate over the entries in package order.
    pub fn iter(&self) -> impl Iterator<Item = (&PackageName, &TrustEntry)> {
        self.entries.iter()
    }

    /// Return the number of packages listed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Return whether no packages are listed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Why no trusted certificate could be produced.
#[derive(Debug, Error)]
pub enum TrustFailure {
    /// The configured certificate location was malformed.
    #[error("certificate location rejected: {0}")]
    MalformedLocation(#[source] LocationError),

    /// The certificate could not be fetched.
    #[error("certificate fetch failed: {0}")]
    Fetch(#[source] FetchError),

    /// The fetched bytes are not a usable certificate.
    #[error("certificate unusable: {0}")]
    Certificate(#[source] CertificateError),
}

/// No trusted certificate is available for a package.
#[derive(Debug, Error)]
#[error("no trust available for {package}: {cause}")]
pub struct NoTrustAvailable {
    package: PackageName,
    #[source]
    cause: TrustFailure,
}

impl NoTrustAvailable {
    fn new(package: &PackageName, cause: TrustFailure) -> Self {
        Self {
            package: package.clone(),
            cause,
        }
    }

    /// Return the package that lacks trust.
    #[must_use]
    pub fn package(&self) -> &PackageName {
        &self.package
    }

    /// Return the underlying failure.
    #[must_use]
    pub fn cause(&self) -> &TrustFailure {
        &self.cause
    }
}

/// Determine where the certificate for `package` lives.
///
/// Explicit entries win; a [`TrustEntry::Derive`] entry and a missing key
/// both yield the derived default location.
///
/// # Errors
///
/// Returns [`NoTrustAvailable`] for rejected entries or when the derived
/// location is not a valid URL.
pub fn certificate_location(
    package: &PackageName,
    trust_map: &TrustMap,
) -> Result<CertificateLocation, NoTrustAvailable> {
    match trust_map.get(package) {
        Some(TrustEntry::Explicit(location)) => Ok(location.clone()),
        Some(TrustEntry::Rejected(error)) => Err(NoTrustAvailable::new(
            package,
            TrustFailure::MalformedLocation(error.clone()),
        )),
        Some(TrustEntry::Derive) | None => derive_default_certificate_location(package)
            .map_err(|e| NoTrustAvailable::new(package, TrustFailure::MalformedLocation(e))),
    }
}

/// Resolves trusted certificates through a cache and the fetch seams.
#[derive(Clone, Copy)]
pub struct TrustResolver<'a> {
    transport: &'a dyn Transport,
    fs: &'a dyn FileSystem,
    cache: &'a CertificateCache,
}

impl<'a> TrustResolver<'a> {
    /// Build a resolver over the given collaborators.
    #[must_use]
    pub fn new(
        transport: &'a dyn Transport,
        fs: &'a dyn FileSystem,
        cache: &'a CertificateCache,
    ) -> Self {
        Self {
            transport,
            fs,
            cache,
        }
    }

    /// Produce the trusted certificate for `package`.
    ///
    /// # Errors
    ///
    /// Returns [`NoTrustAvailable`] when the location is rejected, the
    /// fetch fails, or the fetched bytes do not parse as a certificate.
    pub fn resolve_trust(
        &self,
        package: &PackageName,
        trust_map: &TrustMap,
    ) -> Result<Certificate, NoTrustAvailable> {
        let location = certificate_location(package, trust_map)?;
        if let Some(certificate) = self.cache.get(package) {
            log::debug!("certificate cache hit for {package}");
            return Ok(certificate);
        }

        let bytes = fetch_location(&location, self.transport, self.fs)
            .map_err(|e| NoTrustAvailable::new(package, TrustFailure::Fetch(e)))?;
        let certificate = Certificate::from_pem(&bytes)
            .map_err(|e| NoTrustAvailable::new(package, TrustFailure::Certificate(e)))?;

        if let Err(e) = self.cache.put(package, &certificate, &location) {
            log::warn!("could not cache certificate for {package}: {e}");
        }
        log::debug!(
            "trusting {} ({}) for {package}",
            certificate.subject(),
            certificate.fingerprint()
        );
        Ok(certificate)
    }
}

impl std::fmt::Debug for TrustResolver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrustResolver")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use crate::filesystem::LocalFileSystem;
    use crate::location::{Location, resolve};
    use crate::signing::SigningIdentity;
    use crate::test_utils::{MemoryFileSystem, RecordingTransport};
    use crate::transport::MockTransport;
    use camino::Utf8PathBuf;
    use rstest::{fixture, rstest};

    const DERIVED_URL: &str = "https://example3.polimi.it/certificate.pem";

    fn package() -> PackageName {
        PackageName::try_from("it.polimi.example3").expect("valid package")
    }

    #[fixture]
    fn cache() -> CertificateCache {
        CertificateCache::new(Box::new(MemoryStore::default()))
    }

    #[rstest]
    #[case::missing_key(None)]
    #[case::derive_entry(Some(TrustEntry::Derive))]
    fn missing_and_derive_entries_share_location(#[case] entry: Option<TrustEntry>) {
        let mut map = TrustMap::new();
        if let Some(entry) = entry {
            map.insert(package(), entry);
        }
        let location = certificate_location(&package(), &map).expect("derived location");
        assert_eq!(location.to_string(), DERIVED_URL);
    }

    #[test]
    fn rejected_entry_yields_no_trust() {
        let mut map = TrustMap::new();
        let error = resolve("htt://google.com/test_cert2.pem", &LocalFileSystem)
            .expect_err("malformed location");
        map.insert_rejected(package(), error);

        let err = certificate_location(&package(), &map).expect_err("no trust");
        assert!(matches!(err.cause(), TrustFailure::MalformedLocation(_)));
    }

    #[test]
    fn last_write_wins() {
        let mut map = TrustMap::new();
        map.insert_derived(package());
        let location = Location::Local(Utf8PathBuf::from("/certs/dev.pem"));
        map.insert_explicit(package(), location.clone());

        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&package()), Some(&TrustEntry::Explicit(location)));
    }

    #[rstest]
    fn fetched_certificate_is_cached(cache: CertificateCache) {
        let identity = SigningIdentity::generate_root("CN=Dev");
        let transport = RecordingTransport::new();
        transport.serve(DERIVED_URL, identity.certificate().to_pem());
        let fs = MemoryFileSystem::new();
        let resolver = TrustResolver::new(&transport, &fs, &cache);

        let first = resolver
            .resolve_trust(&package(), &TrustMap::new())
            .expect("trust resolves");
        let second = resolver
            .resolve_trust(&package(), &TrustMap::new())
            .expect("trust resolves from cache");

        assert!(first.same_identity(identity.certificate()));
        assert!(second.same_identity(identity.certificate()));
        assert_eq!(transport.requests_for(DERIVED_URL), 1);
    }

    #[rstest]
    fn local_certificate_is_read_from_filesystem(cache: CertificateCache) {
        let identity = SigningIdentity::generate_root("CN=Dev");
        let fs = MemoryFileSystem::new();
        fs.insert("/certs/dev.pem", identity.certificate().to_pem());
        let mut transport = MockTransport::new();
        transport.expect_fetch().never();
        let mut map = TrustMap::new();
        map.insert_explicit(
            package(),
            Location::Local(Utf8PathBuf::from("/certs/dev.pem")),
        );

        let resolver = TrustResolver::new(&transport, &fs, &cache);
        let certificate = resolver
            .resolve_trust(&package(), &map)
            .expect("trust resolves");
        assert!(certificate.same_identity(identity.certificate()));
    }

    #[rstest]
    fn not_found_is_no_trust(cache: CertificateCache) {
        let mut transport = MockTransport::new();
        transport.expect_fetch().times(1).returning(|url| {
            Err(FetchError::NotFound {
                url: url.to_string(),
            })
        });
        let fs = MemoryFileSystem::new();
        let resolver = TrustResolver::new(&transport, &fs, &cache);

        let err = resolver
            .resolve_trust(&package(), &TrustMap::new())
            .expect_err("no trust");
        assert!(matches!(err.cause(), TrustFailure::Fetch(FetchError::NotFound { .. })));
        assert_eq!(cache.len().expect("len"), 0);
    }

    #[rstest]
    #[case::empty_body(Vec::new())]
    #[case::html_page(b"<html>404</html>".to_vec())]
    fn unusable_body_is_no_trust(cache: CertificateCache, #[case] body: Vec<u8>) {
        let mut transport = MockTransport::new();
        transport
            .expect_fetch()
            .times(1)
            .returning(move |_| Ok(body.clone()));
        let fs = MemoryFileSystem::new();
        let resolver = TrustResolver::new(&transport, &fs, &cache);

        let err = resolver
            .resolve_trust(&package(), &TrustMap::new())
            .expect_err("no trust");
        assert!(matches!(err.cause(), TrustFailure::Certificate(_)));
    }
}
