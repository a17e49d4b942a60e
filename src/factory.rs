//! Construction of secure loaders.
//!
//! The factory owns the caches and fetch seams shared by every loader it
//! builds. Raw location lists and trust maps are resolved once, here;
//! entries that fail to resolve are dropped with a warning and recorded in
//! a [`ConstructionReport`] instead of failing construction.

use std::sync::Arc;

use crate::cache::PrivateCaches;
use crate::delegate::DelegateLoader;
use crate::error::LoadError;
use crate::filesystem::{FileSystem, LocalFileSystem};
use crate::location::{ContainerLocation, LocationError, resolve, split_location_list};
use crate::loader::{LoaderServices, SecureLoader};
use crate::materialize::{ClassMaterializer, EntryMaterializer};
use crate::names::{NameError, PackageName};
use crate::transport::{HttpTransport, Transport};
use crate::trust::TrustMap;

/// A raw trust map entry: package name and optional certificate location.
pub type RawTrustEntry<'a> = (&'a str, Option<&'a str>);

/// A container location dropped during construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedLocation {
    /// The raw input.
    pub raw: String,
    /// Why it was dropped.
    pub error: LocationError,
}

/// Why a trust map entry was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrustEntryRejection {
    /// The key is not a valid package name; the entry is dropped.
    #[error("invalid package name: {0}")]
    InvalidPackage(#[source] NameError),
    /// The location is malformed; the package resolves to no trust.
    #[error("certificate location rejected: {0}")]
    MalformedLocation(#[source] LocationError),
}

/// A trust map entry rejected during construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedTrustEntry {
    /// The raw package key.
    pub package: String,
    /// Why the entry was rejected.
    pub reason: TrustEntryRejection,
}

/// Entries rejected while building a loader.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConstructionReport {
    /// Container locations that were dropped.
    pub rejected_locations: Vec<RejectedLocation>,
    /// Trust map entries that were rejected.
    pub rejected_trust_entries: Vec<RejectedTrustEntry>,
}

impl ConstructionReport {
    /// Return whether every entry was accepted.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.rejected_locations.is_empty() && self.rejected_trust_entries.is_empty()
    }
}

/// Builds [`SecureLoader`]s sharing one set of caches and fetch seams.
#[derive(Clone)]
pub struct LoaderFactory {
    services: LoaderServices,
}

impl LoaderFactory {
    /// Create a factory using HTTPS, the host filesystem, and entry
    /// materialisation.
    #[must_use]
    pub fn new(caches: PrivateCaches) -> Self {
        Self {
            services: LoaderServices {
                caches,
                transport: Arc::new(HttpTransport::default()),
                fs: Arc::new(LocalFileSystem),
                materializer: Arc::new(EntryMaterializer),
            },
        }
    }

    /// Replace the transport used for remote fetches.
    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.services.transport = transport;
        self
    }

    /// Replace the filesystem used for local paths.
    #[must_use]
    pub fn with_file_system(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.services.fs = fs;
        self
    }

    /// Replace the class materialiser.
    #[must_use]
    pub fn with_materializer(mut self, materializer: Arc<dyn ClassMaterializer>) -> Self {
        self.services.materializer = materializer;
        self
    }

    /// Return the caches shared by this factory's loaders.
    #[must_use]
    pub fn caches(&self) -> &PrivateCaches {
        &self.services.caches
    }

    /// Build a loader from a `:`-separated location list.
    ///
    /// An absent trust map behaves as an empty one. Rejected entries are
    /// logged; use [`Self::create_loader_with_report`] to inspect them.
    #[must_use]
    pub fn create_loader(
        &self,
        locations: &str,
        trust_map: Option<&[RawTrustEntry<'_>]>,
        parent: Arc<dyn DelegateLoader>,
    ) -> SecureLoader {
        self.create_loader_with_report(locations, trust_map, parent)
            .0
    }

    /// Build a loader and report every rejected entry.
    #[must_use]
    pub fn create_loader_with_report(
        &self,
        locations: &str,
        trust_map: Option<&[RawTrustEntry<'_>]>,
        parent: Arc<dyn DelegateLoader>,
    ) -> (SecureLoader, ConstructionReport) {
        let mut report = ConstructionReport::default();
        let locations = self.resolve_locations(&split_location_list(locations), &mut report);
        let trust_map = self.resolve_trust_map(trust_map.unwrap_or_default(), &mut report);
        let loader = SecureLoader::new(locations, trust_map, parent, self.services.clone());
        (loader, report)
    }

    fn resolve_locations(
        &self,
        raw_locations: &[String],
        report: &mut ConstructionReport,
    ) -> Vec<ContainerLocation> {
        let mut locations = Vec::with_capacity(raw_locations.len());
        for raw in raw_locations {
            match resolve(raw, self.services.fs.as_ref()) {
                Ok(location) => locations.push(location),
                Err(error) => {
                    log::warn!(
                        "dropping container location: {}",
                        LoadError::LocationMalformed(error.clone())
                    );
                    report.rejected_locations.push(RejectedLocation {
                        raw: raw.clone(),
                        error,
                    });
                }
            }
        }
        locations
    }

    fn resolve_trust_map(
        &self,
        entries: &[RawTrustEntry<'_>],
        report: &mut ConstructionReport,
    ) -> TrustMap {
        let mut trust_map = TrustMap::new();
        for (raw_package, raw_location) in entries {
            let package = match PackageName::try_from(*raw_package) {
                Ok(package) => package,
                Err(error) => {
                    log::warn!("dropping trust entry {raw_package:?}: {error}");
                    report.rejected_trust_entries.push(RejectedTrustEntry {
                        package: (*raw_package).to_owned(),
                        reason: TrustEntryRejection::InvalidPackage(error),
                    });
                    continue;
                }
            };
            let Some(raw_location) = raw_location else {
                trust_map.insert_derived(package);
                continue;
            };
            match resolve(raw_location, self.services.fs.as_ref()) {
                Ok(location) => trust_map.insert_explicit(package, location),
                Err(error) => {
                    log::warn!("rejecting certificate location for {package}: {error}");
                    report.rejected_trust_entries.push(RejectedTrustEntry {
                        package: package.to_string(),
                        reason: TrustEntryRejection::MalformedLocation(error.clone()),
                    });
                    trust_map.insert_rejected(package, error);
                }
            }
        }
        trust_map
    }
}

impl std::fmt::Debug for LoaderFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoaderFactory")
            .field("caches", &self.services.caches)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delegate::NoDelegate;
    use crate::location::Location;
    use crate::test_utils::{MemoryFileSystem, RecordingTransport};
    use crate::trust::TrustEntry;
    use rstest::{fixture, rstest};

    #[fixture]
    fn factory() -> LoaderFactory {
        let fs = MemoryFileSystem::new();
        fs.insert("/sdcard/testApp.apk", b"zip".to_vec());
        LoaderFactory::new(PrivateCaches::in_memory())
            .with_transport(Arc::new(RecordingTransport::new()))
            .with_file_system(Arc::new(fs))
    }

    fn package(name: &str) -> PackageName {
        PackageName::try_from(name).expect("valid package")
    }

    #[rstest]
    fn mixed_location_list_drops_unresolvable_entries(factory: LoaderFactory) {
        let (loader, report) = factory.create_loader_with_report(
            "/sdcard/testApp.apk:/sdcard/missing.apk:http://jdbc.postgresql.org/pg.jar:Download/rel.apk",
            None,
            Arc::new(NoDelegate),
        );

        assert_eq!(loader.locations().len(), 2);
        assert!(matches!(loader.locations()[0], Location::Local(_)));
        assert_eq!(
            loader.locations()[1].to_string(),
            "https://jdbc.postgresql.org/pg.jar"
        );
        let rejected: Vec<&str> = report
            .rejected_locations
            .iter()
            .map(|rejection| rejection.raw.as_str())
            .collect();
        assert_eq!(rejected, ["/sdcard/missing.apk", "Download/rel.apk"]);
    }

    #[rstest]
    fn absent_trust_map_is_empty(factory: LoaderFactory) {
        let (loader, report) =
            factory.create_loader_with_report("/sdcard/testApp.apk", None, Arc::new(NoDelegate));
        assert!(loader.trust_map().is_empty());
        assert!(report.is_clean());
    }

    #[rstest]
    fn trust_entries_are_classified(factory: LoaderFactory) {
        let entries = [
            ("it.polimi.example", Some("http://google.com/test_cert.pem")),
            ("it.polimi.example2", Some("htt://google.com/test_cert2.pem")),
            ("it.polimi.example3", None),
            ("not a package", None),
        ];
        let (loader, report) = factory.create_loader_with_report(
            "/sdcard/testApp.apk",
            Some(&entries[..]),
            Arc::new(NoDelegate),
        );

        let map = loader.trust_map();
        assert!(matches!(
            map.get(&package("it.polimi.example")),
            Some(TrustEntry::Explicit(Location::Remote(url))) if url.scheme() == "https"
        ));
        assert!(matches!(
            map.get(&package("it.polimi.example2")),
            Some(TrustEntry::Rejected(LocationError::Malformed { .. }))
        ));
        assert_eq!(
            map.get(&package("it.polimi.example3")),
            Some(&TrustEntry::Derive)
        );
        assert_eq!(map.len(), 3);
        assert_eq!(report.rejected_trust_entries.len(), 2);
    }

    #[rstest]
    fn duplicate_trust_keys_keep_the_last_entry(factory: LoaderFactory) {
        let entries = [
            ("it.polimi.example", Some("https://one.example.org/cert.pem")),
            ("it.polimi.example", None),
        ];
        let loader =
            factory.create_loader("/sdcard/testApp.apk", Some(&entries[..]), Arc::new(NoDelegate));
        assert_eq!(
            loader.trust_map().get(&package("it.polimi.example")),
            Some(&TrustEntry::Derive)
        );
    }

    #[rstest]
    fn loaders_from_one_factory_share_caches(factory: LoaderFactory) {
        let first = factory.create_loader("/sdcard/testApp.apk", None, Arc::new(NoDelegate));
        let second = factory.create_loader("/sdcard/testApp.apk", None, Arc::new(NoDelegate));
        let location =
            Location::Remote(url::Url::parse("https://example.org/a.jar").expect("valid URL"));
        first
            .caches()
            .containers()
            .put(&location, b"zip".to_vec())
            .expect("put");

        assert!(second.caches().containers().get(&location).is_some());
        second.wipe_cache(true, true).expect("wipe");
        assert!(first.caches().containers().get(&location).is_none());
    }
}
