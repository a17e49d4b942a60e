//! The secure class loader.
//!
//! A [`SecureLoader`] is built once by [`crate::factory::LoaderFactory`]
//! with a fixed list of container locations and a fixed trust map. Each
//! load walks the pipeline below and fails closed:
//!
//! 1. parse the class name and find its package;
//! 2. obtain every container in declared order (remote bytes through the
//!    container cache, local bytes read afresh);
//! 3. resolve the trusted certificate for the package;
//! 4. verify each container in order and materialise the class from the
//!    first one that passes and holds a signed entry for it.
//!
//! Any failure is logged at debug level and the parent delegate is asked
//! instead. The caller only ever sees [`ClassNotFound`].

use std::sync::Arc;

use crate::cache::{CacheError, PrivateCaches};
use crate::certificate::Certificate;
use crate::container::Container;
use crate::delegate::DelegateLoader;
use crate::error::{ClassNotFound, LoadError, LoadResult};
use crate::filesystem::FileSystem;
use crate::location::ContainerLocation;
use crate::materialize::{ClassHandle, ClassMaterializer};
use crate::names::ClassName;
use crate::transport::{FetchError, Transport, fetch_location};
use crate::trust::{TrustMap, TrustResolver};
use crate::verifier::verify_container;

/// Collaborators shared by every loader a factory produces.
#[derive(Clone)]
pub(crate) struct LoaderServices {
    pub(crate) caches: PrivateCaches,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) fs: Arc<dyn FileSystem>,
    pub(crate) materializer: Arc<dyn ClassMaterializer>,
}

/// Loads classes only from containers signed by a trusted certificate.
///
/// The loader is `Send + Sync`; concurrent loads share its caches.
pub struct SecureLoader {
    locations: Vec<ContainerLocation>,
    trust_map: TrustMap,
    parent: Arc<dyn DelegateLoader>,
    services: LoaderServices,
}

impl SecureLoader {
    pub(crate) fn new(
        locations: Vec<ContainerLocation>,
        trust_map: TrustMap,
        parent: Arc<dyn DelegateLoader>,
        services: LoaderServices,
    ) -> Self {
        Self {
            locations,
            trust_map,
            parent,
            services,
        }
    }

    /// Load `name` from a verified container, falling back to the parent.
    ///
    /// # Errors
    ///
    /// Returns [`ClassNotFound`] for every failure, whether the class is
    /// missing, the package is untrusted, or verification failed.
    pub fn load_class(&self, name: &str) -> LoadResult<ClassHandle> {
        match self.try_load(name) {
            Ok(handle) => {
                log::debug!("loaded {handle}");
                Ok(handle)
            }
            Err(reason) => {
                log::debug!("secure load of {name} failed: {reason}");
                self.parent
                    .load_class(name)
                    .map_err(|_| ClassNotFound::new(name))
            }
        }
    }

    /// Clear the container cache, the certificate cache, or both.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if a requested store cannot be cleared.
    pub fn wipe_cache(&self, containers: bool, certificates: bool) -> Result<(), CacheError> {
        self.services.caches.wipe(containers, certificates)
    }

    /// Return the container locations in search order.
    #[must_use]
    pub fn locations(&self) -> &[ContainerLocation] {
        &self.locations
    }

    /// Return the trust map fixed at construction.
    #[must_use]
    pub fn trust_map(&self) -> &TrustMap {
        &self.trust_map
    }

    /// Return the caches the loader reads and populates.
    #[must_use]
    pub fn caches(&self) -> &PrivateCaches {
        &self.services.caches
    }

    fn try_load(&self, name: &str) -> Result<ClassHandle, LoadError> {
        let class = ClassName::try_from(name)?;
        let package = class.package().ok_or_else(|| LoadError::NoPackage {
            class: name.to_owned(),
        })?;

        let mut last_failure = LoadError::NoContainers;
        let mut containers = Vec::with_capacity(self.locations.len());
        for location in &self.locations {
            match self.obtain_container(location) {
                Ok(bytes) => containers.push((location, bytes)),
                Err(source) => {
                    let failure = LoadError::FetchFailed {
                        location: location.clone(),
                        source,
                    };
                    log::debug!("skipping container: {failure}");
                    last_failure = failure;
                }
            }
        }
        if containers.is_empty() {
            return Err(last_failure);
        }

        let resolver = TrustResolver::new(
            self.services.transport.as_ref(),
            self.services.fs.as_ref(),
            self.services.caches.certificates(),
        );
        let trusted = resolver.resolve_trust(&package, &self.trust_map)?;

        for (location, bytes) in containers {
            match self.load_from(&class, location, &bytes, &trusted) {
                Ok(handle) => return Ok(handle),
                Err(failure) => {
                    log::debug!("container rejected: {failure}");
                    last_failure = failure;
                }
            }
        }
        Err(last_failure)
    }

    fn load_from(
        &self,
        class: &ClassName,
        location: &ContainerLocation,
        bytes: &[u8],
        trusted: &Certificate,
    ) -> Result<ClassHandle, LoadError> {
        let container =
            Container::from_bytes(bytes).map_err(|source| LoadError::UnreadableContainer {
                location: location.clone(),
                source,
            })?;
        let verified = verify_container(container, trusted).map_err(|source| {
            LoadError::VerificationFailed {
                location: location.clone(),
                source,
            }
        })?;
        Ok(self
            .services
            .materializer
            .materialize(&verified, class, location)?)
    }

    fn obtain_container(&self, location: &ContainerLocation) -> Result<Vec<u8>, FetchError> {
        let cache = self.services.caches.containers();
        if let Some(bytes) = cache.get(location) {
            log::debug!("container cache hit for {location}");
            return Ok(bytes);
        }
        let bytes = fetch_location(
            location,
            self.services.transport.as_ref(),
            self.services.fs.as_ref(),
        )?;
        if location.is_remote() {
            if let Err(e) = cache.put(location, bytes.clone()) {
                log::warn!("could not cache container {location}: {e}");
            }
        }
        Ok(bytes)
    }
}

impl DelegateLoader for SecureLoader {
    fn load_class(&self, name: &str) -> LoadResult<ClassHandle> {
        SecureLoader::load_class(self, name)
    }
}

impl std::fmt::Debug for SecureLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureLoader")
            .field("locations", &self.locations)
            .field("trust_map", &self.trust_map)
            .finish_non_exhaustive()
    }
}
