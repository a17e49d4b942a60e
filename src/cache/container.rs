//! Container cache keyed by source URL.

use super::{CacheEntry, CacheError, CacheStore};
use crate::location::{ContainerLocation, Location};

/// Bytes of previously downloaded remote containers.
///
/// Local containers are never stored: they are re-read on each load so
/// that edits on disk are always observed.
#[derive(Debug)]
pub struct ContainerCache {
    store: Box<dyn CacheStore>,
}

impl ContainerCache {
    /// Wrap a store.
    #[must_use]
    pub fn new(store: Box<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// Return the cached bytes for `location`, if any.
    #[must_use]
    pub fn get(&self, location: &ContainerLocation) -> Option<Vec<u8>> {
        if !location.is_remote() {
            return None;
        }
        match self.store.get(&location.cache_key()) {
            Ok(entry) => entry.map(CacheEntry::into_payload),
            Err(e) => {
                log::warn!("container cache read failed for {location}: {e}");
                None
            }
        }
    }

    /// Store `bytes` downloaded from `location`.
    ///
    /// A local location is accepted and ignored.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the store rejects the write.
    pub fn put(&self, location: &ContainerLocation, bytes: Vec<u8>) -> Result<(), CacheError> {
        match location {
            Location::Local(_) => Ok(()),
            Location::Remote(_) => {
                let key = location.cache_key();
                self.store.put(&key, CacheEntry::new(bytes, key.clone()))
            }
        }
    }

    /// Clear every cached container when `include` is set.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the store cannot be cleared.
    pub fn wipe(&self, include: bool) -> Result<(), CacheError> {
        if !include {
            return Ok(());
        }
        log::debug!("wiping container cache");
        self.store.clear()
    }

    /// Count the cached containers.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the store cannot be read.
    pub fn len(&self) -> Result<usize, CacheError> {
        self.store.len()
    }
}
