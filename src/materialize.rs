//! Turning a verified container entry into a class handle.

use std::fmt;

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::location::ContainerLocation;
use crate::names::ClassName;
use crate::verifier::VerifiedContainer;

/// A class obtained from a verified container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassHandle {
    name: ClassName,
    bytes: Vec<u8>,
    origin: ContainerLocation,
}

impl ClassHandle {
    /// Create a handle for `name` backed by `bytes` from `origin`.
    #[must_use]
    pub fn new(name: ClassName, bytes: Vec<u8>, origin: ContainerLocation) -> Self {
        Self {
            name,
            bytes,
            origin,
        }
    }

    /// Return the class name.
    #[must_use]
    pub fn name(&self) -> &ClassName {
        &self.name
    }

    /// Return the class bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Return the container the class came from.
    #[must_use]
    pub fn origin(&self) -> &ContainerLocation {
        &self.origin
    }

    /// Return the size of the class bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Return whether the class has no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Return the lowercase hex SHA-256 digest of the class bytes.
    #[must_use]
    pub fn digest(&self) -> String {
        hex::encode(Sha256::digest(&self.bytes))
    }
}

impl fmt::Display for ClassHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} from {}", self.name, self.origin)
    }
}

/// The requested class is not present in a verified container.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("class {class} is not present in {origin}")]
pub struct ClassAbsent {
    /// The requested class.
    pub class: ClassName,
    /// The container that was searched.
    pub origin: ContainerLocation,
}

/// Produces loadable classes from verified containers.
pub trait ClassMaterializer: Send + Sync {
    /// Materialise `class` from `container`, fetched from `origin`.
    ///
    /// # Errors
    ///
    /// Returns [`ClassAbsent`] if the container does not hold the class.
    fn materialize(
        &self,
        container: &VerifiedContainer,
        class: &ClassName,
        origin: &ContainerLocation,
    ) -> Result<ClassHandle, ClassAbsent>;
}

/// Returns the signed entry bytes stored at the class's entry path.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntryMaterializer;

impl ClassMaterializer for EntryMaterializer {
    fn materialize(
        &self,
        container: &VerifiedContainer,
        class: &ClassName,
        origin: &ContainerLocation,
    ) -> Result<ClassHandle, ClassAbsent> {
        container
            .signed_entry(&class.entry_path())
            .map(|entry| ClassHandle::new(class.clone(), entry.data().to_vec(), origin.clone()))
            .ok_or_else(|| ClassAbsent {
                class: class.clone(),
                origin: origin.clone(),
            })
    }
}
