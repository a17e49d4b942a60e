//! Load failure types.
//!
//! [`LoadError`] records why a secure load failed and is only ever logged.
//! Callers of [`crate::loader::SecureLoader::load_class`] see a single
//! [`ClassNotFound`] whatever the reason, so that a caller cannot tell an
//! untrusted package from a missing class.

use thiserror::Error;

use crate::container::ContainerError;
use crate::location::{ContainerLocation, LocationError};
use crate::materialize::ClassAbsent;
use crate::names::NameError;
use crate::transport::FetchError;
use crate::trust::NoTrustAvailable;
use crate::verifier::VerificationFailure;

/// Internal reasons a secure load did not produce a class.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The requested name is not a valid class name.
    #[error("invalid class name: {0}")]
    InvalidClassName(#[from] NameError),

    /// The class has no owning package, so no trust can apply.
    #[error("class {class} has no package")]
    NoPackage {
        /// The requested class.
        class: String,
    },

    /// A location string failed to resolve.
    #[error("location malformed: {0}")]
    LocationMalformed(#[from] LocationError),

    /// No container locations were configured.
    #[error("no container locations configured")]
    NoContainers,

    /// A container could not be fetched or read.
    #[error("container fetch failed for {location}: {source}")]
    FetchFailed {
        /// The container location.
        location: ContainerLocation,
        /// Underlying fetch error.
        #[source]
        source: FetchError,
    },

    /// Fetched bytes are not a readable container.
    #[error("container {location} unreadable: {source}")]
    UnreadableContainer {
        /// The container location.
        location: ContainerLocation,
        /// Underlying parse error.
        #[source]
        source: ContainerError,
    },

    /// No certificate could be obtained for the package.
    #[error(transparent)]
    NoTrustAvailable(#[from] NoTrustAvailable),

    /// A container failed signature verification.
    #[error("container {location} failed verification: {source}")]
    VerificationFailed {
        /// The container location.
        location: ContainerLocation,
        /// The verification failure.
        #[source]
        source: VerificationFailure,
    },

    /// A verified container does not hold the class.
    #[error(transparent)]
    ClassAbsent(#[from] ClassAbsent),
}

/// The uniform negative result of a class load.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("class not found: {name}")]
pub struct ClassNotFound {
    name: String,
}

impl ClassNotFound {
    /// Report that `name` could not be loaded.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Return the requested class name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Result type for class loads.
pub type LoadResult<T> = std::result::Result<T, ClassNotFound>;
