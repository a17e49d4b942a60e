//! Error types for the `trustload` CLI.

use camino::Utf8PathBuf;
use thiserror::Error;
use trustload::ClassNotFound;
use trustload::cache::CacheError;
use trustload::config::SettingsError;
use trustload::container::ContainerError;
use trustload::signing::IdentityError;

/// Errors reported by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// The class could not be loaded. Deliberately carries no reason.
    #[error(transparent)]
    ClassNotFound(#[from] ClassNotFound),

    /// A `--trust` argument is not of the form `PKG=LOC`.
    #[error("invalid trust entry {raw:?}: expected PKG=LOC")]
    InvalidTrustEntry {
        /// The raw argument.
        raw: String,
    },

    /// Settings could not be loaded or applied.
    #[error(transparent)]
    Settings(#[from] SettingsError),

    /// A cache could not be opened or wiped.
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// A signing identity could not be read, parsed, or written.
    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// The container could not be packaged.
    #[error("failed to build container: {0}")]
    Container(#[from] ContainerError),

    /// An output file could not be written.
    #[error("failed to write {path}: {source}")]
    Write {
        /// Destination path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl CliError {
    /// Return the process exit code for this error.
    ///
    /// A class that cannot be loaded exits with 1; usage and environment
    /// problems exit with 2.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ClassNotFound(_) => 1,
            _ => 2,
        }
    }
}

/// Result alias for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;
