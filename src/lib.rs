//! Trust-gated dynamic loading of code containers.
//!
//! `trustload` fetches code containers from local paths or `https` URLs,
//! checks that every signed entry was signed by the certificate trusted for
//! the requested class's package, and only then hands the class back. Any
//! failure along the way surfaces as the same [`ClassNotFound`] result.
//!
//! # Modules
//!
//! - [`cache`] - Certificate and container caches with explicit wipes
//! - [`certificate`] - Ed25519 trust certificates and their PEM form
//! - [`config`] - TOML loader settings
//! - [`container`] - Zip containers and their signature block
//! - [`delegate`] - Parent loaders consulted after secure loading
//! - [`dirs`] - Platform cache directory resolution
//! - [`error`] - Internal load failures and the uniform external result
//! - [`factory`] - Loader construction from raw locations and trust maps
//! - [`filesystem`] - Local file access seam
//! - [`loader`] - The secure loading pipeline
//! - [`location`] - Path and URL resolution with enforced `https`
//! - [`materialize`] - Class handles built from verified containers
//! - [`names`] - Package and class name newtypes
//! - [`signing`] - Signing identities and container packaging
//! - [`transport`] - HTTPS retrieval seam
//! - [`trust`] - Trust maps and certificate resolution
//! - [`verifier`] - Signature verification of parsed containers
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use trustload::cache::PrivateCaches;
//! use trustload::delegate::NoDelegate;
//! use trustload::factory::LoaderFactory;
//!
//! let factory = LoaderFactory::new(PrivateCaches::in_memory());
//! let trust = [("org.example.app", Some("https://certs.example.org/app.pem"))];
//! let loader = factory.create_loader(
//!     "/srv/apps/app.jar:https://repo.example.org/app.jar",
//!     Some(&trust[..]),
//!     Arc::new(NoDelegate),
//! );
//! match loader.load_class("org.example.app.Main") {
//!     Ok(class) => println!("{} bytes from {}", class.len(), class.origin()),
//!     Err(not_found) => eprintln!("{not_found}"),
//! }
//! ```

pub mod cache;
pub mod certificate;
pub mod config;
pub mod container;
pub mod delegate;
pub mod dirs;
pub mod error;
pub mod factory;
pub mod filesystem;
pub mod loader;
pub mod location;
pub mod materialize;
pub mod names;
pub mod signing;
pub mod transport;
pub mod trust;
pub mod verifier;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;

pub use config::LoaderSettings;
pub use error::{ClassNotFound, LoadError};
pub use factory::{ConstructionReport, LoaderFactory};
pub use loader::SecureLoader;
pub use materialize::ClassHandle;
