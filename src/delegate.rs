//! Parent loaders consulted after secure loading finds nothing.

use std::collections::HashMap;

use crate::error::{ClassNotFound, LoadResult};
use crate::materialize::ClassHandle;

/// A loader to fall back on.
pub trait DelegateLoader: Send + Sync {
    /// Load `name` or report it missing.
    ///
    /// # Errors
    ///
    /// Returns [`ClassNotFound`] when the delegate has no such class.
    fn load_class(&self, name: &str) -> LoadResult<ClassHandle>;
}

/// A delegate that knows no classes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelegate;

impl DelegateLoader for NoDelegate {
    fn load_class(&self, name: &str) -> LoadResult<ClassHandle> {
        Err(ClassNotFound::new(name))
    }
}

/// A delegate serving a fixed set of classes.
#[derive(Debug, Clone, Default)]
pub struct StaticDelegate {
    classes: HashMap<String, ClassHandle>,
}

impl StaticDelegate {
    /// Create an empty delegate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `handle` under its class name.
    #[must_use]
    pub fn with_class(mut self, handle: ClassHandle) -> Self {
        self.classes
            .insert(handle.name().as_str().to_owned(), handle);
        self
    }
}

impl DelegateLoader for StaticDelegate {
    fn load_class(&self, name: &str) -> LoadResult<ClassHandle> {
        self.classes
            .get(name)
            .cloned()
            .ok_or_else(|| ClassNotFound::new(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::Location;
    use crate::names::ClassName;
    use camino::Utf8PathBuf;

    #[test]
    fn no_delegate_finds_nothing() {
        let err = NoDelegate
            .load_class("java.lang.String")
            .expect_err("nothing to find");
        assert_eq!(err.name(), "java.lang.String");
    }

    #[test]
    fn static_delegate_serves_registered_classes() {
        let class = ClassName::try_from("host.Bootstrap").expect("valid class");
        let handle = ClassHandle::new(
            class,
            b"host".to_vec(),
            Location::Local(Utf8PathBuf::from("/host/boot.jar")),
        );
        let delegate = StaticDelegate::new().with_class(handle.clone());

        assert_eq!(delegate.load_class("host.Bootstrap"), Ok(handle));
        assert!(delegate.load_class("host.Other").is_err());
    }
}
