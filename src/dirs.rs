//! Platform directory resolution for persistent caches.

use std::path::PathBuf;

use directories_next::ProjectDirs;

/// Environment variable overriding the cache directory.
pub const CACHE_DIR_ENV: &str = "TRUSTLOAD_CACHE_DIR";

/// Source of the base directories used by persistent caches.
#[cfg_attr(test, mockall::automock)]
pub trait BaseDirs {
    /// Return the directory under which cached payloads are stored.
    fn cache_dir(&self) -> Option<PathBuf>;
}

/// Platform directories from `directories-next`, honouring
/// [`CACHE_DIR_ENV`].
#[derive(Debug, Clone)]
pub struct SystemBaseDirs {
    project: Option<ProjectDirs>,
}

impl SystemBaseDirs {
    /// Resolve the platform project directories.
    ///
    /// Construction never fails: when the platform has no home directory
    /// only the environment override can supply a cache directory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            project: ProjectDirs::from("", "", "trustload"),
        }
    }
}

impl Default for SystemBaseDirs {
    fn default() -> Self {
        Self::new()
    }
}

impl BaseDirs for SystemBaseDirs {
    fn cache_dir(&self) -> Option<PathBuf> {
        if let Some(dir) = std::env::var_os(CACHE_DIR_ENV).filter(|value| !value.is_empty()) {
            return Some(PathBuf::from(dir));
        }
        self.project
            .as_ref()
            .map(|project| project.cache_dir().to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_override_wins() {
        temp_env::with_var(CACHE_DIR_ENV, Some("/srv/trustload-cache"), || {
            let dirs = SystemBaseDirs::new();
            assert_eq!(dirs.cache_dir(), Some(PathBuf::from("/srv/trustload-cache")));
        });
    }

    #[test]
    fn empty_override_is_ignored() {
        temp_env::with_vars(
            [(CACHE_DIR_ENV, Some("")), ("HOME", Some("/home/tester"))],
            || {
                let dirs = SystemBaseDirs::new();
                let cache_dir = dirs.cache_dir();
                assert_ne!(cache_dir, Some(PathBuf::new()));
            },
        );
    }
}
