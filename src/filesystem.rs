//! Local filesystem access for containers and certificates.

use crate::transport::FetchError;
use camino::Utf8Path;

/// Trait for reading local resources, enabling in-memory test doubles.
pub trait FileSystem: Send + Sync {
    /// Read the whole file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Io`] when the file is missing or unreadable.
    fn read(&self, path: &Utf8Path) -> Result<Vec<u8>, FetchError>;

    /// Return whether `path` names an existing regular file.
    fn is_file(&self, path: &Utf8Path) -> bool;
}

/// The host filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

impl FileSystem for LocalFileSystem {
    fn read(&self, path: &Utf8Path) -> Result<Vec<u8>, FetchError> {
        std::fs::read(path).map_err(|source| FetchError::Io {
            path: path.to_string(),
            source,
        })
    }

    fn is_file(&self, path: &Utf8Path) -> bool {
        path.is_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;

    #[test]
    fn reads_existing_file() {
        let temp = tempfile::tempdir().expect("temp dir");
        let path = Utf8PathBuf::try_from(temp.path().join("container.jar")).expect("UTF-8 path");
        std::fs::write(&path, b"bytes").expect("write file");

        let fs = LocalFileSystem;
        assert!(fs.is_file(&path));
        assert_eq!(fs.read(&path).expect("read file"), b"bytes");
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let fs = LocalFileSystem;
        let path = Utf8Path::new("/definitely/not/here.jar");
        assert!(!fs.is_file(path));
        assert!(matches!(fs.read(path), Err(FetchError::Io { .. })));
    }
}
