//! Shared test utilities for the trustload crate.
//!
//! Available to unit tests and, through the `test-support` feature, to
//! integration tests and downstream crates.

use crate::container::ContainerError;
use crate::filesystem::FileSystem;
use crate::transport::{FetchError, Transport};
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use std::sync::{Mutex, PoisonError};
use url::Url;

/// A transport serving canned bodies and counting requests per URL.
///
/// URLs without a canned body answer with [`FetchError::NotFound`].
#[derive(Debug, Default)]
pub struct RecordingTransport {
    bodies: Mutex<HashMap<String, Vec<u8>>>,
    requests: Mutex<HashMap<String, usize>>,
}

impl RecordingTransport {
    /// Create a transport that serves nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` at `url`.
    pub fn serve(&self, url: &str, body: impl Into<Vec<u8>>) {
        self.bodies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(normalise(url), body.into());
    }

    /// Return how many times `url` was requested.
    #[must_use]
    pub fn requests_for(&self, url: &str) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&normalise(url))
            .copied()
            .unwrap_or_default()
    }

    /// Return the total number of requests made.
    #[must_use]
    pub fn total_requests(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .sum()
    }
}

impl Transport for RecordingTransport {
    fn fetch(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        let key = url.to_string();
        *self
            .requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key.clone())
            .or_default() += 1;
        self.bodies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned()
            .ok_or(FetchError::NotFound { url: key })
    }
}

fn normalise(url: &str) -> String {
    Url::parse(url).map_or_else(|_| url.to_owned(), |parsed| parsed.to_string())
}

/// A filesystem holding files in memory.
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    files: Mutex<HashMap<Utf8PathBuf, Vec<u8>>>,
}

impl MemoryFileSystem {
    /// Create an empty filesystem.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `bytes` at `path`, replacing any previous contents.
    pub fn insert(&self, path: impl Into<Utf8PathBuf>, bytes: impl Into<Vec<u8>>) {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.into(), bytes.into());
    }
}

impl FileSystem for MemoryFileSystem {
    fn read(&self, path: &Utf8Path) -> Result<Vec<u8>, FetchError> {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
            .ok_or_else(|| FetchError::Io {
                path: path.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
            })
    }

    fn is_file(&self, path: &Utf8Path) -> bool {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(path)
    }
}

/// Rewrite a container archive, replacing the bytes of `entry` while
/// keeping its original signature block.
///
/// # Errors
///
/// Returns [`ContainerError::Archive`] if `archive` is not a readable zip
/// archive.
pub fn tamper_entry(
    archive: &[u8],
    entry: &str,
    replacement: &[u8],
) -> Result<Vec<u8>, ContainerError> {
    let mut source = zip::ZipArchive::new(Cursor::new(archive))?;
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    for index in 0..source.len() {
        let mut file = source.by_index(index)?;
        let name = file.name().to_owned();
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        if name == entry {
            data = replacement.to_vec();
        }
        writer.start_file(name, options)?;
        writer.write_all(&data)?;
    }
    Ok(writer.finish()?.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_transport_counts_requests() {
        let transport = RecordingTransport::new();
        transport.serve("https://example.org/a.jar", b"zip".to_vec());
        let url = Url::parse("https://example.org/a.jar").expect("valid URL");

        assert_eq!(transport.fetch(&url).expect("served"), b"zip");
        assert_eq!(transport.fetch(&url).expect("served"), b"zip");
        assert_eq!(transport.requests_for("https://example.org/a.jar"), 2);

        let missing = Url::parse("https://example.org/b.jar").expect("valid URL");
        assert!(matches!(
            transport.fetch(&missing),
            Err(FetchError::NotFound { .. })
        ));
        assert_eq!(transport.total_requests(), 3);
    }
}
