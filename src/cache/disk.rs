//! On-disk cache store.
//!
//! Each entry is two files named by the SHA-256 of its key: the payload
//! (`<hash>.bin`) and a JSON metadata record (`<hash>.json`). Both are
//! written to a temporary file and persisted by rename. The metadata
//! records the payload digest, so a payload and metadata left by two
//! racing writers read back as a miss. An advisory lock on `.lock` keeps
//! wipes from other processes exclusive with reads and writes; an
//! in-process reader-writer lock does the same for threads.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::sync::RwLock;
use std::time::{Duration, UNIX_EPOCH};

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{CacheEntry, CacheError, CacheStore};

const LOCK_FILE: &str = ".lock";
const PAYLOAD_EXTENSION: &str = "bin";
const METADATA_EXTENSION: &str = "json";

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct EntryMetadata {
    key: String,
    source: String,
    acquired_at_secs: u64,
    payload_sha256: String,
}

/// A store rooted at a directory.
#[derive(Debug)]
pub struct DiskStore {
    root: Utf8PathBuf,
    guard: RwLock<()>,
}

impl DiskStore {
    /// Open (creating if needed) a store at `root`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] if the directory cannot be created.
    pub fn open(root: &Utf8Path) -> Result<Self, CacheError> {
        std::fs::create_dir_all(root).map_err(|source| io_error(root, source))?;
        Ok(Self {
            root: root.to_path_buf(),
            guard: RwLock::new(()),
        })
    }

    /// Return the store directory.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    fn entry_paths(&self, key: &str) -> (Utf8PathBuf, Utf8PathBuf) {
        let stem = hex::encode(Sha256::digest(key.as_bytes()));
        (
            self.root.join(format!("{stem}.{PAYLOAD_EXTENSION}")),
            self.root.join(format!("{stem}.{METADATA_EXTENSION}")),
        )
    }

    fn open_lock_file(&self) -> Result<File, CacheError> {
        let path = self.root.join(LOCK_FILE);
        OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|source| io_error(&path, source))
    }

    fn lock_shared(&self) -> Result<File, CacheError> {
        let file = self.open_lock_file()?;
        fs2::FileExt::lock_shared(&file).map_err(|source| io_error(&self.root, source))?;
        Ok(file)
    }

    fn lock_exclusive(&self) -> Result<File, CacheError> {
        let file = self.open_lock_file()?;
        fs2::FileExt::lock_exclusive(&file).map_err(|source| io_error(&self.root, source))?;
        Ok(file)
    }

    fn write_atomically(&self, path: &Utf8Path, bytes: &[u8]) -> Result<(), CacheError> {
        let mut tmp =
            tempfile::NamedTempFile::new_in(&self.root).map_err(|source| io_error(path, source))?;
        tmp.write_all(bytes)
            .map_err(|source| io_error(path, source))?;
        tmp.persist(path)
            .map_err(|err| io_error(path, err.error))?;
        Ok(())
    }
}

impl CacheStore for DiskStore {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let _guard = self.guard.read().map_err(|_| CacheError::Poisoned)?;
        let _lock = self.lock_shared()?;
        let (payload_path, metadata_path) = self.entry_paths(key);

        let Some(metadata_bytes) = read_optional(&metadata_path)? else {
            return Ok(None);
        };
        let metadata: EntryMetadata =
            serde_json::from_slice(&metadata_bytes).map_err(|e| CacheError::Metadata {
                path: metadata_path.clone(),
                reason: e.to_string(),
            })?;
        if metadata.key != key {
            return Ok(None);
        }
        let Some(payload) = read_optional(&payload_path)? else {
            return Ok(None);
        };
        if payload_digest(&payload) != metadata.payload_sha256 {
            log::debug!("cache entry {payload_path} does not match its metadata");
            return Ok(None);
        }

        let acquired_at = UNIX_EPOCH + Duration::from_secs(metadata.acquired_at_secs);
        Ok(Some(CacheEntry::acquired(
            payload,
            metadata.source,
            acquired_at,
        )))
    }

    fn put(&self, key: &str, entry: CacheEntry) -> Result<(), CacheError> {
        let _guard = self.guard.read().map_err(|_| CacheError::Poisoned)?;
        let _lock = self.lock_shared()?;
        let (payload_path, metadata_path) = self.entry_paths(key);

        let metadata = EntryMetadata {
            key: key.to_owned(),
            source: entry.source().to_owned(),
            acquired_at_secs: entry
                .acquired_at()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            payload_sha256: payload_digest(entry.payload()),
        };
        let metadata_bytes =
            serde_json::to_vec_pretty(&metadata).map_err(|e| CacheError::Metadata {
                path: metadata_path.clone(),
                reason: e.to_string(),
            })?;

        self.write_atomically(&payload_path, entry.payload())?;
        self.write_atomically(&metadata_path, &metadata_bytes)
    }

    fn clear(&self) -> Result<(), CacheError> {
        let _guard = self.guard.write().map_err(|_| CacheError::Poisoned)?;
        let _lock = self.lock_exclusive()?;
        let entries = self
            .root
            .read_dir_utf8()
            .map_err(|source| io_error(&self.root, source))?;
        for entry in entries {
            let entry = entry.map_err(|source| io_error(&self.root, source))?;
            if entry.file_name() == LOCK_FILE {
                continue;
            }
            match std::fs::remove_file(entry.path()) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(source) => return Err(io_error(entry.path(), source)),
            }
        }
        Ok(())
    }

    fn len(&self) -> Result<usize, CacheError> {
        let _guard = self.guard.read().map_err(|_| CacheError::Poisoned)?;
        let _lock = self.lock_shared()?;
        let entries = self
            .root
            .read_dir_utf8()
            .map_err(|source| io_error(&self.root, source))?;
        let mut count = 0;
        for entry in entries {
            let entry = entry.map_err(|source| io_error(&self.root, source))?;
            if entry.path().extension() == Some(METADATA_EXTENSION) {
                count += 1;
            }
        }
        Ok(count)
    }
}

fn payload_digest(payload: &[u8]) -> String {
    hex::encode(Sha256::digest(payload))
}

fn read_optional(path: &Utf8Path) -> Result<Option<Vec<u8>>, CacheError> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(source) => Err(io_error(path, source)),
    }
}

fn io_error(path: &Utf8Path, source: std::io::Error) -> CacheError {
    CacheError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    fn epoch_secs(time: SystemTime) -> u64 {
        time.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
    }

    fn store() -> (tempfile::TempDir, DiskStore) {
        let temp = tempfile::tempdir().expect("temp dir");
        let root = Utf8PathBuf::try_from(temp.path().join("store")).expect("UTF-8 path");
        let store = DiskStore::open(&root).expect("open store");
        (temp, store)
    }

    #[test]
    fn entries_survive_reopening() {
        let (_temp, store) = store();
        let entry = CacheEntry::new(b"payload".to_vec(), "https://example.org/a.jar");
        store.put("https://example.org/a.jar", entry.clone()).expect("put");

        let reopened = DiskStore::open(store.root()).expect("reopen store");
        let cached = reopened
            .get("https://example.org/a.jar")
            .expect("get")
            .expect("entry present");
        assert_eq!(cached.payload(), b"payload");
        assert_eq!(cached.source(), "https://example.org/a.jar");
        assert_eq!(
            epoch_secs(cached.acquired_at()),
            epoch_secs(entry.acquired_at())
        );
    }

    #[test]
    fn missing_key_is_absent() {
        let (_temp, store) = store();
        assert!(store.get("nothing").expect("get").is_none());
    }

    #[test]
    fn clear_removes_entries_but_keeps_store_usable() {
        let (_temp, store) = store();
        store
            .put("one", CacheEntry::new(b"1".to_vec(), "one"))
            .expect("put");
        store
            .put("two", CacheEntry::new(b"2".to_vec(), "two"))
            .expect("put");
        assert_eq!(store.len().expect("len"), 2);

        store.clear().expect("clear");
        store.clear().expect("second clear");
        assert_eq!(store.len().expect("len"), 0);

        store
            .put("three", CacheEntry::new(b"3".to_vec(), "three"))
            .expect("put after clear");
        assert!(store.get("three").expect("get").is_some());
    }

    #[test]
    fn corrupt_metadata_is_reported() {
        let (_temp, store) = store();
        store
            .put("key", CacheEntry::new(b"data".to_vec(), "src"))
            .expect("put");
        let (_, metadata_path) = store.entry_paths("key");
        std::fs::write(&metadata_path, b"not json").expect("corrupt metadata");

        assert!(matches!(
            store.get("key"),
            Err(CacheError::Metadata { .. })
        ));
    }

    #[test]
    fn payload_from_another_writer_reads_as_a_miss() {
        let (_temp, store) = store();
        store
            .put("key", CacheEntry::new(b"first".to_vec(), "src"))
            .expect("put");
        let (payload_path, _) = store.entry_paths("key");
        std::fs::write(&payload_path, b"second").expect("replace payload");

        assert!(store.get("key").expect("get").is_none());

        store
            .put("key", CacheEntry::new(b"second".to_vec(), "src"))
            .expect("put again");
        let cached = store.get("key").expect("get").expect("entry present");
        assert_eq!(cached.payload(), b"second");
    }
}
