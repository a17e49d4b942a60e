//! In-memory cache store.

use std::collections::HashMap;
use std::sync::RwLock;

use super::{CacheEntry, CacheError, CacheStore};

/// A process-local store guarded by a reader-writer lock.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let entries = self.entries.read().map_err(|_| CacheError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &str, entry: CacheEntry) -> Result<(), CacheError> {
        let mut entries = self.entries.write().map_err(|_| CacheError::Poisoned)?;
        entries.insert(key.to_owned(), entry);
        Ok(())
    }

    fn clear(&self) -> Result<(), CacheError> {
        let mut entries = self.entries.write().map_err(|_| CacheError::Poisoned)?;
        entries.clear();
        Ok(())
    }

    fn len(&self) -> Result<usize, CacheError> {
        let entries = self.entries.read().map_err(|_| CacheError::Poisoned)?;
        Ok(entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn later_writes_replace_earlier_ones() {
        let store = MemoryStore::default();
        store
            .put("key", CacheEntry::new(b"first".to_vec(), "a"))
            .expect("put");
        store
            .put("key", CacheEntry::new(b"second".to_vec(), "b"))
            .expect("put");

        let entry = store.get("key").expect("get").expect("entry present");
        assert_eq!(entry.payload(), b"second");
        assert_eq!(entry.source(), "b");
        assert_eq!(store.len().expect("len"), 1);
    }

    #[test]
    fn concurrent_writers_leave_one_entry_per_key() {
        let store = Arc::new(MemoryStore::default());
        let handles: Vec<_> = (0..8)
            .map(|index| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    let payload = vec![index; 4];
                    store
                        .put("shared", CacheEntry::new(payload, "race"))
                        .expect("put");
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("writer thread");
        }

        let entry = store.get("shared").expect("get").expect("entry present");
        assert_eq!(entry.payload().len(), 4);
        assert_eq!(store.len().expect("len"), 1);
    }
}
