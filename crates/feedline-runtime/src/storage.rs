#![forbid(unsafe_code)]

//! Session-scoped key/value storage.
//!
//! A [`SessionStore`] lasts one browsing session and is shared (`Arc`) by
//! the list views in it. It holds small versioned JSON values such as the
//! scroll-restoration token. Reads go through to the [`StorageBackend`] once
//! per key and are cached. Writes and removals stay in the cache until
//! [`flush`](SessionStore::flush) sends the changed keys to the backend.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Errors from session storage.
#[derive(Debug)]
pub enum StorageError {
    /// A value could not be encoded or decoded as JSON.
    Encoding(String),
    /// The entry under `key` has a schema version other than the one expected.
    Version {
        /// Entry key.
        key: String,
        /// Version stored with the entry.
        found: u32,
        /// Version the reader understands.
        expected: u32,
    },
    /// The backend rejected a read or write.
    Backend(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Encoding(msg) => write!(f, "storage encoding: {msg}"),
            Self::Version {
                key,
                found,
                expected,
            } => write!(f, "{key}: stored version {found}, expected {expected}"),
            Self::Backend(msg) => write!(f, "storage backend: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        Self::Encoding(e.to_string())
    }
}

/// A stored value and its schema version.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredEntry {
    /// Schema version of `data`.
    pub version: u32,
    /// Serialized value (JSON bytes).
    pub data: Vec<u8>,
}

/// Where session entries live between flushes.
pub trait StorageBackend: Send + Sync {
    /// Entry under `key`, if any.
    fn read(&self, key: &str) -> Result<Option<StoredEntry>, StorageError>;

    /// Store `entry` under `key`; `None` deletes it.
    fn write(&self, key: &str, entry: Option<&StoredEntry>) -> Result<(), StorageError>;
}

/// Process-local backend. Contents end with the process, like a browser's
/// session storage ends with its tab.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, StoredEntry>>,
}

impl MemoryStorage {
    /// Empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, StoredEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StorageBackend for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<StoredEntry>, StorageError> {
        Ok(self.lock().get(key).cloned())
    }

    fn write(&self, key: &str, entry: Option<&StoredEntry>) -> Result<(), StorageError> {
        let mut entries = self.lock();
        match entry {
            Some(entry) => {
                entries.insert(key.to_owned(), entry.clone());
            }
            None => {
                entries.remove(key);
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Cache {
    /// `None` marks a key known to be absent, or removed since the last flush.
    entries: HashMap<String, Option<StoredEntry>>,
    dirty: BTreeSet<String>,
}

/// Cached key/value store for one browsing session.
pub struct SessionStore {
    backend: Box<dyn StorageBackend>,
    cache: Mutex<Cache>,
}

impl SessionStore {
    /// Store over `backend`.
    #[must_use]
    pub fn new(backend: Box<dyn StorageBackend>) -> Self {
        Self {
            backend,
            cache: Mutex::new(Cache::default()),
        }
    }

    /// Store over [`MemoryStorage`].
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryStorage::new()))
    }

    /// Wrap in an `Arc` for sharing between views.
    #[must_use]
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    fn lock(&self) -> MutexGuard<'_, Cache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Entry for `key`. A backend read failure is logged and reads as absent.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<StoredEntry> {
        let mut cache = self.lock();
        if let Some(cached) = cache.entries.get(key) {
            return cached.clone();
        }
        match self.backend.read(key) {
            Ok(entry) => {
                cache.entries.insert(key.to_owned(), entry.clone());
                entry
            }
            Err(error) => {
                tracing::warn!(key, %error, "session storage read failed");
                None
            }
        }
    }

    /// Insert or replace the raw entry under `key`.
    pub fn set(&self, key: impl Into<String>, version: u32, data: Vec<u8>) {
        let key = key.into();
        let mut cache = self.lock();
        cache
            .entries
            .insert(key.clone(), Some(StoredEntry { version, data }));
        cache.dirty.insert(key);
    }

    /// Remove the entry under `key`, returning it.
    pub fn remove(&self, key: &str) -> Option<StoredEntry> {
        let removed = self.get(key)?;
        let mut cache = self.lock();
        cache.entries.insert(key.to_owned(), None);
        cache.dirty.insert(key.to_owned());
        Some(removed)
    }

    /// Serialize `value` as JSON under `key`.
    pub fn set_json<T: Serialize>(
        &self,
        key: impl Into<String>,
        version: u32,
        value: &T,
    ) -> Result<(), StorageError> {
        let data = serde_json::to_vec(value)?;
        self.set(key, version, data);
        Ok(())
    }

    /// Decode the JSON entry under `key`; `Ok(None)` when absent.
    pub fn get_json<T: DeserializeOwned>(
        &self,
        key: &str,
        version: u32,
    ) -> Result<Option<T>, StorageError> {
        let Some(entry) = self.get(key) else {
            return Ok(None);
        };
        if entry.version != version {
            return Err(StorageError::Version {
                key: key.to_owned(),
                found: entry.version,
                expected: version,
            });
        }
        Ok(Some(serde_json::from_slice(&entry.data)?))
    }

    /// Send changed keys to the backend; returns how many were written.
    ///
    /// Keys the backend rejects stay pending for the next flush.
    pub fn flush(&self) -> Result<usize, StorageError> {
        let mut cache = self.lock();
        let pending: Vec<String> = cache.dirty.iter().cloned().collect();
        for key in &pending {
            let entry = cache.entries.get(key).cloned().flatten();
            self.backend.write(key, entry.as_ref())?;
            cache.dirty.remove(key);
        }
        if !pending.is_empty() {
            tracing::trace!(written = pending.len(), "session storage flushed");
        }
        Ok(pending.len())
    }

    /// Whether changes are waiting for [`flush`](Self::flush).
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        !self.lock().dirty.is_empty()
    }
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cache = self.lock();
        f.debug_struct("SessionStore")
            .field("cached", &cache.entries.len())
            .field("dirty", &cache.dirty.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Marker {
        id: String,
    }

    /// Backend shared with the test so it can inspect and sabotage writes.
    #[derive(Default)]
    struct Recorder {
        inner: MemoryStorage,
        reads: AtomicUsize,
        refuse_writes: AtomicBool,
    }

    struct Handle(Arc<Recorder>);

    impl StorageBackend for Handle {
        fn read(&self, key: &str) -> Result<Option<StoredEntry>, StorageError> {
            self.0.reads.fetch_add(1, Ordering::SeqCst);
            self.0.inner.read(key)
        }

        fn write(&self, key: &str, entry: Option<&StoredEntry>) -> Result<(), StorageError> {
            if self.0.refuse_writes.load(Ordering::SeqCst) {
                return Err(StorageError::Backend("quota exceeded".into()));
            }
            self.0.inner.write(key, entry)
        }
    }

    fn store_over(backend: &Arc<Recorder>) -> SessionStore {
        SessionStore::new(Box::new(Handle(Arc::clone(backend))))
    }

    #[test]
    fn writes_reach_the_backend_on_flush() {
        let backend = Arc::new(Recorder::default());
        let store = store_over(&backend);
        store.set("k", 1, b"{}".to_vec());
        assert!(store.is_dirty());
        assert_eq!(backend.inner.read("k").unwrap(), None);

        assert_eq!(store.flush().unwrap(), 1);
        assert!(!store.is_dirty());
        assert_eq!(backend.inner.read("k").unwrap().map(|e| e.version), Some(1));
        assert_eq!(store.flush().unwrap(), 0);
    }

    #[test]
    fn reads_go_to_the_backend_once() {
        let backend = Arc::new(Recorder::default());
        let entry = StoredEntry { version: 1, data: b"1".to_vec() };
        backend.inner.write("k", Some(&entry)).unwrap();

        let store = store_over(&backend);
        assert_eq!(store.get("k"), Some(entry.clone()));
        assert_eq!(store.get("k"), Some(entry));
        assert_eq!(store.get("missing"), None);
        assert_eq!(store.get("missing"), None);
        assert_eq!(backend.reads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn json_checks_version() {
        let store = SessionStore::in_memory();
        let marker = Marker { id: "x".into() };
        store.set_json("m", 2, &marker).unwrap();
        assert_eq!(store.get_json::<Marker>("m", 2).unwrap(), Some(marker));
        assert!(matches!(
            store.get_json::<Marker>("m", 1),
            Err(StorageError::Version { found: 2, expected: 1, .. })
        ));
        assert_eq!(store.get_json::<Marker>("absent", 2).unwrap(), None);
    }

    #[test]
    fn undecodable_entry_is_an_error() {
        let store = SessionStore::in_memory();
        store.set("m", 1, b"not json".to_vec());
        assert!(matches!(store.get_json::<Marker>("m", 1), Err(StorageError::Encoding(_))));
    }

    #[test]
    fn removal_is_flushed_as_delete() {
        let backend = Arc::new(Recorder::default());
        let store = store_over(&backend);
        store.set("a", 1, vec![]);
        store.flush().unwrap();
        assert!(store.remove("a").is_some());
        assert!(store.remove("a").is_none());
        assert_eq!(store.flush().unwrap(), 1);
        assert_eq!(backend.inner.read("a").unwrap(), None);
    }

    #[test]
    fn rejected_flush_keeps_changes_pending() {
        let backend = Arc::new(Recorder::default());
        let store = store_over(&backend);
        store.set("a", 1, vec![]);
        backend.refuse_writes.store(true, Ordering::SeqCst);
        assert!(matches!(store.flush(), Err(StorageError::Backend(_))));
        assert!(store.is_dirty());

        backend.refuse_writes.store(false, Ordering::SeqCst);
        assert_eq!(store.flush().unwrap(), 1);
        assert!(!store.is_dirty());
    }
}
