use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::database::queries;
use crate::error::{FeedError, Result};

/// Storage key for the serialized id -> true map.
pub const HEARTED_KEY: &str = "heartedPosts";

/// Device-local key/value persistence for viewer state.
pub trait ViewerStateStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<String>>;
    fn save(&self, key: &str, value: &str) -> Result<()>;
}

/// SQLite-backed viewer state.
pub struct SqliteViewerStore {
    conn: Mutex<Connection>,
}

impl SqliteViewerStore {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> Result<T> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| FeedError::Storage("viewer state connection poisoned".to_string()))?;
        Ok(f(&conn)?)
    }
}

impl ViewerStateStore for SqliteViewerStore {
    fn load(&self, key: &str) -> Result<Option<String>> {
        let raw = self.with_conn(|conn| queries::get_viewer_value(conn, key))?;
        Ok(raw.map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        self.with_conn(|conn| queries::put_viewer_value(conn, key, value.as_bytes()))
    }
}

/// In-memory viewer state, with optional write failure for tests.
#[derive(Default)]
pub struct MemoryViewerStore {
    values: Mutex<BTreeMap<String, String>>,
    fail_writes: AtomicBool,
}

impl MemoryViewerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(self, key: &str, value: &str) -> Self {
        if let Ok(mut values) = self.values.lock() {
            values.insert(key.to_string(), value.to_string());
        }
        self
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.values.lock().ok()?.get(key).cloned()
    }
}

impl ViewerStateStore for MemoryViewerStore {
    fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.raw(key))
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(FeedError::Storage("viewer state is read-only".to_string()));
        }
        let mut values = self
            .values
            .lock()
            .map_err(|_| FeedError::Storage("viewer state poisoned".to_string()))?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// The hearted-id set, read once at start-up and written on every change.
pub struct HeartLedger {
    hearted: BTreeMap<String, bool>,
    store: Arc<dyn ViewerStateStore>,
}

impl HeartLedger {
    /// Unreadable or malformed stored state starts an empty ledger.
    pub fn load(store: Arc<dyn ViewerStateStore>) -> Self {
        let hearted = match store.load(HEARTED_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<BTreeMap<String, bool>>(&raw) {
                Ok(map) => map.into_iter().filter(|(_, hearted)| *hearted).collect(),
                Err(e) => {
                    log::warn!("[Hearts] Discarding malformed hearted map: {}", e);
                    BTreeMap::new()
                }
            },
            Ok(None) => BTreeMap::new(),
            Err(e) => {
                log::warn!("[Hearts] Could not read hearted map: {}", e);
                BTreeMap::new()
            }
        };

        Self { hearted, store }
    }

    pub fn is_hearted(&self, id: &str) -> bool {
        self.hearted.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.hearted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hearted.is_empty()
    }

    /// Returns false when the id was already marked.
    pub fn mark(&mut self, id: &str) -> bool {
        if self.hearted.insert(id.to_string(), true).is_some() {
            return false;
        }
        self.persist();
        true
    }

    /// Returns false when the id was not marked.
    pub fn unmark(&mut self, id: &str) -> bool {
        if self.hearted.remove(id).is_none() {
            return false;
        }
        self.persist();
        true
    }

    fn persist(&self) {
        let result = serde_json::to_string(&self.hearted)
            .map_err(FeedError::from)
            .and_then(|raw| self.store.save(HEARTED_KEY, &raw));
        if let Err(e) = result {
            log::warn!("[Hearts] Could not persist hearted map: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::open_in_memory;

    #[test]
    fn test_mark_persists_id_true_map() {
        let store = Arc::new(MemoryViewerStore::new());
        let mut ledger = HeartLedger::load(store.clone());

        assert!(ledger.mark("a"));
        assert!(!ledger.mark("a"));
        assert_eq!(store.raw(HEARTED_KEY).unwrap(), r#"{"a":true}"#);

        assert!(ledger.unmark("a"));
        assert!(!ledger.unmark("a"));
        assert_eq!(store.raw(HEARTED_KEY).unwrap(), "{}");
    }

    #[test]
    fn test_reload_survives_restart() {
        let store = Arc::new(MemoryViewerStore::new());
        {
            let mut ledger = HeartLedger::load(store.clone());
            ledger.mark("a");
            ledger.mark("b");
        }
        let ledger = HeartLedger::load(store);
        assert!(ledger.is_hearted("a"));
        assert!(ledger.is_hearted("b"));
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_malformed_state_loads_empty() {
        let store = Arc::new(MemoryViewerStore::new().with_value(HEARTED_KEY, "{not json"));
        let ledger = HeartLedger::load(store);
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_false_values_are_not_hearted() {
        let store =
            Arc::new(MemoryViewerStore::new().with_value(HEARTED_KEY, r#"{"a":true,"b":false}"#));
        let ledger = HeartLedger::load(store);
        assert!(ledger.is_hearted("a"));
        assert!(!ledger.is_hearted("b"));
    }

    #[test]
    fn test_write_failure_keeps_memory_state() {
        let store = Arc::new(MemoryViewerStore::new());
        store.set_fail_writes(true);
        let mut ledger = HeartLedger::load(store.clone());

        assert!(ledger.mark("a"));
        assert!(ledger.is_hearted("a"));
        assert_eq!(store.raw(HEARTED_KEY), None);
    }

    #[test]
    fn test_write_failure_is_a_storage_error() {
        let store = MemoryViewerStore::new();
        store.set_fail_writes(true);
        assert!(matches!(
            store.save(HEARTED_KEY, "{}"),
            Err(FeedError::Storage(_))
        ));
    }

    #[test]
    fn test_sqlite_store_round_trip() {
        let store = Arc::new(SqliteViewerStore::new(open_in_memory().unwrap()));
        let mut ledger = HeartLedger::load(store.clone());
        ledger.mark("entry-1");

        let reloaded = HeartLedger::load(store);
        assert!(reloaded.is_hearted("entry-1"));
    }
}
