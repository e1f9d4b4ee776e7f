use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::error::{FeedError, Result};
use crate::models::{Entry, EntryFields, EntryPatch};

/// Which entries a snapshot covers. Both are ordered newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotScope {
    /// `status == published`, for the public feed.
    Published,
    /// Every entry, for the admin list.
    All,
}

#[async_trait]
pub trait EntrySource: Send + Sync {
    async fn fetch_snapshot(&self, scope: SnapshotScope) -> Result<Vec<Entry>>;
}

#[async_trait]
pub trait MutationSink: Send + Sync {
    /// Atomically add one to the entry's heart counter.
    async fn increment_heart(&self, id: &str) -> Result<()>;

    /// Returns the id assigned by the store.
    async fn create_entry(&self, fields: EntryFields) -> Result<String>;

    async fn update_entry(&self, id: &str, patch: EntryPatch) -> Result<()>;

    async fn delete_entry(&self, id: &str) -> Result<()>;
}

/// Newest first; entries without a creation time go last.
pub fn sort_newest_first(entries: &mut [Entry]) {
    entries.sort_by_key(|e| std::cmp::Reverse(e.created_millis()));
}

/// In-process store with failure injection.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<Vec<Entry>>,
    fail_snapshots: AtomicBool,
    fail_mutations: AtomicBool,
    increments: AtomicU32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: Vec<Entry>) -> Self {
        Self {
            entries: Mutex::new(entries),
            ..Default::default()
        }
    }

    pub fn set_fail_snapshots(&self, fail: bool) {
        self.fail_snapshots.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_mutations(&self, fail: bool) {
        self.fail_mutations.store(fail, Ordering::SeqCst);
    }

    /// Number of successful heart increments.
    pub fn increment_count(&self) -> u32 {
        self.increments.load(Ordering::SeqCst)
    }

    pub async fn get(&self, id: &str) -> Option<Entry> {
        self.entries.lock().await.iter().find(|e| e.id == id).cloned()
    }

    fn check_mutation(&self, id: &str) -> Result<()> {
        if self.fail_mutations.load(Ordering::SeqCst) {
            return Err(FeedError::Mutation {
                id: id.to_string(),
                message: "store rejected the write".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl EntrySource for MemoryStore {
    async fn fetch_snapshot(&self, scope: SnapshotScope) -> Result<Vec<Entry>> {
        if self.fail_snapshots.load(Ordering::SeqCst) {
            return Err(FeedError::Subscription("snapshot listener unavailable".to_string()));
        }

        let mut snapshot: Vec<Entry> = self
            .entries
            .lock()
            .await
            .iter()
            .filter(|e| scope == SnapshotScope::All || e.is_published())
            .cloned()
            .collect();
        sort_newest_first(&mut snapshot);
        Ok(snapshot)
    }
}

#[async_trait]
impl MutationSink for MemoryStore {
    async fn increment_heart(&self, id: &str) -> Result<()> {
        self.check_mutation(id)?;
        let mut entries = self.entries.lock().await;
        let entry = entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| FeedError::NotFound(id.to_string()))?;
        entry.hearts += 1;
        self.increments.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn create_entry(&self, fields: EntryFields) -> Result<String> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        self.check_mutation(&id)?;

        let now = Utc::now();
        let mut entry = Entry::new(id.clone(), fields.title.clone());
        entry.apply_fields(&fields);
        entry.timestamp = Some(now);
        entry.created_at = Some(now);

        self.entries.lock().await.push(entry);
        Ok(id)
    }

    async fn update_entry(&self, id: &str, patch: EntryPatch) -> Result<()> {
        self.check_mutation(id)?;
        let mut entries = self.entries.lock().await;
        let entry = entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| FeedError::NotFound(id.to_string()))?;
        patch.apply_to(entry);
        entry.updated_at = Some(Utc::now());
        Ok(())
    }

    async fn delete_entry(&self, id: &str) -> Result<()> {
        self.check_mutation(id)?;
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|e| e.id != id);
        if entries.len() == before {
            return Err(FeedError::NotFound(id.to_string()));
        }
        Ok(())
    }
}
