//! Document-store port the ledger persists through.
//!
//! Paths are slash-separated strings (`users/alice/data/monthlyData`). A path
//! names either a document (one JSON value) or a collection (JSON values keyed
//! by item id). Writes notify subscribers on the same path with a full snapshot.

mod memory;
mod schema;
mod sqlite;

use serde_json::Value;
use thiserror::Error;

pub(crate) use memory::MemoryStore;
pub(crate) use sqlite::SqliteStore;

#[derive(Debug, Error)]
pub(crate) enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Malformed data at {path}: {reason}")]
    Malformed { path: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct SubscriptionId(u64);

/// Full state of a path after a write.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Snapshot {
    Document {
        path: String,
        value: Option<Value>,
    },
    Collection {
        path: String,
        items: Vec<(String, Value)>,
    },
}

impl Snapshot {
    pub(crate) fn path(&self) -> &str {
        match self {
            Self::Document { path, .. } | Self::Collection { path, .. } => path,
        }
    }
}

pub(crate) type Callback = Box<dyn FnMut(&Snapshot)>;

pub(crate) trait DocumentStore {
    fn read_doc(&self, path: &str) -> Result<Option<Value>, StoreError>;

    /// Objects merge key by key, recursively; any other value replaces what was there.
    fn write_merge(&mut self, path: &str, data: Value) -> Result<(), StoreError>;

    /// Items ordered by id.
    fn read_collection(&self, path: &str) -> Result<Vec<(String, Value)>, StoreError>;

    fn write_collection_item(&mut self, path: &str, id: &str, data: Value) -> Result<(), StoreError>;

    /// Returns whether the item existed.
    fn delete_collection_item(&mut self, path: &str, id: &str) -> Result<bool, StoreError>;

    fn subscribe(&mut self, path: &str, callback: Callback) -> SubscriptionId;

    fn unsubscribe(&mut self, id: SubscriptionId) -> bool;
}

/// Merge `patch` into `target` the way `write_merge` documents it.
pub(crate) fn merge_json(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(existing), Value::Object(incoming)) => {
            for (key, value) in incoming {
                match existing.get_mut(&key) {
                    Some(slot) => merge_json(slot, value),
                    None => {
                        existing.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Callback registry shared by the store implementations.
#[derive(Default)]
pub(crate) struct Subscribers {
    next_id: u64,
    entries: Vec<(SubscriptionId, String, Callback)>,
}

impl Subscribers {
    pub(crate) fn add(&mut self, path: &str, callback: Callback) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.entries.push((id, path.to_string(), callback));
        id
    }

    pub(crate) fn remove(&mut self, id: SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(sid, _, _)| *sid != id);
        self.entries.len() != before
    }

    pub(crate) fn is_watching(&self, path: &str) -> bool {
        self.entries.iter().any(|(_, p, _)| p == path)
    }

    pub(crate) fn notify(&mut self, snapshot: &Snapshot) {
        for (_, path, callback) in self.entries.iter_mut() {
            if path == snapshot.path() {
                callback(snapshot);
            }
        }
    }
}
