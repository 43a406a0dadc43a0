use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

use super::{merge_json, Callback, DocumentStore, Snapshot, StoreError, SubscriptionId, Subscribers};

/// Process-local store. Used when nothing should touch the disk, and in tests.
#[derive(Default)]
pub(crate) struct MemoryStore {
    docs: HashMap<String, Value>,
    collections: HashMap<String, BTreeMap<String, Value>>,
    subscribers: Subscribers,
}

impl MemoryStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn collection_snapshot(&self, path: &str) -> Snapshot {
        Snapshot::Collection {
            path: path.to_string(),
            items: self
                .collections
                .get(path)
                .map(|items| items.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
                .unwrap_or_default(),
        }
    }
}

impl DocumentStore for MemoryStore {
    fn read_doc(&self, path: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.docs.get(path).cloned())
    }

    fn write_merge(&mut self, path: &str, data: Value) -> Result<(), StoreError> {
        match self.docs.get_mut(path) {
            Some(existing) => merge_json(existing, data),
            None => {
                self.docs.insert(path.to_string(), data);
            }
        }
        if self.subscribers.is_watching(path) {
            let snapshot = Snapshot::Document {
                path: path.to_string(),
                value: self.docs.get(path).cloned(),
            };
            self.subscribers.notify(&snapshot);
        }
        Ok(())
    }

    fn read_collection(&self, path: &str) -> Result<Vec<(String, Value)>, StoreError> {
        Ok(self
            .collections
            .get(path)
            .map(|items| items.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }

    fn write_collection_item(&mut self, path: &str, id: &str, data: Value) -> Result<(), StoreError> {
        self.collections
            .entry(path.to_string())
            .or_default()
            .insert(id.to_string(), data);
        if self.subscribers.is_watching(path) {
            let snapshot = self.collection_snapshot(path);
            self.subscribers.notify(&snapshot);
        }
        Ok(())
    }

    fn delete_collection_item(&mut self, path: &str, id: &str) -> Result<bool, StoreError> {
        let removed = self
            .collections
            .get_mut(path)
            .is_some_and(|items| items.remove(id).is_some());
        if removed && self.subscribers.is_watching(path) {
            let snapshot = self.collection_snapshot(path);
            self.subscribers.notify(&snapshot);
        }
        Ok(removed)
    }

    fn subscribe(&mut self, path: &str, callback: Callback) -> SubscriptionId {
        self.subscribers.add(path, callback)
    }

    fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.remove(id)
    }
}
