use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;
use tracing::debug;

use super::schema;
use super::{merge_json, Callback, DocumentStore, Snapshot, StoreError, SubscriptionId, Subscribers};

/// Single-file store. Documents and collection items are kept as JSON text.
pub(crate) struct SqliteStore {
    conn: Connection,
    subscribers: Subscribers,
}

impl SqliteStore {
    pub(crate) fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        let mut store = Self {
            conn,
            subscribers: Subscribers::default(),
        };
        store.migrate()?;
        debug!(path = %path.display(), "opened sqlite store");
        Ok(store)
    }

    #[cfg(test)]
    pub(crate) fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let mut store = Self {
            conn,
            subscribers: Subscribers::default(),
        };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&mut self) -> Result<(), StoreError> {
        let has_version_table: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            [],
            |row| row.get(0),
        )?;

        if !has_version_table {
            self.conn.execute_batch(schema::SCHEMA_V1)?;
            self.conn.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                params![schema::CURRENT_VERSION],
            )?;
            return Ok(());
        }

        let current: i32 = self
            .conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
                row.get(0)
            })
            .unwrap_or(0);

        for &(from_version, sql) in schema::MIGRATIONS {
            if current <= from_version {
                self.conn.execute_batch(sql)?;
            }
        }

        if current < schema::CURRENT_VERSION {
            self.conn.execute(
                "UPDATE schema_version SET version = ?1",
                params![schema::CURRENT_VERSION],
            )?;
        }

        Ok(())
    }

    fn parse_body(path: &str, body: &str) -> Result<Value, StoreError> {
        serde_json::from_str(body).map_err(|e| StoreError::Malformed {
            path: path.to_string(),
            reason: e.to_string(),
        })
    }

    fn notify_collection(&mut self, path: &str) -> Result<(), StoreError> {
        if self.subscribers.is_watching(path) {
            let snapshot = Snapshot::Collection {
                path: path.to_string(),
                items: self.read_collection(path)?,
            };
            self.subscribers.notify(&snapshot);
        }
        Ok(())
    }
}

impl DocumentStore for SqliteStore {
    fn read_doc(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let body: Option<String> = self
            .conn
            .query_row(
                "SELECT body FROM documents WHERE path = ?1",
                params![path],
                |row| row.get(0),
            )
            .optional()?;
        body.map(|b| Self::parse_body(path, &b)).transpose()
    }

    fn write_merge(&mut self, path: &str, data: Value) -> Result<(), StoreError> {
        let merged = match self.read_doc(path)? {
            Some(mut existing) => {
                merge_json(&mut existing, data);
                existing
            }
            None => data,
        };
        self.conn.execute(
            "INSERT INTO documents (path, body, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(path) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at",
            params![path, serde_json::to_string(&merged)?, Utc::now().to_rfc3339()],
        )?;
        if self.subscribers.is_watching(path) {
            let snapshot = Snapshot::Document {
                path: path.to_string(),
                value: Some(merged),
            };
            self.subscribers.notify(&snapshot);
        }
        Ok(())
    }

    fn read_collection(&self, path: &str) -> Result<Vec<(String, Value)>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT item_id, body FROM collection_items WHERE collection = ?1 ORDER BY item_id",
        )?;
        let rows = stmt.query_map(params![path], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut items = Vec::new();
        for row in rows {
            let (id, body) = row?;
            let value = Self::parse_body(path, &body)?;
            items.push((id, value));
        }
        Ok(items)
    }

    fn write_collection_item(&mut self, path: &str, id: &str, data: Value) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO collection_items (collection, item_id, body, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(collection, item_id) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at",
            params![path, id, serde_json::to_string(&data)?, Utc::now().to_rfc3339()],
        )?;
        self.notify_collection(path)
    }

    fn delete_collection_item(&mut self, path: &str, id: &str) -> Result<bool, StoreError> {
        let deleted = self.conn.execute(
            "DELETE FROM collection_items WHERE collection = ?1 AND item_id = ?2",
            params![path, id],
        )?;
        if deleted > 0 {
            self.notify_collection(path)?;
        }
        Ok(deleted > 0)
    }

    fn subscribe(&mut self, path: &str, callback: Callback) -> SubscriptionId {
        self.subscribers.add(path, callback)
    }

    fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.remove(id)
    }
}
