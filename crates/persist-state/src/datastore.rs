//! # In-Memory Datastore
//!
//! Backing rows for the reference surrogate. One row per object, one JSON
//! value per field in class-metadata order.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use persist_core::ObjectId;
use serde_json::Value;

/// A stored row.
pub type Row = Vec<Value>;

/// Thread-safe, cloneable row store keyed by object identity.
///
/// Clones share the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatastore {
    rows: Arc<RwLock<HashMap<ObjectId, Row>>>,
}

impl MemoryDatastore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a row, returning the previous one.
    pub fn put(&self, id: ObjectId, row: Row) -> Option<Row> {
        self.rows.write().insert(id, row)
    }

    pub fn get(&self, id: &ObjectId) -> Option<Row> {
        self.rows.read().get(id).cloned()
    }

    /// A single field of a row, if both exist.
    pub fn field(&self, id: &ObjectId, index: usize) -> Option<Value> {
        self.rows.read().get(id).and_then(|row| row.get(index).cloned())
    }

    pub fn remove(&self, id: &ObjectId) -> Option<Row> {
        self.rows.write().remove(id)
    }

    pub fn contains(&self, id: &ObjectId) -> bool {
        self.rows.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
