//! Entity - dynamic record with property access, dirty tracking, and identity

use std::collections::{HashMap, HashSet};

use serde_json::Value;

/// A fetched database row, keyed by column (or aliased column) name
pub type Row = serde_json::Map<String, Value>;

/// Dynamic record consumed and produced by the association engine.
///
/// Entities carry no schema of their own; callers read and write properties
/// by name. `is_new` plus per-field dirty flags track persistence state the
/// same way loaded/unloaded state is tracked on relationship containers.
#[derive(Debug, Clone)]
pub struct Entity {
    fields: HashMap<String, Value>,
    dirty: HashSet<String>,
    is_new: bool,
}

impl Default for Entity {
    fn default() -> Self {
        Self::new()
    }
}

impl Entity {
    /// Create a new, unpersisted entity
    pub fn new() -> Self {
        Self {
            fields: HashMap::new(),
            dirty: HashSet::new(),
            is_new: true,
        }
    }

    /// Build a persisted, clean entity from a fetched row
    pub fn from_row(row: Row) -> Self {
        Self {
            fields: row.into_iter().collect(),
            dirty: HashSet::new(),
            is_new: false,
        }
    }

    /// Get a property value
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Set a property value and mark it dirty
    pub fn set(&mut self, field: &str, value: Value) {
        self.fields.insert(field.to_string(), value);
        self.dirty.insert(field.to_string());
    }

    /// Clear the dirty flag on a single property
    pub fn clean(&mut self, field: &str) {
        self.dirty.remove(field);
    }

    /// Whether a property has been modified since the last sync
    pub fn is_dirty(&self, field: &str) -> bool {
        self.dirty.contains(field)
    }

    /// Whether the entity has never been persisted
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    /// Mark the entity as persisted and in sync with storage
    pub fn mark_persisted(&mut self) {
        self.is_new = false;
        self.dirty.clear();
    }

    /// Extract the values of the given columns, in order.
    ///
    /// Returns `None` if any column is absent or null - a partial identity
    /// is no identity.
    pub fn extract(&self, columns: &[String]) -> Option<Vec<Value>> {
        let mut values = Vec::with_capacity(columns.len());
        for column in columns {
            match self.fields.get(column) {
                Some(value) if !value.is_null() => values.push(value.clone()),
                _ => return None,
            }
        }
        if values.is_empty() {
            None
        } else {
            Some(values)
        }
    }

    /// Whether the entity carries a persisted identity for the given key
    pub fn has_persisted_identity(&self, primary_key: &[String]) -> bool {
        !self.is_new && self.extract(primary_key).is_some()
    }

    /// Snapshot the entity's fields as a row
    pub fn to_row(&self) -> Row {
        self.fields
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}
