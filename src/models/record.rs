//! Generic tracked record
//!
//! A record is a mutable bag of named fields identified by a `kind` (its
//! type name) and a [`RecordId`]. Field values are JSON values so that any
//! record shape can be tracked without a concrete struct per type.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ids::RecordId;

/// A mutable record with named fields, tracked by the record store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Unique identifier, assigned at construction
    pub id: RecordId,

    /// The record's type name, e.g. "Product"
    pub kind: String,

    /// Field name -> value; absent values are stored as JSON null
    pub fields: BTreeMap<String, Value>,
}

impl Record {
    /// Create a new record with a fresh id
    pub fn new(kind: impl Into<String>, fields: BTreeMap<String, Value>) -> Self {
        Self {
            id: RecordId::new(),
            kind: kind.into(),
            fields,
        }
    }

    /// Get a field value, if present
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Set a field value, returning the previous value if any
    pub fn set(&mut self, field: impl Into<String>, value: Value) -> Option<Value> {
        self.fields.insert(field.into(), value)
    }

    /// Field names in stable (sorted) order
    ///
    /// The snapshot arrays handed to the capture hook are keyed by this
    /// ordering, so before and after states line up index for index.
    pub fn field_names(&self) -> Vec<String> {
        self.fields.keys().cloned().collect()
    }

    /// Field values in the same order as [`Record::field_names`]
    pub fn field_values(&self) -> Vec<Value> {
        self.fields.values().cloned().collect()
    }
}
