//! Capture hook between the persistence engine and the event bus
//!
//! The record store invokes these hooks synchronously at flush time, before
//! the triggering transaction commits. The hook filters by a registry of
//! enrolled record kinds, runs the extractor over the engine-supplied
//! snapshots, and publishes at most one change event per mutated record.

use std::collections::HashSet;
use std::sync::RwLock;

use serde_json::Value;
use tracing::trace;

use crate::models::Record;
use crate::store::txn::TxnContext;

use super::bus::EventBus;
use super::diff::{extract_create, extract_update};

/// Flush-time change capture with opt-in record kinds
///
/// Record kinds are enrolled by name rather than compared against a single
/// hardcoded type; a mutation of an unenrolled kind passes through without
/// producing an event.
pub struct ChangeCapture {
    bus: EventBus,
    enrolled: RwLock<HashSet<String>>,
}

impl ChangeCapture {
    /// Wrap a fully wired bus; subscriptions are frozen from here on
    pub fn new(bus: EventBus) -> Self {
        Self {
            bus,
            enrolled: RwLock::new(HashSet::new()),
        }
    }

    /// Opt a record kind in to auditing
    pub fn enroll(&self, kind: impl Into<String>) {
        if let Ok(mut enrolled) = self.enrolled.write() {
            enrolled.insert(kind.into());
        }
    }

    /// Whether a record kind is enrolled
    pub fn is_enrolled(&self, kind: &str) -> bool {
        self.enrolled
            .read()
            .map(|enrolled| enrolled.contains(kind))
            .unwrap_or(false)
    }

    /// Capture hook for a staged insert
    ///
    /// Publishes a CREATE event rendering every field as "null -> value".
    pub fn on_insert(&self, record: &Record, ctx: &mut TxnContext) {
        if !self.is_enrolled(&record.kind) {
            trace!(kind = %record.kind, "record kind not enrolled; skipping capture");
            return;
        }

        let names = record.field_names();
        let state = record.field_values();
        if let Some(event) = extract_create(&record.kind, &record.id.to_string(), &names, &state) {
            self.bus.publish(&event, ctx);
        }
    }

    /// Capture hook for a staged update
    ///
    /// `old_state` and `dirty` come from the persistence engine: before
    /// values keyed by the record's field ordering, and the indices of the
    /// fields the engine found dirty. The dirty signal is trusted, not
    /// recomputed.
    pub fn on_update(
        &self,
        record: &Record,
        old_state: &[Value],
        dirty: &[usize],
        ctx: &mut TxnContext,
    ) {
        if !self.is_enrolled(&record.kind) {
            trace!(kind = %record.kind, "record kind not enrolled; skipping capture");
            return;
        }
        if dirty.is_empty() {
            return;
        }

        let names = record.field_names();
        let new_state = record.field_values();
        if let Some(event) = extract_update(
            &record.kind,
            &record.id.to_string(),
            &names,
            old_state,
            &new_state,
            dirty,
        ) {
            self.bus.publish(&event, ctx);
        }
    }
}
