//! Audit entry data structures
//!
//! Defines the durable shape of one processed change event. An entry is
//! immutable once the audit store commits it; there is no update or delete
//! path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::EntryId;

use super::event::{ChangeAction, ChangeEvent};

/// A single durable audit entry
///
/// One entry is written per change event the recorder successfully
/// processes. The entry carries the record's type name as a string rather
/// than any reference to the record itself, so its lifetime is decoupled
/// from the record's.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Store-assigned id, monotonically increasing by insertion order.
    /// [`EntryId::UNASSIGNED`] until the store commits the entry.
    pub id: EntryId,

    /// Type name of the audited record, e.g. "Product"
    pub record_name: String,

    /// String form of the record's identifier
    pub record_id: String,

    /// The mutation kind that produced this entry
    pub action: ChangeAction,

    /// Actor identity; the sentinel "system" unless a real identity
    /// provider is plugged in
    pub changed_by: String,

    /// When the recorder processed the event (not when the mutation
    /// happened)
    pub timestamp: DateTime<Utc>,

    /// Serialized form of the event's change map
    pub changes_payload: String,
}

impl AuditEntry {
    /// Build an entry from a change event and its serialized payload
    ///
    /// The timestamp is taken at construction, which is the moment the
    /// recorder processes the event.
    pub fn from_event(event: &ChangeEvent, changed_by: impl Into<String>, payload: String) -> Self {
        Self {
            id: EntryId::UNASSIGNED,
            record_name: event.record_name.clone(),
            record_id: event.record_id.clone(),
            action: event.action,
            changed_by: changed_by.into(),
            timestamp: Utc::now(),
            changes_payload: payload,
        }
    }

    /// Format the entry for human-readable output
    pub fn format_human_readable(&self) -> String {
        format!(
            "[{}] #{} {} {} {} by {}\n  Changes: {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            self.id,
            self.action,
            self.record_name,
            self.record_id,
            self.changed_by,
            self.changes_payload
        )
    }
}
