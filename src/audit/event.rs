//! Change event produced by the extractor and carried by the event bus
//!
//! A change event is a transient value: it lives only for the duration of the
//! synchronous capture -> dispatch -> record call chain and is never persisted
//! directly.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The kind of mutation a change event describes
///
/// Deletions are an explicit gap in the trail: the capture hook only fires
/// for inserts and updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeAction {
    /// The record was created
    Create,
    /// The record was updated
    Update,
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeAction::Create => write!(f, "CREATE"),
            ChangeAction::Update => write!(f, "UPDATE"),
        }
    }
}

/// One record's create/update diff
///
/// `changes` maps each changed field name to a description formatted as
/// `"<old> -> <new>"`, where `<old>` is the literal string `null` for a
/// field with no prior value. The map is never empty: the extractor returns
/// `None` instead of constructing an empty-diff event.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    /// Type name of the mutated record, e.g. "Product"
    pub record_name: String,

    /// String form of the record's identifier
    pub record_id: String,

    /// Whether this was a create or an update
    pub action: ChangeAction,

    /// Field name -> "<old> -> <new>" description
    pub changes: BTreeMap<String, String>,
}

impl ChangeEvent {
    /// Construct an event from a non-empty change map
    ///
    /// Returns `None` when `changes` is empty so that no downstream component
    /// ever observes an empty-diff event.
    pub fn new(
        record_name: impl Into<String>,
        record_id: impl Into<String>,
        action: ChangeAction,
        changes: BTreeMap<String, String>,
    ) -> Option<Self> {
        if changes.is_empty() {
            return None;
        }
        Some(Self {
            record_name: record_name.into(),
            record_id: record_id.into(),
            action,
            changes,
        })
    }
}
