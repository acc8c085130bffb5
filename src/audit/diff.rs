//! Change extraction for audit capture
//!
//! Computes the set of changed fields from before/after snapshots of a
//! mutated record and renders each as an `"<old> -> <new>"` description.
//! Pure functions, no I/O.

use std::collections::BTreeMap;

use serde_json::Value;

use super::event::{ChangeAction, ChangeEvent};

/// Build a change event for a freshly inserted record
///
/// Every field is rendered as `"null -> <current>"`, including fields whose
/// value is itself null (`"null -> null"` is a real change on creation, not
/// a no-op). Returns `None` only for a record with no fields at all.
pub fn extract_create(
    record_name: &str,
    record_id: &str,
    field_names: &[String],
    state: &[Value],
) -> Option<ChangeEvent> {
    let mut changes = BTreeMap::new();
    for (index, name) in field_names.iter().enumerate() {
        let current = state.get(index).unwrap_or(&Value::Null);
        changes.insert(name.clone(), format!("null -> {}", render_value(current)));
    }

    ChangeEvent::new(record_name, record_id, ChangeAction::Create, changes)
}

/// Build a change event for an updated record
///
/// Only the fields flagged dirty by the persistence engine are compared; the
/// dirty signal is consumed, not recomputed. A dirty field whose rendered
/// old and new descriptions are identical is skipped as a no-op. Returns
/// `None` when no field produces a description, so an empty-diff event is
/// never dispatched.
pub fn extract_update(
    record_name: &str,
    record_id: &str,
    field_names: &[String],
    old_state: &[Value],
    new_state: &[Value],
    dirty: &[usize],
) -> Option<ChangeEvent> {
    let mut changes = BTreeMap::new();
    for &index in dirty {
        let Some(name) = field_names.get(index) else {
            continue;
        };
        let old = old_state.get(index).unwrap_or(&Value::Null);
        let new = new_state.get(index).unwrap_or(&Value::Null);

        let old_rendered = render_value(old);
        let new_rendered = render_value(new);
        if old_rendered == new_rendered {
            continue;
        }

        changes.insert(name.clone(), format!("{} -> {}", old_rendered, new_rendered));
    }

    ChangeEvent::new(record_name, record_id, ChangeAction::Update, changes)
}

/// Render a field value for a change description
///
/// Strings render bare (no surrounding quotes), absent values render as the
/// literal `null`, numbers keep their shortest JSON form, and composite
/// values fall back to compact JSON.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}
