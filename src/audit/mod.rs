//! Change-capture-and-dispatch pipeline
//!
//! Records which fields of a tracked record changed, and delivers that diff
//! to an audit recorder whose persistence is isolated from the triggering
//! operation.
//!
//! # Architecture
//!
//! - [`diff`]: pure change extraction over before/after field snapshots.
//! - [`ChangeEvent`]: the transient value describing one record's diff.
//! - [`EventBus`]: synchronous in-process fanout from the capture hook to
//!   subscribers, with per-handler failure isolation.
//! - [`ChangeCapture`]: the flush-time hook the persistence engine calls,
//!   filtered by a registry of enrolled record kinds.
//! - [`AuditRecorder`]: the sole subscriber; serializes the change map and
//!   persists an [`AuditEntry`] in an isolated transaction.
//!
//! The whole pipeline runs synchronously on the mutating thread. The audit
//! transaction commits before the outer transaction's outcome is known, so
//! an entry can outlive a rolled-back mutation; that divergence window is a
//! documented property of the design, not a bug.

pub mod bus;
pub mod capture;
pub mod diff;
pub mod entry;
pub mod event;
pub mod recorder;

pub use bus::{ChangeHandler, EventBus};
pub use capture::ChangeCapture;
pub use diff::{extract_create, extract_update, render_value};
pub use entry::AuditEntry;
pub use event::{ChangeAction, ChangeEvent};
pub use recorder::{
    ActorProvider, AuditRecorder, ChangeCodec, JsonChangeCodec, SystemActor,
};
