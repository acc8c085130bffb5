//! Storage layer for fieldtrail
//!
//! The record store is the persistence engine whose mutations are audited;
//! the audit store is the append-only destination for audit entries. The
//! [`AuditPipeline`] coordinator wires the two together through the event
//! bus and recorder.

pub mod audit_log;
pub mod records;
pub mod txn;

pub use audit_log::{AuditStore, AuditTxn};
pub use records::{RecordStore, RecordTxn};
pub use txn::{TxnContext, TxnRestoreGuard, TxnToken};

use std::sync::Arc;

use crate::audit::{AuditRecorder, ChangeCapture, EventBus};
use crate::config::paths::TrailPaths;
use crate::error::TrailResult;

/// Fully wired capture-to-record pipeline
///
/// Owns the record store (with its capture hook and bus) and shares the
/// audit store it records into. Subscription happens once here, at wiring
/// time; there is no later subscribe or unsubscribe path.
pub struct AuditPipeline {
    /// The audited persistence engine
    pub records: RecordStore,
    /// The append-only audit destination
    pub audit: Arc<AuditStore>,
}

impl AuditPipeline {
    /// Open the pipeline with the default recorder (system actor, JSON
    /// codec) at the configured audit log path
    pub fn open(paths: &TrailPaths) -> TrailResult<Self> {
        paths.ensure_directories()?;
        let audit = Arc::new(AuditStore::open(paths.audit_log_file())?);
        let recorder = AuditRecorder::new(Arc::clone(&audit));
        Ok(Self::wire(audit, recorder))
    }

    /// Wire a pipeline around a custom recorder
    ///
    /// Used to inject a non-default actor provider or change codec.
    pub fn wire(audit: Arc<AuditStore>, recorder: AuditRecorder) -> Self {
        let mut bus = EventBus::new();
        Arc::new(recorder).subscribe(&mut bus);

        let capture = ChangeCapture::new(bus);
        Self {
            records: RecordStore::new(capture),
            audit,
        }
    }

    /// Opt a record kind in to auditing
    pub fn enroll(&self, kind: impl Into<String>) {
        self.records.capture().enroll(kind);
    }
}
