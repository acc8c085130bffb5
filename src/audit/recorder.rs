//! Audit recorder
//!
//! The sole in-scope subscriber on the event bus. On each change event it
//! serializes the change map, builds an [`AuditEntry`], and persists it in a
//! transaction isolated from the caller's. Every failure mode here is
//! terminal and local: the event is dropped with a logged diagnostic, and no
//! error ever influences the outcome of the mutation that produced the
//! event.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::error::{TrailError, TrailResult};
use crate::store::audit_log::AuditStore;
use crate::store::txn::TxnContext;

use super::bus::EventBus;
use super::entry::AuditEntry;
use super::event::ChangeEvent;

/// Source of the actor identity stamped on audit entries
///
/// An extension point: no identity propagation is implemented in this crate,
/// so the default is the fixed [`SystemActor`] sentinel.
pub trait ActorProvider: Send + Sync {
    /// Identity of the actor responsible for the current mutation
    fn current_actor(&self) -> String;
}

/// Default actor provider returning the "system" sentinel
pub struct SystemActor;

impl ActorProvider for SystemActor {
    fn current_actor(&self) -> String {
        "system".to_string()
    }
}

/// Encodes a change map into the transport string stored in an entry
pub trait ChangeCodec: Send + Sync {
    /// Render the change map; a failure drops the event
    fn encode(&self, changes: &BTreeMap<String, String>) -> TrailResult<String>;
}

/// Default codec: the change map as a JSON object
pub struct JsonChangeCodec;

impl ChangeCodec for JsonChangeCodec {
    fn encode(&self, changes: &BTreeMap<String, String>) -> TrailResult<String> {
        serde_json::to_string(changes)
            .map_err(|e| TrailError::Serialization(format!("Failed to encode change map: {}", e)))
    }
}

/// Persists one audit entry per received change event
pub struct AuditRecorder {
    store: Arc<AuditStore>,
    actor: Box<dyn ActorProvider>,
    codec: Box<dyn ChangeCodec>,
}

impl AuditRecorder {
    /// Create a recorder with the system actor and JSON codec
    pub fn new(store: Arc<AuditStore>) -> Self {
        Self {
            store,
            actor: Box::new(SystemActor),
            codec: Box::new(JsonChangeCodec),
        }
    }

    /// Replace the actor identity source
    pub fn with_actor(mut self, actor: Box<dyn ActorProvider>) -> Self {
        self.actor = actor;
        self
    }

    /// Replace the change map codec
    pub fn with_codec(mut self, codec: Box<dyn ChangeCodec>) -> Self {
        self.codec = codec;
        self
    }

    /// Handle one change event
    ///
    /// Encodes the change map, stamps the entry with the actor identity and
    /// the processing-time clock reading, and writes it inside an isolated
    /// transaction on the audit store. The caller's active transaction is
    /// suspended for the duration and restored before this returns, on both
    /// success and failure paths. Errors returned here are caught and logged
    /// at the bus boundary; they never reach the publisher.
    pub fn on_change_event(&self, event: &ChangeEvent, ctx: &mut TxnContext) -> TrailResult<()> {
        let payload = self.codec.encode(&event.changes)?;
        let entry = AuditEntry::from_event(event, self.actor.current_actor(), payload);

        self.store.with_isolated_txn(ctx, |txn| {
            txn.append(entry);
            Ok(())
        })?;

        debug!(
            record = %event.record_name,
            record_id = %event.record_id,
            action = %event.action,
            "audit entry recorded"
        );
        Ok(())
    }

    /// Subscribe this recorder to a bus
    pub fn subscribe(self: Arc<Self>, bus: &mut EventBus) {
        let recorder = self;
        bus.subscribe(Box::new(move |event, ctx| {
            recorder.on_change_event(event, ctx)
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::event::ChangeAction;
    use crate::models::EntryId;
    use crate::store::txn::TxnToken;
    use tempfile::TempDir;

    fn test_store() -> (Arc<AuditStore>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(AuditStore::open(temp_dir.path().join("audit.log")).unwrap());
        (store, temp_dir)
    }

    fn update_event() -> ChangeEvent {
        let mut changes = BTreeMap::new();
        changes.insert("price".to_string(), "1200.5 -> 1350.75".to_string());
        ChangeEvent::new("Product", "rec-1", ChangeAction::Update, changes).unwrap()
    }

    struct FailingCodec;

    impl ChangeCodec for FailingCodec {
        fn encode(&self, _changes: &BTreeMap<String, String>) -> TrailResult<String> {
            Err(TrailError::Serialization("injected codec failure".into()))
        }
    }

    struct NamedActor(&'static str);

    impl ActorProvider for NamedActor {
        fn current_actor(&self) -> String {
            self.0.to_string()
        }
    }

    #[test]
    fn test_records_one_entry_per_event() {
        let (store, _temp) = test_store();
        let recorder = AuditRecorder::new(Arc::clone(&store));

        let mut ctx = TxnContext::new();
        recorder.on_change_event(&update_event(), &mut ctx).unwrap();

        let entries = store.read_all().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, EntryId(1));
        assert_eq!(entries[0].record_name, "Product");
        assert_eq!(entries[0].record_id, "rec-1");
        assert_eq!(entries[0].action, ChangeAction::Update);
        assert_eq!(entries[0].changed_by, "system");
        assert_eq!(
            entries[0].changes_payload,
            "{\"price\":\"1200.5 -> 1350.75\"}"
        );
    }

    #[test]
    fn test_codec_failure_drops_event_without_persisting() {
        let (store, _temp) = test_store();
        let recorder = AuditRecorder::new(Arc::clone(&store)).with_codec(Box::new(FailingCodec));

        let outer = TxnToken::fresh();
        let mut ctx = TxnContext::new();
        ctx.enter(outer);

        let err = recorder
            .on_change_event(&update_event(), &mut ctx)
            .unwrap_err();
        assert!(err.is_serialization());

        // Nothing persisted, caller's transaction untouched
        assert_eq!(store.entry_count().unwrap(), 0);
        assert_eq!(ctx.active(), Some(outer));
    }

    #[test]
    fn test_persistence_failure_restores_caller_context() {
        let temp_dir = TempDir::new().unwrap();
        let store =
            Arc::new(AuditStore::open(temp_dir.path().join("missing").join("audit.log")).unwrap());
        let recorder = AuditRecorder::new(Arc::clone(&store));

        let outer = TxnToken::fresh();
        let mut ctx = TxnContext::new();
        ctx.enter(outer);

        let err = recorder
            .on_change_event(&update_event(), &mut ctx)
            .unwrap_err();
        assert!(err.is_audit_persistence());
        assert_eq!(ctx.active(), Some(outer));
    }

    #[test]
    fn test_custom_actor_is_stamped() {
        let (store, _temp) = test_store();
        let recorder =
            AuditRecorder::new(Arc::clone(&store)).with_actor(Box::new(NamedActor("alice")));

        let mut ctx = TxnContext::new();
        recorder.on_change_event(&update_event(), &mut ctx).unwrap();

        assert_eq!(store.read_all().unwrap()[0].changed_by, "alice");
    }

    #[test]
    fn test_subscribe_wires_recorder_to_bus() {
        let (store, _temp) = test_store();
        let recorder = Arc::new(AuditRecorder::new(Arc::clone(&store)));

        let mut bus = EventBus::new();
        recorder.subscribe(&mut bus);
        assert_eq!(bus.handler_count(), 1);

        let mut ctx = TxnContext::new();
        bus.publish(&update_event(), &mut ctx);

        assert_eq!(store.entry_count().unwrap(), 1);
    }
}
