//! Record store with flush-time change capture
//!
//! A minimal persistence engine for tracked records: an in-memory map with
//! explicit transactions. Writes are staged in a [`RecordTxn`], the capture
//! hook fires at flush (before commit), and commit applies the staged writes
//! to the committed state. The engine owns dirty-field detection: an
//! update's dirty set is computed here by comparing staged values against
//! committed values, and handed to the capture hook as an external signal.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use serde_json::Value;

use crate::audit::ChangeCapture;
use crate::error::{TrailError, TrailResult};
use crate::models::{Record, RecordId};

use super::txn::{TxnContext, TxnToken};

/// One staged write, captured with enough state to replay it at commit
enum StagedWrite {
    Insert {
        record: Record,
    },
    Update {
        id: RecordId,
        /// Field name -> new value, merged over the committed record
        fields: BTreeMap<String, Value>,
    },
}

/// A unit of staged record mutations
///
/// Begins registered in the caller's [`TxnContext`]; committing or rolling
/// back clears the registration. Dropping an uncommitted transaction
/// discards its writes.
pub struct RecordTxn {
    token: TxnToken,
    staged: Vec<StagedWrite>,
    flushed: bool,
}

impl RecordTxn {
    /// This transaction's context token
    pub fn token(&self) -> TxnToken {
        self.token
    }

    /// Number of staged writes
    pub fn staged_count(&self) -> usize {
        self.staged.len()
    }
}

/// In-memory persistence engine for tracked records
pub struct RecordStore {
    data: RwLock<HashMap<RecordId, Record>>,
    capture: ChangeCapture,
}

impl RecordStore {
    /// Create a store wired to a capture hook
    pub fn new(capture: ChangeCapture) -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
            capture,
        }
    }

    /// The capture hook, for enrolling record kinds
    pub fn capture(&self) -> &ChangeCapture {
        &self.capture
    }

    /// Begin a transaction and register it in the context
    pub fn begin(&self, ctx: &mut TxnContext) -> RecordTxn {
        let txn = RecordTxn {
            token: TxnToken::fresh(),
            staged: Vec::new(),
            flushed: false,
        };
        ctx.enter(txn.token);
        txn
    }

    /// Stage a new record for insertion
    pub fn insert(&self, txn: &mut RecordTxn, record: Record) -> RecordId {
        let id = record.id;
        txn.staged.push(StagedWrite::Insert { record });
        id
    }

    /// Stage a partial update, merging `fields` over the committed record
    ///
    /// Fails with NotFound if the record has no committed state; updating a
    /// record staged in the same transaction is not supported.
    pub fn update(
        &self,
        txn: &mut RecordTxn,
        id: RecordId,
        fields: BTreeMap<String, Value>,
    ) -> TrailResult<()> {
        let data = self
            .data
            .read()
            .map_err(|e| TrailError::Storage(format!("Failed to acquire read lock: {}", e)))?;

        if !data.contains_key(&id) {
            return Err(TrailError::record_not_found("Record", id.to_string()));
        }
        drop(data);

        txn.staged.push(StagedWrite::Update { id, fields });
        Ok(())
    }

    /// Fire the capture hook for every staged write
    ///
    /// Runs before commit, on the calling thread, with the caller's context:
    /// this is the point where audit entries become durable, strictly before
    /// the outcome of this transaction is known. Flushing twice is a no-op
    /// for capture purposes.
    pub fn flush(&self, txn: &mut RecordTxn, ctx: &mut TxnContext) -> TrailResult<()> {
        if txn.flushed {
            return Ok(());
        }

        for write in &txn.staged {
            match write {
                StagedWrite::Insert { record } => {
                    self.capture.on_insert(record, ctx);
                }
                StagedWrite::Update { id, fields } => {
                    let (after, old_state, dirty) = self.diff_against_committed(*id, fields)?;
                    self.capture.on_update(&after, &old_state, &dirty, ctx);
                }
            }
        }

        txn.flushed = true;
        Ok(())
    }

    /// Apply a transaction's staged writes to the committed state
    ///
    /// Flushes first if the caller has not; capture always fires before any
    /// write becomes visible.
    pub fn commit(&self, mut txn: RecordTxn, ctx: &mut TxnContext) -> TrailResult<()> {
        self.flush(&mut txn, ctx)?;

        let mut data = self
            .data
            .write()
            .map_err(|e| TrailError::Storage(format!("Failed to acquire write lock: {}", e)))?;

        for write in txn.staged {
            match write {
                StagedWrite::Insert { record } => {
                    data.insert(record.id, record);
                }
                StagedWrite::Update { id, fields } => {
                    if let Some(record) = data.get_mut(&id) {
                        for (name, value) in fields {
                            record.fields.insert(name, value);
                        }
                    }
                }
            }
        }

        ctx.exit();
        Ok(())
    }

    /// Discard a transaction's staged writes
    ///
    /// Any audit entries already committed during flush stay durable; the
    /// record store and the audit trail are allowed to diverge in exactly
    /// this window.
    pub fn rollback(&self, txn: RecordTxn, ctx: &mut TxnContext) {
        drop(txn);
        ctx.exit();
    }

    /// Begin, run `body`, flush, and commit in one call
    pub fn execute<T, F>(&self, ctx: &mut TxnContext, body: F) -> TrailResult<T>
    where
        F: FnOnce(&mut RecordTxn) -> TrailResult<T>,
    {
        let mut txn = self.begin(ctx);
        match body(&mut txn) {
            Ok(value) => {
                self.commit(txn, ctx)?;
                Ok(value)
            }
            Err(err) => {
                self.rollback(txn, ctx);
                Err(err)
            }
        }
    }

    /// Get a committed record by id
    pub fn get(&self, id: RecordId) -> TrailResult<Option<Record>> {
        let data = self
            .data
            .read()
            .map_err(|e| TrailError::Storage(format!("Failed to acquire read lock: {}", e)))?;
        Ok(data.get(&id).cloned())
    }

    /// Number of committed records
    pub fn count(&self) -> TrailResult<usize> {
        let data = self
            .data
            .read()
            .map_err(|e| TrailError::Storage(format!("Failed to acquire read lock: {}", e)))?;
        Ok(data.len())
    }

    /// Build the after-image, before-state array, and dirty index set for a
    /// staged update
    fn diff_against_committed(
        &self,
        id: RecordId,
        fields: &BTreeMap<String, Value>,
    ) -> TrailResult<(Record, Vec<Value>, Vec<usize>)> {
        let data = self
            .data
            .read()
            .map_err(|e| TrailError::Storage(format!("Failed to acquire read lock: {}", e)))?;

        let committed = data
            .get(&id)
            .ok_or_else(|| TrailError::record_not_found("Record", id.to_string()))?;

        let mut after = committed.clone();
        for (name, value) in fields {
            after.fields.insert(name.clone(), value.clone());
        }

        // Snapshot arrays are keyed by the after-image's field ordering;
        // fields absent from the committed state read as null.
        let names = after.field_names();
        let old_state: Vec<Value> = names
            .iter()
            .map(|name| committed.fields.get(name).cloned().unwrap_or(Value::Null))
            .collect();
        let new_state = after.field_values();

        let dirty: Vec<usize> = (0..names.len())
            .filter(|&i| old_state[i] != new_state[i])
            .collect();

        Ok((after, old_state, dirty))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{ChangeAction, ChangeEvent, EventBus};
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn store_with_sink() -> (RecordStore, Arc<Mutex<Vec<ChangeEvent>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let mut bus = EventBus::new();
        bus.subscribe(Box::new(move |event, _| {
            sink.lock().unwrap().push(event.clone());
            Ok(())
        }));

        let capture = ChangeCapture::new(bus);
        capture.enroll("Product");
        (RecordStore::new(capture), seen)
    }

    fn product_fields() -> BTreeMap<String, Value> {
        let mut fields = BTreeMap::new();
        fields.insert("name".to_string(), json!("Laptop"));
        fields.insert("price".to_string(), json!(1200.50));
        fields
    }

    #[test]
    fn test_insert_commit_makes_record_visible() {
        let (store, seen) = store_with_sink();
        let mut ctx = TxnContext::new();

        let mut txn = store.begin(&mut ctx);
        let id = store.insert(&mut txn, Record::new("Product", product_fields()));
        store.commit(txn, &mut ctx).unwrap();

        assert!(!ctx.is_active());
        let record = store.get(id).unwrap().unwrap();
        assert_eq!(record.get("name"), Some(&json!("Laptop")));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_begin_registers_txn_in_context() {
        let (store, _seen) = store_with_sink();
        let mut ctx = TxnContext::new();

        let txn = store.begin(&mut ctx);
        assert_eq!(ctx.active(), Some(txn.token()));

        store.rollback(txn, &mut ctx);
        assert!(!ctx.is_active());
    }

    #[test]
    fn test_capture_fires_at_flush_before_commit() {
        let (store, seen) = store_with_sink();
        let mut ctx = TxnContext::new();

        let mut txn = store.begin(&mut ctx);
        let id = store.insert(&mut txn, Record::new("Product", product_fields()));
        store.flush(&mut txn, &mut ctx).unwrap();

        // Event published, but the record is not yet committed
        assert_eq!(seen.lock().unwrap().len(), 1);
        assert!(store.get(id).unwrap().is_none());

        store.commit(txn, &mut ctx).unwrap();
        assert!(store.get(id).unwrap().is_some());
    }

    #[test]
    fn test_flush_is_idempotent() {
        let (store, seen) = store_with_sink();
        let mut ctx = TxnContext::new();

        let mut txn = store.begin(&mut ctx);
        store.insert(&mut txn, Record::new("Product", product_fields()));
        store.flush(&mut txn, &mut ctx).unwrap();
        store.flush(&mut txn, &mut ctx).unwrap();
        store.commit(txn, &mut ctx).unwrap();

        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_update_dirty_set_is_computed_against_committed_state() {
        let (store, seen) = store_with_sink();
        let mut ctx = TxnContext::new();

        let id = store
            .execute(&mut ctx, |txn| {
                Ok(store.insert(txn, Record::new("Product", product_fields())))
            })
            .unwrap();
        seen.lock().unwrap().clear();

        let mut changes = BTreeMap::new();
        changes.insert("price".to_string(), json!(1350.75));
        // Unchanged value staged alongside a real change: not dirty
        changes.insert("name".to_string(), json!("Laptop"));

        store
            .execute(&mut ctx, |txn| store.update(txn, id, changes))
            .unwrap();

        let events = seen.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, ChangeAction::Update);
        assert_eq!(events[0].changes.len(), 1);
        assert_eq!(events[0].changes["price"], "1200.5 -> 1350.75");
    }

    #[test]
    fn test_no_op_update_publishes_nothing() {
        let (store, seen) = store_with_sink();
        let mut ctx = TxnContext::new();

        let id = store
            .execute(&mut ctx, |txn| {
                Ok(store.insert(txn, Record::new("Product", product_fields())))
            })
            .unwrap();
        seen.lock().unwrap().clear();

        let mut changes = BTreeMap::new();
        changes.insert("name".to_string(), json!("Laptop"));
        store
            .execute(&mut ctx, |txn| store.update(txn, id, changes))
            .unwrap();

        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_update_unknown_record_fails() {
        let (store, _seen) = store_with_sink();
        let mut ctx = TxnContext::new();

        let result = store.execute(&mut ctx, |txn| {
            store.update(txn, RecordId::new(), BTreeMap::new())
        });

        assert!(result.unwrap_err().is_not_found());
        assert!(!ctx.is_active());
    }

    #[test]
    fn test_rollback_discards_staged_writes() {
        let (store, _seen) = store_with_sink();
        let mut ctx = TxnContext::new();

        let mut txn = store.begin(&mut ctx);
        assert_eq!(txn.staged_count(), 0);
        let id = store.insert(&mut txn, Record::new("Product", product_fields()));
        assert_eq!(txn.staged_count(), 1);
        store.rollback(txn, &mut ctx);

        assert!(store.get(id).unwrap().is_none());
        assert_eq!(store.count().unwrap(), 0);
        assert!(!ctx.is_active());
    }

    #[test]
    fn test_rollback_after_flush_keeps_record_invisible() {
        let (store, seen) = store_with_sink();
        let mut ctx = TxnContext::new();

        let mut txn = store.begin(&mut ctx);
        let id = store.insert(&mut txn, Record::new("Product", product_fields()));
        store.flush(&mut txn, &mut ctx).unwrap();
        store.rollback(txn, &mut ctx);

        // The event was published at flush; the record never became visible
        assert_eq!(seen.lock().unwrap().len(), 1);
        assert!(store.get(id).unwrap().is_none());
    }

    #[test]
    fn test_unenrolled_kind_commits_without_events() {
        let (store, seen) = store_with_sink();
        let mut ctx = TxnContext::new();

        store
            .execute(&mut ctx, |txn| {
                Ok(store.insert(txn, Record::new("Order", product_fields())))
            })
            .unwrap();

        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(store.count().unwrap(), 1);
    }
}
