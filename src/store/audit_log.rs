//! Append-only audit store
//!
//! Persists audit entries to a line-delimited JSON file (JSONL), one entry
//! per line. Writes go through explicit transactions: entries staged in an
//! [`AuditTxn`] become durable at commit, when the store assigns their ids
//! and appends them in one flush. Rollback discards the staged entries.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use tracing::debug;

use crate::audit::entry::AuditEntry;
use crate::error::{TrailError, TrailResult};
use crate::models::EntryId;

use super::txn::{TxnContext, TxnRestoreGuard, TxnToken};

/// Append-only store for audit entries
///
/// Entry ids are assigned at commit under a single lock, so ids increase
/// monotonically in insertion order across all threads and concurrent
/// commits serialize on the write path.
#[derive(Debug)]
pub struct AuditStore {
    log_path: PathBuf,
    next_id: Mutex<u64>,
}

/// A unit of staged audit writes
///
/// Dropping an uncommitted transaction discards its entries, so rollback is
/// simply not committing.
pub struct AuditTxn {
    token: TxnToken,
    staged: Vec<AuditEntry>,
}

impl AuditTxn {
    /// Stage an entry for the commit of this transaction
    pub fn append(&mut self, entry: AuditEntry) {
        self.staged.push(entry);
    }

    /// Number of staged entries
    pub fn staged_count(&self) -> usize {
        self.staged.len()
    }

    /// This transaction's context token
    pub fn token(&self) -> TxnToken {
        self.token
    }
}

impl AuditStore {
    /// Open the store, recovering the id sequence from any existing log
    pub fn open(log_path: PathBuf) -> TrailResult<Self> {
        let next_id = match recover_max_id(&log_path)? {
            Some(max) => max + 1,
            None => 1,
        };

        Ok(Self {
            log_path,
            next_id: Mutex::new(next_id),
        })
    }

    /// Begin a new transaction with no staged entries
    pub fn begin(&self) -> AuditTxn {
        AuditTxn {
            token: TxnToken::fresh(),
            staged: Vec::new(),
        }
    }

    /// Make a transaction's staged entries durable
    ///
    /// Assigns ids, appends all entries as JSON lines, and flushes once. If
    /// anything fails, nothing is appended and the id sequence is left
    /// untouched; the staged entries are lost with the transaction.
    pub fn commit(&self, txn: AuditTxn) -> TrailResult<Vec<EntryId>> {
        if txn.staged.is_empty() {
            return Ok(Vec::new());
        }

        let mut next_id = self
            .next_id
            .lock()
            .map_err(|e| TrailError::AuditPersistence(format!("Failed to acquire id lock: {}", e)))?;

        // Render every line before touching the file so a serialization
        // failure cannot leave a partial batch behind.
        let mut ids = Vec::with_capacity(txn.staged.len());
        let mut lines = String::new();
        for (offset, mut entry) in txn.staged.into_iter().enumerate() {
            entry.id = EntryId(*next_id + offset as u64);
            ids.push(entry.id);

            let json = serde_json::to_string(&entry).map_err(|e| {
                TrailError::AuditPersistence(format!("Failed to serialize audit entry: {}", e))
            })?;
            lines.push_str(&json);
            lines.push('\n');
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .map_err(|e| TrailError::AuditPersistence(format!("Failed to open audit log: {}", e)))?;

        file.write_all(lines.as_bytes())
            .map_err(|e| TrailError::AuditPersistence(format!("Failed to write audit entries: {}", e)))?;

        file.flush()
            .map_err(|e| TrailError::AuditPersistence(format!("Failed to flush audit log: {}", e)))?;

        *next_id += ids.len() as u64;
        debug!(entries = ids.len(), "audit transaction committed");
        Ok(ids)
    }

    /// Discard a transaction's staged entries
    pub fn rollback(&self, txn: AuditTxn) {
        debug!(entries = txn.staged.len(), "audit transaction rolled back");
        drop(txn);
    }

    /// Run `body` inside a transaction isolated from the caller's
    ///
    /// Saves the context's active transaction token (if any), begins a fresh
    /// audit transaction, and commits it if `body` succeeds or rolls it back
    /// if `body` fails. The caller's token is restored on every exit path,
    /// including panics, so the outer transaction's outcome is never coupled
    /// to this one's.
    pub fn with_isolated_txn<T, F>(&self, ctx: &mut TxnContext, body: F) -> TrailResult<T>
    where
        F: FnOnce(&mut AuditTxn) -> TrailResult<T>,
    {
        let _restore = TxnRestoreGuard::suspend(ctx);

        let mut txn = self.begin();
        match body(&mut txn) {
            Ok(value) => {
                self.commit(txn)?;
                Ok(value)
            }
            Err(err) => {
                self.rollback(txn);
                Err(err)
            }
        }
    }

    /// Read all entries in insertion order (oldest first)
    pub fn read_all(&self) -> TrailResult<Vec<AuditEntry>> {
        if !self.log_path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.log_path)
            .map_err(|e| TrailError::Storage(format!("Failed to open audit log: {}", e)))?;

        let reader = BufReader::new(file);
        let mut entries = Vec::new();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| {
                TrailError::Storage(format!("Failed to read audit log line {}: {}", line_num + 1, e))
            })?;

            if line.trim().is_empty() {
                continue;
            }

            let entry: AuditEntry = serde_json::from_str(&line).map_err(|e| {
                TrailError::Storage(format!(
                    "Failed to parse audit entry at line {}: {}",
                    line_num + 1,
                    e
                ))
            })?;

            entries.push(entry);
        }

        Ok(entries)
    }

    /// Number of durable entries
    pub fn entry_count(&self) -> TrailResult<usize> {
        Ok(self.read_all()?.len())
    }

    /// Path to the underlying log file
    pub fn path(&self) -> &PathBuf {
        &self.log_path
    }
}

/// Scan an existing log for the highest assigned id
fn recover_max_id(log_path: &PathBuf) -> TrailResult<Option<u64>> {
    if !log_path.exists() {
        return Ok(None);
    }

    let file = File::open(log_path)?;
    let reader = BufReader::new(file);
    let mut max = None;

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let entry: AuditEntry = serde_json::from_str(&line)?;
        max = Some(max.map_or(entry.id.0, |m: u64| m.max(entry.id.0)));
    }

    Ok(max)
}
