//! fieldtrail - Field-level audit trail for tracked records
//!
//! This library records an append-only trail of who changed which fields of
//! a tracked record, and when, without letting audit-recording failures
//! affect the primary data-mutating operation that triggered them.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `config`: Path management for the audit log location
//! - `error`: Custom error types
//! - `models`: Tracked records and strongly-typed identifiers
//! - `audit`: The capture-and-dispatch pipeline (extractor, event bus,
//!   capture hook, recorder, durable entry shape)
//! - `store`: The record store, the append-only audit store, and the
//!   explicit transaction context
//!
//! # Example
//!
//! ```rust,ignore
//! use fieldtrail::config::TrailPaths;
//! use fieldtrail::models::Record;
//! use fieldtrail::store::{AuditPipeline, TxnContext};
//!
//! let paths = TrailPaths::new()?;
//! let pipeline = AuditPipeline::open(&paths)?;
//! pipeline.enroll("Product");
//!
//! let mut ctx = TxnContext::new();
//! pipeline.records.execute(&mut ctx, |txn| {
//!     Ok(pipeline.records.insert(txn, Record::new("Product", fields)))
//! })?;
//! // One CREATE audit entry is now durable, committed independently of
//! // the record transaction.
//! ```

pub mod audit;
pub mod config;
pub mod error;
pub mod models;
pub mod store;

pub use error::{TrailError, TrailResult};
