//! Core data models for fieldtrail

pub mod ids;
pub mod record;

pub use ids::{EntryId, RecordId};
pub use record::Record;
