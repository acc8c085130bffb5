//! Custom error types for fieldtrail
//!
//! This module defines the error hierarchy for the crate using thiserror
//! for ergonomic error definitions.

use thiserror::Error;

/// The main error type for fieldtrail operations
#[derive(Error, Debug)]
pub enum TrailError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// The change map could not be rendered to its transport string
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The isolated transaction failed to commit an audit entry
    #[error("Audit persistence error: {0}")]
    AuditPersistence(String),

    /// Record store errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Record not found errors
    #[error("{kind} not found: {identifier}")]
    NotFound { kind: String, identifier: String },
}

impl TrailError {
    /// Create a "not found" error for a tracked record
    pub fn record_not_found(kind: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            identifier: identifier.into(),
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is a serialization error
    pub fn is_serialization(&self) -> bool {
        matches!(self, Self::Serialization(_))
    }

    /// Check if this is an audit persistence error
    pub fn is_audit_persistence(&self) -> bool {
        matches!(self, Self::AuditPersistence(_))
    }
}

// Implement From traits for common error types

impl From<std::io::Error> for TrailError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for TrailError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

/// Result type alias for fieldtrail operations
pub type TrailResult<T> = Result<T, TrailError>;
