//! Error types for the migration pipeline.
//!
//! All errors use `thiserror` for ergonomic error handling and proper error chains.
//! Per-component failures are not errors: they are recorded on the component
//! as a [`FailureReason`](crate::types::FailureReason) and the run continues.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, ScosError>;

/// Main error type for the migration pipeline.
#[derive(Error, Debug)]
pub enum ScosError {
    // Manifest errors
    #[error("Invalid manifest: {reason}")]
    InvalidManifest { reason: String },

    #[error("Failed to read manifest {path:?}: {source}")]
    ManifestReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Run-level outcome errors
    #[error("No component was rebuilt successfully ({failed} failed); refusing to compose a release")]
    NoSuccessfulBuilds { failed: usize },

    #[error("Run aborted by operator: {stage}")]
    Aborted { stage: String },

    #[error("Invalid state transition for {component}: {from} -> {to}")]
    InvalidTransition { component: String, from: String, to: String },

    // Collaborator errors
    #[error("{tool} failed: {reason}")]
    CollaboratorFailed { tool: String, reason: String },

    #[error("{tool} timed out after {secs}s")]
    CollaboratorTimeout { tool: String, secs: u64 },

    // File system errors
    #[error("I/O error at {path:?}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Database migration failed: {reason}")]
    MigrationFailed { reason: String },

    // Configuration errors
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ScosError {
    /// Shorthand for a failed collaborator invocation.
    pub fn collaborator(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CollaboratorFailed { tool: tool.into(), reason: reason.into() }
    }
}
