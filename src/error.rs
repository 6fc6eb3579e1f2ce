// src/error.rs

//! Error types for provisioning operations

use crate::resolver::Conflict;
use crate::rollback::SnapshotRef;
use crate::transaction::Operation;
use thiserror::Error;

/// Errors that can occur while resolving, planning or applying a change
#[derive(Error, Debug)]
pub enum Error {
    /// Rollback repository database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Metadata or snapshot (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration file could not be parsed
    #[error("Failed to parse configuration: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid version '{input}': {reason}")]
    InvalidVersion { input: String, reason: String },

    #[error("Invalid version range '{input}': {reason}")]
    InvalidRange { input: String, reason: String },

    #[error("Invalid repository location '{0}'")]
    InvalidLocation(String),

    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    #[error("Profile already exists: {0}")]
    ProfileExists(String),

    #[error("Metadata repository not registered: {0}")]
    RepositoryNotFound(String),

    /// The requested change has no consistent closure
    #[error("Cannot resolve request: {}", format_conflicts(.0))]
    Unresolvable(Vec<Conflict>),

    /// Singleton replacements that cannot be linearized
    #[error("Cyclic replacement between {}", .ids.join(", "))]
    CyclicReplacement { ids: Vec<String> },

    /// A single install/uninstall/update step failed; the profile was restored
    #[error("Operation {index} ({operation}) failed: {reason}")]
    OperationFailure {
        index: usize,
        operation: Operation,
        reason: String,
    },

    /// An artifact could not be staged or unstaged
    #[error("Artifact error: {0}")]
    Artifact(String),

    #[error("Snapshot not found: {0}")]
    SnapshotNotFound(SnapshotRef),

    #[error("Snapshot {snapshot} belongs to profile '{owner}', not '{profile}'")]
    SnapshotProfileMismatch {
        snapshot: SnapshotRef,
        owner: String,
        profile: String,
    },

    /// Cancellation was observed between operations; the profile was restored
    #[error("Cancelled after {completed} operation(s)")]
    Cancelled { completed: usize },
}

fn format_conflicts(conflicts: &[Conflict]) -> String {
    conflicts
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type for provisioning operations
pub type Result<T> = std::result::Result<T, Error>;
