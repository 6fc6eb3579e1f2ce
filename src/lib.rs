// src/lib.rs

//! Provisor provisioning director
//!
//! Installs, updates and removes installable units in managed profiles by
//! resolving each change into a closed, singleton-consistent unit set and
//! applying the resulting operations in dependency order, with every change
//! recorded for revert.
//!
//! # Architecture
//!
//! - Units: versioned descriptors providing and requiring capabilities
//! - Resolver: closure over the metadata index with stability preference
//! - Planner: install/update/uninstall ordering with atomic batches
//! - Director: per-profile locking, snapshots before change, all-or-nothing apply
//! - Rollback repository: SQLite history of profile snapshots

pub mod artifact;
pub mod config;
pub mod director;
mod error;
pub mod location;
pub mod logging;
pub mod metadata;
pub mod profile;
pub mod progress;
pub mod resolver;
pub mod rollback;
pub mod transaction;
pub mod version;

pub use artifact::{ArtifactStager, DescriptorStager, NoopStager};
pub use config::{DirectorConfig, parse_config_file, parse_config_string};
pub use director::{AvailableUpdate, Director, ProvisionOptions, Severity, Status};
pub use error::{Error, Result};
pub use metadata::{
    CompositeIndex, InMemoryIndex, InstallableUnit, IuKey, MetadataIndex,
    MetadataRepositoryManager, ProvidedCapability, Requirement,
};
pub use profile::{Profile, ProfileChangeRequest, ProfileRegistry, ProvisioningContext};
pub use progress::{
    CallbackProgress, LogProgress, ProgressEvent, ProgressTracker, ProvisionPhase, SilentProgress,
};
pub use resolver::{Conflict, Resolution, Resolver, ResolverOptions};
pub use rollback::{ProfileSnapshot, RollbackRepository, SnapshotRef, SqliteRollbackRepository};
pub use transaction::{Operation, OperationKind, OperationPlan, OperationPlanner, PlannedOperation};
pub use version::{Version, VersionRange};
