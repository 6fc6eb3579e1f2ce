// src/rollback/mod.rs

//! Rollback repository
//!
//! Before a change is applied to a profile, the director records an immutable
//! snapshot of the profile's units and properties. Reverting to a snapshot
//! makes its unit set the target of a new provisioning run.
//!
//! Snapshots are identified by an opaque [`SnapshotRef`] and listed newest
//! first per profile.

mod schema;
mod sqlite;

pub use sqlite::SqliteRollbackRepository;

use crate::error::Result;
use crate::metadata::{InstallableUnit, Requirement};
use crate::profile::Profile;
use crate::version::{Version, VersionRange};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use url::Url;
use uuid::Uuid;

/// Suffix of the id a snapshot takes when presented as a unit
pub const ROLLBACK_UNIT_SUFFIX: &str = ".rollback";

/// Opaque handle to a recorded snapshot
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotRef(String);

impl SnapshotRef {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SnapshotRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An immutable copy of a profile at a point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileSnapshot {
    pub reference: SnapshotRef,
    pub profile_id: String,
    pub timestamp: DateTime<Utc>,
    pub summary: String,
    /// Units in key order
    pub units: Vec<InstallableUnit>,
    pub properties: BTreeMap<String, String>,
}

impl ProfileSnapshot {
    /// Capture the current content of `profile`
    pub fn capture(profile: &Profile, summary: impl Into<String>) -> Self {
        Self {
            reference: SnapshotRef::generate(),
            profile_id: profile.id.clone(),
            timestamp: Utc::now(),
            summary: summary.into(),
            units: profile.units().cloned().collect(),
            properties: profile.properties.clone(),
        }
    }

    /// The snapshot as a unit requiring exactly the captured members
    ///
    /// The unit id is `<profile>.rollback` and the version qualifier is the
    /// capture time, so later snapshots of a profile sort higher.
    pub fn as_installable_unit(&self) -> InstallableUnit {
        let stamp = self.timestamp.format("%Y%m%d%H%M%S%3f").to_string();
        let mut unit = InstallableUnit::new(
            format!("{}{}", self.profile_id, ROLLBACK_UNIT_SUFFIX),
            Version::new(1, 0, 0).with_qualifier(stamp),
        )
        .property("snapshot", self.reference.as_str());

        for member in &self.units {
            unit = unit.requires(Requirement::unit(
                member.id.clone(),
                VersionRange::exact(member.version.clone()),
            ));
        }
        unit
    }
}

/// Storage for profile snapshots
pub trait RollbackRepository: Send + Sync {
    /// Record the current content of `profile`
    fn record_snapshot(&self, profile: &Profile, summary: &str) -> Result<SnapshotRef>;

    /// Load a recorded snapshot
    ///
    /// Fails with [`crate::Error::SnapshotNotFound`] for unknown references.
    fn load_snapshot(&self, reference: &SnapshotRef) -> Result<ProfileSnapshot>;

    /// References recorded for `profile_id`, newest first
    fn list_snapshots(&self, profile_id: &str) -> Result<Vec<SnapshotRef>>;

    /// Where this repository keeps its snapshots
    fn location(&self) -> Url;
}
