// src/resolver/conflict.rs

//! Conflict types for unit resolution
//!
//! Defines the reasons a requested change has no consistent closure.

use crate::metadata::{IuKey, Requirement};
use crate::version::Version;

/// A reason resolution failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conflict {
    /// No unit in the profile or the index provides a mandatory requirement
    UnsatisfiableRequirement {
        requirement: Requirement,
        required_by: IuKey,
    },
    /// Two versions of a singleton id are both demanded
    SingletonConflict {
        id: String,
        versions: Vec<Version>,
        /// Units whose requirement pulled a colliding version (empty when the
        /// versions came from the profile or the request directly)
        required_by: Vec<IuKey>,
    },
}

impl Conflict {
    /// The unit id the conflict is about
    pub fn subject(&self) -> &str {
        match self {
            Conflict::UnsatisfiableRequirement { requirement, .. } => &requirement.name,
            Conflict::SingletonConflict { id, .. } => id,
        }
    }
}

impl std::fmt::Display for Conflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Conflict::UnsatisfiableRequirement {
                requirement,
                required_by,
            } => write!(
                f,
                "Missing requirement: {} requires {} but no unit provides it",
                required_by, requirement
            ),
            Conflict::SingletonConflict {
                id,
                versions,
                required_by,
            } => {
                let versions: Vec<String> = versions.iter().map(|v| v.to_string()).collect();
                write!(
                    f,
                    "Singleton conflict: only one of {} {} may be installed",
                    id,
                    versions.join(", ")
                )?;
                if !required_by.is_empty() {
                    let requirers: Vec<String> =
                        required_by.iter().map(|k| k.to_string()).collect();
                    write!(f, " (required by {})", requirers.join(", "))?;
                }
                Ok(())
            }
        }
    }
}
