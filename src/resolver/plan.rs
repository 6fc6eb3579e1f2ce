// src/resolver/plan.rs

//! Resolution result data structures
//!
//! Contains the result types for unit resolution.

use super::conflict::Conflict;
use crate::error::Error;
use crate::metadata::{InstallableUnit, IuKey};

/// Result of resolving a change request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// The closed target unit set, in key order (empty on failure)
    pub units: Vec<InstallableUnit>,
    /// Units the resolver pulled from the index, in the order they were chosen
    pub pulled_in: Vec<IuKey>,
    /// Every conflict found; resolution succeeded iff this is empty
    pub conflicts: Vec<Conflict>,
}

impl Resolution {
    pub fn is_consistent(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// The target set, or the full conflict report
    pub fn into_result(self) -> Result<Vec<InstallableUnit>, Error> {
        if self.conflicts.is_empty() {
            Ok(self.units)
        } else {
            Err(Error::Unresolvable(self.conflicts))
        }
    }
}
