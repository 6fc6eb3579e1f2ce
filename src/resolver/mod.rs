// src/resolver/mod.rs

//! Unit resolution and conflict detection
//!
//! This module turns a change request against a profile into a closed,
//! singleton-consistent target unit set, or into a complete report of why no
//! such set exists.

mod conflict;
mod engine;
mod plan;

pub use conflict::Conflict;
pub use engine::{Resolver, ResolverOptions};
pub use plan::Resolution;

use crate::metadata::{InstallableUnit, MetadataIndex};
use std::collections::BTreeSet;

/// Resolve with default options
pub fn resolve(
    base: &[InstallableUnit],
    additions: &[InstallableUnit],
    removals: &BTreeSet<String>,
    index: &dyn MetadataIndex,
) -> Resolution {
    Resolver::new(index).resolve(base, additions, removals)
}

/// Mandatory requirements of `units` that nothing in `units` satisfies
///
/// Empty for every consistent resolution.
pub fn unsatisfied_requirements(units: &[InstallableUnit]) -> Vec<Conflict> {
    units
        .iter()
        .flat_map(move |unit| {
            unit.mandatory_requirements()
                .filter(move |requirement| !units.iter().any(|other| requirement.is_satisfied_by(other)))
                .map(move |requirement| Conflict::UnsatisfiableRequirement {
                    requirement: requirement.clone(),
                    required_by: unit.key(),
                })
        })
        .collect()
}
