// src/transaction/planner.rs

//! Operation planning
//!
//! Computes the difference between a profile's current units and a resolved
//! target set, then orders the resulting operations so that:
//!
//! - a unit's providers are in place before it is installed
//! - a capability the target still needs is replaced before the unit
//!   providing it goes away
//! - a singleton is uninstalled before another version of it is installed
//!
//! Mutually dependent installs share a rank and form an atomic batch. A cycle
//! that needs a singleton to be gone and present at the same time cannot be
//! batched and fails the plan.

use super::graph::{EdgeKind, OperationGraph};
use super::{Operation, OperationKind, OperationPlan, PlannedOperation};
use crate::error::{Error, Result};
use crate::metadata::{InstallableUnit, IuKey, Requirement};
use crate::version::Version;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Plans the operations that turn one unit set into another
#[derive(Debug, Default, Clone, Copy)]
pub struct OperationPlanner;

impl OperationPlanner {
    pub fn new() -> Self {
        Self
    }

    /// Plan the operations transforming `current` into `target`
    pub fn plan(
        &self,
        current: &[InstallableUnit],
        target: &[InstallableUnit],
    ) -> Result<OperationPlan> {
        let current_keys: BTreeMap<IuKey, &InstallableUnit> =
            current.iter().map(|unit| (unit.key(), unit)).collect();
        let target_keys: BTreeMap<IuKey, &InstallableUnit> =
            target.iter().map(|unit| (unit.key(), unit)).collect();

        let stable: Vec<&InstallableUnit> = target_keys
            .iter()
            .filter(|(key, _)| current_keys.contains_key(*key))
            .map(|(_, unit)| *unit)
            .collect();

        let operations = diff(&current_keys, &target_keys);
        if operations.is_empty() {
            return Ok(OperationPlan::new(Vec::new()));
        }

        let graph = build_graph(&operations, &stable, &target_keys);
        let components = graph.strongly_connected_components();

        let mut cyclic_ids = BTreeSet::new();
        for component in components.iter().filter(|c| c.len() > 1) {
            if graph.has_exclusive_edge_within(component) {
                cyclic_ids.extend(component.iter().map(|&n| operations[n].id().to_string()));
            }
        }
        if !cyclic_ids.is_empty() {
            return Err(Error::CyclicReplacement {
                ids: cyclic_ids.into_iter().collect(),
            });
        }

        let priority = |node: usize| sort_key(&operations[node]);
        let order = graph.order_components(&components, priority);

        let mut planned = Vec::with_capacity(operations.len());
        for (rank, &c) in order.iter().enumerate() {
            let mut members = components[c].clone();
            members.sort_by_key(|&node| sort_key(&operations[node]));
            if members.len() > 1 {
                debug!("Rank {} is an atomic batch of {} operations", rank, members.len());
            }
            for node in members {
                planned.push(PlannedOperation {
                    operation: operations[node].clone(),
                    rank,
                });
            }
        }

        let plan = OperationPlan::new(planned);
        debug!("Planned {}", plan.summary());
        Ok(plan)
    }
}

/// Plan with a default planner
pub fn plan(current: &[InstallableUnit], target: &[InstallableUnit]) -> Result<OperationPlan> {
    OperationPlanner::new().plan(current, target)
}

fn sort_key(operation: &Operation) -> (OperationKind, String, Version) {
    let unit = match operation {
        Operation::Install(unit) | Operation::Uninstall(unit) => unit,
        Operation::Update { to, .. } => to,
    };
    (operation.kind(), unit.id.clone(), unit.version.clone())
}

/// Pair removed and added versions of each id into updates
///
/// Versions are paired lowest to lowest; leftovers become plain uninstalls or
/// installs.
fn diff(
    current: &BTreeMap<IuKey, &InstallableUnit>,
    target: &BTreeMap<IuKey, &InstallableUnit>,
) -> Vec<Operation> {
    let mut removed: BTreeMap<&str, Vec<&InstallableUnit>> = BTreeMap::new();
    for (key, unit) in current {
        if !target.contains_key(key) {
            removed.entry(key.id.as_str()).or_default().push(*unit);
        }
    }

    let mut added: BTreeMap<&str, Vec<&InstallableUnit>> = BTreeMap::new();
    for (key, unit) in target {
        if !current.contains_key(key) {
            added.entry(key.id.as_str()).or_default().push(*unit);
        }
    }

    let ids: BTreeSet<&str> = removed.keys().chain(added.keys()).copied().collect();
    let mut operations = Vec::new();
    for id in ids {
        let from = removed.remove(id).unwrap_or_default();
        let to = added.remove(id).unwrap_or_default();
        let paired = from.len().min(to.len());

        for (old, new) in from.iter().zip(to.iter()) {
            operations.push(Operation::Update {
                from: (*old).clone(),
                to: (*new).clone(),
            });
        }
        operations.extend(from[paired..].iter().map(|unit| Operation::Uninstall((*unit).clone())));
        operations.extend(to[paired..].iter().map(|unit| Operation::Install((*unit).clone())));
    }
    operations
}

fn build_graph(
    operations: &[Operation],
    stable: &[&InstallableUnit],
    target: &BTreeMap<IuKey, &InstallableUnit>,
) -> OperationGraph {
    let mut graph = OperationGraph::new(operations.len());
    let held_by_stable = |requirement: &Requirement| {
        stable.iter().any(|unit| requirement.is_satisfied_by(unit))
    };

    // Providers before the units that need them
    for (dependent, operation) in operations.iter().enumerate() {
        let Some(unit) = operation.added() else {
            continue;
        };
        for requirement in unit.mandatory_requirements() {
            if held_by_stable(requirement) || requirement.is_satisfied_by(unit) {
                continue;
            }
            for (provider, other) in operations.iter().enumerate() {
                if other.added().is_some_and(|p| requirement.is_satisfied_by(p)) {
                    graph.add_edge(provider, dependent, EdgeKind::Provider);
                }
            }
        }
    }

    // Replacements before the removal of what they replace
    for (removal, operation) in operations.iter().enumerate() {
        let Some(old) = operation.removed() else {
            continue;
        };
        for holder in target.values() {
            for requirement in holder.mandatory_requirements() {
                if !requirement.is_satisfied_by(old)
                    || held_by_stable(requirement)
                    || operation.added().is_some_and(|new| requirement.is_satisfied_by(new))
                {
                    continue;
                }
                for (provider, other) in operations.iter().enumerate() {
                    if other.added().is_some_and(|p| requirement.is_satisfied_by(p)) {
                        graph.add_edge(provider, removal, EdgeKind::Replacement);
                    }
                }
            }
        }
    }

    // Singleton versions never coexist
    for (install, operation) in operations.iter().enumerate() {
        let Some(new) = operation.added().filter(|unit| unit.singleton) else {
            continue;
        };
        for (removal, other) in operations.iter().enumerate() {
            if other
                .removed()
                .is_some_and(|old| old.singleton && old.id == new.id)
            {
                graph.add_edge(removal, install, EdgeKind::Exclusion);
            }
        }
    }

    graph
}
