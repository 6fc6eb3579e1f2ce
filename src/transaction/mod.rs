// src/transaction/mod.rs

//! Operation plans for profile changes
//!
//! A plan is the ordered list of install, uninstall and update steps that
//! turns a profile's current unit set into a resolved target set. Each step
//! carries a rank; steps sharing a rank form an atomic batch (mutually
//! dependent installs) and are applied together.
//!
//! # Ordering
//!
//! ```text
//! uninstalls ─┐
//!             ├─> providers before dependents ─> ranks 0..n
//! updates ────┤
//! installs ───┘
//! ```
//!
//! Where no dependency constrains two steps, uninstalls come first, then
//! updates, then installs, each group ordered by unit id and version.

mod graph;
mod planner;

pub use planner::{OperationPlanner, plan};

use crate::metadata::InstallableUnit;
use serde::{Deserialize, Serialize};
use std::fmt;
use strum_macros::{AsRefStr, Display, EnumString};
use uuid::Uuid;

/// Kind of a planned step
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, AsRefStr,
    Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
pub enum OperationKind {
    Uninstall,
    Update,
    Install,
}

/// A single step of a plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Install(InstallableUnit),
    Uninstall(InstallableUnit),
    Update {
        from: InstallableUnit,
        to: InstallableUnit,
    },
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Install(_) => OperationKind::Install,
            Operation::Uninstall(_) => OperationKind::Uninstall,
            Operation::Update { .. } => OperationKind::Update,
        }
    }

    /// The unit id this step affects
    pub fn id(&self) -> &str {
        match self {
            Operation::Install(unit) | Operation::Uninstall(unit) => &unit.id,
            Operation::Update { to, .. } => &to.id,
        }
    }

    /// The unit this step brings into the profile
    pub fn added(&self) -> Option<&InstallableUnit> {
        match self {
            Operation::Install(unit) => Some(unit),
            Operation::Update { to, .. } => Some(to),
            Operation::Uninstall(_) => None,
        }
    }

    /// The unit this step takes out of the profile
    pub fn removed(&self) -> Option<&InstallableUnit> {
        match self {
            Operation::Uninstall(unit) => Some(unit),
            Operation::Update { from, .. } => Some(from),
            Operation::Install(_) => None,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Install(unit) => write!(f, "install {}", unit),
            Operation::Uninstall(unit) => write!(f, "uninstall {}", unit),
            Operation::Update { from, to } => {
                write!(f, "update {} {} -> {}", to.id, from.version, to.version)
            }
        }
    }
}

/// An operation with its position in the plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedOperation {
    pub operation: Operation,
    /// Steps with equal rank form one atomic batch
    pub rank: usize,
}

/// The complete ordered plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationPlan {
    pub id: Uuid,
    pub operations: Vec<PlannedOperation>,
}

impl OperationPlan {
    pub fn new(operations: Vec<PlannedOperation>) -> Self {
        Self {
            id: Uuid::new_v4(),
            operations,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// The bare operations, in order
    pub fn operations(&self) -> impl Iterator<Item = &Operation> {
        self.operations.iter().map(|planned| &planned.operation)
    }

    /// Operations grouped into batches of equal rank
    pub fn batches(&self) -> Vec<Vec<&Operation>> {
        let mut batches: Vec<Vec<&Operation>> = Vec::new();
        let mut current_rank = None;
        for planned in &self.operations {
            if current_rank != Some(planned.rank) {
                batches.push(Vec::new());
                current_rank = Some(planned.rank);
            }
            if let Some(batch) = batches.last_mut() {
                batch.push(&planned.operation);
            }
        }
        batches
    }

    /// Get a summary of the plan
    pub fn summary(&self) -> PlanSummary {
        let mut summary = PlanSummary {
            total_operations: self.operations.len(),
            batches: self.batches().len(),
            ..PlanSummary::default()
        };

        for operation in self.operations() {
            match operation.kind() {
                OperationKind::Install => summary.installs += 1,
                OperationKind::Uninstall => summary.uninstalls += 1,
                OperationKind::Update => summary.updates += 1,
            }
        }
        summary
    }
}

/// Summary of an operation plan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanSummary {
    pub total_operations: usize,
    pub installs: usize,
    pub uninstalls: usize,
    pub updates: usize,
    pub batches: usize,
}

impl fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} install(s), {} update(s), {} uninstall(s) in {} step(s)",
            self.installs, self.updates, self.uninstalls, self.batches
        )
    }
}
