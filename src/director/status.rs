// src/director/status.rs

//! Structured results of provision and revert

use crate::error::Error;
use crate::resolver::Conflict;
use crate::rollback::SnapshotRef;
use crate::transaction::{Operation, OperationPlan};
use std::fmt;
use strum_macros::{AsRefStr, Display};

/// Outcome class of a provisioning call
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, AsRefStr)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Severity {
    Ok,
    Warning,
    Error,
    Cancel,
}

/// Result of [`super::Director::provision`] and [`super::Director::revert`]
#[derive(Debug)]
pub struct Status {
    pub severity: Severity,
    pub message: String,
    /// Failure detail for ERROR and CANCEL
    pub error: Option<Error>,
    /// The plan that was (or would have been) applied
    pub plan: Option<OperationPlan>,
    /// Snapshot of the profile taken before the change
    pub snapshot: Option<SnapshotRef>,
    pub warnings: Vec<String>,
}

impl Status {
    pub(crate) fn ok(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Ok,
            message: message.into(),
            error: None,
            plan: None,
            snapshot: None,
            warnings: Vec::new(),
        }
    }

    pub(crate) fn failed(error: Error) -> Self {
        let severity = match error {
            Error::Cancelled { .. } => Severity::Cancel,
            _ => Severity::Error,
        };
        Self {
            severity,
            message: error.to_string(),
            error: Some(error),
            plan: None,
            snapshot: None,
            warnings: Vec::new(),
        }
    }

    pub(crate) fn with_plan(mut self, plan: Option<OperationPlan>) -> Self {
        self.plan = plan;
        self
    }

    pub(crate) fn with_snapshot(mut self, snapshot: Option<SnapshotRef>) -> Self {
        self.snapshot = snapshot;
        self
    }

    /// Attach warnings; an OK status becomes a WARNING
    pub(crate) fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        if !warnings.is_empty() && self.severity == Severity::Ok {
            self.severity = Severity::Warning;
        }
        self.warnings = warnings;
        self
    }

    /// True for OK and WARNING
    pub fn is_ok(&self) -> bool {
        matches!(self.severity, Severity::Ok | Severity::Warning)
    }

    pub fn is_cancelled(&self) -> bool {
        self.severity == Severity::Cancel
    }

    /// Whether re-invoking the same call may succeed
    ///
    /// Operation failures and cancellations are transient; conflicts,
    /// cycles, and missing snapshots are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.error,
            Some(Error::OperationFailure { .. }) | Some(Error::Cancelled { .. })
        )
    }

    /// Every conflict of a failed resolution
    pub fn conflicts(&self) -> &[Conflict] {
        match &self.error {
            Some(Error::Unresolvable(conflicts)) => conflicts,
            _ => &[],
        }
    }

    /// Index and operation of a failed application step
    pub fn failed_operation(&self) -> Option<(usize, &Operation)> {
        match &self.error {
            Some(Error::OperationFailure {
                index, operation, ..
            }) => Some((*index, operation)),
            _ => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.message)?;
        for warning in &self.warnings {
            write!(f, "\n  warning: {}", warning)?;
        }
        Ok(())
    }
}
