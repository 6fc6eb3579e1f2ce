// src/progress.rs

//! Progress reporting for provisioning runs
//!
//! The director tells a [`ProgressTracker`] which phase a run is in, each
//! operation it applies, and how the run ended. Implementations:
//! - `SilentProgress`: reports nothing
//! - `LogProgress`: reports through tracing
//! - `CallbackProgress`: forwards [`ProgressEvent`]s to a closure
//!
//! # Example
//!
//! ```ignore
//! use provisor::progress::LogProgress;
//!
//! let options = ProvisionOptions::new().with_progress(Arc::new(LogProgress));
//! let status = director.provision(request, &context, &options);
//! ```

use crate::transaction::Operation;
use strum_macros::Display;
use tracing::{info, warn};

/// Stage of a provisioning run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ProvisionPhase {
    #[strum(serialize = "resolving")]
    Resolving,
    #[strum(serialize = "planning")]
    Planning,
    #[strum(serialize = "recording snapshot")]
    Snapshotting,
    #[strum(serialize = "applying operations")]
    Applying,
    #[strum(serialize = "restoring profile")]
    Compensating,
}

/// Progress sink shared with the director
///
/// One tracker may observe several profiles being provisioned at once, so
/// every call names the profile it is about. All methods default to doing
/// nothing.
pub trait ProgressTracker: Send + Sync {
    /// A run entered `phase`
    fn phase(&self, _profile_id: &str, _phase: ProvisionPhase) {}

    /// Operation `step` (1-based) of `total` was applied
    fn operation_applied(&self, _profile_id: &str, _step: usize, _total: usize, _operation: &Operation) {}

    /// A run ended; `succeeded` is false for failures and cancellations
    fn finished(&self, _profile_id: &str, _succeeded: bool, _message: &str) {}
}

/// Tracker that reports nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentProgress;

impl ProgressTracker for SilentProgress {}

/// Tracker that reports through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressTracker for LogProgress {
    fn phase(&self, profile_id: &str, phase: ProvisionPhase) {
        info!("{}: {}", profile_id, phase);
    }

    fn operation_applied(&self, profile_id: &str, step: usize, total: usize, operation: &Operation) {
        info!("{}: [{}/{}] {}", profile_id, step, total, operation);
    }

    fn finished(&self, profile_id: &str, succeeded: bool, message: &str) {
        if succeeded {
            info!("{}: {}", profile_id, message);
        } else {
            warn!("{}: {}", profile_id, message);
        }
    }
}

/// Events emitted by [`CallbackProgress`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Phase {
        profile: String,
        phase: ProvisionPhase,
    },
    Applied {
        profile: String,
        step: usize,
        total: usize,
        /// Rendered operation, e.g. `install a 1.0.0`
        operation: String,
    },
    Finished {
        profile: String,
        message: String,
    },
    Failed {
        profile: String,
        message: String,
    },
}

/// Callback-based progress tracker
pub struct CallbackProgress<F>
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    callback: F,
}

impl<F> CallbackProgress<F>
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressTracker for CallbackProgress<F>
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn phase(&self, profile_id: &str, phase: ProvisionPhase) {
        (self.callback)(ProgressEvent::Phase {
            profile: profile_id.to_string(),
            phase,
        });
    }

    fn operation_applied(&self, profile_id: &str, step: usize, total: usize, operation: &Operation) {
        (self.callback)(ProgressEvent::Applied {
            profile: profile_id.to_string(),
            step,
            total,
            operation: operation.to_string(),
        });
    }

    fn finished(&self, profile_id: &str, succeeded: bool, message: &str) {
        let profile = profile_id.to_string();
        let message = message.to_string();
        (self.callback)(if succeeded {
            ProgressEvent::Finished { profile, message }
        } else {
            ProgressEvent::Failed { profile, message }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::InstallableUnit;
    use crate::version::Version;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_callback_progress() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let progress = CallbackProgress::new(move |event| {
            sink.lock().unwrap().push(event);
        });

        let install = Operation::Install(InstallableUnit::new("a", Version::new(1, 0, 0)));
        progress.phase("p", ProvisionPhase::Applying);
        progress.operation_applied("p", 1, 2, &install);
        progress.finished("p", false, "cancelled");

        let captured = events.lock().unwrap();
        assert_eq!(
            *captured,
            vec![
                ProgressEvent::Phase {
                    profile: "p".to_string(),
                    phase: ProvisionPhase::Applying,
                },
                ProgressEvent::Applied {
                    profile: "p".to_string(),
                    step: 1,
                    total: 2,
                    operation: "install a 1.0.0".to_string(),
                },
                ProgressEvent::Failed {
                    profile: "p".to_string(),
                    message: "cancelled".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_trackers_accept_every_event() {
        let install = Operation::Install(InstallableUnit::new("a", Version::new(1, 0, 0)));
        let trackers: Vec<Box<dyn ProgressTracker>> = vec![Box::new(SilentProgress), Box::new(LogProgress)];
        for tracker in trackers {
            tracker.phase("p", ProvisionPhase::Resolving);
            tracker.operation_applied("p", 1, 1, &install);
            tracker.finished("p", true, "done");
        }
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(ProvisionPhase::Snapshotting.to_string(), "recording snapshot");
        assert_eq!(ProvisionPhase::Compensating.to_string(), "restoring profile");
    }
}
