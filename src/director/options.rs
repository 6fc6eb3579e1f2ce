// src/director/options.rs

//! Per-call options for provision and revert

use crate::error::{Error, Result};
use crate::progress::{ProgressTracker, SilentProgress};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

static SILENT: SilentProgress = SilentProgress;

/// Options for controlling one provisioning run
#[derive(Default, Clone)]
pub struct ProvisionOptions {
    /// Cancel token - set to true to request cancellation
    pub cancel: Option<Arc<AtomicBool>>,
    /// Progress tracker for reporting phases and operations
    pub progress: Option<Arc<dyn ProgressTracker>>,
}

impl ProvisionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cancel token
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Set the progress tracker
    pub fn with_progress(mut self, progress: Arc<dyn ProgressTracker>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Check if cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|c| c.load(Ordering::Relaxed))
    }

    /// Return `Cancelled` if cancellation was requested
    pub(crate) fn check_cancelled(&self, completed: usize) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled { completed })
        } else {
            Ok(())
        }
    }

    /// The configured tracker, or one that reports nothing
    pub(crate) fn progress(&self) -> &dyn ProgressTracker {
        self.progress.as_deref().unwrap_or(&SILENT)
    }
}

impl std::fmt::Debug for ProvisionOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvisionOptions")
            .field("cancel", &self.cancel)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}
