// src/director/mod.rs

//! The provisioning director
//!
//! Coordinates a change to a profile:
//!
//! 1. lock the profile
//! 2. resolve the request against a consistent snapshot of the metadata
//! 3. plan the operations from the current units to the resolved target
//! 4. record a snapshot of the unchanged profile
//! 5. apply the operations in order through the artifact stager
//!
//! Operations are applied to a working copy that replaces the profile only
//! once every operation succeeded. A failing operation or an observed
//! cancellation releases what was already staged and leaves the profile
//! exactly as recorded in the snapshot.

mod options;
mod status;

pub use options::ProvisionOptions;
pub use status::{Severity, Status};

use crate::artifact::{ArtifactStager, NoopStager};
use crate::config::DirectorConfig;
use crate::error::{Error, Result};
use crate::metadata::{InstallableUnit, IuKey, MetadataIndex, MetadataRepositoryManager};
use crate::profile::{Profile, ProfileChangeRequest, ProfileRegistry, ProvisioningContext};
use crate::progress::ProvisionPhase;
use crate::resolver::{Resolver, ResolverOptions, unsatisfied_requirements};
use crate::rollback::{RollbackRepository, SnapshotRef, SqliteRollbackRepository};
use crate::transaction::{Operation, OperationPlan, OperationPlanner};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// Newer versions of an installed unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailableUpdate {
    pub current: IuKey,
    /// Candidates, highest version first
    pub candidates: Vec<InstallableUnit>,
}

/// A failed run, with whatever it got to before failing
struct Failure {
    error: Error,
    plan: Option<OperationPlan>,
    snapshot: Option<SnapshotRef>,
}

impl From<Error> for Failure {
    fn from(error: Error) -> Self {
        Self {
            error,
            plan: None,
            snapshot: None,
        }
    }
}

/// A completed run
struct Applied {
    plan: OperationPlan,
    snapshot: Option<SnapshotRef>,
}

/// Façade over resolution, planning and application
pub struct Director {
    config: DirectorConfig,
    repositories: Arc<MetadataRepositoryManager>,
    profiles: Arc<ProfileRegistry>,
    rollback: Arc<dyn RollbackRepository>,
    stager: Arc<dyn ArtifactStager>,
}

impl Director {
    /// Create a director with default settings and no artifact staging
    pub fn new(
        repositories: Arc<MetadataRepositoryManager>,
        profiles: Arc<ProfileRegistry>,
        rollback: Arc<dyn RollbackRepository>,
    ) -> Self {
        Self {
            config: DirectorConfig::default(),
            repositories,
            profiles,
            rollback,
            stager: Arc::new(NoopStager),
        }
    }

    /// Create a director whose rollback repository comes from `config`
    pub fn from_config(
        config: DirectorConfig,
        repositories: Arc<MetadataRepositoryManager>,
        profiles: Arc<ProfileRegistry>,
    ) -> Result<Self> {
        config.validate()?;
        let rollback = match &config.rollback_db {
            Some(path) => SqliteRollbackRepository::open(path)?,
            None => SqliteRollbackRepository::open_in_memory()?,
        };
        Ok(Self::new(repositories, profiles, Arc::new(rollback)).with_config(config))
    }

    pub fn with_config(mut self, config: DirectorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_stager(mut self, stager: Arc<dyn ArtifactStager>) -> Self {
        self.stager = stager;
        self
    }

    pub fn config(&self) -> &DirectorConfig {
        &self.config
    }

    pub fn profiles(&self) -> &ProfileRegistry {
        &self.profiles
    }

    pub fn repositories(&self) -> &MetadataRepositoryManager {
        &self.repositories
    }

    pub fn rollback_repository(&self) -> &dyn RollbackRepository {
        self.rollback.as_ref()
    }

    /// Where snapshot history is kept
    pub fn rollback_repository_location(&self) -> Url {
        self.rollback.location()
    }

    /// Snapshots recorded for a profile, newest first
    pub fn list_snapshots(&self, profile_id: &str) -> Result<Vec<SnapshotRef>> {
        self.rollback.list_snapshots(profile_id)
    }

    /// Apply a change request to its profile
    pub fn provision(
        &self,
        request: ProfileChangeRequest,
        context: &ProvisioningContext,
        options: &ProvisionOptions,
    ) -> Status {
        info!("Provisioning profile {}", request.profile_id);
        let mut warnings = Vec::new();
        let result = self.try_provision(&request, context, options, &mut warnings);
        self.finish(&request.profile_id, result, options).with_warnings(warnings)
    }

    /// Restore a profile to a recorded snapshot
    ///
    /// The snapshot's units become the target as they are; they are not
    /// resolved again against the current metadata. Mandatory requirements
    /// the snapshot leaves unmet are reported as warnings.
    pub fn revert(
        &self,
        snapshot: &SnapshotRef,
        profile_id: &str,
        context: &ProvisioningContext,
        options: &ProvisionOptions,
    ) -> Status {
        info!("Reverting profile {} to snapshot {}", profile_id, snapshot);
        let mut warnings = Vec::new();
        let result = self.try_revert(snapshot, profile_id, context, options, &mut warnings);
        self.finish(profile_id, result, options).with_warnings(warnings)
    }

    /// Resolve and plan a request without applying or recording anything
    pub fn plan(
        &self,
        request: &ProfileChangeRequest,
        context: &ProvisioningContext,
    ) -> Result<OperationPlan> {
        let profile = self.profiles.profile(&request.profile_id)?;
        let index = self.repositories.snapshot(context)?;
        let target = self.resolve(&profile, request, &index)?;
        let current: Vec<InstallableUnit> = profile.units().cloned().collect();
        OperationPlanner::new().plan(&current, &target)
    }

    /// Newer indexed versions of every unit in a profile
    pub fn available_updates(
        &self,
        profile_id: &str,
        context: &ProvisioningContext,
    ) -> Result<Vec<AvailableUpdate>> {
        let profile = self.profiles.profile(profile_id)?;
        let index = self.repositories.snapshot(context)?;

        let updates = profile
            .units()
            .filter_map(|unit| {
                let candidates: Vec<InstallableUnit> = index
                    .find_other_versions(unit)
                    .into_iter()
                    .filter(|other| other.version > unit.version)
                    .collect();
                (!candidates.is_empty()).then(|| AvailableUpdate {
                    current: unit.key(),
                    candidates,
                })
            })
            .collect();
        Ok(updates)
    }

    fn resolve(
        &self,
        profile: &Profile,
        request: &ProfileChangeRequest,
        index: &dyn MetadataIndex,
    ) -> Result<Vec<InstallableUnit>> {
        let base: Vec<InstallableUnit> = profile.units().cloned().collect();
        let options = ResolverOptions {
            strict: self.config.strict,
        };
        Resolver::new(index)
            .with_options(options)
            .resolve(&base, &request.additions, &request.removals)
            .into_result()
    }

    fn try_provision(
        &self,
        request: &ProfileChangeRequest,
        context: &ProvisioningContext,
        options: &ProvisionOptions,
        warnings: &mut Vec<String>,
    ) -> std::result::Result<Applied, Failure> {
        let slot = self.profiles.slot(&request.profile_id)?;
        let mut profile = slot.lock().unwrap_or_else(|e| e.into_inner());
        options.check_cancelled(0)?;

        for id in &request.removals {
            if !profile.contains_id(id) {
                warn!("{} is not installed in profile {}", id, profile.id);
                warnings.push(format!("{} is not installed in profile {}", id, profile.id));
            }
        }

        options.progress().phase(&profile.id, ProvisionPhase::Resolving);
        let index = self.repositories.snapshot(context)?;
        let target = self.resolve(&profile, request, &index)?;

        let mut properties = profile.properties.clone();
        request.apply_properties(&mut properties);

        let summary = format!("Before provisioning {}", describe_request(request));
        self.apply_target(&mut profile, &target, properties, &summary, context, options)
    }

    fn try_revert(
        &self,
        reference: &SnapshotRef,
        profile_id: &str,
        context: &ProvisioningContext,
        options: &ProvisionOptions,
        warnings: &mut Vec<String>,
    ) -> std::result::Result<Applied, Failure> {
        let snapshot = self.rollback.load_snapshot(reference)?;
        if snapshot.profile_id != profile_id {
            return Err(Error::SnapshotProfileMismatch {
                snapshot: reference.clone(),
                owner: snapshot.profile_id,
                profile: profile_id.to_string(),
            }
            .into());
        }

        for conflict in unsatisfied_requirements(&snapshot.units) {
            warn!("Snapshot {}: {}", reference, conflict);
            warnings.push(conflict.to_string());
        }

        let slot = self.profiles.slot(profile_id)?;
        let mut profile = slot.lock().unwrap_or_else(|e| e.into_inner());
        options.check_cancelled(0)?;

        let summary = format!("Before revert to {}", reference);
        self.apply_target(
            &mut profile,
            &snapshot.units,
            snapshot.properties,
            &summary,
            context,
            options,
        )
    }

    /// Plan, snapshot and apply under the caller's profile lock
    fn apply_target(
        &self,
        profile: &mut Profile,
        target: &[InstallableUnit],
        properties: BTreeMap<String, String>,
        summary: &str,
        context: &ProvisioningContext,
        options: &ProvisionOptions,
    ) -> std::result::Result<Applied, Failure> {
        let progress = options.progress();
        progress.phase(&profile.id, ProvisionPhase::Planning);
        let current: Vec<InstallableUnit> = profile.units().cloned().collect();
        let plan = OperationPlanner::new().plan(&current, target)?;

        if plan.is_empty() && properties == profile.properties {
            debug!("Profile {} already matches the target", profile.id);
            return Ok(Applied {
                plan,
                snapshot: None,
            });
        }
        info!("Plan for {}: {}", profile.id, plan.summary());

        progress.phase(&profile.id, ProvisionPhase::Snapshotting);
        let snapshot = match self.rollback.record_snapshot(profile, summary) {
            Ok(snapshot) => snapshot,
            Err(error) => {
                return Err(Failure {
                    error,
                    plan: Some(plan),
                    snapshot: None,
                });
            }
        };
        debug!("Recorded snapshot {} of {}", snapshot, profile.id);

        progress.phase(&profile.id, ProvisionPhase::Applying);

        let mut working = profile.clone();
        working.properties = properties;

        let mut completed: Vec<&Operation> = Vec::with_capacity(plan.len());
        let mut outcome = Ok(());
        for (index, operation) in plan.operations().enumerate() {
            if let Err(error) = options.check_cancelled(index) {
                info!("Cancelled {} after {} operation(s)", profile.id, index);
                outcome = Err(error);
                break;
            }
            if let Err(error) = self.apply_operation(&mut working, operation, context) {
                warn!("Operation {} ({}) failed: {}", index, operation, error);
                outcome = Err(Error::OperationFailure {
                    index,
                    operation: operation.clone(),
                    reason: error.to_string(),
                });
                break;
            }
            debug!("Applied {}", operation);
            progress.operation_applied(&profile.id, index + 1, plan.len(), operation);
            completed.push(operation);
        }

        if let Err(error) = outcome {
            progress.phase(&profile.id, ProvisionPhase::Compensating);
            if self.config.unstage_on_failure {
                self.compensate(&working, &completed);
            }
            info!("Profile {} left as recorded in snapshot {}", profile.id, snapshot);
            return Err(Failure {
                error,
                plan: Some(plan),
                snapshot: Some(snapshot),
            });
        }

        *profile = working;
        Ok(Applied {
            plan,
            snapshot: Some(snapshot),
        })
    }

    /// Apply one operation to the working profile
    ///
    /// An update whose old unit cannot be unstaged releases the new one again
    /// before failing, so a failed operation leaves nothing behind.
    fn apply_operation(
        &self,
        working: &mut Profile,
        operation: &Operation,
        context: &ProvisioningContext,
    ) -> Result<()> {
        match operation {
            Operation::Install(unit) => {
                self.stager.stage(working, unit, context)?;
                working.add_unit(unit.clone());
            }
            Operation::Uninstall(unit) => {
                self.stager.unstage(working, unit)?;
                working.remove_unit(&unit.key());
            }
            Operation::Update { from, to } => {
                self.stager.stage(working, to, context)?;
                if let Err(error) = self.stager.unstage(working, from) {
                    if let Err(undo) = self.stager.unstage(working, to) {
                        warn!("Failed to release {}: {}", to, undo);
                    }
                    return Err(error);
                }
                working.remove_unit(&from.key());
                working.add_unit(to.clone());
            }
        }
        Ok(())
    }

    /// Undo the external effects of completed operations, newest first
    ///
    /// Best effort: failures are logged and do not stop the walk.
    fn compensate(&self, working: &Profile, completed: &[&Operation]) {
        let context = ProvisioningContext::default();
        for operation in completed.iter().rev() {
            let result = match operation {
                Operation::Install(unit) => self.stager.unstage(working, unit),
                Operation::Uninstall(unit) => self.stager.stage(working, unit, &context),
                Operation::Update { from, to } => self
                    .stager
                    .unstage(working, to)
                    .and_then(|()| self.stager.stage(working, from, &context)),
            };
            match result {
                Ok(()) => debug!("Undid {}", operation),
                Err(error) => warn!("Could not undo {}: {}", operation, error),
            }
        }
    }

    fn finish(
        &self,
        profile_id: &str,
        result: std::result::Result<Applied, Failure>,
        options: &ProvisionOptions,
    ) -> Status {
        match result {
            Ok(applied) => {
                let message = if applied.snapshot.is_none() {
                    format!("Profile {} is up to date", profile_id)
                } else {
                    format!("Provisioned {}: {}", profile_id, applied.plan.summary())
                };
                info!("{}", message);
                options.progress().finished(profile_id, true, &message);
                Status::ok(message)
                    .with_plan(Some(applied.plan))
                    .with_snapshot(applied.snapshot)
            }
            Err(failure) => {
                warn!("Provisioning {} failed: {}", profile_id, failure.error);
                options
                    .progress()
                    .finished(profile_id, false, &failure.error.to_string());
                Status::failed(failure.error)
                    .with_plan(failure.plan)
                    .with_snapshot(failure.snapshot)
            }
        }
    }
}

impl std::fmt::Debug for Director {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Director")
            .field("config", &self.config)
            .field("rollback", &self.rollback.location().as_str())
            .finish()
    }
}

fn describe_request(request: &ProfileChangeRequest) -> String {
    let mut parts = Vec::new();
    if !request.additions.is_empty() {
        let added: Vec<String> = request.additions.iter().map(|u| u.to_string()).collect();
        parts.push(format!("add {}", added.join(", ")));
    }
    if !request.removals.is_empty() {
        let removed: Vec<&str> = request.removals.iter().map(String::as_str).collect();
        parts.push(format!("remove {}", removed.join(", ")));
    }
    if request.has_property_changes() {
        parts.push("change properties".to_string());
    }
    if parts.is_empty() {
        format!("{} (no changes)", request.profile_id)
    } else {
        format!("{}: {}", request.profile_id, parts.join("; "))
    }
}
