// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use provisor::{
    ArtifactStager, Director, DirectorConfig, InMemoryIndex, InstallableUnit,
    MetadataRepositoryManager, Profile, ProfileChangeRequest, ProfileRegistry,
    ProvidedCapability, ProvisionOptions, ProvisioningContext, Requirement, Result, Status,
    Version, VersionRange,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use url::Url;

pub const PROFILE: &str = "SDKProfile";

pub fn v(s: &str) -> Version {
    Version::parse(s).unwrap()
}

pub fn range(s: &str) -> VersionRange {
    VersionRange::parse(s).unwrap()
}

pub fn iu(id: &str, version: &str) -> InstallableUnit {
    InstallableUnit::new(id, v(version))
}

/// Requirement on another unit by id
pub fn needs(id: &str, version_range: &str) -> Requirement {
    Requirement::unit(id, range(version_range))
}

pub fn cap(name: &str, version: &str) -> ProvidedCapability {
    ProvidedCapability::new("capability", name, v(version))
}

pub fn needs_cap(name: &str, version_range: &str) -> Requirement {
    Requirement::new("capability", name, range(version_range))
}

/// Sorted "id version" strings of a unit list
pub fn keys(units: &[InstallableUnit]) -> Vec<String> {
    let mut keys: Vec<String> = units.iter().map(|u| u.key().to_string()).collect();
    keys.sort();
    keys
}

pub fn profile_keys(profile: &Profile) -> Vec<String> {
    profile.unit_keys().map(|k| k.to_string()).collect()
}

/// A director over one in-memory repository and an on-disk rollback database.
///
/// Keep the value alive for the duration of the test; dropping it removes the
/// temporary directory.
pub struct TestEnv {
    pub director: Director,
    pub repositories: Arc<MetadataRepositoryManager>,
    pub profiles: Arc<ProfileRegistry>,
    pub repository: Url,
    _temp_dir: TempDir,
}

impl TestEnv {
    pub fn new(index: Vec<InstallableUnit>) -> Self {
        Self::with_config(index, DirectorConfig::default())
    }

    pub fn with_config(index: Vec<InstallableUnit>, config: DirectorConfig) -> Self {
        let temp_dir = tempfile::tempdir().unwrap();
        let repository = Url::parse("memory:test-repository").unwrap();

        let repositories = Arc::new(MetadataRepositoryManager::new());
        repositories.add_repository(&repository, InMemoryIndex::new(index));

        let profiles = Arc::new(ProfileRegistry::new());
        profiles.create_profile(PROFILE, BTreeMap::new()).unwrap();

        let config = config.with_rollback_db(temp_dir.path().join("rollback.db"));
        let director =
            Director::from_config(config, repositories.clone(), profiles.clone()).unwrap();

        Self {
            director,
            repositories,
            profiles,
            repository,
            _temp_dir: temp_dir,
        }
    }

    pub fn with_stager(mut self, stager: Arc<dyn ArtifactStager>) -> Self {
        self.director = self.director.with_stager(stager);
        self
    }

    pub fn context(&self) -> ProvisioningContext {
        ProvisioningContext::new(vec![self.repository.clone()])
    }

    pub fn provision(&self, request: ProfileChangeRequest) -> Status {
        self.provision_with(request, &ProvisionOptions::default())
    }

    pub fn provision_with(&self, request: ProfileChangeRequest, options: &ProvisionOptions) -> Status {
        self.director.provision(request, &self.context(), options)
    }

    pub fn profile(&self) -> Profile {
        self.profiles.profile(PROFILE).unwrap()
    }

    pub fn request(&self) -> ProfileChangeRequest {
        ProfileChangeRequest::new(PROFILE)
    }
}

/// Records every stage and unstage call as "stage id version"
#[derive(Debug, Default)]
pub struct RecordingStager {
    pub events: Mutex<Vec<String>>,
}

impl RecordingStager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, verb: &str, unit: &InstallableUnit) {
        self.events.lock().unwrap().push(format!("{} {}", verb, unit));
    }
}

impl ArtifactStager for RecordingStager {
    fn stage(&self, _: &Profile, unit: &InstallableUnit, _: &ProvisioningContext) -> Result<()> {
        self.record("stage", unit);
        Ok(())
    }

    fn unstage(&self, _: &Profile, unit: &InstallableUnit) -> Result<()> {
        self.record("unstage", unit);
        Ok(())
    }
}

/// Fails to stage one unit id; records everything else
#[derive(Debug)]
pub struct FailingStager {
    pub failing_id: String,
    pub recorder: RecordingStager,
}

impl FailingStager {
    pub fn new(failing_id: &str) -> Self {
        Self {
            failing_id: failing_id.to_string(),
            recorder: RecordingStager::new(),
        }
    }
}

impl ArtifactStager for FailingStager {
    fn stage(&self, profile: &Profile, unit: &InstallableUnit, context: &ProvisioningContext) -> Result<()> {
        if unit.id == self.failing_id {
            return Err(provisor::Error::Artifact(format!("artifact for {} unavailable", unit)));
        }
        self.recorder.stage(profile, unit, context)
    }

    fn unstage(&self, profile: &Profile, unit: &InstallableUnit) -> Result<()> {
        self.recorder.unstage(profile, unit)
    }
}

/// Requests cancellation once `after` units have been staged
#[derive(Debug)]
pub struct CancellingStager {
    pub token: Arc<AtomicBool>,
    pub after: usize,
    pub staged: AtomicUsize,
}

impl CancellingStager {
    pub fn new(token: Arc<AtomicBool>, after: usize) -> Self {
        Self {
            token,
            after,
            staged: AtomicUsize::new(0),
        }
    }
}

impl ArtifactStager for CancellingStager {
    fn stage(&self, _: &Profile, _: &InstallableUnit, _: &ProvisioningContext) -> Result<()> {
        if self.staged.fetch_add(1, Ordering::SeqCst) + 1 >= self.after {
            self.token.store(true, Ordering::SeqCst);
        }
        Ok(())
    }
}
