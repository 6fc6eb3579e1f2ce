// src/artifact.rs

//! Artifact staging
//!
//! Applying an install or update operation stages the unit's artifacts through
//! an [`ArtifactStager`]; an uninstall unstages them. The director treats a
//! staging error as the failure of that operation.

use crate::error::{Error, Result};
use crate::metadata::InstallableUnit;
use crate::profile::{PROP_INSTALL_FOLDER, Profile, ProvisioningContext};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Materializes unit artifacts for a profile
pub trait ArtifactStager: Send + Sync {
    /// Stage the artifacts of `unit` for `profile`
    fn stage(
        &self,
        profile: &Profile,
        unit: &InstallableUnit,
        context: &ProvisioningContext,
    ) -> Result<()>;

    /// Remove what [`ArtifactStager::stage`] put in place
    fn unstage(&self, _profile: &Profile, _unit: &InstallableUnit) -> Result<()> {
        Ok(())
    }
}

/// Stager for profiles whose artifacts are managed elsewhere
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopStager;

impl ArtifactStager for NoopStager {
    fn stage(&self, _: &Profile, unit: &InstallableUnit, _: &ProvisioningContext) -> Result<()> {
        debug!("Nothing to stage for {}", unit);
        Ok(())
    }
}

/// Writes one JSON descriptor per staged unit
///
/// Descriptors live in the profile's install folder when the profile sets
/// one, and under `<root>/<profile id>` otherwise.
#[derive(Debug, Clone)]
pub struct DescriptorStager {
    root: PathBuf,
}

impl DescriptorStager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory receiving descriptors for `profile`
    pub fn folder_for(&self, profile: &Profile) -> PathBuf {
        match profile.property(PROP_INSTALL_FOLDER) {
            Some(folder) => PathBuf::from(folder),
            None => self.root.join(&profile.id),
        }
    }

    /// Path of the descriptor for `unit`
    pub fn descriptor_path(&self, profile: &Profile, unit: &InstallableUnit) -> PathBuf {
        self.folder_for(profile)
            .join(format!("{}_{}.json", unit.id, unit.version))
    }

    fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
        let temp_path = path.with_extension("json.tmp");
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(content)?;
        file.sync_all()?;
        fs::rename(&temp_path, path)?;
        Ok(())
    }
}

impl ArtifactStager for DescriptorStager {
    fn stage(
        &self,
        profile: &Profile,
        unit: &InstallableUnit,
        _context: &ProvisioningContext,
    ) -> Result<()> {
        let folder = self.folder_for(profile);
        if !folder.exists() {
            fs::create_dir_all(&folder)?;
            debug!("Created install folder: {:?}", folder);
        }

        let path = self.descriptor_path(profile, unit);
        if path.exists() {
            return Err(Error::Artifact(format!(
                "{} is already staged at {}",
                unit,
                path.display()
            )));
        }

        let json = serde_json::to_vec_pretty(unit)?;
        Self::write_atomic(&path, &json)?;
        info!("Staged {} at {}", unit, path.display());
        Ok(())
    }

    fn unstage(&self, profile: &Profile, unit: &InstallableUnit) -> Result<()> {
        let path = self.descriptor_path(profile, unit);
        if path.exists() {
            fs::remove_file(&path)?;
            info!("Unstaged {}", unit);
        }
        Ok(())
    }
}
