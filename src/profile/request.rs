// src/profile/request.rs

//! Change requests and provisioning contexts

use crate::metadata::InstallableUnit;
use std::collections::{BTreeMap, BTreeSet};
use url::Url;

/// A requested change to one profile
///
/// Consumed by `Director::provision`. An update is expressed as removing the
/// old id and adding the new unit; `update` does both.
#[derive(Debug, Clone)]
pub struct ProfileChangeRequest {
    pub profile_id: String,
    pub additions: Vec<InstallableUnit>,
    /// Ids to remove, all installed versions
    pub removals: BTreeSet<String>,
    pub set_properties: BTreeMap<String, String>,
    pub remove_properties: BTreeSet<String>,
}

impl ProfileChangeRequest {
    pub fn new(profile_id: impl Into<String>) -> Self {
        Self {
            profile_id: profile_id.into(),
            additions: Vec::new(),
            removals: BTreeSet::new(),
            set_properties: BTreeMap::new(),
            remove_properties: BTreeSet::new(),
        }
    }

    pub fn add(mut self, unit: InstallableUnit) -> Self {
        self.additions.push(unit);
        self
    }

    pub fn add_all(mut self, units: impl IntoIterator<Item = InstallableUnit>) -> Self {
        self.additions.extend(units);
        self
    }

    pub fn remove(mut self, id: impl Into<String>) -> Self {
        self.removals.insert(id.into());
        self
    }

    /// Replace whatever version of `unit.id` is installed with `unit`
    pub fn update(self, unit: InstallableUnit) -> Self {
        let id = unit.id.clone();
        self.remove(id).add(unit)
    }

    pub fn set_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        self.remove_properties.remove(&key);
        self.set_properties.insert(key, value.into());
        self
    }

    pub fn remove_property(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.set_properties.remove(&key);
        self.remove_properties.insert(key);
        self
    }

    pub fn has_property_changes(&self) -> bool {
        !self.set_properties.is_empty() || !self.remove_properties.is_empty()
    }

    /// Apply the property part of the request to `properties`
    pub(crate) fn apply_properties(&self, properties: &mut BTreeMap<String, String>) {
        for key in &self.remove_properties {
            properties.remove(key);
        }
        for (key, value) in &self.set_properties {
            properties.insert(key.clone(), value.clone());
        }
    }
}

/// Repositories to consult for one provisioning call
///
/// Empty lists mean "every registered repository".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisioningContext {
    pub metadata_repositories: Vec<Url>,
    pub artifact_repositories: Vec<Url>,
}

impl ProvisioningContext {
    pub fn new(metadata_repositories: Vec<Url>) -> Self {
        Self {
            metadata_repositories,
            artifact_repositories: Vec::new(),
        }
    }

    pub fn with_artifact_repositories(mut self, artifact_repositories: Vec<Url>) -> Self {
        self.artifact_repositories = artifact_repositories;
        self
    }
}
