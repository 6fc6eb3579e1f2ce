// src/profile/mod.rs

//! Profiles and the requests that change them
//!
//! A profile is the installed state being managed: a set of units plus string
//! properties. Callers only ever see copies; the registry hands the live
//! profile to the director under a per-profile lock.

mod registry;
mod request;

pub use registry::ProfileRegistry;
pub use request::{ProfileChangeRequest, ProvisioningContext};

use crate::metadata::{InstallableUnit, IuKey};
use std::collections::BTreeMap;

/// Property holding the installation root directory
pub const PROP_INSTALL_FOLDER: &str = "install.folder";

/// Installed state of one managed installation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub id: String,
    units: BTreeMap<IuKey, InstallableUnit>,
    pub properties: BTreeMap<String, String>,
}

impl Profile {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            units: BTreeMap::new(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_properties(mut self, properties: BTreeMap<String, String>) -> Self {
        self.properties = properties;
        self
    }

    /// Installed units in key order
    pub fn units(&self) -> impl Iterator<Item = &InstallableUnit> {
        self.units.values()
    }

    pub fn unit_keys(&self) -> impl Iterator<Item = &IuKey> {
        self.units.keys()
    }

    pub fn contains(&self, key: &IuKey) -> bool {
        self.units.contains_key(key)
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.units.keys().any(|key| key.id == id)
    }

    /// Installed versions of `id`
    pub fn find_by_id<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a InstallableUnit> + 'a {
        self.units.values().filter(move |unit| unit.id == id)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub(crate) fn add_unit(&mut self, unit: InstallableUnit) {
        self.units.insert(unit.key(), unit);
    }

    pub(crate) fn remove_unit(&mut self, key: &IuKey) -> Option<InstallableUnit> {
        self.units.remove(key)
    }
}
