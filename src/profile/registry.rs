// src/profile/registry.rs

//! Per-profile locking store

use super::Profile;
use crate::error::{Error, Result};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock};
use tracing::info;

/// Holds every managed profile behind its own mutex
///
/// Mutations of one profile serialize on that profile's mutex; different
/// profiles never contend. The outer lock only guards the map itself and is
/// never held while a profile is being changed.
#[derive(Debug, Default)]
pub struct ProfileRegistry {
    profiles: RwLock<HashMap<String, Arc<Mutex<Profile>>>>,
}

impl ProfileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty profile
    pub fn create_profile(&self, id: &str, properties: BTreeMap<String, String>) -> Result<Profile> {
        let mut profiles = self.profiles.write().unwrap_or_else(|e| e.into_inner());
        if profiles.contains_key(id) {
            return Err(Error::ProfileExists(id.to_string()));
        }

        let profile = Profile::new(id).with_properties(properties);
        profiles.insert(id.to_string(), Arc::new(Mutex::new(profile.clone())));
        info!("Created profile {}", id);
        Ok(profile)
    }

    /// Forget a profile; returns its last state
    pub fn remove_profile(&self, id: &str) -> Result<Profile> {
        let slot = self
            .profiles
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id)
            .ok_or_else(|| Error::ProfileNotFound(id.to_string()))?;
        let profile = slot.lock().unwrap_or_else(|e| e.into_inner()).clone();
        Ok(profile)
    }

    /// A copy of the current state of a profile
    pub fn profile(&self, id: &str) -> Result<Profile> {
        let slot = self.slot(id)?;
        let profile = slot.lock().unwrap_or_else(|e| e.into_inner()).clone();
        Ok(profile)
    }

    pub fn profile_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .profiles
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    /// The live, lockable profile
    pub(crate) fn slot(&self, id: &str) -> Result<Arc<Mutex<Profile>>> {
        self.profiles
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
            .ok_or_else(|| Error::ProfileNotFound(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_fetch_profile() {
        let registry = ProfileRegistry::new();
        let props = BTreeMap::from([("install.folder".to_string(), "/opt/sdk".to_string())]);
        registry.create_profile("sdk", props).unwrap();

        let profile = registry.profile("sdk").unwrap();
        assert!(profile.is_empty());
        assert_eq!(profile.property("install.folder"), Some("/opt/sdk"));
        assert_eq!(registry.profile_ids(), vec!["sdk".to_string()]);
    }

    #[test]
    fn test_duplicate_profile_rejected() {
        let registry = ProfileRegistry::new();
        registry.create_profile("sdk", BTreeMap::new()).unwrap();
        assert!(matches!(
            registry.create_profile("sdk", BTreeMap::new()),
            Err(Error::ProfileExists(_))
        ));
    }

    #[test]
    fn test_missing_profile() {
        let registry = ProfileRegistry::new();
        assert!(matches!(registry.profile("nope"), Err(Error::ProfileNotFound(_))));
        assert!(matches!(registry.remove_profile("nope"), Err(Error::ProfileNotFound(_))));
    }

    #[test]
    fn test_copies_do_not_alias_live_profile() {
        let registry = ProfileRegistry::new();
        registry.create_profile("p", BTreeMap::new()).unwrap();

        let mut copy = registry.profile("p").unwrap();
        copy.properties.insert("k".to_string(), "v".to_string());

        assert_eq!(registry.profile("p").unwrap().property("k"), None);
    }
}
