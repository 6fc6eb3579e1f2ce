// src/metadata/repository.rs

//! Registry of metadata repositories keyed by location

use super::{CompositeIndex, InMemoryIndex, MetadataIndex};
use crate::error::{Error, Result};
use crate::location;
use crate::profile::ProvisioningContext;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, info};
use url::Url;

/// File name looked up when a repository location is a directory
pub const CONTENT_FILE: &str = "content.json";

/// Known metadata repositories
///
/// Each repository is an immutable `InMemoryIndex` behind an `Arc`. Replacing
/// a repository swaps the `Arc`; indexes already handed out by `snapshot`
/// keep answering from the old content, so a resolution in progress never
/// observes a change.
#[derive(Debug, Default)]
pub struct MetadataRepositoryManager {
    repositories: RwLock<BTreeMap<Url, Arc<InMemoryIndex>>>,
}

impl MetadataRepositoryManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the repository at `location`
    pub fn add_repository(&self, location: &Url, index: InMemoryIndex) {
        let key = location::normalize(location);
        info!("Registering metadata repository {} ({} units)", key, index.len());
        self.repositories
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key, Arc::new(index));
    }

    /// Load a JSON repository from a `file:` location and register it
    ///
    /// A directory location is read from its `content.json`.
    pub fn load_repository(&self, location: &Url) -> Result<()> {
        let mut path = location::to_file(location)
            .ok_or_else(|| Error::InvalidLocation(location.to_string()))?;
        if path.is_dir() {
            path = path.join(CONTENT_FILE);
        }
        let index = InMemoryIndex::load_json(&path)?;
        self.add_repository(location, index);
        Ok(())
    }

    /// Returns true if a repository was registered at `location`
    pub fn remove_repository(&self, location: &Url) -> bool {
        self.repositories
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&location::normalize(location))
            .is_some()
    }

    pub fn locations(&self) -> Vec<Url> {
        self.repositories
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect()
    }

    /// Capture the indexes a provisioning call should consult
    ///
    /// An empty context means every registered repository. Naming a location
    /// that is not registered is an error.
    pub fn snapshot(&self, context: &ProvisioningContext) -> Result<CompositeIndex> {
        let repositories = self.repositories.read().unwrap_or_else(|e| e.into_inner());

        let indexes: Vec<Arc<dyn MetadataIndex>> = if context.metadata_repositories.is_empty() {
            repositories
                .values()
                .map(|index| Arc::clone(index) as Arc<dyn MetadataIndex>)
                .collect()
        } else {
            context
                .metadata_repositories
                .iter()
                .map(|location| {
                    repositories
                        .get(&location::normalize(location))
                        .map(|index| Arc::clone(index) as Arc<dyn MetadataIndex>)
                        .ok_or_else(|| Error::RepositoryNotFound(location.to_string()))
                })
                .collect::<Result<_>>()?
        };

        debug!("Captured {} metadata repositories for provisioning", indexes.len());
        Ok(CompositeIndex::new(indexes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::InstallableUnit;
    use crate::version::{Version, VersionRange};

    fn repo(url: &str) -> Url {
        Url::parse(url).unwrap()
    }

    fn index_with(id: &str, version: &str) -> InMemoryIndex {
        InMemoryIndex::new(vec![InstallableUnit::new(id, Version::parse(version).unwrap())])
    }

    #[test]
    fn test_empty_context_uses_all_repositories() {
        let manager = MetadataRepositoryManager::new();
        manager.add_repository(&repo("http://example.org/a"), index_with("a", "1"));
        manager.add_repository(&repo("http://example.org/b"), index_with("b", "1"));

        let index = manager.snapshot(&ProvisioningContext::default()).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.find_by_id("b", &VersionRange::any()).len(), 1);
    }

    #[test]
    fn test_context_limits_repositories() {
        let manager = MetadataRepositoryManager::new();
        manager.add_repository(&repo("http://example.org/a"), index_with("a", "1"));
        manager.add_repository(&repo("http://example.org/b"), index_with("b", "1"));

        let context = ProvisioningContext::new(vec![repo("http://EXAMPLE.org/a/")]);
        let index = manager.snapshot(&context).unwrap();
        assert_eq!(index.len(), 1);
        assert!(index.find_by_id("b", &VersionRange::any()).is_empty());
    }

    #[test]
    fn test_unknown_repository_is_an_error() {
        let manager = MetadataRepositoryManager::new();
        let context = ProvisioningContext::new(vec![repo("http://example.org/missing")]);
        assert!(matches!(
            manager.snapshot(&context),
            Err(Error::RepositoryNotFound(_))
        ));
    }

    #[test]
    fn test_snapshot_survives_replacement() {
        let manager = MetadataRepositoryManager::new();
        let location = repo("http://example.org/a");
        manager.add_repository(&location, index_with("a", "1"));

        let before = manager.snapshot(&ProvisioningContext::default()).unwrap();
        manager.add_repository(&location, index_with("a", "2"));

        let old = before.find_by_id("a", &VersionRange::any());
        assert_eq!(old[0].version, Version::parse("1").unwrap());

        let after = manager.snapshot(&ProvisioningContext::default()).unwrap();
        assert_eq!(
            after.find_by_id("a", &VersionRange::any())[0].version,
            Version::parse("2").unwrap()
        );
    }

    #[test]
    fn test_load_repository_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONTENT_FILE),
            r#"[{ "id": "a", "version": "1.0.0" }]"#,
        )
        .unwrap();

        let manager = MetadataRepositoryManager::new();
        let location = location::from_path(dir.path()).unwrap();
        manager.load_repository(&location).unwrap();
        assert_eq!(manager.locations(), vec![location]);
        assert!(manager.remove_repository(&manager.locations()[0]));
        assert!(manager.locations().is_empty());
    }
}
