// src/metadata/index.rs

//! Queryable sets of installable units
//!
//! Every query answers in a deterministic order: id ascending, then version
//! descending, then declaration order within the index. The resolver relies
//! on that order to make repeated resolutions reproducible.

use super::{IU_NAMESPACE, InstallableUnit};
use crate::error::Result;
use crate::version::VersionRange;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Read-only query interface over unit metadata
pub trait MetadataIndex: Send + Sync {
    /// Units providing a capability in `namespace`/`name` whose version falls in `range`
    fn find_capability_providers(
        &self,
        namespace: &str,
        name: &str,
        range: &VersionRange,
    ) -> Vec<InstallableUnit>;

    /// Units with the given id whose version falls in `range`
    fn find_by_id(&self, id: &str, range: &VersionRange) -> Vec<InstallableUnit> {
        self.find_capability_providers(IU_NAMESPACE, id, range)
    }

    /// Every indexed version of `unit`'s id except `unit` itself
    fn find_other_versions(&self, unit: &InstallableUnit) -> Vec<InstallableUnit> {
        self.find_by_id(&unit.id, &VersionRange::any())
            .into_iter()
            .filter(|other| other != unit)
            .collect()
    }
}

/// Sort into query order; the sort is stable so declaration order breaks ties
fn sort_query_order(units: &mut [InstallableUnit]) {
    units.sort_by(|a, b| a.id.cmp(&b.id).then_with(|| b.version.cmp(&a.version)));
}

/// An immutable in-memory index
///
/// Built once, then shared behind an `Arc`; there are no mutating methods on
/// a constructed index, which keeps every query against it read-consistent.
#[derive(Debug, Clone, Default)]
pub struct InMemoryIndex {
    /// Units in declaration order, duplicates (same key) dropped
    units: Vec<InstallableUnit>,
    /// Map from (namespace, name) to positions in `units`
    by_capability: HashMap<(String, String), Vec<usize>>,
}

impl InMemoryIndex {
    pub fn new(units: impl IntoIterator<Item = InstallableUnit>) -> Self {
        let mut index = Self::default();
        let mut seen = HashSet::new();

        for unit in units {
            if !seen.insert(unit.key()) {
                debug!("Ignoring duplicate unit {} in index", unit);
                continue;
            }
            let position = index.units.len();
            for cap in unit.capabilities() {
                let slot = index
                    .by_capability
                    .entry((cap.namespace, cap.name))
                    .or_default();
                if slot.last() != Some(&position) {
                    slot.push(position);
                }
            }
            index.units.push(unit);
        }

        index
    }

    /// Parse an index from a JSON array of units
    pub fn from_json_str(json: &str) -> Result<Self> {
        let units: Vec<InstallableUnit> = serde_json::from_str(json)?;
        Ok(Self::new(units))
    }

    /// Load an index from a JSON file containing an array of units
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn units(&self) -> &[InstallableUnit] {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

impl MetadataIndex for InMemoryIndex {
    fn find_capability_providers(
        &self,
        namespace: &str,
        name: &str,
        range: &VersionRange,
    ) -> Vec<InstallableUnit> {
        let Some(positions) = self
            .by_capability
            .get(&(namespace.to_string(), name.to_string()))
        else {
            return Vec::new();
        };

        let mut found: Vec<InstallableUnit> = positions
            .iter()
            .map(|&i| &self.units[i])
            .filter(|unit| {
                unit.capabilities().any(|cap| {
                    cap.namespace == namespace && cap.name == name && range.includes(&cap.version)
                })
            })
            .cloned()
            .collect();

        sort_query_order(&mut found);
        found
    }
}

/// Several indexes queried as one
///
/// Earlier indexes win when two contain the same unit key.
#[derive(Clone, Default)]
pub struct CompositeIndex {
    indexes: Vec<Arc<dyn MetadataIndex>>,
}

impl CompositeIndex {
    pub fn new(indexes: Vec<Arc<dyn MetadataIndex>>) -> Self {
        Self { indexes }
    }

    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }
}

impl std::fmt::Debug for CompositeIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeIndex")
            .field("indexes", &self.indexes.len())
            .finish()
    }
}

impl MetadataIndex for CompositeIndex {
    fn find_capability_providers(
        &self,
        namespace: &str,
        name: &str,
        range: &VersionRange,
    ) -> Vec<InstallableUnit> {
        let mut seen = HashSet::new();
        let mut found: Vec<InstallableUnit> = self
            .indexes
            .iter()
            .flat_map(|index| index.find_capability_providers(namespace, name, range))
            .filter(|unit| seen.insert(unit.key()))
            .collect();

        sort_query_order(&mut found);
        found
    }
}
