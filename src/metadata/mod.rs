// src/metadata/mod.rs

//! Installable unit metadata
//!
//! An installable unit (IU) is an immutable, versioned component descriptor.
//! It declares the capabilities it provides and the requirements it needs;
//! the resolver matches one against the other. Identity is `(id, version)`:
//! two descriptors with the same key are the same unit regardless of their
//! other attributes.

mod index;
mod repository;

pub use index::{CompositeIndex, InMemoryIndex, MetadataIndex};
pub use repository::MetadataRepositoryManager;

use crate::version::{Version, VersionRange};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Namespace of the capability every unit implicitly provides for its own id
pub const IU_NAMESPACE: &str = "iu";

/// The identity of an installable unit
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IuKey {
    pub id: String,
    pub version: Version,
}

impl IuKey {
    pub fn new(id: impl Into<String>, version: Version) -> Self {
        Self {
            id: id.into(),
            version,
        }
    }
}

impl fmt::Display for IuKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.version)
    }
}

/// A (namespace, name, version) tuple a unit provides
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProvidedCapability {
    pub namespace: String,
    pub name: String,
    pub version: Version,
}

impl ProvidedCapability {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, version: Version) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            version,
        }
    }
}

impl fmt::Display for ProvidedCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} {}", self.namespace, self.name, self.version)
    }
}

/// A (namespace, name, range) tuple a unit needs
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Requirement {
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub range: VersionRange,
    /// Satisfied if present, never pulled in on its own
    #[serde(default)]
    pub optional: bool,
    /// Pull a provider in even when optional, unless the resolver is strict
    #[serde(default)]
    pub greedy: bool,
}

impl Requirement {
    /// A mandatory requirement
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, range: VersionRange) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            range,
            optional: false,
            greedy: false,
        }
    }

    /// A mandatory requirement on another unit by id
    pub fn unit(id: impl Into<String>, range: VersionRange) -> Self {
        Self::new(IU_NAMESPACE, id, range)
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn greedy(mut self) -> Self {
        self.greedy = true;
        self
    }

    pub fn is_mandatory(&self) -> bool {
        !self.optional
    }

    /// Check if a provided capability matches this requirement
    pub fn matches(&self, capability: &ProvidedCapability) -> bool {
        self.namespace == capability.namespace
            && self.name == capability.name
            && self.range.includes(&capability.version)
    }

    /// Check if a unit provides something matching this requirement
    pub fn is_satisfied_by(&self, unit: &InstallableUnit) -> bool {
        unit.capabilities().any(|cap| self.matches(&cap))
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} {}", self.namespace, self.name, self.range)?;
        if self.optional {
            write!(f, " (optional)")?;
        }
        Ok(())
    }
}

/// An installable unit descriptor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallableUnit {
    pub id: String,
    pub version: Version,
    /// At most one version of this id may coexist in a profile
    #[serde(default)]
    pub singleton: bool,
    #[serde(default)]
    pub provides: Vec<ProvidedCapability>,
    #[serde(default)]
    pub requires: Vec<Requirement>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl InstallableUnit {
    pub fn new(id: impl Into<String>, version: Version) -> Self {
        Self {
            id: id.into(),
            version,
            singleton: false,
            provides: Vec::new(),
            requires: Vec::new(),
            properties: BTreeMap::new(),
        }
    }

    pub fn singleton(mut self) -> Self {
        self.singleton = true;
        self
    }

    pub fn provides(mut self, capability: ProvidedCapability) -> Self {
        self.provides.push(capability);
        self
    }

    pub fn requires(mut self, requirement: Requirement) -> Self {
        self.requires.push(requirement);
        self
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn key(&self) -> IuKey {
        IuKey::new(self.id.clone(), self.version.clone())
    }

    /// The implicit self capability followed by the declared ones
    pub fn capabilities(&self) -> impl Iterator<Item = ProvidedCapability> + '_ {
        std::iter::once(ProvidedCapability::new(
            IU_NAMESPACE,
            self.id.clone(),
            self.version.clone(),
        ))
        .chain(self.provides.iter().cloned())
    }

    pub fn mandatory_requirements(&self) -> impl Iterator<Item = &Requirement> {
        self.requires.iter().filter(|r| r.is_mandatory())
    }

    /// Two distinct versions of the same singleton id cannot coexist
    pub fn collides_with(&self, other: &InstallableUnit) -> bool {
        self.id == other.id && self.version != other.version && self.singleton && other.singleton
    }
}

impl PartialEq for InstallableUnit {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.version == other.version
    }
}

impl Eq for InstallableUnit {}

impl Hash for InstallableUnit {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.version.hash(state);
    }
}

impl PartialOrd for InstallableUnit {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for InstallableUnit {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id
            .cmp(&other.id)
            .then_with(|| self.version.cmp(&other.version))
    }
}

impl fmt::Display for InstallableUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.version)
    }
}
