// src/resolver/engine.rs

//! Closure-based unit resolver
//!
//! Starting from the profile's units minus removals plus additions, the
//! resolver repeatedly satisfies every unmet mandatory requirement with a
//! unit from the index until the set is closed. Units already in the set win
//! over new ones; among new ones the first in index query order (id, then
//! highest version, then declaration order) that does not collide with a
//! singleton already in the set is chosen.
//!
//! A singleton pulled for one requirement may turn out to exclude a later
//! one. The closure then learns that the singleton's pick must also satisfy
//! the later requirement and starts over, so the outcome does not depend on
//! the order requirements are visited in.
//!
//! Greedy optional requirements are considered only once the mandatory
//! closure is consistent. Each add-on is tried as an extension of that
//! closure and kept only if its own closure is consistent too.

use crate::metadata::{InstallableUnit, IuKey, MetadataIndex, Requirement};
use crate::version::{Version, VersionRange};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use tracing::{debug, info};

use super::conflict::Conflict;
use super::plan::Resolution;

/// Resolver behaviour switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolverOptions {
    /// Do not pull providers for greedy optional requirements
    pub strict: bool,
}

/// Unit resolver over one index
pub struct Resolver<'a> {
    index: &'a dyn MetadataIndex,
    options: ResolverOptions,
}

impl<'a> Resolver<'a> {
    pub fn new(index: &'a dyn MetadataIndex) -> Self {
        Self {
            index,
            options: ResolverOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ResolverOptions) -> Self {
        self.options = options;
        self
    }

    /// Compute the closed target set for a change
    ///
    /// `removals` drops every installed version of the named ids and keeps
    /// them from being pulled back in; only an explicit addition may
    /// re-introduce a removed id. Resolution has no side effects.
    pub fn resolve(
        &self,
        base: &[InstallableUnit],
        additions: &[InstallableUnit],
        removals: &BTreeSet<String>,
    ) -> Resolution {
        info!(
            "Resolving {} installed unit(s), {} addition(s), {} removal(s)",
            base.len(),
            additions.len(),
            removals.len()
        );

        let mut search = Search {
            index: self.index,
            excluded: removals
                .iter()
                .filter(|id| !additions.iter().any(|unit| &unit.id == *id))
                .cloned()
                .collect(),
            queries: HashMap::new(),
        };

        let mut fixed = BTreeMap::new();
        for unit in base.iter().filter(|unit| !removals.contains(&unit.id)) {
            fixed.insert(unit.key(), unit.clone());
        }
        for unit in additions {
            fixed.entry(unit.key()).or_insert_with(|| unit.clone());
        }

        let mut conflicts = singleton_conflicts(&fixed);
        let mut closure = search.close(&fixed);
        conflicts.append(&mut closure.conflicts);

        if !conflicts.is_empty() {
            info!("Resolution failed with {} conflict(s)", conflicts.len());
            return Resolution {
                units: Vec::new(),
                pulled_in: closure.pulled_in,
                conflicts,
            };
        }

        if !self.options.strict {
            closure = search.extend_greedy(closure);
        }

        info!(
            "Resolved {} unit(s), {} pulled from metadata",
            closure.units.len(),
            closure.pulled_in.len()
        );
        Resolution {
            units: closure.units.into_values().collect(),
            pulled_in: closure.pulled_in,
            conflicts: Vec::new(),
        }
    }
}

/// Ids with more than one singleton version in a starting set
fn singleton_conflicts(units: &BTreeMap<IuKey, InstallableUnit>) -> Vec<Conflict> {
    let mut singleton_versions: BTreeMap<&str, Vec<Version>> = BTreeMap::new();
    for unit in units.values().filter(|unit| unit.singleton) {
        singleton_versions
            .entry(unit.id.as_str())
            .or_default()
            .push(unit.version.clone());
    }

    singleton_versions
        .into_iter()
        .filter(|(_, versions)| versions.len() > 1)
        .map(|(id, versions)| Conflict::SingletonConflict {
            id: id.to_string(),
            versions,
            required_by: Vec::new(),
        })
        .collect()
}

/// A closed (or failed) unit set
struct Closure {
    units: BTreeMap<IuKey, InstallableUnit>,
    /// Units taken from the index, in pull order
    pulled_in: Vec<IuKey>,
    conflicts: Vec<Conflict>,
}

/// A requirement that picks of a singleton id must also satisfy
type Preference = (String, Requirement);

/// One closure attempt, with the preferences it discovered
struct Attempt {
    closure: Closure,
    learned: Vec<Preference>,
}

/// Index access shared by every closure of one resolution
struct Search<'a> {
    index: &'a dyn MetadataIndex,
    /// Removed ids the index may not supply again
    excluded: HashSet<String>,
    /// Provider query results, captured once per requirement shape
    queries: HashMap<(String, String, VersionRange), Vec<InstallableUnit>>,
}

impl Search<'_> {
    /// Close `fixed` over its mandatory requirements
    ///
    /// Units in `fixed` are never replaced. Attempts repeat while they
    /// learn new preferences; the set of possible preferences is finite.
    fn close(&mut self, fixed: &BTreeMap<IuKey, InstallableUnit>) -> Closure {
        let mut preferences: Vec<Preference> = Vec::new();
        loop {
            let attempt = self.attempt(fixed, &preferences);
            if attempt.learned.is_empty() {
                return attempt.closure;
            }
            for (id, requirement) in attempt.learned {
                debug!("Retrying closure with {} narrowed by {}", id, requirement);
                preferences.push((id, requirement));
            }
        }
    }

    fn attempt(
        &mut self,
        fixed: &BTreeMap<IuKey, InstallableUnit>,
        preferences: &[Preference],
    ) -> Attempt {
        let mut units = fixed.clone();
        let mut pulled_in: Vec<IuKey> = Vec::new();
        let mut conflicts = Vec::new();
        let mut learned: Vec<Preference> = Vec::new();
        let mut queue: VecDeque<IuKey> = units.keys().cloned().collect();

        while let Some(key) = queue.pop_front() {
            let Some(unit) = units.get(&key).cloned() else {
                continue;
            };

            for requirement in unit.mandatory_requirements() {
                if units.values().any(|other| requirement.is_satisfied_by(other)) {
                    continue;
                }

                let candidates = self.candidates(requirement, preferences);
                let choice = candidates
                    .iter()
                    .find(|candidate| !units.values().any(|other| other.collides_with(candidate)));

                if let Some(choice) = choice {
                    debug!("Pulling in {} for {} ({})", choice, key, requirement);
                    let pulled = choice.key();
                    units.insert(pulled.clone(), choice.clone());
                    pulled_in.push(pulled.clone());
                    queue.push_back(pulled);
                    continue;
                }

                let Some(candidate) = candidates.first() else {
                    conflicts.push(Conflict::UnsatisfiableRequirement {
                        requirement: requirement.clone(),
                        required_by: key.clone(),
                    });
                    continue;
                };

                let blocking: Vec<&InstallableUnit> = units
                    .values()
                    .filter(|other| other.collides_with(candidate))
                    .collect();

                // Singletons this closure pulled itself can be picked again
                if blocking.iter().all(|other| pulled_in.contains(&other.key())) {
                    let preference = (candidate.id.clone(), requirement.clone());
                    if !preferences.contains(&preference) && !learned.contains(&preference) {
                        learned.push(preference);
                    }
                }

                let mut versions: Vec<Version> =
                    blocking.iter().map(|other| other.version.clone()).collect();
                versions.push(candidate.version.clone());
                versions.sort();
                versions.dedup();

                conflicts.push(Conflict::SingletonConflict {
                    id: candidate.id.clone(),
                    versions,
                    required_by: vec![key.clone()],
                });
            }
        }

        Attempt {
            closure: Closure {
                units,
                pulled_in,
                conflicts,
            },
            learned,
        }
    }

    /// Add the providers of unmet greedy requirements where that stays consistent
    fn extend_greedy(&mut self, mut closure: Closure) -> Closure {
        let mut worklist: VecDeque<IuKey> = closure.units.keys().cloned().collect();

        while let Some(key) = worklist.pop_front() {
            let Some(unit) = closure.units.get(&key).cloned() else {
                continue;
            };

            for requirement in unit.requires.iter().filter(|r| r.greedy && !r.is_mandatory()) {
                if closure.units.values().any(|other| requirement.is_satisfied_by(other)) {
                    continue;
                }

                match self.try_extension(&closure.units, requirement) {
                    Some(extension) => {
                        debug!(
                            "Pulling in {} unit(s) for greedy {} of {}",
                            extension.pulled_in.len(),
                            requirement,
                            key
                        );
                        worklist.extend(extension.pulled_in.iter().cloned());
                        closure.pulled_in.extend(extension.pulled_in);
                        closure.units = extension.units;
                    }
                    None => debug!("Skipping greedy optional {} of {}", requirement, key),
                }
            }
        }
        closure
    }

    /// Closure of `units` plus the first provider of `requirement` that keeps it consistent
    fn try_extension(
        &mut self,
        units: &BTreeMap<IuKey, InstallableUnit>,
        requirement: &Requirement,
    ) -> Option<Closure> {
        for candidate in self.candidates(requirement, &[]) {
            if units.values().any(|other| other.collides_with(&candidate)) {
                continue;
            }

            let mut fixed = units.clone();
            fixed.insert(candidate.key(), candidate.clone());
            let mut extension = self.close(&fixed);
            if extension.conflicts.is_empty() {
                extension.pulled_in.insert(0, candidate.key());
                return Some(extension);
            }
            debug!(
                "{} would add {} conflict(s), not pulling it",
                candidate,
                extension.conflicts.len()
            );
        }
        None
    }

    /// Providers of `requirement` the index may supply, preferred ones first
    fn candidates(
        &mut self,
        requirement: &Requirement,
        preferences: &[Preference],
    ) -> Vec<InstallableUnit> {
        let mut candidates: Vec<InstallableUnit> = self
            .providers(requirement)
            .into_iter()
            .filter(|candidate| !self.excluded.contains(&candidate.id))
            .collect();

        // Stable, so query order is kept within each group
        candidates.sort_by_key(|candidate| {
            !preferences
                .iter()
                .filter(|(id, _)| *id == candidate.id)
                .all(|(_, wanted)| wanted.is_satisfied_by(candidate))
        });
        candidates
    }

    fn providers(&mut self, requirement: &Requirement) -> Vec<InstallableUnit> {
        let index = self.index;
        self.queries
            .entry((
                requirement.namespace.clone(),
                requirement.name.clone(),
                requirement.range.clone(),
            ))
            .or_insert_with(|| {
                index.find_capability_providers(
                    &requirement.namespace,
                    &requirement.name,
                    &requirement.range,
                )
            })
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{InMemoryIndex, ProvidedCapability};

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn range(s: &str) -> VersionRange {
        VersionRange::parse(s).unwrap()
    }

    fn iu(id: &str, version: &str) -> InstallableUnit {
        InstallableUnit::new(id, v(version))
    }

    fn no_removals() -> BTreeSet<String> {
        BTreeSet::new()
    }

    fn ids(resolution: &Resolution) -> Vec<String> {
        resolution.units.iter().map(|u| u.to_string()).collect()
    }

    #[test]
    fn test_highest_version_in_range_is_pulled() {
        let index = InMemoryIndex::new(vec![iu("b", "1"), iu("b", "1.5"), iu("b", "2")]);
        let a = iu("a", "1").requires(Requirement::unit("b", range("[1,2)")));

        let resolution = Resolver::new(&index).resolve(&[], &[a], &no_removals());
        assert!(resolution.is_consistent());
        assert_eq!(ids(&resolution), vec!["a 1.0.0", "b 1.5.0"]);
        assert_eq!(resolution.pulled_in, vec![IuKey::new("b", v("1.5"))]);
    }

    #[test]
    fn test_installed_provider_is_preferred() {
        let index = InMemoryIndex::new(vec![iu("b", "1"), iu("b", "2")]);
        let a = iu("a", "1").requires(Requirement::unit("b", range("1")));

        let resolution = Resolver::new(&index).resolve(&[iu("b", "1")], &[a], &no_removals());
        assert_eq!(ids(&resolution), vec!["a 1.0.0", "b 1.0.0"]);
        assert!(resolution.pulled_in.is_empty());
    }

    #[test]
    fn test_transitive_closure() {
        let index = InMemoryIndex::new(vec![
            iu("b", "1").requires(Requirement::unit("c", VersionRange::any())),
            iu("c", "1").provides(ProvidedCapability::new("java.package", "p", v("1"))),
            iu("d", "1").requires(Requirement::new("java.package", "p", range("1"))),
        ]);
        let a = iu("a", "1")
            .requires(Requirement::unit("b", VersionRange::any()))
            .requires(Requirement::unit("d", VersionRange::any()));

        let resolution = Resolver::new(&index).resolve(&[], &[a], &no_removals());
        assert_eq!(ids(&resolution), vec!["a 1.0.0", "b 1.0.0", "c 1.0.0", "d 1.0.0"]);
    }

    #[test]
    fn test_optional_requirement_is_not_pulled() {
        let index = InMemoryIndex::new(vec![iu("b", "1")]);
        let a = iu("a", "1").requires(Requirement::unit("b", VersionRange::any()).optional());

        let resolution = Resolver::new(&index).resolve(&[], &[a], &no_removals());
        assert!(resolution.is_consistent());
        assert_eq!(ids(&resolution), vec!["a 1.0.0"]);
    }

    #[test]
    fn test_missing_optional_requirement_is_not_a_conflict() {
        let index = InMemoryIndex::default();
        let a = iu("a", "1").requires(Requirement::unit("gone", VersionRange::any()).optional().greedy());

        let resolution = Resolver::new(&index).resolve(&[], &[a], &no_removals());
        assert!(resolution.is_consistent());
    }

    #[test]
    fn test_greedy_optional_is_pulled_unless_strict() {
        let index = InMemoryIndex::new(vec![iu("addon", "1")]);
        let a = iu("a", "1").requires(Requirement::unit("addon", VersionRange::any()).optional().greedy());

        let relaxed = Resolver::new(&index).resolve(&[], &[a.clone()], &no_removals());
        assert_eq!(ids(&relaxed), vec!["a 1.0.0", "addon 1.0.0"]);

        let strict = Resolver::new(&index)
            .with_options(ResolverOptions { strict: true })
            .resolve(&[], &[a], &no_removals());
        assert_eq!(ids(&strict), vec!["a 1.0.0"]);
    }

    #[test]
    fn test_greedy_optional_skips_singleton_collision() {
        let index = InMemoryIndex::new(vec![iu("x", "2").singleton()]);
        let a = iu("a", "1").requires(Requirement::unit("x", range("2")).optional().greedy());

        let resolution = Resolver::new(&index).resolve(&[iu("x", "1").singleton()], &[a], &no_removals());
        assert!(resolution.is_consistent());
        assert_eq!(ids(&resolution), vec!["a 1.0.0", "x 1.0.0"]);
    }

    #[test]
    fn test_all_unsatisfiable_requirements_are_reported() {
        let index = InMemoryIndex::default();
        let a = iu("a", "1")
            .requires(Requirement::unit("missing-1", VersionRange::any()))
            .requires(Requirement::unit("missing-2", VersionRange::any()));
        let b = iu("b", "1").requires(Requirement::new("java.package", "q", range("3")));

        let resolution = Resolver::new(&index).resolve(&[], &[a, b], &no_removals());
        assert_eq!(resolution.conflicts.len(), 3);
        assert!(resolution.units.is_empty());
        let subjects: Vec<&str> = resolution.conflicts.iter().map(|c| c.subject()).collect();
        assert_eq!(subjects, vec!["missing-1", "missing-2", "q"]);
    }

    #[test]
    fn test_singleton_in_request_and_profile_conflicts() {
        let index = InMemoryIndex::default();
        let resolution = Resolver::new(&index).resolve(
            &[iu("x", "1").singleton()],
            &[iu("x", "2").singleton()],
            &no_removals(),
        );

        assert_eq!(
            resolution.conflicts,
            vec![Conflict::SingletonConflict {
                id: "x".to_string(),
                versions: vec![v("1"), v("2")],
                required_by: Vec::new(),
            }]
        );
    }

    #[test]
    fn test_singleton_pull_conflict_names_requirer() {
        let index = InMemoryIndex::new(vec![iu("x", "2").singleton()]);
        let a = iu("a", "1").requires(Requirement::unit("x", range("2")));

        let resolution = Resolver::new(&index).resolve(&[iu("x", "1").singleton()], &[a], &no_removals());
        assert_eq!(
            resolution.conflicts,
            vec![Conflict::SingletonConflict {
                id: "x".to_string(),
                versions: vec![v("1"), v("2")],
                required_by: vec![IuKey::new("a", v("1"))],
            }]
        );
    }

    #[test]
    fn test_earlier_pick_satisfies_later_requirement() {
        let index = InMemoryIndex::new(vec![iu("x", "2").singleton(), iu("x", "1").singleton()]);
        let a = iu("a", "1").requires(Requirement::unit("x", range("[1,2)")));
        let b = iu("b", "1").requires(Requirement::unit("x", range("1")));

        let resolution = Resolver::new(&index).resolve(&[], &[b, a], &no_removals());
        assert!(resolution.is_consistent());
        assert_eq!(ids(&resolution), vec!["a 1.0.0", "b 1.0.0", "x 1.0.0"]);
    }

    #[test]
    fn test_removed_id_is_not_pulled_back() {
        let index = InMemoryIndex::new(vec![iu("b", "1")]);
        let a = iu("a", "1").requires(Requirement::unit("b", VersionRange::any()));
        let removals = BTreeSet::from(["b".to_string()]);

        let resolution = Resolver::new(&index).resolve(&[a, iu("b", "1")], &[], &removals);
        assert_eq!(
            resolution.conflicts,
            vec![Conflict::UnsatisfiableRequirement {
                requirement: Requirement::unit("b", VersionRange::any()),
                required_by: IuKey::new("a", v("1")),
            }]
        );
    }

    #[test]
    fn test_remove_and_add_expresses_update() {
        let index = InMemoryIndex::default();
        let removals = BTreeSet::from(["x".to_string()]);
        let resolution = Resolver::new(&index).resolve(
            &[iu("x", "1").singleton()],
            &[iu("x", "2").singleton()],
            &removals,
        );
        assert_eq!(ids(&resolution), vec!["x 2.0.0"]);
    }

    #[test]
    fn test_resolution_is_reproducible() {
        let index = InMemoryIndex::new(vec![
            iu("p1", "1").provides(ProvidedCapability::new("ns", "cap", v("1"))),
            iu("p2", "1").provides(ProvidedCapability::new("ns", "cap", v("1"))),
            iu("q", "1").singleton(),
        ]);
        let a = iu("a", "1")
            .requires(Requirement::new("ns", "cap", VersionRange::any()))
            .requires(Requirement::unit("missing", VersionRange::any()));

        let resolver = Resolver::new(&index);
        let first = resolver.resolve(&[], &[a.clone()], &no_removals());
        let second = resolver.resolve(&[], &[a], &no_removals());
        assert_eq!(first, second);
    }

    #[test]
    fn test_greedy_pick_yields_to_mandatory_singleton() {
        let index = InMemoryIndex::new(vec![iu("x", "2").singleton(), iu("x", "1").singleton()]);
        let a = iu("a", "1").requires(Requirement::unit("x", VersionRange::any()).optional().greedy());
        let b = iu("b", "1").requires(Requirement::unit("x", range("[1,2)")));

        let resolution = Resolver::new(&index).resolve(&[], &[a, b], &no_removals());
        assert!(resolution.is_consistent(), "{:?}", resolution.conflicts);
        assert_eq!(ids(&resolution), vec!["a 1.0.0", "b 1.0.0", "x 1.0.0"]);
    }

    #[test]
    fn test_greedy_addon_with_missing_dependency_is_dropped() {
        let index = InMemoryIndex::new(vec![
            iu("addon", "1").requires(Requirement::unit("gone", VersionRange::any())),
        ]);
        let a = iu("a", "1").requires(Requirement::unit("addon", VersionRange::any()).optional().greedy());

        let resolution = Resolver::new(&index).resolve(&[], &[a], &no_removals());
        assert!(resolution.is_consistent(), "{:?}", resolution.conflicts);
        assert_eq!(ids(&resolution), vec!["a 1.0.0"]);
        assert!(resolution.pulled_in.is_empty());
    }

    #[test]
    fn test_greedy_addon_falls_back_to_older_version() {
        let index = InMemoryIndex::new(vec![
            iu("addon", "2").requires(Requirement::unit("gone", VersionRange::any())),
            iu("addon", "1").requires(Requirement::unit("lib", VersionRange::any())),
            iu("lib", "1"),
        ]);
        let a = iu("a", "1").requires(Requirement::unit("addon", VersionRange::any()).optional().greedy());

        let resolution = Resolver::new(&index).resolve(&[], &[a], &no_removals());
        assert_eq!(ids(&resolution), vec!["a 1.0.0", "addon 1.0.0", "lib 1.0.0"]);
        assert_eq!(
            resolution.pulled_in,
            vec![IuKey::new("addon", v("1")), IuKey::new("lib", v("1"))]
        );
    }

    #[test]
    fn test_greedy_addon_cannot_displace_mandatory_pick() {
        // The add-on needs x 2, the mandatory closure already settled on x 1
        let index = InMemoryIndex::new(vec![
            iu("x", "2").singleton(),
            iu("x", "1").singleton(),
            iu("addon", "1").requires(Requirement::unit("x", range("[2,3)"))),
        ]);
        let a = iu("a", "1")
            .requires(Requirement::unit("x", range("[1,2)")))
            .requires(Requirement::unit("addon", VersionRange::any()).optional().greedy());

        let resolution = Resolver::new(&index).resolve(&[], &[a], &no_removals());
        assert!(resolution.is_consistent(), "{:?}", resolution.conflicts);
        assert_eq!(ids(&resolution), vec!["a 1.0.0", "x 1.0.0"]);
    }

    #[test]
    fn test_pulled_singleton_is_picked_again_for_later_requirement() {
        let index = InMemoryIndex::new(vec![iu("x", "2").singleton(), iu("x", "1").singleton()]);
        let a = iu("a", "1").requires(Requirement::unit("x", VersionRange::any()));
        let b = iu("b", "1").requires(Requirement::unit("x", range("[1,2)")));

        let resolution = Resolver::new(&index).resolve(&[], &[a, b], &no_removals());
        assert!(resolution.is_consistent(), "{:?}", resolution.conflicts);
        assert_eq!(ids(&resolution), vec!["a 1.0.0", "b 1.0.0", "x 1.0.0"]);
        assert_eq!(resolution.pulled_in, vec![IuKey::new("x", v("1"))]);
    }

    #[test]
    fn test_singleton_choice_is_independent_of_id_order() {
        let index = InMemoryIndex::new(vec![iu("x", "2").singleton(), iu("x", "1").singleton()]);

        for (open, narrow) in [("a", "b"), ("b", "a")] {
            let open_unit = iu(open, "1").requires(Requirement::unit("x", VersionRange::any()));
            let narrow_unit = iu(narrow, "1").requires(Requirement::unit("x", range("[1,2)")));

            let resolution =
                Resolver::new(&index).resolve(&[], &[open_unit, narrow_unit], &no_removals());
            assert!(resolution.is_consistent(), "{open} before {narrow}");
            assert!(ids(&resolution).contains(&"x 1.0.0".to_string()));
        }
    }

    #[test]
    fn test_disjoint_singleton_ranges_still_conflict() {
        let index = InMemoryIndex::new(vec![iu("x", "2").singleton(), iu("x", "1").singleton()]);
        let a = iu("a", "1").requires(Requirement::unit("x", range("[2,3)")));
        let b = iu("b", "1").requires(Requirement::unit("x", range("[1,2)")));

        let resolution = Resolver::new(&index).resolve(&[], &[a, b], &no_removals());
        assert_eq!(
            resolution.conflicts,
            vec![Conflict::SingletonConflict {
                id: "x".to_string(),
                versions: vec![v("1"), v("2")],
                required_by: vec![IuKey::new("b", v("1"))],
            }]
        );
    }
}
