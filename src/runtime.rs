// SPDX-License-Identifier: MPL-2.0

//! Runtime identifier graphs: which RIDs import which, which packages pull in extra
//! RID-specific packages, and named compatibility profiles.

use restore_versioning::VersionRange;

use crate::framework::FrameworkRuntimePair;
use crate::library::{LibraryDependency, LibraryDependencyTarget, LibraryRange};
use crate::type_aliases::FxIndexMap;

/// Extra package a package needs on one runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimePackageDependency {
    /// Package id.
    pub id: String,
    /// Requested versions.
    pub version_range: VersionRange,
}

/// The RID-specific dependencies of one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeDependencySet {
    /// Package the set applies to.
    pub id: String,
    /// What it adds on this runtime.
    pub dependencies: Vec<RuntimePackageDependency>,
}

/// One runtime identifier and what it builds upon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeDescription {
    /// The RID itself, `win10-x64`.
    pub runtime_identifier: String,
    /// RIDs whose assets also work here, nearest first.
    pub inherited_runtimes: Vec<String>,
    /// Keyed by lowercased package id.
    pub runtime_dependency_sets: FxIndexMap<String, RuntimeDependencySet>,
}

impl RuntimeDescription {
    fn new(runtime_identifier: &str) -> Self {
        Self {
            runtime_identifier: runtime_identifier.to_string(),
            inherited_runtimes: Vec::new(),
            runtime_dependency_sets: FxIndexMap::default(),
        }
    }

    fn merge(&mut self, other: &RuntimeDescription) {
        for import in &other.inherited_runtimes {
            if !self.inherited_runtimes.contains(import) {
                self.inherited_runtimes.push(import.clone());
            }
        }
        for (key, set) in &other.runtime_dependency_sets {
            self.runtime_dependency_sets.insert(key.clone(), set.clone());
        }
    }
}

/// A named set of framework/RID pairs a project promises to support.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompatibilityProfile {
    /// Profile name.
    pub name: String,
    /// Pairs to restore for it. Empty means "look the name up in the runtime graph".
    pub restore_contexts: Vec<FrameworkRuntimePair>,
}

impl CompatibilityProfile {
    /// Profile with explicit pairs.
    pub fn new(name: impl Into<String>, restore_contexts: Vec<FrameworkRuntimePair>) -> Self {
        Self {
            name: name.into(),
            restore_contexts,
        }
    }

    /// Reference to a profile defined by the runtime graph.
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(name, Vec::new())
    }
}

/// RID import graph plus runtime dependency overlays and compatibility profiles.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RuntimeGraph {
    runtimes: FxIndexMap<String, RuntimeDescription>,
    supports: FxIndexMap<String, CompatibilityProfile>,
}

impl RuntimeGraph {
    /// Empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares `runtime_identifier` importing `imports`, in order.
    pub fn with_runtime<'a>(
        mut self,
        runtime_identifier: &str,
        imports: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        let mut description = RuntimeDescription::new(runtime_identifier);
        description.inherited_runtimes = imports.into_iter().map(str::to_string).collect();
        self.add_runtime(description);
        self
    }

    /// On `runtime_identifier`, package `package_id` also needs `dependency_id`.
    pub fn with_runtime_dependency(
        mut self,
        runtime_identifier: &str,
        package_id: &str,
        dependency_id: &str,
        version_range: VersionRange,
    ) -> Self {
        let description = self
            .runtimes
            .entry(runtime_identifier.to_string())
            .or_insert_with(|| RuntimeDescription::new(runtime_identifier));
        description
            .runtime_dependency_sets
            .entry(package_id.to_lowercase())
            .or_insert_with(|| RuntimeDependencySet {
                id: package_id.to_string(),
                dependencies: Vec::new(),
            })
            .dependencies
            .push(RuntimePackageDependency {
                id: dependency_id.to_string(),
                version_range,
            });
        self
    }

    /// Adds a compatibility profile.
    pub fn with_profile(mut self, profile: CompatibilityProfile) -> Self {
        self.supports.insert(profile.name.clone(), profile);
        self
    }

    /// Adds or extends a runtime.
    pub fn add_runtime(&mut self, description: RuntimeDescription) {
        match self.runtimes.get_mut(&description.runtime_identifier) {
            Some(existing) => existing.merge(&description),
            None => {
                self.runtimes
                    .insert(description.runtime_identifier.clone(), description);
            }
        }
    }

    /// Description of one runtime.
    pub fn runtime(&self, runtime_identifier: &str) -> Option<&RuntimeDescription> {
        self.runtimes.get(runtime_identifier)
    }

    /// A profile by name.
    pub fn profile(&self, name: &str) -> Option<&CompatibilityProfile> {
        self.supports.get(name)
    }

    /// Whether nothing is declared.
    pub fn is_empty(&self) -> bool {
        self.runtimes.is_empty() && self.supports.is_empty()
    }

    /// `runtime_identifier` followed by everything it imports, breadth first, without
    /// duplicates.
    pub fn expand_runtime(&self, runtime_identifier: &str) -> Vec<String> {
        let mut expanded = vec![runtime_identifier.to_string()];
        let mut next = 0;
        while let Some(current) = expanded.get(next).cloned() {
            if let Some(description) = self.runtimes.get(&current) {
                for import in &description.inherited_runtimes {
                    if !expanded.contains(import) {
                        expanded.push(import.clone());
                    }
                }
            }
            next += 1;
        }
        expanded
    }

    /// RID-specific dependencies of `package_id`, taken from the nearest runtime along the
    /// expansion that declares any.
    pub fn find_runtime_dependencies(
        &self,
        runtime_identifier: &str,
        package_id: &str,
    ) -> &[RuntimePackageDependency] {
        let key = package_id.to_lowercase();
        self.expand_runtime(runtime_identifier)
            .iter()
            .filter_map(|rid| self.runtimes.get(rid))
            .find_map(|description| description.runtime_dependency_sets.get(&key))
            .map(|set| set.dependencies.as_slice())
            .unwrap_or_default()
    }

    /// Whether assets for `provided` work on `criteria`.
    pub fn are_compatible(&self, criteria: &str, provided: &str) -> bool {
        self.expand_runtime(criteria).iter().any(|rid| rid == provided)
    }

    /// `self` extended by `other`: shared runtimes union their imports, and `other` wins on
    /// dependency sets and profiles.
    pub fn merge(&self, other: &RuntimeGraph) -> RuntimeGraph {
        let mut merged = self.clone();
        for description in other.runtimes.values() {
            merged.add_runtime(description.clone());
        }
        for (name, profile) in &other.supports {
            merged.supports.insert(name.clone(), profile.clone());
        }
        merged
    }
}

/// Source of runtime-specific dependencies for packages in a RID graph.
pub trait RuntimeDependencyOverlay: Send + Sync {
    /// Extra dependencies `range` brings along on `runtime_identifier`.
    fn runtime_dependencies(
        &self,
        range: &LibraryRange,
        runtime_identifier: &str,
    ) -> Vec<LibraryDependency>;
}

impl RuntimeDependencyOverlay for RuntimeGraph {
    fn runtime_dependencies(
        &self,
        range: &LibraryRange,
        runtime_identifier: &str,
    ) -> Vec<LibraryDependency> {
        if !range.type_constraint_allows(LibraryDependencyTarget::PACKAGE) {
            return Vec::new();
        }
        self.find_runtime_dependencies(runtime_identifier, &range.name)
            .iter()
            .map(|dependency| {
                LibraryDependency::package(dependency.id.clone(), dependency.version_range.clone())
            })
            .collect()
    }
}
