// SPDX-License-Identifier: MPL-2.0

//! Breadth-first import walk.
//!
//! Every library name reachable from the root ends up with exactly one chosen request. The
//! walk pulls edges off a FIFO queue, compares each against the request currently chosen for
//! its name, and enqueues the children of whatever wins. When a win invalidates decisions
//! taken below the loser, the walk starts over from the root and keeps its eviction records.
//!
//! Evicting a winner also drops the records of ranges it had evicted, letting them compete
//! again. Each range gets that second chance once. After that its record stays, so every
//! restart either spends a second chance or adds a record, and the walk terminates.

use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::Arc;

use log::{debug, trace};
use restore_versioning::VersionRange;

use crate::error::RestoreError;
use crate::framework::Framework;
use crate::internal::interning::{InterningTable, LibraryDependencyIndex, LibraryRangeIndex};
use crate::library::{
    eq_ignore_case, LibraryDependency, LibraryDependencyTarget, LibraryRange, LibraryType,
};
use crate::project::ProjectSpec;
use crate::provider::{LibraryProvider, ResolvedLibrary};
use crate::runtime::RuntimeDependencyOverlay;
use crate::type_aliases::{FxIndexMap, Map, Set};

/// Range indices from the root down to, and including, an item's parent.
pub(crate) type Path = Rc<[LibraryRangeIndex]>;

fn extend_path(path: &Path, last: LibraryRangeIndex) -> Path {
    path.iter().copied().chain(std::iter::once(last)).collect()
}

/// Whether one path is a prefix of the other.
fn has_common_ancestor(left: &[LibraryRangeIndex], right: &[LibraryRangeIndex]) -> bool {
    left.iter().zip(right).all(|(l, r)| l == r)
}

/// Constraints that a later, stricter package request may take back from.
fn is_loose(constraint: LibraryDependencyTarget) -> bool {
    constraint == LibraryDependencyTarget::EXTERNAL_PROJECT
        || constraint == LibraryDependencyTarget::PACKAGE_PROJECT_EXTERNAL
}

/// A request narrowing a package-or-project constraint down to some of its kinds replaces
/// the project it resolved to.
fn evicts_on_type_constraint(
    current: LibraryDependencyTarget,
    previous: LibraryDependencyTarget,
) -> bool {
    if current == previous || previous != LibraryDependencyTarget::PACKAGE_PROJECT_EXTERNAL {
        return false;
    }
    let within = current & LibraryDependencyTarget::PACKAGE_PROJECT_EXTERNAL;
    let outside = current & !LibraryDependencyTarget::PACKAGE_PROJECT_EXTERNAL;
    !within.is_empty() && outside.is_empty()
}

/// Suppressions and overrides in force along one path.
#[derive(Debug, Clone, Default)]
pub(crate) struct ImportDisposition {
    pub suppressions: Rc<Set<LibraryDependencyIndex>>,
    pub overrides: Rc<Map<LibraryDependencyIndex, VersionRange>>,
}

impl ImportDisposition {
    fn is_pure(&self) -> bool {
        self.suppressions.is_empty() && self.overrides.is_empty()
    }

    /// Whether everything `other` hides or pins is hidden or pinned the same way here.
    fn covers(&self, other: &ImportDisposition) -> bool {
        self.suppressions.is_superset(&other.suppressions)
            && self.overrides.len() >= other.overrides.len()
            && other.overrides.iter().all(|(index, range)| {
                self.overrides
                    .get(index)
                    .is_some_and(|mine| mine.precise_eq(range))
            })
    }
}

/// A pending edge.
#[derive(Debug, Clone)]
struct ImportItem {
    dependency: Rc<LibraryDependency>,
    dependency_index: LibraryDependencyIndex,
    range_index: LibraryRangeIndex,
    path: Path,
    disposition: ImportDisposition,
    is_direct_package_reference_from_root: bool,
    is_centrally_pinned: bool,
}

impl ImportItem {
    fn parent(&self) -> Option<LibraryRangeIndex> {
        self.path.last().copied()
    }

    fn version_range(&self) -> Option<&VersionRange> {
        self.dependency.library_range.version_range.as_ref()
    }
}

/// The request currently winning for one library name.
#[derive(Debug, Clone)]
pub(crate) struct ChosenEntry {
    pub dependency: Rc<LibraryDependency>,
    pub range_index: LibraryRangeIndex,
    pub path: Path,
    pub is_direct_package_reference_from_root: bool,
    pub is_centrally_pinned: bool,
    /// Parents that requested the same range again.
    pub parents: Option<Set<LibraryRangeIndex>>,
    /// Parents whose lower request lost to this one on an unrelated path.
    pub eclipsed_parents: Option<Set<LibraryRangeIndex>>,
    /// Every distinct disposition it was reached under, most recent first.
    pub dispositions: Vec<ImportDisposition>,
}

impl ChosenEntry {
    fn from_item(item: &ImportItem) -> Self {
        let parents = if item.is_centrally_pinned {
            item.parent().map(|parent| Set::from_iter([parent]))
        } else {
            None
        };
        Self {
            dependency: Rc::clone(&item.dependency),
            range_index: item.range_index,
            path: Rc::clone(&item.path),
            is_direct_package_reference_from_root: item.is_direct_package_reference_from_root,
            is_centrally_pinned: item.is_centrally_pinned,
            parents,
            eclipsed_parents: None,
            dispositions: vec![item.disposition.clone()],
        }
    }

    fn version_range(&self) -> Option<&VersionRange> {
        self.dependency.library_range.version_range.as_ref()
    }
}

/// A range that lost, and the request it lost to.
#[derive(Debug, Clone)]
pub(crate) struct EvictionRecord {
    /// Path to the winning request, including the winner.
    pub path: Path,
    pub dependency_index: LibraryDependencyIndex,
    /// Constraint of the losing request.
    pub type_constraint: LibraryDependencyTarget,
}

/// A provider answer with the indices of its dependencies.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedItem {
    /// Dependency ranges already carry their version overrides.
    pub library: Arc<ResolvedLibrary>,
    pub dependency_indices: Vec<LibraryDependencyIndex>,
    pub range_indices: Vec<LibraryRangeIndex>,
    pub runtime_merged: bool,
}

impl ResolvedItem {
    fn new(
        mut library: ResolvedLibrary,
        ranges: &mut InterningTable<LibraryRange>,
        names: &mut InterningTable<LibraryDependency>,
    ) -> Self {
        for dependency in &mut library.dependencies {
            if let Some(version_override) = &dependency.version_override {
                dependency.library_range.version_range = Some(version_override.clone());
            }
        }
        let dependency_indices = library
            .dependencies
            .iter()
            .map(|dependency| names.intern(dependency.name()))
            .collect();
        let range_indices = library
            .dependencies
            .iter()
            .map(|dependency| ranges.intern(&dependency.library_range))
            .collect();
        Self {
            library: Arc::new(library),
            dependency_indices,
            range_indices,
            runtime_merged: false,
        }
    }
}

/// What the walk settled on.
#[derive(Debug)]
pub(crate) struct WalkOutcome {
    pub chosen: Map<LibraryDependencyIndex, ChosenEntry>,
    pub resolved: FxIndexMap<LibraryRangeIndex, Rc<ResolvedItem>>,
    pub root_dependency_index: LibraryDependencyIndex,
    pub root_range_index: LibraryRangeIndex,
    pub deep_evictions: usize,
}

/// Inputs of one walk.
pub(crate) struct WalkContext<'a, P: ?Sized> {
    pub project: &'a ProjectSpec,
    pub framework: &'a Framework,
    pub runtime_identifier: Option<&'a str>,
    pub provider: &'a P,
    pub overlay: Option<&'a dyn RuntimeDependencyOverlay>,
    pub central_pinning: bool,
}

/// Walks the graph of `context.project` for one framework and runtime pair.
///
/// Only provider faults and cancellation are errors. Whatever the provider cannot find
/// is resolved as an unresolved placeholder and the walk goes on.
pub(crate) fn walk<P: LibraryProvider + ?Sized>(
    context: WalkContext<'_, P>,
) -> Result<WalkOutcome, RestoreError> {
    Walker::new(context).run()
}

enum Visit {
    Skip,
    Expand,
    Restart,
}

enum Verdict {
    Skip,
    Install,
    Evict { on_type_constraint: bool },
    Eclipse,
    Equal,
}

struct Walker<'a, P: ?Sized> {
    context: WalkContext<'a, P>,
    ranges: InterningTable<LibraryRange>,
    names: InterningTable<LibraryDependency>,
    central_versions: Map<LibraryDependencyIndex, VersionRange>,
    /// Name behind every range that was ever enqueued.
    range_owners: Map<LibraryRangeIndex, LibraryDependencyIndex>,
    root: ImportItem,
    queue: VecDeque<ImportItem>,
    chosen: Map<LibraryDependencyIndex, ChosenEntry>,
    evictions: Map<LibraryRangeIndex, EvictionRecord>,
    /// Evicted ranges whose record was already dropped once.
    released: Set<LibraryRangeIndex>,
    resolved: FxIndexMap<LibraryRangeIndex, Rc<ResolvedItem>>,
    deep_evictions: usize,
}

impl<'a, P: LibraryProvider + ?Sized> Walker<'a, P> {
    fn new(context: WalkContext<'a, P>) -> Self {
        let mut ranges: InterningTable<LibraryRange> = InterningTable::default();
        let mut names: InterningTable<LibraryDependency> = InterningTable::default();

        let mut central_versions = Map::default();
        if context.central_pinning {
            if let Some(information) = context.project.framework_information(context.framework) {
                for central in &information.central_package_versions {
                    central_versions.insert(names.intern(&central.name), central.version_range.clone());
                }
            }
        }

        let root_dependency = LibraryDependency::new(context.project.root_range());
        let root = ImportItem {
            dependency_index: names.intern(root_dependency.name()),
            range_index: ranges.intern(&root_dependency.library_range),
            dependency: Rc::new(root_dependency),
            path: Rc::from(Vec::new()),
            disposition: ImportDisposition::default(),
            is_direct_package_reference_from_root: false,
            is_centrally_pinned: false,
        };

        let mut resolved = FxIndexMap::default();
        let root_library = context.project.root_library(context.framework);
        resolved.insert(
            root.range_index,
            Rc::new(ResolvedItem::new(root_library, &mut ranges, &mut names)),
        );

        let mut range_owners = Map::default();
        range_owners.insert(root.range_index, root.dependency_index);

        Self {
            context,
            ranges,
            names,
            central_versions,
            range_owners,
            root,
            queue: VecDeque::new(),
            chosen: Map::default(),
            evictions: Map::default(),
            released: Set::default(),
            resolved,
            deep_evictions: 0,
        }
    }

    fn run(mut self) -> Result<WalkOutcome, RestoreError> {
        'deep_eviction: loop {
            self.queue.clear();
            self.chosen.clear();
            self.queue.push_back(self.root.clone());

            while let Some(item) = self.queue.pop_front() {
                self.context
                    .provider
                    .should_cancel()
                    .map_err(RestoreError::Cancelled)?;
                match self.visit(&item)? {
                    Visit::Skip => {}
                    Visit::Expand => self.expand(&item)?,
                    Visit::Restart => {
                        self.deep_evictions += 1;
                        debug!(
                            "deep eviction #{} caused by {} on {}",
                            self.deep_evictions,
                            item.dependency,
                            self.context.framework
                        );
                        continue 'deep_eviction;
                    }
                }
            }
            break;
        }

        debug!(
            "walk of {} on {} chose {} libraries, evicted {} ranges after {} deep evictions",
            self.context.project.name,
            self.context.framework,
            self.chosen.len(),
            self.evictions.len(),
            self.deep_evictions
        );

        Ok(WalkOutcome {
            chosen: self.chosen,
            resolved: self.resolved,
            root_dependency_index: self.root.dependency_index,
            root_range_index: self.root.range_index,
            deep_evictions: self.deep_evictions,
        })
    }

    /// Decides whether `item` becomes, stays out of, or joins the chosen request for its name.
    fn visit(&mut self, item: &ImportItem) -> Result<Visit, RestoreError> {
        let dependency_index = item.dependency_index;
        let type_constraint = item.dependency.library_range.type_constraint;

        // The root is only ever the seed; requests back to it are cycles.
        if dependency_index == self.root.dependency_index && !item.path.is_empty() {
            return Ok(Visit::Skip);
        }

        if let Some(eviction) = self.evictions.get(&item.range_index) {
            let takes_back = is_loose(eviction.type_constraint)
                && type_constraint == LibraryDependencyTarget::PACKAGE;
            if !takes_back {
                trace!("{} was evicted", item.dependency);
                return Ok(Visit::Skip);
            }
        }

        if let Some(pinned) = item.disposition.overrides.get(&dependency_index) {
            if !item.version_range().is_some_and(|range| range.precise_eq(pinned)) {
                trace!("{} is overridden to {}", item.dependency, pinned);
                return Ok(Visit::Skip);
            }
        }

        match self.verdict(item) {
            Verdict::Skip => Ok(Visit::Skip),
            Verdict::Install => {
                self.chosen.insert(dependency_index, ChosenEntry::from_item(item));
                Ok(Visit::Expand)
            }
            Verdict::Evict { on_type_constraint } => Ok(self.evict(item, on_type_constraint)),
            Verdict::Eclipse => {
                if let Some(chosen) = self.chosen.get_mut(&dependency_index) {
                    if !has_common_ancestor(&chosen.path, &item.path) {
                        if let Some(parent) = item.parent() {
                            chosen
                                .eclipsed_parents
                                .get_or_insert_with(Set::default)
                                .insert(parent);
                        }
                    }
                }
                Ok(Visit::Skip)
            }
            Verdict::Equal => Ok(self.merge_equal(item)),
        }
    }

    fn verdict(&self, item: &ImportItem) -> Verdict {
        let Some(chosen) = self.chosen.get(&item.dependency_index) else {
            return Verdict::Install;
        };
        if chosen.is_direct_package_reference_from_root {
            return Verdict::Skip;
        }

        let current_constraint = item.dependency.library_range.type_constraint;
        let chosen_constraint = chosen.dependency.library_range.type_constraint;
        let on_type_constraint = chosen.range_index == item.range_index
            && evicts_on_type_constraint(current_constraint, chosen_constraint)
            && self
                .resolved
                .get(&chosen.range_index)
                .is_some_and(|resolved| resolved.library.library_type() == LibraryType::Project);

        let all = VersionRange::all();
        let current_range = item.version_range().unwrap_or(&all);
        let chosen_range = chosen.version_range().unwrap_or(&all);

        if on_type_constraint || !chosen_range.is_greater_than_or_equal_to(current_range) {
            let both_packages = chosen_constraint.contains(LibraryDependencyTarget::PACKAGE)
                && current_constraint.contains(LibraryDependencyTarget::PACKAGE);
            if both_packages
                && !self.is_parent_centrally_pinned(&item.path)
                && Self::is_eviction_blocked(chosen, &item.path)
            {
                return Verdict::Skip;
            }
            Verdict::Evict { on_type_constraint }
        } else if !chosen_range.precise_eq(current_range) {
            Verdict::Eclipse
        } else {
            Verdict::Equal
        }
    }

    fn is_eviction_blocked(chosen: &ChosenEntry, path: &[LibraryRangeIndex]) -> bool {
        if path.len() > 2 {
            let grandparent = path[path.len() - 2];
            if chosen
                .parents
                .as_ref()
                .is_some_and(|parents| parents.contains(&grandparent))
            {
                return true;
            }
        }
        if has_common_ancestor(&chosen.path, path) {
            return true;
        }
        chosen
            .eclipsed_parents
            .as_ref()
            .is_some_and(|eclipsed| eclipsed.iter().any(|parent| path.contains(parent)))
    }

    fn is_parent_centrally_pinned(&self, path: &[LibraryRangeIndex]) -> bool {
        if !self.context.central_pinning || path.len() <= 1 {
            return false;
        }
        path[1..].iter().rev().any(|range_index| {
            self.range_owners
                .get(range_index)
                .and_then(|owner| self.chosen.get(owner))
                .is_some_and(|chosen| chosen.is_centrally_pinned)
        })
    }

    fn evict(&mut self, item: &ImportItem, on_type_constraint: bool) -> Visit {
        let dependency_index = item.dependency_index;
        let Some(loser) = self.chosen.remove(&dependency_index) else {
            return Visit::Skip;
        };
        let evicted = loser.range_index;
        debug!(
            "{} evicts {} on {}",
            item.dependency, loser.dependency, self.context.framework
        );

        if on_type_constraint {
            // Resolved under the looser constraint; look it up again under the current one.
            self.resolved.shift_remove(&item.range_index);
        }

        let mut deep = 0;
        let released = &mut self.released;
        self.evictions.retain(|range_index, record| {
            let kept_for_package = record.dependency_index == dependency_index
                && is_loose(record.type_constraint);
            let stale = record.path.contains(&evicted)
                && !kept_for_package
                && released.insert(*range_index);
            if stale {
                trace!("eviction of range {:?} is lifted", range_index);
                deep += 1;
            }
            !stale
        });
        if self
            .chosen
            .values()
            .any(|chosen| chosen.path.contains(&evicted))
        {
            deep += 1;
        }

        self.evictions.insert(
            evicted,
            EvictionRecord {
                path: extend_path(&item.path, item.range_index),
                dependency_index,
                type_constraint: loser.dependency.library_range.type_constraint,
            },
        );

        if deep > 0 {
            return Visit::Restart;
        }

        self.chosen.insert(dependency_index, ChosenEntry::from_item(item));
        self.queue.retain(|queued| !queued.path.contains(&evicted));
        Visit::Expand
    }

    /// Same range reached again: keep the entry, take the new one over, or remember another
    /// disposition it can be reached under.
    fn merge_equal(&mut self, item: &ImportItem) -> Visit {
        let Some(chosen) = self.chosen.get_mut(&item.dependency_index) else {
            return Visit::Skip;
        };
        if let Some(parent) = item.parent() {
            chosen.parents.get_or_insert_with(Set::default).insert(parent);
        }

        if chosen.dispositions.len() == 1 && chosen.dispositions[0].is_pure() {
            return Visit::Skip;
        }

        if item.disposition.is_pure() {
            chosen.dispositions = vec![item.disposition.clone()];
        } else if chosen
            .dispositions
            .iter()
            .any(|seen| item.disposition.covers(seen))
        {
            return Visit::Skip;
        } else {
            chosen.dispositions.insert(0, item.disposition.clone());
        }
        chosen.dependency = Rc::clone(&item.dependency);
        chosen.range_index = item.range_index;
        chosen.path = Rc::clone(&item.path);
        Visit::Expand
    }

    fn resolve(&mut self, item: &ImportItem) -> Result<Rc<ResolvedItem>, RestoreError> {
        if let Some(resolved) = self.resolved.get(&item.range_index) {
            return Ok(Rc::clone(resolved));
        }
        let range = &item.dependency.library_range;
        let found = self
            .context
            .provider
            .find_library(range, self.context.framework, self.context.runtime_identifier)
            .map_err(|source| RestoreError::ProviderFault {
                library: range.to_string(),
                source,
            })?;
        let library = found.unwrap_or_else(|| {
            debug!("{} is unresolved on {}", range, self.context.framework);
            ResolvedLibrary::unresolved(range)
        });
        let resolved = Rc::new(ResolvedItem::new(library, &mut self.ranges, &mut self.names));
        self.resolved.insert(item.range_index, Rc::clone(&resolved));
        Ok(resolved)
    }

    /// Appends the runtime dependencies of `resolved` once and caches the merged item.
    fn merge_runtime_dependencies(
        &mut self,
        item: &ImportItem,
        resolved: Rc<ResolvedItem>,
    ) -> Rc<ResolvedItem> {
        let (Some(overlay), Some(runtime_identifier)) =
            (self.context.overlay, self.context.runtime_identifier)
        else {
            return resolved;
        };
        if resolved.runtime_merged || resolved.library.is_unresolved() {
            return resolved;
        }

        let extra = overlay.runtime_dependencies(&item.dependency.library_range, runtime_identifier);
        let mut library = (*resolved.library).clone();
        for dependency in extra {
            let present = library
                .dependencies
                .iter()
                .any(|existing| eq_ignore_case(existing.name(), dependency.name()));
            if !present {
                trace!("{} needs {} on {}", library.identity(), dependency, runtime_identifier);
                library.dependencies.push(dependency);
            }
        }

        let mut merged = ResolvedItem::new(library, &mut self.ranges, &mut self.names);
        merged.runtime_merged = true;
        let merged = Rc::new(merged);
        self.resolved.insert(item.range_index, Rc::clone(&merged));
        merged
    }

    /// Resolves the chosen `item` and enqueues its children.
    fn expand(&mut self, item: &ImportItem) -> Result<(), RestoreError> {
        let resolved = self.resolve(item)?;
        let resolved = self.merge_runtime_dependencies(item, resolved);
        let dependencies = &resolved.library.dependencies;
        let is_root = item.range_index == self.root.range_index;

        let mut suppressions: Option<Set<LibraryDependencyIndex>> = None;
        let mut overrides: Option<Map<LibraryDependencyIndex, VersionRange>> = None;
        for (position, dependency) in dependencies.iter().enumerate() {
            if dependency.library_range.version_range.is_none() {
                continue;
            }
            let child = resolved.dependency_indices[position];
            if dependency.suppresses_all() && !is_root {
                suppressions.get_or_insert_with(Set::default).insert(child);
            }
            if let Some(version_override) = &dependency.version_override {
                let pinned_transitively = self.context.central_pinning
                    && !is_root
                    && dependency
                        .library_range
                        .type_constraint_allows(LibraryDependencyTarget::PACKAGE)
                    && self.central_versions.contains_key(&child);
                if !pinned_transitively {
                    overrides
                        .get_or_insert_with(Map::default)
                        .insert(child, version_override.clone());
                }
            }
        }

        let inherited = &item.disposition;
        let disposition = ImportDisposition {
            suppressions: match suppressions {
                Some(mut added) => {
                    added.extend(inherited.suppressions.iter().copied());
                    Rc::new(added)
                }
                None => Rc::clone(&inherited.suppressions),
            },
            overrides: match overrides {
                Some(added) => {
                    let mut all = (*inherited.overrides).clone();
                    all.extend(added);
                    Rc::new(all)
                }
                None => Rc::clone(&inherited.overrides),
            },
        };

        let path = extend_path(&item.path, item.range_index);
        for (position, dependency) in dependencies.iter().enumerate() {
            if dependency.library_range.version_range.is_none() {
                continue;
            }
            let child = resolved.dependency_indices[position];
            if !item.is_centrally_pinned && disposition.suppressions.contains(&child) {
                continue;
            }

            let is_package = dependency
                .library_range
                .type_constraint_allows(LibraryDependencyTarget::PACKAGE);
            let is_direct = is_root && is_package;
            let pinned = if self.context.central_pinning && !is_direct && is_package {
                self.central_versions.get(&child)
            } else {
                None
            };

            let (dependency, range_index) = match pinned {
                Some(pinned) => {
                    let mut pinned_dependency = dependency.clone();
                    pinned_dependency.library_range.version_range = Some(pinned.clone());
                    let range_index = self.ranges.intern(&pinned_dependency.library_range);
                    (pinned_dependency, range_index)
                }
                None => (dependency.clone(), resolved.range_indices[position]),
            };
            self.range_owners.insert(range_index, child);
            self.queue.push_back(ImportItem {
                dependency: Rc::new(dependency),
                dependency_index: child,
                range_index,
                path: Rc::clone(&path),
                disposition: disposition.clone(),
                is_direct_package_reference_from_root: is_direct,
                is_centrally_pinned: pinned.is_some(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::TargetFrameworkInformation;
    use crate::provider::OfflineLibraryProvider;

    fn range(s: &str) -> VersionRange {
        s.parse().unwrap()
    }

    fn net6() -> Framework {
        "net6.0".parse().unwrap()
    }

    fn run(project: &ProjectSpec, provider: &OfflineLibraryProvider) -> WalkOutcome {
        let framework = net6();
        walk(WalkContext {
            project,
            framework: &framework,
            runtime_identifier: None,
            provider,
            overlay: None,
            central_pinning: false,
        })
        .unwrap()
    }

    fn chosen_version(outcome: &WalkOutcome, name: &str) -> Option<String> {
        outcome.chosen.values().find_map(|chosen| {
            if !eq_ignore_case(chosen.dependency.name(), name) {
                return None;
            }
            let resolved = outcome.resolved.get(&chosen.range_index)?;
            Some(resolved.library.identity().version.to_string())
        })
    }

    #[test]
    fn disposition_coverage() {
        let a = LibraryDependencyIndex::from_raw(1);
        let b = LibraryDependencyIndex::from_raw(2);
        let narrow = ImportDisposition {
            suppressions: Rc::new(Set::from_iter([a])),
            overrides: Rc::default(),
        };
        let wide = ImportDisposition {
            suppressions: Rc::new(Set::from_iter([a, b])),
            overrides: Rc::default(),
        };
        assert!(wide.covers(&narrow));
        assert!(!narrow.covers(&wide));
        assert!(narrow.covers(&ImportDisposition::default()));
        assert!(ImportDisposition::default().is_pure());
    }

    #[test]
    fn type_constraint_upgrade() {
        use LibraryDependencyTarget as T;
        assert!(evicts_on_type_constraint(T::PACKAGE, T::PACKAGE_PROJECT_EXTERNAL));
        assert!(evicts_on_type_constraint(T::EXTERNAL_PROJECT, T::PACKAGE_PROJECT_EXTERNAL));
        assert!(!evicts_on_type_constraint(T::PACKAGE, T::PACKAGE));
        assert!(!evicts_on_type_constraint(T::PACKAGE, T::PROJECT));
        assert!(!evicts_on_type_constraint(T::PACKAGE | T::REFERENCE, T::PACKAGE_PROJECT_EXTERNAL));
    }

    #[test]
    fn common_ancestry_is_a_prefix() {
        let ids: Vec<LibraryRangeIndex> = (0..4).map(LibraryRangeIndex::from_raw).collect();
        assert!(has_common_ancestor(&ids[..2], &ids));
        assert!(has_common_ancestor(&[], &ids));
        assert!(!has_common_ancestor(&[ids[0], ids[2]], &ids));
    }

    #[test]
    fn higher_transitive_request_evicts_and_restarts() {
        // A -> C 1.0 is found first; B -> D -> C 2.0 is deeper but higher.
        let mut provider = OfflineLibraryProvider::new();
        provider.add_package("A", (1, 0, 0), [LibraryDependency::package("C", range("1.0"))]);
        provider.add_package("B", (1, 0, 0), [LibraryDependency::package("D", range("1.0"))]);
        provider.add_package("D", (1, 0, 0), [LibraryDependency::package("C", range("2.0"))]);
        provider.add_package("C", (1, 0, 0), [LibraryDependency::package("E", range("1.0"))]);
        provider.add_package("C", (2, 0, 0), []);
        provider.add_package("E", (1, 0, 0), []);
        let project = ProjectSpec::new("App", (1, 0, 0)).with_framework(
            TargetFrameworkInformation::new(net6())
                .with_dependency(LibraryDependency::package("A", range("1.0")))
                .with_dependency(LibraryDependency::package("B", range("1.0"))),
        );

        let outcome = run(&project, &provider);
        assert_eq!(chosen_version(&outcome, "C").as_deref(), Some("2.0.0"));
        // E only came through C 1.0, which lost.
        assert_eq!(chosen_version(&outcome, "E"), None);
        assert!(outcome.deep_evictions >= 1);
    }

    #[test]
    fn direct_reference_is_never_evicted() {
        let mut provider = OfflineLibraryProvider::new();
        provider.add_package("A", (1, 0, 0), [LibraryDependency::package("B", range("2.0"))]);
        provider.add_package("B", (1, 0, 0), []);
        provider.add_package("B", (2, 0, 0), []);
        let project = ProjectSpec::new("App", (1, 0, 0)).with_framework(
            TargetFrameworkInformation::new(net6())
                .with_dependency(LibraryDependency::package("A", range("1.0")))
                .with_dependency(LibraryDependency::package("B", range("1.0"))),
        );

        let outcome = run(&project, &provider);
        assert_eq!(chosen_version(&outcome, "B").as_deref(), Some("1.0.0"));
        assert_eq!(outcome.deep_evictions, 0);
    }

    #[test]
    fn faults_abort_the_walk() {
        struct Failing;
        impl LibraryProvider for Failing {
            fn find_library(
                &self,
                _: &LibraryRange,
                _: &Framework,
                _: Option<&str>,
            ) -> Result<Option<ResolvedLibrary>, crate::provider::ProviderError> {
                Err("feed unreachable".into())
            }
        }
        let project = ProjectSpec::new("App", (1, 0, 0)).with_framework(
            TargetFrameworkInformation::new(net6())
                .with_dependency(LibraryDependency::package("A", range("1.0"))),
        );
        let framework = net6();
        let result = walk(WalkContext {
            project: &project,
            framework: &framework,
            runtime_identifier: None,
            provider: &Failing,
            overlay: None,
            central_pinning: false,
        });
        assert!(matches!(result, Err(RestoreError::ProviderFault { .. })));
    }
}
