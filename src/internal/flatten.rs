// SPDX-License-Identifier: MPL-2.0

//! Replays the choices of a finished walk from the root to build the explicit tree, the
//! flattened library set, and the cycle, conflict and downgrade records.

use std::collections::VecDeque;
use std::sync::Arc;

use log::trace;
use restore_versioning::{SemanticVersion, VersionRange};

use crate::error::RestoreError;
use crate::graph::{
    Disposition, Downgrade, GraphItem, GraphNode, GraphParts, NodeId, ResolvedDependencyKey,
    VersionConflict,
};
use crate::internal::interning::{LibraryDependencyIndex, LibraryRangeIndex};
use crate::internal::walker::WalkOutcome;
use crate::library::{eq_ignore_case, LibraryDependency, LibraryIdentity, LibraryType};
use crate::type_aliases::{FxIndexMap, Map, Set};

/// A downgrade seen while flattening, turned into nodes once every node exists.
struct PendingDowngrade {
    from_parent: LibraryRangeIndex,
    from: LibraryDependency,
    to_parent: LibraryRangeIndex,
    to: LibraryDependency,
    is_central_transitive: bool,
}

fn minimum_version(dependency: &LibraryDependency) -> SemanticVersion {
    dependency
        .library_range
        .version_range
        .as_ref()
        .and_then(VersionRange::min_version)
        .cloned()
        .unwrap_or_else(SemanticVersion::zero)
}

fn requested_identity(dependency: &LibraryDependency) -> LibraryIdentity {
    LibraryIdentity::new(
        dependency.name(),
        minimum_version(dependency),
        LibraryType::Package,
    )
}

/// Builds the graph parts of `outcome`.
pub(crate) fn flatten(outcome: &WalkOutcome, central_pinning: bool) -> Result<GraphParts, RestoreError> {
    let root_dependency_index = outcome.root_dependency_index;
    let missing_root = || RestoreError::MissingRoot(format!("{:?}", outcome.root_range_index));
    let root_chosen = outcome
        .chosen
        .get(&root_dependency_index)
        .ok_or_else(missing_root)?;
    let root_resolved = outcome
        .resolved
        .get(&root_chosen.range_index)
        .ok_or_else(missing_root)?;
    let root_name = root_resolved.library.identity().name.clone();

    let mut parts = GraphParts::default();
    let root = parts.nodes.alloc(GraphNode::new(
        root_chosen.dependency.library_range.clone(),
        Some(GraphItem::resolved(Arc::clone(&root_resolved.library))),
        None,
        Disposition::Accepted,
    ));
    parts.root = Some(root);

    let all = VersionRange::all();
    let mut queue: VecDeque<(LibraryDependencyIndex, LibraryRangeIndex, NodeId)> = VecDeque::new();
    let mut visited: Set<LibraryDependencyIndex> = Set::default();
    let mut nodes_by_range: Map<LibraryRangeIndex, NodeId> = Map::default();
    let mut downgrades: FxIndexMap<LibraryRangeIndex, PendingDowngrade> = FxIndexMap::default();
    let mut version_conflicts: FxIndexMap<LibraryRangeIndex, NodeId> = FxIndexMap::default();

    queue.push_back((root_dependency_index, root_chosen.range_index, root));
    nodes_by_range.insert(root_chosen.range_index, root);

    while let Some((dependency_index, current_range_index, current_node)) = queue.pop_front() {
        let Some(found) = outcome.chosen.get(&dependency_index) else {
            continue;
        };
        let Some(node_item) = outcome.resolved.get(&found.range_index) else {
            continue;
        };
        let mut flattened = GraphItem::resolved(Arc::clone(&node_item.library));
        flattened.is_central_transitive = found.is_centrally_pinned;
        parts.flattened.insert(flattened);
        let node_name = &node_item.library.identity().name;

        for (position, dependency) in node_item.library.dependencies.iter().enumerate() {
            let Some(requested) = dependency.library_range.version_range.as_ref() else {
                continue;
            };

            if eq_ignore_case(dependency.name(), node_name) || eq_ignore_case(dependency.name(), &root_name) {
                let cycle = parts.nodes.alloc(GraphNode::new(
                    dependency.library_range.clone(),
                    None,
                    Some(current_node),
                    Disposition::Cycle,
                ));
                parts.analyze.cycles.push(cycle);
                continue;
            }

            let child = node_item.dependency_indices[position];
            let Some(chosen) = outcome.chosen.get(&child) else {
                continue;
            };
            let chosen_range_index = chosen.range_index;
            let chosen_range = chosen.dependency.library_range.version_range.as_ref().unwrap_or(&all);

            if !visited.insert(child) {
                let requested_range_index = node_item.range_indices[position];
                if found.path.contains(&requested_range_index) || found.path.contains(&chosen_range_index) {
                    let cycle = parts.nodes.alloc(GraphNode::new(
                        dependency.library_range.clone(),
                        None,
                        Some(current_node),
                        Disposition::Cycle,
                    ));
                    parts.analyze.cycles.push(cycle);
                    continue;
                }

                if !chosen_range.is_greater_than_or_equal_to(requested) {
                    if dependency_index != root_dependency_index && dependency.suppresses_all() {
                        continue;
                    }
                    if found
                        .dispositions
                        .first()
                        .is_some_and(|disposition| disposition.suppressions.contains(&child))
                    {
                        continue;
                    }
                    if downgrades.contains_key(&chosen_range_index) {
                        continue;
                    }
                    let eclipsed = chosen
                        .eclipsed_parents
                        .as_ref()
                        .is_some_and(|eclipsed| eclipsed.iter().any(|parent| found.path.contains(parent)));
                    if eclipsed {
                        continue;
                    }
                    let to_parent = chosen
                        .parents
                        .as_ref()
                        .and_then(|parents| parents.iter().find(|parent| found.path.contains(parent)))
                        .or_else(|| chosen.path.last())
                        .copied();
                    if let Some(to_parent) = to_parent {
                        trace!("{} downgrades {}", chosen.dependency, dependency);
                        downgrades.insert(
                            chosen_range_index,
                            PendingDowngrade {
                                from_parent: found.range_index,
                                from: dependency.clone(),
                                to_parent,
                                to: (*chosen.dependency).clone(),
                                is_central_transitive: false,
                            },
                        );
                    }
                    continue;
                }

                if version_conflicts.contains_key(&chosen_range_index)
                    && !nodes_by_range.contains_key(&requested_range_index)
                {
                    if let Some(conflicting) = outcome.resolved.get(&chosen_range_index) {
                        let node = parts.nodes.alloc(GraphNode::new(
                            chosen.dependency.library_range.clone(),
                            Some(GraphItem::resolved(Arc::clone(&conflicting.library))),
                            Some(current_node),
                            Disposition::Acceptable,
                        ));
                        parts.nodes[current_node].inner.push(node);
                        nodes_by_range.insert(requested_range_index, node);
                    }
                }
                continue;
            }

            let Some(child_resolved) = outcome.resolved.get(&chosen_range_index) else {
                continue;
            };
            let child_identity = child_resolved.library.identity();

            if central_pinning
                && !dependency.suppresses_all()
                && !downgrades.contains_key(&chosen_range_index)
                && !chosen_range.is_greater_than_or_equal_to(requested)
            {
                downgrades.insert(
                    chosen_range_index,
                    PendingDowngrade {
                        from_parent: current_range_index,
                        from: dependency.clone(),
                        to_parent: outcome.root_range_index,
                        to: (*chosen.dependency).clone(),
                        is_central_transitive: true,
                    },
                );
            }

            let is_conflict = !child_identity.library_type.is_project()
                && child_identity.library_type != LibraryType::Unresolved
                && !version_conflicts.contains_key(&chosen_range_index)
                && !dependency.suppresses_all()
                && !requested.satisfies(&child_identity.version)
                && !downgrades.contains_key(&chosen_range_index);
            if is_conflict {
                trace!("{} conflicts with {}", dependency, child_identity);
                let conflicting = parts.nodes.alloc(GraphNode::new(
                    dependency.library_range.clone(),
                    Some(GraphItem::synthetic(requested_identity(dependency))),
                    Some(current_node),
                    Disposition::Acceptable,
                ));
                parts.nodes[current_node].inner.push(conflicting);
                version_conflicts.insert(chosen_range_index, conflicting);
                continue;
            }

            let mut item = GraphItem::resolved(Arc::clone(&child_resolved.library));
            let outer = if chosen.is_centrally_pinned {
                item.is_central_transitive = true;
                root
            } else {
                current_node
            };
            let node = parts.nodes.alloc(GraphNode::new(
                chosen.dependency.library_range.clone(),
                Some(item),
                Some(outer),
                Disposition::Accepted,
            ));
            parts.nodes[outer].inner.push(node);
            nodes_by_range.insert(chosen_range_index, node);
            queue.push_back((child, chosen_range_index, node));

            if child_identity.library_type == LibraryType::Unresolved {
                parts.unresolved.insert(chosen.dependency.library_range.clone());
                continue;
            }

            if let Some(parent) = parts.nodes[outer].identity() {
                parts.resolved_dependencies.insert(ResolvedDependencyKey {
                    parent: parent.clone(),
                    range: chosen.dependency.library_range.version_range.clone(),
                    child: child_identity.clone(),
                });
            }
        }
    }

    for (chosen_range_index, conflicting) in version_conflicts {
        if let Some(&selected) = nodes_by_range.get(&chosen_range_index) {
            parts
                .analyze
                .version_conflicts
                .push(VersionConflict { conflicting, selected });
        }
    }

    for (chosen_range_index, downgrade) in downgrades {
        let (Some(&from_parent), Some(&to_parent)) = (
            nodes_by_range.get(&downgrade.from_parent),
            nodes_by_range.get(&downgrade.to_parent),
        ) else {
            continue;
        };
        let Some(resolved) = outcome.resolved.get(&chosen_range_index) else {
            continue;
        };
        let downgraded_from = parts.nodes.alloc(GraphNode::new(
            downgrade.from.library_range.clone(),
            Some(GraphItem::synthetic(requested_identity(&downgrade.from))),
            Some(from_parent),
            Disposition::Rejected,
        ));
        let mut to_item = GraphItem::resolved(Arc::clone(&resolved.library));
        to_item.is_central_transitive = downgrade.is_central_transitive;
        let downgraded_to = parts.nodes.alloc(GraphNode::new(
            downgrade.to.library_range.clone(),
            Some(to_item),
            Some(to_parent),
            Disposition::Acceptable,
        ));
        parts.analyze.downgrades.push(Downgrade {
            downgraded_from,
            downgraded_to,
        });
    }

    if central_pinning {
        for chosen in outcome.chosen.values() {
            let Some(parents) = chosen.parents.as_ref().filter(|_| chosen.is_centrally_pinned) else {
                continue;
            };
            let Some(&node) = nodes_by_range.get(&chosen.range_index) else {
                continue;
            };
            let mut parent_nodes: Vec<NodeId> = parents
                .iter()
                .filter_map(|parent| nodes_by_range.get(parent).copied())
                .collect();
            parent_nodes.sort();
            parts.nodes[node].parent_nodes = parent_nodes;
        }
    }

    let mut install: Vec<_> = parts
        .flattened
        .iter()
        .filter_map(|item| item.data.as_deref())
        .filter(|library| !library.is_unresolved() && library.matched.is_remote())
        .map(|library| library.matched.clone())
        .collect();
    install.sort();
    install.dedup();
    parts.install = install;

    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::Framework;
    use crate::internal::walker::{walk, WalkContext};
    use crate::project::{ProjectSpec, TargetFrameworkInformation};
    use crate::provider::OfflineLibraryProvider;

    fn range(s: &str) -> VersionRange {
        s.parse().unwrap()
    }

    fn parts_for(project: &ProjectSpec, provider: &OfflineLibraryProvider) -> GraphParts {
        let framework: Framework = "net6.0".parse().unwrap();
        let outcome = walk(WalkContext {
            project,
            framework: &framework,
            runtime_identifier: None,
            provider,
            overlay: None,
            central_pinning: false,
        })
        .unwrap();
        flatten(&outcome, false).unwrap()
    }

    fn project(dependencies: Vec<LibraryDependency>) -> ProjectSpec {
        let mut information = TargetFrameworkInformation::new("net6.0".parse().unwrap());
        information.dependencies = dependencies;
        ProjectSpec::new("App", (1, 0, 0)).with_framework(information)
    }

    #[test]
    fn tree_mirrors_the_choices() {
        let mut provider = OfflineLibraryProvider::new();
        provider.add_package("A", (1, 0, 0), [LibraryDependency::package("B", range("1.0"))]);
        provider.add_package("B", (1, 0, 0), []);
        let parts = parts_for(&project(vec![LibraryDependency::package("A", range("1.0"))]), &provider);

        let root = parts.root.unwrap();
        assert_eq!(parts.nodes[root].inner.len(), 1);
        let a = parts.nodes[root].inner[0];
        assert_eq!(parts.nodes[a].identity().unwrap().name, "A");
        assert_eq!(parts.nodes[parts.nodes[a].inner[0]].identity().unwrap().name, "B");
        assert_eq!(parts.flattened.len(), 3);
        assert_eq!(parts.resolved_dependencies.len(), 2);
        assert_eq!(parts.install.len(), 2);
    }

    #[test]
    fn request_back_to_the_root_is_a_cycle() {
        let mut provider = OfflineLibraryProvider::new();
        provider.add_package("A", (1, 0, 0), [LibraryDependency::package("App", range("1.0"))]);
        let parts = parts_for(&project(vec![LibraryDependency::package("A", range("1.0"))]), &provider);
        assert_eq!(parts.analyze.cycles.len(), 1);
        let cycle = parts.analyze.cycles[0];
        assert_eq!(parts.nodes[cycle].disposition, Disposition::Cycle);
        assert_eq!(parts.nodes[cycle].key.name, "App");
    }

    #[test]
    fn unsatisfied_sibling_request_conflicts() {
        // A wants C exactly 1.0 but B's higher request evicts it.
        let mut provider = OfflineLibraryProvider::new();
        provider.add_package("A", (1, 0, 0), [LibraryDependency::package("C", range("[1.0]"))]);
        provider.add_package("B", (1, 0, 0), [LibraryDependency::package("C", range("2.0"))]);
        provider.add_package("C", (1, 0, 0), []);
        provider.add_package("C", (2, 0, 0), []);
        let parts = parts_for(
            &project(vec![
                LibraryDependency::package("A", range("1.0")),
                LibraryDependency::package("B", range("1.0")),
            ]),
            &provider,
        );
        assert!(parts.analyze.cycles.is_empty());
        assert_eq!(parts.analyze.version_conflicts.len(), 1);
        let conflict = parts.analyze.version_conflicts[0];
        assert_eq!(
            parts.nodes[conflict.selected].identity().unwrap().version,
            SemanticVersion::new(2, 0, 0)
        );
        assert_eq!(
            parts.nodes[conflict.conflicting].identity().unwrap().version,
            SemanticVersion::new(1, 0, 0)
        );
    }
}
