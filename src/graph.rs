// SPDX-License-Identifier: MPL-2.0

//! Resolved graphs, one per framework and runtime pair.
//!
//! A [RestoreTargetGraph] holds the explicit node tree used for diagnostics, the flattened
//! set of chosen libraries, the packages that must be installed, what could not be resolved,
//! and the cycles, version conflicts and downgrades found while flattening. Nothing in it
//! changes once built.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use restore_versioning::VersionRange;

use crate::framework::{Framework, FrameworkRuntimePair};
use crate::internal::arena::Arena;
pub use crate::internal::arena::Id;
use crate::library::{
    eq_ignore_case, LibraryDependency, LibraryIdentity, LibraryRange, LibraryType,
};
use crate::provider::{RemoteMatch, ResolvedLibrary};
use crate::runtime::RuntimeGraph;
use crate::type_aliases::FxIndexSet;

/// Index of a node in a graph's arena.
pub type NodeId = Id<GraphNode>;

/// How a node ended up in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Disposition {
    /// Synthesized for a diagnostic: a conflicting request or a downgraded edge target.
    Acceptable,
    /// The request that lost a downgrade.
    Rejected,
    /// A chosen library.
    Accepted,
    /// A request that would close a cycle. Never expanded.
    Cycle,
}

/// A library as it appears in a graph.
///
/// Two items are the same when their identities are, whatever their data.
#[derive(Debug, Clone)]
pub struct GraphItem {
    /// The library.
    pub key: LibraryIdentity,
    /// What the provider returned, absent for items synthesized for diagnostics.
    pub data: Option<Arc<ResolvedLibrary>>,
    /// Pinned through a central package version rather than requested along a path.
    pub is_central_transitive: bool,
}

impl GraphItem {
    pub(crate) fn resolved(data: Arc<ResolvedLibrary>) -> Self {
        Self {
            key: data.identity().clone(),
            data: Some(data),
            is_central_transitive: false,
        }
    }

    pub(crate) fn synthetic(key: LibraryIdentity) -> Self {
        Self {
            key,
            data: None,
            is_central_transitive: false,
        }
    }

    /// Dependencies of the library, empty for synthesized items.
    pub fn dependencies(&self) -> &[LibraryDependency] {
        self.data
            .as_deref()
            .map(|data| data.dependencies.as_slice())
            .unwrap_or_default()
    }
}

impl PartialEq for GraphItem {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for GraphItem {}

impl Hash for GraphItem {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state)
    }
}

/// A node of the explicit tree.
///
/// Cycle and diagnostic nodes point at their outer node without being one of its inner nodes.
#[derive(Debug, Clone)]
pub struct GraphNode {
    /// The request that led here.
    pub key: LibraryRange,
    /// What the request resolved to. Cycle nodes have none.
    pub item: Option<GraphItem>,
    /// Parent in the tree, `None` for the root.
    pub outer: Option<NodeId>,
    /// Children in the tree.
    pub inner: Vec<NodeId>,
    /// For centrally pinned nodes attached to the root, the nodes that actually requested them.
    pub parent_nodes: Vec<NodeId>,
    /// How the node ended up here.
    pub disposition: Disposition,
}

impl GraphNode {
    pub(crate) fn new(key: LibraryRange, item: Option<GraphItem>, outer: Option<NodeId>, disposition: Disposition) -> Self {
        Self {
            key,
            item,
            outer,
            inner: Vec::new(),
            parent_nodes: Vec::new(),
            disposition,
        }
    }

    /// Identity of the item, if any.
    pub fn identity(&self) -> Option<&LibraryIdentity> {
        self.item.as_ref().map(|item| &item.key)
    }
}

/// Two requests for one library that nearest-wins cannot reconcile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionConflict {
    /// Node of the request the chosen version does not satisfy.
    pub conflicting: NodeId,
    /// Node of the chosen library.
    pub selected: NodeId,
}

/// A request that got a lower version than it asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Downgrade {
    /// The losing request; its outer node is the requesting parent.
    pub downgraded_from: NodeId,
    /// The chosen library; its outer node is the parent whose request won.
    pub downgraded_to: NodeId,
}

/// Everything flattening found wrong or suspicious.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalyzeResult {
    /// Nodes closing a cycle.
    pub cycles: Vec<NodeId>,
    /// Irreconcilable requests.
    pub version_conflicts: Vec<VersionConflict>,
    /// Requests resolved below their minimum.
    pub downgrades: Vec<Downgrade>,
}

/// An edge of the resolved graph: `parent` asked for `range` and got `child`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedDependencyKey {
    /// Requesting library.
    pub parent: LibraryIdentity,
    /// Range requested.
    pub range: Option<VersionRange>,
    /// Library chosen.
    pub child: LibraryIdentity,
}

/// The pieces flattening produces, before they are frozen into a graph.
#[derive(Debug, Default)]
pub(crate) struct GraphParts {
    pub nodes: Arena<GraphNode>,
    pub root: Option<NodeId>,
    pub flattened: FxIndexSet<GraphItem>,
    pub install: Vec<RemoteMatch>,
    pub unresolved: FxIndexSet<LibraryRange>,
    pub analyze: AnalyzeResult,
    pub resolved_dependencies: FxIndexSet<ResolvedDependencyKey>,
}

/// The resolved graph of one framework and runtime pair.
#[derive(Debug, Clone)]
pub struct RestoreTargetGraph {
    pair: FrameworkRuntimePair,
    runtime_graph: Arc<RuntimeGraph>,
    nodes: Arena<GraphNode>,
    root: Option<NodeId>,
    flattened: FxIndexSet<GraphItem>,
    install: Vec<RemoteMatch>,
    unresolved: FxIndexSet<LibraryRange>,
    analyze: AnalyzeResult,
    resolved_dependencies: FxIndexSet<ResolvedDependencyKey>,
    success: bool,
}

impl RestoreTargetGraph {
    pub(crate) fn from_parts(
        pair: FrameworkRuntimePair,
        runtime_graph: Arc<RuntimeGraph>,
        parts: GraphParts,
    ) -> Self {
        Self {
            success: parts.unresolved.is_empty(),
            pair,
            runtime_graph,
            nodes: parts.nodes,
            root: parts.root,
            flattened: parts.flattened,
            install: parts.install,
            unresolved: parts.unresolved,
            analyze: parts.analyze,
            resolved_dependencies: parts.resolved_dependencies,
        }
    }

    /// A graph with nothing in it, standing in for a pair that was never resolved.
    pub fn empty(pair: FrameworkRuntimePair) -> Self {
        Self {
            success: false,
            ..Self::from_parts(pair, Arc::default(), GraphParts::default())
        }
    }

    /// The same resolution under a runtime identifier, for RIDs that add nothing to it.
    pub(crate) fn with_runtime(&self, pair: FrameworkRuntimePair, runtime_graph: Arc<RuntimeGraph>) -> Self {
        Self {
            pair,
            runtime_graph,
            ..self.clone()
        }
    }

    /// `net6.0` or `net6.0/win-x64`.
    pub fn name(&self) -> String {
        self.pair.name()
    }

    /// Framework and runtime identifier.
    pub fn pair(&self) -> &FrameworkRuntimePair {
        &self.pair
    }

    /// Target framework.
    pub fn framework(&self) -> &Framework {
        &self.pair.framework
    }

    /// Runtime identifier, `None` for ridless graphs.
    pub fn runtime_identifier(&self) -> Option<&str> {
        self.pair.runtime_identifier.as_deref()
    }

    /// Runtime graph the pair was resolved with.
    pub fn runtime_graph(&self) -> &RuntimeGraph {
        &self.runtime_graph
    }

    /// Root node, absent for empty graphs.
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// The node behind `id`.
    pub fn node(&self, id: NodeId) -> &GraphNode {
        &self.nodes[id]
    }

    /// Every node, including cycle and diagnostic ones.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &GraphNode)> {
        self.nodes.iter()
    }

    /// Nodes from the root down to `id`.
    pub fn path_to(&self, id: NodeId) -> Vec<NodeId> {
        let mut path = vec![id];
        let mut current = id;
        while let Some(outer) = self.nodes[current].outer {
            path.push(outer);
            current = outer;
        }
        path.reverse();
        path
    }

    /// Every chosen library, root included, each once.
    pub fn flattened(&self) -> &FxIndexSet<GraphItem> {
        &self.flattened
    }

    /// Chosen library named `name`, ignoring case.
    pub fn find(&self, name: &str) -> Option<&GraphItem> {
        self.flattened
            .iter()
            .find(|item| eq_ignore_case(&item.key.name, name))
    }

    /// Packages that have to be fetched from a remote source, sorted.
    pub fn install(&self) -> &[RemoteMatch] {
        &self.install
    }

    /// Requests nothing satisfied.
    pub fn unresolved(&self) -> &FxIndexSet<LibraryRange> {
        &self.unresolved
    }

    /// Cycles, conflicts and downgrades.
    pub fn analyze_result(&self) -> &AnalyzeResult {
        &self.analyze
    }

    /// Resolved edges.
    pub fn resolved_dependencies(&self) -> &FxIndexSet<ResolvedDependencyKey> {
        &self.resolved_dependencies
    }

    /// Whether a cycle or version conflict makes the graph unusable.
    pub fn in_conflict(&self) -> bool {
        !self.analyze.cycles.is_empty() || !self.analyze.version_conflicts.is_empty()
    }

    /// Whether every request resolved and the graph is not in conflict.
    pub fn is_success(&self) -> bool {
        self.success && !self.in_conflict()
    }

    /// Chosen packages, projects excluded.
    pub fn packages(&self) -> impl Iterator<Item = &GraphItem> {
        self.flattened
            .iter()
            .filter(|item| item.key.library_type == LibraryType::Package)
    }
}
