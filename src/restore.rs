// SPDX-License-Identifier: MPL-2.0

//! Resolving every graph of a project.
//!
//! [DependencyGraphResolver] runs in phases:
//!
//! 1. one graph per target framework, without runtime identifier;
//! 2. a runtime graph per framework, the project's own one merged with whatever the
//!    [RuntimeGraphSource] finds in the ridless graph;
//! 3. one graph per framework and runtime identifier, reusing the ridless graph whenever no
//!    library in it has dependencies specific to that runtime;
//! 4. the pairs of the project's compatibility profiles that are not already computed.
//!
//! Pairs of one phase are independent and resolved in parallel with rayon when
//! [RestoreOptions::parallel_graphs] is set. A provider fault in any pair stops the later
//! phases: graphs already computed are kept and every remaining pair gets an empty graph.

use std::sync::Arc;

use log::{debug, info};
use rayon::prelude::*;

use crate::error::RestoreError;
use crate::framework::{Framework, FrameworkRuntimePair};
use crate::graph::RestoreTargetGraph;
use crate::internal::flatten::flatten;
use crate::internal::walker::{walk, WalkContext};
use crate::library::LibraryType;
use crate::logging::{RestoreLogCode, RestoreLogMessage, RestoreLogger};
use crate::options::RestoreOptions;
use crate::project::ProjectSpec;
use crate::provider::LibraryProvider;
use crate::runtime::{RuntimeDependencyOverlay, RuntimeGraph};
use crate::type_aliases::FxIndexMap;

/// Finds the runtime graph contributed by the libraries of a ridless graph, typically the
/// `runtime.json` files of its packages.
pub trait RuntimeGraphSource: Send + Sync {
    /// Runtime graph for the libraries of `graph`.
    fn runtime_graph(&self, graph: &RestoreTargetGraph) -> RuntimeGraph;
}

/// A fixed runtime graph, whatever the libraries.
impl RuntimeGraphSource for RuntimeGraph {
    fn runtime_graph(&self, _graph: &RestoreTargetGraph) -> RuntimeGraph {
        self.clone()
    }
}

/// Graphs of every pair, in phase order.
#[derive(Debug, Clone)]
pub struct GraphResolution {
    /// No fault happened and every graph succeeded.
    pub success: bool,
    /// One graph per pair: ridless pairs first, then runtime pairs, then supports pairs.
    pub graphs: Vec<RestoreTargetGraph>,
    /// Union of the per-framework runtime graphs.
    pub runtime_graph: RuntimeGraph,
}

impl GraphResolution {
    /// Graph of `pair`, if one was produced.
    pub fn graph(&self, pair: &FrameworkRuntimePair) -> Option<&RestoreTargetGraph> {
        self.graphs.iter().find(|graph| graph.pair() == pair)
    }
}

/// Resolves all graphs of a project.
pub struct DependencyGraphResolver<'a, P: ?Sized, L: ?Sized> {
    project: &'a ProjectSpec,
    provider: &'a P,
    logger: &'a L,
    options: &'a RestoreOptions,
    runtime_source: Option<&'a dyn RuntimeGraphSource>,
}

impl<'a, P, L> DependencyGraphResolver<'a, P, L>
where
    P: LibraryProvider + ?Sized,
    L: RestoreLogger + ?Sized,
{
    /// Resolver for `project` using `provider`.
    pub fn new(project: &'a ProjectSpec, provider: &'a P, logger: &'a L, options: &'a RestoreOptions) -> Self {
        Self {
            project,
            provider,
            logger,
            options,
            runtime_source: None,
        }
    }

    /// Same resolver, taking package runtime graphs from `source`.
    pub fn with_runtime_graph_source(mut self, source: &'a dyn RuntimeGraphSource) -> Self {
        self.runtime_source = Some(source);
        self
    }

    /// Runs every phase.
    ///
    /// Provider faults are logged as `NU1301` and make the resolution unsuccessful;
    /// only cancellation is returned as an error.
    pub fn resolve(&self) -> Result<GraphResolution, RestoreError> {
        let frameworks: Vec<Framework> = self.project.frameworks().cloned().collect();
        let mut graphs: FxIndexMap<FrameworkRuntimePair, RestoreTargetGraph> = FxIndexMap::default();
        let mut runtime_graphs: FxIndexMap<Framework, Arc<RuntimeGraph>> = FxIndexMap::default();

        let ridless: Vec<FrameworkRuntimePair> = frameworks
            .iter()
            .cloned()
            .map(FrameworkRuntimePair::ridless)
            .collect();
        let results = self.run_phase(&ridless, |pair| self.resolve_pair(pair, Arc::default()));
        let mut faulted = self.collect(&ridless, results, &mut graphs)?;

        let mut all_runtimes = self.project.runtime_graph.clone();
        for framework in &frameworks {
            let pair = FrameworkRuntimePair::ridless(framework.clone());
            let runtime_graph = match (self.runtime_source, graphs.get(&pair)) {
                (Some(source), Some(graph)) => self.project.runtime_graph.merge(&source.runtime_graph(graph)),
                _ => self.project.runtime_graph.clone(),
            };
            all_runtimes = all_runtimes.merge(&runtime_graph);
            runtime_graphs.insert(framework.clone(), Arc::new(runtime_graph));
        }
        let all_runtimes = Arc::new(all_runtimes);

        let rid_pairs: Vec<FrameworkRuntimePair> = frameworks
            .iter()
            .flat_map(|framework| {
                self.project
                    .runtime_identifiers
                    .iter()
                    .map(move |rid| FrameworkRuntimePair::new(framework.clone(), Some(rid)))
            })
            .filter(|pair| !graphs.contains_key(pair))
            .collect();

        let supports_pairs = self.supports_pairs(&all_runtimes);

        if faulted {
            let remaining = rid_pairs.into_iter().chain(supports_pairs);
            return Ok(self.finish_faulted(graphs, remaining, &all_runtimes));
        }

        let runtime_graph_for = |framework: &Framework| {
            runtime_graphs
                .get(framework)
                .cloned()
                .unwrap_or_else(|| Arc::clone(&all_runtimes))
        };

        let results = self.run_phase(&rid_pairs, |pair| {
            self.resolve_runtime_pair(pair, runtime_graph_for(&pair.framework), &graphs)
        });
        faulted = self.collect(&rid_pairs, results, &mut graphs)?;
        if faulted {
            let remaining = rid_pairs.into_iter().chain(supports_pairs);
            return Ok(self.finish_faulted(graphs, remaining, &all_runtimes));
        }

        let new_supports_pairs: Vec<FrameworkRuntimePair> = supports_pairs
            .iter()
            .filter(|pair| !graphs.contains_key(*pair))
            .cloned()
            .collect();
        let results = self.run_phase(&new_supports_pairs, |pair| {
            self.resolve_runtime_pair(pair, runtime_graph_for(&pair.framework), &graphs)
        });
        faulted = self.collect(&new_supports_pairs, results, &mut graphs)?;
        if faulted {
            let remaining = rid_pairs.into_iter().chain(supports_pairs);
            return Ok(self.finish_faulted(graphs, remaining, &all_runtimes));
        }

        let graphs: Vec<RestoreTargetGraph> = graphs.into_values().collect();
        let success = graphs.iter().all(RestoreTargetGraph::is_success);
        info!(
            "resolved {} graphs for {}, success: {}",
            graphs.len(),
            self.project.name,
            success
        );
        Ok(GraphResolution {
            success,
            graphs,
            runtime_graph: (*all_runtimes).clone(),
        })
    }

    /// Walks and flattens a single pair.
    pub fn resolve_pair(
        &self,
        pair: &FrameworkRuntimePair,
        runtime_graph: Arc<RuntimeGraph>,
    ) -> Result<RestoreTargetGraph, RestoreError> {
        let overlay = pair
            .runtime_identifier
            .as_ref()
            .map(|_| runtime_graph.as_ref() as &dyn RuntimeDependencyOverlay);
        let outcome = walk(WalkContext {
            project: self.project,
            framework: &pair.framework,
            runtime_identifier: pair.runtime_identifier.as_deref(),
            provider: self.provider,
            overlay,
            central_pinning: self.options.central_transitive_pinning,
        })?;
        let parts = flatten(&outcome, self.options.central_transitive_pinning)?;
        debug!(
            "{}: {} libraries, {} deep evictions",
            pair,
            parts.flattened.len(),
            outcome.deep_evictions
        );
        Ok(RestoreTargetGraph::from_parts(pair.clone(), runtime_graph, parts))
    }

    fn resolve_runtime_pair(
        &self,
        pair: &FrameworkRuntimePair,
        runtime_graph: Arc<RuntimeGraph>,
        graphs: &FxIndexMap<FrameworkRuntimePair, RestoreTargetGraph>,
    ) -> Result<RestoreTargetGraph, RestoreError> {
        let ridless = graphs.get(&FrameworkRuntimePair::ridless(pair.framework.clone()));
        match (ridless, pair.runtime_identifier.as_deref()) {
            (Some(ridless), Some(rid)) if !has_runtime_dependencies(ridless, &runtime_graph, rid) => {
                debug!("{}: reusing the ridless graph", pair);
                Ok(ridless.with_runtime(pair.clone(), runtime_graph))
            }
            _ => self.resolve_pair(pair, runtime_graph),
        }
    }

    fn supports_pairs(&self, runtime_graph: &RuntimeGraph) -> Vec<FrameworkRuntimePair> {
        let mut pairs = Vec::new();
        for profile in &self.project.supports {
            let contexts = if !profile.restore_contexts.is_empty() {
                &profile.restore_contexts
            } else if let Some(known) = runtime_graph.profile(&profile.name) {
                &known.restore_contexts
            } else {
                self.logger.log(
                    RestoreLogMessage::warning(
                        RestoreLogCode::UnknownCompatibilityProfile,
                        format!("Unknown Compatibility Profile: {}", profile.name),
                    )
                    .with_library(profile.name.clone()),
                );
                continue;
            };
            for pair in contexts {
                if !pairs.contains(pair) {
                    pairs.push(pair.clone());
                }
            }
        }
        pairs
    }

    fn run_phase<F>(&self, pairs: &[FrameworkRuntimePair], resolve: F) -> Vec<Result<RestoreTargetGraph, RestoreError>>
    where
        F: Fn(&FrameworkRuntimePair) -> Result<RestoreTargetGraph, RestoreError> + Send + Sync,
    {
        if self.options.parallel_graphs && pairs.len() > 1 {
            pairs.par_iter().map(resolve).collect()
        } else {
            pairs.iter().map(resolve).collect()
        }
    }

    /// Stores successful graphs and logs faults. Returns whether a fault happened.
    fn collect(
        &self,
        pairs: &[FrameworkRuntimePair],
        results: Vec<Result<RestoreTargetGraph, RestoreError>>,
        graphs: &mut FxIndexMap<FrameworkRuntimePair, RestoreTargetGraph>,
    ) -> Result<bool, RestoreError> {
        let mut faulted = false;
        for (pair, result) in pairs.iter().zip(results) {
            match result {
                Ok(graph) => {
                    graphs.insert(pair.clone(), graph);
                }
                Err(RestoreError::Cancelled(source)) => return Err(RestoreError::Cancelled(source)),
                Err(error) => {
                    faulted = true;
                    let mut message = RestoreLogMessage::error(RestoreLogCode::ProviderFault, fault_text(&error))
                        .with_target_graphs([pair.name()]);
                    if let RestoreError::ProviderFault { library, .. } = &error {
                        message = message.with_library(library.clone());
                    }
                    self.logger.log(message);
                }
            }
        }
        Ok(faulted)
    }

    /// Graphs of every pair in phase order, with an empty one for each pair that faulted or
    /// was never reached.
    fn finish_faulted<I>(
        &self,
        mut graphs: FxIndexMap<FrameworkRuntimePair, RestoreTargetGraph>,
        remaining: I,
        all_runtimes: &RuntimeGraph,
    ) -> GraphResolution
    where
        I: IntoIterator<Item = FrameworkRuntimePair>,
    {
        let ridless = self
            .project
            .frameworks()
            .cloned()
            .map(FrameworkRuntimePair::ridless);
        let mut ordered: FxIndexMap<FrameworkRuntimePair, RestoreTargetGraph> = FxIndexMap::default();
        for pair in ridless.chain(remaining) {
            if ordered.contains_key(&pair) {
                continue;
            }
            let graph = graphs
                .shift_remove(&pair)
                .unwrap_or_else(|| RestoreTargetGraph::empty(pair.clone()));
            ordered.insert(pair, graph);
        }
        info!("resolution of {} stopped after a fault", self.project.name);
        GraphResolution {
            success: false,
            graphs: ordered.into_values().collect(),
            runtime_graph: all_runtimes.clone(),
        }
    }
}

/// Whether a package of `graph` brings RID-specific dependencies along on `rid`.
fn has_runtime_dependencies(graph: &RestoreTargetGraph, runtime_graph: &RuntimeGraph, rid: &str) -> bool {
    graph.flattened().iter().any(|item| {
        item.key.library_type == LibraryType::Package
            && !runtime_graph
                .find_runtime_dependencies(rid, &item.key.name)
                .is_empty()
    })
}

fn fault_text(error: &RestoreError) -> String {
    match std::error::Error::source(error) {
        Some(source) => format!("{}: {}", error, source),
        None => error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::LibraryDependency;
    use crate::logging::CollectingLogger;
    use crate::project::TargetFrameworkInformation;
    use crate::provider::OfflineLibraryProvider;
    use crate::runtime::CompatibilityProfile;

    fn fw(s: &str) -> Framework {
        s.parse().unwrap()
    }

    fn project() -> ProjectSpec {
        ProjectSpec::new("App", (1, 0, 0))
            .with_framework(
                TargetFrameworkInformation::new(fw("net6.0"))
                    .with_dependency(LibraryDependency::package("A", "1.0".parse().unwrap())),
            )
            .with_runtime_identifier("win-x64")
    }

    fn provider() -> OfflineLibraryProvider {
        let mut provider = OfflineLibraryProvider::new();
        provider.add_package("A", (1, 0, 0), []);
        provider.add_package("A.Native", (1, 0, 0), []);
        provider
    }

    #[test]
    fn ridless_graph_is_reused_without_runtime_dependencies() {
        let (project, provider, logger) = (project(), provider(), CollectingLogger::new());
        let options = RestoreOptions::default();
        let resolution = DependencyGraphResolver::new(&project, &provider, &logger, &options)
            .resolve()
            .unwrap();
        assert!(resolution.success);
        let names: Vec<String> = resolution.graphs.iter().map(RestoreTargetGraph::name).collect();
        assert_eq!(names, vec!["net6.0", "net6.0/win-x64"]);
        assert_eq!(resolution.graphs[1].flattened().len(), 2);
        assert_eq!(resolution.graphs[1].runtime_identifier(), Some("win-x64"));
    }

    #[test]
    fn runtime_dependencies_are_walked() {
        let runtime_graph = RuntimeGraph::new()
            .with_runtime("win-x64", ["win"])
            .with_runtime("win", [])
            .with_runtime_dependency("win", "A", "A.Native", "1.0".parse().unwrap());
        let (project, provider, logger) = (project(), provider(), CollectingLogger::new());
        let options = RestoreOptions {
            parallel_graphs: false,
            ..RestoreOptions::default()
        };
        let resolution = DependencyGraphResolver::new(&project, &provider, &logger, &options)
            .with_runtime_graph_source(&runtime_graph)
            .resolve()
            .unwrap();
        assert!(resolution.graphs[0].find("A.Native").is_none());
        assert!(resolution.graphs[1].find("A.Native").is_some());
    }

    #[test]
    fn unknown_profile_is_skipped() {
        let project = project().with_supports(CompatibilityProfile::named("uwp"));
        let (provider, logger) = (provider(), CollectingLogger::new());
        let options = RestoreOptions::default();
        let resolution = DependencyGraphResolver::new(&project, &provider, &logger, &options)
            .resolve()
            .unwrap();
        assert_eq!(resolution.graphs.len(), 2);
        assert_eq!(logger.with_code(RestoreLogCode::UnknownCompatibilityProfile).len(), 1);
    }
}
