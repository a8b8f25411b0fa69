// SPDX-License-Identifier: MPL-2.0

//! Build reports as clear as possible as to why
//! a restore graph is not what the user asked for.

use log::info;
use restore_versioning::VersionRange;

use crate::graph::{Disposition, Downgrade, NodeId, RestoreTargetGraph, VersionConflict};
use crate::library::eq_ignore_case;
use crate::logging::{RestoreLogCode, RestoreLogMessage, RestoreLogger};
use crate::options::RestoreOptions;
use crate::type_aliases::FxIndexMap;

/// Something that turns graph nodes into report lines.
pub trait Reporter {
    /// Adds a line to the report.
    fn print_ln(&mut self, line: String);
    /// One node of a dependency path. `last` is set for the node the path leads to.
    fn string_node(&mut self, graph: &RestoreTargetGraph, node: NodeId, last: bool) -> String;
    /// The chain of nodes from the root to `node`.
    fn string_path(&mut self, graph: &RestoreTargetGraph, node: NodeId) -> String {
        let path = graph.path_to(node);
        let count = path.len();
        let parts: Vec<String> = path
            .into_iter()
            .enumerate()
            .map(|(position, id)| self.string_node(graph, id, position + 1 == count))
            .collect();
        parts.join(" -> ")
    }
}

/// Default reporter able to generate an explanation as a [String].
#[derive(Debug, Default)]
pub struct DefaultStringReporter {
    /// Accumulated lines of the report already generated.
    lines: Vec<String>,
}

impl DefaultStringReporter {
    /// Initialize the reporter.
    pub fn new() -> Self {
        Self::default()
    }

    /// The report so far, one line each.
    pub fn finish(self) -> String {
        self.lines.join("\n")
    }
}

impl Reporter for DefaultStringReporter {
    fn print_ln(&mut self, line: String) {
        self.lines.push(line)
    }

    fn string_node(&mut self, graph: &RestoreTargetGraph, node: NodeId, last: bool) -> String {
        let node = graph.node(node);
        if node.outer.is_none() {
            return node.key.name.clone();
        }
        match (&node.item, last) {
            (Some(item), false) => item.key.to_string(),
            _ => node.key.to_string(),
        }
    }
}

fn report_paths(reporter: &mut impl Reporter, graph: &RestoreTargetGraph, nodes: &[NodeId]) {
    let mut seen = Vec::new();
    for &node in nodes {
        let path = reporter.string_path(graph, node);
        if !seen.contains(&path) {
            reporter.print_ln(format!("  {}", path));
            seen.push(path);
        }
    }
}

/// `Cycle detected.` followed by the path closing the cycle, `App -> A 1.0.0 -> App`.
pub fn report_cycle(graph: &RestoreTargetGraph, cycle: NodeId) -> String {
    let mut reporter = DefaultStringReporter::new();
    reporter.print_ln("Cycle detected.".to_string());
    report_paths(&mut reporter, graph, &[cycle]);
    reporter.finish()
}

/// The downgraded package with the path that asked for more and the path that won.
pub fn report_downgrade(graph: &RestoreTargetGraph, downgrade: &Downgrade) -> String {
    let from = graph.node(downgrade.downgraded_from);
    let to = graph.node(downgrade.downgraded_to);
    let requested = from
        .key
        .version_range
        .as_ref()
        .and_then(VersionRange::min_version)
        .map(ToString::to_string)
        .unwrap_or_default();
    let chosen = to
        .identity()
        .map(|identity| identity.version.to_string())
        .unwrap_or_default();
    let mut reporter = DefaultStringReporter::new();
    reporter.print_ln(format!(
        "Detected package downgrade: {} from {} to {}. Reference the package directly from the project to select a different version.",
        from.key.name, requested, chosen
    ));
    report_paths(
        &mut reporter,
        graph,
        &[downgrade.downgraded_from, downgrade.downgraded_to],
    );
    reporter.finish()
}

/// Every path requesting the conflicting library.
pub fn report_conflict(graph: &RestoreTargetGraph, conflict: &VersionConflict) -> String {
    let conflicting = graph.node(conflict.conflicting);
    let selected = graph.node(conflict.selected);
    let name = &conflicting.key.name;
    let mut reporter = DefaultStringReporter::new();
    let header = if ranges_are_disjoint(&conflicting.key.version_range, &selected.key.version_range) {
        format!("Unable to satisfy conflicting requests for '{}'.", name)
    } else {
        let wanted = conflicting
            .key
            .version_range
            .as_ref()
            .and_then(VersionRange::min_version)
            .map(|version| format!("{} {}", name, version))
            .unwrap_or_else(|| name.clone());
        format!(
            "Version conflict detected for {}. Install/reference {} directly to project {} to resolve this issue.",
            name,
            wanted,
            root_name(graph)
        )
    };
    reporter.print_ln(header);
    report_paths(&mut reporter, graph, &requesting_nodes(graph, name));
    reporter.finish()
}

/// Code a conflict is reported under: `NU1106` when no version could satisfy both requests.
pub fn conflict_code(graph: &RestoreTargetGraph, conflict: &VersionConflict) -> RestoreLogCode {
    let conflicting = &graph.node(conflict.conflicting).key.version_range;
    let selected = &graph.node(conflict.selected).key.version_range;
    if ranges_are_disjoint(conflicting, selected) {
        RestoreLogCode::ConflictingRanges
    } else {
        RestoreLogCode::VersionConflict
    }
}

fn root_name(graph: &RestoreTargetGraph) -> String {
    graph
        .root()
        .map(|root| graph.node(root).key.name.clone())
        .unwrap_or_default()
}

fn requesting_nodes(graph: &RestoreTargetGraph, name: &str) -> Vec<NodeId> {
    graph
        .nodes()
        .filter(|(_, node)| {
            node.outer.is_some()
                && matches!(node.disposition, Disposition::Accepted | Disposition::Acceptable)
                && eq_ignore_case(&node.key.name, name)
        })
        .map(|(id, _)| id)
        .collect()
}

/// Whether no version satisfies both ranges.
fn ranges_are_disjoint(left: &Option<VersionRange>, right: &Option<VersionRange>) -> bool {
    let (Some(left), Some(right)) = (left, right) else {
        return false;
    };
    let below = |low: &VersionRange, high: &VersionRange| match (low.max_version(), high.min_version()) {
        (Some(max), Some(min)) => max < min || (max == min && !(low.is_max_inclusive() && high.is_min_inclusive())),
        _ => false,
    };
    below(left, right) || below(right, left)
}

/// Logs the unresolved requests, cycles, conflicts and downgrades of `graphs`.
///
/// The same downgrade found in several graphs is logged once with every graph name.
/// Returns whether any of it fails the restore.
pub fn log_graph_diagnostics<L: RestoreLogger + ?Sized>(
    graphs: &[RestoreTargetGraph],
    logger: &L,
    options: &RestoreOptions,
) -> bool {
    let mut failed = false;
    let mut downgrades: FxIndexMap<String, (String, Vec<String>)> = FxIndexMap::default();

    for graph in graphs {
        let name = graph.name();
        if !graph.is_success() {
            failed = true;
        }
        for range in graph.unresolved() {
            logger.log(
                RestoreLogMessage::error(RestoreLogCode::Unresolved, format!("Unable to resolve '{}'.", range))
                    .with_library(range.name.clone())
                    .with_target_graphs([name.clone()]),
            );
        }
        let analyze = graph.analyze_result();
        for &cycle in &analyze.cycles {
            logger.log(
                RestoreLogMessage::error(RestoreLogCode::Cycle, report_cycle(graph, cycle))
                    .with_library(graph.node(cycle).key.name.clone())
                    .with_target_graphs([name.clone()]),
            );
        }
        for conflict in &analyze.version_conflicts {
            logger.log(
                RestoreLogMessage::error(conflict_code(graph, conflict), report_conflict(graph, conflict))
                    .with_library(graph.node(conflict.conflicting).key.name.clone())
                    .with_target_graphs([name.clone()]),
            );
        }
        for downgrade in &analyze.downgrades {
            let library = graph.node(downgrade.downgraded_from).key.name.clone();
            let entry = downgrades
                .entry(report_downgrade(graph, downgrade))
                .or_insert_with(|| (library, Vec::new()));
            if !entry.1.contains(&name) {
                entry.1.push(name.clone());
            }
        }
    }

    for (text, (library, target_graphs)) in downgrades {
        let message = if options.treat_downgrades_as_errors {
            failed = true;
            RestoreLogMessage::error(RestoreLogCode::Downgrade, text)
        } else {
            RestoreLogMessage::warning(RestoreLogCode::Downgrade, text)
        };
        logger.log(message.with_library(library).with_target_graphs(target_graphs));
    }
    if failed {
        info!("restore graphs have errors");
    }
    failed
}
