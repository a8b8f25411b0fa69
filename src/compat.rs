// SPDX-License-Identifier: MPL-2.0

//! Checks that every library of a graph can actually be used by the target.

use std::fmt::{self, Display};

use log::debug;

use crate::content::{assembly_file_name, available_frameworks, select_assets, PackageContentSource, PLACEHOLDER_FILE};
use crate::framework::Framework;
use crate::graph::{Disposition, GraphItem, RestoreTargetGraph};
use crate::library::{eq_ignore_case, LibraryIdentity, LibraryIncludeFlags, LibraryType};
use crate::logging::{RestoreLogCode, RestoreLogMessage, RestoreLogger};
use crate::options::RestoreOptions;

/// What is wrong with a library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompatibilityIssueKind {
    /// A referenced project targets nothing compatible.
    IncompatibleProject,
    /// A package has no assets for the framework.
    IncompatiblePackage,
    /// A reference assembly has no implementation for the runtime.
    ReferenceAssemblyNotImplemented,
}

/// One incompatibility found in a graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompatibilityIssue {
    /// Kind.
    pub kind: CompatibilityIssueKind,
    /// The offending library.
    pub library: LibraryIdentity,
    /// Framework of the graph.
    pub framework: Framework,
    /// Runtime identifier of the graph.
    pub runtime_identifier: Option<String>,
    /// What the library does support.
    pub available_frameworks: Vec<Framework>,
    /// Reference assembly without implementation.
    pub assembly_name: Option<String>,
}

impl CompatibilityIssue {
    /// Log code of the issue.
    pub fn code(&self) -> RestoreLogCode {
        match self.kind {
            CompatibilityIssueKind::IncompatibleProject => RestoreLogCode::IncompatibleProject,
            CompatibilityIssueKind::IncompatiblePackage => RestoreLogCode::IncompatiblePackage,
            CompatibilityIssueKind::ReferenceAssemblyNotImplemented => {
                RestoreLogCode::ReferenceAssemblyNotImplemented
            }
        }
    }

    fn target(&self) -> String {
        match &self.runtime_identifier {
            Some(rid) => format!("{} ({})", self.framework, rid),
            None => self.framework.to_string(),
        }
    }

    fn supported(&self) -> String {
        self.available_frameworks
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Display for CompatibilityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let library = &self.library;
        match self.kind {
            CompatibilityIssueKind::IncompatibleProject => write!(
                f,
                "Project {} is not compatible with {}. Project {} supports: {}",
                library.name,
                self.target(),
                library.name,
                self.supported()
            ),
            CompatibilityIssueKind::IncompatiblePackage => write!(
                f,
                "Package {} {} is not compatible with {}. Package {} {} supports: {}",
                library.name,
                library.version,
                self.target(),
                library.name,
                library.version,
                self.supported()
            ),
            CompatibilityIssueKind::ReferenceAssemblyNotImplemented => write!(
                f,
                "{} {} provides a compile-time reference assembly for {} on {}, but there is no run-time assembly compatible with {}.",
                library.name,
                library.version,
                self.assembly_name.as_deref().unwrap_or_default(),
                self.framework,
                self.runtime_identifier.as_deref().unwrap_or_default()
            ),
        }
    }
}

/// Issues of one graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompatibilityCheckResult {
    /// Name of the graph.
    pub graph: String,
    /// Everything found, in flattened order.
    pub issues: Vec<CompatibilityIssue>,
}

impl CompatibilityCheckResult {
    /// Whether nothing was found.
    pub fn success(&self) -> bool {
        self.issues.is_empty()
    }

    /// Issues about packages.
    pub fn package_issue_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|issue| issue.kind != CompatibilityIssueKind::IncompatibleProject)
            .count()
    }

    /// Issues about projects.
    pub fn project_issue_count(&self) -> usize {
        self.issues.len() - self.package_issue_count()
    }

    /// Logs every issue as an error for this graph.
    pub fn log_issues<L: RestoreLogger + ?Sized>(&self, logger: &L) {
        for issue in &self.issues {
            logger.log(
                RestoreLogMessage::error(issue.code(), issue.to_string())
                    .with_library(issue.library.name.clone())
                    .with_target_graphs([self.graph.clone()]),
            );
        }
    }
}

/// Checks graphs against package content.
pub struct CompatibilityChecker<'a, S: ?Sized> {
    source: &'a S,
    options: &'a RestoreOptions,
}

impl<'a, S: PackageContentSource + ?Sized> CompatibilityChecker<'a, S> {
    /// Checker reading content from `source`.
    pub fn new(source: &'a S, options: &'a RestoreOptions) -> Self {
        Self { source, options }
    }

    /// Checks every library of `graph` except its root.
    pub fn check(&self, graph: &RestoreTargetGraph) -> CompatibilityCheckResult {
        let root = graph
            .root()
            .and_then(|root| graph.node(root).identity())
            .cloned();
        let mut issues = Vec::new();
        for item in graph.flattened() {
            if Some(&item.key) == root.as_ref() {
                continue;
            }
            match item.key.library_type {
                LibraryType::Project | LibraryType::ExternalProject => {
                    issues.extend(self.check_project(graph, item));
                }
                LibraryType::Package => issues.extend(self.check_package(graph, item)),
                _ => {}
            }
        }
        debug!("{}: {} compatibility issues", graph.name(), issues.len());
        CompatibilityCheckResult {
            graph: graph.name(),
            issues,
        }
    }

    fn issue(&self, kind: CompatibilityIssueKind, graph: &RestoreTargetGraph, item: &GraphItem) -> CompatibilityIssue {
        CompatibilityIssue {
            kind,
            library: item.key.clone(),
            framework: graph.framework().clone(),
            runtime_identifier: graph.runtime_identifier().map(str::to_string),
            available_frameworks: Vec::new(),
            assembly_name: None,
        }
    }

    fn check_project(&self, graph: &RestoreTargetGraph, item: &GraphItem) -> Option<CompatibilityIssue> {
        let details = item.data.as_ref()?.project.as_ref()?;
        match &details.resolved_framework {
            Some(framework) if !framework.is_unsupported() => None,
            _ => Some(CompatibilityIssue {
                available_frameworks: details.frameworks.clone(),
                ..self.issue(CompatibilityIssueKind::IncompatibleProject, graph, item)
            }),
        }
    }

    fn check_package(&self, graph: &RestoreTargetGraph, item: &GraphItem) -> Vec<CompatibilityIssue> {
        let flags = include_flags(graph, item);
        if !flags.intersects(LibraryIncludeFlags::COMPILE | LibraryIncludeFlags::RUNTIME) {
            return Vec::new();
        }
        let content = match self.source.content(&item.key) {
            Some(content) => content,
            None => return Vec::new(),
        };
        let framework = graph.framework();
        let assets = select_assets(&content, framework, graph.runtime_identifier(), graph.runtime_graph());
        let compatible = assets.has_any()
            || content.framework_assemblies_for(framework).next().is_some()
            || !content.has_assemblies();
        if !compatible {
            return vec![CompatibilityIssue {
                available_frameworks: available_frameworks(&content),
                ..self.issue(CompatibilityIssueKind::IncompatiblePackage, graph, item)
            }];
        }

        if graph.runtime_identifier().is_none() || !self.options.validate_runtime_assets {
            return Vec::new();
        }
        let implemented: Vec<String> = assets
            .runtime
            .iter()
            .map(|path| assembly_file_name(path))
            .collect();
        assets
            .compile
            .iter()
            .filter(|path| !path.ends_with(PLACEHOLDER_FILE))
            .filter(|path| !implemented.contains(&assembly_file_name(path)))
            .map(|path| CompatibilityIssue {
                assembly_name: Some(path.rsplit('/').next().unwrap_or(path).to_string()),
                ..self.issue(CompatibilityIssueKind::ReferenceAssemblyNotImplemented, graph, item)
            })
            .collect()
    }
}

/// Asset groups flowing to `item` along every edge of the tree that chose it.
fn include_flags(graph: &RestoreTargetGraph, item: &GraphItem) -> LibraryIncludeFlags {
    let mut flags = LibraryIncludeFlags::NONE;
    let mut found = false;
    for (_, node) in graph.nodes() {
        if node.disposition != Disposition::Accepted || node.identity() != Some(&item.key) {
            continue;
        }
        let parent = match node.outer.and_then(|outer| graph.node(outer).item.as_ref()) {
            Some(parent) => parent,
            None => continue,
        };
        if let Some(edge) = parent
            .dependencies()
            .iter()
            .find(|dependency| eq_ignore_case(dependency.name(), &item.key.name))
        {
            flags |= edge.include_type;
            found = true;
        }
    }
    if found {
        flags
    } else {
        LibraryIncludeFlags::ALL
    }
}
