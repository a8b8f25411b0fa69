// SPDX-License-Identifier: MPL-2.0

//! One full restore: resolve, install, check, report, lock.

use log::info;

use crate::compat::{CompatibilityCheckResult, CompatibilityChecker};
use crate::content::PackageContentSource;
use crate::error::RestoreError;
use crate::graph::RestoreTargetGraph;
use crate::install::{install_packages, InstallSummary, PackageInstaller};
use crate::lockfile::{ContentHashSource, LockFileBuilder, PackagesLockFile};
use crate::logging::RestoreLogger;
use crate::options::RestoreOptions;
use crate::project::ProjectSpec;
use crate::provider::LibraryProvider;
use crate::report::log_graph_diagnostics;
use crate::restore::{DependencyGraphResolver, RuntimeGraphSource};

/// Outcome of [RestoreCommand::execute].
#[derive(Debug, Clone)]
pub struct RestoreResult {
    /// Nothing failed: resolution, install, compatibility and diagnostics.
    pub success: bool,
    /// Every graph, in resolution order.
    pub graphs: Vec<RestoreTargetGraph>,
    /// One result per graph.
    pub compatibility: Vec<CompatibilityCheckResult>,
    /// What installing did.
    pub install: InstallSummary,
    /// Built only when nothing failed.
    pub lock_file: Option<PackagesLockFile>,
}

/// Collaborators of a restore.
pub struct RestoreCommand<'a, P: ?Sized, I: ?Sized, C: ?Sized, H: ?Sized, L: ?Sized> {
    /// The project.
    pub project: &'a ProjectSpec,
    /// Finds libraries.
    pub provider: &'a P,
    /// Fetches packages.
    pub installer: &'a I,
    /// Reads installed package content.
    pub content: &'a C,
    /// Hashes packages for the lock file.
    pub hashes: &'a H,
    /// Receives user facing messages.
    pub logger: &'a L,
    /// Runtime graphs of packages, if any.
    pub runtime_source: Option<&'a dyn RuntimeGraphSource>,
    /// Configuration.
    pub options: RestoreOptions,
}

impl<'a, P, I, C, H, L> RestoreCommand<'a, P, I, C, H, L>
where
    P: LibraryProvider + ?Sized,
    I: PackageInstaller + ?Sized,
    C: PackageContentSource + ?Sized,
    H: ContentHashSource + ?Sized,
    L: RestoreLogger + ?Sized,
{
    /// Resolves the graphs, installs what they need, checks compatibility, logs the
    /// diagnostics and, when nothing failed, builds the lock file.
    pub fn execute(&self) -> Result<RestoreResult, RestoreError> {
        let mut resolver = DependencyGraphResolver::new(self.project, self.provider, self.logger, &self.options);
        if let Some(source) = self.runtime_source {
            resolver = resolver.with_runtime_graph_source(source);
        }
        let resolution = resolver.resolve()?;

        let install = install_packages(&resolution.graphs, self.installer, &self.options, self.logger)?;

        let checker = CompatibilityChecker::new(self.content, &self.options);
        let compatibility: Vec<CompatibilityCheckResult> = resolution
            .graphs
            .iter()
            .map(|graph| checker.check(graph))
            .collect();
        for result in &compatibility {
            result.log_issues(self.logger);
        }

        let graph_failed = log_graph_diagnostics(&resolution.graphs, self.logger, &self.options);
        let success = resolution.success
            && !graph_failed
            && install.is_success()
            && compatibility.iter().all(CompatibilityCheckResult::success);

        let lock_file = success.then(|| LockFileBuilder::build(self.project, &resolution.graphs, self.hashes));
        info!(
            "restore of {} {}",
            self.project.name,
            if success { "succeeded" } else { "failed" }
        );
        Ok(RestoreResult {
            success,
            graphs: resolution.graphs,
            compatibility,
            install,
            lock_file,
        })
    }
}
