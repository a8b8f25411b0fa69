// SPDX-License-Identifier: MPL-2.0

//! Fetching the packages a restore chose.

use log::{debug, warn};
use rayon::prelude::*;

use crate::error::RestoreError;
use crate::graph::RestoreTargetGraph;
use crate::logging::{RestoreLogCode, RestoreLogMessage, RestoreLogger};
use crate::options::RestoreOptions;
use crate::provider::{ProviderError, RemoteMatch};

/// Downloads and extracts packages. Called concurrently, hence `Send + Sync`.
pub trait PackageInstaller: Send + Sync {
    /// Installs `package`. Returns whether anything was installed, `false` when it was
    /// already present.
    fn install(&self, package: &RemoteMatch) -> Result<bool, ProviderError>;
}

impl<I: PackageInstaller + ?Sized> PackageInstaller for &I {
    fn install(&self, package: &RemoteMatch) -> Result<bool, ProviderError> {
        (**self).install(package)
    }
}

/// What installing did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallSummary {
    /// Newly installed.
    pub installed: Vec<RemoteMatch>,
    /// Already there.
    pub already_installed: Vec<RemoteMatch>,
    /// Failed; each failure was logged.
    pub failed: Vec<RemoteMatch>,
}

impl InstallSummary {
    /// Whether every package is available.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Installs the union of the install sets of `graphs`, each package once, at most
/// `max_parallel_installs` at a time.
///
/// Failures of single packages are logged as `NU1403` and reported in the summary; only a
/// pool that cannot start is an error.
pub fn install_packages<I, L>(
    graphs: &[RestoreTargetGraph],
    installer: &I,
    options: &RestoreOptions,
    logger: &L,
) -> Result<InstallSummary, RestoreError>
where
    I: PackageInstaller + ?Sized,
    L: RestoreLogger + ?Sized,
{
    let mut packages: Vec<RemoteMatch> = graphs
        .iter()
        .flat_map(|graph| graph.install().iter().cloned())
        .collect();
    packages.sort();
    packages.dedup();
    if packages.is_empty() {
        return Ok(InstallSummary::default());
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.max_parallel_installs.max(1))
        .build()?;
    debug!("installing {} packages", packages.len());
    let results: Vec<(RemoteMatch, Result<bool, ProviderError>)> = pool.install(|| {
        packages
            .into_par_iter()
            .map(|package| {
                let result = installer.install(&package);
                (package, result)
            })
            .collect()
    });

    let mut summary = InstallSummary::default();
    for (package, result) in results {
        match result {
            Ok(true) => summary.installed.push(package),
            Ok(false) => summary.already_installed.push(package),
            Err(source) => {
                let error = RestoreError::InstallFault {
                    library: package.library.to_string(),
                    source,
                };
                warn!("{}", error);
                logger.log(
                    RestoreLogMessage::error(RestoreLogCode::InstallFault, install_fault_text(&error))
                        .with_library(package.library.name.clone()),
                );
                summary.failed.push(package);
            }
        }
    }
    Ok(summary)
}

fn install_fault_text(error: &RestoreError) -> String {
    match error {
        RestoreError::InstallFault { source, .. } => format!("{}: {}", error, source),
        _ => error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::{LibraryDependency, LibraryIdentity, LibraryType};
    use crate::logging::CollectingLogger;
    use crate::project::{ProjectSpec, TargetFrameworkInformation};
    use crate::provider::{MatchSource, OfflineLibraryProvider};
    use crate::restore::DependencyGraphResolver;
    use parking_lot::Mutex;
    use restore_versioning::SemanticVersion;

    #[derive(Default)]
    struct Recording {
        seen: Mutex<Vec<String>>,
    }

    impl PackageInstaller for Recording {
        fn install(&self, package: &RemoteMatch) -> Result<bool, ProviderError> {
            self.seen.lock().push(package.library.name.clone());
            match package.library.name.as_str() {
                "Broken" => Err("checksum mismatch".into()),
                "Cached" => Ok(false),
                _ => Ok(true),
            }
        }
    }

    fn remote(name: &str) -> RemoteMatch {
        RemoteMatch {
            library: LibraryIdentity::new(name, SemanticVersion::new(1, 0, 0), LibraryType::Package),
            source: MatchSource::Remote("offline".to_string()),
        }
    }

    #[test]
    fn failures_are_logged_and_summarized() {
        let names = ["Fresh", "Cached", "Broken"];
        let mut provider = OfflineLibraryProvider::new();
        let mut information = TargetFrameworkInformation::new("net6.0".parse().unwrap());
        for name in names {
            provider.add_package(name, (1, 0, 0), []);
            information = information.with_dependency(LibraryDependency::package(name, "1.0".parse().unwrap()));
        }
        let project = ProjectSpec::new("App", (1, 0, 0))
            .with_framework(information)
            .with_runtime_identifier("linux-x64");
        let (logger, options) = (CollectingLogger::new(), RestoreOptions::default());
        let graphs = DependencyGraphResolver::new(&project, &provider, &logger, &options)
            .resolve()
            .unwrap()
            .graphs;
        assert_eq!(graphs.len(), 2);

        let installer = Recording::default();
        let summary = install_packages(&graphs, &installer, &options, &logger).unwrap();
        assert_eq!(installer.seen.lock().len(), 3);
        assert_eq!(summary.installed, vec![remote("Fresh")]);
        assert_eq!(summary.already_installed, vec![remote("Cached")]);
        assert_eq!(summary.failed, vec![remote("Broken")]);
        assert!(!summary.is_success());
        assert_eq!(logger.with_code(RestoreLogCode::InstallFault).len(), 1);
    }
}
