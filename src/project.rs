// SPDX-License-Identifier: MPL-2.0

//! The project being restored.

use restore_versioning::{SemanticVersion, VersionRange};

use crate::framework::Framework;
use crate::library::{
    LibraryDependency, LibraryDependencyTarget, LibraryIdentity, LibraryRange, LibraryType,
};
use crate::provider::{MatchSource, ProjectDetails, RemoteMatch, ResolvedLibrary};
use crate::runtime::{CompatibilityProfile, RuntimeGraph};

/// A version every package of a name is pinned to, declared once for the whole project.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CentralPackageVersion {
    /// Package name.
    pub name: String,
    /// Pinned range.
    pub version_range: VersionRange,
}

/// What the project declares for one target framework.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TargetFrameworkInformation {
    /// The framework.
    pub framework: Framework,
    /// Direct package and project references.
    pub dependencies: Vec<LibraryDependency>,
    /// Centrally managed versions.
    pub central_package_versions: Vec<CentralPackageVersion>,
}

impl TargetFrameworkInformation {
    /// A framework with no references yet.
    pub fn new(framework: Framework) -> Self {
        Self {
            framework,
            dependencies: Vec::new(),
            central_package_versions: Vec::new(),
        }
    }

    /// Adds a direct reference.
    pub fn with_dependency(mut self, dependency: LibraryDependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    /// Adds a central version for `name`.
    pub fn with_central_version(mut self, name: impl Into<String>, version_range: VersionRange) -> Self {
        self.central_package_versions.push(CentralPackageVersion {
            name: name.into(),
            version_range,
        });
        self
    }
}

/// The root of every graph: a project with its per-framework references, runtime
/// identifiers and compatibility profiles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectSpec {
    /// Project name.
    pub name: String,
    /// Project version.
    pub version: SemanticVersion,
    /// One entry per target framework, in declaration order.
    pub target_frameworks: Vec<TargetFrameworkInformation>,
    /// Runtime identifiers restored for every framework.
    pub runtime_identifiers: Vec<String>,
    /// Compatibility profiles restored on top.
    pub supports: Vec<CompatibilityProfile>,
    /// Runtime graph declared by the project itself.
    pub runtime_graph: RuntimeGraph,
}

impl ProjectSpec {
    /// A project with no frameworks.
    pub fn new(name: impl Into<String>, version: impl Into<SemanticVersion>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            target_frameworks: Vec::new(),
            runtime_identifiers: Vec::new(),
            supports: Vec::new(),
            runtime_graph: RuntimeGraph::new(),
        }
    }

    /// Adds a target framework.
    pub fn with_framework(mut self, information: TargetFrameworkInformation) -> Self {
        self.target_frameworks.push(information);
        self
    }

    /// Adds a runtime identifier.
    pub fn with_runtime_identifier(mut self, runtime_identifier: impl Into<String>) -> Self {
        self.runtime_identifiers.push(runtime_identifier.into());
        self
    }

    /// Adds a compatibility profile.
    pub fn with_supports(mut self, profile: CompatibilityProfile) -> Self {
        self.supports.push(profile);
        self
    }

    /// Replaces the project's own runtime graph.
    pub fn with_runtime_graph(mut self, runtime_graph: RuntimeGraph) -> Self {
        self.runtime_graph = runtime_graph;
        self
    }

    /// Declarations for `framework`, if the project targets it.
    pub fn framework_information(&self, framework: &Framework) -> Option<&TargetFrameworkInformation> {
        self.target_frameworks
            .iter()
            .find(|information| &information.framework == framework)
    }

    /// Frameworks the project targets.
    pub fn frameworks(&self) -> impl Iterator<Item = &Framework> {
        self.target_frameworks
            .iter()
            .map(|information| &information.framework)
    }

    /// The request the project stands for at the top of its graphs.
    pub fn root_range(&self) -> LibraryRange {
        LibraryRange::new(
            self.name.clone(),
            Some(VersionRange::exact(self.version.clone())),
            LibraryDependencyTarget::PROJECT | LibraryDependencyTarget::EXTERNAL_PROJECT,
        )
    }

    /// The project as a resolved library for `framework`. Frameworks the project does not
    /// target resolve to the unsupported sentinel with no dependencies.
    pub(crate) fn root_library(&self, framework: &Framework) -> ResolvedLibrary {
        let information = self.framework_information(framework);
        ResolvedLibrary {
            matched: RemoteMatch {
                library: LibraryIdentity::new(
                    self.name.clone(),
                    self.version.clone(),
                    LibraryType::Project,
                ),
                source: MatchSource::Local,
            },
            dependencies: information
                .map(|information| information.dependencies.clone())
                .unwrap_or_default(),
            project: Some(ProjectDetails {
                resolved_framework: Some(
                    information
                        .map(|information| information.framework.clone())
                        .unwrap_or_else(Framework::unsupported),
                ),
                frameworks: self.frameworks().cloned().collect(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_library_follows_framework() {
        let net6: Framework = "net6.0".parse().unwrap();
        let project = ProjectSpec::new("App", (1, 0, 0)).with_framework(
            TargetFrameworkInformation::new(net6.clone())
                .with_dependency(LibraryDependency::package("A", "1.0".parse().unwrap())),
        );

        let root = project.root_library(&net6);
        assert_eq!(root.identity().library_type, LibraryType::Project);
        assert_eq!(root.dependencies.len(), 1);

        let other = project.root_library(&"net472".parse().unwrap());
        assert!(other.dependencies.is_empty());
        let details = other.project.unwrap();
        assert!(details.resolved_framework.unwrap().is_unsupported());
        assert_eq!(details.frameworks, vec![net6]);
    }
}
