// SPDX-License-Identifier: MPL-2.0

//! Where libraries come from.
//!
//! The resolver asks a [LibraryProvider] for the best library matching a [LibraryRange] on a
//! given framework and runtime. Feeds, the local packages folder and the projects of the
//! build all sit behind this trait. [OfflineLibraryProvider] keeps everything in memory and
//! is what tests and benches use; wrap any provider in
//! [CachingLibraryProvider](crate::cache::CachingLibraryProvider) to share lookups between
//! graphs.

use std::collections::BTreeMap;
use std::error::Error;

use restore_versioning::{SemanticVersion, VersionRange};

use crate::framework::Framework;
use crate::library::{
    LibraryDependency, LibraryDependencyTarget, LibraryIdentity, LibraryRange, LibraryType,
};
use crate::type_aliases::Map;

/// Error a provider reports when it cannot answer at all, as opposed to finding nothing.
pub type ProviderError = Box<dyn Error + Send + Sync>;

/// Where a library was found.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MatchSource {
    /// Already on disk: a project, or a package in the local packages folder.
    Local,
    /// On the named remote feed; needs installing.
    Remote(String),
}

/// A concrete library and where it was found.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RemoteMatch {
    /// The library.
    pub library: LibraryIdentity,
    /// Its origin.
    pub source: MatchSource,
}

impl RemoteMatch {
    /// Whether the library must be downloaded before use.
    pub fn is_remote(&self) -> bool {
        matches!(self.source, MatchSource::Remote(_))
    }
}

/// Framework information of a resolved project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectDetails {
    /// Framework of the project chosen for the consuming graph, or the unsupported sentinel.
    pub resolved_framework: Option<Framework>,
    /// Frameworks the project targets.
    pub frameworks: Vec<Framework>,
}

/// What a provider returns for a range: the chosen library and its dependencies for the
/// requested framework.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLibrary {
    /// The library chosen.
    pub matched: RemoteMatch,
    /// Its dependencies on the requested framework.
    pub dependencies: Vec<LibraryDependency>,
    /// Present for projects.
    pub project: Option<ProjectDetails>,
}

impl ResolvedLibrary {
    /// A package found on `source`.
    pub fn package(
        name: impl Into<String>,
        version: SemanticVersion,
        source: MatchSource,
        dependencies: Vec<LibraryDependency>,
    ) -> Self {
        Self {
            matched: RemoteMatch {
                library: LibraryIdentity::new(name, version, LibraryType::Package),
                source,
            },
            dependencies,
            project: None,
        }
    }

    /// Placeholder for a request nothing satisfied. Its version is the requested minimum.
    pub fn unresolved(range: &LibraryRange) -> Self {
        let version = range
            .version_range
            .as_ref()
            .and_then(VersionRange::min_version)
            .cloned()
            .unwrap_or_else(SemanticVersion::zero);
        Self {
            matched: RemoteMatch {
                library: LibraryIdentity::new(range.name.clone(), version, LibraryType::Unresolved),
                source: MatchSource::Local,
            },
            dependencies: Vec::new(),
            project: None,
        }
    }

    /// The library chosen.
    pub fn identity(&self) -> &LibraryIdentity {
        &self.matched.library
    }

    /// Kind of the library chosen.
    pub fn library_type(&self) -> LibraryType {
        self.matched.library.library_type
    }

    /// Whether this is an unresolved placeholder.
    pub fn is_unresolved(&self) -> bool {
        self.library_type() == LibraryType::Unresolved
    }
}

/// Trait that allows the resolver to find libraries and their dependencies.
///
/// Implementations are shared between graphs resolved in parallel, hence `Send + Sync`.
pub trait LibraryProvider: Send + Sync {
    /// The best library for `range` on `framework` and `runtime_identifier`.
    ///
    /// `Ok(None)` means nothing matches; the library ends up unresolved and the rest of the
    /// graph is still computed. An `Err` is a fault that aborts the whole graph.
    fn find_library(
        &self,
        range: &LibraryRange,
        framework: &Framework,
        runtime_identifier: Option<&str>,
    ) -> Result<Option<ResolvedLibrary>, ProviderError>;

    /// This is called once per visited dependency,
    /// if it returns an Err then resolution will be terminated.
    /// If not provided the resolver will run as long as needed.
    fn should_cancel(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}

impl<P: LibraryProvider + ?Sized> LibraryProvider for &P {
    fn find_library(
        &self,
        range: &LibraryRange,
        framework: &Framework,
        runtime_identifier: Option<&str>,
    ) -> Result<Option<ResolvedLibrary>, ProviderError> {
        (**self).find_library(range, framework, runtime_identifier)
    }

    fn should_cancel(&self) -> Result<(), ProviderError> {
        (**self).should_cancel()
    }
}

type DependencyGroups = Vec<(Framework, Vec<LibraryDependency>)>;

#[derive(Debug, Clone)]
struct PackageEntry {
    name: String,
    source: MatchSource,
    groups: DependencyGroups,
}

#[derive(Debug, Clone)]
struct ProjectEntry {
    name: String,
    version: SemanticVersion,
    external: bool,
    groups: DependencyGroups,
}

fn nearest_group<'a>(
    framework: &Framework,
    groups: &'a DependencyGroups,
) -> Option<&'a (Framework, Vec<LibraryDependency>)> {
    let nearest = framework.get_nearest(groups.iter().map(|(group, _)| group))?;
    groups.iter().find(|(group, _)| group == nearest)
}

/// A basic implementation of [LibraryProvider] that keeps every package and project in memory.
#[derive(Debug, Clone, Default)]
pub struct OfflineLibraryProvider {
    packages: Map<String, BTreeMap<SemanticVersion, PackageEntry>>,
    projects: Map<String, ProjectEntry>,
}

impl OfflineLibraryProvider {
    /// Creates an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a package available on a remote feed, with dependencies for every framework.
    /// Registering the same package and version again replaces it.
    pub fn add_package<I>(&mut self, name: &str, version: impl Into<SemanticVersion>, dependencies: I)
    where
        I: IntoIterator<Item = LibraryDependency>,
    {
        self.add_package_groups(
            name,
            version,
            MatchSource::Remote("offline".to_string()),
            vec![(Framework::any(), dependencies.into_iter().collect())],
        );
    }

    /// Registers a package already present in the local packages folder.
    pub fn add_local_package<I>(&mut self, name: &str, version: impl Into<SemanticVersion>, dependencies: I)
    where
        I: IntoIterator<Item = LibraryDependency>,
    {
        self.add_package_groups(
            name,
            version,
            MatchSource::Local,
            vec![(Framework::any(), dependencies.into_iter().collect())],
        );
    }

    /// Registers a package with per-framework dependency groups. The group nearest to the
    /// requested framework applies; with no compatible group the package has no dependencies.
    pub fn add_package_groups(
        &mut self,
        name: &str,
        version: impl Into<SemanticVersion>,
        source: MatchSource,
        groups: Vec<(Framework, Vec<LibraryDependency>)>,
    ) {
        self.packages.entry(name.to_lowercase()).or_default().insert(
            version.into(),
            PackageEntry {
                name: name.to_string(),
                source,
                groups,
            },
        );
    }

    /// Registers a project of the build targeting the given frameworks.
    pub fn add_project(
        &mut self,
        name: &str,
        version: impl Into<SemanticVersion>,
        frameworks: Vec<(Framework, Vec<LibraryDependency>)>,
    ) {
        self.projects.insert(
            name.to_lowercase(),
            ProjectEntry {
                name: name.to_string(),
                version: version.into(),
                external: false,
                groups: frameworks,
            },
        );
    }

    /// Registers a project known only by its dependencies.
    pub fn add_external_project<I>(&mut self, name: &str, version: impl Into<SemanticVersion>, dependencies: I)
    where
        I: IntoIterator<Item = LibraryDependency>,
    {
        self.projects.insert(
            name.to_lowercase(),
            ProjectEntry {
                name: name.to_string(),
                version: version.into(),
                external: true,
                groups: vec![(Framework::any(), dependencies.into_iter().collect())],
            },
        );
    }

    /// Names of registered packages, lowercased.
    pub fn packages(&self) -> impl Iterator<Item = &String> {
        self.packages.keys()
    }

    /// Versions of a registered package, lowest first.
    pub fn versions(&self, name: &str) -> impl Iterator<Item = &SemanticVersion> {
        self.packages
            .get(&name.to_lowercase())
            .into_iter()
            .flat_map(BTreeMap::keys)
    }

    fn find_project(&self, range: &LibraryRange, framework: &Framework) -> Option<ResolvedLibrary> {
        let project = self.projects.get(&range.name.to_lowercase())?;
        let library_type = if project.external {
            LibraryType::ExternalProject
        } else {
            LibraryType::Project
        };
        if !range.type_constraint.allows(library_type) {
            return None;
        }
        let nearest = nearest_group(framework, &project.groups);
        let details = (!project.external).then(|| ProjectDetails {
            resolved_framework: Some(
                nearest
                    .map(|(group, _)| group.clone())
                    .unwrap_or_else(Framework::unsupported),
            ),
            frameworks: project.groups.iter().map(|(group, _)| group.clone()).collect(),
        });
        Some(ResolvedLibrary {
            matched: RemoteMatch {
                library: LibraryIdentity::new(
                    project.name.clone(),
                    project.version.clone(),
                    library_type,
                ),
                source: MatchSource::Local,
            },
            dependencies: nearest.map(|(_, deps)| deps.clone()).unwrap_or_default(),
            project: details,
        })
    }

    fn find_package(&self, range: &LibraryRange, framework: &Framework) -> Option<ResolvedLibrary> {
        let versions = self.packages.get(&range.name.to_lowercase())?;
        let all = VersionRange::all();
        let version_range = range.version_range.as_ref().unwrap_or(&all);
        let best = version_range.find_best_match(versions.keys())?;
        let entry = &versions[best];
        let dependencies = nearest_group(framework, &entry.groups)
            .map(|(_, deps)| deps.clone())
            .unwrap_or_default();
        Some(ResolvedLibrary::package(
            entry.name.clone(),
            best.clone(),
            entry.source.clone(),
            dependencies,
        ))
    }
}

/// Projects answer requests that allow projects; packages answer the rest. Versions are
/// matched with [VersionRange::find_best_match].
impl LibraryProvider for OfflineLibraryProvider {
    fn find_library(
        &self,
        range: &LibraryRange,
        framework: &Framework,
        _runtime_identifier: Option<&str>,
    ) -> Result<Option<ResolvedLibrary>, ProviderError> {
        let project_kinds =
            LibraryDependencyTarget::PROJECT | LibraryDependencyTarget::EXTERNAL_PROJECT;
        if range.type_constraint.intersects(project_kinds) {
            if let Some(project) = self.find_project(range, framework) {
                return Ok(Some(project));
            }
        }
        if range.type_constraint_allows(LibraryDependencyTarget::PACKAGE) {
            return Ok(self.find_package(range, framework));
        }
        Ok(None)
    }
}
