// SPDX-License-Identifier: MPL-2.0

//! Lock files: the outcome of a restore, frozen so the next restore can be checked
//! against it.
//!
//! [LockFileBuilder] records every resolved package and project of the graphs.
//! [validate] decides whether a lock file still matches a project, and [is_still_valid]
//! compares two lock files while ignoring content hashes.

use log::debug;
use restore_versioning::{SemanticVersion, VersionRange};

use crate::framework::Framework;
use crate::graph::{GraphItem, RestoreTargetGraph};
use crate::library::{eq_ignore_case, LibraryDependencyTarget, LibraryIdentity, LibraryType};
use crate::project::ProjectSpec;
use crate::type_aliases::Set;

/// Format written when nothing is centrally pinned.
pub const LOCK_FILE_VERSION: u32 = 1;

/// Format written when central transitive pins are recorded, and the newest one understood.
pub const CENTRAL_LOCK_FILE_VERSION: u32 = 2;

/// Why a library is in the lock file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PackageDependencyType {
    /// Referenced by the project.
    Direct,
    /// Pulled in by another library.
    Transitive,
    /// A project reference, direct or not.
    Project,
    /// Pinned by a central package version.
    CentralTransitive,
}

/// A dependency of a locked library.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LockFileDependencyRange {
    /// Name.
    pub id: String,
    /// Range requested.
    pub version_range: VersionRange,
}

/// One locked library.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LockFileDependency {
    /// Name.
    pub id: String,
    /// Why it is here.
    pub dependency_type: PackageDependencyType,
    /// Range the project asked for: direct references, central pins and direct project
    /// references carry one.
    pub requested: Option<VersionRange>,
    /// Version chosen, absent for projects.
    pub resolved: Option<SemanticVersion>,
    /// Hash of the package archive.
    pub content_hash: Option<String>,
    /// Its own dependencies, sorted by id.
    pub dependencies: Vec<LockFileDependencyRange>,
}

/// The locked libraries of one framework and runtime pair.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LockFileTarget {
    /// Framework.
    pub framework: Framework,
    /// Runtime identifier.
    pub runtime_identifier: Option<String>,
    /// Libraries sorted by id, ignoring case.
    pub dependencies: Vec<LockFileDependency>,
}

impl LockFileTarget {
    /// `net6.0` or `net6.0/win-x64`.
    pub fn name(&self) -> String {
        match &self.runtime_identifier {
            Some(rid) => format!("{}/{}", self.framework, rid),
            None => self.framework.to_string(),
        }
    }

    /// Entry for `id`, ignoring case.
    pub fn dependency(&self, id: &str) -> Option<&LockFileDependency> {
        self.dependencies
            .iter()
            .find(|dependency| eq_ignore_case(&dependency.id, id))
    }
}

/// A lock file.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PackagesLockFile {
    /// Format version.
    pub version: u32,
    /// One target per graph.
    pub targets: Vec<LockFileTarget>,
}

impl PackagesLockFile {
    /// Target for `framework` and `runtime_identifier`.
    pub fn target(&self, framework: &Framework, runtime_identifier: Option<&str>) -> Option<&LockFileTarget> {
        self.targets.iter().find(|target| {
            &target.framework == framework && target.runtime_identifier.as_deref() == runtime_identifier
        })
    }
}

/// Source of package content hashes.
pub trait ContentHashSource {
    /// Hash of `package`, if known.
    fn content_hash(&self, package: &LibraryIdentity) -> Option<String>;
}

/// Leaves every hash out.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoContentHash;

impl ContentHashSource for NoContentHash {
    fn content_hash(&self, _package: &LibraryIdentity) -> Option<String> {
        None
    }
}

impl<F> ContentHashSource for F
where
    F: Fn(&LibraryIdentity) -> Option<String>,
{
    fn content_hash(&self, package: &LibraryIdentity) -> Option<String> {
        self(package)
    }
}

/// Builds lock files from resolved graphs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LockFileBuilder;

impl LockFileBuilder {
    /// Locks every resolved library of `graphs`.
    ///
    /// Runtime targets only list what is missing from, or different in, the ridless target
    /// of the same framework. Unresolved libraries are left out.
    pub fn build<H: ContentHashSource + ?Sized>(
        project: &ProjectSpec,
        graphs: &[RestoreTargetGraph],
        hash_source: &H,
    ) -> PackagesLockFile {
        let mut targets: Vec<LockFileTarget> = graphs
            .iter()
            .map(|graph| lock_target(project, graph, hash_source))
            .collect();

        let ridless: Vec<LockFileTarget> = targets
            .iter()
            .filter(|target| target.runtime_identifier.is_none())
            .cloned()
            .collect();
        for target in targets.iter_mut().filter(|target| target.runtime_identifier.is_some()) {
            if let Some(base) = ridless.iter().find(|base| base.framework == target.framework) {
                target
                    .dependencies
                    .retain(|dependency| base.dependency(&dependency.id) != Some(dependency));
            }
        }

        let central = targets.iter().any(|target| {
            target
                .dependencies
                .iter()
                .any(|dependency| dependency.dependency_type == PackageDependencyType::CentralTransitive)
        });
        debug!("locked {} targets of {}", targets.len(), project.name);
        PackagesLockFile {
            version: if central {
                CENTRAL_LOCK_FILE_VERSION
            } else {
                LOCK_FILE_VERSION
            },
            targets,
        }
    }
}

fn lock_target<H: ContentHashSource + ?Sized>(
    project: &ProjectSpec,
    graph: &RestoreTargetGraph,
    hash_source: &H,
) -> LockFileTarget {
    let information = project.framework_information(graph.framework());
    let root = graph
        .root()
        .and_then(|root| graph.node(root).identity())
        .cloned();
    let mut dependencies: Vec<LockFileDependency> = graph
        .flattened()
        .iter()
        .filter(|item| Some(&item.key) != root.as_ref())
        .filter(|item| item.key.library_type != LibraryType::Unresolved)
        .filter_map(|item| {
            let direct = information.and_then(|information| {
                information
                    .dependencies
                    .iter()
                    .find(|dependency| eq_ignore_case(dependency.name(), &item.key.name))
            });
            let central = information.and_then(|information| {
                information
                    .central_package_versions
                    .iter()
                    .find(|central| eq_ignore_case(&central.name, &item.key.name))
            });
            let (dependency_type, requested) = match item.key.library_type {
                LibraryType::Project | LibraryType::ExternalProject => (
                    PackageDependencyType::Project,
                    direct.and_then(|dependency| dependency.effective_range().cloned()),
                ),
                LibraryType::Package => match (direct, central) {
                    (Some(dependency), _) => (
                        PackageDependencyType::Direct,
                        dependency.effective_range().cloned(),
                    ),
                    (None, Some(central)) if item.is_central_transitive => (
                        PackageDependencyType::CentralTransitive,
                        Some(central.version_range.clone()),
                    ),
                    (None, _) => (PackageDependencyType::Transitive, None),
                },
                _ => return None,
            };
            Some(lock_dependency(item, dependency_type, requested, hash_source))
        })
        .collect();
    dependencies.sort_by(|a, b| a.id.to_lowercase().cmp(&b.id.to_lowercase()));
    LockFileTarget {
        framework: graph.framework().clone(),
        runtime_identifier: graph.runtime_identifier().map(str::to_string),
        dependencies,
    }
}

fn lock_dependency<H: ContentHashSource + ?Sized>(
    item: &GraphItem,
    dependency_type: PackageDependencyType,
    requested: Option<VersionRange>,
    hash_source: &H,
) -> LockFileDependency {
    let is_package = item.key.library_type == LibraryType::Package;
    let mut dependencies: Vec<LockFileDependencyRange> = item
        .dependencies()
        .iter()
        .map(|dependency| LockFileDependencyRange {
            id: dependency.name().to_string(),
            version_range: dependency.effective_range().cloned().unwrap_or_else(VersionRange::all),
        })
        .collect();
    dependencies.sort_by(|a, b| a.id.to_lowercase().cmp(&b.id.to_lowercase()));
    LockFileDependency {
        id: item.key.name.clone(),
        dependency_type,
        requested,
        resolved: is_package.then(|| item.key.version.clone()),
        content_hash: if is_package {
            hash_source.content_hash(&item.key)
        } else {
            None
        },
        dependencies,
    }
}

/// Whether a lock file still matches a project, and why not.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockFileValidity {
    /// Why the lock file is out of date. Empty when it is valid.
    pub reasons: Vec<String>,
}

impl LockFileValidity {
    /// Whether nothing invalidates the lock file.
    pub fn is_valid(&self) -> bool {
        self.reasons.is_empty()
    }
}

fn name_set<'a>(names: impl Iterator<Item = &'a str>) -> Set<String> {
    names.map(str::to_lowercase).collect()
}

/// Checks `lock` against the declarations of `project`.
pub fn validate(project: &ProjectSpec, lock: &PackagesLockFile) -> LockFileValidity {
    let mut reasons = Vec::new();
    if lock.version > CENTRAL_LOCK_FILE_VERSION {
        reasons.push(format!(
            "The lock file version {} is not supported, the newest supported version is {}.",
            lock.version, CENTRAL_LOCK_FILE_VERSION
        ));
        return LockFileValidity { reasons };
    }

    let locked_frameworks: Set<&Framework> = lock
        .targets
        .iter()
        .filter(|target| target.runtime_identifier.is_none())
        .map(|target| &target.framework)
        .collect();
    let frameworks: Set<&Framework> = project.frameworks().collect();
    if locked_frameworks != frameworks {
        reasons.push("The project target frameworks are different from the lock file's.".to_string());
    }

    let locked_rids = name_set(lock.targets.iter().filter_map(|target| target.runtime_identifier.as_deref()));
    let rids = name_set(project.runtime_identifiers.iter().map(String::as_str));
    if locked_rids != rids {
        reasons.push("The project runtime identifiers are different from the lock file's.".to_string());
    }

    for information in &project.target_frameworks {
        let target = match lock.target(&information.framework, None) {
            Some(target) => target,
            None => continue,
        };
        let framework = &information.framework;

        for dependency in &information.dependencies {
            let allows_package = dependency
                .library_range
                .type_constraint_allows(LibraryDependencyTarget::PACKAGE);
            let locked = target.dependency(dependency.name());
            match locked {
                None if allows_package => reasons.push(format!(
                    "A new package reference was found for {} on {}.",
                    dependency.name(),
                    framework
                )),
                None => reasons.push(format!(
                    "A new project reference to {} was found for {}.",
                    dependency.name(),
                    framework
                )),
                Some(locked) if locked.dependency_type == PackageDependencyType::Direct => {
                    if locked.requested.as_ref() != dependency.effective_range() {
                        reasons.push(format!(
                            "The package reference {} version has changed on {}.",
                            dependency.name(),
                            framework
                        ));
                    }
                }
                Some(locked) if locked.dependency_type == PackageDependencyType::Project => {}
                Some(_) => reasons.push(format!(
                    "A new package reference was found for {} on {}.",
                    dependency.name(),
                    framework
                )),
            }
        }

        let declared = name_set(information.dependencies.iter().map(|dependency| dependency.name()));
        for locked in &target.dependencies {
            let is_declared = declared.contains(&locked.id.to_lowercase());
            match locked.dependency_type {
                PackageDependencyType::Direct if !is_declared => reasons.push(format!(
                    "The package reference {} was removed on {}.",
                    locked.id, framework
                )),
                PackageDependencyType::Project if locked.requested.is_some() && !is_declared => reasons.push(format!(
                    "The project reference to {} was removed on {}.",
                    locked.id, framework
                )),
                PackageDependencyType::CentralTransitive => {
                    let pin = information
                        .central_package_versions
                        .iter()
                        .find(|central| eq_ignore_case(&central.name, &locked.id));
                    if pin.map(|pin| &pin.version_range) != locked.requested.as_ref() {
                        reasons.push(format!(
                            "The central package version of {} has changed on {}.",
                            locked.id, framework
                        ));
                    }
                }
                _ => {}
            }
        }
    }

    LockFileValidity { reasons }
}

/// Whether `actual` locks the same libraries as `expected`, content hashes aside.
pub fn is_still_valid(expected: &PackagesLockFile, actual: &PackagesLockFile) -> bool {
    fn without_hashes(lock: &PackagesLockFile) -> PackagesLockFile {
        let mut lock = lock.clone();
        for dependency in lock.targets.iter_mut().flat_map(|target| target.dependencies.iter_mut()) {
            dependency.content_hash = None;
        }
        lock
    }
    without_hashes(expected) == without_hashes(actual)
}
