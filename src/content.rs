// SPDX-License-Identifier: MPL-2.0

//! Package content and the folder conventions that pick assets out of it.
//!
//! A package is a list of file paths. Assets are chosen per group from the folder whose
//! framework is nearest to the target:
//!
//! | Folder | Group |
//! |---|---|
//! | `lib/{tfm}/` | runtime, and compile when there is no `ref/` match |
//! | `lib/{tfm}/{culture}/*.resources.dll` | resources |
//! | `ref/{tfm}/` | compile |
//! | `runtimes/{rid}/lib/{tfm}/` | runtime on that RID, preferred over `lib/` |
//! | `runtimes/{rid}/native/` | native |
//! | `build/[{tfm}/]` | build |
//! | `buildMultiTargeting/` | build for multi targeting consumers |
//! | `contentFiles/{lang}/{tfm}/` | content files |
//!
//! Files directly under `lib/` belong to .NET Framework at any version. The `_._`
//! placeholder counts as an asset: it marks a framework as supported without shipping a file.

use log::trace;
use restore_versioning::SemanticVersion;

use crate::framework::{Framework, FrameworkFamily};
use crate::library::LibraryIdentity;
use crate::runtime::RuntimeGraph;
use crate::type_aliases::Map;

/// File name standing for "supported, nothing to reference".
pub const PLACEHOLDER_FILE: &str = "_._";

/// A `<frameworkAssembly>` reference: an assembly of the framework itself.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FrameworkAssemblyReference {
    /// Assembly name.
    pub assembly_name: String,
    /// Frameworks the reference applies to, empty for all.
    pub frameworks: Vec<Framework>,
}

/// What a package contains.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PackageContent {
    /// Paths relative to the package root, with `/` or `\` separators.
    pub files: Vec<String>,
    /// Framework assembly references.
    pub framework_assemblies: Vec<FrameworkAssemblyReference>,
}

impl PackageContent {
    /// Content made of `files`.
    pub fn from_files<I, S>(files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            files: files.into_iter().map(Into::into).collect(),
            framework_assemblies: Vec::new(),
        }
    }

    /// Same content with a framework assembly reference.
    pub fn with_framework_assembly(mut self, assembly_name: impl Into<String>, frameworks: Vec<Framework>) -> Self {
        self.framework_assemblies.push(FrameworkAssemblyReference {
            assembly_name: assembly_name.into(),
            frameworks,
        });
        self
    }

    /// Whether anything lives under `lib/` or `ref/`.
    pub fn has_assemblies(&self) -> bool {
        self.files.iter().any(|file| {
            let file = normalize(file);
            file.starts_with("lib/") || file.starts_with("ref/")
        })
    }

    /// Framework assembly references applying to `framework`.
    pub fn framework_assemblies_for<'a>(&'a self, framework: &'a Framework) -> impl Iterator<Item = &'a str> {
        self.framework_assemblies
            .iter()
            .filter(move |reference| {
                reference.frameworks.is_empty()
                    || reference
                        .frameworks
                        .iter()
                        .any(|candidate| framework.is_compatible_with(candidate))
            })
            .map(|reference| reference.assembly_name.as_str())
    }
}

/// Where package content is read from, typically the extracted packages folder.
pub trait PackageContentSource: Send + Sync {
    /// Content of `package`, `None` if it is not available.
    fn content(&self, package: &LibraryIdentity) -> Option<PackageContent>;
}

impl<S: PackageContentSource + ?Sized> PackageContentSource for &S {
    fn content(&self, package: &LibraryIdentity) -> Option<PackageContent> {
        (**self).content(package)
    }
}

/// Content kept in memory, keyed by name ignoring case and version.
#[derive(Debug, Clone, Default)]
pub struct InMemoryContentSource {
    packages: Map<(String, SemanticVersion), PackageContent>,
}

impl InMemoryContentSource {
    /// Empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the content of a package.
    pub fn add(&mut self, name: &str, version: impl Into<SemanticVersion>, content: PackageContent) {
        self.packages.insert((name.to_lowercase(), version.into()), content);
    }
}

impl PackageContentSource for InMemoryContentSource {
    fn content(&self, package: &LibraryIdentity) -> Option<PackageContent> {
        self.packages
            .get(&(package.name.to_lowercase(), package.version.clone()))
            .cloned()
    }
}

/// Asset group of a content item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetGroup {
    /// `ref/{tfm}/`.
    Compile,
    /// `lib/{tfm}/`.
    Runtime,
    /// Satellite assemblies under `lib/{tfm}/{culture}/`.
    Resource,
    /// `runtimes/{rid}/lib/{tfm}/`.
    RuntimeSpecific,
    /// `runtimes/{rid}/native/`.
    Native,
    /// `build/`.
    Build,
    /// `buildMultiTargeting/`.
    BuildMultiTargeting,
    /// `contentFiles/{lang}/{tfm}/`.
    ContentFiles,
}

/// A file of a package, classified by the folder conventions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentItem {
    /// Normalized path.
    pub path: String,
    /// Group.
    pub group: AssetGroup,
    /// Framework of the folder. Groups without a framework folder use [Framework::any].
    pub framework: Framework,
    /// Runtime identifier for `runtimes/` items.
    pub runtime_identifier: Option<String>,
}

fn normalize(path: &str) -> String {
    path.replace('\\', "/")
}

fn is_assembly(file_name: &str) -> bool {
    let lower = file_name.to_lowercase();
    lower == PLACEHOLDER_FILE
        || lower.ends_with(".dll")
        || lower.ends_with(".exe")
        || lower.ends_with(".winmd")
}

fn is_msbuild(file_name: &str) -> bool {
    let lower = file_name.to_lowercase();
    lower == PLACEHOLDER_FILE || lower.ends_with(".props") || lower.ends_with(".targets")
}

fn legacy_lib_framework() -> Framework {
    Framework::new(FrameworkFamily::NetFramework, 0, 0)
}

/// Classifies a single path. Files no convention applies to are `None`.
pub fn classify(path: &str) -> Option<ContentItem> {
    let path = normalize(path);
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let file_name = *segments.last()?;
    let item = |group, framework, runtime_identifier: Option<&str>| ContentItem {
        path: path.clone(),
        group,
        framework,
        runtime_identifier: runtime_identifier.map(str::to_string),
    };
    let top = segments[0].to_lowercase();
    match (top.as_str(), segments.len()) {
        ("lib", 2) if is_assembly(file_name) => Some(item(AssetGroup::Runtime, legacy_lib_framework(), None)),
        ("lib", 3) if is_assembly(file_name) => {
            Some(item(AssetGroup::Runtime, segments[1].parse().ok()?, None))
        }
        ("lib", 4) if file_name.to_lowercase().ends_with(".resources.dll") => {
            Some(item(AssetGroup::Resource, segments[1].parse().ok()?, None))
        }
        ("ref", 3) if is_assembly(file_name) => {
            Some(item(AssetGroup::Compile, segments[1].parse().ok()?, None))
        }
        ("runtimes", 5) if segments[2].eq_ignore_ascii_case("lib") && is_assembly(file_name) => Some(item(
            AssetGroup::RuntimeSpecific,
            segments[3].parse().ok()?,
            Some(segments[1]),
        )),
        ("runtimes", n) if n >= 4 && segments[2].eq_ignore_ascii_case("native") => {
            Some(item(AssetGroup::Native, Framework::any(), Some(segments[1])))
        }
        ("build", 2) if is_msbuild(file_name) => Some(item(AssetGroup::Build, Framework::any(), None)),
        ("build", 3) if is_msbuild(file_name) => {
            Some(item(AssetGroup::Build, segments[1].parse().ok()?, None))
        }
        ("buildmultitargeting", 2) if is_msbuild(file_name) => {
            Some(item(AssetGroup::BuildMultiTargeting, Framework::any(), None))
        }
        ("contentfiles", n) if n >= 4 => Some(item(AssetGroup::ContentFiles, segments[2].parse().ok()?, None)),
        _ => None,
    }
}

/// Assets selected for one framework and runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectedAssets {
    /// Reference assemblies.
    pub compile: Vec<String>,
    /// Runtime assemblies.
    pub runtime: Vec<String>,
    /// Satellite assemblies.
    pub resources: Vec<String>,
    /// Native libraries.
    pub native: Vec<String>,
    /// MSBuild props and targets.
    pub build: Vec<String>,
    /// MSBuild files for multi targeting consumers.
    pub build_multi_targeting: Vec<String>,
    /// Content files.
    pub content_files: Vec<String>,
}

impl SelectedAssets {
    /// Whether any compile, runtime, build or content asset was found.
    pub fn has_any(&self) -> bool {
        !(self.compile.is_empty()
            && self.runtime.is_empty()
            && self.build.is_empty()
            && self.build_multi_targeting.is_empty()
            && self.content_files.is_empty())
    }
}

fn nearest_paths<'a, F>(items: &'a [ContentItem], framework: &Framework, filter: F) -> Vec<String>
where
    F: Fn(&ContentItem) -> bool,
{
    let candidates: Vec<&ContentItem> = items.iter().filter(|item| filter(item)).collect();
    let nearest = match framework.get_nearest(candidates.iter().map(|item| &item.framework)) {
        Some(nearest) => nearest.clone(),
        None => return Vec::new(),
    };
    candidates
        .into_iter()
        .filter(|item| item.framework == nearest)
        .map(|item| item.path.clone())
        .collect()
}

/// Items of `content` with a known convention.
pub fn content_items(content: &PackageContent) -> Vec<ContentItem> {
    content.files.iter().filter_map(|file| classify(file)).collect()
}

/// Picks assets of `content` for `framework`, and for `runtime_identifier` when given. RID
/// specific folders are searched along the RID's expansion in `runtime_graph`.
pub fn select_assets(
    content: &PackageContent,
    framework: &Framework,
    runtime_identifier: Option<&str>,
    runtime_graph: &RuntimeGraph,
) -> SelectedAssets {
    let items = content_items(content);
    let group = |group: AssetGroup| nearest_paths(&items, framework, |item| item.group == group);

    let mut runtime = group(AssetGroup::Runtime);
    let mut native = Vec::new();
    if let Some(rid) = runtime_identifier {
        for candidate in runtime_graph.expand_runtime(rid) {
            let specific = nearest_paths(&items, framework, |item| {
                item.group == AssetGroup::RuntimeSpecific
                    && item.runtime_identifier.as_deref() == Some(candidate.as_str())
            });
            if !specific.is_empty() {
                trace!("runtime assets of {} from {}", rid, candidate);
                runtime = specific;
                break;
            }
        }
        for candidate in runtime_graph.expand_runtime(rid) {
            native = nearest_paths(&items, framework, |item| {
                item.group == AssetGroup::Native && item.runtime_identifier.as_deref() == Some(candidate.as_str())
            });
            if !native.is_empty() {
                break;
            }
        }
    }

    let mut compile = group(AssetGroup::Compile);
    if compile.is_empty() {
        compile = group(AssetGroup::Runtime);
    }

    SelectedAssets {
        compile,
        runtime,
        resources: group(AssetGroup::Resource),
        native,
        build: group(AssetGroup::Build),
        build_multi_targeting: group(AssetGroup::BuildMultiTargeting),
        content_files: group(AssetGroup::ContentFiles),
    }
}

/// Frameworks `content` ships assets for in `lib/`, `ref/` and `contentFiles/`, sorted.
/// RID specific folders are left out.
pub fn available_frameworks(content: &PackageContent) -> Vec<Framework> {
    let mut frameworks: Vec<Framework> = content_items(content)
        .into_iter()
        .filter(|item| {
            matches!(
                item.group,
                AssetGroup::Runtime | AssetGroup::Compile | AssetGroup::ContentFiles
            )
        })
        .map(|item| item.framework)
        .collect();
    frameworks.sort();
    frameworks.dedup();
    frameworks
}

/// File name of an assembly path with a `.ni` infix removed, lowercased.
pub(crate) fn assembly_file_name(path: &str) -> String {
    let name = path.rsplit('/').next().unwrap_or(path).to_lowercase();
    match name.rsplit_once('.') {
        Some((stem, extension)) => match stem.strip_suffix(".ni") {
            Some(stem) => format!("{}.{}", stem, extension),
            None => name,
        },
        None => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fw(s: &str) -> Framework {
        s.parse().unwrap()
    }

    #[test]
    fn classification() {
        let item = classify("lib\\net6.0\\A.dll").unwrap();
        assert_eq!(item.group, AssetGroup::Runtime);
        assert_eq!(item.framework, fw("net6.0"));
        assert_eq!(classify("lib/net6.0/fr/A.resources.dll").unwrap().group, AssetGroup::Resource);
        assert_eq!(classify("lib/A.dll").unwrap().framework, legacy_lib_framework());
        let native = classify("runtimes/win-x64/native/a.so").unwrap();
        assert_eq!(native.runtime_identifier.as_deref(), Some("win-x64"));
        assert_eq!(classify("contentFiles/cs/any/a.cs").unwrap().framework, Framework::any());
        assert!(classify("lib/net6.0/A.xml").is_none());
        assert!(classify("readme.md").is_none());
    }

    #[test]
    fn nearest_folder_wins() {
        let content = PackageContent::from_files([
            "lib/netstandard2.0/A.dll",
            "lib/net6.0/A.dll",
            "lib/net472/A.dll",
            "ref/netstandard2.0/A.dll",
        ]);
        let graph = RuntimeGraph::new();
        let assets = select_assets(&content, &fw("net8.0"), None, &graph);
        assert_eq!(assets.runtime, vec!["lib/net6.0/A.dll"]);
        assert_eq!(assets.compile, vec!["ref/netstandard2.0/A.dll"]);

        let assets = select_assets(&content, &fw("net48"), None, &graph);
        assert_eq!(assets.runtime, vec!["lib/net472/A.dll"]);

        let assets = select_assets(&content, &fw("net45"), None, &graph);
        assert!(!assets.has_any());
        assert_eq!(
            available_frameworks(&content),
            vec![fw("netstandard2.0"), fw("net472"), fw("net6.0")]
        );
    }

    #[test]
    fn compile_falls_back_to_lib() {
        let content = PackageContent::from_files(["lib/net6.0/_._"]);
        let assets = select_assets(&content, &fw("net6.0"), None, &RuntimeGraph::new());
        assert_eq!(assets.compile, vec!["lib/net6.0/_._"]);
        assert!(assets.has_any());
    }

    #[test]
    fn runtime_specific_assets() {
        let content = PackageContent::from_files([
            "lib/netstandard2.0/A.dll",
            "runtimes/win/lib/net6.0/A.dll",
            "runtimes/win/native/a.dll",
        ]);
        let graph = RuntimeGraph::new().with_runtime("win-x64", ["win"]);
        let assets = select_assets(&content, &fw("net6.0"), Some("win-x64"), &graph);
        assert_eq!(assets.runtime, vec!["runtimes/win/lib/net6.0/A.dll"]);
        assert_eq!(assets.native, vec!["runtimes/win/native/a.dll"]);
        assert_eq!(assets.compile, vec!["lib/netstandard2.0/A.dll"]);

        let assets = select_assets(&content, &fw("net6.0"), Some("linux-x64"), &graph);
        assert_eq!(assets.runtime, vec!["lib/netstandard2.0/A.dll"]);
        assert!(assets.native.is_empty());
    }

    #[test]
    fn native_image_infix() {
        assert_eq!(assembly_file_name("runtimes/win/lib/net6.0/A.ni.dll"), "a.dll");
        assert_eq!(assembly_file_name("ref/net6.0/A.dll"), "a.dll");
    }
}
