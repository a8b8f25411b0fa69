// SPDX-License-Identifier: MPL-2.0

//! Libraries as the resolver sees them: what is requested ([LibraryRange]), along which edge
//! ([LibraryDependency]), and what was found ([LibraryIdentity]).

use std::cmp::Ordering;
use std::fmt::{self, Debug, Display};
use std::hash::{Hash, Hasher};
use std::ops::{BitAnd, BitOr, BitOrAssign, Not};

use restore_versioning::{SemanticVersion, VersionRange};

/// Ordinal comparison ignoring case, used for every library name.
pub(crate) fn cmp_ignore_case(left: &str, right: &str) -> Ordering {
    left.chars()
        .flat_map(char::to_lowercase)
        .cmp(right.chars().flat_map(char::to_lowercase))
}

/// Library names are compared ignoring case.
pub(crate) fn eq_ignore_case(left: &str, right: &str) -> bool {
    cmp_ignore_case(left, right).is_eq()
}

macro_rules! flag_set {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$flag_meta:meta])* $flag:ident = $value:expr, )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[cfg_attr(feature = "serde", serde(transparent))]
        pub struct $name(u16);

        impl $name {
            /// No flag set.
            pub const NONE: Self = Self(0);
            $( $(#[$flag_meta])* pub const $flag: Self = Self($value); )*

            const NAMED: &'static [(&'static str, Self)] = &[$( (stringify!($flag), Self::$flag), )*];

            /// Raw bits.
            pub fn bits(self) -> u16 {
                self.0
            }

            /// Whether every flag of `other` is set.
            pub fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }

            /// Whether any flag of `other` is set.
            pub fn intersects(self, other: Self) -> bool {
                self.0 & other.0 != 0
            }

            /// Whether no flag is set.
            pub fn is_empty(self) -> bool {
                self.0 == 0
            }
        }

        impl BitOr for $name {
            type Output = Self;
            fn bitor(self, rhs: Self) -> Self {
                Self(self.0 | rhs.0)
            }
        }

        impl BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: Self) {
                self.0 |= rhs.0;
            }
        }

        impl BitAnd for $name {
            type Output = Self;
            fn bitand(self, rhs: Self) -> Self {
                Self(self.0 & rhs.0)
            }
        }

        impl Not for $name {
            type Output = Self;
            fn not(self) -> Self {
                Self(!self.0 & Self::ALL.0)
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if *self == Self::NONE {
                    return f.write_str("NONE");
                }
                if *self == Self::ALL {
                    return f.write_str("ALL");
                }
                let names: Vec<&str> = Self::NAMED
                    .iter()
                    .filter(|(_, flag)| flag.0.count_ones() == 1 && self.contains(*flag))
                    .map(|(name, _)| *name)
                    .collect();
                f.write_str(&names.join(" | "))
            }
        }

        impl Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }
    };
}

flag_set! {
    /// Kinds of library a dependency edge may be satisfied by.
    LibraryDependencyTarget {
        /// A package from a feed or the local packages folder.
        PACKAGE = 1,
        /// A project in the same build.
        PROJECT = 1 << 1,
        /// A project described outside the build.
        EXTERNAL_PROJECT = 1 << 2,
        /// A plain assembly.
        ASSEMBLY = 1 << 3,
        /// A framework reference.
        REFERENCE = 1 << 4,
        /// A Windows metadata file.
        WIN_MD = 1 << 5,
        /// Any of the above.
        ALL = (1 << 6) - 1,
        /// What a package reference in a project file may resolve to.
        PACKAGE_PROJECT_EXTERNAL = 1 | (1 << 1) | (1 << 2),
    }
}

flag_set! {
    /// Asset groups that flow along a dependency edge.
    LibraryIncludeFlags {
        /// Runtime assemblies.
        RUNTIME = 1,
        /// Compile time reference assemblies.
        COMPILE = 1 << 1,
        /// Build props and targets.
        BUILD = 1 << 2,
        /// Content files.
        CONTENT_FILES = 1 << 3,
        /// Native binaries.
        NATIVE = 1 << 4,
        /// Analyzers.
        ANALYZERS = 1 << 5,
        /// Build assets that flow to transitive consumers.
        BUILD_TRANSITIVE = 1 << 6,
        /// Every asset group.
        ALL = (1 << 7) - 1,
    }
}

impl LibraryIncludeFlags {
    /// What a dependency suppresses for its consumers unless told otherwise.
    pub const DEFAULT_SUPPRESS_PARENT: Self = Self(Self::CONTENT_FILES.0 | Self::ANALYZERS.0 | Self::BUILD.0);
}

/// What a resolved library turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LibraryType {
    /// A package.
    Package,
    /// A project in the build.
    Project,
    /// A project described outside the build.
    ExternalProject,
    /// A framework reference.
    Reference,
    /// Nothing could satisfy the request.
    Unresolved,
}

impl LibraryType {
    /// Projects of either kind.
    pub fn is_project(self) -> bool {
        matches!(self, Self::Project | Self::ExternalProject)
    }
}

impl LibraryDependencyTarget {
    /// Whether a library of type `library_type` may satisfy this constraint.
    pub fn allows(self, library_type: LibraryType) -> bool {
        let flag = match library_type {
            LibraryType::Package => Self::PACKAGE,
            LibraryType::Project => Self::PROJECT,
            LibraryType::ExternalProject => Self::EXTERNAL_PROJECT,
            LibraryType::Reference => Self::REFERENCE,
            LibraryType::Unresolved => return false,
        };
        self.contains(flag)
    }

    /// Constraints of this kind share a resolution: package requests may be answered by
    /// projects, so both land in the same class.
    fn interning_class(self) -> &'static str {
        if self == Self::REFERENCE {
            "reference"
        } else if self == Self::EXTERNAL_PROJECT {
            "external"
        } else if self == Self::PROJECT || self == Self::PROJECT | Self::EXTERNAL_PROJECT {
            "project"
        } else {
            "any"
        }
    }
}

/// A named request for a library.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LibraryRange {
    /// Library name, compared ignoring case.
    pub name: String,
    /// Acceptable versions, `None` for requests that carry no version at all.
    pub version_range: Option<VersionRange>,
    /// Acceptable kinds of library.
    pub type_constraint: LibraryDependencyTarget,
}

impl LibraryRange {
    /// Request for `name` within `version_range`.
    pub fn new(
        name: impl Into<String>,
        version_range: Option<VersionRange>,
        type_constraint: LibraryDependencyTarget,
    ) -> Self {
        Self {
            name: name.into(),
            version_range,
            type_constraint,
        }
    }

    /// Package request.
    pub fn package(name: impl Into<String>, version_range: VersionRange) -> Self {
        Self::new(name, Some(version_range), LibraryDependencyTarget::PACKAGE)
    }

    /// Request for a project at any version.
    pub fn project(name: impl Into<String>) -> Self {
        Self::new(
            name,
            Some(VersionRange::all()),
            LibraryDependencyTarget::PROJECT | LibraryDependencyTarget::EXTERNAL_PROJECT,
        )
    }

    /// Whether every kind in `target` is acceptable.
    pub fn type_constraint_allows(&self, target: LibraryDependencyTarget) -> bool {
        self.type_constraint.contains(target)
    }

    /// Key two requests share exactly when they resolve the same way: name ignoring case,
    /// normalized range, and type-constraint class.
    pub fn canonical_key(&self) -> String {
        let range = self
            .version_range
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();
        format!(
            "{} {} {}",
            self.name.to_lowercase(),
            range,
            self.type_constraint.interning_class()
        )
    }
}

impl Display for LibraryRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version_range {
            Some(range) if range.has_lower_bound() || range.has_upper_bound() => {
                write!(f, "{} ({})", self.name, range.pretty_print())
            }
            _ => f.write_str(&self.name),
        }
    }
}

/// A concrete library: name, exact version and kind.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LibraryIdentity {
    /// Name as the provider spells it.
    pub name: String,
    /// Exact version.
    pub version: SemanticVersion,
    /// Kind of library.
    pub library_type: LibraryType,
}

impl LibraryIdentity {
    /// A library named `name` at `version`.
    pub fn new(name: impl Into<String>, version: SemanticVersion, library_type: LibraryType) -> Self {
        Self {
            name: name.into(),
            version,
            library_type,
        }
    }
}

impl PartialEq for LibraryIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.library_type == other.library_type
            && self.version == other.version
            && eq_ignore_case(&self.name, &other.name)
    }
}

impl Eq for LibraryIdentity {}

impl Hash for LibraryIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.to_lowercase().hash(state);
        self.version.hash(state);
        self.library_type.hash(state);
    }
}

impl Ord for LibraryIdentity {
    fn cmp(&self, other: &Self) -> Ordering {
        cmp_ignore_case(&self.name, &other.name)
            .then_with(|| self.version.cmp(&other.version))
            .then_with(|| self.library_type.cmp(&other.library_type))
    }
}

impl PartialOrd for LibraryIdentity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for LibraryIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.version)
    }
}

/// An edge: a library request plus the asset flow rules along it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LibraryDependency {
    /// What is requested.
    pub library_range: LibraryRange,
    /// Asset groups the consumer takes from this dependency.
    pub include_type: LibraryIncludeFlags,
    /// Asset groups hidden from the consumer's own consumers. [`LibraryIncludeFlags::ALL`]
    /// makes the dependency private, so its subtree never flows further up.
    pub suppress_parent: LibraryIncludeFlags,
    /// Exact range that replaces the requested one here and for every descendant request of
    /// the same library.
    pub version_override: Option<VersionRange>,
    /// Added implicitly by the build rather than declared by the user.
    pub auto_referenced: bool,
}

impl LibraryDependency {
    /// Edge with default flags.
    pub fn new(library_range: LibraryRange) -> Self {
        Self {
            library_range,
            include_type: LibraryIncludeFlags::ALL,
            suppress_parent: LibraryIncludeFlags::DEFAULT_SUPPRESS_PARENT,
            version_override: None,
            auto_referenced: false,
        }
    }

    /// Edge to a package.
    pub fn package(name: impl Into<String>, version_range: VersionRange) -> Self {
        Self::new(LibraryRange::package(name, version_range))
    }

    /// Edge to a project.
    pub fn project(name: impl Into<String>) -> Self {
        Self::new(LibraryRange::project(name))
    }

    /// Same edge with other suppressed asset groups.
    pub fn with_suppress_parent(mut self, suppress_parent: LibraryIncludeFlags) -> Self {
        self.suppress_parent = suppress_parent;
        self
    }

    /// Same edge with other included asset groups.
    pub fn with_include_type(mut self, include_type: LibraryIncludeFlags) -> Self {
        self.include_type = include_type;
        self
    }

    /// Same edge pinned to `version_override`.
    pub fn with_version_override(mut self, version_override: VersionRange) -> Self {
        self.version_override = Some(version_override);
        self
    }

    /// Library name.
    pub fn name(&self) -> &str {
        &self.library_range.name
    }

    /// The range actually resolved: the override when there is one.
    pub fn effective_range(&self) -> Option<&VersionRange> {
        self.version_override
            .as_ref()
            .or(self.library_range.version_range.as_ref())
    }

    /// Whether the dependency is private: nothing below it flows to consumers.
    pub fn suppresses_all(&self) -> bool {
        self.suppress_parent == LibraryIncludeFlags::ALL
    }
}

impl Display for LibraryDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.library_range, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(s: &str) -> VersionRange {
        s.parse().unwrap()
    }

    #[test]
    fn flags() {
        let target = LibraryDependencyTarget::PACKAGE_PROJECT_EXTERNAL;
        assert!(target.contains(LibraryDependencyTarget::PROJECT));
        assert!(!target.contains(LibraryDependencyTarget::REFERENCE));
        assert!(target.allows(LibraryType::ExternalProject));
        assert_eq!(
            !LibraryIncludeFlags::ALL,
            LibraryIncludeFlags::NONE,
        );
        assert_eq!(
            LibraryIncludeFlags::COMPILE | LibraryIncludeFlags::RUNTIME,
            LibraryIncludeFlags(3)
        );
        assert_eq!(
            (LibraryDependencyTarget::PACKAGE | LibraryDependencyTarget::PROJECT).to_string(),
            "PACKAGE | PROJECT"
        );
    }

    #[test]
    fn canonical_key_ignores_case_and_formatting() {
        let a = LibraryRange::package("Newtonsoft.Json", range("1.0"));
        let b = LibraryRange::new(
            "newtonsoft.json",
            Some(range("[1.0.0, )")),
            LibraryDependencyTarget::PACKAGE_PROJECT_EXTERNAL,
        );
        assert_eq!(a.canonical_key(), b.canonical_key());

        let project = LibraryRange::new(
            "newtonsoft.json",
            Some(range("1.0")),
            LibraryDependencyTarget::PROJECT,
        );
        assert_ne!(a.canonical_key(), project.canonical_key());
    }

    #[test]
    fn identity_equality_ignores_case() {
        let v = SemanticVersion::new(1, 0, 0);
        let a = LibraryIdentity::new("PackageA", v.clone(), LibraryType::Package);
        let b = LibraryIdentity::new("packagea", v.clone(), LibraryType::Package);
        let c = LibraryIdentity::new("packagea", v, LibraryType::Project);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.cmp(&b), Ordering::Equal);
    }

    #[test]
    fn override_is_effective_range() {
        let dependency = LibraryDependency::package("B", range("1.0"))
            .with_version_override(range("[2.0]"));
        assert_eq!(dependency.effective_range(), Some(&range("[2.0]")));
        assert_eq!(dependency.to_string(), "B (>= 1.0.0)");
    }
}
