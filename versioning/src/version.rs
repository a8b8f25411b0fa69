// SPDX-License-Identifier: MPL-2.0

//! Four-part versions with release labels.

use std::cmp::Ordering;
use std::fmt::{self, Display};
use std::hash::{Hash, Hasher};
use std::str::FromStr;

#[cfg(any(feature = "proptest", test))]
use proptest::prelude::*;
use smallvec::SmallVec;
use thiserror::Error;

/// A version of the form `major.minor.patch[.revision][-label.label][+metadata]`.
///
/// Release labels make a version a prerelease, which sorts below the stable version with the
/// same numbers. Metadata is kept for display but never takes part in comparisons.
#[derive(Debug, Clone)]
pub struct SemanticVersion {
    major: u64,
    minor: u64,
    patch: u64,
    revision: u64,
    release_labels: SmallVec<[String; 2]>,
    metadata: Option<String>,
}

/// Error creating [SemanticVersion] from [String].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionParseError {
    /// Nothing to parse.
    #[error("version string is empty")]
    Empty,
    /// At most major, minor, patch and revision are allowed.
    #[error("version {full_version} has more than four numeric parts")]
    TooManyParts {
        /// [SemanticVersion] that was being parsed.
        full_version: String,
    },
    /// Wrapper around [ParseIntError](core::num::ParseIntError).
    #[error("cannot parse '{version_part}' in '{full_version}' as a number: {parse_error}")]
    ParseIntError {
        /// [SemanticVersion] that was being parsed.
        full_version: String,
        /// A version part where parsing failed.
        version_part: String,
        /// A specific error resulted from parsing a part of the version as [u64].
        parse_error: String,
    },
    /// A `-` or `+` section, or one of its dot separated labels, is empty.
    #[error("version {full_version} contains an empty label")]
    EmptyLabel {
        /// [SemanticVersion] that was being parsed.
        full_version: String,
    },
}

impl FromStr for SemanticVersion {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(VersionParseError::Empty);
        }
        let empty_label = || VersionParseError::EmptyLabel {
            full_version: s.to_string(),
        };

        let (rest, metadata) = match s.split_once('+') {
            Some((_, "")) => return Err(empty_label()),
            Some((rest, metadata)) => (rest, Some(metadata.to_string())),
            None => (s, None),
        };
        let (numbers, release) = match rest.split_once('-') {
            Some((numbers, release)) => (numbers, Some(release)),
            None => (rest, None),
        };

        let parts: Vec<&str> = numbers.split('.').collect();
        if parts.len() > 4 {
            return Err(VersionParseError::TooManyParts {
                full_version: s.to_string(),
            });
        }
        let mut values = [0u64; 4];
        for (slot, part) in values.iter_mut().zip(&parts) {
            *slot = part
                .parse::<u64>()
                .map_err(|e| VersionParseError::ParseIntError {
                    full_version: s.to_string(),
                    version_part: part.to_string(),
                    parse_error: e.to_string(),
                })?;
        }

        let mut release_labels = SmallVec::new();
        if let Some(release) = release {
            for label in release.split('.') {
                if label.is_empty() {
                    return Err(empty_label());
                }
                release_labels.push(label.to_string());
            }
        }

        let [major, minor, patch, revision] = values;
        Ok(Self {
            major,
            minor,
            patch,
            revision,
            release_labels,
            metadata,
        })
    }
}

// Constructors
impl SemanticVersion {
    /// Create a stable version with "major", "minor" and "patch" values.
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            revision: 0,
            release_labels: SmallVec::new(),
            metadata: None,
        }
    }

    /// Version 0.0.0.
    pub fn zero() -> Self {
        Self::new(0, 0, 0)
    }

    /// Same version with the fourth number set.
    pub fn with_revision(mut self, revision: u64) -> Self {
        self.revision = revision;
        self
    }

    /// Same numbers with the given release labels, turning it into a prerelease.
    pub fn with_release_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.release_labels = labels.into_iter().map(Into::into).collect();
        self
    }

    /// Same version with build metadata attached.
    pub fn with_metadata(mut self, metadata: impl Into<String>) -> Self {
        self.metadata = Some(metadata.into());
        self
    }
}

// Accessors
impl SemanticVersion {
    /// First number.
    pub fn major(&self) -> u64 {
        self.major
    }

    /// Second number.
    pub fn minor(&self) -> u64 {
        self.minor
    }

    /// Third number.
    pub fn patch(&self) -> u64 {
        self.patch
    }

    /// Fourth number, zero for most versions.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Dot separated prerelease labels, empty for stable versions.
    pub fn release_labels(&self) -> &[String] {
        &self.release_labels
    }

    /// The release labels joined back with dots.
    pub fn release(&self) -> String {
        self.release_labels.join(".")
    }

    /// Build metadata after the `+`.
    pub fn metadata(&self) -> Option<&str> {
        self.metadata.as_deref()
    }

    /// Whether the version carries release labels.
    pub fn is_prerelease(&self) -> bool {
        !self.release_labels.is_empty()
    }

    /// The four numbers only, stripped of labels and metadata.
    pub fn without_release(&self) -> Self {
        Self::new(self.major, self.minor, self.patch).with_revision(self.revision)
    }

    /// Normalized form followed by `+metadata` when present.
    pub fn to_full_string(&self) -> String {
        match &self.metadata {
            Some(metadata) => format!("{}+{}", self, metadata),
            None => self.to_string(),
        }
    }

    pub(crate) fn numbers(&self) -> [u64; 4] {
        [self.major, self.minor, self.patch, self.revision]
    }
}

/// Ordinal comparison ignoring case.
pub(crate) fn cmp_ignore_case(left: &str, right: &str) -> Ordering {
    left.chars()
        .flat_map(char::to_lowercase)
        .cmp(right.chars().flat_map(char::to_lowercase))
}

fn compare_label(left: &str, right: &str) -> Ordering {
    match (left.parse::<u64>(), right.parse::<u64>()) {
        (Ok(l), Ok(r)) => l.cmp(&r),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => cmp_ignore_case(left, right),
    }
}

fn compare_labels(left: &[String], right: &[String]) -> Ordering {
    left.iter()
        .zip(right)
        .map(|(l, r)| compare_label(l, r))
        .find(|ord| ord.is_ne())
        .unwrap_or_else(|| left.len().cmp(&right.len()))
}

impl Ord for SemanticVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.numbers().cmp(&other.numbers()).then_with(|| {
            match (self.is_prerelease(), other.is_prerelease()) {
                (false, false) => Ordering::Equal,
                (false, true) => Ordering::Greater,
                (true, false) => Ordering::Less,
                (true, true) => compare_labels(&self.release_labels, &other.release_labels),
            }
        })
    }
}

impl PartialOrd for SemanticVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for SemanticVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other).is_eq()
    }
}

impl Eq for SemanticVersion {}

// Must agree with `Ord`: numeric labels hash by value, others case-folded.
impl Hash for SemanticVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.numbers().hash(state);
        self.release_labels.len().hash(state);
        for label in &self.release_labels {
            match label.parse::<u64>() {
                Ok(n) => n.hash(state),
                Err(_) => label.to_lowercase().hash(state),
            }
        }
    }
}

impl From<(u64, u64, u64)> for SemanticVersion {
    fn from((major, minor, patch): (u64, u64, u64)) -> Self {
        Self::new(major, minor, patch)
    }
}

impl Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if self.revision > 0 {
            write!(f, ".{}", self.revision)?;
        }
        if self.is_prerelease() {
            write!(f, "-{}", self.release())?;
        }
        Ok(())
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for SemanticVersion {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_full_string())
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for SemanticVersion {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        FromStr::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// Small versions, a third of them prereleases, so that collisions are frequent.
#[cfg(any(feature = "proptest", test))]
pub fn proptest_strategy() -> impl Strategy<Value = SemanticVersion> {
    (
        0u64..4,
        0u64..4,
        0u64..3,
        prop::option::weighted(0.3, "(alpha|beta|rc)(\\.[0-9])?"),
    )
        .prop_map(|(major, minor, patch, release)| {
            let version = SemanticVersion::new(major, minor, patch);
            match release {
                Some(release) => version.with_release_labels(release.split('.')),
                None => version,
            }
        })
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn v(s: &str) -> SemanticVersion {
        s.parse().unwrap()
    }

    #[test]
    fn missing_parts_are_zero() {
        assert_eq!(v("1"), SemanticVersion::new(1, 0, 0));
        assert_eq!(v("1.2"), SemanticVersion::new(1, 2, 0));
        assert_eq!(v("1.2.3.4").revision(), 4);
    }

    #[test]
    fn parse_errors() {
        assert_eq!("".parse::<SemanticVersion>(), Err(VersionParseError::Empty));
        assert!(matches!(
            "1.2.3.4.5".parse::<SemanticVersion>(),
            Err(VersionParseError::TooManyParts { .. })
        ));
        assert!(matches!(
            "1.x".parse::<SemanticVersion>(),
            Err(VersionParseError::ParseIntError { .. })
        ));
        assert!(matches!(
            "1.0.0-".parse::<SemanticVersion>(),
            Err(VersionParseError::EmptyLabel { .. })
        ));
        assert!(matches!(
            "1.0.0-beta..1".parse::<SemanticVersion>(),
            Err(VersionParseError::EmptyLabel { .. })
        ));
    }

    #[test]
    fn display_is_normalized() {
        assert_eq!(v("1.0").to_string(), "1.0.0");
        assert_eq!(v("1.0.0.0").to_string(), "1.0.0");
        assert_eq!(v("1.0.0.7").to_string(), "1.0.0.7");
        assert_eq!(v("1.0.0-Beta.2+sha").to_string(), "1.0.0-Beta.2");
        assert_eq!(v("1.0.0-Beta.2+sha").to_full_string(), "1.0.0-Beta.2+sha");
    }

    #[test]
    fn prerelease_ordering() {
        assert!(v("1.0.0-alpha") < v("1.0.0"));
        assert!(v("1.0.0-alpha") < v("1.0.0-alpha.1"));
        assert!(v("1.0.0-alpha.2") < v("1.0.0-alpha.10"));
        assert!(v("1.0.0-2") < v("1.0.0-alpha"));
        assert!(v("1.0.0-rc") > v("1.0.0-beta"));
        assert!(v("0.9.9") < v("1.0.0-alpha"));
        assert_eq!(v("1.0.0-BETA"), v("1.0.0-beta"));
        assert_eq!(v("1.0.0+a"), v("1.0.0+b"));
    }

    proptest! {
        #[test]
        fn equal_versions_hash_alike(left in proptest_strategy(), right in proptest_strategy()) {
            use std::collections::hash_map::DefaultHasher;
            let hash = |x: &SemanticVersion| {
                let mut hasher = DefaultHasher::new();
                x.hash(&mut hasher);
                hasher.finish()
            };
            if left == right {
                prop_assert_eq!(hash(&left), hash(&right));
            }
        }

        #[test]
        fn display_parses_back(version in proptest_strategy()) {
            prop_assert_eq!(version.to_string().parse::<SemanticVersion>().unwrap(), version);
        }
    }
}
