// SPDX-License-Identifier: MPL-2.0

//! Floating versions such as `1.*` or `2.0.0-beta*`, which pick the highest match instead of
//! the lowest.

use std::fmt::{self, Display};
use std::str::FromStr;

use crate::range::RangeParseError;
use crate::version::{cmp_ignore_case, SemanticVersion};

/// Which part of a version is left open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FloatBehavior {
    /// Fixed version, nothing floats.
    None,
    /// `1.0.0-beta*`: the release label floats.
    Prerelease,
    /// `1.0.0.*`
    Revision,
    /// `1.0.*`
    Patch,
    /// `1.*`
    Minor,
    /// `*`: any stable version.
    Major,
    /// `*-*`: anything, prereleases included.
    AbsoluteLatest,
}

/// A floating lower bound: the minimum it starts at plus the part allowed to float.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FloatRange {
    behavior: FloatBehavior,
    min_version: SemanticVersion,
    release_prefix: Option<String>,
}

impl FloatRange {
    /// A float that does not float.
    pub fn fixed(version: SemanticVersion) -> Self {
        Self {
            behavior: FloatBehavior::None,
            min_version: version,
            release_prefix: None,
        }
    }

    /// What part floats.
    pub fn behavior(&self) -> FloatBehavior {
        self.behavior
    }

    /// Lowest version that matches.
    pub fn min_version(&self) -> &SemanticVersion {
        &self.min_version
    }

    /// The fixed part of a floating release label, `beta` in `1.0.0-beta*`.
    pub fn release_prefix(&self) -> Option<&str> {
        self.release_prefix.as_deref()
    }

    /// Whether prerelease versions can match.
    pub fn includes_prerelease(&self) -> bool {
        matches!(
            self.behavior,
            FloatBehavior::Prerelease | FloatBehavior::AbsoluteLatest
        )
    }

    /// Whether `version` is one this float may settle on.
    pub fn satisfies(&self, version: &SemanticVersion) -> bool {
        let min = &self.min_version;
        let fixed = |count: usize| version.numbers()[..count] == min.numbers()[..count];
        match self.behavior {
            FloatBehavior::None => version == min,
            FloatBehavior::Prerelease => {
                let prefix = self.release_prefix.as_deref().unwrap_or("");
                let release = version.release();
                fixed(4)
                    && release
                        .get(..prefix.len())
                        .is_some_and(|head| cmp_ignore_case(head, prefix).is_eq())
            }
            FloatBehavior::Revision => !version.is_prerelease() && fixed(3) && version >= min,
            FloatBehavior::Patch => !version.is_prerelease() && fixed(2) && version >= min,
            FloatBehavior::Minor => !version.is_prerelease() && fixed(1) && version >= min,
            FloatBehavior::Major => !version.is_prerelease() && version >= min,
            FloatBehavior::AbsoluteLatest => true,
        }
    }
}

impl FromStr for FloatRange {
    type Err = RangeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = |reason: &'static str| RangeParseError::Invalid {
            range: s.to_string(),
            reason,
        };
        let version = |text: &str| {
            text.parse::<SemanticVersion>()
                .map_err(|source| RangeParseError::Version {
                    range: s.to_string(),
                    source,
                })
        };

        match s {
            "" => return Err(RangeParseError::Empty),
            "*" => {
                return Ok(Self {
                    behavior: FloatBehavior::Major,
                    min_version: SemanticVersion::zero(),
                    release_prefix: None,
                })
            }
            "*-*" => {
                return Ok(Self {
                    behavior: FloatBehavior::AbsoluteLatest,
                    min_version: SemanticVersion::zero().with_release_labels(["0"]),
                    release_prefix: Some(String::new()),
                })
            }
            _ => {}
        }

        if !s.contains('*') {
            return Ok(Self::fixed(version(s)?));
        }
        if !s.ends_with('*') || s.matches('*').count() > 1 {
            return Err(invalid("only a single trailing '*' can float"));
        }

        if let Some((numbers, release)) = s.split_once('-') {
            if numbers.contains('*') {
                return Err(invalid("numeric and prerelease floats cannot be combined"));
            }
            let prefix = release.trim_end_matches('*');
            let label = if prefix.is_empty() || prefix.ends_with('.') {
                format!("{}0", prefix)
            } else {
                prefix.to_string()
            };
            let min_version = version(&format!("{}-{}", numbers, label))?;
            return Ok(Self {
                behavior: FloatBehavior::Prerelease,
                min_version,
                release_prefix: Some(prefix.to_string()),
            });
        }

        let fixed: Vec<&str> = s.split('.').collect();
        let (wildcard, fixed) = fixed.split_last().ok_or(RangeParseError::Empty)?;
        if *wildcard != "*" {
            return Err(invalid("'*' must replace a whole version part"));
        }
        let behavior = match fixed.len() {
            1 => FloatBehavior::Minor,
            2 => FloatBehavior::Patch,
            3 => FloatBehavior::Revision,
            _ => return Err(invalid("too many fixed parts before '*'")),
        };
        Ok(Self {
            behavior,
            min_version: version(&fixed.join("."))?,
            release_prefix: None,
        })
    }
}

impl Display for FloatRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let min = &self.min_version;
        match self.behavior {
            FloatBehavior::None => write!(f, "{}", min),
            FloatBehavior::Prerelease => write!(
                f,
                "{}-{}*",
                min.without_release(),
                self.release_prefix.as_deref().unwrap_or("")
            ),
            FloatBehavior::Revision => {
                write!(f, "{}.{}.{}.*", min.major(), min.minor(), min.patch())
            }
            FloatBehavior::Patch => write!(f, "{}.{}.*", min.major(), min.minor()),
            FloatBehavior::Minor => write!(f, "{}.*", min.major()),
            FloatBehavior::Major => write!(f, "*"),
            FloatBehavior::AbsoluteLatest => write!(f, "*-*"),
        }
    }
}
