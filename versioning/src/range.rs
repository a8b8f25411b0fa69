// SPDX-License-Identifier: MPL-2.0

//! Interval version ranges in bracket notation, optionally with a floating lower bound.
//!
//! A bare version `1.0` is a minimum: `[1.0.0, )`. Interval notation follows the usual
//! mathematical convention, `[1.0, 2.0)` includes 1.0 but not 2.0, and an empty side is
//! unbounded.

use std::cmp::Ordering;
use std::fmt::{self, Display};
use std::str::FromStr;

#[cfg(any(feature = "proptest", test))]
use proptest::prelude::*;
use thiserror::Error;

use crate::float::{FloatBehavior, FloatRange};
use crate::version::{cmp_ignore_case, SemanticVersion, VersionParseError};

/// Error creating a [VersionRange] or [FloatRange] from a string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RangeParseError {
    /// Nothing to parse.
    #[error("version range is empty")]
    Empty,
    /// The range text is not well formed.
    #[error("invalid version range '{range}': {reason}")]
    Invalid {
        /// Range that was being parsed.
        range: String,
        /// What is wrong with it.
        reason: &'static str,
    },
    /// One of the bounds is not a version.
    #[error("invalid version in range '{range}'")]
    Version {
        /// Range that was being parsed.
        range: String,
        /// Why the bound failed to parse.
        source: VersionParseError,
    },
}

/// A set of versions between an optional minimum and an optional maximum.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionRange {
    min: Option<SemanticVersion>,
    min_inclusive: bool,
    max: Option<SemanticVersion>,
    max_inclusive: bool,
    float: Option<FloatRange>,
}

// Constructors
impl VersionRange {
    /// Every version.
    pub fn all() -> Self {
        Self {
            min: None,
            min_inclusive: false,
            max: None,
            max_inclusive: false,
            float: None,
        }
    }

    /// `[v, )`
    pub fn at_least(v: impl Into<SemanticVersion>) -> Self {
        Self {
            min: Some(v.into()),
            min_inclusive: true,
            ..Self::all()
        }
    }

    /// `[v]`
    pub fn exact(v: impl Into<SemanticVersion>) -> Self {
        let v = v.into();
        Self {
            min: Some(v.clone()),
            min_inclusive: true,
            max: Some(v),
            max_inclusive: true,
            float: None,
        }
    }

    /// `[v1, v2)`
    pub fn between(v1: impl Into<SemanticVersion>, v2: impl Into<SemanticVersion>) -> Self {
        Self {
            min: Some(v1.into()),
            min_inclusive: true,
            max: Some(v2.into()),
            max_inclusive: false,
            float: None,
        }
    }

    /// `[float, )`, starting at the float minimum.
    pub fn floating(float: FloatRange) -> Self {
        Self {
            min: Some(float.min_version().clone()),
            min_inclusive: true,
            max: None,
            max_inclusive: false,
            float: Some(float),
        }
    }
}

// Accessors
impl VersionRange {
    /// Lower bound.
    pub fn min_version(&self) -> Option<&SemanticVersion> {
        self.min.as_ref()
    }

    /// Upper bound.
    pub fn max_version(&self) -> Option<&SemanticVersion> {
        self.max.as_ref()
    }

    /// Whether the lower bound itself is in the range.
    pub fn is_min_inclusive(&self) -> bool {
        self.min_inclusive
    }

    /// Whether the upper bound itself is in the range.
    pub fn is_max_inclusive(&self) -> bool {
        self.max_inclusive
    }

    /// Whether there is a minimum.
    pub fn has_lower_bound(&self) -> bool {
        self.min.is_some()
    }

    /// Whether there is a maximum.
    pub fn has_upper_bound(&self) -> bool {
        self.max.is_some()
    }

    /// The floating part of the lower bound.
    pub fn float(&self) -> Option<&FloatRange> {
        self.float.as_ref()
    }

    /// Whether the range picks its highest match.
    pub fn is_floating(&self) -> bool {
        self.float
            .as_ref()
            .is_some_and(|f| f.behavior() != FloatBehavior::None)
    }

    /// Bounds, inclusive flags and float all equal.
    pub fn precise_eq(&self, other: &Self) -> bool {
        self == other
    }
}

impl VersionRange {
    /// Whether `version` lies within the bounds. Floats do not narrow this check.
    pub fn satisfies(&self, version: &SemanticVersion) -> bool {
        let above = match &self.min {
            None => true,
            Some(min) if self.min_inclusive => version >= min,
            Some(min) => version > min,
        };
        let below = match &self.max {
            None => true,
            Some(max) if self.max_inclusive => version <= max,
            Some(max) => version < max,
        };
        above && below
    }

    fn allows_prerelease(&self) -> bool {
        self.float.as_ref().is_some_and(FloatRange::includes_prerelease)
            || self.min.as_ref().is_some_and(SemanticVersion::is_prerelease)
            || self.max.as_ref().is_some_and(SemanticVersion::is_prerelease)
    }

    /// Whether `considering` would be a better pick than `current`.
    fn is_better(&self, current: &SemanticVersion, considering: &SemanticVersion) -> bool {
        let Some(float) = self.float.as_ref().filter(|_| self.is_floating()) else {
            return considering < current;
        };
        match (float.satisfies(current), float.satisfies(considering)) {
            (true, true) => considering > current,
            (false, true) => true,
            (true, false) => false,
            (false, false) => considering < current,
        }
    }

    /// Best of the given versions: the lowest match, or for floating ranges the highest match
    /// of the float. Prereleases are only considered when the range mentions one.
    pub fn find_best_match<'v, I>(&self, versions: I) -> Option<&'v SemanticVersion>
    where
        I: IntoIterator<Item = &'v SemanticVersion>,
    {
        let allows_prerelease = self.allows_prerelease();
        versions
            .into_iter()
            .filter(|v| self.satisfies(v) && (allows_prerelease || !v.is_prerelease()))
            .fold(None, |best, candidate| match best {
                Some(best) if !self.is_better(best, candidate) => Some(best),
                _ => Some(candidate),
            })
    }

    /// Nearest-wins ordering of two requests for the same library: is `self` at least as
    /// high as `far`?
    ///
    /// Compares lower bounds only. A missing lower bound is the highest possible request. A
    /// floating part counts as unbounded, and when the numbers tie the release prefixes break
    /// the tie, with no prefix being the higher one.
    pub fn is_greater_than_or_equal_to(&self, far: &Self) -> bool {
        let Some(near_min) = &self.min else {
            return true;
        };
        let Some(far_min) = &far.min else {
            return false;
        };
        if !self.is_floating() && !far.is_floating() {
            return near_min >= far_min;
        }

        if self.float_behavior() == FloatBehavior::Major {
            return true;
        }
        if far.float_behavior() == FloatBehavior::Major {
            return false;
        }
        let (near_numbers, near_release) = self.float_floor();
        let (far_numbers, far_release) = far.float_floor();
        match near_numbers.cmp(&far_numbers) {
            Ordering::Equal => {}
            ord => return ord.is_gt(),
        }
        if near_release.is_empty() {
            return true;
        }
        if far_release.is_empty() {
            return false;
        }
        let len = near_release.len().min(far_release.len());
        match (near_release.get(..len), far_release.get(..len)) {
            (Some(near), Some(far)) => cmp_ignore_case(near, far).is_ge(),
            _ => cmp_ignore_case(&near_release, &far_release).is_ge(),
        }
    }

    fn float_behavior(&self) -> FloatBehavior {
        self.float
            .as_ref()
            .map_or(FloatBehavior::None, FloatRange::behavior)
    }

    /// Numbers with the floating parts maxed out, and the release text to tie-break on.
    fn float_floor(&self) -> ([u64; 4], String) {
        let min = self.min.clone().unwrap_or_else(SemanticVersion::zero);
        let [major, minor, patch, revision] = min.numbers();
        let open = u64::MAX;
        match &self.float {
            Some(float) if self.is_floating() => {
                let numbers = match float.behavior() {
                    FloatBehavior::Major => [open, open, open, open],
                    FloatBehavior::Minor => [major, open, open, open],
                    FloatBehavior::Patch => [major, minor, open, open],
                    FloatBehavior::Revision => [major, minor, patch, open],
                    _ => [major, minor, patch, revision],
                };
                (numbers, float.release_prefix().unwrap_or("").to_string())
            }
            _ => (min.numbers(), min.release()),
        }
    }

    /// Human oriented form used in log messages, such as `>= 1.0.0 && < 2.0.0`.
    pub fn pretty_print(&self) -> String {
        if let Some(pin) = self.min.as_ref().filter(|_| self.is_exact()) {
            return format!("= {}", pin);
        }
        let lower = self.min.as_ref().map(|min| {
            let text = match &self.float {
                Some(float) if self.is_floating() => float.to_string(),
                _ => min.to_string(),
            };
            if self.min_inclusive {
                format!(">= {}", text)
            } else {
                format!("> {}", text)
            }
        });
        let upper = self.max.as_ref().map(|max| {
            if self.max_inclusive {
                format!("<= {}", max)
            } else {
                format!("< {}", max)
            }
        });
        match (lower, upper) {
            (Some(lower), Some(upper)) => format!("{} && {}", lower, upper),
            (Some(bound), None) | (None, Some(bound)) => bound,
            (None, None) => "*".to_string(),
        }
    }

    fn is_exact(&self) -> bool {
        self.min_inclusive && self.max_inclusive && self.min.is_some() && self.min == self.max
    }
}

impl FromStr for VersionRange {
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

        let (Some(first), Some(last)) = (s.chars().next(), s.chars().last()) else {
            return Err(RangeParseError::Empty);
        };
        if first != '[' && first != '(' {
            if s.contains('*') {
                return Ok(Self::floating(s.parse()?));
            }
            return Ok(Self::at_least(version(s)?));
        }
        if last != ']' && last != ')' {
            return Err(invalid("missing closing bracket"));
        }
        let min_inclusive = first == '[';
        let max_inclusive = last == ']';
        let inner = &s[1..s.len() - 1];

        let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
        match parts.as_slice() {
            [single] => {
                if !(min_inclusive && max_inclusive) {
                    return Err(invalid("an exact version needs square brackets"));
                }
                if single.contains('*') {
                    return Err(invalid("an exact version cannot float"));
                }
                Ok(Self::exact(version(single)?))
            }
            ["", ""] => Err(invalid("at least one bound is required")),
            [lower, upper] => {
                let (min, float) = if lower.is_empty() {
                    (None, None)
                } else if lower.contains('*') {
                    let float: FloatRange = lower.parse()?;
                    (Some(float.min_version().clone()), Some(float))
                } else {
                    (Some(version(lower)?), None)
                };
                let max = if upper.is_empty() {
                    None
                } else if upper.contains('*') {
                    return Err(invalid("the upper bound cannot float"));
                } else {
                    Some(version(upper)?)
                };
                if let (Some(min), Some(max)) = (&min, &max) {
                    match min.cmp(max) {
                        Ordering::Greater => return Err(invalid("minimum exceeds maximum")),
                        Ordering::Equal if !(min_inclusive && max_inclusive) => {
                            return Err(invalid("empty interval"))
                        }
                        _ => {}
                    }
                }
                Ok(Self {
                    min_inclusive: min.is_some() && min_inclusive,
                    max_inclusive: max.is_some() && max_inclusive,
                    min,
                    max,
                    float,
                })
            }
            _ => Err(invalid("too many commas")),
        }
    }
}

impl Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_exact() && self.float.is_none() {
            if let Some(min) = &self.min {
                return write!(f, "[{}]", min);
            }
        }
        f.write_str(if self.min_inclusive { "[" } else { "(" })?;
        match (&self.float, &self.min) {
            (Some(float), _) if self.is_floating() => write!(f, "{}", float)?,
            (_, Some(min)) => write!(f, "{}", min)?,
            _ => {}
        }
        f.write_str(", ")?;
        if let Some(max) = &self.max {
            write!(f, "{}", max)?;
        }
        f.write_str(if self.max_inclusive { "]" } else { ")" })
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for VersionRange {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for VersionRange {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        FromStr::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// Minimums, exact pins and half-open intervals over small versions.
#[cfg(any(feature = "proptest", test))]
pub fn proptest_strategy() -> impl Strategy<Value = VersionRange> {
    let version = crate::version::proptest_strategy;
    prop_oneof![
        version().prop_map(|v| VersionRange::at_least(v)),
        version().prop_map(|v| VersionRange::exact(v)),
        (version(), version()).prop_map(|(a, b)| match a.cmp(&b) {
            Ordering::Less => VersionRange::between(a, b),
            Ordering::Greater => VersionRange::between(b, a),
            Ordering::Equal => VersionRange::exact(a),
        }),
    ]
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn r(s: &str) -> VersionRange {
        s.parse().unwrap()
    }

    fn v(s: &str) -> SemanticVersion {
        s.parse().unwrap()
    }

    #[test]
    fn parse_and_normalize() {
        assert_eq!(r("1.0").to_string(), "[1.0.0, )");
        assert_eq!(r("[1.0]").to_string(), "[1.0.0]");
        assert_eq!(r("[1.0,2.0)").to_string(), "[1.0.0, 2.0.0)");
        assert_eq!(r("(,2.0]").to_string(), "(, 2.0.0]");
        assert_eq!(r("(1.0, )").to_string(), "(1.0.0, )");
        assert_eq!(r("1.*").to_string(), "[1.*, )");
        assert_eq!(r("[1.*, 2.0)").to_string(), "[1.*, 2.0.0)");
        assert_eq!(r("*").to_string(), "[*, )");
        assert_eq!(r(&r("[1.0.0-*, )").to_string()), r("1.0.0-*"));
    }

    #[test]
    fn parse_errors() {
        for bad in ["", "(1.0)", "[1.0)", "[2.0, 1.0]", "(1.0, 1.0]", "[,]", "[1.0", "[1,2,3]", "[1.0, 2.*]"] {
            assert!(bad.parse::<VersionRange>().is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn bounds() {
        let range = r("(1.0, 2.0]");
        assert!(!range.satisfies(&v("1.0")));
        assert!(range.satisfies(&v("1.0.1")));
        assert!(range.satisfies(&v("2.0")));
        assert!(!range.satisfies(&v("2.0.1")));
        assert!(VersionRange::all().satisfies(&v("0.0.1-alpha")));
    }

    #[test]
    fn lowest_match_wins() {
        let versions = [v("0.9"), v("1.2"), v("1.1"), v("2.0-beta"), v("2.0")];
        assert_eq!(r("1.0").find_best_match(&versions), Some(&v("1.1")));
        assert_eq!(r("[1.5, )").find_best_match(&versions), Some(&v("2.0")));
        assert_eq!(r("[3.0, )").find_best_match(&versions), None);
    }

    #[test]
    fn prereleases_need_a_prerelease_bound() {
        let versions = [v("2.0-beta"), v("2.1")];
        assert_eq!(r("[2.0, )").find_best_match(&versions), Some(&v("2.1")));
        assert_eq!(r("[2.0-alpha, )").find_best_match(&versions), Some(&v("2.0-beta")));
    }

    #[test]
    fn floating_picks_highest_match() {
        let versions = [v("1.0"), v("1.5"), v("1.5.1-beta"), v("2.0")];
        assert_eq!(r("1.*").find_best_match(&versions), Some(&v("1.5")));
        assert_eq!(r("*").find_best_match(&versions), Some(&v("2.0")));
        assert_eq!(r("1.5.1-*").find_best_match(&versions), Some(&v("1.5.1-beta")));
        // Nothing matches the float: fall back to the lowest in bounds.
        assert_eq!(r("3.*").find_best_match(&versions), None);
        assert_eq!(r("[1.6.*, )").find_best_match(&versions), Some(&v("2.0")));
    }

    #[test]
    fn nearest_wins_comparator() {
        assert!(r("2.0").is_greater_than_or_equal_to(&r("1.0")));
        assert!(!r("1.0").is_greater_than_or_equal_to(&r("2.0")));
        assert!(r("[1.0, 2.0)").is_greater_than_or_equal_to(&r("1.0")));
        assert!(r("(, 2.0)").is_greater_than_or_equal_to(&r("5.0")));
        assert!(!r("5.0").is_greater_than_or_equal_to(&r("(, 2.0)")));
        assert!(r("*").is_greater_than_or_equal_to(&r("9.0")));
        assert!(!r("9.0").is_greater_than_or_equal_to(&r("*")));
        assert!(r("1.*").is_greater_than_or_equal_to(&r("1.9")));
        assert!(!r("1.*").is_greater_than_or_equal_to(&r("2.0")));
        assert!(r("1.0.0").is_greater_than_or_equal_to(&r("1.0.0-beta*")));
        assert!(!r("1.0.0-alpha*").is_greater_than_or_equal_to(&r("1.0.0-beta*")));
    }

    #[test]
    fn pretty() {
        assert_eq!(r("1.0").pretty_print(), ">= 1.0.0");
        assert_eq!(r("[1.0]").pretty_print(), "= 1.0.0");
        assert_eq!(r("[1.0, 2.0)").pretty_print(), ">= 1.0.0 && < 2.0.0");
        assert_eq!(r("(, 2.0]").pretty_print(), "<= 2.0.0");
        assert_eq!(r("1.*").pretty_print(), ">= 1.*");
    }

    proptest! {
        #[test]
        fn exact_contains_only_its_version(
            pin in crate::version::proptest_strategy(),
            other in crate::version::proptest_strategy(),
        ) {
            prop_assert_eq!(VersionRange::exact(pin.clone()).satisfies(&other), pin == other);
        }

        #[test]
        fn comparator_is_total(left in proptest_strategy(), right in proptest_strategy()) {
            prop_assert!(left.is_greater_than_or_equal_to(&right) || right.is_greater_than_or_equal_to(&left));
        }

        #[test]
        fn best_match_satisfies(range in proptest_strategy(), versions in prop::collection::vec(crate::version::proptest_strategy(), 0..8)) {
            if let Some(best) = range.find_best_match(&versions) {
                prop_assert!(range.satisfies(best));
            }
        }

        #[cfg(feature = "serde")]
        #[test]
        fn serde_round_trip(range in proptest_strategy()) {
            let s = ron::ser::to_string(&range).unwrap();
            let back: VersionRange = ron::de::from_str(&s).unwrap();
            prop_assert_eq!(range, back);
        }
    }
}
