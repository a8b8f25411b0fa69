// SPDX-License-Identifier: MPL-2.0

//! Version types for dependency restore.
//!
//! - [`SemanticVersion`]: `major.minor.patch[.revision][-labels][+metadata]`, ordered with
//!   prereleases below their stable release and metadata ignored.
//! - [`FloatRange`]: a lower bound with a floating part, `1.*` or `2.0.0-beta*`, that selects the
//!   highest matching version instead of the lowest.
//! - [`VersionRange`]: an interval with optional inclusive or exclusive bounds, written in bracket
//!   notation (`[1.0, 2.0)`), possibly with a floating lower bound.
//!
//! Ranges answer two different questions. [`VersionRange::satisfies`] and
//! [`VersionRange::find_best_match`] decide which concrete versions a request accepts, and
//! [`VersionRange::is_greater_than_or_equal_to`] orders two competing requests for the same
//! library, which is what nearest-wins resolution needs.
//!
//! ## Optional features
//!
//! * `serde`: versions and ranges (de)serialize as their normalized strings.
//! * `proptest`: exports proptest strategies for [`SemanticVersion`] and [`VersionRange`].

#![warn(missing_docs)]

mod float;
mod range;
mod version;

pub use float::{FloatBehavior, FloatRange};
pub use range::{RangeParseError, VersionRange};
pub use version::{SemanticVersion, VersionParseError};

#[cfg(any(feature = "proptest", test))]
pub use range::proptest_strategy as range_strategy;
#[cfg(any(feature = "proptest", test))]
pub use version::proptest_strategy as version_strategy;
