// SPDX-License-Identifier: MPL-2.0

//! Target frameworks, parsed from short folder names such as `net472` or `net6.0-windows`, and
//! the compatibility rules between them.

use std::fmt::{self, Display};
use std::str::FromStr;

use thiserror::Error;

use crate::library::eq_ignore_case;

/// Framework families, ordered so that more specific families sort later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FrameworkFamily {
    /// Placeholder for a framework that could not be matched.
    Unsupported,
    /// Framework agnostic assets.
    Any,
    /// .NET Standard.
    NetStandard,
    /// .NET Framework.
    NetFramework,
    /// .NET Core and .NET 5+.
    NetCoreApp,
}

/// Error creating a [Framework] from a folder name.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("'{folder}' is not a known framework folder name")]
pub struct FrameworkParseError {
    folder: String,
}

/// A target framework.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Framework {
    family: FrameworkFamily,
    version: (u32, u32, u32),
    platform: Option<String>,
}

impl Framework {
    /// Framework of `family` at `major.minor`.
    pub fn new(family: FrameworkFamily, major: u32, minor: u32) -> Self {
        Self {
            family,
            version: (major, minor, 0),
            platform: None,
        }
    }

    /// The sentinel recorded for projects that have nothing compatible.
    pub fn unsupported() -> Self {
        Self::new(FrameworkFamily::Unsupported, 0, 0)
    }

    /// Framework agnostic.
    pub fn any() -> Self {
        Self::new(FrameworkFamily::Any, 0, 0)
    }

    /// Same framework restricted to an OS platform, like `net6.0-windows`.
    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self
    }

    /// Family.
    pub fn family(&self) -> FrameworkFamily {
        self.family
    }

    /// `(major, minor, build)`.
    pub fn version(&self) -> (u32, u32, u32) {
        self.version
    }

    /// OS platform suffix.
    pub fn platform(&self) -> Option<&str> {
        self.platform.as_deref()
    }

    /// Whether this is the unsupported sentinel.
    pub fn is_unsupported(&self) -> bool {
        self.family == FrameworkFamily::Unsupported
    }

    /// Whether assets built for `candidate` can be used by a project targeting `self`.
    pub fn is_compatible_with(&self, candidate: &Framework) -> bool {
        use FrameworkFamily::*;
        if self.is_unsupported() || candidate.is_unsupported() {
            return false;
        }
        if candidate.family == Any {
            return true;
        }
        if let Some(platform) = &candidate.platform {
            match &self.platform {
                Some(ours) if eq_ignore_case(ours, platform) => {}
                _ => return false,
            }
        }
        match (self.family, candidate.family) {
            (target, other) if target == other => candidate.version <= self.version,
            (NetCoreApp, NetStandard) | (NetFramework, NetStandard) => self
                .highest_net_standard()
                .is_some_and(|highest| candidate.version <= highest),
            _ => false,
        }
    }

    fn highest_net_standard(&self) -> Option<(u32, u32, u32)> {
        let v = self.version;
        match self.family {
            FrameworkFamily::NetCoreApp if v >= (3, 0, 0) => Some((2, 1, 0)),
            FrameworkFamily::NetCoreApp if v >= (2, 0, 0) => Some((2, 0, 0)),
            FrameworkFamily::NetCoreApp if v >= (1, 0, 0) => Some((1, 6, 0)),
            FrameworkFamily::NetFramework if v >= (4, 6, 1) => Some((2, 0, 0)),
            FrameworkFamily::NetFramework if v >= (4, 6, 0) => Some((1, 3, 0)),
            FrameworkFamily::NetFramework if v >= (4, 5, 1) => Some((1, 2, 0)),
            FrameworkFamily::NetFramework if v >= (4, 5, 0) => Some((1, 1, 0)),
            _ => None,
        }
    }

    /// The best of `candidates` for a project targeting `self`: its own family at the highest
    /// compatible version, then .NET Standard, then framework agnostic.
    pub fn get_nearest<'a, I>(&self, candidates: I) -> Option<&'a Framework>
    where
        I: IntoIterator<Item = &'a Framework>,
    {
        candidates
            .into_iter()
            .filter(|candidate| self.is_compatible_with(candidate))
            .max_by_key(|candidate| {
                let closeness = match candidate.family {
                    family if family == self.family => 3,
                    FrameworkFamily::NetStandard => 2,
                    _ => 1,
                };
                (closeness, candidate.platform.is_some(), candidate.version)
            })
    }

    /// Short folder name, `net472` or `net6.0`.
    pub fn short_folder_name(&self) -> String {
        self.to_string()
    }
}

fn parse_dotted(text: &str) -> Option<(u32, u32, u32)> {
    let mut parts = text.split('.').map(|part| part.parse::<u32>().ok());
    let major = parts.next()??;
    let minor = parts.next().unwrap_or(Some(0))?;
    let build = parts.next().unwrap_or(Some(0))?;
    match parts.next() {
        None => Some((major, minor, build)),
        Some(_) => None,
    }
}

/// `472` is 4.7.2 and `45` is 4.5.
fn parse_compact(text: &str) -> Option<(u32, u32, u32)> {
    if text.is_empty() || !text.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let mut digits = text.chars().filter_map(|c| c.to_digit(10));
    let major = digits.next()?;
    let minor = digits.next().unwrap_or(0);
    let build = digits.next().unwrap_or(0);
    match digits.next() {
        None => Some((major, minor, build)),
        Some(_) => None,
    }
}

impl FromStr for Framework {
    type Err = FrameworkParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let folder = s.trim().to_lowercase();
        let error = || FrameworkParseError {
            folder: s.to_string(),
        };
        match folder.as_str() {
            "any" => return Ok(Self::any()),
            "unsupported" => return Ok(Self::unsupported()),
            _ => {}
        }

        let (moniker, platform) = match folder.split_once('-') {
            Some((moniker, platform)) if !platform.is_empty() => (moniker, Some(platform)),
            Some(_) => return Err(error()),
            None => (folder.as_str(), None),
        };

        let (family, version) = if let Some(rest) = moniker.strip_prefix("netstandard") {
            (FrameworkFamily::NetStandard, parse_dotted(rest))
        } else if let Some(rest) = moniker.strip_prefix("netcoreapp") {
            (FrameworkFamily::NetCoreApp, parse_dotted(rest))
        } else if let Some(rest) = moniker.strip_prefix("net") {
            if rest.contains('.') {
                match parse_dotted(rest) {
                    Some(version) if version.0 >= 5 => (FrameworkFamily::NetCoreApp, Some(version)),
                    version => (FrameworkFamily::NetFramework, version),
                }
            } else {
                (FrameworkFamily::NetFramework, parse_compact(rest))
            }
        } else {
            return Err(error());
        };

        let version = version.ok_or_else(error)?;
        if platform.is_some() && family != FrameworkFamily::NetCoreApp {
            return Err(error());
        }
        Ok(Self {
            family,
            version,
            platform: platform.map(str::to_string),
        })
    }
}

impl Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (major, minor, build) = self.version;
        match self.family {
            FrameworkFamily::Unsupported => f.write_str("unsupported")?,
            FrameworkFamily::Any => f.write_str("any")?,
            FrameworkFamily::NetStandard => write!(f, "netstandard{}.{}", major, minor)?,
            FrameworkFamily::NetCoreApp if major >= 5 => write!(f, "net{}.{}", major, minor)?,
            FrameworkFamily::NetCoreApp => write!(f, "netcoreapp{}.{}", major, minor)?,
            FrameworkFamily::NetFramework if build > 0 => write!(f, "net{}{}{}", major, minor, build)?,
            FrameworkFamily::NetFramework => write!(f, "net{}{}", major, minor)?,
        }
        if let Some(platform) = &self.platform {
            write!(f, "-{}", platform)?;
        }
        Ok(())
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Framework {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Framework {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        FromStr::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// One restore target: a framework, optionally narrowed to a runtime identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FrameworkRuntimePair {
    /// Target framework.
    pub framework: Framework,
    /// Runtime identifier such as `win-x64`.
    pub runtime_identifier: Option<String>,
}

impl FrameworkRuntimePair {
    /// Pair for `framework` and `runtime_identifier`.
    pub fn new(framework: Framework, runtime_identifier: Option<&str>) -> Self {
        Self {
            framework,
            runtime_identifier: runtime_identifier.map(str::to_string),
        }
    }

    /// Pair without a runtime identifier.
    pub fn ridless(framework: Framework) -> Self {
        Self::new(framework, None)
    }

    /// `net6.0` or `net6.0/win-x64`.
    pub fn name(&self) -> String {
        self.to_string()
    }
}

impl Display for FrameworkRuntimePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.runtime_identifier {
            Some(rid) => write!(f, "{}/{}", self.framework, rid),
            None => write!(f, "{}", self.framework),
        }
    }
}
