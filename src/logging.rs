// SPDX-License-Identifier: MPL-2.0

//! User facing restore messages.
//!
//! Internal tracing goes through the [log] facade like the rest of the crate. What a user
//! has to read about a restore goes to a [RestoreLogger] instead, as [RestoreLogMessage]s
//! carrying a stable [RestoreLogCode] and the target graphs they apply to.

use std::fmt::{self, Display};

use parking_lot::Mutex;

/// Stable code of a restore message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RestoreLogCode {
    /// Plain message without a code.
    Undefined,
    /// `NU1100`: nothing satisfies a request.
    Unresolved,
    /// `NU1106`: requests for one library with no version in common.
    ConflictingRanges,
    /// `NU1107`: a chosen version does not satisfy a request.
    VersionConflict,
    /// `NU1108`: a dependency cycle.
    Cycle,
    /// `NU1201`: a project reference to an incompatible project.
    IncompatibleProject,
    /// `NU1202`: a package with no assets for the framework.
    IncompatiblePackage,
    /// `NU1203`: a reference assembly without a runtime implementation.
    ReferenceAssemblyNotImplemented,
    /// `NU1301`: a provider failed.
    ProviderFault,
    /// `NU1403`: an install failed.
    InstallFault,
    /// `NU1502`: an unknown compatibility profile.
    UnknownCompatibilityProfile,
    /// `NU1605`: a request resolved below its minimum.
    Downgrade,
}

impl RestoreLogCode {
    /// `NU1605` and friends, empty for [RestoreLogCode::Undefined].
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Undefined => "",
            Self::Unresolved => "NU1100",
            Self::ConflictingRanges => "NU1106",
            Self::VersionConflict => "NU1107",
            Self::Cycle => "NU1108",
            Self::IncompatibleProject => "NU1201",
            Self::IncompatiblePackage => "NU1202",
            Self::ReferenceAssemblyNotImplemented => "NU1203",
            Self::ProviderFault => "NU1301",
            Self::InstallFault => "NU1403",
            Self::UnknownCompatibilityProfile => "NU1502",
            Self::Downgrade => "NU1605",
        }
    }
}

impl Display for RestoreLogCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RestoreLogLevel {
    /// Tracing detail.
    Debug,
    /// Progress.
    Information,
    /// Something the user should look at.
    Warning,
    /// Something that fails the restore.
    Error,
}

/// One message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RestoreLogMessage {
    /// Stable code.
    pub code: RestoreLogCode,
    /// Severity.
    pub level: RestoreLogLevel,
    /// Text.
    pub message: String,
    /// Library the message is about.
    pub library_id: Option<String>,
    /// Names of the target graphs the message applies to.
    pub target_graphs: Vec<String>,
}

impl RestoreLogMessage {
    /// A message without library or target graphs.
    pub fn new(code: RestoreLogCode, level: RestoreLogLevel, message: impl Into<String>) -> Self {
        Self {
            code,
            level,
            message: message.into(),
            library_id: None,
            target_graphs: Vec::new(),
        }
    }

    /// An error.
    pub fn error(code: RestoreLogCode, message: impl Into<String>) -> Self {
        Self::new(code, RestoreLogLevel::Error, message)
    }

    /// A warning.
    pub fn warning(code: RestoreLogCode, message: impl Into<String>) -> Self {
        Self::new(code, RestoreLogLevel::Warning, message)
    }

    /// A debug message without a code.
    pub fn debug(message: impl Into<String>) -> Self {
        Self::new(RestoreLogCode::Undefined, RestoreLogLevel::Debug, message)
    }

    /// Same message about `library_id`.
    pub fn with_library(mut self, library_id: impl Into<String>) -> Self {
        self.library_id = Some(library_id.into());
        self
    }

    /// Same message for the given target graphs.
    pub fn with_target_graphs<I, S>(mut self, target_graphs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target_graphs = target_graphs.into_iter().map(Into::into).collect();
        self
    }

    fn same_issue(&self, other: &Self) -> bool {
        self.code == other.code
            && self.level == other.level
            && self.message == other.message
            && self.library_id == other.library_id
    }
}

impl Display for RestoreLogMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            RestoreLogCode::Undefined => f.write_str(&self.message),
            code => write!(f, "{}: {}", code, self.message),
        }
    }
}

/// Sink for user facing messages. Shared between parallel graphs, hence `Send + Sync`.
pub trait RestoreLogger: Send + Sync {
    /// Records a message.
    fn log(&self, message: RestoreLogMessage);

    /// Records a debug message.
    fn log_debug(&self, message: &str) {
        self.log(RestoreLogMessage::debug(message));
    }

    /// Records a warning.
    fn log_warning(&self, code: RestoreLogCode, message: &str) {
        self.log(RestoreLogMessage::warning(code, message));
    }

    /// Records an error.
    fn log_error(&self, code: RestoreLogCode, message: &str) {
        self.log(RestoreLogMessage::error(code, message));
    }
}

impl<L: RestoreLogger + ?Sized> RestoreLogger for &L {
    fn log(&self, message: RestoreLogMessage) {
        (**self).log(message)
    }
}

/// Forwards every message to the [log] facade under the `restore` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogFacadeLogger;

impl RestoreLogger for LogFacadeLogger {
    fn log(&self, message: RestoreLogMessage) {
        let level = match message.level {
            RestoreLogLevel::Debug => log::Level::Debug,
            RestoreLogLevel::Information => log::Level::Info,
            RestoreLogLevel::Warning => log::Level::Warn,
            RestoreLogLevel::Error => log::Level::Error,
        };
        if message.target_graphs.is_empty() {
            log::log!(target: "restore", level, "{}", message);
        } else {
            log::log!(target: "restore", level, "{} [{}]", message, message.target_graphs.join(", "));
        }
    }
}

/// Keeps every message in memory.
///
/// A warning or error logged again for other target graphs is merged into the first one,
/// which accumulates the graph names.
#[derive(Debug, Default)]
pub struct CollectingLogger {
    messages: Mutex<Vec<RestoreLogMessage>>,
}

impl CollectingLogger {
    /// Empty logger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything logged so far, in order.
    pub fn messages(&self) -> Vec<RestoreLogMessage> {
        self.messages.lock().clone()
    }

    /// Messages at `level`.
    pub fn at_level(&self, level: RestoreLogLevel) -> Vec<RestoreLogMessage> {
        self.messages
            .lock()
            .iter()
            .filter(|message| message.level == level)
            .cloned()
            .collect()
    }

    /// Errors logged so far.
    pub fn errors(&self) -> Vec<RestoreLogMessage> {
        self.at_level(RestoreLogLevel::Error)
    }

    /// Warnings logged so far.
    pub fn warnings(&self) -> Vec<RestoreLogMessage> {
        self.at_level(RestoreLogLevel::Warning)
    }

    /// Messages with `code`.
    pub fn with_code(&self, code: RestoreLogCode) -> Vec<RestoreLogMessage> {
        self.messages
            .lock()
            .iter()
            .filter(|message| message.code == code)
            .cloned()
            .collect()
    }

    /// Whether any error was logged.
    pub fn has_errors(&self) -> bool {
        self.messages
            .lock()
            .iter()
            .any(|message| message.level == RestoreLogLevel::Error)
    }
}

impl RestoreLogger for CollectingLogger {
    fn log(&self, message: RestoreLogMessage) {
        let mut messages = self.messages.lock();
        if message.level >= RestoreLogLevel::Warning {
            if let Some(existing) = messages.iter_mut().find(|m| m.same_issue(&message)) {
                for graph in message.target_graphs {
                    if !existing.target_graphs.contains(&graph) {
                        existing.target_graphs.push(graph);
                    }
                }
                return;
            }
        }
        messages.push(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_render() {
        let message = RestoreLogMessage::warning(RestoreLogCode::Downgrade, "Detected package downgrade");
        assert_eq!(message.to_string(), "NU1605: Detected package downgrade");
        assert_eq!(RestoreLogMessage::debug("walking").to_string(), "walking");
    }

    #[test]
    fn repeated_warnings_merge_graphs() {
        let logger = CollectingLogger::new();
        let warning = |graph: &str| {
            RestoreLogMessage::warning(RestoreLogCode::Downgrade, "B downgraded")
                .with_library("B")
                .with_target_graphs([graph])
        };
        logger.log(warning("net6.0"));
        logger.log(warning("net472"));
        logger.log(warning("net6.0"));
        logger.log_debug("walking");
        logger.log_debug("walking");

        let warnings = logger.warnings();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].target_graphs, vec!["net6.0", "net472"]);
        assert_eq!(logger.messages().len(), 3);
        assert!(!logger.has_errors());

        logger.log_error(RestoreLogCode::Cycle, "Cycle detected");
        assert!(logger.has_errors());
        assert_eq!(logger.with_code(RestoreLogCode::Cycle).len(), 1);
    }
}
