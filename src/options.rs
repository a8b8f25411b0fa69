// SPDX-License-Identifier: MPL-2.0

//! Knobs a host sets before restoring.

/// Restore configuration. Hosts build it directly; there is no file format.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RestoreOptions {
    /// Pin transitive packages to the project's central versions.
    pub central_transitive_pinning: bool,
    /// On RID graphs, require an implementation for every reference assembly.
    pub validate_runtime_assets: bool,
    /// Resolve independent framework and runtime pairs in parallel.
    pub parallel_graphs: bool,
    /// Upper bound on concurrent package installs.
    pub max_parallel_installs: usize,
    /// Report downgrades as errors and fail the restore on them.
    pub treat_downgrades_as_errors: bool,
}

impl Default for RestoreOptions {
    fn default() -> Self {
        Self {
            central_transitive_pinning: false,
            validate_runtime_assets: false,
            parallel_graphs: true,
            max_parallel_installs: 16,
            treat_downgrades_as_errors: false,
        }
    }
}
