// SPDX-License-Identifier: MPL-2.0

//! Handling restore errors.
//!
//! Only faults that make a result meaningless are errors. Unresolved libraries, cycles,
//! conflicts, downgrades and compatibility issues are outcomes and are reported on the results
//! instead.

use thiserror::Error;

use crate::provider::ProviderError;

/// Errors that may occur while restoring.
#[derive(Error, Debug)]
pub enum RestoreError {
    /// Error arising when the implementer of
    /// [LibraryProvider](crate::provider::LibraryProvider)
    /// returned an error in the method `find_library`.
    #[error("Retrieving library {library} failed")]
    ProviderFault {
        /// Library that was requested.
        library: String,
        /// Error raised by the implementer of the provider.
        source: ProviderError,
    },

    /// Error arising when the implementer of
    /// [PackageInstaller](crate::install::PackageInstaller) failed to install a package.
    #[error("Installing {library} failed")]
    InstallFault {
        /// Package that was being installed.
        library: String,
        /// Error raised by the implementer of the installer.
        source: ProviderError,
    },

    /// The provider asked to stop through `should_cancel`.
    #[error("Restore was cancelled")]
    Cancelled(#[source] ProviderError),

    /// The graph being built lost track of its own root.
    #[error("Restore graph for {0} has no root")]
    MissingRoot(String),

    /// The install worker pool could not start.
    #[error("Cannot start install workers")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// Something unexpected happened.
    #[error("{0}")]
    Failure(String),
}
