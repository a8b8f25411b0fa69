// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Package restore: nearest-wins dependency resolution and lock files.
//!
//! Restoring a project means finding, for every target framework and runtime identifier
//! of the project, one version of every library it transitively depends on. Unlike a
//! version solver, restore does not search for a globally consistent assignment. It
//! applies a simple rule: the request nearest to the project wins. Requests further down
//! the graph that ask for something else are either satisfied by the winner, reported as
//! downgrades, or reported as conflicts.
//!
//! # Basic example
//!
//! - `App` depends on `Menu >= 1.0` and `Icons >= 1.0`
//! - `Menu` depends on `Icons >= 2.0`
//!
//! ```
//! use restore_graph::framework::Framework;
//! use restore_graph::library::LibraryDependency;
//! use restore_graph::logging::CollectingLogger;
//! use restore_graph::options::RestoreOptions;
//! use restore_graph::project::{ProjectSpec, TargetFrameworkInformation};
//! use restore_graph::provider::OfflineLibraryProvider;
//! use restore_graph::restore::DependencyGraphResolver;
//!
//! let net6: Framework = "net6.0".parse().unwrap();
//! let mut provider = OfflineLibraryProvider::new();
//! provider.add_package("Menu", (1, 0, 0), [LibraryDependency::package("Icons", "2.0".parse().unwrap())]);
//! provider.add_package("Icons", (1, 0, 0), []);
//! provider.add_package("Icons", (2, 0, 0), []);
//!
//! let project = ProjectSpec::new("App", (1, 0, 0)).with_framework(
//!     TargetFrameworkInformation::new(net6)
//!         .with_dependency(LibraryDependency::package("Menu", "1.0".parse().unwrap()))
//!         .with_dependency(LibraryDependency::package("Icons", "1.0".parse().unwrap())),
//! );
//!
//! let (logger, options) = (CollectingLogger::new(), RestoreOptions::default());
//! let resolution = DependencyGraphResolver::new(&project, &provider, &logger, &options)
//!     .resolve()
//!     .unwrap();
//!
//! // The project's own request wins, and Menu's request for more is a downgrade.
//! let graph = &resolution.graphs[0];
//! assert_eq!(graph.find("Icons").unwrap().key.version.to_string(), "1.0.0");
//! assert_eq!(graph.analyze_result().downgrades.len(), 1);
//! ```
//!
//! # Providers
//!
//! Libraries come from a [LibraryProvider](provider::LibraryProvider). It answers a
//! single question: the best library for a range on a framework and runtime, with its
//! dependencies. Feeds, the local packages folder and the projects of the build all sit
//! behind it. [OfflineLibraryProvider](provider::OfflineLibraryProvider) keeps everything
//! in memory, and [CachingLibraryProvider](cache::CachingLibraryProvider) shares answers
//! between the graphs of a restore, which may be resolved in parallel.
//!
//! A provider returning `Ok(None)` makes the library unresolved; the graph is still
//! computed and the request is reported. A provider returning an error aborts the graph.
//!
//! # Graphs and diagnostics
//!
//! Each framework and runtime pair gets a [RestoreTargetGraph](graph::RestoreTargetGraph):
//! the flattened set of chosen libraries, the packages to install, the unresolved requests,
//! and an explicit tree used to explain cycles, version conflicts and downgrades. The
//! [report] module renders those as text and logs them with their `NU` codes through a
//! [RestoreLogger](logging::RestoreLogger).
//!
//! # Full restore
//!
//! [RestoreCommand](command::RestoreCommand) chains everything: resolution of every pair,
//! installation of the chosen packages, compatibility checks against package content,
//! diagnostics, and finally a [lock file](lockfile) when nothing failed.
//!
//! ## Optional features
//!
//! * `serde`: libraries, frameworks, options, lock files and log messages (de)serialize.

#![warn(missing_docs)]

pub mod cache;
pub mod command;
pub mod compat;
pub mod content;
pub mod error;
pub mod framework;
pub mod graph;
pub mod install;
pub mod library;
pub mod lockfile;
pub mod logging;
pub mod options;
pub mod project;
pub mod provider;
pub mod report;
pub mod restore;
pub mod runtime;
pub mod type_aliases;

mod internal;

pub use restore_versioning::{FloatBehavior, FloatRange, SemanticVersion, VersionRange};
