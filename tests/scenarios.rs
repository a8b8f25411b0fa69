// SPDX-License-Identifier: MPL-2.0

use log::LevelFilter;
use restore_graph::compat::{CompatibilityChecker, CompatibilityIssueKind};
use restore_graph::content::{InMemoryContentSource, PackageContent};
use restore_graph::framework::Framework;
use restore_graph::graph::RestoreTargetGraph;
use restore_graph::library::{LibraryDependency, LibraryIncludeFlags};
use restore_graph::logging::{CollectingLogger, RestoreLogCode};
use restore_graph::options::RestoreOptions;
use restore_graph::project::{ProjectSpec, TargetFrameworkInformation};
use restore_graph::provider::OfflineLibraryProvider;
use restore_graph::report::{log_graph_diagnostics, report_cycle, report_downgrade};
use restore_graph::restore::DependencyGraphResolver;
use restore_graph::VersionRange;

fn init_log() {
    let _ = env_logger::builder()
        .filter_level(LevelFilter::Trace)
        .is_test(true)
        .try_init();
}

fn range(s: &str) -> VersionRange {
    s.parse().unwrap()
}

fn net6() -> Framework {
    "net6.0".parse().unwrap()
}

fn app(dependencies: Vec<LibraryDependency>) -> ProjectSpec {
    let information = dependencies
        .into_iter()
        .fold(TargetFrameworkInformation::new(net6()), TargetFrameworkInformation::with_dependency);
    ProjectSpec::new("App", (1, 0, 0)).with_framework(information)
}

fn resolve(project: &ProjectSpec, provider: &OfflineLibraryProvider) -> RestoreTargetGraph {
    init_log();
    let (logger, options) = (CollectingLogger::new(), RestoreOptions::default());
    let mut resolution = DependencyGraphResolver::new(project, provider, &logger, &options)
        .resolve()
        .unwrap();
    assert_eq!(resolution.graphs.len(), 1);
    resolution.graphs.remove(0)
}

fn version_of(graph: &RestoreTargetGraph, name: &str) -> Option<String> {
    graph.find(name).map(|item| item.key.version.to_string())
}

/// A chain of open ranges takes the lowest available version of each library.
#[test]
fn simple_chain() {
    let mut provider = OfflineLibraryProvider::new();
    provider.add_package("PackageA", (1, 2, 0), [LibraryDependency::package("PackageB", range("[1.0.0, )"))]);
    provider.add_package("PackageB", (1, 1, 0), []);
    let project = app(vec![LibraryDependency::package("PackageA", range("[1.0.0, )"))]);

    let graph = resolve(&project, &provider);
    assert_eq!(graph.flattened().len(), 3);
    assert_eq!(version_of(&graph, "PackageA").as_deref(), Some("1.2.0"));
    assert_eq!(version_of(&graph, "PackageB").as_deref(), Some("1.1.0"));
    let analyze = graph.analyze_result();
    assert!(analyze.cycles.is_empty() && analyze.version_conflicts.is_empty() && analyze.downgrades.is_empty());
    assert!(graph.is_success());
    assert_eq!(graph.install().len(), 2);
}

/// The root's own reference wins over a higher transitive request, which becomes a downgrade.
#[test]
fn direct_reference_wins_over_transitive() {
    let mut provider = OfflineLibraryProvider::new();
    provider.add_package("PackageA", (1, 0, 0), [LibraryDependency::package("PackageB", range("[2.0.0, )"))]);
    provider.add_package("PackageB", (1, 0, 0), []);
    provider.add_package("PackageB", (2, 0, 0), []);
    let project = app(vec![
        LibraryDependency::package("PackageA", range("[1.0.0, )")),
        LibraryDependency::package("PackageB", range("[1.0.0, )")),
    ]);

    let graph = resolve(&project, &provider);
    assert_eq!(version_of(&graph, "PackageB").as_deref(), Some("1.0.0"));
    let downgrades = &graph.analyze_result().downgrades;
    assert_eq!(downgrades.len(), 1);
    assert!(graph.is_success());

    let text = report_downgrade(&graph, &downgrades[0]);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(
        lines[0],
        "Detected package downgrade: PackageB from 2.0.0 to 1.0.0. Reference the package directly from the project to select a different version."
    );
    assert_eq!(lines[1], "  App -> PackageA 1.0.0 -> PackageB (>= 2.0.0)");
    assert_eq!(lines[2], "  App -> PackageB (>= 1.0.0)");

    let logger = CollectingLogger::new();
    assert!(!log_graph_diagnostics(&[graph], &logger, &RestoreOptions::default()));
    assert_eq!(logger.with_code(RestoreLogCode::Downgrade).len(), 1);
}

/// Without a direct reference the transitive request is simply satisfied.
#[test]
fn transitive_requests_pick_the_highest_minimum() {
    let mut provider = OfflineLibraryProvider::new();
    provider.add_package("PackageA", (1, 0, 0), [LibraryDependency::package("PackageC", range("1.0"))]);
    provider.add_package("PackageB", (1, 0, 0), [LibraryDependency::package("PackageC", range("2.0"))]);
    provider.add_package("PackageC", (1, 0, 0), []);
    provider.add_package("PackageC", (2, 0, 0), []);
    let project = app(vec![
        LibraryDependency::package("PackageA", range("1.0")),
        LibraryDependency::package("PackageB", range("1.0")),
    ]);

    let graph = resolve(&project, &provider);
    assert_eq!(version_of(&graph, "PackageC").as_deref(), Some("2.0.0"));
    assert!(graph.analyze_result().downgrades.is_empty());
}

/// Nothing flows through a private dependency.
#[test]
fn suppressed_edges_hide_their_subtree() {
    let mut provider = OfflineLibraryProvider::new();
    provider.add_package(
        "PackageA",
        (1, 0, 0),
        [LibraryDependency::package("PackageB", range("[1.0.0, )")).with_suppress_parent(LibraryIncludeFlags::ALL)],
    );
    provider.add_package("PackageB", (1, 0, 0), [LibraryDependency::package("PackageC", range("[1.0.0, )"))]);
    provider.add_package("PackageC", (1, 0, 0), []);
    provider.add_package("PackageD", (1, 0, 0), [LibraryDependency::package("PackageC", range("[1.0.0, )"))]);

    let graph = resolve(
        &app(vec![LibraryDependency::package("PackageA", range("1.0"))]),
        &provider,
    );
    assert!(graph.find("PackageB").is_none());
    assert!(graph.find("PackageC").is_none());

    // Another path still brings PackageC in.
    let graph = resolve(
        &app(vec![
            LibraryDependency::package("PackageA", range("1.0")),
            LibraryDependency::package("PackageD", range("1.0")),
        ]),
        &provider,
    );
    assert!(graph.find("PackageB").is_none());
    assert_eq!(version_of(&graph, "PackageC").as_deref(), Some("1.0.0"));
}

/// An override pins the version whatever descendants ask for.
#[test]
fn override_pins_the_version() {
    let mut provider = OfflineLibraryProvider::new();
    provider.add_package("PackageA", (1, 0, 0), [LibraryDependency::package("PackageB", range("[1.0.0, )"))]);
    provider.add_package("PackageB", (1, 5, 0), []);
    provider.add_package("PackageB", (2, 0, 0), []);
    let project = app(vec![
        LibraryDependency::package("PackageA", range("1.0")),
        LibraryDependency::package("PackageB", range("1.0")).with_version_override(range("[2.0.0]")),
    ]);

    let graph = resolve(&project, &provider);
    assert_eq!(version_of(&graph, "PackageB").as_deref(), Some("2.0.0"));
    assert!(graph.analyze_result().downgrades.is_empty());
    assert!(graph.is_success());
}

/// App -> Y -> App is one cycle, and the restore fails.
#[test]
fn circular_project_references() {
    let mut provider = OfflineLibraryProvider::new();
    provider.add_project("Y", (1, 0, 0), vec![(net6(), vec![LibraryDependency::project("App")])]);
    let project = app(vec![LibraryDependency::project("Y")]);

    let graph = resolve(&project, &provider);
    let cycles = &graph.analyze_result().cycles;
    assert_eq!(cycles.len(), 1);
    assert!(graph.in_conflict());
    assert!(!graph.is_success());
    assert_eq!(report_cycle(&graph, cycles[0]), "Cycle detected.\n  App -> Y 1.0.0 -> App");

    let logger = CollectingLogger::new();
    assert!(log_graph_diagnostics(&[graph], &logger, &RestoreOptions::default()));
    assert_eq!(logger.with_code(RestoreLogCode::Cycle).len(), 1);
}

/// A package built only for .NET Framework cannot be used on .NET 6.
#[test]
fn package_without_compatible_assets() {
    let mut provider = OfflineLibraryProvider::new();
    provider.add_package("Foo", (1, 0, 0), []);
    let graph = resolve(&app(vec![LibraryDependency::package("Foo", range("1.0"))]), &provider);

    let mut content = InMemoryContentSource::new();
    content.add("Foo", (1, 0, 0), PackageContent::from_files(["lib/net472/foo.dll"]));
    let options = RestoreOptions::default();
    let result = CompatibilityChecker::new(&content, &options).check(&graph);

    assert_eq!(result.issues.len(), 1);
    let issue = &result.issues[0];
    assert_eq!(issue.kind, CompatibilityIssueKind::IncompatiblePackage);
    assert_eq!(issue.available_frameworks, vec!["net472".parse::<Framework>().unwrap()]);
    assert_eq!(
        issue.to_string(),
        "Package Foo 1.0.0 is not compatible with net6.0. Package Foo 1.0.0 supports: net472"
    );
}
