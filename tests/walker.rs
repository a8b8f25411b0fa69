// SPDX-License-Identifier: MPL-2.0

use restore_graph::framework::Framework;
use restore_graph::graph::{Disposition, RestoreTargetGraph};
use restore_graph::library::{
    LibraryDependency, LibraryDependencyTarget, LibraryIdentity, LibraryIncludeFlags, LibraryRange, LibraryType,
};
use restore_graph::logging::CollectingLogger;
use restore_graph::options::RestoreOptions;
use restore_graph::project::{ProjectSpec, TargetFrameworkInformation};
use restore_graph::provider::OfflineLibraryProvider;
use restore_graph::report::report_conflict;
use restore_graph::restore::DependencyGraphResolver;
use restore_graph::VersionRange;

fn range(s: &str) -> VersionRange {
    s.parse().unwrap()
}

fn net6() -> Framework {
    "net6.0".parse().unwrap()
}

fn project(information: TargetFrameworkInformation) -> ProjectSpec {
    ProjectSpec::new("App", (1, 0, 0)).with_framework(information)
}

fn packages(names: &[(&str, &str)]) -> TargetFrameworkInformation {
    names.iter().fold(TargetFrameworkInformation::new(net6()), |information, (name, r)| {
        information.with_dependency(LibraryDependency::package(*name, range(r)))
    })
}

fn resolve_with(project: &ProjectSpec, provider: &OfflineLibraryProvider, options: &RestoreOptions) -> RestoreTargetGraph {
    let logger = CollectingLogger::new();
    let mut resolution = DependencyGraphResolver::new(project, provider, &logger, options)
        .resolve()
        .unwrap();
    resolution.graphs.remove(0)
}

fn resolve(project: &ProjectSpec, provider: &OfflineLibraryProvider) -> RestoreTargetGraph {
    resolve_with(project, provider, &RestoreOptions::default())
}

fn sorted_identities(graph: &RestoreTargetGraph) -> Vec<LibraryIdentity> {
    let mut identities: Vec<LibraryIdentity> = graph.flattened().iter().map(|item| item.key.clone()).collect();
    identities.sort();
    identities
}

fn version_of(graph: &RestoreTargetGraph, name: &str) -> Option<String> {
    graph.find(name).map(|item| item.key.version.to_string())
}

/// A -> C 1.0 and E; B -> D -> C 2.0; C 1.0 -> F; C 2.0 -> G.
fn diamond() -> OfflineLibraryProvider {
    let mut provider = OfflineLibraryProvider::new();
    provider.add_package(
        "A",
        (1, 0, 0),
        [
            LibraryDependency::package("C", range("1.0")),
            LibraryDependency::package("E", range("1.0")),
        ],
    );
    provider.add_package("B", (1, 0, 0), [LibraryDependency::package("D", range("1.0"))]);
    provider.add_package("D", (1, 0, 0), [LibraryDependency::package("C", range("2.0"))]);
    provider.add_package("C", (1, 0, 0), [LibraryDependency::package("F", range("1.0"))]);
    provider.add_package("C", (2, 0, 0), [LibraryDependency::package("G", range("1.0"))]);
    for name in ["E", "F", "G"] {
        provider.add_package(name, (1, 0, 0), []);
    }
    provider
}

#[test]
fn same_result_on_repeated_runs() {
    let provider = diamond();
    let project = project(packages(&[("A", "1.0"), ("B", "1.0")]));
    let one = resolve(&project, &provider);
    for _ in 0..10 {
        let other = resolve(&project, &provider);
        assert_eq!(one.flattened(), other.flattened());
        assert_eq!(one.install(), other.install());
        assert_eq!(one.analyze_result(), other.analyze_result());
    }
}

#[test]
fn declaration_order_does_not_matter() {
    let provider = diamond();
    let forward = resolve(&project(packages(&[("A", "1.0"), ("B", "1.0")])), &provider);
    let backward = resolve(&project(packages(&[("B", "1.0"), ("A", "1.0")])), &provider);
    assert_eq!(sorted_identities(&forward), sorted_identities(&backward));
}

#[test]
fn evicted_subtrees_leave_nothing_behind() {
    let provider = diamond();
    let graph = resolve(&project(packages(&[("A", "1.0"), ("B", "1.0")])), &provider);
    assert_eq!(version_of(&graph, "C").as_deref(), Some("2.0.0"));
    assert!(graph.find("G").is_some());
    // F was only reachable through C 1.0.0.
    assert!(graph.find("F").is_none());
    assert!(graph.find("E").is_some());
    assert!(graph.is_success());
}

#[test]
fn cycle_between_packages() {
    let mut provider = OfflineLibraryProvider::new();
    provider.add_package("A", (1, 0, 0), [LibraryDependency::package("B", range("1.0"))]);
    provider.add_package("B", (1, 0, 0), [LibraryDependency::package("A", range("1.0"))]);
    let graph = resolve(&project(packages(&[("A", "1.0")])), &provider);
    let cycles = &graph.analyze_result().cycles;
    assert_eq!(cycles.len(), 1);
    let cycle = graph.node(cycles[0]);
    assert_eq!(cycle.disposition, Disposition::Cycle);
    assert!(cycle.item.is_none());
    assert_eq!(cycle.key.name, "A");
    assert!(!graph.is_success());
}

#[test]
fn self_dependency_is_a_cycle() {
    let mut provider = OfflineLibraryProvider::new();
    provider.add_package("A", (1, 0, 0), [LibraryDependency::package("A", range("1.0"))]);
    let graph = resolve(&project(packages(&[("A", "1.0")])), &provider);
    assert_eq!(graph.analyze_result().cycles.len(), 1);
}

#[test]
fn suppression_is_inherited() {
    // A -> B (private) ; A -> C -> B. B stays out below A.
    let mut provider = OfflineLibraryProvider::new();
    provider.add_package(
        "A",
        (1, 0, 0),
        [
            LibraryDependency::package("B", range("1.0")).with_suppress_parent(LibraryIncludeFlags::ALL),
            LibraryDependency::package("C", range("1.0")),
        ],
    );
    provider.add_package("B", (1, 0, 0), []);
    provider.add_package("C", (1, 0, 0), [LibraryDependency::package("B", range("1.0"))]);
    let graph = resolve(&project(packages(&[("A", "1.0")])), &provider);
    assert!(graph.find("C").is_some());
    assert!(graph.find("B").is_none());
}

#[test]
fn direct_private_reference_still_resolves() {
    let mut provider = OfflineLibraryProvider::new();
    provider.add_package("Analyzer", (1, 0, 0), [LibraryDependency::package("Helper", range("1.0"))]);
    provider.add_package("Helper", (1, 0, 0), []);
    let information = TargetFrameworkInformation::new(net6()).with_dependency(
        LibraryDependency::package("Analyzer", range("1.0")).with_suppress_parent(LibraryIncludeFlags::ALL),
    );
    let graph = resolve(&project(information), &provider);
    assert!(graph.find("Analyzer").is_some());
    assert!(graph.find("Helper").is_some());
}

#[test]
fn unresolved_libraries_do_not_stop_the_walk() {
    let mut provider = OfflineLibraryProvider::new();
    provider.add_package("A", (1, 0, 0), [LibraryDependency::package("Missing", range("3.0"))]);
    provider.add_package("B", (1, 0, 0), []);
    let graph = resolve(&project(packages(&[("A", "1.0"), ("B", "1.0")])), &provider);
    assert!(graph.find("B").is_some());
    assert_eq!(graph.unresolved().len(), 1);
    let missing = graph.unresolved().iter().next().unwrap();
    assert_eq!(missing.name, "Missing");
    let item = graph.find("Missing").unwrap();
    assert_eq!(item.key.library_type, LibraryType::Unresolved);
    assert_eq!(item.key.version.to_string(), "3.0.0");
    assert!(!graph.is_success());
    assert!(graph.install().iter().all(|package| package.library.name != "Missing"));
}

#[test]
fn unsatisfiable_pin_is_a_conflict() {
    // A pins C to exactly 1.0.0 while B asks for at least 2.0.0.
    let mut provider = OfflineLibraryProvider::new();
    provider.add_package("A", (1, 0, 0), [LibraryDependency::package("C", range("[1.0.0]"))]);
    provider.add_package("B", (1, 0, 0), [LibraryDependency::package("C", range("2.0"))]);
    provider.add_package("C", (1, 0, 0), []);
    provider.add_package("C", (2, 0, 0), []);
    let graph = resolve(&project(packages(&[("A", "1.0"), ("B", "1.0")])), &provider);
    let conflicts = &graph.analyze_result().version_conflicts;
    assert_eq!(conflicts.len(), 1);
    assert!(graph.in_conflict());

    let text = report_conflict(&graph, &conflicts[0]);
    assert!(text.starts_with("Unable to satisfy conflicting requests for 'C'."), "{}", text);
    assert!(text.contains("App -> A 1.0.0 -> C (= 1.0.0)"), "{}", text);
    assert!(text.contains("App -> B 1.0.0 -> C (>= 2.0.0)"), "{}", text);
}

#[test]
fn central_versions_pin_transitive_packages() {
    let mut provider = OfflineLibraryProvider::new();
    provider.add_package("A", (1, 0, 0), [LibraryDependency::package("B", range("1.0"))]);
    provider.add_package("B", (1, 0, 0), []);
    provider.add_package("B", (1, 5, 0), []);
    let information = packages(&[("A", "1.0")]).with_central_version("B", range("1.5"));
    let project = project(information);

    let graph = resolve(&project, &provider);
    assert_eq!(version_of(&graph, "B").as_deref(), Some("1.0.0"));
    assert!(!graph.find("B").unwrap().is_central_transitive);

    let options = RestoreOptions {
        central_transitive_pinning: true,
        ..RestoreOptions::default()
    };
    let graph = resolve_with(&project, &provider, &options);
    let pinned = graph.find("B").unwrap();
    assert_eq!(pinned.key.version.to_string(), "1.5.0");
    assert!(pinned.is_central_transitive);

    // Pinned packages hang off the root and remember who asked for them.
    let (_, node) = graph
        .nodes()
        .find(|(_, node)| node.disposition == Disposition::Accepted && node.identity() == Some(&pinned.key))
        .unwrap();
    assert_eq!(node.outer, graph.root());
    assert_eq!(node.parent_nodes.len(), 1);
    let requester = graph.node(node.parent_nodes[0]);
    assert_eq!(requester.key.name, "A");
}

/// Evicted ranges keep competing until their records settle; the walk still ends.
#[test]
fn chained_evictions_settle() {
    let dep = |name: &str, r: &str| LibraryDependency::package(name, range(r));
    let missing = || [dep("Missing", "1.0")];
    let mut provider = OfflineLibraryProvider::new();
    provider.add_package("v0", (4, 0, 0), [dep("v", "0.0"), dep("I", "1.0")]);
    provider.add_package("v", (0, 0, 0), [dep("Uq", "0.0")]);
    provider.add_package("I", (1, 0, 0), [dep("a", "0.0"), dep("uI", "0.0")]);
    provider.add_package("a", (0, 0, 0), [dep("aB", "0.0")]);
    provider.add_package("a", (2, 0, 0), missing());
    provider.add_package("aB", (0, 0, 0), [dep("Aa", "4.0")]);
    provider.add_package("Aa", (3, 0, 0), [dep("a", "2.0")]);
    provider.add_package("Aa", (4, 0, 0), [dep("Uq", "4.0")]);
    provider.add_package("uI", (0, 0, 0), [dep("Uq", "[1.0,4.0)")]);
    provider.add_package("Uq", (0, 0, 0), [dep("Aa", "[3.0,4.0)")]);
    provider.add_package("Uq", (1, 0, 0), missing());
    provider.add_package("Uq", (4, 0, 0), missing());
    let project = project(packages(&[("v0", "4.0")]));

    let graph = resolve(&project, &provider);
    assert_eq!(version_of(&graph, "v0").as_deref(), Some("4.0.0"));
    for name in ["v", "I", "a", "aB", "Aa", "uI", "Uq"] {
        let found = graph.flattened().iter().filter(|item| item.key.name == name).count();
        assert_eq!(found, 1, "{}", name);
    }
    assert!(graph.unresolved().iter().any(|missing| missing.name == "Missing"));
}

/// A package request for a library first found as a project replaces it with the package.
#[test]
fn package_request_takes_a_project_back() {
    let mut provider = OfflineLibraryProvider::new();
    let loose = LibraryDependency::new(LibraryRange::new(
        "Lib",
        Some(range("1.0")),
        LibraryDependencyTarget::PACKAGE_PROJECT_EXTERNAL,
    ));
    provider.add_package("B", (1, 0, 0), [loose]);
    provider.add_package("A", (1, 0, 0), [LibraryDependency::package("Lib", range("1.0"))]);
    provider.add_project("Lib", (1, 0, 0), vec![(net6(), vec![])]);
    provider.add_package("Lib", (1, 0, 0), []);
    let project = project(packages(&[("B", "1.0"), ("A", "1.0")]));

    let graph = resolve(&project, &provider);
    let lib = graph.find("Lib").unwrap();
    assert_eq!(lib.key.library_type, LibraryType::Package);
    assert_eq!(lib.key.version.to_string(), "1.0.0");
    assert_eq!(graph.flattened().iter().filter(|item| item.key.name == "Lib").count(), 1);
}
