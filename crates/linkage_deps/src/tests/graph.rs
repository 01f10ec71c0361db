use super::artifact;
use crate::{
    ArtifactKey, Dependency, DependencyGraphBuilder, DependencyScope, Exclusion, GraphBuildError,
    GraphMode, GraphRequest, InMemoryRepository,
};

fn compile(coordinates: &str) -> Dependency {
    Dependency::compile(artifact(coordinates))
}

/// a -> (b, c), b -> d:1.0, c -> d:2.0
fn diamond_repository() -> InMemoryRepository {
    let mut repository = InMemoryRepository::new();
    repository
        .add(
            artifact("g:a:1.0"),
            None,
            vec![compile("g:b:1.0"), compile("g:c:1.0")],
        )
        .add(artifact("g:b:1.0"), None, vec![compile("g:d:1.0")])
        .add(artifact("g:c:1.0"), None, vec![compile("g:d:2.0")])
        .add(artifact("g:d:1.0"), None, Vec::new())
        .add(artifact("g:d:2.0"), None, Vec::new());
    repository
}

fn leaf_coordinates(graph: &crate::DependencyGraph) -> Vec<String> {
    graph
        .paths()
        .iter()
        .filter_map(|path| path.leaf().map(|leaf| leaf.coordinates()))
        .collect()
}

#[test]
fn full_graph_keeps_every_version_in_level_order() {
    let builder = DependencyGraphBuilder::new(diamond_repository());
    let graph = builder
        .build_dependency_graph(&[artifact("g:a:1.0")], false)
        .expect("diamond graph should resolve");

    assert_eq!(
        leaf_coordinates(&graph),
        vec!["g:a:1.0", "g:b:1.0", "g:c:1.0", "g:d:1.0", "g:d:2.0"]
    );
    assert_eq!(graph.find_conflicts(), vec![ArtifactKey::new("g", "d")]);
    assert_eq!(graph.versions(&ArtifactKey::new("g", "d")), vec!["1.0", "2.0"]);
    assert_eq!(graph.paths_to("g:d:2.0").len(), 1);
    assert_eq!(graph.conflicting_paths().len(), 2);
}

#[test]
fn conflicts_are_exactly_keys_with_several_versions() {
    let mut repository = diamond_repository();
    repository.add(
        artifact("g:root:1.0"),
        None,
        vec![compile("g:a:1.0"), compile("g:b:1.0")],
    );
    let builder = DependencyGraphBuilder::new(repository);
    let graph = builder
        .build_dependency_graph(&[artifact("g:root:1.0")], false)
        .expect("graph should resolve");

    for key in graph.keys() {
        let several = graph.versions(key).len() > 1;
        assert_eq!(graph.find_conflicts().contains(key), several, "{key}");
    }
    assert_eq!(graph.find_conflicts(), vec![ArtifactKey::new("g", "d")]);
}

#[test]
fn suggests_updates_for_outdated_leaves() {
    let builder = DependencyGraphBuilder::new(diamond_repository());
    let graph = builder
        .build_dependency_graph(&[artifact("g:a:1.0")], false)
        .expect("diamond graph should resolve");

    let updates = graph.find_updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].to_string(), "g:b:1.0 needs to upgrade g:d:1.0 to 2.0");
}

#[test]
fn prunes_cycles_on_artifact_identity() {
    let mut repository = InMemoryRepository::new();
    repository
        .add(artifact("g:a:1.0"), None, vec![compile("g:b:1.0")])
        .add(artifact("g:b:1.0"), None, vec![compile("g:a:1.0")]);
    let builder = DependencyGraphBuilder::new(repository);

    let graph = builder
        .build_dependency_graph(&[artifact("g:a:1.0")], false)
        .expect("cyclic graph should still resolve");
    assert_eq!(leaf_coordinates(&graph), vec!["g:a:1.0", "g:b:1.0"]);
}

#[test]
fn memoizes_repository_calls_per_builder() {
    let builder = DependencyGraphBuilder::new(diamond_repository());
    builder
        .build_dependency_graph(&[artifact("g:a:1.0")], false)
        .expect("first build should succeed");
    let calls = builder.repository().resolve_calls();
    assert_eq!(calls, 5);

    builder
        .build_dependency_graph(&[artifact("g:a:1.0")], false)
        .expect("second build should succeed");
    assert_eq!(builder.repository().resolve_calls(), calls);
}

#[test]
fn aggregates_mandatory_failures() {
    let mut repository = InMemoryRepository::new();
    repository.add(
        artifact("g:a:1.0"),
        None,
        vec![
            compile("g:missing:1.0"),
            compile("g:optional:1.0").optional(true),
        ],
    );
    let builder = DependencyGraphBuilder::new(repository);

    let error = builder
        .build_dependency_graph(&[artifact("g:a:1.0")], false)
        .expect_err("missing mandatory dependency should be fatal");
    let failures = error.failures();
    assert_eq!(failures.len(), 2);
    assert_eq!(
        failures[0].to_string(),
        "g:a:1.0 / g:missing:1.0: アーティファクト g:missing:1.0 がリポジトリに見つかりません"
    );
    assert!(error.to_string().starts_with("依存解決に失敗しました\n"));
}

#[test]
fn partial_build_keeps_transitive_failures_on_the_graph() {
    let mut repository = InMemoryRepository::new();
    repository
        .add(artifact("g:a:1.0"), None, vec![compile("g:b:1.0")])
        .add(artifact("g:b:1.0"), None, vec![compile("g:missing:1.0")]);
    let builder = DependencyGraphBuilder::new(repository);
    let request = GraphRequest::artifacts(&[artifact("g:a:1.0")]);

    let strict = builder
        .build(&request, GraphMode::Full, false)
        .expect_err("mandatory transitive failure is fatal for a strict build");
    assert_eq!(strict.failures().len(), 1);

    let graph = builder
        .build_partial(&request, GraphMode::Full, false)
        .expect("transitive failure is not fatal for a partial build");
    let unresolved: Vec<String> = graph
        .unresolved_artifacts()
        .map(ToString::to_string)
        .collect();
    assert_eq!(
        unresolved,
        vec!["g:missing:1.0 was not resolved. Dependency path: g:a:1.0 > g:b:1.0 > g:missing:1.0"]
    );

    let missing_root = builder
        .build_partial(
            &GraphRequest::artifacts(&[artifact("g:absent:1.0")]),
            GraphMode::Full,
            false,
        )
        .expect_err("requested artifact failure stays fatal");
    assert!(missing_root.to_string().contains("g:absent:1.0"));
}

#[test]
fn optional_failures_are_recorded_on_the_graph() {
    let mut repository = InMemoryRepository::new();
    repository.add(
        artifact("g:a:1.0"),
        None,
        vec![compile("g:optional:1.0").optional(true)],
    );
    let builder = DependencyGraphBuilder::new(repository);

    let graph = builder
        .build_dependency_graph(&[artifact("g:a:1.0")], false)
        .expect("optional failure is not fatal");
    let unresolved: Vec<String> = graph
        .unresolved_artifacts()
        .map(ToString::to_string)
        .collect();
    assert_eq!(
        unresolved,
        vec!["g:optional:1.0 was not resolved. Dependency path: g:a:1.0 > g:optional:1.0"]
    );
}

#[test]
fn repository_failures_carry_the_reason() {
    let mut repository = InMemoryRepository::new();
    repository
        .add(artifact("g:a:1.0"), None, vec![compile("g:flaky:1.0")])
        .add_failure(&artifact("g:flaky:1.0"), "connection reset");
    let builder = DependencyGraphBuilder::new(repository);

    let error = builder
        .build_dependency_graph(&[artifact("g:a:1.0")], false)
        .expect_err("unavailable mandatory dependency should be fatal");
    assert!(matches!(error, GraphBuildError::Aggregated(_)));
    assert!(error.to_string().contains("connection reset"));
}

#[test]
fn drops_test_scope_and_zip_artifacts() {
    let mut repository = InMemoryRepository::new();
    repository
        .add(
            artifact("g:a:1.0"),
            None,
            vec![
                Dependency::new(artifact("g:junit:4.13"), DependencyScope::Test),
                Dependency::compile(artifact("g:dist:1.0").with_extension("zip")),
                Dependency::new(artifact("g:servlet:3.0"), DependencyScope::Provided),
            ],
        )
        .add(artifact("g:servlet:3.0"), None, Vec::new());
    let builder = DependencyGraphBuilder::new(repository);

    let without_provided = builder
        .build_dependency_graph(&[artifact("g:a:1.0")], false)
        .expect("graph should resolve");
    assert_eq!(leaf_coordinates(&without_provided), vec!["g:a:1.0"]);

    let with_provided = builder
        .build_dependency_graph(&[artifact("g:a:1.0")], true)
        .expect("graph should resolve");
    assert_eq!(
        leaf_coordinates(&with_provided),
        vec!["g:a:1.0", "g:servlet:3.0"]
    );
}

#[test]
fn system_scope_is_recorded_but_not_resolved() {
    let mut repository = InMemoryRepository::new();
    repository.add(
        artifact("g:a:1.0"),
        None,
        vec![Dependency::new(
            artifact("com.sun:tools:1.8"),
            DependencyScope::System,
        )],
    );
    let builder = DependencyGraphBuilder::new(repository);

    let graph = builder
        .build_dependency_graph(&[artifact("g:a:1.0")], false)
        .expect("system dependency should not be resolved");
    assert_eq!(leaf_coordinates(&graph), vec!["g:a:1.0", "com.sun:tools:1.8"]);
    assert_eq!(builder.repository().resolve_calls(), 1);
}

#[test]
fn maven_graph_drops_optional_and_deep_provided_edges() {
    let mut repository = InMemoryRepository::new();
    repository
        .add(
            artifact("g:a:1.0"),
            None,
            vec![
                compile("g:b:1.0").optional(true),
                compile("g:c:1.0"),
                Dependency::new(artifact("g:api:1.0"), DependencyScope::Provided),
            ],
        )
        .add(artifact("g:b:1.0"), None, Vec::new())
        .add(
            artifact("g:c:1.0"),
            None,
            vec![Dependency::new(
                artifact("g:container:1.0"),
                DependencyScope::Provided,
            )],
        )
        .add(artifact("g:api:1.0"), None, Vec::new())
        .add(artifact("g:container:1.0"), None, Vec::new());
    let builder = DependencyGraphBuilder::new(repository);

    let graph = builder
        .build_maven_dependency_graph(&[compile("g:a:1.0")], true)
        .expect("maven graph should resolve");
    assert_eq!(
        leaf_coordinates(&graph),
        vec!["g:a:1.0", "g:c:1.0", "g:api:1.0"]
    );

    let full = builder
        .build_dependency_graph(&[artifact("g:a:1.0")], true)
        .expect("full graph should resolve");
    assert_eq!(
        leaf_coordinates(&full),
        vec![
            "g:a:1.0",
            "g:b:1.0",
            "g:c:1.0",
            "g:api:1.0",
            "g:container:1.0"
        ]
    );
}

#[test]
fn maven_graph_applies_inherited_exclusions() {
    let mut repository = InMemoryRepository::new();
    repository
        .add(
            artifact("g:a:1.0"),
            None,
            vec![compile("g:b:1.0").with_exclusion(Exclusion::new("g", "legacy"))],
        )
        .add(artifact("g:b:1.0"), None, vec![compile("g:c:1.0")])
        .add(artifact("g:c:1.0"), None, vec![compile("g:legacy:1.0")])
        .add(artifact("g:legacy:1.0"), None, Vec::new());
    let builder = DependencyGraphBuilder::new(repository);

    let maven = builder
        .build_maven_dependency_graph(&[compile("g:a:1.0")], false)
        .expect("maven graph should resolve");
    assert_eq!(
        leaf_coordinates(&maven),
        vec!["g:a:1.0", "g:b:1.0", "g:c:1.0"]
    );

    let full = builder
        .build_dependency_graph(&[artifact("g:a:1.0")], false)
        .expect("full graph should resolve");
    assert!(leaf_coordinates(&full).contains(&"g:legacy:1.0".to_string()));
}

#[test]
fn maven_graph_only_fails_on_mandatory_roots() {
    let mut repository = InMemoryRepository::new();
    repository.add(artifact("g:a:1.0"), None, vec![compile("g:gone:1.0")]);
    let builder = DependencyGraphBuilder::new(repository);

    let graph = builder
        .build_maven_dependency_graph(&[compile("g:a:1.0")], false)
        .expect("transitive failure is not fatal in maven mode");
    assert_eq!(graph.unresolved_artifacts().count(), 1);

    let error = builder
        .build_maven_dependency_graph(&[compile("g:a:1.0"), compile("g:absent:1.0")], false)
        .expect_err("missing requested artifact is fatal");
    assert_eq!(error.failures().len(), 1);

    let graph = builder
        .build_maven_dependency_graph(
            &[compile("g:a:1.0"), compile("g:absent:1.0").optional(true)],
            false,
        )
        .expect("optional requested artifact is not fatal");
    let unresolved: Vec<String> = graph
        .unresolved_artifacts()
        .map(|problem| problem.artifact.coordinates())
        .collect();
    assert_eq!(unresolved, vec!["g:absent:1.0", "g:gone:1.0"]);
}

#[test]
fn maven_graph_memoizes_collected_trees() {
    let builder = DependencyGraphBuilder::new(diamond_repository());
    let first = builder
        .build_maven_dependency_graph(&[compile("g:a:1.0")], false)
        .expect("maven graph should resolve");
    let calls = builder.repository().resolve_calls();

    let second = builder
        .build_maven_dependency_graph(&[compile("g:a:1.0")], false)
        .expect("maven graph should resolve");
    assert_eq!(builder.repository().resolve_calls(), calls);
    assert_eq!(first.paths(), second.paths());
}

#[test]
fn empty_request_is_rejected() {
    let builder = DependencyGraphBuilder::new(InMemoryRepository::new());
    let error = builder
        .build_maven_dependency_graph(&[], false)
        .expect_err("empty request should be rejected");
    assert_eq!(error, GraphBuildError::EmptyRequest);
}
