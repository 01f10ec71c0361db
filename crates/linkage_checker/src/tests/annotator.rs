use super::{ClassBuilder, Insn, artifact, descriptions, jar_entry, write_jar};
use crate::annotator::{CauseAnnotator, annotate_causes};
use crate::checker::{check_artifacts, find_linkage_problems};
use crate::classfile::ACC_PUBLIC;
use crate::config::CheckerConfig;
use crate::problem::{DroppedEdge, ErrorType, LinkageProblem, LinkageProblemCause};
use crate::report::LinkageCheckReport;
use crate::symbol::{ClassFile, Symbol};
use linkage_deps::{
    ClassPathBuilder, ClassPathResult, Dependency, Exclusion, InMemoryRepository, MediationPolicy,
    NearestWins,
};
use std::path::Path;
use tempfile::tempdir;

/// Registers `coordinates` with a jar holding `classes`.
fn publish(
    repository: &mut InMemoryRepository,
    dir: &Path,
    coordinates: &str,
    classes: &[ClassBuilder],
    dependencies: Vec<Dependency>,
) {
    let file_name = format!("{}.jar", coordinates.replace(':', "-"));
    let jar = write_jar(dir, &file_name, classes);
    repository.add(artifact(coordinates), Some(jar), dependencies);
}

fn compile(coordinates: &str) -> Dependency {
    Dependency::compile(artifact(coordinates))
}

fn resolve_app(builder: &ClassPathBuilder<InMemoryRepository>) -> ClassPathResult {
    builder
        .resolve(&[artifact("com.example:app:1.0")], false, &NearestWins)
        .expect("class path should resolve")
}

fn check(class_path: &ClassPathResult) -> LinkageCheckReport {
    find_linkage_problems(
        class_path.class_path(),
        &[],
        None,
        &CheckerConfig::default(),
    )
    .expect("linkage check should run")
}

fn only_cause(problems: &indexmap::IndexSet<LinkageProblem>) -> &LinkageProblemCause {
    assert_eq!(problems.len(), 1);
    problems
        .first()
        .and_then(LinkageProblem::cause)
        .expect("problem should be annotated")
}

#[test]
fn optional_dependency_left_off_the_class_path_is_missing() {
    let dir = tempdir().expect("temp dir");
    let mut repository = InMemoryRepository::new();
    publish(
        &mut repository,
        dir.path(),
        "com.example:app:1.0",
        &[ClassBuilder::new("com.app.Main").method(
            ACC_PUBLIC,
            "run",
            "()V",
            &[Insn::InvokeStatic("com.opt.Feature", "enable", "()V")],
        )],
        vec![compile("com.example:opt:1.0").optional(true)],
    );
    publish(
        &mut repository,
        dir.path(),
        "com.example:opt:1.0",
        &[ClassBuilder::new("com.opt.Feature").method(ACC_PUBLIC, "enable", "()V", &[])],
        Vec::new(),
    );
    let builder = ClassPathBuilder::new(repository);
    let class_path = resolve_app(&builder);
    assert_eq!(class_path.class_path().len(), 1);

    let report = check(&class_path);
    assert_eq!(
        descriptions(&report),
        vec!["Class com.opt.Feature is not found, referenced by com.app.Main"]
    );

    let annotated = annotate_causes(&builder, &class_path, report.problems())
        .expect("causes should be computed");
    let cause = only_cause(&annotated);
    let LinkageProblemCause::MissingDependency { path, dropped_by } = cause else {
        panic!("expected a missing dependency, got {cause:?}");
    };
    assert_eq!(*dropped_by, Some(DroppedEdge::Optional));
    assert_eq!(
        path.to_string(),
        "com.example:app:1.0 (compile) / com.example:opt:1.0 (compile, optional)"
    );
    assert_eq!(
        cause.to_string(),
        "The valid symbol is in com.example:opt:1.0 at com.example:app:1.0 (compile) / \
         com.example:opt:1.0 (compile, optional) but it was not selected because the path \
         contains an optional dependency"
    );
}

#[test]
fn nearer_older_version_is_a_dependency_conflict() {
    let dir = tempdir().expect("temp dir");
    let mut repository = InMemoryRepository::new();
    publish(
        &mut repository,
        dir.path(),
        "com.example:app:1.0",
        &[ClassBuilder::new("com.app.Main")],
        vec![compile("com.example:lib:1.0"), compile("com.example:client:1.0")],
    );
    publish(
        &mut repository,
        dir.path(),
        "com.example:client:1.0",
        &[ClassBuilder::new("com.client.Client").method(
            ACC_PUBLIC,
            "run",
            "()V",
            &[Insn::InvokeVirtual("com.lib.Foo", "newApi", "()V")],
        )],
        vec![compile("com.example:lib:2.0")],
    );
    publish(
        &mut repository,
        dir.path(),
        "com.example:lib:1.0",
        &[ClassBuilder::new("com.lib.Foo")],
        Vec::new(),
    );
    publish(
        &mut repository,
        dir.path(),
        "com.example:lib:2.0",
        &[ClassBuilder::new("com.lib.Foo").method(ACC_PUBLIC, "newApi", "()V", &[])],
        Vec::new(),
    );
    let builder = ClassPathBuilder::new(repository);
    let class_path = resolve_app(&builder);

    let report = check(&class_path);
    let problem = report.problems().first().expect("one problem");
    assert_eq!(report.len(), 1);
    assert_eq!(problem.error_type(), &ErrorType::SymbolNotFound);

    let mut annotator = CauseAnnotator::new(&builder, &class_path);
    let cause = annotator.cause_of(problem).expect("cause should be computed");
    let LinkageProblemCause::DependencyConflict {
        symbol,
        selected,
        unselected,
    } = &cause
    else {
        panic!("expected a dependency conflict, got {cause:?}");
    };
    assert_eq!(symbol, &Symbol::method("com.lib.Foo", "newApi", "()V", false));
    assert_eq!(
        selected.to_string(),
        "com.example:app:1.0 (compile) / com.example:lib:1.0 (compile)"
    );
    assert_eq!(
        unselected.to_string(),
        "com.example:app:1.0 (compile) / com.example:client:1.0 (compile) / com.example:lib:2.0 (compile)"
    );

    // the subtree of the client artifact is resolved once per annotator
    assert_eq!(annotator.cause_of(problem).expect("cached cause"), cause);
}

#[test]
fn configured_mediation_picks_the_version_that_is_checked() {
    let dir = tempdir().expect("temp dir");
    let mut repository = InMemoryRepository::new();
    publish(
        &mut repository,
        dir.path(),
        "com.example:app:1.0",
        &[ClassBuilder::new("com.app.Main")],
        vec![compile("com.example:lib:1.0"), compile("com.example:client:1.0")],
    );
    publish(
        &mut repository,
        dir.path(),
        "com.example:client:1.0",
        &[ClassBuilder::new("com.client.Client").method(
            ACC_PUBLIC,
            "run",
            "()V",
            &[Insn::InvokeVirtual("com.lib.Foo", "newApi", "()V")],
        )],
        vec![compile("com.example:lib:2.0")],
    );
    publish(
        &mut repository,
        dir.path(),
        "com.example:lib:1.0",
        &[ClassBuilder::new("com.lib.Foo")],
        Vec::new(),
    );
    publish(
        &mut repository,
        dir.path(),
        "com.example:lib:2.0",
        &[ClassBuilder::new("com.lib.Foo").method(ACC_PUBLIC, "newApi", "()V", &[])],
        Vec::new(),
    );
    let builder = ClassPathBuilder::new(repository);
    let app = [artifact("com.example:app:1.0")];

    let (class_path, report) =
        check_artifacts(&builder, &app, &CheckerConfig::default()).expect("nearest check");
    let lib = class_path
        .entry_for_key("com.example", "lib")
        .and_then(|entry| entry.artifact())
        .expect("lib on the class path");
    assert_eq!(lib.version, "1.0");
    assert_eq!(report.len(), 1);
    assert_eq!(
        report.problems().first().map(LinkageProblem::error_type),
        Some(&ErrorType::SymbolNotFound)
    );

    let highest = CheckerConfig {
        mediation: MediationPolicy::Highest,
        ..CheckerConfig::default()
    };
    let (class_path, report) = check_artifacts(&builder, &app, &highest).expect("highest check");
    let lib = class_path
        .entry_for_key("com.example", "lib")
        .and_then(|entry| entry.artifact())
        .expect("lib on the class path");
    assert_eq!(lib.version, "2.0");
    assert!(report.is_empty());
}

#[test]
fn excluded_dependency_names_the_excluding_artifact() {
    let dir = tempdir().expect("temp dir");
    let mut repository = InMemoryRepository::new();
    publish(
        &mut repository,
        dir.path(),
        "com.example:app:1.0",
        &[ClassBuilder::new("com.app.Main")],
        vec![
            compile("com.example:client:1.0")
                .with_exclusion(Exclusion::new("com.example", "lib")),
        ],
    );
    publish(
        &mut repository,
        dir.path(),
        "com.example:client:1.0",
        &[ClassBuilder::new("com.client.Client").method(
            ACC_PUBLIC,
            "run",
            "()V",
            &[Insn::New("com.lib.Foo")],
        )],
        vec![compile("com.example:lib:1.0")],
    );
    publish(
        &mut repository,
        dir.path(),
        "com.example:lib:1.0",
        &[ClassBuilder::new("com.lib.Foo")],
        Vec::new(),
    );
    let builder = ClassPathBuilder::new(repository);
    let class_path = resolve_app(&builder);
    assert!(class_path.entry_for_key("com.example", "lib").is_none());

    let report = check(&class_path);
    let annotated = annotate_causes(&builder, &class_path, report.problems())
        .expect("causes should be computed");
    let cause = only_cause(&annotated);
    let LinkageProblemCause::ExcludedDependency { path, excluded_by } = cause else {
        panic!("expected an excluded dependency, got {cause:?}");
    };
    assert_eq!(excluded_by, &artifact("com.example:app:1.0"));
    assert_eq!(
        path.to_string(),
        "com.example:app:1.0 (compile) / com.example:client:1.0 (compile) / com.example:lib:1.0 (compile)"
    );
    assert!(
        cause
            .to_string()
            .ends_with("because com.example:app:1.0 excludes com.example:lib.")
    );
}

#[test]
fn causes_stay_unknown_without_a_supplier() {
    let dir = tempdir().expect("temp dir");
    let mut repository = InMemoryRepository::new();
    publish(
        &mut repository,
        dir.path(),
        "com.example:app:1.0",
        &[ClassBuilder::new("com.app.Main").method(
            ACC_PUBLIC,
            "run",
            "()V",
            &[Insn::New("com.nowhere.Gone")],
        )],
        Vec::new(),
    );
    let builder = ClassPathBuilder::new(repository);
    let class_path = resolve_app(&builder);
    let report = check(&class_path);
    let annotated = annotate_causes(&builder, &class_path, report.problems())
        .expect("causes should be computed");
    assert_eq!(only_cause(&annotated), &LinkageProblemCause::Unknown);

    let loose = jar_entry(dir.path(), "loose.jar", &[ClassBuilder::new("com.loose.Tool")]);
    let from_file = LinkageProblem::new(
        Symbol::class("com.nowhere.Gone"),
        ErrorType::ClassNotFound,
        None,
        ClassFile::new(loose, "com.loose.Tool"),
    );
    let cause = CauseAnnotator::new(&builder, &class_path)
        .cause_of(&from_file)
        .expect("cause should be computed");
    assert_eq!(cause, LinkageProblemCause::Unknown);
}
