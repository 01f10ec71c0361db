use super::{
    ClassBuilder, Insn, PUBLIC_ABSTRACT_CLASS, PUBLIC_FINAL_CLASS, check, descriptions,
    jar_entry, write_jar_entries,
};
use crate::checker::{LinkageChecker, find_linkage_problems};
use crate::classfile::{ACC_PRIVATE, ACC_PROTECTED, ACC_PUBLIC, ClassParseError};
use crate::config::CheckerConfig;
use crate::exclusion::ExclusionRules;
use crate::problem::ErrorType;
use crate::report::LinkageCheckReport;
use crate::symbol::{ClassFile, Symbol};
use linkage_deps::ClassPathEntry;
use std::path::Path;
use tempfile::tempdir;

fn caller(name: &str, code: &[Insn]) -> ClassBuilder {
    ClassBuilder::new(name).method(ACC_PUBLIC, "run", "()V", code)
}

fn app_entry(dir: &Path, classes: &[ClassBuilder]) -> ClassPathEntry {
    jar_entry(dir, "app.jar", classes)
}

fn lib_entry(dir: &Path, classes: &[ClassBuilder]) -> ClassPathEntry {
    jar_entry(dir, "lib.jar", classes)
}

fn single_problem(report: &LinkageCheckReport) -> (&Symbol, &ErrorType) {
    assert_eq!(report.len(), 1, "unexpected problems: {:?}", descriptions(report));
    let problem = report.problems().first().expect("one problem");
    (problem.symbol(), problem.error_type())
}

#[test]
fn consistent_class_path_has_no_problems() {
    let dir = tempdir().expect("temp dir");
    let app = app_entry(
        dir.path(),
        &[caller(
            "com.app.C",
            &[Insn::InvokeVirtual("com.lib.Foo", "bar", "()V")],
        )],
    );
    let lib = lib_entry(
        dir.path(),
        &[ClassBuilder::new("com.lib.Foo").method(ACC_PUBLIC, "bar", "()V", &[])],
    );

    let report = check(&[app.clone(), lib.clone()]);
    assert!(report.is_empty(), "unexpected problems: {:?}", descriptions(&report));
    assert_eq!(check(&[app, lib]), report);
}

#[test]
fn missing_class_is_reported_once_per_source() {
    let dir = tempdir().expect("temp dir");
    let app = app_entry(
        dir.path(),
        &[caller(
            "com.app.C",
            &[
                Insn::New("com.lib.Foo"),
                Insn::InvokeVirtual("com.lib.Foo", "bar", "()V"),
            ],
        )],
    );

    let report = check(&[app.clone()]);
    assert_eq!(
        descriptions(&report),
        vec!["Class com.lib.Foo is not found, referenced by com.app.C"]
    );
    let problem = report.problems().first().expect("one problem");
    assert_eq!(problem.target_class(), None);
    assert_eq!(problem.source_class(), &ClassFile::new(app, "com.app.C"));
}

#[test]
fn classes_named_only_in_declarations_are_checked() {
    let dir = tempdir().expect("temp dir");
    let app = app_entry(
        dir.path(),
        &[ClassBuilder::new("com.app.Api")
            .field(ACC_PUBLIC, "other", "Lcom/gone/Other;")
            .method(ACC_PUBLIC, "take", "(Lcom/gone/Missing;)V", &[])
            .method(ACC_PUBLIC, "copies", "()[Lcom/app/Api;", &[])],
    );

    assert_eq!(
        descriptions(&check(&[app])),
        vec![
            "Class com.gone.Other is not found, referenced by com.app.Api",
            "Class com.gone.Missing is not found, referenced by com.app.Api",
        ]
    );
}

#[test]
fn missing_method_and_field_are_symbol_not_found() {
    let dir = tempdir().expect("temp dir");
    let app = app_entry(
        dir.path(),
        &[caller(
            "com.app.C",
            &[
                Insn::InvokeVirtual("com.lib.Foo", "bar", "(I)V"),
                Insn::GetStatic("com.lib.Foo", "LIMIT", "J"),
            ],
        )],
    );
    let lib = lib_entry(
        dir.path(),
        &[ClassBuilder::new("com.lib.Foo")
            .method(ACC_PUBLIC, "bar", "(J)V", &[])
            .field(ACC_PUBLIC, "LIMIT", "I")],
    );

    let report = check(&[app, lib.clone()]);
    let found: Vec<(&Symbol, &ErrorType)> = report
        .problems()
        .iter()
        .map(|problem| (problem.symbol(), problem.error_type()))
        .collect();
    assert_eq!(
        found,
        vec![
            (
                &Symbol::method("com.lib.Foo", "bar", "(I)V", false),
                &ErrorType::SymbolNotFound
            ),
            (
                &Symbol::field("com.lib.Foo", "LIMIT", "J"),
                &ErrorType::SymbolNotFound
            ),
        ]
    );
    for problem in report.problems() {
        assert_eq!(
            problem.target_class(),
            Some(&ClassFile::new(lib.clone(), "com.lib.Foo"))
        );
    }
}

#[test]
fn removing_an_artifact_turns_member_problems_into_class_problems() {
    let dir = tempdir().expect("temp dir");
    let app = app_entry(
        dir.path(),
        &[caller(
            "com.app.C",
            &[Insn::InvokeStatic("com.lib.Foo", "bar", "()V")],
        )],
    );
    let lib = lib_entry(
        dir.path(),
        &[ClassBuilder::new("com.lib.Foo").method(ACC_PUBLIC, "bar", "()V", &[])],
    );

    assert!(check(&[app.clone(), lib]).is_empty());
    assert_eq!(
        descriptions(&check(&[app])),
        vec!["Class com.lib.Foo is not found, referenced by com.app.C"]
    );
}

#[test]
fn wrong_return_type_names_the_actual_type() {
    let dir = tempdir().expect("temp dir");
    let app = app_entry(
        dir.path(),
        &[caller(
            "com.app.C",
            &[Insn::InvokeVirtual("com.lib.Foo", "name", "()I")],
        )],
    );
    let lib = lib_entry(
        dir.path(),
        &[ClassBuilder::new("com.lib.Foo").method(
            ACC_PUBLIC,
            "name",
            "()Ljava/lang/String;",
            &[],
        )],
    );

    let report = check(&[app, lib]);
    assert_eq!(
        single_problem(&report).1,
        &ErrorType::MethodWithReturnTypeNotFound {
            actual_return_type: "java.lang.String".to_string()
        }
    );
}

#[test]
fn inherited_members_resolve() {
    let dir = tempdir().expect("temp dir");
    let app = app_entry(
        dir.path(),
        &[caller(
            "com.app.C",
            &[
                Insn::InvokeVirtual("com.lib.Child", "inherited", "()V"),
                Insn::InvokeVirtual("com.lib.Child", "toString", "()Ljava/lang/String;"),
                Insn::InvokeInterface("com.lib.Api", "fromParent", "()V"),
                Insn::GetStatic("com.lib.Child", "DEFAULTS", "I"),
            ],
        )],
    );
    let lib = lib_entry(
        dir.path(),
        &[
            ClassBuilder::new("com.lib.Parent").method(ACC_PUBLIC, "inherited", "()V", &[]),
            ClassBuilder::new("com.lib.Child")
                .extends("com.lib.Parent")
                .implements("com.lib.Constants"),
            ClassBuilder::interface("com.lib.Constants").field(ACC_PUBLIC, "DEFAULTS", "I"),
            ClassBuilder::interface("com.lib.Api").implements("com.lib.ParentApi"),
            ClassBuilder::interface("com.lib.ParentApi").abstract_method("fromParent", "()V"),
        ],
    );

    let report = check(&[app, lib]);
    assert!(report.is_empty(), "unexpected problems: {:?}", descriptions(&report));
}

#[test]
fn final_superclass_and_class_as_interface_are_incompatible() {
    let dir = tempdir().expect("temp dir");
    let app = app_entry(
        dir.path(),
        &[
            ClassBuilder::new("com.app.Sub").extends("com.lib.Sealed"),
            ClassBuilder::new("com.app.Impl").implements("com.lib.NotAnInterface"),
        ],
    );
    let lib = lib_entry(
        dir.path(),
        &[
            ClassBuilder::new("com.lib.Sealed").access(PUBLIC_FINAL_CLASS),
            ClassBuilder::new("com.lib.NotAnInterface"),
        ],
    );

    let report = check(&[app, lib]);
    assert_eq!(
        descriptions(&report)
            .iter()
            .map(|description| description.split(") ").nth(1).unwrap_or_default().to_string())
            .collect::<Vec<_>>(),
        vec![
            "Class com.lib.Sealed has changed incompatibly, referenced by com.app.Sub",
            "Class com.lib.NotAnInterface has changed incompatibly, referenced by com.app.Impl",
        ]
    );
}

#[test]
fn interface_call_on_a_class_is_incompatible() {
    let dir = tempdir().expect("temp dir");
    let app = app_entry(
        dir.path(),
        &[caller(
            "com.app.C",
            &[Insn::InvokeInterface("com.lib.Foo", "bar", "()V")],
        )],
    );
    let lib = lib_entry(
        dir.path(),
        &[ClassBuilder::new("com.lib.Foo").method(ACC_PUBLIC, "bar", "()V", &[])],
    );

    let report = check(&[app, lib]);
    assert_eq!(
        single_problem(&report),
        (
            &Symbol::method("com.lib.Foo", "bar", "()V", true),
            &ErrorType::IncompatibleClassChange
        )
    );
}

#[test]
fn package_private_class_is_inaccessible_from_other_packages() {
    let dir = tempdir().expect("temp dir");
    let app = app_entry(
        dir.path(),
        &[caller("com.app.C", &[Insn::New("com.lib.Internal")])],
    );
    let lib = lib_entry(
        dir.path(),
        &[
            ClassBuilder::new("com.lib.Internal").access(0x0020),
            caller("com.lib.Neighbour", &[Insn::New("com.lib.Internal")]),
        ],
    );

    let report = check(&[app, lib]);
    assert_eq!(
        single_problem(&report),
        (&Symbol::class("com.lib.Internal"), &ErrorType::InaccessibleClass)
    );
}

#[test]
fn member_access_follows_visibility() {
    let dir = tempdir().expect("temp dir");
    let app = app_entry(
        dir.path(),
        &[
            caller(
                "com.app.Outsider",
                &[
                    Insn::InvokeVirtual("com.lib.Foo", "secret", "()V"),
                    Insn::InvokeVirtual("com.lib.Foo", "guarded", "()V"),
                ],
            ),
            ClassBuilder::new("com.app.Heir").extends("com.lib.Foo").method(
                ACC_PUBLIC,
                "run",
                "()V",
                &[Insn::InvokeVirtual("com.lib.Foo", "guarded", "()V")],
            ),
        ],
    );
    let lib = lib_entry(
        dir.path(),
        &[ClassBuilder::new("com.lib.Foo")
            .method(ACC_PRIVATE, "secret", "()V", &[])
            .method(ACC_PROTECTED, "guarded", "()V", &[])],
    );

    let report = check(&[app, lib]);
    let found: Vec<(String, &ErrorType)> = report
        .problems()
        .iter()
        .map(|problem| {
            (
                format!("{} from {}", problem.symbol(), problem.source_class().binary_name()),
                problem.error_type(),
            )
        })
        .collect();
    assert_eq!(
        found,
        vec![
            (
                "com.lib.Foo's method secret() from com.app.Outsider".to_string(),
                &ErrorType::InaccessibleMember
            ),
            (
                "com.lib.Foo's method guarded() from com.app.Outsider".to_string(),
                &ErrorType::InaccessibleMember
            ),
        ]
    );
}

#[test]
fn concrete_class_must_implement_abstract_methods() {
    let dir = tempdir().expect("temp dir");
    let app = app_entry(
        dir.path(),
        &[
            ClassBuilder::new("com.app.Square").implements("com.lib.Shape"),
            ClassBuilder::new("com.app.Circle").implements("com.lib.Shape").method(
                ACC_PUBLIC,
                "area",
                "()D",
                &[],
            ),
            ClassBuilder::new("com.app.Draft")
                .access(PUBLIC_ABSTRACT_CLASS)
                .implements("com.lib.Shape"),
            ClassBuilder::new("com.app.Labelled").implements("com.lib.Named"),
        ],
    );
    let lib = lib_entry(
        dir.path(),
        &[
            ClassBuilder::interface("com.lib.Shape").abstract_method("area", "()D"),
            ClassBuilder::interface("com.lib.Named")
                .abstract_method("toString", "()Ljava/lang/String;"),
        ],
    );

    let report = check(&[app, lib]);
    assert_eq!(
        report
            .problems()
            .iter()
            .map(|problem| problem.source_class().binary_name())
            .collect::<Vec<_>>(),
        vec!["com.app.Square"]
    );
    assert_eq!(
        single_problem(&report),
        (
            &Symbol::method("com.lib.Shape", "area", "()D", true),
            &ErrorType::AbstractMethod
        )
    );
}

#[test]
fn abstract_methods_inherited_from_further_up_must_be_implemented() {
    let dir = tempdir().expect("temp dir");
    let app = app_entry(
        dir.path(),
        &[
            ClassBuilder::new("com.app.Impl").extends("com.lib.Middle"),
            ClassBuilder::new("com.app.Done")
                .extends("com.lib.Middle")
                .method(ACC_PUBLIC, "run", "()V", &[]),
            ClassBuilder::new("com.app.Worker").extends("com.lib.Task"),
        ],
    );
    let lib = lib_entry(
        dir.path(),
        &[
            ClassBuilder::new("com.lib.Base")
                .access(PUBLIC_ABSTRACT_CLASS)
                .abstract_method("run", "()V"),
            ClassBuilder::new("com.lib.Middle")
                .access(PUBLIC_ABSTRACT_CLASS)
                .extends("com.lib.Base"),
            ClassBuilder::interface("com.lib.Job").abstract_method("work", "()V"),
            ClassBuilder::new("com.lib.Task")
                .access(PUBLIC_ABSTRACT_CLASS)
                .implements("com.lib.Job"),
        ],
    );

    let report = check(&[app, lib]);
    let found: Vec<(&str, &Symbol, &ErrorType)> = report
        .problems()
        .iter()
        .map(|problem| {
            (
                problem.source_class().binary_name(),
                problem.symbol(),
                problem.error_type(),
            )
        })
        .collect();
    assert_eq!(
        found,
        vec![
            (
                "com.app.Impl",
                &Symbol::method("com.lib.Base", "run", "()V", false),
                &ErrorType::AbstractMethod
            ),
            (
                "com.app.Worker",
                &Symbol::method("com.lib.Job", "work", "()V", true),
                &ErrorType::AbstractMethod
            ),
        ]
    );
}

#[test]
fn nested_class_problems_are_reported_under_the_top_level_class() {
    let dir = tempdir().expect("temp dir");
    let app = app_entry(
        dir.path(),
        &[
            ClassBuilder::new("com.app.Outer"),
            caller("com.app.Outer$1", &[Insn::New("com.gone.Missing")]),
            caller("com.app.Outer$2", &[Insn::New("com.gone.Missing")]),
        ],
    );

    let report = check(&[app.clone()]);
    assert_eq!(
        descriptions(&report),
        vec!["Class com.gone.Missing is not found, referenced by com.app.Outer"]
    );
    let problem = report.problems().first().expect("one problem");
    assert_eq!(problem.source_class(), &ClassFile::new(app, "com.app.Outer"));
}

#[test]
fn references_within_one_entry_are_not_checked() {
    let dir = tempdir().expect("temp dir");
    let app = app_entry(
        dir.path(),
        &[
            caller(
                "com.app.A",
                &[Insn::InvokeVirtual("com.app.B", "missing", "()V")],
            ),
            ClassBuilder::new("com.app.B"),
        ],
    );

    assert!(check(&[app]).is_empty());
}

#[test]
fn runtime_classes_are_assumed_present() {
    let dir = tempdir().expect("temp dir");
    let app = app_entry(
        dir.path(),
        &[caller(
            "com.app.C",
            &[
                Insn::InvokeStatic("java.lang.Thread", "onSpinWait", "()V"),
                Insn::InvokeInterface("java.util.List", "size", "()I"),
            ],
        )
        .implements("java.lang.Runnable")],
    );

    assert!(check(&[app]).is_empty());
}

#[test]
fn catching_linkage_errors_suppresses_missing_symbols() {
    let dir = tempdir().expect("temp dir");
    let app = app_entry(
        dir.path(),
        &[caller(
            "com.app.Detector",
            &[Insn::InvokeStatic("com.optional.Feature", "enable", "()V")],
        )
        .catching("java.lang.NoClassDefFoundError")],
    );

    assert!(check(&[app]).is_empty());
}

#[test]
fn unused_constants_and_hidden_classes_are_not_problems() {
    let dir = tempdir().expect("temp dir");
    let app = app_entry(
        dir.path(),
        &[
            ClassBuilder::new("com.app.Stale").constant("com.gone.Leftover"),
            caller("com.app.Injector", &[Insn::New("com.agent.Dispatcher")]),
        ],
    );
    let agent = ClassPathEntry::File(write_jar_entries(
        dir.path(),
        "agent.jar",
        &[(
            "com/agent/Dispatcher.raw".to_string(),
            ClassBuilder::new("com.agent.Dispatcher").build(),
        )],
    ));

    assert!(check(&[app, agent]).is_empty());
}

#[test]
fn default_rules_exclude_known_false_positives() {
    let dir = tempdir().expect("temp dir");
    let graal = jar_entry(
        dir.path(),
        "svm.jar",
        &[caller(
            "com.oracle.svm.core.Detector",
            &[Insn::InvokeStatic("jdk.vm.ci.runtime.JVMCI", "getRuntime", "()V")],
        )],
    );
    let other = jar_entry(
        dir.path(),
        "other.jar",
        &[caller(
            "com.app.Detector",
            &[Insn::InvokeStatic("jdk.vm.ci.runtime.JVMCI", "getRuntime", "()V")],
        )],
    );

    assert_eq!(
        descriptions(&check(&[graal, other])),
        vec!["Class jdk.vm.ci.runtime.JVMCI is not found, referenced by com.app.Detector"]
    );
}

#[test]
fn configured_and_explicit_exclusions_are_applied() {
    let dir = tempdir().expect("temp dir");
    let app = app_entry(
        dir.path(),
        &[
            caller("com.app.A", &[Insn::New("com.gone.First")]),
            caller("com.app.B", &[Insn::New("com.gone.Second")]),
            caller("com.app.C", &[Insn::New("com.gone.Third")]),
        ],
    );
    let exclusion_file = dir.path().join("exclusions.xml");
    std::fs::write(
        &exclusion_file,
        r#"<LinkageCheckerFilter>
  <LinkageError>
    <Target><Class name="com.gone.First"/></Target>
  </LinkageError>
</LinkageCheckerFilter>"#,
    )
    .expect("write exclusions");
    let config = CheckerConfig {
        exclusion_file: Some(exclusion_file),
        ..CheckerConfig::default()
    };
    let explicit = ExclusionRules::parse(
        r#"<LinkageCheckerFilter>
  <LinkageError>
    <Source><Class name="com.app.B"/></Source>
  </LinkageError>
</LinkageCheckerFilter>"#,
    )
    .expect("rules should parse");

    let report = find_linkage_problems(&[app], &[], Some(explicit), &config)
        .expect("linkage check should run");
    assert_eq!(
        descriptions(&report),
        vec!["Class com.gone.Third is not found, referenced by com.app.C"]
    );
}

#[test]
fn reachability_is_computed_from_entry_points() {
    let dir = tempdir().expect("temp dir");
    let app = app_entry(
        dir.path(),
        &[caller("com.app.Main", &[Insn::New("com.lib.Used")])],
    );
    let lib = lib_entry(
        dir.path(),
        &[
            caller("com.lib.Used", &[Insn::New("com.gone.A")]),
            caller("com.lib.Unused", &[Insn::New("com.gone.B")]),
        ],
    );
    let class_path = [app.clone(), lib];

    let report = find_linkage_problems(
        &class_path,
        std::slice::from_ref(&app),
        None,
        &CheckerConfig::default(),
    )
    .expect("linkage check should run");
    let flags: Vec<(&str, bool)> = report
        .problems()
        .iter()
        .map(|problem| (problem.source_class().binary_name(), problem.is_reachable()))
        .collect();
    assert_eq!(flags, vec![("com.lib.Used", true), ("com.lib.Unused", false)]);
    assert_eq!(report.reachable_problems().count(), 1);

    let config = CheckerConfig {
        report_only_reachable: true,
        ..CheckerConfig::default()
    };
    let reachable = find_linkage_problems(&class_path, &[app], None, &config)
        .expect("linkage check should run");
    assert_eq!(
        descriptions(&reachable),
        vec!["Class com.gone.A is not found, referenced by com.lib.Used"]
    );
}

#[test]
fn unparseable_class_files_are_reported() {
    let dir = tempdir().expect("temp dir");
    let lib = ClassPathEntry::File(write_jar_entries(
        dir.path(),
        "lib.jar",
        &[
            ("com/lib/Broken.class".to_string(), vec![0xCA, 0xFE, 0xBA, 0xBE]),
            (
                "com/lib/Fine.class".to_string(),
                ClassBuilder::new("com.lib.Fine").build(),
            ),
        ],
    ));
    let app = app_entry(
        dir.path(),
        &[caller(
            "com.app.C",
            &[Insn::InvokeStatic("com.lib.Broken", "call", "()V")],
        )],
    );

    let report = check(&[app, lib.clone()]);
    let (symbol, error_type) = single_problem(&report);
    assert_eq!(symbol, &Symbol::class("com.lib.Broken"));
    assert_eq!(
        error_type,
        &ErrorType::InvalidClassFile {
            reason: ClassParseError::UnexpectedEof.to_string()
        }
    );
    let problem = report.problems().first().expect("one problem");
    assert_eq!(problem.source_class(), &ClassFile::new(lib, "com.lib.Broken"));
}

#[test]
fn unparseable_bare_class_file_does_not_stop_the_check() {
    let dir = tempdir().expect("temp dir");
    let app = app_entry(dir.path(), &[ClassBuilder::new("com.app.Main")]);
    let broken_path = dir.path().join("Broken.class");
    std::fs::write(&broken_path, [0xCA, 0xFE, 0xBA, 0xBE]).expect("write class");
    let broken = ClassPathEntry::File(broken_path);

    let report = check(&[app, broken.clone()]);
    let (symbol, error_type) = single_problem(&report);
    assert_eq!(symbol, &Symbol::class("Broken"));
    assert_eq!(
        error_type,
        &ErrorType::InvalidClassFile {
            reason: ClassParseError::UnexpectedEof.to_string()
        }
    );
    let problem = report.problems().first().expect("one problem");
    assert_eq!(problem.source_class(), &ClassFile::new(broken, "Broken"));
}

#[test]
fn additional_references_are_checked_with_the_extracted_ones() {
    let dir = tempdir().expect("temp dir");
    let app = app_entry(dir.path(), &[ClassBuilder::new("com.app.Reflective")]);
    let lib = lib_entry(dir.path(), &[ClassBuilder::new("com.lib.Target")]);

    let checker = LinkageChecker::create(&[app.clone(), lib], &[], &CheckerConfig::default())
        .expect("checker should be created");
    assert!(
        checker
            .find_linkage_problems()
            .expect("check should run")
            .is_empty()
    );

    let references = checker.symbol_references().with_additional([(
        ClassFile::new(app, "com.app.Reflective"),
        Symbol::method("com.lib.Target", "lookup", "()V", false),
    )]);
    let report = checker
        .find_linkage_problems_with(&references)
        .expect("check should run");
    assert_eq!(
        single_problem(&report),
        (
            &Symbol::method("com.lib.Target", "lookup", "()V", false),
            &ErrorType::SymbolNotFound
        )
    );
}

#[test]
fn zero_cache_capacity_is_rejected() {
    let config = CheckerConfig {
        class_cache_capacity: 0,
        ..CheckerConfig::default()
    };
    let error = find_linkage_problems(&[], &[], None, &config)
        .expect_err("zero capacity should be rejected");
    assert_eq!(error.to_string(), "class-cache-capacity must be at least 1");
}

#[test]
fn report_serializes_to_json() {
    let dir = tempdir().expect("temp dir");
    let app = app_entry(
        dir.path(),
        &[caller("com.app.C", &[Insn::New("com.gone.Missing")])],
    );
    let report = check(&[app]);

    let json = report.to_json().expect("report should serialize");
    assert!(json.contains(r#""type": "class_not_found""#), "{json}");
    assert!(json.contains(r#""class_name": "com.gone.Missing""#), "{json}");
    let parsed: LinkageCheckReport = serde_json::from_str(&json).expect("report should parse");
    assert_eq!(parsed, report);
}
