//! Resolves every extracted symbol reference the way the JVM would at link time.
//!
//! Lookups follow classpath order: the first entry that defines a class is the one consulted.
//! Hierarchy walks that reach a runtime-supplied class or a class missing from the classpath
//! give up and treat the reference as resolvable.

use crate::class_path_repository::{ClassPathIndexError, ClassPathRepository};
use crate::classfile::{
    ACC_PRIVATE, ACC_PROTECTED, ACC_PUBLIC, MemberInfo, MethodDescriptor, ParsedClass,
    outermost_class_name, parameter_descriptor,
};
use crate::config::{CheckerConfig, ConfigError};
use crate::exclusion::{ExclusionFileError, ExclusionRules};
use crate::extract::extract_symbol_references;
use crate::problem::{ErrorType, LinkageProblem};
use crate::reference_graph::ClassReferenceGraph;
use crate::report::LinkageCheckReport;
use crate::symbol::{ClassFile, Symbol, SymbolReferences};
use indexmap::IndexSet;
use linkage_deps::{
    Artifact, ArtifactRepository, ClassPathBuilder, ClassPathEntry, ClassPathError,
    ClassPathResult,
};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use thiserror::Error;

const OBJECT: &str = "java.lang.Object";

/// Methods every class inherits from `java.lang.Object`.
const OBJECT_METHODS: &[(&str, &str)] = &[
    ("getClass", "()Ljava/lang/Class;"),
    ("hashCode", "()I"),
    ("equals", "(Ljava/lang/Object;)Z"),
    ("clone", "()Ljava/lang/Object;"),
    ("toString", "()Ljava/lang/String;"),
    ("notify", "()V"),
    ("notifyAll", "()V"),
    ("wait", "()V"),
    ("wait", "(J)V"),
    ("wait", "(JI)V"),
    ("finalize", "()V"),
];

/// Errors a class catches when testing for optional classes or members.
const LINKAGE_ERRORS: &[&str] = &[
    "java.lang.LinkageError",
    "java.lang.NoClassDefFoundError",
    "java.lang.NoSuchMethodError",
    "java.lang.NoSuchFieldError",
];

#[derive(Debug, Error)]
pub enum LinkageCheckError {
    #[error(transparent)]
    ClassPath(#[from] ClassPathIndexError),
    #[error(transparent)]
    Exclusion(#[from] ExclusionFileError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Resolution(#[from] ClassPathError),
}

/// Outcome of looking a member up in a class hierarchy.
enum MemberLookup {
    Found {
        declaring: Arc<ParsedClass>,
        member: MemberInfo,
    },
    /// Defined by a class the checker does not see, or the walk hit one.
    Assumed,
    NotFound,
}

pub struct LinkageChecker {
    repository: ClassPathRepository,
    entry_points: Vec<ClassPathEntry>,
    exclusions: ExclusionRules,
    report_only_reachable: bool,
    symbol_references: SymbolReferences,
}

impl LinkageChecker {
    /// Indexes `class_path` and extracts its symbol references. The default exclusion rules
    /// and the config's exclusion file, if any, are loaded up front.
    pub fn create(
        class_path: &[ClassPathEntry],
        entry_points: &[ClassPathEntry],
        config: &CheckerConfig,
    ) -> Result<Self, LinkageCheckError> {
        config.validate()?;
        let mut exclusions = ExclusionRules::defaults()?;
        if let Some(path) = &config.exclusion_file {
            exclusions.extend(ExclusionRules::read(path)?);
        }

        let repository = ClassPathRepository::with_config(class_path, config)?;
        let symbol_references = extract_symbol_references(&repository)?;
        Ok(Self {
            repository,
            entry_points: entry_points.to_vec(),
            exclusions,
            report_only_reachable: config.report_only_reachable,
            symbol_references,
        })
    }

    /// Adds rules on top of the defaults and the configured exclusion file.
    pub fn with_exclusions(mut self, rules: ExclusionRules) -> Self {
        self.exclusions.extend(rules);
        self
    }

    pub fn symbol_references(&self) -> &SymbolReferences {
        &self.symbol_references
    }

    pub fn repository(&self) -> &ClassPathRepository {
        &self.repository
    }

    pub fn find_linkage_problems(&self) -> Result<LinkageCheckReport, LinkageCheckError> {
        self.find_linkage_problems_with(&self.symbol_references)
    }

    /// Checks `references` instead of the extracted ones, for example with extra symbols
    /// merged in through [`SymbolReferences::with_additional`].
    pub fn find_linkage_problems_with(
        &self,
        references: &SymbolReferences,
    ) -> Result<LinkageCheckReport, LinkageCheckError> {
        // nested classes report under their top-level class
        let mut problems = IndexSet::new();
        for (source, symbol) in references.iter() {
            if let Some(problem) = self.check(source, symbol)? {
                problems.insert(problem.with_top_level_source());
            }
        }
        for (class_file, reason) in references.invalid_class_files() {
            problems.insert(LinkageProblem::new(
                Symbol::class(class_file.binary_name()),
                ErrorType::InvalidClassFile {
                    reason: reason.clone(),
                },
                Some(class_file.clone()),
                class_file.top_level(),
            ));
        }

        let found = problems.len();
        problems.retain(|problem| !self.exclusions.matches(problem));
        tracing::debug!(
            found,
            excluded = found - problems.len(),
            "resolved symbol references"
        );

        if !self.entry_points.is_empty() {
            let entry_classes: Vec<String> = self
                .entry_points
                .iter()
                .filter_map(|entry| self.repository.classes_defined_in(entry))
                .flatten()
                .cloned()
                .collect();
            let graph = ClassReferenceGraph::new(references, entry_classes);
            problems = problems
                .into_iter()
                .map(|problem| {
                    let reachable = graph.is_reachable(problem.source_class().binary_name());
                    problem.with_reachable(reachable)
                })
                .collect();
            if self.report_only_reachable {
                problems.retain(LinkageProblem::is_reachable);
            }
        }

        Ok(LinkageCheckReport::new(problems))
    }

    fn check(
        &self,
        source: &ClassFile,
        symbol: &Symbol,
    ) -> Result<Option<LinkageProblem>, LinkageCheckError> {
        let target_name = symbol.class_name();
        if self.repository.is_system_class(target_name) {
            return Ok(None);
        }
        let defined_alongside = self
            .repository
            .classes_defined_in(source.entry())
            .is_some_and(|classes| classes.contains(target_name));
        if defined_alongside {
            return Ok(None);
        }

        let source_class = self.repository.load_class_file(source)?;
        let problem = match self.repository.find_class(target_name) {
            None => self.class_not_found(source, &source_class, symbol),
            Some(target_file) => {
                let Some(target) = self.load_quiet(target_name)? else {
                    tracing::debug!(
                        class = %target_file,
                        "skipping references to a class that cannot be parsed"
                    );
                    return Ok(None);
                };
                self.resolve(&source_class, symbol, &target)?
                    .map(|(symbol, error_type)| {
                        LinkageProblem::new(symbol, error_type, Some(target_file), source.clone())
                    })
            }
        };

        let Some(problem) = problem else {
            return Ok(None);
        };
        let probing = matches!(
            problem.error_type(),
            ErrorType::ClassNotFound
                | ErrorType::SymbolNotFound
                | ErrorType::MethodWithReturnTypeNotFound { .. }
        ) && source_class.catches_any(LINKAGE_ERRORS);
        if probing {
            return Ok(None);
        }
        Ok(Some(problem))
    }

    fn class_not_found(
        &self,
        source: &ClassFile,
        source_class: &ParsedClass,
        symbol: &Symbol,
    ) -> Option<LinkageProblem> {
        let target_name = symbol.class_name();
        if self.repository.is_hidden_class(target_name) {
            return None;
        }
        // a bare constant pool entry never triggers class loading
        if matches!(symbol, Symbol::Class { .. }) && !source_class.uses_class(target_name) {
            return None;
        }
        Some(LinkageProblem::new(
            symbol.to_class_symbol(),
            ErrorType::ClassNotFound,
            None,
            source.clone(),
        ))
    }

    fn resolve(
        &self,
        source: &ParsedClass,
        symbol: &Symbol,
        target: &Arc<ParsedClass>,
    ) -> Result<Option<(Symbol, ErrorType)>, LinkageCheckError> {
        let class_symbol = || symbol.to_class_symbol();
        match symbol {
            Symbol::Class { .. } => {
                if !self.class_accessible(source, target)? {
                    return Ok(Some((class_symbol(), ErrorType::InaccessibleClass)));
                }
                Ok(None)
            }
            Symbol::SuperClass { .. } => {
                if target.is_interface() || target.is_final() {
                    return Ok(Some((class_symbol(), ErrorType::IncompatibleClassChange)));
                }
                if !self.class_accessible(source, target)? {
                    return Ok(Some((class_symbol(), ErrorType::InaccessibleClass)));
                }
                self.check_abstract_methods(source, target)
            }
            Symbol::Interface { .. } => {
                if !target.is_interface() {
                    return Ok(Some((class_symbol(), ErrorType::IncompatibleClassChange)));
                }
                if !self.class_accessible(source, target)? {
                    return Ok(Some((class_symbol(), ErrorType::InaccessibleClass)));
                }
                self.check_abstract_methods(source, target)
            }
            Symbol::Method {
                name,
                descriptor,
                interface_method,
                ..
            } => {
                if !self.class_accessible(source, target)? {
                    return Ok(Some((class_symbol(), ErrorType::InaccessibleClass)));
                }
                if *interface_method != target.is_interface() {
                    return Ok(Some((symbol.clone(), ErrorType::IncompatibleClassChange)));
                }
                let lookup =
                    self.find_method(target, name, |candidate| candidate == descriptor.as_str())?;
                match lookup {
                    MemberLookup::Found { declaring, member } => {
                        if self.member_accessible(source, &declaring, &member)? {
                            Ok(None)
                        } else {
                            Ok(Some((symbol.clone(), ErrorType::InaccessibleMember)))
                        }
                    }
                    MemberLookup::Assumed => Ok(None),
                    MemberLookup::NotFound => {
                        let parameters = parameter_descriptor(descriptor);
                        let same_parameters = self.find_method(target, name, |candidate| {
                            parameter_descriptor(candidate) == parameters
                        })?;
                        let error_type = match same_parameters {
                            MemberLookup::Found { member, .. } => {
                                ErrorType::MethodWithReturnTypeNotFound {
                                    actual_return_type: return_type_name(&member.descriptor),
                                }
                            }
                            _ => ErrorType::SymbolNotFound,
                        };
                        Ok(Some((symbol.clone(), error_type)))
                    }
                }
            }
            Symbol::Field {
                name, descriptor, ..
            } => {
                if !self.class_accessible(source, target)? {
                    return Ok(Some((class_symbol(), ErrorType::InaccessibleClass)));
                }
                let mut visited = HashSet::new();
                match self.find_field(Arc::clone(target), name, descriptor, &mut visited)? {
                    MemberLookup::Found { declaring, member } => {
                        if self.member_accessible(source, &declaring, &member)? {
                            Ok(None)
                        } else {
                            Ok(Some((symbol.clone(), ErrorType::InaccessibleMember)))
                        }
                    }
                    MemberLookup::Assumed => Ok(None),
                    MemberLookup::NotFound => Ok(Some((symbol.clone(), ErrorType::SymbolNotFound))),
                }
            }
        }
    }

    /// A concrete class must implement every abstract method it inherits through
    /// `supertype`, including those declared higher up in abstract classes and interfaces.
    fn check_abstract_methods(
        &self,
        source: &ParsedClass,
        supertype: &Arc<ParsedClass>,
    ) -> Result<Option<(Symbol, ErrorType)>, LinkageCheckError> {
        if source.is_abstract() || source.is_interface() {
            return Ok(None);
        }
        let mut checked = HashSet::new();
        let mut visited = HashSet::new();
        let mut pending = VecDeque::from([Arc::clone(supertype)]);
        while let Some(declaring) = pending.pop_front() {
            if !visited.insert(declaring.binary_name.clone()) {
                continue;
            }
            for method in declaring.methods.iter().filter(|method| method.is_abstract()) {
                if !checked.insert((method.name.clone(), method.descriptor.clone())) {
                    continue;
                }
                if !self.has_implementation(source, &method.name, &method.descriptor)? {
                    let symbol = Symbol::method(
                        declaring.binary_name.as_str(),
                        method.name.as_str(),
                        method.descriptor.as_str(),
                        declaring.is_interface(),
                    );
                    return Ok(Some((symbol, ErrorType::AbstractMethod)));
                }
            }
            // a concrete supertype answers for its own ancestors
            if !declaring.is_abstract() && !declaring.is_interface() {
                continue;
            }
            let ancestors = declaring.super_class.iter().chain(declaring.interfaces.iter());
            for name in ancestors {
                if name == OBJECT || self.repository.is_system_class(name) {
                    continue;
                }
                if let Some(parent) = self.load_quiet(name)? {
                    pending.push_back(parent);
                }
            }
        }
        Ok(None)
    }

    /// Whether `class` or one of its supertypes supplies a body for the method: a concrete
    /// method in the superclass chain or a default method on any superinterface.
    fn has_implementation(
        &self,
        class: &ParsedClass,
        name: &str,
        descriptor: &str,
    ) -> Result<bool, LinkageCheckError> {
        let implements = |class: &ParsedClass| {
            class
                .find_method(name, descriptor)
                .is_some_and(|method| !method.is_abstract())
        };
        if implements(class) {
            return Ok(true);
        }
        let mut interfaces: VecDeque<String> = class.interfaces.iter().cloned().collect();
        let mut visited = HashSet::from([class.binary_name.clone()]);
        let mut super_name = class.super_class.clone();
        while let Some(class_name) = super_name.take() {
            if class_name == OBJECT {
                if is_object_method(name, descriptor) {
                    return Ok(true);
                }
                break;
            }
            if self.repository.is_system_class(&class_name) {
                return Ok(true);
            }
            if !visited.insert(class_name.clone()) {
                break;
            }
            let Some(super_class) = self.load_quiet(&class_name)? else {
                return Ok(true);
            };
            if implements(&super_class) {
                return Ok(true);
            }
            interfaces.extend(super_class.interfaces.iter().cloned());
            super_name = super_class.super_class.clone();
        }

        while let Some(interface_name) = interfaces.pop_front() {
            if !visited.insert(interface_name.clone()) {
                continue;
            }
            if self.repository.is_system_class(&interface_name) {
                return Ok(true);
            }
            let Some(interface) = self.load_quiet(&interface_name)? else {
                return Ok(true);
            };
            let has_default = interface
                .find_method(name, descriptor)
                .is_some_and(|method| !method.is_abstract() && !method.is_static());
            if has_default {
                return Ok(true);
            }
            interfaces.extend(interface.interfaces.iter().cloned());
        }
        Ok(false)
    }

    /// Method resolution: the class, its superclass chain, then every superinterface.
    /// Constructors are only looked up on the class itself.
    fn find_method<F>(
        &self,
        target: &Arc<ParsedClass>,
        name: &str,
        descriptor_matches: F,
    ) -> Result<MemberLookup, LinkageCheckError>
    where
        F: Fn(&str) -> bool,
    {
        let find_in = |class: &Arc<ParsedClass>| {
            class
                .methods
                .iter()
                .find(|method| method.name == name && descriptor_matches(&method.descriptor))
                .map(|member| MemberLookup::Found {
                    declaring: Arc::clone(class),
                    member: member.clone(),
                })
        };

        if let Some(found) = find_in(target) {
            return Ok(found);
        }
        if name == "<init>" {
            return Ok(MemberLookup::NotFound);
        }

        let mut interfaces: VecDeque<String> = target.interfaces.iter().cloned().collect();
        let mut visited = HashSet::from([target.binary_name.clone()]);
        let mut super_name = target.super_class.clone();
        while let Some(class_name) = super_name.take() {
            if class_name == OBJECT {
                let inherited = OBJECT_METHODS
                    .iter()
                    .any(|(method, descriptor)| *method == name && descriptor_matches(descriptor));
                if inherited {
                    return Ok(MemberLookup::Assumed);
                }
                break;
            }
            if self.repository.is_system_class(&class_name) || !visited.insert(class_name.clone())
            {
                return Ok(MemberLookup::Assumed);
            }
            let Some(class) = self.load_quiet(&class_name)? else {
                return Ok(MemberLookup::Assumed);
            };
            if let Some(found) = find_in(&class) {
                return Ok(found);
            }
            interfaces.extend(class.interfaces.iter().cloned());
            super_name = class.super_class.clone();
        }

        while let Some(interface_name) = interfaces.pop_front() {
            if !visited.insert(interface_name.clone()) {
                continue;
            }
            if self.repository.is_system_class(&interface_name) {
                return Ok(MemberLookup::Assumed);
            }
            let Some(interface) = self.load_quiet(&interface_name)? else {
                return Ok(MemberLookup::Assumed);
            };
            if let Some(found) = find_in(&interface) {
                return Ok(found);
            }
            interfaces.extend(interface.interfaces.iter().cloned());
        }
        Ok(MemberLookup::NotFound)
    }

    /// Field resolution: the class, its superinterfaces recursively, then its superclass.
    fn find_field(
        &self,
        class: Arc<ParsedClass>,
        name: &str,
        descriptor: &str,
        visited: &mut HashSet<String>,
    ) -> Result<MemberLookup, LinkageCheckError> {
        if !visited.insert(class.binary_name.clone()) {
            return Ok(MemberLookup::NotFound);
        }
        if let Some(field) = class.find_field(name, descriptor) {
            return Ok(MemberLookup::Found {
                member: field.clone(),
                declaring: class,
            });
        }

        let supertypes = class.interfaces.iter().chain(class.super_class.as_ref());
        for supertype in supertypes {
            if supertype == OBJECT {
                continue;
            }
            if self.repository.is_system_class(supertype) {
                return Ok(MemberLookup::Assumed);
            }
            let Some(parsed) = self.load_quiet(supertype)? else {
                return Ok(MemberLookup::Assumed);
            };
            match self.find_field(parsed, name, descriptor, visited)? {
                MemberLookup::NotFound => {}
                lookup => return Ok(lookup),
            }
        }
        Ok(MemberLookup::NotFound)
    }

    fn class_accessible(
        &self,
        source: &ParsedClass,
        target: &ParsedClass,
    ) -> Result<bool, LinkageCheckError> {
        let flags = target.declared_access_flags();
        if flags & ACC_PUBLIC != 0 {
            return Ok(true);
        }
        if flags & ACC_PRIVATE != 0 {
            return Ok(same_outermost_class(source, target));
        }
        if source.package_name() == target.package_name() {
            return Ok(true);
        }
        if flags & ACC_PROTECTED != 0 {
            return self.is_subclass_or_nested(source, &target.binary_name);
        }
        Ok(false)
    }

    fn member_accessible(
        &self,
        source: &ParsedClass,
        declaring: &ParsedClass,
        member: &MemberInfo,
    ) -> Result<bool, LinkageCheckError> {
        if member.is_public() {
            return Ok(true);
        }
        if member.is_private() {
            return Ok(same_outermost_class(source, declaring));
        }
        if source.package_name() == declaring.package_name() {
            return Ok(true);
        }
        if member.is_protected() {
            return self.is_subclass_or_nested(source, &declaring.binary_name);
        }
        Ok(false)
    }

    /// Protected access is granted to subclasses, and to classes nested in one.
    fn is_subclass_or_nested(
        &self,
        source: &ParsedClass,
        ancestor: &str,
    ) -> Result<bool, LinkageCheckError> {
        if self.is_subclass(source, ancestor)? {
            return Ok(true);
        }
        let outermost = outermost_class_name(&source.binary_name);
        if outermost == source.binary_name {
            return Ok(false);
        }
        match self.load_quiet(outermost)? {
            Some(outer) => self.is_subclass(&outer, ancestor),
            None => Ok(false),
        }
    }

    fn is_subclass(&self, class: &ParsedClass, ancestor: &str) -> Result<bool, LinkageCheckError> {
        let mut visited = HashSet::from([class.binary_name.clone()]);
        let mut super_name = class.super_class.clone();
        while let Some(name) = super_name.take() {
            if name == ancestor {
                return Ok(true);
            }
            if self.repository.is_system_class(&name) || !visited.insert(name.clone()) {
                return Ok(false);
            }
            match self.load_quiet(&name)? {
                Some(parsed) => super_name = parsed.super_class.clone(),
                None => return Ok(true),
            }
        }
        Ok(false)
    }

    /// Loads a class by name, treating an unparseable class like a missing one.
    fn load_quiet(&self, binary_name: &str) -> Result<Option<Arc<ParsedClass>>, LinkageCheckError> {
        match self.repository.load_class(binary_name) {
            Ok(parsed) => Ok(parsed),
            Err(ClassPathIndexError::ClassFile { path, source }) => {
                tracing::debug!(
                    class = binary_name,
                    path = %path.display(),
                    error = %source,
                    "class file could not be parsed"
                );
                Ok(None)
            }
            Err(error) => Err(error.into()),
        }
    }
}

/// Indexes `class_path`, resolves every symbol reference and applies the default exclusion
/// rules plus `exclusions`.
pub fn find_linkage_problems(
    class_path: &[ClassPathEntry],
    entry_points: &[ClassPathEntry],
    exclusions: Option<ExclusionRules>,
    config: &CheckerConfig,
) -> Result<LinkageCheckReport, LinkageCheckError> {
    let mut checker = LinkageChecker::create(class_path, entry_points, config)?;
    if let Some(rules) = exclusions {
        checker = checker.with_exclusions(rules);
    }
    checker.find_linkage_problems()
}

/// Resolves `artifacts` with the configured mediation policy and checks the resulting
/// classpath, using the requested artifacts as entry points. The classpath is returned with
/// the report so causes can be annotated against it.
pub fn check_artifacts<R: ArtifactRepository>(
    builder: &ClassPathBuilder<R>,
    artifacts: &[Artifact],
    config: &CheckerConfig,
) -> Result<(ClassPathResult, LinkageCheckReport), LinkageCheckError> {
    config.validate()?;
    let mediation = config.mediation.mediation(None);
    let class_path = builder.resolve(artifacts, false, mediation.as_ref())?;
    let entry_points: Vec<ClassPathEntry> = class_path
        .class_path()
        .iter()
        .filter(|entry| {
            entry.artifact().is_some_and(|selected| {
                artifacts
                    .iter()
                    .any(|requested| requested.same_identity(selected))
            })
        })
        .cloned()
        .collect();
    tracing::debug!(
        mediation = mediation.name(),
        entries = class_path.class_path().len(),
        entry_points = entry_points.len(),
        "checking resolved artifacts"
    );
    let report = LinkageChecker::create(class_path.class_path(), &entry_points, config)?
        .find_linkage_problems()?;
    Ok((class_path, report))
}

fn is_object_method(name: &str, descriptor: &str) -> bool {
    OBJECT_METHODS
        .iter()
        .any(|(method, method_descriptor)| *method == name && *method_descriptor == descriptor)
}

fn same_outermost_class(left: &ParsedClass, right: &ParsedClass) -> bool {
    outermost_class_name(&left.binary_name) == outermost_class_name(&right.binary_name)
}

fn return_type_name(descriptor: &str) -> String {
    MethodDescriptor::parse(descriptor)
        .map(|parsed| parsed.return_type_name())
        .unwrap_or_else(|_| descriptor.to_string())
}
