use crate::class_path_repository::{ClassPathIndexError, ClassPathRepository};
use crate::classfile::{
    MemberKind, MethodDescriptor, ParsedClass, outermost_class_name, parse_field_descriptor,
};
use crate::symbol::{ClassFile, Symbol, SymbolReferences};
use indexmap::{IndexMap, IndexSet};

/// Scans every class of every classpath entry and records the symbols it references.
///
/// Classes that fail to parse are recorded as invalid rather than aborting the scan. I/O and
/// archive errors abort it.
pub fn extract_symbol_references(
    repository: &ClassPathRepository,
) -> Result<SymbolReferences, ClassPathIndexError> {
    let mut references = IndexMap::new();
    let mut invalid = IndexMap::new();

    for entry in repository.entries() {
        let Some(classes) = repository.classes_defined_in(entry) else {
            continue;
        };
        for binary_name in classes {
            let class_file = ClassFile::new(entry.clone(), binary_name.clone());
            match repository.load_class_file(&class_file) {
                Ok(parsed) => {
                    let symbols = symbols_of(&parsed);
                    references.insert(class_file, symbols);
                }
                Err(ClassPathIndexError::ClassFile { path, source }) => {
                    tracing::warn!(
                        class = %class_file,
                        path = %path.display(),
                        error = %source,
                        "class file could not be parsed"
                    );
                    invalid.insert(class_file, source.to_string());
                }
                Err(error) => return Err(error),
            }
        }
    }

    let references = SymbolReferences::new(references, invalid);
    tracing::debug!(
        classes = references.sources().count(),
        symbols = references.len(),
        "extracted symbol references"
    );
    Ok(references)
}

/// Symbols referenced from one class: the supertypes, then class constants, then classes
/// named in declared field types, method signatures and throws clauses, then member
/// references.
///
/// References to the class itself and to classes nested in the same top-level class are
/// dropped.
pub fn symbols_of(class: &ParsedClass) -> IndexSet<Symbol> {
    let own_outer = outermost_class_name(&class.binary_name);
    let is_reflexive = |name: &str| outermost_class_name(name) == own_outer;

    let mut symbols = IndexSet::new();
    if let Some(super_class) = &class.super_class {
        symbols.insert(Symbol::super_class(super_class.as_str()));
    }
    for interface in &class.interfaces {
        symbols.insert(Symbol::interface(interface.as_str()));
    }

    for constant in &class.class_constants {
        if is_reflexive(&constant.name) || is_supertype(class, &constant.name) {
            continue;
        }
        symbols.insert(Symbol::class(constant.name.as_str()));
    }

    for name in signature_classes(class) {
        if is_reflexive(&name) || is_supertype(class, &name) {
            continue;
        }
        symbols.insert(Symbol::class(name));
    }

    for reference in &class.member_references {
        // methods on array types such as `[I.clone()` are supplied by the runtime
        if reference.owner.starts_with('[') || is_reflexive(&reference.owner) {
            continue;
        }
        let symbol = match reference.kind {
            MemberKind::Field => Symbol::field(
                reference.owner.as_str(),
                reference.name.as_str(),
                reference.descriptor.as_str(),
            ),
            MemberKind::Method | MemberKind::InterfaceMethod => Symbol::method(
                reference.owner.as_str(),
                reference.name.as_str(),
                reference.descriptor.as_str(),
                reference.kind == MemberKind::InterfaceMethod,
            ),
        };
        symbols.insert(symbol);
    }
    symbols
}

fn is_supertype(class: &ParsedClass, name: &str) -> bool {
    class.super_class.as_deref() == Some(name) || class.interfaces.iter().any(|i| i == name)
}

/// Classes named by the declarations of `class`. Descriptors that do not parse name nothing.
fn signature_classes(class: &ParsedClass) -> Vec<String> {
    let mut names = Vec::new();
    for field in &class.fields {
        if let Ok(ty) = parse_field_descriptor(&field.descriptor) {
            names.extend(ty.class_name().map(str::to_string));
        }
    }
    for method in &class.methods {
        if let Ok(descriptor) = MethodDescriptor::parse(&method.descriptor) {
            let types = descriptor.parameters.iter().chain(&descriptor.return_type);
            names.extend(types.filter_map(|ty| ty.class_name().map(str::to_string)));
        }
        names.extend(method.exceptions.iter().cloned());
    }
    names
}
