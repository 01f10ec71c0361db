use crate::classfile::{MethodDescriptor, outermost_class_name};
use indexmap::{IndexMap, IndexSet};
use linkage_deps::ClassPathEntry;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One class as found in one classpath entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClassFile {
    entry: ClassPathEntry,
    binary_name: String,
}

impl ClassFile {
    pub fn new(entry: ClassPathEntry, binary_name: impl Into<String>) -> Self {
        Self {
            entry,
            binary_name: binary_name.into(),
        }
    }

    pub fn entry(&self) -> &ClassPathEntry {
        &self.entry
    }

    pub fn binary_name(&self) -> &str {
        &self.binary_name
    }

    /// The same location, named by its top-level class.
    pub fn top_level(&self) -> ClassFile {
        ClassFile::new(
            self.entry.clone(),
            outermost_class_name(&self.binary_name),
        )
    }
}

impl fmt::Display for ClassFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.binary_name, self.entry)
    }
}

/// A reference from one class to another class or one of its members.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Symbol {
    Class {
        class_name: String,
    },
    /// The class is the direct superclass of the referencing class.
    SuperClass {
        class_name: String,
    },
    /// The class is listed as an implemented interface of the referencing class.
    Interface {
        class_name: String,
    },
    Method {
        class_name: String,
        name: String,
        descriptor: String,
        /// Whether the call site dispatches through an interface.
        interface_method: bool,
    },
    Field {
        class_name: String,
        name: String,
        descriptor: String,
    },
}

impl Symbol {
    pub fn class(class_name: impl Into<String>) -> Self {
        Symbol::Class {
            class_name: class_name.into(),
        }
    }

    pub fn super_class(class_name: impl Into<String>) -> Self {
        Symbol::SuperClass {
            class_name: class_name.into(),
        }
    }

    pub fn interface(class_name: impl Into<String>) -> Self {
        Symbol::Interface {
            class_name: class_name.into(),
        }
    }

    pub fn method(
        class_name: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
        interface_method: bool,
    ) -> Self {
        Symbol::Method {
            class_name: class_name.into(),
            name: name.into(),
            descriptor: descriptor.into(),
            interface_method,
        }
    }

    pub fn field(
        class_name: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Self {
        Symbol::Field {
            class_name: class_name.into(),
            name: name.into(),
            descriptor: descriptor.into(),
        }
    }

    /// The class that must be loaded to resolve this symbol.
    pub fn class_name(&self) -> &str {
        match self {
            Symbol::Class { class_name }
            | Symbol::SuperClass { class_name }
            | Symbol::Interface { class_name }
            | Symbol::Method { class_name, .. }
            | Symbol::Field { class_name, .. } => class_name,
        }
    }

    /// Member name for method and field symbols.
    pub fn member_name(&self) -> Option<&str> {
        match self {
            Symbol::Method { name, .. } | Symbol::Field { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Supertype symbols are reported as plain class symbols.
    pub fn to_class_symbol(&self) -> Symbol {
        Symbol::class(self.class_name())
    }

    pub fn is_class_reference(&self) -> bool {
        matches!(
            self,
            Symbol::Class { .. } | Symbol::SuperClass { .. } | Symbol::Interface { .. }
        )
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::Class { class_name }
            | Symbol::SuperClass { class_name }
            | Symbol::Interface { class_name } => write!(f, "Class {class_name}"),
            Symbol::Method {
                class_name,
                name,
                descriptor,
                ..
            } => {
                let rendered = MethodDescriptor::parse(descriptor)
                    .map(|parsed| parsed.render(name))
                    .unwrap_or_else(|_| format!("{name}{descriptor}"));
                write!(f, "{class_name}'s method {rendered}")
            }
            Symbol::Field {
                class_name, name, ..
            } => write!(f, "{class_name}'s field {name}"),
        }
    }
}

/// Symbols referenced by each class on a classpath, plus the classes that could not be
/// parsed. Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct SymbolReferences {
    references: IndexMap<ClassFile, IndexSet<Symbol>>,
    invalid_class_files: IndexMap<ClassFile, String>,
}

impl SymbolReferences {
    pub fn new(
        references: IndexMap<ClassFile, IndexSet<Symbol>>,
        invalid_class_files: IndexMap<ClassFile, String>,
    ) -> Self {
        Self {
            references,
            invalid_class_files,
        }
    }

    pub fn sources(&self) -> impl Iterator<Item = &ClassFile> {
        self.references.keys()
    }

    pub fn symbols(&self, source: &ClassFile) -> Option<&IndexSet<Symbol>> {
        self.references.get(source)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ClassFile, &Symbol)> {
        self.references
            .iter()
            .flat_map(|(source, symbols)| symbols.iter().map(move |symbol| (source, symbol)))
    }

    /// Number of (source, symbol) pairs.
    pub fn len(&self) -> usize {
        self.references.values().map(IndexSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Classes that failed to parse, with the parse error.
    pub fn invalid_class_files(&self) -> &IndexMap<ClassFile, String> {
        &self.invalid_class_files
    }

    /// A copy with `additional` references merged in after the existing ones.
    pub fn with_additional<I>(&self, additional: I) -> Self
    where
        I: IntoIterator<Item = (ClassFile, Symbol)>,
    {
        let mut copy = self.clone();
        for (source, symbol) in additional {
            copy.references.entry(source).or_default().insert(symbol);
        }
        copy
    }
}

impl FromIterator<(ClassFile, Symbol)> for SymbolReferences {
    fn from_iter<T: IntoIterator<Item = (ClassFile, Symbol)>>(iter: T) -> Self {
        SymbolReferences::default().with_additional(iter)
    }
}
