use crate::symbol::{ClassFile, Symbol};
use linkage_deps::{Artifact, DependencyPath};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Why a symbol reference fails to link.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ErrorType {
    ClassNotFound,
    SymbolNotFound,
    InaccessibleClass,
    InaccessibleMember,
    IncompatibleClassChange,
    /// A method with the same name and parameters exists but returns `actual_return_type`.
    MethodWithReturnTypeNotFound {
        actual_return_type: String,
    },
    AbstractMethod,
    InvalidClassFile {
        reason: String,
    },
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorType::ClassNotFound | ErrorType::SymbolNotFound => f.write_str("is not found"),
            ErrorType::InaccessibleClass | ErrorType::InaccessibleMember => {
                f.write_str("is not accessible")
            }
            ErrorType::IncompatibleClassChange => f.write_str("has changed incompatibly"),
            ErrorType::MethodWithReturnTypeNotFound { actual_return_type } => write!(
                f,
                "is not found. The expected return type does not match actual type {actual_return_type}"
            ),
            ErrorType::AbstractMethod => f.write_str("is not implemented in the class"),
            ErrorType::InvalidClassFile { reason } => write!(f, "could not be parsed: {reason}"),
        }
    }
}

/// A symbol reference from `source_class` that cannot be satisfied.
///
/// Equality and hashing cover the symbol, error type, target and source; the attached cause
/// and reachability flag are annotations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkageProblem {
    symbol: Symbol,
    error_type: ErrorType,
    target_class: Option<ClassFile>,
    source_class: ClassFile,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cause: Option<LinkageProblemCause>,
    reachable: bool,
}

impl LinkageProblem {
    pub fn new(
        symbol: Symbol,
        error_type: ErrorType,
        target_class: Option<ClassFile>,
        source_class: ClassFile,
    ) -> Self {
        let symbol = match symbol {
            Symbol::SuperClass { .. } | Symbol::Interface { .. } => symbol.to_class_symbol(),
            other => other,
        };
        Self {
            symbol,
            error_type,
            target_class,
            source_class,
            cause: None,
            reachable: true,
        }
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn error_type(&self) -> &ErrorType {
        &self.error_type
    }

    /// The class the symbol was found in, when it was found at all.
    pub fn target_class(&self) -> Option<&ClassFile> {
        self.target_class.as_ref()
    }

    pub fn source_class(&self) -> &ClassFile {
        &self.source_class
    }

    pub fn cause(&self) -> Option<&LinkageProblemCause> {
        self.cause.as_ref()
    }

    pub fn is_reachable(&self) -> bool {
        self.reachable
    }

    pub fn with_cause(mut self, cause: LinkageProblemCause) -> Self {
        self.cause = Some(cause);
        self
    }

    pub fn with_reachable(mut self, reachable: bool) -> Self {
        self.reachable = reachable;
        self
    }

    /// Attributes the problem to the top-level class enclosing its source.
    pub fn with_top_level_source(mut self) -> Self {
        self.source_class = self.source_class.top_level();
        self
    }

    /// Text shared by every problem with the same symbol, error and target location.
    pub fn describe(&self) -> String {
        match &self.target_class {
            Some(target) => format!("({}) {} {}", target.entry(), self.symbol, self.error_type),
            None => format!("{} {}", self.symbol, self.error_type),
        }
    }
}

impl PartialEq for LinkageProblem {
    fn eq(&self, other: &Self) -> bool {
        self.symbol == other.symbol
            && self.error_type == other.error_type
            && self.target_class == other.target_class
            && self.source_class == other.source_class
    }
}

impl Eq for LinkageProblem {}

impl Hash for LinkageProblem {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.symbol.hash(state);
        self.error_type.hash(state);
        self.target_class.hash(state);
        self.source_class.hash(state);
    }
}

impl fmt::Display for LinkageProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, referenced by {}", self.describe(), self.source_class)
    }
}

/// The edge that kept a dependency off the classpath.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DroppedEdge {
    Optional,
    Provided,
}

impl DroppedEdge {
    pub fn of_path(path: &DependencyPath) -> Option<Self> {
        if path.has_optional_edge() {
            Some(DroppedEdge::Optional)
        } else if path.has_provided_edge() {
            Some(DroppedEdge::Provided)
        } else {
            None
        }
    }
}

/// Why the dependency tree produced a linkage problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LinkageProblemCause {
    /// The artifact with the valid symbol is in the tree but not on the classpath.
    MissingDependency {
        path: DependencyPath,
        dropped_by: Option<DroppedEdge>,
    },
    /// The artifact with the valid symbol is excluded by `excluded_by`.
    ExcludedDependency {
        path: DependencyPath,
        excluded_by: Artifact,
    },
    /// The selected version of an artifact lacks the symbol that another version defines.
    DependencyConflict {
        symbol: Symbol,
        selected: DependencyPath,
        unselected: DependencyPath,
    },
    Unknown,
}

impl fmt::Display for LinkageProblemCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkageProblemCause::MissingDependency { path, dropped_by } => {
                write!(f, "The valid symbol is in {} at {path}", leaf_name(path))?;
                match dropped_by {
                    Some(DroppedEdge::Optional) => f.write_str(
                        " but it was not selected because the path contains an optional dependency",
                    ),
                    Some(DroppedEdge::Provided) => f.write_str(
                        " but it was not selected because the path contains a provided-scope dependency",
                    ),
                    None => Ok(()),
                }
            }
            LinkageProblemCause::ExcludedDependency { path, excluded_by } => {
                let excluded = path
                    .leaf()
                    .map(|artifact| artifact.key().to_string())
                    .unwrap_or_default();
                write!(
                    f,
                    "The valid symbol is in {} at {path} but it was not selected because {excluded_by} excludes {excluded}.",
                    leaf_name(path)
                )
            }
            LinkageProblemCause::DependencyConflict {
                symbol,
                selected,
                unselected,
            } => {
                writeln!(
                    f,
                    "Dependency conflict: {} does not define {symbol} but {} defines it.",
                    leaf_name(selected),
                    leaf_name(unselected)
                )?;
                writeln!(f, "  selected: {selected}")?;
                write!(f, "  unselected: {unselected}")
            }
            LinkageProblemCause::Unknown => f.write_str("Unknown"),
        }
    }
}

fn leaf_name(path: &DependencyPath) -> String {
    path.leaf().map(ToString::to_string).unwrap_or_default()
}
