// linkage_checker - JVM linkage errors across a resolved classpath
mod annotator;
mod checker;
mod class_path_repository;
mod config;
mod exclusion;
mod extract;
mod format;
mod problem;
mod reference_graph;
mod report;
mod symbol;

pub mod classfile;

pub use annotator::{AnnotationError, CauseAnnotator, annotate_causes};
pub use checker::{LinkageCheckError, LinkageChecker, check_artifacts, find_linkage_problems};
pub use class_path_repository::{ClassPathIndexError, ClassPathRepository};
pub use config::{CheckerConfig, ConfigError, DEFAULT_CLASS_CACHE_CAPACITY};
pub use exclusion::{
    ExclusionFileError, ExclusionRule, ExclusionRules, SourceMatcher, TargetMatcher,
};
pub use extract::{extract_symbol_references, symbols_of};
pub use format::format_linkage_problems;
pub use problem::{DroppedEdge, ErrorType, LinkageProblem, LinkageProblemCause};
pub use reference_graph::ClassReferenceGraph;
pub use report::LinkageCheckReport;
pub use symbol::{ClassFile, Symbol, SymbolReferences};
