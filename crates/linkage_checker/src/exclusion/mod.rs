//! Exclusion rules: which linkage problems to leave out of a report.
//!
//! Rules are exchanged as an XML document rooted at `<LinkageCheckerFilter>`. Each
//! `<LinkageError>` holds an optional `<Target>` and an optional `<Source>` (at least one is
//! required); a rule matches a problem when every part present matches. A part matches when
//! any of its child matchers does.

mod reader;
mod writer;

use crate::problem::LinkageProblem;
use crate::symbol::{ClassFile, Symbol};
use indexmap::IndexSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

const DEFAULT_RULES: &str = include_str!("default_rules.xml");

#[derive(Debug, Error)]
pub enum ExclusionFileError {
    #[error("failed to read exclusion file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed exclusion document: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("root element must be <LinkageCheckerFilter>, found <{0}>")]
    UnexpectedRoot(String),
    #[error("unexpected <{found}> in <{parent}>, expected one of: {expected}")]
    UnexpectedElement {
        parent: String,
        found: String,
        expected: String,
    },
    #[error("<{element}> requires the {attribute} attribute")]
    MissingAttribute {
        element: String,
        attribute: &'static str,
    },
    #[error("<LinkageError> needs a <Target> or a <Source>")]
    EmptyRule,
    #[error("invalid artifact coordinates '{0}', expected groupId:artifactId[:version]")]
    ArtifactCoordinates(String),
    #[error("failed to write exclusion document: {0}")]
    Write(#[from] quick_xml::Error),
    #[error("exclusion document is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Matches the symbol a problem is about.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TargetMatcher {
    /// The class and any member on it.
    Class { name: String },
    Method { class_name: String, name: String },
    Field { class_name: String, name: String },
    /// Classes in the package and its subpackages.
    Package { name: String },
}

impl TargetMatcher {
    pub fn matches(&self, symbol: &Symbol) -> bool {
        match (self, symbol) {
            (TargetMatcher::Class { name }, symbol) => symbol.class_name() == name,
            (TargetMatcher::Package { name }, symbol) => in_package(symbol.class_name(), name),
            (
                TargetMatcher::Method { class_name, name },
                Symbol::Method {
                    class_name: symbol_class,
                    name: symbol_name,
                    ..
                },
            )
            | (
                TargetMatcher::Field { class_name, name },
                Symbol::Field {
                    class_name: symbol_class,
                    name: symbol_name,
                    ..
                },
            ) => class_name == symbol_class && name == symbol_name,
            _ => false,
        }
    }
}

/// Matches the class a problem was found in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceMatcher {
    Class {
        name: String,
    },
    Package {
        name: String,
    },
    /// Classes from an artifact; a missing version matches every version.
    Artifact {
        group_id: String,
        artifact_id: String,
        version: Option<String>,
    },
}

impl SourceMatcher {
    pub fn artifact(coordinates: &str) -> Result<Self, ExclusionFileError> {
        let parts: Vec<&str> = coordinates.trim().split(':').collect();
        let invalid = || ExclusionFileError::ArtifactCoordinates(coordinates.to_string());
        if parts.iter().any(|part| part.is_empty()) {
            return Err(invalid());
        }
        match parts.as_slice() {
            [group_id, artifact_id] => Ok(SourceMatcher::Artifact {
                group_id: group_id.to_string(),
                artifact_id: artifact_id.to_string(),
                version: None,
            }),
            [group_id, artifact_id, version] => Ok(SourceMatcher::Artifact {
                group_id: group_id.to_string(),
                artifact_id: artifact_id.to_string(),
                version: Some(version.to_string()),
            }),
            _ => Err(invalid()),
        }
    }

    pub fn matches(&self, source: &ClassFile) -> bool {
        match self {
            SourceMatcher::Class { name } => source.binary_name() == name,
            SourceMatcher::Package { name } => in_package(source.binary_name(), name),
            SourceMatcher::Artifact {
                group_id,
                artifact_id,
                version,
            } => source
                .entry()
                .artifact()
                .map(|artifact| {
                    artifact.has_key(group_id, artifact_id)
                        && version
                            .as_deref()
                            .map(|version| artifact.version == version)
                            .unwrap_or(true)
                })
                .unwrap_or(false),
        }
    }

    fn coordinates(&self) -> Option<String> {
        match self {
            SourceMatcher::Artifact {
                group_id,
                artifact_id,
                version: Some(version),
            } => Some(format!("{group_id}:{artifact_id}:{version}")),
            SourceMatcher::Artifact {
                group_id,
                artifact_id,
                version: None,
            } => Some(format!("{group_id}:{artifact_id}")),
            _ => None,
        }
    }
}

fn in_package(class_name: &str, package: &str) -> bool {
    class_name
        .strip_prefix(package)
        .map(|rest| rest.starts_with('.'))
        .unwrap_or(false)
}

/// One `<LinkageError>` element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ExclusionRule {
    pub targets: Vec<TargetMatcher>,
    pub sources: Vec<SourceMatcher>,
    pub reason: Option<String>,
}

impl ExclusionRule {
    pub fn matches(&self, problem: &LinkageProblem) -> bool {
        let target_matches = self.targets.is_empty()
            || self
                .targets
                .iter()
                .any(|target| target.matches(problem.symbol()));
        let source_matches = self.sources.is_empty()
            || self
                .sources
                .iter()
                .any(|source| source.matches(problem.source_class()));
        target_matches && source_matches
    }
}

/// An ordered list of exclusion rules.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExclusionRules {
    rules: Vec<ExclusionRule>,
}

impl ExclusionRules {
    pub fn new(rules: Vec<ExclusionRule>) -> Self {
        Self { rules }
    }

    /// Problems known to be harmless in widely used libraries.
    pub fn defaults() -> Result<Self, ExclusionFileError> {
        Self::parse(DEFAULT_RULES)
    }

    pub fn parse(document: &str) -> Result<Self, ExclusionFileError> {
        reader::parse_document(document).map(Self::new)
    }

    pub fn read(path: &Path) -> Result<Self, ExclusionFileError> {
        let contents = fs::read_to_string(path).map_err(|source| ExclusionFileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let rules = Self::parse(&contents)?;
        tracing::debug!(path = %path.display(), rules = rules.len(), "loaded exclusion rules");
        Ok(rules)
    }

    pub fn write(&self) -> Result<String, ExclusionFileError> {
        writer::write_document(&self.rules)
    }

    pub fn write_to(&self, path: &Path) -> Result<(), ExclusionFileError> {
        let document = self.write()?;
        fs::write(path, document).map_err(|source| ExclusionFileError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// One rule per distinct (symbol, source class) pair, matching exactly that reference.
    pub fn from_problems<'a, I>(problems: I) -> Self
    where
        I: IntoIterator<Item = &'a LinkageProblem>,
    {
        let mut rules = IndexSet::new();
        for problem in problems {
            let target = match problem.symbol() {
                Symbol::Method {
                    class_name, name, ..
                } => TargetMatcher::Method {
                    class_name: class_name.clone(),
                    name: name.clone(),
                },
                Symbol::Field {
                    class_name, name, ..
                } => TargetMatcher::Field {
                    class_name: class_name.clone(),
                    name: name.clone(),
                },
                symbol => TargetMatcher::Class {
                    name: symbol.class_name().to_string(),
                },
            };
            rules.insert(ExclusionRule {
                targets: vec![target],
                sources: vec![SourceMatcher::Class {
                    name: problem.source_class().binary_name().to_string(),
                }],
                reason: None,
            });
        }
        Self::new(rules.into_iter().collect())
    }

    pub fn rules(&self) -> &[ExclusionRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn extend(&mut self, other: ExclusionRules) {
        self.rules.extend(other.rules);
    }

    pub fn matches(&self, problem: &LinkageProblem) -> bool {
        self.rules.iter().any(|rule| rule.matches(problem))
    }
}
