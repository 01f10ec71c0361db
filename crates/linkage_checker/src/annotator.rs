//! Explains linkage problems in terms of the dependency tree.
//!
//! For each problem the dependency subtree of the artifact holding the source class is
//! resolved on its own, as if that artifact were the only root. The first subtree entry that
//! defines the missing symbol is the artifact the source class was compiled against; comparing
//! it with what the real classpath selected for the same `groupId:artifactId` tells which
//! edge dropped or replaced it.

use crate::class_path_repository::{ClassPathIndexError, ClassPathRepository};
use crate::config::CheckerConfig;
use crate::problem::{DroppedEdge, LinkageProblem, LinkageProblemCause};
use crate::symbol::{ClassFile, Symbol};
use indexmap::{IndexMap, IndexSet};
use linkage_deps::{
    Artifact, ArtifactRepository, ClassPathBuilder, ClassPathEntry, ClassPathResult,
    DependencyPath,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnnotationError {
    #[error("failed to index the dependencies of {artifact}: {source}")]
    Index {
        artifact: String,
        #[source]
        source: ClassPathIndexError,
    },
}

struct Subtree {
    result: ClassPathResult,
    repository: ClassPathRepository,
}

impl Subtree {
    /// The first entry defining `symbol`, with its path from the subtree root.
    fn supplier_of(&self, symbol: &Symbol) -> Option<(&ClassPathEntry, &DependencyPath)> {
        let class_name = symbol.class_name();
        self.result.class_path().iter().find_map(|entry| {
            let defines_class = self
                .repository
                .classes_defined_in(entry)
                .is_some_and(|classes| classes.contains(class_name));
            if !defines_class || !self.defines_member(entry, symbol) {
                return None;
            }
            let path = self.result.dependency_paths(entry).first()?;
            Some((entry, path))
        })
    }

    fn defines_member(&self, entry: &ClassPathEntry, symbol: &Symbol) -> bool {
        let class_file = ClassFile::new(entry.clone(), symbol.class_name());
        match self.repository.load_class_file(&class_file) {
            Ok(parsed) => match symbol {
                Symbol::Method {
                    name, descriptor, ..
                } => parsed.find_method(name, descriptor).is_some(),
                Symbol::Field {
                    name, descriptor, ..
                } => parsed.find_field(name, descriptor).is_some(),
                _ => true,
            },
            Err(error) => {
                tracing::debug!(class = %class_file, error = %error, "cannot inspect class");
                false
            }
        }
    }
}

/// Attaches a [`LinkageProblemCause`] to problems found on `class_path`.
///
/// Subtree resolutions are kept for the lifetime of the annotator, so one annotator should
/// serve one run.
pub struct CauseAnnotator<'a, R> {
    builder: &'a ClassPathBuilder<R>,
    class_path: &'a ClassPathResult,
    config: CheckerConfig,
    subtrees: IndexMap<Artifact, Option<Subtree>>,
}

impl<'a, R: ArtifactRepository> CauseAnnotator<'a, R> {
    pub fn new(builder: &'a ClassPathBuilder<R>, class_path: &'a ClassPathResult) -> Self {
        Self::with_config(builder, class_path, CheckerConfig::default())
    }

    pub fn with_config(
        builder: &'a ClassPathBuilder<R>,
        class_path: &'a ClassPathResult,
        config: CheckerConfig,
    ) -> Self {
        Self {
            builder,
            class_path,
            config,
            subtrees: IndexMap::new(),
        }
    }

    pub fn annotate<'p, I>(
        &mut self,
        problems: I,
    ) -> Result<IndexSet<LinkageProblem>, AnnotationError>
    where
        I: IntoIterator<Item = &'p LinkageProblem>,
    {
        let mut annotated = IndexSet::new();
        for problem in problems {
            let cause = self.cause_of(problem)?;
            annotated.insert(problem.clone().with_cause(cause));
        }
        Ok(annotated)
    }

    pub fn cause_of(
        &mut self,
        problem: &LinkageProblem,
    ) -> Result<LinkageProblemCause, AnnotationError> {
        let class_path = self.class_path;
        let source_entry = problem.source_class().entry();
        let Some(source_artifact) = source_entry.artifact() else {
            return Ok(LinkageProblemCause::Unknown);
        };
        let Some(path_to_source) = class_path.dependency_paths(source_entry).first() else {
            return Ok(LinkageProblemCause::Unknown);
        };
        let Some(subtree) = self.subtree(source_artifact)? else {
            return Ok(LinkageProblemCause::Unknown);
        };
        let Some((supplier_entry, subtree_path)) = subtree.supplier_of(problem.symbol()) else {
            return Ok(LinkageProblemCause::Unknown);
        };
        let Some(supplier) = supplier_entry.artifact() else {
            return Ok(LinkageProblemCause::Unknown);
        };

        let unselected = path_to_source.concat(subtree_path);
        let cause = match class_path.entry_for_key(&supplier.group_id, &supplier.artifact_id) {
            Some(selected_entry) => {
                let same_version = selected_entry
                    .artifact()
                    .is_some_and(|selected| selected.version == supplier.version);
                if same_version {
                    LinkageProblemCause::Unknown
                } else {
                    LinkageProblemCause::DependencyConflict {
                        symbol: problem.symbol().clone(),
                        selected: class_path
                            .dependency_paths(selected_entry)
                            .first()
                            .cloned()
                            .unwrap_or_default(),
                        unselected,
                    }
                }
            }
            None => match unselected.find_exclusion(&supplier.group_id, &supplier.artifact_id) {
                Some(excluded_by) => LinkageProblemCause::ExcludedDependency {
                    excluded_by: excluded_by.clone(),
                    path: unselected,
                },
                None => LinkageProblemCause::MissingDependency {
                    dropped_by: DroppedEdge::of_path(&unselected),
                    path: unselected,
                },
            },
        };
        Ok(cause)
    }

    fn subtree(&mut self, artifact: &Artifact) -> Result<Option<&Subtree>, AnnotationError> {
        if !self.subtrees.contains_key(artifact) {
            let subtree = self.resolve_subtree(artifact)?;
            self.subtrees.insert(artifact.clone(), subtree);
        }
        Ok(self.subtrees.get(artifact).and_then(Option::as_ref))
    }

    fn resolve_subtree(&self, artifact: &Artifact) -> Result<Option<Subtree>, AnnotationError> {
        let result = match self.builder.resolve_subtree(artifact) {
            Ok(result) => result,
            Err(error) => {
                tracing::warn!(
                    artifact = %artifact,
                    error = %error,
                    "dependency subtree could not be resolved; causes stay unknown"
                );
                return Ok(None);
            }
        };
        let repository = ClassPathRepository::with_config(result.class_path(), &self.config)
            .map_err(|source| AnnotationError::Index {
                artifact: artifact.to_string(),
                source,
            })?;
        tracing::debug!(
            artifact = %artifact,
            entries = result.class_path().len(),
            "resolved dependency subtree"
        );
        Ok(Some(Subtree { result, repository }))
    }
}

/// Annotates every problem in one pass with a fresh annotator.
pub fn annotate_causes<'p, R, I>(
    builder: &ClassPathBuilder<R>,
    class_path: &ClassPathResult,
    problems: I,
) -> Result<IndexSet<LinkageProblem>, AnnotationError>
where
    R: ArtifactRepository,
    I: IntoIterator<Item = &'p LinkageProblem>,
{
    CauseAnnotator::new(builder, class_path).annotate(problems)
}
