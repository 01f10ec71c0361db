use super::{ArtifactRepository, DependencyNode, RepositoryError, ResolvedArtifact};
use crate::artifact::{ArtifactKey, Dependency, DependencyScope, Exclusion};
use crate::graph::{DependencySelector, GraphMode};
use std::collections::HashMap;

/// `ArtifactRepository::collect` の既定実装。
///
/// `root` は深さ 1 の要求依存として扱う。祖先と同じ `groupId:artifactId` に戻る
/// エッジは循環として捨て、祖先で宣言された除外は子孫へ引き継ぐ。
pub fn collect_tree<R>(
    repository: &R,
    root: &Dependency,
    include_provided: bool,
) -> Result<DependencyNode, RepositoryError>
where
    R: ArtifactRepository + ?Sized,
{
    let selector = DependencySelector::new(GraphMode::Maven, include_provided);
    let mut resolved_cache: HashMap<String, Result<ResolvedArtifact, RepositoryError>> =
        HashMap::new();

    let resolved = repository.resolve(&root.artifact)?;
    let mut node = DependencyNode::new(root.with_artifact(resolved.artifact.clone()));
    let mut ancestors = vec![root.artifact.key()];
    expand(
        repository,
        &selector,
        &mut resolved_cache,
        &mut node,
        &resolved,
        &mut ancestors,
        &root.exclusions,
        1,
    );
    Ok(node)
}

#[allow(clippy::too_many_arguments)]
fn expand<R>(
    repository: &R,
    selector: &DependencySelector,
    cache: &mut HashMap<String, Result<ResolvedArtifact, RepositoryError>>,
    node: &mut DependencyNode,
    resolved: &ResolvedArtifact,
    ancestors: &mut Vec<ArtifactKey>,
    inherited_exclusions: &[Exclusion],
    depth: usize,
) where
    R: ArtifactRepository + ?Sized,
{
    for declared in &resolved.dependencies {
        let artifact = &declared.artifact;
        if !selector.select(declared, depth + 1) {
            continue;
        }
        if inherited_exclusions
            .iter()
            .any(|exclusion| exclusion.matches(&artifact.group_id, &artifact.artifact_id))
        {
            continue;
        }
        if ancestors.contains(&artifact.key()) {
            tracing::debug!(artifact = %artifact, "循環依存のエッジを除外しました");
            continue;
        }

        if declared.scope == DependencyScope::System {
            node.children.push(DependencyNode::new(declared.clone()));
            continue;
        }

        let result = cache
            .entry(artifact.coordinates())
            .or_insert_with(|| repository.resolve(artifact))
            .clone();
        match result {
            Ok(child_resolved) => {
                let mut child =
                    DependencyNode::new(declared.with_artifact(child_resolved.artifact.clone()));
                let mut exclusions = inherited_exclusions.to_vec();
                exclusions.extend(declared.exclusions.iter().cloned());
                ancestors.push(artifact.key());
                expand(
                    repository,
                    selector,
                    cache,
                    &mut child,
                    &child_resolved,
                    ancestors,
                    &exclusions,
                    depth + 1,
                );
                ancestors.pop();
                node.children.push(child);
            }
            Err(error) => {
                tracing::warn!(artifact = %artifact, error = %error, "依存の解決に失敗しました");
                let mut child = DependencyNode::new(declared.clone());
                child.failure = Some(error);
                node.children.push(child);
            }
        }
    }
}
