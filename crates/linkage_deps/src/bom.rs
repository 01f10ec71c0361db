use crate::artifact::Artifact;
use crate::repository::{ArtifactRepository, RepositoryError};
use serde::{Deserialize, Serialize};

/// 管理対象依存のバージョン一覧だけを持つアーティファクト (BOM)。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bom {
    pub coordinates: Artifact,
    pub managed_dependencies: Vec<Artifact>,
}

impl Bom {
    pub fn new(coordinates: Artifact, managed_dependencies: Vec<Artifact>) -> Self {
        Self {
            coordinates,
            managed_dependencies,
        }
    }

    /// リポジトリから BOM の管理対象依存を取得する。
    ///
    /// テスト用 jar や zip 型の管理対象はクラスパスに載らないので除外する。
    pub fn resolve<R>(repository: &R, artifact: &Artifact) -> Result<Self, RepositoryError>
    where
        R: ArtifactRepository + ?Sized,
    {
        let resolved = repository.resolve(artifact)?;
        let managed_dependencies = resolved
            .managed_dependencies
            .into_iter()
            .filter(|managed| !managed.is_zip() && managed.classifier() != Some("tests"))
            .collect::<Vec<_>>();
        tracing::debug!(
            bom = %artifact,
            managed = managed_dependencies.len(),
            "BOM の管理対象依存を取得しました"
        );
        Ok(Self::new(artifact.clone(), managed_dependencies))
    }
}
