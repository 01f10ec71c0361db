use super::{ArtifactRepository, RepositoryError, ResolvedArtifact};
use crate::artifact::{Artifact, Dependency};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

/// 事前に登録したメタデータだけで応答するリポジトリ。
///
/// 解決済みメタデータを持つ組み込み用途とテストで使う。登録されていない座標は
/// `RepositoryError::NotFound` になる。
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    artifacts: HashMap<String, ResolvedArtifact>,
    failures: HashMap<String, String>,
    resolve_calls: AtomicUsize,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// アーティファクトとその直接依存を登録する。
    pub fn add(
        &mut self,
        artifact: Artifact,
        file: Option<PathBuf>,
        dependencies: Vec<Dependency>,
    ) -> &mut Self {
        let artifact = match file {
            Some(file) => artifact.with_file(file),
            None => artifact,
        };
        let coordinates = artifact.coordinates();
        let mut resolved = ResolvedArtifact::new(artifact);
        resolved.dependencies = dependencies;
        self.artifacts.insert(coordinates, resolved);
        self
    }

    /// 管理対象依存だけを持つ BOM を登録する。
    pub fn add_bom(&mut self, bom: Artifact, managed: Vec<Artifact>) -> &mut Self {
        let coordinates = bom.coordinates();
        let mut resolved = ResolvedArtifact::new(bom.with_extension("pom"));
        resolved.managed_dependencies = managed;
        self.artifacts.insert(coordinates, resolved);
        self
    }

    /// 解決が必ず失敗するアーティファクトを登録する。
    pub fn add_failure(&mut self, artifact: &Artifact, reason: impl Into<String>) -> &mut Self {
        self.failures.insert(artifact.coordinates(), reason.into());
        self
    }

    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::Relaxed)
    }
}

impl ArtifactRepository for InMemoryRepository {
    fn resolve(&self, artifact: &Artifact) -> Result<ResolvedArtifact, RepositoryError> {
        self.resolve_calls.fetch_add(1, Ordering::Relaxed);
        let coordinates = artifact.coordinates();
        if let Some(reason) = self.failures.get(&coordinates) {
            return Err(RepositoryError::Unavailable {
                artifact: artifact.to_string(),
                reason: reason.clone(),
            });
        }
        self.artifacts
            .get(&coordinates)
            .cloned()
            .ok_or_else(|| RepositoryError::not_found(artifact))
    }
}
