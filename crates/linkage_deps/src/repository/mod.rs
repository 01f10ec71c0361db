//! アーティファクトリポジトリとの境界。
//!
//! ネットワークアクセスやローカルキャッシュはこのクレートの責務外で、呼び出し側が
//! `ArtifactRepository` を実装して注入する。

mod collect;
mod memory;

pub use collect::collect_tree;
pub use memory::InMemoryRepository;

use crate::artifact::{Artifact, Dependency};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("アーティファクト {artifact} がリポジトリに見つかりません")]
    NotFound { artifact: String },
    #[error("アーティファクト {artifact} の取得に失敗しました: {reason}")]
    Unavailable { artifact: String, reason: String },
    #[error("アーティファクト {artifact} の記述子が不正です: {reason}")]
    InvalidDescriptor { artifact: String, reason: String },
}

impl RepositoryError {
    pub fn not_found(artifact: &Artifact) -> Self {
        RepositoryError::NotFound {
            artifact: artifact.to_string(),
        }
    }
}

/// `resolve` の結果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArtifact {
    /// ファイルパスが設定されたアーティファクト。
    pub artifact: Artifact,
    /// 記述子で宣言された直接依存 (全スコープ、optional を含む)。
    pub dependencies: Vec<Dependency>,
    /// 管理対象依存の一覧。BOM でのみ空でない。
    pub managed_dependencies: Vec<Artifact>,
}

impl ResolvedArtifact {
    pub fn new(artifact: Artifact) -> Self {
        Self {
            artifact,
            dependencies: Vec::new(),
            managed_dependencies: Vec::new(),
        }
    }
}

/// `collect` が返す依存ツリーのノード。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyNode {
    pub dependency: Dependency,
    pub children: Vec<DependencyNode>,
    /// 子の解決に失敗した場合の原因。失敗したノードは子を持たない。
    pub failure: Option<RepositoryError>,
}

impl DependencyNode {
    pub fn new(dependency: Dependency) -> Self {
        Self {
            dependency,
            children: Vec::new(),
            failure: None,
        }
    }

    pub fn artifact(&self) -> &Artifact {
        &self.dependency.artifact
    }
}

pub trait ArtifactRepository: Send + Sync {
    /// アーティファクトのファイルと直接依存を解決する。
    fn resolve(&self, artifact: &Artifact) -> Result<ResolvedArtifact, RepositoryError>;

    /// `root` を要求された依存とみなし、その下の依存ツリーを Maven の選択規則で収集する。
    ///
    /// 既定実装は `resolve` を繰り返し呼び出す。実際のリゾルバを背後に持つ
    /// リポジトリは上書きしてよい。
    fn collect(
        &self,
        root: &Dependency,
        include_provided: bool,
    ) -> Result<DependencyNode, RepositoryError> {
        collect_tree(self, root, include_provided)
    }
}

impl<R: ArtifactRepository + ?Sized> ArtifactRepository for &R {
    fn resolve(&self, artifact: &Artifact) -> Result<ResolvedArtifact, RepositoryError> {
        (**self).resolve(artifact)
    }

    fn collect(
        &self,
        root: &Dependency,
        include_provided: bool,
    ) -> Result<DependencyNode, RepositoryError> {
        (**self).collect(root, include_provided)
    }
}

impl<R: ArtifactRepository + ?Sized> ArtifactRepository for std::sync::Arc<R> {
    fn resolve(&self, artifact: &Artifact) -> Result<ResolvedArtifact, RepositoryError> {
        (**self).resolve(artifact)
    }

    fn collect(
        &self,
        root: &Dependency,
        include_provided: bool,
    ) -> Result<DependencyNode, RepositoryError> {
        (**self).collect(root, include_provided)
    }
}
