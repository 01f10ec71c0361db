//! 依存グラフからクラスパスを組み立てる。
//!
//! クラスパスの順序は意味を持つ。同じクラスを定義するエントリが複数ある場合、
//! 先頭に近いものが使われる。

use crate::artifact::Artifact;
use crate::bom::Bom;
use crate::graph::{
    DependencyGraph, DependencyGraphBuilder, GraphBuildError, GraphMode, GraphRequest,
    UnresolvableArtifactProblem,
};
use crate::mediation::{AnnotatedClassPath, DependencyMediation, NearestWins};
use crate::path::DependencyPath;
use crate::repository::{ArtifactRepository, RepositoryError};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// クラスパス上の 1 要素。アーティファクト由来か、単独のファイル/ディレクトリ。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassPathEntry {
    Artifact(Artifact),
    File(PathBuf),
}

impl ClassPathEntry {
    pub fn artifact(&self) -> Option<&Artifact> {
        match self {
            ClassPathEntry::Artifact(artifact) => Some(artifact),
            ClassPathEntry::File(_) => None,
        }
    }

    /// 実体のパス。ファイルを持たないアーティファクトでは `None`。
    pub fn path(&self) -> Option<&Path> {
        match self {
            ClassPathEntry::Artifact(artifact) => artifact.file(),
            ClassPathEntry::File(path) => Some(path),
        }
    }
}

impl From<Artifact> for ClassPathEntry {
    fn from(artifact: Artifact) -> Self {
        ClassPathEntry::Artifact(artifact)
    }
}

impl From<PathBuf> for ClassPathEntry {
    fn from(path: PathBuf) -> Self {
        ClassPathEntry::File(path)
    }
}

impl fmt::Display for ClassPathEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassPathEntry::Artifact(artifact) => write!(f, "{artifact}"),
            ClassPathEntry::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// クラスパス構築の結果。解決できなかったアーティファクトは致命的でない限り
/// `artifact_problems` に残る。
#[derive(Debug, Clone, Default)]
pub struct ClassPathResult {
    class_path: Vec<ClassPathEntry>,
    dependency_paths: IndexMap<ClassPathEntry, Vec<DependencyPath>>,
    artifact_problems: Vec<UnresolvableArtifactProblem>,
}

impl ClassPathResult {
    pub fn new(
        dependency_paths: IndexMap<ClassPathEntry, Vec<DependencyPath>>,
        artifact_problems: Vec<UnresolvableArtifactProblem>,
    ) -> Self {
        Self {
            class_path: dependency_paths.keys().cloned().collect(),
            dependency_paths,
            artifact_problems,
        }
    }

    /// 依存パスを持たないファイルだけのクラスパス。
    pub fn from_entries(entries: impl IntoIterator<Item = ClassPathEntry>) -> Self {
        let dependency_paths = entries
            .into_iter()
            .map(|entry| (entry, Vec::new()))
            .collect();
        Self::new(dependency_paths, Vec::new())
    }

    pub fn class_path(&self) -> &[ClassPathEntry] {
        &self.class_path
    }

    pub fn dependency_paths(&self, entry: &ClassPathEntry) -> &[DependencyPath] {
        self.dependency_paths
            .get(entry)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn artifact_problems(&self) -> &[UnresolvableArtifactProblem] {
        &self.artifact_problems
    }

    /// `groupId:artifactId` が一致するエントリ。
    pub fn entry_for_key(&self, group_id: &str, artifact_id: &str) -> Option<&ClassPathEntry> {
        self.class_path.iter().find(|entry| {
            entry
                .artifact()
                .map(|artifact| artifact.has_key(group_id, artifact_id))
                .unwrap_or(false)
        })
    }

    /// 各エントリへの依存パスを人が読める形に整形する。
    pub fn format_dependency_paths(&self, entries: &[ClassPathEntry]) -> String {
        let mut message = String::new();
        for entry in entries {
            let paths = self.dependency_paths(entry);
            message.push_str(&format!("{entry} is at:\n"));
            if paths.is_empty() {
                message.push_str("  (no dependency path)\n");
            }
            for path in paths {
                message.push_str(&format!("  {path}\n"));
            }
        }
        message
    }
}

#[derive(Debug, Error)]
pub enum ClassPathError {
    #[error(transparent)]
    Graph(#[from] GraphBuildError),
    #[error("BOM {bom} を取得できません: {source}")]
    Bom {
        bom: String,
        #[source]
        source: RepositoryError,
    },
}

/// 依存グラフを構築し、調停してクラスパスへ変換する。
pub struct ClassPathBuilder<R> {
    graph_builder: DependencyGraphBuilder<R>,
}

impl<R: ArtifactRepository> ClassPathBuilder<R> {
    pub fn new(repository: R) -> Self {
        Self {
            graph_builder: DependencyGraphBuilder::new(repository),
        }
    }

    pub fn graph_builder(&self) -> &DependencyGraphBuilder<R> {
        &self.graph_builder
    }

    /// `artifacts` とその推移的依存からクラスパスを作る。
    ///
    /// `full` が真なら各ノードを再解決した完全なグラフ (optional を含む) を使い、偽なら
    /// Maven の選択規則で収集したグラフを使う。致命的なのは要求したアーティファクト自身を
    /// 解決できない場合だけで、推移的な失敗は `artifact_problems` に残る。
    pub fn resolve(
        &self,
        artifacts: &[Artifact],
        full: bool,
        mediation: &dyn DependencyMediation,
    ) -> Result<ClassPathResult, ClassPathError> {
        if artifacts.is_empty() {
            return Ok(ClassPathResult::default());
        }
        let request = GraphRequest::artifacts(artifacts);
        let mode = if full { GraphMode::Full } else { GraphMode::Maven };
        let graph = self.graph_builder.build_partial(&request, mode, false)?;
        let result = mediate(&graph, mediation);
        tracing::debug!(
            mediation = mediation.name(),
            entries = result.class_path().len(),
            problems = result.artifact_problems().len(),
            "クラスパスを構築しました"
        );
        Ok(result)
    }

    /// BOM の管理対象依存をルートとしてクラスパスを作る。
    pub fn resolve_bom(
        &self,
        bom: &Bom,
        mediation: &dyn DependencyMediation,
    ) -> Result<ClassPathResult, ClassPathError> {
        self.resolve(&bom.managed_dependencies, true, mediation)
    }

    /// リポジトリから BOM を取得してからクラスパスを作る。
    pub fn resolve_bom_artifact(
        &self,
        bom: &Artifact,
        mediation: &dyn DependencyMediation,
    ) -> Result<(Bom, ClassPathResult), ClassPathError> {
        let resolved = Bom::resolve(self.graph_builder.repository(), bom).map_err(|source| {
            ClassPathError::Bom {
                bom: bom.to_string(),
                source,
            }
        })?;
        let result = self.resolve_bom(&resolved, mediation)?;
        Ok((resolved, result))
    }

    /// `artifact` をルートとする完全な依存グラフ。provided スコープも含む。
    /// `artifact` 自身を解決できない場合だけ失敗する。
    pub fn dependency_graph_of(&self, artifact: &Artifact) -> Result<DependencyGraph, ClassPathError> {
        let request = GraphRequest::Rooted(artifact.clone());
        Ok(self
            .graph_builder
            .build_partial(&request, GraphMode::Full, true)?)
    }

    /// `artifact` をルートとする部分木のクラスパス。各パスのルートは `artifact` になる。
    pub fn resolve_subtree(&self, artifact: &Artifact) -> Result<ClassPathResult, ClassPathError> {
        let graph = self.dependency_graph_of(artifact)?;
        Ok(mediate(&graph, &NearestWins))
    }
}

fn mediate(graph: &DependencyGraph, mediation: &dyn DependencyMediation) -> ClassPathResult {
    let annotated = mediation.mediate(graph);
    to_class_path_result(&annotated, graph)
}

fn to_class_path_result(annotated: &AnnotatedClassPath, graph: &DependencyGraph) -> ClassPathResult {
    let mut problems: Vec<UnresolvableArtifactProblem> =
        graph.unresolved_artifacts().cloned().collect();
    let mut dependency_paths = IndexMap::new();

    for (artifact, paths) in annotated.iter() {
        if artifact.file().is_none() {
            let already_reported = problems
                .iter()
                .any(|problem| problem.artifact.same_identity(artifact));
            if !already_reported {
                tracing::warn!(artifact = %artifact, "ファイルを持たないアーティファクトをクラスパスから除外します");
                let problem = paths
                    .first()
                    .and_then(UnresolvableArtifactProblem::from_path)
                    .unwrap_or_else(|| UnresolvableArtifactProblem::new(artifact.clone(), Vec::new()));
                problems.push(problem);
            }
            continue;
        }
        dependency_paths.insert(ClassPathEntry::Artifact(artifact.clone()), paths.to_vec());
    }

    ClassPathResult::new(dependency_paths, problems)
}
