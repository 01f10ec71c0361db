use super::selector::DependencySelector;
use super::{DependencyGraph, UnresolvableArtifactProblem};
use crate::artifact::{Artifact, Dependency, DependencyScope};
use crate::path::DependencyPath;
use crate::repository::{ArtifactRepository, DependencyNode, RepositoryError, ResolvedArtifact};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

/// グラフ構築モード。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphMode {
    /// 各ノードを自身をルートとして再解決する。optional な子を含み、祖先の除外は
    /// 適用しない。循環はアーティファクトの同一性 (g:a:v) で判定する。
    Full,
    /// Maven の収集規則に従うツリーを幅優先で平坦化する。循環は祖先の
    /// `groupId:artifactId` で判定する。
    Maven,
}

/// グラフ構築の起点。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphRequest {
    /// 単一アーティファクトをパスのルートにする。
    Rooted(Artifact),
    /// ルートを持たず、各依存を深さ 1 のエッジとして扱う。
    Dependencies(Vec<Dependency>),
}

impl GraphRequest {
    pub fn artifacts(artifacts: &[Artifact]) -> Self {
        GraphRequest::Dependencies(artifacts.iter().cloned().map(Dependency::compile).collect())
    }

    fn cache_key(&self) -> String {
        match self {
            GraphRequest::Rooted(artifact) => artifact.coordinates(),
            GraphRequest::Dependencies(dependencies) => dependencies
                .iter()
                .map(|dependency| dependency.artifact.coordinates())
                .collect::<Vec<_>>()
                .join(","),
        }
    }

    fn initial_paths(&self) -> Vec<DependencyPath> {
        match self {
            GraphRequest::Rooted(artifact) => vec![DependencyPath::rooted(artifact.clone())],
            GraphRequest::Dependencies(dependencies) => dependencies
                .iter()
                .map(|dependency| DependencyPath::default().append(dependency.clone()))
                .collect(),
        }
    }
}

/// 未解決ノードとそこへ至るパス、原因。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionFailure {
    pub path: DependencyPath,
    pub error: RepositoryError,
}

impl fmt::Display for ResolutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .path
            .artifacts()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" / ");
        write!(f, "{joined}: {}", self.error)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphBuildError {
    #[error("依存グラフの構築対象が指定されていません")]
    EmptyRequest,
    #[error("依存解決に失敗しました\n{}", format_failures(.0))]
    Aggregated(Vec<ResolutionFailure>),
}

impl GraphBuildError {
    pub fn failures(&self) -> &[ResolutionFailure] {
        match self {
            GraphBuildError::Aggregated(failures) => failures,
            GraphBuildError::EmptyRequest => &[],
        }
    }
}

fn format_failures(failures: &[ResolutionFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// どの失敗をグラフ構築全体の失敗とみなすか。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailureScope {
    /// optional/provided を含まないパス上の失敗すべて。
    MandatoryPaths,
    /// 要求されたアーティファクト (深さ 1 以下) の失敗だけ。Maven モードは常にこちら。
    RequestedOnly,
}

type ResolveResult = Result<Arc<ResolvedArtifact>, RepositoryError>;
type CollectResult = Arc<Vec<Result<DependencyNode, RepositoryError>>>;

/// 要求されたアーティファクト群から依存グラフを構築する。
///
/// リポジトリ呼び出しの結果はビルダーが所有するマップにメモ化される。キーは
/// アーティファクト集合の座標をカンマで連結した文字列で、寿命はビルダーと同じ。
pub struct DependencyGraphBuilder<R> {
    repository: R,
    resolved: Mutex<HashMap<String, ResolveResult>>,
    collected: Mutex<HashMap<String, CollectResult>>,
}

impl<R: ArtifactRepository> DependencyGraphBuilder<R> {
    pub fn new(repository: R) -> Self {
        Self {
            repository,
            resolved: Mutex::new(HashMap::new()),
            collected: Mutex::new(HashMap::new()),
        }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// 重複・衝突バージョンを含む完全な依存グラフ。
    pub fn build_dependency_graph(
        &self,
        artifacts: &[Artifact],
        include_provided: bool,
    ) -> Result<DependencyGraph, GraphBuildError> {
        self.build(
            &GraphRequest::artifacts(artifacts),
            GraphMode::Full,
            include_provided,
        )
    }

    /// Maven が見るのと同じ選択規則で集めた依存グラフ。
    pub fn build_maven_dependency_graph(
        &self,
        dependencies: &[Dependency],
        include_provided: bool,
    ) -> Result<DependencyGraph, GraphBuildError> {
        self.build(
            &GraphRequest::Dependencies(dependencies.to_vec()),
            GraphMode::Maven,
            include_provided,
        )
    }

    /// 必須パス上の失敗はすべて致命的として扱う。
    pub fn build(
        &self,
        request: &GraphRequest,
        mode: GraphMode,
        include_provided: bool,
    ) -> Result<DependencyGraph, GraphBuildError> {
        self.build_with(request, mode, include_provided, FailureScope::MandatoryPaths)
    }

    /// 要求されたアーティファクト自身の失敗だけを致命的とし、推移的な失敗は
    /// `UnresolvableArtifactProblem` としてグラフに残す。
    pub fn build_partial(
        &self,
        request: &GraphRequest,
        mode: GraphMode,
        include_provided: bool,
    ) -> Result<DependencyGraph, GraphBuildError> {
        self.build_with(request, mode, include_provided, FailureScope::RequestedOnly)
    }

    fn build_with(
        &self,
        request: &GraphRequest,
        mode: GraphMode,
        include_provided: bool,
        scope: FailureScope,
    ) -> Result<DependencyGraph, GraphBuildError> {
        if matches!(request, GraphRequest::Dependencies(dependencies) if dependencies.is_empty()) {
            return Err(GraphBuildError::EmptyRequest);
        }
        let graph = match mode {
            GraphMode::Full => self.level_order_full(request, include_provided, scope)?,
            GraphMode::Maven => self.level_order_maven(request, include_provided)?,
        };
        tracing::debug!(
            request = %request.cache_key(),
            ?mode,
            paths = graph.paths().len(),
            conflicts = graph.find_conflicts().len(),
            "依存グラフを構築しました"
        );
        Ok(graph)
    }

    fn level_order_full(
        &self,
        request: &GraphRequest,
        include_provided: bool,
        scope: FailureScope,
    ) -> Result<DependencyGraph, GraphBuildError> {
        let selector = DependencySelector::new(GraphMode::Full, include_provided);
        let mut graph = DependencyGraph::new();
        let mut failures = Vec::new();
        let mut fatal = false;
        let mut queue: VecDeque<DependencyPath> = request.initial_paths().into();

        while let Some(path) = queue.pop_front() {
            let Some(leaf) = path.leaf().cloned() else {
                continue;
            };

            // system スコープは再解決しない
            let is_system = path
                .leaf_dependency()
                .map(|dependency| dependency.scope == DependencyScope::System)
                .unwrap_or(false);
            if is_system {
                graph.add_path(path);
                continue;
            }

            match self.resolve_cached(&leaf) {
                Ok(resolved) => {
                    let path = path.with_leaf(resolved_leaf(&leaf, &resolved));
                    graph.add_path(path.clone());
                    for child in &resolved.dependencies {
                        if !selector.select(child, path.depth() + 1) {
                            continue;
                        }
                        if path.contains_identity(&child.artifact) {
                            tracing::warn!(
                                artifact = %child.artifact,
                                path = %path,
                                "循環依存を検出したためエッジを除外します"
                            );
                            continue;
                        }
                        queue.push_back(path.append(child.clone()));
                    }
                }
                Err(error) => {
                    graph.add_path(path.clone());
                    let mandatory = !path.has_optional_or_provided_edge()
                        && (scope == FailureScope::MandatoryPaths || path.depth() <= 1);
                    tracing::warn!(
                        artifact = %leaf,
                        path = %path,
                        mandatory,
                        error = %error,
                        "依存の解決に失敗しました"
                    );
                    if mandatory {
                        fatal = true;
                    } else if let Some(problem) = UnresolvableArtifactProblem::from_path(&path) {
                        graph.add_unresolved(problem);
                    }
                    failures.push(ResolutionFailure { path, error });
                }
            }
        }

        if fatal {
            return Err(GraphBuildError::Aggregated(failures));
        }
        Ok(graph)
    }

    fn level_order_maven(
        &self,
        request: &GraphRequest,
        include_provided: bool,
    ) -> Result<DependencyGraph, GraphBuildError> {
        let trees = self.collect_cached(request, include_provided);
        let mut graph = DependencyGraph::new();
        let mut failures = Vec::new();
        let mut queue: VecDeque<(&DependencyNode, DependencyPath)> = VecDeque::new();

        for (initial, tree) in request.initial_paths().into_iter().zip(trees.iter()) {
            match tree {
                Ok(node) => {
                    let path = initial.with_leaf(node.artifact().clone());
                    queue.push_back((node, path));
                }
                Err(error) => {
                    graph.add_path(initial.clone());
                    let root_is_mandatory = initial
                        .leaf_dependency()
                        .map(|dependency| {
                            !dependency.optional && dependency.scope != DependencyScope::Provided
                        })
                        .unwrap_or(true);
                    tracing::warn!(
                        path = %initial,
                        mandatory = root_is_mandatory,
                        error = %error,
                        "要求されたアーティファクトを解決できません"
                    );
                    if root_is_mandatory {
                        failures.push(ResolutionFailure {
                            path: initial,
                            error: error.clone(),
                        });
                    } else if let Some(problem) = UnresolvableArtifactProblem::from_path(&initial)
                    {
                        graph.add_unresolved(problem);
                    }
                }
            }
        }

        while let Some((node, path)) = queue.pop_front() {
            graph.add_path(path.clone());
            if let Some(error) = &node.failure {
                tracing::debug!(path = %path, error = %error, "未解決の依存を記録します");
                if let Some(problem) = UnresolvableArtifactProblem::from_path(&path) {
                    graph.add_unresolved(problem);
                }
                continue;
            }
            for child in &node.children {
                let artifact = child.artifact();
                if path.contains_key(&artifact.group_id, &artifact.artifact_id) {
                    continue;
                }
                queue.push_back((child, path.append(child.dependency.clone())));
            }
        }

        if !failures.is_empty() {
            return Err(GraphBuildError::Aggregated(failures));
        }
        Ok(graph)
    }

    fn resolve_cached(&self, artifact: &Artifact) -> ResolveResult {
        let key = artifact.coordinates();
        if let Some(cached) = self
            .resolved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return cached.clone();
        }
        let result = self.repository.resolve(artifact).map(Arc::new);
        self.resolved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, result.clone());
        result
    }

    fn collect_cached(&self, request: &GraphRequest, include_provided: bool) -> CollectResult {
        let key = format!("{}|provided={include_provided}", request.cache_key());
        if let Some(cached) = self
            .collected
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Arc::clone(cached);
        }
        let roots: Vec<Dependency> = match request {
            GraphRequest::Rooted(artifact) => vec![Dependency::compile(artifact.clone())],
            GraphRequest::Dependencies(dependencies) => dependencies.clone(),
        };
        let trees: CollectResult = Arc::new(
            roots
                .iter()
                .map(|root| self.repository.collect(root, include_provided))
                .collect(),
        );
        self.collected
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, Arc::clone(&trees));
        trees
    }
}

/// 要求側の分類子や拡張子を保ったまま、解決結果のファイルを葉へ反映する。
fn resolved_leaf(requested: &Artifact, resolved: &ResolvedArtifact) -> Artifact {
    match resolved.artifact.file() {
        Some(file) => requested.clone().with_file(file),
        None => requested.clone(),
    }
}
