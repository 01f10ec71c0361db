//! 依存グラフのモデルと構築。
//!
//! グラフは重複・衝突バージョンを含む全パスを保持する。ノード間のポインタは持たず、
//! フラットな `DependencyPath` の列と 2 つの派生インデックスだけで構成する。

mod builder;
mod selector;

pub use builder::{
    DependencyGraphBuilder, GraphBuildError, GraphMode, GraphRequest, ResolutionFailure,
};
pub use selector::DependencySelector;

use crate::artifact::{Artifact, ArtifactKey};
use crate::path::DependencyPath;
use crate::version::{compare_versions, highest_version};
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;

/// 解決できなかったアーティファクトとそこへ至る経路。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct UnresolvableArtifactProblem {
    pub artifact: Artifact,
    pub path: Vec<Artifact>,
}

impl UnresolvableArtifactProblem {
    pub fn new(artifact: Artifact, path: Vec<Artifact>) -> Self {
        Self { artifact, path }
    }

    pub fn from_path(path: &DependencyPath) -> Option<Self> {
        let artifact = path.leaf()?.clone();
        Some(Self::new(artifact, path.artifacts().cloned().collect()))
    }
}

impl fmt::Display for UnresolvableArtifactProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{} was not resolved. Dependency path is unknown.", self.artifact)
        } else {
            let joined = self
                .path
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" > ");
            write!(f, "{} was not resolved. Dependency path: {}", self.artifact, joined)
        }
    }
}

/// 衝突解消のための更新提案。`parent` が `from` の代わりに `to` を使えば最新版に揃う。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Update {
    pub parent: Artifact,
    pub from: Artifact,
    pub to: Artifact,
}

impl fmt::Display for Update {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} needs to upgrade {} to {}",
            self.parent, self.from, self.to.version
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    paths: Vec<DependencyPath>,
    versions: IndexMap<ArtifactKey, IndexSet<String>>,
    paths_by_coordinates: IndexMap<String, IndexSet<DependencyPath>>,
    unresolved: IndexSet<UnresolvableArtifactProblem>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// パスを追加し、葉のアーティファクトを両インデックスへ登録する。
    pub fn add_path(&mut self, path: DependencyPath) {
        let Some(leaf) = path.leaf() else {
            return;
        };
        self.versions
            .entry(leaf.key())
            .or_default()
            .insert(leaf.version.clone());
        self.paths_by_coordinates
            .entry(leaf.coordinates())
            .or_default()
            .insert(path.clone());
        self.paths.push(path);
    }

    pub fn add_unresolved(&mut self, problem: UnresolvableArtifactProblem) {
        self.unresolved.insert(problem);
    }

    /// 挿入順 (幅優先順) の全パス。
    pub fn paths(&self) -> &[DependencyPath] {
        &self.paths
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn paths_to(&self, coordinates: &str) -> Vec<&DependencyPath> {
        self.paths_by_coordinates
            .get(coordinates)
            .map(|paths| paths.iter().collect())
            .unwrap_or_default()
    }

    /// キーに対して観測されたバージョンを昇順で返す。
    pub fn versions(&self, key: &ArtifactKey) -> Vec<String> {
        let mut versions: Vec<String> = self
            .versions
            .get(key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        versions.sort_by(|left, right| compare_versions(left, right));
        versions
    }

    pub fn keys(&self) -> impl Iterator<Item = &ArtifactKey> {
        self.versions.keys()
    }

    /// 複数バージョンが記録されたキーだけを初出順で返す。
    pub fn find_conflicts(&self) -> Vec<ArtifactKey> {
        self.versions
            .iter()
            .filter(|(_, versions)| versions.len() > 1)
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// 衝突しているキーの全バージョンへのパス。
    pub fn conflicting_paths(&self) -> Vec<&DependencyPath> {
        let mut result = Vec::new();
        for key in self.find_conflicts() {
            for version in self.versions(&key) {
                let coordinates = format!("{key}:{version}");
                result.extend(self.paths_to(&coordinates));
            }
        }
        result
    }

    pub fn highest_version_map(&self) -> IndexMap<ArtifactKey, String> {
        self.versions
            .iter()
            .filter_map(|(key, versions)| {
                highest_version(versions.iter().map(String::as_str))
                    .map(|version| (key.clone(), version.to_string()))
            })
            .collect()
    }

    /// 最新版ではない葉を持つ衝突パスについて、親が自身の最新版である場合に限り更新を提案する。
    pub fn find_updates(&self) -> Vec<Update> {
        let highest = self.highest_version_map();
        let mut updates = IndexSet::new();
        for path in self.conflicting_paths() {
            let Some(leaf) = path.leaf() else {
                continue;
            };
            let Some(highest_leaf) = highest.get(&leaf.key()) else {
                continue;
            };
            if compare_versions(&leaf.version, highest_leaf) == Ordering::Equal {
                continue;
            }
            let Some(parent) = path.size().checked_sub(2).and_then(|index| path.get(index)) else {
                continue;
            };
            let parent_is_latest = highest
                .get(&parent.key())
                .map(|version| compare_versions(&parent.version, version) == Ordering::Equal)
                .unwrap_or(false);
            if parent_is_latest {
                updates.insert(Update {
                    parent: parent.clone(),
                    from: leaf.clone(),
                    to: leaf.with_version(highest_leaf.clone()),
                });
            }
        }
        updates.into_iter().collect()
    }

    pub fn unresolved_artifacts(&self) -> impl Iterator<Item = &UnresolvableArtifactProblem> {
        self.unresolved.iter()
    }
}
