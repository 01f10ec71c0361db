//! 依存調停: `groupId:artifactId` ごとにバージョンを 1 つだけ選ぶ。
//!
//! 調停は [`DependencyGraph`] のパスを幅優先順に走査し、選択されたアーティファクトを
//! クラスパス順に並べた [`AnnotatedClassPath`] を返す。各エントリにはそこへ至った
//! 全パスが付随する。

mod highest_version;
mod nearest_wins;

pub use highest_version::HighestVersion;
pub use nearest_wins::NearestWins;

use crate::artifact::{Artifact, ArtifactKey};
use crate::graph::DependencyGraph;
use crate::path::DependencyPath;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// キーごとに 1 バージョンを選ぶ戦略。
pub trait DependencyMediation: Send + Sync {
    /// ログやレポートに出す正規名。
    fn name(&self) -> &'static str;

    fn mediate(&self, graph: &DependencyGraph) -> AnnotatedClassPath;
}

/// クラスパス順の選択済みアーティファクトと、そこへ至ったパス。
#[derive(Debug, Clone, Default)]
pub struct AnnotatedClassPath {
    entries: IndexMap<ArtifactKey, (Artifact, Vec<DependencyPath>)>,
}

impl AnnotatedClassPath {
    pub fn new() -> Self {
        Self::default()
    }

    /// `artifact` へのパスを記録する。キーに最初に記録されたアーティファクトがエントリとなり、
    /// 同一性 (g:a:v) が一致する場合だけパスを追加する。
    pub fn put(&mut self, artifact: &Artifact, path: DependencyPath) {
        let (selected, paths) = self
            .entries
            .entry(artifact.key())
            .or_insert_with(|| (artifact.clone(), Vec::new()));
        if !selected.same_identity(artifact) {
            return;
        }
        if selected.file().is_none() && artifact.file().is_some() {
            *selected = artifact.clone();
        }
        if !paths.contains(&path) {
            paths.push(path);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn artifacts(&self) -> impl Iterator<Item = &Artifact> {
        self.entries.values().map(|(artifact, _)| artifact)
    }

    pub fn get(&self, key: &ArtifactKey) -> Option<&Artifact> {
        self.entries.get(key).map(|(artifact, _)| artifact)
    }

    pub fn paths(&self, key: &ArtifactKey) -> &[DependencyPath] {
        self.entries
            .get(key)
            .map(|(_, paths)| paths.as_slice())
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Artifact, &[DependencyPath])> {
        self.entries
            .values()
            .map(|(artifact, paths)| (artifact, paths.as_slice()))
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MediationError {
    #[error(
        "未対応の依存調停ポリシー: {requested}. 利用可能候補: {choices}",
        choices = MediationPolicy::names().join(", ")
    )]
    UnknownPolicy { requested: String },
}

/// 設定ファイルから選択する調停ポリシー。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MediationPolicy {
    /// Maven 方式: ルートに最も近いパスが勝つ。
    #[default]
    Nearest,
    /// Gradle 方式: 最も高いバージョンが勝つ。
    Highest,
}

impl MediationPolicy {
    const ALIASES: &'static [(&'static str, MediationPolicy)] = &[
        ("nearest", MediationPolicy::Nearest),
        ("maven", MediationPolicy::Nearest),
        ("highest", MediationPolicy::Highest),
        ("gradle", MediationPolicy::Highest),
    ];

    pub fn names() -> Vec<&'static str> {
        Self::ALIASES.iter().map(|(name, _)| *name).collect()
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            MediationPolicy::Nearest => "nearest",
            MediationPolicy::Highest => "highest",
        }
    }

    /// 調停を生成する。`enforced_platform` は [`MediationPolicy::Highest`] でのみ使われる。
    pub fn mediation(
        self,
        enforced_platform: Option<&crate::bom::Bom>,
    ) -> Box<dyn DependencyMediation> {
        match self {
            MediationPolicy::Nearest => Box::new(NearestWins),
            MediationPolicy::Highest => match enforced_platform {
                Some(bom) => Box::new(HighestVersion::with_enforced_platform(bom)),
                None => Box::new(HighestVersion::new()),
            },
        }
    }
}

impl fmt::Display for MediationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediationPolicy {
    type Err = MediationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalised = s.trim().to_ascii_lowercase();
        Self::ALIASES
            .iter()
            .find(|(name, _)| *name == normalised)
            .map(|(_, policy)| *policy)
            .ok_or_else(|| MediationError::UnknownPolicy {
                requested: s.to_string(),
            })
    }
}

impl TryFrom<String> for MediationPolicy {
    type Error = MediationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MediationPolicy> for String {
    fn from(value: MediationPolicy) -> Self {
        value.as_str().to_string()
    }
}
