use crate::artifact::{Artifact, ArtifactKey, Dependency, DependencyScope};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// ルートからあるノードまでの依存エッジ列。
///
/// ルートはプロジェクト自身なので依存エッジではない。複数アーティファクトを
/// 同時に要求した場合のようにルートを持たないパスもある。生成後に変更されることは
/// なく、`append`/`concat` は常に新しいパスを返す。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DependencyPath {
    root: Option<Artifact>,
    path: Vec<Dependency>,
}

impl DependencyPath {
    pub fn new(root: Option<Artifact>) -> Self {
        Self {
            root,
            path: Vec::new(),
        }
    }

    pub fn rooted(root: Artifact) -> Self {
        Self::new(Some(root))
    }

    pub fn append(&self, dependency: Dependency) -> Self {
        let mut copy = self.clone();
        copy.path.push(dependency);
        copy
    }

    /// `child` のルートを除いた依存エッジを末尾へ連結する。
    pub fn concat(&self, child: &DependencyPath) -> Self {
        let mut copy = self.clone();
        copy.path.extend(child.path.iter().cloned());
        copy
    }

    pub fn root(&self) -> Option<&Artifact> {
        self.root.as_ref()
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.path
    }

    /// ルートを含む要素数。ルートがない場合はエッジ数と同じ。
    pub fn size(&self) -> usize {
        self.path.len() + usize::from(self.root.is_some())
    }

    /// ルートからの深さ (エッジ数)。
    pub fn depth(&self) -> usize {
        self.path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none() && self.path.is_empty()
    }

    pub fn leaf(&self) -> Option<&Artifact> {
        match self.path.last() {
            Some(dependency) => Some(&dependency.artifact),
            None => self.root.as_ref(),
        }
    }

    pub fn leaf_dependency(&self) -> Option<&Dependency> {
        self.path.last()
    }

    /// `i == 0` はルート。ルートがないパスでは 0 番目が最初のエッジになる。
    pub fn get(&self, index: usize) -> Option<&Artifact> {
        match &self.root {
            Some(root) if index == 0 => Some(root),
            Some(_) => self.path.get(index - 1).map(|dependency| &dependency.artifact),
            None => self.path.get(index).map(|dependency| &dependency.artifact),
        }
    }

    pub fn artifacts(&self) -> impl Iterator<Item = &Artifact> {
        self.root
            .iter()
            .chain(self.path.iter().map(|dependency| &dependency.artifact))
    }

    pub fn artifact_keys(&self) -> Vec<ArtifactKey> {
        self.artifacts().map(Artifact::key).collect()
    }

    pub fn parent_path(&self) -> Self {
        let mut parent = self.clone();
        parent.path.pop();
        parent
    }

    /// パス上に `artifact` と同一 (g:a:v) のものがあるか。
    pub fn contains_identity(&self, artifact: &Artifact) -> bool {
        self.artifacts()
            .any(|candidate| candidate.same_identity(artifact))
    }

    pub fn contains_key(&self, group_id: &str, artifact_id: &str) -> bool {
        self.artifacts()
            .any(|candidate| candidate.has_key(group_id, artifact_id))
    }

    pub fn has_optional_edge(&self) -> bool {
        self.path.iter().any(|dependency| dependency.optional)
    }

    pub fn has_provided_edge(&self) -> bool {
        self.path
            .iter()
            .any(|dependency| dependency.scope == DependencyScope::Provided)
    }

    pub fn has_optional_or_provided_edge(&self) -> bool {
        self.has_optional_edge() || self.has_provided_edge()
    }

    /// 経路上で `group_id:artifact_id` を除外している依存を探し、その除外を
    /// 宣言したアーティファクト (エッジの一つ上) を返す。ルートのないパスの先頭エッジに
    /// ある除外は要求元が宣言したものなので `None` になる。
    pub fn find_exclusion(&self, group_id: &str, artifact_id: &str) -> Option<&Artifact> {
        let mut previous = self.root.as_ref();
        for dependency in &self.path {
            let declared = dependency
                .exclusions
                .iter()
                .any(|exclusion| exclusion.matches(group_id, artifact_id));
            if declared {
                return previous;
            }
            previous = Some(&dependency.artifact);
        }
        None
    }

    /// 葉のアーティファクトだけを差し替えたパス。解決後のファイルを反映するのに使う。
    pub fn with_leaf(&self, artifact: Artifact) -> Self {
        let mut copy = self.clone();
        match copy.path.last_mut() {
            Some(last) => last.artifact = artifact,
            None => copy.root = Some(artifact),
        }
        copy
    }
}

impl PartialEq for DependencyPath {
    fn eq(&self, other: &Self) -> bool {
        let roots_equal = match (&self.root, &other.root) {
            (Some(left), Some(right)) => left.same_identity(right),
            (None, None) => true,
            _ => false,
        };
        roots_equal && self.path == other.path
    }
}

impl Eq for DependencyPath {}

impl Hash for DependencyPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        if let Some(root) = &self.root {
            root.coordinates().hash(state);
        }
        self.path.hash(state);
    }
}

impl fmt::Display for DependencyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        if let Some(root) = &self.root {
            write!(f, "{root}")?;
            first = false;
        }
        for dependency in &self.path {
            if !first {
                f.write_str(" / ")?;
            }
            write!(f, "{dependency}")?;
            first = false;
        }
        Ok(())
    }
}
