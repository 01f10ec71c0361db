use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// グループID+アーティファクトIDの組み合わせ。バージョン調停のキーとして使う。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArtifactKey {
    pub group_id: String,
    pub artifact_id: String,
}

impl ArtifactKey {
    pub fn new(group_id: impl Into<String>, artifact_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
        }
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group_id, self.artifact_id)
    }
}

/// バージョンや分類子を含む完全なアーティファクト。
///
/// 等価性とハッシュはバックエンドのファイルパスを無視する。同じ座標を持つ
/// アーティファクトは、解決済みかどうかに関わらず同一として扱われる。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classifier: Option<String>,
    #[serde(default = "default_extension")]
    pub extension: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

fn default_extension() -> String {
    "jar".to_string()
}

impl Artifact {
    pub fn new(
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
            version: version.into(),
            classifier: None,
            extension: default_extension(),
            file: None,
        }
    }

    pub fn with_classifier(mut self, classifier: impl Into<String>) -> Self {
        self.classifier = Some(classifier.into());
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn with_version(&self, version: impl Into<String>) -> Self {
        let mut copy = self.clone();
        copy.version = version.into();
        copy.file = None;
        copy
    }

    pub fn classifier(&self) -> Option<&str> {
        self.classifier.as_deref()
    }

    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    /// `groupId:artifactId` 形式のキー。
    pub fn key(&self) -> ArtifactKey {
        ArtifactKey::new(self.group_id.clone(), self.artifact_id.clone())
    }

    pub fn has_key(&self, group_id: &str, artifact_id: &str) -> bool {
        self.group_id == group_id && self.artifact_id == artifact_id
    }

    /// `groupId:artifactId:version` 形式の座標。
    pub fn coordinates(&self) -> String {
        format!("{}:{}:{}", self.group_id, self.artifact_id, self.version)
    }

    /// 衝突判定用の同一性 (groupId, artifactId, version) が等しいか。
    pub fn same_identity(&self, other: &Artifact) -> bool {
        self.group_id == other.group_id
            && self.artifact_id == other.artifact_id
            && self.version == other.version
    }

    pub fn is_zip(&self) -> bool {
        self.extension.eq_ignore_ascii_case("zip")
    }
}

impl PartialEq for Artifact {
    fn eq(&self, other: &Self) -> bool {
        self.group_id == other.group_id
            && self.artifact_id == other.artifact_id
            && self.version == other.version
            && self.classifier == other.classifier
            && self.extension == other.extension
    }
}

impl Eq for Artifact {}

impl Hash for Artifact {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.group_id.hash(state);
        self.artifact_id.hash(state);
        self.version.hash(state);
        self.classifier.hash(state);
        self.extension.hash(state);
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.classifier() {
            Some(classifier) => write!(
                f,
                "{}:{}:{}:{}",
                self.group_id, self.artifact_id, self.version, classifier
            ),
            None => write!(f, "{}:{}:{}", self.group_id, self.artifact_id, self.version),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoordinatesError {
    #[error("アーティファクト座標 '{0}' は groupId:artifactId:version 形式ではありません")]
    Malformed(String),
    #[error(
        "未対応の依存スコープ: {invalid}. 利用可能候補: {choices}",
        choices = DependencyScope::variants().join(", ")
    )]
    UnknownScope { invalid: String },
}

impl FromStr for Artifact {
    type Err = CoordinatesError;

    /// `g:a:v`, `g:a:v:classifier` あるいは `g:a:extension:classifier:v` を受け付ける。
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        if parts.iter().any(|part| part.is_empty()) {
            return Err(CoordinatesError::Malformed(s.to_string()));
        }
        match parts.as_slice() {
            [group, artifact, version] => Ok(Artifact::new(*group, *artifact, *version)),
            [group, artifact, version, classifier] => {
                Ok(Artifact::new(*group, *artifact, *version).with_classifier(*classifier))
            }
            [group, artifact, extension, classifier, version] => {
                Ok(Artifact::new(*group, *artifact, *version)
                    .with_extension(*extension)
                    .with_classifier(*classifier))
            }
            _ => Err(CoordinatesError::Malformed(s.to_string())),
        }
    }
}

/// Maven の依存スコープ。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyScope {
    #[default]
    Compile,
    Runtime,
    Provided,
    Test,
    System,
}

impl DependencyScope {
    pub const fn as_str(self) -> &'static str {
        match self {
            DependencyScope::Compile => "compile",
            DependencyScope::Runtime => "runtime",
            DependencyScope::Provided => "provided",
            DependencyScope::Test => "test",
            DependencyScope::System => "system",
        }
    }

    pub const fn variants() -> &'static [&'static str] {
        &["compile", "runtime", "provided", "test", "system"]
    }
}

impl fmt::Display for DependencyScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DependencyScope {
    type Err = CoordinatesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalised = s.trim().to_ascii_lowercase();
        match normalised.as_str() {
            "" | "compile" => Ok(DependencyScope::Compile),
            "runtime" => Ok(DependencyScope::Runtime),
            "provided" => Ok(DependencyScope::Provided),
            "test" => Ok(DependencyScope::Test),
            "system" => Ok(DependencyScope::System),
            _ => Err(CoordinatesError::UnknownScope {
                invalid: s.to_string(),
            }),
        }
    }
}

/// 依存宣言に付随する除外指定。`*` はワイルドカード。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Exclusion {
    pub group_id: String,
    pub artifact_id: String,
}

impl Exclusion {
    pub fn new(group_id: impl Into<String>, artifact_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
        }
    }

    pub fn matches(&self, group_id: &str, artifact_id: &str) -> bool {
        (self.group_id == "*" || self.group_id == group_id)
            && (self.artifact_id == "*" || self.artifact_id == artifact_id)
    }
}

/// スコープと optional フラグを伴う依存エッジ。
///
/// 等価性はアーティファクト・スコープ・optional のみで判定し、除外指定は含めない。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dependency {
    pub artifact: Artifact,
    #[serde(default)]
    pub scope: DependencyScope,
    #[serde(default)]
    pub optional: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclusions: Vec<Exclusion>,
}

impl Dependency {
    pub fn new(artifact: Artifact, scope: DependencyScope) -> Self {
        Self {
            artifact,
            scope,
            optional: false,
            exclusions: Vec::new(),
        }
    }

    pub fn compile(artifact: Artifact) -> Self {
        Self::new(artifact, DependencyScope::Compile)
    }

    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    pub fn with_exclusion(mut self, exclusion: Exclusion) -> Self {
        self.exclusions.push(exclusion);
        self
    }

    pub fn with_artifact(&self, artifact: Artifact) -> Self {
        Self {
            artifact,
            scope: self.scope,
            optional: self.optional,
            exclusions: self.exclusions.clone(),
        }
    }

    pub fn excludes(&self, artifact: &Artifact) -> bool {
        self.exclusions
            .iter()
            .any(|exclusion| exclusion.matches(&artifact.group_id, &artifact.artifact_id))
    }
}

impl PartialEq for Dependency {
    fn eq(&self, other: &Self) -> bool {
        self.artifact.same_identity(&other.artifact)
            && self.scope == other.scope
            && self.optional == other.optional
    }
}

impl Eq for Dependency {}

impl Hash for Dependency {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.artifact.group_id.hash(state);
        self.artifact.artifact_id.hash(state);
        self.artifact.version.hash(state);
        self.scope.hash(state);
        self.optional.hash(state);
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}", self.artifact.coordinates(), self.scope)?;
        if self.optional {
            f.write_str(", optional")?;
        }
        f.write_str(")")
    }
}
