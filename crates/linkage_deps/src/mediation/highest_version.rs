use super::{AnnotatedClassPath, DependencyMediation};
use crate::artifact::ArtifactKey;
use crate::bom::Bom;
use crate::graph::DependencyGraph;
use indexmap::IndexMap;

/// Gradle の調停方式。深さに関係なくキーごとに最も高いバージョンを選ぶ。
///
/// `enforced_platform` に含まれるキーは BOM のバージョンで固定する。ただし、そのバージョンが
/// グラフに一度も現れない場合は警告を出して最高バージョンへ戻す。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HighestVersion {
    enforced_platform: IndexMap<ArtifactKey, String>,
}

impl HighestVersion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_enforced_platform(bom: &Bom) -> Self {
        let enforced_platform = bom
            .managed_dependencies
            .iter()
            .map(|artifact| (artifact.key(), artifact.version.clone()))
            .collect();
        Self { enforced_platform }
    }

    pub fn enforced_platform(&self) -> &IndexMap<ArtifactKey, String> {
        &self.enforced_platform
    }

    fn select_version(&self, graph: &DependencyGraph, key: &ArtifactKey) -> Option<String> {
        let versions = graph.versions(key);
        if let Some(pinned) = self.enforced_platform.get(key) {
            if versions.iter().any(|version| version == pinned) {
                return Some(pinned.clone());
            }
            tracing::warn!(
                artifact = %key,
                pinned = %pinned,
                "固定されたバージョンが依存グラフに存在しないため最高バージョンを使います"
            );
        }
        // `versions` は昇順
        versions.last().cloned()
    }
}

impl DependencyMediation for HighestVersion {
    fn name(&self) -> &'static str {
        "highest"
    }

    fn mediate(&self, graph: &DependencyGraph) -> AnnotatedClassPath {
        let selected: IndexMap<&ArtifactKey, String> = graph
            .keys()
            .filter_map(|key| self.select_version(graph, key).map(|version| (key, version)))
            .collect();

        let mut class_path = AnnotatedClassPath::new();
        for path in graph.paths() {
            let Some(leaf) = path.leaf() else {
                continue;
            };
            let is_selected = selected
                .get(&leaf.key())
                .map(|version| *version == leaf.version)
                .unwrap_or(false);
            if is_selected {
                class_path.put(leaf, path.clone());
            }
        }
        class_path
    }
}
