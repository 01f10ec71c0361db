use super::{AnnotatedClassPath, DependencyMediation};
use crate::artifact::ArtifactKey;
use crate::graph::DependencyGraph;
use indexmap::IndexMap;

/// Maven の調停方式。キーごとに深さ最小のパスの葉を選び、同じ深さでは先に現れた方を採る。
///
/// グラフのパスは幅優先順なので、要求されたアーティファクト (深さ 1) は必ずその推移的
/// 依存より前に並ぶ。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NearestWins;

impl DependencyMediation for NearestWins {
    fn name(&self) -> &'static str {
        "nearest"
    }

    fn mediate(&self, graph: &DependencyGraph) -> AnnotatedClassPath {
        let mut selected: IndexMap<ArtifactKey, (usize, &str)> = IndexMap::new();
        for path in graph.paths() {
            let Some(leaf) = path.leaf() else {
                continue;
            };
            let depth = path.depth();
            selected
                .entry(leaf.key())
                .and_modify(|(best_depth, version)| {
                    if depth < *best_depth {
                        *best_depth = depth;
                        *version = leaf.version.as_str();
                    }
                })
                .or_insert((depth, leaf.version.as_str()));
        }

        let mut class_path = AnnotatedClassPath::new();
        for path in graph.paths() {
            let Some(leaf) = path.leaf() else {
                continue;
            };
            let is_selected = selected
                .get(&leaf.key())
                .map(|(_, version)| *version == leaf.version)
                .unwrap_or(false);
            if is_selected {
                class_path.put(leaf, path.clone());
            }
        }
        class_path
    }
}
