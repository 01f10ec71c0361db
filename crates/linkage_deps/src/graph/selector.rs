use super::GraphMode;
use crate::artifact::{Dependency, DependencyScope};

/// 子エッジをグラフへ含めるかどうかの判定。
///
/// どのモードでも test スコープと zip 型のアーティファクトは捨てる。`depth` は
/// 要求されたアーティファクトを 1 とした子エッジの深さ。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DependencySelector {
    mode: GraphMode,
    include_provided: bool,
}

impl DependencySelector {
    pub fn new(mode: GraphMode, include_provided: bool) -> Self {
        Self {
            mode,
            include_provided,
        }
    }

    pub fn select(&self, dependency: &Dependency, depth: usize) -> bool {
        if dependency.scope == DependencyScope::Test {
            return false;
        }
        if dependency.artifact.is_zip() {
            return false;
        }
        match self.mode {
            GraphMode::Full => {
                dependency.scope != DependencyScope::Provided || self.include_provided
            }
            GraphMode::Maven => {
                if dependency.optional {
                    return false;
                }
                // provided は要求アーティファクトの直接依存 (深さ 2) までに限る
                dependency.scope != DependencyScope::Provided
                    || (self.include_provided && depth <= 2)
            }
        }
    }
}
