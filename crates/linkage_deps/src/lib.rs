// linkage_deps - 依存グラフ、依存調停、クラスパス構築
mod artifact;
mod bom;
mod classpath;
mod path;
mod version;

pub mod graph;
pub mod mediation;
pub mod repository;

pub use artifact::{
    Artifact, ArtifactKey, CoordinatesError, Dependency, DependencyScope, Exclusion,
};
pub use bom::Bom;
pub use classpath::{ClassPathBuilder, ClassPathEntry, ClassPathError, ClassPathResult};
pub use graph::{
    DependencyGraph, DependencyGraphBuilder, GraphBuildError, GraphMode, GraphRequest,
    ResolutionFailure, UnresolvableArtifactProblem, Update,
};
pub use mediation::{
    AnnotatedClassPath, DependencyMediation, HighestVersion, MediationError, MediationPolicy,
    NearestWins,
};
pub use path::DependencyPath;
pub use repository::{
    ArtifactRepository, DependencyNode, InMemoryRepository, RepositoryError, ResolvedArtifact,
};
pub use version::{Version, compare_versions, highest_version};
