use linkage_deps::MediationPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CLASS_CACHE_CAPACITY: usize = 5000;

const DEFAULT_SYSTEM_PACKAGES: &[&str] = &[
    "java.",
    "javax.",
    "jdk.internal.",
    "sun.",
    "com.sun.",
    "org.w3c.dom.",
    "org.xml.sax.",
    "org.ietf.jgss.",
];

const DEFAULT_CONTAINER_PREFIXES: &[&str] = &["BOOT-INF/classes/", "WEB-INF/classes/", "classes/"];

/// Settings for one linkage check run. Every key may be omitted.
///
/// ```toml
/// class-cache-capacity = 2000
/// report-only-reachable = true
/// exclusion-file = "linkage-exclusions.xml"
/// mediation = "gradle"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CheckerConfig {
    /// Upper bound on parsed classes kept in memory at once.
    pub class_cache_capacity: usize,
    /// Binary name prefixes supplied by the runtime rather than the classpath.
    pub system_packages: Vec<String>,
    /// Archive sub-roots holding classes of repackaged applications.
    pub container_prefixes: Vec<String>,
    pub report_only_reachable: bool,
    pub exclusion_file: Option<PathBuf>,
    pub mediation: MediationPolicy,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            class_cache_capacity: DEFAULT_CLASS_CACHE_CAPACITY,
            system_packages: DEFAULT_SYSTEM_PACKAGES
                .iter()
                .map(|prefix| prefix.to_string())
                .collect(),
            container_prefixes: DEFAULT_CONTAINER_PREFIXES
                .iter()
                .map(|prefix| prefix.to_string())
                .collect(),
            report_only_reachable: false,
            exclusion_file: None,
            mediation: MediationPolicy::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read checker config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid checker config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("class-cache-capacity must be at least 1")]
    ZeroCacheCapacity,
}

impl CheckerConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: CheckerConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a config file. A relative `exclusion-file` is resolved against the file's
    /// directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&contents)?;
        if let (Some(exclusion_file), Some(base)) = (&config.exclusion_file, path.parent()) {
            if exclusion_file.is_relative() {
                config.exclusion_file = Some(base.join(exclusion_file));
            }
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.class_cache_capacity == 0 {
            return Err(ConfigError::ZeroCacheCapacity);
        }
        Ok(())
    }
}
