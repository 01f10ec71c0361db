//! Class lookup over an ordered classpath.
//!
//! Every entry is indexed once up front; parsed classes are loaded lazily and kept in a
//! bounded LRU cache. A cache miss re-reads the bytes from the owning entry, so eviction
//! never changes lookup results.

use crate::classfile::{ClassParseError, ParsedClass, parse_class};
use crate::config::CheckerConfig;
use crate::symbol::ClassFile;
use indexmap::{IndexMap, IndexSet};
use linkage_deps::ClassPathEntry;
use lru::LruCache;
use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use zip::ZipArchive;
use zip::result::ZipError;

const HIDDEN_CLASS_EXTENSION: &str = ".raw";

#[derive(Debug, Error)]
pub enum ClassPathIndexError {
    #[error("IO error while scanning {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("ZIP error while scanning {path}: {source}")]
    Zip {
        path: PathBuf,
        #[source]
        source: ZipError,
    },
    #[error("Class parse error in {path}: {source}")]
    ClassFile {
        path: PathBuf,
        #[source]
        source: ClassParseError,
    },
    #[error("{entry} is not part of this classpath")]
    UnknownEntry { entry: String },
}

/// Where the bytes of one class live.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ClassSource {
    Archive { archive: PathBuf, name: String },
    File(PathBuf),
}

impl ClassSource {
    fn display_path(&self) -> PathBuf {
        match self {
            ClassSource::Archive { archive, name } => archive_entry_path(archive, name),
            ClassSource::File(path) => path.clone(),
        }
    }
}

#[derive(Debug, Clone)]
struct ClassLocation {
    entry: usize,
    /// Logical binary name, also for locations registered under a stored-path alias.
    name: String,
    source: ClassSource,
}

#[derive(Debug, Default)]
struct EntryClasses {
    /// Binary names in the order they were found.
    classes: IndexSet<String>,
    sources: IndexMap<String, ClassSource>,
}

pub struct ClassPathRepository {
    entries: IndexMap<ClassPathEntry, EntryClasses>,
    index: IndexMap<String, ClassLocation>,
    hidden: IndexMap<String, ClassLocation>,
    cache: Mutex<LruCache<(usize, String), Arc<ParsedClass>>>,
    system_packages: Vec<String>,
}

impl ClassPathRepository {
    pub fn new(class_path: &[ClassPathEntry]) -> Result<Self, ClassPathIndexError> {
        Self::with_config(class_path, &CheckerConfig::default())
    }

    pub fn with_config(
        class_path: &[ClassPathEntry],
        config: &CheckerConfig,
    ) -> Result<Self, ClassPathIndexError> {
        let capacity =
            NonZeroUsize::new(config.class_cache_capacity).unwrap_or(NonZeroUsize::MIN);
        let mut repository = Self {
            entries: IndexMap::new(),
            index: IndexMap::new(),
            hidden: IndexMap::new(),
            cache: Mutex::new(LruCache::new(capacity)),
            system_packages: config.system_packages.clone(),
        };

        let scanner = EntryScanner {
            container_prefixes: &config.container_prefixes,
        };
        for entry in class_path {
            if repository.entries.contains_key(entry) {
                continue;
            }
            let Some(path) = entry.path() else {
                tracing::warn!(entry = %entry, "skipping classpath entry without a file");
                continue;
            };
            let mut found = Vec::new();
            scanner.scan(path, &mut found)?;
            repository.register(entry.clone(), found);
        }

        tracing::debug!(
            entries = repository.entries.len(),
            classes = repository.index.len(),
            hidden = repository.hidden.len(),
            "indexed classpath"
        );
        Ok(repository)
    }

    fn register(&mut self, entry: ClassPathEntry, found: Vec<FoundClass>) {
        let (entry_index, _) = self.entries.insert_full(entry, EntryClasses::default());
        for class in found {
            let location = ClassLocation {
                entry: entry_index,
                name: class.name.clone(),
                source: class.source.clone(),
            };
            if class.hidden {
                self.hidden.entry(class.name).or_insert(location);
                continue;
            }
            if let Some(stored_name) = class.stored_name {
                self.index.entry(stored_name).or_insert_with(|| location.clone());
            }
            if let Some((_, classes)) = self.entries.get_index_mut(entry_index) {
                if classes.classes.insert(class.name.clone()) {
                    classes.sources.insert(class.name.clone(), class.source);
                }
            }
            // first entry defining a name wins
            self.index.entry(class.name).or_insert(location);
        }
    }

    /// Entries in classpath order, skipping those without a file.
    pub fn entries(&self) -> impl Iterator<Item = &ClassPathEntry> {
        self.entries.keys()
    }

    pub fn classes_defined_in(&self, entry: &ClassPathEntry) -> Option<&IndexSet<String>> {
        self.entries.get(entry).map(|classes| &classes.classes)
    }

    pub fn is_system_class(&self, binary_name: &str) -> bool {
        self.system_packages
            .iter()
            .any(|prefix| binary_name.starts_with(prefix.as_str()))
    }

    /// The class file a JVM would load for `binary_name`: the first entry that defines it.
    pub fn find_class(&self, binary_name: &str) -> Option<ClassFile> {
        let location = self.index.get(binary_name)?;
        let (entry, _) = self.entries.get_index(location.entry)?;
        Some(ClassFile::new(entry.clone(), location.name.clone()))
    }

    /// Whether `binary_name` is stored only under the hidden-class extension.
    pub fn is_hidden_class(&self, binary_name: &str) -> bool {
        self.hidden.contains_key(binary_name)
    }

    /// Loads the first definition of `binary_name`. `Ok(None)` when no entry defines it.
    pub fn load_class(
        &self,
        binary_name: &str,
    ) -> Result<Option<Arc<ParsedClass>>, ClassPathIndexError> {
        let Some(location) = self.index.get(binary_name) else {
            return Ok(None);
        };
        self.load(location.entry, &location.name, &location.source)
            .map(Some)
    }

    /// Loads the definition of a class inside one particular entry, even when an earlier
    /// entry shadows it.
    pub fn load_class_file(
        &self,
        class_file: &ClassFile,
    ) -> Result<Arc<ParsedClass>, ClassPathIndexError> {
        let unknown = || ClassPathIndexError::UnknownEntry {
            entry: class_file.to_string(),
        };
        let (entry_index, _, classes) = self
            .entries
            .get_full(class_file.entry())
            .ok_or_else(unknown)?;
        let source = classes
            .sources
            .get(class_file.binary_name())
            .ok_or_else(unknown)?;
        self.load(entry_index, class_file.binary_name(), source)
    }

    fn load(
        &self,
        entry: usize,
        binary_name: &str,
        source: &ClassSource,
    ) -> Result<Arc<ParsedClass>, ClassPathIndexError> {
        // Held across the read so a class is never parsed twice concurrently.
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        let key = (entry, binary_name.to_string());
        if let Some(parsed) = cache.get(&key) {
            return Ok(Arc::clone(parsed));
        }
        let bytes = read_class_bytes(source)?;
        let parsed = parse_class(&bytes).map_err(|error| ClassPathIndexError::ClassFile {
            path: source.display_path(),
            source: error,
        })?;
        let parsed = Arc::new(parsed);
        cache.put(key, Arc::clone(&parsed));
        Ok(parsed)
    }

    pub fn cached_class_count(&self) -> usize {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

struct FoundClass {
    name: String,
    /// Name derived from the stored path when it differs from `name`.
    stored_name: Option<String>,
    source: ClassSource,
    hidden: bool,
}

struct EntryScanner<'a> {
    container_prefixes: &'a [String],
}

impl EntryScanner<'_> {
    fn scan(&self, path: &Path, found: &mut Vec<FoundClass>) -> Result<(), ClassPathIndexError> {
        if path.is_dir() {
            return self.scan_directory(path, found);
        }
        if is_archive(path) {
            return self.scan_archive(path, found);
        }
        if has_extension(path, "class") {
            return scan_class_file(path, found);
        }
        if !path.exists() {
            tracing::warn!(path = %path.display(), "classpath entry does not exist");
        }
        Ok(())
    }

    fn scan_directory(
        &self,
        root: &Path,
        found: &mut Vec<FoundClass>,
    ) -> Result<(), ClassPathIndexError> {
        let mut files = Vec::new();
        let mut dirs = vec![root.to_path_buf()];
        while let Some(dir) = dirs.pop() {
            let entries = fs::read_dir(&dir).map_err(|source| ClassPathIndexError::Io {
                path: dir.clone(),
                source,
            })?;
            for entry in entries {
                let entry = entry.map_err(|source| ClassPathIndexError::Io {
                    path: dir.clone(),
                    source,
                })?;
                let path = entry.path();
                let metadata = entry.metadata().map_err(|source| ClassPathIndexError::Io {
                    path: path.clone(),
                    source,
                })?;
                if metadata.is_dir() {
                    dirs.push(path);
                } else {
                    files.push(path);
                }
            }
        }
        // read_dir order is platform dependent
        files.sort();

        for path in files {
            let Ok(relative) = path.strip_prefix(root) else {
                continue;
            };
            let relative = relative
                .components()
                .map(|component| component.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if let Some(class) = self.classify(&relative, ClassSource::File(path.clone())) {
                found.push(class);
            }
        }
        Ok(())
    }

    fn scan_archive(
        &self,
        path: &Path,
        found: &mut Vec<FoundClass>,
    ) -> Result<(), ClassPathIndexError> {
        let file = File::open(path).map_err(|source| ClassPathIndexError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut archive =
            ZipArchive::new(BufReader::new(file)).map_err(|source| ClassPathIndexError::Zip {
                path: path.to_path_buf(),
                source,
            })?;

        for idx in 0..archive.len() {
            let entry = archive
                .by_index(idx)
                .map_err(|source| ClassPathIndexError::Zip {
                    path: path.to_path_buf(),
                    source,
                })?;
            if !entry.is_file() {
                continue;
            }
            let name = entry.name().to_string();
            let source = ClassSource::Archive {
                archive: path.to_path_buf(),
                name: name.clone(),
            };
            if let Some(class) = self.classify(&name, source) {
                found.push(class);
            }
        }
        Ok(())
    }

    /// Maps a stored path such as `BOOT-INF/classes/a/b/C.class` to the class it holds.
    fn classify(&self, stored_path: &str, source: ClassSource) -> Option<FoundClass> {
        let (stem, hidden) = if let Some(stem) = stored_path.strip_suffix(".class") {
            (stem, false)
        } else if let Some(stem) = stored_path.strip_suffix(HIDDEN_CLASS_EXTENSION) {
            (stem, true)
        } else {
            return None;
        };
        if should_skip_entry(stem) {
            return None;
        }

        let stored_name = stem.replace('/', ".");
        let logical = self
            .container_prefixes
            .iter()
            .find_map(|prefix| stem.strip_prefix(prefix.as_str()))
            .map(|inner| inner.replace('/', "."));
        Some(match logical {
            Some(name) => FoundClass {
                name,
                stored_name: Some(stored_name),
                source,
                hidden,
            },
            None => FoundClass {
                name: stored_name,
                stored_name: None,
                source,
                hidden,
            },
        })
    }
}

fn scan_class_file(path: &Path, found: &mut Vec<FoundClass>) -> Result<(), ClassPathIndexError> {
    let source = ClassSource::File(path.to_path_buf());
    let bytes = read_class_bytes(&source)?;
    // A bare class file carries no package directory, so its name comes from the bytes.
    // Unparseable files stay indexed under their file stem so the scan reports them.
    let name = match parse_class(&bytes) {
        Ok(parsed) => parsed.binary_name,
        Err(error) => {
            tracing::warn!(path = %path.display(), error = %error, "class file could not be parsed");
            path.file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string())
        }
    };
    found.push(FoundClass {
        name,
        stored_name: None,
        source,
        hidden: false,
    });
    Ok(())
}

fn read_class_bytes(source: &ClassSource) -> Result<Vec<u8>, ClassPathIndexError> {
    let mut buffer = Vec::new();
    match source {
        ClassSource::File(path) => {
            let mut file = File::open(path).map_err(|source| ClassPathIndexError::Io {
                path: path.clone(),
                source,
            })?;
            file.read_to_end(&mut buffer)
                .map_err(|source| ClassPathIndexError::Io {
                    path: path.clone(),
                    source,
                })?;
        }
        ClassSource::Archive { archive, name } => {
            let file = File::open(archive).map_err(|source| ClassPathIndexError::Io {
                path: archive.clone(),
                source,
            })?;
            let mut zip = ZipArchive::new(BufReader::new(file)).map_err(|source| {
                ClassPathIndexError::Zip {
                    path: archive.clone(),
                    source,
                }
            })?;
            let mut entry = zip
                .by_name(name)
                .map_err(|source| ClassPathIndexError::Zip {
                    path: archive_entry_path(archive, name),
                    source,
                })?;
            entry
                .read_to_end(&mut buffer)
                .map_err(|source| ClassPathIndexError::Io {
                    path: archive_entry_path(archive, name),
                    source,
                })?;
        }
    }
    Ok(buffer)
}

fn is_archive(path: &Path) -> bool {
    has_extension(path, "jar") || has_extension(path, "zip")
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .map(|ext| ext.eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}

fn should_skip_entry(name: &str) -> bool {
    name.starts_with("META-INF/")
        || name.ends_with("module-info")
        || name.ends_with("package-info")
}

fn archive_entry_path(archive: &Path, entry: &str) -> PathBuf {
    let mut display = archive.display().to_string();
    display.push('!');
    display.push('/');
    display.push_str(entry);
    PathBuf::from(display)
}
