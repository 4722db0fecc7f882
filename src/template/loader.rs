//! Template loader - resolves logical template names and caches file contents

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use walkdir::WalkDir;

use crate::error::{Result, TemplateError};

/// Extensions that mark a name as already carrying its file type
const TEMPLATE_EXTENSIONS: &[&str] = &["html", "php", "tpl"];

/// Default extension appended to bare template names
const DEFAULT_EXTENSION: &str = "html";

/// Where template contents come from
pub trait TemplateSource: Send + Sync {
    /// Read the file at `path`; a missing file is `TemplateNotFound`
    fn read(&self, path: &Path) -> Result<String>;
}

/// Reads templates from the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSource;

impl TemplateSource for FileSource {
    fn read(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => TemplateError::TemplateNotFound(path.to_path_buf()),
            _ => TemplateError::Io(e),
        })
    }
}

/// Resolved path -> raw content. Entries are only ever added, so the cache
/// can be shared between engines serving different requests.
#[derive(Debug, Default)]
pub struct TemplateCache {
    entries: RwLock<HashMap<PathBuf, Arc<str>>>,
}

impl TemplateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &Path) -> Option<Arc<str>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
    }

    /// Store content unless the path is already cached; returns the cached value
    pub fn insert(&self, path: PathBuf, content: String) -> Arc<str> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries
            .entry(path)
            .or_insert_with(|| Arc::from(content))
            .clone()
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Resolves template names under a root directory and loads them through a cache
pub struct TemplateLoader {
    root: PathBuf,
    source: Box<dyn TemplateSource>,
    cache: Arc<TemplateCache>,
}

impl TemplateLoader {
    /// Loader reading from the filesystem with a private cache
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self::with_source(root, FileSource)
    }

    /// Loader reading through a custom source with a private cache
    pub fn with_source<P: AsRef<Path>, S: TemplateSource + 'static>(root: P, source: S) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            source: Box::new(source),
            cache: Arc::new(TemplateCache::new()),
        }
    }

    /// Use a cache shared with other loaders
    pub fn with_cache(mut self, cache: Arc<TemplateCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cache(&self) -> &Arc<TemplateCache> {
        &self.cache
    }

    /// Map a logical name to a file path.
    ///
    /// Names ending in `.html`, `.php` or `.tpl` (any case) keep their
    /// extension; anything else gets `.html`. Absolute paths are not joined
    /// with the root.
    pub fn resolve_path(&self, name: &str) -> PathBuf {
        let name = if has_template_extension(name) {
            name.to_string()
        } else {
            format!("{}.{}", name, DEFAULT_EXTENSION)
        };
        if is_absolute(&name) {
            PathBuf::from(name)
        } else {
            self.root.join(name.trim_start_matches("./"))
        }
    }

    /// Load raw template content, reading the file only on a cache miss
    pub fn load(&self, name: &str) -> Result<Arc<str>> {
        let path = self.resolve_path(name);
        if let Some(content) = self.cache.get(&path) {
            tracing::debug!("Template cache hit: {:?}", path);
            return Ok(content);
        }

        tracing::debug!("Template cache miss: {:?}", path);
        let content = self.source.read(&path)?;
        Ok(self.cache.insert(path, content))
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Check if a template exists
    pub fn has_template(&self, name: &str) -> bool {
        let path = self.resolve_path(name);
        self.cache.get(&path).is_some() || path.is_file()
    }

    /// Template names (relative to the root, extension included), sorted
    pub fn template_names(&self) -> Vec<String> {
        let mut names: Vec<String> = WalkDir::new(&self.root)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_file() && has_template_extension(&e.path().to_string_lossy()))
            .filter_map(|e| {
                e.path()
                    .strip_prefix(&self.root)
                    .ok()
                    .map(|p| p.to_string_lossy().replace('\\', "/"))
            })
            .collect();
        names.sort();
        names
    }
}

fn has_template_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            TEMPLATE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

/// `/abs/path` or a Windows drive path such as `C:\x` or `C:/x`
fn is_absolute(name: &str) -> bool {
    if name.starts_with('/') || name.starts_with('\\') {
        return true;
    }
    let bytes = name.as_bytes();
    bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'/' || bytes[2] == b'\\')
}
