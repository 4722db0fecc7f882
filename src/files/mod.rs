//! File loader - named directories and recursive file lookup

use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::template::TemplateLoader;

/// Directory name the template root is mapped under
pub const TEMPLATES_DIR: &str = "templates";

/// Maps logical directory names to paths and finds files beneath them
#[derive(Debug, Clone, Default)]
pub struct FileLoader {
    directories: IndexMap<String, PathBuf>,
}

impl FileLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a named directory
    pub fn map_directory<P: Into<PathBuf>>(&mut self, name: &str, path: P) -> &mut Self {
        self.directories.insert(name.to_string(), path.into());
        self
    }

    pub fn directory(&self, name: &str) -> Option<&Path> {
        self.directories.get(name).map(PathBuf::as_path)
    }

    pub fn directories(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.directories
            .iter()
            .map(|(name, path)| (name.as_str(), path.as_path()))
    }

    /// Find a file by relative name.
    ///
    /// `ext` is appended when `name` has no extension. With `dir`, only that
    /// mapped directory is searched; otherwise every mapped directory in
    /// registration order. A direct hit under a directory wins over a match
    /// deeper in the tree.
    pub fn find_file(&self, name: &str, dir: Option<&str>, ext: Option<&str>) -> Option<PathBuf> {
        let file_name = match ext {
            Some(ext) if Path::new(name).extension().is_none() => {
                format!("{}.{}", name, ext.trim_start_matches('.'))
            }
            _ => name.to_string(),
        };
        let file_name = file_name.trim_start_matches('/');

        let roots: Vec<&Path> = match dir {
            Some(dir) => vec![self.directory(dir)?],
            None => self.directories.values().map(PathBuf::as_path).collect(),
        };

        for root in &roots {
            let candidate = root.join(file_name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }

        for root in roots {
            let found = WalkDir::new(root)
                .follow_links(true)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
                .find(|e| e.path().is_file() && e.path().ends_with(file_name));
            if let Some(entry) = found {
                tracing::debug!("Found {} at {:?}", file_name, entry.path());
                return Some(entry.into_path());
            }
        }
        None
    }

    /// Template loader rooted at the `templates` directory, if mapped
    pub fn template_loader(&self) -> Option<TemplateLoader> {
        self.directory(TEMPLATES_DIR).map(TemplateLoader::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, FileLoader) {
        let dir = TempDir::new().unwrap();
        let views = dir.path().join("views");
        let assets = dir.path().join("assets");
        fs::create_dir_all(views.join("partials")).unwrap();
        fs::create_dir_all(assets.join("css")).unwrap();
        fs::write(views.join("home.html"), "home").unwrap();
        fs::write(views.join("partials/nav.html"), "nav").unwrap();
        fs::write(assets.join("css/site.css"), "body{}").unwrap();
        fs::write(assets.join("home.html"), "shadow").unwrap();

        let mut files = FileLoader::new();
        files
            .map_directory(TEMPLATES_DIR, &views)
            .map_directory("assets", &assets);
        (dir, files)
    }

    #[test]
    fn test_direct_lookup_with_extension() {
        let (dir, files) = fixture();
        assert_eq!(
            files.find_file("home", Some(TEMPLATES_DIR), Some("html")),
            Some(dir.path().join("views/home.html"))
        );
        assert_eq!(
            files.find_file("partials/nav.html", None, Some(".html")),
            Some(dir.path().join("views/partials/nav.html"))
        );
    }

    #[test]
    fn test_recursive_lookup() {
        let (dir, files) = fixture();
        assert_eq!(
            files.find_file("nav", None, Some("html")),
            Some(dir.path().join("views/partials/nav.html"))
        );
        assert_eq!(
            files.find_file("site.css", Some("assets"), None),
            Some(dir.path().join("assets/css/site.css"))
        );
    }

    #[test]
    fn test_registration_order_and_misses() {
        let (dir, files) = fixture();
        assert_eq!(
            files.find_file("home.html", None, None),
            Some(dir.path().join("views/home.html"))
        );
        assert_eq!(
            files.find_file("home.html", Some("assets"), None),
            Some(dir.path().join("assets/home.html"))
        );
        assert_eq!(files.find_file("missing", None, Some("html")), None);
        assert_eq!(files.find_file("home", Some("unmapped"), Some("html")), None);
    }

    #[test]
    fn test_template_loader_from_mapping() {
        let (dir, files) = fixture();
        let loader = files.template_loader().unwrap();
        assert_eq!(loader.root(), dir.path().join("views"));
        assert_eq!(&*loader.load("partials/nav").unwrap(), "nav");
        assert!(FileLoader::new().template_loader().is_none());
    }
}
