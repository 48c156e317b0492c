//! Local project enumeration
//!
//! Walks the push root depth-first with entries visited in file-name order,
//! skipping excluded directories, dot-entries and excluded file names. The
//! walk is driven by `walkdir`'s explicit directory stack.

use anyhow::{Context, Result};
use regex::Regex;
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::config::PushConfig;

/// A local file and the path it takes inside the remote repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    /// Where the file lives on disk
    pub path: PathBuf,
    /// Root-relative, `/`-separated path used remotely
    pub repo_path: String,
}

/// Exact-name or `*` glob match against a file name
#[derive(Debug, Clone)]
enum NamePattern {
    Exact(String),
    Glob(Regex),
}

impl NamePattern {
    fn parse(pattern: &str) -> Result<Self> {
        if pattern.contains('*') {
            let pattern_regex = regex::escape(pattern).replace(r"\*", ".*");
            let regex = Regex::new(&format!("^{}$", pattern_regex))
                .with_context(|| format!("Invalid exclusion pattern: {}", pattern))?;
            Ok(NamePattern::Glob(regex))
        } else {
            Ok(NamePattern::Exact(pattern.to_string()))
        }
    }

    fn matches(&self, name: &str) -> bool {
        match self {
            NamePattern::Exact(exact) => exact == name,
            NamePattern::Glob(regex) => regex.is_match(name),
        }
    }
}

/// Enumerates the files a push would upload
#[derive(Debug, Clone)]
pub struct ProjectScanner {
    root: PathBuf,
    exclude_dirs: Vec<NamePattern>,
    exclude_files: Vec<NamePattern>,
}

impl ProjectScanner {
    pub fn new(
        root: impl Into<PathBuf>,
        exclude_dirs: &[String],
        exclude_files: &[String],
    ) -> Result<Self> {
        let exclude_dirs = exclude_dirs
            .iter()
            .map(|p| NamePattern::parse(p))
            .collect::<Result<Vec<_>>>()?;
        let exclude_files = exclude_files
            .iter()
            .map(|p| NamePattern::parse(p))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            root: root.into(),
            exclude_dirs,
            exclude_files,
        })
    }

    pub fn from_config(config: &PushConfig) -> Result<Self> {
        Self::new(&config.root, &config.exclude_dirs, &config.exclude_files)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether a directory with this name is skipped along with its contents
    pub fn is_excluded_dir(&self, name: &str) -> bool {
        self.exclude_dirs.iter().any(|p| p.matches(name)) || name.starts_with('.')
    }

    pub fn is_excluded_file(&self, name: &str) -> bool {
        self.exclude_files.iter().any(|p| p.matches(name)) || name.starts_with('.')
    }

    fn keep(&self, entry: &DirEntry) -> bool {
        // The root is always walked, even when it is "." or a dot-directory
        if entry.depth() == 0 {
            return true;
        }

        let name = entry.file_name().to_string_lossy();
        if entry.file_type().is_dir() {
            !self.is_excluded_dir(&name)
        } else {
            !self.is_excluded_file(&name)
        }
    }

    /// Collect every regular file under the root in traversal order
    pub fn scan(&self) -> Result<Vec<LocalFile>> {
        let mut files = Vec::new();

        let walker = WalkDir::new(&self.root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| self.keep(e));

        for entry in walker {
            let entry = entry
                .with_context(|| format!("Failed to scan directory: {:?}", self.root))?;

            if !entry.file_type().is_file() {
                continue;
            }

            let repo_path = self.repo_path(entry.path())?;
            files.push(LocalFile {
                path: entry.into_path(),
                repo_path,
            });
        }

        debug!("Scanned {} files under {:?}", files.len(), self.root);
        Ok(files)
    }

    /// Path of a scanned file relative to the root, joined with `/`
    fn repo_path(&self, path: &Path) -> Result<String> {
        let relative = path
            .strip_prefix(&self.root)
            .with_context(|| format!("{:?} is outside the scan root", path))?;

        let parts: Vec<String> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();

        Ok(parts.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PushConfig;
    use quickcheck_macros::quickcheck;

    fn default_scanner() -> ProjectScanner {
        ProjectScanner::from_config(&PushConfig::default()).unwrap()
    }

    #[test]
    fn test_default_exclusions() {
        let scanner = default_scanner();

        for dir in ["node_modules", ".git", ".cache", ".config", "dist", ".replit", ".venv"] {
            assert!(scanner.is_excluded_dir(dir), "{} should be excluded", dir);
        }
        for dir in ["src", "client", "distribution"] {
            assert!(!scanner.is_excluded_dir(dir), "{} should be kept", dir);
        }

        assert!(scanner.is_excluded_file("package-lock.json"));
        assert!(scanner.is_excluded_file(".replit"));
        assert!(scanner.is_excluded_file(".env"));
        assert!(!scanner.is_excluded_file("package.json"));
        assert!(!scanner.is_excluded_file("dist"));
    }

    #[test]
    fn test_glob_patterns() {
        let scanner = ProjectScanner::new(
            ".",
            &["*.egg-info".to_string(), "target".to_string()],
            &["*.log".to_string()],
        )
        .unwrap();

        assert!(scanner.is_excluded_dir("pkg.egg-info"));
        assert!(scanner.is_excluded_dir("target"));
        assert!(!scanner.is_excluded_dir("targets"));
        assert!(scanner.is_excluded_file("server.log"));
        assert!(!scanner.is_excluded_file("server.log.txt"));
        // Regex metacharacters in patterns are literal
        assert!(!scanner.is_excluded_dir("pkgXegg-info"));
    }

    #[test]
    fn test_repo_path_strips_current_dir_prefix() {
        let scanner = default_scanner();
        assert_eq!(
            scanner.repo_path(Path::new("./client/src/App.tsx")).unwrap(),
            "client/src/App.tsx"
        );
        assert_eq!(scanner.repo_path(Path::new("./README.md")).unwrap(), "README.md");
    }

    #[test]
    fn test_repo_path_outside_root() {
        let scanner = ProjectScanner::new("/srv/app", &[], &[]).unwrap();
        assert!(scanner.repo_path(Path::new("/etc/passwd")).is_err());
    }

    #[quickcheck]
    fn prop_dot_names_always_excluded(name: String) -> bool {
        let scanner = default_scanner();
        let dotted = format!(".{}", name);
        scanner.is_excluded_dir(&dotted) && scanner.is_excluded_file(&dotted)
    }
}
