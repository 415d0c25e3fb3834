//! Codebase Walker
//!
//! Filtered filesystem walk feeding the ingestion pipeline. Filters, in
//! order: hidden entries, the hard-coded default ignore set (VCS dirs,
//! dependency caches, build outputs, binary extensions), user ignore
//! files, and optional include globs (OR semantics).

use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::error::{EngramError, Result};

// ============================================================================
// DEFAULT IGNORE SET
// ============================================================================

/// Directory names never walked
const DEFAULT_IGNORE_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "node_modules",
    "__pycache__",
    ".venv",
    "venv",
    "target",
    "dist",
    "build",
    "out",
    "vendor",
    ".idea",
    ".vscode",
    ".pytest_cache",
    ".mypy_cache",
    ".ruff_cache",
    ".next",
    ".cache",
    "coverage",
];

/// File extensions never indexed
const BINARY_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "ico", "svg", "webp", "pdf", "zip", "tar", "gz", "bz2", "xz",
    "7z", "exe", "dll", "so", "dylib", "a", "o", "class", "jar", "pyc", "wasm", "bin", "woff",
    "woff2", "ttf", "eot", "otf", "mp3", "mp4", "mov", "avi", "sqlite", "db", "parquet", "onnx",
];

// ============================================================================
// WALK OPTIONS
// ============================================================================

/// Walk configuration
#[derive(Default)]
pub struct WalkOptions {
    /// Only files matching at least one pattern are kept (OR semantics)
    pub include: Option<GlobSet>,
    /// Additional ignore patterns from user ignore files
    pub ignore: Option<GlobSet>,
}

/// Compile glob patterns into a set. Bare names (no separator) match at
/// any depth, both as files and as directories.
pub fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let pattern = pattern.trim().trim_end_matches('/');
        if pattern.is_empty() || pattern.starts_with('#') {
            continue;
        }
        let expanded: Vec<String> = if pattern.contains('/') {
            vec![pattern.to_string()]
        } else {
            vec![format!("**/{}", pattern), format!("**/{}/**", pattern)]
        };
        for glob in expanded {
            builder.add(
                Glob::new(&glob)
                    .map_err(|e| EngramError::InvalidArgument(format!("bad glob '{}': {}", glob, e)))?,
            );
        }
    }
    builder
        .build()
        .map_err(|e| EngramError::InvalidArgument(format!("glob set: {}", e)))
}

/// Read ignore patterns from the files that exist among `paths`
pub fn load_ignore_patterns(paths: &[PathBuf]) -> Vec<String> {
    let mut patterns = Vec::new();
    for path in paths {
        let Ok(content) = std::fs::read_to_string(path) else {
            continue;
        };
        for line in content.lines() {
            let line = line.trim();
            if !line.is_empty() && !line.starts_with('#') {
                patterns.push(line.to_string());
            }
        }
    }
    patterns
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

fn is_ignored_dir(name: &str) -> bool {
    DEFAULT_IGNORE_DIRS.contains(&name)
}

fn is_binary_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| BINARY_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Whether the walker would keep this file, given the root it was found
/// under. Used by delta strategies to re-check files git reported.
pub fn is_indexable(root: &Path, path: &Path, options: &WalkOptions) -> bool {
    let Ok(relative) = path.strip_prefix(root) else {
        return false;
    };

    for component in relative.components() {
        let name = component.as_os_str().to_string_lossy();
        if is_hidden(&name) || is_ignored_dir(&name) {
            return false;
        }
    }
    if is_binary_extension(path) {
        return false;
    }
    if let Some(ignore) = &options.ignore {
        if ignore.is_match(relative) {
            return false;
        }
    }
    if let Some(include) = &options.include {
        if !include.is_match(relative) {
            return false;
        }
    }
    true
}

/// Walk the tree rooted at `root`, returning indexable files in sorted
/// order.
pub fn walk_codebase(root: &Path, options: &WalkOptions) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(EngramError::InvalidArgument(format!(
            "not a directory: {}",
            root.display()
        )));
    }

    let mut files = Vec::new();
    let walker = WalkDir::new(root).follow_links(false).into_iter();

    for entry in walker.filter_entry(|e| {
        if e.depth() == 0 {
            return true;
        }
        let name = e.file_name().to_string_lossy();
        !(is_hidden(&name) || (e.file_type().is_dir() && is_ignored_dir(&name)))
    }) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!("walk error: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.into_path();
        if is_indexable(root, &path, options) {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

// ============================================================================
// HASHING
// ============================================================================

/// Content hash of a file (sha256, hex)
pub fn compute_file_hash(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    let digest = Sha256::digest(&bytes);
    Ok(digest.iter().map(|b| format!("{:02x}", b)).collect())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_walk_skips_default_ignores_and_hidden() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "src/main.py", "print('hi')");
        write(dir.path(), "node_modules/pkg/index.js", "x");
        write(dir.path(), ".git/config", "x");
        write(dir.path(), ".hidden.txt", "x");
        write(dir.path(), "logo.png", "x");

        let files = walk_codebase(dir.path(), &WalkOptions::default()).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["src/main.py"]);
    }

    #[test]
    fn test_include_patterns_are_or_semantics() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "src/app.py", "x");
        write(dir.path(), "tests/test_app.py", "x");
        write(dir.path(), "docs/readme.md", "x");

        let include = build_globset(&["src/**".to_string(), "tests/**".to_string()]).unwrap();
        let options = WalkOptions {
            include: Some(include),
            ignore: None,
        };
        let files = walk_codebase(dir.path(), &options).unwrap();
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn test_user_ignore_patterns() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "src/app.py", "x");
        write(dir.path(), "generated/schema.py", "x");
        write(dir.path(), "ignorefile", "# comment\n\ngenerated\n");

        let patterns = load_ignore_patterns(&[dir.path().join("ignorefile")]);
        assert_eq!(patterns, vec!["generated"]);

        let options = WalkOptions {
            include: None,
            ignore: Some(build_globset(&patterns).unwrap()),
        };
        let files = walk_codebase(dir.path(), &options).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().to_string())
            .collect();
        assert!(names.contains(&"src/app.py".to_string()));
        assert!(!names.iter().any(|n| n.starts_with("generated")));
    }

    #[test]
    fn test_compute_file_hash_tracks_content() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.txt", "one");
        let h1 = compute_file_hash(&dir.path().join("a.txt")).unwrap();
        write(dir.path(), "a.txt", "two");
        let h2 = compute_file_hash(&dir.path().join("a.txt")).unwrap();
        assert_ne!(h1, h2);
        assert_eq!(h1.len(), 64);
    }

    #[test]
    fn test_walk_missing_root_is_invalid() {
        let err = walk_codebase(Path::new("/definitely/not/here"), &WalkOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_argument");
    }
}
