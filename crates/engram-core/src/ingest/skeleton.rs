//! Skeleton Generation
//!
//! Pure ASCII tree render of the filtered walk, bounded by a max depth,
//! plus file/directory/line totals. One skeleton document exists per
//! (repo, branch) and is regenerated on every ingestion.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

// ============================================================================
// TYPES
// ============================================================================

/// Default render depth
pub const DEFAULT_MAX_DEPTH: usize = 6;

/// Totals emitted next to the tree text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SkeletonStats {
    pub total_files: usize,
    pub total_dirs: usize,
    pub total_lines: usize,
}

#[derive(Default)]
struct TreeNode {
    dirs: BTreeMap<String, TreeNode>,
    files: Vec<String>,
}

impl TreeNode {
    fn insert(&mut self, components: &[String]) {
        match components {
            [] => {}
            [file] => self.files.push(file.clone()),
            [dir, rest @ ..] => self.dirs.entry(dir.clone()).or_default().insert(rest),
        }
    }

    fn count_dirs(&self) -> usize {
        self.dirs.len() + self.dirs.values().map(TreeNode::count_dirs).sum::<usize>()
    }
}

// ============================================================================
// RENDER
// ============================================================================

/// Render the directory tree for the already-filtered `files` under
/// `root`, returning the tree text and totals.
pub fn generate_tree(root: &Path, files: &[PathBuf], max_depth: usize) -> (String, SkeletonStats) {
    let mut tree = TreeNode::default();
    let mut total_lines = 0usize;

    for file in files {
        let Ok(relative) = file.strip_prefix(root) else {
            continue;
        };
        let components: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect();
        tree.insert(&components);

        if let Ok(content) = std::fs::read_to_string(file) {
            total_lines += content.lines().count();
        }
    }

    let root_name = root
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| root.display().to_string());

    let mut output = format!("{}/\n", root_name);
    render_node(&tree, "", max_depth, &mut output);

    let stats = SkeletonStats {
        total_files: files.len(),
        total_dirs: tree.count_dirs(),
        total_lines,
    };
    (output, stats)
}

fn render_node(node: &TreeNode, prefix: &str, depth_left: usize, output: &mut String) {
    let dir_count = node.dirs.len();
    let total = dir_count + node.files.len();
    let mut position = 0usize;

    for (name, child) in &node.dirs {
        position += 1;
        let last = position == total;
        let connector = if last { "└── " } else { "├── " };

        if depth_left == 0 {
            output.push_str(&format!("{}{}{}/...\n", prefix, connector, name));
            continue;
        }
        output.push_str(&format!("{}{}{}/\n", prefix, connector, name));
        let child_prefix = format!("{}{}", prefix, if last { "    " } else { "│   " });
        render_node(child, &child_prefix, depth_left - 1, output);
    }

    let mut files: Vec<&String> = node.files.iter().collect();
    files.sort();
    for name in files {
        position += 1;
        let connector = if position == total { "└── " } else { "├── " };
        output.push_str(&format!("{}{}{}\n", prefix, connector, name));
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) -> PathBuf {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_tree_render_and_stats() {
        let dir = TempDir::new().unwrap();
        let files = vec![
            write(dir.path(), "src/main.py", "line1\nline2\n"),
            write(dir.path(), "src/util/helpers.py", "a\n"),
            write(dir.path(), "README.md", "# readme\n"),
        ];

        let (tree, stats) = generate_tree(dir.path(), &files, DEFAULT_MAX_DEPTH);

        assert!(tree.contains("src/"));
        assert!(tree.contains("├── ") || tree.contains("└── "));
        assert!(tree.contains("main.py"));
        assert!(tree.contains("helpers.py"));
        assert!(tree.contains("README.md"));

        assert_eq!(stats.total_files, 3);
        assert_eq!(stats.total_dirs, 2); // src, src/util
        assert_eq!(stats.total_lines, 4);
    }

    #[test]
    fn test_max_depth_elides_deep_dirs() {
        let dir = TempDir::new().unwrap();
        let files = vec![write(dir.path(), "a/b/c/deep.py", "x\n")];

        let (tree, stats) = generate_tree(dir.path(), &files, 1);
        assert!(tree.contains("a/"));
        assert!(tree.contains("b/..."));
        assert!(!tree.contains("deep.py"));
        // Stats still count the full walk
        assert_eq!(stats.total_files, 1);
        assert_eq!(stats.total_dirs, 3);
    }

    #[test]
    fn test_empty_file_list() {
        let dir = TempDir::new().unwrap();
        let (tree, stats) = generate_tree(dir.path(), &[], DEFAULT_MAX_DEPTH);
        assert!(tree.ends_with("/\n"));
        assert_eq!(stats, SkeletonStats::default());
    }
}
