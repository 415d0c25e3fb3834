//! Git Context
//!
//! Branch detection, HEAD lookup, and commit-to-worktree deltas for the
//! ingestion pipeline. All lookups degrade quietly: a path outside any
//! repository yields the `unknown` branch and no delta support.

use std::path::{Path, PathBuf};

use git2::{Delta, DiffFindOptions, DiffOptions, Repository, StatusOptions};

use crate::document::UNKNOWN_BRANCH;
use crate::error::Result;

// ============================================================================
// BRANCH / HEAD DETECTION
// ============================================================================

/// Discover the repository containing `path`, if any
pub fn discover_repo(path: &Path) -> Option<Repository> {
    Repository::discover(path).ok()
}

/// Current branch name for the repository containing `path`.
/// Detached HEAD or no repository yields the `unknown` sentinel.
pub fn current_branch(path: &Path) -> String {
    let Some(repo) = discover_repo(path) else {
        return UNKNOWN_BRANCH.to_string();
    };
    match repo.head() {
        Ok(head) if head.is_branch() => head
            .shorthand()
            .map(|s| s.to_string())
            .unwrap_or_else(|| UNKNOWN_BRANCH.to_string()),
        _ => UNKNOWN_BRANCH.to_string(),
    }
}

/// HEAD commit SHA for the repository containing `path`
pub fn head_commit(path: &Path) -> Option<String> {
    let repo = discover_repo(path)?;
    let head = repo.head().ok()?;
    head.target().map(|oid| oid.to_string())
}

// ============================================================================
// DELTAS
// ============================================================================

/// File changes between a recorded commit and the current worktree
#[derive(Debug, Default, Clone)]
pub struct DeltaChanges {
    /// Added, modified, or type-changed files (absolute paths)
    pub modified: Vec<PathBuf>,
    /// Deleted files (absolute paths)
    pub deleted: Vec<PathBuf>,
    /// Renames as (old, new); the new path also appears in `modified`
    pub renamed: Vec<(PathBuf, PathBuf)>,
}

/// Diff `since_commit` against the current worktree (index included),
/// with rename detection.
pub fn changed_since(path: &Path, since_commit: &str) -> Result<DeltaChanges> {
    let repo = Repository::discover(path)?;
    let workdir = repo
        .workdir()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| path.to_path_buf());

    let oid = git2::Oid::from_str(since_commit)?;
    let tree = repo.find_commit(oid)?.tree()?;

    let mut options = DiffOptions::new();
    options.include_untracked(false);
    let mut diff = repo.diff_tree_to_workdir_with_index(Some(&tree), Some(&mut options))?;
    diff.find_similar(Some(DiffFindOptions::new().renames(true)))?;

    let mut changes = DeltaChanges::default();
    for delta in diff.deltas() {
        match delta.status() {
            Delta::Added | Delta::Modified | Delta::Typechange => {
                if let Some(new_path) = delta.new_file().path() {
                    changes.modified.push(workdir.join(new_path));
                }
            }
            Delta::Deleted => {
                if let Some(old_path) = delta.old_file().path() {
                    changes.deleted.push(workdir.join(old_path));
                }
            }
            Delta::Renamed => {
                if let (Some(old_path), Some(new_path)) =
                    (delta.old_file().path(), delta.new_file().path())
                {
                    changes
                        .renamed
                        .push((workdir.join(old_path), workdir.join(new_path)));
                    changes.modified.push(workdir.join(new_path));
                }
            }
            _ => {}
        }
    }

    Ok(changes)
}

/// Untracked files that git would consider new (gitignore respected)
pub fn untracked_files(path: &Path) -> Result<Vec<PathBuf>> {
    let repo = Repository::discover(path)?;
    let workdir = repo
        .workdir()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| path.to_path_buf());

    let mut options = StatusOptions::new();
    options
        .include_untracked(true)
        .recurse_untracked_dirs(true)
        .include_ignored(false);

    let statuses = repo.statuses(Some(&mut options))?;
    let mut files = Vec::new();
    for entry in statuses.iter() {
        if entry.status().contains(git2::Status::WT_NEW) {
            if let Some(rel) = entry.path() {
                files.push(workdir.join(rel));
            }
        }
    }
    Ok(files)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use git2::Signature;
    use tempfile::TempDir;

    fn commit_all(repo: &Repository, message: &str) -> String {
        let mut index = repo.index().unwrap();
        index
            .add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)
            .unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let sig = Signature::now("test", "test@example.com").unwrap();
        let parents: Vec<git2::Commit> = repo
            .head()
            .ok()
            .and_then(|h| h.target())
            .and_then(|oid| repo.find_commit(oid).ok())
            .into_iter()
            .collect();
        let parent_refs: Vec<&git2::Commit> = parents.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parent_refs)
            .unwrap()
            .to_string()
    }

    fn init_repo(dir: &TempDir) -> Repository {
        let repo = Repository::init(dir.path()).unwrap();
        repo.set_head("refs/heads/main").unwrap();
        repo
    }

    #[test]
    fn test_unknown_branch_outside_repo() {
        let dir = TempDir::new().unwrap();
        assert_eq!(current_branch(dir.path()), UNKNOWN_BRANCH);
        assert!(head_commit(dir.path()).is_none());
    }

    #[test]
    fn test_branch_and_head_detection() {
        let dir = TempDir::new().unwrap();
        let repo = init_repo(&dir);
        std::fs::write(dir.path().join("a.txt"), "one").unwrap();
        let sha = commit_all(&repo, "initial");

        assert_eq!(current_branch(dir.path()), "main");
        assert_eq!(head_commit(dir.path()).unwrap(), sha);
    }

    #[test]
    fn test_changed_since_sees_modifications_and_deletes() {
        let dir = TempDir::new().unwrap();
        let repo = init_repo(&dir);
        std::fs::write(dir.path().join("keep.txt"), "keep").unwrap();
        std::fs::write(dir.path().join("gone.txt"), "gone").unwrap();
        let base = commit_all(&repo, "initial");

        std::fs::write(dir.path().join("keep.txt"), "keep changed").unwrap();
        std::fs::remove_file(dir.path().join("gone.txt")).unwrap();
        std::fs::write(dir.path().join("new.txt"), "brand new").unwrap();

        let changes = changed_since(dir.path(), &base).unwrap();
        let modified: Vec<String> = changes
            .modified
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        let deleted: Vec<String> = changes
            .deleted
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();

        assert!(modified.contains(&"keep.txt".to_string()));
        assert!(deleted.contains(&"gone.txt".to_string()));
    }

    #[test]
    fn test_untracked_files_listed() {
        let dir = TempDir::new().unwrap();
        let repo = init_repo(&dir);
        std::fs::write(dir.path().join("tracked.txt"), "x").unwrap();
        commit_all(&repo, "initial");
        std::fs::write(dir.path().join("untracked.txt"), "y").unwrap();

        let files = untracked_files(dir.path()).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["untracked.txt"]);
    }
}
