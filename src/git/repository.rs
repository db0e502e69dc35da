//! Git repository operations

use std::path::Path;

use anyhow::{Context, Result};
use git2::{Diff, Repository};
use tracing::debug;

use crate::git::{normalize_path, ChangedFilesProvider};

/// Git repository wrapper
pub struct GitRepository {
    repo: Repository,
}

impl GitRepository {
    /// Open the repository containing `path`, searching parent directories
    pub fn open_at<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let repo = Repository::discover(path)
            .with_context(|| format!("Not in a git repository: {}", path.display()))?;

        Ok(Self { repo })
    }

    /// Check if a branch or revision can be resolved
    pub fn branch_exists(&self, branch_name: &str) -> bool {
        self.repo.revparse_single(branch_name).is_ok()
    }

    /// Diff the merge base of `compare_branch` and `HEAD` against `HEAD`
    fn diff_against(&self, compare_branch: &str) -> Result<Diff<'_>> {
        let base = self
            .repo
            .revparse_single(compare_branch)
            .with_context(|| format!("Failed to resolve compare branch: {compare_branch}"))?
            .peel_to_commit()
            .with_context(|| format!("Compare branch is not a commit: {compare_branch}"))?;

        let head = self
            .repo
            .head()
            .context("Failed to get HEAD reference")?
            .peel_to_commit()
            .context("Failed to peel HEAD to commit")?;

        let merge_base = self
            .repo
            .merge_base(base.id(), head.id())
            .with_context(|| format!("No common ancestor between HEAD and {compare_branch}"))?;
        debug!("Merge base with {compare_branch}: {merge_base}");

        let base_tree = self
            .repo
            .find_commit(merge_base)
            .context("Failed to find merge base commit")?
            .tree()
            .context("Failed to get merge base tree")?;
        let head_tree = head.tree().context("Failed to get HEAD tree")?;

        self.repo
            .diff_tree_to_tree(Some(&base_tree), Some(&head_tree), None)
            .context("Failed to diff against merge base")
    }
}

impl ChangedFilesProvider for GitRepository {
    fn changed_files(&self, compare_branch: &str) -> Result<Vec<String>> {
        if !self.branch_exists(compare_branch) {
            anyhow::bail!("Compare branch not found: {compare_branch}");
        }
        let diff = self.diff_against(compare_branch)?;

        let mut files: Vec<String> = diff
            .deltas()
            .filter_map(|delta| delta.new_file().path().or_else(|| delta.old_file().path()))
            .map(|path| normalize_path(&path.to_string_lossy()))
            .collect();
        files.sort();
        files.dedup();

        debug!("{} file(s) changed against {compare_branch}", files.len());
        Ok(files)
    }
}
