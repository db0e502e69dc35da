//! Changed-file detection against a comparison branch.

pub mod repository;

pub use repository::GitRepository;

use anyhow::Result;

/// Source of the changed-file list that drives change-based selection.
pub trait ChangedFilesProvider {
    /// Returns the paths changed relative to `compare_branch`, relative to the
    /// repository root with `/` separators, sorted and without duplicates.
    fn changed_files(&self, compare_branch: &str) -> Result<Vec<String>>;
}

/// A fixed changed-file list, used when paths are supplied directly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticChanges(pub Vec<String>);

impl ChangedFilesProvider for StaticChanges {
    fn changed_files(&self, _compare_branch: &str) -> Result<Vec<String>> {
        let mut files: Vec<String> = self.0.iter().map(|f| normalize_path(f)).collect();
        files.sort();
        files.dedup();
        Ok(files)
    }
}

/// Normalizes a repository path to forward slashes without a leading `./`.
pub fn normalize_path(path: &str) -> String {
    let path = path.replace('\\', "/");
    path.strip_prefix("./").unwrap_or(&path).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_changes_are_sorted_and_unique() {
        let provider = StaticChanges(vec![
            "src/b.rs".to_string(),
            "./src/a.rs".to_string(),
            "src/b.rs".to_string(),
        ]);
        assert_eq!(
            provider.changed_files("ignored").unwrap(),
            vec!["src/a.rs", "src/b.rs"]
        );
    }

    #[test]
    fn backslashes_become_forward_slashes() {
        assert_eq!(normalize_path(r"docs\guide\index.md"), "docs/guide/index.md");
    }
}
