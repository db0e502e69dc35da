//! Expansion of local `include` directives.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_yaml::{Mapping, Value};
use tracing::debug;

use crate::ci::{deep_merge, has_glob_chars, take_key, CiError, MergePolicy};
use crate::data::read_yaml_value;

/// Recursively inlines local includes into a configuration mapping.
///
/// Included files merge in list order, later files overriding earlier ones
/// on scalar conflicts and appending to sequences. The including file is
/// merged last, so its own definitions always win. Remote, project and
/// template includes are skipped.
#[derive(Debug, Clone)]
pub struct IncludeResolver {
    project_root: PathBuf,
}

impl IncludeResolver {
    /// Creates a resolver rooted at `project_root`.
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
        }
    }

    /// Resolves the includes of `content`, a file located in `base_dir`.
    pub fn resolve(&self, content: Mapping, base_dir: &Path) -> Result<Mapping> {
        let mut stack = Vec::new();
        self.resolve_nested(content, base_dir, &mut stack)
    }

    fn resolve_nested(
        &self,
        content: Mapping,
        base_dir: &Path,
        stack: &mut Vec<PathBuf>,
    ) -> Result<Mapping> {
        let (own, include) = take_key(content, "include");
        let Some(include) = include else {
            return Ok(own);
        };

        let entries = match include {
            Value::Sequence(entries) => entries,
            Value::Null => Vec::new(),
            single => vec![single],
        };

        let mut accumulated = Value::Mapping(Mapping::new());
        for entry in &entries {
            for file in self.files_for_entry(entry, base_dir)? {
                let included = self.load_included(&file, stack)?;
                accumulated = deep_merge(
                    accumulated,
                    Value::Mapping(included),
                    MergePolicy::OverrideAllowed,
                )?;
            }
        }

        match deep_merge(accumulated, Value::Mapping(own), MergePolicy::OverrideAllowed)? {
            Value::Mapping(merged) => Ok(merged),
            _ => Ok(Mapping::new()),
        }
    }

    fn load_included(&self, file: &Path, stack: &mut Vec<PathBuf>) -> Result<Mapping> {
        let key = file.canonicalize().unwrap_or_else(|_| file.to_path_buf());
        if stack.contains(&key) {
            return Err(CiError::CircularInclude {
                path: file.display().to_string(),
            }
            .into());
        }

        debug!("Including {}", file.display());
        let content = match read_yaml_value(file)? {
            Value::Mapping(map) => map,
            Value::Null => Mapping::new(),
            _ => anyhow::bail!(
                "Included file must contain a mapping at the top level: {}",
                file.display()
            ),
        };

        let dir = file.parent().unwrap_or(self.project_root.as_path()).to_path_buf();
        stack.push(key);
        let resolved = self
            .resolve_nested(content, &dir, stack)
            .with_context(|| format!("Failed to resolve includes of {}", file.display()));
        stack.pop();
        resolved
    }

    /// Maps one `include` entry to the concrete files it names.
    fn files_for_entry(&self, entry: &Value, base_dir: &Path) -> Result<Vec<PathBuf>> {
        let raw = match entry {
            Value::String(path) => path.as_str(),
            Value::Mapping(map) => match map.get("local").and_then(Value::as_str) {
                Some(path) => path,
                None => {
                    debug!("Skipping non-local include entry: {entry:?}");
                    return Ok(Vec::new());
                }
            },
            _ => {
                debug!("Skipping unsupported include entry: {entry:?}");
                return Ok(Vec::new());
            }
        };

        let absolute = raw.starts_with('/');
        let relative = raw.trim_start_matches('/');

        if has_glob_chars(relative) {
            return self.expand_glob(relative);
        }

        let candidate = if absolute {
            self.project_root.join(relative)
        } else {
            let local = base_dir.join(relative);
            if local.is_file() {
                local
            } else {
                self.project_root.join(relative)
            }
        };

        if !candidate.is_file() {
            anyhow::bail!("Included file not found: {}", candidate.display());
        }
        Ok(vec![candidate])
    }

    /// Expands a glob under the project root into sorted regular files.
    fn expand_glob(&self, pattern: &str) -> Result<Vec<PathBuf>> {
        let root = glob::Pattern::escape(&self.project_root.to_string_lossy());
        let full = format!("{}/{pattern}", root.trim_end_matches('/'));

        let mut files: Vec<PathBuf> = glob::glob(&full)
            .with_context(|| format!("Invalid include pattern '{pattern}'"))?
            .filter_map(std::result::Result::ok)
            .filter(|path| path.is_file())
            .collect();
        files.sort();

        debug!("Include pattern '{pattern}' matched {} file(s)", files.len());
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn yaml(s: &str) -> Mapping {
        serde_yaml::from_str(s).unwrap()
    }

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn no_include_is_unchanged() {
        let temp_dir = TempDir::new().unwrap();
        let resolver = IncludeResolver::new(temp_dir.path());
        let content = yaml("build: { script: [make] }");
        let resolved = resolver.resolve(content.clone(), temp_dir.path()).unwrap();
        assert_eq!(resolved, content);
    }

    #[test]
    fn including_file_wins() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write(root, "ci/common.yml", "variables: { A: common, B: common }\nstages: [build]\n");
        let resolver = IncludeResolver::new(root);

        let content = yaml("include: /ci/common.yml\nvariables: { A: own }\nstages: [test]\n");
        let resolved = resolver.resolve(content, root).unwrap();

        assert_eq!(
            resolved,
            yaml("variables: { A: own, B: common }\nstages: [build, test]\n")
        );
    }

    #[test]
    fn local_map_and_later_files_override() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write(root, "a.yml", "job: { image: a, tags: [a] }\n");
        write(root, "b.yml", "job: { image: b, tags: [b] }\n");
        let resolver = IncludeResolver::new(root);

        let content = yaml("include: [{ local: a.yml }, b.yml]\n");
        let resolved = resolver.resolve(content, root).unwrap();
        assert_eq!(resolved, yaml("job: { image: b, tags: [a, b] }\n"));
    }

    #[test]
    fn glob_include_is_sorted() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write(root, "jobs/b.yml", "order: { v: b }\nb: { script: [b] }\n");
        write(root, "jobs/a.yml", "order: { v: a }\na: { script: [a] }\n");
        write(root, "jobs/nested/c.yml", "c: { script: [c] }\n");
        let resolver = IncludeResolver::new(root);

        let resolved = resolver
            .resolve(yaml("include: 'jobs/*.yml'\n"), root)
            .unwrap();
        let keys: Vec<_> = resolved.keys().map(|k| k.as_str().unwrap()).collect();
        assert_eq!(keys, vec!["order", "a", "b"]);
        assert_eq!(resolved.get("order"), Some(&serde_yaml::from_str::<Value>("{ v: b }").unwrap()));
    }

    #[test]
    fn nested_includes_resolve_relative_to_their_file() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write(root, "ci/main.yml", "include: parts/base.yml\nmain: { script: [m] }\n");
        write(root, "ci/parts/base.yml", "base: { script: [b] }\n");
        let resolver = IncludeResolver::new(root);

        let resolved = resolver.resolve(yaml("include: ci/main.yml\n"), root).unwrap();
        assert!(resolved.contains_key("main"));
        assert!(resolved.contains_key("base"));
    }

    #[test]
    fn remote_includes_are_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let resolver = IncludeResolver::new(temp_dir.path());
        let content = yaml(
            "include:\n  - remote: https://example.com/ci.yml\n  - project: group/repo\n    file: ci.yml\njob: { script: [x] }\n",
        );
        let resolved = resolver.resolve(content, temp_dir.path()).unwrap();
        assert_eq!(resolved, yaml("job: { script: [x] }\n"));
    }

    #[test]
    fn missing_local_include_fails() {
        let temp_dir = TempDir::new().unwrap();
        let resolver = IncludeResolver::new(temp_dir.path());
        let err = resolver
            .resolve(yaml("include: nope.yml\n"), temp_dir.path())
            .unwrap_err();
        assert!(err.to_string().contains("nope.yml"));
    }

    #[test]
    fn circular_include_fails() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write(root, "a.yml", "include: b.yml\n");
        write(root, "b.yml", "include: a.yml\n");
        let resolver = IncludeResolver::new(root);

        let err = resolver.resolve(yaml("include: a.yml\n"), root).unwrap_err();
        let circular = err
            .chain()
            .find_map(|cause| cause.downcast_ref::<CiError>())
            .cloned();
        assert!(matches!(circular, Some(CiError::CircularInclude { .. })));
    }
}
