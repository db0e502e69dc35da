//! Project configuration for a generation run.
//!
//! Values come from, highest precedence first: command-line flags, environment
//! variables (falling back to `$HOME/.pipegen/settings.json`), the optional
//! `.pipegen.yaml` at the project root, and built-in defaults.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ci::{GeneratorOptions, MergePolicy};
use crate::utils::get_env_var;

/// Name of the project configuration file.
pub const CONFIG_FILE_NAME: &str = ".pipegen.yaml";

/// Environment variable overriding [`ProjectConfig::compare_branch`].
pub const ENV_COMPARE_BRANCH: &str = "PIPEGEN_COMPARE_BRANCH";
/// Environment variable overriding [`ProjectConfig::output`].
pub const ENV_OUTPUT: &str = "PIPEGEN_OUTPUT";
/// Environment variable overriding [`ProjectConfig::pipelines_dir`].
pub const ENV_PIPELINES_DIR: &str = "PIPEGEN_PIPELINES_DIR";

/// Settings read from `.pipegen.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    /// Directory holding one declaration file per pipeline.
    pub pipelines_dir: PathBuf,
    /// Single-file manifest, used when `pipelines_dir` does not exist.
    pub manifest: PathBuf,
    /// Where the generated configuration is written.
    pub output: PathBuf,
    /// Branch changed files are computed against.
    pub compare_branch: String,
    /// Inline local includes.
    pub resolve_includes: bool,
    /// Resolve `extends`.
    pub resolve_extends: bool,
    /// How pipelines are merged together.
    pub merge_policy: MergePolicy,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            pipelines_dir: PathBuf::from(".ci/pipelines"),
            manifest: PathBuf::from(".ci/pipelines.yaml"),
            output: PathBuf::from(".gitlab-ci.generated.yml"),
            compare_branch: "origin/main".to_string(),
            resolve_includes: true,
            resolve_extends: true,
            merge_policy: MergePolicy::OverrideAllowed,
        }
    }
}

impl ProjectConfig {
    /// Loads the project configuration and applies environment overrides.
    pub fn load(project_root: &Path) -> Result<Self> {
        let mut config = Self::load_file(project_root)?;
        config.apply_env(get_env_var);
        Ok(config)
    }

    /// Loads `.pipegen.yaml` from `project_root`, or defaults when absent.
    pub fn load_file(project_root: &Path) -> Result<Self> {
        let path = project_root.join(CONFIG_FILE_NAME);
        if !path.is_file() {
            debug!("No {CONFIG_FILE_NAME} in {}, using defaults", project_root.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Overrides fields from environment variables found through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(branch) = lookup(ENV_COMPARE_BRANCH) {
            self.compare_branch = branch;
        }
        if let Some(output) = lookup(ENV_OUTPUT) {
            self.output = PathBuf::from(output);
        }
        if let Some(dir) = lookup(ENV_PIPELINES_DIR) {
            self.pipelines_dir = PathBuf::from(dir);
        }
    }

    /// Returns the generator switches this configuration selects.
    pub fn generator_options(&self) -> GeneratorOptions {
        GeneratorOptions {
            resolve_includes: self.resolve_includes,
            resolve_extends: self.resolve_extends,
            merge_policy: self.merge_policy,
        }
    }
}
