//! Generate command.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;
use tracing::info;

use crate::ci::{GeneratorOptions, MergePolicy, PipelineGenerator};
use crate::cli::{load_registry, ProjectArgs};
use crate::config::ProjectConfig;
use crate::data::write_generated;
use crate::pipeline::{Pipeline, PipelinesRegistry};

/// Generates the merged CI configuration.
#[derive(Parser, Debug)]
pub struct GenerateCommand {
    /// Merges every registered pipeline (the default).
    #[arg(long, conflicts_with_all = ["pipelines", "changes"])]
    pub all: bool,

    /// Merges only the named pipeline (repeatable).
    #[arg(long = "pipeline", value_name = "NAME", conflicts_with = "changes")]
    pub pipelines: Vec<String>,

    /// Merges the pipelines whose triggers match the changed files.
    #[arg(long)]
    pub changes: bool,

    /// Leaves `include` directives unresolved.
    #[arg(long)]
    pub no_includes: bool,

    /// Leaves `extends` unresolved.
    #[arg(long)]
    pub no_extends: bool,

    /// Fails when two pipelines define the same key differently.
    #[arg(long)]
    pub strict: bool,

    /// Output file, or `-` for stdout.
    #[arg(long, short, value_name = "PATH")]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub project: ProjectArgs,
}

/// How pipelines are selected for generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationMode {
    /// Every registered pipeline.
    All,
    /// Pipelines requested by name, in request order.
    Named(Vec<String>),
    /// Pipelines triggered by the changed files.
    Changes,
}

impl GenerateCommand {
    /// Returns the selection mode implied by the flags.
    pub fn mode(&self) -> GenerationMode {
        if self.changes {
            GenerationMode::Changes
        } else if !self.pipelines.is_empty() {
            GenerationMode::Named(self.pipelines.clone())
        } else {
            GenerationMode::All
        }
    }

    /// Returns the generator options after applying command-line toggles.
    pub fn options(&self, config: &ProjectConfig) -> GeneratorOptions {
        let mut options = config.generator_options();
        if self.no_includes {
            options.resolve_includes = false;
        }
        if self.no_extends {
            options.resolve_extends = false;
        }
        if self.strict {
            options.merge_policy = MergePolicy::Strict;
        }
        options
    }

    /// Returns where the configuration is written.
    ///
    /// A command-line path is taken as given; a configured one is relative
    /// to the project root.
    pub fn output_path(&self, config: &ProjectConfig) -> PathBuf {
        match &self.output {
            Some(path) => path.clone(),
            None if config.output == Path::new("-") => config.output.clone(),
            None => self.project.project_root.join(&config.output),
        }
    }

    /// Executes the generate command.
    pub fn execute(self) -> Result<()> {
        let config = self.project.load_config()?;
        let registry = load_registry(&self.project.project_root, &config)?;
        let selected = self.select(&registry, &config)?;

        let generator = PipelineGenerator::new(&self.project.project_root, self.options(&config));
        let generated = generator.generate(&selected)?;

        let output = self.output_path(&config);
        write_generated(&output, &generated.pipelines, &generated.to_value())?;

        if output != Path::new("-") {
            println!(
                "✓ Generated {} from {} pipeline(s): {}",
                output.display(),
                generated.pipelines.len(),
                generated.pipelines.join(", ")
            );
        }
        Ok(())
    }

    fn select<'a>(
        &self,
        registry: &'a PipelinesRegistry,
        config: &ProjectConfig,
    ) -> Result<Vec<&'a Pipeline>> {
        let selected = match self.mode() {
            GenerationMode::All => registry.pipelines().iter().collect(),
            GenerationMode::Named(names) => registry.select(names.as_slice())?,
            GenerationMode::Changes => {
                let changed = self.project.changed_files(config)?;
                registry.get_triggered_pipelines(changed.as_slice())
            }
        };

        info!(
            "Selected {} of {} pipeline(s)",
            selected.len(),
            registry.pipelines().len()
        );
        Ok(selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn parse_generate(args: &[&str]) -> GenerateCommand {
        let mut full_args = vec!["generate"];
        full_args.extend_from_slice(args);
        GenerateCommand::try_parse_from(full_args).unwrap()
    }

    #[test]
    fn default_mode_is_all() {
        assert_eq!(parse_generate(&[]).mode(), GenerationMode::All);
        assert_eq!(parse_generate(&["--all"]).mode(), GenerationMode::All);
    }

    #[test]
    fn named_mode_keeps_order() {
        let cmd = parse_generate(&["--pipeline", "docs", "--pipeline", "api"]);
        assert_eq!(
            cmd.mode(),
            GenerationMode::Named(vec!["docs".into(), "api".into()])
        );
    }

    #[test]
    fn modes_conflict() {
        assert!(GenerateCommand::try_parse_from(["generate", "--all", "--changes"]).is_err());
        assert!(
            GenerateCommand::try_parse_from(["generate", "--pipeline", "a", "--changes"]).is_err()
        );
        assert!(GenerateCommand::try_parse_from(["generate", "--all", "--pipeline", "a"]).is_err());
    }

    #[test]
    fn flags_override_config() {
        let cmd = parse_generate(&["--no-includes", "--strict"]);
        let options = cmd.options(&ProjectConfig::default());
        assert!(!options.resolve_includes);
        assert!(options.resolve_extends);
        assert_eq!(options.merge_policy, MergePolicy::Strict);
    }

    #[test]
    fn configured_output_is_relative_to_root() {
        let cmd = parse_generate(&["--project-root", "repo"]);
        let config = ProjectConfig::default();
        assert_eq!(
            cmd.output_path(&config),
            PathBuf::from("repo").join(".gitlab-ci.generated.yml")
        );

        let cmd = parse_generate(&["--project-root", "repo", "-o", "-"]);
        assert_eq!(cmd.output_path(&config), PathBuf::from("-"));
    }

    #[test]
    fn execute_writes_selected_pipelines() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join(".ci/pipelines")).unwrap();
        fs::write(
            root.join(".ci/pipelines/api.yml"),
            "entrypoint: api.yml\non:\n  - changes:\n      - include: [api/]\n",
        )
        .unwrap();
        fs::write(
            root.join(".ci/pipelines/docs.yml"),
            "entrypoint: docs.yml\non:\n  - changes:\n      - include: [docs/]\n",
        )
        .unwrap();
        fs::write(root.join("api.yml"), "api: { script: [make api] }\n").unwrap();
        fs::write(root.join("docs.yml"), "docs: { script: [make docs] }\n").unwrap();

        let root_arg = root.to_string_lossy().to_string();
        let cmd = parse_generate(&[
            "--changes",
            "--changed-file",
            "docs/index.md",
            "--project-root",
            &root_arg,
        ]);
        cmd.execute().unwrap();

        let written = fs::read_to_string(root.join(".gitlab-ci.generated.yml")).unwrap();
        assert!(written.contains("# Pipelines: docs\n"));
        assert!(written.contains("make docs"));
        assert!(!written.contains("make api"));
    }

    #[test]
    fn repeated_pipeline_flag_merges_once() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join(".ci/pipelines")).unwrap();
        fs::write(root.join(".ci/pipelines/docs.yml"), "entrypoint: docs.yml\n").unwrap();
        fs::write(root.join("docs.yml"), "docs: { script: [make docs] }\n").unwrap();

        let root_arg = root.to_string_lossy().to_string();
        let cmd = parse_generate(&[
            "--pipeline",
            "docs",
            "--pipeline",
            "docs",
            "--project-root",
            &root_arg,
        ]);
        cmd.execute().unwrap();

        let written = fs::read_to_string(root.join(".gitlab-ci.generated.yml")).unwrap();
        assert!(written.contains("# Pipelines: docs\n"));
        assert_eq!(written.matches("make docs").count(), 1);
    }
}
