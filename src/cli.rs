//! CLI interface for pipegen.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::info;

use crate::config::ProjectConfig;
use crate::git::{ChangedFilesProvider, GitRepository, StaticChanges};
use crate::pipeline::PipelinesRegistry;

mod generate;
mod list;
mod show;

pub use generate::{GenerateCommand, GenerationMode};
pub use list::ListCommand;
pub use show::{ReportFormat, ShowPipelinesCommand};

/// pipegen: merges per-pipeline CI entrypoints into one resolved configuration.
#[derive(Parser)]
#[command(name = "pipegen")]
#[command(
    about = "Merges per-pipeline CI entrypoints into one resolved CI configuration",
    long_about = None
)]
#[command(version)]
pub struct Cli {
    /// Logs progress at info level (overridden by RUST_LOG).
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// The command to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Generates the merged CI configuration.
    Generate(GenerateCommand),
    /// Shows which pipelines the current changes trigger, without generating.
    #[command(name = "show-pipelines")]
    ShowPipelines(ShowPipelinesCommand),
    /// Lists registered pipelines.
    List(ListCommand),
}

impl Cli {
    /// Executes the CLI command.
    pub fn execute(self) -> Result<()> {
        match self.command {
            Commands::Generate(generate_cmd) => generate_cmd.execute(),
            Commands::ShowPipelines(show_cmd) => show_cmd.execute(),
            Commands::List(list_cmd) => list_cmd.execute(),
        }
    }
}

/// Options shared by commands that inspect a project and its changes.
#[derive(Args, Debug, Clone)]
pub struct ProjectArgs {
    /// Project root containing the pipeline declarations.
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub project_root: PathBuf,

    /// Branch or revision changed files are computed against.
    #[arg(long, value_name = "REF")]
    pub compare_branch: Option<String>,

    /// Uses these changed files instead of asking git (repeatable).
    #[arg(long = "changed-file", value_name = "PATH")]
    pub changed_files: Vec<String>,
}

impl ProjectArgs {
    /// Loads the project configuration with command-line overrides applied.
    pub fn load_config(&self) -> Result<ProjectConfig> {
        let mut config = ProjectConfig::load(&self.project_root)?;
        if let Some(branch) = &self.compare_branch {
            config.compare_branch.clone_from(branch);
        }
        Ok(config)
    }

    /// Returns the changed files, from `--changed-file` or from git.
    pub fn changed_files(&self, config: &ProjectConfig) -> Result<Vec<String>> {
        if !self.changed_files.is_empty() {
            return StaticChanges(self.changed_files.clone()).changed_files(&config.compare_branch);
        }

        let repo = GitRepository::open_at(&self.project_root)?;
        let files = repo.changed_files(&config.compare_branch)?;
        info!(
            "{} file(s) changed against {}",
            files.len(),
            config.compare_branch
        );
        Ok(files)
    }
}

/// Loads the pipeline registry configured for `project_root`.
pub fn load_registry(project_root: &Path, config: &ProjectConfig) -> Result<PipelinesRegistry> {
    PipelinesRegistry::discover(
        &project_root.join(&config.pipelines_dir),
        &project_root.join(&config.manifest),
    )
}
