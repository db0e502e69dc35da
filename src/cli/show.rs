//! Dry-run trigger report command.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use crate::cli::{load_registry, ProjectArgs};
use crate::pipeline::TriggerReport;

/// Output format of the trigger report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human readable list.
    #[default]
    Text,
    /// Machine readable YAML.
    Yaml,
}

/// Shows which pipelines the changed files trigger. Never writes output.
#[derive(Parser, Debug)]
pub struct ShowPipelinesCommand {
    /// Report format.
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,

    #[command(flatten)]
    pub project: ProjectArgs,
}

impl ShowPipelinesCommand {
    /// Builds the trigger report for the project.
    pub fn report(&self) -> Result<TriggerReport> {
        let config = self.project.load_config()?;
        let registry = load_registry(&self.project.project_root, &config)?;
        let changed = self.project.changed_files(&config)?;
        Ok(TriggerReport::build(&registry, &changed))
    }

    /// Renders the report in the selected format.
    pub fn render(&self, report: &TriggerReport) -> Result<String> {
        match self.format {
            ReportFormat::Text => Ok(report.render_text()),
            ReportFormat::Yaml => {
                serde_yaml::to_string(report).context("Failed to serialize trigger report")
            }
        }
    }

    /// Executes the show-pipelines command.
    pub fn execute(self) -> Result<()> {
        let report = self.report()?;
        print!("{}", self.render(&report)?);
        Ok(())
    }
}
