//! Pipeline listing command.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use crate::cli::load_registry;
use crate::config::ProjectConfig;
use crate::pipeline::PipelinesRegistry;

/// Lists registered pipelines with their entrypoints.
#[derive(Parser, Debug)]
pub struct ListCommand {
    /// Project root containing the pipeline declarations.
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub project_root: PathBuf,
}

impl ListCommand {
    /// Executes the list command.
    pub fn execute(self) -> Result<()> {
        let config = ProjectConfig::load(&self.project_root)?;
        let registry = load_registry(&self.project_root, &config)?;
        print!("{}", render_list(&registry));
        Ok(())
    }
}

/// Renders one line per pipeline.
pub fn render_list(registry: &PipelinesRegistry) -> String {
    if registry.is_empty() {
        return "No pipelines registered.\n".to_string();
    }

    let width = registry.names().iter().map(|n| n.len()).max().unwrap_or(0);
    let mut out = String::new();
    for pipeline in registry.pipelines() {
        let entrypoint = pipeline
            .entrypoint
            .as_ref()
            .map_or_else(|| "(no entrypoint)".to_string(), |p| p.display().to_string());
        let triggers = match pipeline.triggers.len() {
            0 => "always".to_string(),
            1 => "1 trigger".to_string(),
            n => format!("{n} triggers"),
        };
        out.push_str(&format!(
            "{:<width$}  {entrypoint}  ({triggers})\n",
            pipeline.name
        ));
    }
    out
}
