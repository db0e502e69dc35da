//! Dry-run trigger report.

use serde::Serialize;

use crate::pipeline::PipelinesRegistry;

/// Which pipelines would run for a change set, without generating anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TriggerReport {
    /// Changed files the report was computed for.
    pub changed_files: Vec<String>,
    /// Every registered pipeline, in registry order.
    pub pipelines: Vec<PipelineStatus>,
}

/// Trigger outcome for one pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineStatus {
    /// Pipeline name.
    pub name: String,
    /// Whether the pipeline would be part of the generated configuration.
    pub triggered: bool,
}

impl TriggerReport {
    /// Evaluates every pipeline in `registry` against `changed_files`.
    pub fn build(registry: &PipelinesRegistry, changed_files: &[String]) -> Self {
        let triggered: Vec<&str> = registry
            .get_triggered_pipelines(changed_files)
            .into_iter()
            .map(|p| p.name.as_str())
            .collect();

        let pipelines = registry
            .pipelines()
            .iter()
            .map(|p| PipelineStatus {
                name: p.name.clone(),
                triggered: triggered.contains(&p.name.as_str()),
            })
            .collect();

        Self {
            changed_files: changed_files.to_vec(),
            pipelines,
        }
    }

    /// Names of the pipelines that would run.
    pub fn triggered_names(&self) -> Vec<&str> {
        self.pipelines
            .iter()
            .filter(|p| p.triggered)
            .map(|p| p.name.as_str())
            .collect()
    }

    /// Renders the report for a terminal.
    pub fn render_text(&self) -> String {
        let mut out = String::new();

        if self.changed_files.is_empty() {
            out.push_str("Changed files: none (all pipelines selected)\n");
        } else {
            out.push_str(&format!(
                "Changed files ({}):\n",
                self.changed_files.len()
            ));
            for file in &self.changed_files {
                out.push_str(&format!("  {file}\n"));
            }
        }

        out.push('\n');
        out.push_str(&format!(
            "Pipelines ({} of {} triggered):\n",
            self.triggered_names().len(),
            self.pipelines.len()
        ));
        for status in &self.pipelines {
            let (mark, label) = if status.triggered {
                ("✓", "triggered")
            } else {
                ("✗", "skipped")
            };
            out.push_str(&format!("  {mark} {} ({label})\n", status.name));
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{ChangeTrigger, Pipeline};

    const NONE: [&str; 0] = [];

    fn registry() -> PipelinesRegistry {
        PipelinesRegistry::new(vec![
            Pipeline::new("main", None)
                .with_trigger(ChangeTrigger::new(NONE, ["standalone-repo/**/*"]).unwrap()),
            Pipeline::new("standalone-repo", None)
                .with_trigger(ChangeTrigger::new(["standalone-repo/**/*"], NONE).unwrap()),
        ])
        .unwrap()
    }

    #[test]
    fn report_marks_each_pipeline() {
        let report = TriggerReport::build(&registry(), &["pkg/main.go".to_string()]);
        assert_eq!(report.triggered_names(), vec!["main"]);
        assert!(!report.pipelines[1].triggered);
    }

    #[test]
    fn empty_change_set_selects_all() {
        let report = TriggerReport::build(&registry(), &[]);
        assert_eq!(report.triggered_names(), vec!["main", "standalone-repo"]);
        assert!(report
            .render_text()
            .starts_with("Changed files: none (all pipelines selected)"));
    }

    #[test]
    fn text_lists_files_and_marks() {
        let report = TriggerReport::build(&registry(), &["standalone-repo/a.go".to_string()]);
        let text = report.render_text();
        assert!(text.contains("Changed files (1):\n  standalone-repo/a.go\n"));
        assert!(text.contains("  ✗ main (skipped)\n"));
        assert!(text.contains("  ✓ standalone-repo (triggered)\n"));
        assert!(text.contains("Pipelines (1 of 2 triggered):"));
    }
}
