//! Merges selected pipelines into one resolved configuration.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde_yaml::{Mapping, Value};
use tracing::{debug, info, warn};

use crate::ci::{
    deep_merge, take_key, CiError, ExtendsResolver, IncludeResolver, JobInjector, MergePolicy,
};
use crate::data::parse_yaml_value;
use crate::pipeline::{InjectionSpec, Pipeline};

/// Switches controlling a generation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratorOptions {
    /// Inline local `include` directives of each entrypoint.
    pub resolve_includes: bool,
    /// Fold `extends` into each job after merging.
    pub resolve_extends: bool,
    /// Policy for combining entrypoints of different pipelines.
    pub merge_policy: MergePolicy,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            resolve_includes: true,
            resolve_extends: true,
            merge_policy: MergePolicy::OverrideAllowed,
        }
    }
}

/// Result of a generation run.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedConfig {
    /// Names of the pipelines that contributed content, in merge order.
    pub pipelines: Vec<String>,
    /// The merged, resolved configuration.
    pub content: Mapping,
}

impl GeneratedConfig {
    /// Returns the configuration as a YAML value.
    pub fn to_value(&self) -> Value {
        Value::Mapping(self.content.clone())
    }
}

/// Orchestrates loading, include expansion, merging, extends resolution
/// and job injection.
#[derive(Debug, Clone)]
pub struct PipelineGenerator {
    project_root: PathBuf,
    options: GeneratorOptions,
}

/// Accumulated state while merging pipelines.
#[derive(Debug, Default)]
struct MergeState {
    stages: Vec<Value>,
    variables: Value,
    merged: Value,
    injection: InjectionSpec,
    contributors: Vec<String>,
}

impl PipelineGenerator {
    /// Creates a generator for a project.
    pub fn new(project_root: impl Into<PathBuf>, options: GeneratorOptions) -> Self {
        Self {
            project_root: project_root.into(),
            options,
        }
    }

    /// Merges the entrypoints of `pipelines`, in order, into one configuration.
    pub fn generate(&self, pipelines: &[&Pipeline]) -> Result<GeneratedConfig> {
        let mut state = MergeState {
            variables: Value::Mapping(Mapping::new()),
            merged: Value::Mapping(Mapping::new()),
            ..MergeState::default()
        };

        for pipeline in pipelines {
            let Some(content) = self.load_entrypoint(pipeline)? else {
                continue;
            };
            self.merge_pipeline(&mut state, pipeline, content)
                .with_context(|| format!("Failed to merge pipeline '{}'", pipeline.name))?;
        }

        let mut content = Mapping::new();
        if !state.stages.is_empty() {
            content.insert("stages".into(), Value::Sequence(state.stages));
        }
        if let Value::Mapping(variables) = state.variables {
            if !variables.is_empty() {
                content.insert("variables".into(), Value::Mapping(variables));
            }
        }
        if let Value::Mapping(merged) = state.merged {
            content.extend(merged);
        }

        if self.options.resolve_extends {
            content = ExtendsResolver::resolve(content)?;
        }
        if !state.injection.is_empty() {
            content = JobInjector::apply(content, &state.injection);
        }

        if content.is_empty() {
            return Err(CiError::EmptyOutput.into());
        }

        info!(
            "Generated configuration from {} pipeline(s): {}",
            state.contributors.len(),
            state.contributors.join(", ")
        );

        Ok(GeneratedConfig {
            pipelines: state.contributors,
            content,
        })
    }

    /// Loads and include-expands a pipeline's entrypoint.
    ///
    /// Returns `None`, with a warning, when the pipeline has nothing to
    /// contribute.
    fn load_entrypoint(&self, pipeline: &Pipeline) -> Result<Option<Mapping>> {
        let Some(entrypoint) = &pipeline.entrypoint else {
            warn!("Pipeline '{}' has no entrypoint, skipping", pipeline.name);
            return Ok(None);
        };

        let path = self.project_root.join(entrypoint);
        if !path.is_file() {
            warn!(
                "Entrypoint for pipeline '{}' not found: {}",
                pipeline.name,
                path.display()
            );
            return Ok(None);
        }

        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) => {
                warn!(
                    "Entrypoint for pipeline '{}' is unreadable ({err}): {}",
                    pipeline.name,
                    path.display()
                );
                return Ok(None);
            }
        };

        let parsed = parse_yaml_value(&text)
            .with_context(|| format!("Failed to parse entrypoint: {}", path.display()))?;
        let content = match parsed {
            Value::Mapping(map) if !map.is_empty() => map,
            Value::Mapping(_) | Value::Null => {
                warn!(
                    "Entrypoint for pipeline '{}' is empty: {}",
                    pipeline.name,
                    path.display()
                );
                return Ok(None);
            }
            _ => anyhow::bail!(
                "Entrypoint for pipeline '{}' must be a mapping: {}",
                pipeline.name,
                path.display()
            ),
        };

        if !self.options.resolve_includes {
            return Ok(Some(content));
        }

        let base_dir = path.parent().unwrap_or(self.project_root.as_path());
        let resolved = IncludeResolver::new(&self.project_root)
            .resolve(content, base_dir)
            .with_context(|| format!("Failed to resolve includes for '{}'", pipeline.name))?;
        if resolved.is_empty() {
            warn!(
                "Entrypoint for pipeline '{}' is empty after resolving includes: {}",
                pipeline.name,
                path.display()
            );
            return Ok(None);
        }
        Ok(Some(resolved))
    }

    fn merge_pipeline(
        &self,
        state: &mut MergeState,
        pipeline: &Pipeline,
        content: Mapping,
    ) -> Result<()> {
        debug!("Merging pipeline '{}'", pipeline.name);

        let (content, stages) = take_key(content, "stages");
        let (content, variables) = take_key(content, "variables");

        if let Some(Value::Sequence(stages)) = stages {
            for stage in stages {
                if !state.stages.contains(&stage) {
                    state.stages.push(stage);
                }
            }
        }

        match variables {
            Some(variables @ Value::Mapping(_)) => {
                let current = std::mem::replace(&mut state.variables, Value::Null);
                state.variables = deep_merge(current, variables, MergePolicy::OverrideAllowed)?;
            }
            Some(Value::Null) | None => {}
            Some(_) => warn!(
                "Ignoring non-mapping 'variables' in pipeline '{}'",
                pipeline.name
            ),
        }

        let current = std::mem::replace(&mut state.merged, Value::Null);
        state.merged = deep_merge(current, Value::Mapping(content), self.options.merge_policy)?;

        if let Some(inject) = &pipeline.inject {
            state.injection.absorb(inject);
        }
        state.contributors.push(pipeline.name.clone());

        Ok(())
    }
}
