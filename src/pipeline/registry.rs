//! Loading and querying pipeline declarations.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::ci::CiError;
use crate::data::read_yaml_value;
use crate::pipeline::{Pipeline, PipelineDefinition};

/// Legacy single-file manifest.
#[derive(Debug, Default, Deserialize)]
struct Manifest {
    #[serde(default)]
    pipelines: Vec<PipelineDefinition>,
}

/// Ordered, read-only set of pipelines for one generation run.
#[derive(Debug, Clone, Default)]
pub struct PipelinesRegistry {
    pipelines: Vec<Pipeline>,
}

impl PipelinesRegistry {
    /// Creates a registry, rejecting duplicate names.
    pub fn new(pipelines: Vec<Pipeline>) -> Result<Self, CiError> {
        let mut seen = HashSet::new();
        for pipeline in &pipelines {
            if !seen.insert(pipeline.name.as_str()) {
                return Err(CiError::DuplicatePipeline {
                    name: pipeline.name.clone(),
                });
            }
        }
        Ok(Self { pipelines })
    }

    /// Loads one pipeline per YAML file in `dir`, in file name order.
    ///
    /// A missing directory yields an empty registry.
    pub fn load_from_folder<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            warn!("Pipelines directory not found: {}", dir.display());
            return Ok(Self::default());
        }

        let mut files: Vec<PathBuf> = fs::read_dir(dir)
            .with_context(|| format!("Failed to read pipelines directory: {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_yaml_file(path))
            .collect();
        files.sort();

        let mut pipelines = Vec::with_capacity(files.len());
        for file in files {
            let stem = file
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
            let value = read_yaml_value(&file)?;
            let definition = if value.is_null() {
                PipelineDefinition::default()
            } else {
                serde_yaml::from_value(value).with_context(|| {
                    format!("Failed to parse pipeline declaration: {}", file.display())
                })?
            };
            let pipeline = Pipeline::from_definition(definition, &stem)?;
            debug!("Loaded pipeline '{}' from {}", pipeline.name, file.display());
            pipelines.push(pipeline);
        }

        Ok(Self::new(pipelines)?)
    }

    /// Loads pipelines from a legacy manifest with a top-level `pipelines` list.
    ///
    /// A missing file yields an empty registry.
    pub fn load<P: AsRef<Path>>(manifest: P) -> Result<Self> {
        let manifest = manifest.as_ref();
        if !manifest.is_file() {
            warn!("Pipelines manifest not found: {}", manifest.display());
            return Ok(Self::default());
        }

        let value = read_yaml_value(manifest)?;
        let parsed: Manifest = if value.is_null() {
            Manifest::default()
        } else {
            serde_yaml::from_value(value).with_context(|| {
                format!("Failed to parse pipelines manifest: {}", manifest.display())
            })?
        };

        // Manifest entries without a name are numbered from 1.
        let pipelines = parsed
            .pipelines
            .into_iter()
            .enumerate()
            .map(|(index, definition)| {
                let fallback = format!("pipeline-{}", index + 1);
                Pipeline::from_definition(definition, &fallback)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::new(pipelines)?)
    }

    /// Loads from `dir` when it exists, otherwise from the legacy `manifest`.
    pub fn discover(dir: &Path, manifest: &Path) -> Result<Self> {
        if dir.is_dir() {
            Self::load_from_folder(dir)
        } else {
            debug!(
                "No pipelines directory at {}, falling back to manifest",
                dir.display()
            );
            Self::load(manifest)
        }
    }

    /// Returns every pipeline in registry order.
    pub fn pipelines(&self) -> &[Pipeline] {
        &self.pipelines
    }

    /// Returns every pipeline name in registry order.
    pub fn names(&self) -> Vec<&str> {
        self.pipelines.iter().map(|p| p.name.as_str()).collect()
    }

    /// Looks up a pipeline by name.
    pub fn get(&self, name: &str) -> Option<&Pipeline> {
        self.pipelines.iter().find(|p| p.name == name)
    }

    /// Returns whether the registry has no pipelines.
    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }

    /// Returns the named pipelines in the order requested.
    ///
    /// A name requested more than once is selected at its first position only.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<&Pipeline>, CiError> {
        let mut seen = HashSet::new();
        let mut selected = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            let pipeline = self.get(name).ok_or_else(|| CiError::UnknownPipeline {
                name: name.to_string(),
                valid: self.names().into_iter().map(String::from).collect(),
            })?;
            if seen.insert(name) {
                selected.push(pipeline);
            }
        }
        Ok(selected)
    }

    /// Returns the pipelines that should run for `changed_files`.
    ///
    /// With no changed files at all every pipeline is returned, whatever its
    /// own triggers say; this is the full-build fallback used when no diff
    /// is available.
    pub fn get_triggered_pipelines<S: AsRef<str>>(&self, changed_files: &[S]) -> Vec<&Pipeline> {
        if changed_files.is_empty() {
            return self.pipelines.iter().collect();
        }

        self.pipelines
            .iter()
            .filter(|p| p.should_trigger(changed_files))
            .collect()
    }
}

fn is_yaml_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yml" | "yaml")
    )
}
