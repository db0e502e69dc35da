//! Pipeline declarations and the registry that holds them.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use crate::ci::{deep_merge, MergePolicy};

pub mod registry;
pub mod report;
pub mod trigger;

pub use registry::PipelinesRegistry;
pub use report::{PipelineStatus, TriggerReport};
pub use trigger::ChangeTrigger;

/// A declared pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pipeline {
    /// Unique name within the registry.
    pub name: String,
    /// CI entrypoint file, relative to the project root.
    pub entrypoint: Option<PathBuf>,
    /// Change triggers; empty means the pipeline always runs.
    pub triggers: Vec<ChangeTrigger>,
    /// Fragment injected into every job of the generated configuration.
    pub inject: Option<InjectionSpec>,
}

impl Pipeline {
    /// Creates a pipeline with no triggers and no injection.
    pub fn new(name: impl Into<String>, entrypoint: Option<PathBuf>) -> Self {
        Self {
            name: name.into(),
            entrypoint,
            triggers: Vec::new(),
            inject: None,
        }
    }

    /// Adds a trigger.
    #[must_use]
    pub fn with_trigger(mut self, trigger: ChangeTrigger) -> Self {
        self.triggers.push(trigger);
        self
    }

    /// Returns whether this pipeline should run for a set of changed files.
    ///
    /// A pipeline without triggers always runs. A pipeline with triggers
    /// never runs for an empty change set.
    pub fn should_trigger<S: AsRef<str>>(&self, changed_files: &[S]) -> bool {
        if self.triggers.is_empty() {
            return true;
        }

        changed_files.iter().any(|file| {
            self.triggers
                .iter()
                .any(|trigger| trigger.matches(file.as_ref()))
        })
    }

    /// Builds a pipeline from its on-disk declaration.
    pub(crate) fn from_definition(
        definition: PipelineDefinition,
        fallback_name: &str,
    ) -> Result<Self> {
        let name = definition.name.unwrap_or_else(|| fallback_name.to_string());

        let triggers = definition
            .on
            .into_iter()
            .map(OnBlock::into_trigger)
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("Invalid change pattern in pipeline '{name}'"))?;

        Ok(Self {
            entrypoint: definition.entrypoint.map(PathBuf::from),
            triggers,
            inject: definition.inject,
            name,
        })
    }
}

/// Fragment applied uniformly to every job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InjectionSpec {
    /// Commands prepended to each job's `before_script`.
    #[serde(default)]
    pub before_script: Vec<String>,
    /// Commands appended to each job's `after_script`.
    #[serde(default)]
    pub after_script: Vec<String>,
    /// Entries appended to each job's `needs` (names or `{job: ...}` maps).
    #[serde(default)]
    pub needs: Vec<Value>,
    /// Variables merged under each job's own `variables`.
    #[serde(default)]
    pub variables: Mapping,
    /// Runner tags appended to each job's `tags`.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl InjectionSpec {
    /// Returns whether applying this spec would change nothing.
    pub fn is_empty(&self) -> bool {
        self.before_script.is_empty()
            && self.after_script.is_empty()
            && self.needs.is_empty()
            && self.variables.is_empty()
            && self.tags.is_empty()
    }

    /// Folds another pipeline's spec into this aggregate.
    ///
    /// Lists concatenate in order; variables deep-merge with `other` winning.
    pub fn absorb(&mut self, other: &Self) {
        self.before_script.extend(other.before_script.iter().cloned());
        self.after_script.extend(other.after_script.iter().cloned());
        self.needs.extend(other.needs.iter().cloned());
        self.tags.extend(other.tags.iter().cloned());

        let base = Value::Mapping(std::mem::take(&mut self.variables));
        let overlay = Value::Mapping(other.variables.clone());
        // Override-allowed merges never fail.
        if let Ok(Value::Mapping(merged)) =
            deep_merge(base, overlay, MergePolicy::OverrideAllowed)
        {
            self.variables = merged;
        }
    }
}

/// One pipeline declaration as written on disk.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct PipelineDefinition {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub entrypoint: Option<String>,
    #[serde(default)]
    pub on: Vec<OnBlock>,
    #[serde(default)]
    pub inject: Option<InjectionSpec>,
}

/// One entry of a pipeline's `on` list.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct OnBlock {
    #[serde(default)]
    pub changes: Option<ChangesBlock>,
}

/// The `changes` filter, either a single map or a list of single-purpose maps.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ChangesBlock {
    List(Vec<ChangesSpec>),
    Single(ChangesSpec),
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ChangesSpec {
    #[serde(default)]
    pub include: OneOrMany,
    #[serde(default)]
    pub all_except: OneOrMany,
}

/// A pattern list that may be written as a bare string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl Default for OneOrMany {
    fn default() -> Self {
        Self::Many(Vec::new())
    }
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(s) => vec![s],
            Self::Many(v) => v,
        }
    }
}

impl OnBlock {
    fn into_trigger(self) -> Result<ChangeTrigger, regex::Error> {
        let specs = match self.changes {
            None => Vec::new(),
            Some(ChangesBlock::Single(spec)) => vec![spec],
            Some(ChangesBlock::List(specs)) => specs,
        };

        let mut include = Vec::new();
        let mut all_except = Vec::new();
        for spec in specs {
            include.extend(spec.include.into_vec());
            all_except.extend(spec.all_except.into_vec());
        }

        ChangeTrigger::new(include, all_except)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NONE: [&str; 0] = [];
    const NO_FILES: [&str; 0] = [];

    fn definition(yaml: &str) -> PipelineDefinition {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn untriggered_pipeline_always_runs() {
        let pipeline = Pipeline::new("main", None);
        assert!(pipeline.should_trigger(&NO_FILES));
        assert!(pipeline.should_trigger(&["x"]));
    }

    #[test]
    fn triggered_pipeline_never_runs_without_changes() {
        let pipeline = Pipeline::new("docs", None)
            .with_trigger(ChangeTrigger::new(["a/**/*"], NONE).unwrap());
        assert!(!pipeline.should_trigger(&NO_FILES));
        assert!(pipeline.should_trigger(&["a/b.txt"]));
        assert!(!pipeline.should_trigger(&["b/a.txt"]));
    }

    #[test]
    fn any_file_any_trigger() {
        let pipeline = Pipeline::new("multi", None)
            .with_trigger(ChangeTrigger::new(["a"], NONE).unwrap())
            .with_trigger(ChangeTrigger::new(["b"], NONE).unwrap());
        assert!(pipeline.should_trigger(&["c/x", "b/y"]));
        assert!(!pipeline.should_trigger(&["c/x", "d/y"]));
    }

    #[test]
    fn definition_with_list_changes() {
        let def = definition(
            r#"
entrypoint: ci/main.yml
on:
  - changes:
      - include: ["standalone-repo/shared/**/*"]
      - all_except: ["standalone-repo/**/*"]
"#,
        );
        let pipeline = Pipeline::from_definition(def, "main").unwrap();
        assert_eq!(pipeline.name, "main");
        assert_eq!(pipeline.entrypoint, Some(PathBuf::from("ci/main.yml")));
        assert_eq!(pipeline.triggers.len(), 1);
        assert_eq!(pipeline.triggers[0].include.len(), 1);
        assert_eq!(pipeline.triggers[0].all_except.len(), 1);
    }

    #[test]
    fn definition_with_map_changes_and_bare_string() {
        let def = definition(
            r"
name: docs
on:
  - changes:
      include: docs
",
        );
        let pipeline = Pipeline::from_definition(def, "ignored").unwrap();
        assert_eq!(pipeline.name, "docs");
        assert_eq!(pipeline.triggers[0].include[0].as_str(), "docs");
    }

    #[test]
    fn empty_changes_block_always_matches() {
        let def = definition("on:\n  - changes: {}\n");
        let pipeline = Pipeline::from_definition(def, "p").unwrap();
        assert_eq!(pipeline.triggers, vec![ChangeTrigger::default()]);
        assert!(pipeline.should_trigger(&["anything"]));
    }

    #[test]
    fn injection_defaults_and_absorb() {
        let mut aggregate = InjectionSpec::default();
        assert!(aggregate.is_empty());

        let first: InjectionSpec =
            serde_yaml::from_str("{ tags: [linux], variables: { A: '1', B: '1' } }").unwrap();
        let second: InjectionSpec =
            serde_yaml::from_str("{ tags: [docker], before_script: [setup], variables: { B: '2' } }")
                .unwrap();
        aggregate.absorb(&first);
        aggregate.absorb(&second);

        assert_eq!(aggregate.tags, vec!["linux", "docker"]);
        assert_eq!(aggregate.before_script, vec!["setup"]);
        let expected: Mapping = serde_yaml::from_str("{ A: '1', B: '2' }").unwrap();
        assert_eq!(aggregate.variables, expected);
        assert!(!aggregate.is_empty());
    }
}
