//! CI configuration resolution engine.
//!
//! Every algorithm in this module works on [`serde_yaml::Value`] trees:
//! `Mapping` (insertion ordered, unique keys), `Sequence`, or a scalar.

use serde_yaml::{Mapping, Value};

pub mod error;
pub mod extends;
pub mod generator;
pub mod include;
pub mod inject;
pub mod merge;
pub mod pattern;

pub use error::CiError;
pub use extends::{ExtendsResolver, ResolutionContext};
pub use generator::{GeneratedConfig, GeneratorOptions, PipelineGenerator};
pub use include::IncludeResolver;
pub use inject::JobInjector;
pub use merge::{deep_merge, extends_merge, MergePolicy};
pub use pattern::{has_glob_chars, matches, PathPattern};

/// Top-level keys that configure the pipeline as a whole rather than a job.
///
/// Any other top-level key whose value is a mapping is treated as a job or
/// a template.
pub const RESERVED_KEYS: &[&str] = &[
    "stages",
    "variables",
    "default",
    "workflow",
    "include",
    "image",
    "services",
    "cache",
    "before_script",
    "after_script",
];

/// Returns whether a top-level entry is a job or template definition.
pub fn is_job_entry(key: &Value, value: &Value) -> bool {
    match key.as_str() {
        Some(name) => value.is_mapping() && !RESERVED_KEYS.contains(&name),
        None => false,
    }
}

/// Returns whether a job name denotes a hidden template (`.name`).
pub fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// Splits `key` out of a mapping, preserving the order of the remaining keys.
pub fn take_key(map: Mapping, key: &str) -> (Mapping, Option<Value>) {
    let mut taken = None;
    let rest = map
        .into_iter()
        .filter_map(|(k, v)| {
            if k.as_str() == Some(key) {
                taken = Some(v);
                None
            } else {
                Some((k, v))
            }
        })
        .collect();
    (rest, taken)
}

/// Renders a mapping key for messages.
pub(crate) fn key_label(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Null => "~".to_string(),
        other => format!("{other:?}"),
    }
}
