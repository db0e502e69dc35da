//! Injection of shared fragments into every job.

use serde_yaml::{Mapping, Value};

use crate::ci::{deep_merge, is_hidden, is_job_entry, MergePolicy};
use crate::pipeline::InjectionSpec;

/// Applies an [`InjectionSpec`] to each job of a configuration.
///
/// Per job: `before_script` is prepended, `after_script`, `needs` and `tags`
/// are appended (needs already on the job are not repeated), and `variables`
/// are merged underneath the job's own. Hidden templates (`.name`) are left
/// alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct JobInjector;

impl JobInjector {
    /// Returns `content` with `injection` applied to every job.
    pub fn apply(content: Mapping, injection: &InjectionSpec) -> Mapping {
        if injection.is_empty() {
            return content;
        }

        content
            .into_iter()
            .map(|(key, value)| {
                let is_job = is_job_entry(&key, &value)
                    && key.as_str().is_some_and(|name| !is_hidden(name));
                match value {
                    Value::Mapping(job) if is_job => {
                        (key, Value::Mapping(Self::apply_to_job(job, injection)))
                    }
                    other => (key, other),
                }
            })
            .collect()
    }

    fn apply_to_job(mut job: Mapping, injection: &InjectionSpec) -> Mapping {
        if !injection.before_script.is_empty() {
            let mut scripts = strings(&injection.before_script);
            scripts.extend(take_list(&mut job, "before_script"));
            set(&mut job, "before_script", Value::Sequence(scripts));
        }

        if !injection.after_script.is_empty() {
            let mut scripts = take_list(&mut job, "after_script");
            scripts.extend(strings(&injection.after_script));
            set(&mut job, "after_script", Value::Sequence(scripts));
        }

        if !injection.needs.is_empty() {
            let mut needs = take_list(&mut job, "needs");
            append_missing(&mut needs, injection.needs.iter().cloned());
            set(&mut job, "needs", Value::Sequence(needs));
        }

        if !injection.variables.is_empty() {
            let own = job
                .get("variables")
                .cloned()
                .unwrap_or_else(|| Value::Mapping(Mapping::new()));
            let base = Value::Mapping(injection.variables.clone());
            // Override-allowed merges never fail; the job's own values win.
            if let Ok(merged) = deep_merge(base, own, MergePolicy::OverrideAllowed) {
                set(&mut job, "variables", merged);
            }
        }

        if !injection.tags.is_empty() {
            let mut tags = take_list(&mut job, "tags");
            tags.extend(strings(&injection.tags));
            set(&mut job, "tags", Value::Sequence(tags));
        }

        job
    }
}

fn strings(items: &[String]) -> Vec<Value> {
    items.iter().cloned().map(Value::String).collect()
}

/// Reads a list-valued field, treating a lone scalar as a one-element list.
fn take_list(job: &mut Mapping, key: &str) -> Vec<Value> {
    match job.get_mut(key).map(|v| std::mem::replace(v, Value::Null)) {
        Some(Value::Sequence(items)) => items,
        Some(Value::Null) | None => Vec::new(),
        Some(single) => vec![single],
    }
}

/// Sets a field in place when present, appending it otherwise.
fn set(job: &mut Mapping, key: &str, value: Value) {
    match job.get_mut(key) {
        Some(slot) => *slot = value,
        None => {
            job.insert(Value::String(key.to_string()), value);
        }
    }
}

fn append_missing(target: &mut Vec<Value>, items: impl IntoIterator<Item = Value>) {
    for item in items {
        if !target.contains(&item) {
            target.push(item);
        }
    }
}
