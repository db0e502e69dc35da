//! Template inheritance through `extends`.

use std::collections::HashMap;

use serde_yaml::{Mapping, Value};
use tracing::debug;

use crate::ci::{extends_merge, is_job_entry, take_key, CiError};

/// Per-run memoization and cycle detection state.
///
/// Created fresh for every [`ExtendsResolver::resolve`] call and threaded
/// through the recursion; nothing outlives the call.
#[derive(Debug, Default)]
pub struct ResolutionContext {
    resolved: HashMap<String, Mapping>,
    resolving: Vec<String>,
}

impl ResolutionContext {
    /// Returns whether `name` is on the current resolution chain.
    pub fn is_resolving(&self, name: &str) -> bool {
        self.resolving.iter().any(|n| n == name)
    }

    /// Returns the cached resolution of `name`, if any.
    pub fn cached(&self, name: &str) -> Option<&Mapping> {
        self.resolved.get(name)
    }
}

/// Resolves `extends` on every job and template of a configuration.
///
/// For `extends: [A, B]`, B's fields override A's and the job's own fields
/// override both. Mappings merge recursively; sequences and scalars are
/// replaced outright.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtendsResolver;

impl ExtendsResolver {
    /// Returns `content` with every `extends` folded into its job.
    ///
    /// Non-job keys pass through untouched and key order is preserved.
    pub fn resolve(content: Mapping) -> Result<Mapping, CiError> {
        let mut context = ResolutionContext::default();
        let mut output = Mapping::new();

        for (key, value) in &content {
            let resolved = match key.as_str() {
                Some(name) if is_job_entry(key, value) => {
                    Value::Mapping(Self::resolve_job(name, &content, &mut context)?)
                }
                _ => value.clone(),
            };
            output.insert(key.clone(), resolved);
        }

        Ok(output)
    }

    /// Resolves one job or template, memoized in `context`.
    ///
    /// The returned mapping is an independent copy of the cached value.
    pub fn resolve_job(
        name: &str,
        content: &Mapping,
        context: &mut ResolutionContext,
    ) -> Result<Mapping, CiError> {
        if let Some(cached) = context.cached(name) {
            return Ok(cached.clone());
        }
        if context.is_resolving(name) {
            return Err(CiError::CircularExtends {
                name: name.to_string(),
            });
        }

        let job = match content.get(name) {
            Some(Value::Mapping(job)) => job.clone(),
            _ => {
                return Err(CiError::UnknownTemplate {
                    name: name.to_string(),
                    job: context.resolving.last().cloned().unwrap_or_default(),
                })
            }
        };

        let (own, extends) = take_key(job, "extends");
        let resolved = match extends {
            None => own,
            Some(extends) => {
                let parents = template_names(&extends).ok_or_else(|| CiError::InvalidExtends {
                    job: name.to_string(),
                })?;

                context.resolving.push(name.to_string());
                let merged = Self::merge_parents(name, &parents, own, content, context);
                context.resolving.pop();
                merged?
            }
        };

        context.resolved.insert(name.to_string(), resolved.clone());
        Ok(resolved)
    }

    fn merge_parents(
        name: &str,
        parents: &[String],
        own: Mapping,
        content: &Mapping,
        context: &mut ResolutionContext,
    ) -> Result<Mapping, CiError> {
        let mut accumulated = Value::Mapping(Mapping::new());
        for parent in parents {
            let is_template = content
                .get(parent.as_str())
                .is_some_and(|value| is_job_entry(&Value::String(parent.clone()), value));
            if !is_template {
                return Err(CiError::UnknownTemplate {
                    name: parent.clone(),
                    job: name.to_string(),
                });
            }
            debug!("Resolving '{name}' extends '{parent}'");
            let template = Self::resolve_job(parent, content, context)?;
            accumulated = extends_merge(accumulated, Value::Mapping(template));
        }

        match extends_merge(accumulated, Value::Mapping(own)) {
            Value::Mapping(merged) => Ok(merged),
            _ => Ok(Mapping::new()),
        }
    }
}

/// Normalizes an `extends` value to a list of template names.
fn template_names(extends: &Value) -> Option<Vec<String>> {
    match extends {
        Value::String(name) => Some(vec![name.clone()]),
        Value::Sequence(names) => names
            .iter()
            .map(|n| n.as_str().map(String::from))
            .collect(),
        _ => None,
    }
}
