//! Fatal resolution errors.

use thiserror::Error;

/// Errors that abort a generation run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CiError {
    /// Two pipelines define the same non-mergeable key under the strict policy.
    #[error("Conflicting definitions for key '{key}'")]
    ConflictingKey {
        /// Dotted path of the conflicting key.
        key: String,
    },

    /// An `extends` chain refers back to a job already being resolved.
    #[error("Circular extends detected at '{name}'")]
    CircularExtends {
        /// Job or template where the cycle closed.
        name: String,
    },

    /// A job extends a template that does not exist.
    #[error("Job '{job}' extends unknown template '{name}'")]
    UnknownTemplate {
        /// Missing template name.
        name: String,
        /// Job that referenced it.
        job: String,
    },

    /// An `extends` value is neither a name nor a list of names.
    #[error("Job '{job}' has an invalid extends value; expected a name or a list of names")]
    InvalidExtends {
        /// Offending job.
        job: String,
    },

    /// A local include refers back to a file already being included.
    #[error("Circular include detected at '{path}'")]
    CircularInclude {
        /// File where the cycle closed.
        path: String,
    },

    /// A requested pipeline is not registered.
    #[error("Pipeline '{name}' not found. Valid pipelines: {}", valid.join(", "))]
    UnknownPipeline {
        /// Requested name.
        name: String,
        /// Names known to the registry.
        valid: Vec<String>,
    },

    /// Two pipeline declarations share a name.
    #[error("Pipeline '{name}' is declared more than once")]
    DuplicatePipeline {
        /// Duplicated name.
        name: String,
    },

    /// Nothing was left to write after processing every selected pipeline.
    #[error("Generated configuration is empty; no selected pipeline contributed any content")]
    EmptyOutput,
}
