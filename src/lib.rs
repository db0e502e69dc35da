//! # pipegen
//!
//! Merges the CI entrypoints of many pipelines in one repository into a single
//! resolved CI configuration.
//!
//! ## Features
//!
//! - Change-based pipeline selection with include / all-except path triggers
//! - Local `include` expansion, including globs
//! - `extends` template resolution
//! - Per-pipeline job injection
//!
//! ## Quick Start
//!
//! ```rust
//! use pipegen::ci::{GeneratorOptions, PipelineGenerator};
//! use pipegen::pipeline::PipelinesRegistry;
//!
//! let registry = PipelinesRegistry::default();
//! let generator = PipelineGenerator::new(".", GeneratorOptions::default());
//! let selected: Vec<_> = registry.pipelines().iter().collect();
//! assert!(generator.generate(&selected).is_err());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod ci;
pub mod cli;
pub mod config;
pub mod data;
pub mod git;
pub mod pipeline;
pub mod utils;

pub use crate::cli::Cli;

/// The current version of pipegen.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
