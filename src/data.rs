//! Data loading and serialization.

pub mod yaml;

pub use yaml::*;
