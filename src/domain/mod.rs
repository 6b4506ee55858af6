//! Domain layer for metaswarm
//!
//! This module contains core data models, error types and the port traits
//! infrastructure adapters implement.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{ConfigError, OptimizationError, RuntimeError, RuntimeResult};
