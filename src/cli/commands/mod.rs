//! CLI command implementations.

pub mod algorithms;
pub mod dispatch;
pub mod problems;
pub mod run;
