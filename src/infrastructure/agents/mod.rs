//! Agent directory implementations.

pub mod memory;

pub use memory::InMemoryAgentDirectory;
