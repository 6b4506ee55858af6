//! Checkpoint store implementations.
//!
//! - `InMemoryCheckpointStore`: process-local, for tests and ephemeral runs
//! - `FileCheckpointStore`: one JSON file per checkpoint under a directory

pub mod file;
pub mod memory;

pub use file::FileCheckpointStore;
pub use memory::InMemoryCheckpointStore;
