//! Infrastructure layer module
//!
//! This module contains the adapters behind the domain ports plus process
//! setup:
//! - Checkpoint stores (in-memory and JSON files)
//! - Agent directory (in-memory)
//! - Configuration management
//! - Logging infrastructure
//!
//! Infrastructure implementations satisfy the port traits defined in the domain layer.

pub mod agents;
pub mod checkpoint;
pub mod config;
pub mod logging;
