//! Common test utilities for integration tests
//!
//! Provides shared fixtures and helpers used across multiple integration
//! test files.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use metaswarm::domain::models::{RuntimeConfig, SwarmStatus, SwarmSummary};
use metaswarm::domain::ports::CheckpointStore;
use metaswarm::optimization::de::DeConfig;
use metaswarm::optimization::AlgorithmConfig;
use metaswarm::services::{EventBus, SwarmRuntime};
use uuid::Uuid;

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Runtime over the given store with default settings.
pub fn runtime(store: Arc<dyn CheckpointStore>) -> Arc<SwarmRuntime> {
    Arc::new(SwarmRuntime::new(
        RuntimeConfig::default(),
        store,
        Arc::new(EventBus::default()),
    ))
}

/// Small seeded DE configuration.
pub fn de(max_iterations: usize) -> AlgorithmConfig {
    AlgorithmConfig::DifferentialEvolution(DeConfig {
        population_size: 10,
        max_iterations,
        seed: Some(3),
        ..DeConfig::default()
    })
}

/// Poll until the swarm reaches `status`, failing after ten seconds.
pub async fn wait_for_status(
    runtime: &SwarmRuntime,
    swarm_id: Uuid,
    status: SwarmStatus,
) -> SwarmSummary {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let summary = runtime.get_swarm_status(swarm_id).await.unwrap();
            if summary.status == status {
                return summary;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("Timed out waiting for swarm status")
}
