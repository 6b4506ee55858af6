//! Swarm runtime scenarios across the public API.

mod common;

use std::sync::Arc;

use metaswarm::domain::models::{SwarmStatus, LEADER_KEY};
use metaswarm::domain::ports::CheckpointStore;
use metaswarm::infrastructure::checkpoint::{FileCheckpointStore, InMemoryCheckpointStore};
use metaswarm::optimization::problems::ProblemRequest;
use metaswarm::services::EventPayload;
use metaswarm::RuntimeError;
use serde_json::json;
use tokio_test::{assert_err, assert_ok};

use common::{de, runtime, setup_test_logging, wait_for_status};

#[tokio::test]
async fn test_t1_claim_and_complete_is_persisted() {
    setup_test_logging();
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileCheckpointStore::new(dir.path()));
    let runtime = runtime(store.clone());
    let problem = ProblemRequest::new("sphere", 2).build().unwrap();
    let id = runtime.create_swarm("tasks", de(10), problem).await.unwrap();

    runtime.add_agent_to_swarm(id, "a1").await.unwrap();
    let task = runtime
        .allocate_task(id, Some("t1".to_string()), json!({"work": "x"}))
        .await
        .unwrap();
    assert_eq!(task.id, "t1");

    let claimed = assert_ok!(runtime.claim_task(id, "t1", "a1").await);
    assert_eq!(claimed.claimed_by.as_deref(), Some("a1"));
    assert!(matches!(
        runtime.claim_task(id, "t1", "a2").await,
        Err(RuntimeError::TaskAlreadyClaimed { .. })
    ));
    let err = assert_err!(runtime.complete_task(id, "t1", "a2", json!(null)).await);
    assert!(matches!(err, RuntimeError::TaskNotAssigned { .. }));
    let done = assert_ok!(runtime.complete_task(id, "t1", "a1", json!({"ok": true})).await);
    assert_eq!(done.result, Some(json!({"ok": true})));

    let latest = store.latest(id).await.unwrap().unwrap();
    assert!(latest.completed_tasks.contains_key("t1"));
    assert!(latest.pending_tasks.is_empty());
    assert!(latest.assigned_tasks.is_empty());
}

#[tokio::test]
async fn test_run_publishes_progress_and_completion() {
    let runtime = runtime(Arc::new(InMemoryCheckpointStore::new()));
    let mut events = runtime.events().subscribe();
    let problem = ProblemRequest::new("sphere", 3).build().unwrap();
    let id = runtime.create_swarm("runner", de(20), problem).await.unwrap();
    runtime.add_agent_to_swarm(id, "watcher").await.unwrap();

    runtime.start_swarm(id).await.unwrap();
    let summary = wait_for_status(&runtime, id, SwarmStatus::Stopped).await;
    assert_eq!(summary.current_iteration, 20);
    let best = summary.best_known_solution.unwrap();
    assert_eq!(best.position.len(), 3);
    assert!(summary.last_run.unwrap().success);

    let mut rounds = 0;
    let mut completed = false;
    while let Ok(event) = events.try_recv() {
        match event.payload {
            EventPayload::RoundUpdate { .. } => {
                assert!(event.is_addressed_to("watcher"));
                rounds += 1;
            }
            EventPayload::RunCompleted { .. } => completed = true,
            _ => {}
        }
    }
    assert_eq!(rounds, 20);
    assert!(completed);
}

#[tokio::test]
async fn test_file_checkpoint_round_trip_into_fresh_runtime() {
    let dir = tempfile::tempdir().unwrap();
    let problem = ProblemRequest::new("rastrigin", 2).build().unwrap();

    let first = runtime(Arc::new(FileCheckpointStore::new(dir.path())));
    let id = first.create_swarm("durable", de(5), problem.clone()).await.unwrap();
    for agent in ["b", "a"] {
        first.add_agent_to_swarm(id, agent).await.unwrap();
    }
    first.elect_leader(id, None).await.unwrap();
    first.update_shared_state(id, "phase", json!(2)).await.unwrap();
    first.allocate_task(id, Some("p".to_string()), json!(1)).await.unwrap();
    first.allocate_task(id, Some("q".to_string()), json!(2)).await.unwrap();
    first.claim_task(id, "q", "a").await.unwrap();
    let before = first.snapshot(id).await.unwrap();
    first.shutdown().await;

    let store = Arc::new(FileCheckpointStore::new(dir.path()));
    let second = runtime(store.clone());
    let checkpoint = store.latest(id).await.unwrap().unwrap();
    assert_eq!(second.restore_from_checkpoint(checkpoint, problem).await.unwrap(), id);

    let after = second.snapshot(id).await.unwrap();
    assert_eq!(after.members, before.members);
    assert_eq!(after.shared_state, before.shared_state);
    assert_eq!(after.pending_tasks, before.pending_tasks);
    assert_eq!(after.assigned_tasks, before.assigned_tasks);
    assert_eq!(after.algorithm, before.algorithm);

    let state = second.get_shared_state(id, Some(LEADER_KEY)).await.unwrap();
    assert_eq!(state, json!("a"));
}

#[tokio::test]
async fn test_stop_interrupts_long_run() {
    let runtime = runtime(Arc::new(InMemoryCheckpointStore::new()));
    let problem = ProblemRequest::new("ackley", 4).build().unwrap();
    let id = runtime.create_swarm("long", de(1_000_000), problem).await.unwrap();

    assert_ok!(runtime.start_swarm(id).await);
    assert_ok!(runtime.stop_swarm(id).await);
    let summary = wait_for_status(&runtime, id, SwarmStatus::Stopped).await;
    assert!(summary.current_iteration < 1_000_000);

    // restart after stop
    runtime.start_swarm(id).await.unwrap();
    assert_eq!(
        runtime.get_swarm_status(id).await.unwrap().status,
        SwarmStatus::Running
    );
    runtime.stop_swarm(id).await.unwrap();
}
