//! Swarm coordination runtime.
//!
//! The runtime is a registry of per-swarm actors:
//!
//! - **actor**: the task that owns one swarm record and applies commands
//! - **run**: background optimization runs on the blocking pool
//!
//! Every public operation resolves the swarm's actor, sends it a command and
//! awaits the reply. Operations on an unknown id fail with `SwarmNotFound`.

mod actor;
pub(crate) mod run;

pub use actor::LeaderScorer;

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot, RwLock};
use uuid::Uuid;

use self::actor::{ActorContext, Reply, SwarmCommand};
use crate::domain::errors::{RuntimeError, RuntimeResult};
use crate::domain::models::{
    ProblemSpec, RuntimeConfig, Swarm, SwarmCheckpoint, SwarmSummary, SwarmTask,
};
use crate::domain::ports::CheckpointStore;
use crate::optimization::AlgorithmConfig;
use crate::services::event_bus::{EventBus, EventPayload};

/// Registry of live swarms.
pub struct SwarmRuntime {
    context: ActorContext,
    swarms: RwLock<HashMap<Uuid, mpsc::Sender<SwarmCommand>>>,
}

impl SwarmRuntime {
    pub fn new(
        config: RuntimeConfig,
        store: Arc<dyn CheckpointStore>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            context: ActorContext {
                config,
                store,
                events,
            },
            swarms: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.context.config
    }

    pub fn events(&self) -> Arc<EventBus> {
        self.context.events.clone()
    }

    pub fn store(&self) -> Arc<dyn CheckpointStore> {
        self.context.store.clone()
    }

    pub async fn contains(&self, swarm_id: Uuid) -> bool {
        self.swarms.read().await.contains_key(&swarm_id)
    }

    /// Create a swarm in the `Created` state. The algorithm configuration is
    /// validated against the problem before anything is registered.
    pub async fn create_swarm(
        &self,
        name: impl Into<String>,
        algorithm: AlgorithmConfig,
        problem: ProblemSpec,
    ) -> RuntimeResult<Uuid> {
        algorithm.validate_for(&problem)?;
        let swarm = Swarm::new(name, algorithm);
        let swarm_id = swarm.id;

        if self.context.config.auto_persist {
            self.context.store.save(&swarm.to_checkpoint()).await?;
        }
        tracing::info!(
            swarm_id = %swarm_id,
            name = %swarm.name,
            algorithm = swarm.algorithm.id(),
            "swarm created"
        );
        self.context.events.notify(
            swarm_id,
            Vec::new(),
            EventPayload::SwarmCreated {
                name: swarm.name.clone(),
                algorithm: swarm.algorithm.id().to_string(),
            },
        );
        self.install(swarm, problem).await;
        Ok(swarm_id)
    }

    async fn install(&self, swarm: Swarm, problem: ProblemSpec) {
        let swarm_id = swarm.id;
        let sender = actor::spawn(swarm, problem, self.context.clone());
        self.swarms.write().await.insert(swarm_id, sender);
    }

    async fn sender(&self, swarm_id: Uuid) -> RuntimeResult<mpsc::Sender<SwarmCommand>> {
        self.swarms
            .read()
            .await
            .get(&swarm_id)
            .cloned()
            .ok_or(RuntimeError::SwarmNotFound(swarm_id))
    }

    async fn request<T>(
        &self,
        swarm_id: Uuid,
        command: impl FnOnce(Reply<T>) -> SwarmCommand,
    ) -> RuntimeResult<T> {
        let sender = self.sender(swarm_id).await?;
        let (reply, response) = oneshot::channel();
        sender
            .send(command(reply))
            .await
            .map_err(|_| RuntimeError::ActorUnavailable(swarm_id))?;
        response
            .await
            .map_err(|_| RuntimeError::ActorUnavailable(swarm_id))?
    }

    /// Start (or restart) the background run. A no-op when already running.
    pub async fn start_swarm(&self, swarm_id: Uuid) -> RuntimeResult<()> {
        self.request(swarm_id, SwarmCommand::Start).await
    }

    /// Mark the swarm stopped and signal its run to exit. Idempotent.
    pub async fn stop_swarm(&self, swarm_id: Uuid) -> RuntimeResult<()> {
        self.request(swarm_id, SwarmCommand::Stop).await
    }

    pub async fn get_swarm_status(&self, swarm_id: Uuid) -> RuntimeResult<SwarmSummary> {
        self.request(swarm_id, SwarmCommand::Status).await
    }

    /// Status of every swarm, oldest first.
    pub async fn list_swarms(&self) -> Vec<SwarmSummary> {
        let ids: Vec<Uuid> = self.swarms.read().await.keys().copied().collect();
        let statuses =
            futures::future::join_all(ids.into_iter().map(|id| self.get_swarm_status(id))).await;
        let mut summaries: Vec<SwarmSummary> = statuses.into_iter().filter_map(Result::ok).collect();
        summaries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        summaries
    }

    /// Returns `true` if the agent was not already a member.
    pub async fn add_agent_to_swarm(
        &self,
        swarm_id: Uuid,
        agent_id: impl Into<String>,
    ) -> RuntimeResult<bool> {
        let agent_id = agent_id.into();
        self.request(swarm_id, |reply| SwarmCommand::AddAgent { agent_id, reply })
            .await
    }

    /// Returns `true` if the agent was a member. Removing the leader clears
    /// it and emits `LeaderNeeded`.
    pub async fn remove_agent_from_swarm(
        &self,
        swarm_id: Uuid,
        agent_id: impl Into<String>,
    ) -> RuntimeResult<bool> {
        let agent_id = agent_id.into();
        self.request(swarm_id, |reply| SwarmCommand::RemoveAgent { agent_id, reply })
            .await
    }

    /// The whole shared map as a JSON object, or one key's value (`null`
    /// when absent).
    pub async fn get_shared_state(
        &self,
        swarm_id: Uuid,
        key: Option<&str>,
    ) -> RuntimeResult<Value> {
        let key = key.map(str::to_string);
        self.request(swarm_id, |reply| SwarmCommand::GetSharedState { key, reply })
            .await
    }

    /// Set one key, returning its previous value.
    pub async fn update_shared_state(
        &self,
        swarm_id: Uuid,
        key: impl Into<String>,
        value: Value,
    ) -> RuntimeResult<Option<Value>> {
        let key = key.into();
        self.request(swarm_id, |reply| SwarmCommand::UpdateSharedState {
            key,
            value,
            reply,
        })
        .await
    }

    pub async fn allocate_task(
        &self,
        swarm_id: Uuid,
        task_id: Option<String>,
        payload: Value,
    ) -> RuntimeResult<SwarmTask> {
        self.request(swarm_id, |reply| SwarmCommand::AllocateTask {
            task_id,
            payload,
            reply,
        })
        .await
    }

    pub async fn claim_task(
        &self,
        swarm_id: Uuid,
        task_id: impl Into<String>,
        agent_id: impl Into<String>,
    ) -> RuntimeResult<SwarmTask> {
        let (task_id, agent_id) = (task_id.into(), agent_id.into());
        self.request(swarm_id, |reply| SwarmCommand::ClaimTask {
            task_id,
            agent_id,
            reply,
        })
        .await
    }

    pub async fn complete_task(
        &self,
        swarm_id: Uuid,
        task_id: impl Into<String>,
        agent_id: impl Into<String>,
        result: Value,
    ) -> RuntimeResult<SwarmTask> {
        let (task_id, agent_id) = (task_id.into(), agent_id.into());
        self.request(swarm_id, |reply| SwarmCommand::CompleteTask {
            task_id,
            agent_id,
            result,
            reply,
        })
        .await
    }

    /// Elect a leader among the members and store it under `leader`.
    pub async fn elect_leader(
        &self,
        swarm_id: Uuid,
        scorer: Option<LeaderScorer>,
    ) -> RuntimeResult<String> {
        self.request(swarm_id, |reply| SwarmCommand::ElectLeader { scorer, reply })
            .await
    }

    /// Point-in-time checkpoint record, taken inside the actor.
    pub async fn snapshot(&self, swarm_id: Uuid) -> RuntimeResult<SwarmCheckpoint> {
        self.request(swarm_id, SwarmCommand::Snapshot).await
    }

    /// Overwrite a live swarm's run state from a checkpoint.
    pub async fn apply_checkpoint(
        &self,
        swarm_id: Uuid,
        checkpoint: SwarmCheckpoint,
    ) -> RuntimeResult<()> {
        let checkpoint = Box::new(checkpoint);
        self.request(swarm_id, |reply| SwarmCommand::ApplyCheckpoint { checkpoint, reply })
            .await
    }

    /// Recreate a swarm from a checkpoint under the same id. If the swarm is
    /// still registered the checkpoint is applied to it instead.
    pub async fn restore_from_checkpoint(
        &self,
        checkpoint: SwarmCheckpoint,
        problem: ProblemSpec,
    ) -> RuntimeResult<Uuid> {
        let swarm_id = checkpoint.swarm_id;
        if self.contains(swarm_id).await {
            self.apply_checkpoint(swarm_id, checkpoint).await?;
            return Ok(swarm_id);
        }

        checkpoint.algorithm.validate_for(&problem)?;
        let swarm = Swarm::from_checkpoint(&checkpoint);
        tracing::info!(
            swarm_id = %swarm_id,
            checkpoint = %checkpoint.timestamp,
            "swarm restored from checkpoint"
        );
        self.context.events.notify(
            swarm_id,
            swarm.members.iter().cloned().collect(),
            EventPayload::SwarmRestored {
                checkpoint_timestamp: checkpoint.timestamp,
            },
        );
        self.install(swarm, problem).await;
        Ok(swarm_id)
    }

    /// Stop a swarm's actor and forget it. Checkpoints stay in the store.
    pub async fn delete_swarm(&self, swarm_id: Uuid) -> RuntimeResult<()> {
        let sender = self
            .swarms
            .write()
            .await
            .remove(&swarm_id)
            .ok_or(RuntimeError::SwarmNotFound(swarm_id))?;
        let (done, stopped) = oneshot::channel();
        if sender.send(SwarmCommand::Shutdown(done)).await.is_ok() {
            let _ = stopped.await;
        }
        tracing::info!(swarm_id = %swarm_id, "swarm deleted");
        self.context
            .events
            .notify(swarm_id, Vec::new(), EventPayload::SwarmDeleted);
        Ok(())
    }

    /// Stop every actor. Background runs are signalled to exit.
    pub async fn shutdown(&self) {
        let senders: Vec<_> = self.swarms.write().await.drain().collect();
        for (swarm_id, sender) in senders {
            let (done, stopped) = oneshot::channel();
            if sender.send(SwarmCommand::Shutdown(done)).await.is_ok() {
                let _ = stopped.await;
            }
            tracing::debug!(swarm_id = %swarm_id, "swarm actor shut down");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use serde_json::json;

    use crate::domain::models::{Direction, SwarmStatus, LEADER_KEY};
    use crate::infrastructure::checkpoint::InMemoryCheckpointStore;
    use crate::optimization::de::DeConfig;
    use crate::optimization::pso::PsoConfig;
    use crate::services::event_bus::SwarmNotification;

    fn sphere() -> ProblemSpec {
        ProblemSpec::uniform(2, -5.0, 5.0, Direction::Minimize, |x: &[f64]| {
            x.iter().map(|v| v * v).sum()
        })
        .unwrap()
    }

    fn de(max_iterations: usize) -> AlgorithmConfig {
        AlgorithmConfig::DifferentialEvolution(DeConfig {
            population_size: 10,
            max_iterations,
            seed: Some(1),
            ..DeConfig::default()
        })
    }

    fn runtime_with(config: RuntimeConfig) -> (SwarmRuntime, Arc<InMemoryCheckpointStore>) {
        let store = Arc::new(InMemoryCheckpointStore::new());
        let runtime = SwarmRuntime::new(config, store.clone(), Arc::new(EventBus::default()));
        (runtime, store)
    }

    fn runtime() -> (SwarmRuntime, Arc<InMemoryCheckpointStore>) {
        runtime_with(RuntimeConfig::default())
    }

    async fn wait_for_status(runtime: &SwarmRuntime, id: Uuid, status: SwarmStatus) -> SwarmSummary {
        tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                let summary = runtime.get_swarm_status(id).await.unwrap();
                if summary.status == status {
                    return summary;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("status not reached")
    }

    #[tokio::test]
    async fn test_create_swarm_starts_created() {
        let (runtime, store) = runtime();
        let id = runtime.create_swarm("alpha", de(10), sphere()).await.unwrap();
        let summary = runtime.get_swarm_status(id).await.unwrap();
        assert_eq!(summary.status, SwarmStatus::Created);
        assert_eq!(summary.algorithm, "differential_evolution");
        assert_eq!(summary.name, "alpha");
        assert!(store.latest(id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_create_swarm_rejects_invalid_config() {
        let (runtime, _) = runtime();
        let config = AlgorithmConfig::ParticleSwarm(PsoConfig {
            population_size: 1,
            ..PsoConfig::default()
        });
        let err = runtime.create_swarm("bad", config, sphere()).await.unwrap_err();
        assert!(matches!(err, RuntimeError::Config(_)));
        assert!(runtime.list_swarms().await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_swarm_is_not_found() {
        let (runtime, _) = runtime();
        let id = Uuid::new_v4();
        assert_eq!(
            runtime.start_swarm(id).await.unwrap_err(),
            RuntimeError::SwarmNotFound(id)
        );
        assert_eq!(
            runtime.claim_task(id, "t1", "a1").await.unwrap_err(),
            RuntimeError::SwarmNotFound(id)
        );
    }

    #[tokio::test]
    async fn test_run_completes_and_stops() {
        let (runtime, _) = runtime();
        let id = runtime.create_swarm("alpha", de(20), sphere()).await.unwrap();
        runtime.start_swarm(id).await.unwrap();

        let summary = wait_for_status(&runtime, id, SwarmStatus::Stopped).await;
        let last_run = summary.last_run.unwrap();
        assert!(last_run.success);
        assert_eq!(last_run.iterations, 20);
        let best = summary.best_known_solution.unwrap();
        assert_eq!(best.fitness, last_run.best_fitness);
        assert_eq!(summary.current_iteration, 20);
    }

    #[tokio::test]
    async fn test_start_is_noop_when_running_and_stop_is_idempotent() {
        let (runtime, _) = runtime_with(RuntimeConfig {
            iteration_pause_ms: 2,
            ..RuntimeConfig::default()
        });
        let id = runtime.create_swarm("alpha", de(100_000), sphere()).await.unwrap();
        runtime.start_swarm(id).await.unwrap();
        runtime.start_swarm(id).await.unwrap();
        assert_eq!(
            runtime.get_swarm_status(id).await.unwrap().status,
            SwarmStatus::Running
        );

        runtime.stop_swarm(id).await.unwrap();
        runtime.stop_swarm(id).await.unwrap();
        let summary = wait_for_status(&runtime, id, SwarmStatus::Stopped).await;
        assert!(summary.last_error.is_none());
    }

    #[tokio::test]
    async fn test_nan_objective_moves_swarm_to_error() {
        let (runtime, _) = runtime();
        let nan = ProblemSpec::uniform(2, -1.0, 1.0, Direction::Minimize, |_: &[f64]| f64::NAN)
            .unwrap();
        let id = runtime.create_swarm("nan", de(10), nan).await.unwrap();
        runtime.start_swarm(id).await.unwrap();
        let summary = wait_for_status(&runtime, id, SwarmStatus::Error).await;
        assert!(summary.last_error.unwrap().contains("NaN"));

        // Error -> Running is allowed; the run fails again
        runtime.start_swarm(id).await.unwrap();
        wait_for_status(&runtime, id, SwarmStatus::Error).await;
    }

    #[tokio::test]
    async fn test_panicking_objective_moves_swarm_to_error() {
        let (runtime, _) = runtime();
        let exploding =
            ProblemSpec::uniform(1, 0.0, 1.0, Direction::Minimize, |_: &[f64]| panic!("boom"))
                .unwrap();
        let id = runtime.create_swarm("boom", de(10), exploding).await.unwrap();
        runtime.start_swarm(id).await.unwrap();
        let summary = wait_for_status(&runtime, id, SwarmStatus::Error).await;
        assert!(summary.last_error.unwrap().contains("boom"));
    }

    #[tokio::test]
    async fn test_task_lifecycle_t1() {
        let (runtime, store) = runtime();
        let id = runtime.create_swarm("tasks", de(10), sphere()).await.unwrap();

        let task = runtime
            .allocate_task(id, Some("t1".to_string()), json!({"work": 1}))
            .await
            .unwrap();
        assert_eq!(task.id, "t1");
        assert!(matches!(
            runtime.allocate_task(id, Some("t1".to_string()), json!({})).await,
            Err(RuntimeError::DuplicateTask(_))
        ));

        let claimed = runtime.claim_task(id, "t1", "a1").await.unwrap();
        assert_eq!(claimed.claimed_by.as_deref(), Some("a1"));
        assert_eq!(
            runtime.claim_task(id, "t1", "a2").await.unwrap_err(),
            RuntimeError::TaskAlreadyClaimed {
                task_id: "t1".to_string(),
                claimed_by: "a1".to_string(),
            }
        );
        assert!(matches!(
            runtime.complete_task(id, "t1", "a2", json!("x")).await,
            Err(RuntimeError::TaskNotAssigned { .. })
        ));
        let done = runtime
            .complete_task(id, "t1", "a1", json!({"ok": true}))
            .await
            .unwrap();
        assert_eq!(done.result, Some(json!({"ok": true})));

        let summary = runtime.get_swarm_status(id).await.unwrap();
        assert_eq!(
            (summary.pending_tasks, summary.assigned_tasks, summary.completed_tasks),
            (0, 0, 1)
        );
        let persisted = store.latest(id).await.unwrap().unwrap();
        assert!(persisted.completed_tasks.contains_key("t1"));
    }

    #[tokio::test]
    async fn test_claim_unknown_task_is_not_found() {
        let (runtime, _) = runtime();
        let id = runtime.create_swarm("tasks", de(10), sphere()).await.unwrap();
        assert_eq!(
            runtime.claim_task(id, "missing", "a1").await.unwrap_err(),
            RuntimeError::TaskNotFound("missing".to_string())
        );
    }

    #[tokio::test]
    async fn test_concurrent_claims_have_one_winner() {
        let (runtime, _) = runtime();
        let runtime = Arc::new(runtime);
        let id = runtime.create_swarm("race", de(10), sphere()).await.unwrap();
        runtime
            .allocate_task(id, Some("t1".to_string()), json!(null))
            .await
            .unwrap();

        let claims = (0..8).map(|i| {
            let runtime = runtime.clone();
            async move { runtime.claim_task(id, "t1", format!("a{i}")).await }
        });
        let results = futures::future::join_all(claims).await;
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    }

    #[tokio::test]
    async fn test_leader_election_and_removal() {
        let (runtime, _) = runtime();
        let events = runtime.events();
        let id = runtime.create_swarm("lead", de(10), sphere()).await.unwrap();
        assert_eq!(
            runtime.elect_leader(id, None).await.unwrap_err(),
            RuntimeError::NoMembers(id)
        );

        for agent in ["a2", "a1", "a3"] {
            assert!(runtime.add_agent_to_swarm(id, agent).await.unwrap());
        }
        assert!(!runtime.add_agent_to_swarm(id, "a1").await.unwrap());

        assert_eq!(runtime.elect_leader(id, None).await.unwrap(), "a1");
        let scorer: LeaderScorer = Arc::new(|agent: &str| if agent == "a3" { 9.0 } else { 1.0 });
        assert_eq!(runtime.elect_leader(id, Some(scorer)).await.unwrap(), "a3");
        assert_eq!(
            runtime.get_shared_state(id, Some(LEADER_KEY)).await.unwrap(),
            json!("a3")
        );

        let mut rx = events.subscribe();
        assert!(runtime.remove_agent_from_swarm(id, "a3").await.unwrap());
        assert!(!runtime.remove_agent_from_swarm(id, "a3").await.unwrap());
        assert_eq!(
            runtime.get_shared_state(id, Some(LEADER_KEY)).await.unwrap(),
            Value::Null
        );

        let mut payloads = Vec::new();
        while let Ok(SwarmNotification { payload, .. }) = rx.try_recv() {
            payloads.push(payload);
        }
        assert!(payloads
            .iter()
            .any(|p| matches!(p, EventPayload::LeaderNeeded { previous } if previous == "a3")));
    }

    #[tokio::test]
    async fn test_shared_state_update_and_read() {
        let (runtime, _) = runtime();
        let id = runtime.create_swarm("state", de(10), sphere()).await.unwrap();
        assert_eq!(
            runtime.update_shared_state(id, "k", json!(1)).await.unwrap(),
            None
        );
        assert_eq!(
            runtime.update_shared_state(id, "k", json!(2)).await.unwrap(),
            Some(json!(1))
        );
        assert_eq!(
            runtime.get_shared_state(id, None).await.unwrap(),
            json!({"k": 2})
        );
        assert_eq!(
            runtime.get_shared_state(id, Some("other")).await.unwrap(),
            Value::Null
        );
    }

    #[tokio::test]
    async fn test_restore_after_delete_keeps_id_and_state() {
        let (runtime, store) = runtime();
        let id = runtime.create_swarm("phoenix", de(10), sphere()).await.unwrap();
        runtime.add_agent_to_swarm(id, "a1").await.unwrap();
        runtime
            .allocate_task(id, Some("t1".to_string()), json!({}))
            .await
            .unwrap();
        runtime.delete_swarm(id).await.unwrap();
        assert!(!runtime.contains(id).await);

        let checkpoint = store.latest(id).await.unwrap().unwrap();
        let restored = runtime
            .restore_from_checkpoint(checkpoint, sphere())
            .await
            .unwrap();
        assert_eq!(restored, id);
        let summary = runtime.get_swarm_status(id).await.unwrap();
        assert_eq!(summary.status, SwarmStatus::Created);
        assert_eq!(summary.members, vec!["a1".to_string()]);
        assert_eq!(summary.pending_tasks, 1);
    }

    #[tokio::test]
    async fn test_apply_checkpoint_rejects_foreign_swarm() {
        let (runtime, _) = runtime();
        let a = runtime.create_swarm("a", de(10), sphere()).await.unwrap();
        let b = runtime.create_swarm("b", de(10), sphere()).await.unwrap();
        let foreign = runtime.snapshot(b).await.unwrap();
        assert!(matches!(
            runtime.apply_checkpoint(a, foreign).await,
            Err(RuntimeError::Checkpoint(_))
        ));
    }

    #[tokio::test]
    async fn test_list_swarms_oldest_first() {
        let (runtime, _) = runtime_with(RuntimeConfig {
            auto_persist: false,
            ..RuntimeConfig::default()
        });
        let first = runtime.create_swarm("one", de(10), sphere()).await.unwrap();
        let second = runtime.create_swarm("two", de(10), sphere()).await.unwrap();
        let listed: Vec<Uuid> = runtime.list_swarms().await.iter().map(|s| s.id).collect();
        assert_eq!(listed.len(), 2);
        assert!(listed.contains(&first) && listed.contains(&second));
        runtime.shutdown().await;
        assert!(runtime.list_swarms().await.is_empty());
    }
}
