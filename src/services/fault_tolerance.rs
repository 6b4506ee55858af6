//! Fault tolerance supervisor.
//!
//! Watches registered swarms: member liveness through the agent directory,
//! periodic checkpoints through the runtime's store, and recovery of failed
//! or missing swarms from their latest checkpoint.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::domain::errors::{RuntimeError, RuntimeResult};
use crate::domain::models::{FaultToleranceConfig, ProblemSpec, SwarmCheckpoint, SwarmStatus};
use crate::domain::ports::AgentDirectory;
use crate::services::event_bus::EventPayload;
use crate::services::swarm_runtime::SwarmRuntime;

/// Outcome of one health-check pass over a swarm's members.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub healthy: Vec<String>,
    /// Unhealthy members that stay for now, with their failure counts.
    pub recovering: Vec<(String, u32)>,
    pub evicted: Vec<String>,
}

/// What `recover_swarm` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    /// Recreated from the latest checkpoint.
    Restored,
    /// Stopped and started again after an error.
    Restarted,
    Started,
    /// Already running.
    None,
}

pub struct FaultToleranceSupervisor {
    runtime: Arc<SwarmRuntime>,
    directory: Arc<dyn AgentDirectory>,
    max_failures: u32,
    health_check_interval: Duration,
    checkpoint_interval: Duration,
    problems: RwLock<HashMap<Uuid, ProblemSpec>>,
    failures: Mutex<HashMap<Uuid, HashMap<String, u32>>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl FaultToleranceSupervisor {
    pub fn new(
        runtime: Arc<SwarmRuntime>,
        directory: Arc<dyn AgentDirectory>,
        config: &FaultToleranceConfig,
    ) -> Self {
        Self::with_intervals(
            runtime,
            directory,
            config.max_failures,
            Duration::from_secs(config.health_check_interval_secs.max(1)),
            Duration::from_secs(config.checkpoint_interval_secs.max(1)),
        )
    }

    pub fn with_intervals(
        runtime: Arc<SwarmRuntime>,
        directory: Arc<dyn AgentDirectory>,
        max_failures: u32,
        health_check_interval: Duration,
        checkpoint_interval: Duration,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            runtime,
            directory,
            max_failures,
            health_check_interval,
            checkpoint_interval,
            problems: RwLock::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
            shutdown_tx,
        }
    }

    /// Remember the problem a swarm runs against, for later restores.
    pub async fn register_problem(&self, swarm_id: Uuid, problem: ProblemSpec) {
        self.problems.write().await.insert(swarm_id, problem);
    }

    /// Register `problem` and start the background monitor for the swarm.
    ///
    /// The monitor runs health checks and checkpoints on their intervals
    /// until [`shutdown`](Self::shutdown) is called or the swarm disappears.
    pub async fn supervise(
        self: &Arc<Self>,
        swarm_id: Uuid,
        problem: ProblemSpec,
    ) -> JoinHandle<()> {
        self.register_problem(swarm_id, problem).await;
        self.start_monitoring(swarm_id, self.shutdown_tx.subscribe())
    }

    fn start_monitoring(
        self: &Arc<Self>,
        swarm_id: Uuid,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let supervisor = Arc::clone(self);

        tokio::spawn(async move {
            let mut health = tokio::time::interval(supervisor.health_check_interval);
            let mut checkpoints = tokio::time::interval(supervisor.checkpoint_interval);

            // Skip first ticks (fire immediately)
            health.tick().await;
            checkpoints.tick().await;

            tracing::info!(
                swarm_id = %swarm_id,
                health_check_interval_ms = supervisor.health_check_interval.as_millis() as u64,
                checkpoint_interval_ms = supervisor.checkpoint_interval.as_millis() as u64,
                max_failures = supervisor.max_failures,
                "Started supervising swarm"
            );

            loop {
                tokio::select! {
                    _ = health.tick() => {
                        match supervisor.check_health(swarm_id).await {
                            Ok(_) => {}
                            Err(RuntimeError::SwarmNotFound(_)) => {
                                tracing::info!(swarm_id = %swarm_id, "Swarm is gone, stopping supervision");
                                break;
                            }
                            Err(e) => {
                                tracing::warn!(swarm_id = %swarm_id, error = %e, "Health check pass failed");
                            }
                        }
                    }

                    _ = checkpoints.tick() => {
                        if let Err(e) = supervisor.checkpoint(swarm_id).await {
                            tracing::warn!(swarm_id = %swarm_id, error = %e, "Periodic checkpoint failed");
                        }
                    }

                    _ = shutdown_rx.recv() => {
                        tracing::info!(swarm_id = %swarm_id, "Received shutdown signal, stopping supervision");
                        break;
                    }
                }
            }

            tracing::info!(swarm_id = %swarm_id, "Supervision stopped");
        })
    }

    /// Signal every monitor to stop.
    pub fn shutdown(&self) {
        // no receivers means no monitors
        let _ = self.shutdown_tx.send(());
    }

    /// Current consecutive failure count of an agent.
    pub async fn failure_count(&self, swarm_id: Uuid, agent_id: &str) -> u32 {
        self.failures
            .lock()
            .await
            .get(&swarm_id)
            .and_then(|agents| agents.get(agent_id))
            .copied()
            .unwrap_or(0)
    }

    /// One health-check pass over every member of a swarm.
    ///
    /// Absent or failed agents count as unhealthy. An agent whose
    /// consecutive failures exceed `max_failures` is removed from the swarm.
    pub async fn check_health(&self, swarm_id: Uuid) -> RuntimeResult<HealthReport> {
        let members = self.runtime.get_swarm_status(swarm_id).await?.members;
        let lookups = members.iter().map(|agent_id| async move {
            let healthy = self
                .directory
                .get_agent(agent_id)
                .await
                .is_some_and(|info| info.status.is_healthy());
            (agent_id.clone(), healthy)
        });
        let checks = futures::future::join_all(lookups).await;

        let mut report = HealthReport::default();
        let mut to_evict = Vec::new();
        {
            let mut failures = self.failures.lock().await;
            let counters = failures.entry(swarm_id).or_default();
            counters.retain(|agent_id, _| members.contains(agent_id));

            for (agent_id, healthy) in checks {
                if healthy {
                    if counters.remove(&agent_id).is_some() {
                        tracing::info!(swarm_id = %swarm_id, agent_id = %agent_id, "Agent recovered");
                    }
                    report.healthy.push(agent_id);
                    continue;
                }

                let count = counters.entry(agent_id.clone()).or_insert(0);
                *count += 1;
                let consecutive_failures = *count;
                if consecutive_failures > self.max_failures {
                    counters.remove(&agent_id);
                    to_evict.push((agent_id, consecutive_failures));
                } else {
                    tracing::warn!(
                        swarm_id = %swarm_id,
                        agent_id = %agent_id,
                        consecutive_failures,
                        max_failures = self.max_failures,
                        "Agent health check failed, attempting recovery"
                    );
                    self.runtime.events().notify(
                        swarm_id,
                        vec![agent_id.clone()],
                        EventPayload::RecoveryAttempted {
                            agent_id: agent_id.clone(),
                            consecutive_failures,
                        },
                    );
                    report.recovering.push((agent_id, consecutive_failures));
                }
            }
        }

        for (agent_id, consecutive_failures) in to_evict {
            tracing::error!(
                swarm_id = %swarm_id,
                agent_id = %agent_id,
                consecutive_failures,
                "Max health check failures exceeded, evicting agent"
            );
            self.runtime
                .remove_agent_from_swarm(swarm_id, agent_id.clone())
                .await?;
            self.runtime.events().notify(
                swarm_id,
                members.clone(),
                EventPayload::AgentEvicted {
                    agent_id: agent_id.clone(),
                    consecutive_failures,
                },
            );
            report.evicted.push(agent_id);
        }

        Ok(report)
    }

    /// Snapshot a swarm and save it to the store.
    pub async fn checkpoint(&self, swarm_id: Uuid) -> RuntimeResult<SwarmCheckpoint> {
        let checkpoint = self.runtime.snapshot(swarm_id).await?;
        self.runtime.store().save(&checkpoint).await?;
        tracing::debug!(
            swarm_id = %swarm_id,
            timestamp = %checkpoint.timestamp,
            "Checkpoint saved"
        );
        self.runtime.events().notify(
            swarm_id,
            Vec::new(),
            EventPayload::CheckpointSaved {
                checkpoint_timestamp: checkpoint.timestamp,
            },
        );
        Ok(checkpoint)
    }

    /// Bring a swarm back to a running state.
    ///
    /// A missing swarm is recreated from its latest checkpoint; an errored
    /// swarm is stopped and started; a running swarm is left alone; anything
    /// else is started.
    pub async fn recover_swarm(&self, swarm_id: Uuid) -> RuntimeResult<RecoveryAction> {
        let status = match self.runtime.get_swarm_status(swarm_id).await {
            Ok(summary) => summary.status,
            Err(RuntimeError::SwarmNotFound(_)) => {
                self.restore_swarm(swarm_id, None).await?;
                tracing::info!(swarm_id = %swarm_id, "Recovered missing swarm from checkpoint");
                return Ok(RecoveryAction::Restored);
            }
            Err(e) => return Err(e),
        };

        let action = match status {
            SwarmStatus::Running => RecoveryAction::None,
            SwarmStatus::Error => {
                self.runtime.stop_swarm(swarm_id).await?;
                self.runtime.start_swarm(swarm_id).await?;
                RecoveryAction::Restarted
            }
            SwarmStatus::Created | SwarmStatus::Stopped => {
                self.runtime.start_swarm(swarm_id).await?;
                RecoveryAction::Started
            }
        };
        tracing::info!(swarm_id = %swarm_id, ?action, "Swarm recovery handled");
        Ok(action)
    }

    /// Restore a swarm from the checkpoint at `timestamp`, or its latest.
    ///
    /// A live swarm has its run state overwritten; a missing one is recreated
    /// with the problem captured at registration.
    pub async fn restore_swarm(
        &self,
        swarm_id: Uuid,
        timestamp: Option<DateTime<Utc>>,
    ) -> RuntimeResult<SwarmCheckpoint> {
        let store = self.runtime.store();
        let checkpoint = match timestamp {
            Some(ts) => store.get(swarm_id, ts).await?,
            None => store.latest(swarm_id).await?,
        }
        .ok_or(RuntimeError::CheckpointNotFound(swarm_id))?;

        if self.runtime.contains(swarm_id).await {
            self.runtime
                .apply_checkpoint(swarm_id, checkpoint.clone())
                .await?;
        } else {
            let problem = self
                .problems
                .read()
                .await
                .get(&swarm_id)
                .cloned()
                .ok_or(RuntimeError::ProblemNotRegistered(swarm_id))?;
            self.runtime
                .restore_from_checkpoint(checkpoint.clone(), problem)
                .await?;
        }
        Ok(checkpoint)
    }
}
