//! Per-swarm actor.
//!
//! One tokio task owns each swarm record. Commands arrive over an mpsc
//! channel and are answered through oneshot replies, so every mutation of a
//! swarm is serialized here.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use super::run::{self, ActiveRun, RunMessage, RunOutcome};
use crate::domain::errors::{RuntimeError, RuntimeResult};
use crate::domain::models::{
    ProblemSpec, RunSummary, RuntimeConfig, Swarm, SwarmCheckpoint, SwarmStatus, SwarmSummary,
    SwarmTask, TerminationReason, LEADER_KEY,
};
use crate::domain::ports::CheckpointStore;
use crate::services::event_bus::{EventBus, EventPayload};

/// Scores an agent for leader election; highest wins.
pub type LeaderScorer = Arc<dyn Fn(&str) -> f64 + Send + Sync>;

pub(crate) type Reply<T> = oneshot::Sender<RuntimeResult<T>>;

pub(crate) enum SwarmCommand {
    Start(Reply<()>),
    Stop(Reply<()>),
    Status(Reply<SwarmSummary>),
    AddAgent {
        agent_id: String,
        reply: Reply<bool>,
    },
    RemoveAgent {
        agent_id: String,
        reply: Reply<bool>,
    },
    GetSharedState {
        key: Option<String>,
        reply: Reply<Value>,
    },
    UpdateSharedState {
        key: String,
        value: Value,
        reply: Reply<Option<Value>>,
    },
    AllocateTask {
        task_id: Option<String>,
        payload: Value,
        reply: Reply<SwarmTask>,
    },
    ClaimTask {
        task_id: String,
        agent_id: String,
        reply: Reply<SwarmTask>,
    },
    CompleteTask {
        task_id: String,
        agent_id: String,
        result: Value,
        reply: Reply<SwarmTask>,
    },
    ElectLeader {
        scorer: Option<LeaderScorer>,
        reply: Reply<String>,
    },
    Snapshot(Reply<SwarmCheckpoint>),
    ApplyCheckpoint {
        checkpoint: Box<SwarmCheckpoint>,
        reply: Reply<()>,
    },
    Shutdown(oneshot::Sender<()>),
}

/// Collaborators shared by every actor of one runtime.
#[derive(Clone)]
pub(crate) struct ActorContext {
    pub config: RuntimeConfig,
    pub store: Arc<dyn CheckpointStore>,
    pub events: Arc<EventBus>,
}

pub(crate) struct SwarmActor {
    swarm: Swarm,
    problem: ProblemSpec,
    context: ActorContext,
    run: Option<ActiveRun>,
    generation: u64,
    run_tx: mpsc::Sender<RunMessage>,
}

/// Spawn the actor for `swarm` and return its command sender.
pub(crate) fn spawn(
    swarm: Swarm,
    problem: ProblemSpec,
    context: ActorContext,
) -> mpsc::Sender<SwarmCommand> {
    let buffer = context.config.command_buffer.max(1);
    let (command_tx, command_rx) = mpsc::channel(buffer);
    let (run_tx, run_rx) = mpsc::channel(buffer);
    let actor = SwarmActor {
        swarm,
        problem,
        context,
        run: None,
        generation: 0,
        run_tx,
    };
    tokio::spawn(actor.run(command_rx, run_rx));
    command_tx
}

impl SwarmActor {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<SwarmCommand>,
        mut runs: mpsc::Receiver<RunMessage>,
    ) {
        tracing::debug!(swarm_id = %self.swarm.id, "swarm actor started");
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(SwarmCommand::Shutdown(done)) => {
                        self.halt_run();
                        let _ = done.send(());
                        break;
                    }
                    Some(command) => self.handle(command).await,
                    None => {
                        self.halt_run();
                        break;
                    }
                },
                Some(message) = runs.recv() => self.handle_run_message(message).await,
            }
        }
        tracing::debug!(swarm_id = %self.swarm.id, "swarm actor stopped");
    }

    async fn handle(&mut self, command: SwarmCommand) {
        match command {
            SwarmCommand::Start(reply) => {
                let result = self.start();
                self.reply_persisted(reply, result).await;
            }
            SwarmCommand::Stop(reply) => {
                let result = self.stop();
                self.reply_persisted(reply, result).await;
            }
            SwarmCommand::Status(reply) => {
                let _ = reply.send(Ok(self.swarm.summary()));
            }
            SwarmCommand::AddAgent { agent_id, reply } => {
                let result = Ok(self.add_agent(agent_id));
                self.reply_persisted(reply, result).await;
            }
            SwarmCommand::RemoveAgent { agent_id, reply } => {
                let result = Ok(self.remove_agent(&agent_id));
                self.reply_persisted(reply, result).await;
            }
            SwarmCommand::GetSharedState { key, reply } => {
                let _ = reply.send(Ok(self.shared_state(key.as_deref())));
            }
            SwarmCommand::UpdateSharedState { key, value, reply } => {
                let result = Ok(self.update_shared_state(key, value));
                self.reply_persisted(reply, result).await;
            }
            SwarmCommand::AllocateTask {
                task_id,
                payload,
                reply,
            } => {
                let result = self.swarm.allocate_task(task_id, payload);
                if let Ok(task) = &result {
                    self.notify(EventPayload::TaskAllocated {
                        task_id: task.id.clone(),
                    });
                }
                self.reply_persisted(reply, result).await;
            }
            SwarmCommand::ClaimTask {
                task_id,
                agent_id,
                reply,
            } => {
                let result = self.swarm.claim_task(&task_id, &agent_id);
                if result.is_ok() {
                    self.notify(EventPayload::TaskClaimed { task_id, agent_id });
                }
                self.reply_persisted(reply, result).await;
            }
            SwarmCommand::CompleteTask {
                task_id,
                agent_id,
                result,
                reply,
            } => {
                let result = self.swarm.complete_task(&task_id, &agent_id, result);
                if result.is_ok() {
                    self.notify(EventPayload::TaskCompleted { task_id, agent_id });
                }
                self.reply_persisted(reply, result).await;
            }
            SwarmCommand::ElectLeader { scorer, reply } => {
                let result = self.elect_leader(scorer.as_deref());
                self.reply_persisted(reply, result).await;
            }
            SwarmCommand::Snapshot(reply) => {
                let _ = reply.send(Ok(self.swarm.to_checkpoint()));
            }
            SwarmCommand::ApplyCheckpoint { checkpoint, reply } => {
                let result = self.apply_checkpoint(&checkpoint);
                self.reply_persisted(reply, result).await;
            }
            SwarmCommand::Shutdown(done) => {
                // handled by the loop
                let _ = done.send(());
            }
        }
    }

    fn start(&mut self) -> RuntimeResult<()> {
        if self.swarm.status == SwarmStatus::Running {
            return Ok(());
        }
        let strategy = self.swarm.algorithm.build()?;
        self.swarm.transition_to(SwarmStatus::Running)?;
        self.swarm.last_error = None;

        self.generation += 1;
        self.run = Some(run::launch(
            strategy,
            self.problem.clone(),
            self.generation,
            Duration::from_millis(self.context.config.iteration_pause_ms),
            self.run_tx.clone(),
        ));

        tracing::info!(
            swarm_id = %self.swarm.id,
            algorithm = self.swarm.algorithm.id(),
            generation = self.generation,
            "swarm started"
        );
        self.notify(EventPayload::SwarmStarted);
        Ok(())
    }

    fn stop(&mut self) -> RuntimeResult<()> {
        self.halt_run();
        if self.swarm.status == SwarmStatus::Stopped {
            return Ok(());
        }
        self.swarm.transition_to(SwarmStatus::Stopped)?;
        tracing::info!(swarm_id = %self.swarm.id, "swarm stopped");
        self.notify(EventPayload::SwarmStopped);
        Ok(())
    }

    fn halt_run(&self) {
        if let Some(run) = &self.run {
            run.halt();
        }
    }

    fn add_agent(&mut self, agent_id: String) -> bool {
        let added = self.swarm.add_member(agent_id.clone());
        if added {
            tracing::debug!(swarm_id = %self.swarm.id, agent_id = %agent_id, "agent joined");
            self.notify(EventPayload::AgentJoined { agent_id });
        }
        added
    }

    fn remove_agent(&mut self, agent_id: &str) -> bool {
        let removal = self.swarm.remove_member(agent_id);
        if removal.removed {
            tracing::debug!(swarm_id = %self.swarm.id, agent_id, "agent left");
            self.notify(EventPayload::AgentLeft {
                agent_id: agent_id.to_string(),
            });
        }
        if removal.leader_cleared {
            tracing::info!(swarm_id = %self.swarm.id, previous = agent_id, "leader removed");
            self.notify(EventPayload::LeaderNeeded {
                previous: agent_id.to_string(),
            });
        }
        removal.removed
    }

    fn shared_state(&self, key: Option<&str>) -> Value {
        match key {
            Some(key) => self.swarm.shared_state.get(key).cloned().unwrap_or(Value::Null),
            None => Value::Object(
                self.swarm
                    .shared_state
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            ),
        }
    }

    fn update_shared_state(&mut self, key: String, value: Value) -> Option<Value> {
        let previous = self.swarm.set_shared(key.clone(), value.clone());
        self.notify(EventPayload::SharedStateChanged { key, value });
        previous
    }

    fn elect_leader(
        &mut self,
        scorer: Option<&(dyn Fn(&str) -> f64 + Send + Sync)>,
    ) -> RuntimeResult<String> {
        let leader = pick_leader(self.swarm.members.iter().map(String::as_str), scorer)
            .ok_or(RuntimeError::NoMembers(self.swarm.id))?;
        self.swarm.set_shared(LEADER_KEY, Value::String(leader.clone()));
        tracing::info!(swarm_id = %self.swarm.id, leader = %leader, "leader elected");
        self.notify(EventPayload::LeaderElected {
            leader: leader.clone(),
        });
        Ok(leader)
    }

    fn apply_checkpoint(&mut self, checkpoint: &SwarmCheckpoint) -> RuntimeResult<()> {
        if checkpoint.swarm_id != self.swarm.id {
            return Err(RuntimeError::Checkpoint(format!(
                "checkpoint belongs to swarm {}, not {}",
                checkpoint.swarm_id, self.swarm.id
            )));
        }
        self.swarm.apply_checkpoint(checkpoint);
        tracing::info!(
            swarm_id = %self.swarm.id,
            checkpoint = %checkpoint.timestamp,
            "checkpoint applied"
        );
        self.notify(EventPayload::SwarmRestored {
            checkpoint_timestamp: checkpoint.timestamp,
        });
        Ok(())
    }

    async fn handle_run_message(&mut self, message: RunMessage) {
        match message {
            RunMessage::Progress {
                generation,
                iteration,
                position,
                fitness,
            } => {
                if generation != self.generation {
                    tracing::trace!(swarm_id = %self.swarm.id, generation, "stale progress ignored");
                    return;
                }
                let direction = self.problem.primary_direction();
                self.swarm.record_progress(iteration, &position, fitness, direction);
                self.notify(EventPayload::RoundUpdate {
                    iteration,
                    best_fitness: fitness,
                    best_position: position,
                });
            }
            RunMessage::Finished {
                generation,
                outcome,
            } => {
                if generation != self.generation {
                    tracing::debug!(swarm_id = %self.swarm.id, generation, "stale run finished");
                    return;
                }
                self.run = None;
                self.finish_run(outcome);
                self.persist().await;
            }
        }
    }

    fn finish_run(&mut self, outcome: RunOutcome) {
        let result = match outcome {
            RunOutcome::Completed(result) => result,
            RunOutcome::Panicked(message) => {
                self.fail(message);
                return;
            }
        };

        if !result.best_position.is_empty() && result.best_fitness.is_finite() {
            let direction = self.problem.primary_direction();
            self.swarm.record_progress(
                result.iterations,
                &result.best_position,
                result.best_fitness,
                direction,
            );
        }
        let summary = RunSummary::from(&result);
        self.swarm.last_run = Some(summary.clone());

        if result.termination == TerminationReason::NumericalError {
            self.fail(result.message);
            return;
        }

        tracing::info!(
            swarm_id = %self.swarm.id,
            termination = result.termination.as_str(),
            iterations = result.iterations,
            evaluations = result.evaluations,
            best_fitness = result.best_fitness,
            "run finished"
        );
        if self.swarm.status == SwarmStatus::Running
            && self.swarm.transition_to(SwarmStatus::Stopped).is_ok()
        {
            self.notify(EventPayload::SwarmStopped);
        }
        self.notify(EventPayload::RunCompleted { summary });
    }

    fn fail(&mut self, error: String) {
        tracing::error!(swarm_id = %self.swarm.id, error = %error, "swarm run failed");
        if self.swarm.status == SwarmStatus::Running {
            let _ = self.swarm.transition_to(SwarmStatus::Error);
        }
        self.swarm.last_error = Some(error.clone());
        self.notify(EventPayload::SwarmFailed { error });
    }

    fn notify(&self, payload: EventPayload) {
        let recipients = self.swarm.members.iter().cloned().collect();
        self.context.events.notify(self.swarm.id, recipients, payload);
    }

    /// Reply after persisting a successful mutation.
    async fn reply_persisted<T>(&self, reply: Reply<T>, result: RuntimeResult<T>) {
        if result.is_ok() {
            self.persist().await;
        }
        let _ = reply.send(result);
    }

    async fn persist(&self) {
        if !self.context.config.auto_persist {
            return;
        }
        let checkpoint = self.swarm.to_checkpoint();
        if let Err(e) = self.context.store.save(&checkpoint).await {
            tracing::warn!(swarm_id = %self.swarm.id, error = %e, "failed to persist checkpoint");
        }
    }
}

/// Highest score wins, ties go to the earliest member. Without a scorer, or
/// when no score is comparable, the first member wins. `members` must be in
/// sorted order.
pub(crate) fn pick_leader<'a>(
    members: impl IntoIterator<Item = &'a str>,
    scorer: Option<&(dyn Fn(&str) -> f64 + Send + Sync)>,
) -> Option<String> {
    let members: Vec<&str> = members.into_iter().collect();
    let first = *members.first()?;
    let Some(scorer) = scorer else {
        return Some(first.to_string());
    };
    let mut best: Option<(&str, f64)> = None;
    for member in members {
        let score = scorer(member);
        if score.is_nan() {
            continue;
        }
        if best.is_none_or(|(_, top)| score > top) {
            best = Some((member, score));
        }
    }
    Some(best.map_or(first, |(member, _)| member).to_string())
}
