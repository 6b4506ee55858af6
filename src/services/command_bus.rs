//! Command dispatcher for the `{command, params, id}` request envelope.
//!
//! External callers (the CLI `dispatch` subcommand, agents speaking JSON)
//! submit a [`CommandRequest`]. The dispatcher parses it into a typed
//! [`SwarmRequest`], wraps it in a [`CommandEnvelope`], checks the
//! authorizer for agent-initiated commands and routes it to the runtime.
//! Every outcome, including parse and runtime failures, comes back as a
//! [`CommandResponse`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::errors::{ConfigError, RuntimeError};
use crate::domain::ports::Authorizer;
use crate::optimization::problems::ProblemRequest;
use crate::optimization::{list_algorithms, AlgorithmConfig};
use crate::services::fault_tolerance::FaultToleranceSupervisor;
use crate::services::swarm_runtime::{LeaderScorer, SwarmRuntime};

/// Unique identifier for a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandId(pub Uuid);

impl CommandId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CommandId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a command originated from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandSource {
    /// CLI user.
    Human,
    /// Internal system (supervisor, tests).
    System,
    /// Request read from a stream, labelled by the stream.
    Remote(String),
}

impl fmt::Display for CommandSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Human => write!(f, "human"),
            Self::System => write!(f, "system"),
            Self::Remote(name) => write!(f, "remote:{name}"),
        }
    }
}

/// Envelope wrapping a command with metadata.
#[derive(Debug, Clone)]
pub struct CommandEnvelope<C> {
    pub id: CommandId,
    pub timestamp: DateTime<Utc>,
    /// The caller's request id, echoed in the response.
    pub correlation_id: Option<Value>,
    pub source: CommandSource,
    pub command: C,
}

impl<C> CommandEnvelope<C> {
    pub fn new(source: CommandSource, command: C) -> Self {
        Self {
            id: CommandId::new(),
            timestamp: Utc::now(),
            correlation_id: None,
            source,
            command,
        }
    }

    pub fn with_correlation(mut self, id: Value) -> Self {
        self.correlation_id = Some(id);
        self
    }
}

/// Wire request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRequest {
    pub command: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
}

impl CommandRequest {
    pub fn new(command: impl Into<String>, params: Value) -> Self {
        Self {
            command: command.into(),
            params,
            id: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<Value>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Wire response. Exactly one of `result` and `error` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub id: Option<Value>,
}

impl CommandResponse {
    pub fn ok(result: Value, id: Option<Value>) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn err(error: impl fmt::Display, id: Option<Value>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.to_string()),
            id,
        }
    }
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Invalid params for {command}: {reason}")]
    InvalidParams { command: String, reason: String },

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Typed commands
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSwarmParams {
    pub name: String,
    /// An algorithm id, or a tagged configuration object. Defaults to the
    /// hybrid DE/PSO.
    #[serde(default)]
    pub algorithm: Option<Value>,
    pub problem: ProblemRequest,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SwarmRef {
    pub swarm_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentRef {
    pub swarm_id: Uuid,
    pub agent_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AllocateTaskParams {
    pub swarm_id: Uuid,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaskRef {
    pub swarm_id: Uuid,
    pub task_id: String,
    pub agent_id: String,
    /// Only read by `completeTask`.
    #[serde(default)]
    pub result: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetSharedStateParams {
    pub swarm_id: Uuid,
    #[serde(default)]
    pub key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateSharedStateParams {
    pub swarm_id: Uuid,
    pub key: String,
    pub value: Value,
    #[serde(default)]
    pub agent_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ElectLeaderParams {
    pub swarm_id: Uuid,
    /// Scores by agent id; unscored members rank last.
    #[serde(default)]
    pub scores: Option<HashMap<String, f64>>,
}

/// Every command the dispatcher understands.
#[derive(Debug, Clone)]
pub enum SwarmRequest {
    CreateSwarm(CreateSwarmParams),
    StartSwarm(SwarmRef),
    StopSwarm(SwarmRef),
    GetSwarmStatus(SwarmRef),
    AddAgentToSwarm(AgentRef),
    RemoveAgentFromSwarm(AgentRef),
    AllocateTask(AllocateTaskParams),
    ClaimTask(TaskRef),
    CompleteTask(TaskRef),
    GetSharedState(GetSharedStateParams),
    UpdateSharedState(UpdateSharedStateParams),
    ElectLeader(ElectLeaderParams),
    ListSwarms,
    ListAlgorithms,
}

/// Command names in the order they are documented.
pub const COMMANDS: &[&str] = &[
    "createSwarm",
    "startSwarm",
    "stopSwarm",
    "getSwarmStatus",
    "addAgentToSwarm",
    "removeAgentFromSwarm",
    "allocateTask",
    "claimTask",
    "completeTask",
    "getSharedState",
    "updateSharedState",
    "electLeader",
    "listSwarms",
    "list_algorithms",
];

fn params<T: DeserializeOwned>(command: &str, params: Value) -> Result<T, CommandError> {
    let params = if params.is_null() { json!({}) } else { params };
    serde_json::from_value(params).map_err(|e| CommandError::InvalidParams {
        command: command.to_string(),
        reason: e.to_string(),
    })
}

impl SwarmRequest {
    pub fn parse(command: &str, raw: Value) -> Result<Self, CommandError> {
        let request = match command {
            "createSwarm" => Self::CreateSwarm(params(command, raw)?),
            "startSwarm" => Self::StartSwarm(params(command, raw)?),
            "stopSwarm" => Self::StopSwarm(params(command, raw)?),
            "getSwarmStatus" => Self::GetSwarmStatus(params(command, raw)?),
            "addAgentToSwarm" => Self::AddAgentToSwarm(params(command, raw)?),
            "removeAgentFromSwarm" => Self::RemoveAgentFromSwarm(params(command, raw)?),
            "allocateTask" => Self::AllocateTask(params(command, raw)?),
            "claimTask" => Self::ClaimTask(params(command, raw)?),
            "completeTask" => Self::CompleteTask(params(command, raw)?),
            "getSharedState" => Self::GetSharedState(params(command, raw)?),
            "updateSharedState" => Self::UpdateSharedState(params(command, raw)?),
            "electLeader" => Self::ElectLeader(params(command, raw)?),
            "listSwarms" => Self::ListSwarms,
            "list_algorithms" => Self::ListAlgorithms,
            other => return Err(CommandError::UnknownCommand(other.to_string())),
        };
        Ok(request)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateSwarm(_) => "createSwarm",
            Self::StartSwarm(_) => "startSwarm",
            Self::StopSwarm(_) => "stopSwarm",
            Self::GetSwarmStatus(_) => "getSwarmStatus",
            Self::AddAgentToSwarm(_) => "addAgentToSwarm",
            Self::RemoveAgentFromSwarm(_) => "removeAgentFromSwarm",
            Self::AllocateTask(_) => "allocateTask",
            Self::ClaimTask(_) => "claimTask",
            Self::CompleteTask(_) => "completeTask",
            Self::GetSharedState(_) => "getSharedState",
            Self::UpdateSharedState(_) => "updateSharedState",
            Self::ElectLeader(_) => "electLeader",
            Self::ListSwarms => "listSwarms",
            Self::ListAlgorithms => "list_algorithms",
        }
    }

    /// The acting agent, for commands that carry one.
    pub fn agent_id(&self) -> Option<&str> {
        match self {
            Self::AddAgentToSwarm(p) | Self::RemoveAgentFromSwarm(p) => Some(&p.agent_id),
            Self::ClaimTask(p) | Self::CompleteTask(p) => Some(&p.agent_id),
            Self::UpdateSharedState(p) => p.agent_id.as_deref(),
            _ => None,
        }
    }
}

fn resolve_algorithm(value: Option<Value>) -> Result<AlgorithmConfig, CommandError> {
    match value {
        None | Some(Value::Null) => Ok(AlgorithmConfig::default()),
        Some(Value::String(id)) => AlgorithmConfig::default_for(&id).ok_or_else(|| {
            CommandError::InvalidParams {
                command: "createSwarm".to_string(),
                reason: format!("unknown algorithm {id}"),
            }
        }),
        Some(config) => {
            serde_json::from_value(config).map_err(|e| CommandError::InvalidParams {
                command: "createSwarm".to_string(),
                reason: e.to_string(),
            })
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, CommandError> {
    serde_json::to_value(value).map_err(|e| CommandError::Runtime(e.into()))
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Routes requests to the swarm runtime.
pub struct CommandDispatcher {
    runtime: Arc<SwarmRuntime>,
    authorizer: Option<Arc<dyn Authorizer>>,
    supervisor: Option<Arc<FaultToleranceSupervisor>>,
}

impl CommandDispatcher {
    pub fn new(runtime: Arc<SwarmRuntime>) -> Self {
        Self {
            runtime,
            authorizer: None,
            supervisor: None,
        }
    }

    pub fn with_authorizer(mut self, authorizer: Arc<dyn Authorizer>) -> Self {
        self.authorizer = Some(authorizer);
        self
    }

    /// Swarms created through the dispatcher are supervised.
    pub fn with_supervisor(mut self, supervisor: Arc<FaultToleranceSupervisor>) -> Self {
        self.supervisor = Some(supervisor);
        self
    }

    pub fn runtime(&self) -> &Arc<SwarmRuntime> {
        &self.runtime
    }

    /// Handle one wire request. Never fails; errors become envelopes.
    pub async fn handle(&self, request: CommandRequest, source: CommandSource) -> CommandResponse {
        let CommandRequest {
            command,
            params,
            id,
        } = request;
        let parsed = match SwarmRequest::parse(&command, params) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::debug!(command = %command, error = %e, "Rejected request");
                return CommandResponse::err(e, id);
            }
        };

        let mut envelope = CommandEnvelope::new(source, parsed);
        if let Some(id) = id.clone() {
            envelope = envelope.with_correlation(id);
        }
        match self.dispatch(envelope).await {
            Ok(result) => CommandResponse::ok(result, id),
            Err(e) => CommandResponse::err(e, id),
        }
    }

    /// Execute a typed command.
    pub async fn dispatch(
        &self,
        envelope: CommandEnvelope<SwarmRequest>,
    ) -> Result<Value, CommandError> {
        tracing::debug!(
            command_id = %envelope.id,
            source = %envelope.source,
            command = envelope.command.name(),
            "Dispatching command"
        );

        if let (Some(authorizer), Some(agent_id)) =
            (&self.authorizer, envelope.command.agent_id())
        {
            let action = envelope.command.name();
            if !authorizer.authorize(agent_id, action).await {
                tracing::warn!(agent_id = %agent_id, action, "Command not authorized");
                return Err(RuntimeError::Unauthorized {
                    agent_id: agent_id.to_string(),
                    action: action.to_string(),
                }
                .into());
            }
        }

        let runtime = &self.runtime;
        let result = match envelope.command {
            SwarmRequest::CreateSwarm(p) => {
                let algorithm = resolve_algorithm(p.algorithm)?;
                let problem = p.problem.build()?;
                let swarm_id = runtime
                    .create_swarm(p.name, algorithm, problem.clone())
                    .await?;
                if let Some(supervisor) = &self.supervisor {
                    supervisor.supervise(swarm_id, problem).await;
                }
                json!({ "swarm_id": swarm_id })
            }
            SwarmRequest::StartSwarm(p) => {
                runtime.start_swarm(p.swarm_id).await?;
                to_json(&runtime.get_swarm_status(p.swarm_id).await?)?
            }
            SwarmRequest::StopSwarm(p) => {
                runtime.stop_swarm(p.swarm_id).await?;
                to_json(&runtime.get_swarm_status(p.swarm_id).await?)?
            }
            SwarmRequest::GetSwarmStatus(p) => to_json(&runtime.get_swarm_status(p.swarm_id).await?)?,
            SwarmRequest::AddAgentToSwarm(p) => {
                let added = runtime.add_agent_to_swarm(p.swarm_id, p.agent_id).await?;
                json!({ "added": added })
            }
            SwarmRequest::RemoveAgentFromSwarm(p) => {
                let removed = runtime
                    .remove_agent_from_swarm(p.swarm_id, p.agent_id)
                    .await?;
                json!({ "removed": removed })
            }
            SwarmRequest::AllocateTask(p) => {
                to_json(&runtime.allocate_task(p.swarm_id, p.task_id, p.payload).await?)?
            }
            SwarmRequest::ClaimTask(p) => {
                to_json(&runtime.claim_task(p.swarm_id, p.task_id, p.agent_id).await?)?
            }
            SwarmRequest::CompleteTask(p) => to_json(
                &runtime
                    .complete_task(p.swarm_id, p.task_id, p.agent_id, p.result)
                    .await?,
            )?,
            SwarmRequest::GetSharedState(p) => {
                runtime
                    .get_shared_state(p.swarm_id, p.key.as_deref())
                    .await?
            }
            SwarmRequest::UpdateSharedState(p) => {
                let previous = runtime
                    .update_shared_state(p.swarm_id, p.key, p.value)
                    .await?;
                json!({ "previous": previous })
            }
            SwarmRequest::ElectLeader(p) => {
                let scorer = p.scores.map(|scores| -> LeaderScorer {
                    Arc::new(move |agent_id: &str| {
                        scores.get(agent_id).copied().unwrap_or(f64::NEG_INFINITY)
                    })
                });
                let leader = runtime.elect_leader(p.swarm_id, scorer).await?;
                json!({ "leader": leader })
            }
            SwarmRequest::ListSwarms => to_json(&runtime.list_swarms().await)?,
            SwarmRequest::ListAlgorithms => to_json(&list_algorithms())?,
        };
        Ok(result)
    }
}

impl fmt::Debug for CommandDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDispatcher")
            .field("authorizer", &self.authorizer.is_some())
            .field("supervisor", &self.supervisor.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::RuntimeConfig;
    use crate::domain::ports::authorizer::MockAuthorizer;
    use crate::infrastructure::checkpoint::InMemoryCheckpointStore;
    use crate::services::event_bus::EventBus;

    fn dispatcher() -> CommandDispatcher {
        let runtime = SwarmRuntime::new(
            RuntimeConfig::default(),
            Arc::new(InMemoryCheckpointStore::new()),
            Arc::new(EventBus::default()),
        );
        CommandDispatcher::new(Arc::new(runtime))
    }

    async fn call(dispatcher: &CommandDispatcher, command: &str, params: Value) -> CommandResponse {
        dispatcher
            .handle(
                CommandRequest::new(command, params).with_id(7),
                CommandSource::System,
            )
            .await
    }

    async fn create(dispatcher: &CommandDispatcher) -> String {
        let response = call(
            dispatcher,
            "createSwarm",
            json!({
                "name": "s",
                "algorithm": "differential_evolution",
                "problem": {"name": "sphere", "dimensions": 2}
            }),
        )
        .await;
        assert!(response.success, "{:?}", response.error);
        response.result.unwrap()["swarm_id"]
            .as_str()
            .unwrap()
            .to_string()
    }

    #[test]
    fn test_request_wire_format() {
        let request: CommandRequest =
            serde_json::from_str(r#"{"command": "listSwarms", "id": "a"}"#).unwrap();
        assert_eq!(request.params, Value::Null);
        assert_eq!(request.id, Some(json!("a")));

        let response = CommandResponse::err("boom", Some(json!(1)));
        let wire = serde_json::to_value(&response).unwrap();
        assert_eq!(wire, json!({"success": false, "error": "boom", "id": 1}));
    }

    #[test]
    fn test_every_documented_command_parses() {
        for command in COMMANDS {
            match SwarmRequest::parse(command, Value::Null) {
                Ok(request) => assert_eq!(request.name(), *command),
                Err(CommandError::InvalidParams { .. }) => {}
                Err(other) => panic!("{command}: {other}"),
            }
        }
    }

    #[tokio::test]
    async fn test_unknown_command_is_an_envelope_error() {
        let response = call(&dispatcher(), "deleteEverything", Value::Null).await;
        assert!(!response.success);
        assert_eq!(response.id, Some(json!(7)));
        assert!(response.error.unwrap().contains("Unknown command"));
    }

    #[tokio::test]
    async fn test_task_scenario_through_envelopes() {
        let dispatcher = dispatcher();
        let swarm_id = create(&dispatcher).await;

        let add = call(
            &dispatcher,
            "addAgentToSwarm",
            json!({"swarm_id": swarm_id, "agent_id": "a1"}),
        )
        .await;
        assert_eq!(add.result, Some(json!({"added": true})));

        let task = call(
            &dispatcher,
            "allocateTask",
            json!({"swarm_id": swarm_id, "task_id": "t1", "payload": {"x": 1}}),
        )
        .await;
        assert!(task.success);

        let claim = json!({"swarm_id": swarm_id, "task_id": "t1", "agent_id": "a1"});
        assert!(call(&dispatcher, "claimTask", claim.clone()).await.success);
        let again = call(&dispatcher, "claimTask", claim).await;
        assert!(again.error.unwrap().contains("already claimed"));

        let wrong = call(
            &dispatcher,
            "completeTask",
            json!({"swarm_id": swarm_id, "task_id": "t1", "agent_id": "a2"}),
        )
        .await;
        assert!(!wrong.success);

        let done = call(
            &dispatcher,
            "completeTask",
            json!({"swarm_id": swarm_id, "task_id": "t1", "agent_id": "a1", "result": 42}),
        )
        .await;
        assert_eq!(done.result.unwrap()["result"], json!(42));

        let status = call(&dispatcher, "getSwarmStatus", json!({"swarm_id": swarm_id})).await;
        let status = status.result.unwrap();
        assert_eq!(status["completed_tasks"], json!(1));
        assert_eq!(status["pending_tasks"], json!(0));
    }

    #[tokio::test]
    async fn test_shared_state_and_leader() {
        let dispatcher = dispatcher();
        let swarm_id = create(&dispatcher).await;
        for agent in ["a", "b", "c"] {
            call(
                &dispatcher,
                "addAgentToSwarm",
                json!({"swarm_id": swarm_id, "agent_id": agent}),
            )
            .await;
        }

        let elected = call(
            &dispatcher,
            "electLeader",
            json!({"swarm_id": swarm_id, "scores": {"b": 3.0, "c": 1.0}}),
        )
        .await;
        assert_eq!(elected.result, Some(json!({"leader": "b"})));

        let update = call(
            &dispatcher,
            "updateSharedState",
            json!({"swarm_id": swarm_id, "key": "k", "value": [1, 2]}),
        )
        .await;
        assert_eq!(update.result, Some(json!({"previous": null})));

        let state = call(&dispatcher, "getSharedState", json!({"swarm_id": swarm_id})).await;
        let state = state.result.unwrap();
        assert_eq!(state["leader"], json!("b"));
        assert_eq!(state["k"], json!([1, 2]));
    }

    #[tokio::test]
    async fn test_unknown_problem_and_missing_swarm() {
        let dispatcher = dispatcher();
        let bad = call(
            &dispatcher,
            "createSwarm",
            json!({"name": "s", "problem": {"name": "nope"}}),
        )
        .await;
        assert!(bad.error.unwrap().contains("nope"));

        let missing = call(
            &dispatcher,
            "startSwarm",
            json!({"swarm_id": Uuid::new_v4()}),
        )
        .await;
        assert!(missing.error.unwrap().contains("Swarm not found"));

        let malformed = call(&dispatcher, "startSwarm", json!({"swarm_id": 5})).await;
        assert!(malformed.error.unwrap().contains("Invalid params"));
    }

    #[tokio::test]
    async fn test_authorizer_gates_agent_commands() {
        let mut authorizer = MockAuthorizer::new();
        authorizer
            .expect_authorize()
            .returning(|agent_id, _| agent_id != "intruder");
        let dispatcher = dispatcher().with_authorizer(Arc::new(authorizer));
        let swarm_id = create(&dispatcher).await;

        let denied = call(
            &dispatcher,
            "addAgentToSwarm",
            json!({"swarm_id": swarm_id, "agent_id": "intruder"}),
        )
        .await;
        assert!(denied.error.unwrap().contains("not authorized"));

        let allowed = call(
            &dispatcher,
            "addAgentToSwarm",
            json!({"swarm_id": swarm_id, "agent_id": "a1"}),
        )
        .await;
        assert!(allowed.success);
    }

    #[tokio::test]
    async fn test_list_commands() {
        let dispatcher = dispatcher();
        create(&dispatcher).await;
        let swarms = call(&dispatcher, "listSwarms", Value::Null).await;
        assert_eq!(swarms.result.unwrap().as_array().unwrap().len(), 1);

        let algorithms = call(&dispatcher, "list_algorithms", Value::Null).await;
        assert_eq!(algorithms.result.unwrap().as_array().unwrap().len(), 9);
    }
}
