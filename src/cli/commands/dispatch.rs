//! Line-oriented command session.
//!
//! Reads one JSON `CommandRequest` per line and writes one JSON
//! `CommandResponse` per line to stdout, in order.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::domain::models::{Config, SwarmStatus};
use crate::domain::ports::{AgentStatus, CheckpointStore};
use crate::infrastructure::agents::InMemoryAgentDirectory;
use crate::infrastructure::checkpoint::{FileCheckpointStore, InMemoryCheckpointStore};
use crate::services::command_bus::{CommandDispatcher, CommandRequest, CommandResponse, CommandSource};
use crate::services::event_bus::{EventBus, EventBusConfig};
use crate::services::fault_tolerance::FaultToleranceSupervisor;
use crate::services::swarm_runtime::SwarmRuntime;

#[derive(Args, Debug)]
pub struct DispatchArgs {
    /// Read requests from a file instead of stdin
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Supervise created swarms (health checks and periodic checkpoints)
    #[arg(long)]
    pub supervise: bool,

    /// After the last request, wait for running swarms to stop
    #[arg(long)]
    pub wait: bool,
}

/// The service stack behind a session.
pub struct Session {
    pub dispatcher: CommandDispatcher,
    pub directory: Arc<InMemoryAgentDirectory>,
    pub supervisor: Option<Arc<FaultToleranceSupervisor>>,
}

impl Session {
    pub fn new(config: &Config, supervise: bool) -> Self {
        let store: Arc<dyn CheckpointStore> = match &config.runtime.checkpoint_dir {
            Some(dir) => Arc::new(FileCheckpointStore::new(dir)),
            None => Arc::new(InMemoryCheckpointStore::new()),
        };
        let events = Arc::new(EventBus::new(EventBusConfig {
            channel_capacity: config.runtime.event_capacity,
        }));
        let runtime = Arc::new(SwarmRuntime::new(config.runtime.clone(), store, events));
        let directory = Arc::new(InMemoryAgentDirectory::new());

        let mut dispatcher = CommandDispatcher::new(Arc::clone(&runtime));
        let supervisor = supervise.then(|| {
            Arc::new(FaultToleranceSupervisor::new(
                Arc::clone(&runtime),
                directory.clone(),
                &config.fault_tolerance,
            ))
        });
        if let Some(supervisor) = &supervisor {
            dispatcher = dispatcher.with_supervisor(Arc::clone(supervisor));
        }
        Self {
            dispatcher,
            directory,
            supervisor,
        }
    }

    /// Handle one input line. Agents named in a request count as alive.
    pub async fn handle_line(&self, line: &str) -> CommandResponse {
        let request: CommandRequest = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(e) => return CommandResponse::err(format!("Malformed request: {e}"), None),
        };
        if let Some(agent_id) = request.params.get("agent_id").and_then(|v| v.as_str()) {
            self.directory.set_status(agent_id, AgentStatus::Active).await;
        }
        self.dispatcher
            .handle(request, CommandSource::Remote("dispatch".to_string()))
            .await
    }

    async fn wait_for_runs(&self) {
        let runtime = self.dispatcher.runtime();
        loop {
            let running = runtime
                .list_swarms()
                .await
                .iter()
                .any(|s| s.status == SwarmStatus::Running);
            if !running {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    pub async fn shutdown(&self) {
        if let Some(supervisor) = &self.supervisor {
            supervisor.shutdown();
        }
        self.dispatcher.runtime().shutdown().await;
    }
}

pub async fn execute(args: DispatchArgs, config: &Config) -> Result<()> {
    let session = Session::new(config, args.supervise);
    let reader: Box<dyn tokio::io::AsyncRead + Unpin + Send> = match &args.input {
        Some(path) => Box::new(
            tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open {}", path.display()))?,
        ),
        None => Box::new(tokio::io::stdin()),
    };
    let mut lines = BufReader::new(reader).lines();
    let mut stdout = tokio::io::stdout();

    let mut handled = 0usize;
    while let Some(line) = lines.next_line().await.context("Failed to read request")? {
        if line.trim().is_empty() {
            continue;
        }
        let response = session.handle_line(&line).await;
        let mut encoded = serde_json::to_string(&response)?;
        encoded.push('\n');
        stdout.write_all(encoded.as_bytes()).await?;
        stdout.flush().await?;
        handled += 1;
    }

    if args.wait {
        session.wait_for_runs().await;
    }
    tracing::info!(requests = handled, "dispatch session finished");
    session.shutdown().await;
    Ok(())
}
