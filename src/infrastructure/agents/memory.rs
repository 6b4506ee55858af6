//! In-memory agent directory fed by agent heartbeats.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::domain::ports::{AgentDirectory, AgentInfo, AgentStatus};

#[derive(Debug, Default)]
pub struct InMemoryAgentDirectory {
    agents: RwLock<HashMap<String, AgentInfo>>,
}

impl InMemoryAgentDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, info: AgentInfo) {
        self.agents.write().await.insert(info.id.clone(), info);
    }

    /// Record a status report, registering the agent if needed.
    pub async fn set_status(&self, agent_id: &str, status: AgentStatus) {
        let mut agents = self.agents.write().await;
        agents
            .entry(agent_id.to_string())
            .and_modify(|info| {
                info.status = status;
                info.last_seen = Utc::now();
            })
            .or_insert_with(|| AgentInfo::new(agent_id, status));
    }

    /// Refresh `last_seen` without changing the status. Returns `false` for
    /// unknown agents.
    pub async fn heartbeat(&self, agent_id: &str) -> bool {
        match self.agents.write().await.get_mut(agent_id) {
            Some(info) => {
                info.last_seen = Utc::now();
                true
            }
            None => false,
        }
    }

    pub async fn remove(&self, agent_id: &str) -> Option<AgentInfo> {
        self.agents.write().await.remove(agent_id)
    }

    /// All agents, sorted by id.
    pub async fn list(&self) -> Vec<AgentInfo> {
        let mut agents: Vec<AgentInfo> = self.agents.read().await.values().cloned().collect();
        agents.sort_by(|a, b| a.id.cmp(&b.id));
        agents
    }
}

#[async_trait]
impl AgentDirectory for InMemoryAgentDirectory {
    async fn get_agent(&self, agent_id: &str) -> Option<AgentInfo> {
        self.agents.read().await.get(agent_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_status_upserts() {
        let directory = InMemoryAgentDirectory::new();
        assert!(directory.get_agent("a1").await.is_none());

        directory.set_status("a1", AgentStatus::Busy).await;
        assert_eq!(
            directory.get_agent("a1").await.unwrap().status,
            AgentStatus::Busy
        );

        directory.set_status("a1", AgentStatus::Offline).await;
        let info = directory.get_agent("a1").await.unwrap();
        assert!(!info.status.is_healthy());
        assert_eq!(directory.list().await.len(), 1);
    }

    #[tokio::test]
    async fn test_heartbeat_and_remove() {
        let directory = InMemoryAgentDirectory::new();
        assert!(!directory.heartbeat("ghost").await);

        directory
            .register(AgentInfo::new("a2", AgentStatus::Idle))
            .await;
        let before = directory.get_agent("a2").await.unwrap().last_seen;
        assert!(directory.heartbeat("a2").await);
        assert!(directory.get_agent("a2").await.unwrap().last_seen >= before);

        assert!(directory.remove("a2").await.is_some());
        assert!(directory.get_agent("a2").await.is_none());
    }
}
