//! Agent liveness port consumed by the fault tolerance supervisor.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reported status of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Active,
    Idle,
    Busy,
    Unresponsive,
    Failed,
    Offline,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Idle => "idle",
            Self::Busy => "busy",
            Self::Unresponsive => "unresponsive",
            Self::Failed => "failed",
            Self::Offline => "offline",
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Active | Self::Idle | Self::Busy)
    }
}

/// What the directory knows about an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentInfo {
    pub id: String,
    pub status: AgentStatus,
    pub last_seen: DateTime<Utc>,
}

impl AgentInfo {
    pub fn new(id: impl Into<String>, status: AgentStatus) -> Self {
        Self {
            id: id.into(),
            status,
            last_seen: Utc::now(),
        }
    }
}

/// Lookup of agent liveness. Absent agents count as unhealthy.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AgentDirectory: Send + Sync {
    async fn get_agent(&self, agent_id: &str) -> Option<AgentInfo>;
}
