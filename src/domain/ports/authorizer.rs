//! Access check applied to agent-initiated commands.

use async_trait::async_trait;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Whether `agent_id` may perform `action`.
    async fn authorize(&self, agent_id: &str, action: &str) -> bool;
}
