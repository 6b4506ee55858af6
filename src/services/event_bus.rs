//! EventBus service for swarm notifications.
//!
//! Broadcast-based fan-out with sequence numbering. Every notification names
//! the swarm it concerns and the member agents it is addressed to; consumers
//! filter on either.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::domain::models::RunSummary;

/// Unique identifier for a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonically increasing sequence number assigned by EventBus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SequenceNumber(pub u64);

impl SequenceNumber {
    pub fn zero() -> Self {
        Self(0)
    }
}

impl std::fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for EventSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Event category for filtering and routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventCategory {
    Lifecycle,
    Progress,
    Membership,
    State,
    Task,
    Health,
}

impl std::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lifecycle => write!(f, "lifecycle"),
            Self::Progress => write!(f, "progress"),
            Self::Membership => write!(f, "membership"),
            Self::State => write!(f, "state"),
            Self::Task => write!(f, "task"),
            Self::Health => write!(f, "health"),
        }
    }
}

/// Notification envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmNotification {
    pub id: EventId,
    pub sequence: SequenceNumber,
    pub timestamp: DateTime<Utc>,
    pub severity: EventSeverity,
    pub category: EventCategory,
    pub swarm_id: Uuid,
    /// Member agents this notification is addressed to.
    pub recipients: Vec<String>,
    pub payload: EventPayload,
}

impl SwarmNotification {
    /// Build a notification; severity and category follow from the payload.
    pub fn new(swarm_id: Uuid, recipients: Vec<String>, payload: EventPayload) -> Self {
        Self {
            id: EventId::new(),
            sequence: SequenceNumber::zero(), // Will be assigned by EventBus
            timestamp: Utc::now(),
            severity: payload.severity(),
            category: payload.category(),
            swarm_id,
            recipients,
            payload,
        }
    }

    /// Whether `agent_id` is among the recipients.
    pub fn is_addressed_to(&self, agent_id: &str) -> bool {
        self.recipients.iter().any(|r| r == agent_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum EventPayload {
    // Lifecycle
    SwarmCreated {
        name: String,
        algorithm: String,
    },
    SwarmStarted,
    SwarmStopped,
    SwarmFailed {
        error: String,
    },
    RunCompleted {
        summary: RunSummary,
    },
    SwarmRestored {
        checkpoint_timestamp: DateTime<Utc>,
    },
    SwarmDeleted,

    // Progress
    RoundUpdate {
        iteration: usize,
        best_fitness: f64,
        best_position: Vec<f64>,
    },

    // Membership
    AgentJoined {
        agent_id: String,
    },
    AgentLeft {
        agent_id: String,
    },
    LeaderElected {
        leader: String,
    },
    LeaderNeeded {
        previous: String,
    },

    // Shared state
    SharedStateChanged {
        key: String,
        value: serde_json::Value,
    },

    // Tasks
    TaskAllocated {
        task_id: String,
    },
    TaskClaimed {
        task_id: String,
        agent_id: String,
    },
    TaskCompleted {
        task_id: String,
        agent_id: String,
    },

    // Health
    RecoveryAttempted {
        agent_id: String,
        consecutive_failures: u32,
    },
    AgentEvicted {
        agent_id: String,
        consecutive_failures: u32,
    },
    CheckpointSaved {
        checkpoint_timestamp: DateTime<Utc>,
    },
}

impl EventPayload {
    pub fn category(&self) -> EventCategory {
        match self {
            Self::SwarmCreated { .. }
            | Self::SwarmStarted
            | Self::SwarmStopped
            | Self::SwarmFailed { .. }
            | Self::RunCompleted { .. }
            | Self::SwarmRestored { .. }
            | Self::SwarmDeleted => EventCategory::Lifecycle,
            Self::RoundUpdate { .. } => EventCategory::Progress,
            Self::AgentJoined { .. }
            | Self::AgentLeft { .. }
            | Self::LeaderElected { .. }
            | Self::LeaderNeeded { .. } => EventCategory::Membership,
            Self::SharedStateChanged { .. } => EventCategory::State,
            Self::TaskAllocated { .. } | Self::TaskClaimed { .. } | Self::TaskCompleted { .. } => {
                EventCategory::Task
            }
            Self::RecoveryAttempted { .. }
            | Self::AgentEvicted { .. }
            | Self::CheckpointSaved { .. } => EventCategory::Health,
        }
    }

    pub fn severity(&self) -> EventSeverity {
        match self {
            Self::SwarmFailed { .. } => EventSeverity::Error,
            Self::LeaderNeeded { .. }
            | Self::RecoveryAttempted { .. }
            | Self::AgentEvicted { .. } => EventSeverity::Warning,
            Self::RoundUpdate { .. } | Self::CheckpointSaved { .. } => EventSeverity::Debug,
            _ => EventSeverity::Info,
        }
    }
}

/// Configuration for the EventBus.
#[derive(Debug, Clone)]
pub struct EventBusConfig {
    /// Channel capacity for the broadcast channel.
    pub channel_capacity: usize,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
        }
    }
}

/// Central event bus for broadcasting notifications to multiple consumers.
pub struct EventBus {
    sender: broadcast::Sender<SwarmNotification>,
    sequence: AtomicU64,
}

impl EventBus {
    pub fn new(config: EventBusConfig) -> Self {
        let (sender, _) = broadcast::channel(config.channel_capacity.max(1));
        Self {
            sender,
            sequence: AtomicU64::new(0),
        }
    }

    /// Assign the next sequence number and broadcast.
    pub fn publish(&self, mut event: SwarmNotification) -> SequenceNumber {
        let seq = SequenceNumber(self.sequence.fetch_add(1, Ordering::SeqCst));
        event.sequence = seq;

        tracing::trace!(
            swarm_id = %event.swarm_id,
            sequence = %seq,
            category = %event.category,
            "publishing notification"
        );

        // Broadcast to subscribers (ignore send errors - may have no subscribers)
        let _ = self.sender.send(event);
        seq
    }

    /// Shorthand for building and publishing in one step.
    pub fn notify(
        &self,
        swarm_id: Uuid,
        recipients: Vec<String>,
        payload: EventPayload,
    ) -> SequenceNumber {
        self.publish(SwarmNotification::new(swarm_id, recipients, payload))
    }

    /// Subscribe to the notification stream.
    pub fn subscribe(&self) -> broadcast::Receiver<SwarmNotification> {
        self.sender.subscribe()
    }

    /// Next sequence number to be assigned.
    pub fn current_sequence(&self) -> SequenceNumber {
        SequenceNumber(self.sequence.load(Ordering::SeqCst))
    }

    /// Get the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(EventBusConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_bus_sequence_assignment() {
        let bus = EventBus::default();
        let swarm_id = Uuid::new_v4();

        assert_eq!(bus.current_sequence().0, 0);

        let mut rx = bus.subscribe();

        bus.notify(swarm_id, vec![], EventPayload::SwarmStarted);
        let event1 = rx.recv().await.unwrap();
        assert_eq!(event1.sequence.0, 0);

        bus.notify(swarm_id, vec![], EventPayload::SwarmStopped);
        let event2 = rx.recv().await.unwrap();
        assert_eq!(event2.sequence.0, 1);

        assert_eq!(bus.current_sequence().0, 2);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_still_sequences() {
        let bus = EventBus::default();
        assert_eq!(bus.subscriber_count(), 0);
        bus.notify(Uuid::new_v4(), vec![], EventPayload::SwarmDeleted);
        assert_eq!(bus.current_sequence().0, 1);
    }

    #[tokio::test]
    async fn test_recipients_and_derived_metadata() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        bus.notify(
            Uuid::new_v4(),
            vec!["a1".to_string(), "a2".to_string()],
            EventPayload::LeaderNeeded {
                previous: "a3".to_string(),
            },
        );
        let event = rx.recv().await.unwrap();
        assert!(event.is_addressed_to("a2"));
        assert!(!event.is_addressed_to("a3"));
        assert_eq!(event.category, EventCategory::Membership);
        assert_eq!(event.severity, EventSeverity::Warning);
    }

    #[test]
    fn test_payload_serialization_is_tagged() {
        let payload = EventPayload::TaskClaimed {
            task_id: "t1".to_string(),
            agent_id: "a1".to_string(),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "TaskClaimed");
        assert_eq!(json["data"]["task_id"], "t1");
    }
}
