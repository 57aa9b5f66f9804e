//! Lifecycle events published by the registry and the coordinator.

use crate::core::types::{Address, Identity, Timestamp};
use crate::intent::IntentStatus;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Events emitted on record creation and state changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MeshEvent {
    AgentRegistered {
        agent: Address,
        owner: Identity,
        agent_wallet: Identity,
    },
    AgentUpdated {
        agent: Address,
        updated_at: Timestamp,
    },
    ModelProfileCreated {
        profile: Address,
        owner: Identity,
        label: String,
    },
    ModelProfileUpdated {
        profile: Address,
        updated_at: Timestamp,
    },
    IntentCreated {
        intent: Address,
        from_agent: Address,
        to_agent: Address,
        payment_amount: u64,
    },
    IntentStatusUpdated {
        intent: Address,
        status: IntentStatus,
    },
}

/// Broadcast channel for [`MeshEvent`]s.
///
/// Publishing never fails: events sent while nobody is subscribed are dropped.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<MeshEvent>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    pub fn publish(&self, event: MeshEvent) {
        tracing::trace!(?event, "publishing mesh event");
        let _ = self.sender.send(event);
    }

    /// Subscribe to future events.
    pub fn subscribe(&self) -> broadcast::Receiver<MeshEvent> {
        self.sender.subscribe()
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
