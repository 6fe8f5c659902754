//! Notifications published by the registry and the entitlement engine.
//!
//! Delivery is fire-and-forget: publishers never wait for subscribers and
//! ignore whether anyone is listening.

use crate::{EventId, MembershipStatus, Tier, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tokio::sync::broadcast;
use tracing::trace;

/// The payload of an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "data")]
pub enum EventPayload {
    /// A module passed validation and was added to the registry.
    ModuleRegistered {
        module_id: String,
        /// Name of the source that contributed it.
        source: String,
    },

    /// An operator flipped a module's enabled flag.
    ModuleToggled { module_id: String, enabled: bool },

    /// A user's tier was assigned or changed.
    MembershipChanged {
        user_id: UserId,
        /// `None` when the membership was provisioned by this change.
        old_tier: Option<Tier>,
        new_tier: Tier,
    },

    /// A membership's status was changed by a billing event.
    MembershipStatusChanged {
        user_id: UserId,
        old_status: MembershipStatus,
        new_status: MembershipStatus,
    },

    /// The expiration sweep moved a membership to `expired`.
    MembershipExpired { user_id: UserId, tier: Tier },
}

impl EventPayload {
    /// The event name subscribers match on.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::ModuleRegistered { .. } => "module.registered",
            Self::ModuleToggled { .. } => "module.toggled",
            Self::MembershipChanged { .. } => "membership.changed",
            Self::MembershipStatusChanged { .. } => "membership.status_changed",
            Self::MembershipExpired { .. } => "membership.expired",
        }
    }
}

/// A published notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub name: String,
    pub payload: EventPayload,
    pub at: DateTime<Utc>,
}

impl Event {
    #[must_use]
    pub fn new(payload: EventPayload) -> Self {
        Self {
            id: EventId::new(),
            name: payload.name().to_string(),
            payload,
            at: Utc::now(),
        }
    }
}

/// Publish-only notification bus.
pub trait EventBus: Send + Sync {
    fn publish(&self, event: Event);
}

/// Drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEventBus;

impl EventBus for NullEventBus {
    fn publish(&self, _event: Event) {}
}

/// In-process bus backed by a tokio broadcast channel.
///
/// Slow subscribers lag and lose the oldest events; publishing never blocks.
#[derive(Debug, Clone)]
pub struct BroadcastEventBus {
    sender: broadcast::Sender<Event>,
}

impl BroadcastEventBus {
    /// Creates a bus that buffers up to `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastEventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventBus for BroadcastEventBus {
    fn publish(&self, event: Event) {
        let name = event.name.clone();
        if self.sender.send(event).is_err() {
            trace!(event = %name, "no subscribers for event");
        }
    }
}

/// Records events in memory for inspection.
#[derive(Debug, Default)]
pub struct MemoryEventBus {
    events: Mutex<Vec<Event>>,
}

impl MemoryEventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Events with the given name, oldest first.
    pub fn named(&self, name: &str) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| e.name == name)
            .collect()
    }
}

impl EventBus for MemoryEventBus {
    fn publish(&self, event: Event) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
