//! Outbound event bus for fire-and-forget requests.
//!
//! The core never waits on collaborators. Reward spawns, health-bar refreshes,
//! attacks and summons are published here and fulfilled by whoever drains the bus.

use crossbeam_channel::{bounded, Receiver, Sender};
use glam::Vec3;
use serde::{Deserialize, Serialize};

use skirmish_common::EntityId;

/// Default bus capacity.
pub const DEFAULT_BUS_CAPACITY: usize = 1024;

/// Requests and notifications emitted by hostile entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CombatEvent {
    /// Health changed; the external health bar should redraw.
    HealthChanged {
        /// Entity ID
        entity_id: EntityId,
        /// Current health
        current: u32,
        /// Maximum health
        max: u32,
    },
    /// Entity fired one attack at its target.
    AttackFired {
        /// Attacking entity
        attacker: EntityId,
        /// Where the attack originates
        origin: Vec3,
        /// Damage carried by the attack
        damage: i32,
    },
    /// Entity entered Die.
    EntityDied {
        /// Entity ID
        entity_id: EntityId,
        /// Position at death
        position: Vec3,
    },
    /// Death delay elapsed; currency should be dropped here.
    RewardSpawn {
        /// Where to drop the reward
        position: Vec3,
        /// Number of pickups
        count: u32,
    },
    /// A boss asked for minor entities around `origin`.
    SummonRequested {
        /// Summoning entity
        summoner: EntityId,
        /// Where minions should appear
        origin: Vec3,
        /// How many minions
        count: u32,
    },
    /// Entity went back to its pool.
    EntityReleased {
        /// Entity ID
        entity_id: EntityId,
    },
}

/// Event bus for broadcasting combat events to whoever drains it.
#[derive(Debug, Clone)]
pub struct EventBus {
    /// Sender for broadcasting events
    sender: Sender<CombatEvent>,
    /// Receiver for collecting events
    receiver: Receiver<CombatEvent>,
    /// Channel capacity
    capacity: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}

impl EventBus {
    /// Creates a new event bus with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity.max(1));
        Self {
            sender,
            receiver,
            capacity: capacity.max(1),
        }
    }

    /// Publishes an event to the bus.
    pub fn publish(&self, event: CombatEvent) {
        // Non-blocking send - if full, event is dropped
        if self.sender.try_send(event).is_err() {
            tracing::trace!("Event bus full, dropping event");
        }
    }

    /// Drains all pending events.
    pub fn drain(&self) -> Vec<CombatEvent> {
        self.receiver.try_iter().collect()
    }

    /// Returns the number of pending events.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    /// Returns the channel capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Creates a publish-only handle for an entity.
    #[must_use]
    pub fn publisher(&self) -> EventPublisher {
        EventPublisher {
            sender: Some(self.sender.clone()),
        }
    }
}

/// Publish-only side of the bus handed to entities.
///
/// A detached publisher silently discards everything.
#[derive(Debug, Clone, Default)]
pub struct EventPublisher {
    sender: Option<Sender<CombatEvent>>,
}

impl EventPublisher {
    /// A publisher connected to nothing.
    #[must_use]
    pub fn detached() -> Self {
        Self { sender: None }
    }

    /// Publishes an event without blocking.
    pub fn publish(&self, event: CombatEvent) {
        if let Some(sender) = &self.sender {
            let _ = sender.try_send(event);
        }
    }
}
