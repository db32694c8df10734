//! Event bus for presentation layers.

use crossbeam_channel::{bounded, Receiver, Sender};
use serde::{Deserialize, Serialize};

use hearth_common::EntityId;

use crate::npc::Behavior;
use crate::world::ItemDrop;

/// Events published by the combat engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CombatEvent {
    /// Damage applied by an attack or spell
    DamageDealt {
        /// Attacker
        source: EntityId,
        /// Victim
        target: EntityId,
        /// Damage applied after mitigation
        amount: i32,
    },
    /// Entity reduced to zero health
    Defeated {
        /// Victim
        entity_id: EntityId,
        /// Killer (if any)
        killer: Option<EntityId>,
    },
    /// Timed effect ran out
    EffectExpired {
        /// Entity the effect was on
        entity_id: EntityId,
        /// Effect name
        effect: String,
    },
    /// Behavior tag changed
    BehaviorChanged {
        /// NPC
        entity_id: EntityId,
        /// Previous behavior
        from: Behavior,
        /// New behavior
        to: Behavior,
    },
    /// Creature summoned
    Summoned {
        /// Summoner
        owner: EntityId,
        /// New creature
        summon: EntityId,
    },
    /// Entity removed from the world
    Despawned {
        /// Entity ID
        entity_id: EntityId,
    },
    /// Items left behind by a defeated NPC
    LootDropped {
        /// Defeated NPC
        entity_id: EntityId,
        /// Items created by the loot roll
        items: Vec<ItemDrop>,
    },
    /// Entity gained levels
    LevelledUp {
        /// Entity ID
        entity_id: EntityId,
        /// New level
        level: u32,
    },
}

/// Event bus for distributing combat events.
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
        Self::new(1024)
    }
}

impl EventBus {
    /// Creates a new event bus with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
        }
    }

    /// Publishes an event to the bus.
    pub fn publish(&self, event: CombatEvent) {
        // Non-blocking send - if full, event is dropped
        let _ = self.sender.try_send(event);
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

    /// Creates a receiver handle for an external consumer.
    #[must_use]
    pub fn subscribe(&self) -> Receiver<CombatEvent> {
        self.receiver.clone()
    }
}
