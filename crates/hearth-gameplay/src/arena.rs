//! Entity arena: every combatant keyed by id, plus the threat table and
//! faction matrix that relate them.
//!
//! An entity taking its turn is detached with [`Arena::take`] and written
//! back with [`Arena::restore`], so the acting entity and its target can be
//! borrowed mutably at the same time.

use std::collections::BTreeMap;
use tracing::debug;

use hearth_common::{EntityId, Location};

use crate::combatant::{Actor, Combatant};
use crate::events::{CombatEvent, EventBus};
use crate::faction::FactionMatrix;
use crate::npc::Npc;
use crate::player::Player;
use crate::threat::ThreatTable;
use crate::world::{ItemDrop, LootTable};

/// All combatants in the simulation.
#[derive(Debug, Default)]
pub struct Arena {
    actors: BTreeMap<EntityId, Actor>,
    player_id: Option<EntityId>,
    /// Combat links
    pub threat: ThreatTable,
    /// Faction relations
    pub factions: FactionMatrix,
    /// Outgoing events
    pub events: EventBus,
}

impl Arena {
    /// Creates an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the player.
    pub fn insert_player(&mut self, player: Player) -> EntityId {
        let id = player.id;
        self.player_id = Some(id);
        self.actors.insert(id, player.into());
        id
    }

    /// Registers an NPC.
    pub fn insert_npc(&mut self, npc: Npc) -> EntityId {
        let id = npc.id;
        self.actors.insert(id, npc.into());
        id
    }

    /// Number of registered entities, detached ones excluded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actors.len()
    }

    /// Returns whether the arena is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    /// Checks if an entity is registered and attached.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.actors.contains_key(&id)
    }

    /// Looks up an entity.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Actor> {
        self.actors.get(&id)
    }

    /// Looks up an entity mutably.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Actor> {
        self.actors.get_mut(&id)
    }

    /// Looks up an NPC.
    #[must_use]
    pub fn npc(&self, id: EntityId) -> Option<&Npc> {
        self.get(id).and_then(Actor::as_npc)
    }

    /// Looks up an NPC mutably.
    pub fn npc_mut(&mut self, id: EntityId) -> Option<&mut Npc> {
        self.get_mut(id).and_then(Actor::as_npc_mut)
    }

    /// The player's id, if one was registered.
    #[must_use]
    pub const fn player_id(&self) -> Option<EntityId> {
        self.player_id
    }

    /// The player, if registered and attached.
    #[must_use]
    pub fn player(&self) -> Option<&Player> {
        self.player_id
            .and_then(|id| self.get(id))
            .and_then(Actor::as_player)
    }

    /// The player, mutably.
    pub fn player_mut(&mut self) -> Option<&mut Player> {
        let id = self.player_id?;
        self.get_mut(id).and_then(|actor| actor.as_player_mut())
    }

    /// Detaches an entity for the duration of its turn.
    pub fn take(&mut self, id: EntityId) -> Option<Actor> {
        self.actors.remove(&id)
    }

    /// Writes a detached entity back.
    pub fn restore(&mut self, actor: Actor) {
        self.actors.insert(actor.id(), actor);
    }

    /// Detaches an NPC; players are left in place.
    pub fn take_npc(&mut self, id: EntityId) -> Option<Box<Npc>> {
        match self.actors.remove(&id)? {
            Actor::Npc(npc) => Some(npc),
            other @ Actor::Player(_) => {
                self.restore(other);
                None
            },
        }
    }

    /// Writes a detached NPC back.
    pub fn restore_npc(&mut self, npc: Box<Npc>) {
        self.actors.insert(npc.id, Actor::Npc(npc));
    }

    /// Ids of every attached NPC in ascending order.
    #[must_use]
    pub fn npc_ids(&self) -> Vec<EntityId> {
        self.actors
            .iter()
            .filter(|(_, actor)| actor.as_npc().is_some())
            .map(|(&id, _)| id)
            .collect()
    }

    /// Ids of every attached entity standing in a room.
    #[must_use]
    pub fn ids_in_room(&self, at: &Location) -> Vec<EntityId> {
        self.actors
            .iter()
            .filter(|(_, actor)| actor.location() == at)
            .map(|(&id, _)| id)
            .collect()
    }

    /// NPCs standing in a room.
    pub fn npcs_in_room<'a>(&'a self, at: &'a Location) -> impl Iterator<Item = &'a Npc> + 'a {
        self.actors
            .values()
            .filter_map(Actor::as_npc)
            .filter(move |npc| &npc.location == at)
    }

    /// Checks if the player is in a room.
    #[must_use]
    pub fn player_in_room(&self, at: &Location) -> bool {
        self.player().is_some_and(|player| &player.location == at)
    }

    /// Checks if `a` treats `b` as an enemy, by faction or by an open fight.
    #[must_use]
    pub fn is_hostile(&self, a: &dyn Combatant, b: &dyn Combatant) -> bool {
        self.factions.is_hostile(a.faction(), b.faction())
            || self.threat.are_fighting(a.id(), b.id())
    }

    /// Checks if an entity is attached, alive and in a room.
    #[must_use]
    pub fn is_present(&self, id: EntityId, at: &Location) -> bool {
        self.get(id)
            .is_some_and(|actor| actor.is_alive() && actor.location() == at)
    }

    /// Removes an entity from the world.
    ///
    /// Severs its combat links and drops it from its owner's summon list.
    pub fn despawn(&mut self, id: EntityId) -> Option<Actor> {
        let actor = self.actors.remove(&id)?;
        self.forget(&actor);
        Some(actor)
    }

    /// Cleans up after an entity that was removed while detached.
    pub fn forget(&mut self, actor: &Actor) {
        let id = actor.id();
        self.threat.remove(id);
        if let Some(owner) = actor.as_npc().and_then(Npc::owner) {
            if let Some(player) = self.get_mut(owner).and_then(|a| a.as_player_mut()) {
                player.forget_summon(id);
            }
        }
        if self.player_id == Some(id) {
            self.player_id = None;
        }
        debug!("Despawned {} ({id})", actor.name());
        self.events.publish(CombatEvent::Despawned { entity_id: id });
    }

    /// Runs the death hook for a defeated entity.
    ///
    /// Summoned NPCs vanish without loot. Other NPCs stay as corpses and roll
    /// loot. A dead player loses every combat link, effect and summon.
    pub fn handle_death(
        &mut self,
        id: EntityId,
        killer: Option<EntityId>,
        loot: &mut dyn LootTable,
    ) -> Vec<ItemDrop> {
        self.events.publish(CombatEvent::Defeated {
            entity_id: id,
            killer,
        });
        self.threat.remove(id);

        let Some(actor) = self.actors.get_mut(&id) else {
            return Vec::new();
        };
        actor.attributes_mut().clear_effects();

        match actor {
            Actor::Npc(npc) if npc.is_summoned() => {
                self.despawn(id);
                Vec::new()
            },
            Actor::Npc(npc) => {
                let drops = loot
                    .roll_loot(&npc.template_id, &npc.location)
                    .unwrap_or_default();
                debug!("{} died and dropped {} items", npc.name, drops.len());
                if !drops.is_empty() {
                    self.events.publish(CombatEvent::LootDropped {
                        entity_id: id,
                        items: drops.clone(),
                    });
                }
                drops
            },
            Actor::Player(player) => {
                let summons = player.summon_ids();
                debug!("{} died with {} summons", player.name, summons.len());
                for summon in summons {
                    self.despawn(summon);
                }
                Vec::new()
            },
        }
    }
}
