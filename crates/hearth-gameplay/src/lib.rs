//! # Hearth Gameplay
//!
//! NPC behavior and combat resolution for a room-based world.
//!
//! This crate provides:
//! - Attribute model (health, mana, stats, resistances, levelling)
//! - Timed effects (DoT, HoT, stat modifiers, control)
//! - Level tiers and faction relations
//! - Spells and the spell registry
//! - Threat tracking between combatants
//! - Combat resolution (melee, spells, summons, defeat)
//! - Per-tick NPC behavior selection and movement
//! - World collaborator traits with in-memory implementations
//! - Event bus and persistence snapshots

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod arena;
pub mod attributes;
pub mod behavior;
pub mod combat;
pub mod combatant;
pub mod config;
pub mod effects;
pub mod events;
pub mod faction;
pub mod level;
pub mod movement;
pub mod npc;
pub mod player;
pub mod snapshot;
pub mod spell;
pub mod stats;
pub mod threat;
pub mod world;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::arena::*;
    pub use crate::attributes::*;
    pub use crate::behavior::*;
    pub use crate::combat::*;
    pub use crate::combatant::*;
    pub use crate::config::*;
    pub use crate::effects::*;
    pub use crate::events::*;
    pub use crate::faction::*;
    pub use crate::level::*;
    pub use crate::movement::*;
    pub use crate::npc::*;
    pub use crate::player::*;
    pub use crate::snapshot::*;
    pub use crate::spell::*;
    pub use crate::stats::*;
    pub use crate::threat::*;
    pub use crate::world::*;
}

pub use prelude::*;

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_common::Location;
    use std::rc::Rc;

    #[test]
    fn test_duel_until_defeat() {
        let mut config = GameplayConfig::default();
        config.combat.min_hit_chance = 1.0;
        config.combat.max_hit_chance = 1.0;

        let square = Location::new("town", "square");
        let mut arena = Arena::new();
        arena.insert_player(Player::new("Hero", square.clone(), &config.npc));
        let wolf = arena.insert_npc(
            Npc::new("wolf", "Wolf", square, &config.npc)
                .with_faction(Faction::Hostile)
                .with_aggression(1.0),
        );

        let graph = RoomGraph::new();
        let mut factory = MockNpcFactory::new();
        let mut loot = MockLootTable::new();
        let mut resolver = CombatResolver::new(Rc::new(SpellRegistry::new()), &config).with_seed(9);
        let mut selector =
            BehaviorSelector::new(CombatResolver::new(Rc::new(SpellRegistry::new()), &config)).with_seed(9);

        let mut now = 0.0;
        for _ in 0..20 {
            let mut ctx = TickContext {
                now,
                dt: 1.0,
                world: &graph,
                pathfinder: &graph,
                factory: &mut factory,
                loot: &mut loot,
            };
            selector.update_all(&mut arena, &mut ctx);
            if arena.npc(wolf).is_some_and(|n| n.attributes.is_alive()) {
                resolver.player_attack(&mut arena, wolf, ctx.loot);
            }
            now += 3.0;
        }

        assert_eq!(arena.npc(wolf).map(|n| n.attributes.is_alive()), Some(false));
        assert!(arena.player().is_some_and(|p| p.attributes.is_alive()));
        assert!(arena.threat.is_consistent());
        assert!(!arena.threat.in_combat(wolf));
    }
}
