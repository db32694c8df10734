//! Per-tick NPC decision making.
//!
//! Decision order for one NPC:
//! 1. stunned or trading NPCs do nothing
//! 2. expired or orphaned summons despawn
//! 3. an aggressive schedule hour forces a target scan
//! 4. healers heal the most wounded ally; retreating NPCs walk to safety
//! 5. in combat: flee when badly hurt, otherwise `try_attack`
//! 6. out of combat: defend allies or pick a fight
//! 7. idle movement once the move cooldown has elapsed

use tracing::debug;

use hearth_common::EntityId;

use crate::arena::Arena;
use crate::combat::{CombatResolver, SpellTarget};
use crate::combatant::{Actor, Combatant};
use crate::events::CombatEvent;
use crate::faction::Faction;
use crate::movement::{execute_move, follow, follow_schedule, patrol, step_toward, wander, Step};
use crate::npc::{Behavior, Npc};
use crate::spell::{Spell, TargetType};
use crate::world::{loot_message, Pathfinder, TickContext, WorldMap};

/// What happened during one NPC's turn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Turn {
    /// Messages visible to the player
    pub messages: Vec<String>,
    /// The NPC must be removed from the world
    pub despawn: bool,
}

impl Turn {
    fn with(messages: Vec<String>) -> Self {
        Self {
            messages,
            despawn: false,
        }
    }

    fn from_message(message: Option<String>) -> Self {
        Self::with(message.into_iter().collect())
    }
}

fn visible(arena: &Arena, npc: &Npc, message: String) -> Option<String> {
    arena.player_in_room(&npc.location).then_some(message)
}

// ============================================================================
// Retreat
// ============================================================================

/// Sends an NPC toward the nearest safe room.
///
/// Stores the path, suspends the current behavior under `Retreating` and
/// leaves every fight. Returns `None` and changes nothing when no safe room is
/// reachable.
pub fn start_retreat(npc: &mut Npc, arena: &mut Arena, pathfinder: &dyn Pathfinder) -> Option<String> {
    let destination = pathfinder.find_nearest_safe_room(&npc.location)?;
    let path = pathfinder.find_path(&npc.location, &destination)?;

    let from = npc.behavior.current;
    if from != Behavior::Retreating {
        npc.behavior.push_override(Behavior::Retreating);
        arena.events.publish(CombatEvent::BehaviorChanged {
            entity_id: npc.id,
            from,
            to: Behavior::Retreating,
        });
    }
    arena.threat.exit_all(npc.id);
    debug!("{} retreats toward {destination}", npc.name);

    let message = match path.first() {
        Some(direction) => format!(
            "{} looks exhausted and retreats from battle, heading {direction}!",
            npc.name
        ),
        None => format!("{} looks exhausted and retreats from battle!", npc.name),
    };
    npc.retreat_path = path;
    npc.retreat_destination = Some(destination);
    Some(message)
}

/// Advances a retreating NPC by one step.
///
/// Full mana ends the retreat; so does losing the path.
pub fn perform_retreat(npc: &mut Npc, arena: &mut Arena, world: &dyn WorldMap) -> Option<String> {
    if npc.attributes.mana >= npc.attributes.max_mana {
        end_retreat(npc, arena);
        return visible(arena, npc, format!("{} looks recovered.", npc.name));
    }
    if !npc.retreat_path.is_empty() {
        let direction = npc.retreat_path.remove(0);
        let step = execute_move(npc, &direction, world, arena);
        if step.moved {
            return step.message;
        }
    } else if npc.retreat_destination.as_ref() == Some(&npc.location) {
        return None;
    }
    end_retreat(npc, arena);
    visible(
        arena,
        npc,
        format!("{} seems to have lost their way and stops retreating.", npc.name),
    )
}

fn end_retreat(npc: &mut Npc, arena: &Arena) {
    npc.retreat_path.clear();
    npc.retreat_destination = None;
    let from = npc.behavior.current;
    let to = npc.behavior.pop_override();
    arena.events.publish(CombatEvent::BehaviorChanged {
        entity_id: npc.id,
        from,
        to,
    });
}

// ============================================================================
// Selector
// ============================================================================

/// Drives every NPC once per world tick.
pub struct BehaviorSelector {
    resolver: CombatResolver,
    rng: fastrand::Rng,
}

impl BehaviorSelector {
    /// Creates a selector around a combat resolver.
    #[must_use]
    pub fn new(resolver: CombatResolver) -> Self {
        Self {
            resolver,
            rng: fastrand::Rng::new(),
        }
    }

    /// Reseeds the random source.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = fastrand::Rng::with_seed(seed);
        self
    }

    /// The combat resolver.
    #[must_use]
    pub const fn resolver(&self) -> &CombatResolver {
        &self.resolver
    }

    /// The combat resolver, mutably (for player actions).
    pub fn resolver_mut(&mut self) -> &mut CombatResolver {
        &mut self.resolver
    }

    /// Runs one world tick: effects for every entity, then one decision per
    /// living NPC in id order.
    ///
    /// Returns the messages the player can see.
    pub fn update_all(&mut self, arena: &mut Arena, ctx: &mut TickContext<'_>) -> Vec<String> {
        let mut messages = Vec::new();
        Self::tick_player_effects(arena, ctx, &mut messages);

        for id in arena.npc_ids() {
            let Some(mut npc) = arena.take_npc(id) else {
                continue;
            };
            if !npc.attributes.is_alive() {
                arena.restore_npc(npc);
                continue;
            }

            let tick = npc.process_active_effects(ctx.now, ctx.dt);
            for effect in tick.expired {
                arena.events.publish(CombatEvent::EffectExpired {
                    entity_id: id,
                    effect,
                });
            }
            let seen = arena.player_in_room(&npc.location);
            if seen {
                messages.extend(tick.messages);
            }
            if tick.died {
                let name = npc.name.clone();
                arena.restore_npc(npc);
                let drops = arena.handle_death(id, None, ctx.loot);
                if seen {
                    messages.extend(loot_message(&name, &drops));
                }
                continue;
            }

            npc.attributes.prune_cooldowns(ctx.now);
            if !arena.threat.in_combat(id) && ctx.pathfinder.is_location_safe(&npc.location) {
                npc.regenerate(ctx.now, self.resolver.npc_tuning());
            }

            let turn = self.update_npc(&mut npc, arena, ctx);
            messages.extend(turn.messages);
            if turn.despawn {
                arena.forget(&Actor::Npc(npc));
            } else {
                arena.restore_npc(npc);
            }
        }
        messages
    }

    fn tick_player_effects(arena: &mut Arena, ctx: &mut TickContext<'_>, messages: &mut Vec<String>) {
        let Some(player_id) = arena.player_id() else {
            return;
        };
        let Some(mut player) = arena.take(player_id) else {
            return;
        };
        if !player.is_alive() {
            arena.restore(player);
            return;
        }
        let tick = player.process_active_effects(ctx.now, ctx.dt);
        arena.restore(player);
        for effect in tick.expired {
            arena.events.publish(CombatEvent::EffectExpired {
                entity_id: player_id,
                effect,
            });
        }
        messages.extend(tick.messages);
        if tick.died {
            arena.handle_death(player_id, None, ctx.loot);
        }
    }

    /// One decision for a detached NPC.
    pub fn update_npc(&mut self, npc: &mut Npc, arena: &mut Arena, ctx: &mut TickContext<'_>) -> Turn {
        let now = ctx.now;
        if npc.attributes.is_stunned() {
            debug!("{} is stunned", npc.name);
            return Turn::default();
        }
        if npc.trading {
            return Turn::default();
        }
        if let Some(turn) = Self::check_summon_bond(npc, arena, now) {
            return turn;
        }

        let in_combat = arena.threat.in_combat(npc.id);
        if npc.behavior.current == Behavior::Scheduled && !in_combat {
            let hour = ctx.world.current_hour();
            if npc.schedule_entry(hour).is_some_and(|entry| entry.aggressive) {
                if let Some(messages) = self.scan_for_targets(npc, arena, ctx, true) {
                    return Turn::with(messages);
                }
            }
        }

        match npc.behavior.current {
            Behavior::Healer => {
                if let Some(message) = self.try_heal(npc, arena, ctx) {
                    return Turn::from_message(visible(arena, npc, message));
                }
            },
            Behavior::Retreating => {
                return Turn::from_message(perform_retreat(npc, arena, ctx.world));
            },
            _ => {},
        }

        if in_combat {
            if npc.attributes.health_fraction() < npc.flee_threshold {
                if let Some(step) = self.try_flee(npc, arena, ctx) {
                    return Turn::from_message(step.message);
                }
            }
            return Turn::from_message(self.resolver.try_attack(npc, arena, ctx));
        }

        if let Some(messages) = self.scan_for_targets(npc, arena, ctx, false) {
            return Turn::with(messages);
        }

        if npc.ready_to_move(now) {
            return Turn::with(self.idle(npc, arena, ctx));
        }
        Turn::default()
    }

    fn check_summon_bond(npc: &Npc, arena: &Arena, now: f64) -> Option<Turn> {
        let bond = npc.summon.as_ref()?;
        let owner_present = arena.get(bond.owner).is_some_and(|owner| owner.is_alive());
        if !owner_present {
            debug!("{} vanishes without its owner", npc.name);
            return Some(Turn {
                messages: Vec::new(),
                despawn: true,
            });
        }
        if bond.expired(now) {
            return Some(Turn {
                messages: vec![format!("Your {} crumbles to dust.", npc.name)],
                despawn: true,
            });
        }
        None
    }

    // ========================================================================
    // Specialised behaviors
    // ========================================================================

    /// Heals the most wounded non-hostile occupant, the healer included.
    fn try_heal(&mut self, npc: &mut Npc, arena: &mut Arena, ctx: &mut TickContext<'_>) -> Option<String> {
        let now = ctx.now;
        if !npc.combat_ready(now) {
            return None;
        }
        let threshold = self.resolver.npc_tuning().healer_heal_threshold;

        let mut best: Option<(Option<EntityId>, f32)> = None;
        let own = npc.attributes.health_fraction();
        if own < threshold {
            best = Some((None, own));
        }
        for id in arena.ids_in_room(&npc.location) {
            let Some(actor) = arena.get(id) else {
                continue;
            };
            if !actor.is_alive() || arena.is_hostile(&*npc, actor) {
                continue;
            }
            let fraction = actor.attributes().health_fraction();
            if fraction < threshold && best.map_or(true, |(_, lowest)| fraction < lowest) {
                best = Some((Some(id), fraction));
            }
        }
        let (target, _) = best?;

        let spell = self.heal_spell(npc, now)?;
        let outcome = match target {
            None => self
                .resolver
                .cast_spell(npc, &spell, SpellTarget::Caster, now, arena, ctx.factory),
            Some(id) => {
                let mut patient = arena.take(id)?;
                let outcome = self.resolver.cast_spell(
                    npc,
                    &spell,
                    SpellTarget::Other(&mut patient),
                    now,
                    arena,
                    ctx.factory,
                );
                arena.restore(patient);
                outcome
            },
        };
        if !outcome.landed {
            return None;
        }
        npc.last_combat_action = now;
        Some(outcome.message)
    }

    fn heal_spell(&self, npc: &Npc, now: f64) -> Option<Spell> {
        npc.usable_spells
            .iter()
            .filter_map(|id| self.resolver.spells().get_spell(id))
            .find(|spell| {
                spell.is_heal()
                    && spell.target_type != TargetType::Enemy
                    && spell.can_cast(npc.attributes.level)
                    && npc.attributes.mana >= spell.mana_cost
                    && npc.attributes.spell_ready(&spell.spell_id, now)
            })
            .cloned()
    }

    /// Leaves every fight through a random exit.
    ///
    /// Hostile NPCs prefer exits away from safe rooms, everyone else prefers
    /// exits into them. Returns `None` when the room has no exits.
    fn try_flee(&mut self, npc: &mut Npc, arena: &mut Arena, ctx: &mut TickContext<'_>) -> Option<Step> {
        let exits = ctx.world.exits(&npc.location);
        if exits.is_empty() {
            return None;
        }
        let preferred: Vec<&String> = exits
            .iter()
            .filter(|(_, destination)| {
                let safe = ctx
                    .pathfinder
                    .is_location_safe(&npc.location.resolve_exit(destination));
                safe != npc.is_hostile()
            })
            .map(|(direction, _)| direction)
            .collect();
        let pool: Vec<&String> = if preferred.is_empty() {
            exits.iter().map(|(direction, _)| direction).collect()
        } else {
            preferred
        };
        let direction = pool[self.rng.usize(..pool.len())].clone();

        arena.threat.exit_all(npc.id);
        let seen_leaving = arena.player_in_room(&npc.location);
        let step = execute_move(npc, &direction, ctx.world, arena);
        debug!("{} flees {direction}", npc.name);
        let message = if seen_leaving {
            Some(format!("{} flees to the {direction}!", npc.name))
        } else {
            step.message
        };
        Some(Step {
            moved: step.moved,
            message,
        })
    }

    /// Looks for someone to fight.
    ///
    /// Non-hostile NPCs first defend anyone they like who is under attack in
    /// the room, then take on any hostile NPC present. Minions leave the
    /// second check to their own idle logic. Otherwise, with probability equal
    /// to the aggression (1 when `forced`), the NPC engages the first enemy
    /// present, the player first.
    pub fn scan_for_targets(
        &mut self,
        npc: &mut Npc,
        arena: &mut Arena,
        ctx: &mut TickContext<'_>,
        forced: bool,
    ) -> Option<Vec<String>> {
        let occupants: Vec<EntityId> = arena
            .ids_in_room(&npc.location)
            .into_iter()
            .filter(|&id| arena.get(id).is_some_and(|actor| actor.is_alive()))
            .collect();

        if !npc.is_hostile() {
            let aggressor = occupants.iter().copied().find(|&id| {
                let Some(actor) = arena.get(id) else {
                    return false;
                };
                !arena.factions.is_friendly(npc.faction, actor.faction())
                    && arena.threat.opponents(id).into_iter().any(|victim| {
                        arena.get(victim).is_some_and(|victim| {
                            victim.is_alive() && arena.factions.is_friendly(npc.faction, victim.faction())
                        })
                    })
            });
            if let Some(aggressor) = aggressor {
                return Some(self.engage(npc, aggressor, "moves to attack", arena, ctx));
            }

            if npc.behavior.current != Behavior::Minion {
                let intruder = occupants.iter().copied().find(|&id| {
                    id != npc.id
                        && arena
                            .npc(id)
                            .is_some_and(|other| other.faction == Faction::Hostile)
                });
                if let Some(intruder) = intruder {
                    return Some(self.engage(npc, intruder, "moves to attack", arena, ctx));
                }
            }
        }

        let aggression = if forced { 1.0 } else { npc.aggression };
        if aggression <= 0.0 {
            return None;
        }
        let player_id = arena.player_id();
        let mut candidates: Vec<EntityId> = occupants
            .into_iter()
            .filter(|&id| {
                arena
                    .get(id)
                    .is_some_and(|actor| arena.factions.is_hostile(npc.faction, actor.faction()))
            })
            .collect();
        candidates.sort_by_key(|&id| Some(id) != player_id);
        let target = *candidates.first()?;
        if self.rng.f32() >= aggression {
            return None;
        }
        Some(self.engage(npc, target, "moves to attack", arena, ctx))
    }

    /// Opens a fight and immediately takes a combat action.
    fn engage(
        &mut self,
        npc: &mut Npc,
        target: EntityId,
        verb: &str,
        arena: &mut Arena,
        ctx: &mut TickContext<'_>,
    ) -> Vec<String> {
        arena.threat.enter_combat(npc.id, target);
        arena.threat.set_target(npc.id, target);
        let target_name = arena
            .get(target)
            .map(|actor| actor.name().to_string())
            .unwrap_or_default();
        debug!("{} engages {target_name}", npc.name);

        let mut messages = Vec::new();
        if arena.player_in_room(&npc.location) {
            messages.push(format!("{} {verb} {target_name}!", npc.name));
        }
        messages.extend(self.resolver.try_attack(npc, arena, ctx));
        messages
    }

    // ========================================================================
    // Idle movement
    // ========================================================================

    fn idle(&mut self, npc: &mut Npc, arena: &mut Arena, ctx: &mut TickContext<'_>) -> Vec<String> {
        let step = match npc.behavior.current {
            Behavior::Stationary | Behavior::Retreating => Step::idle(),
            Behavior::Wanderer | Behavior::Aggressive | Behavior::Healer => {
                wander(npc, ctx.world, ctx.pathfinder, arena, &mut self.rng)
            },
            Behavior::Patrol => patrol(npc, ctx.world, ctx.pathfinder, arena, &mut self.rng),
            Behavior::Follower => follow(npc, ctx.world, ctx.pathfinder, arena),
            Behavior::Scheduled => follow_schedule(npc, ctx.world, ctx.pathfinder, arena),
            Behavior::Minion => return self.minion_idle(npc, arena, ctx),
        };
        if step.moved {
            npc.last_moved = ctx.now;
        }
        step.message.into_iter().collect()
    }

    /// Follows the owner; once together, assists, intercepts or attacks.
    fn minion_idle(&mut self, npc: &mut Npc, arena: &mut Arena, ctx: &mut TickContext<'_>) -> Vec<String> {
        let Some(owner_id) = npc.owner() else {
            return Vec::new();
        };
        let Some(owner_location) = arena.get(owner_id).map(|owner| owner.location().clone()) else {
            return Vec::new();
        };

        if owner_location != npc.location {
            let step = step_toward(npc, &owner_location, ctx.world, ctx.pathfinder, arena)
                .unwrap_or_default();
            if step.moved {
                npc.last_moved = ctx.now;
            }
            return step.message.into_iter().collect();
        }

        let here = npc.location.clone();
        let present = |id: EntityId| id != npc.id && arena.is_present(id, &here);
        if let Some(target) = arena.threat.target(owner_id).filter(|&id| present(id)) {
            return self.engage(npc, target, "moves to assist you against", arena, ctx);
        }
        if let Some(attacker) = arena
            .threat
            .attackers_of(owner_id)
            .into_iter()
            .find(|&id| present(id))
        {
            return self.engage(npc, attacker, "intercepts", arena, ctx);
        }
        let hostile = arena.ids_in_room(&here).into_iter().find(|&id| {
            arena.get(id).is_some_and(|actor| {
                actor.is_alive() && arena.factions.is_hostile(npc.faction, actor.faction())
            })
        });
        match hostile {
            Some(target) => self.engage(npc, target, "moves to attack", arena, ctx),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    use hearth_common::Location;

    use crate::attributes::Attributes;
    use crate::config::GameplayConfig;
    use crate::effects::{Effect, STUN};
    use crate::faction::Faction;
    use crate::npc::{ScheduleEntry, SummonBond};
    use crate::player::Player;
    use crate::spell::{SpellEffect, SpellRegistry};
    use crate::stats::{default_npc_stats, DamageType};
    use crate::world::{MockLootTable, MockNpcFactory, RoomGraph};

    const NOW: f64 = 100.0;

    fn loc(room: &str) -> Location {
        Location::new("town", room)
    }

    /// camp (safe) <-west/east-> gate <-south/north-> square
    fn graph() -> RoomGraph {
        let mut graph = RoomGraph::new();
        graph.connect(&loc("square"), "north", &loc("gate"), "south");
        graph.connect(&loc("gate"), "west", &loc("camp"), "east");
        graph.mark_safe(&loc("camp"));
        graph
    }

    fn config() -> GameplayConfig {
        let mut config = GameplayConfig::default();
        config.combat.min_hit_chance = 1.0;
        config.combat.max_hit_chance = 1.0;
        config.combat.npc_damage_variance = (0, 0);
        config.combat.player_damage_variance = (0, 0);
        config.combat.spell_variation = 0.0;
        config
    }

    fn registry() -> Rc<SpellRegistry> {
        let mut registry = SpellRegistry::new();
        registry.register(
            Spell::new("bolt", "Shadow Bolt", SpellEffect::Damage {
                damage_type: DamageType::Shadow,
            })
            .with_value(8),
        );
        registry.register(
            Spell::new("mend", "Mend", SpellEffect::Heal)
                .with_value(10)
                .with_target_type(TargetType::Friendly),
        );
        Rc::new(registry)
    }

    fn selector() -> BehaviorSelector {
        let resolver = CombatResolver::new(registry(), &config()).with_seed(3);
        BehaviorSelector::new(resolver).with_seed(5)
    }

    struct Harness {
        graph: RoomGraph,
        factory: MockNpcFactory,
        loot: MockLootTable,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                graph: graph(),
                factory: MockNpcFactory::new(),
                loot: MockLootTable::new(),
            }
        }

        fn ctx(&mut self, now: f64) -> TickContext<'_> {
            TickContext {
                now,
                dt: 1.0,
                world: &self.graph,
                pathfinder: &self.graph,
                factory: &mut self.factory,
                loot: &mut self.loot,
            }
        }
    }

    fn npc(name: &str, room: &str, faction: Faction) -> Npc {
        Npc::new(name.to_lowercase(), name, loc(room), &config().npc).with_faction(faction)
    }

    fn arena_with_player(room: &str) -> (Arena, EntityId) {
        let mut arena = Arena::new();
        let hero = arena.insert_player(Player::new("Hero", loc(room), &config().npc));
        (arena, hero)
    }

    fn player_health(arena: &Arena) -> i32 {
        arena.player().map_or(0, |p| p.attributes.health)
    }

    #[test]
    fn test_wounded_npc_flees_before_attacking() {
        let mut harness = Harness::new();
        let mut selector = selector();
        let (mut arena, hero) = arena_with_player("square");

        let mut goblin = npc("Goblin", "square", Faction::Hostile).with_flee_threshold(0.2);
        goblin.attributes = Attributes::new(default_npc_stats(), 100);
        goblin.attributes.health = 15;
        let goblin = arena.insert_npc(goblin);
        arena.threat.enter_combat(goblin, hero);

        let messages = selector.update_all(&mut arena, &mut harness.ctx(NOW));
        assert_eq!(messages, vec!["Goblin flees to the north!".to_string()]);
        assert_eq!(arena.npc(goblin).map(|n| n.location.clone()), Some(loc("gate")));
        assert!(!arena.threat.in_combat(goblin));
        assert!(!arena.threat.in_combat(hero));
        assert_eq!(player_health(&arena), 100);
    }

    #[test]
    fn test_low_mana_caster_retreats_instead_of_attacking() {
        let mut harness = Harness::new();
        let mut selector = selector();
        let (mut arena, hero) = arena_with_player("gate");

        let mut shaman = npc("Shaman", "gate", Faction::Hostile)
            .with_behavior(Behavior::Aggressive)
            .with_spells(vec!["bolt".to_string()], 1.0);
        shaman.attributes = shaman.attributes.clone().with_mana(100);
        shaman.attributes.mana = 10;
        let shaman = arena.insert_npc(shaman);
        arena.threat.enter_combat(shaman, hero);

        let messages = selector.update_all(&mut arena, &mut harness.ctx(NOW));
        assert_eq!(
            messages,
            vec!["Shaman looks exhausted and retreats from battle, heading west!".to_string()]
        );
        let shaman = arena.npc(shaman).expect("shaman");
        assert_eq!(shaman.behavior.current, Behavior::Retreating);
        assert_eq!(shaman.behavior.overrides, vec![Behavior::Aggressive]);
        assert_eq!(shaman.retreat_destination, Some(loc("camp")));
        assert!(!arena.threat.in_combat(hero));
        assert_eq!(player_health(&arena), 100);
    }

    #[test]
    fn test_retreat_walks_then_recovers() {
        let mut harness = Harness::new();
        let mut selector = selector();
        let mut arena = Arena::new();

        let mut shaman = npc("Shaman", "gate", Faction::Hostile).with_behavior(Behavior::Wanderer);
        shaman.attributes = shaman.attributes.clone().with_mana(10);
        shaman.attributes.mana = 9;
        let id = shaman.id;
        assert!(start_retreat(&mut shaman, &mut arena, &harness.graph).is_some());
        arena.insert_npc(shaman);

        selector.update_all(&mut arena, &mut harness.ctx(NOW));
        assert_eq!(arena.npc(id).map(|n| n.location.clone()), Some(loc("camp")));

        // Safe-room regeneration refills the last point of mana.
        selector.update_all(&mut arena, &mut harness.ctx(NOW + 1.0));
        selector.update_all(&mut arena, &mut harness.ctx(NOW + 2.0));
        let shaman = arena.npc(id).expect("shaman");
        assert_eq!(shaman.behavior.current, Behavior::Wanderer);
        assert!(shaman.retreat_destination.is_none());
    }

    #[test]
    fn test_retreat_without_path_changes_nothing() {
        let mut arena = Arena::new();
        let graph = RoomGraph::new();
        let mut loner = npc("Loner", "void", Faction::Hostile).with_behavior(Behavior::Patrol);
        assert!(start_retreat(&mut loner, &mut arena, &graph).is_none());
        assert_eq!(loner.behavior.current, Behavior::Patrol);
        assert!(loner.retreat_path.is_empty());
    }

    #[test]
    fn test_orphaned_minion_despawns_silently() {
        let mut harness = Harness::new();
        let mut selector = selector();
        let mut arena = Arena::new();

        let mut skeleton = npc("Skeleton", "square", Faction::PlayerMinion).with_behavior(Behavior::Minion);
        skeleton.summon = Some(SummonBond {
            owner: EntityId::from_raw(u64::MAX),
            spell_id: "raise".to_string(),
            created_at: 0.0,
            duration: 0.0,
        });
        let skeleton = arena.insert_npc(skeleton);

        let messages = selector.update_all(&mut arena, &mut harness.ctx(NOW));
        assert!(messages.is_empty());
        assert!(!arena.contains(skeleton));
    }

    #[test]
    fn test_expired_minion_crumbles() {
        let mut harness = Harness::new();
        let mut selector = selector();
        let (mut arena, hero) = arena_with_player("square");

        let mut skeleton = npc("Skeleton", "square", Faction::PlayerMinion).with_behavior(Behavior::Minion);
        skeleton.summon = Some(SummonBond {
            owner: hero,
            spell_id: "raise".to_string(),
            created_at: 0.0,
            duration: 30.0,
        });
        let skeleton = arena.insert_npc(skeleton);
        if let Some(player) = arena.player_mut() {
            player.register_summon("raise", skeleton);
        }

        let messages = selector.update_all(&mut arena, &mut harness.ctx(NOW));
        assert_eq!(messages, vec!["Your Skeleton crumbles to dust.".to_string()]);
        assert!(!arena.contains(skeleton));
        assert_eq!(arena.player().map(Player::total_summons), Some(0));
    }

    #[test]
    fn test_aggressive_npc_engages_and_attacks() {
        let mut harness = Harness::new();
        let mut selector = selector();
        let (mut arena, hero) = arena_with_player("square");
        let goblin = arena.insert_npc(npc("Goblin", "square", Faction::Hostile).with_aggression(1.0));

        let messages = selector.update_all(&mut arena, &mut harness.ctx(NOW));
        assert_eq!(
            messages,
            vec![
                "Goblin moves to attack Hero!".to_string(),
                "Goblin attacks Hero and deals 3 damage.".to_string(),
            ]
        );
        assert!(arena.threat.are_fighting(goblin, hero));
        assert_eq!(player_health(&arena), 97);
    }

    #[test]
    fn test_combat_cooldown_gates_next_attack() {
        let mut harness = Harness::new();
        let mut selector = selector();
        let (mut arena, _) = arena_with_player("square");
        arena.insert_npc(npc("Goblin", "square", Faction::Hostile).with_aggression(1.0));

        selector.update_all(&mut arena, &mut harness.ctx(NOW));
        assert!(selector.update_all(&mut arena, &mut harness.ctx(NOW + 1.0)).is_empty());
        let messages = selector.update_all(&mut arena, &mut harness.ctx(NOW + 3.0));
        assert_eq!(messages, vec!["Goblin attacks Hero and deals 3 damage.".to_string()]);
    }

    #[test]
    fn test_stunned_npc_takes_no_action() {
        let mut harness = Harness::new();
        let mut selector = selector();
        let (mut arena, hero) = arena_with_player("square");
        let mut goblin = npc("Goblin", "square", Faction::Hostile).with_aggression(1.0);
        goblin.attributes.apply_effect(Effect::control(STUN, 10.0), NOW);
        arena.insert_npc(goblin);

        selector.update_all(&mut arena, &mut harness.ctx(NOW));
        assert!(!arena.threat.in_combat(hero));
    }

    #[test]
    fn test_guard_defends_player() {
        let mut harness = Harness::new();
        let mut selector = selector();
        let (mut arena, hero) = arena_with_player("square");
        let guard = arena.insert_npc(npc("Guard", "square", Faction::Friendly));
        let wolf = arena.insert_npc(npc("Wolf", "square", Faction::Neutral));
        arena.threat.enter_combat(hero, wolf);

        let messages = selector.update_all(&mut arena, &mut harness.ctx(NOW));
        assert!(messages.contains(&"Guard moves to attack Wolf!".to_string()));
        assert!(arena.threat.are_fighting(guard, wolf));
    }

    #[test]
    fn test_guard_engages_idle_hostile() {
        let mut harness = Harness::new();
        let mut selector = selector();
        let (mut arena, _) = arena_with_player("square");
        let guard = arena.insert_npc(npc("Guard", "square", Faction::Friendly));
        let goblin = arena.insert_npc(
            npc("Goblin", "square", Faction::Hostile).with_behavior(Behavior::Stationary),
        );

        let messages = selector.update_all(&mut arena, &mut harness.ctx(NOW));
        assert_eq!(messages.first().map(String::as_str), Some("Guard moves to attack Goblin!"));
        assert!(arena.threat.are_fighting(guard, goblin));
    }

    #[test]
    fn test_neutral_npc_defends_without_aggression() {
        let mut harness = Harness::new();
        let mut selector = selector();
        let mut arena = Arena::new();
        let miller = arena.insert_npc(npc("Miller", "gate", Faction::Neutral).with_aggression(0.0));
        let goblin = arena.insert_npc(
            npc("Goblin", "gate", Faction::Hostile).with_behavior(Behavior::Stationary),
        );

        assert!(selector.update_all(&mut arena, &mut harness.ctx(NOW)).is_empty());
        assert!(arena.threat.are_fighting(miller, goblin));
    }

    #[test]
    fn test_healer_heals_most_wounded_ally() {
        let mut harness = Harness::new();
        let mut selector = selector();
        let (mut arena, _) = arena_with_player("square");

        let mut priest = npc("Priest", "square", Faction::Friendly)
            .with_behavior(Behavior::Healer)
            .with_spells(vec!["mend".to_string()], 0.0);
        priest.attributes = priest.attributes.clone().with_mana(50);
        arena.insert_npc(priest);

        let mut scratched = npc("Farmer", "square", Faction::Friendly);
        scratched.attributes.health = 15;
        let scratched = arena.insert_npc(scratched);
        let mut dying = npc("Miller", "square", Faction::Friendly);
        dying.attributes.health = 6;
        let dying = arena.insert_npc(dying);

        let messages = selector.update_all(&mut arena, &mut harness.ctx(NOW));
        assert_eq!(
            messages,
            vec!["Priest casts Mend! Miller is healed for 10 health!".to_string()]
        );
        assert_eq!(arena.npc(dying).map(|n| n.attributes.health), Some(16));
        assert_eq!(arena.npc(scratched).map(|n| n.attributes.health), Some(15));
    }

    #[test]
    fn test_aggressive_schedule_hour_forces_scan() {
        let mut harness = Harness::new();
        harness.graph.set_hour(22);
        let mut selector = selector();
        let (mut arena, hero) = arena_with_player("square");

        let cultist = npc("Cultist", "square", Faction::Hostile)
            .with_behavior(Behavior::Scheduled)
            .with_schedule_entry(20, ScheduleEntry::new(loc("square"), "chanting").aggressive());
        let cultist = arena.insert_npc(cultist);

        selector.update_all(&mut arena, &mut harness.ctx(NOW));
        assert!(arena.threat.are_fighting(cultist, hero));
    }

    #[test]
    fn test_npc_kill_rolls_loot_and_awards_experience() {
        let mut harness = Harness::new();
        let mut selector = selector();
        let mut arena = Arena::new();

        let wolf = arena.insert_npc(
            npc("Wolf", "square", Faction::Hostile)
                .with_aggression(1.0)
                .with_attack_power(50),
        );
        let rat = arena.insert_npc(npc("Rat", "square", Faction::Friendly));

        selector.update_all(&mut arena, &mut harness.ctx(NOW));
        assert_eq!(arena.npc(rat).map(|n| n.attributes.is_alive()), Some(false));
        assert_eq!(harness.loot.rolled, vec!["rat".to_string()]);
        assert!(arena.npc(wolf).is_some_and(|n| n.progression.experience > 0));
        assert!(!arena.threat.in_combat(wolf));
    }

    #[test]
    fn test_kill_message_lists_loot() {
        let mut harness = Harness::new();
        harness.loot.drops = Some(vec![crate::world::ItemDrop {
            item_id: "fang".to_string(),
            quantity: 1,
        }]);
        let mut selector = selector();
        let (mut arena, _) = arena_with_player("square");
        let guard = arena.insert_npc(npc("Guard", "square", Faction::Friendly).with_attack_power(50));
        let rat = arena.insert_npc(npc("Rat", "square", Faction::Hostile));

        let messages = selector.update_all(&mut arena, &mut harness.ctx(NOW));
        assert_eq!(
            messages,
            vec![
                "Guard moves to attack Rat!".to_string(),
                "Guard attacks Rat and deals 48 damage. Rat is defeated! Rat dropped a fang.".to_string(),
            ]
        );
        assert_eq!(arena.npc(rat).map(|n| n.attributes.is_alive()), Some(false));
        assert!(!arena.threat.in_combat(guard));
    }

    #[test]
    fn test_minion_kill_credits_owner() {
        let mut harness = Harness::new();
        let mut selector = selector();
        let (mut arena, hero) = arena_with_player("square");

        let mut skeleton = npc("Skeleton", "square", Faction::PlayerMinion)
            .with_behavior(Behavior::Minion)
            .with_attack_power(50);
        skeleton.summon = Some(SummonBond {
            owner: hero,
            spell_id: "raise".to_string(),
            created_at: NOW,
            duration: 0.0,
        });
        let skeleton = arena.insert_npc(skeleton);
        let imp = arena.insert_npc(npc("Imp", "square", Faction::Hostile));
        arena.threat.enter_combat(skeleton, imp);

        selector.update_all(&mut arena, &mut harness.ctx(NOW));
        assert_eq!(arena.npc(imp).map(|n| n.attributes.is_alive()), Some(false));
        assert!(arena.player().is_some_and(|p| p.progression.experience > 0));
        assert_eq!(arena.npc(skeleton).map(|n| n.progression.experience), Some(0));
    }

    #[test]
    fn test_dead_npcs_are_skipped() {
        let mut harness = Harness::new();
        let mut selector = selector();
        let (mut arena, hero) = arena_with_player("square");
        let mut goblin = npc("Goblin", "square", Faction::Hostile).with_aggression(1.0);
        goblin.attributes.kill();
        arena.insert_npc(goblin);

        assert!(selector.update_all(&mut arena, &mut harness.ctx(NOW)).is_empty());
        assert!(!arena.threat.in_combat(hero));
    }

    #[test]
    fn test_effect_death_narrates_loot() {
        let mut harness = Harness::new();
        harness.loot.drops = Some(vec![crate::world::ItemDrop {
            item_id: "rat_tail".to_string(),
            quantity: 1,
        }]);
        let mut selector = selector();
        let (mut arena, _) = arena_with_player("square");
        let mut rat = npc("Rat", "square", Faction::Neutral);
        rat.attributes.health = 4;
        rat.attributes
            .apply_effect(Effect::dot("Venom", 10.0, 50, DamageType::Poison), NOW - 3.0);
        let rat = arena.insert_npc(rat);

        let messages = selector.update_all(&mut arena, &mut harness.ctx(NOW));
        assert_eq!(messages.last().map(String::as_str), Some("Rat dropped a rat tail."));
        assert_eq!(arena.npc(rat).map(|n| n.attributes.is_alive()), Some(false));
        assert_eq!(harness.loot.rolled, vec!["rat".to_string()]);
    }

    #[test]
    fn test_dot_messages_visible_in_room() {
        let mut harness = Harness::new();
        let mut selector = selector();
        let (mut arena, _) = arena_with_player("square");
        let mut rat = npc("Rat", "square", Faction::Neutral);
        rat.attributes
            .apply_effect(Effect::dot("Venom", 10.0, 4, DamageType::Poison), NOW - 3.0);
        arena.insert_npc(rat);

        let messages = selector.update_all(&mut arena, &mut harness.ctx(NOW));
        assert_eq!(messages, vec!["Rat takes 4 poison damage from Venom.".to_string()]);
    }
}
