//! Combat resolution.
//!
//! This module provides:
//! - Level-scaled hit chance and melee damage
//! - Spell validation, mana/cooldown gating and casting
//! - The NPC `try_attack` procedure with spell/melee selection
//! - Defeat handling: combat links, experience, death hook

use std::rc::Rc;
use tracing::{debug, info};

use hearth_common::EntityId;

use crate::arena::Arena;
use crate::attributes::MINIMUM_DAMAGE_TAKEN;
use crate::behavior::start_retreat;
use crate::combatant::Combatant;
use crate::config::{CombatTuning, GameplayConfig, NpcTuning};
use crate::effects::{Effect, BLIND, VAMPIRISM};
use crate::events::{CombatEvent, EventBus};
use crate::npc::{Behavior, BehaviorState, Npc, SummonBond};
use crate::spell::{Spell, SpellEffect, SpellRegistry, TargetType};
use crate::stats::{DamageType, StatKind};
use crate::world::{loot_message, LootTable, NpcFactory, TickContext};

// ============================================================================
// Outcomes
// ============================================================================

/// Result of a melee attack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttackOutcome {
    /// Narration of the attack
    pub message: String,
    /// Whether the target died
    pub target_defeated: bool,
    /// Damage applied after mitigation
    pub damage: i32,
    /// Whether the attack connected
    pub hit: bool,
}

/// Result of a spell cast.
#[derive(Debug, Clone)]
pub struct CastOutcome {
    /// Narration of the cast
    pub message: String,
    /// Whether the target died
    pub target_defeated: bool,
    /// Damage or healing actually applied
    pub value: i32,
    /// Whether mana was spent or a substitute attack happened
    pub landed: bool,
    /// Whether a melee attack replaced a misaligned spell
    pub substituted: bool,
    /// Creature created by a summon spell, to be registered by the caller
    pub summoned: Option<Npc>,
}

impl CastOutcome {
    fn refused(message: String) -> Self {
        Self {
            message,
            target_defeated: false,
            value: 0,
            landed: false,
            substituted: false,
            summoned: None,
        }
    }

    fn from_attack(outcome: AttackOutcome) -> Self {
        Self {
            message: outcome.message,
            target_defeated: outcome.target_defeated,
            value: outcome.damage,
            landed: true,
            substituted: true,
            summoned: None,
        }
    }
}

/// Who a spell is aimed at.
pub enum SpellTarget<'a> {
    /// The caster itself.
    Caster,
    /// Another combatant.
    Other(&'a mut dyn Combatant),
}

// ============================================================================
// Resolver
// ============================================================================

/// Adjudicates attacks and spells.
pub struct CombatResolver {
    spells: Rc<SpellRegistry>,
    tuning: CombatTuning,
    npc_tuning: NpcTuning,
    rng: fastrand::Rng,
}

impl CombatResolver {
    /// Creates a resolver over a spell registry.
    #[must_use]
    pub fn new(spells: Rc<SpellRegistry>, config: &GameplayConfig) -> Self {
        Self {
            spells,
            tuning: config.combat.clone(),
            npc_tuning: config.npc.clone(),
            rng: fastrand::Rng::new(),
        }
    }

    /// Reseeds the random source.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = fastrand::Rng::with_seed(seed);
        self
    }

    /// The spell registry.
    #[must_use]
    pub fn spells(&self) -> &SpellRegistry {
        &self.spells
    }

    /// Combat tuning.
    #[must_use]
    pub const fn tuning(&self) -> &CombatTuning {
        &self.tuning
    }

    /// NPC tuning.
    #[must_use]
    pub const fn npc_tuning(&self) -> &NpcTuning {
        &self.npc_tuning
    }

    /// Chance that `attacker` lands a melee hit on `target`.
    #[must_use]
    pub fn hit_chance(&self, attacker: &dyn Combatant, target: &dyn Combatant) -> f32 {
        let t = &self.tuning;
        if attacker.has_effect(BLIND) {
            return t.blind_hit_chance;
        }
        let base = if attacker.is_player() {
            t.player_base_hit_chance
        } else {
            t.npc_base_hit_chance
        };
        let agility_diff = attacker.get_effective_stat(StatKind::Agility) as f32
            - target.get_effective_stat(StatKind::Agility) as f32;
        let chance = (base + agility_diff * t.agility_hit_factor).clamp(t.min_hit_chance, t.max_hit_chance);
        let tier = t.modifiers_between(attacker.level(), target.level());
        (chance * tier.hit).clamp(t.min_hit_chance, t.max_hit_chance)
    }

    /// Melee attack power including the player strength bonus.
    #[must_use]
    pub fn melee_power(&self, attacker: &dyn Combatant) -> i32 {
        let mut power = attacker.attack_power();
        if attacker.is_player() && self.tuning.player_strength_divisor > 0 {
            power += attacker.get_effective_stat(StatKind::Strength) / self.tuning.player_strength_divisor;
        }
        power
    }

    /// Performs one melee swing.
    pub fn attack(&mut self, attacker: &mut dyn Combatant, target: &mut dyn Combatant) -> AttackOutcome {
        let chance = self.hit_chance(attacker, target);
        if self.rng.f32() >= chance {
            return AttackOutcome {
                message: format!("{} attacks {}, but misses!", attacker.name(), target.name()),
                target_defeated: false,
                damage: 0,
                hit: false,
            };
        }

        let (low, high) = if attacker.is_player() {
            self.tuning.player_damage_variance
        } else {
            self.tuning.npc_damage_variance
        };
        let variance = if low < high { self.rng.i32(low..=high) } else { low };
        let raw = (self.melee_power(attacker) + variance).max(1);
        let tier = self.tuning.modifiers_between(attacker.level(), target.level());
        let scaled = ((raw as f32 * tier.damage) as i32).max(MINIMUM_DAMAGE_TAKEN);
        let applied = target.take_damage(scaled, DamageType::Physical);

        if applied > 0 && attacker.has_effect(VAMPIRISM) {
            let drained = (applied as f32 * self.tuning.vampiric_fraction) as i32;
            attacker.heal(drained);
        }

        let defeated = !target.is_alive();
        let mut message = format!(
            "{} attacks {} and deals {applied} damage.",
            attacker.name(),
            target.name()
        );
        if defeated {
            message.push_str(&format!(" {} is defeated!", target.name()));
        }
        AttackOutcome {
            message,
            target_defeated: defeated,
            damage: applied,
            hit: true,
        }
    }

    /// Base spell value scaled by intelligence and spell power with variance.
    pub fn spell_value(&mut self, caster: &dyn Combatant, base: i32) -> i32 {
        let t = &self.tuning;
        let intelligence = caster.get_effective_stat(StatKind::Intelligence);
        let divisor = t.spell_intelligence_divisor.max(1);
        let bonus = ((intelligence - t.spell_intelligence_baseline) / divisor).max(0)
            + caster.get_effective_stat(StatKind::SpellPower);
        let variation = 1.0 + (self.rng.f32() * 2.0 - 1.0) * t.spell_variation;
        (((base + bonus) as f32 * variation) as i32).max(t.min_spell_value)
    }

    /// Casts a spell.
    ///
    /// Target alignment is checked first: a spell aimed at a target of the
    /// wrong alignment is replaced by a melee attack, even when the spell
    /// itself could not be cast. Summon caps are checked before any mana is
    /// spent.
    pub fn cast_spell(
        &mut self,
        caster: &mut dyn Combatant,
        spell: &Spell,
        target: SpellTarget<'_>,
        now: f64,
        arena: &Arena,
        factory: &mut dyn NpcFactory,
    ) -> CastOutcome {
        let mut other = match target {
            SpellTarget::Other(other) if spell.target_type != TargetType::Caster => Some(other),
            _ => None,
        };
        if let Some(target) = other.as_deref_mut() {
            let hostile = arena.is_hostile(caster, target);
            let misaligned = match spell.target_type {
                TargetType::Enemy => !hostile,
                TargetType::Friendly => hostile,
                TargetType::Caster => false,
            };
            if misaligned {
                debug!("{} turns {} into a melee attack", caster.name(), spell.spell_id);
                return CastOutcome::from_attack(self.attack(caster, target));
            }
        } else if spell.target_type == TargetType::Enemy {
            return CastOutcome::refused(format!(
                "{} cannot cast {} on themselves.",
                caster.name(),
                spell.name
            ));
        }

        if !spell.can_cast(caster.level()) {
            return CastOutcome::refused(format!(
                "{} is not experienced enough to cast {}.",
                caster.name(),
                spell.name
            ));
        }
        if !caster.attributes().spell_ready(&spell.spell_id, now) {
            return CastOutcome::refused(format!("{} is not ready yet.", spell.name));
        }

        if let SpellEffect::Summon {
            template_id,
            max_summons,
            ..
        } = &spell.effect
        {
            if let Some(refusal) = self.check_summon_caps(caster, spell, template_id, *max_summons) {
                return CastOutcome::refused(refusal);
            }
        }

        if caster.attributes().mana < spell.mana_cost {
            return CastOutcome::refused(format!("{} lacks mana.", caster.name()));
        }
        caster.attributes_mut().spend_mana(spell.mana_cost);
        caster
            .attributes_mut()
            .set_spell_cooldown(spell.spell_id.clone(), now + spell.cooldown);

        let caster_name = caster.name().to_string();
        let caster_level = caster.level();
        let raw_value = self.spell_value(caster, spell.effect_value);

        if let SpellEffect::Summon {
            template_id,
            duration,
            ..
        } = &spell.effect
        {
            return self.summon(caster, spell, template_id, *duration, now, factory);
        }

        let target: &mut dyn Combatant = match other {
            Some(target) => target,
            None => caster,
        };
        let target_name = target.name().to_string();
        let cast = Spell::format_message(&spell.cast_message, &caster_name, &target_name, &spell.name, 0);
        let tier = self.tuning.modifiers_between(caster_level, target.level());
        let scaled = ((raw_value as f32 * tier.damage) as i32).max(self.tuning.min_spell_value);

        let (result, value) = match &spell.effect {
            SpellEffect::Damage { damage_type } => {
                let applied = target.take_damage(scaled, *damage_type);
                if applied == 0 {
                    (format!("The {} has no effect on {target_name}.", spell.name), 0)
                } else {
                    let mut text = Spell::format_message(
                        &spell.hit_message,
                        &caster_name,
                        &target_name,
                        &spell.name,
                        applied,
                    );
                    text.push_str(&resistance_flavor(target, &target_name, *damage_type));
                    (text, applied)
                }
            },
            SpellEffect::Heal => {
                let healed = target.heal(scaled);
                let text = Spell::format_message(
                    &spell.heal_message,
                    &caster_name,
                    &target_name,
                    &spell.name,
                    healed,
                );
                (text, healed)
            },
            SpellEffect::ApplyDot {
                dot_name,
                dot_duration,
                dot_damage_per_tick,
                dot_tick_interval,
                dot_damage_type,
            } => {
                let duration = if *dot_duration > 0.0 { *dot_duration } else { self.tuning.dot_duration };
                let interval = if *dot_tick_interval > 0.0 {
                    *dot_tick_interval
                } else {
                    self.tuning.dot_tick_interval
                };
                let effect = Effect::dot(dot_name.clone(), duration, *dot_damage_per_tick, *dot_damage_type)
                    .with_tick_interval(interval);
                if target.apply_effect(effect, now) {
                    (format!("{target_name} is afflicted by {dot_name}."), 0)
                } else {
                    (format!("The {} has no effect on {target_name}.", spell.name), 0)
                }
            },
            SpellEffect::Summon { .. } => (String::new(), 0),
        };

        let defeated = !target.is_alive() && matches!(spell.effect, SpellEffect::Damage { .. });
        let mut message = format!("{cast} {result}");
        if defeated {
            message.push_str(&format!(" {target_name} is defeated!"));
        }
        CastOutcome {
            message,
            target_defeated: defeated,
            value,
            landed: true,
            substituted: false,
            summoned: None,
        }
    }

    fn check_summon_caps(
        &self,
        caster: &mut dyn Combatant,
        spell: &Spell,
        template_id: &str,
        max_summons: usize,
    ) -> Option<String> {
        let name = caster.name().to_string();
        let Some(player) = caster.as_player_mut() else {
            return Some(format!("{name} cannot cast {}.", spell.name));
        };
        if player.summons_from(&spell.spell_id) >= max_summons {
            return Some(format!("You cannot control any more {template_id} summons."));
        }
        if player.total_summons() >= player.max_total_summons {
            return Some("You cannot control any more summons.".to_string());
        }
        None
    }

    fn summon(
        &mut self,
        caster: &mut dyn Combatant,
        spell: &Spell,
        template_id: &str,
        duration: f64,
        now: f64,
        factory: &mut dyn NpcFactory,
    ) -> CastOutcome {
        let caster_name = caster.name().to_string();
        let cast = Spell::format_message(&spell.cast_message, &caster_name, &caster_name, &spell.name, 0);
        let Some(player) = caster.as_player_mut() else {
            return CastOutcome::refused(format!("{caster_name} cannot cast {}.", spell.name));
        };
        let level = self.tuning.summon_level;
        let Some(mut creature) = factory.create_summon(template_id, &player.location, level) else {
            return CastOutcome {
                message: format!("{cast} The summoning fails."),
                landed: true,
                ..CastOutcome::refused(String::new())
            };
        };

        creature.faction = crate::faction::Faction::PlayerMinion;
        creature.location = player.location.clone();
        creature.home = player.location.clone();
        creature.attributes.level = level;
        creature.behavior = BehaviorState::new(Behavior::Minion);
        creature.summon = Some(SummonBond {
            owner: player.id,
            spell_id: spell.spell_id.clone(),
            created_at: now,
            duration,
        });
        player.register_summon(&spell.spell_id, creature.id);
        info!("{} summoned {} ({})", player.name, creature.name, creature.id);

        CastOutcome {
            message: format!("{cast} A {} rises to serve you!", creature.name),
            target_defeated: false,
            value: 0,
            landed: true,
            substituted: false,
            summoned: Some(creature),
        }
    }

    /// Experience for defeating a target, as seen by the receiver.
    #[must_use]
    pub fn xp_reward(&self, receiver_level: u32, target_level: u32, target_max_health: i32) -> u32 {
        let t = &self.tuning;
        let health_part = (target_max_health / t.xp_health_divisor.max(1)).max(1) as u32;
        let base = health_part + target_level * t.xp_level_multiplier;
        let tier = t.modifiers_between(receiver_level, target_level);
        ((base as f32 * tier.xp) as u32).max(t.min_xp_gain)
    }

    // ========================================================================
    // NPC combat turn
    // ========================================================================

    /// One combat action for an NPC already in combat.
    ///
    /// Returns a message only when the player can see the action.
    pub fn try_attack(&mut self, npc: &mut Npc, arena: &mut Arena, ctx: &mut TickContext<'_>) -> Option<String> {
        let now = ctx.now;
        if !npc.combat_ready(now) {
            return None;
        }
        let target_id = self.validate_target(npc, arena)?;
        let mut target = arena.take(target_id)?;
        let mut action: Option<(String, bool, i32)> = None;

        if npc.attributes.max_mana > 0
            && !npc.usable_spells.is_empty()
            && self.rng.f32() < npc.spell_cast_chance
        {
            if npc.attributes.mana_fraction() < self.npc_tuning.low_mana_retreat_threshold {
                arena.restore(target);
                if let Some(message) = start_retreat(npc, arena, ctx.pathfinder) {
                    npc.last_combat_action = now;
                    return arena.player_in_room(&npc.location).then_some(message);
                }
                target = arena.take(target_id)?;
            } else if let Some(spell) = self.choose_offensive_spell(npc, now) {
                let outcome = self.cast_spell(
                    npc,
                    &spell,
                    SpellTarget::Other(&mut target),
                    now,
                    arena,
                    ctx.factory,
                );
                action = Some((outcome.message, outcome.target_defeated, outcome.value));
            }
        }

        if action.is_none() && npc.attack_ready(now) {
            let outcome = self.attack(npc, &mut target);
            npc.last_attack_time = now;
            action = Some((outcome.message, outcome.target_defeated, outcome.damage));
        }
        arena.restore(target);

        let (mut message, defeated, damage) = action?;
        npc.last_combat_action = now;
        if damage > 0 {
            arena.events.publish(CombatEvent::DamageDealt {
                source: npc.id,
                target: target_id,
                amount: damage,
            });
        }
        if defeated {
            if let Some(extra) = self.resolve_defeat(npc, target_id, arena, ctx.loot) {
                message.push(' ');
                message.push_str(&extra);
            }
        }
        arena.player_in_room(&npc.location).then_some(message)
    }

    /// Keeps the focus on a living, co-located opponent.
    ///
    /// Links to opponents that died or left are severed. Returns `None` and
    /// leaves combat when nobody valid remains.
    fn validate_target(&self, npc: &Npc, arena: &mut Arena) -> Option<EntityId> {
        for opponent in arena.threat.opponents(npc.id) {
            if !arena.is_present(opponent, &npc.location) {
                arena.threat.exit_combat(npc.id, opponent);
            }
        }
        let target = arena
            .threat
            .target(npc.id)
            .or_else(|| arena.threat.opponents(npc.id).first().copied());
        match target {
            Some(target) => {
                arena.threat.set_target(npc.id, target);
                Some(target)
            },
            None => {
                arena.threat.exit_all(npc.id);
                None
            },
        }
    }

    fn choose_offensive_spell(&mut self, npc: &Npc, now: f64) -> Option<Spell> {
        let candidates: Vec<&Spell> = npc
            .usable_spells
            .iter()
            .filter_map(|id| self.spells.get_spell(id))
            .filter(|spell| {
                spell.target_type == TargetType::Enemy
                    && spell.can_cast(npc.attributes.level)
                    && npc.attributes.mana >= spell.mana_cost
                    && npc.attributes.spell_ready(&spell.spell_id, now)
            })
            .collect();
        if candidates.is_empty() {
            return None;
        }
        let pick = self.rng.usize(..candidates.len());
        candidates.get(pick).map(|spell| (*spell).clone())
    }

    /// Handles a defeat caused by `killer`.
    ///
    /// Severs the link, awards experience (to the owner when the killer is a
    /// summon) and runs the death hook. Returns the loot and level-up lines,
    /// if any.
    pub fn resolve_defeat(
        &mut self,
        killer: &mut dyn Combatant,
        target_id: EntityId,
        arena: &mut Arena,
        loot: &mut dyn LootTable,
    ) -> Option<String> {
        arena.threat.exit_combat(killer.id(), target_id);
        let (target_name, target_level, target_max_health) = arena.get(target_id).map(|target| {
            (
                target.name().to_string(),
                target.level(),
                target.attributes().max_health,
            )
        })?;

        let events = arena.events.clone();
        let owner = killer
            .owner()
            .filter(|&owner| arena.get(owner).is_some_and(|actor| actor.is_player()));
        let level_line = match owner.and_then(|owner| arena.get_mut(owner)) {
            Some(owner) => self.award_experience(owner, target_level, target_max_health, &events),
            None => self.award_experience(killer, target_level, target_max_health, &events),
        };

        let drops = arena.handle_death(target_id, Some(killer.id()), loot);
        let lines: Vec<String> = loot_message(&target_name, &drops)
            .into_iter()
            .chain(level_line)
            .collect();
        (!lines.is_empty()).then(|| lines.join(" "))
    }

    fn award_experience(
        &self,
        receiver: &mut dyn Combatant,
        target_level: u32,
        target_max_health: i32,
        events: &EventBus,
    ) -> Option<String> {
        let xp = self.xp_reward(receiver.level(), target_level, target_max_health);
        let levels = receiver.gain_experience(xp, &self.npc_tuning);
        debug!("{} gains {xp} experience", receiver.name());
        if levels == 0 {
            return None;
        }
        let level = receiver.level();
        info!("{} reached level {level}", receiver.name());
        events.publish(CombatEvent::LevelledUp {
            entity_id: receiver.id(),
            level,
        });
        Some(format!("{} reaches level {level}!", receiver.name()))
    }

    // ========================================================================
    // Player actions
    // ========================================================================

    /// The player swings at a co-located target.
    pub fn player_attack(
        &mut self,
        arena: &mut Arena,
        target_id: EntityId,
        loot: &mut dyn LootTable,
    ) -> Option<AttackOutcome> {
        let player_id = arena.player_id()?;
        if target_id == player_id {
            return None;
        }
        let mut player = arena.take(player_id)?;
        let Some(mut target) = arena.take(target_id) else {
            arena.restore(player);
            return None;
        };
        if !player.is_alive() || !target.is_alive() || player.location() != target.location() {
            arena.restore(target);
            arena.restore(player);
            return None;
        }

        arena.threat.enter_combat(player_id, target_id);
        arena.threat.set_target(player_id, target_id);
        let mut outcome = self.attack(&mut player, &mut target);
        arena.restore(target);
        if outcome.damage > 0 {
            arena.events.publish(CombatEvent::DamageDealt {
                source: player_id,
                target: target_id,
                amount: outcome.damage,
            });
        }
        if outcome.target_defeated {
            if let Some(extra) = self.resolve_defeat(&mut player, target_id, arena, loot) {
                outcome.message.push(' ');
                outcome.message.push_str(&extra);
            }
        }
        arena.restore(player);
        Some(outcome)
    }

    /// The player casts a spell by id, on a target or on themselves.
    ///
    /// Summoned creatures are registered in the arena.
    pub fn player_cast(
        &mut self,
        arena: &mut Arena,
        spell_id: &str,
        target_id: Option<EntityId>,
        ctx: &mut TickContext<'_>,
    ) -> Option<CastOutcome> {
        let spell = self.spells.get_spell(spell_id)?.clone();
        let player_id = arena.player_id()?;
        let mut player = arena.take(player_id)?;
        if !player.is_alive() {
            arena.restore(player);
            return None;
        }

        let mut outcome = match target_id.filter(|&id| id != player_id) {
            Some(target_id) => {
                let Some(mut target) = arena.take(target_id) else {
                    arena.restore(player);
                    return None;
                };
                let outcome = self.cast_spell(
                    &mut player,
                    &spell,
                    SpellTarget::Other(&mut target),
                    ctx.now,
                    arena,
                    ctx.factory,
                );
                arena.restore(target);
                if outcome.landed && (outcome.substituted || spell.target_type == TargetType::Enemy) {
                    arena.threat.enter_combat(player_id, target_id);
                }
                let mut outcome = outcome;
                let damaging = outcome.substituted || matches!(spell.effect, SpellEffect::Damage { .. });
                if outcome.value > 0 && damaging {
                    arena.events.publish(CombatEvent::DamageDealt {
                        source: player_id,
                        target: target_id,
                        amount: outcome.value,
                    });
                }
                if outcome.target_defeated {
                    if let Some(extra) = self.resolve_defeat(&mut player, target_id, arena, ctx.loot) {
                        outcome.message.push(' ');
                        outcome.message.push_str(&extra);
                    }
                }
                outcome
            },
            None => self.cast_spell(
                &mut player,
                &spell,
                SpellTarget::Caster,
                ctx.now,
                arena,
                ctx.factory,
            ),
        };
        arena.restore(player);

        if let Some(creature) = outcome.summoned.take() {
            let summon = arena.insert_npc(creature);
            arena.events.publish(CombatEvent::Summoned {
                owner: player_id,
                summon,
            });
        }
        Some(outcome)
    }
}

fn resistance_flavor(target: &dyn Combatant, name: &str, damage_type: DamageType) -> String {
    let resistance = target.attributes().resistance(damage_type);
    if resistance < 0 {
        format!(" {name} is weak to {damage_type}!")
    } else if resistance >= 50 {
        format!(" {name} strongly resists the {damage_type}.")
    } else if resistance > 0 {
        format!(" {name} resists the {damage_type}.")
    } else {
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    use hearth_common::Location;

    use crate::attributes::Attributes;
    use crate::faction::Faction;
    use crate::player::Player;
    use crate::stats::default_npc_stats;
    use crate::world::{MockLootTable, MockNpcFactory, RoomGraph};

    const NOW: f64 = 50.0;

    fn square() -> Location {
        Location::new("town", "square")
    }

    fn sure_hits() -> GameplayConfig {
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
        registry.register(
            Spell::new("meteor", "Meteor", SpellEffect::Damage {
                damage_type: DamageType::Fire,
            })
            .with_value(40)
            .with_level_required(20),
        );
        registry.register(
            Spell::new("venom", "Venom Spit", SpellEffect::ApplyDot {
                dot_name: "Venom".to_string(),
                dot_duration: 9.0,
                dot_damage_per_tick: 2,
                dot_tick_interval: 3.0,
                dot_damage_type: DamageType::Poison,
            })
            .with_mana_cost(5),
        );
        registry.register(
            Spell::new("raise", "Raise Dead", SpellEffect::Summon {
                template_id: "skeleton".to_string(),
                duration: 60.0,
                max_summons: 1,
            })
            .with_target_type(TargetType::Caster),
        );
        Rc::new(registry)
    }

    fn resolver() -> CombatResolver {
        CombatResolver::new(registry(), &sure_hits()).with_seed(11)
    }

    fn spell(resolver: &CombatResolver, id: &str) -> Spell {
        resolver.spells().get_spell(id).cloned().expect("registered spell")
    }

    fn hero() -> Player {
        Player::new("Hero", square(), &NpcTuning::default())
    }

    fn rat() -> Npc {
        Npc::new("rat", "Rat", square(), &NpcTuning::default()).with_faction(Faction::Hostile)
    }

    fn brute(level: u32) -> Npc {
        let attributes = Attributes::new(default_npc_stats(), 1000)
            .with_level(level)
            .with_stat(StatKind::Defense, 2);
        Npc::new("brute", "Brute", square(), &NpcTuning::default())
            .with_faction(Faction::Hostile)
            .with_attributes(attributes)
    }

    #[test]
    fn test_higher_level_target_takes_less_damage() {
        let mut resolver = resolver();
        let mut attacker = Npc::new("ogre", "Ogre", square(), &NpcTuning::default()).with_attack_power(20);

        let mut peer = brute(1);
        let mut elite = brute(50);
        assert_eq!(resolver.attack(&mut attacker, &mut peer).damage, 18);
        assert_eq!(resolver.attack(&mut attacker, &mut elite).damage, 10);
    }

    #[test]
    fn test_blind_attacker_uses_fixed_chance() {
        let resolver = CombatResolver::new(registry(), &GameplayConfig::default());
        let mut attacker = rat();
        let target = hero();
        attacker.attributes.apply_effect(Effect::control(BLIND, 10.0), NOW);
        assert!((resolver.hit_chance(&attacker, &target) - 0.20).abs() < f32::EPSILON);
    }

    #[test]
    fn test_miss_message() {
        let mut config = sure_hits();
        config.combat.min_hit_chance = 0.0;
        config.combat.max_hit_chance = 0.0;
        let mut resolver = CombatResolver::new(registry(), &config);
        let mut attacker = rat();
        let mut target = hero();

        let outcome = resolver.attack(&mut attacker, &mut target);
        assert!(!outcome.hit);
        assert_eq!(outcome.message, "Rat attacks Hero, but misses!");
        assert_eq!(target.attributes.health, 100);
    }

    #[test]
    fn test_player_strength_bonus_and_defeat_message() {
        let mut resolver = resolver();
        let mut player = hero();
        let mut target = rat();
        target.attributes.health = 6;

        assert_eq!(resolver.melee_power(&player), 8);
        let outcome = resolver.attack(&mut player, &mut target);
        assert_eq!(outcome.message, "Hero attacks Rat and deals 6 damage. Rat is defeated!");
        assert!(outcome.target_defeated);
    }

    #[test]
    fn test_vampiric_attacker_heals() {
        let mut resolver = resolver();
        let mut attacker = rat().with_attack_power(20);
        attacker.attributes.health = 10;
        attacker.attributes.apply_effect(Effect::control(VAMPIRISM, 30.0), NOW);
        let mut target = brute(1);

        let outcome = resolver.attack(&mut attacker, &mut target);
        assert_eq!(outcome.damage, 18);
        assert_eq!(attacker.attributes.health, 19);
    }

    #[test]
    fn test_damage_spell_spends_mana_and_starts_cooldown() {
        let mut resolver = resolver();
        let arena = Arena::new();
        let mut factory = MockNpcFactory::new();
        let bolt = spell(&resolver, "bolt");
        let mut player = hero();
        let mut target = rat();

        let outcome = resolver.cast_spell(
            &mut player,
            &bolt,
            SpellTarget::Other(&mut target),
            NOW,
            &arena,
            &mut factory,
        );
        assert_eq!(
            outcome.message,
            "Hero casts Shadow Bolt! The Shadow Bolt hits Rat for 8 damage!"
        );
        assert_eq!(target.attributes.health, 22);
        assert_eq!(player.attributes.mana, 40);
        assert!(!player.attributes.spell_ready("bolt", NOW + 1.0));

        let again = resolver.cast_spell(
            &mut player,
            &bolt,
            SpellTarget::Other(&mut target),
            NOW + 1.0,
            &arena,
            &mut factory,
        );
        assert!(!again.landed);
        assert_eq!(again.message, "Shadow Bolt is not ready yet.");
        assert_eq!(player.attributes.mana, 40);
    }

    #[test]
    fn test_resistance_flavor() {
        let mut resolver = resolver();
        let arena = Arena::new();
        let mut factory = MockNpcFactory::new();
        let bolt = spell(&resolver, "bolt");
        let mut player = hero();
        let mut target = rat();
        target.attributes = target
            .attributes
            .clone()
            .with_resistance(DamageType::Shadow, 50);

        let outcome = resolver.cast_spell(
            &mut player,
            &bolt,
            SpellTarget::Other(&mut target),
            NOW,
            &arena,
            &mut factory,
        );
        assert!(outcome.message.ends_with(" Rat strongly resists the shadow."));
        assert_eq!(outcome.value, 4);
    }

    #[test]
    fn test_lacking_mana_changes_nothing() {
        let mut resolver = resolver();
        let arena = Arena::new();
        let mut factory = MockNpcFactory::new();
        let bolt = spell(&resolver, "bolt");
        let mut player = hero();
        player.attributes.mana = 5;
        let mut target = rat();

        let outcome = resolver.cast_spell(
            &mut player,
            &bolt,
            SpellTarget::Other(&mut target),
            NOW,
            &arena,
            &mut factory,
        );
        assert_eq!(outcome.message, "Hero lacks mana.");
        assert!(!outcome.landed);
        assert_eq!(player.attributes.mana, 5);
        assert!(player.attributes.spell_ready("bolt", NOW));
        assert_eq!(target.attributes.health, 30);
    }

    #[test]
    fn test_level_requirement() {
        let mut resolver = resolver();
        let arena = Arena::new();
        let mut factory = MockNpcFactory::new();
        let meteor = spell(&resolver, "meteor");
        let mut player = hero();
        let mut target = rat();

        let outcome = resolver.cast_spell(
            &mut player,
            &meteor,
            SpellTarget::Other(&mut target),
            NOW,
            &arena,
            &mut factory,
        );
        assert_eq!(outcome.message, "Hero is not experienced enough to cast Meteor.");
        assert_eq!(player.attributes.mana, 50);
    }

    #[test]
    fn test_enemy_spell_without_target_is_refused() {
        let mut resolver = resolver();
        let arena = Arena::new();
        let mut factory = MockNpcFactory::new();
        let bolt = spell(&resolver, "bolt");
        let mut player = hero();

        let outcome = resolver.cast_spell(&mut player, &bolt, SpellTarget::Caster, NOW, &arena, &mut factory);
        assert_eq!(outcome.message, "Hero cannot cast Shadow Bolt on themselves.");
        assert_eq!(player.attributes.mana, 50);
    }

    #[test]
    fn test_heal_on_enemy_becomes_melee() {
        let mut resolver = resolver();
        let arena = Arena::new();
        let mut factory = MockNpcFactory::new();
        let mend = spell(&resolver, "mend");
        let mut shaman = rat().with_attack_power(10);
        shaman.attributes = shaman.attributes.clone().with_mana(30);
        let mut player = hero();
        player.attributes.health = 50;

        let outcome = resolver.cast_spell(
            &mut shaman,
            &mend,
            SpellTarget::Other(&mut player),
            NOW,
            &arena,
            &mut factory,
        );
        assert!(outcome.substituted);
        assert_eq!(outcome.message, "Rat attacks Hero and deals 10 damage.");
        assert_eq!(player.attributes.health, 40);
        assert_eq!(shaman.attributes.mana, 30);
    }

    #[test]
    fn test_misaligned_spell_on_cooldown_still_becomes_melee() {
        let mut resolver = resolver();
        let arena = Arena::new();
        let mut factory = MockNpcFactory::new();
        let mend = spell(&resolver, "mend");
        let mut shaman = rat().with_attack_power(10);
        shaman.attributes = shaman.attributes.clone().with_mana(30);
        shaman.attributes.set_spell_cooldown("mend", NOW + 30.0);
        let mut player = hero();

        let outcome = resolver.cast_spell(
            &mut shaman,
            &mend,
            SpellTarget::Other(&mut player),
            NOW,
            &arena,
            &mut factory,
        );
        assert!(outcome.substituted);
        assert_eq!(outcome.message, "Rat attacks Hero and deals 10 damage.");
        assert_eq!(player.attributes.health, 90);
    }

    #[test]
    fn test_damage_spell_on_ally_becomes_melee() {
        let mut resolver = resolver();
        let arena = Arena::new();
        let mut factory = MockNpcFactory::new();
        let bolt = spell(&resolver, "bolt");
        let mut player = hero();
        let mut guard = Npc::new("guard", "Guard", square(), &NpcTuning::default())
            .with_faction(Faction::Friendly);

        let outcome = resolver.cast_spell(
            &mut player,
            &bolt,
            SpellTarget::Other(&mut guard),
            NOW,
            &arena,
            &mut factory,
        );
        assert!(outcome.substituted);
        assert_eq!(player.attributes.mana, 50);
        assert_eq!(guard.attributes.health, 24);
    }

    #[test]
    fn test_dot_spell_applies_effect() {
        let mut resolver = resolver();
        let arena = Arena::new();
        let mut factory = MockNpcFactory::new();
        let venom = spell(&resolver, "venom");
        let mut player = hero();
        let mut target = rat();

        let outcome = resolver.cast_spell(
            &mut player,
            &venom,
            SpellTarget::Other(&mut target),
            NOW,
            &arena,
            &mut factory,
        );
        assert_eq!(outcome.message, "Hero casts Venom Spit! Rat is afflicted by Venom.");
        assert_eq!(outcome.value, 0);
        assert_eq!(target.attributes.health, target.attributes.max_health);
        assert!(target.attributes.has_effect("venom"));
        assert_eq!(player.attributes.mana, 45);
    }

    #[test]
    fn test_summon_caps_checked_before_mana() {
        let mut resolver = resolver();
        let arena = Arena::new();
        let mut factory = MockNpcFactory::new();
        let raise = spell(&resolver, "raise");
        let mut player = hero();
        player.attributes.mana = 0;
        player.register_summon("raise", EntityId::from_raw(u64::MAX));

        let outcome = resolver.cast_spell(&mut player, &raise, SpellTarget::Caster, NOW, &arena, &mut factory);
        assert_eq!(outcome.message, "You cannot control any more skeleton summons.");

        player.active_summons.clear();
        player.max_total_summons = 0;
        let outcome = resolver.cast_spell(&mut player, &raise, SpellTarget::Caster, NOW, &arena, &mut factory);
        assert_eq!(outcome.message, "You cannot control any more summons.");
        assert!(factory.created.is_empty());
    }

    #[test]
    fn test_npc_cannot_summon() {
        let mut resolver = resolver();
        let arena = Arena::new();
        let mut factory = MockNpcFactory::new();
        let raise = spell(&resolver, "raise");
        let mut necromancer = rat();
        necromancer.attributes = necromancer.attributes.clone().with_mana(50);

        let outcome = resolver.cast_spell(
            &mut necromancer,
            &raise,
            SpellTarget::Caster,
            NOW,
            &arena,
            &mut factory,
        );
        assert!(!outcome.landed);
        assert_eq!(necromancer.attributes.mana, 50);
    }

    #[test]
    fn test_player_cast_registers_summon() {
        let mut resolver = resolver();
        let mut arena = Arena::new();
        let hero_id = arena.insert_player(hero());
        let graph = RoomGraph::new();
        let mut factory = MockNpcFactory::new();
        let mut loot = MockLootTable::new();
        let mut ctx = TickContext {
            now: NOW,
            dt: 1.0,
            world: &graph,
            pathfinder: &graph,
            factory: &mut factory,
            loot: &mut loot,
        };

        let outcome = resolver
            .player_cast(&mut arena, "raise", None, &mut ctx)
            .expect("known spell");
        assert_eq!(outcome.message, "Hero casts Raise Dead! A Skeleton rises to serve you!");

        let player = arena.player().expect("player");
        let summons = player.summon_ids();
        assert_eq!(summons.len(), 1);
        let skeleton = arena.npc(summons[0]).expect("summon in arena");
        assert_eq!(skeleton.owner(), Some(hero_id));
        assert_eq!(skeleton.behavior.current, Behavior::Minion);
        assert_eq!(skeleton.attributes.level, 10);
        assert!(arena.events.drain().contains(&CombatEvent::Summoned {
            owner: hero_id,
            summon: summons[0],
        }));
    }

    #[test]
    fn test_player_attack_kill_awards_experience() {
        let mut resolver = resolver();
        let mut arena = Arena::new();
        arena.insert_player(hero());
        let mut weak = rat();
        weak.attributes.health = 1;
        let rat_id = arena.insert_npc(weak);
        let mut loot = MockLootTable::new();

        let outcome = resolver
            .player_attack(&mut arena, rat_id, &mut loot)
            .expect("valid target");
        assert!(outcome.target_defeated);
        assert_eq!(arena.player().map(|p| p.progression.experience), Some(11));
        assert_eq!(loot.rolled, vec!["rat".to_string()]);
        assert!(!arena.threat.in_combat(rat_id));
    }

    #[test]
    fn test_try_attack_drops_absent_target() {
        let mut resolver = resolver();
        let mut arena = Arena::new();
        let hero_id = arena.insert_player(Player::new("Hero", Location::new("town", "gate"), &NpcTuning::default()));
        let mut npc = rat();
        arena.threat.enter_combat(npc.id, hero_id);

        let graph = RoomGraph::new();
        let mut factory = MockNpcFactory::new();
        let mut loot = MockLootTable::new();
        let mut ctx = TickContext {
            now: NOW,
            dt: 1.0,
            world: &graph,
            pathfinder: &graph,
            factory: &mut factory,
            loot: &mut loot,
        };

        assert!(resolver.try_attack(&mut npc, &mut arena, &mut ctx).is_none());
        assert!(!arena.threat.in_combat(npc.id));
        assert!(!arena.threat.in_combat(hero_id));
    }

    #[test]
    fn test_xp_reward_scales_with_tier() {
        let resolver = resolver();
        assert_eq!(resolver.xp_reward(1, 1, 30), 11);
        assert_eq!(resolver.xp_reward(1, 4, 30), (26.0_f32 * 2.5) as u32);
        assert_eq!(resolver.xp_reward(10, 1, 1), 1);
    }

    proptest! {
        #[test]
        fn prop_hit_chance_stays_in_bounds(
            attacker_agility in i32::MIN / 2..i32::MAX / 2,
            target_agility in i32::MIN / 2..i32::MAX / 2,
            attacker_level in 1u32..80,
            target_level in 1u32..80,
        ) {
            let resolver = CombatResolver::new(registry(), &GameplayConfig::default());
            let mut attacker = rat();
            attacker.attributes = attacker
                .attributes
                .clone()
                .with_stat(StatKind::Agility, attacker_agility)
                .with_level(attacker_level);
            let mut target = rat();
            target.attributes = target
                .attributes
                .clone()
                .with_stat(StatKind::Agility, target_agility)
                .with_level(target_level);

            let chance = resolver.hit_chance(&attacker, &target);
            prop_assert!((0.05..=0.95).contains(&chance));
        }
    }
}
