//! Timed status effects.
//!
//! This module provides:
//! - Effect descriptors (damage/heal over time, stat modifiers, crowd control)
//! - Application with refresh-by-name semantics
//! - The per-tick effect pass with flavor messages
//!
//! An entity holds at most one effect per name. Stat deltas of a `stat_mod`
//! effect enter the modifier map when it is applied and leave it when the
//! effect is removed or expires.

use serde::{Deserialize, Serialize};

use crate::attributes::Attributes;
use crate::stats::{DamageType, StatMap};

/// Name of the control effect that suppresses all NPC behavior.
pub const STUN: &str = "Stun";
/// Name of the control effect that cripples hit chance.
pub const BLIND: &str = "Blind";
/// Name of the effect that returns part of melee damage as healing.
pub const VAMPIRISM: &str = "Vampirism";

// ============================================================================
// Effect descriptors
// ============================================================================

/// Kind-specific payload of an effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EffectKind {
    /// Damage over time.
    Dot {
        /// Damage per tick before mitigation.
        damage_per_tick: i32,
        /// Damage type of each tick.
        #[serde(default = "default_dot_damage_type")]
        damage_type: DamageType,
    },
    /// Healing over time.
    Hot {
        /// Healing per tick.
        heal_per_tick: i32,
    },
    /// Transient stat deltas.
    StatMod {
        /// Delta per stat.
        modifiers: StatMap,
    },
    /// Crowd control (stun, blind, ...), identified by name.
    Control,
}

fn default_dot_damage_type() -> DamageType {
    DamageType::Poison
}

fn default_tick_interval() -> f64 {
    3.0
}

/// Definition of an effect as handed to `apply_effect`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Effect {
    /// Display name, also the refresh key.
    pub name: String,
    /// Total duration in seconds.
    pub base_duration: f64,
    /// Seconds between ticks for dot/hot effects.
    #[serde(default = "default_tick_interval")]
    pub tick_interval: f64,
    /// Payload.
    #[serde(flatten)]
    pub kind: EffectKind,
}

impl Effect {
    /// Create an effect.
    #[must_use]
    pub fn new(name: impl Into<String>, base_duration: f64, kind: EffectKind) -> Self {
        Self {
            name: name.into(),
            base_duration,
            tick_interval: default_tick_interval(),
            kind,
        }
    }

    /// Create a damage-over-time effect.
    #[must_use]
    pub fn dot(
        name: impl Into<String>,
        base_duration: f64,
        damage_per_tick: i32,
        damage_type: DamageType,
    ) -> Self {
        Self::new(
            name,
            base_duration,
            EffectKind::Dot {
                damage_per_tick,
                damage_type,
            },
        )
    }

    /// Create a heal-over-time effect.
    #[must_use]
    pub fn hot(name: impl Into<String>, base_duration: f64, heal_per_tick: i32) -> Self {
        Self::new(name, base_duration, EffectKind::Hot { heal_per_tick })
    }

    /// Create a stat modifier effect.
    #[must_use]
    pub fn stat_mod(name: impl Into<String>, base_duration: f64, modifiers: StatMap) -> Self {
        Self::new(name, base_duration, EffectKind::StatMod { modifiers })
    }

    /// Create a control effect.
    #[must_use]
    pub fn control(name: impl Into<String>, base_duration: f64) -> Self {
        Self::new(name, base_duration, EffectKind::Control)
    }

    /// Set tick interval.
    #[must_use]
    pub fn with_tick_interval(mut self, interval: f64) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Check if this effect periodically ticks.
    #[must_use]
    pub fn is_periodic(&self) -> bool {
        matches!(self.kind, EffectKind::Dot { .. } | EffectKind::Hot { .. })
    }
}

/// An effect installed on an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveEffect {
    /// The definition.
    pub effect: Effect,
    /// Seconds left before expiry.
    pub remaining: f64,
    /// Absolute time of the last tick (or of application).
    pub last_tick_time: f64,
}

impl ActiveEffect {
    /// Effect name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.effect.name
    }

    fn matches(&self, name: &str) -> bool {
        self.effect.name.eq_ignore_ascii_case(name)
    }
}

/// Result of one effect pass over an entity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EffectTick {
    /// Flavor and expiry messages in order.
    pub messages: Vec<String>,
    /// Names of effects that expired this pass.
    pub expired: Vec<String>,
    /// Total damage applied by dot ticks.
    pub damage_taken: i32,
    /// Whether the entity died during the pass.
    pub died: bool,
}

// ============================================================================
// Ticker
// ============================================================================

impl Attributes {
    /// Install an effect, replacing any effect of the same name.
    ///
    /// Returns false if the entity is dead.
    pub fn apply_effect(&mut self, effect: Effect, now: f64) -> bool {
        if !self.alive {
            return false;
        }
        self.remove_effect(&effect.name);

        if let EffectKind::StatMod { modifiers } = &effect.kind {
            for (&stat, &delta) in modifiers {
                *self.modifiers.entry(stat).or_insert(0) += delta;
            }
            self.modifiers.retain(|_, value| *value != 0);
        }

        let remaining = effect.base_duration;
        self.effects.push(ActiveEffect {
            effect,
            remaining,
            last_tick_time: now,
        });
        true
    }

    /// Remove an effect by name (case-insensitive), reverting its stat deltas.
    pub fn remove_effect(&mut self, name: &str) -> bool {
        let Some(index) = self.effects.iter().position(|e| e.matches(name)) else {
            return false;
        };
        let removed = self.effects.remove(index);
        self.revert_modifiers(&removed.effect);
        true
    }

    fn revert_modifiers(&mut self, effect: &Effect) {
        if let EffectKind::StatMod { modifiers } = &effect.kind {
            for (stat, delta) in modifiers {
                if let Some(value) = self.modifiers.get_mut(stat) {
                    *value -= delta;
                    if *value == 0 {
                        self.modifiers.remove(stat);
                    }
                } else if *delta != 0 {
                    self.modifiers.insert(*stat, -delta);
                }
            }
        }
    }

    /// Check for an active effect by name (case-insensitive).
    #[must_use]
    pub fn has_effect(&self, name: &str) -> bool {
        self.effects.iter().any(|e| e.matches(name))
    }

    /// Active effects in application order.
    #[must_use]
    pub fn active_effects(&self) -> &[ActiveEffect] {
        &self.effects
    }

    /// Check if a control effect named "Stun" is active.
    #[must_use]
    pub fn is_stunned(&self) -> bool {
        self.effects
            .iter()
            .any(|e| e.matches(STUN) && matches!(e.effect.kind, EffectKind::Control))
    }

    /// Drop every effect and modifier without reverting deltas.
    pub fn clear_effects(&mut self) {
        self.effects.clear();
        self.modifiers.clear();
    }

    /// Advance all effects by `dt` seconds.
    ///
    /// `owner` is the display name used in messages.
    pub fn process_active_effects(&mut self, owner: &str, now: f64, dt: f64) -> EffectTick {
        let mut tick = EffectTick::default();
        let mut effects = std::mem::take(&mut self.effects);
        let mut expired = Vec::new();

        for (index, active) in effects.iter_mut().enumerate() {
            active.remaining -= dt;
            if active.remaining <= 0.0 {
                expired.push(index);
                continue;
            }
            if !active.effect.is_periodic()
                || now - active.last_tick_time < active.effect.tick_interval
            {
                continue;
            }
            active.last_tick_time = now;

            match active.effect.kind {
                EffectKind::Dot {
                    damage_per_tick,
                    damage_type,
                } => {
                    let applied = self.take_damage(damage_per_tick, damage_type);
                    tick.damage_taken += applied;
                    if applied > 0 {
                        tick.messages.push(format!(
                            "{owner} takes {applied} {damage_type} damage from {}.",
                            active.effect.name
                        ));
                    }
                },
                EffectKind::Hot { heal_per_tick } => {
                    let healed = self.heal(heal_per_tick);
                    if healed > 0 {
                        tick.messages.push(format!(
                            "{owner} is healed for {healed} by {}.",
                            active.effect.name
                        ));
                    }
                },
                EffectKind::StatMod { .. } | EffectKind::Control => {},
            }

            if !self.alive {
                tick.died = true;
                break;
            }
        }

        for index in expired.into_iter().rev() {
            let gone = effects.remove(index);
            self.revert_modifiers(&gone.effect);
            tick.messages
                .push(format!("The {} on {owner} wears off.", gone.effect.name));
            tick.expired.push(gone.effect.name);
        }
        tick.expired.reverse();
        self.effects = effects;

        if !self.alive {
            tick.died = true;
            self.clear_effects();
        }
        tick
    }
}

// ============================================================================
// Tests
// ============================================================================
