//! Attribute model shared by players and NPCs.
//!
//! This module provides:
//! - Base stats plus transient stat modifiers from effects
//! - Innate percentage resistances per damage type
//! - Health, mana and the alive flag
//! - Damage mitigation and healing
//! - Per-spell cooldown expiries

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::NpcTuning;
use crate::effects::ActiveEffect;
use crate::stats::{DamageType, StatKind, StatMap};

/// Smallest damage a positive, unresisted hit can deal.
pub const MINIMUM_DAMAGE_TAKEN: i32 = 1;

/// Percentage resistances are clamped to +/- this value.
pub const RESISTANCE_CAP: i32 = 100;

// ============================================================================
// Attributes
// ============================================================================

/// Health, mana, stats and active effects of one combatant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attributes {
    /// Base stat values.
    pub stats: StatMap,
    /// Innate percentage resistances.
    pub resistances: HashMap<DamageType, i32>,
    /// Transient deltas contributed by active stat_mod effects.
    pub(crate) modifiers: StatMap,
    /// Current health.
    pub health: i32,
    /// Maximum health.
    pub max_health: i32,
    /// Current mana.
    pub mana: i32,
    /// Maximum mana.
    pub max_mana: i32,
    /// Character level.
    pub level: u32,
    /// Alive flag, cleared when health reaches zero.
    pub(crate) alive: bool,
    /// Active timed effects in application order.
    pub(crate) effects: Vec<ActiveEffect>,
    /// Absolute time at which each spell becomes castable again.
    pub spell_cooldowns: HashMap<String, f64>,
}

impl Default for Attributes {
    fn default() -> Self {
        Self::new(StatMap::new(), 100)
    }
}

impl Attributes {
    /// Create attributes at full health.
    #[must_use]
    pub fn new(stats: StatMap, max_health: i32) -> Self {
        let max_health = max_health.max(1);
        Self {
            stats,
            resistances: HashMap::new(),
            modifiers: StatMap::new(),
            health: max_health,
            max_health,
            mana: 0,
            max_mana: 0,
            level: 1,
            alive: true,
            effects: Vec::new(),
            spell_cooldowns: HashMap::new(),
        }
    }

    /// Set a full mana pool.
    #[must_use]
    pub fn with_mana(mut self, max_mana: i32) -> Self {
        self.max_mana = max_mana.max(0);
        self.mana = self.max_mana;
        self
    }

    /// Set level.
    #[must_use]
    pub fn with_level(mut self, level: u32) -> Self {
        self.level = level.max(1);
        self
    }

    /// Set a base stat.
    #[must_use]
    pub fn with_stat(mut self, stat: StatKind, value: i32) -> Self {
        self.stats.insert(stat, value);
        self
    }

    /// Set an innate resistance (percent).
    #[must_use]
    pub fn with_resistance(mut self, damage_type: DamageType, percent: i32) -> Self {
        self.resistances.insert(damage_type, percent);
        self
    }

    /// Base value of a stat, 0 if absent.
    #[must_use]
    pub fn base_stat(&self, stat: StatKind) -> i32 {
        self.stats.get(&stat).copied().unwrap_or(0)
    }

    /// Current modifier delta for a stat, 0 if absent.
    #[must_use]
    pub fn modifier(&self, stat: StatKind) -> i32 {
        self.modifiers.get(&stat).copied().unwrap_or(0)
    }

    /// All modifier deltas currently applied.
    #[must_use]
    pub fn modifiers(&self) -> &StatMap {
        &self.modifiers
    }

    /// Base value plus modifiers.
    #[must_use]
    pub fn effective_stat(&self, stat: StatKind) -> i32 {
        self.base_stat(stat) + self.modifier(stat)
    }

    /// Total resistance against a damage type, clamped to +/-100.
    #[must_use]
    pub fn resistance(&self, damage_type: DamageType) -> i32 {
        let innate = self.resistances.get(&damage_type).copied().unwrap_or(0);
        let bonus = self.effective_stat(StatKind::Resist(damage_type));
        (innate + bonus).clamp(-RESISTANCE_CAP, RESISTANCE_CAP)
    }

    /// Check if alive.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.alive
    }

    /// Health as a fraction of max health.
    #[must_use]
    pub fn health_fraction(&self) -> f32 {
        if self.max_health <= 0 {
            0.0
        } else {
            self.health as f32 / self.max_health as f32
        }
    }

    /// Mana as a fraction of max mana, 0 without a mana pool.
    #[must_use]
    pub fn mana_fraction(&self) -> f32 {
        if self.max_mana <= 0 {
            0.0
        } else {
            self.mana as f32 / self.max_mana as f32
        }
    }

    /// Apply incoming damage and return the damage actually applied.
    ///
    /// Physical damage is first reduced by the flat `defense` stat, everything
    /// else by `magic_resist`. The remainder is scaled by the percentage
    /// resistance for the type. The returned value is the mitigated amount
    /// even when it exceeds the remaining health.
    pub fn take_damage(&mut self, amount: i32, damage_type: DamageType) -> i32 {
        if !self.alive || amount <= 0 {
            return 0;
        }

        let flat = if damage_type.is_physical() {
            self.effective_stat(StatKind::Defense)
        } else {
            self.effective_stat(StatKind::MagicResist)
        };
        let remainder = amount - flat.max(0);
        if remainder <= 0 {
            return 0;
        }

        let resistance = self.resistance(damage_type);
        let scaled = remainder as f32 * (1.0 - resistance as f32 / 100.0);
        let applied = if scaled > 0.0 {
            (scaled as i32).max(MINIMUM_DAMAGE_TAKEN)
        } else {
            0
        };

        self.health = (self.health - applied).max(0);
        if self.health == 0 {
            self.alive = false;
        }
        applied
    }

    /// Heal up to max health, returning the health actually restored.
    pub fn heal(&mut self, amount: i32) -> i32 {
        if !self.alive || amount <= 0 {
            return 0;
        }
        let before = self.health;
        self.health = (self.health + amount).min(self.max_health);
        self.health - before
    }

    /// Restore mana up to max mana, returning the mana actually restored.
    pub fn restore_mana(&mut self, amount: i32) -> i32 {
        if amount <= 0 {
            return 0;
        }
        let before = self.mana;
        self.mana = (self.mana + amount).min(self.max_mana);
        self.mana - before
    }

    /// Spend mana if enough is available.
    pub fn spend_mana(&mut self, cost: i32) -> bool {
        if self.mana >= cost {
            self.mana -= cost.max(0);
            true
        } else {
            false
        }
    }

    /// Drop to zero health and mark dead.
    pub fn kill(&mut self) {
        self.health = 0;
        self.alive = false;
    }

    /// Bring a dead combatant back with the given health.
    pub fn revive(&mut self, health: i32) {
        self.health = health.clamp(1, self.max_health);
        self.alive = true;
    }

    /// Check if a spell is off cooldown at `now`.
    #[must_use]
    pub fn spell_ready(&self, spell_id: &str, now: f64) -> bool {
        self.spell_cooldowns
            .get(spell_id)
            .map_or(true, |&expiry| now >= expiry)
    }

    /// Put a spell on cooldown until `expiry`.
    pub fn set_spell_cooldown(&mut self, spell_id: impl Into<String>, expiry: f64) {
        self.spell_cooldowns.insert(spell_id.into(), expiry);
    }

    /// Drop cooldown entries that have already expired.
    pub fn prune_cooldowns(&mut self, now: f64) {
        self.spell_cooldowns.retain(|_, &mut expiry| expiry > now);
    }

    /// Raise the level by one: +stats, more max health, partial heal.
    pub fn level_up(&mut self, tuning: &NpcTuning) {
        self.level += 1;
        for value in self.stats.values_mut() {
            *value += tuning.level_up_stat_increase;
        }
        let old_max = self.max_health;
        let constitution = self.base_stat(StatKind::Constitution);
        self.max_health += tuning.level_health_increase
            + (constitution as f32 * tuning.level_con_health_multiplier) as i32;
        let gained = self.max_health - old_max;
        self.heal((gained as f32 * tuning.level_up_heal_fraction) as i32);
    }
}

// ============================================================================
// Tests
// ============================================================================
