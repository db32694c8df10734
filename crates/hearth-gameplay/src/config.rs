//! Gameplay tuning.
//!
//! Every numeric constant the combat resolver and behavior selector read lives
//! here. The whole tree deserializes from RON with `#[serde(default)]`, so a
//! tuning file only has to list the values it changes.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::info;

use hearth_common::HearthError;

use crate::level::{default_tier_table, LevelTier, TierModifiers};

/// Errors raised while loading tuning data.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// RON text could not be parsed
    #[error("failed to parse config: {0}")]
    Parse(#[from] ron::error::SpannedError),
}

impl From<ConfigError> for HearthError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Io(e) => Self::Io(e),
            ConfigError::Parse(e) => Self::Config(e.to_string()),
        }
    }
}

/// Combat math constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatTuning {
    // === Hit chance ===
    /// Base hit chance for player attackers
    pub player_base_hit_chance: f32,
    /// Base hit chance for NPC attackers
    pub npc_base_hit_chance: f32,
    /// Hit chance change per point of agility difference
    pub agility_hit_factor: f32,
    /// Lower clamp for hit chance
    pub min_hit_chance: f32,
    /// Upper clamp for hit chance
    pub max_hit_chance: f32,
    /// Fixed hit chance while the attacker is blinded
    pub blind_hit_chance: f32,

    // === Damage ===
    /// Inclusive melee variance range for players
    pub player_damage_variance: (i32, i32),
    /// Inclusive melee variance range for NPCs
    pub npc_damage_variance: (i32, i32),
    /// Strength divided by this is added to player attack power
    pub player_strength_divisor: i32,
    /// Fraction of melee damage returned to a vampiric attacker
    pub vampiric_fraction: f32,

    // === Spells ===
    /// Relative variance applied to spell values (0.1 = +/-10%)
    pub spell_variation: f32,
    /// Floor for any spell value
    pub min_spell_value: i32,
    /// Intelligence above this point adds to spell values
    pub spell_intelligence_baseline: i32,
    /// Intelligence points per point of spell bonus
    pub spell_intelligence_divisor: i32,
    /// Level given to summoned creatures
    pub summon_level: u32,

    // === Damage-over-time defaults ===
    /// Default tick interval for spell DoTs in seconds
    pub dot_tick_interval: f64,
    /// Default DoT duration in seconds
    pub dot_duration: f64,

    // === Experience ===
    /// Minimum experience for any kill
    pub min_xp_gain: u32,
    /// Target max health divided by this contributes to XP
    pub xp_health_divisor: i32,
    /// XP contributed per target level
    pub xp_level_multiplier: u32,

    // === Level tiers ===
    /// Multipliers per level tier; missing tiers resolve to (1, 1, 1)
    pub tiers: HashMap<LevelTier, TierModifiers>,
}

impl Default for CombatTuning {
    fn default() -> Self {
        Self {
            // Hit chance
            player_base_hit_chance: 0.85,
            npc_base_hit_chance: 0.80,
            agility_hit_factor: 0.02,
            min_hit_chance: 0.05,
            max_hit_chance: 0.95,
            blind_hit_chance: 0.20,

            // Damage
            player_damage_variance: (-1, 1),
            npc_damage_variance: (-1, 1),
            player_strength_divisor: 3,
            vampiric_fraction: 0.5,

            // Spells
            spell_variation: 0.1,
            min_spell_value: 1,
            spell_intelligence_baseline: 10,
            spell_intelligence_divisor: 5,
            summon_level: 10,

            // DoT
            dot_tick_interval: 3.0,
            dot_duration: 10.0,

            // Experience
            min_xp_gain: 1,
            xp_health_divisor: 5,
            xp_level_multiplier: 5,

            tiers: default_tier_table(),
        }
    }
}

impl CombatTuning {
    /// Returns the modifiers for a tier, neutral if the table lacks it.
    #[must_use]
    pub fn tier_modifiers(&self, tier: LevelTier) -> TierModifiers {
        self.tiers.get(&tier).copied().unwrap_or_default()
    }

    /// Returns the modifiers for `target_level` as seen by `viewer_level`.
    #[must_use]
    pub fn modifiers_between(&self, viewer_level: u32, target_level: u32) -> TierModifiers {
        self.tier_modifiers(LevelTier::between(viewer_level, target_level))
    }
}

/// NPC behavior and progression constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NpcTuning {
    // === Behavior defaults ===
    /// Seconds between idle moves
    pub move_cooldown: f64,
    /// Chance per idle turn that a wanderer moves
    pub wander_chance: f32,
    /// Default aggression probability
    pub aggression: f32,
    /// Default flee threshold (fraction of max health)
    pub flee_threshold: f32,
    /// Mana fraction below which a caster retreats instead of casting
    pub low_mana_retreat_threshold: f32,
    /// Health fraction below which a healer considers a target wounded
    pub healer_heal_threshold: f32,

    // === Combat defaults ===
    /// Seconds between any two combat actions
    pub combat_cooldown: f64,
    /// Seconds between melee swings
    pub attack_cooldown: f64,
    /// Default spell cast chance
    pub spell_cast_chance: f32,
    /// Default attack power
    pub attack_power: i32,
    /// Default defense
    pub defense: i32,
    /// Default max health
    pub max_health: i32,

    // === Progression ===
    /// Experience needed for the first level up
    pub base_xp_to_level: u32,
    /// Growth factor of the level threshold
    pub xp_to_level_growth: f32,
    /// Added to every base stat per level
    pub level_up_stat_increase: i32,
    /// Flat max health gained per level
    pub level_health_increase: i32,
    /// Constitution multiplier for max health gained per level
    pub level_con_health_multiplier: f32,
    /// Fraction of the max health increase healed on level up
    pub level_up_heal_fraction: f32,

    // === Regeneration ===
    /// Seconds between safe-zone regeneration pulses
    pub regen_interval: f64,
    /// Health per pulse before strength scaling
    pub health_regen_rate: f32,
    /// Strength divisor for health regeneration
    pub health_regen_strength_divisor: f32,
    /// Mana per pulse before wisdom scaling
    pub mana_regen_rate: f32,
    /// Wisdom divisor for mana regeneration
    pub mana_regen_wisdom_divisor: f32,

    // === Player ===
    /// Caster-wide cap on simultaneously active summons
    pub player_max_total_summons: usize,
}

impl Default for NpcTuning {
    fn default() -> Self {
        Self {
            move_cooldown: 10.0,
            wander_chance: 0.3,
            aggression: 0.0,
            flee_threshold: 0.2,
            low_mana_retreat_threshold: 0.20,
            healer_heal_threshold: 0.75,

            combat_cooldown: 3.0,
            attack_cooldown: 3.0,
            spell_cast_chance: 0.0,
            attack_power: 3,
            defense: 2,
            max_health: 30,

            base_xp_to_level: 150,
            xp_to_level_growth: 1.6,
            level_up_stat_increase: 1,
            level_health_increase: 3,
            level_con_health_multiplier: 0.3,
            level_up_heal_fraction: 0.5,

            regen_interval: 1.0,
            health_regen_rate: 1.0,
            health_regen_strength_divisor: 25.0,
            mana_regen_rate: 1.0,
            mana_regen_wisdom_divisor: 22.0,

            player_max_total_summons: 3,
        }
    }
}

/// Complete gameplay configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameplayConfig {
    /// Combat math
    pub combat: CombatTuning,
    /// NPC behavior
    pub npc: NpcTuning,
}

impl GameplayConfig {
    /// Parses configuration from RON text.
    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(text)?)
    }

    /// Loads configuration from a RON file.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let config = Self::from_ron_str(&text)?;
        info!("Loaded gameplay tuning from {}", path.display());
        Ok(config)
    }

    /// Serializes configuration to pretty RON.
    pub fn to_ron_string(&self) -> Result<String, ron::Error> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
    }
}
