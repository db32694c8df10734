//! Spell definitions and the spell registry.
//!
//! The registry is built explicitly (usually from a JSON data file) and
//! handed to the combat resolver and behavior selector at construction.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

use hearth_common::HearthError;

use crate::stats::DamageType;

/// Spell registry error types.
#[derive(Debug, Error)]
pub enum SpellError {
    /// Spell data file could not be read
    #[error("failed to read spell data: {0}")]
    Io(#[from] std::io::Error),
    /// Spell data could not be parsed
    #[error("failed to parse spell data: {0}")]
    Parse(#[from] serde_json::Error),
    /// A spell definition is malformed
    #[error("invalid spell {id}: {reason}")]
    Invalid {
        /// Spell id
        id: String,
        /// What is wrong
        reason: String,
    },
}

/// Result type for spell operations.
pub type SpellResult<T> = Result<T, SpellError>;

impl From<SpellError> for HearthError {
    fn from(err: SpellError) -> Self {
        match err {
            SpellError::Io(e) => Self::Io(e),
            other => Self::Data(other.to_string()),
        }
    }
}

/// Which targets a spell may be aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    /// Only the caster.
    #[serde(rename = "self")]
    Caster,
    /// Entities hostile to the caster.
    Enemy,
    /// Entities not hostile to the caster.
    Friendly,
}

impl Default for TargetType {
    fn default() -> Self {
        Self::Enemy
    }
}

/// What a spell does when it lands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "effect_type", rename_all = "snake_case")]
pub enum SpellEffect {
    /// Direct damage.
    Damage {
        /// Damage type.
        #[serde(default = "default_spell_damage_type")]
        damage_type: DamageType,
    },
    /// Direct healing.
    Heal,
    /// Summon a creature bound to the caster.
    Summon {
        /// NPC template of the creature.
        template_id: String,
        /// Lifetime in seconds (0 = unlimited).
        #[serde(default)]
        duration: f64,
        /// Cap on active summons from this spell.
        #[serde(default = "default_max_summons")]
        max_summons: usize,
    },
    /// Damage-over-time debuff.
    ApplyDot {
        /// Effect name.
        #[serde(default = "default_dot_name")]
        dot_name: String,
        /// Duration in seconds (0 = tuning default).
        #[serde(default)]
        dot_duration: f64,
        /// Damage per tick.
        dot_damage_per_tick: i32,
        /// Seconds between ticks (0 = tuning default).
        #[serde(default)]
        dot_tick_interval: f64,
        /// Damage type of each tick.
        #[serde(default = "default_dot_damage_type")]
        dot_damage_type: DamageType,
    },
}

fn default_spell_damage_type() -> DamageType {
    DamageType::Magical
}

fn default_dot_damage_type() -> DamageType {
    DamageType::Poison
}

fn default_dot_name() -> String {
    "Affliction".to_string()
}

fn default_max_summons() -> usize {
    1
}

fn default_mana_cost() -> i32 {
    10
}

fn default_cooldown() -> f64 {
    5.0
}

fn default_level() -> u32 {
    1
}

fn default_cast_message() -> String {
    "{caster} casts {spell}!".to_string()
}

fn default_hit_message() -> String {
    "The {spell} hits {target} for {value} damage!".to_string()
}

fn default_heal_message() -> String {
    "{target} is healed for {value} health!".to_string()
}

/// A castable spell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spell {
    /// Unique identifier.
    pub spell_id: String,
    /// Display name.
    pub name: String,
    /// Flavor description.
    #[serde(default)]
    pub description: String,
    /// Mana cost.
    #[serde(default = "default_mana_cost")]
    pub mana_cost: i32,
    /// Cooldown in seconds.
    #[serde(default = "default_cooldown")]
    pub cooldown: f64,
    /// Base numeric value (damage, healing).
    #[serde(default)]
    pub effect_value: i32,
    /// Allowed target alignment.
    #[serde(default)]
    pub target_type: TargetType,
    /// Minimum caster level.
    #[serde(default = "default_level")]
    pub level_required: u32,
    /// Cast message template.
    #[serde(default = "default_cast_message")]
    pub cast_message: String,
    /// Damage message template.
    #[serde(default = "default_hit_message")]
    pub hit_message: String,
    /// Heal message template.
    #[serde(default = "default_heal_message")]
    pub heal_message: String,
    /// Effect payload.
    #[serde(flatten)]
    pub effect: SpellEffect,
}

impl Spell {
    /// Create a spell with default costs and messages.
    #[must_use]
    pub fn new(spell_id: impl Into<String>, name: impl Into<String>, effect: SpellEffect) -> Self {
        Self {
            spell_id: spell_id.into(),
            name: name.into(),
            description: String::new(),
            mana_cost: default_mana_cost(),
            cooldown: default_cooldown(),
            effect_value: 0,
            target_type: TargetType::default(),
            level_required: default_level(),
            cast_message: default_cast_message(),
            hit_message: default_hit_message(),
            heal_message: default_heal_message(),
            effect,
        }
    }

    /// Set base value.
    #[must_use]
    pub fn with_value(mut self, value: i32) -> Self {
        self.effect_value = value;
        self
    }

    /// Set mana cost.
    #[must_use]
    pub fn with_mana_cost(mut self, cost: i32) -> Self {
        self.mana_cost = cost;
        self
    }

    /// Set cooldown.
    #[must_use]
    pub fn with_cooldown(mut self, cooldown: f64) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Set target type.
    #[must_use]
    pub fn with_target_type(mut self, target_type: TargetType) -> Self {
        self.target_type = target_type;
        self
    }

    /// Set level requirement.
    #[must_use]
    pub fn with_level_required(mut self, level: u32) -> Self {
        self.level_required = level;
        self
    }

    /// Check if a caster of `level` may cast this spell.
    #[must_use]
    pub fn can_cast(&self, level: u32) -> bool {
        level >= self.level_required
    }

    /// Check if this is a healing spell.
    #[must_use]
    pub fn is_heal(&self) -> bool {
        matches!(self.effect, SpellEffect::Heal)
    }

    /// Fill a message template.
    #[must_use]
    pub fn format_message(template: &str, caster: &str, target: &str, spell: &str, value: i32) -> String {
        template
            .replace("{caster}", caster)
            .replace("{target}", target)
            .replace("{spell}", spell)
            .replace("{value}", &value.to_string())
    }

    /// The cast announcement.
    #[must_use]
    pub fn format_cast(&self, caster: &str, target: &str) -> String {
        Self::format_message(&self.cast_message, caster, target, &self.name, 0)
    }

    fn validate(&self) -> SpellResult<()> {
        let invalid = |reason: &str| SpellError::Invalid {
            id: self.spell_id.clone(),
            reason: reason.to_string(),
        };
        if self.spell_id.is_empty() {
            return Err(invalid("empty id"));
        }
        if self.mana_cost < 0 {
            return Err(invalid("negative mana cost"));
        }
        if self.cooldown < 0.0 {
            return Err(invalid("negative cooldown"));
        }
        if let SpellEffect::Summon { template_id, .. } = &self.effect {
            if template_id.is_empty() {
                return Err(invalid("summon without template"));
            }
        }
        Ok(())
    }
}

/// Registry of all known spells, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct SpellRegistry {
    spells: HashMap<String, Spell>,
}

impl SpellRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a spell, replacing any spell with the same id.
    pub fn register(&mut self, spell: Spell) {
        if self.spells.contains_key(&spell.spell_id) {
            warn!("Overwriting spell '{}'", spell.spell_id);
        }
        self.spells.insert(spell.spell_id.clone(), spell);
    }

    /// Looks up a spell by id.
    #[must_use]
    pub fn get_spell(&self, spell_id: &str) -> Option<&Spell> {
        self.spells.get(spell_id)
    }

    /// Looks up a spell by display name (case-insensitive).
    #[must_use]
    pub fn get_by_name(&self, name: &str) -> Option<&Spell> {
        self.spells
            .values()
            .find(|spell| spell.name.eq_ignore_ascii_case(name))
    }

    /// Number of registered spells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.spells.len()
    }

    /// Returns whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.spells.is_empty()
    }

    /// Iterates over all spells.
    pub fn iter(&self) -> impl Iterator<Item = &Spell> {
        self.spells.values()
    }

    /// Loads spells from a JSON object keyed by spell id.
    ///
    /// Returns the number of spells loaded.
    pub fn load_json_str(&mut self, json: &str) -> SpellResult<usize> {
        let raw: HashMap<String, serde_json::Value> = serde_json::from_str(json)?;
        let mut loaded = 0;
        for (id, mut value) in raw {
            if let Some(object) = value.as_object_mut() {
                object
                    .entry("spell_id")
                    .or_insert_with(|| serde_json::Value::String(id.clone()));
            }
            let spell: Spell = serde_json::from_value(value)?;
            spell.validate()?;
            self.register(spell);
            loaded += 1;
        }
        Ok(loaded)
    }

    /// Loads spells from a JSON file.
    pub fn load_json_file<P: AsRef<Path>>(&mut self, path: P) -> SpellResult<usize> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let loaded = self.load_json_str(&text)?;
        info!("Loaded {loaded} spells from {}", path.display());
        Ok(loaded)
    }
}
