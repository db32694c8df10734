//! Stat and damage-type vocabulary shared by every combatant.
//!
//! Stats are addressed through [`StatKind`], which also covers the per-type
//! resistance keys (`resist_fire`, `resist_poison`, ...). Stat kinds serialize
//! as their string names so they can be used as map keys in JSON and RON.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when a stat or damage type name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatParseError {
    /// Unknown stat name
    #[error("unknown stat: {0}")]
    UnknownStat(String),
    /// Unknown damage type name
    #[error("unknown damage type: {0}")]
    UnknownDamageType(String),
}

/// Type of damage dealt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageType {
    /// Physical damage (reduced by defense)
    Physical,
    /// Generic magical damage
    Magical,
    /// Fire damage
    Fire,
    /// Cold damage
    Cold,
    /// Lightning damage
    Lightning,
    /// Poison damage (default for damage-over-time)
    Poison,
    /// Holy damage
    Holy,
    /// Shadow damage
    Shadow,
    /// Arcane damage
    Arcane,
}

impl Default for DamageType {
    fn default() -> Self {
        Self::Physical
    }
}

impl DamageType {
    /// All damage types.
    pub const ALL: [Self; 9] = [
        Self::Physical,
        Self::Magical,
        Self::Fire,
        Self::Cold,
        Self::Lightning,
        Self::Poison,
        Self::Holy,
        Self::Shadow,
        Self::Arcane,
    ];

    /// Returns the lowercase name of this damage type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Physical => "physical",
            Self::Magical => "magical",
            Self::Fire => "fire",
            Self::Cold => "cold",
            Self::Lightning => "lightning",
            Self::Poison => "poison",
            Self::Holy => "holy",
            Self::Shadow => "shadow",
            Self::Arcane => "arcane",
        }
    }

    /// Checks if this is physical damage.
    #[must_use]
    pub const fn is_physical(self) -> bool {
        matches!(self, Self::Physical)
    }
}

impl fmt::Display for DamageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DamageType {
    type Err = StatParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == lower)
            .ok_or_else(|| StatParseError::UnknownDamageType(s.to_string()))
    }
}

/// A stat that can be read or modified on a combatant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StatKind {
    /// Melee power and health regeneration.
    Strength,
    /// Dexterity.
    Dexterity,
    /// Spell scaling.
    Intelligence,
    /// Mana regeneration.
    Wisdom,
    /// Health growth on level up.
    Constitution,
    /// Hit chance.
    Agility,
    /// Flat bonus to spell values.
    SpellPower,
    /// Flat reduction of non-physical damage.
    MagicResist,
    /// Flat reduction of physical damage.
    Defense,
    /// Percentage resistance bonus for one damage type.
    Resist(DamageType),
}

impl StatKind {
    /// The primary stats every combatant carries.
    pub const PRIMARY: [Self; 8] = [
        Self::Strength,
        Self::Dexterity,
        Self::Intelligence,
        Self::Wisdom,
        Self::Constitution,
        Self::Agility,
        Self::SpellPower,
        Self::MagicResist,
    ];

    /// Returns the canonical name of this stat.
    #[must_use]
    pub fn name(self) -> String {
        match self {
            Self::Strength => "strength".to_string(),
            Self::Dexterity => "dexterity".to_string(),
            Self::Intelligence => "intelligence".to_string(),
            Self::Wisdom => "wisdom".to_string(),
            Self::Constitution => "constitution".to_string(),
            Self::Agility => "agility".to_string(),
            Self::SpellPower => "spell_power".to_string(),
            Self::MagicResist => "magic_resist".to_string(),
            Self::Defense => "defense".to_string(),
            Self::Resist(damage_type) => format!("resist_{damage_type}"),
        }
    }
}

impl fmt::Display for StatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl FromStr for StatKind {
    type Err = StatParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        if let Some(rest) = lower.strip_prefix("resist_") {
            return rest
                .parse::<DamageType>()
                .map(Self::Resist)
                .map_err(|_| StatParseError::UnknownStat(s.to_string()));
        }
        match lower.as_str() {
            "strength" => Ok(Self::Strength),
            "dexterity" => Ok(Self::Dexterity),
            "intelligence" => Ok(Self::Intelligence),
            "wisdom" => Ok(Self::Wisdom),
            "constitution" => Ok(Self::Constitution),
            "agility" => Ok(Self::Agility),
            "spell_power" => Ok(Self::SpellPower),
            "magic_resist" => Ok(Self::MagicResist),
            "defense" => Ok(Self::Defense),
            _ => Err(StatParseError::UnknownStat(s.to_string())),
        }
    }
}

impl TryFrom<String> for StatKind {
    type Error = StatParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<StatKind> for String {
    fn from(stat: StatKind) -> Self {
        stat.name()
    }
}

/// Map of stat values or deltas.
pub type StatMap = HashMap<StatKind, i32>;

/// Default base stats for a freshly created NPC.
#[must_use]
pub fn default_npc_stats() -> StatMap {
    StatMap::from([
        (StatKind::Strength, 8),
        (StatKind::Dexterity, 8),
        (StatKind::Intelligence, 5),
        (StatKind::Wisdom, 5),
        (StatKind::Constitution, 8),
        (StatKind::Agility, 8),
        (StatKind::SpellPower, 0),
        (StatKind::MagicResist, 0),
    ])
}

/// Default base stats for a new player character.
#[must_use]
pub fn default_player_stats() -> StatMap {
    StatMap::from([
        (StatKind::Strength, 10),
        (StatKind::Dexterity, 10),
        (StatKind::Intelligence, 10),
        (StatKind::Wisdom, 10),
        (StatKind::Constitution, 10),
        (StatKind::Agility, 10),
        (StatKind::SpellPower, 0),
        (StatKind::MagicResist, 0),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stat_names_parse_back() {
        for stat in StatKind::PRIMARY {
            assert_eq!(stat.name().parse::<StatKind>(), Ok(stat));
        }
        assert_eq!("defense".parse::<StatKind>(), Ok(StatKind::Defense));
    }

    #[test]
    fn test_resist_stat_parse() {
        assert_eq!(
            "resist_fire".parse::<StatKind>(),
            Ok(StatKind::Resist(DamageType::Fire))
        );
        assert_eq!(StatKind::Resist(DamageType::Poison).name(), "resist_poison");
        assert!("resist_custard".parse::<StatKind>().is_err());
    }

    #[test]
    fn test_damage_type_parse_is_case_insensitive() {
        assert_eq!("Fire".parse::<DamageType>(), Ok(DamageType::Fire));
        assert!("sonic".parse::<DamageType>().is_err());
    }

    #[test]
    fn test_stat_map_serializes_with_string_keys() {
        let mut stats = default_npc_stats();
        stats.insert(StatKind::Resist(DamageType::Cold), 25);
        let json = serde_json::to_string(&stats).expect("serialize");
        assert!(json.contains("\"resist_cold\":25"));
        let back: StatMap = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, stats);
    }

    #[test]
    fn test_default_npc_stats() {
        let stats = default_npc_stats();
        assert_eq!(stats[&StatKind::Strength], 8);
        assert_eq!(stats[&StatKind::Intelligence], 5);
        assert_eq!(stats[&StatKind::SpellPower], 0);
    }
}
