//! Factions and the relation matrix that decides who fights whom.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Relation value at or above which two factions are allies.
pub const ALLIED: i32 = 100;
/// Relation value of indifference.
pub const INDIFFERENT: i32 = 0;
/// Relation value of open hostility.
pub const ENEMY: i32 = -100;

/// Allegiance of a combatant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Faction {
    /// The player character.
    Player,
    /// Creatures summoned by the player.
    PlayerMinion,
    /// Townsfolk, guards and other allies of the player.
    Friendly,
    /// Wildlife and bystanders.
    Neutral,
    /// Monsters.
    Hostile,
}

impl Default for Faction {
    fn default() -> Self {
        Self::Neutral
    }
}

impl Faction {
    /// All factions.
    pub const ALL: [Self; 5] = [
        Self::Player,
        Self::PlayerMinion,
        Self::Friendly,
        Self::Neutral,
        Self::Hostile,
    ];

    /// Returns the lowercase faction name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Player => "player",
            Self::PlayerMinion => "player_minion",
            Self::Friendly => "friendly",
            Self::Neutral => "neutral",
            Self::Hostile => "hostile",
        }
    }

    /// Default relation of this faction toward another.
    #[must_use]
    pub const fn default_relation(self, other: Self) -> i32 {
        match (self, other) {
            (Self::Neutral, _) => INDIFFERENT,
            (Self::Hostile, Self::Hostile) => INDIFFERENT,
            (Self::Hostile, _) => ENEMY,
            (_, Self::Hostile) => ENEMY,
            (_, Self::Neutral) => INDIFFERENT,
            _ => ALLIED,
        }
    }
}

impl fmt::Display for Faction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relation matrix between factions, seeded with the default table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FactionMatrix {
    /// Overrides of the default relations.
    overrides: HashMap<Faction, HashMap<Faction, i32>>,
}

impl FactionMatrix {
    /// Creates a matrix with the default relations.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the relation of `from` toward `to`.
    pub fn set_relation(&mut self, from: Faction, to: Faction, value: i32) {
        self.overrides.entry(from).or_default().insert(to, value);
    }

    /// Relation of `from` toward `to`.
    #[must_use]
    pub fn relation(&self, from: Faction, to: Faction) -> i32 {
        self.overrides
            .get(&from)
            .and_then(|row| row.get(&to))
            .copied()
            .unwrap_or_else(|| from.default_relation(to))
    }

    /// Checks if `from` is hostile toward `to`.
    #[must_use]
    pub fn is_hostile(&self, from: Faction, to: Faction) -> bool {
        self.relation(from, to) < 0
    }

    /// Checks if `from` likes `to`.
    #[must_use]
    pub fn is_friendly(&self, from: Faction, to: Faction) -> bool {
        self.relation(from, to) > 0
    }
}
