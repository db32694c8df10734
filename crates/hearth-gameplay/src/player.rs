//! The player character as seen by the combat engine.

use std::collections::HashMap;

use hearth_common::{EntityId, Location};

use crate::attributes::Attributes;
use crate::config::NpcTuning;
use crate::level::Progression;
use crate::stats::default_player_stats;

/// Base melee attack power before the strength bonus.
pub const PLAYER_BASE_ATTACK_POWER: i32 = 5;

/// The player character.
#[derive(Debug, Clone)]
pub struct Player {
    /// Entity id
    pub id: EntityId,
    /// Display name
    pub name: String,
    /// Health, mana, stats and effects
    pub attributes: Attributes,
    /// Current room
    pub location: Location,
    /// Experience toward the next level
    pub progression: Progression,
    /// Melee attack power before the strength bonus
    pub base_attack_power: i32,
    /// Active summons keyed by the spell that created them
    pub active_summons: HashMap<String, Vec<EntityId>>,
    /// Cap on simultaneously active summons
    pub max_total_summons: usize,
}

impl Player {
    /// Creates a level 1 player.
    #[must_use]
    pub fn new(name: impl Into<String>, location: Location, tuning: &NpcTuning) -> Self {
        Self {
            id: EntityId::new(),
            name: name.into(),
            attributes: Attributes::new(default_player_stats(), 100).with_mana(50),
            location,
            progression: Progression::new(tuning.base_xp_to_level),
            base_attack_power: PLAYER_BASE_ATTACK_POWER,
            active_summons: HashMap::new(),
            max_total_summons: tuning.player_max_total_summons,
        }
    }

    /// Set attributes.
    #[must_use]
    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Number of summons currently bound to the player.
    #[must_use]
    pub fn total_summons(&self) -> usize {
        self.active_summons.values().map(Vec::len).sum()
    }

    /// Number of summons created by one spell.
    #[must_use]
    pub fn summons_from(&self, spell_id: &str) -> usize {
        self.active_summons.get(spell_id).map_or(0, Vec::len)
    }

    /// Records a new summon.
    pub fn register_summon(&mut self, spell_id: &str, summon: EntityId) {
        self.active_summons
            .entry(spell_id.to_string())
            .or_default()
            .push(summon);
    }

    /// Forgets a summon; returns whether it was known.
    pub fn forget_summon(&mut self, summon: EntityId) -> bool {
        let mut found = false;
        for ids in self.active_summons.values_mut() {
            let before = ids.len();
            ids.retain(|&id| id != summon);
            found |= ids.len() != before;
        }
        self.active_summons.retain(|_, ids| !ids.is_empty());
        found
    }

    /// Every active summon id.
    #[must_use]
    pub fn summon_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.active_summons.values().flatten().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Adds experience, levelling up as thresholds are crossed.
    pub fn gain_experience(&mut self, amount: u32, tuning: &NpcTuning) -> u32 {
        let levels = self.progression.gain(amount, tuning.xp_to_level_growth);
        for _ in 0..levels {
            self.attributes.level_up(tuning);
        }
        levels
    }
}
