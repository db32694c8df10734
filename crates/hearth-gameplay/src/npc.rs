//! NPC state: behavior tags, schedules, cooldown timestamps and tuning knobs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use hearth_common::{EntityId, Location};

use crate::attributes::Attributes;
use crate::config::NpcTuning;
use crate::faction::Faction;
use crate::level::Progression;
use crate::stats::{default_npc_stats, StatKind};

/// Timestamp that is always far enough in the past for any cooldown.
pub const NEVER: f64 = f64::NEG_INFINITY;

// ============================================================================
// Behavior state
// ============================================================================

/// Behavior tag driving an NPC's idle and specialised decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Behavior {
    /// Never moves on its own.
    #[default]
    Stationary,
    /// Drifts between random rooms.
    Wanderer,
    /// Walks a loop of waypoints.
    Patrol,
    /// Trails another entity.
    Follower,
    /// Follows an hour-keyed schedule.
    Scheduled,
    /// Roams looking for trouble.
    Aggressive,
    /// Summoned creature bound to an owner.
    Minion,
    /// Heals wounded allies.
    Healer,
    /// Temporary override while heading to a safe room.
    Retreating,
}

impl Behavior {
    /// Returns the lowercase tag name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stationary => "stationary",
            Self::Wanderer => "wanderer",
            Self::Patrol => "patrol",
            Self::Follower => "follower",
            Self::Scheduled => "scheduled",
            Self::Aggressive => "aggressive",
            Self::Minion => "minion",
            Self::Healer => "healer",
            Self::Retreating => "retreating",
        }
    }
}

impl fmt::Display for Behavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current behavior plus a stack of behaviors suspended by overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BehaviorState {
    /// Active behavior
    pub current: Behavior,
    /// Suspended behaviors, innermost last
    pub overrides: Vec<Behavior>,
}

impl BehaviorState {
    /// Creates a state with no overrides.
    #[must_use]
    pub fn new(current: Behavior) -> Self {
        Self {
            current,
            overrides: Vec::new(),
        }
    }

    /// Replaces the active behavior without touching the stack.
    pub fn transition(&mut self, to: Behavior) -> Behavior {
        std::mem::replace(&mut self.current, to)
    }

    /// Suspends the active behavior under a temporary one.
    pub fn push_override(&mut self, to: Behavior) {
        let previous = self.transition(to);
        self.overrides.push(previous);
    }

    /// Ends the innermost override, falling back to wandering if the stack is empty.
    pub fn pop_override(&mut self) -> Behavior {
        let restored = self.overrides.pop().unwrap_or(Behavior::Wanderer);
        self.transition(restored);
        restored
    }

    /// Checks if any override is active.
    #[must_use]
    pub fn is_overridden(&self) -> bool {
        !self.overrides.is_empty()
    }
}

/// One hour of a daily schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    /// Where to be
    pub destination: Location,
    /// What the NPC is doing there
    pub activity: String,
    /// Forces a target scan with full aggression while active
    #[serde(default)]
    pub aggressive: bool,
}

impl ScheduleEntry {
    /// Creates a peaceful entry.
    #[must_use]
    pub fn new(destination: Location, activity: impl Into<String>) -> Self {
        Self {
            destination,
            activity: activity.into(),
            aggressive: false,
        }
    }

    /// Marks the entry as aggressive.
    #[must_use]
    pub fn aggressive(mut self) -> Self {
        self.aggressive = true;
        self
    }
}

/// Bond between a summoned creature and its owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummonBond {
    /// Owning player
    pub owner: EntityId,
    /// Spell that created the summon
    pub spell_id: String,
    /// Creation time
    pub created_at: f64,
    /// Lifetime in seconds (0 = unlimited)
    pub duration: f64,
}

impl SummonBond {
    /// Checks if the lifetime has run out at `now`.
    #[must_use]
    pub fn expired(&self, now: f64) -> bool {
        self.duration > 0.0 && now - self.created_at >= self.duration
    }
}

// ============================================================================
// NPC
// ============================================================================

/// A non-player character.
#[derive(Debug, Clone)]
pub struct Npc {
    /// Template the NPC was created from
    pub template_id: String,
    /// Entity id
    pub id: EntityId,
    /// Display name
    pub name: String,
    /// Health, mana, stats and effects
    pub attributes: Attributes,
    /// Allegiance
    pub faction: Faction,
    /// Current room
    pub location: Location,
    /// Spawn room
    pub home: Location,
    /// Behavior tag and override stack
    pub behavior: BehaviorState,
    /// Experience toward the next level
    pub progression: Progression,

    // === Movement ===
    /// Waypoints walked by patrollers
    pub patrol_points: Vec<Location>,
    /// Index of the next waypoint
    pub patrol_index: usize,
    /// Entity trailed by followers
    pub follow_target: Option<EntityId>,
    /// Hour-keyed schedule
    pub schedule: BTreeMap<u32, ScheduleEntry>,
    /// Destination of the active schedule entry
    pub schedule_destination: Option<Location>,
    /// Remaining steps toward the schedule destination
    pub schedule_path: Vec<String>,
    /// Activity of the active schedule entry
    pub current_activity: Option<String>,
    /// Chance per idle turn that a wanderer moves
    pub wander_chance: f32,
    /// Seconds between idle moves
    pub move_cooldown: f64,
    /// Time of the last idle move
    pub last_moved: f64,

    // === Combat ===
    /// Melee attack power
    pub attack_power: i32,
    /// Probability of preferring a spell over melee
    pub spell_cast_chance: f32,
    /// Spell ids this NPC knows
    pub usable_spells: Vec<String>,
    /// Seconds between any two combat actions
    pub combat_cooldown: f64,
    /// Seconds between melee swings
    pub attack_cooldown: f64,
    /// Time of the last combat action
    pub last_combat_action: f64,
    /// Time of the last melee swing
    pub last_attack_time: f64,
    /// Probability of starting a fight with a detected target
    pub aggression: f32,
    /// Health fraction below which the NPC flees
    pub flee_threshold: f32,

    // === Retreat ===
    /// Remaining steps toward the retreat destination
    pub retreat_path: Vec<String>,
    /// Safe room being retreated to
    pub retreat_destination: Option<Location>,

    // === Misc ===
    /// Busy with an external trade interaction
    pub trading: bool,
    /// Owner bond for summoned creatures
    pub summon: Option<SummonBond>,
    /// Time of the last regeneration pulse
    pub last_regen_time: f64,
}

impl Npc {
    /// Creates an NPC from tuning defaults.
    #[must_use]
    pub fn new(
        template_id: impl Into<String>,
        name: impl Into<String>,
        location: Location,
        tuning: &NpcTuning,
    ) -> Self {
        let attributes = Attributes::new(default_npc_stats(), tuning.max_health)
            .with_stat(StatKind::Defense, tuning.defense);
        Self {
            template_id: template_id.into(),
            id: EntityId::new(),
            name: name.into(),
            attributes,
            faction: Faction::default(),
            home: location.clone(),
            location,
            behavior: BehaviorState::default(),
            progression: Progression::new(tuning.base_xp_to_level),

            patrol_points: Vec::new(),
            patrol_index: 0,
            follow_target: None,
            schedule: BTreeMap::new(),
            schedule_destination: None,
            schedule_path: Vec::new(),
            current_activity: None,
            wander_chance: tuning.wander_chance,
            move_cooldown: tuning.move_cooldown,
            last_moved: NEVER,

            attack_power: tuning.attack_power,
            spell_cast_chance: tuning.spell_cast_chance,
            usable_spells: Vec::new(),
            combat_cooldown: tuning.combat_cooldown,
            attack_cooldown: tuning.attack_cooldown,
            last_combat_action: NEVER,
            last_attack_time: NEVER,
            aggression: tuning.aggression,
            flee_threshold: tuning.flee_threshold,

            retreat_path: Vec::new(),
            retreat_destination: None,

            trading: false,
            summon: None,
            last_regen_time: NEVER,
        }
    }

    /// Set faction.
    #[must_use]
    pub fn with_faction(mut self, faction: Faction) -> Self {
        self.faction = faction;
        self
    }

    /// Set behavior.
    #[must_use]
    pub fn with_behavior(mut self, behavior: Behavior) -> Self {
        self.behavior = BehaviorState::new(behavior);
        self
    }

    /// Set attributes.
    #[must_use]
    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Set attack power.
    #[must_use]
    pub fn with_attack_power(mut self, attack_power: i32) -> Self {
        self.attack_power = attack_power;
        self
    }

    /// Set aggression.
    #[must_use]
    pub fn with_aggression(mut self, aggression: f32) -> Self {
        self.aggression = aggression.clamp(0.0, 1.0);
        self
    }

    /// Set flee threshold.
    #[must_use]
    pub fn with_flee_threshold(mut self, threshold: f32) -> Self {
        self.flee_threshold = threshold;
        self
    }

    /// Set known spells and the chance to use them.
    #[must_use]
    pub fn with_spells(mut self, spells: Vec<String>, cast_chance: f32) -> Self {
        self.usable_spells = spells;
        self.spell_cast_chance = cast_chance;
        self
    }

    /// Set patrol waypoints.
    #[must_use]
    pub fn with_patrol(mut self, points: Vec<Location>) -> Self {
        self.patrol_points = points;
        self.patrol_index = 0;
        self
    }

    /// Add a schedule entry.
    #[must_use]
    pub fn with_schedule_entry(mut self, hour: u32, entry: ScheduleEntry) -> Self {
        self.schedule.insert(hour % 24, entry);
        self
    }

    /// Set follow target.
    #[must_use]
    pub fn with_follow_target(mut self, target: EntityId) -> Self {
        self.follow_target = Some(target);
        self
    }

    /// Set move cooldown.
    #[must_use]
    pub fn with_move_cooldown(mut self, cooldown: f64) -> Self {
        self.move_cooldown = cooldown;
        self
    }

    /// Checks if the NPC belongs to the hostile faction.
    #[must_use]
    pub fn is_hostile(&self) -> bool {
        self.faction == Faction::Hostile
    }

    /// Owner of a summoned creature.
    #[must_use]
    pub fn owner(&self) -> Option<EntityId> {
        self.summon.as_ref().map(|bond| bond.owner)
    }

    /// Checks if the NPC was summoned.
    #[must_use]
    pub fn is_summoned(&self) -> bool {
        self.summon.is_some()
    }

    /// Checks if the move cooldown has elapsed.
    #[must_use]
    pub fn ready_to_move(&self, now: f64) -> bool {
        now - self.last_moved >= self.move_cooldown
    }

    /// Checks if the combat cooldown has elapsed.
    #[must_use]
    pub fn combat_ready(&self, now: f64) -> bool {
        now - self.last_combat_action >= self.combat_cooldown
    }

    /// Checks if the melee cooldown has elapsed.
    #[must_use]
    pub fn attack_ready(&self, now: f64) -> bool {
        now - self.last_attack_time >= self.attack_cooldown
    }

    /// Schedule entry that applies at `hour`.
    ///
    /// Uses the exact hour if present, otherwise the latest earlier hour,
    /// otherwise wraps to the latest hour of the previous day.
    #[must_use]
    pub fn schedule_entry(&self, hour: u32) -> Option<&ScheduleEntry> {
        self.schedule
            .range(..=hour)
            .next_back()
            .or_else(|| self.schedule.iter().next_back())
            .map(|(_, entry)| entry)
    }

    /// Adds experience, levelling up as thresholds are crossed.
    ///
    /// Returns the number of levels gained.
    pub fn gain_experience(&mut self, amount: u32, tuning: &NpcTuning) -> u32 {
        let levels = self.progression.gain(amount, tuning.xp_to_level_growth);
        for _ in 0..levels {
            self.attributes.level_up(tuning);
        }
        levels
    }

    /// Regenerates health and mana if the regen interval has elapsed.
    ///
    /// Returns true if a pulse happened.
    pub fn regenerate(&mut self, now: f64, tuning: &NpcTuning) -> bool {
        if now - self.last_regen_time < tuning.regen_interval || !self.attributes.is_alive() {
            return false;
        }
        self.last_regen_time = now;
        regenerate_attributes(&mut self.attributes, tuning);
        true
    }
}

/// One regeneration pulse scaled by strength and wisdom.
pub(crate) fn regenerate_attributes(attributes: &mut Attributes, tuning: &NpcTuning) {
    let strength = attributes.effective_stat(StatKind::Strength) as f32;
    let wisdom = attributes.effective_stat(StatKind::Wisdom) as f32;
    let health =
        tuning.health_regen_rate * (1.0 + strength / tuning.health_regen_strength_divisor);
    let mana = tuning.mana_regen_rate * (1.0 + wisdom / tuning.mana_regen_wisdom_divisor);
    attributes.heal(health as i32);
    attributes.restore_mana(mana as i32);
}
