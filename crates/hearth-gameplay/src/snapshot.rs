//! Persistence snapshots of NPC state.
//!
//! A snapshot carries everything needed to rebuild an NPC between sessions
//! except active effects, which are transient. The engine owns no file
//! format: callers pick JSON or bincode and decide where the bytes go.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use hearth_common::{EntityId, HearthError, Location, SchemaVersion};

use crate::config::NpcTuning;
use crate::faction::Faction;
use crate::npc::{BehaviorState, Npc};
use crate::stats::{DamageType, StatMap};

/// Errors raised while encoding or decoding snapshots.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// JSON encoding failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Binary encoding failed
    #[error("Binary encoding error: {0}")]
    Bincode(String),

    /// Snapshot written by an incompatible schema
    #[error("Incompatible snapshot version: expected {expected}, found {found}")]
    Version {
        /// Version this build reads
        expected: SchemaVersion,
        /// Version found in the data
        found: SchemaVersion,
    },
}

/// Result type for snapshot operations.
pub type SnapshotResult<T> = Result<T, SnapshotError>;

impl From<SnapshotError> for HearthError {
    fn from(err: SnapshotError) -> Self {
        match err {
            SnapshotError::Version { expected, found } => Self::VersionMismatch {
                expected: expected.to_string(),
                actual: found.to_string(),
            },
            other => Self::Serialization(other.to_string()),
        }
    }
}

/// Serializable NPC state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NpcSnapshot {
    /// Schema version
    pub version: SchemaVersion,
    /// Template id
    pub template_id: String,
    /// Raw entity id
    pub id: u64,
    /// Display name
    pub name: String,
    /// Current room
    pub location: Location,
    /// Spawn room
    pub home: Location,
    /// Current health
    pub health: i32,
    /// Maximum health
    pub max_health: i32,
    /// Current mana
    pub mana: i32,
    /// Maximum mana
    pub max_mana: i32,
    /// Level
    pub level: u32,
    /// Experience toward the next level
    pub experience: u32,
    /// Experience threshold of the next level
    pub experience_to_level: u32,
    /// Alive flag
    pub alive: bool,
    /// Base stats
    pub stats: StatMap,
    /// Innate resistances
    #[serde(default)]
    pub resistances: HashMap<DamageType, i32>,
    /// Spell cooldown expiries
    #[serde(default)]
    pub spell_cooldowns: HashMap<String, f64>,
    /// Behavior tag and override stack
    pub behavior: BehaviorState,
    /// Patrol cursor
    #[serde(default)]
    pub patrol_index: usize,
    /// Follow target
    #[serde(default)]
    pub follow_target: Option<u64>,
    /// Remaining retreat steps
    #[serde(default)]
    pub retreat_path: Vec<String>,
    /// Retreat destination
    #[serde(default)]
    pub retreat_destination: Option<Location>,
    /// Activity of the active schedule entry
    #[serde(default)]
    pub current_activity: Option<String>,
    /// Allegiance
    pub faction: Faction,
}

impl NpcSnapshot {
    /// Encodes as JSON.
    pub fn to_json(&self) -> SnapshotResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decodes from JSON, rejecting incompatible versions.
    pub fn from_json(json: &str) -> SnapshotResult<Self> {
        let snapshot: Self = serde_json::from_str(json)?;
        snapshot.check_version()
    }

    /// Encodes as bincode.
    pub fn to_bincode(&self) -> SnapshotResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| SnapshotError::Bincode(e.to_string()))
    }

    /// Decodes from bincode, rejecting incompatible versions.
    pub fn from_bincode(bytes: &[u8]) -> SnapshotResult<Self> {
        let snapshot: Self =
            bincode::deserialize(bytes).map_err(|e| SnapshotError::Bincode(e.to_string()))?;
        snapshot.check_version()
    }

    fn check_version(self) -> SnapshotResult<Self> {
        if SchemaVersion::NPC_SNAPSHOT.can_read(&self.version) {
            Ok(self)
        } else {
            Err(SnapshotError::Version {
                expected: SchemaVersion::NPC_SNAPSHOT,
                found: self.version,
            })
        }
    }
}

impl Npc {
    /// Captures the persistent part of this NPC.
    #[must_use]
    pub fn snapshot(&self) -> NpcSnapshot {
        let attributes = &self.attributes;
        NpcSnapshot {
            version: SchemaVersion::NPC_SNAPSHOT,
            template_id: self.template_id.clone(),
            id: self.id.raw(),
            name: self.name.clone(),
            location: self.location.clone(),
            home: self.home.clone(),
            health: attributes.health,
            max_health: attributes.max_health,
            mana: attributes.mana,
            max_mana: attributes.max_mana,
            level: attributes.level,
            experience: self.progression.experience,
            experience_to_level: self.progression.experience_to_level,
            alive: attributes.is_alive(),
            stats: attributes.stats.clone(),
            resistances: attributes.resistances.clone(),
            spell_cooldowns: attributes.spell_cooldowns.clone(),
            behavior: self.behavior.clone(),
            patrol_index: self.patrol_index,
            follow_target: self.follow_target.map(EntityId::raw),
            retreat_path: self.retreat_path.clone(),
            retreat_destination: self.retreat_destination.clone(),
            current_activity: self.current_activity.clone(),
            faction: self.faction,
        }
    }

    /// Rebuilds an NPC from a snapshot.
    ///
    /// Tuning supplies everything the snapshot does not carry (cooldown
    /// lengths, aggression, attack power). Effects start empty.
    #[must_use]
    pub fn from_snapshot(snapshot: NpcSnapshot, tuning: &NpcTuning) -> Self {
        let mut npc = Self::new(snapshot.template_id, snapshot.name, snapshot.location, tuning)
            .with_faction(snapshot.faction);
        npc.id = EntityId::from_raw(snapshot.id);
        npc.home = snapshot.home;

        let attributes = &mut npc.attributes;
        attributes.stats = snapshot.stats;
        attributes.resistances = snapshot.resistances;
        attributes.max_health = snapshot.max_health.max(1);
        attributes.health = snapshot.health.clamp(0, attributes.max_health);
        attributes.max_mana = snapshot.max_mana.max(0);
        attributes.mana = snapshot.mana.clamp(0, attributes.max_mana);
        attributes.level = snapshot.level.max(1);
        attributes.spell_cooldowns = snapshot.spell_cooldowns;
        if !snapshot.alive || attributes.health == 0 {
            attributes.kill();
        }

        npc.progression.experience = snapshot.experience;
        npc.progression.experience_to_level = snapshot.experience_to_level;
        npc.behavior = snapshot.behavior;
        npc.patrol_index = snapshot.patrol_index;
        npc.follow_target = snapshot.follow_target.map(EntityId::from_raw);
        npc.retreat_path = snapshot.retreat_path;
        npc.retreat_destination = snapshot.retreat_destination;
        npc.current_activity = snapshot.current_activity;
        npc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::Effect;
    use crate::npc::Behavior;
    use crate::stats::StatKind;

    fn tuning() -> NpcTuning {
        NpcTuning::default()
    }

    fn veteran() -> Npc {
        let mut npc = Npc::new(
            "orc_captain",
            "Orc Captain",
            Location::new("keep", "hall"),
            &tuning(),
        )
        .with_faction(Faction::Hostile)
        .with_behavior(Behavior::Patrol);
        npc.attributes = npc
            .attributes
            .clone()
            .with_mana(40)
            .with_level(7)
            .with_stat(StatKind::Resist(DamageType::Fire), 25)
            .with_resistance(DamageType::Cold, 10);
        npc.attributes.health = 12;
        npc.attributes.set_spell_cooldown("fireball", 42.5);
        npc.behavior.push_override(Behavior::Retreating);
        npc.retreat_path = vec!["west".to_string(), "up".to_string()];
        npc.retreat_destination = Some(Location::new("keep", "chapel"));
        npc.current_activity = Some("drilling".to_string());
        npc.follow_target = Some(EntityId::from_raw(77));
        npc.patrol_index = 2;
        npc.progression.experience = 90;
        npc
    }

    #[test]
    fn test_json_roundtrip_restores_state() {
        let npc = veteran();
        let json = npc.snapshot().to_json().expect("encode");
        let restored = Npc::from_snapshot(NpcSnapshot::from_json(&json).expect("decode"), &tuning());

        assert_eq!(restored.id, npc.id);
        assert_eq!(restored.attributes.health, 12);
        assert_eq!(restored.attributes.mana, 40);
        assert_eq!(restored.attributes.level, 7);
        assert_eq!(restored.attributes.resistance(DamageType::Fire), 25);
        assert_eq!(restored.attributes.resistance(DamageType::Cold), 10);
        assert!(!restored.attributes.spell_ready("fireball", 40.0));
        assert_eq!(restored.behavior.current, Behavior::Retreating);
        assert_eq!(restored.behavior.overrides, vec![Behavior::Patrol]);
        assert_eq!(restored.retreat_path, npc.retreat_path);
        assert_eq!(restored.follow_target, Some(EntityId::from_raw(77)));
        assert_eq!(restored.faction, Faction::Hostile);
        assert_eq!(restored.progression.experience, 90);
    }

    #[test]
    fn test_bincode_roundtrip() {
        let snapshot = veteran().snapshot();
        let bytes = snapshot.to_bincode().expect("encode");
        assert_eq!(NpcSnapshot::from_bincode(&bytes).expect("decode"), snapshot);
    }

    #[test]
    fn test_effects_are_not_persisted() {
        let mut npc = veteran();
        npc.attributes.apply_effect(Effect::control("Stun", 5.0), 0.0);
        let restored = Npc::from_snapshot(npc.snapshot(), &tuning());
        assert!(restored.attributes.active_effects().is_empty());
    }

    #[test]
    fn test_dead_npc_stays_dead() {
        let mut npc = veteran();
        npc.attributes.kill();
        let restored = Npc::from_snapshot(npc.snapshot(), &tuning());
        assert!(!restored.attributes.is_alive());
        assert_eq!(restored.attributes.health, 0);
    }

    #[test]
    fn test_newer_major_version_is_rejected() {
        let mut snapshot = veteran().snapshot();
        snapshot.version = SchemaVersion::new(2, 0, 0);
        let json = serde_json::to_string(&snapshot).expect("encode");
        assert!(matches!(
            NpcSnapshot::from_json(&json),
            Err(SnapshotError::Version { .. })
        ));
    }

    #[test]
    fn test_version_error_maps_to_common_error() {
        let err = SnapshotError::Version {
            expected: SchemaVersion::NPC_SNAPSHOT,
            found: SchemaVersion::new(3, 1, 0),
        };
        match HearthError::from(err) {
            HearthError::VersionMismatch { expected, actual } => {
                assert_eq!(expected, "1.0.0");
                assert_eq!(actual, "3.1.0");
            },
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_garbage_is_an_error() {
        assert!(NpcSnapshot::from_json("{\"id\": 3}").is_err());
        assert!(NpcSnapshot::from_bincode(&[1, 2, 3]).is_err());
    }
}
