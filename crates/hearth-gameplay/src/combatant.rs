//! The capability shared by every entity that can fight.
//!
//! [`Combatant`] is implemented once for [`Player`] and once for [`Npc`];
//! [`Actor`] is the closed sum the arena stores and delegates through it.

use hearth_common::{EntityId, Location};

use crate::attributes::Attributes;
use crate::config::NpcTuning;
use crate::effects::{Effect, EffectTick};
use crate::faction::Faction;
use crate::npc::Npc;
use crate::player::Player;
use crate::stats::{DamageType, StatKind};

/// An entity with attributes that can attack and be attacked.
pub trait Combatant {
    /// Entity id.
    fn id(&self) -> EntityId;
    /// Display name.
    fn name(&self) -> &str;
    /// Attribute model.
    fn attributes(&self) -> &Attributes;
    /// Mutable attribute model.
    fn attributes_mut(&mut self) -> &mut Attributes;
    /// Allegiance.
    fn faction(&self) -> Faction;
    /// Current room.
    fn location(&self) -> &Location;
    /// Melee attack power before variance.
    fn attack_power(&self) -> i32;
    /// Adds experience; returns the number of levels gained.
    fn gain_experience(&mut self, amount: u32, tuning: &NpcTuning) -> u32;

    /// Owning player of a summoned creature.
    fn owner(&self) -> Option<EntityId> {
        None
    }

    /// Whether this is the player character.
    fn is_player(&self) -> bool {
        false
    }

    /// The player, if this is one.
    fn as_player_mut(&mut self) -> Option<&mut Player> {
        None
    }

    /// Character level.
    fn level(&self) -> u32 {
        self.attributes().level
    }

    /// Base stat plus modifiers.
    fn get_effective_stat(&self, stat: StatKind) -> i32 {
        self.attributes().effective_stat(stat)
    }

    /// Applies mitigated damage; returns the damage applied.
    fn take_damage(&mut self, amount: i32, damage_type: DamageType) -> i32 {
        self.attributes_mut().take_damage(amount, damage_type)
    }

    /// Heals; returns the health restored.
    fn heal(&mut self, amount: i32) -> i32 {
        self.attributes_mut().heal(amount)
    }

    /// Installs an effect.
    fn apply_effect(&mut self, effect: Effect, now: f64) -> bool {
        self.attributes_mut().apply_effect(effect, now)
    }

    /// Removes an effect by name.
    fn remove_effect(&mut self, name: &str) -> bool {
        self.attributes_mut().remove_effect(name)
    }

    /// Checks for an effect by name.
    fn has_effect(&self, name: &str) -> bool {
        self.attributes().has_effect(name)
    }

    /// Checks the alive flag.
    fn is_alive(&self) -> bool {
        self.attributes().is_alive()
    }

    /// Advances every active effect.
    fn process_active_effects(&mut self, now: f64, dt: f64) -> EffectTick {
        let owner = self.name().to_string();
        self.attributes_mut().process_active_effects(&owner, now, dt)
    }
}

impl Combatant for Npc {
    fn id(&self) -> EntityId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }

    fn faction(&self) -> Faction {
        self.faction
    }

    fn location(&self) -> &Location {
        &self.location
    }

    fn attack_power(&self) -> i32 {
        self.attack_power
    }

    fn gain_experience(&mut self, amount: u32, tuning: &NpcTuning) -> u32 {
        Npc::gain_experience(self, amount, tuning)
    }

    fn owner(&self) -> Option<EntityId> {
        Npc::owner(self)
    }
}

impl Combatant for Player {
    fn id(&self) -> EntityId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }

    fn faction(&self) -> Faction {
        Faction::Player
    }

    fn location(&self) -> &Location {
        &self.location
    }

    fn attack_power(&self) -> i32 {
        self.base_attack_power
    }

    fn gain_experience(&mut self, amount: u32, tuning: &NpcTuning) -> u32 {
        Player::gain_experience(self, amount, tuning)
    }

    fn is_player(&self) -> bool {
        true
    }

    fn as_player_mut(&mut self) -> Option<&mut Player> {
        Some(self)
    }
}

// ============================================================================
// Actor
// ============================================================================

/// Any entity stored in the arena.
#[derive(Debug, Clone)]
pub enum Actor {
    /// The player character.
    Player(Box<Player>),
    /// A non-player character.
    Npc(Box<Npc>),
}

impl Actor {
    /// The NPC, if this is one.
    #[must_use]
    pub fn as_npc(&self) -> Option<&Npc> {
        match self {
            Self::Npc(npc) => Some(&**npc),
            Self::Player(_) => None,
        }
    }

    /// The mutable NPC, if this is one.
    pub fn as_npc_mut(&mut self) -> Option<&mut Npc> {
        match self {
            Self::Npc(npc) => Some(&mut **npc),
            Self::Player(_) => None,
        }
    }

    /// The player, if this is one.
    #[must_use]
    pub fn as_player(&self) -> Option<&Player> {
        match self {
            Self::Player(player) => Some(&**player),
            Self::Npc(_) => None,
        }
    }

    fn inner(&self) -> &dyn Combatant {
        match self {
            Self::Player(player) => &**player,
            Self::Npc(npc) => &**npc,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Combatant {
        match self {
            Self::Player(player) => &mut **player,
            Self::Npc(npc) => &mut **npc,
        }
    }
}

impl From<Player> for Actor {
    fn from(player: Player) -> Self {
        Self::Player(Box::new(player))
    }
}

impl From<Npc> for Actor {
    fn from(npc: Npc) -> Self {
        Self::Npc(Box::new(npc))
    }
}

impl Combatant for Actor {
    fn id(&self) -> EntityId {
        self.inner().id()
    }

    fn name(&self) -> &str {
        self.inner().name()
    }

    fn attributes(&self) -> &Attributes {
        self.inner().attributes()
    }

    fn attributes_mut(&mut self) -> &mut Attributes {
        self.inner_mut().attributes_mut()
    }

    fn faction(&self) -> Faction {
        self.inner().faction()
    }

    fn location(&self) -> &Location {
        self.inner().location()
    }

    fn attack_power(&self) -> i32 {
        self.inner().attack_power()
    }

    fn gain_experience(&mut self, amount: u32, tuning: &NpcTuning) -> u32 {
        self.inner_mut().gain_experience(amount, tuning)
    }

    fn owner(&self) -> Option<EntityId> {
        self.inner().owner()
    }

    fn is_player(&self) -> bool {
        self.inner().is_player()
    }

    fn as_player_mut(&mut self) -> Option<&mut Player> {
        self.inner_mut().as_player_mut()
    }
}
