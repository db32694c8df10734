//! Collaborators the engine consumes but does not own.
//!
//! The room graph, pathfinding, NPC creation and loot are all supplied by the
//! host. [`RoomGraph`] is a small in-memory graph that implements both the map
//! and the pathfinder; the mocks at the bottom back the unit tests.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

use hearth_common::Location;

use crate::config::NpcTuning;
use crate::faction::Faction;
use crate::npc::Npc;

// ============================================================================
// Collaborator traits
// ============================================================================

/// Room and clock queries.
pub trait WorldMap {
    /// Exits of a room as `(direction, destination)` pairs.
    ///
    /// Destinations are `"region:room"` or a bare room id.
    fn exits(&self, at: &Location) -> Vec<(String, String)>;

    /// Current in-game hour (0..24).
    fn current_hour(&self) -> u32;
}

/// Black-box pathfinding service.
pub trait Pathfinder {
    /// Directions leading from `from` to `to`, or `None` if unreachable.
    fn find_path(&self, from: &Location, to: &Location) -> Option<Vec<String>>;

    /// Nearest safe location reachable from `from`.
    fn find_nearest_safe_room(&self, from: &Location) -> Option<Location>;

    /// Checks if a location is a safe zone.
    fn is_location_safe(&self, at: &Location) -> bool;
}

/// Creates NPC instances from templates.
pub trait NpcFactory {
    /// Instantiates a summoned creature at `at`, or `None` on failure.
    fn create_summon(&mut self, template_id: &str, at: &Location, level: u32) -> Option<Npc>;
}

/// An item created by a loot roll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDrop {
    /// Item template id
    pub item_id: String,
    /// Stack size
    pub quantity: u32,
}

impl ItemDrop {
    /// Display form: "a rat tail", "an ember", "3 gold coin".
    #[must_use]
    pub fn describe(&self) -> String {
        let name = self.item_id.replace('_', " ");
        if self.quantity == 1 {
            let article = if name.starts_with(['a', 'e', 'i', 'o', 'u']) { "an" } else { "a" };
            format!("{article} {name}")
        } else {
            format!("{} {name}", self.quantity)
        }
    }
}

/// Narrates what a defeated entity dropped, or `None` for no drops.
#[must_use]
pub fn loot_message(name: &str, drops: &[ItemDrop]) -> Option<String> {
    let parts: Vec<String> = drops
        .iter()
        .filter(|drop| drop.quantity > 0)
        .map(ItemDrop::describe)
        .collect();
    let listed = match parts.as_slice() {
        [] => return None,
        [only] => only.clone(),
        [first, second] => format!("{first} and {second}"),
        [rest @ .., last] => format!("{}, and {last}", rest.join(", ")),
    };
    Some(format!("{name} dropped {listed}."))
}

/// Death hook collaborator.
pub trait LootTable {
    /// Rolls loot for a defeated NPC template, or `None` on failure.
    fn roll_loot(&mut self, template_id: &str, at: &Location) -> Option<Vec<ItemDrop>>;
}

/// Everything a single world tick needs from the host.
pub struct TickContext<'a> {
    /// Current time in seconds
    pub now: f64,
    /// Seconds since the previous tick
    pub dt: f64,
    /// Room graph
    pub world: &'a dyn WorldMap,
    /// Path service
    pub pathfinder: &'a dyn Pathfinder,
    /// NPC factory
    pub factory: &'a mut dyn NpcFactory,
    /// Loot collaborator
    pub loot: &'a mut dyn LootTable,
}

// ============================================================================
// Room graph
// ============================================================================

/// In-memory room graph with breadth-first pathfinding.
#[derive(Debug, Clone, Default)]
pub struct RoomGraph {
    exits: HashMap<Location, Vec<(String, String)>>,
    safe: HashSet<Location>,
    hour: u32,
}

impl RoomGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a one-way exit.
    pub fn add_exit(&mut self, from: &Location, direction: &str, destination: &str) {
        self.exits
            .entry(from.clone())
            .or_default()
            .push((direction.to_string(), destination.to_string()));
    }

    /// Adds exits in both directions between two rooms.
    pub fn connect(&mut self, a: &Location, direction: &str, b: &Location, back: &str) {
        self.add_exit(a, direction, &b.to_string());
        self.add_exit(b, back, &a.to_string());
    }

    /// Marks a location as a safe zone.
    pub fn mark_safe(&mut self, at: &Location) {
        self.safe.insert(at.clone());
    }

    /// Sets the in-game hour.
    pub fn set_hour(&mut self, hour: u32) {
        self.hour = hour % 24;
    }

    /// Advances the in-game hour by one, wrapping at midnight.
    pub fn advance_hour(&mut self) {
        self.hour = (self.hour + 1) % 24;
    }

    /// Every room that has at least one exit.
    pub fn rooms(&self) -> impl Iterator<Item = &Location> {
        self.exits.keys()
    }

    fn search<F>(&self, from: &Location, mut done: F) -> Option<(Location, Vec<String>)>
    where
        F: FnMut(&Location) -> bool,
    {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        visited.insert(from.clone());
        queue.push_back((from.clone(), Vec::new()));

        while let Some((here, path)) = queue.pop_front() {
            if done(&here) {
                return Some((here, path));
            }
            for (direction, destination) in self.exits(&here) {
                let next = here.resolve_exit(&destination);
                if visited.insert(next.clone()) {
                    let mut next_path = path.clone();
                    next_path.push(direction);
                    queue.push_back((next, next_path));
                }
            }
        }
        None
    }
}

impl WorldMap for RoomGraph {
    fn exits(&self, at: &Location) -> Vec<(String, String)> {
        self.exits.get(at).cloned().unwrap_or_default()
    }

    fn current_hour(&self) -> u32 {
        self.hour
    }
}

impl Pathfinder for RoomGraph {
    fn find_path(&self, from: &Location, to: &Location) -> Option<Vec<String>> {
        self.search(from, |here| here == to).map(|(_, path)| path)
    }

    fn find_nearest_safe_room(&self, from: &Location) -> Option<Location> {
        self.search(from, |here| self.safe.contains(here))
            .map(|(found, _)| found)
    }

    fn is_location_safe(&self, at: &Location) -> bool {
        self.safe.contains(at)
    }
}

// ============================================================================
// Mocks
// ============================================================================

/// Mock NPC factory that builds plain NPCs from default tuning.
#[derive(Debug, Default)]
pub struct MockNpcFactory {
    /// Tuning used for created NPCs
    pub tuning: NpcTuning,
    /// Templates that fail to instantiate
    pub failing: HashSet<String>,
    /// Template ids requested so far
    pub created: Vec<String>,
}

impl MockNpcFactory {
    /// Creates a new mock factory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl NpcFactory for MockNpcFactory {
    fn create_summon(&mut self, template_id: &str, at: &Location, level: u32) -> Option<Npc> {
        if self.failing.contains(template_id) {
            return None;
        }
        self.created.push(template_id.to_string());
        let mut npc = Npc::new(template_id, capitalize(template_id), at.clone(), &self.tuning)
            .with_faction(Faction::PlayerMinion);
        npc.attributes.level = level;
        Some(npc)
    }
}

/// Mock loot table that records every roll.
#[derive(Debug, Default)]
pub struct MockLootTable {
    /// Drops returned for every roll; `None` simulates a failure
    pub drops: Option<Vec<ItemDrop>>,
    /// Template ids rolled so far
    pub rolled: Vec<String>,
}

impl MockLootTable {
    /// Creates a new mock loot table that drops nothing.
    #[must_use]
    pub fn new() -> Self {
        Self {
            drops: Some(Vec::new()),
            rolled: Vec::new(),
        }
    }
}

impl LootTable for MockLootTable {
    fn roll_loot(&mut self, template_id: &str, _at: &Location) -> Option<Vec<ItemDrop>> {
        self.rolled.push(template_id.to_string());
        self.drops.clone()
    }
}

fn capitalize(id: &str) -> String {
    let mut chars = id.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect::<String>().replace('_', " ")
    })
}
