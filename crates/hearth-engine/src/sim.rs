//! Demo simulation: a small town, its inhabitants and a scripted player.

use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

use tracing::{debug, info, warn};

use hearth_common::{EntityId, HearthResult, Location};
use hearth_gameplay::{
    Arena, Behavior, BehaviorSelector, CombatResolver, Faction, GameplayConfig, ItemDrop,
    LootTable, Npc, NpcFactory, NpcTuning, Player, RoomGraph, ScheduleEntry, SpellRegistry,
    TickContext, WorldMap,
};

use crate::config::SimConfig;

/// Spells shipped with the simulator.
const BUNDLED_SPELLS: &str = include_str!("../data/spells.json");

/// Seconds between two player actions.
const PLAYER_ACTION_INTERVAL: f64 = 3.0;

/// Loads spells from a JSON file, or the bundled set.
pub fn load_spells(path: Option<&Path>) -> HearthResult<SpellRegistry> {
    let mut registry = SpellRegistry::new();
    let loaded = match path {
        Some(path) => registry.load_json_file(path).map_err(|e| {
            warn!("Failed to load spells from {}: {e}", path.display());
            e
        })?,
        None => registry.load_json_str(BUNDLED_SPELLS)?,
    };
    info!("Loaded {loaded} spells");
    Ok(registry)
}

fn room(region: &str, name: &str) -> Location {
    Location::new(region, name)
}

/// The demo map.
///
/// ```text
///            wilds:road --down--> instance_barrow:entry
///                |
///            town:gate
///                |
///  town:square --east-- town:temple (safe)
/// ```
pub fn build_world() -> RoomGraph {
    let mut graph = RoomGraph::new();
    graph.connect(&room("town", "square"), "north", &room("town", "gate"), "south");
    graph.connect(&room("town", "gate"), "north", &room("wilds", "road"), "south");
    graph.connect(&room("town", "square"), "east", &room("town", "temple"), "west");
    graph.connect(
        &room("wilds", "road"),
        "down",
        &room("instance_barrow", "entry"),
        "up",
    );
    graph.mark_safe(&room("town", "temple"));
    graph.set_hour(6);
    graph
}

// ============================================================================
// Bestiary
// ============================================================================

/// Summon templates.
pub struct Bestiary {
    tuning: NpcTuning,
}

impl Bestiary {
    /// Creates the demo bestiary.
    pub const fn new(tuning: NpcTuning) -> Self {
        Self { tuning }
    }
}

impl NpcFactory for Bestiary {
    fn create_summon(&mut self, template_id: &str, at: &Location, level: u32) -> Option<Npc> {
        let npc = match template_id {
            "skeleton" => Npc::new(template_id, "Skeleton", at.clone(), &self.tuning).with_attack_power(6),
            "wisp" => Npc::new(template_id, "Wisp", at.clone(), &self.tuning).with_attack_power(2),
            _ => {
                warn!("Unknown summon template {template_id}");
                return None;
            },
        };
        let mut npc = npc.with_faction(Faction::PlayerMinion);
        npc.attributes.level = level;
        Some(npc)
    }
}

/// Drops per NPC template.
pub struct LootTables {
    drops: HashMap<String, Vec<ItemDrop>>,
}

impl Default for LootTables {
    fn default() -> Self {
        let drop = |item: &str, quantity: u32| ItemDrop {
            item_id: item.to_string(),
            quantity,
        };
        Self {
            drops: HashMap::from([
                ("wolf".to_string(), vec![drop("wolf_pelt", 1), drop("raw_meat", 2)]),
                ("cultist".to_string(), vec![drop("dark_robe", 1)]),
            ]),
        }
    }
}

impl LootTable for LootTables {
    fn roll_loot(&mut self, template_id: &str, at: &Location) -> Option<Vec<ItemDrop>> {
        let drops = self.drops.get(template_id).cloned().unwrap_or_default();
        for drop in &drops {
            info!("{} x{} dropped at {at}", drop.item_id, drop.quantity);
        }
        Some(drops)
    }
}

// ============================================================================
// Simulation
// ============================================================================

/// A running simulation.
pub struct Simulation {
    arena: Arena,
    graph: RoomGraph,
    bestiary: Bestiary,
    loot: LootTables,
    selector: BehaviorSelector,
    player_resolver: CombatResolver,
    config: SimConfig,
    now: f64,
    tick: u32,
    last_player_action: f64,
}

impl Simulation {
    /// Builds the town and its inhabitants.
    pub fn new(config: SimConfig, gameplay: &GameplayConfig, spells: SpellRegistry) -> Self {
        let seed = config.seed.unwrap_or_else(|| fastrand::u64(..));
        info!("Simulation seed: {seed}");
        let spells = Rc::new(spells);
        let selector =
            BehaviorSelector::new(CombatResolver::new(Rc::clone(&spells), gameplay).with_seed(seed))
                .with_seed(seed.wrapping_add(1));
        let player_resolver = CombatResolver::new(spells, gameplay).with_seed(seed.wrapping_add(2));

        let mut sim = Self {
            arena: Arena::new(),
            graph: build_world(),
            bestiary: Bestiary::new(gameplay.npc.clone()),
            loot: LootTables::default(),
            selector,
            player_resolver,
            config,
            now: 0.0,
            tick: 0,
            last_player_action: f64::NEG_INFINITY,
        };
        sim.populate(&gameplay.npc);
        sim
    }

    fn populate(&mut self, tuning: &NpcTuning) {
        let square = room("town", "square");
        let gate = room("town", "gate");
        let road = room("wilds", "road");
        let temple = room("town", "temple");

        self.arena
            .insert_player(Player::new("Wanderer", square.clone(), tuning));

        self.arena.insert_npc(
            Npc::new("guard", "Town Guard", gate.clone(), tuning)
                .with_faction(Faction::Friendly)
                .with_behavior(Behavior::Patrol)
                .with_patrol(vec![gate.clone(), square.clone()])
                .with_attack_power(5)
                .with_aggression(0.5),
        );

        let mut priestess = Npc::new("priestess", "Priestess", square.clone(), tuning)
            .with_faction(Faction::Friendly)
            .with_behavior(Behavior::Healer)
            .with_spells(vec!["mend".to_string()], 0.0);
        priestess.attributes = priestess.attributes.clone().with_mana(40);
        self.arena.insert_npc(priestess);

        self.arena.insert_npc(
            Npc::new("wolf", "Grey Wolf", road.clone(), tuning)
                .with_faction(Faction::Hostile)
                .with_behavior(Behavior::Wanderer)
                .with_aggression(0.8)
                .with_move_cooldown(4.0),
        );

        let mut cultist = Npc::new("cultist", "Cultist", road.clone(), tuning)
            .with_faction(Faction::Hostile)
            .with_behavior(Behavior::Scheduled)
            .with_spells(vec!["shadow_bolt".to_string(), "venom_spit".to_string()], 0.6)
            .with_schedule_entry(6, ScheduleEntry::new(road.clone(), "lurking"))
            .with_schedule_entry(9, ScheduleEntry::new(gate, "prowling").aggressive())
            .with_move_cooldown(5.0);
        cultist.attributes = cultist.attributes.clone().with_mana(30);
        self.arena.insert_npc(cultist);

        self.arena.insert_npc(
            Npc::new("merchant", "Merchant", temple.clone(), tuning)
                .with_faction(Faction::Neutral)
                .with_behavior(Behavior::Scheduled)
                .with_schedule_entry(7, ScheduleEntry::new(square, "selling wares"))
                .with_schedule_entry(20, ScheduleEntry::new(temple, "resting"))
                .with_move_cooldown(5.0),
        );

        info!("Populated {} entities", self.arena.len());
    }

    /// The arena.
    pub const fn arena(&self) -> &Arena {
        &self.arena
    }

    /// Simulated seconds elapsed.
    pub const fn now(&self) -> f64 {
        self.now
    }

    /// Whether the configured number of ticks has run.
    pub const fn finished(&self) -> bool {
        self.tick >= self.config.ticks
    }

    /// Advances the world by one tick and returns what the player saw.
    pub fn step(&mut self) -> Vec<String> {
        self.tick += 1;
        self.now += self.config.tick_interval;
        if self.config.ticks_per_hour > 0 && self.tick % self.config.ticks_per_hour == 0 {
            self.graph.advance_hour();
            debug!("Hour is now {}", self.graph.current_hour());
        }

        let mut messages = self.player_turn();
        let mut ctx = TickContext {
            now: self.now,
            dt: self.config.tick_interval,
            world: &self.graph,
            pathfinder: &self.graph,
            factory: &mut self.bestiary,
            loot: &mut self.loot,
        };
        messages.extend(self.selector.update_all(&mut self.arena, &mut ctx));

        for event in self.arena.events.drain() {
            debug!("{event:?}");
        }
        messages
    }

    /// Runs until the configured tick count, returning every message.
    pub fn run(&mut self) -> Vec<String> {
        let mut log = Vec::new();
        while !self.finished() {
            log.extend(self.step());
        }
        log
    }

    /// A scripted player: raise a skeleton, fight back, heal when hurt.
    fn player_turn(&mut self) -> Vec<String> {
        let Some(player) = self.arena.player() else {
            return Vec::new();
        };
        if !player.attributes.is_alive() || self.now - self.last_player_action < PLAYER_ACTION_INTERVAL {
            return Vec::new();
        }
        let player_id = player.id;
        let wounded = player.attributes.health_fraction() < 0.5;
        let has_summon = player.total_summons() > 0;
        let target = self.player_target(player_id);

        let mut ctx = TickContext {
            now: self.now,
            dt: self.config.tick_interval,
            world: &self.graph,
            pathfinder: &self.graph,
            factory: &mut self.bestiary,
            loot: &mut self.loot,
        };
        let message = if wounded {
            self.player_resolver
                .player_cast(&mut self.arena, "mend", None, &mut ctx)
                .map(|outcome| outcome.message)
        } else if !has_summon {
            self.player_resolver
                .player_cast(&mut self.arena, "raise_dead", None, &mut ctx)
                .map(|outcome| outcome.message)
        } else if let Some(target) = target {
            self.player_resolver
                .player_attack(&mut self.arena, target, ctx.loot)
                .map(|outcome| outcome.message)
        } else {
            None
        };
        if message.is_some() {
            self.last_player_action = self.now;
        }
        message.into_iter().collect()
    }

    fn player_target(&self, player_id: EntityId) -> Option<EntityId> {
        let location = self.arena.player()?.location.clone();
        self.arena
            .threat
            .target(player_id)
            .or_else(|| self.arena.threat.attackers_of(player_id).first().copied())
            .filter(|&id| self.arena.is_present(id, &location))
    }
}
