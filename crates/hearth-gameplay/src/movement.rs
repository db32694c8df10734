//! Room-to-room movement for idle behaviors.

use hearth_common::Location;

use crate::arena::Arena;
use crate::combatant::Combatant;
use crate::npc::Npc;
use crate::world::{Pathfinder, WorldMap};

/// Result of one movement attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Step {
    /// Whether the NPC changed rooms
    pub moved: bool,
    /// Narration visible to the player
    pub message: Option<String>,
}

impl Step {
    /// A turn spent without moving.
    #[must_use]
    pub const fn idle() -> Self {
        Self {
            moved: false,
            message: None,
        }
    }
}

/// Moves an NPC through the exit named `direction`.
///
/// The player sees "leaves" from the departure room and "arrives" from the
/// arrival room.
pub fn execute_move(npc: &mut Npc, direction: &str, world: &dyn WorldMap, arena: &Arena) -> Step {
    let Some((direction, destination)) = world
        .exits(&npc.location)
        .into_iter()
        .find(|(exit, _)| exit.eq_ignore_ascii_case(direction))
    else {
        return Step::idle();
    };
    let to = npc.location.resolve_exit(&destination);
    let message = if arena.player_in_room(&npc.location) {
        Some(format!("{} leaves to the {direction}.", npc.name))
    } else if arena.player_in_room(&to) {
        Some(format!("{} arrives.", npc.name))
    } else {
        None
    };
    npc.location = to;
    Step {
        moved: true,
        message,
    }
}

/// Exits a wandering NPC may take.
///
/// Instanced regions are never entered by wandering and never left once
/// inside. Hostile NPCs stay out of safe rooms.
#[must_use]
pub fn wander_exits(npc: &Npc, world: &dyn WorldMap, pathfinder: &dyn Pathfinder) -> Vec<String> {
    world
        .exits(&npc.location)
        .into_iter()
        .filter(|(_, destination)| {
            let to = npc.location.resolve_exit(destination);
            let crosses_instance = if npc.location.is_instance() {
                !to.same_region(&npc.location)
            } else {
                to.is_instance()
            };
            !crosses_instance && !(npc.is_hostile() && pathfinder.is_location_safe(&to))
        })
        .map(|(direction, _)| direction)
        .collect()
}

/// Random wandering gated by the NPC's wander chance.
pub fn wander(
    npc: &mut Npc,
    world: &dyn WorldMap,
    pathfinder: &dyn Pathfinder,
    arena: &Arena,
    rng: &mut fastrand::Rng,
) -> Step {
    if rng.f32() >= npc.wander_chance {
        return Step::idle();
    }
    let exits = wander_exits(npc, world, pathfinder);
    if exits.is_empty() {
        return Step::idle();
    }
    let direction = exits[rng.usize(..exits.len())].clone();
    execute_move(npc, &direction, world, arena)
}

/// Takes the first step of a path toward `to`.
pub fn step_toward(
    npc: &mut Npc,
    to: &Location,
    world: &dyn WorldMap,
    pathfinder: &dyn Pathfinder,
    arena: &Arena,
) -> Option<Step> {
    let path = pathfinder.find_path(&npc.location, to)?;
    let direction = path.first()?;
    Some(execute_move(npc, direction, world, arena))
}

/// Walks the patrol loop.
///
/// Reaching the current waypoint advances the cursor and ends the turn.
/// Without a path the NPC wanders instead.
pub fn patrol(
    npc: &mut Npc,
    world: &dyn WorldMap,
    pathfinder: &dyn Pathfinder,
    arena: &Arena,
    rng: &mut fastrand::Rng,
) -> Step {
    if npc.patrol_points.is_empty() {
        return Step::idle();
    }
    let index = npc.patrol_index % npc.patrol_points.len();
    let waypoint = npc.patrol_points[index].clone();
    if npc.location == waypoint {
        npc.patrol_index = (index + 1) % npc.patrol_points.len();
        return Step::idle();
    }
    step_toward(npc, &waypoint, world, pathfinder, arena)
        .unwrap_or_else(|| wander(npc, world, pathfinder, arena, rng))
}

/// Trails the follow target.
pub fn follow(npc: &mut Npc, world: &dyn WorldMap, pathfinder: &dyn Pathfinder, arena: &Arena) -> Step {
    let Some(target_id) = npc.follow_target else {
        return Step::idle();
    };
    let Some(target) = arena.get(target_id).filter(|target| target.is_alive()) else {
        npc.follow_target = None;
        return Step::idle();
    };
    if target.location() == &npc.location {
        return Step::idle();
    }
    let destination = target.location().clone();
    step_toward(npc, &destination, world, pathfinder, arena).unwrap_or_default()
}

/// Walks toward the schedule entry for the current hour.
pub fn follow_schedule(
    npc: &mut Npc,
    world: &dyn WorldMap,
    pathfinder: &dyn Pathfinder,
    arena: &Arena,
) -> Step {
    let Some(entry) = npc.schedule_entry(world.current_hour()).cloned() else {
        return Step::idle();
    };
    if npc.schedule_destination.as_ref() != Some(&entry.destination) {
        npc.schedule_destination = Some(entry.destination.clone());
        npc.schedule_path.clear();
        npc.current_activity = Some(entry.activity.clone());
    }
    if npc.location == entry.destination {
        return Step::idle();
    }
    if npc.schedule_path.is_empty() {
        match pathfinder.find_path(&npc.location, &entry.destination) {
            Some(path) if !path.is_empty() => npc.schedule_path = path,
            _ => {
                npc.schedule_destination = None;
                return Step::idle();
            },
        }
    }
    let direction = npc.schedule_path.remove(0);
    let step = execute_move(npc, &direction, world, arena);
    if !step.moved {
        npc.schedule_path.clear();
    }
    step
}
