//! # Hearth Simulator
//!
//! Headless driver for the Hearth NPC engine: loads configuration, builds a
//! small town and runs the world tick loop, logging what the player sees.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

mod config;
mod sim;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use hearth_gameplay::GameplayConfig;

use crate::config::SimConfig;
use crate::sim::{load_spells, Simulation};

/// Main entry point.
fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("hearth=info".parse()?))
        .init();

    info!("Hearth simulator starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = SimConfig::load();
    let gameplay = match &config.gameplay_path {
        Some(path) => GameplayConfig::load_from(path)
            .with_context(|| format!("loading gameplay tuning from {}", path.display()))?,
        None => GameplayConfig::default(),
    };
    let spells = load_spells(config.spells_path.as_deref())?;

    let mut sim = Simulation::new(config, &gameplay, spells);
    while !sim.finished() {
        for message in sim.step() {
            info!("[{:>6.1}s] {message}", sim.now());
        }
    }

    let survivors = sim
        .arena()
        .npc_ids()
        .into_iter()
        .filter_map(|id| sim.arena().npc(id))
        .filter(|npc| npc.attributes.is_alive())
        .count();
    info!("Simulation finished: {survivors} NPCs still standing");
    Ok(())
}
