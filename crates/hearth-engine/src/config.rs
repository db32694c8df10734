//! Simulation configuration.
//!
//! Loaded from TOML; a missing or invalid file falls back to defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Configuration file name.
pub const CONFIG_FILE: &str = "hearth.toml";

/// Parameters of a simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// RNG seed (None = random)
    pub seed: Option<u64>,
    /// Number of world ticks to run
    pub ticks: u32,
    /// Simulated seconds per tick
    pub tick_interval: f64,
    /// Ticks per in-game hour
    pub ticks_per_hour: u32,
    /// RON gameplay tuning (None = built-in defaults)
    pub gameplay_path: Option<PathBuf>,
    /// JSON spell file (None = bundled spells)
    pub spells_path: Option<PathBuf>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: Some(7),
            ticks: 120,
            tick_interval: 1.0,
            ticks_per_hour: 20,
            gameplay_path: None,
            spells_path: None,
        }
    }
}

impl SimConfig {
    /// Load configuration from the default file location.
    pub fn load() -> Self {
        Self::load_from(CONFIG_FILE)
    }

    /// Load configuration from a specific path.
    /// Returns default config if the file doesn't exist or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Config file not found, using defaults");
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    info!("Loaded config from {}", path.display());
                    config
                },
                Err(e) => {
                    warn!("Failed to parse config file: {e}");
                    Self::default()
                },
            },
            Err(e) => {
                warn!("Failed to read config file: {e}");
                Self::default()
            },
        }
    }

    /// Save configuration to a specific path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(path, contents)?;

        info!("Saved config to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempdir().expect("tempdir");
        let config = SimConfig::load_from(dir.path().join("absent.toml"));
        assert_eq!(config, SimConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("nested").join(CONFIG_FILE);

        let config = SimConfig {
            seed: Some(99),
            ticks: 5,
            spells_path: Some(PathBuf::from("spells.json")),
            ..SimConfig::default()
        };
        config.save_to(&path).expect("save");
        assert_eq!(SimConfig::load_from(&path), config);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "ticks = 3\n").expect("write");

        let config = SimConfig::load_from(&path);
        assert_eq!(config.ticks, 3);
        assert_eq!(config.tick_interval, 1.0);
    }

    #[test]
    fn test_invalid_file_uses_defaults() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "ticks = \"many\"").expect("write");
        assert_eq!(SimConfig::load_from(&path), SimConfig::default());
    }
}
