//! Driver configuration.
//!
//! Parameters for world size, seeding, streaming, and data location.
//! Configuration can be loaded from and saved to a TOML file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Configuration file name.
const CONFIG_FILE: &str = "wildermere.toml";

/// Driver configuration parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    // === World Settings ===
    /// World seed (None = pick one and write it back).
    pub world_seed: Option<u64>,
    /// World width in chunks.
    pub world_width: i32,
    /// World height in chunks.
    pub world_height: i32,

    // === Streaming Settings ===
    /// Window radius in chunks around the point of interest.
    pub window_radius: i32,
    /// Maximum live levels before hibernation.
    pub max_levels: usize,
    /// Global vegetation density multiplier.
    pub plant_density: f32,

    // === Storage Settings ===
    /// Directory world data is persisted under.
    pub data_dir: PathBuf,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            world_seed: None,
            world_width: 64,
            world_height: 64,
            window_radius: 3,
            max_levels: 4,
            plant_density: 1.0,
            data_dir: PathBuf::from("wildermere-data"),
        }
    }
}

impl WorldConfig {
    /// Loads configuration from the default file location.
    #[must_use]
    pub fn load() -> Self {
        Self::load_from(CONFIG_FILE)
    }

    /// Loads configuration from a specific path.
    ///
    /// Returns defaults if the file is missing or invalid.
    #[must_use]
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            info!("config file not found, using defaults");
            return Self::default();
        }
        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    info!("loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    warn!("failed to parse config file: {e}");
                    Self::default()
                }
            },
            Err(e) => {
                warn!("failed to read config file: {e}");
                Self::default()
            }
        }
    }

    /// Saves configuration to the default file location.
    pub fn save(&self) -> io::Result<()> {
        self.save_to(CONFIG_FILE)
    }

    /// Saves configuration to a specific path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let contents = toml::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(path, contents)?;
        info!("saved config to {}", path.display());
        Ok(())
    }

    /// Clamps configuration values to sensible ranges.
    pub fn validate(&mut self) {
        self.world_width = self.world_width.clamp(4, 1024);
        self.world_height = self.world_height.clamp(4, 1024);
        self.window_radius = self.window_radius.clamp(1, 16);
        self.max_levels = self.max_levels.clamp(1, 64);
        self.plant_density = self.plant_density.clamp(0.0, 4.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("test_config.toml");

        let mut config = WorldConfig::default();
        config.world_seed = Some(12345);
        config.world_width = 32;
        config.save_to(&path).expect("save");

        let loaded = WorldConfig::load_from(&path);
        assert_eq!(loaded.world_seed, Some(12345));
        assert_eq!(loaded.world_width, 32);
        assert_eq!(loaded.window_radius, config.window_radius);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = WorldConfig::load_from("/nonexistent/path/config.toml");
        assert_eq!(config.world_seed, None);
        assert_eq!(config.world_width, WorldConfig::default().world_width);
    }

    #[test]
    fn test_validate_clamps() {
        let mut config = WorldConfig {
            world_width: 0,
            world_height: 100_000,
            window_radius: 99,
            max_levels: 0,
            plant_density: -1.0,
            ..WorldConfig::default()
        };
        config.validate();
        assert_eq!(config.world_width, 4);
        assert_eq!(config.world_height, 1024);
        assert_eq!(config.window_radius, 16);
        assert_eq!(config.max_levels, 1);
        assert_eq!(config.plant_density, 0.0);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("partial.toml");
        fs::write(&path, "world_seed = 7\n").expect("write");
        let config = WorldConfig::load_from(&path);
        assert_eq!(config.world_seed, Some(7));
        assert_eq!(config.world_width, WorldConfig::default().world_width);
    }
}
