use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GameConfig {
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub world: WorldConfig,
    #[serde(default)]
    pub display: DisplaySection,
    #[serde(default)]
    pub debug: DebugConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Period of the simulation timer.
    pub tick_interval_ms: u64,
    /// Timer beats per game tick.
    pub ticks_per_step: u32,
    /// Period of the read-only render pass.
    pub render_interval_ms: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub height: i32,
    pub width: i32,
    /// Fixed map seed. Random when absent.
    pub seed: Option<u64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySection {
    pub symbols: String,
    pub colors: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    /// Place any structure for free, ignoring inventory.
    pub free_placement: bool,
    /// Log the tick counter on every read pass.
    pub log_ticks: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 10,
            ticks_per_step: 10,
            render_interval_ms: 20,
        }
    }
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            height: 100,
            width: 120,
            seed: None,
        }
    }
}

impl Default for DisplaySection {
    fn default() -> Self {
        Self {
            symbols: "unicode".to_string(),
            colors: "8 color".to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not determine config directory")]
    NoConfigDir,
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

pub fn config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "termfact")
        .map(|dirs| dirs.config_dir().join("settings.toml"))
}

impl GameConfig {
    /// Load from the platform config directory. A missing file is created
    /// with defaults; an unreadable one is reported and replaced by defaults
    /// in memory only.
    pub fn load() -> Self {
        let Some(path) = config_path() else {
            return Self::default();
        };

        match Self::load_from(&path) {
            Ok(config) => config,
            Err(ConfigError::Io { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                let config = Self::default();
                config.save();
                config
            }
            Err(e) => {
                log::warn!("{e}. Using defaults.");
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self) {
        let result = config_path()
            .ok_or(ConfigError::NoConfigDir)
            .and_then(|path| self.save_to(&path));
        if let Err(e) = result {
            log::warn!("Failed to save config: {e}");
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GameConfig::default();
        assert_eq!(config.simulation.tick_interval_ms, 10);
        assert_eq!(config.simulation.ticks_per_step, 10);
        assert_eq!(config.simulation.render_interval_ms, 20);
        assert_eq!(config.world.height, 100);
        assert_eq!(config.world.width, 120);
        assert_eq!(config.world.seed, None);
        assert_eq!(config.display.symbols, "unicode");
        assert!(!config.debug.free_placement);
    }

    #[test]
    fn test_config_toml_roundtrip() {
        let mut config = GameConfig::default();
        config.world.seed = Some(42);
        config.display.symbols = "ascii".to_string();
        let serialized = toml::to_string_pretty(&config).expect("serialize");
        let deserialized: GameConfig = toml::from_str(&serialized).expect("deserialize");
        assert_eq!(deserialized.world.seed, Some(42));
        assert_eq!(deserialized.display.symbols, "ascii");
        assert_eq!(deserialized.simulation.tick_interval_ms, config.simulation.tick_interval_ms);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: GameConfig = toml::from_str("[world]\nwidth = 40\n").expect("deserialize");
        assert_eq!(config.world.width, 40);
        assert_eq!(config.world.height, 100);
        assert_eq!(config.simulation.ticks_per_step, 10);
    }

    #[test]
    fn test_save_and_load_from_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("settings.toml");
        let mut config = GameConfig::default();
        config.debug.free_placement = true;
        config.save_to(&path).expect("save");
        let loaded = GameConfig::load_from(&path).expect("load");
        assert!(loaded.debug.free_placement);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = GameConfig::load_from(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_load_malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "[world\nheight = ").expect("write");
        let err = GameConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
