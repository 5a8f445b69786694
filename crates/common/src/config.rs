//! Construction-time configuration. Immutable once a manager is built.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Where the fixed world graph executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecMode {
    /// Worker-thread pool on the host, worlds as the unit of parallel work.
    HostParallel,
    /// Accelerator-resident execution, one blocking launch per tick.
    Accelerator,
}

/// Errors from loading or validating a [`Config`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("num_worlds must be at least 1")]
    NoWorlds,
    #[error("min_entities_per_world ({min}) exceeds max_entities_per_world ({max})")]
    EntityBounds { min: u32, max: u32 },
    #[error("rendering enabled with a zero-sized view ({width}x{height})")]
    RenderSize { width: u32, height: u32 },
    #[error("worker_threads must be at least 1 when set")]
    NoWorkers,
}

/// Manager configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub exec_mode: ExecMode,
    pub num_worlds: u32,
    pub min_entities_per_world: u32,
    pub max_entities_per_world: u32,
    /// Adapter index used to open the device in accelerator mode. Host mode
    /// never reads it.
    pub device_id: u32,
    pub enable_render: bool,
    pub render_width: u32,
    pub render_height: u32,
    /// Accelerator only: debug shader build and validation layers.
    pub debug_compile: bool,
    /// Directory holding the collision and render meshes.
    pub data_dir: PathBuf,
    /// Host pool size. `None` uses the available parallelism.
    pub worker_threads: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            exec_mode: ExecMode::HostParallel,
            num_worlds: 1,
            min_entities_per_world: 0,
            max_entities_per_world: 0,
            device_id: 0,
            enable_render: false,
            render_width: 64,
            render_height: 64,
            debug_compile: false,
            data_dir: default_data_dir(),
            worker_threads: None,
        }
    }
}

impl Config {
    /// Load a configuration from a JSON file. Missing fields take defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file = std::fs::File::open(path)?;
        let cfg: Self = serde_json::from_reader(file)?;
        Ok(cfg)
    }

    /// Check the cross-field constraints on the configuration surface.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_worlds == 0 {
            return Err(ConfigError::NoWorlds);
        }
        if self.min_entities_per_world > self.max_entities_per_world {
            return Err(ConfigError::EntityBounds {
                min: self.min_entities_per_world,
                max: self.max_entities_per_world,
            });
        }
        if self.enable_render && (self.render_width == 0 || self.render_height == 0) {
            return Err(ConfigError::RenderSize {
                width: self.render_width,
                height: self.render_height,
            });
        }
        if self.worker_threads == Some(0) {
            return Err(ConfigError::NoWorkers);
        }
        Ok(())
    }

    pub fn num_worlds(&self) -> usize {
        self.num_worlds as usize
    }
}

/// The `data/` directory at the workspace root.
pub fn default_data_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../data")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn zero_worlds_rejected() {
        let cfg = Config {
            num_worlds: 0,
            ..Config::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::NoWorlds)));
    }

    #[test]
    fn inverted_entity_bounds_rejected() {
        let cfg = Config {
            min_entities_per_world: 5,
            max_entities_per_world: 2,
            ..Config::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::EntityBounds { min: 5, max: 2 })
        ));
    }

    #[test]
    fn render_size_only_checked_when_enabled() {
        let mut cfg = Config {
            render_width: 0,
            ..Config::default()
        };
        assert!(cfg.validate().is_ok());
        cfg.enable_render = true;
        assert!(matches!(cfg.validate(), Err(ConfigError::RenderSize { .. })));
    }

    #[test]
    fn json_round_trip_with_defaults() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            tmp.path(),
            r#"{ "exec_mode": "accelerator", "num_worlds": 32, "debug_compile": true }"#,
        )
        .unwrap();
        let cfg = Config::from_json_file(tmp.path()).unwrap();
        assert_eq!(cfg.exec_mode, ExecMode::Accelerator);
        assert_eq!(cfg.num_worlds, 32);
        assert!(cfg.debug_compile);
        assert_eq!(cfg.render_width, 64);
        assert_eq!(cfg.worker_threads, None);
    }

    #[test]
    fn default_data_dir_holds_catalog() {
        assert!(default_data_dir().join("cube_collision.obj").exists());
    }
}
