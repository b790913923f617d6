//! cadence-player configuration
//!
//! Loaded once at startup from TOML (see `cadence_common::config` for path
//! resolution). Every section is optional and falls back to built-in
//! defaults, so an empty file is a valid configuration.

use serde::Deserialize;
use std::path::Path;

use cadence_common::config::{load_toml_or_default, resolve_config_path, CONFIG_ENV_VAR};

use crate::effects::EffectDescriptor;
use crate::engine::EngineOptions;
use crate::playback::{ControllerOptions, PositionConfig};

/// Top-level player configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub logging: LoggingConfig,
    pub engine: EngineOptions,
    pub position: PositionConfig,
    /// Effects instantiated for every audio session
    pub effects: Vec<EffectDescriptor>,
    /// Fixed shuffle seed for reproducible orders
    pub shuffle_seed: Option<u64>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level() }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Command-line configuration overrides
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub shuffle_seed: Option<u64>,
}

impl PlayerConfig {
    /// Resolve the config path (CLI, then `CADENCE_CONFIG`, then the user
    /// config dir) and load it
    pub fn load(cli_path: Option<&Path>) -> cadence_common::Result<Self> {
        let path = resolve_config_path(cli_path, CONFIG_ENV_VAR);
        load_toml_or_default(path.as_deref())
    }

    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
        if overrides.shuffle_seed.is_some() {
            self.shuffle_seed = overrides.shuffle_seed;
        }
    }

    pub fn controller_options(&self) -> ControllerOptions {
        ControllerOptions {
            engine: self.engine.clone(),
            position: self.position.clone(),
            effects: self.effects.clone(),
            shuffle_seed: self.shuffle_seed,
        }
    }
}
