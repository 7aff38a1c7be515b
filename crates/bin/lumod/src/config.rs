//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `lumo.toml` in the working directory, or at the path in
//! `LUMO_CONFIG`. Every section is optional. Environment variables take
//! precedence over file values.
//!
//! Behavior instances are kept as raw TOML tables here and only parsed one
//! by one in [`Config::brightness_cyclers`] / [`Config::motion_lights`], so a
//! broken instance never prevents the others from loading.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde::de::DeserializeOwned;

use lumo_domain::config::{
    BrightnessCyclerConfig, BrightnessCyclerSettings, MotionLightConfig, MotionLightSettings,
};
use lumo_domain::entity::EntityState;
use lumo_domain::error::ValidationError;
use lumo_domain::id::EntityId;

const DEFAULT_PATH: &str = "lumo.toml";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Simulated hub settings.
    #[serde(rename = "virtual")]
    pub virtual_hub: VirtualConfig,
    /// Brightness cycler instances by name.
    pub brightness_cyclers: BTreeMap<String, toml::Value>,
    /// Motion light instances by name.
    pub motion_lights: BTreeMap<String, toml::Value>,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Initial entity states of the virtual hub.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct VirtualConfig {
    /// Entity id to initial state (`"on"`, `"off"`, `"12.5"`, ...).
    pub entities: BTreeMap<String, String>,
}

/// A named behavior instance and the outcome of parsing it.
pub type Instance<S> = (String, Result<S, InstanceError>);

impl Config {
    /// Load configuration from `LUMO_CONFIG` or `lumo.toml` (if present) then
    /// apply environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but is malformed, or if the
    /// virtual hub section names an invalid entity id.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var_os("LUMO_CONFIG")
            .map_or_else(|| PathBuf::from(DEFAULT_PATH), PathBuf::from);
        let mut config = Self::from_file(&path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("LUMO_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for raw in self.virtual_hub.entities.keys() {
            EntityId::parse(raw.as_str()).map_err(|err| {
                ConfigError::Validation(format!("virtual entity {raw:?}: {err}"))
            })?;
        }
        Ok(())
    }

    /// Initial states of the virtual hub's seeded entities.
    #[must_use]
    pub fn virtual_entities(&self) -> Vec<(EntityId, EntityState)> {
        self.virtual_hub
            .entities
            .iter()
            .filter_map(|(raw, state)| {
                let entity_id = EntityId::parse(raw.as_str()).ok()?;
                Some((entity_id, EntityState::from(state.as_str())))
            })
            .collect()
    }

    /// Every brightness cycler instance, each parsed and validated on its own.
    #[must_use]
    pub fn brightness_cyclers(&self) -> Vec<Instance<BrightnessCyclerSettings>> {
        self.brightness_cyclers
            .iter()
            .map(|(name, value)| {
                let parsed = parse_instance(value, BrightnessCyclerConfig::validate);
                (name.clone(), parsed)
            })
            .collect()
    }

    /// Every motion light instance, each parsed and validated on its own.
    #[must_use]
    pub fn motion_lights(&self) -> Vec<Instance<MotionLightSettings>> {
        self.motion_lights
            .iter()
            .map(|(name, value)| {
                let parsed = parse_instance(value, MotionLightConfig::validate);
                (name.clone(), parsed)
            })
            .collect()
    }
}

fn parse_instance<C, S>(
    value: &toml::Value,
    validate: impl FnOnce(&C) -> Result<S, ValidationError>,
) -> Result<S, InstanceError>
where
    C: DeserializeOwned,
{
    let raw: C = value.clone().try_into()?;
    Ok(validate(&raw)?)
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "lumod=info,lumo_app=info,lumo_adapter_virtual=info".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

/// Why a single behavior instance was skipped.
#[derive(Debug, thiserror::Error)]
pub enum InstanceError {
    /// Missing field or wrong type.
    #[error("malformed instance: {0}")]
    Parse(#[from] toml::de::Error),
    /// Well-formed but semantically invalid.
    #[error("invalid instance: {0}")]
    Invalid(#[from] ValidationError),
}
