//! Instance configuration for the two behaviors.
//!
//! The raw `*Config` structs mirror what a user writes in the config file.
//! `validate()` turns them into `*Settings` with typed durations and checked
//! bounds; nothing downstream ever sees an unvalidated value.

use std::time::Duration;

use serde::Deserialize;

use crate::brightness::BrightnessRange;
use crate::error::ValidationError;
use crate::id::EntityId;
use crate::motion::MotionSettings;
use crate::time::seconds;

/// One or more entity ids, written either as a list or as a single
/// (possibly comma-separated) string.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "RawEntityList")]
pub struct EntityList(Vec<EntityId>);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawEntityList {
    One(String),
    Many(Vec<String>),
}

impl TryFrom<RawEntityList> for EntityList {
    type Error = ValidationError;

    fn try_from(raw: RawEntityList) -> Result<Self, Self::Error> {
        let items = match raw {
            RawEntityList::One(joined) => joined.split(',').map(str::to_string).collect(),
            RawEntityList::Many(items) => items,
        };
        items
            .iter()
            .map(|s| s.as_str().trim())
            .filter(|s| !s.is_empty())
            .map(EntityId::parse)
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
}

impl EntityList {
    #[must_use]
    pub fn as_slice(&self) -> &[EntityId] {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<EntityId>> for EntityList {
    fn from(ids: Vec<EntityId>) -> Self {
        Self(ids)
    }
}

/// Brightness cycler as written in the config file.
#[derive(Debug, Clone, Deserialize)]
pub struct BrightnessCyclerConfig {
    /// Switch(es) whose hold drives the cycle.
    pub switch_id: EntityList,
    pub light_id: EntityId,
    /// Seconds between brightness steps.
    pub delay: f64,
    /// Hold threshold in seconds; shorter presses toggle the light.
    pub on_off_delay: f64,
    pub step: u8,
    pub minimum: u8,
    pub maximum: u8,
}

/// Validated brightness cycler parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct BrightnessCyclerSettings {
    pub switches: Vec<EntityId>,
    pub light: EntityId,
    pub delay: Duration,
    pub on_off_delay: Duration,
    pub range: BrightnessRange,
}

impl BrightnessCyclerConfig {
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found: no switch, a negative or
    /// zero step interval, a negative hold threshold, a zero step or
    /// inverted bounds.
    pub fn validate(&self) -> Result<BrightnessCyclerSettings, ValidationError> {
        if self.switch_id.is_empty() {
            return Err(ValidationError::MissingField("switch_id"));
        }
        let delay = seconds("delay", self.delay)?;
        if delay.is_zero() {
            return Err(ValidationError::ZeroDelay);
        }
        Ok(BrightnessCyclerSettings {
            switches: self.switch_id.as_slice().to_vec(),
            light: self.light_id.clone(),
            delay,
            on_off_delay: seconds("on_off_delay", self.on_off_delay)?,
            range: BrightnessRange::new(self.minimum, self.maximum, self.step)?,
        })
    }
}

/// Motion light controller as written in the config file.
#[derive(Debug, Clone, Deserialize)]
pub struct MotionLightConfig {
    /// Light (or light group, or any switchable entity) to control.
    pub light: EntityId,
    /// Toggle the light on any state change.
    #[serde(default)]
    pub switches: EntityList,
    /// Toggle the light when they turn `on`.
    #[serde(default)]
    pub pushbuttons: EntityList,
    #[serde(default)]
    pub motion_sensors: EntityList,
    /// Seconds to keep the light on after motion ends; absent means never
    /// turn off, zero means turn off immediately.
    #[serde(default)]
    pub motion_delay: Option<f64>,
    #[serde(default)]
    pub illumination_sensor: Option<EntityId>,
    /// Motion only turns the light on at or below this illumination.
    #[serde(default)]
    pub illumination_max: Option<f64>,
    /// Seconds after a manual turn-off during which motion is ignored.
    #[serde(default)]
    pub exit_delay: f64,
    /// Trace every transition at `info`.
    #[serde(default)]
    pub debug: bool,
}

/// Validated motion light parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionLightSettings {
    pub light: EntityId,
    pub switches: Vec<EntityId>,
    pub pushbuttons: Vec<EntityId>,
    pub motion_sensors: Vec<EntityId>,
    pub illumination_sensor: Option<EntityId>,
    pub timing: MotionSettings,
    pub debug: bool,
}

impl MotionLightConfig {
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found: invalid durations, a
    /// non-finite threshold, or only one half of the illumination pair.
    pub fn validate(&self) -> Result<MotionLightSettings, ValidationError> {
        let motion_delay = self
            .motion_delay
            .map(|v| seconds("motion_delay", v))
            .transpose()?;
        let exit_delay = seconds("exit_delay", self.exit_delay)?;

        let illumination_max = match (&self.illumination_sensor, self.illumination_max) {
            (Some(_), Some(max)) if max.is_finite() => Some(max),
            (Some(_), Some(_)) => return Err(ValidationError::NotFinite("illumination_max")),
            (None, None) => None,
            _ => return Err(ValidationError::UnpairedIllumination),
        };

        Ok(MotionLightSettings {
            light: self.light.clone(),
            switches: self.switches.as_slice().to_vec(),
            pushbuttons: self.pushbuttons.as_slice().to_vec(),
            motion_sensors: self.motion_sensors.as_slice().to_vec(),
            illumination_sensor: self.illumination_sensor.clone(),
            timing: MotionSettings {
                motion_delay,
                exit_delay,
                illumination_max,
            },
            debug: self.debug,
        })
    }
}
