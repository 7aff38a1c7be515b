//! Light commands — the service calls lumo issues against lights.
//!
//! They map onto the host's `turn_on` / `turn_off` / `toggle` services; only
//! `turn_on` carries data (an optional brightness).

use serde::{Deserialize, Serialize};

/// A command sent to a light (or any switchable entity).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "service", rename_all = "snake_case")]
pub enum LightCommand {
    TurnOn {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        brightness: Option<u8>,
    },
    TurnOff,
    Toggle,
}

impl LightCommand {
    /// Plain `turn_on` without changing brightness.
    pub const ON: Self = Self::TurnOn { brightness: None };

    /// Host service name for this command.
    #[must_use]
    pub fn service(&self) -> &'static str {
        match self {
            Self::TurnOn { .. } => "turn_on",
            Self::TurnOff => "turn_off",
            Self::Toggle => "toggle",
        }
    }

    /// Service-call payload for this command.
    #[must_use]
    pub fn service_data(&self) -> serde_json::Value {
        match self {
            Self::TurnOn {
                brightness: Some(brightness),
            } => serde_json::json!({ "brightness": brightness }),
            _ => serde_json::json!({}),
        }
    }
}

impl std::fmt::Display for LightCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TurnOn {
                brightness: Some(b),
            } => write!(f, "turn_on(brightness={b})"),
            other => f.write_str(other.service()),
        }
    }
}
