//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into [`LumoError`]
//! via `#[from]` when crossing a port boundary.

use crate::motion::{MotionEvent, MotionState};

/// Top-level error for every lumo crate.
#[derive(Debug, thiserror::Error)]
pub enum LumoError {
    /// Configuration or input failed a domain invariant.
    #[error("validation error")]
    Validation(#[from] ValidationError),

    /// The motion state machine received an event its current state does
    /// not admit. Treated as fatal by the controller.
    #[error("invalid state transition")]
    InvalidTransition(#[from] InvalidTransition),

    /// The device hub failed to deliver a request.
    #[error("device hub error")]
    Hub(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The behavior task has already stopped.
    #[error("behavior is no longer running")]
    Closed,
}

/// Domain invariant violations, mostly raised while validating configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    /// Entity ids look like `domain.object_id`.
    #[error("invalid entity id {0:?}, expected `domain.object_id`")]
    InvalidEntityId(String),

    /// A required field is absent or empty.
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    /// Durations are given in seconds and must be finite and non-negative.
    #[error("`{field}` must be a finite, non-negative number of seconds (got {value})")]
    InvalidDuration { field: &'static str, value: f64 },

    /// A numeric threshold must be a finite number.
    #[error("`{0}` must be a finite number")]
    NotFinite(&'static str),

    /// The step interval of a brightness cycler must be strictly positive.
    #[error("`delay` must be greater than zero")]
    ZeroDelay,

    /// A brightness step of zero would never move.
    #[error("`step` must be greater than zero")]
    ZeroStep,

    /// `minimum` must not exceed `maximum`.
    #[error("brightness bounds are inverted: minimum {minimum} > maximum {maximum}")]
    InvertedBounds { minimum: u8, maximum: u8 },

    /// `illumination_sensor` and `illumination_max` go together.
    #[error("`illumination_sensor` and `illumination_max` must be set together")]
    UnpairedIllumination,
}

/// A motion-light event arrived in a state that does not admit it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("event {event} is not valid in state {state}")]
pub struct InvalidTransition {
    pub state: MotionState,
    pub event: MotionEvent,
}

impl LumoError {
    /// Wrap an adapter-specific failure.
    pub fn hub(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Hub(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_convert_validation_error_into_lumo_error() {
        let err: LumoError = ValidationError::ZeroStep.into();
        assert!(matches!(err, LumoError::Validation(ValidationError::ZeroStep)));
    }

    #[test]
    fn should_describe_invalid_transition() {
        let err = InvalidTransition {
            state: MotionState::Off,
            event: MotionEvent::MotionTimerFired,
        };
        assert_eq!(
            err.to_string(),
            "event motion_timer_fired is not valid in state off"
        );
    }

    #[test]
    fn should_keep_source_of_invalid_transition() {
        let err: LumoError = InvalidTransition {
            state: MotionState::On,
            event: MotionEvent::ExitTimerFired,
        }
        .into();
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(
            source.as_deref(),
            Some("event exit_timer_fired is not valid in state on")
        );
    }

    #[test]
    fn should_wrap_hub_errors() {
        let err = LumoError::hub(std::io::Error::other("socket closed"));
        assert!(matches!(err, LumoError::Hub(_)));
        assert_eq!(err.to_string(), "device hub error");
    }
}
