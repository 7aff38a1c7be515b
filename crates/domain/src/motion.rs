//! Motion-light state machine.
//!
//! One light, four states:
//!
//! | State | Light | Live timer |
//! |-------|-------|------------|
//! | `On` | on | none |
//! | `OnTimer` | on | motion timer |
//! | `Off` | off | none |
//! | `ExitTimer` | off | exit timer |
//!
//! Manual toggles flip the light. Motion turns it on (subject to the
//! illumination gate) and the end of motion starts the motion timer. A manual
//! turn-off opens an exit window during which motion is ignored, so walking
//! out of the room does not switch the light straight back on.
//!
//! [`MotionState::on_event`] is pure: it returns the next state plus the
//! [`Effect`]s to apply, or an [`InvalidTransition`] for pairs the machine
//! does not admit (a timer firing in a state that never started it).

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::InvalidTransition;

/// Current mode of a motion-controlled light.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionState {
    On,
    OnTimer,
    Off,
    ExitTimer,
}

impl MotionState {
    /// Initial state derived from the light's current status.
    #[must_use]
    pub fn initial(light_on: bool) -> Self {
        if light_on { Self::On } else { Self::Off }
    }

    /// Whether the light is expected to be on in this state.
    #[must_use]
    pub fn light_on(self) -> bool {
        matches!(self, Self::On | Self::OnTimer)
    }

    /// Compute the transition for `event`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTransition`] when a timer fires outside the state
    /// that owns it, or when `OnTimer` is reached without a motion delay.
    pub fn on_event(
        self,
        event: &MotionEvent,
        settings: &MotionSettings,
    ) -> Result<Transition, InvalidTransition> {
        use Effect::{
            CancelExitTimer, CancelMotionTimer, StartExitTimer, StartMotionTimer, TurnOff, TurnOn,
        };

        let invalid = || InvalidTransition {
            state: self,
            event: event.clone(),
        };

        let transition = match (self, event) {
            (Self::On, MotionEvent::ManualToggle) => Transition::to(
                Self::ExitTimer,
                vec![TurnOff, StartExitTimer(settings.exit_delay)],
            ),
            (Self::Off, MotionEvent::ManualToggle) => Transition::to(Self::On, vec![TurnOn]),
            (Self::OnTimer, MotionEvent::ManualToggle) => Transition::to(
                Self::ExitTimer,
                vec![
                    TurnOff,
                    CancelMotionTimer,
                    StartExitTimer(settings.exit_delay),
                ],
            ),
            (Self::ExitTimer, MotionEvent::ManualToggle) => {
                Transition::to(Self::On, vec![TurnOn, CancelExitTimer])
            }

            (Self::ExitTimer, MotionEvent::ExitTimerFired) => Transition::stay(Self::Off),
            (_, MotionEvent::ExitTimerFired) => return Err(invalid()),

            (Self::OnTimer, MotionEvent::MotionTimerFired) => {
                Transition::to(Self::Off, vec![TurnOff])
            }
            (_, MotionEvent::MotionTimerFired) => return Err(invalid()),

            (Self::On | Self::OnTimer | Self::ExitTimer, MotionEvent::MotionActive { .. }) => {
                Transition::stay(self)
            }
            (Self::Off, MotionEvent::MotionActive { illumination }) => {
                if settings.gate_allows(*illumination) {
                    Transition::to(Self::On, vec![TurnOn])
                } else {
                    Transition::stay(Self::Off)
                }
            }

            (Self::OnTimer, MotionEvent::MotionInactive) => {
                let delay = settings.motion_delay.ok_or_else(invalid)?;
                Transition::to(
                    Self::OnTimer,
                    vec![CancelMotionTimer, StartMotionTimer(delay)],
                )
            }
            (Self::On, MotionEvent::MotionInactive) => match settings.motion_delay {
                None => Transition::stay(Self::On),
                Some(delay) if delay.is_zero() => Transition::to(Self::Off, vec![TurnOff]),
                Some(delay) => Transition::to(Self::OnTimer, vec![StartMotionTimer(delay)]),
            },
            (Self::Off | Self::ExitTimer, MotionEvent::MotionInactive) => Transition::stay(self),
        };

        Ok(transition)
    }
}

impl fmt::Display for MotionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::On => "on",
            Self::OnTimer => "on_timer",
            Self::Off => "off",
            Self::ExitTimer => "exit_timer",
        })
    }
}

/// Inputs of the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum MotionEvent {
    /// A switch changed, or a pushbutton was pressed.
    ManualToggle,
    /// A motion sensor reported motion. `illumination` is the reading of the
    /// illumination sensor at that moment, if one is configured and readable.
    MotionActive { illumination: Option<f64> },
    /// A motion sensor reported the end of motion.
    MotionInactive,
    MotionTimerFired,
    ExitTimerFired,
}

impl fmt::Display for MotionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ManualToggle => "manual_toggle",
            Self::MotionActive { .. } => "motion_on",
            Self::MotionInactive => "motion_off",
            Self::MotionTimerFired => "motion_timer_fired",
            Self::ExitTimerFired => "exit_timer_fired",
        })
    }
}

/// Side effects requested by a transition, applied in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    TurnOn,
    TurnOff,
    StartMotionTimer(Duration),
    CancelMotionTimer,
    StartExitTimer(Duration),
    CancelExitTimer,
}

/// Outcome of [`MotionState::on_event`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: MotionState,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn to(next: MotionState, effects: Vec<Effect>) -> Self {
        Self { next, effects }
    }

    fn stay(state: MotionState) -> Self {
        Self {
            next: state,
            effects: Vec::new(),
        }
    }
}

/// Timing and gating parameters of one controller.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MotionSettings {
    /// `None` keeps the light on forever after motion; zero turns it off as
    /// soon as motion ends.
    pub motion_delay: Option<Duration>,
    pub exit_delay: Duration,
    /// Motion only turns the light on while illumination is at or below this.
    pub illumination_max: Option<f64>,
}

impl MotionSettings {
    /// Whether the illumination gate lets motion turn the light on.
    ///
    /// Without a configured gate, or without a usable reading, it does.
    #[must_use]
    pub fn gate_allows(&self, illumination: Option<f64>) -> bool {
        match (self.illumination_max, illumination) {
            (Some(max), Some(reading)) => reading <= max,
            _ => true,
        }
    }
}
