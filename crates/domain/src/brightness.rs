//! Brightness stepping between bounds.
//!
//! The cycler walks brightness up by `step` until it reaches `maximum`,
//! then walks down until it reaches `minimum`, and so on for as long as the
//! switch is held. Values are clamped at the bounds, never wrapped, and the
//! direction flips on the step that lands on a bound.

use crate::error::ValidationError;

/// Which way the next step goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Up,
    Down,
}

/// Validated bounds and increment for one cycler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrightnessRange {
    minimum: u8,
    maximum: u8,
    step: u8,
}

/// Result of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub brightness: u8,
    /// Direction for the *next* step.
    pub direction: Direction,
}

impl BrightnessRange {
    /// # Errors
    ///
    /// Returns [`ValidationError::ZeroStep`] for a zero step and
    /// [`ValidationError::InvertedBounds`] when `minimum > maximum`.
    pub fn new(minimum: u8, maximum: u8, step: u8) -> Result<Self, ValidationError> {
        if step == 0 {
            return Err(ValidationError::ZeroStep);
        }
        if minimum > maximum {
            return Err(ValidationError::InvertedBounds { minimum, maximum });
        }
        Ok(Self {
            minimum,
            maximum,
            step,
        })
    }

    #[must_use]
    pub fn minimum(&self) -> u8 {
        self.minimum
    }

    #[must_use]
    pub fn maximum(&self) -> u8 {
        self.maximum
    }

    #[must_use]
    pub fn step(&self) -> u8 {
        self.step
    }

    /// Apply one step to `current` in `direction`.
    ///
    /// `current` may lie outside the range (the light was set elsewhere); the
    /// result is still clamped into `[minimum, maximum]`.
    #[must_use]
    pub fn advance(&self, current: u8, direction: Direction) -> Step {
        let current = i16::from(current);
        let step = i16::from(self.step);
        let (min, max) = (i16::from(self.minimum), i16::from(self.maximum));

        let (next, direction) = match direction {
            Direction::Up => {
                let next = current + step;
                if next >= max {
                    (max, Direction::Down)
                } else {
                    (next.max(min), Direction::Up)
                }
            }
            Direction::Down => {
                let next = current - step;
                if next <= min {
                    (min, Direction::Up)
                } else {
                    (next.min(max), Direction::Down)
                }
            }
        };

        Step {
            // Clamped into [min, max] above, both of which come from u8.
            brightness: u8::try_from(next).unwrap_or(self.maximum),
            direction,
        }
    }
}
