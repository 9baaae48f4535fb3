//! Local push button with edge detection and debounce.
//!
//! The button is sampled once per dispatcher tick. A trigger fires exactly
//! once per Released -> Pressed transition, never while held and never on
//! release. Edges inside the debounce window of the previous trigger are
//! swallowed.

use std::time::{Duration, Instant};

use crate::{
    error::ActuationError,
    gpio::{InputPin, Level},
};

/// Debounced state of the button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonState {
    /// Not pressed.
    Released,
    /// Held down.
    Pressed,
}

/// Turns a stream of samples into press edges.
#[derive(Debug, Clone, Copy)]
pub struct EdgeDetector {
    last: ButtonState,
}

impl Default for EdgeDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl EdgeDetector {
    /// Start in the released state.
    pub fn new() -> Self {
        Self { last: ButtonState::Released }
    }

    /// Feed one sample. Returns true on a Released -> Pressed transition.
    pub fn update(&mut self, sample: ButtonState) -> bool {
        let edge = self.last == ButtonState::Released && sample == ButtonState::Pressed;
        self.last = sample;
        edge
    }

    /// Last sample seen.
    pub fn state(&self) -> ButtonState {
        self.last
    }
}

/// Button wiring and debounce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonConfig {
    /// Level read while the button is held. `Low` for a pull-up input.
    pub pressed_level: Level,
    /// Minimum spacing between two triggers.
    pub debounce: Duration,
}

impl Default for ButtonConfig {
    fn default() -> Self {
        Self { pressed_level: Level::Low, debounce: Duration::from_millis(300) }
    }
}

/// A polled push button.
#[derive(Debug)]
pub struct Button<P: InputPin> {
    pin: P,
    config: ButtonConfig,
    edges: EdgeDetector,
    last_trigger: Option<Instant>,
}

impl<P: InputPin> Button<P> {
    /// Wrap an input line.
    pub fn new(pin: P, config: ButtonConfig) -> Self {
        Self { pin, config, edges: EdgeDetector::new(), last_trigger: None }
    }

    /// Sample the line once. Returns true on a fresh, debounced press edge.
    pub fn poll(&mut self, now: Instant) -> Result<bool, ActuationError> {
        let level = self.pin.read_level()?;
        let sample = if level == self.config.pressed_level {
            ButtonState::Pressed
        } else {
            ButtonState::Released
        };

        if !self.edges.update(sample) {
            return Ok(false);
        }

        if let Some(previous) = self.last_trigger {
            if now.saturating_duration_since(previous) < self.config.debounce {
                tracing::debug!("press edge inside debounce window ignored");
                return Ok(false);
            }
        }

        self.last_trigger = Some(now);
        tracing::debug!("button press detected");
        Ok(true)
    }

    /// Last debounced state.
    pub fn state(&self) -> ButtonState {
        self.edges.state()
    }
}
