//! Simulated digital lines.

use std::sync::{Arc, Mutex, PoisonError};

use garagepi_core::{ActuationError, InputPin, Level, OutputPin};

/// Output line that records every level it is driven to.
#[derive(Debug, Clone, Default)]
pub struct SimOutputPin {
    history: Arc<Mutex<Vec<Level>>>,
}

impl SimOutputPin {
    /// Fresh line with no history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every level written, oldest first.
    pub fn history(&self) -> Vec<Level> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Level last written, if any.
    pub fn level(&self) -> Option<Level> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner).last().copied()
    }

    /// Number of low writes, i.e. pulses started.
    pub fn pulses(&self) -> usize {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|l| **l == Level::Low)
            .count()
    }
}

impl OutputPin for SimOutputPin {
    fn set_level(&mut self, level: Level) -> Result<(), ActuationError> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner).push(level);
        Ok(())
    }
}

/// Input line whose level the test sets.
///
/// Idles high (pull-up). Clones share the line.
#[derive(Debug, Clone)]
pub struct SimInputPin {
    level: Arc<Mutex<Level>>,
}

impl Default for SimInputPin {
    fn default() -> Self {
        Self { level: Arc::new(Mutex::new(Level::High)) }
    }
}

impl SimInputPin {
    /// Line idling high.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pull the line low (pressed, for a pull-up button).
    pub fn press(&self) {
        self.set(Level::Low);
    }

    /// Let the line return high.
    pub fn release(&self) {
        self.set(Level::High);
    }

    /// Force a level.
    pub fn set(&self, level: Level) {
        *self.level.lock().unwrap_or_else(PoisonError::into_inner) = level;
    }
}

impl InputPin for SimInputPin {
    fn read_level(&mut self) -> Result<Level, ActuationError> {
        Ok(*self.level.lock().unwrap_or_else(PoisonError::into_inner))
    }
}
