//! Digital line abstraction.

use crate::error::ActuationError;

/// Logic level of a digital line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Driven or read low.
    Low,
    /// Driven or read high.
    High,
}

impl Level {
    /// The other level.
    pub fn inverted(self) -> Self {
        match self {
            Self::Low => Self::High,
            Self::High => Self::Low,
        }
    }
}

/// A digital output line. The relay rests high and is active low.
pub trait OutputPin: Send {
    /// Drive the line to `level`.
    fn set_level(&mut self, level: Level) -> Result<(), ActuationError>;
}

/// A digital input line with a pull-configured idle level.
pub trait InputPin: Send {
    /// Sample the line.
    fn read_level(&mut self) -> Result<Level, ActuationError>;
}
