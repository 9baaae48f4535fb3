//! Linux sysfs GPIO lines.
//!
//! Each line is exported under `<root>/gpioN` and driven through its `value`
//! file. The root defaults to `/sys/class/gpio` and is configurable so tests
//! can point it at a temporary directory.

use std::{
    fs,
    path::{Path, PathBuf},
};

use garagepi_core::{ActuationError, InputPin, Level, OutputPin};

/// Default sysfs GPIO root.
pub const SYSFS_GPIO_ROOT: &str = "/sys/class/gpio";

#[derive(Debug, Clone, Copy)]
enum Direction {
    In,
    Out,
}

impl Direction {
    fn as_str(self) -> &'static str {
        match self {
            Self::In => "in",
            Self::Out => "out",
        }
    }
}

#[derive(Debug)]
struct SysfsLine {
    pin: u32,
    value: PathBuf,
}

impl SysfsLine {
    fn open(root: &Path, pin: u32, direction: Direction) -> Result<Self, ActuationError> {
        let err = |source| ActuationError::Pin { pin, source };
        let dir = root.join(format!("gpio{pin}"));

        if !dir.exists() {
            fs::write(root.join("export"), pin.to_string()).map_err(err)?;
        }
        fs::write(dir.join("direction"), direction.as_str()).map_err(err)?;

        tracing::debug!(pin, direction = direction.as_str(), "gpio line configured");
        Ok(Self { pin, value: dir.join("value") })
    }

    fn write(&self, level: Level) -> Result<(), ActuationError> {
        let raw = match level {
            Level::Low => "0",
            Level::High => "1",
        };
        fs::write(&self.value, raw).map_err(|source| ActuationError::Pin { pin: self.pin, source })
    }

    fn read(&self) -> Result<Level, ActuationError> {
        let raw = fs::read_to_string(&self.value)
            .map_err(|source| ActuationError::Pin { pin: self.pin, source })?;
        match raw.trim() {
            "0" => Ok(Level::Low),
            "1" => Ok(Level::High),
            other => Err(ActuationError::Pin {
                pin: self.pin,
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("unexpected value {other:?}"),
                ),
            }),
        }
    }
}

/// Relay output line.
#[derive(Debug)]
pub struct SysfsOutputPin {
    line: SysfsLine,
}

impl SysfsOutputPin {
    /// Export `pin` under `root` as an output.
    pub fn open(root: &Path, pin: u32) -> Result<Self, ActuationError> {
        Ok(Self { line: SysfsLine::open(root, pin, Direction::Out)? })
    }
}

impl OutputPin for SysfsOutputPin {
    fn set_level(&mut self, level: Level) -> Result<(), ActuationError> {
        self.line.write(level)
    }
}

/// Button input line. Pull configuration is done in the device tree; the
/// idle level is declared through the button's `pressed_level`.
#[derive(Debug)]
pub struct SysfsInputPin {
    line: SysfsLine,
}

impl SysfsInputPin {
    /// Export `pin` under `root` as an input.
    pub fn open(root: &Path, pin: u32) -> Result<Self, ActuationError> {
        Ok(Self { line: SysfsLine::open(root, pin, Direction::In)? })
    }
}

impl InputPin for SysfsInputPin {
    fn read_level(&mut self) -> Result<Level, ActuationError> {
        self.line.read()
    }
}
