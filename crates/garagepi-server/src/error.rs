//! Server error types.

use std::fmt;

use garagepi_core::{ActuationError, ConfigurationError, ProtocolError};

/// Exit code for a credential source we are not allowed to use (EACCES).
pub const EXIT_PERMISSION_DENIED: u8 = 13;

/// Exit code for every other startup failure.
pub const EXIT_FAILURE: u8 = 1;

/// Errors that can stop the daemon.
#[derive(Debug)]
pub enum ServerError {
    /// Credential source unusable and no fallback configured
    Credentials(ConfigurationError),

    /// Invalid configuration
    Config(String),

    /// Transport/network error
    Transport(String),

    /// GPIO setup or relay failure
    Gpio(ActuationError),

    /// Challenge protocol setup failure
    Protocol(ProtocolError),

    /// Internal error
    Internal(String),
}

impl ServerError {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Credentials(_) => EXIT_PERMISSION_DENIED,
            _ => EXIT_FAILURE,
        }
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Credentials(err) => write!(f, "credential error: {}", err),
            Self::Config(msg) => write!(f, "configuration error: {}", msg),
            Self::Transport(msg) => write!(f, "transport error: {}", msg),
            Self::Gpio(err) => write!(f, "gpio error: {}", err),
            Self::Protocol(err) => write!(f, "protocol error: {}", err),
            Self::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Credentials(err) => Some(err),
            Self::Gpio(err) => Some(err),
            Self::Protocol(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ConfigurationError> for ServerError {
    fn from(err: ConfigurationError) -> Self {
        Self::Credentials(err)
    }
}

impl From<ActuationError> for ServerError {
    fn from(err: ActuationError) -> Self {
        Self::Gpio(err)
    }
}

impl From<ProtocolError> for ServerError {
    fn from(err: ProtocolError) -> Self {
        Self::Protocol(err)
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
