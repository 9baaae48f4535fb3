//! Error types for the access-control core.
//!
//! Only [`ConfigurationError`] can end the process, and only at startup.
//! Everything else is recovered by the dispatcher: the current attempt or
//! trigger is abandoned, logged, and the loop continues.

use std::path::PathBuf;

use thiserror::Error;

use crate::protocol::AttemptState;

/// The credential source could not be turned into a trusted set.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// Opening or creating the source failed.
    #[error("credential source {path} unusable: {source}")]
    Unusable {
        /// Path of the credential source.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// Reading from an opened source failed part way through.
    #[error("credential source read failed at line {line}: {source}")]
    Read {
        /// 1-based line where reading stopped.
        line: usize,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
}

impl ConfigurationError {
    /// Returns true if this failure denies us access to the source itself,
    /// as opposed to a failure while reading it.
    pub fn is_permission_class(&self) -> bool {
        matches!(self, Self::Unusable { .. })
    }
}

/// Wire-level failure while talking to a connected peer.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Peer closed the connection.
    #[error("connection closed by peer")]
    Closed,

    /// Socket-level I/O failure.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The face-comparison capability is disabled or failed.
#[derive(Debug, Error)]
pub enum CapabilityError {
    /// No comparator backend is configured.
    #[error("face comparison disabled")]
    Disabled,

    /// Backend could not be reached.
    #[error("face comparison unreachable: {0}")]
    Unreachable(String),

    /// Backend answered with an error status.
    #[error("face comparison rejected request ({status}): {reason}")]
    Rejected {
        /// Status code reported by the backend.
        status: u16,
        /// Backend-provided reason.
        reason: String,
    },

    /// Backend answered with something we could not interpret.
    #[error("invalid face comparison response: {0}")]
    InvalidResponse(String),
}

/// Camera capture failed.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Capture command or device failed.
    #[error("capture failed: {0}")]
    Failed(String),

    /// Capture succeeded but produced no image data.
    #[error("capture produced an empty frame")]
    Empty,
}

/// Driving or reading a digital line failed.
#[derive(Debug, Error)]
pub enum ActuationError {
    /// The output line rejected a level change.
    #[error("pin {pin}: {source}")]
    Pin {
        /// Line number.
        pin: u32,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
}

/// Misuse of the challenge protocol.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Attempted a transition the attempt state machine forbids.
    #[error("invalid attempt transition: {from:?} -> {to:?}")]
    InvalidTransition {
        /// State the attempt was in.
        from: AttemptState,
        /// State that was requested.
        to: AttemptState,
    },

    /// KDF parameters were rejected or hashing failed.
    #[error("proof derivation failed: {0}")]
    Kdf(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unusable_source_is_permission_class() {
        let err = ConfigurationError::Unusable {
            path: PathBuf::from("/nonexistent/keys"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(err.is_permission_class());
    }

    #[test]
    fn read_failure_is_not_permission_class() {
        let err = ConfigurationError::Read {
            line: 3,
            source: std::io::Error::from(std::io::ErrorKind::InvalidData),
        };
        assert!(!err.is_permission_class());
    }

    #[test]
    fn error_display() {
        let err = ProtocolError::InvalidTransition {
            from: AttemptState::Verified,
            to: AttemptState::AwaitingResponse,
        };
        assert_eq!(err.to_string(), "invalid attempt transition: Verified -> AwaitingResponse");
    }
}
