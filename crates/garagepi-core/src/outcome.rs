//! Verification outcomes shared by both verification paths.

use std::fmt;

/// Result of one verification attempt or trigger.
///
/// `Faulted` is kept apart from `Denied` so that "wrong credential" and
/// "client went away" are never conflated in logs. Only `Granted` opens the
/// door.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// Identity verified.
    Granted,
    /// Well-formed proof that matched nothing.
    Denied,
    /// The attempt could not complete.
    Faulted(FaultReason),
}

impl VerificationOutcome {
    /// Returns true only for [`VerificationOutcome::Granted`].
    pub fn grants_access(&self) -> bool {
        matches!(self, Self::Granted)
    }

    /// Returns true for every outcome that keeps the door shut.
    pub fn is_denial(&self) -> bool {
        !self.grants_access()
    }
}

impl fmt::Display for VerificationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Granted => f.write_str("granted"),
            Self::Denied => f.write_str("denied"),
            Self::Faulted(reason) => write!(f, "faulted ({reason})"),
        }
    }
}

/// Why an attempt faulted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaultReason {
    /// No response within the response window.
    Timeout,
    /// Peer hung up before sending a response.
    Disconnected,
    /// Socket error.
    Transport(String),
    /// Face comparator disabled or failing.
    CapabilityUnavailable(String),
    /// Camera did not produce a frame.
    Capture(String),
    /// Attempt state machine misuse or proof derivation failure.
    Protocol(String),
}

impl fmt::Display for FaultReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => f.write_str("response timeout"),
            Self::Disconnected => f.write_str("peer disconnected"),
            Self::Transport(msg) => write!(f, "transport: {msg}"),
            Self::CapabilityUnavailable(msg) => write!(f, "capability unavailable: {msg}"),
            Self::Capture(msg) => write!(f, "capture: {msg}"),
            Self::Protocol(msg) => write!(f, "protocol: {msg}"),
        }
    }
}
