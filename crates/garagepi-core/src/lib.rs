//! garagepi access-control core.
//!
//! Decides whether the garage door relay may be pulsed. Two independent
//! verification paths feed one actuator:
//!
//! - Challenge-response: a connected peer proves possession of a trusted
//!   credential by answering a fresh random challenge.
//! - Face: a button press captures a frame that an external comparator
//!   matches against a trusted reference.
//!
//! All I/O sits behind traits ([`Environment`], [`Listener`], [`Connection`],
//! [`InputPin`], [`OutputPin`], [`Camera`], [`FaceComparator`]), so the whole
//! loop runs unchanged under the deterministic harness.
//!
//! ## Architecture
//!
//! ```text
//! Dispatcher
//!   ├─ Button              (edge detection + debounce)
//!   ├─ FaceVerifier        (LocalReference | RemoteReference)
//!   ├─ ChallengeProtocol   (argon2id proofs, constant-time compare)
//!   │    └─ CredentialStore
//!   └─ DoorActuator        (guarded fixed-length pulse)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod button;
pub mod credential;
pub mod dispatcher;
pub mod door;
pub mod env;
pub mod error;
pub mod face;
pub mod gpio;
pub mod outcome;
pub mod protocol;
pub mod transport;

pub use button::{Button, ButtonConfig, ButtonState, EdgeDetector};
pub use credential::{
    Credential, CredentialStore, LoadPolicy, MAX_CREDENTIAL_LEN, RejectReason, RejectedLine,
};
pub use dispatcher::{DEFAULT_TICK, Dispatcher, DispatcherConfig, DispatcherParts, TickReport};
pub use door::{Actuation, DoorActuator, DoorConfig, DoorState, RESTING_LEVEL};
pub use env::Environment;
pub use error::{
    ActuationError, CapabilityError, CaptureError, ConfigurationError, ProtocolError,
    TransportError,
};
pub use face::{
    Camera, DEFAULT_SIMILARITY_THRESHOLD, DisabledCamera, DisabledComparator, FaceComparator,
    FaceMatch, FaceReference, FaceStrategy, FaceVerifier,
};
pub use gpio::{InputPin, Level, OutputPin};
pub use outcome::{FaultReason, VerificationOutcome};
pub use protocol::{
    Attempt, AttemptState, CHALLENGE_LEN, Challenge, ChallengeProtocol, DEFAULT_RESPONSE_TIMEOUT,
    KdfParams, MAX_RESPONSE_LEN, PROOF_LEN, ProtocolConfig,
};
pub use transport::{Connection, Listener, SERVICE_NAME};
