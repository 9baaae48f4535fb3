//! Deterministic simulation harness for the garagepi access loop.
//!
//! Simulated implementations of every collaborator the dispatcher talks to:
//!
//! - [`SimEnv`]: tokio clock (pausable) and a seeded ChaCha20 RNG
//! - [`SimListener`] / [`SimPeer`]: in-memory challenge channel
//! - [`SimInputPin`] / [`SimOutputPin`]: button and relay lines
//! - [`StubCamera`] / [`StubComparator`]: scripted face backend
//!
//! [`SimRig`] wires them into a ready-to-tick dispatcher. Run tests with
//! `#[tokio::test(start_paused = true)]` so response timeouts and relay pulses
//! elapse in virtual time.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod rig;
pub mod sim_env;
pub mod sim_face;
pub mod sim_gpio;
pub mod sim_transport;

pub use rig::{RigConfig, SimDispatcher, SimRig};
pub use sim_env::SimEnv;
pub use sim_face::{StubCamera, StubComparator};
pub use sim_gpio::{SimInputPin, SimOutputPin};
pub use sim_transport::{
    LinkFault, SimConnection, SimConnector, SimListener, SimPeer, sim_listener,
};
