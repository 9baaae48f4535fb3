//! Access-control event loop.
//!
//! ## Tick
//!
//! ```text
//! tick ─┬─ sample button ──edge──▶ face verification ──Granted──▶ actuate
//!       └─ accept (remaining budget) ──conn──▶ challenge attempt ──Granted──▶ actuate
//!                                        └── further conns polled with zero budget
//! ```
//!
//! ## Design
//!
//! - Single-threaded and cooperative: one path's verification delays the
//!   other path until the next tick, nothing runs in parallel.
//! - The dispatcher owns the actuator, so `actuate` is never reentered.
//! - Transport and capability faults end the current attempt only.
//! - Shutdown drops any in-flight work (closing its connection and restoring
//!   the relay through the pulse guard) and then forces the resting level.

use std::{future::Future, time::Duration};

use crate::{
    button::Button,
    credential::CredentialStore,
    door::{Actuation, DoorActuator},
    env::Environment,
    error::ActuationError,
    face::FaceVerifier,
    gpio::{InputPin, OutputPin},
    outcome::VerificationOutcome,
    protocol::ChallengeProtocol,
    transport::Listener,
};

/// Default bound on one loop iteration's idle wait.
pub const DEFAULT_TICK: Duration = Duration::from_millis(200);

/// Dispatcher timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Budget of one tick when nothing happens.
    pub tick: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self { tick: DEFAULT_TICK }
    }
}

/// Everything the dispatcher drives.
#[derive(Debug)]
pub struct DispatcherParts<L, I, O>
where
    I: InputPin,
    O: OutputPin,
{
    /// Trusted credentials.
    pub store: CredentialStore,
    /// Challenge issuer and verifier.
    pub protocol: ChallengeProtocol,
    /// Incoming connection source.
    pub listener: L,
    /// Local trigger.
    pub button: Button<I>,
    /// Door relay.
    pub door: DoorActuator<O>,
    /// Face verification for button presses.
    pub face: FaceVerifier,
}

/// What happened during one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Outcome of the button path, if it was triggered.
    pub button: Option<VerificationOutcome>,
    /// Outcomes of connection attempts handled this tick.
    pub connections: Vec<VerificationOutcome>,
    /// Actuation results, in order.
    pub actuations: Vec<Actuation>,
}

impl TickReport {
    /// Returns true if nothing happened.
    pub fn is_idle(&self) -> bool {
        self.button.is_none() && self.connections.is_empty()
    }

    /// Number of pulses actually driven.
    pub fn pulses(&self) -> usize {
        self.actuations.iter().filter(|a| **a == Actuation::Pulsed).count()
    }
}

/// The access-control loop.
pub struct Dispatcher<E, L, I, O>
where
    E: Environment,
    L: Listener,
    I: InputPin,
    O: OutputPin,
{
    env: E,
    config: DispatcherConfig,
    store: CredentialStore,
    protocol: ChallengeProtocol,
    listener: L,
    button: Button<I>,
    door: DoorActuator<O>,
    face: FaceVerifier,
}

impl<E, L, I, O> Dispatcher<E, L, I, O>
where
    E: Environment,
    L: Listener,
    I: InputPin,
    O: OutputPin,
{
    /// Assemble a dispatcher.
    pub fn new(env: E, config: DispatcherConfig, parts: DispatcherParts<L, I, O>) -> Self {
        if parts.store.is_empty() {
            tracing::warn!("no trusted credentials, every challenge will be denied");
        }
        Self {
            env,
            config,
            store: parts.store,
            protocol: parts.protocol,
            listener: parts.listener,
            button: parts.button,
            door: parts.door,
            face: parts.face,
        }
    }

    /// The relay actuator.
    pub fn door(&self) -> &DoorActuator<O> {
        &self.door
    }

    /// The trusted credential set.
    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Run one loop iteration.
    pub async fn tick(&mut self) -> TickReport {
        let started = self.env.now();
        let mut report = TickReport::default();

        match self.button.poll(started) {
            Ok(true) => {
                let outcome = self.face.verify().await;
                if outcome.grants_access() {
                    self.open(&mut report).await;
                }
                report.button = Some(outcome);
            },
            Ok(false) => {},
            Err(e) => tracing::warn!(error = %e, "button read failed"),
        }

        let elapsed = self.env.now().saturating_duration_since(started);
        let mut budget = self.config.tick.saturating_sub(elapsed);

        loop {
            let accepted = tokio::select! {
                biased;
                accepted = self.listener.accept() => Some(accepted),
                () = self.env.sleep(budget) => None,
            };

            match accepted {
                None => break,
                Some(Ok(mut conn)) => {
                    let outcome =
                        self.protocol.run_attempt(&mut conn, &self.store, &self.env).await;
                    drop(conn);
                    if outcome.grants_access() {
                        self.open(&mut report).await;
                    }
                    report.connections.push(outcome);
                    budget = Duration::ZERO;
                },
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "accept failed");
                    self.env.sleep(budget).await;
                    break;
                },
            }
        }

        report
    }

    /// Tick until `shutdown` resolves, then release the relay.
    pub async fn run<F>(mut self, shutdown: F) -> Result<(), ActuationError>
    where
        F: Future<Output = ()>,
    {
        tracing::info!(tick = ?self.config.tick, trusted = self.store.len(), "dispatcher running");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;
                () = &mut shutdown => {
                    tracing::info!("shutdown requested");
                    break;
                },
                report = self.tick() => {
                    if !report.is_idle() {
                        tracing::debug!(?report, "tick handled events");
                    }
                },
            }
        }

        self.release()
    }

    /// Force the relay to its resting level.
    pub fn release(&mut self) -> Result<(), ActuationError> {
        self.door.release()?;
        tracing::info!("relay at resting level");
        Ok(())
    }

    async fn open(&mut self, report: &mut TickReport) {
        match self.door.actuate(&self.env).await {
            Ok(actuation) => report.actuations.push(actuation),
            Err(e) => {
                tracing::error!(error = %e, "door actuation failed");
                if let Err(e) = self.door.release() {
                    tracing::error!(error = %e, "relay could not be restored");
                }
            },
        }
    }
}
