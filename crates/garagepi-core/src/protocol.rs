//! Challenge-response handshake.
//!
//! One attempt per accepted connection:
//!
//! ```text
//! AwaitingChallengeSend ──send──▶ AwaitingResponse ──┬──▶ Verified
//!          │                              │           ├──▶ Rejected
//!          └──────────── Faulted ◀────────┘           └──▶ TimedOut
//! ```
//!
//! The challenge is a fresh random salt. The correct response is
//! `argon2id(password = credential, salt = challenge)`, so a response captured
//! for one challenge is worthless for any other. Responses are compared over
//! the full digest in constant time.

use std::{
    fmt,
    time::{Duration, Instant},
};

use argon2::{Algorithm, Argon2, Params, Version};
use subtle::ConstantTimeEq;

use crate::{
    credential::{Credential, CredentialStore},
    env::Environment,
    error::{ProtocolError, TransportError},
    outcome::{FaultReason, VerificationOutcome},
    transport::Connection,
};

/// Challenge size in bytes.
pub const CHALLENGE_LEN: usize = 16;

/// Proof digest size in bytes.
pub const PROOF_LEN: usize = 32;

/// Largest response read from a peer.
pub const MAX_RESPONSE_LEN: usize = 60;

/// Default wait for a response after the challenge is sent.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(20);

/// Single-use random value binding a response to one attempt.
#[derive(Clone, PartialEq, Eq)]
pub struct Challenge([u8; CHALLENGE_LEN]);

impl Challenge {
    /// Draw a fresh challenge from the environment's RNG.
    pub fn generate<E: Environment>(env: &E) -> Self {
        let mut bytes = [0u8; CHALLENGE_LEN];
        env.random_bytes(&mut bytes);
        Self(bytes)
    }

    /// Wrap known bytes (peers and tests).
    pub fn from_bytes(bytes: [u8; CHALLENGE_LEN]) -> Self {
        Self(bytes)
    }

    /// Wire representation.
    pub fn as_bytes(&self) -> &[u8; CHALLENGE_LEN] {
        &self.0
    }
}

impl fmt::Debug for Challenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Challenge(")?;
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        f.write_str(")")
    }
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    /// Number of passes.
    pub iterations: u32,
    /// Lanes.
    pub parallelism: u32,
}

impl KdfParams {
    /// Smallest parameters argon2 accepts. Only for tests and simulations.
    pub const MIN: Self = Self { memory_kib: 8, iterations: 1, parallelism: 1 };
}

impl Default for KdfParams {
    /// 19 MiB, 2 passes, 1 lane.
    fn default() -> Self {
        Self { memory_kib: 19 * 1024, iterations: 2, parallelism: 1 }
    }
}

/// Challenge protocol configuration.
#[derive(Debug, Clone)]
pub struct ProtocolConfig {
    /// Proof derivation cost.
    pub kdf: KdfParams,
    /// How long to wait for a response once the challenge is sent.
    pub response_timeout: Duration,
    /// Largest response accepted from a peer.
    pub max_response_len: usize,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            kdf: KdfParams::default(),
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            max_response_len: MAX_RESPONSE_LEN,
        }
    }
}

/// Per-attempt state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    /// Connection accepted, challenge not yet sent.
    AwaitingChallengeSend,
    /// Challenge sent, waiting for the proof.
    AwaitingResponse,
    /// Proof matched a trusted credential.
    Verified,
    /// Proof matched nothing.
    Rejected,
    /// No proof within the response window.
    TimedOut,
    /// Transport failed.
    Faulted,
}

impl AttemptState {
    /// Returns true for states that end the attempt.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Verified | Self::Rejected | Self::TimedOut | Self::Faulted)
    }

    fn can_transition_to(self, next: Self) -> bool {
        match self {
            Self::AwaitingChallengeSend => {
                matches!(next, Self::AwaitingResponse | Self::Faulted)
            },
            Self::AwaitingResponse => next.is_terminal(),
            Self::Verified | Self::Rejected | Self::TimedOut | Self::Faulted => false,
        }
    }
}

/// One challenge-response attempt. Owns its challenge exclusively.
#[derive(Debug)]
pub struct Attempt {
    id: u64,
    challenge: Challenge,
    state: AttemptState,
    started_at: Instant,
}

impl Attempt {
    /// Start an attempt with a freshly generated challenge.
    pub fn begin<E: Environment>(env: &E) -> Self {
        Self {
            id: env.random_u64(),
            challenge: Challenge::generate(env),
            state: AttemptState::AwaitingChallengeSend,
            started_at: env.now(),
        }
    }

    /// Attempt identifier for log correlation.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The challenge issued for this attempt.
    pub fn challenge(&self) -> &Challenge {
        &self.challenge
    }

    /// Current state.
    pub fn state(&self) -> AttemptState {
        self.state
    }

    /// When the attempt started.
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Move to `next`, refusing transitions the state machine forbids.
    pub fn transition(&mut self, next: AttemptState) -> Result<(), ProtocolError> {
        if !self.state.can_transition_to(next) {
            return Err(ProtocolError::InvalidTransition { from: self.state, to: next });
        }
        self.state = next;
        Ok(())
    }
}

/// Issues challenges and verifies proofs.
#[derive(Clone)]
pub struct ChallengeProtocol {
    config: ProtocolConfig,
    argon2: Argon2<'static>,
}

impl fmt::Debug for ChallengeProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChallengeProtocol").field("config", &self.config).finish_non_exhaustive()
    }
}

impl ChallengeProtocol {
    /// Create a protocol instance, validating the KDF parameters.
    pub fn new(config: ProtocolConfig) -> Result<Self, ProtocolError> {
        let params = Params::new(
            config.kdf.memory_kib,
            config.kdf.iterations,
            config.kdf.parallelism,
            Some(PROOF_LEN),
        )
        .map_err(|e| ProtocolError::Kdf(format!("invalid parameters: {e}")))?;

        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        Ok(Self { config, argon2 })
    }

    /// Active configuration.
    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    /// Compute the proof a holder of `credential` must send for `challenge`.
    pub fn derive_proof(
        &self,
        credential: &Credential,
        challenge: &Challenge,
    ) -> Result<[u8; PROOF_LEN], ProtocolError> {
        let mut proof = [0u8; PROOF_LEN];
        self.argon2
            .hash_password_into(credential.expose(), challenge.as_bytes(), &mut proof)
            .map_err(|e| ProtocolError::Kdf(e.to_string()))?;
        Ok(proof)
    }

    /// Returns true if `response` is the proof for `credential` and `challenge`.
    pub fn matches(&self, credential: &Credential, challenge: &Challenge, response: &[u8]) -> bool {
        match self.derive_proof(credential, challenge) {
            Ok(proof) => proof[..].ct_eq(response).into(),
            Err(e) => {
                tracing::error!(error = %e, "proof derivation failed");
                false
            },
        }
    }

    /// Returns true if `response` answers `challenge` for some trusted credential.
    pub fn verify(&self, store: &CredentialStore, response: &[u8], challenge: &Challenge) -> bool {
        store.is_trusted(response, challenge, self)
    }

    /// Run one attempt on `conn` to a terminal state and close it.
    ///
    /// Sends the challenge immediately, waits at most the configured response
    /// timeout, and never retries.
    pub async fn run_attempt<E, C>(
        &self,
        conn: &mut C,
        store: &CredentialStore,
        env: &E,
    ) -> VerificationOutcome
    where
        E: Environment,
        C: Connection + ?Sized,
    {
        let mut attempt = Attempt::begin(env);
        let peer = conn.peer();

        let outcome = match self.drive(&mut attempt, conn, store, env).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(attempt = attempt.id(), error = %e, "attempt aborted");
                VerificationOutcome::Faulted(FaultReason::Protocol(e.to_string()))
            },
        };

        if let Err(e) = conn.close().await {
            tracing::debug!(attempt = attempt.id(), error = %e, "close failed");
        }

        let elapsed = env.now().saturating_duration_since(attempt.started_at());
        match &outcome {
            VerificationOutcome::Granted => {
                tracing::info!(attempt = attempt.id(), %peer, ?elapsed, "challenge verified");
            },
            VerificationOutcome::Denied => {
                tracing::info!(attempt = attempt.id(), %peer, ?elapsed, "challenge denied");
            },
            VerificationOutcome::Faulted(reason) => {
                tracing::warn!(attempt = attempt.id(), %peer, %reason, "challenge faulted");
            },
        }

        outcome
    }

    async fn drive<E, C>(
        &self,
        attempt: &mut Attempt,
        conn: &mut C,
        store: &CredentialStore,
        env: &E,
    ) -> Result<VerificationOutcome, ProtocolError>
    where
        E: Environment,
        C: Connection + ?Sized,
    {
        if let Err(e) = conn.send(attempt.challenge().as_bytes()).await {
            attempt.transition(AttemptState::Faulted)?;
            return Ok(VerificationOutcome::Faulted(fault_from(e)));
        }
        attempt.transition(AttemptState::AwaitingResponse)?;

        let mut response = vec![0u8; self.config.max_response_len];
        let read = tokio::select! {
            biased;
            read = read_response(conn, &mut response) => Some(read),
            () = env.sleep(self.config.response_timeout) => None,
        };

        let outcome = match read {
            None => {
                attempt.transition(AttemptState::TimedOut)?;
                VerificationOutcome::Faulted(FaultReason::Timeout)
            },
            Some(Err(e)) => {
                attempt.transition(AttemptState::Faulted)?;
                VerificationOutcome::Faulted(fault_from(e))
            },
            Some(Ok(0)) => {
                attempt.transition(AttemptState::Faulted)?;
                VerificationOutcome::Faulted(FaultReason::Disconnected)
            },
            Some(Ok(len)) => {
                if self.verify(store, &response[..len], attempt.challenge()) {
                    attempt.transition(AttemptState::Verified)?;
                    VerificationOutcome::Granted
                } else {
                    attempt.transition(AttemptState::Rejected)?;
                    VerificationOutcome::Denied
                }
            },
        };

        response.fill(0);
        Ok(outcome)
    }
}

/// Read the response: the first non-empty chunk the peer sends, bounded by
/// `buf`. Returns 0 if the peer closed without sending anything.
///
/// A short or oversized answer is returned as-is and fails verification, so
/// only silence runs into the response timeout.
async fn read_response<C>(conn: &mut C, buf: &mut [u8]) -> Result<usize, TransportError>
where
    C: Connection + ?Sized,
{
    conn.recv(buf).await
}

fn fault_from(err: TransportError) -> FaultReason {
    match err {
        TransportError::Closed => FaultReason::Disconnected,
        TransportError::Io(e) => FaultReason::Transport(e.to_string()),
    }
}
