//! Environment abstraction for deterministic testing.
//!
//! The `Environment` trait decouples the access-control logic from system
//! resources (time, randomness). This enables:
//!
//! - Deterministic Simulation: the harness provides a paused clock and a
//!   seeded RNG, so a timeout or a pulse can be replayed exactly.
//!
//! - Production Runtime: `SystemEnv` uses the OS entropy pool and the tokio
//!   clock without any change to the dispatcher.
//!
//! # Invariants
//!
//! - Monotonicity: `env.now()` must never go backwards
//! - Unpredictability: challenges are drawn from `random_bytes()`, so a
//!   production implementation must be backed by a CSPRNG
//! - Isolation: Implementations must not share global state

use std::time::{Duration, Instant};

/// Abstract environment providing time, randomness, and async sleeping.
///
/// # Safety
///
/// Implementations MUST guarantee:
///
/// 1. Time monotonicity: `now()` never goes backwards
/// 2. RNG quality: `random_bytes()` uses cryptographically secure entropy in
///    production
/// 3. Minimal panics: Methods are infallible except in exceptional
///    circumstances (e.g., OS entropy exhaustion)
pub trait Environment: Clone + Send + Sync + 'static {
    /// Returns the current time.
    fn now(&self) -> Instant;

    /// Sleeps for the specified duration.
    ///
    /// Used for the relay pulse and the bounded response wait.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;

    /// Fills the provided buffer with random bytes.
    ///
    /// # Security
    ///
    /// Challenges are taken directly from this method. Production
    /// implementations MUST use the OS entropy pool, simulations MUST use a
    /// seeded RNG and log the seed.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`.
    ///
    /// Used for attempt identifiers in log lines.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }
}
