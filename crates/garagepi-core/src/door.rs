//! Door relay actuator.
//!
//! ## Invariants
//!
//! - Resting level is high. The output is low only while a pulse is in flight.
//! - `actuate` takes `&mut self`, so two pulses can never overlap.
//! - A pulse cancelled part way (shutdown, interrupt) still restores the
//!   resting level: the low phase is owned by a drop guard.
//! - Requests while a pulse is in flight are coalesced. With a non-zero
//!   `settle`, requests inside `pulse + settle` of the last pulse start are
//!   coalesced too, so a burst of grants toggles the door once. The default
//!   settle is zero: a grant after the pulse has completed always pulses.

use std::time::{Duration, Instant};

use crate::{
    env::Environment,
    error::ActuationError,
    gpio::{Level, OutputPin},
};

/// Level the relay line rests at.
pub const RESTING_LEVEL: Level = Level::High;

/// Relay timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DoorConfig {
    /// How long the line is held active.
    pub pulse: Duration,
    /// Quiet period after a pulse during which new requests are coalesced.
    /// Zero disables it.
    pub settle: Duration,
}

impl Default for DoorConfig {
    fn default() -> Self {
        Self { pulse: Duration::from_millis(500), settle: Duration::ZERO }
    }
}

/// Relay state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoorState {
    /// Line at resting level.
    Idle,
    /// Pulse in flight.
    Actuating,
}

/// What an actuation request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actuation {
    /// A full pulse was driven.
    Pulsed,
    /// Request fell inside the previous pulse's window and was dropped.
    Coalesced,
}

/// Drives the garage door relay.
#[derive(Debug)]
pub struct DoorActuator<P: OutputPin> {
    pin: P,
    config: DoorConfig,
    state: DoorState,
    last_pulse: Option<Instant>,
}

impl<P: OutputPin> DoorActuator<P> {
    /// Take ownership of the relay line and drive it to rest.
    pub fn new(mut pin: P, config: DoorConfig) -> Result<Self, ActuationError> {
        pin.set_level(RESTING_LEVEL)?;
        Ok(Self { pin, config, state: DoorState::Idle, last_pulse: None })
    }

    /// Current state.
    pub fn state(&self) -> DoorState {
        self.state
    }

    /// Relay timing.
    pub fn config(&self) -> DoorConfig {
        self.config
    }

    /// The relay line.
    pub fn pin(&self) -> &P {
        &self.pin
    }

    /// Pulse the relay and return once the line is back at rest.
    pub async fn actuate<E: Environment>(&mut self, env: &E) -> Result<Actuation, ActuationError> {
        let now = env.now();
        if self.state == DoorState::Actuating || self.within_window(now) {
            tracing::info!("actuation coalesced with previous pulse");
            return Ok(Actuation::Coalesced);
        }

        let pulse = self.config.pulse;
        self.last_pulse = Some(now);

        let guard = PulseGuard::engage(self)?;
        tracing::info!(?pulse, "door relay engaged");
        env.sleep(pulse).await;
        guard.finish()?;

        tracing::debug!("door relay released");
        Ok(Actuation::Pulsed)
    }

    /// Force the resting level. Called on shutdown and after failures.
    pub fn release(&mut self) -> Result<(), ActuationError> {
        self.state = DoorState::Idle;
        self.pin.set_level(RESTING_LEVEL)
    }

    fn within_window(&self, now: Instant) -> bool {
        self.last_pulse.is_some_and(|started| {
            now.saturating_duration_since(started) < self.config.pulse + self.config.settle
        })
    }
}

/// Owns the active phase of a pulse. Dropping it restores rest.
struct PulseGuard<'a, P: OutputPin> {
    door: &'a mut DoorActuator<P>,
    armed: bool,
}

impl<'a, P: OutputPin> PulseGuard<'a, P> {
    fn engage(door: &'a mut DoorActuator<P>) -> Result<Self, ActuationError> {
        if let Err(e) = door.pin.set_level(RESTING_LEVEL.inverted()) {
            if let Err(rest) = door.release() {
                tracing::error!(error = %rest, "failed to restore relay after engage failure");
            }
            return Err(e);
        }
        door.state = DoorState::Actuating;
        Ok(Self { door, armed: true })
    }

    fn finish(mut self) -> Result<(), ActuationError> {
        self.armed = false;
        self.door.release()
    }
}

impl<P: OutputPin> Drop for PulseGuard<'_, P> {
    fn drop(&mut self) {
        if self.armed {
            tracing::warn!("pulse interrupted, restoring resting level");
            if let Err(e) = self.door.release() {
                tracing::error!(error = %e, "failed to restore relay resting level");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Clone)]
    struct TestEnv;

    impl Environment for TestEnv {
        fn now(&self) -> Instant {
            tokio::time::Instant::now().into_std()
        }

        fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
            tokio::time::sleep(duration)
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            buffer.fill(0x42);
        }
    }

    #[derive(Clone, Default)]
    struct RecordingPin(Arc<Mutex<Vec<Level>>>);

    impl RecordingPin {
        fn history(&self) -> Vec<Level> {
            self.0.lock().unwrap().clone()
        }
    }

    impl OutputPin for RecordingPin {
        fn set_level(&mut self, level: Level) -> Result<(), ActuationError> {
            self.0.lock().unwrap().push(level);
            Ok(())
        }
    }

    fn no_settle() -> DoorConfig {
        DoorConfig { pulse: Duration::from_millis(500), settle: Duration::ZERO }
    }

    fn one_second_settle() -> DoorConfig {
        DoorConfig { pulse: Duration::from_millis(500), settle: Duration::from_secs(1) }
    }

    #[test]
    fn new_drives_resting_level() {
        let pin = RecordingPin::default();
        let door = DoorActuator::new(pin.clone(), DoorConfig::default()).unwrap();

        assert_eq!(pin.history(), vec![Level::High]);
        assert_eq!(door.state(), DoorState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn actuate_pulses_low_then_rests_high() {
        let pin = RecordingPin::default();
        let mut door = DoorActuator::new(pin.clone(), no_settle()).unwrap();

        let start = tokio::time::Instant::now();
        let result = door.actuate(&TestEnv).await.unwrap();

        assert_eq!(result, Actuation::Pulsed);
        assert!(start.elapsed() >= Duration::from_millis(500));
        assert_eq!(pin.history(), vec![Level::High, Level::Low, Level::High]);
        assert_eq!(door.state(), DoorState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn request_after_completed_pulse_pulses_again_by_default() {
        let pin = RecordingPin::default();
        let mut door = DoorActuator::new(pin.clone(), DoorConfig::default()).unwrap();

        assert_eq!(door.actuate(&TestEnv).await.unwrap(), Actuation::Pulsed);
        tokio::time::advance(Duration::from_millis(300)).await;
        assert_eq!(door.actuate(&TestEnv).await.unwrap(), Actuation::Pulsed);

        assert_eq!(
            pin.history(),
            vec![Level::High, Level::Low, Level::High, Level::Low, Level::High]
        );
        assert_eq!(door.state(), DoorState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn request_during_settle_window_is_coalesced() {
        let pin = RecordingPin::default();
        let mut door = DoorActuator::new(pin.clone(), one_second_settle()).unwrap();

        assert_eq!(door.actuate(&TestEnv).await.unwrap(), Actuation::Pulsed);
        assert_eq!(door.actuate(&TestEnv).await.unwrap(), Actuation::Coalesced);
        assert_eq!(pin.history().len(), 3);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(door.actuate(&TestEnv).await.unwrap(), Actuation::Pulsed);
        assert_eq!(pin.history().last(), Some(&Level::High));
    }

    #[tokio::test(start_paused = true)]
    async fn interrupted_pulse_restores_resting_level() {
        let pin = RecordingPin::default();
        let mut door = DoorActuator::new(pin.clone(), no_settle()).unwrap();

        let interrupted =
            tokio::time::timeout(Duration::from_millis(100), door.actuate(&TestEnv)).await;

        assert!(interrupted.is_err());
        assert_eq!(door.state(), DoorState::Idle);
        assert_eq!(pin.history(), vec![Level::High, Level::Low, Level::High]);
    }

    struct FailingPin;

    impl OutputPin for FailingPin {
        fn set_level(&mut self, level: Level) -> Result<(), ActuationError> {
            match level {
                Level::High => Ok(()),
                Level::Low => Err(ActuationError::Pin {
                    pin: 17,
                    source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
                }),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn engage_failure_leaves_door_idle() {
        let mut door = DoorActuator::new(FailingPin, no_settle()).unwrap();

        assert!(door.actuate(&TestEnv).await.is_err());
        assert_eq!(door.state(), DoorState::Idle);
    }
}
