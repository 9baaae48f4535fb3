//! Relay actuator properties.
//!
//! The relay line must be back at its resting level after every actuation,
//! including one cut short part way through its pulse.

use std::time::Duration;

use garagepi_core::{Actuation, DoorActuator, DoorConfig, DoorState, Level};
use garagepi_harness::{SimEnv, SimOutputPin};
use proptest::prelude::*;

fn paused_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap()
}

fn door(pin: &SimOutputPin) -> DoorActuator<SimOutputPin> {
    let config = DoorConfig { pulse: Duration::from_millis(500), settle: Duration::ZERO };
    DoorActuator::new(pin.clone(), config).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_sequential_actuations_end_at_rest(count in 1usize..16) {
        let rt = paused_runtime();
        let env = SimEnv::new();
        let pin = SimOutputPin::new();
        let mut door = door(&pin);

        let results: Vec<Actuation> = rt.block_on(async {
            let mut results = Vec::with_capacity(count);
            for _ in 0..count {
                results.push(door.actuate(&env).await.unwrap());
                assert_eq!(pin.level(), Some(Level::High));
            }
            results
        });

        prop_assert!(results.iter().all(|r| *r == Actuation::Pulsed));
        prop_assert_eq!(pin.pulses(), count);
        prop_assert_eq!(pin.level(), Some(Level::High));
        prop_assert_eq!(door.state(), DoorState::Idle);
    }

    #[test]
    fn prop_interrupted_pulse_recovers(cut_ms in 1u64..500, after in 1usize..6) {
        let rt = paused_runtime();
        let env = SimEnv::new();
        let pin = SimOutputPin::new();
        let mut door = door(&pin);

        rt.block_on(async {
            let cut = tokio::time::timeout(Duration::from_millis(cut_ms), door.actuate(&env)).await;
            assert!(cut.is_err());
            assert_eq!(pin.level(), Some(Level::High));

            // Let the interrupted pulse's window lapse.
            tokio::time::sleep(Duration::from_millis(500)).await;

            for _ in 0..after {
                assert_eq!(door.actuate(&env).await.unwrap(), Actuation::Pulsed);
            }
        });

        prop_assert_eq!(pin.pulses(), after + 1);
        prop_assert_eq!(pin.level(), Some(Level::High));
        prop_assert_eq!(door.state(), DoorState::Idle);
    }
}
