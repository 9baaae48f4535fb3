//! Fuzz target for the challenge attempt state machine
//!
//! # Strategy
//!
//! - Arbitrary sequences of requested transitions on a fresh attempt
//!
//! # Invariants
//!
//! - `Verified` is ONLY reachable from `AwaitingResponse`, which is only
//!   reachable from `AwaitingChallengeSend`
//! - No transition out of a terminal state is accepted
//! - A refused transition leaves the state unchanged
//! - The issued challenge never changes during an attempt

#![no_main]

use arbitrary::Arbitrary;
use garagepi_core::{Attempt, AttemptState};
use garagepi_harness::SimEnv;
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Clone, Copy, Arbitrary)]
enum Requested {
    AwaitingChallengeSend,
    AwaitingResponse,
    Verified,
    Rejected,
    TimedOut,
    Faulted,
}

impl From<Requested> for AttemptState {
    fn from(r: Requested) -> Self {
        match r {
            Requested::AwaitingChallengeSend => Self::AwaitingChallengeSend,
            Requested::AwaitingResponse => Self::AwaitingResponse,
            Requested::Verified => Self::Verified,
            Requested::Rejected => Self::Rejected,
            Requested::TimedOut => Self::TimedOut,
            Requested::Faulted => Self::Faulted,
        }
    }
}

#[derive(Debug, Arbitrary)]
struct Input {
    seed: u64,
    steps: Vec<Requested>,
}

fuzz_target!(|input: Input| {
    let env = SimEnv::with_seed(input.seed);
    let mut attempt = Attempt::begin(&env);
    let challenge = attempt.challenge().clone();
    let mut history = vec![attempt.state()];

    for step in input.steps {
        let before = attempt.state();
        let next = AttemptState::from(step);

        match attempt.transition(next) {
            Ok(()) => {
                assert!(!before.is_terminal(), "left terminal state {before:?}");
                if next == AttemptState::Verified {
                    assert_eq!(before, AttemptState::AwaitingResponse);
                }
                if next == AttemptState::AwaitingResponse {
                    assert_eq!(before, AttemptState::AwaitingChallengeSend);
                }
                history.push(next);
            },
            Err(_) => assert_eq!(attempt.state(), before),
        }

        assert_eq!(attempt.challenge(), &challenge);
    }

    if history.contains(&AttemptState::Verified) {
        assert!(history.contains(&AttemptState::AwaitingResponse));
    }
});
