//! Fuzz target for button edge detection
//!
//! # Invariants
//!
//! - Edges equal the number of Released -> Pressed transitions, starting
//!   from Released
//! - A held button never produces a second edge
//! - `state()` always reports the last sample

#![no_main]

use garagepi_core::{ButtonState, EdgeDetector};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|samples: Vec<bool>| {
    let mut detector = EdgeDetector::new();
    let mut expected = 0usize;
    let mut edges = 0usize;
    let mut previous = false;

    for pressed in samples {
        let sample = if pressed { ButtonState::Pressed } else { ButtonState::Released };
        let edge = detector.update(sample);

        assert_eq!(edge, pressed && !previous, "edge on held or released sample");
        if pressed && !previous {
            expected += 1;
        }
        edges += usize::from(edge);
        previous = pressed;

        assert_eq!(detector.state(), sample);
    }

    assert_eq!(edges, expected);
});
