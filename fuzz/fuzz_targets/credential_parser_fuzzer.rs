//! Fuzz target for the credential source parser
//!
//! # Strategy
//!
//! - Raw bytes as file contents: invalid UTF-8, embedded NULs, CR/LF mixes,
//!   oversized lines, missing final newline
//!
//! # Invariants
//!
//! - Parsing an in-memory source NEVER fails and NEVER panics
//! - Accepted plus rejected lines never exceed the number of lines
//! - Rejected line numbers are strictly increasing and within the source
//! - Raw source bytes are never accepted as a proof

#![no_main]

use std::io::Cursor;

use garagepi_core::{
    CHALLENGE_LEN, Challenge, ChallengeProtocol, CredentialStore, KdfParams, PROOF_LEN,
    ProtocolConfig,
};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let store = match CredentialStore::parse(Cursor::new(data)) {
        Ok(store) => store,
        Err(e) => panic!("in-memory parse failed: {e}"),
    };

    let lines = if data.is_empty() {
        0
    } else {
        data.split(|b| *b == b'\n').count() - usize::from(data.ends_with(b"\n"))
    };

    assert!(store.len() + store.rejected().len() <= lines);

    let mut previous = 0;
    for rejected in store.rejected() {
        assert!(rejected.line > previous, "rejected lines out of order");
        assert!(rejected.line <= lines);
        previous = rejected.line;
    }

    // Keep the slow hash off large stores.
    if store.len() > 4 || data.len() == PROOF_LEN {
        return;
    }
    let config = ProtocolConfig { kdf: KdfParams::MIN, ..Default::default() };
    let Ok(protocol) = ChallengeProtocol::new(config) else {
        return;
    };
    let challenge = Challenge::from_bytes([0; CHALLENGE_LEN]);
    assert!(!store.is_trusted(data, &challenge, &protocol));
});
