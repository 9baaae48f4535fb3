//! Challenge verification properties.
//!
//! A response verifies iff it is the proof derived from some trusted
//! credential and the challenge it is checked against.

use garagepi_core::{
    Challenge, ChallengeProtocol, Credential, CredentialStore, KdfParams, ProtocolConfig,
};
use proptest::prelude::*;

fn protocol() -> ChallengeProtocol {
    ChallengeProtocol::new(ProtocolConfig { kdf: KdfParams::MIN, ..Default::default() }).unwrap()
}

fn store(secrets: &[&str]) -> CredentialStore {
    CredentialStore::from_credentials(secrets.iter().map(|s| Credential::new(*s)))
}

#[test]
fn beta_proof_for_issued_challenge_is_granted() {
    let protocol = protocol();
    let store = CredentialStore::parse(&b"alpha\nbeta\n"[..]).unwrap();
    let issued = Challenge::from_bytes([0x11; 16]);

    let proof = protocol.derive_proof(&Credential::new("beta"), &issued).unwrap();

    assert!(protocol.verify(&store, &proof, &issued));
}

#[test]
fn beta_proof_for_other_challenge_is_denied() {
    let protocol = protocol();
    let store = CredentialStore::parse(&b"alpha\nbeta\n"[..]).unwrap();
    let issued = Challenge::from_bytes([0x11; 16]);
    let other = Challenge::from_bytes([0x22; 16]);

    let stale = protocol.derive_proof(&Credential::new("beta"), &other).unwrap();

    assert!(!protocol.verify(&store, &stale, &issued));
}

#[test]
fn untrusted_credential_is_denied() {
    let protocol = protocol();
    let store = store(&["alpha", "beta"]);
    let issued = Challenge::from_bytes([0x33; 16]);

    let proof = protocol.derive_proof(&Credential::new("gamma"), &issued).unwrap();

    assert!(!protocol.verify(&store, &proof, &issued));
}

#[test]
fn raw_credential_is_not_a_valid_response() {
    let protocol = protocol();
    let store = store(&["alpha"]);
    let issued = Challenge::from_bytes([0x44; 16]);

    assert!(!protocol.verify(&store, b"alpha", &issued));
}

#[test]
fn empty_store_denies_everything() {
    let protocol = protocol();
    let issued = Challenge::from_bytes([0x55; 16]);
    let proof = protocol.derive_proof(&Credential::new("alpha"), &issued).unwrap();

    assert!(!protocol.verify(&CredentialStore::empty(), &proof, &issued));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_verifies_iff_proof_from_trusted_credential(
        trusted in prop::collection::vec("[a-z]{1,12}", 1..4),
        candidate in "[a-z]{1,12}",
        challenge in any::<[u8; 16]>(),
    ) {
        let protocol = protocol();
        let store = CredentialStore::from_credentials(
            trusted.iter().map(|s| Credential::new(s.as_bytes())),
        );
        let challenge = Challenge::from_bytes(challenge);

        let proof =
            protocol.derive_proof(&Credential::new(candidate.as_bytes()), &challenge).unwrap();

        prop_assert_eq!(protocol.verify(&store, &proof, &challenge), trusted.contains(&candidate));
    }

    #[test]
    fn prop_replay_against_new_challenge_fails(
        secret in "[a-z]{1,12}",
        old in any::<[u8; 16]>(),
        new in any::<[u8; 16]>(),
    ) {
        prop_assume!(old != new);
        let protocol = protocol();
        let store = CredentialStore::from_credentials([Credential::new(secret.as_bytes())]);

        let replayed = protocol
            .derive_proof(&Credential::new(secret.as_bytes()), &Challenge::from_bytes(old))
            .unwrap();

        prop_assert!(!protocol.verify(&store, &replayed, &Challenge::from_bytes(new)));
    }

    #[test]
    fn prop_arbitrary_bytes_never_verify(
        response in prop::collection::vec(any::<u8>(), 0..60),
        challenge in any::<[u8; 16]>(),
    ) {
        let protocol = protocol();
        let store = store(&["alpha", "beta"]);

        prop_assert!(!protocol.verify(&store, &response, &Challenge::from_bytes(challenge)));
    }
}
