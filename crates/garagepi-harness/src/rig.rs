//! A fully simulated dispatcher with handles for driving it.

use garagepi_core::{
    Button, ButtonConfig, ChallengeProtocol, Credential, CredentialStore, Dispatcher,
    DispatcherConfig, DispatcherParts, DoorActuator, DoorConfig, FaceVerifier, KdfParams,
    ProtocolConfig,
};

use crate::{
    sim_env::SimEnv,
    sim_gpio::{SimInputPin, SimOutputPin},
    sim_transport::{SimConnector, SimListener, sim_listener},
};

/// Dispatcher type produced by [`SimRig`].
pub type SimDispatcher = Dispatcher<SimEnv, SimListener, SimInputPin, SimOutputPin>;

/// Knobs for a simulated rig.
#[derive(Debug, Clone)]
pub struct RigConfig {
    /// RNG seed.
    pub seed: u64,
    /// Trusted secrets.
    pub secrets: Vec<String>,
    /// Dispatcher timing.
    pub dispatcher: DispatcherConfig,
    /// Protocol settings. KDF cost defaults to the minimum for speed.
    pub protocol: ProtocolConfig,
    /// Relay timing.
    pub door: DoorConfig,
    /// Button wiring.
    pub button: ButtonConfig,
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            seed: crate::sim_env::DEFAULT_SEED,
            secrets: vec!["alpha".to_string(), "beta".to_string()],
            dispatcher: DispatcherConfig::default(),
            protocol: ProtocolConfig { kdf: KdfParams::MIN, ..Default::default() },
            door: DoorConfig::default(),
            button: ButtonConfig::default(),
        }
    }
}

/// Handles for the outside of a simulated dispatcher.
#[derive(Debug)]
pub struct SimRig {
    /// Environment shared with the dispatcher.
    pub env: SimEnv,
    /// Opens connections towards the dispatcher.
    pub connector: SimConnector,
    /// The button line.
    pub button: SimInputPin,
    /// The relay line.
    pub relay: SimOutputPin,
    /// Protocol with the same KDF cost, for computing peer proofs.
    pub protocol: ChallengeProtocol,
}

impl SimRig {
    /// Build a dispatcher and its handles.
    pub fn build(config: RigConfig, face: FaceVerifier) -> (SimDispatcher, Self) {
        let env = SimEnv::with_seed(config.seed);
        let (listener, connector) = sim_listener();
        let button = SimInputPin::new();
        let relay = SimOutputPin::new();

        // The harness owns every fixture; a bad fixture is a test bug.
        #[allow(clippy::expect_used)]
        let protocol = ChallengeProtocol::new(config.protocol).expect("valid KDF parameters");
        #[allow(clippy::expect_used)]
        let door = DoorActuator::new(relay.clone(), config.door).expect("sim pin never fails");

        let store = CredentialStore::from_credentials(
            config.secrets.iter().map(|s| Credential::new(s.as_bytes())),
        );

        let parts = DispatcherParts {
            store,
            protocol: protocol.clone(),
            listener,
            button: Button::new(button.clone(), config.button),
            door,
            face,
        };
        let dispatcher = Dispatcher::new(env.clone(), config.dispatcher, parts);

        (dispatcher, Self { env, connector, button, relay, protocol })
    }

    /// Proof a holder of `secret` would send for `challenge`.
    pub fn proof_for(&self, secret: &str, challenge: &garagepi_core::Challenge) -> Vec<u8> {
        self.protocol
            .derive_proof(&Credential::new(secret.as_bytes()), challenge)
            .map(|p| p.to_vec())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rig_debug_names_seed() {
        let config = RigConfig { seed: 11, ..Default::default() };
        let (_dispatcher, rig) = SimRig::build(config, FaceVerifier::disabled());

        assert!(format!("{rig:?}").contains("SimEnv { seed: 11, .. }"));
    }
}
