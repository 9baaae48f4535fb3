//! garagepi production daemon.
//!
//! This crate wires the access-control core to real hardware:
//! - Tokio stream sockets for the challenge channel
//! - Linux sysfs GPIO for the relay and the button
//! - An external still-capture command and an HTTP face comparator
//! - System time and cryptographic RNG
//!
//! ## Architecture
//!
//! ```text
//! garagepi-server
//!   ├─ SystemEnv         (production Environment impl)
//!   ├─ StreamListener    (challenge channel, backlog of one)
//!   ├─ SysfsOutputPin    (relay line)
//!   ├─ SysfsInputPin     (button line)
//!   ├─ CommandCamera     (still capture)
//!   ├─ HttpComparator    (remote face comparison)
//!   └─ Dispatcher        (single-threaded event loop from garagepi-core)
//! ```
//!
//! ## Startup order
//!
//! Credentials are loaded first so an unusable credential source fails
//! before any socket is bound or pin is touched.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod camera;
mod comparator;
mod error;
mod gpio;
pub mod shutdown;
mod system_env;
mod transport;

use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
    time::Duration,
};

pub use camera::{CommandCamera, DEFAULT_CAPTURE_COMMAND, DEFAULT_CAPTURE_TIMEOUT};
pub use comparator::{DEFAULT_REQUEST_TIMEOUT, HttpComparator};
pub use error::{EXIT_FAILURE, EXIT_PERMISSION_DENIED, ServerError};
use garagepi_core::{
    Button, ButtonConfig, Camera, ChallengeProtocol, CredentialStore, DEFAULT_SIMILARITY_THRESHOLD,
    DisabledComparator, Dispatcher, DispatcherConfig, DispatcherParts, DoorActuator, DoorConfig,
    FaceComparator, FaceStrategy, FaceVerifier, LoadPolicy, ProtocolConfig,
};
pub use gpio::{SYSFS_GPIO_ROOT, SysfsInputPin, SysfsOutputPin};
pub use system_env::SystemEnv;
pub use transport::{StreamConnection, StreamListener};

/// Default relay line (BCM numbering).
pub const DEFAULT_RELAY_PIN: u32 = 17;

/// Default button line (BCM numbering).
pub const DEFAULT_BUTTON_PIN: u32 = 27;

/// Which face reference the button path compares against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FaceMode {
    /// No face verification. Button presses never open the door.
    #[default]
    Disabled,
    /// Reference image read from a local file at startup.
    Local {
        /// Reference image path.
        reference: PathBuf,
    },
    /// Reference stored remotely, named by collection and object.
    Remote {
        /// Remote collection (bucket).
        collection: String,
        /// Object name within the collection.
        object: String,
    },
}

/// Face verification configuration.
#[derive(Debug, Clone)]
pub struct FaceConfig {
    /// Reference selection.
    pub mode: FaceMode,
    /// Comparison endpoint. Without one every comparison is unavailable.
    pub endpoint: Option<String>,
    /// Capture command. Empty means [`DEFAULT_CAPTURE_COMMAND`].
    pub capture_command: Vec<String>,
    /// Minimum similarity for a match.
    pub threshold: f32,
    /// Comparison request deadline.
    pub request_timeout: Duration,
}

impl Default for FaceConfig {
    fn default() -> Self {
        Self {
            mode: FaceMode::Disabled,
            endpoint: None,
            capture_command: Vec::new(),
            threshold: DEFAULT_SIMILARITY_THRESHOLD,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Daemon configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Credential file, one secret per line.
    pub keyfile: PathBuf,
    /// What to do when the credential file is missing or unreadable.
    pub credentials: LoadPolicy,
    /// Address to bind the challenge channel to (e.g., "0.0.0.0:7700").
    pub bind_address: String,
    /// sysfs GPIO root.
    pub gpio_root: PathBuf,
    /// Relay output line.
    pub relay_pin: u32,
    /// Button input line.
    pub button_pin: u32,
    /// Button wiring and debounce.
    pub button: ButtonConfig,
    /// Relay timing.
    pub door: DoorConfig,
    /// Challenge protocol parameters.
    pub protocol: ProtocolConfig,
    /// Loop timing.
    pub dispatcher: DispatcherConfig,
    /// Face verification.
    pub face: FaceConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            keyfile: PathBuf::from("/etc/garagepi/keys"),
            credentials: LoadPolicy::default(),
            bind_address: "0.0.0.0:7700".to_string(),
            gpio_root: PathBuf::from(SYSFS_GPIO_ROOT),
            relay_pin: DEFAULT_RELAY_PIN,
            button_pin: DEFAULT_BUTTON_PIN,
            button: ButtonConfig::default(),
            door: DoorConfig::default(),
            protocol: ProtocolConfig::default(),
            dispatcher: DispatcherConfig::default(),
            face: FaceConfig::default(),
        }
    }
}

/// The production dispatcher.
pub type SystemDispatcher = Dispatcher<SystemEnv, StreamListener, SysfsInputPin, SysfsOutputPin>;

/// Production garagepi daemon.
pub struct Server {
    dispatcher: SystemDispatcher,
    local_addr: SocketAddr,
}

impl Server {
    /// Load credentials, open the hardware and bind the challenge channel.
    ///
    /// # Errors
    ///
    /// - [`ServerError::Credentials`] if the credential source is unusable
    ///   and the policy has no fallback. Nothing else has been touched.
    /// - [`ServerError::Gpio`] if a pin cannot be configured.
    /// - [`ServerError::Config`] for an invalid address or face reference.
    /// - [`ServerError::Transport`] if binding fails.
    pub fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let store = CredentialStore::load(&config.keyfile, config.credentials)?;
        tracing::info!(
            keyfile = %config.keyfile.display(),
            trusted = store.len(),
            rejected = store.rejected().len(),
            "credentials loaded"
        );

        let env = SystemEnv::new()?;
        let protocol = ChallengeProtocol::new(config.protocol.clone())?;
        let face = build_face_verifier(&config.face)?;

        let relay = SysfsOutputPin::open(&config.gpio_root, config.relay_pin)?;
        let door = DoorActuator::new(relay, config.door)?;
        let button_line = SysfsInputPin::open(&config.gpio_root, config.button_pin)?;
        let button = Button::new(button_line, config.button);

        let listener = StreamListener::bind(&config.bind_address)?;
        let local_addr = listener.local_addr()?;

        let parts = DispatcherParts { store, protocol, listener, button, door, face };
        let dispatcher = Dispatcher::new(env, config.dispatcher, parts);

        Ok(Self { dispatcher, local_addr })
    }

    /// Address the challenge channel is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Run until SIGINT or SIGTERM. The relay is at rest on return.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_until(shutdown::wait_for_signal()).await
    }

    /// Run until `shutdown` resolves.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: std::future::Future<Output = ()>,
    {
        tracing::info!(addr = %self.local_addr, "garagepi running");
        self.dispatcher.run(shutdown).await?;
        tracing::info!("garagepi stopped, relay released");
        Ok(())
    }
}

fn build_face_verifier(config: &FaceConfig) -> Result<FaceVerifier, ServerError> {
    let strategy = match &config.mode {
        FaceMode::Disabled => {
            tracing::info!("face verification disabled, button presses are ignored");
            return Ok(FaceVerifier::disabled());
        },
        FaceMode::Local { reference } => {
            FaceStrategy::LocalReference { reference: read_reference(reference)? }
        },
        FaceMode::Remote { collection, object } => FaceStrategy::RemoteReference {
            collection: collection.clone(),
            object: object.clone(),
        },
    };

    let comparator: Box<dyn FaceComparator> = match &config.endpoint {
        Some(endpoint) => Box::new(
            HttpComparator::new(endpoint.clone(), config.request_timeout)
                .map_err(|e| ServerError::Config(format!("face comparator: {e}")))?,
        ),
        None => {
            tracing::warn!("no comparison endpoint configured, face checks will fail closed");
            Box::new(DisabledComparator)
        },
    };

    let camera: Box<dyn Camera> = if config.capture_command.is_empty() {
        Box::new(CommandCamera::raspistill())
    } else {
        let camera = CommandCamera::new(&config.capture_command, DEFAULT_CAPTURE_TIMEOUT)
            .ok_or_else(|| ServerError::Config("empty capture command".to_string()))?;
        Box::new(camera)
    };

    tracing::info!(
        strategy = strategy.name(),
        threshold = config.threshold,
        "face verification enabled"
    );
    Ok(FaceVerifier::new(strategy, camera, comparator).with_threshold(config.threshold))
}

fn read_reference(path: &Path) -> Result<Vec<u8>, ServerError> {
    let bytes = std::fs::read(path).map_err(|e| {
        ServerError::Config(format!("reference image {}: {e}", path.display()))
    })?;
    if bytes.is_empty() {
        return Err(ServerError::Config(format!("reference image {} is empty", path.display())));
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_face_mode_has_no_strategy() {
        let verifier = build_face_verifier(&FaceConfig::default()).unwrap();
        assert!(verifier.strategy().is_none());
    }

    #[test]
    fn local_face_mode_reads_reference() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("owner.jpg");
        std::fs::write(&path, b"jpeg").unwrap();

        let config = FaceConfig { mode: FaceMode::Local { reference: path }, ..Default::default() };
        let verifier = build_face_verifier(&config).unwrap();

        assert_eq!(
            verifier.strategy(),
            Some(&FaceStrategy::LocalReference { reference: b"jpeg".to_vec() })
        );
    }

    #[test]
    fn missing_reference_image_is_config_error() {
        let config = FaceConfig {
            mode: FaceMode::Local { reference: PathBuf::from("/nonexistent/owner.jpg") },
            ..Default::default()
        };

        let err = build_face_verifier(&config).unwrap_err();

        assert!(matches!(err, ServerError::Config(_)));
        assert_eq!(err.exit_code(), EXIT_FAILURE);
    }

    #[test]
    fn remote_face_mode_names_object() {
        let config = FaceConfig {
            mode: FaceMode::Remote {
                collection: "garage".to_string(),
                object: "owner.jpg".to_string(),
            },
            endpoint: Some("http://127.0.0.1:9/compare".to_string()),
            ..Default::default()
        };

        let verifier = build_face_verifier(&config).unwrap();

        assert_eq!(verifier.strategy().map(FaceStrategy::name), Some("remote"));
    }
}
