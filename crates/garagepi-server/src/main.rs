//! garagepi daemon binary.
//!
//! # Usage
//!
//! ```bash
//! # Phone challenge only, credentials must already exist
//! garagepi /etc/garagepi/keys
//!
//! # Create the credential file on first start and check faces remotely
//! garagepi /etc/garagepi/keys --create-keyfile \
//!     --face-collection garage --face-object owner.jpg \
//!     --face-endpoint https://faces.example/compare
//! ```

use std::{path::PathBuf, process::ExitCode, time::Duration};

use clap::Parser;
use garagepi_core::{ButtonConfig, DoorConfig, Level, LoadPolicy, ProtocolConfig};
use garagepi_server::{
    DEFAULT_BUTTON_PIN, DEFAULT_RELAY_PIN, FaceConfig, FaceMode, SYSFS_GPIO_ROOT, Server,
    ServerConfig, ServerError,
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const EXIT_CODES: &str = "\
Exit codes:
  0   clean shutdown (SIGINT or SIGTERM)
  13  credential file missing or unreadable (EACCES)
  1   any other startup failure (bind, GPIO, face reference)";

/// garagepi door opener
#[derive(Parser, Debug)]
#[command(name = "garagepi")]
#[command(about = "Garage door opener: phone challenge-response and face-checked button")]
#[command(after_help = EXIT_CODES)]
#[command(version)]
struct Args {
    /// Credential file, one trusted secret per line
    keyfile: PathBuf,

    /// Create the credential file if it does not exist
    #[arg(long)]
    create_keyfile: bool,

    /// Start with no trusted credentials if the file cannot be used
    #[arg(long)]
    allow_empty_keyfile: bool,

    /// Address to accept challenge connections on
    #[arg(short, long, default_value = "0.0.0.0:7700")]
    bind: String,

    /// sysfs GPIO root
    #[arg(long, default_value = SYSFS_GPIO_ROOT)]
    gpio_root: PathBuf,

    /// Relay output pin
    #[arg(long, default_value_t = DEFAULT_RELAY_PIN)]
    relay_pin: u32,

    /// Button input pin
    #[arg(long, default_value_t = DEFAULT_BUTTON_PIN)]
    button_pin: u32,

    /// Button reads high while pressed (pull-down wiring)
    #[arg(long)]
    button_active_high: bool,

    /// Relay pulse length in milliseconds
    #[arg(long, default_value_t = 500)]
    pulse_ms: u64,

    /// Milliseconds after a pulse during which further grants are coalesced
    #[arg(long, default_value_t = 0)]
    settle_ms: u64,

    /// Seconds to wait for a challenge response
    #[arg(long, default_value_t = 20)]
    response_timeout_secs: u64,

    /// Local reference image for face verification
    #[arg(long, conflicts_with_all = ["face_collection", "face_object"])]
    face_reference: Option<PathBuf>,

    /// Remote collection holding the reference image
    #[arg(long, requires = "face_object")]
    face_collection: Option<String>,

    /// Remote reference object name
    #[arg(long, requires = "face_collection")]
    face_object: Option<String>,

    /// Face comparison endpoint
    #[arg(long)]
    face_endpoint: Option<String>,

    /// Minimum similarity (0-100) for a face match
    #[arg(long, default_value_t = garagepi_core::DEFAULT_SIMILARITY_THRESHOLD)]
    face_threshold: f32,

    /// Still-capture command, program followed by arguments
    #[arg(long, num_args = 1.., allow_hyphen_values = true)]
    capture_command: Vec<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn into_config(self) -> ServerConfig {
        let face_mode = match (self.face_reference, self.face_collection, self.face_object) {
            (Some(reference), _, _) => FaceMode::Local { reference },
            (None, Some(collection), Some(object)) => FaceMode::Remote { collection, object },
            _ => FaceMode::Disabled,
        };

        let pressed_level = if self.button_active_high { Level::High } else { Level::Low };

        ServerConfig {
            keyfile: self.keyfile,
            credentials: LoadPolicy {
                create_missing: self.create_keyfile,
                fallback_to_empty: self.allow_empty_keyfile,
            },
            bind_address: self.bind,
            gpio_root: self.gpio_root,
            relay_pin: self.relay_pin,
            button_pin: self.button_pin,
            button: ButtonConfig { pressed_level, ..Default::default() },
            door: DoorConfig {
                pulse: Duration::from_millis(self.pulse_ms),
                settle: Duration::from_millis(self.settle_ms),
            },
            protocol: ProtocolConfig {
                response_timeout: Duration::from_secs(self.response_timeout_secs),
                ..Default::default()
            },
            face: FaceConfig {
                mode: face_mode,
                endpoint: self.face_endpoint,
                capture_command: self.capture_command,
                threshold: self.face_threshold,
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

async fn start(config: ServerConfig) -> Result<(), ServerError> {
    let server = Server::bind(config)?;
    tracing::info!("Listening on {}", server.local_addr());
    server.run().await
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("garagepi starting");

    match start(args.into_config()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::from(e.exit_code())
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_is_well_formed() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }

    #[test]
    fn defaults_map_to_fatal_credential_policy() {
        let config = Args::parse_from(["garagepi", "keys"]).into_config();

        assert_eq!(config.credentials, LoadPolicy::default());
        assert_eq!(config.face.mode, FaceMode::Disabled);
        assert_eq!(config.door.pulse, Duration::from_millis(500));
        assert_eq!(config.door.settle, Duration::ZERO);
        assert_eq!(config.protocol.response_timeout, Duration::from_secs(20));
    }

    #[test]
    fn remote_face_flags_select_remote_mode() {
        let config = Args::parse_from([
            "garagepi",
            "keys",
            "--face-collection",
            "garage",
            "--face-object",
            "owner.jpg",
        ])
        .into_config();

        assert_eq!(
            config.face.mode,
            FaceMode::Remote { collection: "garage".to_string(), object: "owner.jpg".to_string() }
        );
    }

    #[test]
    fn settle_window_is_opt_in() {
        let config = Args::parse_from(["garagepi", "keys", "--settle-ms", "1000"]).into_config();
        assert_eq!(config.door.settle, Duration::from_secs(1));
    }

    #[test]
    fn keyfile_is_required() {
        assert!(Args::try_parse_from(["garagepi"]).is_err());
    }

    #[test]
    fn active_high_button_flag() {
        let config = Args::parse_from(["garagepi", "keys", "--button-active-high"]).into_config();
        assert_eq!(config.button.pressed_level, Level::High);
    }
}
