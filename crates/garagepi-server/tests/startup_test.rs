//! Daemon startup and the stream transport end to end.

use std::{fs, path::Path, time::Duration};

use garagepi_core::{
    CHALLENGE_LEN, Challenge, ChallengeProtocol, Credential, CredentialStore, KdfParams, Listener,
    LoadPolicy, ProtocolConfig, VerificationOutcome,
};
use garagepi_server::{
    EXIT_PERMISSION_DENIED, Server, ServerConfig, ServerError, StreamListener, SystemEnv,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    sync::oneshot,
};

fn fast_protocol() -> ProtocolConfig {
    ProtocolConfig { kdf: KdfParams::MIN, ..Default::default() }
}

fn fake_gpio(root: &Path, pins: &[u32]) {
    for pin in pins {
        let dir = root.join(format!("gpio{pin}"));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("value"), "1").unwrap();
    }
}

/// Connect, read the challenge and answer it as the holder of `secret`.
async fn answer(addr: std::net::SocketAddr, secret: &str) -> Vec<u8> {
    let protocol = ChallengeProtocol::new(fast_protocol()).unwrap();
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let mut challenge = [0u8; CHALLENGE_LEN];
    stream.read_exact(&mut challenge).await.unwrap();
    let proof = protocol
        .derive_proof(&Credential::new(secret), &Challenge::from_bytes(challenge))
        .unwrap();
    stream.write_all(&proof).await.unwrap();

    // The server closes after its verdict.
    let mut rest = Vec::new();
    stream.read_to_end(&mut rest).await.unwrap();
    rest
}

#[tokio::test]
async fn missing_keyfile_fails_before_touching_hardware() {
    let dir = tempfile::tempdir().unwrap();
    let gpio = dir.path().join("gpio");
    fs::create_dir(&gpio).unwrap();

    let config = ServerConfig {
        keyfile: dir.path().join("keys"),
        bind_address: "127.0.0.1:0".to_string(),
        gpio_root: gpio.clone(),
        ..Default::default()
    };

    let err = Server::bind(config).err().unwrap();

    assert!(matches!(err, ServerError::Credentials(_)));
    assert_eq!(err.exit_code(), EXIT_PERMISSION_DENIED);
    assert!(!dir.path().join("keys").exists());
    assert_eq!(fs::read_dir(&gpio).unwrap().count(), 0, "no pin was exported");
}

#[tokio::test]
async fn missing_keyfile_with_fallback_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    fake_gpio(dir.path(), &[17, 27]);

    let config = ServerConfig {
        keyfile: dir.path().join("keys"),
        credentials: LoadPolicy { create_missing: false, fallback_to_empty: true },
        bind_address: "127.0.0.1:0".to_string(),
        gpio_root: dir.path().to_path_buf(),
        protocol: fast_protocol(),
        ..Default::default()
    };

    let server = Server::bind(config).unwrap();

    assert_eq!(server.local_addr().ip().to_string(), "127.0.0.1");
}

#[tokio::test]
async fn create_keyfile_creates_missing_source() {
    let dir = tempfile::tempdir().unwrap();
    fake_gpio(dir.path(), &[17, 27]);
    let keyfile = dir.path().join("keys");

    let config = ServerConfig {
        keyfile: keyfile.clone(),
        credentials: LoadPolicy { create_missing: true, fallback_to_empty: false },
        bind_address: "127.0.0.1:0".to_string(),
        gpio_root: dir.path().to_path_buf(),
        protocol: fast_protocol(),
        ..Default::default()
    };

    Server::bind(config).unwrap();

    assert!(keyfile.exists());
}

#[tokio::test]
async fn stream_attempt_with_trusted_secret_is_granted() {
    let protocol = ChallengeProtocol::new(fast_protocol()).unwrap();
    let store = CredentialStore::from_credentials([Credential::new("alpha")]);
    let env = SystemEnv::new().unwrap();
    let mut listener = StreamListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let client = tokio::spawn(answer(addr, "alpha"));
    let mut conn = listener.accept().await.unwrap();
    let outcome = protocol.run_attempt(&mut conn, &store, &env).await;

    assert_eq!(outcome, VerificationOutcome::Granted);
    assert!(client.await.unwrap().is_empty());
}

#[tokio::test]
async fn stream_attempt_with_unknown_secret_is_denied() {
    let protocol = ChallengeProtocol::new(fast_protocol()).unwrap();
    let store = CredentialStore::from_credentials([Credential::new("alpha")]);
    let env = SystemEnv::new().unwrap();
    let mut listener = StreamListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let client = tokio::spawn(answer(addr, "mallory"));
    let mut conn = listener.accept().await.unwrap();
    let outcome = protocol.run_attempt(&mut conn, &store, &env).await;

    assert_eq!(outcome, VerificationOutcome::Denied);
    client.await.unwrap();
}

#[tokio::test]
async fn daemon_serves_and_releases_relay_on_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    fake_gpio(dir.path(), &[17, 27]);
    let keyfile = dir.path().join("keys");
    fs::write(&keyfile, "alpha\n").unwrap();

    let config = ServerConfig {
        keyfile,
        bind_address: "127.0.0.1:0".to_string(),
        gpio_root: dir.path().to_path_buf(),
        protocol: fast_protocol(),
        ..Default::default()
    };
    let server = Server::bind(config).unwrap();
    let addr = server.local_addr();

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let phone = async move {
        answer(addr, "alpha").await;
        // Let the pulse complete before stopping.
        tokio::time::sleep(Duration::from_millis(800)).await;
        stop_tx.send(()).unwrap();
    };
    let daemon = server.run_until(async {
        let _ = stop_rx.await;
    });

    let (result, ()) = tokio::join!(daemon, phone);
    result.unwrap();

    let relay = fs::read_to_string(dir.path().join("gpio17/value")).unwrap();
    assert_eq!(relay, "1", "relay rests high");
}
