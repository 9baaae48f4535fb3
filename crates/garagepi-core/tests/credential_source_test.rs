//! Credential source loading tests.

use std::io::Write;

use garagepi_core::{ConfigurationError, CredentialStore, LoadPolicy, RejectReason};

#[test]
fn load_reads_trimmed_credentials() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "  alpha").unwrap();
    writeln!(file).unwrap();
    writeln!(file, "beta  ").unwrap();

    let store = CredentialStore::load(file.path(), LoadPolicy::default()).unwrap();

    assert_eq!(store.len(), 2);
    assert!(store.rejected().is_empty());
}

#[test]
fn load_records_rejected_lines() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"alpha\nbad\x1bline\n").unwrap();

    let store = CredentialStore::load(file.path(), LoadPolicy::default()).unwrap();

    assert_eq!(store.len(), 1);
    assert_eq!(store.rejected().len(), 1);
    assert_eq!(store.rejected()[0].line, 2);
    assert_eq!(store.rejected()[0].reason, RejectReason::ControlCharacter);
}

#[test]
fn missing_source_is_permission_failure_without_policy() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keys");

    let err = CredentialStore::load(&path, LoadPolicy::default()).unwrap_err();

    assert!(err.is_permission_class());
    assert!(matches!(err, ConfigurationError::Unusable { .. }));
    assert!(!path.exists());
}

#[test]
fn create_missing_creates_empty_source() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keys");
    let policy = LoadPolicy { create_missing: true, fallback_to_empty: false };

    let store = CredentialStore::load(&path, policy).unwrap();

    assert!(store.is_empty());
    assert!(path.exists());
}

#[test]
fn create_missing_keeps_existing_contents() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "alpha").unwrap();
    let policy = LoadPolicy { create_missing: true, fallback_to_empty: false };

    let store = CredentialStore::load(file.path(), policy).unwrap();

    assert_eq!(store.len(), 1);
}

#[test]
fn unusable_source_falls_back_when_configured() {
    let dir = tempfile::tempdir().unwrap();
    // A directory cannot be read as a credential source.
    let policy = LoadPolicy { create_missing: false, fallback_to_empty: true };

    let store = CredentialStore::load(dir.path(), policy).unwrap();

    assert!(store.is_empty());
}
