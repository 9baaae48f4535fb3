//! Trusted credential set.
//!
//! The store is loaded once at startup from a flat text source (one secret per
//! line) and is read-only afterwards. Replacing it requires a restart.
//!
//! ## Source format
//!
//! - Leading and trailing whitespace is trimmed per line
//! - Empty lines are skipped
//! - Malformed lines (invalid UTF-8, control characters, longer than
//!   [`MAX_CREDENTIAL_LEN`]) are skipped and recorded in
//!   [`CredentialStore::rejected`], never silently dropped
//!
//! Secrets never appear in `Debug` output or log lines.

use std::{
    fmt,
    fs::{File, OpenOptions},
    io::{BufRead, BufReader},
    path::Path,
};

use zeroize::Zeroizing;

use crate::{
    error::ConfigurationError,
    protocol::{Challenge, ChallengeProtocol},
};

/// Longest accepted credential, in bytes after trimming.
pub const MAX_CREDENTIAL_LEN: usize = 1024;

/// A trusted secret. Wiped from memory on drop.
#[derive(Clone)]
pub struct Credential(Zeroizing<Vec<u8>>);

impl Credential {
    /// Wrap secret bytes.
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self(Zeroizing::new(secret.into()))
    }

    /// Raw secret bytes, for proof derivation only.
    pub fn expose(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Why a source line was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Line is not valid UTF-8.
    InvalidUtf8,
    /// Line contains a control character after trimming.
    ControlCharacter,
    /// Line exceeds [`MAX_CREDENTIAL_LEN`].
    TooLong {
        /// Trimmed length in bytes.
        len: usize,
    },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidUtf8 => f.write_str("not valid UTF-8"),
            Self::ControlCharacter => f.write_str("contains control characters"),
            Self::TooLong { len } => {
                write!(f, "{len} bytes exceeds limit of {MAX_CREDENTIAL_LEN}")
            },
        }
    }
}

/// A skipped source line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RejectedLine {
    /// 1-based line number in the source.
    pub line: usize,
    /// Why it was skipped.
    pub reason: RejectReason,
}

/// How to treat a credential source that cannot be used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadPolicy {
    /// Create an empty source when none exists.
    pub create_missing: bool,
    /// Yield an empty store instead of failing. Every challenge attempt is
    /// then denied.
    pub fallback_to_empty: bool,
}

/// The set of trusted credentials.
#[derive(Debug, Default)]
pub struct CredentialStore {
    credentials: Vec<Credential>,
    rejected: Vec<RejectedLine>,
}

impl CredentialStore {
    /// A store that trusts nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a store from already-validated credentials.
    pub fn from_credentials(credentials: impl IntoIterator<Item = Credential>) -> Self {
        Self { credentials: credentials.into_iter().collect(), rejected: Vec::new() }
    }

    /// Parse a line-oriented credential source.
    pub fn parse<R: BufRead>(mut reader: R) -> Result<Self, ConfigurationError> {
        let mut store = Self::empty();
        let mut raw = Zeroizing::new(Vec::new());
        let mut line = 0;

        loop {
            raw.clear();
            line += 1;
            let read = reader
                .read_until(b'\n', &mut raw)
                .map_err(|source| ConfigurationError::Read { line, source })?;
            if read == 0 {
                break;
            }

            match parse_line(&raw) {
                Ok(Some(credential)) => store.credentials.push(credential),
                Ok(None) => {},
                Err(reason) => {
                    tracing::warn!(line, %reason, "skipping malformed credential line");
                    store.rejected.push(RejectedLine { line, reason });
                },
            }
        }

        Ok(store)
    }

    /// Load the credential source at `path` according to `policy`.
    pub fn load(path: &Path, policy: LoadPolicy) -> Result<Self, ConfigurationError> {
        let result = open_source(path, policy.create_missing)
            .map_err(|source| ConfigurationError::Unusable { path: path.to_path_buf(), source })
            .and_then(|file| Self::parse(BufReader::new(file)));

        match result {
            Ok(store) => {
                tracing::info!(
                    path = %path.display(),
                    trusted = store.len(),
                    rejected = store.rejected.len(),
                    "credential source loaded"
                );
                Ok(store)
            },
            Err(e) if policy.fallback_to_empty => {
                tracing::warn!(error = %e, "credential source unusable, continuing with empty set");
                Ok(Self::empty())
            },
            Err(e) => Err(e),
        }
    }

    /// Returns true if `proof` answers `challenge` for any stored credential.
    ///
    /// Stops at the first match.
    pub fn is_trusted(
        &self,
        proof: &[u8],
        challenge: &Challenge,
        protocol: &ChallengeProtocol,
    ) -> bool {
        self.credentials.iter().any(|credential| protocol.matches(credential, challenge, proof))
    }

    /// Number of trusted credentials.
    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    /// Returns true if nothing is trusted.
    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    /// Lines skipped while parsing.
    pub fn rejected(&self) -> &[RejectedLine] {
        &self.rejected
    }
}

fn open_source(path: &Path, create_missing: bool) -> std::io::Result<File> {
    if create_missing {
        OpenOptions::new().read(true).append(true).create(true).open(path)
    } else {
        File::open(path)
    }
}

fn parse_line(raw: &[u8]) -> Result<Option<Credential>, RejectReason> {
    let trimmed = raw.trim_ascii();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let text = std::str::from_utf8(trimmed).map_err(|_| RejectReason::InvalidUtf8)?;
    if text.chars().any(char::is_control) {
        return Err(RejectReason::ControlCharacter);
    }
    if trimmed.len() > MAX_CREDENTIAL_LEN {
        return Err(RejectReason::TooLong { len: trimmed.len() });
    }
    Ok(Some(Credential::new(trimmed)))
}
