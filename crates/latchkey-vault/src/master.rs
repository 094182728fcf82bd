// SPDX-FileCopyrightText: 2026 Latchkey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Master passphrase hash, stored locally as one line of hex.
//!
//! Line layout: `m_cost(u32 BE) || t_cost(u32 BE) || p(u32 BE) || salt(16) || hash(32)`.
//! Storing the cost alongside the hash keeps existing installs valid when
//! the configured cost changes.

use std::path::{Path, PathBuf};

use latchkey_core::LatchkeyError;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::kdf::{self, HASH_LEN, KdfParams, SALT_LEN};
use crate::paths::write_atomic;

const PARAMS_LEN: usize = 12;
const RECORD_LEN: usize = PARAMS_LEN + SALT_LEN + HASH_LEN;
/// Unsalted SHA-256 written by older installs.
const LEGACY_HEX_LEN: usize = 64;

/// Parsed contents of the master hash file.
#[derive(Debug, PartialEq, Eq)]
enum StoredHash {
    Argon2id {
        params: KdfParams,
        salt: [u8; SALT_LEN],
        hash: [u8; HASH_LEN],
    },
    LegacySha256([u8; HASH_LEN]),
}

impl StoredHash {
    fn compute(passphrase: &SecretString, params: KdfParams) -> Result<Self, LatchkeyError> {
        let salt = kdf::generate_salt()?;
        let hash = kdf::derive_key(passphrase.expose_secret().as_bytes(), &salt, params)?;
        Ok(Self::Argon2id {
            params,
            salt,
            hash: *hash,
        })
    }

    fn matches(&self, passphrase: &SecretString) -> Result<bool, LatchkeyError> {
        let secret = passphrase.expose_secret().as_bytes();
        match self {
            Self::Argon2id { params, salt, hash } => {
                let candidate = kdf::derive_key(secret, salt, *params)?;
                Ok(kdf::constant_time_eq(&candidate[..], hash))
            }
            Self::LegacySha256(digest) => {
                let candidate = Sha256::digest(secret);
                Ok(kdf::constant_time_eq(candidate.as_slice(), digest))
            }
        }
    }

    fn encode(&self) -> String {
        match self {
            Self::Argon2id { params, salt, hash } => {
                let mut raw = Vec::with_capacity(RECORD_LEN);
                raw.extend_from_slice(&params.memory_cost.to_be_bytes());
                raw.extend_from_slice(&params.iterations.to_be_bytes());
                raw.extend_from_slice(&params.parallelism.to_be_bytes());
                raw.extend_from_slice(salt);
                raw.extend_from_slice(hash);
                hex::encode(raw)
            }
            Self::LegacySha256(digest) => hex::encode(digest),
        }
    }

    fn decode(line: &str) -> Result<Self, LatchkeyError> {
        let line = line.trim();
        let raw = hex::decode(line)
            .map_err(|e| LatchkeyError::CorruptFile(format!("master hash is not hex: {e}")))?;

        if line.len() == LEGACY_HEX_LEN {
            let mut digest = [0u8; HASH_LEN];
            digest.copy_from_slice(&raw);
            return Ok(Self::LegacySha256(digest));
        }
        if raw.len() != RECORD_LEN {
            return Err(LatchkeyError::CorruptFile(format!(
                "master hash has unexpected length {} (expected {} hex characters)",
                line.len(),
                RECORD_LEN * 2
            )));
        }

        let word = |i: usize| {
            let mut b = [0u8; 4];
            b.copy_from_slice(&raw[i * 4..i * 4 + 4]);
            u32::from_be_bytes(b)
        };
        let params = KdfParams {
            memory_cost: word(0),
            iterations: word(1),
            parallelism: word(2),
        };
        let mut salt = [0u8; SALT_LEN];
        salt.copy_from_slice(&raw[PARAMS_LEN..PARAMS_LEN + SALT_LEN]);
        let mut hash = [0u8; HASH_LEN];
        hash.copy_from_slice(&raw[PARAMS_LEN + SALT_LEN..]);
        Ok(Self::Argon2id { params, salt, hash })
    }
}

/// Creates, checks, and rotates the master passphrase hash.
#[derive(Debug, Clone)]
pub struct MasterCredentialGate {
    path: PathBuf,
    params: KdfParams,
}

impl MasterCredentialGate {
    /// `params` is the cost used for newly written hashes.
    pub fn new(path: impl Into<PathBuf>, params: KdfParams) -> Self {
        Self {
            path: path.into(),
            params,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a non-empty hash file exists.
    pub fn is_initialized(&self) -> bool {
        std::fs::metadata(&self.path)
            .map(|m| m.is_file() && m.len() > 0)
            .unwrap_or(false)
    }

    /// Store the first passphrase. Refuses to overwrite; use [`rotate`](Self::rotate).
    pub fn initialize(&self, passphrase: &SecretString) -> Result<(), LatchkeyError> {
        if self.is_initialized() {
            return Err(LatchkeyError::AlreadyInitialized(format!(
                "master passphrase already set at {}",
                self.path.display()
            )));
        }
        self.write(&StoredHash::compute(passphrase, self.params)?)?;
        info!(path = %self.path.display(), "master passphrase initialized");
        Ok(())
    }

    /// Check `passphrase` against the stored hash.
    ///
    /// Returns `false` when no hash has been stored. A matching legacy hash is
    /// rewritten in the current format.
    pub fn validate(&self, passphrase: &SecretString) -> Result<bool, LatchkeyError> {
        let Some(stored) = self.read()? else {
            warn!(path = %self.path.display(), "no master passphrase set");
            return Ok(false);
        };

        let ok = stored.matches(passphrase)?;
        if ok && matches!(stored, StoredHash::LegacySha256(_)) {
            match StoredHash::compute(passphrase, self.params).and_then(|h| self.write(&h)) {
                Ok(()) => info!("upgraded legacy master hash to Argon2id"),
                Err(e) => warn!(error = %e, "could not upgrade legacy master hash"),
            }
        }
        Ok(ok)
    }

    /// Replace the stored hash. On mismatch nothing is written.
    ///
    /// The hash file lives in the local data directory, not on the removable
    /// volume, so a failed write surfaces as [`LatchkeyError::Io`].
    pub fn rotate(
        &self,
        new_passphrase: &SecretString,
        confirmation: &SecretString,
    ) -> Result<(), LatchkeyError> {
        let a = new_passphrase.expose_secret().as_bytes();
        let b = confirmation.expose_secret().as_bytes();
        if !kdf::constant_time_eq(a, b) {
            return Err(LatchkeyError::PassphraseMismatch);
        }
        self.write(&StoredHash::compute(new_passphrase, self.params)?)?;
        info!(path = %self.path.display(), "master passphrase rotated");
        Ok(())
    }

    fn read(&self) -> Result<Option<StoredHash>, LatchkeyError> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) if text.trim().is_empty() => Ok(None),
            Ok(text) => StoredHash::decode(&text).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(LatchkeyError::io(&self.path, e)),
        }
    }

    fn write(&self, stored: &StoredHash) -> Result<(), LatchkeyError> {
        let line = format!("{}\n", stored.encode());
        write_atomic(&self.path, line.as_bytes()).map_err(|e| LatchkeyError::io(&self.path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kdf::test_params;

    fn secret(s: &str) -> SecretString {
        SecretString::from(s.to_string())
    }

    fn gate(dir: &tempfile::TempDir) -> MasterCredentialGate {
        MasterCredentialGate::new(dir.path().join("master.key"), test_params())
    }

    #[test]
    fn initialize_then_validate() {
        let dir = tempfile::tempdir().unwrap();
        let gate = gate(&dir);
        assert!(!gate.is_initialized());
        assert!(!gate.validate(&secret("anything")).unwrap());

        gate.initialize(&secret("correct horse")).unwrap();

        assert!(gate.is_initialized());
        assert!(gate.validate(&secret("correct horse")).unwrap());
        assert!(!gate.validate(&secret("wrong horse")).unwrap());

        let line = std::fs::read_to_string(gate.path()).unwrap();
        assert_eq!(line.trim().len(), RECORD_LEN * 2);
        assert!(!line.contains("correct"));
    }

    #[test]
    fn initialize_twice_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let gate = gate(&dir);
        gate.initialize(&secret("one")).unwrap();
        assert!(matches!(
            gate.initialize(&secret("two")),
            Err(LatchkeyError::AlreadyInitialized(_))
        ));
        assert!(gate.validate(&secret("one")).unwrap());
    }

    #[test]
    fn rotation_with_mismatch_keeps_old_passphrase() {
        let dir = tempfile::tempdir().unwrap();
        let gate = gate(&dir);
        gate.initialize(&secret("old")).unwrap();
        let before = std::fs::read(gate.path()).unwrap();

        let err = gate.rotate(&secret("new"), &secret("neww")).unwrap_err();

        assert!(matches!(err, LatchkeyError::PassphraseMismatch));
        assert_eq!(std::fs::read(gate.path()).unwrap(), before);
        assert!(gate.validate(&secret("old")).unwrap());
        assert!(!gate.validate(&secret("new")).unwrap());
    }

    #[test]
    fn rotation_replaces_passphrase() {
        let dir = tempfile::tempdir().unwrap();
        let gate = gate(&dir);
        gate.initialize(&secret("old")).unwrap();

        gate.rotate(&secret("new"), &secret("new")).unwrap();

        assert!(gate.validate(&secret("new")).unwrap());
        assert!(!gate.validate(&secret("old")).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn rotation_write_failure_is_local_io() {
        let dir = tempfile::tempdir().unwrap();
        let blocked = dir.path().join("master.key");
        std::fs::create_dir(&blocked).unwrap();
        let gate = MasterCredentialGate::new(&blocked, test_params());

        let err = gate.rotate(&secret("new"), &secret("new")).unwrap_err();
        assert!(matches!(err, LatchkeyError::Io { ref path, .. } if path == &blocked));
    }

    #[test]
    fn stored_cost_survives_config_change() {
        let dir = tempfile::tempdir().unwrap();
        gate(&dir).initialize(&secret("pw")).unwrap();

        let stricter = MasterCredentialGate::new(
            dir.path().join("master.key"),
            KdfParams {
                memory_cost: 65536,
                iterations: 3,
                parallelism: 2,
            },
        );
        assert!(stricter.validate(&secret("pw")).unwrap());
    }

    #[test]
    fn legacy_hash_is_upgraded_after_match() {
        let dir = tempfile::tempdir().unwrap();
        let gate = gate(&dir);
        std::fs::write(gate.path(), format!("{}\n", hex::encode(Sha256::digest(b"legacy")))).unwrap();

        assert!(!gate.validate(&secret("nope")).unwrap());
        assert_eq!(std::fs::read_to_string(gate.path()).unwrap().trim().len(), LEGACY_HEX_LEN);

        assert!(gate.validate(&secret("legacy")).unwrap());
        assert_eq!(
            std::fs::read_to_string(gate.path()).unwrap().trim().len(),
            RECORD_LEN * 2
        );
        assert!(gate.validate(&secret("legacy")).unwrap());
    }

    #[test]
    fn garbage_hash_file_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let gate = gate(&dir);
        std::fs::write(gate.path(), "abc123\n").unwrap();
        assert!(matches!(
            gate.validate(&secret("x")),
            Err(LatchkeyError::CorruptFile(_))
        ));
    }
}
