// SPDX-FileCopyrightText: 2026 Latchkey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the latchkey credential vault.

use std::path::PathBuf;

use thiserror::Error;

/// The primary error type returned by every vault operation.
///
/// Variants map one-to-one onto an outcome the caller must act on; nothing
/// in the vault swallows a cryptographic or I/O failure.
#[derive(Debug, Error)]
pub enum LatchkeyError {
    /// No removable volume is mounted. Startup cannot proceed.
    #[error("no removable volume detected -- insert the drive that holds the vault key")]
    NoRemovableVolume,

    /// The key file is missing but sealed records exist. Generating a new key
    /// would destroy them, so the operator has to confirm first.
    #[error(
        "no key found on {volume} but the credential file holds records; \
         regenerating the key erases every stored credential"
    )]
    KeyMissingConfirmRequired { volume: PathBuf },

    /// Whole-file decryption failed: wrong key or corrupted credential file.
    #[error("decryption failed: {0}")]
    DecryptionFailure(String),

    /// A single row could not be decrypted. Listing continues without it.
    #[error("could not decrypt the record for `{site}`")]
    RowDecryptionFailure { site: String },

    /// The gate refused the unlock attempt. The session stays locked.
    #[error("access denied: {method} unlock was not accepted")]
    AccessDenied {
        method: crate::types::UnlockMethod,
    },

    /// Passphrase and its confirmation differ. Nothing was changed.
    #[error("passphrases do not match")]
    PassphraseMismatch,

    /// The removable volume rejected a write (read-only, full, or unplugged).
    #[error("cannot write to removable volume at {path}: {source}")]
    VolumeWriteFailure {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Local filesystem errors outside the removable volume.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A persisted artifact exists but is not in any recognised format.
    #[error("corrupt file: {0}")]
    CorruptFile(String),

    /// Low-level primitive failures (RNG, key construction, KDF parameters).
    #[error("crypto error: {0}")]
    Crypto(String),

    /// Something that must be created once already exists.
    #[error("already initialized: {0}")]
    AlreadyInitialized(String),

    /// Something the operation depends on has not been set up yet.
    #[error("not initialized: {0}")]
    NotInitialized(String),

    /// The session is not in a state that permits the operation.
    #[error("cannot {operation} while the vault is {state}")]
    InvalidState {
        operation: &'static str,
        state: crate::types::SessionState,
    },

    /// The biometric capability failed outright (device busy, helper crashed).
    #[error("biometric error: {0}")]
    Biometric(String),

    /// Configuration errors surfaced outside the config crate's diagnostics.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl LatchkeyError {
    /// Build an [`LatchkeyError::Io`] for `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the operator can retry (same or other gate) without restarting.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::KeyMissingConfirmRequired { .. }
                | Self::RowDecryptionFailure { .. }
                | Self::AccessDenied { .. }
                | Self::PassphraseMismatch
                | Self::InvalidState { .. }
        )
    }

    /// Whether a failed biometric attempt still leaves the passphrase gate
    /// usable. Only damage to the key, the credential file, or the volume
    /// rules it out.
    pub fn permits_passphrase_fallback(&self) -> bool {
        !matches!(
            self,
            Self::NoRemovableVolume
                | Self::DecryptionFailure(_)
                | Self::CorruptFile(_)
                | Self::VolumeWriteFailure { .. }
                | Self::Io { .. }
        )
    }
}
