// SPDX-FileCopyrightText: 2026 Latchkey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Removable-key credential vault.
//!
//! The AES-256-GCM key lives on a removable volume. Credentials are stored
//! in a CSV table whose username and password cells are individually
//! encrypted, and the whole table is encrypted again whenever the vault is
//! closed. A session is unlocked by the master passphrase (Argon2id hash on
//! the local disk) or by sustained biometric recognition.

pub mod biometric;
pub mod clipboard;
pub mod crypto;
pub mod identity;
pub mod kdf;
pub mod keystore;
pub mod master;
pub mod paths;
pub mod prompt;
pub mod records;
pub mod session;
pub mod volumes;

pub use biometric::{Clock, SustainedMatchGate, SystemClock};
pub use clipboard::{ClearHandle, SecureClipboard, schedule_clear};
pub use identity::{IdentityMarker, enroll_operator};
pub use kdf::KdfParams;
pub use keystore::{KeyMaterial, KeyMaterialStore, KeyProvisioning, KeyStatus};
pub use master::MasterCredentialGate;
pub use paths::VaultPaths;
pub use prompt::{read_new_passphrase, read_new_passphrase_pair, read_passphrase};
pub use records::{
    CredentialRecord, CredentialTable, Credentials, DECRYPT_ERROR_PLACEHOLDER, DecryptedRow,
    EncryptedRecordStore, TableFileState,
};
pub use session::{VaultSession, VaultStatus};
pub use volumes::SystemVolumeProbe;
