// SPDX-FileCopyrightText: 2026 Latchkey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for latchkey.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level latchkey configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LatchkeyConfig {
    /// Credential file, master hash, and key derivation settings.
    #[serde(default)]
    pub vault: VaultConfig,

    /// Removable volume selection.
    #[serde(default)]
    pub volumes: VolumesConfig,

    /// Face-recognition unlock settings.
    #[serde(default)]
    pub biometric: BiometricConfig,

    /// Clipboard copy and auto-clear settings.
    #[serde(default)]
    pub clipboard: ClipboardConfig,

    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,
}

/// Credential vault configuration.
///
/// File names are resolved against `data_dir`, except `key_file_name`, which
/// is resolved against the root of the selected removable volume.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VaultConfig {
    /// Local directory holding the credential table, master hash, and
    /// biometric artifacts.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Credential table file name.
    #[serde(default = "default_credential_file")]
    pub credential_file: String,

    /// Master passphrase hash file name.
    #[serde(default = "default_master_hash_file")]
    pub master_hash_file: String,

    /// Key file path relative to the removable volume root.
    #[serde(default = "default_key_file_name")]
    pub key_file_name: String,

    /// Argon2id memory cost in KiB (default: 65536 = 64 MiB).
    #[serde(default = "default_kdf_memory_cost")]
    pub kdf_memory_cost: u32,

    /// Argon2id iteration count (default: 3).
    #[serde(default = "default_kdf_iterations")]
    pub kdf_iterations: u32,

    /// Argon2id parallelism lanes (default: 4).
    #[serde(default = "default_kdf_parallelism")]
    pub kdf_parallelism: u32,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            credential_file: default_credential_file(),
            master_hash_file: default_master_hash_file(),
            key_file_name: default_key_file_name(),
            kdf_memory_cost: default_kdf_memory_cost(),
            kdf_iterations: default_kdf_iterations(),
            kdf_parallelism: default_kdf_parallelism(),
        }
    }
}

impl VaultConfig {
    /// Absolute path of the credential table.
    pub fn credential_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join(&self.credential_file)
    }

    /// Absolute path of the master hash file.
    pub fn master_hash_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join(&self.master_hash_file)
    }
}

fn default_data_dir() -> String {
    dirs::data_dir()
        .map(|p| p.join("latchkey"))
        .unwrap_or_else(|| PathBuf::from(".latchkey"))
        .to_string_lossy()
        .into_owned()
}

fn default_credential_file() -> String {
    "passwords.csv".to_string()
}

fn default_master_hash_file() -> String {
    "master.key".to_string()
}

fn default_key_file_name() -> String {
    "latchkey.key".to_string()
}

fn default_kdf_memory_cost() -> u32 {
    65536 // 64 MiB per OWASP recommendation
}

fn default_kdf_iterations() -> u32 {
    3
}

fn default_kdf_parallelism() -> u32 {
    4
}

/// Removable volume selection.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VolumesConfig {
    /// Also accept fixed (non-removable) disks. Only useful for testing on
    /// machines without a spare drive.
    #[serde(default)]
    pub allow_fixed: bool,

    /// Mount point to prefer when several removable volumes are present.
    #[serde(default)]
    pub preferred_mount: Option<String>,
}

/// Face-recognition unlock configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BiometricConfig {
    /// Offer biometric unlock at all.
    #[serde(default = "default_biometric_enabled")]
    pub enabled: bool,

    /// Trained template location, relative to `vault.data_dir`.
    #[serde(default = "default_identity_template")]
    pub identity_template: String,

    /// Enrolled operator name file, relative to `vault.data_dir`.
    #[serde(default = "default_username_file")]
    pub username_file: String,

    /// Seconds of unbroken recognition required before accepting.
    #[serde(default = "default_stabilization_secs")]
    pub stabilization_secs: u64,

    /// Face samples captured per enrollment.
    #[serde(default = "default_enrollment_samples")]
    pub enrollment_samples: u32,

    /// External helper that drives the camera and prints one verdict per
    /// frame (`match`, `nomatch`, `noface`, `cancel`).
    #[serde(default)]
    pub verifier_command: Option<String>,
}

impl Default for BiometricConfig {
    fn default() -> Self {
        Self {
            enabled: default_biometric_enabled(),
            identity_template: default_identity_template(),
            username_file: default_username_file(),
            stabilization_secs: default_stabilization_secs(),
            enrollment_samples: default_enrollment_samples(),
            verifier_command: None,
        }
    }
}

fn default_biometric_enabled() -> bool {
    true
}

fn default_identity_template() -> String {
    "trainer/trainer.yml".to_string()
}

fn default_username_file() -> String {
    "username.dat".to_string()
}

fn default_stabilization_secs() -> u64 {
    3
}

fn default_enrollment_samples() -> u32 {
    50
}

/// Clipboard configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ClipboardConfig {
    /// Seconds after a copy before the clipboard is emptied.
    #[serde(default = "default_clear_after_secs")]
    pub clear_after_secs: u64,

    /// Command that reads the new clipboard contents on stdin
    /// (e.g. `wl-copy`, `xclip -selection clipboard`, `pbcopy`).
    #[serde(default)]
    pub copy_command: Option<String>,
}

impl Default for ClipboardConfig {
    fn default() -> Self {
        Self {
            clear_after_secs: default_clear_after_secs(),
            copy_command: None,
        }
    }
}

fn default_clear_after_secs() -> u64 {
    15
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
