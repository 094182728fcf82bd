// SPDX-FileCopyrightText: 2026 Latchkey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as non-empty file names, relative key paths, and KDF cost floors.

use std::path::Path;

use crate::diagnostic::ConfigError;
use crate::model::LatchkeyConfig;

/// Lowest Argon2id memory cost accepted (32 MiB).
pub const MIN_KDF_MEMORY_COST: u32 = 32768;

/// Lowest Argon2id iteration count accepted.
pub const MIN_KDF_ITERATIONS: u32 = 2;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &LatchkeyConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let file_names = [
        ("vault.data_dir", &config.vault.data_dir),
        ("vault.credential_file", &config.vault.credential_file),
        ("vault.master_hash_file", &config.vault.master_hash_file),
        ("vault.key_file_name", &config.vault.key_file_name),
        ("biometric.identity_template", &config.biometric.identity_template),
        ("biometric.username_file", &config.biometric.username_file),
    ];
    for (key, value) in file_names {
        if value.trim().is_empty() {
            errors.push(ConfigError::validation(format!("{key} must not be empty")));
        }
    }

    // The key file lives on the volume; an absolute path would escape it.
    if Path::new(&config.vault.key_file_name).is_absolute() {
        errors.push(ConfigError::validation(format!(
            "vault.key_file_name must be relative to the volume root, got `{}`",
            config.vault.key_file_name
        )));
    }

    if config.vault.credential_file == config.vault.master_hash_file {
        errors.push(ConfigError::validation(
            "vault.credential_file and vault.master_hash_file must differ",
        ));
    }

    if config.vault.kdf_memory_cost < MIN_KDF_MEMORY_COST {
        errors.push(ConfigError::validation(format!(
            "vault.kdf_memory_cost must be at least {MIN_KDF_MEMORY_COST} (32 MiB), got {}",
            config.vault.kdf_memory_cost
        )));
    }

    if config.vault.kdf_iterations < MIN_KDF_ITERATIONS {
        errors.push(ConfigError::validation(format!(
            "vault.kdf_iterations must be at least {MIN_KDF_ITERATIONS}, got {}",
            config.vault.kdf_iterations
        )));
    }

    if config.vault.kdf_parallelism < 1 {
        errors.push(ConfigError::validation(format!(
            "vault.kdf_parallelism must be at least 1, got {}",
            config.vault.kdf_parallelism
        )));
    }

    if config.biometric.stabilization_secs < 1 {
        errors.push(ConfigError::validation(
            "biometric.stabilization_secs must be at least 1",
        ));
    }

    if config.biometric.enrollment_samples < 1 {
        errors.push(ConfigError::validation(
            "biometric.enrollment_samples must be at least 1",
        ));
    }

    if config.clipboard.clear_after_secs < 1 {
        errors.push(ConfigError::validation(
            "clipboard.clear_after_secs must be at least 1",
        ));
    }

    let level = config.log.level.to_ascii_lowercase();
    if !["trace", "debug", "info", "warn", "error"].contains(&level.as_str()) {
        errors.push(ConfigError::validation(format!(
            "log.level must be one of trace, debug, info, warn, error; got `{}`",
            config.log.level
        )));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
