// SPDX-FileCopyrightText: 2026 Latchkey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Argon2id hashing of the master passphrase.
//!
//! Uses Argon2id (Algorithm::Argon2id, Version::V0x13) with parameters from
//! VaultConfig (OWASP-recommended defaults).

use latchkey_config::model::VaultConfig;
use latchkey_core::LatchkeyError;
use ring::rand::{SecureRandom, SystemRandom};
use zeroize::Zeroizing;

/// Salt length in bytes.
pub const SALT_LEN: usize = 16;

/// Derived hash length in bytes.
pub const HASH_LEN: usize = 32;

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub memory_cost: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl From<&VaultConfig> for KdfParams {
    fn from(config: &VaultConfig) -> Self {
        Self {
            memory_cost: config.kdf_memory_cost,
            iterations: config.kdf_iterations,
            parallelism: config.kdf_parallelism,
        }
    }
}

/// Derive a 32-byte hash from passphrase using Argon2id.
///
/// The returned bytes are wrapped in [`Zeroizing`] for automatic memory
/// zeroing on drop.
pub fn derive_key(
    passphrase: &[u8],
    salt: &[u8; SALT_LEN],
    params: KdfParams,
) -> Result<Zeroizing<[u8; HASH_LEN]>, LatchkeyError> {
    let argon_params = argon2::Params::new(
        params.memory_cost,
        params.iterations,
        params.parallelism,
        Some(HASH_LEN),
    )
    .map_err(|e| LatchkeyError::Crypto(format!("invalid Argon2id parameters: {e}")))?;

    let argon2 =
        argon2::Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, argon_params);

    let mut output = Zeroizing::new([0u8; HASH_LEN]);
    argon2
        .hash_password_into(passphrase, salt, output.as_mut())
        .map_err(|e| LatchkeyError::Crypto(format!("Argon2id key derivation failed: {e}")))?;

    Ok(output)
}

/// Generate a random 16-byte salt for Argon2id.
pub fn generate_salt() -> Result<[u8; SALT_LEN], LatchkeyError> {
    let rng = SystemRandom::new();
    let mut salt = [0u8; SALT_LEN];
    rng.fill(&mut salt)
        .map_err(|_| LatchkeyError::Crypto("failed to generate random salt".to_string()))?;
    Ok(salt)
}

/// Compare two digests without short-circuiting on the first differing byte.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
pub(crate) fn test_params() -> KdfParams {
    // Validation floor, fast enough for unit tests.
    KdfParams {
        memory_cost: 32768,
        iterations: 2,
        parallelism: 1,
    }
}
