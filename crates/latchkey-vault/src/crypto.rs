// SPDX-FileCopyrightText: 2026 Latchkey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Low-level AES-256-GCM seal/open operations.
//!
//! Two envelopes are built on top of the raw primitive:
//! - field tokens: `base64url(nonce || ciphertext || tag)`, one per CSV cell;
//! - sealed blobs: `SEAL_MAGIC || nonce || ciphertext || tag`, the whole file.
//!
//! Every call to [`seal`] generates a fresh random 96-bit nonce via the system
//! CSPRNG. Nonce reuse would be catastrophic for GCM security.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use latchkey_core::LatchkeyError;
use ring::aead::{AES_256_GCM, Aad, LessSafeKey, Nonce, UnboundKey};
use ring::rand::{SecureRandom, SystemRandom};

/// Length of the AES-256 key in bytes.
pub const KEY_LEN: usize = 32;

/// Length of the GCM nonce in bytes.
pub const NONCE_LEN: usize = 12;

/// Length of the GCM authentication tag in bytes.
pub const TAG_LEN: usize = 16;

/// Prefix identifying a whole-file sealed credential table.
pub const SEAL_MAGIC: &[u8; 8] = b"LKSEALv1";

/// Encrypt plaintext with AES-256-GCM using a random 96-bit nonce.
///
/// Returns `(ciphertext_with_tag, nonce_bytes)`.
pub fn seal(key: &[u8; KEY_LEN], plaintext: &[u8]) -> Result<(Vec<u8>, [u8; NONCE_LEN]), LatchkeyError> {
    let less_safe = aead_key(key)?;

    let rng = SystemRandom::new();
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rng.fill(&mut nonce_bytes)
        .map_err(|_| LatchkeyError::Crypto("failed to generate random nonce".to_string()))?;

    let nonce = Nonce::assume_unique_for_key(nonce_bytes);

    // Seal in place: plaintext buffer is extended with the authentication tag.
    let mut in_out = plaintext.to_vec();
    less_safe
        .seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)
        .map_err(|_| LatchkeyError::Crypto("AES-256-GCM encryption failed".to_string()))?;

    Ok((in_out, nonce_bytes))
}

/// Decrypt ciphertext with AES-256-GCM.
///
/// `ciphertext` must include the 16-byte authentication tag appended by [`seal`].
/// A wrong key or tampered data yields [`LatchkeyError::DecryptionFailure`].
pub fn open(
    key: &[u8; KEY_LEN],
    nonce_bytes: &[u8; NONCE_LEN],
    ciphertext: &[u8],
) -> Result<Vec<u8>, LatchkeyError> {
    let less_safe = aead_key(key)?;
    let nonce = Nonce::assume_unique_for_key(*nonce_bytes);

    let mut in_out = ciphertext.to_vec();
    let plaintext = less_safe
        .open_in_place(nonce, Aad::empty(), &mut in_out)
        .map_err(|_| {
            LatchkeyError::DecryptionFailure("wrong key or corrupted data".to_string())
        })?;

    Ok(plaintext.to_vec())
}

fn aead_key(key: &[u8; KEY_LEN]) -> Result<LessSafeKey, LatchkeyError> {
    let unbound = UnboundKey::new(&AES_256_GCM, key)
        .map_err(|_| LatchkeyError::Crypto("failed to create AES-256-GCM key".to_string()))?;
    Ok(LessSafeKey::new(unbound))
}

/// Generate a random 32-byte key suitable for AES-256-GCM.
pub fn generate_random_key() -> Result<[u8; KEY_LEN], LatchkeyError> {
    let rng = SystemRandom::new();
    let mut key = [0u8; KEY_LEN];
    rng.fill(&mut key)
        .map_err(|_| LatchkeyError::Crypto("failed to generate random key".to_string()))?;
    Ok(key)
}

/// Encrypt one table cell into a printable token.
pub fn encrypt_field(key: &[u8; KEY_LEN], plaintext: &str) -> Result<String, LatchkeyError> {
    let (ciphertext, nonce) = seal(key, plaintext.as_bytes())?;
    let mut raw = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    raw.extend_from_slice(&nonce);
    raw.extend_from_slice(&ciphertext);
    Ok(URL_SAFE_NO_PAD.encode(raw))
}

/// Decrypt a token produced by [`encrypt_field`].
pub fn decrypt_field(key: &[u8; KEY_LEN], token: &str) -> Result<String, LatchkeyError> {
    let raw = URL_SAFE_NO_PAD
        .decode(token.trim())
        .map_err(|e| LatchkeyError::DecryptionFailure(format!("field token is not base64: {e}")))?;
    let (nonce, ciphertext) = split_nonce(&raw)?;
    let plaintext = open(key, &nonce, ciphertext)?;
    String::from_utf8(plaintext).map_err(|e| {
        LatchkeyError::DecryptionFailure(format!("decrypted field is not valid UTF-8: {e}"))
    })
}

/// Encrypt a whole file body into a sealed blob.
pub fn seal_blob(key: &[u8; KEY_LEN], plaintext: &[u8]) -> Result<Vec<u8>, LatchkeyError> {
    let (ciphertext, nonce) = seal(key, plaintext)?;
    let mut blob = Vec::with_capacity(SEAL_MAGIC.len() + NONCE_LEN + ciphertext.len());
    blob.extend_from_slice(SEAL_MAGIC);
    blob.extend_from_slice(&nonce);
    blob.extend_from_slice(&ciphertext);
    Ok(blob)
}

/// Decrypt a blob produced by [`seal_blob`].
pub fn open_blob(key: &[u8; KEY_LEN], blob: &[u8]) -> Result<Vec<u8>, LatchkeyError> {
    let body = blob.strip_prefix(SEAL_MAGIC.as_slice()).ok_or_else(|| {
        LatchkeyError::DecryptionFailure("missing sealed-file header".to_string())
    })?;
    let (nonce, ciphertext) = split_nonce(body)?;
    open(key, &nonce, ciphertext)
}

/// Whether `bytes` starts with the sealed-file magic.
pub fn is_sealed_blob(bytes: &[u8]) -> bool {
    bytes.starts_with(SEAL_MAGIC)
}

fn split_nonce(raw: &[u8]) -> Result<([u8; NONCE_LEN], &[u8]), LatchkeyError> {
    if raw.len() < NONCE_LEN + TAG_LEN {
        return Err(LatchkeyError::DecryptionFailure(format!(
            "ciphertext too short ({} bytes)",
            raw.len()
        )));
    }
    let (nonce, ciphertext) = raw.split_at(NONCE_LEN);
    let mut nonce_bytes = [0u8; NONCE_LEN];
    nonce_bytes.copy_from_slice(nonce);
    Ok((nonce_bytes, ciphertext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn seal_open_roundtrip() {
        let key = generate_random_key().unwrap();
        let plaintext = b"whole credential table";

        let (ciphertext, nonce) = seal(&key, plaintext).unwrap();
        let decrypted = open(&key, &nonce, &ciphertext).unwrap();

        assert_eq!(decrypted, plaintext);
        assert_eq!(ciphertext.len(), plaintext.len() + TAG_LEN);
    }

    #[test]
    fn same_field_encrypts_differently_each_time() {
        let key = generate_random_key().unwrap();

        let t1 = encrypt_field(&key, "alice").unwrap();
        let t2 = encrypt_field(&key, "alice").unwrap();

        // Random nonces: equal usernames must not be linkable in the table.
        assert_ne!(t1, t2);
    }

    #[test]
    fn field_under_wrong_key_is_decryption_failure() {
        let key1 = generate_random_key().unwrap();
        let key2 = generate_random_key().unwrap();

        let token = encrypt_field(&key1, "p@ss").unwrap();
        let err = decrypt_field(&key2, &token).unwrap_err();

        assert!(matches!(err, LatchkeyError::DecryptionFailure(_)));
    }

    #[test]
    fn tokens_are_csv_safe() {
        let key = generate_random_key().unwrap();
        let token = encrypt_field(&key, "a,b\"c\nd").unwrap();
        assert!(
            token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn garbage_token_is_decryption_failure() {
        let key = generate_random_key().unwrap();
        assert!(matches!(
            decrypt_field(&key, "not a token!"),
            Err(LatchkeyError::DecryptionFailure(_))
        ));
        assert!(matches!(
            decrypt_field(&key, "AAAA"),
            Err(LatchkeyError::DecryptionFailure(_))
        ));
    }

    #[test]
    fn sealed_blob_carries_magic_and_roundtrips() {
        let key = generate_random_key().unwrap();
        let body = b"site,username,password\n";

        let blob = seal_blob(&key, body).unwrap();
        assert!(is_sealed_blob(&blob));
        assert!(!blob.windows(4).any(|w| w == b"site"));
        assert_eq!(open_blob(&key, &blob).unwrap(), body);
    }

    #[test]
    fn tampered_blob_fails() {
        let key = generate_random_key().unwrap();
        let mut blob = seal_blob(&key, b"site,username,password\n").unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0x01;

        assert!(matches!(
            open_blob(&key, &blob),
            Err(LatchkeyError::DecryptionFailure(_))
        ));
    }

    #[test]
    fn blob_without_magic_is_rejected() {
        let key = generate_random_key().unwrap();
        assert!(open_blob(&key, b"site,username,password\n").is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn field_roundtrip_for_any_string(value in ".*") {
            let key = generate_random_key().unwrap();
            let token = encrypt_field(&key, &value).unwrap();
            prop_assert_eq!(decrypt_field(&key, &token).unwrap(), value);
        }
    }
}
