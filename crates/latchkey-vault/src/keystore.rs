// SPDX-FileCopyrightText: 2026 Latchkey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Symmetric key material kept on removable media.
//!
//! The key never lives on the host disk. It is read from a fixed path
//! relative to the root of the selected removable volume, held in memory
//! only while a session needs it, and zeroed on drop.

use std::path::{Path, PathBuf};

use latchkey_core::{LatchkeyError, VolumePath, VolumeProbe};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::crypto::{self, KEY_LEN};
use crate::paths::write_atomic;
use crate::records::EncryptedRecordStore;

/// The 32-byte AES-256 key.
///
/// Debug output intentionally omits the key bytes.
#[derive(Clone)]
pub struct KeyMaterial(Zeroizing<[u8; KEY_LEN]>);

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("KeyMaterial").field(&"[REDACTED]").finish()
    }
}

impl KeyMaterial {
    /// Fresh random key from the system CSPRNG.
    pub fn generate() -> Result<Self, LatchkeyError> {
        let bytes = Zeroizing::new(crypto::generate_random_key()?);
        Ok(Self(bytes))
    }

    /// Parse a key file body. Anything but exactly 32 bytes is corrupt.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LatchkeyError> {
        let array: [u8; KEY_LEN] = bytes.try_into().map_err(|_| {
            LatchkeyError::CorruptFile(format!(
                "key file must be exactly {KEY_LEN} bytes, found {}",
                bytes.len()
            ))
        })?;
        Ok(Self(Zeroizing::new(array)))
    }

    pub fn expose(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

/// Result of [`KeyMaterialStore::provision`].
#[derive(Debug)]
pub enum KeyProvisioning {
    /// A key was already present on the volume.
    Existing(KeyMaterial),
    /// No key and nothing to lose: a key was created silently.
    Generated(KeyMaterial),
    /// The operator confirmed regeneration; previous records were destroyed.
    Regenerated(KeyMaterial),
}

/// What [`KeyMaterialStore::provision`] did, without the key itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStatus {
    Existing,
    Generated,
    Regenerated,
}

impl KeyProvisioning {
    pub fn status(&self) -> KeyStatus {
        match self {
            Self::Existing(_) => KeyStatus::Existing,
            Self::Generated(_) => KeyStatus::Generated,
            Self::Regenerated(_) => KeyStatus::Regenerated,
        }
    }

    pub fn into_key(self) -> KeyMaterial {
        match self {
            Self::Existing(k) | Self::Generated(k) | Self::Regenerated(k) => k,
        }
    }
}

/// Locates, loads, and creates the key file on a removable volume.
#[derive(Debug, Clone)]
pub struct KeyMaterialStore {
    /// Path of the key file relative to the volume root.
    key_file: PathBuf,
}

impl KeyMaterialStore {
    pub fn new(key_file: impl Into<PathBuf>) -> Self {
        Self {
            key_file: key_file.into(),
        }
    }

    /// Enumerate mounted removable volumes.
    ///
    /// An empty result is fatal: no vault operation may proceed without a
    /// place to keep the key.
    pub fn detect_removable_volumes(
        probe: &dyn VolumeProbe,
    ) -> Result<Vec<VolumePath>, LatchkeyError> {
        let volumes = probe.removable_volumes()?;
        if volumes.is_empty() {
            return Err(LatchkeyError::NoRemovableVolume);
        }
        debug!(count = volumes.len(), "removable volumes detected");
        Ok(volumes)
    }

    /// Pick the volume to use: the preferred mount if it was detected,
    /// otherwise the first one.
    pub fn select_volume(
        volumes: &[VolumePath],
        preferred: Option<&Path>,
    ) -> Result<VolumePath, LatchkeyError> {
        if let Some(preferred) = preferred {
            if let Some(found) = volumes.iter().find(|v| v.as_path() == preferred) {
                return Ok(found.clone());
            }
            warn!(
                preferred = %preferred.display(),
                "preferred volume not mounted, using first detected"
            );
        }
        volumes.first().cloned().ok_or(LatchkeyError::NoRemovableVolume)
    }

    /// Full path of the key file on `volume`.
    pub fn key_path(&self, volume: &VolumePath) -> PathBuf {
        volume.as_path().join(&self.key_file)
    }

    /// Read the key from `volume` if present.
    pub fn locate_key(&self, volume: &VolumePath) -> Result<Option<KeyMaterial>, LatchkeyError> {
        let path = self.key_path(volume);
        match std::fs::read(&path) {
            Ok(bytes) => {
                let bytes = Zeroizing::new(bytes);
                let key = KeyMaterial::from_bytes(&bytes)?;
                debug!(path = %path.display(), "key material loaded");
                Ok(Some(key))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(LatchkeyError::io(path, e)),
        }
    }

    /// Create a random key and write it to `volume`, replacing any existing one.
    pub fn generate_key(&self, volume: &VolumePath) -> Result<KeyMaterial, LatchkeyError> {
        let key = KeyMaterial::generate()?;
        let path = self.key_path(volume);
        write_atomic(&path, key.expose())
            .map_err(|source| LatchkeyError::VolumeWriteFailure {
                path: path.clone(),
                source,
            })?;
        info!(path = %path.display(), "generated new key material");
        Ok(key)
    }

    /// Load or create the key for `volume`.
    ///
    /// If the key is missing and the credential file may hold records, the
    /// `confirm` callback decides. Declining yields
    /// [`LatchkeyError::KeyMissingConfirmRequired`] and changes nothing;
    /// accepting writes a new key and resets the credential file to an empty
    /// table sealed under it.
    pub fn provision<F>(
        &self,
        volume: &VolumePath,
        store: &EncryptedRecordStore,
        confirm: F,
    ) -> Result<KeyProvisioning, LatchkeyError>
    where
        F: FnOnce(&VolumePath) -> bool,
    {
        if let Some(key) = self.locate_key(volume)? {
            return Ok(KeyProvisioning::Existing(key));
        }

        if !store.may_hold_records()? {
            let key = self.generate_key(volume)?;
            return Ok(KeyProvisioning::Generated(key));
        }

        warn!(volume = %volume, "key missing while credential file holds records");
        if !confirm(volume) {
            return Err(LatchkeyError::KeyMissingConfirmRequired {
                volume: volume.as_path().to_path_buf(),
            });
        }

        let key = self.generate_key(volume)?;
        store.reset_sealed(&key)?;
        warn!(volume = %volume, "key regenerated; previous credentials destroyed");
        Ok(KeyProvisioning::Regenerated(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{CredentialTable, TableFileState};
    use secrecy::SecretString;

    struct Probe(Vec<VolumePath>);

    impl VolumeProbe for Probe {
        fn removable_volumes(&self) -> Result<Vec<VolumePath>, LatchkeyError> {
            Ok(self.0.clone())
        }
    }

    fn setup() -> (tempfile::TempDir, VolumePath, EncryptedRecordStore, KeyMaterialStore) {
        let dir = tempfile::tempdir().unwrap();
        let usb = dir.path().join("usb");
        std::fs::create_dir_all(&usb).unwrap();
        let store = EncryptedRecordStore::new(dir.path().join("passwords.csv"));
        (dir, VolumePath::new(usb), store, KeyMaterialStore::new("latchkey.key"))
    }

    #[test]
    fn no_volumes_is_fatal() {
        let err = KeyMaterialStore::detect_removable_volumes(&Probe(vec![])).unwrap_err();
        assert!(matches!(err, LatchkeyError::NoRemovableVolume));
    }

    #[test]
    fn select_prefers_configured_mount() {
        let volumes = vec![VolumePath::new("/media/a"), VolumePath::new("/media/b")];
        let picked =
            KeyMaterialStore::select_volume(&volumes, Some(Path::new("/media/b"))).unwrap();
        assert_eq!(picked, VolumePath::new("/media/b"));

        let fallback =
            KeyMaterialStore::select_volume(&volumes, Some(Path::new("/media/z"))).unwrap();
        assert_eq!(fallback, VolumePath::new("/media/a"));
    }

    #[test]
    fn key_debug_is_redacted() {
        let key = KeyMaterial::from_bytes(&[7u8; KEY_LEN]).unwrap();
        assert_eq!(format!("{key:?}"), "KeyMaterial(\"[REDACTED]\")");
    }

    #[test]
    fn wrong_length_key_file_is_corrupt() {
        let (_dir, volume, _store, keys) = setup();
        std::fs::write(keys.key_path(&volume), b"short").unwrap();
        assert!(matches!(
            keys.locate_key(&volume),
            Err(LatchkeyError::CorruptFile(_))
        ));
    }

    #[test]
    fn generated_key_is_located_again() {
        let (_dir, volume, _store, keys) = setup();
        assert!(keys.locate_key(&volume).unwrap().is_none());

        let key = keys.generate_key(&volume).unwrap();
        let loaded = keys.locate_key(&volume).unwrap().unwrap();
        assert_eq!(key.expose(), loaded.expose());
    }

    #[test]
    fn unwritable_volume_is_volume_write_failure() {
        let (dir, _volume, _store, keys) = setup();
        // A regular file cannot act as a directory.
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"").unwrap();

        let err = keys.generate_key(&VolumePath::new(&blocker)).unwrap_err();
        assert!(matches!(err, LatchkeyError::VolumeWriteFailure { .. }));
    }

    #[test]
    fn provision_generates_silently_without_records() {
        let (_dir, volume, store, keys) = setup();
        store.ensure_table_exists().unwrap();

        let outcome = keys
            .provision(&volume, &store, |_| panic!("must not ask"))
            .unwrap();
        assert!(matches!(outcome, KeyProvisioning::Generated(_)));

        let again = keys.provision(&volume, &store, |_| panic!("must not ask")).unwrap();
        assert!(matches!(again, KeyProvisioning::Existing(_)));
    }

    #[test]
    fn declined_regeneration_changes_nothing() {
        let (_dir, volume, store, keys) = setup();
        let old = KeyMaterial::generate().unwrap();
        let mut table = CredentialTable::new();
        table
            .upsert("site.com", "alice", &SecretString::from("p".to_string()), &old)
            .unwrap();
        store.seal_to_disk(&table, &old).unwrap();
        let before = std::fs::read(store.path()).unwrap();

        let err = keys.provision(&volume, &store, |_| false).unwrap_err();

        assert!(matches!(err, LatchkeyError::KeyMissingConfirmRequired { .. }));
        assert!(keys.locate_key(&volume).unwrap().is_none());
        assert_eq!(std::fs::read(store.path()).unwrap(), before);
    }

    #[test]
    fn confirmed_regeneration_destroys_records() {
        let (_dir, volume, store, keys) = setup();
        let old = KeyMaterial::generate().unwrap();
        let mut table = CredentialTable::new();
        table
            .upsert("site.com", "alice", &SecretString::from("p".to_string()), &old)
            .unwrap();
        store.seal_to_disk(&table, &old).unwrap();

        let key = keys.provision(&volume, &store, |_| true).unwrap();
        assert_eq!(key.status(), KeyStatus::Regenerated);
        let key = key.into_key();

        assert_eq!(store.file_state().unwrap(), TableFileState::Sealed);
        assert!(store.open_from_sealed(&key).unwrap().is_empty());
        assert!(matches!(
            store.open_from_sealed(&old),
            Err(LatchkeyError::DecryptionFailure(_))
        ));
    }
}
