// SPDX-FileCopyrightText: 2026 Latchkey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vault session lifecycle: `Locked -> Unlocking -> Open -> Sealing -> Closed`.
//!
//! The key is read from the removable volume only after a gate accepts, and
//! the credential table lives in memory while the session is `Open`. Leaving
//! `Open` always goes through a seal, either from [`VaultSession::close`] or
//! from `Drop`. A session that never opened never writes the credential file.

use std::path::Path;

use latchkey_config::LatchkeyConfig;
use latchkey_core::{
    BiometricGate, LatchkeyError, SessionState, UnlockMethod, VolumePath, VolumeProbe,
};
use secrecy::SecretString;
use tracing::{debug, error, info, warn};

use crate::clipboard::{ClearHandle, SecureClipboard};
use crate::identity::{IdentityMarker, enroll_operator};
use crate::kdf::KdfParams;
use crate::keystore::{KeyMaterial, KeyMaterialStore, KeyStatus};
use crate::master::MasterCredentialGate;
use crate::paths::VaultPaths;
use crate::records::{CredentialTable, DecryptedRow, EncryptedRecordStore, TableFileState};

/// Snapshot for status displays. Never contains secrets.
#[derive(Debug, Clone)]
pub struct VaultStatus {
    pub state: SessionState,
    pub volume: VolumePath,
    pub key_present: bool,
    pub passphrase_set: bool,
    pub operator: Option<String>,
    pub file_state: TableFileState,
}

/// One vault session over a selected removable volume.
#[derive(Debug)]
pub struct VaultSession {
    state: SessionState,
    volume: VolumePath,
    keys: KeyMaterialStore,
    store: EncryptedRecordStore,
    master: MasterCredentialGate,
    marker: IdentityMarker,
    enrollment_samples: u32,
    unlocked_by: Option<UnlockMethod>,
    key: Option<KeyMaterial>,
    table: Option<CredentialTable>,
}

impl VaultSession {
    /// A locked session over explicit components.
    pub fn new(
        volume: VolumePath,
        keys: KeyMaterialStore,
        store: EncryptedRecordStore,
        master: MasterCredentialGate,
        marker: IdentityMarker,
    ) -> Self {
        Self {
            state: SessionState::Locked,
            volume,
            keys,
            store,
            master,
            marker,
            enrollment_samples: 50,
            unlocked_by: None,
            key: None,
            table: None,
        }
    }

    /// A locked session with every path taken from `config`.
    pub fn from_config(config: &LatchkeyConfig, volume: VolumePath) -> Self {
        let paths = VaultPaths::from_config(config);
        let mut session = Self::new(
            volume,
            KeyMaterialStore::new(&paths.key_file),
            EncryptedRecordStore::new(&paths.credential_file),
            MasterCredentialGate::new(&paths.master_hash_file, KdfParams::from(&config.vault)),
            IdentityMarker::from_paths(&paths),
        );
        session.enrollment_samples = config.biometric.enrollment_samples;
        session
    }

    /// Startup sequence: find the volume, provision the key, make sure the
    /// credential table exists, and hand back a locked session.
    ///
    /// `confirm` is asked only when the key is missing and records may be
    /// lost by regenerating it.
    pub fn start<F>(
        config: &LatchkeyConfig,
        probe: &dyn VolumeProbe,
        confirm: F,
    ) -> Result<(Self, KeyStatus), LatchkeyError>
    where
        F: FnOnce(&VolumePath) -> bool,
    {
        let volumes = KeyMaterialStore::detect_removable_volumes(probe)?;
        let preferred = config.volumes.preferred_mount.as_deref().map(Path::new);
        let volume = KeyMaterialStore::select_volume(&volumes, preferred)?;
        info!(volume = %volume, "using removable volume");

        let session = Self::from_config(config, volume);
        // The key is dropped here; it is read again on unlock.
        let status = session
            .keys
            .provision(&session.volume, &session.store, confirm)?
            .status();
        session.store.ensure_table_exists()?;

        Ok((session, status))
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn unlocked_by(&self) -> Option<UnlockMethod> {
        self.unlocked_by
    }

    pub fn volume(&self) -> &VolumePath {
        &self.volume
    }

    pub fn master(&self) -> &MasterCredentialGate {
        &self.master
    }

    pub fn marker(&self) -> &IdentityMarker {
        &self.marker
    }

    pub fn store(&self) -> &EncryptedRecordStore {
        &self.store
    }

    pub fn status(&self) -> Result<VaultStatus, LatchkeyError> {
        Ok(VaultStatus {
            state: self.state,
            volume: self.volume.clone(),
            key_present: self.keys.key_path(&self.volume).is_file(),
            passphrase_set: self.master.is_initialized(),
            operator: self.marker.load()?,
            file_state: self.store.file_state()?,
        })
    }

    /// Unlock with the master passphrase.
    ///
    /// A wrong passphrase returns [`LatchkeyError::AccessDenied`] and leaves
    /// the session `Locked`, ready for another attempt through either gate.
    pub fn unlock_with_passphrase(&mut self, passphrase: &SecretString) -> Result<(), LatchkeyError> {
        self.begin_unlock()?;
        match self.master.validate(passphrase) {
            Ok(true) => self.finish_unlock(UnlockMethod::Passphrase),
            Ok(false) => self.fail_unlock(LatchkeyError::AccessDenied {
                method: UnlockMethod::Passphrase,
            }),
            Err(e) => self.fail_unlock(e),
        }
    }

    /// Unlock by biometric verification of the enrolled operator.
    ///
    /// Blocks for as long as `gate.verify` does. Returns the operator's name.
    pub fn unlock_with_biometric(
        &mut self,
        gate: &mut dyn BiometricGate,
    ) -> Result<String, LatchkeyError> {
        self.require(SessionState::Locked, "unlock")?;
        let identity = self.marker.identity()?.ok_or_else(|| {
            LatchkeyError::NotInitialized("no operator enrolled for biometric unlock".to_string())
        })?;
        if !gate.has_enrolled_identity(&identity) {
            return Err(LatchkeyError::NotInitialized(format!(
                "operator `{}` has no trained template",
                identity.name
            )));
        }

        self.begin_unlock()?;
        match gate.verify(&identity) {
            Ok(outcome) if outcome.unlocks() => {
                self.finish_unlock(UnlockMethod::Biometric)?;
                Ok(identity.name)
            }
            Ok(outcome) => {
                debug!(%outcome, "biometric gate refused");
                self.fail_unlock(LatchkeyError::AccessDenied {
                    method: UnlockMethod::Biometric,
                })
            }
            Err(e) => self.fail_unlock(e),
        }
    }

    /// Read-only view of the resident table.
    pub fn records(&self) -> Result<&CredentialTable, LatchkeyError> {
        self.open_parts("read records").map(|(table, _)| table)
    }

    /// Insert or overwrite the credential for `site`.
    pub fn upsert(
        &mut self,
        site: &str,
        username: &str,
        password: &SecretString,
    ) -> Result<(), LatchkeyError> {
        let (table, key) = self.open_parts_mut("upsert")?;
        table.upsert(site, username, password, key)
    }

    /// Remove the credential for `site`. Returns whether it existed.
    pub fn remove(&mut self, site: &str) -> Result<bool, LatchkeyError> {
        let (table, _) = self.open_parts_mut("remove")?;
        Ok(table.remove(site))
    }

    /// Every row decrypted for display, with per-row failures isolated.
    pub fn list(&self) -> Result<Vec<DecryptedRow>, LatchkeyError> {
        let (table, key) = self.open_parts("list")?;
        Ok(table.list_decrypted(key))
    }

    pub fn lookup(&self, site: &str) -> Result<Option<DecryptedRow>, LatchkeyError> {
        let (table, key) = self.open_parts("look up")?;
        Ok(table.lookup(site, key))
    }

    /// Copy the password for `site` and schedule the clipboard clear.
    ///
    /// `Ok(None)` if there is no such site.
    pub fn copy_password(
        &self,
        site: &str,
        clipboard: &SecureClipboard,
    ) -> Result<Option<ClearHandle>, LatchkeyError> {
        let Some(row) = self.lookup(site)? else {
            return Ok(None);
        };
        let credentials = row.credentials?;
        let handle = clipboard.copy(&credentials.password)?;
        info!(site = %site, clear_after = ?clipboard.clear_after(), "password copied");
        Ok(Some(handle))
    }

    /// Replace the master passphrase. Only available while `Open`.
    pub fn rotate_passphrase(
        &mut self,
        new_passphrase: &SecretString,
        confirmation: &SecretString,
    ) -> Result<(), LatchkeyError> {
        self.require(SessionState::Open, "rotate the passphrase")?;
        self.master.rotate(new_passphrase, confirmation)
    }

    /// Enroll (or re-enroll) the biometric operator. Only available while `Open`.
    pub fn reenroll(
        &mut self,
        gate: &mut dyn BiometricGate,
        name: &str,
    ) -> Result<(), LatchkeyError> {
        self.require(SessionState::Open, "enroll an operator")?;
        enroll_operator(gate, &self.marker, name, self.enrollment_samples)?;
        Ok(())
    }

    /// Seal (if open) and move to `Closed`.
    ///
    /// If sealing fails the session stays `Open` with the table intact, so the
    /// caller can retry; `Drop` will try once more.
    pub fn close(&mut self) -> Result<(), LatchkeyError> {
        match self.state {
            SessionState::Open => {
                self.seal()?;
                self.state = SessionState::Closed;
                info!("vault closed");
                Ok(())
            }
            SessionState::Locked => {
                debug!("closing a session that never opened; nothing to seal");
                self.state = SessionState::Closed;
                Ok(())
            }
            SessionState::Closed => Ok(()),
            state @ (SessionState::Unlocking | SessionState::Sealing) => {
                Err(LatchkeyError::InvalidState {
                    operation: "close",
                    state,
                })
            }
        }
    }

    fn seal(&mut self) -> Result<(), LatchkeyError> {
        self.state = SessionState::Sealing;
        let result = match (&self.table, &self.key) {
            (Some(table), Some(key)) => self.store.seal_to_disk(table, key),
            _ => Err(LatchkeyError::Internal(
                "open session without a resident table".to_string(),
            )),
        };
        match result {
            Ok(()) => {
                self.table = None;
                self.key = None;
                self.unlocked_by = None;
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Open;
                Err(e)
            }
        }
    }

    fn begin_unlock(&mut self) -> Result<(), LatchkeyError> {
        self.require(SessionState::Locked, "unlock")?;
        self.state = SessionState::Unlocking;
        Ok(())
    }

    fn finish_unlock(&mut self, method: UnlockMethod) -> Result<(), LatchkeyError> {
        let opened = self
            .keys
            .locate_key(&self.volume)
            .and_then(|key| {
                key.ok_or_else(|| {
                    LatchkeyError::NotInitialized(format!(
                        "no key at {}",
                        self.keys.key_path(&self.volume).display()
                    ))
                })
            })
            .and_then(|key| self.store.open_from_sealed(&key).map(|table| (key, table)));

        match opened {
            Ok((key, table)) => {
                info!(%method, rows = table.len(), "vault unlocked");
                self.key = Some(key);
                self.table = Some(table);
                self.unlocked_by = Some(method);
                self.state = SessionState::Open;
                Ok(())
            }
            Err(e) => self.fail_unlock(e),
        }
    }

    fn fail_unlock<T>(&mut self, error: LatchkeyError) -> Result<T, LatchkeyError> {
        warn!(error = %error, "unlock failed; vault remains locked");
        self.state = SessionState::Locked;
        Err(error)
    }

    fn require(&self, expected: SessionState, operation: &'static str) -> Result<(), LatchkeyError> {
        if self.state != expected {
            return Err(LatchkeyError::InvalidState {
                operation,
                state: self.state,
            });
        }
        Ok(())
    }

    fn open_parts(
        &self,
        operation: &'static str,
    ) -> Result<(&CredentialTable, &KeyMaterial), LatchkeyError> {
        self.require(SessionState::Open, operation)?;
        match (&self.table, &self.key) {
            (Some(table), Some(key)) => Ok((table, key)),
            _ => Err(LatchkeyError::Internal(
                "open session without a resident table".to_string(),
            )),
        }
    }

    fn open_parts_mut(
        &mut self,
        operation: &'static str,
    ) -> Result<(&mut CredentialTable, &KeyMaterial), LatchkeyError> {
        self.require(SessionState::Open, operation)?;
        match (&mut self.table, &self.key) {
            (Some(table), Some(key)) => Ok((table, key)),
            _ => Err(LatchkeyError::Internal(
                "open session without a resident table".to_string(),
            )),
        }
    }
}

impl Drop for VaultSession {
    fn drop(&mut self) {
        if self.state == SessionState::Open {
            warn!("session dropped while open, sealing");
            if let Err(e) = self.seal() {
                error!(error = %e, "failed to seal credential table on drop");
            }
        }
    }
}
