// SPDX-FileCopyrightText: 2026 Latchkey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end vault tests.
//!
//! `TestVault` lays out a fake removable volume and a local data directory
//! inside one temp dir, with the KDF cost lowered to the validation floor.
//! Every `start()` is a fresh process-equivalent session over the same files.

use std::path::{Path, PathBuf};

use latchkey_config::LatchkeyConfig;
use latchkey_core::{LatchkeyError, VolumePath};
use latchkey_vault::{KeyStatus, VaultPaths, VaultSession};
use secrecy::SecretString;
use tempfile::TempDir;

use crate::mock_system::FixedVolumeProbe;

/// Builder for [`TestVault`].
#[derive(Debug, Default)]
pub struct TestVaultBuilder {
    passphrase: Option<String>,
    clear_after_secs: Option<u64>,
    stabilization_secs: Option<u64>,
}

impl TestVaultBuilder {
    /// Initialize the master passphrase during `build`.
    pub fn with_passphrase(mut self, passphrase: &str) -> Self {
        self.passphrase = Some(passphrase.to_string());
        self
    }

    pub fn with_clear_after_secs(mut self, secs: u64) -> Self {
        self.clear_after_secs = Some(secs);
        self
    }

    pub fn with_stabilization_secs(mut self, secs: u64) -> Self {
        self.stabilization_secs = Some(secs);
        self
    }

    /// Create the directories and, if requested, run a first start that
    /// provisions the key and sets the passphrase.
    pub fn build(self) -> Result<TestVault, LatchkeyError> {
        let dir = tempfile::tempdir().map_err(|e| LatchkeyError::io(std::env::temp_dir(), e))?;
        let usb = dir.path().join("usb");
        std::fs::create_dir_all(&usb).map_err(|e| LatchkeyError::io(&usb, e))?;

        let mut config = LatchkeyConfig::default();
        config.vault.data_dir = dir.path().join("data").to_string_lossy().into_owned();
        config.vault.kdf_memory_cost = 32768;
        config.vault.kdf_iterations = 2;
        config.vault.kdf_parallelism = 1;
        config.biometric.enrollment_samples = 5;
        if let Some(secs) = self.clear_after_secs {
            config.clipboard.clear_after_secs = secs;
        }
        if let Some(secs) = self.stabilization_secs {
            config.biometric.stabilization_secs = secs;
        }

        let vault = TestVault {
            volume: VolumePath::new(usb),
            config,
            dir,
        };

        if let Some(passphrase) = self.passphrase {
            let (session, _) = vault.start()?;
            session
                .master()
                .initialize(&SecretString::from(passphrase))?;
        }
        Ok(vault)
    }
}

/// A vault laid out in a temp directory.
#[derive(Debug)]
pub struct TestVault {
    dir: TempDir,
    config: LatchkeyConfig,
    volume: VolumePath,
}

impl TestVault {
    pub fn builder() -> TestVaultBuilder {
        TestVaultBuilder::default()
    }

    pub fn config(&self) -> &LatchkeyConfig {
        &self.config
    }

    pub fn paths(&self) -> VaultPaths {
        VaultPaths::from_config(&self.config)
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn volume(&self) -> &VolumePath {
        &self.volume
    }

    /// Probe that reports the fake volume.
    pub fn probe(&self) -> FixedVolumeProbe {
        FixedVolumeProbe::new([self.volume.clone()])
    }

    pub fn credential_file(&self) -> PathBuf {
        self.paths().credential_file
    }

    pub fn key_file(&self) -> PathBuf {
        self.volume.as_path().join(self.paths().key_file)
    }

    /// Start a session, refusing any destructive key regeneration.
    pub fn start(&self) -> Result<(VaultSession, KeyStatus), LatchkeyError> {
        self.start_confirming(false)
    }

    /// Start a session, answering the regeneration prompt with `confirm`.
    pub fn start_confirming(&self, confirm: bool) -> Result<(VaultSession, KeyStatus), LatchkeyError> {
        VaultSession::start(&self.config, &self.probe(), |_| confirm)
    }

    /// Start and unlock with `passphrase`.
    pub fn open(&self, passphrase: &str) -> Result<VaultSession, LatchkeyError> {
        let (mut session, _) = self.start()?;
        session.unlock_with_passphrase(&SecretString::from(passphrase.to_string()))?;
        Ok(session)
    }

    /// Simulate losing the key: delete it from the volume.
    pub fn remove_key(&self) -> Result<(), LatchkeyError> {
        let path = self.key_file();
        std::fs::remove_file(&path).map_err(|e| LatchkeyError::io(&path, e))
    }

    /// Raw bytes of the credential file.
    pub fn credential_bytes(&self) -> Result<Vec<u8>, LatchkeyError> {
        let path = self.credential_file();
        std::fs::read(&path).map_err(|e| LatchkeyError::io(&path, e))
    }
}
