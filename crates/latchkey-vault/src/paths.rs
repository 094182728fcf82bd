// SPDX-FileCopyrightText: 2026 Latchkey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resolved file locations, threaded explicitly through every component.

use std::io::Write;
use std::path::{Path, PathBuf};

use latchkey_config::LatchkeyConfig;

/// Every on-disk location the vault touches.
///
/// `key_file` is relative; it is joined with the selected volume's mount
/// point. Everything else is an absolute local path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultPaths {
    pub data_dir: PathBuf,
    pub credential_file: PathBuf,
    pub master_hash_file: PathBuf,
    pub key_file: PathBuf,
    pub username_file: PathBuf,
    pub identity_template: PathBuf,
}

impl VaultPaths {
    pub fn from_config(config: &LatchkeyConfig) -> Self {
        let data_dir = PathBuf::from(&config.vault.data_dir);
        Self {
            credential_file: config.vault.credential_path(),
            master_hash_file: config.vault.master_hash_path(),
            key_file: PathBuf::from(&config.vault.key_file_name),
            username_file: data_dir.join(&config.biometric.username_file),
            identity_template: data_dir.join(&config.biometric.identity_template),
            data_dir,
        }
    }

    /// Default layout rooted at `data_dir`.
    pub fn in_dir(data_dir: impl Into<PathBuf>) -> Self {
        let mut config = LatchkeyConfig::default();
        config.vault.data_dir = data_dir.into().to_string_lossy().into_owned();
        Self::from_config(&config)
    }
}

/// Replace `path` with `bytes` via a temp file in the same directory.
///
/// Readers see either the old or the new content, never a torn write. On
/// unix the temp file, and therefore the result, is created with mode 0600.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
