// SPDX-FileCopyrightText: 2026 Latchkey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory stand-ins for removable media enumeration and the clipboard.

use std::sync::Mutex;

use latchkey_core::{ClipboardSink, LatchkeyError, VolumePath, VolumeProbe};

/// Reports a fixed set of volumes.
#[derive(Debug, Clone, Default)]
pub struct FixedVolumeProbe {
    volumes: Vec<VolumePath>,
}

impl FixedVolumeProbe {
    pub fn new(volumes: impl IntoIterator<Item = VolumePath>) -> Self {
        Self {
            volumes: volumes.into_iter().collect(),
        }
    }

    /// A probe that finds nothing, as with the drive unplugged.
    pub fn empty() -> Self {
        Self::default()
    }
}

impl VolumeProbe for FixedVolumeProbe {
    fn removable_volumes(&self) -> Result<Vec<VolumePath>, LatchkeyError> {
        Ok(self.volumes.clone())
    }
}

/// Clipboard that records every write.
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    history: Mutex<Vec<String>>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current contents (empty string if never written or cleared).
    pub fn contents(&self) -> String {
        self.lock().last().cloned().unwrap_or_default()
    }

    /// Every value ever written, including clears as `""`.
    pub fn history(&self) -> Vec<String> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
        // A poisoned lock only means another test thread panicked mid-write.
        self.history.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ClipboardSink for MemoryClipboard {
    fn set_text(&self, text: &str) -> Result<(), LatchkeyError> {
        self.lock().push(text.to_string());
        Ok(())
    }
}
