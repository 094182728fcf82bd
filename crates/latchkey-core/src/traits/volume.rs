// SPDX-FileCopyrightText: 2026 Latchkey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Removable volume enumeration.

use crate::error::LatchkeyError;
use crate::types::VolumePath;

/// Enumerates mounted removable volumes.
pub trait VolumeProbe {
    /// Currently mounted removable volumes, in discovery order.
    fn removable_volumes(&self) -> Result<Vec<VolumePath>, LatchkeyError>;
}
