// SPDX-FileCopyrightText: 2026 Latchkey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Removable volume discovery through `sysinfo`.

use std::path::PathBuf;

use latchkey_core::{LatchkeyError, VolumePath, VolumeProbe};
use sysinfo::Disks;
use tracing::debug;

/// [`VolumeProbe`] over the host's mounted disks.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemVolumeProbe {
    /// Also report fixed disks.
    pub allow_fixed: bool,
}

impl SystemVolumeProbe {
    pub fn new(allow_fixed: bool) -> Self {
        Self { allow_fixed }
    }
}

impl VolumeProbe for SystemVolumeProbe {
    fn removable_volumes(&self) -> Result<Vec<VolumePath>, LatchkeyError> {
        let disks = Disks::new_with_refreshed_list();
        let mounts = disks.list().iter().map(|disk| {
            debug!(
                mount = %disk.mount_point().display(),
                removable = disk.is_removable(),
                "disk found"
            );
            (disk.mount_point().to_path_buf(), disk.is_removable())
        });
        Ok(filter_mounts(mounts, self.allow_fixed))
    }
}

/// Keep removable mounts (or all, with `allow_fixed`), dropping duplicates.
fn filter_mounts(
    mounts: impl IntoIterator<Item = (PathBuf, bool)>,
    allow_fixed: bool,
) -> Vec<VolumePath> {
    let mut volumes: Vec<VolumePath> = Vec::new();
    for (mount, removable) in mounts {
        if !(removable || allow_fixed) {
            continue;
        }
        let volume = VolumePath::new(mount);
        if !volumes.contains(&volume) {
            volumes.push(volume);
        }
    }
    volumes
}
