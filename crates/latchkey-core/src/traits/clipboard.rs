// SPDX-FileCopyrightText: 2026 Latchkey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! System clipboard access.

use crate::error::LatchkeyError;

/// Write-only view of the system clipboard.
pub trait ClipboardSink: Send + Sync {
    /// Replace the clipboard contents with `text`.
    fn set_text(&self, text: &str) -> Result<(), LatchkeyError>;

    /// Empty the clipboard.
    fn clear(&self) -> Result<(), LatchkeyError> {
        self.set_text("")
    }
}
