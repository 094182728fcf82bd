// SPDX-FileCopyrightText: 2026 Latchkey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the vault, the capabilities, and the CLI.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Mount point of a removable volume.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VolumePath(pub PathBuf);

impl VolumePath {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

impl std::fmt::Display for VolumePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Tri-state result of a biometric verification attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
pub enum VerificationOutcome {
    /// Sustained positive recognition over the full stabilization window.
    Accepted,
    /// No sustained match (stream ended, wrong face, no face).
    Rejected,
    /// The operator cancelled. Treated like `Rejected` for unlocking.
    Aborted,
}

impl VerificationOutcome {
    /// Only `Accepted` unlocks.
    pub fn unlocks(self) -> bool {
        self == VerificationOutcome::Accepted
    }
}

/// Per-frame verdict reported by a recognizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum FrameVerdict {
    /// A face was found and recognised as the enrolled identity.
    Match,
    /// A face was found but did not match (or matched with low confidence).
    NoMatch,
    /// No face in the frame.
    NoFace,
    /// The operator pressed the abort key.
    Cancel,
}

/// Lifecycle states of a vault session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// No key material in working memory.
    Locked,
    /// A gate is evaluating credentials.
    Unlocking,
    /// The credential table is resident and mutable.
    Open,
    /// The table is being written back as ciphertext.
    Sealing,
    /// Terminal. No further record operations.
    Closed,
}

/// Which gate authorised the transition to `Open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UnlockMethod {
    Passphrase,
    Biometric,
}

/// An enrolled operator: display name plus the opaque trained template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BiometricIdentity {
    /// Name shown on a successful match.
    pub name: String,
    /// Location of the template produced by training.
    pub template: PathBuf,
}
