// SPDX-FileCopyrightText: 2026 Latchkey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Enrolled operator marker.
//!
//! The marker file holds the operator's display name on one line. Together
//! with the trained template it defines the [`BiometricIdentity`] used for
//! biometric unlock.

use std::path::{Path, PathBuf};

use latchkey_core::{BiometricGate, BiometricIdentity, LatchkeyError};
use tracing::info;

use crate::paths::{VaultPaths, write_atomic};

/// Reads and writes the username marker next to the identity template.
#[derive(Debug, Clone)]
pub struct IdentityMarker {
    username_file: PathBuf,
    template: PathBuf,
}

impl IdentityMarker {
    pub fn new(username_file: impl Into<PathBuf>, template: impl Into<PathBuf>) -> Self {
        Self {
            username_file: username_file.into(),
            template: template.into(),
        }
    }

    pub fn from_paths(paths: &VaultPaths) -> Self {
        Self::new(&paths.username_file, &paths.identity_template)
    }

    pub fn template(&self) -> &Path {
        &self.template
    }

    /// Enrolled display name, trimmed. `None` if no marker exists.
    pub fn load(&self) -> Result<Option<String>, LatchkeyError> {
        match std::fs::read_to_string(&self.username_file) {
            Ok(text) => {
                let name = text.trim();
                Ok((!name.is_empty()).then(|| name.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(LatchkeyError::io(&self.username_file, e)),
        }
    }

    pub fn save(&self, name: &str) -> Result<(), LatchkeyError> {
        let name = validate_name(name)?;
        write_atomic(&self.username_file, format!("{name}\n").as_bytes())
            .map_err(|e| LatchkeyError::io(&self.username_file, e))
    }

    /// Identity to verify against, if an operator has been named.
    pub fn identity(&self) -> Result<Option<BiometricIdentity>, LatchkeyError> {
        Ok(self.load()?.map(|name| self.identity_for(name)))
    }

    /// Whether both the marker and a trained template exist.
    pub fn has_enrolled(&self, gate: &dyn BiometricGate) -> Result<bool, LatchkeyError> {
        Ok(match self.identity()? {
            Some(identity) => gate.has_enrolled_identity(&identity),
            None => false,
        })
    }

    fn identity_for(&self, name: String) -> BiometricIdentity {
        BiometricIdentity {
            name,
            template: self.template.clone(),
        }
    }
}

/// Capture, train, and record a new operator, replacing any previous one.
///
/// The marker is written last, so a failed capture or training run leaves
/// the previous enrollment in place.
pub fn enroll_operator(
    gate: &mut dyn BiometricGate,
    marker: &IdentityMarker,
    name: &str,
    sample_count: u32,
) -> Result<BiometricIdentity, LatchkeyError> {
    let name = validate_name(name)?;
    let identity = marker.identity_for(name.to_string());

    gate.enroll(&identity, sample_count)?;
    gate.train(&identity)?;
    marker.save(name)?;

    info!(operator = %identity.name, "operator enrolled");
    Ok(identity)
}

fn validate_name(name: &str) -> Result<&str, LatchkeyError> {
    let name = name.trim();
    if name.is_empty() || name.contains(['\n', '\r']) {
        return Err(LatchkeyError::Biometric(
            "operator name must be a single non-empty line".to_string(),
        ));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use latchkey_core::VerificationOutcome;

    #[derive(Default)]
    struct RecordingGate {
        calls: Vec<&'static str>,
        fail_train: bool,
    }

    impl BiometricGate for RecordingGate {
        fn has_enrolled_identity(&self, identity: &BiometricIdentity) -> bool {
            identity.template.is_file()
        }

        fn verify(&mut self, _: &BiometricIdentity) -> Result<VerificationOutcome, LatchkeyError> {
            Ok(VerificationOutcome::Rejected)
        }

        fn enroll(&mut self, _: &BiometricIdentity, _: u32) -> Result<(), LatchkeyError> {
            self.calls.push("enroll");
            Ok(())
        }

        fn train(&mut self, identity: &BiometricIdentity) -> Result<(), LatchkeyError> {
            self.calls.push("train");
            if self.fail_train {
                return Err(LatchkeyError::Biometric("no samples".into()));
            }
            std::fs::write(&identity.template, b"model").unwrap();
            Ok(())
        }
    }

    fn marker(dir: &tempfile::TempDir) -> IdentityMarker {
        IdentityMarker::new(dir.path().join("username.dat"), dir.path().join("trainer.yml"))
    }

    #[test]
    fn marker_roundtrip_trims() {
        let dir = tempfile::tempdir().unwrap();
        let marker = marker(&dir);
        assert_eq!(marker.load().unwrap(), None);

        std::fs::write(dir.path().join("username.dat"), "  Alice \n").unwrap();
        assert_eq!(marker.load().unwrap().as_deref(), Some("Alice"));
    }

    #[test]
    fn enrollment_order_and_marker() {
        let dir = tempfile::tempdir().unwrap();
        let marker = marker(&dir);
        let mut gate = RecordingGate::default();

        assert!(!marker.has_enrolled(&gate).unwrap());
        let identity = enroll_operator(&mut gate, &marker, "Alice", 50).unwrap();

        assert_eq!(gate.calls, ["enroll", "train"]);
        assert_eq!(identity.name, "Alice");
        assert!(marker.has_enrolled(&gate).unwrap());
    }

    #[test]
    fn failed_training_keeps_previous_marker() {
        let dir = tempfile::tempdir().unwrap();
        let marker = marker(&dir);
        marker.save("Alice").unwrap();
        let mut gate = RecordingGate {
            fail_train: true,
            ..Default::default()
        };

        assert!(enroll_operator(&mut gate, &marker, "Bob", 50).is_err());
        assert_eq!(marker.load().unwrap().as_deref(), Some("Alice"));
    }

    #[test]
    fn blank_name_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let marker = marker(&dir);
        assert!(marker.save("   ").is_err());
        assert!(marker.save("a\nb").is_err());
    }
}
