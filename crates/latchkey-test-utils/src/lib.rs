// SPDX-FileCopyrightText: 2026 Latchkey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for latchkey integration tests.
//!
//! Provides camera-free, drive-free doubles and a temp-dir harness for fast,
//! deterministic, CI-runnable tests.
//!
//! # Components
//!
//! - [`ScriptedBiometricGate`] - gate with pre-configured verification outcomes
//! - [`ScriptedFrames`] / [`TickClock`] - frame-level inputs for the sustained-match gate
//! - [`FixedVolumeProbe`] - removable volume enumeration with fixed results
//! - [`MemoryClipboard`] - clipboard that records every write
//! - [`TestVault`] - temp-dir vault with a fake removable volume

pub mod harness;
pub mod mock_biometric;
pub mod mock_system;

pub use harness::{TestVault, TestVaultBuilder};
pub use mock_biometric::{ScriptedBiometricGate, ScriptedFrames, TickClock};
pub use mock_system::{FixedVolumeProbe, MemoryClipboard};

#[cfg(test)]
mod tests {
    use super::*;
    use latchkey_core::{
        BiometricGate, BiometricIdentity, ClipboardSink, FrameVerdict, Recognizer,
        VerificationOutcome, VolumeProbe,
    };

    #[test]
    fn scripted_gate_falls_back_to_rejected() {
        let mut gate = ScriptedBiometricGate::new([VerificationOutcome::Accepted]);
        let id = BiometricIdentity {
            name: "alice".into(),
            template: "/nonexistent".into(),
        };

        assert_eq!(gate.verify(&id).unwrap(), VerificationOutcome::Accepted);
        assert_eq!(gate.verify(&id).unwrap(), VerificationOutcome::Rejected);
        assert_eq!(gate.verified(), ["alice", "alice"]);
    }

    #[test]
    fn scripted_frames_replay_in_order() {
        let mut frames = ScriptedFrames::new([FrameVerdict::Match, FrameVerdict::Cancel]);
        let id = BiometricIdentity {
            name: "alice".into(),
            template: "/nonexistent".into(),
        };

        assert_eq!(frames.next_frame(&id).unwrap(), Some(FrameVerdict::Match));
        assert_eq!(frames.next_frame(&id).unwrap(), Some(FrameVerdict::Cancel));
        assert_eq!(frames.next_frame(&id).unwrap(), None);
    }

    #[test]
    fn memory_clipboard_tracks_contents() {
        let clipboard = MemoryClipboard::new();
        clipboard.set_text("secret").unwrap();
        clipboard.clear().unwrap();

        assert_eq!(clipboard.contents(), "");
        assert_eq!(clipboard.history(), ["secret", ""]);
    }

    #[test]
    fn harness_lays_out_volume_and_data_dir() {
        let vault = TestVault::builder().build().unwrap();
        assert_eq!(vault.probe().removable_volumes().unwrap(), [vault.volume().clone()]);
        assert!(vault.volume().as_path().starts_with(vault.root()));
        assert!(vault.credential_file().starts_with(vault.root()));
        assert!(FixedVolumeProbe::empty().removable_volumes().unwrap().is_empty());
    }
}
