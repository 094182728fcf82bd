// SPDX-FileCopyrightText: 2026 Latchkey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Biometric capability traits.
//!
//! The vault never touches a camera. It talks to a [`BiometricGate`], which
//! owns the device for the duration of each blocking call, and interprets
//! the tri-state [`VerificationOutcome`].

use crate::error::LatchkeyError;
use crate::types::{BiometricIdentity, FrameVerdict, VerificationOutcome};

/// Gate that can authorise an unlock by recognising the enrolled operator.
///
/// Implementations must require sustained recognition: a single matching
/// frame is never enough to return [`VerificationOutcome::Accepted`].
pub trait BiometricGate {
    /// Whether a trained template exists for `identity`.
    fn has_enrolled_identity(&self, identity: &BiometricIdentity) -> bool;

    /// Block until the operator is accepted, rejected, or aborts.
    fn verify(&mut self, identity: &BiometricIdentity) -> Result<VerificationOutcome, LatchkeyError>;

    /// Capture `sample_count` face samples for `identity`.
    fn enroll(&mut self, identity: &BiometricIdentity, sample_count: u32) -> Result<(), LatchkeyError>;

    /// Train the template from previously captured samples.
    fn train(&mut self, identity: &BiometricIdentity) -> Result<(), LatchkeyError>;
}

/// Frame-level recognizer driven by a [`BiometricGate`] implementation.
pub trait Recognizer {
    /// Next frame's verdict, or `None` when the capture stream ended.
    fn next_frame(
        &mut self,
        identity: &BiometricIdentity,
    ) -> Result<Option<FrameVerdict>, LatchkeyError>;

    /// Capture up to `count` samples. Returns how many were kept.
    fn capture_samples(
        &mut self,
        identity: &BiometricIdentity,
        count: u32,
    ) -> Result<u32, LatchkeyError>;

    /// Build the template at `identity.template` from captured samples.
    fn train(&mut self, identity: &BiometricIdentity) -> Result<(), LatchkeyError>;

    /// Release the capture device. Called after every verification attempt.
    fn release(&mut self) {}
}
