// SPDX-FileCopyrightText: 2026 Latchkey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the latchkey credential vault.
//!
//! This crate provides the error type, shared types, and the capability
//! traits the vault consumes. Concrete camera, clipboard, and volume
//! integrations implement the traits defined here.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::LatchkeyError;
pub use types::{
    BiometricIdentity, FrameVerdict, SessionState, UnlockMethod, VerificationOutcome, VolumePath,
};

pub use traits::{BiometricGate, ClipboardSink, Recognizer, VolumeProbe};
