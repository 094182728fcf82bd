// SPDX-FileCopyrightText: 2026 Latchkey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Capability traits consumed by the vault.
//!
//! Each trait stands in for an external collaborator (camera and face model,
//! removable media enumeration, system clipboard) so the vault can be driven
//! by test doubles.

pub mod biometric;
pub mod clipboard;
pub mod volume;

pub use biometric::{BiometricGate, Recognizer};
pub use clipboard::ClipboardSink;
pub use volume::VolumeProbe;
