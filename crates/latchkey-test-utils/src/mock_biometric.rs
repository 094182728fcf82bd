// SPDX-FileCopyrightText: 2026 Latchkey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Camera-free biometric doubles.
//!
//! - [`ScriptedBiometricGate`] returns pre-configured outcomes from `verify`.
//! - [`ScriptedFrames`] feeds per-frame verdicts to a real
//!   [`SustainedMatchGate`](latchkey_vault::SustainedMatchGate).
//! - [`TickClock`] advances a fixed step on every reading.

use std::cell::Cell;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use latchkey_core::{
    BiometricGate, BiometricIdentity, FrameVerdict, LatchkeyError, Recognizer,
    VerificationOutcome,
};
use latchkey_vault::Clock;

/// Gate whose `verify` results are scripted in advance.
///
/// Once the script runs out every further `verify` returns `Rejected`.
/// `train` writes a placeholder template so enrollment is observable on disk.
#[derive(Debug, Default)]
pub struct ScriptedBiometricGate {
    outcomes: VecDeque<VerificationOutcome>,
    verified: Vec<String>,
    enrolled: Vec<(String, u32)>,
}

impl ScriptedBiometricGate {
    pub fn new(outcomes: impl IntoIterator<Item = VerificationOutcome>) -> Self {
        Self {
            outcomes: outcomes.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Queue another outcome.
    pub fn push(&mut self, outcome: VerificationOutcome) {
        self.outcomes.push_back(outcome);
    }

    /// Names passed to `verify`, in call order.
    pub fn verified(&self) -> &[String] {
        &self.verified
    }

    /// `(name, sample_count)` passed to `enroll`, in call order.
    pub fn enrolled(&self) -> &[(String, u32)] {
        &self.enrolled
    }
}

impl BiometricGate for ScriptedBiometricGate {
    fn has_enrolled_identity(&self, identity: &BiometricIdentity) -> bool {
        identity.template.is_file()
    }

    fn verify(&mut self, identity: &BiometricIdentity) -> Result<VerificationOutcome, LatchkeyError> {
        self.verified.push(identity.name.clone());
        Ok(self
            .outcomes
            .pop_front()
            .unwrap_or(VerificationOutcome::Rejected))
    }

    fn enroll(&mut self, identity: &BiometricIdentity, sample_count: u32) -> Result<(), LatchkeyError> {
        self.enrolled.push((identity.name.clone(), sample_count));
        Ok(())
    }

    fn train(&mut self, identity: &BiometricIdentity) -> Result<(), LatchkeyError> {
        write_template(identity)
    }
}

/// Recognizer that replays a fixed list of frame verdicts.
#[derive(Debug, Default)]
pub struct ScriptedFrames {
    frames: VecDeque<FrameVerdict>,
    releases: u32,
}

impl ScriptedFrames {
    pub fn new(frames: impl IntoIterator<Item = FrameVerdict>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
            releases: 0,
        }
    }

    /// `count` consecutive matching frames.
    pub fn matching(count: usize) -> Self {
        Self::new(std::iter::repeat_n(FrameVerdict::Match, count))
    }

    /// How many times the device was released.
    pub fn releases(&self) -> u32 {
        self.releases
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl Recognizer for ScriptedFrames {
    fn next_frame(
        &mut self,
        _identity: &BiometricIdentity,
    ) -> Result<Option<FrameVerdict>, LatchkeyError> {
        Ok(self.frames.pop_front())
    }

    fn capture_samples(
        &mut self,
        _identity: &BiometricIdentity,
        count: u32,
    ) -> Result<u32, LatchkeyError> {
        let available = self
            .frames
            .iter()
            .filter(|v| **v != FrameVerdict::NoFace)
            .count();
        Ok(count.min(u32::try_from(available).unwrap_or(u32::MAX)))
    }

    fn train(&mut self, identity: &BiometricIdentity) -> Result<(), LatchkeyError> {
        write_template(identity)
    }

    fn release(&mut self) {
        self.releases += 1;
    }
}

/// Clock that moves forward by `step` every time it is read.
#[derive(Debug)]
pub struct TickClock {
    now: Cell<Instant>,
    step: Duration,
}

impl TickClock {
    pub fn new(step: Duration) -> Self {
        Self {
            now: Cell::new(Instant::now()),
            step,
        }
    }
}

impl Clock for TickClock {
    fn now(&self) -> Instant {
        let next = self.now.get() + self.step;
        self.now.set(next);
        next
    }
}

fn write_template(identity: &BiometricIdentity) -> Result<(), LatchkeyError> {
    if let Some(parent) = identity.template.parent() {
        std::fs::create_dir_all(parent).map_err(|e| LatchkeyError::io(parent, e))?;
    }
    std::fs::write(&identity.template, format!("template for {}\n", identity.name))
        .map_err(|e| LatchkeyError::io(&identity.template, e))
}
