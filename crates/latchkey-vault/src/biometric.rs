// SPDX-FileCopyrightText: 2026 Latchkey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sustained-match acceptance policy for biometric unlock.
//!
//! A [`Recognizer`] reports one verdict per captured frame. The gate accepts
//! only after an unbroken run of matching frames spanning the stabilization
//! window. Any frame without a match (wrong face, no face) restarts the run,
//! so a single lucky frame can never unlock the vault.

use std::time::{Duration, Instant};

use latchkey_core::{
    BiometricGate, BiometricIdentity, FrameVerdict, LatchkeyError, Recognizer,
    VerificationOutcome,
};
use tracing::{debug, info};

/// Monotonic time source.
pub trait Clock {
    fn now(&self) -> Instant;
}

/// Wall clock backed by [`Instant::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// [`BiometricGate`] that requires continuous recognition for `window`.
#[derive(Debug)]
pub struct SustainedMatchGate<R, C = SystemClock> {
    recognizer: R,
    clock: C,
    window: Duration,
}

impl<R: Recognizer> SustainedMatchGate<R, SystemClock> {
    pub fn new(recognizer: R, window: Duration) -> Self {
        Self::with_clock(recognizer, SystemClock, window)
    }
}

impl<R: Recognizer, C: Clock> SustainedMatchGate<R, C> {
    pub fn with_clock(recognizer: R, clock: C, window: Duration) -> Self {
        Self {
            recognizer,
            clock,
            window,
        }
    }

    pub fn into_recognizer(self) -> R {
        self.recognizer
    }

    fn run(&mut self, identity: &BiometricIdentity) -> Result<VerificationOutcome, LatchkeyError> {
        let mut streak_start: Option<Instant> = None;

        loop {
            let Some(verdict) = self.recognizer.next_frame(identity)? else {
                debug!("capture stream ended without sustained match");
                return Ok(VerificationOutcome::Rejected);
            };

            match verdict {
                FrameVerdict::Match => {
                    let now = self.clock.now();
                    let start = *streak_start.get_or_insert(now);
                    if now.saturating_duration_since(start) >= self.window {
                        return Ok(VerificationOutcome::Accepted);
                    }
                }
                FrameVerdict::NoMatch | FrameVerdict::NoFace => {
                    if streak_start.take().is_some() {
                        debug!(%verdict, "recognition interrupted, window reset");
                    }
                }
                FrameVerdict::Cancel => return Ok(VerificationOutcome::Aborted),
            }
        }
    }
}

impl<R: Recognizer, C: Clock> BiometricGate for SustainedMatchGate<R, C> {
    fn has_enrolled_identity(&self, identity: &BiometricIdentity) -> bool {
        identity.template.is_file()
    }

    fn verify(&mut self, identity: &BiometricIdentity) -> Result<VerificationOutcome, LatchkeyError> {
        if !self.has_enrolled_identity(identity) {
            return Err(LatchkeyError::NotInitialized(format!(
                "no trained template at {}",
                identity.template.display()
            )));
        }

        let outcome = self.run(identity);
        // The device is released on every path, including errors.
        self.recognizer.release();

        if let Ok(outcome) = &outcome {
            info!(operator = %identity.name, %outcome, "biometric verification finished");
        }
        outcome
    }

    fn enroll(&mut self, identity: &BiometricIdentity, sample_count: u32) -> Result<(), LatchkeyError> {
        let kept = self.recognizer.capture_samples(identity, sample_count);
        self.recognizer.release();
        let kept = kept?;
        if kept == 0 {
            return Err(LatchkeyError::Biometric(
                "no face samples were captured".to_string(),
            ));
        }
        info!(operator = %identity.name, kept, requested = sample_count, "face samples captured");
        Ok(())
    }

    fn train(&mut self, identity: &BiometricIdentity) -> Result<(), LatchkeyError> {
        self.recognizer.train(identity)?;
        if !identity.template.is_file() {
            return Err(LatchkeyError::Biometric(format!(
                "training did not produce a template at {}",
                identity.template.display()
            )));
        }
        info!(operator = %identity.name, "identity template trained");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::collections::VecDeque;

    /// Advances by `step` on every reading.
    struct StepClock {
        now: Cell<Instant>,
        step: Duration,
    }

    impl StepClock {
        fn new(step: Duration) -> Self {
            Self {
                now: Cell::new(Instant::now()),
                step,
            }
        }
    }

    impl Clock for StepClock {
        fn now(&self) -> Instant {
            let t = self.now.get() + self.step;
            self.now.set(t);
            t
        }
    }

    #[derive(Default)]
    struct Frames {
        frames: VecDeque<FrameVerdict>,
        released: u32,
        fail: bool,
    }

    impl Frames {
        fn of(verdicts: &[FrameVerdict]) -> Self {
            Self {
                frames: verdicts.iter().copied().collect(),
                ..Self::default()
            }
        }
    }

    impl Recognizer for Frames {
        fn next_frame(
            &mut self,
            _identity: &BiometricIdentity,
        ) -> Result<Option<FrameVerdict>, LatchkeyError> {
            if self.fail {
                return Err(LatchkeyError::Biometric("camera busy".into()));
            }
            Ok(self.frames.pop_front())
        }

        fn capture_samples(
            &mut self,
            _identity: &BiometricIdentity,
            count: u32,
        ) -> Result<u32, LatchkeyError> {
            Ok(count.min(self.frames.len() as u32))
        }

        fn train(&mut self, identity: &BiometricIdentity) -> Result<(), LatchkeyError> {
            std::fs::write(&identity.template, b"model").map_err(|e| LatchkeyError::io(&identity.template, e))
        }

        fn release(&mut self) {
            self.released += 1;
        }
    }

    fn enrolled(dir: &tempfile::TempDir) -> BiometricIdentity {
        let template = dir.path().join("trainer.yml");
        std::fs::write(&template, b"model").unwrap();
        BiometricIdentity {
            name: "alice".into(),
            template,
        }
    }

    fn gate(frames: &[FrameVerdict]) -> SustainedMatchGate<Frames, StepClock> {
        // One second per frame, three second window.
        SustainedMatchGate::with_clock(
            Frames::of(frames),
            StepClock::new(Duration::from_secs(1)),
            Duration::from_secs(3),
        )
    }

    use FrameVerdict::{Cancel, Match, NoFace, NoMatch};

    #[test]
    fn sustained_match_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let id = enrolled(&dir);
        let mut gate = gate(&[Match, Match, Match, Match]);

        assert_eq!(gate.verify(&id).unwrap(), VerificationOutcome::Accepted);
        assert_eq!(gate.into_recognizer().released, 1);
    }

    #[test]
    fn single_match_is_not_enough() {
        let dir = tempfile::tempdir().unwrap();
        let id = enrolled(&dir);
        let mut gate = gate(&[Match]);
        assert_eq!(gate.verify(&id).unwrap(), VerificationOutcome::Rejected);
    }

    #[test]
    fn interruption_resets_window() {
        let dir = tempfile::tempdir().unwrap();
        let id = enrolled(&dir);
        // Six matches in total, but never four in a row.
        let mut gate = gate(&[Match, Match, Match, NoFace, Match, Match, NoMatch, Match]);
        assert_eq!(gate.verify(&id).unwrap(), VerificationOutcome::Rejected);
    }

    #[test]
    fn cancel_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let id = enrolled(&dir);
        let mut gate = gate(&[Match, Match, Cancel, Match, Match, Match, Match]);

        let outcome = gate.verify(&id).unwrap();
        assert_eq!(outcome, VerificationOutcome::Aborted);
        assert!(!outcome.unlocks());
    }

    #[test]
    fn recognizer_error_still_releases_device() {
        let dir = tempfile::tempdir().unwrap();
        let id = enrolled(&dir);
        let mut frames = Frames::of(&[Match]);
        frames.fail = true;
        let mut gate = SustainedMatchGate::with_clock(
            frames,
            StepClock::new(Duration::from_secs(1)),
            Duration::from_secs(3),
        );

        assert!(matches!(gate.verify(&id), Err(LatchkeyError::Biometric(_))));
        assert_eq!(gate.into_recognizer().released, 1);
    }

    #[test]
    fn verify_without_template_is_not_initialized() {
        let dir = tempfile::tempdir().unwrap();
        let id = BiometricIdentity {
            name: "alice".into(),
            template: dir.path().join("missing.yml"),
        };
        let mut gate = gate(&[Match, Match, Match, Match]);

        assert!(!gate.has_enrolled_identity(&id));
        assert!(matches!(
            gate.verify(&id),
            Err(LatchkeyError::NotInitialized(_))
        ));
    }

    #[test]
    fn enroll_and_train_produce_template() {
        let dir = tempfile::tempdir().unwrap();
        let id = BiometricIdentity {
            name: "alice".into(),
            template: dir.path().join("trainer.yml"),
        };
        let mut gate = gate(&[Match, Match]);

        gate.enroll(&id, 50).unwrap();
        gate.train(&id).unwrap();
        assert!(gate.has_enrolled_identity(&id));
    }

    #[test]
    fn enroll_with_no_samples_fails() {
        let dir = tempfile::tempdir().unwrap();
        let id = enrolled(&dir);
        let mut gate = gate(&[]);
        assert!(matches!(gate.enroll(&id, 50), Err(LatchkeyError::Biometric(_))));
    }
}
