// SPDX-FileCopyrightText: 2026 Latchkey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recognizer backed by an external camera helper.
//!
//! The helper is run through `sh -c` with one of three modes appended:
//!
//! - `verify`: print one verdict per frame (`match`, `nomatch`, `noface`,
//!   `cancel`) until killed or out of frames;
//! - `enroll <count>`: capture samples, print the number kept as the last line;
//! - `train`: build the template, exit 0 on success.
//!
//! `LATCHKEY_OPERATOR` and `LATCHKEY_TEMPLATE` are set in its environment.

use std::io::{BufRead, BufReader};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::str::FromStr;

use latchkey_config::model::BiometricConfig;
use latchkey_core::{BiometricIdentity, FrameVerdict, LatchkeyError, Recognizer};
use tracing::{debug, warn};

/// Drives the configured `verifier_command`.
#[derive(Debug)]
pub struct CommandFrameSource {
    command: String,
    running: Option<(Child, BufReader<ChildStdout>)>,
}

impl CommandFrameSource {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            running: None,
        }
    }

    pub fn from_config(config: &BiometricConfig) -> Result<Self, LatchkeyError> {
        if !config.enabled {
            return Err(LatchkeyError::Config(
                "biometric unlock is disabled (biometric.enabled = false)".to_string(),
            ));
        }
        let command = config.verifier_command.as_deref().ok_or_else(|| {
            LatchkeyError::Config("biometric.verifier_command is not set".to_string())
        })?;
        Ok(Self::new(command))
    }

    fn command(&self, identity: &BiometricIdentity, mode: &str, extra: &[String]) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(format!("{} \"$@\"", self.command))
            .arg("latchkey-verifier")
            .arg(mode)
            .args(extra)
            .env("LATCHKEY_OPERATOR", &identity.name)
            .env("LATCHKEY_TEMPLATE", &identity.template)
            .stdin(Stdio::null());
        cmd
    }

    fn helper_error(&self, e: std::io::Error) -> LatchkeyError {
        LatchkeyError::Biometric(format!("failed to run `{}`: {e}", self.command))
    }
}

impl Recognizer for CommandFrameSource {
    fn next_frame(
        &mut self,
        identity: &BiometricIdentity,
    ) -> Result<Option<FrameVerdict>, LatchkeyError> {
        if self.running.is_none() {
            let mut child = self
                .command(identity, "verify", &[])
                .stdout(Stdio::piped())
                .spawn()
                .map_err(|e| self.helper_error(e))?;
            let stdout = child
                .stdout
                .take()
                .ok_or_else(|| LatchkeyError::Internal("helper stdout not captured".to_string()))?;
            debug!(command = %self.command, "verifier started");
            self.running = Some((child, BufReader::new(stdout)));
        }

        let Some((_, reader)) = self.running.as_mut() else {
            return Ok(None);
        };
        let mut line = String::new();
        loop {
            line.clear();
            let read = reader
                .read_line(&mut line)
                .map_err(|e| LatchkeyError::Biometric(format!("verifier output: {e}")))?;
            if read == 0 {
                return Ok(None);
            }
            let verdict = line.trim();
            if verdict.is_empty() {
                continue;
            }
            return FrameVerdict::from_str(verdict).map(Some).map_err(|_| {
                LatchkeyError::Biometric(format!("unexpected verifier output `{verdict}`"))
            });
        }
    }

    fn capture_samples(
        &mut self,
        identity: &BiometricIdentity,
        count: u32,
    ) -> Result<u32, LatchkeyError> {
        let output = self
            .command(identity, "enroll", &[count.to_string()])
            .stdout(Stdio::piped())
            .output()
            .map_err(|e| self.helper_error(e))?;
        if !output.status.success() {
            return Err(LatchkeyError::Biometric(format!(
                "enrollment helper exited with {}",
                output.status
            )));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let last = stdout.lines().map(str::trim).filter(|l| !l.is_empty()).last();
        last.and_then(|l| l.parse().ok()).ok_or_else(|| {
            LatchkeyError::Biometric("enrollment helper did not report a sample count".to_string())
        })
    }

    fn train(&mut self, identity: &BiometricIdentity) -> Result<(), LatchkeyError> {
        let status = self
            .command(identity, "train", &[])
            .status()
            .map_err(|e| self.helper_error(e))?;
        if !status.success() {
            return Err(LatchkeyError::Biometric(format!(
                "training helper exited with {status}"
            )));
        }
        Ok(())
    }

    fn release(&mut self) {
        if let Some((mut child, _)) = self.running.take() {
            if let Err(e) = child.kill() {
                debug!(error = %e, "verifier already exited");
            }
            if let Err(e) = child.wait() {
                warn!(error = %e, "failed to reap verifier");
            }
        }
    }
}

impl Drop for CommandFrameSource {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn identity(dir: &tempfile::TempDir) -> BiometricIdentity {
        BiometricIdentity {
            name: "alice".into(),
            template: dir.path().join("trainer.yml"),
        }
    }

    #[test]
    fn verify_mode_streams_verdicts() {
        let dir = tempfile::tempdir().unwrap();
        let id = identity(&dir);
        let mut source = CommandFrameSource::new("printf 'match\\n\\nnoface\\ncancel\\n'; true");

        assert_eq!(source.next_frame(&id).unwrap(), Some(FrameVerdict::Match));
        assert_eq!(source.next_frame(&id).unwrap(), Some(FrameVerdict::NoFace));
        assert_eq!(source.next_frame(&id).unwrap(), Some(FrameVerdict::Cancel));
        assert_eq!(source.next_frame(&id).unwrap(), None);
        source.release();
    }

    #[test]
    fn garbage_output_is_biometric_error() {
        let dir = tempfile::tempdir().unwrap();
        let id = identity(&dir);
        let mut source = CommandFrameSource::new("echo maybe; true");
        assert!(matches!(
            source.next_frame(&id),
            Err(LatchkeyError::Biometric(_))
        ));
    }

    #[test]
    fn helper_sees_mode_and_identity() {
        let dir = tempfile::tempdir().unwrap();
        let id = identity(&dir);
        // Enroll echoes back the requested count, train writes the template.
        let script = r#"helper() { case "$1" in enroll) echo "capturing"; echo "$2";; train) echo "$LATCHKEY_OPERATOR" > "$LATCHKEY_TEMPLATE";; esac; }; helper"#;
        let mut source = CommandFrameSource::new(script);

        assert_eq!(source.capture_samples(&id, 7).unwrap(), 7);
        source.train(&id).unwrap();
        assert_eq!(std::fs::read_to_string(&id.template).unwrap().trim(), "alice");
    }

    #[test]
    fn failing_trainer_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let id = identity(&dir);
        let mut source = CommandFrameSource::new("exit 3; :");
        assert!(matches!(source.train(&id), Err(LatchkeyError::Biometric(_))));
    }

    #[test]
    fn missing_command_is_config_error() {
        let config = BiometricConfig::default();
        assert!(matches!(
            CommandFrameSource::from_config(&config),
            Err(LatchkeyError::Config(_))
        ));
    }
}
