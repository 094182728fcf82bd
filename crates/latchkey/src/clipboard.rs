// SPDX-FileCopyrightText: 2026 Latchkey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! System clipboard through an external copy command (`wl-copy`, `pbcopy`...).

use std::io::Write;
use std::process::{Command, Stdio};

use latchkey_config::model::ClipboardConfig;
use latchkey_core::{ClipboardSink, LatchkeyError};

/// Pipes clipboard text into `copy_command` via stdin.
#[derive(Debug, Clone)]
pub struct CommandClipboard {
    command: String,
}

impl CommandClipboard {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    pub fn from_config(config: &ClipboardConfig) -> Result<Self, LatchkeyError> {
        config
            .copy_command
            .as_deref()
            .map(Self::new)
            .ok_or_else(|| LatchkeyError::Config("clipboard.copy_command is not set".to_string()))
    }
}

impl ClipboardSink for CommandClipboard {
    fn set_text(&self, text: &str) -> Result<(), LatchkeyError> {
        let fail = |e: std::io::Error| {
            LatchkeyError::Internal(format!("clipboard command `{}` failed: {e}", self.command))
        };

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .spawn()
            .map_err(fail)?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(text.as_bytes()).map_err(fail)?;
        }
        let status = child.wait().map_err(fail)?;
        if !status.success() {
            return Err(LatchkeyError::Internal(format!(
                "clipboard command `{}` exited with {status}",
                self.command
            )));
        }
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn text_is_piped_to_command() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("clip");
        let clipboard = CommandClipboard::new(format!("cat > '{}'", out.display()));

        clipboard.set_text("p@ss").unwrap();
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "p@ss");

        clipboard.clear().unwrap();
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "");
    }

    #[test]
    fn failing_command_is_an_error() {
        let clipboard = CommandClipboard::new("cat > /dev/null; exit 1");
        assert!(clipboard.set_text("x").is_err());
    }

    #[test]
    fn unset_command_is_config_error() {
        assert!(matches!(
            CommandClipboard::from_config(&ClipboardConfig::default()),
            Err(LatchkeyError::Config(_))
        ));
    }
}
