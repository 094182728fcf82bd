// SPDX-FileCopyrightText: 2026 Latchkey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Passphrase acquisition via TTY prompt or the LATCHKEY_PASSPHRASE environment variable.

use std::io::IsTerminal;

use latchkey_core::LatchkeyError;
use secrecy::{ExposeSecret, SecretString};

/// The environment variable name for providing the master passphrase.
pub const PASSPHRASE_ENV_VAR: &str = "LATCHKEY_PASSPHRASE";

/// Get the master passphrase from the environment or an interactive prompt.
///
/// Priority:
/// 1. `LATCHKEY_PASSPHRASE` environment variable (scripts, tests)
/// 2. Interactive TTY prompt via `rpassword`
pub fn read_passphrase(label: &str) -> Result<SecretString, LatchkeyError> {
    if let Some(from_env) = passphrase_from_env() {
        return Ok(from_env);
    }

    if std::io::stdin().is_terminal() {
        return prompt(label);
    }

    Err(no_source())
}

/// Get a new passphrase, typed twice.
///
/// Returns `(passphrase, confirmation)` unchecked, so the caller decides what
/// a mismatch means. The environment variable counts as both.
pub fn read_new_passphrase_pair(label: &str) -> Result<(SecretString, SecretString), LatchkeyError> {
    if let Some(from_env) = passphrase_from_env() {
        let confirm = SecretString::from(from_env.expose_secret().to_string());
        return Ok((from_env, confirm));
    }

    if std::io::stdin().is_terminal() {
        let first = prompt(label)?;
        let second = prompt(&format!("Confirm {}", label.to_lowercase()))?;
        return Ok((first, second));
    }

    Err(no_source())
}

/// Get a new passphrase, typed twice, failing with
/// [`LatchkeyError::PassphraseMismatch`] if the two entries differ.
pub fn read_new_passphrase(label: &str) -> Result<SecretString, LatchkeyError> {
    let (first, second) = read_new_passphrase_pair(label)?;
    if first.expose_secret() != second.expose_secret() {
        return Err(LatchkeyError::PassphraseMismatch);
    }
    Ok(first)
}

fn passphrase_from_env() -> Option<SecretString> {
    std::env::var(PASSPHRASE_ENV_VAR)
        .ok()
        .filter(|value| !value.is_empty())
        .map(SecretString::from)
}

fn prompt(label: &str) -> Result<SecretString, LatchkeyError> {
    let entered = rpassword::prompt_password(format!("{label}: "))
        .map_err(|e| LatchkeyError::Internal(format!("failed to read passphrase: {e}")))?;
    if entered.is_empty() {
        return Err(LatchkeyError::Config("empty passphrase not allowed".to_string()));
    }
    Ok(SecretString::from(entered))
}

fn no_source() -> LatchkeyError {
    LatchkeyError::Config(format!(
        "no passphrase provided; set {PASSPHRASE_ENV_VAR} or run interactively"
    ))
}
