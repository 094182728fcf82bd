// SPDX-FileCopyrightText: 2026 Latchkey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Startup and unlock flow shared by every command that touches records.

use std::io::{BufRead, IsTerminal, Write};
use std::path::Path;
use std::time::Duration;

use colored::Colorize;
use latchkey_config::LatchkeyConfig;
use latchkey_core::{BiometricGate, LatchkeyError, VolumePath};
use latchkey_vault::{
    KeyMaterialStore, KeyStatus, SustainedMatchGate, SystemVolumeProbe, VaultSession,
    read_passphrase,
};
use secrecy::SecretString;
use tracing::{info, warn};

use crate::frames::CommandFrameSource;

/// Find the volume, provision the key, and return a locked session.
pub fn start(config: &LatchkeyConfig) -> Result<VaultSession, LatchkeyError> {
    let probe = SystemVolumeProbe::new(config.volumes.allow_fixed);
    let (session, status) = VaultSession::start(config, &probe, confirm_regeneration)?;
    match status {
        KeyStatus::Existing => {}
        KeyStatus::Generated => eprintln!(
            "{} new key written to {}",
            "note:".cyan(),
            session.volume()
        ),
        KeyStatus::Regenerated => eprintln!(
            "{} key regenerated on {}; all previous credentials were erased",
            "warning:".yellow(),
            session.volume()
        ),
    }
    Ok(session)
}

/// Volume that would be used, without writing anything to it.
pub fn locate_volume(config: &LatchkeyConfig) -> Result<VolumePath, LatchkeyError> {
    let probe = SystemVolumeProbe::new(config.volumes.allow_fixed);
    let volumes = KeyMaterialStore::detect_removable_volumes(&probe)?;
    let preferred = config.volumes.preferred_mount.as_deref().map(Path::new);
    KeyMaterialStore::select_volume(&volumes, preferred)
}

/// Start and unlock, by face if `biometric` is set, otherwise by passphrase.
///
/// A biometric attempt that fails for any reason other than a damaged key,
/// credential file, or volume falls back to the passphrase.
pub fn open(config: &LatchkeyConfig, biometric: bool) -> Result<VaultSession, LatchkeyError> {
    let mut session = start(config)?;
    if !session.master().is_initialized() {
        return Err(LatchkeyError::NotInitialized(
            "no master passphrase; run `latchkey init` first".to_string(),
        ));
    }

    if biometric {
        let attempt = try_biometric(&mut session, || {
            let recognizer = CommandFrameSource::from_config(&config.biometric)?;
            let window = Duration::from_secs(config.biometric.stabilization_secs);
            eprintln!("Look at the camera...");
            Ok(SustainedMatchGate::new(recognizer, window))
        })?;
        if let Some(name) = attempt {
            eprintln!("{} {}", "Welcome,".green(), name.bold());
            return Ok(session);
        }
    }

    let passphrase = read_passphrase("Master passphrase")?;
    session.unlock_with_passphrase(&passphrase)?;
    info!("unlocked with passphrase");
    Ok(session)
}

/// One face unlock attempt with the gate `build_gate` produces.
///
/// `Ok(None)` means the session is still locked and the passphrase gate
/// should be asked instead. Errors building the gate count as a failed
/// attempt.
fn try_biometric<G, F>(
    session: &mut VaultSession,
    build_gate: F,
) -> Result<Option<String>, LatchkeyError>
where
    G: BiometricGate,
    F: FnOnce() -> Result<G, LatchkeyError>,
{
    let attempt = build_gate().and_then(|mut gate| session.unlock_with_biometric(&mut gate));
    match attempt {
        Ok(name) => Ok(Some(name)),
        Err(e) if e.permits_passphrase_fallback() => {
            warn!(error = %e, "biometric unlock unavailable");
            eprintln!("{} {e}; falling back to passphrase", "warning:".yellow());
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Ask before regenerating a key that would orphan existing records.
fn confirm_regeneration(volume: &VolumePath) -> bool {
    eprintln!(
        "{} no key found on {volume}, but the credential file holds records.",
        "warning:".yellow().bold()
    );
    eprintln!("Generating a new key permanently erases every stored credential.");
    if !std::io::stdin().is_terminal() {
        return false;
    }
    eprint!("Type ERASE to continue: ");
    let _ = std::io::stderr().flush();
    let mut answer = String::new();
    if std::io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    answer.trim() == "ERASE"
}

/// Read a site password: twice on a terminal, one line from a pipe.
pub fn read_site_password(site: &str) -> Result<SecretString, LatchkeyError> {
    let read_err = |e: std::io::Error| LatchkeyError::Internal(format!("failed to read password: {e}"));

    let password = if std::io::stdin().is_terminal() {
        let first = rpassword::prompt_password(format!("Password for {site}: ")).map_err(read_err)?;
        let second = rpassword::prompt_password("Confirm password: ").map_err(read_err)?;
        if first != second {
            return Err(LatchkeyError::PassphraseMismatch);
        }
        first
    } else {
        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line).map_err(read_err)?;
        line.trim_end_matches(['\r', '\n']).to_string()
    };

    if password.is_empty() {
        return Err(LatchkeyError::Config("empty password not allowed".to_string()));
    }
    Ok(SecretString::from(password))
}

#[cfg(test)]
mod tests {
    use super::*;
    use latchkey_core::SessionState;
    use latchkey_test_utils::{ScriptedBiometricGate, TestVault};

    const PASSPHRASE: &str = "correct horse battery staple";

    fn locked_session(vault: &TestVault) -> VaultSession {
        vault.start().unwrap().0
    }

    #[test]
    fn unenrolled_operator_falls_back_to_passphrase() {
        let vault = TestVault::builder().with_passphrase(PASSPHRASE).build().unwrap();
        let mut session = locked_session(&vault);

        let attempt = try_biometric(&mut session, || Ok(ScriptedBiometricGate::default())).unwrap();
        assert_eq!(attempt, None);
        assert_eq!(session.state(), SessionState::Locked);

        session
            .unlock_with_passphrase(&SecretString::from(PASSPHRASE.to_string()))
            .unwrap();
        assert_eq!(session.state(), SessionState::Open);
    }

    #[test]
    fn missing_recognizer_falls_back_to_passphrase() {
        let vault = TestVault::builder().with_passphrase(PASSPHRASE).build().unwrap();
        let mut session = locked_session(&vault);

        let attempt = try_biometric(&mut session, || {
            Err::<ScriptedBiometricGate, _>(LatchkeyError::Config(
                "biometric.verifier_command is not set".to_string(),
            ))
        })
        .unwrap();
        assert_eq!(attempt, None);
        assert_eq!(session.state(), SessionState::Locked);
    }

    #[test]
    fn damaged_credential_file_is_not_retried() {
        let vault = TestVault::builder().with_passphrase(PASSPHRASE).build().unwrap();
        let mut session = locked_session(&vault);

        let err = try_biometric(&mut session, || {
            Err::<ScriptedBiometricGate, _>(LatchkeyError::DecryptionFailure(
                "authentication tag mismatch".to_string(),
            ))
        })
        .unwrap_err();
        assert!(matches!(err, LatchkeyError::DecryptionFailure(_)));
    }
}
