// SPDX-FileCopyrightText: 2026 Latchkey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-shot subcommands. Each opens a session, does one thing, and closes it.

use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use latchkey_config::LatchkeyConfig;
use latchkey_core::{ClipboardSink, LatchkeyError};
use latchkey_vault::{
    DecryptedRow, IdentityMarker, SecureClipboard, SustainedMatchGate, VaultPaths, VaultSession,
    read_new_passphrase, read_new_passphrase_pair,
};
use secrecy::ExposeSecret;

use crate::clipboard::CommandClipboard;
use crate::frames::CommandFrameSource;
use crate::unlock;

/// Shown instead of passwords unless `--reveal` is given.
const MASK: &str = "********";

/// `latchkey init`: provision the key and set the master passphrase.
pub fn init(config: &LatchkeyConfig) -> Result<(), LatchkeyError> {
    let session = unlock::start(config)?;
    if session.master().is_initialized() {
        return Err(LatchkeyError::AlreadyInitialized(
            "master passphrase already set; use `latchkey rotate-passphrase`".to_string(),
        ));
    }
    let passphrase = read_new_passphrase("New master passphrase")?;
    session.master().initialize(&passphrase)?;

    println!("{} vault ready on {}", "ok:".green(), session.volume());
    if config.biometric.enabled {
        println!("Run {} to add face unlock.", "latchkey enroll".bold());
    }
    Ok(())
}

/// `latchkey status`: report without unlocking and without writing.
pub fn status(config: &LatchkeyConfig) -> Result<(), LatchkeyError> {
    let paths = VaultPaths::from_config(config);
    let volume = match unlock::locate_volume(config) {
        Ok(volume) => volume,
        Err(LatchkeyError::NoRemovableVolume) => {
            println!("{:<14} {}", "volume:", "not detected".red());
            println!("{:<14} {}", "data dir:", paths.data_dir.display());
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    let status = VaultSession::from_config(config, volume).status()?;
    let yes_no = |b: bool| if b { "yes".green() } else { "no".red() };

    println!("{:<14} {}", "volume:", status.volume);
    println!("{:<14} {}", "key present:", yes_no(status.key_present));
    println!("{:<14} {}", "passphrase:", yes_no(status.passphrase_set));
    println!(
        "{:<14} {}",
        "face unlock:",
        status.operator.as_deref().unwrap_or("not enrolled")
    );
    println!("{:<14} {:?}", "table file:", status.file_state);
    println!("{:<14} {}", "data dir:", paths.data_dir.display());
    Ok(())
}

/// `latchkey list`.
pub fn list(config: &LatchkeyConfig, biometric: bool, reveal: bool) -> Result<(), LatchkeyError> {
    let mut session = unlock::open(config, biometric)?;
    print_rows(&session.list()?, reveal);
    session.close()
}

/// `latchkey add`.
pub fn add(
    config: &LatchkeyConfig,
    biometric: bool,
    site: &str,
    username: &str,
) -> Result<(), LatchkeyError> {
    let mut session = unlock::open(config, biometric)?;
    let password = unlock::read_site_password(site)?;
    let existed = session.lookup(site)?.is_some();
    session.upsert(site, username, &password)?;
    session.close()?;

    let verb = if existed { "updated" } else { "added" };
    println!("{} {verb} {}", "ok:".green(), site.bold());
    Ok(())
}

/// `latchkey remove`.
pub fn remove(config: &LatchkeyConfig, biometric: bool, site: &str) -> Result<(), LatchkeyError> {
    let mut session = unlock::open(config, biometric)?;
    let removed = session.remove(site)?;
    session.close()?;

    if removed {
        println!("{} removed {}", "ok:".green(), site.bold());
    } else {
        println!("{} no credential for {}", "note:".cyan(), site.bold());
    }
    Ok(())
}

/// `latchkey copy`: copy, seal, then wait for the clipboard clear.
///
/// Ctrl-C while waiting clears immediately.
pub async fn copy(config: &LatchkeyConfig, biometric: bool, site: &str) -> Result<(), LatchkeyError> {
    let sink = Arc::new(CommandClipboard::from_config(&config.clipboard)?);
    let clipboard = SecureClipboard::new(
        sink.clone(),
        Duration::from_secs(config.clipboard.clear_after_secs),
    );

    let mut session = unlock::open(config, biometric)?;
    let handle = session.copy_password(site, &clipboard)?;
    session.close()?;

    let Some(handle) = handle else {
        println!("{} no credential for {}", "note:".cyan(), site.bold());
        return Ok(());
    };

    println!(
        "Password for {} copied; clipboard clears in {}s.",
        site.bold(),
        clipboard.clear_after().as_secs()
    );
    tokio::select! {
        () = handle.finished() => {}
        _ = tokio::signal::ctrl_c() => {
            sink.clear()?;
        }
    }
    println!("Clipboard cleared.");
    Ok(())
}

/// `latchkey rotate-passphrase`.
pub fn rotate_passphrase(config: &LatchkeyConfig, biometric: bool) -> Result<(), LatchkeyError> {
    let mut session = unlock::open(config, biometric)?;
    let (new, confirm) = read_new_passphrase_pair("New master passphrase")?;
    let rotated = session.rotate_passphrase(&new, &confirm);
    session.close()?;
    rotated?;

    println!("{} master passphrase changed", "ok:".green());
    Ok(())
}

/// `latchkey enroll`: capture and train the operator's face.
pub fn enroll(
    config: &LatchkeyConfig,
    biometric: bool,
    name: Option<&str>,
) -> Result<(), LatchkeyError> {
    let recognizer = CommandFrameSource::from_config(&config.biometric)?;
    let mut session = unlock::open(config, biometric)?;

    let marker = IdentityMarker::from_paths(&VaultPaths::from_config(config));
    let name = match name {
        Some(name) => name.to_string(),
        None => marker.load()?.ok_or_else(|| {
            LatchkeyError::Config("pass --name for the first enrollment".to_string())
        })?,
    };

    let mut gate = SustainedMatchGate::new(
        recognizer,
        Duration::from_secs(config.biometric.stabilization_secs),
    );
    println!(
        "Capturing {} samples for {}; keep looking at the camera.",
        config.biometric.enrollment_samples,
        name.bold()
    );
    let enrolled = session.reenroll(&mut gate, &name);
    session.close()?;
    enrolled?;

    println!("{} {} enrolled for face unlock", "ok:".green(), name.bold());
    Ok(())
}

/// `latchkey config`: print the effective configuration.
pub fn show_config(config: &LatchkeyConfig) -> Result<(), LatchkeyError> {
    let rendered = toml::to_string_pretty(config)
        .map_err(|e| LatchkeyError::Config(format!("failed to render config: {e}")))?;
    print!("{rendered}");
    Ok(())
}

pub fn print_rows(rows: &[DecryptedRow], reveal: bool) {
    if rows.is_empty() {
        println!("{}", "(no credentials stored)".dimmed());
        return;
    }
    let width = rows.iter().map(|r| r.site.len()).max().unwrap_or(0).max(4);
    println!("{:<width$}  {:<24}  {}", "SITE".bold(), "USERNAME".bold(), "PASSWORD".bold());
    for row in rows {
        let password = match (&row.credentials, reveal) {
            (Ok(c), true) => c.password.expose_secret().to_string(),
            (Ok(_), false) => MASK.to_string(),
            (Err(_), _) => row.password_or_placeholder().red().to_string(),
        };
        let username = if row.is_ok() {
            row.username_or_placeholder().to_string()
        } else {
            row.username_or_placeholder().red().to_string()
        };
        println!("{:<width$}  {:<24}  {}", row.site, username, password);
    }
}
