// SPDX-FileCopyrightText: 2026 Latchkey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `latchkey shell` command implementation.
//!
//! Unlocks once and keeps the table resident across commands. The table is
//! sealed when the REPL exits, whether by `quit`, Ctrl-C, or Ctrl-D.

use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use latchkey_config::LatchkeyConfig;
use latchkey_core::{ClipboardSink, LatchkeyError};
use latchkey_vault::{
    ClearHandle, SecureClipboard, SustainedMatchGate, VaultSession, read_new_passphrase_pair,
};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::debug;

use crate::clipboard::CommandClipboard;
use crate::commands::print_rows;
use crate::frames::CommandFrameSource;
use crate::unlock;

const HELP: &str = "\
commands:
  list [--reveal]        show stored credentials
  show <site>            show one credential, password included
  add <site> <username>  add or update a credential
  rm <site>              remove a credential
  copy <site>            copy a password (auto-cleared)
  rotate                 change the master passphrase
  enroll <name>          enroll a face for biometric unlock
  help                   this text
  quit                   seal and exit";

/// One parsed REPL line.
#[derive(Debug, PartialEq, Eq)]
enum ShellCommand<'a> {
    List { reveal: bool },
    Show(&'a str),
    Add { site: &'a str, username: &'a str },
    Remove(&'a str),
    Copy(&'a str),
    Rotate,
    Enroll(&'a str),
    Help,
    Quit,
}

fn parse(line: &str) -> Result<ShellCommand<'_>, String> {
    let words: Vec<&str> = line.split_whitespace().collect();
    match words.as_slice() {
        ["list"] | ["ls"] => Ok(ShellCommand::List { reveal: false }),
        ["list", "--reveal"] | ["ls", "--reveal"] => Ok(ShellCommand::List { reveal: true }),
        ["show", site] => Ok(ShellCommand::Show(site)),
        ["add", site, username] => Ok(ShellCommand::Add { site, username }),
        ["rm", site] | ["remove", site] => Ok(ShellCommand::Remove(site)),
        ["copy", site] | ["cp", site] => Ok(ShellCommand::Copy(site)),
        ["rotate"] => Ok(ShellCommand::Rotate),
        ["enroll", name] => Ok(ShellCommand::Enroll(name)),
        ["help"] | ["?"] => Ok(ShellCommand::Help),
        ["quit"] | ["exit"] => Ok(ShellCommand::Quit),
        [cmd, ..] => Err(format!("unknown or malformed command `{cmd}` (try `help`)")),
        [] => Err("empty command".to_string()),
    }
}

/// Runs the `latchkey shell` REPL over one open session.
pub async fn run_shell(config: &LatchkeyConfig, biometric: bool) -> Result<(), LatchkeyError> {
    let mut session = unlock::open(config, biometric)?;
    let sink = CommandClipboard::from_config(&config.clipboard)
        .ok()
        .map(Arc::new);
    let clipboard = sink.clone().map(|sink| {
        SecureClipboard::new(sink, Duration::from_secs(config.clipboard.clear_after_secs))
    });

    let mut rl = DefaultEditor::new()
        .map_err(|e| LatchkeyError::Internal(format!("failed to initialize readline: {e}")))?;

    println!("{}", "latchkey shell".bold().green());
    println!("Type {} for commands, {} to seal and exit.\n", "help".yellow(), "quit".yellow());

    let prompt = format!("{}> ", "latchkey".green());
    let mut pending_clear: Option<ClearHandle> = None;
    loop {
        match rl.readline(&prompt) {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(trimmed);

                let command = match parse(trimmed) {
                    Ok(command) => command,
                    Err(msg) => {
                        eprintln!("{}: {msg}", "error".red());
                        continue;
                    }
                };
                if command == ShellCommand::Quit {
                    break;
                }
                match handle(&mut session, config, clipboard.as_ref(), command) {
                    Ok(Some(handle)) => pending_clear = Some(handle),
                    Ok(None) => {}
                    Err(e) => eprintln!("{}: {e}", "error".red()),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("{}: {e}", "error".red());
                break;
            }
        }
    }

    session.close()?;
    println!("{}", "vault sealed".dimmed());

    if let Some(handle) = pending_clear {
        if !handle.is_finished() {
            println!("{}", "waiting for clipboard clear (Ctrl-C clears now)...".dimmed());
            tokio::select! {
                () = handle.finished() => {}
                _ = tokio::signal::ctrl_c() => {
                    if let Some(sink) = &sink {
                        sink.clear()?;
                    }
                }
            }
        }
    }
    Ok(())
}

fn handle(
    session: &mut VaultSession,
    config: &LatchkeyConfig,
    clipboard: Option<&SecureClipboard>,
    command: ShellCommand<'_>,
) -> Result<Option<ClearHandle>, LatchkeyError> {
    debug!(?command, "shell command");
    match command {
        ShellCommand::List { reveal } => print_rows(&session.list()?, reveal),
        ShellCommand::Show(site) => match session.lookup(site)? {
            Some(row) => print_rows(std::slice::from_ref(&row), true),
            None => println!("{} no credential for {}", "note:".cyan(), site.bold()),
        },
        ShellCommand::Add { site, username } => {
            let password = unlock::read_site_password(site)?;
            session.upsert(site, username, &password)?;
            println!("{} saved {}", "ok:".green(), site.bold());
        }
        ShellCommand::Remove(site) => {
            if session.remove(site)? {
                println!("{} removed {}", "ok:".green(), site.bold());
            } else {
                println!("{} no credential for {}", "note:".cyan(), site.bold());
            }
        }
        ShellCommand::Copy(site) => {
            let clipboard = clipboard.ok_or_else(|| {
                LatchkeyError::Config("clipboard.copy_command is not set".to_string())
            })?;
            return match session.copy_password(site, clipboard)? {
                Some(handle) => {
                    println!(
                        "copied; clears in {}s",
                        clipboard.clear_after().as_secs()
                    );
                    Ok(Some(handle))
                }
                None => {
                    println!("{} no credential for {}", "note:".cyan(), site.bold());
                    Ok(None)
                }
            };
        }
        ShellCommand::Rotate => {
            let (new, confirm) = read_new_passphrase_pair("New master passphrase")?;
            session.rotate_passphrase(&new, &confirm)?;
            println!("{} master passphrase changed", "ok:".green());
        }
        ShellCommand::Enroll(name) => {
            let recognizer = CommandFrameSource::from_config(&config.biometric)?;
            let mut gate = SustainedMatchGate::new(
                recognizer,
                Duration::from_secs(config.biometric.stabilization_secs),
            );
            session.reenroll(&mut gate, name)?;
            println!("{} {} enrolled", "ok:".green(), name.bold());
        }
        ShellCommand::Help => println!("{HELP}"),
        ShellCommand::Quit => {}
    }
    Ok(None)
}
