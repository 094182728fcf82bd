// SPDX-FileCopyrightText: 2026 Latchkey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Latchkey - a credential vault keyed to a removable drive.
//!
//! This is the binary entry point.

mod clipboard;
mod commands;
mod frames;
mod shell;
mod unlock;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::Colorize;
use latchkey_config::LatchkeyConfig;
use latchkey_core::LatchkeyError;
use tracing_subscriber::EnvFilter;

/// Latchkey - a credential vault keyed to a removable drive.
#[derive(Parser, Debug)]
#[command(name = "latchkey", version, about, long_about = None)]
struct Cli {
    /// Unlock by face recognition, falling back to the passphrase.
    #[arg(long, global = true)]
    biometric: bool,

    /// Read configuration from this file instead of the XDG hierarchy.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Provision the drive key and set the master passphrase.
    Init,
    /// Show volume, key, and enrollment state without unlocking.
    Status,
    /// List stored credentials.
    List {
        /// Print passwords instead of masking them.
        #[arg(long)]
        reveal: bool,
    },
    /// Add a credential, or replace the one stored for the site.
    Add { site: String, username: String },
    /// Remove the credential for a site.
    Remove { site: String },
    /// Copy a site's password to the clipboard; cleared automatically.
    Copy { site: String },
    /// Change the master passphrase.
    RotatePassphrase,
    /// Enroll (or re-enroll) the operator's face.
    Enroll {
        /// Operator name; defaults to the currently enrolled one.
        #[arg(long)]
        name: Option<String>,
    },
    /// Unlock once and run an interactive shell.
    Shell,
    /// Print the effective configuration.
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => latchkey_config::load_and_validate_path(path),
        None => latchkey_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            latchkey_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.log.level);

    if let Err(e) = run(cli, &config).await {
        eprintln!("{}: {e}", "error".red());
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: &LatchkeyConfig) -> Result<(), LatchkeyError> {
    let biometric = cli.biometric;
    match cli.command {
        Some(Commands::Init) => commands::init(config),
        Some(Commands::Status) => commands::status(config),
        Some(Commands::List { reveal }) => commands::list(config, biometric, reveal),
        Some(Commands::Add { site, username }) => commands::add(config, biometric, &site, &username),
        Some(Commands::Remove { site }) => commands::remove(config, biometric, &site),
        Some(Commands::Copy { site }) => commands::copy(config, biometric, &site).await,
        Some(Commands::RotatePassphrase) => commands::rotate_passphrase(config, biometric),
        Some(Commands::Enroll { name }) => commands::enroll(config, biometric, name.as_deref()),
        Some(Commands::Shell) => shell::run_shell(config, biometric).await,
        Some(Commands::Config) => commands::show_config(config),
        None => {
            println!("latchkey: use --help for available commands");
            Ok(())
        }
    }
}

/// Logs go to stderr so command output on stdout stays clean.
fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("latchkey={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
