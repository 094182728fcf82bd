// SPDX-FileCopyrightText: 2026 Latchkey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./latchkey.toml` > `~/.config/latchkey/latchkey.toml` > `/etc/latchkey/latchkey.toml`
//! with environment variable overrides via `LATCHKEY_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::LatchkeyConfig;

/// System-wide configuration file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/latchkey/latchkey.toml";

/// Configuration file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "latchkey.toml";

/// Sections addressable through `LATCHKEY_<SECTION>_<KEY>` variables.
const ENV_SECTIONS: &[&str] = &["vault", "volumes", "biometric", "clipboard", "log"];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/latchkey/latchkey.toml` (system-wide)
/// 3. `~/.config/latchkey/latchkey.toml` (user XDG config)
/// 4. `./latchkey.toml` (local directory)
/// 5. `LATCHKEY_*` environment variables
pub fn load_config() -> Result<LatchkeyConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<LatchkeyConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(LatchkeyConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<LatchkeyConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(LatchkeyConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading (exposed for diagnostic use).
///
/// Returns the Figment before extraction so callers can inspect metadata.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(LatchkeyConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_FILE))
        .merge(env_provider())
}

/// `~/.config/latchkey/latchkey.toml`, if the platform has a config dir.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("latchkey").join(LOCAL_CONFIG_FILE))
}

/// Create the environment variable provider using explicit `map()` for section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` because key names contain
/// underscores: `LATCHKEY_VAULT_KDF_MEMORY_COST` must map to
/// `vault.kdf_memory_cost`, not `vault.kdf.memory.cost`.
fn env_provider() -> Env {
    // LATCHKEY_PASSPHRASE is read by the passphrase prompt, not the config.
    Env::prefixed("LATCHKEY_")
        .ignore(&["passphrase"])
        .map(|key| map_env_key(key.as_str()).into())
}

/// Map a lowercased, prefix-stripped env key onto its dotted config path.
fn map_env_key(key: &str) -> String {
    for section in ENV_SECTIONS {
        if let Some(rest) = key.strip_prefix(section).and_then(|r| r.strip_prefix('_')) {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_map_to_sections() {
        assert_eq!(map_env_key("vault_kdf_memory_cost"), "vault.kdf_memory_cost");
        assert_eq!(map_env_key("volumes_allow_fixed"), "volumes.allow_fixed");
        assert_eq!(
            map_env_key("biometric_stabilization_secs"),
            "biometric.stabilization_secs"
        );
        assert_eq!(map_env_key("clipboard_clear_after_secs"), "clipboard.clear_after_secs");
        assert_eq!(map_env_key("log_level"), "log.level");
    }

    #[test]
    fn unknown_env_section_is_left_alone() {
        assert_eq!(map_env_key("agent_name"), "agent_name");
    }

    #[test]
    fn env_override_wins_over_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("custom.toml", "[clipboard]\nclear_after_secs = 30\n")?;
            jail.set_env("LATCHKEY_CLIPBOARD_CLEAR_AFTER_SECS", "45");
            jail.set_env("LATCHKEY_PASSPHRASE", "not-a-config-key");

            let config = load_config_from_path(Path::new("custom.toml"))?;
            assert_eq!(config.clipboard.clear_after_secs, 45);
            Ok(())
        });
    }

    #[test]
    fn local_file_is_picked_up() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(LOCAL_CONFIG_FILE, "[log]\nlevel = \"debug\"\n")?;
            let config = load_config()?;
            assert_eq!(config.log.level, "debug");
            Ok(())
        });
    }
}
