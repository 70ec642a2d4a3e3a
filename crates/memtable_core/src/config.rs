//! Configuration loading from environment variables.

use crate::action::BatchOptions;
use crate::constants::{DEFAULT_MAX_EDIT_TEXT_SIZE, DEFAULT_PORT};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;

/// Runtime configuration for memtable.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Directory holding the redb file.
    pub db_path: String,
    pub port: u16,
    /// Request body cap for edit submissions, in bytes.
    pub max_edit_text_size: usize,
    /// Skip model deletes on every table except table 0.
    pub ignore_delete: bool,
}

/// Expand a leading `~/` to the user's home directory.
fn expand_tilde(path: String) -> String {
    match (path.strip_prefix("~/"), resolve_home_dir()) {
        (Some(rest), Some(home)) => home.join(rest).to_string_lossy().to_string(),
        _ => path,
    }
}

fn resolve_home_dir() -> Option<PathBuf> {
    let non_empty = |name: &str| env::var(name).ok().filter(|value| !value.trim().is_empty());
    if let Some(home) = non_empty("HOME").or_else(|| non_empty("USERPROFILE")) {
        return Some(PathBuf::from(home));
    }
    if let (Some(drive), Some(path)) = (non_empty("HOMEDRIVE"), non_empty("HOMEPATH")) {
        return Some(PathBuf::from(format!("{}{}", drive, path)));
    }
    env::current_dir().ok()
}

/// Parse a boolean-like environment flag value.
///
/// # Supported Values
/// - Truthy: `1`, `true`, `yes`, `on`
/// - Falsy: `0`, `false`, `no`, `off`, empty string
///
/// Matching is case-insensitive and ignores surrounding whitespace.
///
/// # Returns
/// `Some(bool)` when the value is recognized, otherwise `None`.
pub fn parse_env_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "" | "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Read a boolean flag from the environment; missing or unrecognized is `false`.
pub fn env_flag_enabled(name: &str) -> bool {
    env::var(name)
        .ok()
        .and_then(|value| parse_env_flag(&value))
        .unwrap_or(false)
}

fn env_parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring unparsable {}={:?}", name, raw);
            None
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Returns
    /// A populated [`Config`] with defaults applied when env vars are missing.
    pub fn from_env() -> Self {
        Self {
            db_path: env::var("DB_PATH").map(expand_tilde).unwrap_or_else(|_| {
                let home = resolve_home_dir().unwrap_or_else(|| PathBuf::from("."));
                home.join(".cache")
                    .join("memtable")
                    .join("db")
                    .to_string_lossy()
                    .to_string()
            }),
            port: env_parsed("PORT").unwrap_or(DEFAULT_PORT),
            max_edit_text_size: env_parsed("MAX_EDIT_TEXT_SIZE")
                .unwrap_or(DEFAULT_MAX_EDIT_TEXT_SIZE),
            ignore_delete: env_flag_enabled("IGNORE_DELETE"),
        }
    }

    /// Batch execution options derived from this configuration.
    pub fn batch_options(&self) -> BatchOptions {
        BatchOptions {
            ignore_delete: self.ignore_delete,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::{env_lock, EnvGuard};

    #[test]
    fn parse_env_flag_accepts_truthy_values() {
        for value in ["1", "true", "TRUE", " yes ", "on"] {
            assert_eq!(parse_env_flag(value), Some(true), "value: {}", value);
        }
    }

    #[test]
    fn parse_env_flag_accepts_falsy_values() {
        for value in ["", "0", "false", "FALSE", " no ", "off"] {
            assert_eq!(parse_env_flag(value), Some(false), "value: {}", value);
        }
    }

    #[test]
    fn parse_env_flag_rejects_unknown_values() {
        assert_eq!(parse_env_flag("maybe"), None);
    }

    #[test]
    fn from_env_applies_defaults() {
        let _lock = env_lock().lock().expect("env lock");
        let _env = EnvGuard::remove("DB_PATH")
            .with("PORT", None)
            .with("MAX_EDIT_TEXT_SIZE", None)
            .with("IGNORE_DELETE", None)
            .with("HOME", Some("/home/tester"));

        let config = Config::from_env();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.max_edit_text_size, DEFAULT_MAX_EDIT_TEXT_SIZE);
        assert!(!config.ignore_delete);
        assert!(config.db_path.ends_with("db"));
        assert!(config.db_path.contains("memtable"));
    }

    #[test]
    fn from_env_reads_overrides_and_expands_tilde() {
        let _lock = env_lock().lock().expect("env lock");
        let _env = EnvGuard::set("DB_PATH", "~/tables")
            .with("HOME", Some("/home/tester"))
            .with("PORT", Some("4000"))
            .with("MAX_EDIT_TEXT_SIZE", Some("not-a-number"))
            .with("IGNORE_DELETE", Some("yes"));

        let config = Config::from_env();
        assert_eq!(
            PathBuf::from(&config.db_path),
            PathBuf::from("/home/tester").join("tables")
        );
        assert_eq!(config.port, 4000);
        assert_eq!(config.max_edit_text_size, DEFAULT_MAX_EDIT_TEXT_SIZE);
        assert!(config.batch_options().ignore_delete);
    }
}
