//! Environment Configuration Loader
//!
//! Loads `KEY=VALUE` pairs from the canonical location
//! `/etc/dao-plugins/environment` so every component sees the same settings.
//!
//! ## Usage
//!
//! ```rust
//! use dp_core::config::{get_config_path, load_environment};
//!
//! load_environment();
//! let journal_dir = get_config_path("DP_JOURNAL_DIR");
//! # let _ = journal_dir;
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::types::Address;

/// Default path for the environment file
pub const DEFAULT_ENV_FILE: &str = "/etc/dao-plugins/environment";

/// Variable that overrides the environment file location
pub const ENV_FILE_VAR: &str = "DP_ENV_FILE";

/// Paths checked in order of priority
pub const ENV_FILE_PATHS: &[&str] = &[DEFAULT_ENV_FILE, "/etc/dao-plugins.env", ".env"];

/// Load environment variables from the first environment file found.
///
/// `$DP_ENV_FILE` wins over [`ENV_FILE_PATHS`]. Variables already present in
/// the process environment are never overridden.
///
/// Returns the path that was loaded, or None if no file was found.
pub fn load_environment() -> Option<PathBuf> {
    if let Some(custom) = get_config_opt(ENV_FILE_VAR) {
        if let Some(path) = load_env_file(Path::new(&custom)) {
            return Some(path);
        }
    }

    for path in ENV_FILE_PATHS {
        if let Some(loaded) = load_env_file(Path::new(path)) {
            return Some(loaded);
        }
    }

    debug!("No environment file found, using existing environment");
    None
}

/// Load a single environment file. Returns None if it is missing or unreadable.
pub fn load_env_file(path: &Path) -> Option<PathBuf> {
    if !path.exists() {
        return None;
    }

    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!("Failed to read environment file {:?}: {}", path, e);
            return None;
        }
    };

    let mut loaded = 0usize;
    let mut skipped = 0usize;
    for (key, value) in parse_env_content(&content) {
        if std::env::var_os(&key).is_some() {
            skipped += 1;
            continue;
        }
        std::env::set_var(&key, &value);
        loaded += 1;
    }

    info!(
        "Loaded {} environment variables from {:?} ({} skipped - already set)",
        loaded, path, skipped
    );
    Some(path.to_path_buf())
}

/// Parse the body of an environment file, skipping comments and blanks.
pub fn parse_env_content(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(parse_env_line)
        .collect()
}

/// Parse `KEY=VALUE`, `KEY="VALUE"` or `KEY='VALUE'`.
fn parse_env_line(line: &str) -> Option<(String, String)> {
    let line = line.strip_prefix("export ").unwrap_or(line);
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    let value = value.trim();

    if key.is_empty() {
        return None;
    }

    let value = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
        .unwrap_or(value);

    Some((key.to_string(), value.to_string()))
}

/// Get an optional, non-empty configuration value.
pub fn get_config_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get an address configuration value; malformed values are ignored with a warning.
pub fn get_config_address(key: &str) -> Option<Address> {
    let raw = get_config_opt(key)?;
    match raw.parse() {
        Ok(address) => Some(address),
        Err(e) => {
            warn!("Ignoring {}: {}", key, e);
            None
        }
    }
}

/// Get a path configuration value.
pub fn get_config_path(key: &str) -> Option<PathBuf> {
    get_config_opt(key).map(PathBuf::from)
}
