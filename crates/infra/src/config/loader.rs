//! Configuration loader
//!
//! Loads configuration from files and environment variables.
//!
//! ## Loading Strategy
//! 1. Start from the library defaults
//! 2. Overlay a config file: `FDGUARD_CONFIG` if set, otherwise the first
//!    file found by [`find_config_file`]
//! 3. Overlay any `FDGUARD_*` environment variables
//! 4. Validate the result
//!
//! ## Environment Variables
//! - `FDGUARD_CONFIG`: Explicit config file path
//! - `FDGUARD_MAX_RETRIES`: Retries after the first attempt
//! - `FDGUARD_INITIAL_WAIT_MS`: Wait before the first retry, in milliseconds
//! - `FDGUARD_BACKOFF_MULTIPLIER`: Growth factor between waits
//! - `FDGUARD_MAX_WAIT_MS`: Ceiling on any single wait, in milliseconds
//! - `FDGUARD_TRIGGER_RECLAIM`: Run reclamation before each wait (true/false)
//! - `FDGUARD_WARN_THRESHOLD`: Usage fraction that triggers a warning
//! - `FDGUARD_LOG_LEVEL`: Log filter directive
//! - `FDGUARD_LOG_FORMAT`: `pretty` or `json`
//!
//! ## File Locations
//! The loader searches the following paths (in order):
//! 1. `./fdguard.toml` or `./fdguard.json` (current working directory)
//! 2. `./config/fdguard.toml` or `./config/fdguard.json`
//! 3. Next to the executable

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use super::{Config, ConfigError, ConfigResult};
use crate::observability::LogFormat;

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "FDGUARD_CONFIG";

const CONFIG_FILE_NAMES: [&str; 2] = ["fdguard.toml", "fdguard.json"];

/// Load configuration: defaults, then file, then environment
///
/// A missing config file is not an error; the defaults are used.
///
/// # Errors
/// Returns [`ConfigError`] if:
/// - `FDGUARD_CONFIG` names a file that does not exist
/// - The file cannot be read or parsed
/// - An environment variable has an invalid value
/// - The merged configuration fails validation
pub fn load() -> ConfigResult<Config> {
    let base = match env_var(CONFIG_PATH_ENV) {
        Some(path) => read_config_file(Path::new(&path))?,
        None => match find_config_file() {
            Some(path) => read_config_file(&path)?,
            None => {
                tracing::debug!("No config file found, starting from defaults");
                Config::default()
            }
        },
    };

    let config = apply_env(base)?;
    config.validate()?;
    tracing::info!(
        max_retries = config.retry.max_retries,
        warn_threshold = config.monitor.warn_threshold,
        "Configuration loaded"
    );
    Ok(config)
}

/// Load configuration from defaults and environment variables only
///
/// # Errors
/// Returns [`ConfigError`] if a variable has an invalid value or the result
/// fails validation.
pub fn load_from_env() -> ConfigResult<Config> {
    let config = apply_env(Config::default())?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, searches the standard locations. Supports JSON and
/// TOML (detected by file extension).
///
/// # Errors
/// Returns [`ConfigError`] if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
/// - The configuration fails validation
pub fn load_from_file(path: Option<PathBuf>) -> ConfigResult<Config> {
    let config_path = match path {
        Some(p) => p,
        None => find_config_file().ok_or(ConfigError::NoConfigFile)?,
    };

    let config = read_config_file(&config_path)?;
    config.validate()?;
    Ok(config)
}

fn read_config_file(path: &Path) -> ConfigResult<Config> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound { path: path.to_path_buf() });
    }

    tracing::info!(path = %path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(path)
        .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;

    parse_config(&contents, path)
}

/// Parse configuration by file extension (`.toml` or `.json`)
fn parse_config(contents: &str, path: &Path) -> ConfigResult<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|source| ConfigError::Toml { path: path.to_path_buf(), source }),
        "json" => serde_json::from_str(contents)
            .map_err(|source| ConfigError::Json { path: path.to_path_buf(), source }),
        other => Err(ConfigError::UnsupportedFormat { extension: other.to_string() }),
    }
}

/// Overlay `FDGUARD_*` environment variables onto `config`
///
/// Unset variables leave the corresponding value untouched.
///
/// # Errors
/// Returns [`ConfigError::InvalidEnv`] for a value that does not parse.
pub fn apply_env(mut config: Config) -> ConfigResult<Config> {
    if let Some(retries) = env_parse::<u32>("FDGUARD_MAX_RETRIES")? {
        config.retry.max_retries = retries;
    }
    if let Some(ms) = env_parse::<u64>("FDGUARD_INITIAL_WAIT_MS")? {
        config.retry.initial_wait = Duration::from_millis(ms);
    }
    if let Some(multiplier) = env_parse::<f64>("FDGUARD_BACKOFF_MULTIPLIER")? {
        config.retry.backoff_multiplier = multiplier;
    }
    if let Some(ms) = env_parse::<u64>("FDGUARD_MAX_WAIT_MS")? {
        config.retry.max_wait = Duration::from_millis(ms);
    }
    if let Some(enabled) = env_bool("FDGUARD_TRIGGER_RECLAIM")? {
        config.retry.trigger_reclaim = enabled;
    }
    if let Some(threshold) = env_parse::<f64>("FDGUARD_WARN_THRESHOLD")? {
        config.monitor.warn_threshold = threshold;
    }
    if let Some(level) = env_var("FDGUARD_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(format) = env_parse::<LogFormat>("FDGUARD_LOG_FORMAT")? {
        config.logging.format = format;
    }
    Ok(config)
}

/// Search the standard locations for a config file
///
/// Searches, in order:
/// 1. Current working directory (`./fdguard.{toml,json}`)
/// 2. `./config/fdguard.{toml,json}`
/// 3. The executable's directory
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn find_config_file() -> Option<PathBuf> {
    let mut dirs = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd.join("config"));
        dirs.insert(0, cwd);
    }

    let exe_dir =
        std::env::current_exe().ok().and_then(|exe| exe.parent().map(Path::to_path_buf));
    if let Some(exe_dir) = exe_dir {
        dirs.push(exe_dir);
    }

    dirs.iter()
        .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.is_file())
}

/// Non-empty environment variable
fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn env_parse<T>(key: &str) -> ConfigResult<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    env_var(key)
        .map(|raw| raw.trim().parse::<T>().map_err(|e| ConfigError::invalid_env(key, e)))
        .transpose()
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str) -> ConfigResult<Option<bool>> {
    let Some(raw) = env_var(key) else {
        return Ok(None);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        other => Err(ConfigError::invalid_env(key, format!("expected a boolean, got '{other}'"))),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use once_cell::sync::Lazy;

    use super::*;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    const ALL_VARS: [&str; 9] = [
        CONFIG_PATH_ENV,
        "FDGUARD_MAX_RETRIES",
        "FDGUARD_INITIAL_WAIT_MS",
        "FDGUARD_BACKOFF_MULTIPLIER",
        "FDGUARD_MAX_WAIT_MS",
        "FDGUARD_TRIGGER_RECLAIM",
        "FDGUARD_WARN_THRESHOLD",
        "FDGUARD_LOG_LEVEL",
        "FDGUARD_LOG_FORMAT",
    ];

    fn clear_env() {
        for key in ALL_VARS {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_env_bool_parsing() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");

        for value in ["1", "true", "YES", "on"] {
            std::env::set_var("FDGUARD_TEST_BOOL", value);
            assert_eq!(env_bool("FDGUARD_TEST_BOOL").expect("valid"), Some(true), "{value}");
        }
        for value in ["0", "false", "No", "OFF"] {
            std::env::set_var("FDGUARD_TEST_BOOL", value);
            assert_eq!(env_bool("FDGUARD_TEST_BOOL").expect("valid"), Some(false), "{value}");
        }

        std::env::set_var("FDGUARD_TEST_BOOL", "maybe");
        assert!(env_bool("FDGUARD_TEST_BOOL").is_err());

        std::env::remove_var("FDGUARD_TEST_BOOL");
        assert_eq!(env_bool("FDGUARD_TEST_BOOL").expect("unset"), None);
    }

    #[test]
    fn test_load_from_env_overlays_defaults() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("FDGUARD_MAX_RETRIES", "3");
        std::env::set_var("FDGUARD_INITIAL_WAIT_MS", "100");
        std::env::set_var("FDGUARD_MAX_WAIT_MS", "1000");
        std::env::set_var("FDGUARD_TRIGGER_RECLAIM", "off");
        std::env::set_var("FDGUARD_LOG_FORMAT", "json");

        let config = load_from_env();
        clear_env();
        let config = config.expect("valid env");

        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.initial_wait, Duration::from_millis(100));
        assert_eq!(config.retry.max_wait, Duration::from_secs(1));
        assert!(!config.retry.trigger_reclaim);
        assert_eq!(config.retry.backoff_multiplier, 2.0);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_load_from_env_invalid_number() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("FDGUARD_MAX_RETRIES", "not-a-number");
        let result = load_from_env();
        clear_env();

        match result {
            Err(ConfigError::InvalidEnv { key, .. }) => assert_eq!(key, "FDGUARD_MAX_RETRIES"),
            other => panic!("expected InvalidEnv, got {other:?}"),
        }
    }

    #[test]
    fn test_load_from_env_rejects_invalid_policy() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("FDGUARD_BACKOFF_MULTIPLIER", "0.5");
        let result = load_from_env();
        clear_env();

        assert!(matches!(result, Err(ConfigError::Common(_))));
    }

    #[test]
    fn test_env_overrides_file() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("fdguard.toml");
        std::fs::write(&path, "[retry]\nmax_retries = 7\ninitial_wait_ms = 250\n").expect("write");

        std::env::set_var(CONFIG_PATH_ENV, &path);
        std::env::set_var("FDGUARD_MAX_RETRIES", "2");
        let result = load();
        clear_env();
        let config = result.expect("valid");

        assert_eq!(config.retry.max_retries, 2);
        assert_eq!(config.retry.initial_wait, Duration::from_millis(250));
    }

    #[test]
    fn test_explicit_missing_config_is_an_error() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var(CONFIG_PATH_ENV, "/nonexistent/fdguard.toml");
        let result = load();
        clear_env();

        assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
    }

    #[test]
    fn test_load_from_file_json() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("fdguard.json");
        let json = r#"{ "retry": { "max_retries": 4 }, "monitor": { "warn_threshold": 0.9 } }"#;
        std::fs::write(&path, json).expect("write");

        let config = load_from_file(Some(path)).expect("valid JSON");
        assert_eq!(config.retry.max_retries, 4);
        assert_eq!(config.monitor.warn_threshold, 0.9);
    }

    #[test]
    fn test_load_from_file_not_found() {
        let result = load_from_file(Some(PathBuf::from("/nonexistent/fdguard.json")));
        assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
    }

    #[test]
    fn test_load_from_file_invalid_toml() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("fdguard.toml");
        std::fs::write(&path, "[retry\nmax_retries = 1").expect("write");

        assert!(matches!(load_from_file(Some(path)), Err(ConfigError::Toml { .. })));
    }

    #[test]
    fn test_parse_config_unsupported_format() {
        let result = parse_config("retry: {}", Path::new("fdguard.yaml"));
        match result {
            Err(ConfigError::UnsupportedFormat { extension }) => assert_eq!(extension, "yaml"),
            other => panic!("expected UnsupportedFormat, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_config_without_extension_is_json() {
        let config = parse_config("{}", Path::new("fdguard")).expect("empty JSON object");
        assert_eq!(config, Config::default());
    }
}
