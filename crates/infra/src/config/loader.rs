//! Configuration loader
//!
//! Loads resilience configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. Reads a `.env` file from the working directory, if present
//! 2. If any `FORTIFY_*` variable is set, builds the config from the environment
//! 3. Otherwise probes for a config file (JSON or TOML)
//! 4. With neither, every setting keeps its default
//!
//! ## Environment Variables
//! Each variable overrides one setting; unset variables keep the default.
//! - `FORTIFY_RETRY_MAX_ATTEMPTS`: Total attempts including the first
//! - `FORTIFY_RETRY_INITIAL_DELAY_MS`: Delay before the second attempt
//! - `FORTIFY_RETRY_MAX_DELAY_MS`: Cap on any single delay
//! - `FORTIFY_RETRY_BACKOFF_MULTIPLIER`: Delay growth factor
//! - `FORTIFY_CB_FAILURE_THRESHOLD`: Failures before a breaker opens
//! - `FORTIFY_CB_RESET_TIMEOUT_MS`: Time a breaker stays open
//! - `FORTIFY_CB_SUCCESS_THRESHOLD`: Probe successes needed to close
//! - `FORTIFY_BULKHEAD_MAX_CONCURRENT_CALLS`: Concurrent calls per bulkhead
//! - `FORTIFY_TIMEOUT_MS`: Per-attempt deadline (no deadline when unset)
//! - `FORTIFY_TIMEOUT_MODE`: `cancel` or `advisory`
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./fortify.toml` or `./fortify.json` (current working directory)
//! 2. `./config.toml` or `./config.json` (current working directory)
//! 3. The same names in the parent and grandparent directories
//! 4. The same names relative to the executable location

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use fortify_core::ResilienceDefaults;
use fortify_domain::{Config, FortifyError, Result, TimeoutModeSetting};
use tracing::{debug, info};

pub const ENV_RETRY_MAX_ATTEMPTS: &str = "FORTIFY_RETRY_MAX_ATTEMPTS";
pub const ENV_RETRY_INITIAL_DELAY_MS: &str = "FORTIFY_RETRY_INITIAL_DELAY_MS";
pub const ENV_RETRY_MAX_DELAY_MS: &str = "FORTIFY_RETRY_MAX_DELAY_MS";
pub const ENV_RETRY_BACKOFF_MULTIPLIER: &str = "FORTIFY_RETRY_BACKOFF_MULTIPLIER";
pub const ENV_CB_FAILURE_THRESHOLD: &str = "FORTIFY_CB_FAILURE_THRESHOLD";
pub const ENV_CB_RESET_TIMEOUT_MS: &str = "FORTIFY_CB_RESET_TIMEOUT_MS";
pub const ENV_CB_SUCCESS_THRESHOLD: &str = "FORTIFY_CB_SUCCESS_THRESHOLD";
pub const ENV_BULKHEAD_MAX_CONCURRENT_CALLS: &str = "FORTIFY_BULKHEAD_MAX_CONCURRENT_CALLS";
pub const ENV_TIMEOUT_MS: &str = "FORTIFY_TIMEOUT_MS";
pub const ENV_TIMEOUT_MODE: &str = "FORTIFY_TIMEOUT_MODE";

/// Every variable read by [`load_from_env`]
pub const ENV_VARS: &[&str] = &[
    ENV_RETRY_MAX_ATTEMPTS,
    ENV_RETRY_INITIAL_DELAY_MS,
    ENV_RETRY_MAX_DELAY_MS,
    ENV_RETRY_BACKOFF_MULTIPLIER,
    ENV_CB_FAILURE_THRESHOLD,
    ENV_CB_RESET_TIMEOUT_MS,
    ENV_CB_SUCCESS_THRESHOLD,
    ENV_BULKHEAD_MAX_CONCURRENT_CALLS,
    ENV_TIMEOUT_MS,
    ENV_TIMEOUT_MODE,
];

const CONFIG_FILE_NAMES: &[&str] = &["fortify.toml", "fortify.json", "config.toml", "config.json"];

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `FortifyError::Config` if:
/// - An environment variable holds an unparsable value
/// - A config file exists but cannot be read or parsed
/// - The resulting configuration fails validation
pub fn load() -> Result<Config> {
    match dotenvy::dotenv() {
        Ok(path) => debug!(path = %path.display(), "Loaded .env file"),
        Err(e) => debug!(error = %e, "No .env file loaded"),
    }

    if ENV_VARS.iter().any(|key| std::env::var_os(key).is_some()) {
        let config = load_from_env()?;
        info!("Configuration loaded from environment variables");
        return Ok(config);
    }

    match probe_config_paths() {
        Some(path) => load_from_file(Some(path)),
        None => {
            info!("No configuration source found, using defaults");
            Ok(Config::default())
        }
    }
}

/// Load configuration and turn it into orchestrator defaults
///
/// # Errors
/// Same as [`load`].
pub fn load_resilience_defaults() -> Result<ResilienceDefaults> {
    ResilienceDefaults::from_config(&load()?)
}

/// Load configuration from environment variables
///
/// Starts from the defaults and applies every variable that is set.
///
/// # Errors
/// Returns `FortifyError::Config` if a variable cannot be parsed or the
/// resulting configuration is invalid.
pub fn load_from_env() -> Result<Config> {
    let mut config = Config::default();

    if let Some(attempts) = env_parse(ENV_RETRY_MAX_ATTEMPTS)? {
        config.retry.max_attempts = attempts;
    }
    if let Some(ms) = env_parse(ENV_RETRY_INITIAL_DELAY_MS)? {
        config.retry.initial_delay = Duration::from_millis(ms);
    }
    if let Some(ms) = env_parse(ENV_RETRY_MAX_DELAY_MS)? {
        config.retry.max_delay = Duration::from_millis(ms);
    }
    if let Some(multiplier) = env_parse(ENV_RETRY_BACKOFF_MULTIPLIER)? {
        config.retry.backoff_multiplier = multiplier;
    }

    if let Some(threshold) = env_parse(ENV_CB_FAILURE_THRESHOLD)? {
        config.circuit_breaker.failure_threshold = threshold;
    }
    if let Some(ms) = env_parse(ENV_CB_RESET_TIMEOUT_MS)? {
        config.circuit_breaker.reset_timeout = Duration::from_millis(ms);
    }
    if let Some(threshold) = env_parse(ENV_CB_SUCCESS_THRESHOLD)? {
        config.circuit_breaker.success_threshold = threshold;
    }

    if let Some(max) = env_parse(ENV_BULKHEAD_MAX_CONCURRENT_CALLS)? {
        config.bulkhead.max_concurrent_calls = max;
    }

    if let Some(ms) = env_parse(ENV_TIMEOUT_MS)? {
        config.timeout.duration = Some(Duration::from_millis(ms));
    }
    if let Some(mode) = env_parse::<TimeoutModeSetting>(ENV_TIMEOUT_MODE)? {
        config.timeout.mode = mode;
    }

    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `FortifyError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
/// - The parsed configuration fails validation
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(FortifyError::Config(format!("Config file not found: {}", p.display())));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            FortifyError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| FortifyError::Config(format!("Failed to read config file: {e}")))?;

    let config = parse_config(&contents, &config_path)?;
    config.validate()?;
    Ok(config)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| FortifyError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| FortifyError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(FortifyError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe the standard locations for a configuration file
///
/// Searches the current working directory, its parent and grandparent,
/// then the same three levels relative to the executable.
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut roots = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        roots.push(cwd);
    }
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            roots.push(exe_dir.to_path_buf());
        }
    }

    roots.iter().find_map(|root| probe_from(root))
}

fn probe_from(root: &Path) -> Option<PathBuf> {
    [root.to_path_buf(), root.join(".."), root.join("../..")]
        .iter()
        .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.is_file())
}

/// Parse an optional environment variable
///
/// # Errors
/// Returns `FortifyError::Config` if the variable is set but unparsable.
fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| FortifyError::Config(format!("Invalid value for {key} ({raw:?}): {e}"))),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(std::env::VarError::NotUnicode(_)) => {
            Err(FortifyError::Config(format!("Environment variable {key} is not valid UTF-8")))
        }
    }
}
