//! Configuration loading from disk and the environment.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;

use crate::config::schema::GatekeeperConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Dotenv error: {0}")]
    Dotenv(#[from] dotenvy::Error),

    #[error("Invalid value for {name}: {value:?}")]
    Env { name: &'static str, value: String },

    #[error(
        "Validation failed: {}",
        .0.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
    )]
    Validation(Vec<ValidationError>),
}

/// Names a dotenv file to load instead of `./.env`.
pub const DOTENV_PATH_VAR: &str = "DOTENV_CONFIG_PATH";

const DEFAULT_DOTENV: &str = ".env";

/// Load a TOML file, apply environment overrides, then validate.
pub fn load_config(path: &Path) -> Result<GatekeeperConfig, ConfigError> {
    load_dotenv()?;
    let content = fs::read_to_string(path)?;
    let mut config: GatekeeperConfig = toml::from_str(&content)?;

    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Build a configuration from defaults and the environment alone.
pub fn load_from_env() -> Result<GatekeeperConfig, ConfigError> {
    load_dotenv()?;
    let mut config = GatekeeperConfig::default();

    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Populate the process environment from a dotenv file.
///
/// `DOTENV_CONFIG_PATH` must point at an existing file when set; otherwise
/// `./.env` is read if present. Variables already in the environment win.
pub fn load_dotenv() -> Result<Option<PathBuf>, ConfigError> {
    match std::env::var(DOTENV_PATH_VAR) {
        Ok(path) if !path.is_empty() => load_dotenv_from(Path::new(&path), true),
        _ => load_dotenv_from(Path::new(DEFAULT_DOTENV), false),
    }
}

fn load_dotenv_from(path: &Path, required: bool) -> Result<Option<PathBuf>, ConfigError> {
    match dotenvy::from_path(path) {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "Loaded dotenv file");
            Ok(Some(path.to_path_buf()))
        }
        Err(e) if e.not_found() && !required => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Overlay environment variables onto `config`.
///
/// `lookup` resolves a variable name; tests pass a closure over a map.
pub fn apply_env_overrides<F>(config: &mut GatekeeperConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(token) = lookup("API_TOKEN") {
        config.auth.api_token = token;
    }
    if let Some(secret) = lookup("SECRET") {
        config.auth.hmac_secret = secret;
    }
    if let Some(value) = lookup("SERVER_PORT") {
        let port: u16 = value.trim().parse().map_err(|_| ConfigError::Env {
            name: "SERVER_PORT",
            value,
        })?;
        config.listener.bind_address = format!("0.0.0.0:{port}");
    }
    if let Some(addr) = lookup("SERVER_BIND_ADDRESS") {
        config.listener.bind_address = addr;
    }
    if let Some(origins) = lookup("SERVER_CORS_ORIGINS") {
        config.cors.allowed_origins = origins
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_owned)
            .collect();
    }
    if let Some(value) = lookup("SERVER_DEBUG") {
        let debug = parse_bool(&value).ok_or(ConfigError::Env {
            name: "SERVER_DEBUG",
            value,
        })?;
        if debug {
            config.observability.log_level = "debug".into();
        }
    }
    if let Some(level) = lookup("LOG_LEVEL") {
        config.observability.log_level = level;
    }

    let security = &mut config.security;
    override_number(&lookup, "SECURITY_MAX_FAILURES", &mut security.max_failures)?;
    override_number(&lookup, "SECURITY_FAIL_WINDOW_SECS", &mut security.fail_window_secs)?;
    override_number(&lookup, "SECURITY_BLOCK_DURATION_SECS", &mut security.block_duration_secs)?;
    override_number(&lookup, "SECURITY_CLEANUP_TICK_SECS", &mut security.cleanup_tick_secs)?;
    override_number(&lookup, "SECURITY_SLOWDOWN_STEP_MS", &mut security.slowdown_step_ms)?;
    override_number(&lookup, "SECURITY_SLOWDOWN_MAX_MS", &mut security.slowdown_max_ms)?;

    Ok(())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim() {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

fn override_number<F, T>(lookup: &F, name: &'static str, slot: &mut T) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(value) = lookup(name) {
        *slot = value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Env { name, value })?;
    }
    Ok(())
}
