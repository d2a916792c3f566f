//! # Feature: Configuration System
//!
//! Process settings loaded from a YAML file with environment variable
//! interpolation, or from plain `GC_*` environment variables.

use anyhow::{Context, Result};
use log::info;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

static ENV_VAR_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}").expect("Invalid regex")
});

/// Largest ceiling that still fits a signed unix-seconds difference
pub const MAX_TIMEOUT_LIMIT: u64 = i64::MAX as u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Discord bot token
    pub token: String,

    #[serde(default = "default_database_path")]
    pub database_path: String,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Prefix that marks a message as a command
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,

    /// Timeout in seconds given to newly configured chats
    #[serde(default = "default_timeout")]
    pub default_timeout: u64,

    /// Ceiling in seconds for any chat's timeout
    #[serde(default = "default_timeout_limit")]
    pub timeout_limit: u64,

    /// Seconds between collector sweeps
    #[serde(default = "default_sleep_timeout")]
    pub sleep_timeout: u64,
}

// Default value functions for serde
fn default_database_path() -> String {
    "gcbot.db".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_command_prefix() -> String {
    "/".to_string()
}

fn default_timeout() -> u64 {
    3600
}

fn default_timeout_limit() -> u64 {
    604800
}

fn default_sleep_timeout() -> u64 {
    60
}

impl Settings {
    /// Load settings from `GC_*` environment variables
    pub fn from_env() -> Result<Self> {
        let settings = Settings {
            token: env::var("GC_TOKEN")
                .map_err(|_| anyhow::anyhow!("GC_TOKEN environment variable not set"))?,
            database_path: env::var("GC_DATABASE_PATH")
                .unwrap_or_else(|_| default_database_path()),
            log_level: env::var("GC_LOG_LEVEL").unwrap_or_else(|_| default_log_level()),
            command_prefix: env::var("GC_COMMAND_PREFIX")
                .unwrap_or_else(|_| default_command_prefix()),
            default_timeout: env_seconds("GC_DEFAULT_TIMEOUT", default_timeout())?,
            timeout_limit: env_seconds("GC_TIMEOUT_LIMIT", default_timeout_limit())?,
            sleep_timeout: env_seconds("GC_SLEEP_TIMEOUT", default_sleep_timeout())?,
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a YAML file with environment variable interpolation
    ///
    /// Supports `${VAR_NAME}` and `${VAR_NAME:-default}`.
    /// Example: `token: "${DISCORD_TOKEN}"`
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let interpolated = interpolate_env_vars(&content)?;

        let settings: Settings = serde_yaml::from_str(&interpolated)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        settings.validate()?;

        info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Auto-detect and load settings
    ///
    /// Priority order:
    /// 1. An explicit path (the `--config` flag)
    /// 2. If CONFIG_FILE env var is set, load from that file
    /// 3. If config.yaml exists in current directory, load from it
    /// 4. Fall back to environment variables
    pub fn auto_load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            info!("Loading settings from {}", path.display());
            return Self::from_file(path);
        }

        if let Ok(config_path) = env::var("CONFIG_FILE") {
            info!("Loading settings from CONFIG_FILE: {config_path}");
            return Self::from_file(&config_path);
        }

        let default_config_path = "config.yaml";
        if Path::new(default_config_path).exists() {
            info!("Loading settings from {default_config_path}");
            return Self::from_file(default_config_path);
        }

        info!("No config file found, using environment variables");
        Self::from_env()
    }

    pub fn validate(&self) -> Result<()> {
        if self.token.is_empty() {
            anyhow::bail!("token is required");
        }

        if self.command_prefix.is_empty() {
            anyhow::bail!("command_prefix cannot be empty");
        }

        if self.timeout_limit == 0 || self.timeout_limit > MAX_TIMEOUT_LIMIT {
            anyhow::bail!(
                "timeout_limit must be between 1 and {MAX_TIMEOUT_LIMIT}, got {}",
                self.timeout_limit
            );
        }

        if self.sleep_timeout == 0 {
            anyhow::bail!("sleep_timeout must be greater than 0");
        }

        if self.default_timeout == 0 || self.default_timeout > self.timeout_limit {
            anyhow::bail!(
                "default_timeout must be between 1 and timeout_limit ({}), got {}",
                self.timeout_limit,
                self.default_timeout
            );
        }

        Ok(())
    }
}

fn env_seconds(name: &str, default: u64) -> Result<u64> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .with_context(|| format!("{name} must be a number of seconds, got '{value}'")),
        Err(_) => Ok(default),
    }
}

/// Expand `${NAME}` and `${NAME:-fallback}` references from the environment.
/// Fails listing every referenced variable that is unset and has no fallback.
fn interpolate_env_vars(content: &str) -> Result<String> {
    let mut missing: Vec<String> = Vec::new();

    let expanded = ENV_VAR_PATTERN.replace_all(content, |caps: &Captures<'_>| {
        let name = &caps[1];
        env::var(name)
            .ok()
            .or_else(|| caps.get(2).map(|fallback| fallback.as_str().to_string()))
            .unwrap_or_else(|| {
                if !missing.iter().any(|seen| seen == name) {
                    missing.push(name.to_string());
                }
                String::new()
            })
    });

    if !missing.is_empty() {
        anyhow::bail!("Unset environment variables in config: {}", missing.join(", "));
    }

    Ok(expanded.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn settings() -> Settings {
        Settings {
            token: "token".to_string(),
            database_path: default_database_path(),
            log_level: default_log_level(),
            command_prefix: default_command_prefix(),
            default_timeout: default_timeout(),
            timeout_limit: default_timeout_limit(),
            sleep_timeout: default_sleep_timeout(),
        }
    }

    // Every GC_* variable is touched by this test only, so parallel tests cannot interfere
    #[test]
    fn test_settings_from_env() {
        for name in [
            "GC_TOKEN",
            "GC_DATABASE_PATH",
            "GC_LOG_LEVEL",
            "GC_COMMAND_PREFIX",
            "GC_DEFAULT_TIMEOUT",
            "GC_TIMEOUT_LIMIT",
            "GC_SLEEP_TIMEOUT",
        ] {
            env::remove_var(name);
        }

        assert!(Settings::from_env().is_err());

        env::set_var("GC_TOKEN", "test_discord_token");
        let defaults = Settings::from_env().unwrap();
        assert_eq!(defaults.token, "test_discord_token");
        assert_eq!(defaults.database_path, "gcbot.db");
        assert_eq!(defaults.command_prefix, "/");
        assert_eq!(defaults.default_timeout, 3600);
        assert_eq!(defaults.timeout_limit, 604800);
        assert_eq!(defaults.sleep_timeout, 60);

        env::set_var("GC_SLEEP_TIMEOUT", "15");
        env::set_var("GC_COMMAND_PREFIX", "!");
        let custom = Settings::from_env().unwrap();
        assert_eq!(custom.sleep_timeout, 15);
        assert_eq!(custom.command_prefix, "!");

        env::set_var("GC_SLEEP_TIMEOUT", "soon");
        assert!(Settings::from_env().is_err());

        env::set_var("GC_SLEEP_TIMEOUT", "60");
        env::set_var("GC_DEFAULT_TIMEOUT", "700000");
        assert!(Settings::from_env().is_err());

        for name in [
            "GC_TOKEN",
            "GC_COMMAND_PREFIX",
            "GC_DEFAULT_TIMEOUT",
            "GC_SLEEP_TIMEOUT",
        ] {
            env::remove_var(name);
        }
    }

    #[test]
    fn test_interpolation_expands_several_references() {
        env::set_var("GCBOT_INTERP_HOST", "db.local");
        env::remove_var("GCBOT_INTERP_PORT");
        env::remove_var("GCBOT_INTERP_EMPTY");

        let line = "url: ${GCBOT_INTERP_HOST}:${GCBOT_INTERP_PORT:-5432}/${GCBOT_INTERP_EMPTY:-}";
        assert_eq!(interpolate_env_vars(line).unwrap(), "url: db.local:5432/");
        assert_eq!(interpolate_env_vars("plain: $HOME {x}").unwrap(), "plain: $HOME {x}");

        env::remove_var("GCBOT_INTERP_HOST");
    }

    #[test]
    fn test_interpolation_reports_each_unset_variable_once() {
        env::remove_var("GCBOT_INTERP_A");
        env::remove_var("GCBOT_INTERP_B");

        let err = interpolate_env_vars("${GCBOT_INTERP_A} ${GCBOT_INTERP_B} ${GCBOT_INTERP_A}")
            .unwrap_err()
            .to_string();
        assert!(err.ends_with("GCBOT_INTERP_A, GCBOT_INTERP_B"), "{err}");
    }

    #[test]
    fn test_settings_from_yaml() {
        env::set_var("GCBOT_TEST_TOKEN", "yaml_token");

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
token: "${{GCBOT_TEST_TOKEN}}"
database_path: "test.db"
log_level: "debug"
timeout_limit: 86400
sleep_timeout: 30
"#
        )
        .unwrap();

        let settings = Settings::auto_load(Some(file.path())).unwrap();
        assert_eq!(settings.token, "yaml_token");
        assert_eq!(settings.database_path, "test.db");
        assert_eq!(settings.log_level, "debug");
        assert_eq!(settings.command_prefix, "/");
        assert_eq!(settings.default_timeout, 3600);
        assert_eq!(settings.timeout_limit, 86400);
        assert_eq!(settings.sleep_timeout, 30);

        env::remove_var("GCBOT_TEST_TOKEN");
    }

    #[test]
    fn test_settings_validation() {
        assert!(settings().validate().is_ok());

        let mut invalid = settings();
        invalid.token = String::new();
        assert!(invalid.validate().is_err());

        let mut invalid = settings();
        invalid.command_prefix = String::new();
        assert!(invalid.validate().is_err());

        let mut invalid = settings();
        invalid.sleep_timeout = 0;
        assert!(invalid.validate().is_err());

        let mut invalid = settings();
        invalid.default_timeout = 0;
        assert!(invalid.validate().is_err());

        let mut invalid = settings();
        invalid.timeout_limit = 600;
        assert!(invalid.validate().is_err());

        let mut invalid = settings();
        invalid.timeout_limit = MAX_TIMEOUT_LIMIT + 1;
        invalid.default_timeout = 3600;
        assert!(invalid.validate().is_err());

        let mut edge = settings();
        edge.timeout_limit = MAX_TIMEOUT_LIMIT;
        assert!(edge.validate().is_ok());

        let mut edge = settings();
        edge.default_timeout = edge.timeout_limit;
        assert!(edge.validate().is_ok());
    }
}
