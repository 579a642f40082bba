//! Layered service configuration
//!
//! Lowest to highest precedence:
//!
//! 1. Built-in defaults
//! 2. `<dir>/app-config.toml`
//! 3. `<dir>/<CONFIG_ENV>.toml` (`CONFIG_ENV` defaults to `local`)
//! 4. `WEBHOOK__<SECTION>__<KEY>` environment variables
//! 5. Legacy variables `PORT`, `HMAC_SECRET`, `TIMESTAMP_TOLERANCE_MINUTES`
//!
//! Missing files are skipped.

use crate::logging::LogFormat;
use config::{Environment, File};
use security::{AuthConfig, NonceStoreConfig, SharedSecret};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Secret used when none is configured. Never acceptable outside development.
pub const DEV_HMAC_SECRET: &str = "default-secret-key-change-in-production";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid duration for {key}: {value:?} (expected e.g. \"30s\", \"5m\", \"1h\" or whole minutes)")]
    InvalidDuration { key: &'static str, value: String },

    #[error("webhook.timestamp_tolerance ({tolerance_secs}s) exceeds webhook.nonce_retention ({retention_secs}s); replays of old requests would be accepted")]
    ToleranceExceedsRetention {
        tolerance_secs: u64,
        retention_secs: u64,
    },
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct Config {
    pub server: ServerConfig,
    pub webhook: WebhookConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound on connection draining after a shutdown signal
    pub shutdown_grace_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct WebhookConfig {
    pub hmac_secret: String,
    pub timestamp_tolerance: String,
    pub nonce_retention: String,
    pub nonce_high_water_mark: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Config {
    /// Load from `config_dir` and the process environment
    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        let vars: config::Map<String, String> = std::env::vars().collect();
        Self::load_with_env(config_dir, &vars)
    }

    /// Load from `config_dir` with `vars` standing in for the environment
    pub fn load_with_env(
        config_dir: &Path,
        vars: &config::Map<String, String>,
    ) -> Result<Self, ConfigError> {
        let profile = vars
            .get("CONFIG_ENV")
            .map(String::as_str)
            .filter(|p| !p.is_empty())
            .unwrap_or("local");

        let mut builder = config::Config::builder()
            // Server defaults
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("server.shutdown_grace_secs", 5)?
            // Webhook defaults
            .set_default("webhook.hmac_secret", "")?
            .set_default("webhook.timestamp_tolerance", "5m")?
            .set_default("webhook.nonce_retention", "1h")?
            .set_default("webhook.nonce_high_water_mark", 10_000)?
            // Logging defaults
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?;

        builder = builder
            .add_source(File::from(config_dir.join("app-config.toml")).required(false))
            .add_source(File::from(config_dir.join(format!("{profile}.toml"))).required(false))
            .add_source(
                Environment::with_prefix("WEBHOOK")
                    .separator("__")
                    .source(Some(vars.clone())),
            );

        // Legacy overrides
        if let Some(port) = vars.get("PORT") {
            builder = builder.set_override("server.port", port.as_str())?;
        }

        if let Some(secret) = vars.get("HMAC_SECRET") {
            builder = builder.set_override("webhook.hmac_secret", secret.as_str())?;
        }

        if let Some(minutes) = vars.get("TIMESTAMP_TOLERANCE_MINUTES") {
            builder = builder.set_override("webhook.timestamp_tolerance", minutes.as_str())?;
        }

        let config: Config = builder.build()?.try_deserialize()?;

        // Reject malformed or inconsistent durations at load
        config.auth_config()?;

        Ok(config)
    }

    /// `host:port` to listen on
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_grace_secs)
    }

    /// Authenticator settings
    ///
    /// Nonce retention must cover the timestamp tolerance: a nonce's age runs
    /// from its claimed time, so a shorter retention forgets nonces that are
    /// still fresh enough to be replayed.
    pub fn auth_config(&self) -> Result<AuthConfig, ConfigError> {
        let timestamp_tolerance = parse_duration(
            "webhook.timestamp_tolerance",
            &self.webhook.timestamp_tolerance,
        )?;
        let retention = parse_duration("webhook.nonce_retention", &self.webhook.nonce_retention)?;

        if timestamp_tolerance > retention {
            return Err(ConfigError::ToleranceExceedsRetention {
                tolerance_secs: timestamp_tolerance.as_secs(),
                retention_secs: retention.as_secs(),
            });
        }

        Ok(AuthConfig {
            timestamp_tolerance,
            nonce: NonceStoreConfig {
                retention,
                high_water_mark: self.webhook.nonce_high_water_mark,
            },
        })
    }
}

impl WebhookConfig {
    /// Shared signing secret, falling back to [`DEV_HMAC_SECRET`] when unset
    pub fn secret(&self) -> SharedSecret {
        if self.hmac_secret.is_empty() {
            tracing::warn!("No HMAC secret configured, using the development default");
            return SharedSecret::from(DEV_HMAC_SECRET);
        }
        SharedSecret::from(self.hmac_secret.as_str())
    }
}

/// Parse `"<n>s"`, `"<n>m"`, `"<n>h"` or a bare positive integer of minutes
pub fn parse_duration(key: &'static str, value: &str) -> Result<Duration, ConfigError> {
    let invalid = || ConfigError::InvalidDuration {
        key,
        value: value.to_string(),
    };

    let trimmed = value.trim();
    let (digits, unit_secs) = match trimmed.char_indices().last() {
        Some((i, 's')) => (&trimmed[..i], 1),
        Some((i, 'm')) => (&trimmed[..i], 60),
        Some((i, 'h')) => (&trimmed[..i], 60 * 60),
        Some(_) => (trimmed, 60),
        None => return Err(invalid()),
    };

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let n: u64 = digits.parse().map_err(|_| invalid())?;
    let secs = n.checked_mul(unit_secs).ok_or_else(invalid)?;
    if secs == 0 {
        return Err(invalid());
    }

    Ok(Duration::from_secs(secs))
}
