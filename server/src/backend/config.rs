//! # Configuration
//!
//! Explicit startup configuration handed to every service. Values come from
//! `CAMPUS_*` environment variables with defaults, and are validated once
//! before the backend is initialized.

use std::{env, fmt::Display, str::FromStr};

use chrono::{FixedOffset, Offset, Utc};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: &'static str, message: String },

    #[error("{0}")]
    Inconsistent(String),
}

/// Business limits shared by the spending and deposit services
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyConfig {
    /// Ceiling for a single parent deposit
    pub max_deposit_amount: f64,
    /// Daily cap applied when a student has no stored limit
    pub default_daily_limit: f64,
    /// Monthly cap applied when a student has no stored limit
    pub default_monthly_limit: f64,
    /// Daily usage percentage at which parents get a warning
    pub alert_threshold_percent: f64,
    /// Balance below which parents get a low balance alert
    pub low_balance_threshold: f64,
    /// Offset used to find local day and month boundaries
    pub utc_offset_minutes: i32,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            max_deposit_amount: 10_000.0,
            default_daily_limit: 50.0,
            default_monthly_limit: 500.0,
            alert_threshold_percent: 80.0,
            low_balance_threshold: 5.0,
            utc_offset_minutes: 0,
        }
    }
}

impl PolicyConfig {
    pub fn local_offset(&self) -> FixedOffset {
        // validate() keeps the offset within a day
        FixedOffset::east_opt(self.utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("CAMPUS_MAX_DEPOSIT", self.max_deposit_amount)?;
        positive("CAMPUS_DEFAULT_DAILY_LIMIT", self.default_daily_limit)?;
        positive("CAMPUS_DEFAULT_MONTHLY_LIMIT", self.default_monthly_limit)?;

        if self.default_daily_limit > self.default_monthly_limit {
            return Err(ConfigError::Inconsistent(format!(
                "Default daily limit {:.2} exceeds default monthly limit {:.2}",
                self.default_daily_limit, self.default_monthly_limit
            )));
        }

        if !(self.alert_threshold_percent > 0.0 && self.alert_threshold_percent <= 100.0) {
            return Err(ConfigError::InvalidValue {
                key: "CAMPUS_ALERT_THRESHOLD_PERCENT",
                message: "must be in (0, 100]".to_string(),
            });
        }

        if !self.low_balance_threshold.is_finite() || self.low_balance_threshold < 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "CAMPUS_LOW_BALANCE_THRESHOLD",
                message: "must be zero or positive".to_string(),
            });
        }

        if self.utc_offset_minutes.abs() >= 24 * 60 {
            return Err(ConfigError::InvalidValue {
                key: "CAMPUS_UTC_OFFSET_MINUTES",
                message: "must be within one day".to_string(),
            });
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: String,
    pub cors_origin: String,
    /// Shared secret the payment processor presents to settle deposits.
    /// Settlement routes refuse every request while it is unset.
    pub payment_token: Option<String>,
    pub policy: PolicyConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite:campus_card.db".to_string(),
            bind_addr: "127.0.0.1:3000".to_string(),
            cors_origin: "http://localhost:8080".to_string(),
            payment_token: None,
            policy: PolicyConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from the environment and validate
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            database_url: try_load("CAMPUS_DATABASE_URL", defaults.database_url)?,
            bind_addr: try_load("CAMPUS_BIND_ADDR", defaults.bind_addr)?,
            cors_origin: try_load("CAMPUS_CORS_ORIGIN", defaults.cors_origin)?,
            payment_token: load_secret("CAMPUS_PAYMENT_TOKEN"),
            policy: PolicyConfig {
                max_deposit_amount: try_load("CAMPUS_MAX_DEPOSIT", defaults.policy.max_deposit_amount)?,
                default_daily_limit: try_load(
                    "CAMPUS_DEFAULT_DAILY_LIMIT",
                    defaults.policy.default_daily_limit,
                )?,
                default_monthly_limit: try_load(
                    "CAMPUS_DEFAULT_MONTHLY_LIMIT",
                    defaults.policy.default_monthly_limit,
                )?,
                alert_threshold_percent: try_load(
                    "CAMPUS_ALERT_THRESHOLD_PERCENT",
                    defaults.policy.alert_threshold_percent,
                )?,
                low_balance_threshold: try_load(
                    "CAMPUS_LOW_BALANCE_THRESHOLD",
                    defaults.policy.low_balance_threshold,
                )?,
                utc_offset_minutes: try_load(
                    "CAMPUS_UTC_OFFSET_MINUTES",
                    defaults.policy.utc_offset_minutes,
                )?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "CAMPUS_DATABASE_URL",
                message: "must not be empty".to_string(),
            });
        }
        self.policy.validate()
    }
}

fn positive(key: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            key,
            message: format!("must be a positive number, got {}", value),
        })
    }
}

/// Secrets are never logged; blank counts as unset
fn load_secret(key: &'static str) -> Option<String> {
    let secret = env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());
    if secret.is_none() {
        warn!("{key} not set, deposit settlement routes are disabled");
    }
    secret
}

fn try_load<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| {
            warn!("Invalid {key} value: {e}");
            ConfigError::InvalidValue {
                key,
                message: e.to_string(),
            }
        }),
        Err(_) => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}
