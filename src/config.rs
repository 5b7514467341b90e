//! Environment configuration
//!
//! Everything comes from `INTAKE_*` variables. Missing or malformed required
//! values stop the process before any I/O starts.

use crate::intake::validator::{DEFAULT_BATCHES, DEFAULT_TEST_TYPES};
use crate::intake::{IntakeRules, OperatorId};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub const BOT_TOKEN: &str = "INTAKE_BOT_TOKEN";
pub const OPERATOR_ID: &str = "INTAKE_OPERATOR_ID";
pub const API_KEY: &str = "INTAKE_API_KEY";
pub const UPLOAD_URL: &str = "INTAKE_UPLOAD_URL";
pub const BATCHES: &str = "INTAKE_BATCHES";
pub const TEST_TYPES: &str = "INTAKE_TEST_TYPES";
pub const SESSION_TTL_SECS: &str = "INTAKE_SESSION_TTL_SECS";
pub const UPLOAD_TIMEOUT_SECS: &str = "INTAKE_UPLOAD_TIMEOUT_SECS";
pub const TELEGRAM_API: &str = "INTAKE_TELEGRAM_API";

const DEFAULT_SESSION_TTL_SECS: u64 = 30 * 60;
const DEFAULT_UPLOAD_TIMEOUT_SECS: u64 = 120;
const DEFAULT_TELEGRAM_API: &str = "https://api.telegram.org";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Runtime configuration
#[derive(Clone)]
pub struct IntakeConfig {
    pub bot_token: String,
    pub authorized_operator: OperatorId,
    pub api_key: String,
    pub upload_url: String,
    pub telegram_api: String,
    pub rules: IntakeRules,
    /// `None` keeps abandoned sessions until restart
    pub session_ttl: Option<Duration>,
    pub upload_timeout: Duration,
}

impl fmt::Debug for IntakeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntakeConfig")
            .field("bot_token", &"<redacted>")
            .field("authorized_operator", &self.authorized_operator)
            .field("api_key", &"<redacted>")
            .field("upload_url", &self.upload_url)
            .field("telegram_api", &self.telegram_api)
            .field("rules", &self.rules)
            .field("session_ttl", &self.session_ttl)
            .field("upload_timeout", &self.upload_timeout)
            .finish()
    }
}

impl IntakeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &'static str| lookup(name).filter(|v| !v.trim().is_empty());
        let require = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let bot_token = require(BOT_TOKEN)?;
        let authorized_operator = require(OPERATOR_ID)?
            .trim()
            .parse::<i64>()
            .map(OperatorId)
            .map_err(|e| ConfigError::Invalid {
                name: OPERATOR_ID,
                reason: e.to_string(),
            })?;
        let api_key = require(API_KEY)?;

        let upload_url = require(UPLOAD_URL)?.trim().to_string();
        let parsed = reqwest::Url::parse(&upload_url).map_err(|e| ConfigError::Invalid {
            name: UPLOAD_URL,
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid {
                name: UPLOAD_URL,
                reason: format!("unsupported scheme {}", parsed.scheme()),
            });
        }

        let rules = IntakeRules::new(
            list(get(BATCHES), DEFAULT_BATCHES),
            list(get(TEST_TYPES), DEFAULT_TEST_TYPES),
        );
        if rules.batches().is_empty() {
            return Err(ConfigError::Invalid {
                name: BATCHES,
                reason: "no batches listed".to_string(),
            });
        }
        if rules.test_types().is_empty() {
            return Err(ConfigError::Invalid {
                name: TEST_TYPES,
                reason: "no test types listed".to_string(),
            });
        }

        let session_ttl = match seconds(
            get(SESSION_TTL_SECS),
            SESSION_TTL_SECS,
            DEFAULT_SESSION_TTL_SECS,
        )? {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        let upload_timeout = match seconds(
            get(UPLOAD_TIMEOUT_SECS),
            UPLOAD_TIMEOUT_SECS,
            DEFAULT_UPLOAD_TIMEOUT_SECS,
        )? {
            0 => {
                return Err(ConfigError::Invalid {
                    name: UPLOAD_TIMEOUT_SECS,
                    reason: "must be greater than zero".to_string(),
                })
            }
            secs => Duration::from_secs(secs),
        };

        let telegram_api = get(TELEGRAM_API).unwrap_or_else(|| DEFAULT_TELEGRAM_API.to_string());

        Ok(Self {
            bot_token,
            authorized_operator,
            api_key,
            upload_url,
            telegram_api,
            rules,
            session_ttl,
            upload_timeout,
        })
    }
}

/// Comma-separated list, or the defaults when unset
fn list(raw: Option<String>, defaults: &[&str]) -> Vec<String> {
    match raw {
        Some(raw) => raw.split(',').map(str::to_string).collect(),
        None => defaults.iter().map(|s| (*s).to_string()).collect(),
    }
}

fn seconds(raw: Option<String>, name: &'static str, default: u64) -> Result<u64, ConfigError> {
    raw.map_or(Ok(default), |v| {
        v.trim().parse().map_err(|_| ConfigError::Invalid {
            name,
            reason: format!("expected whole seconds, got {v:?}"),
        })
    })
}
