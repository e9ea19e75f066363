//! Configuration management module.
//!
//! Handles loading configuration from environment variables.

use std::env;
use std::time::Duration;

use crate::error::AppError;
use crate::ethereum::constants::{
    DEFAULT_BALANCE_TIMEOUT, DEFAULT_MINED_TIMEOUT, DEFAULT_POLL_INTERVAL,
    DEFAULT_REQUEST_TIMEOUT,
};

/// Deadlines applied to node operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Deadline for `eth_getBalance`.
    pub balance: Duration,
    /// Deadline for every other single request.
    pub request: Duration,
    /// Default deadline for waiting on a receipt.
    pub mined: Duration,
    /// Default interval between receipt polls.
    pub poll_interval: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            balance: DEFAULT_BALANCE_TIMEOUT,
            request: DEFAULT_REQUEST_TIMEOUT,
            mined: DEFAULT_MINED_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Application configuration.
#[derive(Clone)]
pub struct Config {
    /// Ethereum JSON-RPC endpoint URL (http, https, ws or wss).
    pub rpc_url: String,
    /// Private key for signing (hex string, optional 0x prefix).
    ///
    /// Without it the server runs read-only.
    pub private_key: Option<String>,
    /// Logging level (default: info).
    pub log_level: String,
    /// Node operation deadlines.
    pub timeouts: Timeouts,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required environment variables:
    /// - `ETHEREUM_RPC_URL`: Ethereum JSON-RPC endpoint
    ///
    /// Optional environment variables:
    /// - `ETHEREUM_PRIVATE_KEY`: Private key for deploy/send (hex)
    /// - `LOG_LEVEL`: Logging level (default: info)
    /// - `REQUEST_TIMEOUT_SECS`, `BALANCE_TIMEOUT_SECS`, `MINED_TIMEOUT_SECS`,
    ///   `POLL_INTERVAL_MS`: deadline overrides
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present
        let _ = dotenvy::dotenv();

        let rpc_url = env::var("ETHEREUM_RPC_URL").map_err(|_| {
            AppError::Config("ETHEREUM_RPC_URL environment variable not set".into())
        })?;

        let private_key = env::var("ETHEREUM_PRIVATE_KEY").ok().filter(|k| !k.trim().is_empty());

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let defaults = Timeouts::default();
        let timeouts = Timeouts {
            request: duration_var("REQUEST_TIMEOUT_SECS", Duration::from_secs)?
                .unwrap_or(defaults.request),
            balance: duration_var("BALANCE_TIMEOUT_SECS", Duration::from_secs)?
                .unwrap_or(defaults.balance),
            mined: duration_var("MINED_TIMEOUT_SECS", Duration::from_secs)?
                .unwrap_or(defaults.mined),
            poll_interval: duration_var("POLL_INTERVAL_MS", Duration::from_millis)?
                .unwrap_or(defaults.poll_interval),
        };

        Ok(Self { rpc_url, private_key, log_level, timeouts })
    }
}

// The private key must never end up in logs.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("rpc_url", &self.rpc_url)
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("log_level", &self.log_level)
            .field("timeouts", &self.timeouts)
            .finish()
    }
}

fn duration_var(name: &str, unit: fn(u64) -> Duration) -> Result<Option<Duration>, AppError> {
    match env::var(name) {
        Ok(raw) => parse_duration(name, &raw, unit).map(Some),
        Err(_) => Ok(None),
    }
}

fn parse_duration(name: &str, raw: &str, unit: fn(u64) -> Duration) -> Result<Duration, AppError> {
    let value: u64 = raw
        .trim()
        .parse()
        .map_err(|e| AppError::Config(format!("{name} must be a positive integer: {e}")))?;
    if value == 0 {
        return Err(AppError::Config(format!("{name} must be greater than zero")));
    }
    Ok(unit(value))
}
