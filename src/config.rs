//! Configuration module for the stream notifier.
//!
//! This module provides environment-based configuration: the streaming
//! endpoint, the pre-signed request, buffer sizing, timeouts and backoff
//! tuning.

use std::env;
use std::time::Duration;

use crate::buffer::DEFAULT_BUFFER_CAPACITY;
use crate::framer::DEFAULT_READ_CHUNK_SIZE;
use crate::retry::BackoffPolicy;
use crate::sink::DEFAULT_EVENT_QUEUE_CAPACITY;

/// Default streaming endpoint
const DEFAULT_STREAM_URL: &str = "https://stream.twitter.com/1.1/statuses/filter.json";

/// Default form-encoded filter body
const DEFAULT_POST_BODY: &str = "track=%23metoo";

/// Smallest buffer that can hold a typical document
const MIN_BUFFER_CAPACITY: usize = 1024;

/// Largest buffer the device can afford
const MAX_BUFFER_CAPACITY: usize = 1024 * 1024;

/// Default connect timeout in seconds
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Maximum connect timeout in seconds
const MAX_CONNECT_TIMEOUT_SECS: u64 = 300;

/// Default stall timeout in seconds; the server sends keep-alives every 30s
const DEFAULT_STALL_TIMEOUT_SECS: u64 = 90;

/// Maximum stall timeout in seconds
const MAX_STALL_TIMEOUT_SECS: u64 = 3600;

/// Maximum event queue capacity
const MAX_EVENT_QUEUE_CAPACITY: usize = 10_000;

/// Configuration for the stream notifier.
///
/// All settings can be configured via environment variables:
/// - `STREAM_NOTIFIER_STREAM_URL`: Streaming endpoint
/// - `STREAM_NOTIFIER_AUTHORIZATION`: Pre-signed `Authorization` value (required)
/// - `STREAM_NOTIFIER_POST_BODY`: Form body the authorization was signed over
/// - `STREAM_NOTIFIER_BUFFER_CAPACITY`: Rolling buffer size in bytes (default: 25600)
/// - `STREAM_NOTIFIER_READ_CHUNK_SIZE`: Bytes requested per read (default: 1024)
/// - `STREAM_NOTIFIER_CONNECT_TIMEOUT_SECS`: Connect timeout (default: 30)
/// - `STREAM_NOTIFIER_STALL_TIMEOUT_SECS`: Read stall timeout (default: 90)
/// - `STREAM_NOTIFIER_EVENT_QUEUE_CAPACITY`: Pending notifications (default: 100)
/// - `STREAM_NOTIFIER_RATE_LIMIT_CAP_MS`: Optional ceiling on rate-limit backoff
#[derive(Debug, Clone)]
pub struct Config {
    /// URL of the streaming endpoint
    pub stream_url: String,

    /// Opaque OAuth `Authorization` header value
    pub authorization: String,

    /// Form-encoded POST body carrying the filter
    pub post_body: String,

    /// Rolling buffer capacity in bytes
    pub buffer_capacity: usize,

    /// Bytes requested per body read
    pub read_chunk_size: usize,

    /// Timeout for establishing the connection
    pub connect_timeout: Duration,

    /// A body read that yields nothing for this long fails
    pub stall_timeout: Duration,

    /// Capacity of the feedback queue
    pub event_queue_capacity: usize,

    /// Optional ceiling on rate-limit backoff, in milliseconds
    pub rate_limit_cap_ms: Option<u64>,
}

/// Error type for configuration loading failures
#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
    pub env_var: Option<String>,
}

impl ConfigError {
    fn new(env_var: &str, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            env_var: Some(env_var.to_string()),
        }
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.env_var {
            Some(var) => write!(f, "Configuration error for {}: {}", var, self.message),
            None => write!(f, "Configuration error: {}", self.message),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - `STREAM_NOTIFIER_AUTHORIZATION` is missing or empty
    /// - a numeric variable is not a valid number or is out of range
    /// - the read chunk size exceeds the buffer capacity
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use stream_notifier::config::Config;
    ///
    /// let config = Config::from_env().expect("Failed to load config");
    /// println!("Stream URL: {}", config.stream_url);
    /// ```
    pub fn from_env() -> Result<Self, ConfigError> {
        let stream_url = env::var("STREAM_NOTIFIER_STREAM_URL")
            .unwrap_or_else(|_| DEFAULT_STREAM_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let authorization = Self::parse_authorization()?;

        let post_body = env::var("STREAM_NOTIFIER_POST_BODY")
            .unwrap_or_else(|_| DEFAULT_POST_BODY.to_string());

        let buffer_capacity = Self::parse_bounded(
            "STREAM_NOTIFIER_BUFFER_CAPACITY",
            DEFAULT_BUFFER_CAPACITY,
            MIN_BUFFER_CAPACITY,
            MAX_BUFFER_CAPACITY,
        )?;

        let read_chunk_size = Self::parse_bounded(
            "STREAM_NOTIFIER_READ_CHUNK_SIZE",
            DEFAULT_READ_CHUNK_SIZE,
            1,
            buffer_capacity,
        )?;

        let connect_timeout_secs = Self::parse_bounded(
            "STREAM_NOTIFIER_CONNECT_TIMEOUT_SECS",
            DEFAULT_CONNECT_TIMEOUT_SECS,
            1,
            MAX_CONNECT_TIMEOUT_SECS,
        )?;

        let stall_timeout_secs = Self::parse_bounded(
            "STREAM_NOTIFIER_STALL_TIMEOUT_SECS",
            DEFAULT_STALL_TIMEOUT_SECS,
            1,
            MAX_STALL_TIMEOUT_SECS,
        )?;

        let event_queue_capacity = Self::parse_bounded(
            "STREAM_NOTIFIER_EVENT_QUEUE_CAPACITY",
            DEFAULT_EVENT_QUEUE_CAPACITY,
            1,
            MAX_EVENT_QUEUE_CAPACITY,
        )?;

        let rate_limit_cap_ms = Self::parse_rate_limit_cap()?;

        Ok(Self {
            stream_url,
            authorization,
            post_body,
            buffer_capacity,
            read_chunk_size,
            connect_timeout: Duration::from_secs(connect_timeout_secs),
            stall_timeout: Duration::from_secs(stall_timeout_secs),
            event_queue_capacity,
            rate_limit_cap_ms,
        })
    }

    /// Backoff policy derived from this configuration.
    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            rate_limit_cap_ms: self.rate_limit_cap_ms,
        }
    }

    /// Parse the required pre-signed authorization value.
    fn parse_authorization() -> Result<String, ConfigError> {
        let env_var = "STREAM_NOTIFIER_AUTHORIZATION";

        match env::var(env_var) {
            Ok(value) if !value.trim().is_empty() => Ok(value),
            Ok(_) => Err(ConfigError::new(env_var, "authorization must not be empty")),
            Err(_) => Err(ConfigError::new(env_var, "authorization is required")),
        }
    }

    /// Parse a numeric variable, falling back to `default` when unset.
    fn parse_bounded<N>(env_var: &str, default: N, min: N, max: N) -> Result<N, ConfigError>
    where
        N: std::str::FromStr + PartialOrd + std::fmt::Display + Copy,
    {
        match env::var(env_var) {
            Ok(value) => {
                let parsed: N = value.parse().map_err(|_| {
                    ConfigError::new(env_var, format!("'{}' is not a valid number", value))
                })?;

                if parsed < min {
                    return Err(ConfigError::new(
                        env_var,
                        format!("{} is below minimum ({})", parsed, min),
                    ));
                }

                if parsed > max {
                    return Err(ConfigError::new(
                        env_var,
                        format!("{} exceeds maximum ({})", parsed, max),
                    ));
                }

                Ok(parsed)
            }
            Err(_) => Ok(default),
        }
    }

    /// Parse the optional rate-limit ceiling.
    fn parse_rate_limit_cap() -> Result<Option<u64>, ConfigError> {
        let env_var = "STREAM_NOTIFIER_RATE_LIMIT_CAP_MS";

        match env::var(env_var) {
            Ok(value) => {
                let cap: u64 = value.parse().map_err(|_| {
                    ConfigError::new(env_var, format!("'{}' is not a valid number", value))
                })?;
                if cap == 0 {
                    return Err(ConfigError::new(env_var, "cap must be greater than 0"));
                }
                Ok(Some(cap))
            }
            Err(_) => Ok(None),
        }
    }
}

impl Default for Config {
    /// Create a default configuration with an empty authorization.
    ///
    /// This is useful for testing or when environment variables are not set.
    fn default() -> Self {
        Self {
            stream_url: DEFAULT_STREAM_URL.to_string(),
            authorization: String::new(),
            post_body: DEFAULT_POST_BODY.to_string(),
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            stall_timeout: Duration::from_secs(DEFAULT_STALL_TIMEOUT_SECS),
            event_queue_capacity: DEFAULT_EVENT_QUEUE_CAPACITY,
            rate_limit_cap_ms: None,
        }
    }
}
