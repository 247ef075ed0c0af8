//! Application configuration module
//!
//! Provides configuration types for the application. `AppConfig::from_env`
//! reads the process environment (after `dotenv` has populated it); tests
//! use `AppConfig::builder()` instead.

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// Messaging tunables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagingConfig {
    /// Page size used when a history request carries no `limit`
    pub page_size: usize,
    /// Upper bound every `limit` is clamped to
    pub page_max: usize,
    /// Characters kept in `lastMessagePreview`
    pub preview_length: usize,
    /// Attempts made at the conversation touch before reporting `degraded`
    pub touch_retry_attempts: u32,
    /// Delay before the first touch retry; doubles on every further attempt
    pub touch_retry_backoff: Duration,
    /// Require participation for history reads and realtime room joins
    pub enforce_participation: bool,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            page_size: 20,
            page_max: 100,
            preview_length: 120,
            touch_retry_attempts: 3,
            touch_retry_backoff: Duration::from_millis(50),
            enforce_participation: true,
        }
    }
}

/// Presence tunables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceConfig {
    /// An online record idle for longer than this is swept offline
    pub idle_timeout: Duration,
    /// How often the idle sweep runs
    pub sweep_interval: Duration,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Interface to bind
    pub host: String,
    /// Port to bind
    pub port: u16,
    /// Postgres connection string; in-memory stores are used when absent
    pub database_url: Option<String>,
    /// HS256 secret for session tokens
    pub jwt_secret: String,
    /// Allowed CORS origin; any origin when absent
    pub cors_origin: Option<String>,
    pub messaging: MessagingConfig,
    pub presence: PresenceConfig,
}

impl AppConfig {
    /// Create a new AppConfigBuilder
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Load the configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let jwt_secret = std::env::var("JWT_SECRET").map_err(|_| ConfigError::MissingValue("JWT_SECRET"))?;

        let mut builder = Self::builder()
            .jwt_secret(jwt_secret)
            .host(std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()))
            .port(env_or("SERVER_PORT", 3000)?)
            .page_size(env_or("MESSAGE_PAGE_SIZE", 20)?)
            .page_max(env_or("MESSAGE_PAGE_MAX", 100)?)
            .preview_length(env_or("MESSAGE_PREVIEW_LENGTH", 120)?)
            .touch_retry_attempts(env_or("TOUCH_RETRY_ATTEMPTS", 3)?)
            .touch_retry_backoff(Duration::from_millis(env_or("TOUCH_RETRY_BACKOFF_MS", 50)?))
            .enforce_participation(env_or("ENFORCE_PARTICIPATION", true)?)
            .presence_idle_timeout(Duration::from_secs(env_or("PRESENCE_IDLE_TIMEOUT_SECS", 300)?))
            .presence_sweep_interval(Duration::from_secs(env_or(
                "PRESENCE_SWEEP_INTERVAL_SECS",
                60,
            )?));

        if let Ok(url) = std::env::var("DATABASE_URL") {
            builder = builder.database_url(url);
        }
        if let Ok(origin) = std::env::var("CORS_ORIGIN") {
            builder = builder.cors_origin(origin);
        }

        builder.build()
    }

    /// Address to bind the listener to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.trim().is_empty() {
            return Err(ConfigError::MissingValue("JWT_SECRET"));
        }
        if self.messaging.page_size == 0 {
            return Err(ConfigError::Invalid(
                "MESSAGE_PAGE_SIZE must be at least 1".to_string(),
            ));
        }
        if self.messaging.page_size > self.messaging.page_max {
            return Err(ConfigError::Invalid(format!(
                "MESSAGE_PAGE_SIZE ({}) exceeds MESSAGE_PAGE_MAX ({})",
                self.messaging.page_size, self.messaging.page_max
            )));
        }
        if self.messaging.touch_retry_attempts == 0 {
            return Err(ConfigError::Invalid(
                "TOUCH_RETRY_ATTEMPTS must be at least 1".to_string(),
            ));
        }
        if self.presence.sweep_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "PRESENCE_SWEEP_INTERVAL_SECS must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value: raw }),
        Err(_) => Ok(default),
    }
}

/// Builder for AppConfig
#[derive(Debug)]
pub struct AppConfigBuilder {
    host: String,
    port: u16,
    database_url: Option<String>,
    jwt_secret: Option<String>,
    cors_origin: Option<String>,
    messaging: MessagingConfig,
    presence: PresenceConfig,
}

impl Default for AppConfigBuilder {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            database_url: None,
            jwt_secret: None,
            cors_origin: None,
            messaging: MessagingConfig::default(),
            presence: PresenceConfig::default(),
        }
    }
}

impl AppConfigBuilder {
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    pub fn jwt_secret(mut self, secret: impl Into<String>) -> Self {
        self.jwt_secret = Some(secret.into());
        self
    }

    pub fn cors_origin(mut self, origin: impl Into<String>) -> Self {
        self.cors_origin = Some(origin.into());
        self
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.messaging.page_size = page_size;
        self
    }

    pub fn page_max(mut self, page_max: usize) -> Self {
        self.messaging.page_max = page_max;
        self
    }

    pub fn preview_length(mut self, preview_length: usize) -> Self {
        self.messaging.preview_length = preview_length;
        self
    }

    pub fn touch_retry_attempts(mut self, attempts: u32) -> Self {
        self.messaging.touch_retry_attempts = attempts;
        self
    }

    pub fn touch_retry_backoff(mut self, backoff: Duration) -> Self {
        self.messaging.touch_retry_backoff = backoff;
        self
    }

    pub fn enforce_participation(mut self, enforce: bool) -> Self {
        self.messaging.enforce_participation = enforce;
        self
    }

    pub fn presence_idle_timeout(mut self, timeout: Duration) -> Self {
        self.presence.idle_timeout = timeout;
        self
    }

    pub fn presence_sweep_interval(mut self, interval: Duration) -> Self {
        self.presence.sweep_interval = interval;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<AppConfig, ConfigError> {
        let config = AppConfig {
            host: self.host,
            port: self.port,
            database_url: self.database_url,
            jwt_secret: self.jwt_secret.ok_or(ConfigError::MissingValue("JWT_SECRET"))?,
            cors_origin: self.cors_origin,
            messaging: self.messaging,
            presence: self.presence,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Configuration errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing value: {0}")]
    MissingValue(&'static str),
    #[error("invalid value for {key}: '{value}'")]
    InvalidValue { key: &'static str, value: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
