//! Application configuration
//!
//! Loaded from environment variables, with a `.env` file honoured when present.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub app: AppSettings,
    pub gateway: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub jwt: JwtConfig,
    pub presence: PresenceConfig,
}

/// General application settings
#[derive(Debug, Clone)]
pub struct AppSettings {
    pub name: String,
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "staging" => Ok(Self::Staging),
            "development" | "dev" => Ok(Self::Development),
            other => Err(ConfigError::InvalidValue("APP_ENV", other.to_string())),
        }
    }
}

/// Listener configuration for the gateway
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Redis configuration
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
    pub max_connections: u32,
}

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    /// Access token lifetime in seconds
    pub access_token_expiry: i64,
}

/// Presence timings and limits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceConfig {
    /// Silence after which a user is considered offline
    pub timeout_window_secs: u64,
    /// Expiry of a live (non-offline) record
    pub online_ttl_secs: u64,
    /// Expiry of an offline record, kept for "last seen"
    pub offline_ttl_secs: u64,
    /// Heartbeat interval advertised to clients
    pub heartbeat_interval_ms: u64,
    /// Maximum ids per `get_presence` and page size per `get_online_users`
    pub max_batch: usize,
    /// Capacity of the supervisor-to-coordinator transition channel
    pub transition_buffer: usize,
    /// Period of the stale-record sweep; `0` disables it
    pub sweep_interval_secs: u64,
}

impl PresenceConfig {
    #[must_use]
    pub fn timeout_window(&self) -> Duration {
        Duration::from_secs(self.timeout_window_secs)
    }

    /// Sweep period, or `None` when the sweep is disabled
    #[must_use]
    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_secs > 0).then(|| Duration::from_secs(self.sweep_interval_secs))
    }

    /// Reject values that would leave presence unusable
    ///
    /// # Errors
    /// Returns `InvalidValue` naming the first zero timing, expiry or size
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            ("PRESENCE_TIMEOUT_WINDOW_SECS", self.timeout_window_secs == 0),
            ("PRESENCE_ONLINE_TTL_SECS", self.online_ttl_secs == 0),
            ("PRESENCE_OFFLINE_TTL_SECS", self.offline_ttl_secs == 0),
            ("PRESENCE_MAX_BATCH", self.max_batch == 0),
            ("PRESENCE_TRANSITION_BUFFER", self.transition_buffer == 0),
        ];
        match checks.into_iter().find(|(_, zero)| *zero) {
            Some((key, _)) => Err(ConfigError::InvalidValue(key, "0".to_string())),
            None => Ok(()),
        }
    }
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            timeout_window_secs: 60,
            online_ttl_secs: 60,
            offline_ttl_secs: 86_400,
            heartbeat_interval_ms: 30_000,
            max_batch: 100,
            transition_buffer: 1024,
            sweep_interval_secs: 60,
        }
    }
}

const DEFAULT_APP_NAME: &str = "presence-server";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 20;
const DEFAULT_DB_MIN_CONNECTIONS: u32 = 5;
const DEFAULT_REDIS_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_ACCESS_TOKEN_EXPIRY: i64 = 900;

/// Reads variables through a lookup function so tests need not touch the process env
struct Vars<F> {
    lookup: F,
}

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn required(&self, key: &'static str) -> Result<String, ConfigError> {
        (self.lookup)(key).ok_or(ConfigError::MissingVar(key))
    }

    fn string_or(&self, key: &str, default: &str) -> String {
        (self.lookup)(key).unwrap_or_else(|| default.to_string())
    }

    fn parsed_or<T: FromStr>(&self, key: &'static str, default: T) -> Result<T, ConfigError> {
        match (self.lookup)(key) {
            None => Ok(default),
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key, raw)),
        }
    }

    fn parsed_required<T: FromStr>(&self, key: &'static str) -> Result<T, ConfigError> {
        let raw = self.required(key)?;
        raw.trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key, raw))
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if a required variable is missing or a value does not parse
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars { lookup };
        let defaults = PresenceConfig::default();

        let env = match (vars.lookup)("APP_ENV") {
            Some(raw) => raw.parse()?,
            None => Environment::default(),
        };

        let presence = PresenceConfig {
            timeout_window_secs: vars
                .parsed_or("PRESENCE_TIMEOUT_WINDOW_SECS", defaults.timeout_window_secs)?,
            online_ttl_secs: vars.parsed_or("PRESENCE_ONLINE_TTL_SECS", defaults.online_ttl_secs)?,
            offline_ttl_secs: vars
                .parsed_or("PRESENCE_OFFLINE_TTL_SECS", defaults.offline_ttl_secs)?,
            heartbeat_interval_ms: vars
                .parsed_or("PRESENCE_HEARTBEAT_INTERVAL_MS", defaults.heartbeat_interval_ms)?,
            max_batch: vars.parsed_or("PRESENCE_MAX_BATCH", defaults.max_batch)?,
            transition_buffer: vars
                .parsed_or("PRESENCE_TRANSITION_BUFFER", defaults.transition_buffer)?,
            sweep_interval_secs: vars
                .parsed_or("PRESENCE_SWEEP_INTERVAL_SECS", defaults.sweep_interval_secs)?,
        };
        presence.validate()?;

        Ok(Self {
            app: AppSettings {
                name: vars.string_or("APP_NAME", DEFAULT_APP_NAME),
                env,
            },
            gateway: ServerConfig {
                host: vars.string_or("GATEWAY_HOST", DEFAULT_HOST),
                port: vars.parsed_required("GATEWAY_PORT")?,
            },
            database: DatabaseConfig {
                url: vars.required("DATABASE_URL")?,
                max_connections: vars
                    .parsed_or("DATABASE_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS)?,
                min_connections: vars
                    .parsed_or("DATABASE_MIN_CONNECTIONS", DEFAULT_DB_MIN_CONNECTIONS)?,
            },
            redis: RedisConfig {
                url: vars.required("REDIS_URL")?,
                max_connections: vars
                    .parsed_or("REDIS_MAX_CONNECTIONS", DEFAULT_REDIS_MAX_CONNECTIONS)?,
            },
            jwt: JwtConfig {
                secret: vars.required("JWT_SECRET")?,
                access_token_expiry: vars
                    .parsed_or("JWT_ACCESS_TOKEN_EXPIRY", DEFAULT_ACCESS_TOKEN_EXPIRY)?,
            },
            presence,
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
