// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Configuration for the account rate limiter service.
//!
//! Every field has a serde default so a partial file or an empty
//! environment still yields a runnable service. Environment overrides are
//! applied with [`Config::apply_env`].

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Longest accepted attempt window (one year).
pub const MAX_PERIOD_SECS: u64 = 365 * 24 * 60 * 60;

/// Configuration error detected at startup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("rate limit period for '{key}' must be at least one second")]
    ZeroPeriod { key: String },

    #[error("rate limit period for '{key}' must be at most {max} seconds")]
    PeriodTooLarge { key: String, max: u64 },

    #[error("session lifetime must be between 1 and {max} seconds")]
    SessionTtl { max: u64 },

    #[error("unknown counter store backend '{0}' (expected 'memory' or 'redis')")]
    UnknownBackend(String),

    #[error("counter store backend 'redis' requires REDIS_URL")]
    MissingRedisUrl,

    #[error("counter store backend 'redis' is not compiled in (enable the 'redis' feature)")]
    RedisDisabled,

    #[error("invalid value for {name}: {value}")]
    InvalidVar { name: &'static str, value: String },
}

/// Configuration for the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address (default: 0.0.0.0:8080)
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Per-endpoint POST attempt limits
    #[serde(default)]
    pub endpoints: EndpointLimits,

    /// Counter store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Password hashing parameters
    #[serde(default)]
    pub passwords: PasswordConfig,

    /// Login session configuration
    #[serde(default)]
    pub sessions: SessionConfig,

    /// Insert the fixture accounts at startup (default: false)
    #[serde(default)]
    pub seed_users: bool,
}

/// Limit for a single protected endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Endpoint identifier, used as the counter key namespace
    pub key: String,

    /// Maximum POST attempts inside the window (default: 5)
    #[serde(default = "default_limit")]
    pub limit: u32,

    /// Window length in seconds, re-armed on every allowed attempt (default: 300)
    #[serde(default = "default_period_secs")]
    pub period_secs: u64,
}

/// Limits for the endpoints the service protects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointLimits {
    #[serde(default = "default_login_limit")]
    pub login: RateLimitConfig,

    #[serde(default = "default_register_limit")]
    pub register: RateLimitConfig,
}

/// Which counter store backs the limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Memory,
    Redis,
}

/// Counter store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Backend (default: memory)
    #[serde(default = "default_store_kind")]
    pub backend: StoreKind,

    /// Redis connection URL, required for the redis backend
    #[serde(default)]
    pub redis_url: Option<String>,

    /// How often expired in-memory counters are purged in seconds (default: 60)
    #[serde(default = "default_purge_interval_secs")]
    pub purge_interval_secs: u64,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable Prometheus metrics endpoint (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics endpoint path (default: /metrics)
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

/// Argon2id cost parameters for stored passwords.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordConfig {
    /// Memory cost in KiB (default: 19456)
    #[serde(default = "default_memory_cost_kib")]
    pub memory_cost_kib: u32,

    /// Iterations (default: 2)
    #[serde(default = "default_time_cost")]
    pub time_cost: u32,

    /// Lanes (default: 1)
    #[serde(default = "default_parallelism")]
    pub parallelism: u32,
}

/// Login session configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Session lifetime in seconds (default: 1209600, two weeks)
    #[serde(default = "default_session_ttl_secs")]
    pub ttl_secs: u64,
}

// Default value functions
fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_limit() -> u32 {
    5
}

fn default_period_secs() -> u64 {
    300
}

fn default_login_limit() -> RateLimitConfig {
    RateLimitConfig::new("login")
}

fn default_register_limit() -> RateLimitConfig {
    RateLimitConfig::new("register")
}

fn default_store_kind() -> StoreKind {
    StoreKind::Memory
}

fn default_purge_interval_secs() -> u64 {
    60
}

fn default_memory_cost_kib() -> u32 {
    19 * 1024
}

fn default_time_cost() -> u32 {
    2
}

fn default_parallelism() -> u32 {
    1
}

fn default_session_ttl_secs() -> u64 {
    14 * 24 * 60 * 60
}

fn default_true() -> bool {
    true
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            endpoints: EndpointLimits::default(),
            store: StoreConfig::default(),
            metrics: MetricsConfig::default(),
            passwords: PasswordConfig::default(),
            sessions: SessionConfig::default(),
            seed_users: false,
        }
    }
}

impl Default for EndpointLimits {
    fn default() -> Self {
        Self {
            login: default_login_limit(),
            register: default_register_limit(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_kind(),
            redis_url: None,
            purge_interval_secs: default_purge_interval_secs(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            path: default_metrics_path(),
        }
    }
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_cost_kib: default_memory_cost_kib(),
            time_cost: default_time_cost(),
            parallelism: default_parallelism(),
        }
    }
}

impl PasswordConfig {
    /// Cheap parameters for tests and local development. Not for production.
    pub fn fast() -> Self {
        Self {
            memory_cost_kib: 1024,
            time_cost: 1,
            parallelism: 1,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_session_ttl_secs(),
        }
    }
}

impl SessionConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl RateLimitConfig {
    /// Limit for `key` with the default 5 attempts per 300 seconds.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            limit: default_limit(),
            period_secs: default_period_secs(),
        }
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_period_secs(mut self, period_secs: u64) -> Self {
        self.period_secs = period_secs;
        self
    }

    /// Get the window duration
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_secs)
    }
}

impl StoreConfig {
    pub fn purge_interval(&self) -> Duration {
        Duration::from_secs(self.purge_interval_secs.max(1))
    }
}

impl FromStr for StoreKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "redis" => Ok(Self::Redis),
            other => Err(ConfigError::UnknownBackend(other.to_string())),
        }
    }
}

impl Config {
    /// Overlay variables from `lookup` onto this configuration.
    ///
    /// Recognised variables: `BIND_ADDR`, `RATE_LIMIT`, `RATE_PERIOD_SECS`
    /// (both applied to every endpoint), `COUNTER_STORE`, `REDIS_URL`,
    /// `METRICS_ENABLED`, `SEED_USERS`, `SESSION_TTL_SECS`.
    pub fn apply_env<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("BIND_ADDR") {
            self.bind_addr = addr;
        }
        if let Some(limit) = parse_var::<u32, _>(&lookup, "RATE_LIMIT")? {
            self.endpoints.login.limit = limit;
            self.endpoints.register.limit = limit;
        }
        if let Some(period) = parse_var::<u64, _>(&lookup, "RATE_PERIOD_SECS")? {
            self.endpoints.login.period_secs = period;
            self.endpoints.register.period_secs = period;
        }
        if let Some(backend) = lookup("COUNTER_STORE") {
            self.store.backend = backend.parse()?;
        }
        if let Some(url) = lookup("REDIS_URL") {
            self.store.redis_url = Some(url);
        }
        if let Some(enabled) = parse_flag(&lookup, "METRICS_ENABLED")? {
            self.metrics.enabled = enabled;
        }
        if let Some(seed) = parse_flag(&lookup, "SEED_USERS")? {
            self.seed_users = seed;
        }
        if let Some(ttl) = parse_var::<u64, _>(&lookup, "SESSION_TTL_SECS")? {
            self.sessions.ttl_secs = ttl;
        }
        Ok(self)
    }

    /// Reject configurations the service cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for limit in [&self.endpoints.login, &self.endpoints.register] {
            if limit.period_secs == 0 {
                return Err(ConfigError::ZeroPeriod {
                    key: limit.key.clone(),
                });
            }
            if limit.period_secs > MAX_PERIOD_SECS {
                return Err(ConfigError::PeriodTooLarge {
                    key: limit.key.clone(),
                    max: MAX_PERIOD_SECS,
                });
            }
        }
        if !(1..=MAX_PERIOD_SECS).contains(&self.sessions.ttl_secs) {
            return Err(ConfigError::SessionTtl {
                max: MAX_PERIOD_SECS,
            });
        }
        if self.store.backend == StoreKind::Redis {
            if !cfg!(feature = "redis") {
                return Err(ConfigError::RedisDisabled);
            }
            if self.store.redis_url.is_none() {
                return Err(ConfigError::MissingRedisUrl);
            }
        }
        Ok(())
    }
}

fn parse_var<T, F>(
    lookup: &F,
    name: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidVar { name, value })
        })
        .transpose()
}

fn parse_flag<F>(lookup: &F, name: &'static str) -> Result<Option<bool>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|value| match value.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(ConfigError::InvalidVar { name, value }),
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.endpoints.login, RateLimitConfig::new("login"));
        assert_eq!(config.endpoints.login.limit, 5);
        assert_eq!(config.endpoints.register.period(), Duration::from_secs(300));
        assert_eq!(config.store.backend, StoreKind::Memory);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"endpoints": {"login": {"key": "login", "limit": 3}}}"#)
                .unwrap();
        assert_eq!(config.endpoints.login.limit, 3);
        assert_eq!(config.endpoints.login.period_secs, 300);
        assert_eq!(config.endpoints.register.key, "register");
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::default()
            .apply_env(env(&[
                ("BIND_ADDR", "127.0.0.1:9000"),
                ("RATE_LIMIT", "10"),
                ("RATE_PERIOD_SECS", "60"),
                ("METRICS_ENABLED", "no"),
                ("SEED_USERS", "1"),
            ]))
            .unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.endpoints.login.limit, 10);
        assert_eq!(config.endpoints.register.limit, 10);
        assert_eq!(config.endpoints.register.period_secs, 60);
        assert!(!config.metrics.enabled);
        assert!(config.seed_users);
    }

    #[test]
    fn test_invalid_env_value() {
        let err = Config::default()
            .apply_env(env(&[("RATE_LIMIT", "many")]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidVar {
                name: "RATE_LIMIT",
                value: "many".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_backend() {
        let err = Config::default()
            .apply_env(env(&[("COUNTER_STORE", "memcached")]))
            .unwrap_err();
        assert_eq!(err, ConfigError::UnknownBackend("memcached".to_string()));
    }

    #[test]
    fn test_zero_period_rejected() {
        let mut config = Config::default();
        config.endpoints.register.period_secs = 0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroPeriod {
                key: "register".to_string()
            })
        );
    }

    #[test]
    fn test_oversized_period_rejected() {
        let config = Config::default()
            .apply_env(env(&[("RATE_PERIOD_SECS", "18446744073709551615")]))
            .unwrap();
        assert_eq!(
            config.validate(),
            Err(ConfigError::PeriodTooLarge {
                key: "login".to_string(),
                max: MAX_PERIOD_SECS,
            })
        );

        let mut config = Config::default();
        config.endpoints.register.period_secs = MAX_PERIOD_SECS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_session_ttl_bounds() {
        let config = Config::default()
            .apply_env(env(&[("SESSION_TTL_SECS", "0")]))
            .unwrap();
        assert_eq!(
            config.validate(),
            Err(ConfigError::SessionTtl {
                max: MAX_PERIOD_SECS
            })
        );
        assert_eq!(Config::default().sessions.ttl(), Duration::from_secs(1_209_600));
    }

    #[test]
    fn test_redis_requires_url() {
        let mut config = Config::default();
        config.store.backend = StoreKind::Redis;
        let err = config.validate().unwrap_err();
        if cfg!(feature = "redis") {
            assert_eq!(err, ConfigError::MissingRedisUrl);
        } else {
            assert_eq!(err, ConfigError::RedisDisabled);
        }
    }
}
