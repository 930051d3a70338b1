//! Configuration for Outreach

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Database configuration
    pub database: DatabaseConfig,

    /// Campaign engine configuration
    #[serde(default)]
    pub engine: EngineConfig,

    /// Dispatcher configuration
    #[serde(default)]
    pub dispatcher: DispatcherConfig,

    /// Transport session pool configuration
    #[serde(default)]
    pub sessions: SessionConfig,

    /// Daily digest configuration
    #[serde(default)]
    pub digest: DigestConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database URL
    pub url: String,

    /// Maximum connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    5
}

/// Campaign engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Default inter-send delay when a campaign does not specify one (seconds)
    #[serde(default = "default_delay_seconds")]
    pub default_delay_seconds: u32,

    /// Local time of day from which sending is allowed (HH:MM)
    #[serde(default = "default_window_start")]
    pub window_start: String,

    /// Local time of day after which sending is refused (HH:MM)
    #[serde(default = "default_window_end")]
    pub window_end: String,

    /// Flood-wait re-attempts per send before giving up
    #[serde(default = "default_flood_retry_limit")]
    pub flood_retry_limit: u32,

    /// Accumulated flood-wait ceiling per send (seconds)
    #[serde(default = "default_flood_wait_ceiling")]
    pub flood_wait_ceiling_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_delay_seconds: default_delay_seconds(),
            window_start: default_window_start(),
            window_end: default_window_end(),
            flood_retry_limit: default_flood_retry_limit(),
            flood_wait_ceiling_secs: default_flood_wait_ceiling(),
        }
    }
}

impl EngineConfig {
    /// Parse the configured send window
    pub fn send_window(&self) -> crate::Result<SendWindow> {
        let start = NaiveTime::parse_from_str(&self.window_start, "%H:%M")
            .map_err(|e| crate::Error::Config(format!("Invalid window_start: {}", e)))?;
        let end = NaiveTime::parse_from_str(&self.window_end, "%H:%M")
            .map_err(|e| crate::Error::Config(format!("Invalid window_end: {}", e)))?;
        Ok(SendWindow { start, end })
    }
}

fn default_delay_seconds() -> u32 {
    5
}

fn default_window_start() -> String {
    "09:00".to_string()
}

fn default_window_end() -> String {
    "22:00".to_string()
}

fn default_flood_retry_limit() -> u32 {
    3
}

fn default_flood_wait_ceiling() -> u64 {
    300
}

/// Daily interval within which campaigns may run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl SendWindow {
    /// Both bounds are inclusive
    pub fn contains(&self, now: NaiveTime) -> bool {
        self.start <= now && now <= self.end
    }
}

/// Dispatcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Interval between polls for pending campaigns (seconds)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Pending campaigns claimed per poll cycle
    #[serde(default = "default_claim_batch")]
    pub claim_batch: i64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            claim_batch: default_claim_batch(),
        }
    }
}

fn default_poll_interval() -> u64 {
    5
}

fn default_claim_batch() -> i64 {
    10
}

/// Transport session pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Idle sessions are evicted after this many seconds
    #[serde(default = "default_idle_ttl")]
    pub idle_ttl_secs: u64,

    /// Interval between eviction sweeps (seconds)
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_ttl_secs: default_idle_ttl(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

fn default_idle_ttl() -> u64 {
    1800
}

fn default_sweep_interval() -> u64 {
    300
}

/// Daily digest configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestConfig {
    /// Enable the daily cross-campaign digest
    #[serde(default)]
    pub enabled: bool,

    /// Local time of day at which the digest is delivered (HH:MM)
    #[serde(default = "default_digest_time")]
    pub deliver_at: String,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            deliver_at: default_digest_time(),
        }
    }
}

impl DigestConfig {
    /// Parse the configured delivery time
    pub fn delivery_time(&self) -> crate::Result<NaiveTime> {
        NaiveTime::parse_from_str(&self.deliver_at, "%H:%M")
            .map_err(|e| crate::Error::Config(format!("Invalid deliver_at: {}", e)))
    }
}

fn default_digest_time() -> String {
    "21:00".to_string()
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "json" or "text"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Load configuration from default locations
    pub fn load() -> crate::Result<Self> {
        let paths = [
            std::path::PathBuf::from("./config.toml"),
            std::path::PathBuf::from("/etc/outreach/config.toml"),
        ];

        for path in paths {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        Err(crate::Error::Config(
            "No configuration file found".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let engine = EngineConfig::default();
        assert_eq!(engine.default_delay_seconds, 5);
        assert_eq!(engine.window_start, "09:00");
        assert_eq!(engine.window_end, "22:00");

        let dispatcher = DispatcherConfig::default();
        assert_eq!(dispatcher.poll_interval_secs, 5);
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[database]
url = "postgres://localhost/outreach"

[engine]
window_start = "08:30"
flood_retry_limit = 5

[digest]
enabled = true
deliver_at = "20:00"
"#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.database.url, "postgres://localhost/outreach");
        assert_eq!(config.database.max_connections, 20);
        assert_eq!(config.engine.window_start, "08:30");
        assert_eq!(config.engine.flood_retry_limit, 5);
        assert_eq!(config.engine.window_end, "22:00");
        assert!(config.digest.enabled);
    }

    #[test]
    fn test_send_window_bounds() {
        let window = EngineConfig::default().send_window().unwrap();
        let t = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap();

        assert!(window.contains(t(9, 0)));
        assert!(window.contains(t(12, 30)));
        assert!(window.contains(t(22, 0)));
        assert!(!window.contains(t(8, 59)));
        assert!(!window.contains(t(23, 0)));
    }
}
