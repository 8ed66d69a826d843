//! Configuration loading and validation

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Per-topic release policy, loaded or registered at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct TopicPolicy {
    /// Relative weight within the best-effort class; larger is more frequent.
    #[serde(default)]
    pub priority: f64,
    /// Minimum seconds between successive releases on this topic.
    #[serde(default)]
    pub rate_limit_sec: f64,
    /// If true, messages on this topic join the global no-drop FIFO.
    #[serde(default)]
    pub no_drop: bool,
}

impl Default for TopicPolicy {
    /// Per spec: an unknown topic is treated as priority = 0, rate_limit = 0.
    fn default() -> Self {
        Self {
            priority: 0.0,
            rate_limit_sec: 0.0,
            no_drop: false,
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_host_url")]
    pub host_url: String,

    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: u64,

    /// 0 = silent, 1 = lifecycle, 2 = per-message
    #[serde(default = "default_verbosity")]
    pub verbosity: u8,

    /// Optional cap on the no-drop FIFO. `None` means unbounded, matching
    /// the reference client's implied behavior; `Some(n)` drops the oldest
    /// no-drop message once the FIFO would exceed `n` entries (logged at warn).
    #[serde(default)]
    pub no_drop_queue_cap: Option<usize>,

    /// Topic regex announced to the broker on every successful handshake.
    #[serde(default = "default_subscribe_topic_regex")]
    pub subscribe_topic_regex: String,

    /// Per-topic policy, keyed by topic name.
    #[serde(default)]
    pub topics: HashMap<String, TopicPolicy>,

    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_secs: default_max_backoff_secs(),
        }
    }
}

fn default_host_url() -> String {
    "ws://localhost:8080".to_string()
}

fn default_max_in_flight() -> u64 {
    1
}

fn default_verbosity() -> u8 {
    1
}

fn default_subscribe_topic_regex() -> String {
    "kavan/status".to_string()
}

fn default_initial_backoff_ms() -> u64 {
    200
}

fn default_max_backoff_secs() -> u64 {
    30
}

impl Config {
    /// Load configuration from a TOML file, layered under defaults and
    /// overridden by `FLEETBRIDGE__`-prefixed environment variables.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Start with defaults
            .set_default("host_url", default_host_url())?
            .set_default("max_in_flight", default_max_in_flight() as i64)?
            .set_default("verbosity", default_verbosity() as i64)?
            // Load from file if it exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix FLEETBRIDGE_)
            .add_source(
                config::Environment::with_prefix("FLEETBRIDGE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.max_in_flight < 1 {
            anyhow::bail!("max_in_flight must be >= 1");
        }

        for (topic, policy) in &self.topics {
            if policy.rate_limit_sec < 0.0 {
                anyhow::bail!("topics.{topic}.rate_limit_sec must be >= 0");
            }
        }

        Ok(())
    }

    /// Look up a topic's configured policy, falling back to the
    /// zero-priority / zero-rate-limit default for unknown topics.
    pub fn topic_policy(&self, topic: &str) -> TopicPolicy {
        self.topics.get(topic).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_topic_defaults_to_zero_priority() {
        let config = Config {
            host_url: default_host_url(),
            max_in_flight: 1,
            verbosity: 1,
            no_drop_queue_cap: None,
            subscribe_topic_regex: default_subscribe_topic_regex(),
            topics: HashMap::new(),
            reconnect: ReconnectConfig::default(),
        };

        let policy = config.topic_policy("unregistered");
        assert_eq!(policy.priority, 0.0);
        assert_eq!(policy.rate_limit_sec, 0.0);
        assert!(!policy.no_drop);
    }

    #[test]
    fn rejects_zero_max_in_flight() {
        let mut config = Config {
            host_url: default_host_url(),
            max_in_flight: 0,
            verbosity: 1,
            no_drop_queue_cap: None,
            subscribe_topic_regex: default_subscribe_topic_regex(),
            topics: HashMap::new(),
            reconnect: ReconnectConfig::default(),
        };
        assert!(config.validate().is_err());
        config.max_in_flight = 1;
        assert!(config.validate().is_ok());
    }
}
