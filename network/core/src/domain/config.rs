// Copyright (c) 2026 stormnet contributors
// SPDX-License-Identifier: AGPL-3.0

// Network Configuration Types
//
// Defines the configuration manifest shared by sensors and the monitor:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Risk engine constants
// - Consensus policy (threshold, belief staleness, neighbour scope, re-arm)
// - Sensor loop timing
// - Supervisor capacity and rejection hint
// - Feedback analyzer windows and cooldown
// - In-memory broker sizing

use crate::domain::consensus::ConsensusPolicy;
use crate::domain::risk::RiskPolicy;
use crate::domain::sensor::SECTOR_COUNT;
use crate::domain::window::DEFAULT_WINDOW_SIZE;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const API_VERSION: &str = "stormnet/v1";

/// Messages buffered per subscriber before it starts lagging.
pub const DEFAULT_BROKER_CAPACITY: usize = 1024;

/// Upper bound for admission timers (assignment timeout, retry hint).
pub const MAX_ADMISSION_TIMER: Duration = Duration::from_secs(24 * 60 * 60);
pub const KIND: &str = "NetworkConfig";

/// Top-level configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// API version (must be "stormnet/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "NetworkConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    #[serde(default)]
    pub spec: NetworkSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Human-readable network name
    pub name: String,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSpec {
    pub risk: RiskPolicy,
    pub consensus: ConsensusPolicy,
    pub sensor: SensorSettings,
    pub supervisor: SupervisorSettings,
    pub feedback: FeedbackPolicy,
    pub broker: BrokerSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorSettings {
    /// Measurements kept for trend detection
    pub window_size: usize,

    /// Publish interval with no active neighbours
    #[serde(with = "humantime_serde")]
    pub base_interval: Duration,

    /// Interval growth per active neighbour: base * (1 + factor * n)
    pub interval_neighbor_factor: f64,

    /// How long an agent waits for a sector before giving up
    #[serde(with = "humantime_serde")]
    pub assignment_timeout: Duration,

    /// Announcements (first contact plus retries after rejection)
    pub max_admission_attempts: u32,
}

impl Default for SensorSettings {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            base_interval: Duration::from_secs(5),
            interval_neighbor_factor: 0.1,
            assignment_timeout: Duration::from_secs(30),
            max_admission_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorSettings {
    /// Maximum simultaneously connected agents (at most 6)
    pub capacity: usize,

    /// Hint sent with rejections
    #[serde(with = "humantime_serde")]
    pub retry_after: Duration,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            capacity: SECTOR_COUNT as usize,
            retry_after: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackPolicy {
    /// Rolling alert history kept per agent
    #[serde(with = "humantime_serde")]
    pub history_window: Duration,

    /// More alerts than this within the history window is a false alarm
    pub max_alerts: usize,

    /// An agent whose last alert is younger than this is "currently alerting"
    #[serde(with = "humantime_serde")]
    pub active_alert_window: Duration,

    /// Minimum spacing between two feedback messages to one agent
    #[serde(with = "humantime_serde")]
    pub cooldown: Duration,

    /// Local risk above this without an alert may be a missed event
    pub missed_event_threshold: f64,

    /// Alert risk at or above this, corroborated, is a correct critical alert
    pub critical_threshold: f64,

    /// Beliefs older than this are not used for missed-event detection
    #[serde(with = "humantime_serde")]
    pub belief_staleness: Duration,

    /// Period of the full scan over all records
    #[serde(with = "humantime_serde")]
    pub scan_interval: Duration,
}

impl Default for FeedbackPolicy {
    fn default() -> Self {
        Self {
            history_window: Duration::from_secs(300),
            max_alerts: 5,
            active_alert_window: Duration::from_secs(30),
            cooldown: Duration::from_secs(60),
            missed_event_threshold: 0.75,
            critical_threshold: 0.8,
            belief_staleness: Duration::from_secs(15),
            scan_interval: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerSettings {
    pub capacity: usize,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_BROKER_CAPACITY,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "stormnet".to_string(),
                labels: HashMap::new(),
            },
            spec: NetworkSpec::default(),
        }
    }
}

impl NetworkConfig {
    /// Load from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        std::fs::write(path.as_ref(), self.to_yaml_string()?)?;
        Ok(())
    }

    /// Discover configuration file location
    ///
    /// Order: STORMNET_CONFIG_PATH, ./stormnet.yaml, ~/.stormnet/config.yaml
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("STORMNET_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd_config = PathBuf::from("./stormnet.yaml");
        if cwd_config.exists() {
            return Some(cwd_config);
        }

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".stormnet").join("config.yaml");
            if home_config.exists() {
                return Some(home_config);
            }
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit path must exist and parse
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?;
            config.apply_env_overrides();
            return Ok(config);
        }

        let mut config = match Self::discover_config() {
            Some(path) => {
                tracing::info!("Loading configuration from discovered path: {:?}", path);
                Self::from_yaml_file(path)?
            }
            None => {
                tracing::warn!("No configuration file found in standard locations. Using defaults.");
                Self::default()
            }
        };
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup; invalid values are
    /// logged and ignored.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("STORMNET_CAPACITY") {
            match val.parse::<usize>() {
                Ok(capacity) => {
                    tracing::info!("Environment override: STORMNET_CAPACITY={}", capacity);
                    self.spec.supervisor.capacity = capacity;
                }
                Err(_) => tracing::warn!("Invalid value for STORMNET_CAPACITY: '{}'. Ignoring.", val),
            }
        }

        if let Some(val) = lookup("STORMNET_FEEDBACK_COOLDOWN") {
            match humantime::parse_duration(&val) {
                Ok(cooldown) => {
                    tracing::info!("Environment override: STORMNET_FEEDBACK_COOLDOWN={}", val);
                    self.spec.feedback.cooldown = cooldown;
                }
                Err(_) => tracing::warn!(
                    "Invalid value for STORMNET_FEEDBACK_COOLDOWN: '{}'. Expected e.g. 60s. Ignoring.",
                    val
                ),
            }
        }

        if let Some(val) = lookup("STORMNET_NEIGHBOR_SCOPE") {
            match val.parse() {
                Ok(scope) => {
                    tracing::info!("Environment override: STORMNET_NEIGHBOR_SCOPE={}", val);
                    self.spec.consensus.neighbor_scope = scope;
                }
                Err(e) => tracing::warn!("Invalid value for STORMNET_NEIGHBOR_SCOPE: {}. Ignoring.", e),
            }
        }

        if let Some(val) = lookup("STORMNET_BASE_INTERVAL") {
            match humantime::parse_duration(&val) {
                Ok(interval) => {
                    tracing::info!("Environment override: STORMNET_BASE_INTERVAL={}", val);
                    self.spec.sensor.base_interval = interval;
                }
                Err(_) => tracing::warn!("Invalid value for STORMNET_BASE_INTERVAL: '{}'. Ignoring.", val),
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!("Invalid apiVersion: '{}'. Must be '{}'", self.api_version, API_VERSION);
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        let spec = &self.spec;
        let unit = |name: &str, value: f64| -> anyhow::Result<()> {
            if !(0.0..=1.0).contains(&value) {
                anyhow::bail!("{} must be within [0, 1], got {}", name, value);
            }
            Ok(())
        };
        unit("consensus.alert_threshold", spec.consensus.alert_threshold)?;
        unit("risk.elevated_threshold", spec.risk.elevated_threshold)?;
        unit("feedback.missed_event_threshold", spec.feedback.missed_event_threshold)?;
        unit("feedback.critical_threshold", spec.feedback.critical_threshold)?;

        if spec.risk.normal_temp_min > spec.risk.normal_temp_max {
            anyhow::bail!(
                "risk.normal_temp_min ({}) exceeds risk.normal_temp_max ({})",
                spec.risk.normal_temp_min,
                spec.risk.normal_temp_max
            );
        }

        if !(0.0..100.0).contains(&spec.risk.humidity_threshold) {
            anyhow::bail!("risk.humidity_threshold must be within [0, 100)");
        }

        if spec.sensor.window_size == 0 {
            anyhow::bail!("sensor.window_size must be at least 1");
        }

        if spec.sensor.base_interval.is_zero() {
            anyhow::bail!("sensor.base_interval must be positive");
        }

        if spec.sensor.interval_neighbor_factor < 0.0 {
            anyhow::bail!("sensor.interval_neighbor_factor cannot be negative");
        }

        if spec.sensor.assignment_timeout.is_zero() || spec.sensor.assignment_timeout > MAX_ADMISSION_TIMER {
            anyhow::bail!(
                "sensor.assignment_timeout must be within (0s, {}]",
                humantime::format_duration(MAX_ADMISSION_TIMER)
            );
        }

        if spec.supervisor.retry_after > MAX_ADMISSION_TIMER {
            anyhow::bail!(
                "supervisor.retry_after must not exceed {}",
                humantime::format_duration(MAX_ADMISSION_TIMER)
            );
        }

        if spec.feedback.scan_interval.is_zero() {
            anyhow::bail!("feedback.scan_interval must be positive");
        }

        if spec.supervisor.capacity == 0 || spec.supervisor.capacity > SECTOR_COUNT as usize {
            anyhow::bail!(
                "supervisor.capacity must be within 1..={}, got {}",
                SECTOR_COUNT,
                spec.supervisor.capacity
            );
        }

        if spec.broker.capacity == 0 {
            anyhow::bail!("broker.capacity must be at least 1");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::belief::NeighborScope;
    use crate::domain::consensus::RearmPolicy;

    #[test]
    fn test_default_manifest() {
        let config = NetworkConfig::default();
        assert_eq!(config.api_version, "stormnet/v1");
        assert_eq!(config.kind, "NetworkConfig");
        assert_eq!(config.spec.supervisor.capacity, 6);
        assert_eq!(config.spec.sensor.window_size, 10);
        assert_eq!(config.spec.feedback.cooldown, Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = r#"
apiVersion: stormnet/v1
kind: NetworkConfig
metadata:
  name: valley
spec:
  consensus:
    belief_staleness: 20s
    neighbor_scope: adjacent
    rearm:
      policy: min_spacing
      spacing: 30s
  feedback:
    cooldown: 2m
"#;
        let config = NetworkConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.metadata.name, "valley");
        assert_eq!(config.spec.consensus.belief_staleness, Duration::from_secs(20));
        assert_eq!(config.spec.consensus.neighbor_scope, NeighborScope::Adjacent);
        assert_eq!(
            config.spec.consensus.rearm,
            RearmPolicy::MinSpacing { spacing: Duration::from_secs(30) }
        );
        assert_eq!(config.spec.consensus.alert_threshold, 0.6);
        assert_eq!(config.spec.feedback.cooldown, Duration::from_secs(120));
        assert_eq!(config.spec.feedback.max_alerts, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_yaml_roundtrip_preserves_spec() {
        let mut config = NetworkConfig::default();
        config.spec.supervisor.capacity = 4;
        config.spec.consensus.neighbor_scope = NeighborScope::SameSector;

        let yaml = config.to_yaml_string().unwrap();
        let parsed = NetworkConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(parsed.spec, config.spec);
    }

    #[test]
    fn test_validation() {
        let mut config = NetworkConfig::default();

        config.api_version = "wrong/v1".to_string();
        assert!(config.validate().is_err());
        config.api_version = API_VERSION.to_string();

        config.spec.supervisor.capacity = 7;
        assert!(config.validate().is_err());
        config.spec.supervisor.capacity = 6;

        config.spec.consensus.alert_threshold = 1.2;
        assert!(config.validate().is_err());
        config.spec.consensus.alert_threshold = 0.6;

        config.spec.risk.normal_temp_min = 30.0;
        assert!(config.validate().is_err());
        config.spec.risk.normal_temp_min = 5.0;

        config.spec.sensor.window_size = 0;
        assert!(config.validate().is_err());
        config.spec.sensor.window_size = 10;

        config.spec.feedback.scan_interval = Duration::ZERO;
        assert!(config.validate().is_err());
        config.spec.feedback.scan_interval = Duration::from_secs(10);

        config.spec.supervisor.retry_after = Duration::from_secs(100_000 * 365 * 24 * 3600);
        assert!(config.validate().is_err());
        config.spec.supervisor.retry_after = Duration::from_secs(30);

        config.spec.sensor.assignment_timeout = MAX_ADMISSION_TIMER + Duration::from_secs(1);
        assert!(config.validate().is_err());
        config.spec.sensor.assignment_timeout = Duration::from_secs(30);

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides_from_lookup() {
        let mut config = NetworkConfig::default();
        let vars: HashMap<&str, &str> = HashMap::from([
            ("STORMNET_CAPACITY", "3"),
            ("STORMNET_FEEDBACK_COOLDOWN", "90s"),
            ("STORMNET_NEIGHBOR_SCOPE", "bogus"),
            ("STORMNET_BASE_INTERVAL", "2s"),
        ]);
        config.apply_overrides_from(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.spec.supervisor.capacity, 3);
        assert_eq!(config.spec.feedback.cooldown, Duration::from_secs(90));
        assert_eq!(config.spec.consensus.neighbor_scope, NeighborScope::All);
        assert_eq!(config.spec.sensor.base_interval, Duration::from_secs(2));
    }
}
