// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration schema definitions for uanode.
//!
//! # Schema Structure
//!
//! ```text
//! UanodeConfig
//! ├── connection: ConnectionConfig
//! ├── subscription: SubscriptionDefaults
//! ├── monitoring: MonitoringDefaults
//! ├── nodes: BTreeMap<String, NodeRef>
//! └── logging: LoggingConfig
//! ```
//!
//! Intervals are written as human-readable durations (`"500ms"`, `"2s"`).

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uanode_core::backend::verify_endpoint_description;
use uanode_core::{
    BackendKind, EndpointDescription, MessageSecurityMode, MonitoringParameters, NodeId, SubscriptionSettings,
    SubscriptionType, UniversalNode, SECURITY_POLICY_NONE,
};

use crate::error::{ConfigError, ConfigResult};

// =============================================================================
// Constants
// =============================================================================

/// Default endpoint URL.
pub const DEFAULT_ENDPOINT_URL: &str = "opc.tcp://localhost:4840";

/// Default backend name.
pub const DEFAULT_BACKEND: &str = "simulated";

/// Default publishing interval.
pub const DEFAULT_PUBLISHING_INTERVAL: Duration = Duration::from_secs(1);

/// Default sampling interval.
pub const DEFAULT_SAMPLING_INTERVAL: Duration = Duration::from_millis(250);

// =============================================================================
// Top-Level Configuration
// =============================================================================

/// The root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UanodeConfig {
    /// Connection configuration.
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Defaults for created subscriptions.
    #[serde(default)]
    pub subscription: SubscriptionDefaults,

    /// Defaults for monitored items.
    #[serde(default)]
    pub monitoring: MonitoringDefaults,

    /// Named node aliases.
    #[serde(default)]
    pub nodes: BTreeMap<String, NodeRef>,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl UanodeConfig {
    /// Validates the entire configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        self.connection.validate()?;
        self.subscription.validate()?;
        self.monitoring.validate()?;
        for (name, node) in &self.nodes {
            node.to_universal_node()
                .map_err(|e| ConfigError::validation(format!("nodes.{name}"), e.to_string()))?;
        }
        Ok(())
    }

    /// Resolves an alias from `nodes`, or parses `name` as a node id.
    pub fn node(&self, name: &str) -> ConfigResult<UniversalNode> {
        match self.nodes.get(name) {
            Some(node) => node.to_universal_node(),
            None => NodeRef::Id(name.to_string())
                .to_universal_node()
                .map_err(|_| ConfigError::unknown_node(name)),
        }
    }

    /// Monitoring parameters built from the monitoring and subscription
    /// defaults.
    pub fn monitoring_parameters(&self) -> MonitoringParameters {
        self.monitoring.parameters(&self.subscription)
    }
}

// =============================================================================
// Connection Configuration
// =============================================================================

/// Connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionConfig {
    /// Backend name (`simulated`, `opcua`).
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Server endpoint URL.
    #[serde(default = "default_endpoint_url")]
    pub endpoint_url: String,

    /// Security policy URI.
    #[serde(default = "default_security_policy")]
    pub security_policy: String,

    /// Security mode (`none`, `sign`, `sign_and_encrypt`).
    #[serde(default = "default_security_mode")]
    pub security_mode: String,

    /// Server minimum publishing interval, used by the simulated backend.
    #[serde(default, with = "option_duration", skip_serializing_if = "Option::is_none")]
    pub min_publishing_interval: Option<Duration>,
}

fn default_backend() -> String {
    DEFAULT_BACKEND.to_string()
}

fn default_endpoint_url() -> String {
    DEFAULT_ENDPOINT_URL.to_string()
}

fn default_security_policy() -> String {
    SECURITY_POLICY_NONE.to_string()
}

fn default_security_mode() -> String {
    "none".to_string()
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            endpoint_url: default_endpoint_url(),
            security_policy: default_security_policy(),
            security_mode: default_security_mode(),
            min_publishing_interval: None,
        }
    }
}

impl ConnectionConfig {
    /// Validates the connection configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        self.backend_kind()?;
        self.endpoint()?;
        if let Some(interval) = self.min_publishing_interval {
            positive("connection.min_publishing_interval", interval)?;
        }
        Ok(())
    }

    /// Parses the backend name.
    pub fn backend_kind(&self) -> ConfigResult<BackendKind> {
        BackendKind::from_str(&self.backend).map_err(|e| ConfigError::validation("connection.backend", e.to_string()))
    }

    /// Builds and verifies the endpoint description.
    pub fn endpoint(&self) -> ConfigResult<EndpointDescription> {
        let mode = MessageSecurityMode::from_str(&self.security_mode)
            .map_err(|e| ConfigError::validation("connection.security_mode", e.to_string()))?;
        let endpoint = EndpointDescription::new(self.endpoint_url.trim())
            .with_security_policy(self.security_policy.trim())
            .with_security_mode(mode);
        verify_endpoint_description(&endpoint)
            .map_err(|e| ConfigError::validation("connection.endpoint_url", e.to_string()))?;
        Ok(endpoint)
    }
}

// =============================================================================
// Subscription Defaults
// =============================================================================

/// Defaults for subscriptions created on behalf of monitored items.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubscriptionDefaults {
    /// Publishing interval.
    #[serde(default = "default_publishing_interval", with = "duration")]
    pub publishing_interval: Duration,

    /// Lifetime count.
    #[serde(default = "default_lifetime_count")]
    pub lifetime_count: u32,

    /// Max keep-alive count.
    #[serde(default = "default_keep_alive_count")]
    pub max_keep_alive_count: u32,

    /// Max notifications per publish (0 = unlimited).
    #[serde(default)]
    pub max_notifications_per_publish: u32,

    /// Priority.
    #[serde(default)]
    pub priority: u8,
}

fn default_publishing_interval() -> Duration {
    DEFAULT_PUBLISHING_INTERVAL
}

fn default_lifetime_count() -> u32 {
    SubscriptionSettings::default().lifetime_count
}

fn default_keep_alive_count() -> u32 {
    SubscriptionSettings::default().max_keep_alive_count
}

impl Default for SubscriptionDefaults {
    fn default() -> Self {
        Self {
            publishing_interval: DEFAULT_PUBLISHING_INTERVAL,
            lifetime_count: default_lifetime_count(),
            max_keep_alive_count: default_keep_alive_count(),
            max_notifications_per_publish: 0,
            priority: 0,
        }
    }
}

impl SubscriptionDefaults {
    /// Validates the subscription defaults.
    pub fn validate(&self) -> ConfigResult<()> {
        positive("subscription.publishing_interval", self.publishing_interval)?;
        self.settings()
            .validate()
            .map_err(|e| ConfigError::validation("subscription", e.to_string()))
    }

    /// Converts to engine subscription settings.
    pub fn settings(&self) -> SubscriptionSettings {
        SubscriptionSettings {
            publishing_interval: millis(self.publishing_interval),
            lifetime_count: self.lifetime_count,
            max_keep_alive_count: self.max_keep_alive_count,
            max_notifications_per_publish: self.max_notifications_per_publish,
            priority: self.priority,
            publishing_enabled: true,
        }
    }
}

// =============================================================================
// Monitoring Defaults
// =============================================================================

/// Defaults for monitored items.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonitoringDefaults {
    /// Sampling interval.
    #[serde(default = "default_sampling_interval", with = "duration")]
    pub sampling_interval: Duration,

    /// Server-side queue size.
    #[serde(default = "default_queue_size")]
    pub queue_size: u32,

    /// Discard the oldest value on queue overflow.
    #[serde(default = "default_true")]
    pub discard_oldest: bool,

    /// Put every item in its own subscription.
    #[serde(default)]
    pub exclusive: bool,
}

fn default_sampling_interval() -> Duration {
    DEFAULT_SAMPLING_INTERVAL
}

fn default_queue_size() -> u32 {
    MonitoringParameters::default().queue_size
}

fn default_true() -> bool {
    true
}

impl Default for MonitoringDefaults {
    fn default() -> Self {
        Self {
            sampling_interval: DEFAULT_SAMPLING_INTERVAL,
            queue_size: default_queue_size(),
            discard_oldest: true,
            exclusive: false,
        }
    }
}

impl MonitoringDefaults {
    /// Validates the monitoring defaults.
    pub fn validate(&self) -> ConfigResult<()> {
        positive("monitoring.sampling_interval", self.sampling_interval)?;
        if self.queue_size == 0 {
            return Err(ConfigError::validation("monitoring.queue_size", "must be at least 1"));
        }
        Ok(())
    }

    /// Builds monitoring parameters for items joining a subscription
    /// created with `subscription`.
    pub fn parameters(&self, subscription: &SubscriptionDefaults) -> MonitoringParameters {
        let settings = subscription.settings();
        MonitoringParameters {
            sampling_interval: millis(self.sampling_interval),
            queue_size: self.queue_size,
            discard_oldest: self.discard_oldest,
            publishing_interval: settings.publishing_interval,
            subscription_type: if self.exclusive {
                SubscriptionType::Exclusive
            } else {
                SubscriptionType::Shared
            },
            lifetime_count: settings.lifetime_count,
            max_keep_alive_count: settings.max_keep_alive_count,
            max_notifications_per_publish: settings.max_notifications_per_publish,
            priority: settings.priority,
            ..MonitoringParameters::default()
        }
    }
}

// =============================================================================
// Node Aliases
// =============================================================================

/// A configured node: a node id string or a namespace URI plus identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeRef {
    /// `ns=<index>;<type>=<value>`.
    Id(String),
    /// Namespace URI resolved against the server at connect time.
    Qualified {
        /// Namespace URI.
        namespace: String,
        /// `<type>=<value>` identifier.
        identifier: String,
    },
}

impl NodeRef {
    /// Converts to a universal node, checking the identifier syntax.
    pub fn to_universal_node(&self) -> ConfigResult<UniversalNode> {
        match self {
            NodeRef::Id(text) => {
                let node_id = NodeId::from_str(text.trim())?;
                Ok(UniversalNode::from_node_id(&node_id))
            }
            NodeRef::Qualified { namespace, identifier } => {
                if namespace.trim().is_empty() {
                    return Err(ConfigError::validation("namespace", "must not be empty"));
                }
                NodeId::from_parts(0, identifier.trim())?;
                Ok(UniversalNode::with_namespace_name(namespace.trim(), identifier.trim()))
            }
        }
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRef::Id(text) => f.write_str(text),
            NodeRef::Qualified { namespace, identifier } => write!(f, "nsu={namespace};{identifier}"),
        }
    }
}

// =============================================================================
// Logging Configuration
// =============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default)]
    pub level: LogLevel,

    /// Log format.
    #[serde(default)]
    pub format: LogFormat,
}

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl LogLevel {
    /// Returns the filter directive name.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(ConfigError::validation("logging.level", format!("unknown level '{other}'"))),
        }
    }
}

/// Log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Single-line compact text.
    Compact,
    /// JSON lines.
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(ConfigError::validation("logging.format", format!("unknown format '{other}'"))),
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn positive(field: &str, value: Duration) -> ConfigResult<()> {
    if value.is_zero() {
        return Err(ConfigError::validation(field, "must be positive"));
    }
    Ok(())
}

/// Converts a duration to fractional milliseconds.
pub fn millis(value: Duration) -> f64 {
    value.as_secs_f64() * 1000.0
}

mod duration {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        humantime::format_duration(*value).to_string().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

mod option_duration {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(d) => humantime::format_duration(*d).to_string().serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt: Option<String> = Option::deserialize(deserializer)?;
        opt.map(|s| humantime::parse_duration(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = UanodeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.connection.backend_kind().unwrap(), BackendKind::Simulated);
        assert_eq!(config.connection.endpoint().unwrap().endpoint_url, DEFAULT_ENDPOINT_URL);
    }

    #[test]
    fn test_connection_validation() {
        let mut connection = ConnectionConfig {
            backend: "modbus".into(),
            ..Default::default()
        };
        let err = connection.validate().unwrap_err();
        assert!(err.to_string().contains("connection.backend"));

        connection.backend = "simulated".into();
        connection.endpoint_url = "  ".into();
        assert!(connection.validate().is_err());

        connection.endpoint_url = DEFAULT_ENDPOINT_URL.into();
        connection.security_mode = "bogus".into();
        let err = connection.validate().unwrap_err();
        assert!(err.to_string().contains("security_mode"));

        connection.security_mode = "sign_and_encrypt".into();
        assert_eq!(
            connection.endpoint().unwrap().security_mode,
            MessageSecurityMode::SignAndEncrypt
        );
    }

    #[test]
    fn test_subscription_defaults_convert() {
        let defaults = SubscriptionDefaults {
            publishing_interval: Duration::from_millis(500),
            ..Default::default()
        };
        let settings = defaults.settings();
        assert_eq!(settings.publishing_interval, 500.0);
        assert!(defaults.validate().is_ok());

        let zero = SubscriptionDefaults {
            publishing_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(zero.validate().is_err());

        let short_lifetime = SubscriptionDefaults {
            lifetime_count: 5,
            max_keep_alive_count: 10,
            ..Default::default()
        };
        assert!(short_lifetime.validate().is_err());
    }

    #[test]
    fn test_monitoring_parameters() {
        let config = UanodeConfig {
            monitoring: MonitoringDefaults {
                sampling_interval: Duration::from_millis(100),
                exclusive: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let parameters = config.monitoring_parameters();
        assert_eq!(parameters.sampling_interval, 100.0);
        assert_eq!(parameters.publishing_interval, 1000.0);
        assert_eq!(parameters.subscription_type, SubscriptionType::Exclusive);
    }

    #[test]
    fn test_node_aliases() {
        let mut config = UanodeConfig::default();
        config
            .nodes
            .insert("temperature".into(), NodeRef::Id("ns=2;s=Demo.Temperature".into()));
        config.nodes.insert(
            "speed".into(),
            NodeRef::Qualified {
                namespace: "urn:uanode:demo".into(),
                identifier: "s=Demo.Machine.Speed".into(),
            },
        );
        assert!(config.validate().is_ok());

        let node = config.node("temperature").unwrap();
        assert_eq!(node.to_node_id().unwrap(), NodeId::string(2, "Demo.Temperature"));

        let node = config.node("speed").unwrap();
        assert_eq!(node.namespace_name(), Some("urn:uanode:demo"));

        let node = config.node("ns=0;i=2255").unwrap();
        assert_eq!(node.to_node_id().unwrap(), NodeId::NAMESPACE_ARRAY);

        assert!(matches!(config.node("boiler"), Err(ConfigError::UnknownNode { .. })));

        config.nodes.insert("broken".into(), NodeRef::Id("ns=two;s=x".into()));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("nodes.broken"));
    }

    #[test]
    fn test_log_level_parse() {
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!("DEBUG".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert!("loud".parse::<LogLevel>().is_err());
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
    }
}
