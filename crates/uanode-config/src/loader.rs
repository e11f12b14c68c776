// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration loading and processing for uanode.
//!
//! # Loading Pipeline
//!
//! 1. Read the file and pick the format from its extension
//! 2. Resolve `${VAR}` / `${VAR:default}` placeholders in the raw text
//! 3. Parse YAML/TOML/JSON into [`UanodeConfig`]
//! 4. Apply `UANODE_*` environment overrides
//! 5. Validate
//!
//! # Environment Variable Override
//!
//! ```text
//! UANODE_BACKEND=opcua
//! UANODE_ENDPOINT_URL=opc.tcp://plc:4840
//! UANODE_SECURITY_POLICY=http://opcfoundation.org/UA/SecurityPolicy#Basic256Sha256
//! UANODE_SECURITY_MODE=sign
//! UANODE_PUBLISHING_INTERVAL=250ms
//! UANODE_SAMPLING_INTERVAL=100ms
//! UANODE_LOG_LEVEL=debug
//! UANODE_LOG_FORMAT=json
//! ```

use crate::error::{ConfigError, ConfigResult};
use crate::schema::{LogFormat, LogLevel, UanodeConfig};
use serde::de::DeserializeOwned;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default environment variable prefix.
pub const DEFAULT_ENV_PREFIX: &str = "UANODE";

// =============================================================================
// ConfigLoader
// =============================================================================

/// Configuration loader.
///
/// # Examples
///
/// ```no_run
/// use uanode_config::loader::ConfigLoader;
///
/// let config = ConfigLoader::new().load("uanode.yaml").unwrap();
/// println!("{}", config.connection.endpoint_url);
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Environment variable prefix.
    env_prefix: String,

    /// Whether to resolve placeholders and apply overrides.
    resolve_env_vars: bool,
}

impl ConfigLoader {
    /// Creates a new configuration loader with default settings.
    pub fn new() -> Self {
        Self {
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
            resolve_env_vars: true,
        }
    }

    /// Sets the environment variable prefix.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Enables or disables environment variable resolution.
    pub fn with_env_vars(mut self, enabled: bool) -> Self {
        self.resolve_env_vars = enabled;
        self
    }

    /// Loads configuration from a file.
    ///
    /// The file format is determined by the file extension:
    /// - `.yaml` or `.yml` - YAML format
    /// - `.toml` - TOML format
    /// - `.json` - JSON format
    pub fn load(&self, path: impl AsRef<Path>) -> ConfigResult<UanodeConfig> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let content = self.read_file(path)?;
        let format = ConfigFormat::from_path(path)?;
        let config = self.process(&content, format).map_err(|e| match e {
            ConfigError::Serialization { message } => ConfigError::parse(path, message),
            other => other,
        })?;

        debug!(
            backend = %config.connection.backend,
            endpoint = %config.connection.endpoint_url,
            nodes = config.nodes.len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Loads configuration from a string.
    pub fn load_from_str(&self, content: &str, format: ConfigFormat) -> ConfigResult<UanodeConfig> {
        self.process(content, format)
    }

    fn process(&self, content: &str, format: ConfigFormat) -> ConfigResult<UanodeConfig> {
        let content = if self.resolve_env_vars {
            resolve_env_placeholders(content)
        } else {
            content.to_string()
        };

        let mut config: UanodeConfig = parse_str(&content, format)?;
        if self.resolve_env_vars {
            self.apply_env_overrides(&mut config)?;
        }
        config.validate()?;
        Ok(config)
    }

    fn read_file(&self, path: &Path) -> ConfigResult<String> {
        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }
        fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))
    }

    fn var(&self, suffix: &str) -> Option<(String, String)> {
        let name = format!("{}_{}", self.env_prefix, suffix);
        env::var(&name).ok().map(|value| (name, value))
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&self, config: &mut UanodeConfig) -> ConfigResult<()> {
        if let Some((_, value)) = self.var("BACKEND") {
            config.connection.backend = value;
        }
        if let Some((_, value)) = self.var("ENDPOINT_URL") {
            config.connection.endpoint_url = value;
        }
        if let Some((_, value)) = self.var("SECURITY_POLICY") {
            config.connection.security_policy = value;
        }
        if let Some((_, value)) = self.var("SECURITY_MODE") {
            config.connection.security_mode = value;
        }
        if let Some((name, value)) = self.var("PUBLISHING_INTERVAL") {
            config.subscription.publishing_interval = parse_duration(&name, &value)?;
        }
        if let Some((name, value)) = self.var("SAMPLING_INTERVAL") {
            config.monitoring.sampling_interval = parse_duration(&name, &value)?;
        }
        if let Some((name, value)) = self.var("LOG_LEVEL") {
            config.logging.level = value
                .parse::<LogLevel>()
                .map_err(|_| ConfigError::invalid_env_var(name, "expected trace, debug, info, warn or error"))?;
        }
        if let Some((name, value)) = self.var("LOG_FORMAT") {
            config.logging.format = value
                .parse::<LogFormat>()
                .map_err(|_| ConfigError::invalid_env_var(name, "expected text, compact or json"))?;
        }
        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// ConfigFormat
// =============================================================================

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML format.
    Yaml,
    /// TOML format.
    Toml,
    /// JSON format.
    Json,
}

impl ConfigFormat {
    /// Determines the format from a file path.
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match ext.as_deref() {
            Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
            Some("toml") => Ok(ConfigFormat::Toml),
            Some("json") => Ok(ConfigFormat::Json),
            Some(other) => Err(ConfigError::unsupported_format(other)),
            None => Err(ConfigError::unsupported_format("(no extension)")),
        }
    }

    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Yaml => "yaml",
            ConfigFormat::Toml => "toml",
            ConfigFormat::Json => "json",
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Resolves `${VAR}` and `${VAR:default}` placeholders.
///
/// Unset variables without a default keep their placeholder text.
pub fn resolve_env_placeholders(content: &str) -> String {
    let mut result = String::with_capacity(content.len());
    let mut rest = content;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            result.push_str(&rest[start..]);
            return result;
        };

        let inner = &after[..end];
        let (name, default) = match inner.split_once(':') {
            Some((name, default)) => (name, Some(default)),
            None => (inner, None),
        };
        match (env::var(name), default) {
            (Ok(value), _) => result.push_str(&value),
            (Err(_), Some(default)) => result.push_str(default),
            (Err(_), None) => {
                warn!(variable = name, "Environment variable not found");
                result.push_str(&rest[start..start + 2 + end + 1]);
            }
        }
        rest = &after[end + 1..];
    }

    result.push_str(rest);
    result
}

fn parse_duration(name: &str, value: &str) -> ConfigResult<Duration> {
    humantime::parse_duration(value.trim())
        .map_err(|e| ConfigError::invalid_env_var(name, format!("expected a duration like 500ms: {e}")))
}

fn parse_str<T: DeserializeOwned>(content: &str, format: ConfigFormat) -> ConfigResult<T> {
    match format {
        ConfigFormat::Yaml => yaml_parse(content),
        ConfigFormat::Toml => toml::from_str(content).map_err(|e| ConfigError::serialization(e.to_string())),
        ConfigFormat::Json => serde_json::from_str(content).map_err(|e| ConfigError::serialization(e.to_string())),
    }
}

/// YAML goes through the config crate.
fn yaml_parse<T: DeserializeOwned>(content: &str) -> ConfigResult<T> {
    if content.trim().is_empty() {
        return yaml_parse("{}");
    }
    let config = config::Config::builder()
        .add_source(config::File::from_str(content, config::FileFormat::Yaml))
        .build()
        .map_err(|e| ConfigError::serialization(e.to_string()))?;

    config
        .try_deserialize()
        .map_err(|e| ConfigError::serialization(e.to_string()))
}

// =============================================================================
// Convenience Functions
// =============================================================================

/// Loads configuration from a file with default settings.
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<UanodeConfig> {
    ConfigLoader::new().load(path)
}

/// Loads configuration from a string with the specified format.
pub fn load_config_str(content: &str, format: ConfigFormat) -> ConfigResult<UanodeConfig> {
    ConfigLoader::new().load_from_str(content, format)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::NodeRef;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use uanode_core::{BackendKind, MessageSecurityMode};

    fn test_yaml() -> &'static str {
        r#"
connection:
  backend: simulated
  endpoint_url: opc.tcp://localhost:4840
  security_mode: none
  min_publishing_interval: 100ms

subscription:
  publishing_interval: 500ms
  lifetime_count: 60
  max_keep_alive_count: 10

monitoring:
  sampling_interval: 100ms
  queue_size: 5

nodes:
  temperature: ns=2;s=Demo.Temperature
  speed:
    namespace: urn:uanode:demo
    identifier: s=Demo.Machine.Speed

logging:
  level: debug
  format: json
"#
    }

    fn write_temp(content: &str, suffix: &str) -> NamedTempFile {
        let mut file = NamedTempFile::with_suffix(suffix).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_yaml() {
        let file = write_temp(test_yaml(), ".yaml");
        let config = ConfigLoader::new().with_env_vars(false).load(file.path()).unwrap();

        assert_eq!(config.connection.backend_kind().unwrap(), BackendKind::Simulated);
        assert_eq!(config.connection.min_publishing_interval, Some(Duration::from_millis(100)));
        assert_eq!(config.subscription.publishing_interval, Duration::from_millis(500));
        assert_eq!(config.monitoring.queue_size, 5);
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(
            config.nodes.get("speed"),
            Some(&NodeRef::Qualified {
                namespace: "urn:uanode:demo".into(),
                identifier: "s=Demo.Machine.Speed".into(),
            })
        );
    }

    #[test]
    fn test_load_toml() {
        let toml = r#"
[connection]
endpoint_url = "opc.tcp://plc:4840"
security_policy = "http://opcfoundation.org/UA/SecurityPolicy#Basic256Sha256"
security_mode = "sign"

[subscription]
publishing_interval = "2s"

[nodes]
pressure = "ns=2;s=Demo.Pressure"
"#;
        let file = write_temp(toml, ".toml");
        let config = ConfigLoader::new().with_env_vars(false).load(file.path()).unwrap();

        let endpoint = config.connection.endpoint().unwrap();
        assert_eq!(endpoint.security_mode, MessageSecurityMode::Sign);
        assert_eq!(endpoint.security_policy_name(), "Basic256Sha256");
        assert_eq!(config.subscription.settings().publishing_interval, 2000.0);
        assert!(config.node("pressure").is_ok());
    }

    #[test]
    fn test_load_json() {
        let json = r#"{ "connection": { "backend": "simulated" }, "monitoring": { "exclusive": true } }"#;
        let config = load_config_str(json, ConfigFormat::Json).unwrap();
        assert!(config.monitoring.exclusive);
        assert_eq!(config.connection.endpoint_url, crate::schema::DEFAULT_ENDPOINT_URL);
    }

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let config = ConfigLoader::new()
            .with_env_vars(false)
            .load_from_str("", ConfigFormat::Yaml)
            .unwrap();
        assert_eq!(config.connection.backend, "simulated");
    }

    #[test]
    fn test_validation_errors() {
        let bad_backend = "connection:\n  backend: bacnet\n";
        let err = ConfigLoader::new()
            .with_env_vars(false)
            .load_from_str(bad_backend, ConfigFormat::Yaml)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));

        let bad_interval = "subscription:\n  publishing_interval: 0s\n";
        assert!(ConfigLoader::new()
            .with_env_vars(false)
            .load_from_str(bad_interval, ConfigFormat::Yaml)
            .is_err());

        let bad_node = "nodes:\n  broken: \"ns=2;q=oops\"\n";
        let err = ConfigLoader::new()
            .with_env_vars(false)
            .load_from_str(bad_node, ConfigFormat::Yaml)
            .unwrap_err();
        assert!(err.to_string().contains("nodes.broken"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let file = write_temp("connection:\n  endpoint: opc.tcp://x:4840\n", ".yaml");
        let err = ConfigLoader::new().with_env_vars(false).load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_config_format_from_path() {
        assert_eq!(ConfigFormat::from_path(Path::new("uanode.yaml")).unwrap(), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("uanode.yml")).unwrap(), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("uanode.toml")).unwrap(), ConfigFormat::Toml);
        assert_eq!(ConfigFormat::from_path(Path::new("uanode.json")).unwrap(), ConfigFormat::Json);
        assert!(ConfigFormat::from_path(Path::new("uanode.ini")).is_err());
        assert!(ConfigFormat::from_path(Path::new("uanode")).is_err());
    }

    #[test]
    fn test_env_placeholder_with_default() {
        let result = resolve_env_placeholders("url: ${UANODE_TEST_UNSET_VAR:opc.tcp://fallback:4840}");
        assert_eq!(result, "url: opc.tcp://fallback:4840");
    }

    #[test]
    fn test_env_placeholder_resolution() {
        env::set_var("UANODE_TEST_PLACEHOLDER_HOST", "plc7");
        let result = resolve_env_placeholders("url: opc.tcp://${UANODE_TEST_PLACEHOLDER_HOST}:4840 ${UANODE_TEST_NOPE}");
        assert_eq!(result, "url: opc.tcp://plc7:4840 ${UANODE_TEST_NOPE}");
        assert_eq!(resolve_env_placeholders("tail ${unterminated"), "tail ${unterminated");
    }

    #[test]
    fn test_env_overrides() {
        let prefix = "UANODE_TEST_OVERRIDE";
        env::set_var(format!("{prefix}_ENDPOINT_URL"), "opc.tcp://override:4841");
        env::set_var(format!("{prefix}_PUBLISHING_INTERVAL"), "250ms");
        env::set_var(format!("{prefix}_LOG_LEVEL"), "warn");

        let config = ConfigLoader::new()
            .with_env_prefix(prefix)
            .load_from_str(test_yaml(), ConfigFormat::Yaml)
            .unwrap();
        assert_eq!(config.connection.endpoint_url, "opc.tcp://override:4841");
        assert_eq!(config.subscription.publishing_interval, Duration::from_millis(250));
        assert_eq!(config.logging.level, LogLevel::Warn);
    }

    #[test]
    fn test_invalid_env_override() {
        let prefix = "UANODE_TEST_BAD_OVERRIDE";
        env::set_var(format!("{prefix}_SAMPLING_INTERVAL"), "soon");

        let err = ConfigLoader::new()
            .with_env_prefix(prefix)
            .load_from_str(test_yaml(), ConfigFormat::Yaml)
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar { .. }));
    }

    #[test]
    fn test_file_not_found() {
        let result = ConfigLoader::new().load("/nonexistent/path/uanode.yaml");
        assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
    }
}
