// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # uanode-config
//!
//! Configuration management for uanode clients.
//!
//! ## Features
//!
//! - **Multi-Format Support**: YAML, TOML, and JSON configuration files
//! - **Placeholders**: `${VAR}` and `${VAR:default}` in the raw file
//! - **Environment Overrides**: `UANODE_*` variables override file values
//! - **Validation**: backend names, endpoints, intervals and node ids are
//!   checked before the configuration is handed out
//!
//! ## Quick Start
//!
//! ```no_run
//! use uanode_config::loader::load_config;
//!
//! let config = load_config("uanode.yaml").unwrap();
//! let endpoint = config.connection.endpoint().unwrap();
//! println!("Connecting to {endpoint}");
//! ```
//!
//! ## Configuration Schema
//!
//! ```yaml
//! connection:
//!   backend: simulated
//!   endpoint_url: "${PLC_URL:opc.tcp://localhost:4840}"
//!   security_mode: none
//! subscription:
//!   publishing_interval: 500ms
//! monitoring:
//!   sampling_interval: 100ms
//! nodes:
//!   temperature: ns=2;s=Demo.Temperature
//!   speed:
//!     namespace: urn:uanode:demo
//!     identifier: s=Demo.Machine.Speed
//! logging:
//!   level: info
//!   format: text
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod error;
pub mod loader;
pub mod schema;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{ConfigError, ConfigResult};
pub use loader::{load_config, load_config_str, ConfigFormat, ConfigLoader, DEFAULT_ENV_PREFIX};
pub use schema::{
    ConnectionConfig, LogFormat, LogLevel, LoggingConfig, MonitoringDefaults, NodeRef, SubscriptionDefaults,
    UanodeConfig,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name() {
        assert_eq!(NAME, "uanode-config");
        assert!(!VERSION.is_empty());
    }
}
