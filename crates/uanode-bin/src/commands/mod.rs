// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI command implementations.
//!
//! - `read` / `write`: Attribute access
//! - `browse` / `call`: Address space navigation and methods
//! - `monitor`: Data change and event subscriptions
//! - `history`: Raw history paging
//! - `endpoints` / `servers`: Discovery
//! - `validate` / `version`: Local commands, no connection

mod access;
mod browse;
mod discovery;
mod history;
mod monitor;
mod validate;
mod version;

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};
use uanode_config::schema::millis;
use uanode_config::{ConfigFormat, ConfigLoader, UanodeConfig};
use uanode_core::backend::create_backend;
use uanode_core::{Backend, BackendKind, Connection, Node, NodeId, SimulatedBackend};

use crate::cli::{Cli, Commands, OutputFormat};
use crate::error::BinResult;

pub use access::{read, write};
pub use browse::{browse, call};
pub use discovery::{endpoints, servers};
pub use history::history;
pub use monitor::monitor;
pub use validate::validate;
pub use version::version;

/// Executes the appropriate command based on CLI arguments.
pub async fn execute(cli: Cli, config: UanodeConfig) -> BinResult<()> {
    match cli.command.clone() {
        Commands::Read(args) => access::read(&cli, config, args).await,
        Commands::Write(args) => access::write(&cli, config, args).await,
        Commands::Browse(args) => browse::browse(&cli, config, args).await,
        Commands::Call(args) => browse::call(&cli, config, args).await,
        Commands::Monitor(args) => monitor::monitor(&cli, config, args).await,
        Commands::History(args) => history::history(&cli, config, args).await,
        Commands::Endpoints(args) => discovery::endpoints(&cli, config, args).await,
        Commands::Servers(args) => discovery::servers(&cli, config, args).await,
        Commands::Validate(args) => validate::validate(&cli, &config, args),
        Commands::Version => version::version(&cli),
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// Loads the configuration named by `--config`, or the defaults with
/// environment overrides, then applies the connection flags.
pub fn load_config(cli: &Cli) -> BinResult<UanodeConfig> {
    let loader = ConfigLoader::new();
    let mut config = match &cli.config {
        Some(path) => loader.load(path)?,
        None => loader.load_from_str("", ConfigFormat::Yaml)?,
    };

    if let Some(endpoint) = &cli.endpoint {
        config.connection.endpoint_url = endpoint.clone();
    }
    if let Some(backend) = &cli.backend {
        config.connection.backend = backend.clone();
    }
    config.validate()?;
    Ok(config)
}

// =============================================================================
// Session
// =============================================================================

/// A connected client plus the configuration it was opened with.
pub struct Session {
    config: UanodeConfig,
    connection: Connection,
}

impl Session {
    /// Creates the configured backend and connects to the endpoint.
    pub async fn open(config: UanodeConfig) -> BinResult<Self> {
        let kind = config.connection.backend_kind()?;
        let backend: Arc<dyn Backend> = match (kind, config.connection.min_publishing_interval) {
            (BackendKind::Simulated, Some(min)) => {
                Arc::new(SimulatedBackend::new().with_min_publishing_interval(millis(min)))
            }
            _ => create_backend(kind)?,
        };

        let endpoint = config.connection.endpoint()?;
        let connection = Connection::new(backend);
        info!(backend = %kind, endpoint = %endpoint, "Connecting");
        connection.connect(endpoint).await?;

        Ok(Self { config, connection })
    }

    /// The configuration this session was opened with.
    pub fn config(&self) -> &UanodeConfig {
        &self.config
    }

    /// The underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Resolves an alias or node id text to a node handle.
    pub fn node(&self, name: &str) -> BinResult<Node> {
        let universal = self.config.node(name)?;
        let node = self.connection.node_from(&universal)?;
        debug!(name, node_id = %node.node_id(), "Resolved node");
        Ok(node)
    }

    /// Resolves an alias or node id text to a node id.
    pub fn node_id(&self, name: &str) -> BinResult<NodeId> {
        Ok(self.node(name)?.node_id().clone())
    }

    /// Disconnects.
    pub async fn close(self) -> BinResult<()> {
        self.connection.disconnect().await?;
        Ok(())
    }
}

// =============================================================================
// Output
// =============================================================================

/// Prints `value` as pretty JSON on stdout.
pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> BinResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Prints JSON or runs the text printer depending on `--output`.
pub(crate) fn emit<T, F>(cli: &Cli, value: &T, text: F) -> BinResult<()>
where
    T: Serialize + ?Sized,
    F: FnOnce(&T),
{
    match cli.output {
        OutputFormat::Json => print_json(value),
        OutputFormat::Text => {
            text(value);
            Ok(())
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn cli(args: &[&str]) -> Cli {
        let mut full = vec!["uanode"];
        full.extend_from_slice(args);
        Cli::parse_from(full)
    }

    #[test]
    fn test_load_config_defaults_and_flags() {
        let config = load_config(&cli(&["-e", "opc.tcp://plc:4841", "version"])).unwrap();
        assert_eq!(config.connection.endpoint_url, "opc.tcp://plc:4841");
        assert_eq!(config.connection.backend, "simulated");
    }

    #[test]
    fn test_load_config_rejects_bad_backend() {
        let err = load_config(&cli(&["-b", "modbus", "version"])).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[tokio::test]
    async fn test_session_resolves_nodes() {
        let config = load_config(&cli(&["version"])).unwrap();
        let session = Session::open(config).await.unwrap();
        let node = session.node("ns=2;s=Demo.Counter").unwrap();
        assert_eq!(node.node_id().to_string(), "ns=2;s=Demo.Counter");
        assert!(session.node("ns=2").is_err());
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_aliases_from_config_file() {
        use std::io::Write;

        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "nodes:\n  counter: ns=2;s=Demo.Counter\nlogging:\n  level: debug"
        )
        .unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let config = load_config(&cli(&["-c", &path, "version"])).unwrap();
        assert_eq!(config.nodes.len(), 1);
        assert_eq!(config.logging.level.as_str(), "debug");

        let session = Session::open(config.clone()).await.unwrap();
        assert_eq!(session.node_id("counter").unwrap().to_string(), "ns=2;s=Demo.Counter");
        session.close().await.unwrap();

        execute(cli(&["-c", &path, "read", "counter", "-a", "BrowseName"]), config.clone())
            .await
            .unwrap();
        execute(cli(&["-c", &path, "validate"]), config).await.unwrap();
    }

    #[tokio::test]
    async fn test_execute_against_simulated_backend() {
        let config = load_config(&cli(&["version"])).unwrap();
        execute(cli(&["read", "ns=2;s=Demo.Counter"]), config.clone()).await.unwrap();
        execute(cli(&["write", "ns=2;s=Demo.Counter", "7"]), config.clone()).await.unwrap();
        execute(cli(&["-o", "json", "browse", "ns=2;s=Demo"]), config.clone()).await.unwrap();
        execute(cli(&["browse", "ns=2;s=Demo", "-p", "2:Machine/2:Speed"]), config.clone()).await.unwrap();
        execute(
            cli(&["call", "ns=2;s=Demo", "ns=2;s=Demo.Add", "Double:1.5", "Double:2.5"]),
            config.clone(),
        )
        .await
        .unwrap();
        execute(cli(&["history", "ns=2;s=Demo.Temperature", "-p", "8"]), config.clone()).await.unwrap();

        let err = execute(cli(&["write", "ns=2;s=Demo.Pressure", "2.0"]), config.clone()).await.unwrap_err();
        assert_eq!(err.exit_code(), 6);
        execute(cli(&["monitor", "ns=2;s=Demo.Counter", "-d", "200ms"]), config).await.unwrap();
    }
}
