// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI argument parsing and command definitions.
//!
//! - `read`: Read attributes of one or more nodes
//! - `write`: Write one attribute
//! - `browse`: List children or resolve a browse path
//! - `call`: Call a method
//! - `monitor`: Print data changes or events until interrupted
//! - `history`: Read raw history
//! - `endpoints` / `servers`: Discovery
//! - `validate`: Validate configuration file
//! - `version`: Show version information

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

// =============================================================================
// Main CLI Structure
// =============================================================================

/// uanode - OPC UA node access from the command line
#[derive(Parser, Debug)]
#[command(
    name = "uanode",
    author = "Sylvex <contact@sylvex.io>",
    version = uanode_core::VERSION,
    about = "Read, write, browse and monitor OPC UA nodes",
    long_about = None,
    propagate_version = true
)]
pub struct Cli {
    /// Configuration file path (defaults apply when omitted)
    #[arg(short, long, env = "UANODE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Endpoint URL, overrides the configuration
    #[arg(short, long, global = true)]
    pub endpoint: Option<String>,

    /// Backend name (simulated, opcua), overrides the configuration
    #[arg(short, long, global = true)]
    pub backend: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Log format (text, json, compact)
    #[arg(long, global = true)]
    pub log_format: Option<LogFormat>,

    /// Output format for command results
    #[arg(short, long, default_value = "text", global = true)]
    pub output: OutputFormat,

    /// Enable quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

// =============================================================================
// Subcommands
// =============================================================================

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Read attributes of nodes
    ///
    /// Nodes are node ids (`ns=2;s=Demo.Counter`) or aliases from the
    /// `nodes` section of the configuration.
    Read(ReadArgs),

    /// Write one attribute of a node
    ///
    /// The text value is converted to the node's current value type, or to
    /// the fixed type of a non-Value attribute.
    Write(WriteArgs),

    /// Browse children of a node or resolve a browse path
    Browse(BrowseArgs),

    /// Call a method on an object
    Call(CallArgs),

    /// Monitor value changes or events
    Monitor(MonitorArgs),

    /// Read raw history of a variable
    History(HistoryArgs),

    /// List the endpoints a server offers
    Endpoints(DiscoveryArgs),

    /// List the servers a discovery server knows
    Servers(DiscoveryArgs),

    /// Validate the configuration file
    Validate(ValidateArgs),

    /// Show detailed version information
    Version,
}

// =============================================================================
// Command Arguments
// =============================================================================

/// Arguments for the `read` command.
#[derive(Args, Debug, Clone)]
pub struct ReadArgs {
    /// Nodes to read
    #[arg(required = true)]
    pub nodes: Vec<String>,

    /// Attribute name
    #[arg(short, long, default_value = "Value")]
    pub attribute: String,

    /// Index range, e.g. `1:3`
    #[arg(short, long)]
    pub range: Option<String>,
}

/// Arguments for the `write` command.
#[derive(Args, Debug, Clone)]
pub struct WriteArgs {
    /// Node to write
    pub node: String,

    /// Value as text
    pub value: String,

    /// Attribute name
    #[arg(short, long, default_value = "Value")]
    pub attribute: String,

    /// Value type, e.g. `Double`; read from the node when omitted
    #[arg(short = 't', long = "type")]
    pub value_type: Option<String>,
}

/// Arguments for the `browse` command.
#[derive(Args, Debug, Clone)]
pub struct BrowseArgs {
    /// Start node
    #[arg(default_value = "i=85")]
    pub node: String,

    /// Resolve a `/`-separated path of `ns:Name` segments instead of listing
    #[arg(short, long)]
    pub path: Option<String>,

    /// Reference type to follow (with subtypes)
    #[arg(long, default_value = "i=33")]
    pub reference_type: String,
}

/// Arguments for the `call` command.
#[derive(Args, Debug, Clone)]
pub struct CallArgs {
    /// Object that owns the method
    pub object: String,

    /// Method node
    pub method: String,

    /// Input arguments as `Type:value`, e.g. `Double:1.5`
    pub args: Vec<String>,
}

/// Arguments for the `monitor` command.
#[derive(Args, Debug, Clone)]
pub struct MonitorArgs {
    /// Nodes to monitor
    #[arg(required = true)]
    pub nodes: Vec<String>,

    /// Monitor events instead of values
    #[arg(long)]
    pub events: bool,

    /// Publishing interval, e.g. `500ms`
    #[arg(long, value_parser = parse_duration)]
    pub interval: Option<Duration>,

    /// Sampling interval, e.g. `100ms`
    #[arg(long, value_parser = parse_duration)]
    pub sampling: Option<Duration>,

    /// Absolute deadband for value changes
    #[arg(long)]
    pub deadband: Option<f64>,

    /// Stop after this long
    #[arg(short, long, value_parser = parse_duration)]
    pub duration: Option<Duration>,

    /// Stop after this many notifications
    #[arg(short = 'n', long)]
    pub count: Option<usize>,
}

/// Arguments for the `history` command.
#[derive(Args, Debug, Clone)]
pub struct HistoryArgs {
    /// Historizing variable
    pub node: String,

    /// How far back to start, e.g. `1h`
    #[arg(short, long, default_value = "1h", value_parser = parse_duration)]
    pub since: Duration,

    /// Values per page (0 = server decides)
    #[arg(short, long, default_value_t = 100)]
    pub page_size: u32,

    /// Include bounding values
    #[arg(long)]
    pub bounds: bool,
}

/// Arguments for the `endpoints` and `servers` commands.
#[derive(Args, Debug, Clone)]
pub struct DiscoveryArgs {
    /// Discovery URL; the configured endpoint when omitted
    pub url: Option<String>,
}

/// Arguments for the `validate` command.
#[derive(Args, Debug, Clone, Default)]
pub struct ValidateArgs {
    /// Show parsed configuration after validation
    #[arg(short, long)]
    pub show_config: bool,
}

// =============================================================================
// Enums
// =============================================================================

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for structured logging
    Json,
    /// Compact format for minimal output
    Compact,
}

impl From<uanode_config::LogFormat> for LogFormat {
    fn from(format: uanode_config::LogFormat) -> Self {
        match format {
            uanode_config::LogFormat::Text => LogFormat::Text,
            uanode_config::LogFormat::Json => LogFormat::Json,
            uanode_config::LogFormat::Compact => LogFormat::Compact,
        }
    }
}

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for programmatic parsing
    Json,
}

// =============================================================================
// Helper Methods
// =============================================================================

fn parse_duration(value: &str) -> Result<Duration, String> {
    humantime::parse_duration(value).map_err(|e| e.to_string())
}

impl Cli {
    /// Parse CLI arguments from the command line.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the effective log level based on flags, falling back to
    /// `configured`.
    pub fn effective_log_level<'a>(&'a self, configured: &'a str) -> &'a str {
        if self.quiet {
            "warn"
        } else if self.verbose {
            "debug"
        } else {
            self.log_level.as_deref().unwrap_or(configured)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_command() {
        let cli = Cli::parse_from(["uanode", "read", "ns=2;s=Demo.Counter", "temperature", "-a", "DisplayName"]);
        if let Commands::Read(args) = cli.command {
            assert_eq!(args.nodes.len(), 2);
            assert_eq!(args.attribute, "DisplayName");
        } else {
            panic!("Expected Read command");
        }
    }

    #[test]
    fn test_read_requires_node() {
        assert!(Cli::try_parse_from(["uanode", "read"]).is_err());
    }

    #[test]
    fn test_write_command() {
        let cli = Cli::parse_from(["uanode", "write", "ns=2;s=Demo.Counter", "42", "-t", "Int32"]);
        if let Commands::Write(args) = cli.command {
            assert_eq!(args.value, "42");
            assert_eq!(args.value_type.as_deref(), Some("Int32"));
            assert_eq!(args.attribute, "Value");
        } else {
            panic!("Expected Write command");
        }
    }

    #[test]
    fn test_monitor_durations() {
        let cli = Cli::parse_from(["uanode", "monitor", "speed", "--interval", "250ms", "-d", "5s", "-n", "3"]);
        if let Commands::Monitor(args) = cli.command {
            assert_eq!(args.interval, Some(Duration::from_millis(250)));
            assert_eq!(args.duration, Some(Duration::from_secs(5)));
            assert_eq!(args.count, Some(3));
            assert!(!args.events);
        } else {
            panic!("Expected Monitor command");
        }
        assert!(Cli::try_parse_from(["uanode", "monitor", "speed", "--interval", "soon"]).is_err());
    }

    #[test]
    fn test_global_options() {
        let cli = Cli::parse_from([
            "uanode",
            "-c",
            "/etc/uanode/uanode.yaml",
            "browse",
            "-e",
            "opc.tcp://plc:4840",
            "-o",
            "json",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/uanode/uanode.yaml")));
        assert_eq!(cli.endpoint.as_deref(), Some("opc.tcp://plc:4840"));
        assert_eq!(cli.output, OutputFormat::Json);
        if let Commands::Browse(args) = &cli.command {
            assert_eq!(args.node, "i=85");
        } else {
            panic!("Expected Browse command");
        }
    }

    #[test]
    fn test_log_level_flags() {
        let cli = Cli::parse_from(["uanode", "-q", "version"]);
        assert_eq!(cli.effective_log_level("info"), "warn");

        let cli = Cli::parse_from(["uanode", "-v", "version"]);
        assert_eq!(cli.effective_log_level("info"), "debug");

        let cli = Cli::parse_from(["uanode", "version"]);
        assert_eq!(cli.effective_log_level("error"), "error");
    }
}
