// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # uanode-bin
//!
//! Command-line client for the uanode engine.
//!
//! - CLI argument parsing with clap
//! - Configuration loading and connection setup
//! - Logging initialization
//! - Command implementations (read, write, browse, monitor, etc.)
//!
//! ## Architecture
//!
//! ```text
//!                    main.rs
//!                       │
//!                 ┌─────▼─────┐
//!                 │  cli.rs   │
//!                 └─────┬─────┘
//!          ┌────────────┼────────────┐
//!          ▼            ▼            ▼
//!     ┌──────────┐ ┌──────────┐ ┌──────────┐
//!     │ commands │ │ logging  │ │ shutdown │
//!     └────┬─────┘ └──────────┘ └──────────┘
//!          │
//!   ┌──────┴────────┐
//!   │ uanode-config │──▶ uanode-core (Connection, Node)
//!   └───────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Read two values
//! uanode read ns=2;s=Demo.Counter ns=2;s=Demo.Temperature
//!
//! # Write with the node's current type
//! uanode write ns=2;s=Demo.Counter 42
//!
//! # Watch a value for ten seconds
//! uanode monitor ns=2;s=Demo.Temperature --interval 500ms -d 10s
//!
//! # Resolve a path below a folder
//! uanode browse ns=2;s=Demo -p 2:Machine/2:Speed
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod shutdown;

// =============================================================================
// Re-exports
// =============================================================================

pub use cli::{Cli, Commands};
pub use commands::{execute, load_config, Session};
pub use error::{BinError, BinResult};
pub use logging::init_logging;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
