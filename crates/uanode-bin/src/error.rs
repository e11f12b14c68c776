// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for the uanode binary.

use thiserror::Error;
use uanode_core::{DispatchError, UaError};

/// Result type alias for uanode-bin operations.
pub type BinResult<T> = Result<T, BinError>;

/// Errors that can occur in the uanode binary.
#[derive(Debug, Error)]
pub enum BinError {
    /// Invalid command-line input.
    #[error("Invalid argument: {0}")]
    Argument(String),

    /// A service answered with a bad status.
    #[error("Service failed: {0}")]
    Service(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),

    /// Config loading error.
    #[error("Config error: {0}")]
    Config(#[from] uanode_config::ConfigError),

    /// Engine error.
    #[error("{0}")]
    Ua(#[from] UaError),

    /// Error with context.
    #[error("{context}: {source}")]
    WithContext {
        /// The context description.
        context: String,
        /// The underlying error.
        #[source]
        source: Box<BinError>,
    },
}

impl BinError {
    /// Creates an argument error.
    pub fn argument(msg: impl Into<String>) -> Self {
        Self::Argument(msg.into())
    }

    /// Creates a service error.
    pub fn service(msg: impl Into<String>) -> Self {
        Self::Service(msg.into())
    }

    /// Adds context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Returns the exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Argument(_) => 2,
            Self::Config(_) => 3,
            Self::Ua(UaError::Connection(_) | UaError::Dispatch(DispatchError::NotConnected)) => 4,
            Self::Ua(_) => 5,
            Self::Service(_) => 6,
            Self::Io(_) => 7,
            Self::WithContext { source, .. } => source.exit_code(),
        }
    }
}

impl From<std::io::Error> for BinError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for BinError {
    fn from(err: serde_json::Error) -> Self {
        Self::Io(err.to_string())
    }
}

// =============================================================================
// Error Reporting
// =============================================================================

/// Reports an error with its cause chain.
pub fn report_error(error: &BinError) {
    eprintln!("Error: {}", error);

    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        eprintln!("  Caused by: {}", cause);
        source = cause.source();
    }
}

/// Reports an error and exits with the appropriate code.
pub fn report_error_and_exit(error: BinError) -> ! {
    report_error(&error);
    std::process::exit(error.exit_code())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_with_context() {
        let err = BinError::argument("missing value").with_context("write ns=2;s=Demo.Counter");
        assert_eq!(
            err.to_string(),
            "write ns=2;s=Demo.Counter: Invalid argument: missing value"
        );
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(BinError::service("BadNodeIdUnknown").exit_code(), 6);
        assert_eq!(BinError::from(UaError::not_connected()).exit_code(), 4);
        assert_eq!(
            BinError::from(UaError::invalid_node_id("x", "bad")).exit_code(),
            5
        );
        assert_eq!(
            BinError::from(uanode_config::ConfigError::unknown_node("boiler")).exit_code(),
            3
        );
    }
}
