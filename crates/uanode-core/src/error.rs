// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for the node access and subscription engine.
//!
//! Errors fall into two families. Synchronous errors are returned directly
//! from the call that detected them: configuration problems (malformed node
//! ids, unresolved namespaces, invalid filters) and dispatch refusals (no
//! connection, unregistered handle). Server-side outcomes never become a
//! `UaError`; they travel as a [`StatusCode`](crate::status::StatusCode) in
//! the completion payload and every caller is expected to inspect it.
//!
//! # Error Categories
//!
//! ```text
//! UaError
//! ├── Connection    - Backend connect/disconnect failures
//! ├── Configuration - Invalid node ids, namespaces, filters, endpoints
//! ├── Dispatch      - Request refused before reaching the backend
//! ├── Subscription  - Subscription bookkeeping errors
//! └── Backend       - Backend-level failures and unsupported services
//! ```
//!
//! # Examples
//!
//! ```
//! use uanode_core::error::{ConfigurationError, ErrorSeverity, UaError};
//!
//! let error = UaError::from(ConfigurationError::unresolved_namespace("urn:plant"));
//! assert!(!error.is_retryable());
//! assert_eq!(error.severity(), ErrorSeverity::Critical);
//! assert_eq!(error.error_code().to_string(), "UA-0203");
//! ```

use std::fmt;

use thiserror::Error;
use tracing::Level;

use crate::status::StatusCode;

// =============================================================================
// UaError - Main Error Type
// =============================================================================

/// The main error type for the engine.
#[derive(Debug, Error)]
pub enum UaError {
    /// Connection lifecycle errors.
    #[error("{0}")]
    Connection(#[from] ConnectionError),

    /// Configuration and input validation errors.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),

    /// A request was refused before it reached the backend.
    #[error("{0}")]
    Dispatch(#[from] DispatchError),

    /// Subscription bookkeeping errors.
    #[error("{0}")]
    Subscription(#[from] SubscriptionError),

    /// Backend-level errors.
    #[error("{0}")]
    Backend(#[from] BackendError),
}

impl UaError {
    /// Creates a "not connected" dispatch error.
    pub fn not_connected() -> Self {
        Self::Dispatch(DispatchError::NotConnected)
    }

    /// Creates an invalid node id error.
    pub fn invalid_node_id(node_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration(ConfigurationError::invalid_node_id(node_id, reason))
    }

    /// Creates a backend status error.
    pub fn bad_status(operation: impl Into<String>, status: StatusCode) -> Self {
        Self::Backend(BackendError::status(operation, status))
    }

    /// Returns `true` if retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(e) => e.is_retryable(),
            Self::Dispatch(e) => e.is_retryable(),
            Self::Backend(e) => e.is_retryable(),
            Self::Configuration(_) | Self::Subscription(_) => false,
        }
    }

    /// Returns the severity level of this error.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Connection(e) => e.severity(),
            Self::Configuration(_) => ErrorSeverity::Critical,
            Self::Dispatch(e) => e.severity(),
            Self::Subscription(_) => ErrorSeverity::Warning,
            Self::Backend(e) => e.severity(),
        }
    }

    /// Returns the error category for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "connection",
            Self::Configuration(_) => "configuration",
            Self::Dispatch(_) => "dispatch",
            Self::Subscription(_) => "subscription",
            Self::Backend(_) => "backend",
        }
    }

    /// Returns a unique error code for this error.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Connection(e) => e.error_code(),
            Self::Configuration(e) => e.error_code(),
            Self::Dispatch(e) => e.error_code(),
            Self::Subscription(e) => e.error_code(),
            Self::Backend(e) => e.error_code(),
        }
    }

    /// Returns recovery hints for this error.
    pub fn recovery_hints(&self) -> Vec<&'static str> {
        match self {
            Self::Connection(e) => e.recovery_hints(),
            Self::Configuration(e) => e.recovery_hints(),
            Self::Dispatch(e) => e.recovery_hints(),
            Self::Subscription(_) => vec!["Re-create the subscription and enable monitoring again"],
            Self::Backend(e) => e.recovery_hints(),
        }
    }

    /// Returns a short message suitable for end users.
    pub fn user_message(&self) -> String {
        match self {
            Self::Connection(ConnectionError::NotConnected) | Self::Dispatch(DispatchError::NotConnected) => {
                "Not connected to the server".to_string()
            }
            Self::Configuration(e) => format!("Invalid configuration: {e}"),
            Self::Backend(BackendError::Status { operation, status }) => {
                format!("The server rejected {operation}: {}", status.name())
            }
            other => other.to_string(),
        }
    }

    /// Returns the tracing level for this error.
    pub fn tracing_level(&self) -> Level {
        self.severity().to_tracing_level()
    }

    /// Logs this error with appropriate level and context.
    pub fn log(&self, context: &str) {
        let code = self.error_code();
        match self.tracing_level() {
            Level::ERROR => tracing::error!(
                error_code = %code,
                category = self.category(),
                context = context,
                "{self}"
            ),
            Level::WARN => tracing::warn!(
                error_code = %code,
                category = self.category(),
                context = context,
                "{self}"
            ),
            _ => tracing::debug!(
                error_code = %code,
                category = self.category(),
                context = context,
                "{self}"
            ),
        }
    }
}

// =============================================================================
// ConnectionError
// =============================================================================

/// Connection lifecycle errors.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The backend refused or failed to open the connection.
    #[error("Connection to '{endpoint}' failed: {reason}")]
    Refused {
        /// Target endpoint.
        endpoint: String,
        /// Reason reported by the backend.
        reason: String,
    },

    /// The connection was closed.
    #[error("Connection closed{}", .reason.as_deref().map(|r| format!(": {r}")).unwrap_or_default())]
    Closed {
        /// Reason for closure.
        reason: Option<String>,
    },

    /// An operation needs an established connection.
    #[error("Not connected to an OPC UA server")]
    NotConnected,

    /// The connection is already established.
    #[error("Already connected to '{endpoint}'")]
    AlreadyConnected {
        /// Current endpoint.
        endpoint: String,
    },

    /// The requested backend is not compiled into this build.
    #[error("Backend '{name}' is not available in this build")]
    BackendUnavailable {
        /// Backend name.
        name: String,
    },
}

impl ConnectionError {
    /// Creates a refused error.
    pub fn refused(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Refused {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }

    /// Creates a closed error.
    pub fn closed(reason: Option<String>) -> Self {
        Self::Closed { reason }
    }

    /// Creates a backend unavailable error.
    pub fn backend_unavailable(name: impl Into<String>) -> Self {
        Self::BackendUnavailable { name: name.into() }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Refused { .. } | Self::Closed { .. } | Self::NotConnected)
    }

    /// Returns the severity level.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Refused { .. } => ErrorSeverity::Error,
            Self::Closed { .. } | Self::NotConnected | Self::AlreadyConnected { .. } => {
                ErrorSeverity::Warning
            }
            Self::BackendUnavailable { .. } => ErrorSeverity::Critical,
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Refused { .. } => ErrorCode::new(1, 1),
            Self::Closed { .. } => ErrorCode::new(1, 2),
            Self::NotConnected => ErrorCode::new(1, 3),
            Self::AlreadyConnected { .. } => ErrorCode::new(1, 4),
            Self::BackendUnavailable { .. } => ErrorCode::new(1, 5),
        }
    }

    /// Returns recovery hints.
    pub fn recovery_hints(&self) -> Vec<&'static str> {
        match self {
            Self::Refused { .. } => vec![
                "Check that the OPC UA server is running",
                "Verify the endpoint URL and security settings",
            ],
            Self::Closed { .. } | Self::NotConnected => vec!["Call connect() before issuing requests"],
            Self::AlreadyConnected { .. } => vec!["Disconnect before connecting to another endpoint"],
            Self::BackendUnavailable { .. } => vec![
                "Rebuild with the matching cargo feature",
                "Use the 'simulated' backend for offline testing",
            ],
        }
    }
}

// =============================================================================
// ConfigurationError
// =============================================================================

/// Configuration and input validation errors.
///
/// These are always detected synchronously and never coerced to a default.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// Malformed node id string.
    #[error("Invalid node ID '{node_id}': {reason}")]
    InvalidNodeId {
        /// The offending node id.
        node_id: String,
        /// Reason.
        reason: String,
    },

    /// Invalid endpoint description.
    #[error("Invalid endpoint description: {reason}")]
    InvalidEndpoint {
        /// Human-readable reason.
        reason: String,
    },

    /// Namespace name not resolved to an index.
    #[error("Namespace '{namespace}' is not resolved to an index")]
    UnresolvedNamespace {
        /// The namespace name.
        namespace: String,
    },

    /// Namespace index out of range.
    #[error("Namespace index {index} is not present in the namespace array")]
    InvalidNamespace {
        /// The namespace index.
        index: u16,
    },

    /// Invalid content or data change filter.
    #[error("Invalid filter: {reason}")]
    InvalidFilter {
        /// Reason.
        reason: String,
    },

    /// A request parameter is out of range or inconsistent.
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter {
        /// Parameter name.
        name: String,
        /// Reason.
        reason: String,
    },

    /// Backend name not recognized.
    #[error("Unknown backend '{name}'")]
    UnknownBackend {
        /// The backend name.
        name: String,
    },

    /// Unrecognized enumeration value in textual form.
    #[error("Invalid {kind}: '{value}'")]
    InvalidValue {
        /// Value kind (e.g. "security mode").
        kind: &'static str,
        /// The text that failed to parse.
        value: String,
    },
}

impl ConfigurationError {
    /// Creates an invalid node id error.
    pub fn invalid_node_id(node_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidNodeId {
            node_id: node_id.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid endpoint error.
    pub fn invalid_endpoint(reason: impl Into<String>) -> Self {
        Self::InvalidEndpoint {
            reason: reason.into(),
        }
    }

    /// Creates an unresolved namespace error.
    pub fn unresolved_namespace(namespace: impl Into<String>) -> Self {
        Self::UnresolvedNamespace {
            namespace: namespace.into(),
        }
    }

    /// Creates an invalid filter error.
    pub fn invalid_filter(reason: impl Into<String>) -> Self {
        Self::InvalidFilter {
            reason: reason.into(),
        }
    }

    /// Creates an invalid parameter error.
    pub fn invalid_parameter(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Creates an unknown backend error.
    pub fn unknown_backend(name: impl Into<String>) -> Self {
        Self::UnknownBackend { name: name.into() }
    }

    /// Creates an invalid value error.
    pub fn invalid_value(kind: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidValue {
            kind,
            value: value.into(),
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::InvalidNodeId { .. } => ErrorCode::new(2, 1),
            Self::InvalidEndpoint { .. } => ErrorCode::new(2, 2),
            Self::UnresolvedNamespace { .. } => ErrorCode::new(2, 3),
            Self::InvalidNamespace { .. } => ErrorCode::new(2, 4),
            Self::InvalidFilter { .. } => ErrorCode::new(2, 5),
            Self::InvalidParameter { .. } => ErrorCode::new(2, 6),
            Self::UnknownBackend { .. } => ErrorCode::new(2, 7),
            Self::InvalidValue { .. } => ErrorCode::new(2, 8),
        }
    }

    /// Returns recovery hints.
    pub fn recovery_hints(&self) -> Vec<&'static str> {
        match self {
            Self::InvalidNodeId { .. } => vec![
                "Node ID format: ns=<index>;i=<numeric>, ns=<index>;s=<string>, g=<guid> or b=<base64>",
                "Example: ns=2;s=MyNode or ns=0;i=85",
            ],
            Self::InvalidEndpoint { .. } => vec![
                "Use format: opc.tcp://hostname:port/path",
                "Valid modes: None, Sign, SignAndEncrypt",
            ],
            Self::UnresolvedNamespace { .. } | Self::InvalidNamespace { .. } => vec![
                "Connect first so the namespace array is available",
                "Check the namespace URI against the server's namespace array",
            ],
            Self::InvalidFilter { .. } => vec![
                "Element operands may only reference earlier filter elements",
                "Check operand counts for the filter operator",
            ],
            Self::InvalidParameter { .. } | Self::InvalidValue { .. } => {
                vec!["Check the parameter against the documented range"]
            }
            Self::UnknownBackend { .. } => vec!["Known backends: simulated, opcua"],
        }
    }
}

// =============================================================================
// DispatchError
// =============================================================================

/// A request was refused before it reached the backend.
///
/// This is the synchronous "not accepted for dispatch" outcome. The
/// backend never sees a refused request.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No connection is established.
    #[error("Request not dispatched: not connected")]
    NotConnected,

    /// The node handle is not registered with the backend.
    #[error("Request not dispatched: handle {handle} is not registered")]
    HandleNotRegistered {
        /// The opaque handle.
        handle: u64,
    },

    /// The request contained nothing to do.
    #[error("Request not dispatched: {operation} has no items")]
    EmptyRequest {
        /// Operation name.
        operation: &'static str,
    },

    /// The backend refused to queue the request.
    #[error("Backend refused {operation}: {reason}")]
    Rejected {
        /// Operation name.
        operation: &'static str,
        /// Reason.
        reason: String,
    },

    /// The pending request was discarded before its completion arrived.
    #[error("Request {request_id} was abandoned before completion")]
    Abandoned {
        /// The request id.
        request_id: u64,
    },

    /// A completion of an unexpected kind arrived for the request.
    #[error("Request {request_id} completed with an unexpected {event} event")]
    UnexpectedCompletion {
        /// The request id.
        request_id: u64,
        /// Event name.
        event: &'static str,
    },
}

impl DispatchError {
    /// Creates a rejected error.
    pub fn rejected(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::Rejected {
            operation,
            reason: reason.into(),
        }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NotConnected | Self::Rejected { .. } | Self::Abandoned { .. })
    }

    /// Returns the severity level.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NotConnected | Self::Abandoned { .. } => ErrorSeverity::Warning,
            Self::EmptyRequest { .. } => ErrorSeverity::Info,
            Self::HandleNotRegistered { .. } | Self::Rejected { .. } => ErrorSeverity::Error,
            Self::UnexpectedCompletion { .. } => ErrorSeverity::Critical,
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotConnected => ErrorCode::new(3, 1),
            Self::HandleNotRegistered { .. } => ErrorCode::new(3, 2),
            Self::EmptyRequest { .. } => ErrorCode::new(3, 3),
            Self::Rejected { .. } => ErrorCode::new(3, 4),
            Self::Abandoned { .. } => ErrorCode::new(3, 5),
            Self::UnexpectedCompletion { .. } => ErrorCode::new(3, 6),
        }
    }

    /// Returns recovery hints.
    pub fn recovery_hints(&self) -> Vec<&'static str> {
        match self {
            Self::NotConnected | Self::HandleNotRegistered { .. } => {
                vec!["Connect before issuing requests on a node"]
            }
            Self::EmptyRequest { .. } => vec!["Pass at least one attribute or item"],
            Self::Rejected { .. } => vec!["Check the backend state and retry"],
            Self::Abandoned { .. } => vec!["Keep the node alive until its completions arrive"],
            Self::UnexpectedCompletion { .. } => vec!["Report this as a backend bug"],
        }
    }
}

// =============================================================================
// SubscriptionError
// =============================================================================

/// Subscription bookkeeping errors.
#[derive(Debug, Error)]
pub enum SubscriptionError {
    /// Subscription id not known.
    #[error("Subscription {subscription_id} not found")]
    NotFound {
        /// Subscription id.
        subscription_id: u32,
    },

    /// Subscription already torn down.
    #[error("Subscription {subscription_id} has been torn down")]
    TornDown {
        /// Subscription id.
        subscription_id: u32,
    },

    /// Publishing parameters rejected.
    #[error("Invalid subscription settings: {reason}")]
    InvalidSettings {
        /// Reason.
        reason: String,
    },
}

impl SubscriptionError {
    /// Creates a not found error.
    pub fn not_found(subscription_id: u32) -> Self {
        Self::NotFound { subscription_id }
    }

    /// Creates an invalid settings error.
    pub fn invalid_settings(reason: impl Into<String>) -> Self {
        Self::InvalidSettings {
            reason: reason.into(),
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotFound { .. } => ErrorCode::new(4, 1),
            Self::TornDown { .. } => ErrorCode::new(4, 2),
            Self::InvalidSettings { .. } => ErrorCode::new(4, 3),
        }
    }
}

// =============================================================================
// BackendError
// =============================================================================

/// Backend-level errors.
#[derive(Debug, Error)]
pub enum BackendError {
    /// A service call finished with a bad status where the caller needed a value.
    #[error("{operation} failed with {status}")]
    Status {
        /// Operation name.
        operation: String,
        /// Status returned.
        status: StatusCode,
    },

    /// Service not implemented by this backend.
    #[error("{operation} is not supported by the {backend} backend")]
    NotSupported {
        /// Operation name.
        operation: &'static str,
        /// Backend name.
        backend: &'static str,
    },

    /// Internal backend failure.
    #[error("Backend failure: {message}")]
    Internal {
        /// Message.
        message: String,
    },
}

impl BackendError {
    /// Creates a status error.
    pub fn status(operation: impl Into<String>, status: StatusCode) -> Self {
        Self::Status {
            operation: operation.into(),
            status,
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Status { status, .. } => status.is_retryable(),
            Self::NotSupported { .. } => false,
            Self::Internal { .. } => true,
        }
    }

    /// Returns the severity level.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Status { .. } => ErrorSeverity::Warning,
            Self::NotSupported { .. } => ErrorSeverity::Info,
            Self::Internal { .. } => ErrorSeverity::Error,
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Status { .. } => ErrorCode::new(5, 1),
            Self::NotSupported { .. } => ErrorCode::new(5, 2),
            Self::Internal { .. } => ErrorCode::new(5, 3),
        }
    }

    /// Returns recovery hints.
    pub fn recovery_hints(&self) -> Vec<&'static str> {
        match self {
            Self::Status { .. } => vec!["Inspect the status code returned by the server"],
            Self::NotSupported { .. } => vec!["Use a backend that implements this service"],
            Self::Internal { .. } => vec!["Check the backend logs", "Reconnect and retry"],
        }
    }
}

// =============================================================================
// ErrorSeverity
// =============================================================================

/// Error severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    /// Informational - no action required.
    Info,
    /// Warning - action may be required.
    Warning,
    /// Error - action required, but recoverable.
    Error,
    /// Critical - caller must fix its input.
    Critical,
}

impl ErrorSeverity {
    /// Converts to tracing level.
    pub fn to_tracing_level(self) -> Level {
        match self {
            Self::Info => Level::INFO,
            Self::Warning => Level::WARN,
            Self::Error | Self::Critical => Level::ERROR,
        }
    }

    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// ErrorCode
// =============================================================================

/// Structured error code.
///
/// Format: `UA-CCNN` where CC is the category and NN the specific error.
///
/// Categories:
/// - 1: Connection
/// - 2: Configuration
/// - 3: Dispatch
/// - 4: Subscription
/// - 5: Backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode {
    /// Category (1-5).
    pub category: u8,
    /// Specific error within category.
    pub code: u8,
}

impl ErrorCode {
    /// Creates a new error code.
    pub const fn new(category: u8, code: u8) -> Self {
        Self { category, code }
    }

    /// Returns the full error code as a u16.
    pub fn as_u16(&self) -> u16 {
        ((self.category as u16) << 8) | (self.code as u16)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UA-{:02X}{:02X}", self.category, self.code)
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// A Result type with [`UaError`].
pub type UaResult<T> = Result<T, UaError>;

/// Result of a request-issuing call: `Ok` means accepted for dispatch.
pub type DispatchResult<T> = Result<T, UaError>;

// =============================================================================
// Error Context Extension
// =============================================================================

/// Extension trait for adding context to engine errors.
pub trait UaErrorContext<T> {
    /// Logs the error with node context.
    fn with_node(self, node_id: &str) -> UaResult<T>;

    /// Logs the error with endpoint context.
    fn with_endpoint(self, endpoint: &str) -> UaResult<T>;
}

impl<T> UaErrorContext<T> for UaResult<T> {
    fn with_node(self, node_id: &str) -> UaResult<T> {
        self.map_err(|e| {
            tracing::debug!(node_id = node_id, error = %e, "Request failed for node");
            e
        })
    }

    fn with_endpoint(self, endpoint: &str) -> UaResult<T> {
        self.map_err(|e| {
            tracing::debug!(endpoint = endpoint, error = %e, "Request failed for endpoint");
            e
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_display() {
        let code = ErrorCode::new(3, 2);
        assert_eq!(code.to_string(), "UA-0302");
        assert_eq!(code.as_u16(), 0x0302);
    }

    #[test]
    fn test_dispatch_errors() {
        let error = UaError::from(DispatchError::HandleNotRegistered { handle: 7 });
        assert_eq!(error.category(), "dispatch");
        assert!(error.to_string().contains('7'));
        assert!(!error.is_retryable());
        assert!(UaError::not_connected().is_retryable());
    }

    #[test]
    fn test_configuration_errors_are_critical() {
        let error = UaError::invalid_node_id("ns=x;i=1", "non-numeric namespace index");
        assert_eq!(error.severity(), ErrorSeverity::Critical);
        assert_eq!(error.tracing_level(), Level::ERROR);
        assert!(error.recovery_hints().iter().any(|h| h.contains("ns=")));
    }

    #[test]
    fn test_backend_status_error() {
        let error = UaError::bad_status("namespace refresh", StatusCode::BAD_NODE_ID_UNKNOWN);
        assert!(error.user_message().contains("BadNodeIdUnknown"));
        assert_eq!(error.severity(), ErrorSeverity::Warning);
    }

    #[test]
    fn test_closed_message() {
        assert_eq!(ConnectionError::closed(None).to_string(), "Connection closed");
        assert_eq!(
            ConnectionError::closed(Some("server shutdown".into())).to_string(),
            "Connection closed: server shutdown"
        );
    }
}
