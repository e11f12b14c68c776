// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA node attribute access and subscription engine.
//!
//! This crate gives clients typed, asynchronous access to the nodes of an
//! OPC UA server: read and write any of the 22 node attributes, monitor
//! value changes and events through subscriptions, browse the address
//! space, call methods and read history. Every request is correlated with
//! its answer by the engine, and the actual service calls are delegated to
//! a pluggable [`Backend`](backend::Backend).
//!
//! # Features
//!
//! - Per-node attribute reads and writes with attribute masks
//! - Bulk reads and writes with positional results
//! - Shared and exclusive subscriptions, data change and event filters
//! - Browse, browse path translation, method calls, raw history paging
//! - Namespace-URI-qualified node addressing
//! - In-memory simulated backend; live backend behind `opcua-backend`
//!
//! # Error Handling
//!
//! ```text
//! UaError
//! ├── Connection    - Endpoint refused, closed, not connected
//! ├── Configuration - Invalid node ids, filters, parameters
//! ├── Dispatch      - Request not dispatched or abandoned
//! ├── Subscription  - Unknown subscription, invalid settings
//! └── Backend       - Bad service status, unsupported service
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use uanode_core::{Attribute, Connection, MonitoringParameters};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let connection = Connection::from_name("simulated")?;
//!     connection.connect_url("opc.tcp://localhost:4840").await?;
//!
//!     let node = connection.node("ns=2;s=Demo.Temperature")?;
//!     let value = node.read_attribute(Attribute::Value)?.await?;
//!     println!("Value: {}", value.value);
//!
//!     node.enable_monitoring(Attribute::Value.mask(), MonitoringParameters::with_intervals(500.0, 100.0))?
//!         .await?;
//!     let mut events = node.events();
//!     while let Some(event) = events.recv().await {
//!         println!("{event:?}");
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod backend;
pub mod completion;
pub mod connection;
pub mod engine;
pub mod error;
pub mod filter;
pub mod monitoring;
pub mod node;
pub mod services;
pub mod status;
pub mod subscription;
pub mod types;
pub mod universal_node;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Re-export commonly used types
pub use error::{
    BackendError, ConfigurationError, ConnectionError, DispatchError, DispatchResult, ErrorCode, ErrorSeverity,
    SubscriptionError, UaError, UaErrorContext, UaResult,
};

pub use status::StatusCode;

pub use types::{
    ApplicationDescription, ApplicationType, Attribute, AttributeMask, BrowseDirection, ConnectionState, DataValue,
    EndpointDescription, LocalizedText, MessageSecurityMode, MonitoringMode, NodeClass, NodeId, NodeIdentifier,
    QualifiedName, UserTokenType, Variant, VariantType, SECURITY_POLICY_NONE,
};

pub use universal_node::{NamespaceArray, NamespaceSource, UniversalNode};

// Re-export service types
pub use services::{
    AddNodeItem, AddNodeResult, AddReferenceItem, BrowsePathTarget, BrowseRequest, ContinuationPoint,
    DeleteReferenceItem, HistoryReadRawRequest, HistoryReadResponse, ReadItem, ReadResult, ReferenceDescription,
    RelativePathElement, TypedArgument, WriteItem, WriteResult,
};

// Re-export monitoring types
pub use filter::{
    ContentFilter, ContentFilterElement, DataChangeFilter, DataChangeTrigger, DeadbandType, EventFields,
    EventFilter, FilterElement, FilterOperand, FilterOperator, MonitoringFilter, SimpleAttributeOperand,
};
pub use monitoring::{
    MonitoringParameterChange, MonitoringParameters, MonitoringState, SubscriptionSettings, SubscriptionType,
    DEFAULT_PUBLISHING_INTERVAL, DEFAULT_SAMPLING_INTERVAL,
};

// Re-export client types
pub use completion::Completion;
pub use connection::{Connection, ConnectionRegistry, DEFAULT_CONNECTION_NAME};
pub use engine::{EngineStatsSnapshot, EventStream};
pub use node::{BrowseResult, MethodResult, Node, ResolvedPath};
pub use subscription::{ItemCounts, MonitoredItem, MonitoringOutcome, MonitoringResult, Subscription};

// Re-export backends
pub use backend::{Backend, BackendEvent, BackendKind, SimulatedBackend};

#[cfg(feature = "opcua-backend")]
pub use backend::{LiveSettings, OpcUaBackend};
