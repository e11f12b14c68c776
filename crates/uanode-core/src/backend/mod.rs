// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Backend abstraction.
//!
//! A [`Backend`] performs the actual OPC UA service calls. Every dispatch
//! method is synchronous and non-blocking: it validates, queues the work and
//! returns. The answer arrives later as a [`BackendEvent`] on the
//! [`EventSink`] handed over at connect, tagged with the [`RequestTag`] of
//! the request.
//!
//! Backends are selected by name through [`BackendKind`]:
//!
//! | Name | Backend |
//! |------|---------|
//! | `simulated` | [`SimulatedBackend`], in-memory address space |
//! | `opcua` | `live::OpcUaBackend`, live server (feature `opcua-backend`) |

pub mod address_space;
pub mod events;
#[cfg(feature = "opcua-backend")]
pub mod live;
pub mod simulated;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;

pub use events::{BackendEvent, EventEnvelope, EventSink, MonitoringChange};
#[cfg(feature = "opcua-backend")]
pub use live::{LiveSettings, OpcUaBackend};
pub use simulated::SimulatedBackend;

use crate::error::{BackendError, ConfigurationError, DispatchResult, UaError, UaResult};
use crate::monitoring::{MonitoringParameters, SubscriptionSettings};
use crate::services::{
    AddNodeItem, AddReferenceItem, BrowseRequest, DeleteReferenceItem, HistoryReadRawRequest, ReadItem,
    RelativePathElement, TypedArgument, WriteItem,
};
use crate::types::{Attribute, AttributeMask, ConnectionState, EndpointDescription, NodeId, VariantType};

/// Opaque handle correlating backend events with a node. `0` is never
/// assigned.
pub type Handle = u64;

/// Identifier of one dispatched request.
pub type RequestId = u64;

// =============================================================================
// RequestTag
// =============================================================================

/// Correlation data attached to every dispatched request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestTag {
    /// Handle of the issuing node; `None` for connection-level requests.
    pub handle: Option<Handle>,
    /// Request id.
    pub request_id: RequestId,
}

impl RequestTag {
    /// Request id used for fire-and-forget requests nobody waits on.
    pub const UNTRACKED: RequestId = 0;

    /// Creates a tag.
    pub const fn new(handle: Option<Handle>, request_id: RequestId) -> Self {
        Self { handle, request_id }
    }

    /// Tag for a request whose completion is ignored.
    pub const fn untracked(handle: Option<Handle>) -> Self {
        Self::new(handle, Self::UNTRACKED)
    }

    /// Returns `true` if nobody waits on the completion.
    pub const fn is_untracked(&self) -> bool {
        self.request_id == Self::UNTRACKED
    }
}

/// One attribute to start monitoring.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitoringRequest {
    /// Node to monitor.
    pub node_id: NodeId,
    /// Attribute; `EventNotifier` requests an event item.
    pub attribute: Attribute,
    /// Item parameters.
    pub parameters: MonitoringParameters,
}

// =============================================================================
// Backend trait
// =============================================================================

/// A pluggable OPC UA service provider.
///
/// Each dispatch method returns `Ok(())` once the request is queued. It
/// must then emit exactly the completions documented on the method, tagged
/// with the given [`RequestTag`]. Queued requests are answered in FIFO
/// order per backend.
///
/// Discovery, history and node management have default implementations
/// that refuse with [`BackendError::NotSupported`].
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    // =========================================================================
    // Connection Management
    // =========================================================================

    /// Returns the backend name.
    fn name(&self) -> &'static str;

    /// Returns the current connection state.
    fn state(&self) -> ConnectionState;

    /// Connects to `endpoint` and starts emitting events on `sink`.
    async fn connect(&self, endpoint: &EndpointDescription, sink: EventSink) -> UaResult<()>;

    /// Disconnects; server-side subscriptions are lost.
    async fn disconnect(&self) -> UaResult<()>;

    // =========================================================================
    // Attribute Services
    // =========================================================================

    /// Reads the attributes in `mask`. Completes with one
    /// [`BackendEvent::AttributesRead`] holding a result per attribute in
    /// ordinal order.
    fn read_attributes(
        &self,
        tag: RequestTag,
        node_id: &NodeId,
        mask: AttributeMask,
        index_range: Option<&str>,
    ) -> DispatchResult<()>;

    /// Writes attributes of one node. Completes with one
    /// [`BackendEvent::AttributesWritten`].
    fn write_attributes(&self, tag: RequestTag, items: Vec<WriteItem>) -> DispatchResult<()>;

    /// Reads arbitrary node attributes. Completes with one
    /// [`BackendEvent::BulkReadFinished`].
    fn read_node_attributes(&self, tag: RequestTag, items: Vec<ReadItem>) -> DispatchResult<()>;

    /// Writes arbitrary node attributes. Completes with one
    /// [`BackendEvent::BulkWriteFinished`].
    fn write_node_attributes(&self, tag: RequestTag, items: Vec<WriteItem>) -> DispatchResult<()>;

    // =========================================================================
    // Subscriptions & Monitoring
    // =========================================================================

    /// Creates a subscription. Completes with
    /// [`BackendEvent::SubscriptionCreated`] carrying revised settings.
    fn create_subscription(&self, tag: RequestTag, settings: &SubscriptionSettings) -> DispatchResult<()>;

    /// Modifies a subscription. Completes with
    /// [`BackendEvent::SubscriptionModified`].
    fn modify_subscription(
        &self,
        tag: RequestTag,
        subscription_id: u32,
        settings: &SubscriptionSettings,
    ) -> DispatchResult<()>;

    /// Deletes a subscription and its items. Completes with
    /// [`BackendEvent::SubscriptionDeleted`].
    fn delete_subscription(&self, tag: RequestTag, subscription_id: u32) -> DispatchResult<()>;

    /// Creates monitored items. Completes with one
    /// [`BackendEvent::MonitoringStatusChanged`] per request; afterwards
    /// notifications for the items are emitted with `tag.handle`.
    fn enable_monitoring(
        &self,
        tag: RequestTag,
        subscription_id: u32,
        requests: Vec<MonitoringRequest>,
    ) -> DispatchResult<()>;

    /// Deletes monitored items given as `(attribute, server item id)`.
    /// Completes with one [`BackendEvent::MonitoringStatusChanged`] per item.
    fn disable_monitoring(
        &self,
        tag: RequestTag,
        subscription_id: u32,
        items: Vec<(Attribute, u32)>,
    ) -> DispatchResult<()>;

    /// Replaces the parameters of one monitored item. Completes with one
    /// [`BackendEvent::MonitoringParametersChanged`].
    fn modify_monitoring(
        &self,
        tag: RequestTag,
        subscription_id: u32,
        attribute: Attribute,
        parameters: &MonitoringParameters,
    ) -> DispatchResult<()>;

    // =========================================================================
    // View & Method Services
    // =========================================================================

    /// Browses references of a node. Completes with
    /// [`BackendEvent::BrowseFinished`].
    fn browse(&self, tag: RequestTag, node_id: &NodeId, request: &BrowseRequest) -> DispatchResult<()>;

    /// Translates a relative path. Completes with
    /// [`BackendEvent::BrowsePathResolved`].
    fn translate_browse_path(
        &self,
        tag: RequestTag,
        node_id: &NodeId,
        path: &[RelativePathElement],
    ) -> DispatchResult<()>;

    /// Calls a method on an object. Completes with
    /// [`BackendEvent::MethodCallFinished`].
    fn call_method(
        &self,
        tag: RequestTag,
        object_id: &NodeId,
        method_id: &NodeId,
        arguments: Vec<TypedArgument>,
    ) -> DispatchResult<()>;

    // =========================================================================
    // Optional Services
    // =========================================================================

    /// Reads one page of raw history. Completes with
    /// [`BackendEvent::HistoryDataAvailable`].
    fn history_read_raw(
        &self,
        _tag: RequestTag,
        _node_id: &NodeId,
        _request: &HistoryReadRawRequest,
    ) -> DispatchResult<()> {
        Err(self.not_supported("history_read_raw"))
    }

    /// Lists endpoints of a server. Completes with
    /// [`BackendEvent::EndpointsDiscovered`].
    fn get_endpoints(&self, _tag: RequestTag, _url: &str) -> DispatchResult<()> {
        Err(self.not_supported("get_endpoints"))
    }

    /// Lists servers known to a discovery server. Completes with
    /// [`BackendEvent::ServersDiscovered`].
    fn find_servers(&self, _tag: RequestTag, _url: &str) -> DispatchResult<()> {
        Err(self.not_supported("find_servers"))
    }

    /// Adds a node. Completes with [`BackendEvent::NodeAdded`].
    fn add_node(&self, _tag: RequestTag, _item: AddNodeItem) -> DispatchResult<()> {
        Err(self.not_supported("add_node"))
    }

    /// Deletes a node. Completes with [`BackendEvent::NodeDeleted`].
    fn delete_node(&self, _tag: RequestTag, _node_id: &NodeId, _delete_target_references: bool) -> DispatchResult<()> {
        Err(self.not_supported("delete_node"))
    }

    /// Adds a reference. Completes with [`BackendEvent::ReferenceAdded`].
    fn add_reference(&self, _tag: RequestTag, _item: AddReferenceItem) -> DispatchResult<()> {
        Err(self.not_supported("add_reference"))
    }

    /// Deletes a reference. Completes with [`BackendEvent::ReferenceDeleted`].
    fn delete_reference(&self, _tag: RequestTag, _item: DeleteReferenceItem) -> DispatchResult<()> {
        Err(self.not_supported("delete_reference"))
    }

    /// Builds the error returned by unsupported services.
    fn not_supported(&self, operation: &'static str) -> UaError {
        BackendError::NotSupported {
            operation,
            backend: self.name(),
        }
        .into()
    }
}

// =============================================================================
// BackendKind
// =============================================================================

/// Backends selectable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BackendKind {
    /// In-memory simulated server.
    #[default]
    Simulated,
    /// Live server through the `opcua` client stack.
    OpcUa,
}

impl BackendKind {
    /// Returns the canonical name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Simulated => "simulated",
            Self::OpcUa => "opcua",
        }
    }

    /// Returns `true` if this build can create the backend.
    pub const fn is_available(self) -> bool {
        match self {
            Self::Simulated => true,
            Self::OpcUa => cfg!(feature = "opcua-backend"),
        }
    }

    /// Names of all backends available in this build.
    pub fn available() -> Vec<&'static str> {
        [Self::Simulated, Self::OpcUa]
            .into_iter()
            .filter(|kind| kind.is_available())
            .map(Self::name)
            .collect()
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BackendKind {
    type Err = UaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "simulated" | "sim" | "simulation" => Ok(Self::Simulated),
            "opcua" | "opc-ua" | "opc.tcp" => Ok(Self::OpcUa),
            _ => Err(ConfigurationError::unknown_backend(s).into()),
        }
    }
}

/// Creates the backend `kind` names.
///
/// # Errors
///
/// Returns `UnknownBackend` if the backend is not compiled into this build.
pub fn create_backend(kind: BackendKind) -> UaResult<Arc<dyn Backend>> {
    match kind {
        BackendKind::Simulated => Ok(Arc::new(SimulatedBackend::new())),
        #[cfg(feature = "opcua-backend")]
        BackendKind::OpcUa => Ok(Arc::new(live::OpcUaBackend::new())),
        #[cfg(not(feature = "opcua-backend"))]
        BackendKind::OpcUa => Err(ConfigurationError::unknown_backend(kind.name()).into()),
    }
}

// =============================================================================
// Static helpers
// =============================================================================

/// Returns the fixed data type of an attribute; `None` for `Value`, whose
/// type travels with the value.
pub fn attribute_type(attribute: Attribute) -> Option<VariantType> {
    Some(match attribute {
        Attribute::NodeId | Attribute::DataType => VariantType::NodeId,
        Attribute::NodeClass | Attribute::ValueRank => VariantType::Int32,
        Attribute::BrowseName => VariantType::QualifiedName,
        Attribute::DisplayName | Attribute::Description | Attribute::InverseName => VariantType::LocalizedText,
        Attribute::WriteMask | Attribute::UserWriteMask | Attribute::ArrayDimensions => VariantType::UInt32,
        Attribute::IsAbstract
        | Attribute::Symmetric
        | Attribute::ContainsNoLoops
        | Attribute::Historizing
        | Attribute::Executable
        | Attribute::UserExecutable => VariantType::Boolean,
        Attribute::EventNotifier | Attribute::AccessLevel | Attribute::UserAccessLevel => VariantType::Byte,
        Attribute::MinimumSamplingInterval => VariantType::Double,
        Attribute::Value => return None,
    })
}

/// Revises a requested publishing interval against the server minimum.
pub fn revise_publishing_interval(requested: f64, minimum: f64) -> f64 {
    requested.max(minimum)
}

/// Checks that an endpoint description can be used to connect.
///
/// # Errors
///
/// Returns `InvalidEndpoint` with a readable reason when the URL or the
/// security policy is empty or the security mode is invalid.
pub fn verify_endpoint_description(endpoint: &EndpointDescription) -> Result<(), ConfigurationError> {
    if endpoint.endpoint_url.trim().is_empty() {
        return Err(ConfigurationError::invalid_endpoint("endpoint URL is empty"));
    }
    if endpoint.security_policy_uri.trim().is_empty() {
        return Err(ConfigurationError::invalid_endpoint("security policy is empty"));
    }
    if !endpoint.security_mode.is_valid() {
        return Err(ConfigurationError::invalid_endpoint(format!(
            "security mode {} is not one of None, Sign, SignAndEncrypt",
            endpoint.security_mode
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MessageSecurityMode;

    #[test]
    fn test_attribute_type_is_total() {
        for attribute in Attribute::ALL {
            let expected_none = attribute == Attribute::Value;
            assert_eq!(attribute_type(attribute).is_none(), expected_none, "{attribute}");
        }
        assert_eq!(attribute_type(Attribute::BrowseName), Some(VariantType::QualifiedName));
        assert_eq!(attribute_type(Attribute::AccessLevel), Some(VariantType::Byte));
        assert_eq!(attribute_type(Attribute::MinimumSamplingInterval), Some(VariantType::Double));
    }

    #[test]
    fn test_revise_publishing_interval() {
        assert_eq!(revise_publishing_interval(100.0, 250.0), 250.0);
        assert_eq!(revise_publishing_interval(500.0, 250.0), 500.0);
        assert_eq!(revise_publishing_interval(250.0, 250.0), 250.0);
    }

    #[test]
    fn test_verify_endpoint_description() {
        let good = EndpointDescription::new("opc.tcp://localhost:4840");
        assert!(verify_endpoint_description(&good).is_ok());

        let no_url = EndpointDescription::new("");
        let err = verify_endpoint_description(&no_url).unwrap_err();
        assert!(err.to_string().contains("endpoint URL is empty"));

        let no_policy = good.clone().with_security_policy("");
        assert!(verify_endpoint_description(&no_policy).is_err());

        let invalid_mode = good.with_security_mode(MessageSecurityMode::Invalid);
        let err = verify_endpoint_description(&invalid_mode).unwrap_err();
        assert!(err.to_string().contains("security mode"));
    }

    #[test]
    fn test_backend_kind() {
        assert_eq!("sim".parse::<BackendKind>().unwrap(), BackendKind::Simulated);
        assert_eq!("OPCUA".parse::<BackendKind>().unwrap(), BackendKind::OpcUa);
        assert!("modbus".parse::<BackendKind>().is_err());
        assert!(BackendKind::available().contains(&"simulated"));
        assert!(create_backend(BackendKind::Simulated).is_ok());
    }

    #[test]
    fn test_request_tag() {
        assert!(RequestTag::untracked(Some(3)).is_untracked());
        assert!(!RequestTag::new(None, 9).is_untracked());
    }
}
