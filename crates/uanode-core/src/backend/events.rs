// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Backend event bus.
//!
//! Backends never call back into the engine. Every completion and
//! notification is wrapped in an [`EventEnvelope`] and pushed onto an
//! [`EventSink`]; the connection's dispatcher task drains the other end.
//!
//! # Correlation
//!
//! An envelope carries the opaque node handle the request was issued for
//! (if any) and the request id. Completions answer a request and carry
//! both. Notifications (data changes, events) carry only the handle the
//! item was enabled with. Connection-level events carry neither.

use tokio::sync::mpsc;
use tracing::trace;

use super::{Handle, RequestId, RequestTag};
use crate::monitoring::{MonitoringParameters, SubscriptionSettings};
use crate::services::{
    BrowsePathTarget, HistoryReadResponse, ReadResult, ReferenceDescription, RelativePathElement, WriteResult,
};
use crate::status::StatusCode;
use crate::types::{
    ApplicationDescription, Attribute, ConnectionState, DataValue, EndpointDescription, NodeId, Variant,
};

// =============================================================================
// BackendEvent
// =============================================================================

/// Direction of a monitoring acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MonitoringChange {
    /// Answer to an enable request.
    Enabled,
    /// Answer to a disable request.
    Disabled,
}

/// Everything a backend can report.
#[derive(Debug, Clone)]
pub enum BackendEvent {
    /// Answer to a node attribute read; one result per requested attribute
    /// in ordinal order.
    AttributesRead {
        /// Results.
        results: Vec<ReadResult>,
        /// Service status.
        status: StatusCode,
    },

    /// Answer to a node attribute write.
    AttributesWritten {
        /// Results in request order.
        results: Vec<WriteResult>,
        /// Service status.
        status: StatusCode,
    },

    /// Answer to a method call.
    MethodCallFinished {
        /// Method that was called.
        method_id: NodeId,
        /// Output arguments.
        outputs: Vec<Variant>,
        /// Per-input-argument results.
        input_results: Vec<StatusCode>,
        /// Call status.
        status: StatusCode,
    },

    /// A monitored value changed.
    DataChangeOccurred {
        /// Server subscription id.
        subscription_id: u32,
        /// Monitored attribute.
        attribute: Attribute,
        /// New value.
        value: DataValue,
    },

    /// A monitored event fired; fields follow the select clauses.
    EventOccurred {
        /// Server subscription id.
        subscription_id: u32,
        /// Selected fields.
        fields: Vec<Variant>,
    },

    /// Enable or disable acknowledged for one attribute.
    MonitoringStatusChanged {
        /// Server subscription id.
        subscription_id: u32,
        /// Attribute.
        attribute: Attribute,
        /// Which request this answers.
        change: MonitoringChange,
        /// Revised parameters including the server item id.
        parameters: MonitoringParameters,
        /// Status.
        status: StatusCode,
    },

    /// Item parameters modified.
    MonitoringParametersChanged {
        /// Server subscription id.
        subscription_id: u32,
        /// Attribute.
        attribute: Attribute,
        /// Revised parameters.
        parameters: MonitoringParameters,
        /// Status.
        status: StatusCode,
    },

    /// Subscription created.
    SubscriptionCreated {
        /// Server subscription id.
        subscription_id: u32,
        /// Revised settings.
        settings: SubscriptionSettings,
        /// Status.
        status: StatusCode,
    },

    /// Subscription settings modified.
    SubscriptionModified {
        /// Server subscription id.
        subscription_id: u32,
        /// Revised settings.
        settings: SubscriptionSettings,
        /// Status.
        status: StatusCode,
    },

    /// Subscription deleted.
    SubscriptionDeleted {
        /// Server subscription id.
        subscription_id: u32,
        /// Status.
        status: StatusCode,
    },

    /// Answer to a browse.
    BrowseFinished {
        /// References found.
        references: Vec<ReferenceDescription>,
        /// Status.
        status: StatusCode,
    },

    /// Answer to a browse path translation.
    BrowsePathResolved {
        /// Path that was resolved.
        path: Vec<RelativePathElement>,
        /// Targets found.
        targets: Vec<BrowsePathTarget>,
        /// Status.
        status: StatusCode,
    },

    /// Answer to GetEndpoints.
    EndpointsDiscovered {
        /// Endpoints.
        endpoints: Vec<EndpointDescription>,
        /// Status.
        status: StatusCode,
    },

    /// Answer to FindServers.
    ServersDiscovered {
        /// Servers.
        servers: Vec<ApplicationDescription>,
        /// Status.
        status: StatusCode,
    },

    /// Answer to a bulk read.
    BulkReadFinished {
        /// Results in request order.
        results: Vec<ReadResult>,
        /// Service status.
        status: StatusCode,
    },

    /// Answer to a bulk write.
    BulkWriteFinished {
        /// Results in request order.
        results: Vec<WriteResult>,
        /// Service status.
        status: StatusCode,
    },

    /// One page of raw history.
    HistoryDataAvailable {
        /// The page.
        response: HistoryReadResponse,
    },

    /// Node added.
    NodeAdded {
        /// Id of the added node.
        node_id: NodeId,
        /// Status.
        status: StatusCode,
    },

    /// Node deleted.
    NodeDeleted {
        /// Id of the deleted node.
        node_id: NodeId,
        /// Status.
        status: StatusCode,
    },

    /// Reference added.
    ReferenceAdded {
        /// Source node.
        source_node_id: NodeId,
        /// Target node.
        target_node_id: NodeId,
        /// Status.
        status: StatusCode,
    },

    /// Reference deleted.
    ReferenceDeleted {
        /// Source node.
        source_node_id: NodeId,
        /// Target node.
        target_node_id: NodeId,
        /// Status.
        status: StatusCode,
    },

    /// The connection failed or was lost.
    ConnectionError {
        /// Status.
        status: StatusCode,
        /// Description.
        message: String,
    },

    /// The backend's connection state changed.
    StateChanged {
        /// New state.
        state: ConnectionState,
    },
}

impl BackendEvent {
    /// Returns the event name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::AttributesRead { .. } => "AttributesRead",
            Self::AttributesWritten { .. } => "AttributesWritten",
            Self::MethodCallFinished { .. } => "MethodCallFinished",
            Self::DataChangeOccurred { .. } => "DataChangeOccurred",
            Self::EventOccurred { .. } => "EventOccurred",
            Self::MonitoringStatusChanged { .. } => "MonitoringStatusChanged",
            Self::MonitoringParametersChanged { .. } => "MonitoringParametersChanged",
            Self::SubscriptionCreated { .. } => "SubscriptionCreated",
            Self::SubscriptionModified { .. } => "SubscriptionModified",
            Self::SubscriptionDeleted { .. } => "SubscriptionDeleted",
            Self::BrowseFinished { .. } => "BrowseFinished",
            Self::BrowsePathResolved { .. } => "BrowsePathResolved",
            Self::EndpointsDiscovered { .. } => "EndpointsDiscovered",
            Self::ServersDiscovered { .. } => "ServersDiscovered",
            Self::BulkReadFinished { .. } => "BulkReadFinished",
            Self::BulkWriteFinished { .. } => "BulkWriteFinished",
            Self::HistoryDataAvailable { .. } => "HistoryDataAvailable",
            Self::NodeAdded { .. } => "NodeAdded",
            Self::NodeDeleted { .. } => "NodeDeleted",
            Self::ReferenceAdded { .. } => "ReferenceAdded",
            Self::ReferenceDeleted { .. } => "ReferenceDeleted",
            Self::ConnectionError { .. } => "ConnectionError",
            Self::StateChanged { .. } => "StateChanged",
        }
    }

    /// Returns the status the event carries, if any.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::AttributesRead { status, .. }
            | Self::AttributesWritten { status, .. }
            | Self::MethodCallFinished { status, .. }
            | Self::MonitoringStatusChanged { status, .. }
            | Self::MonitoringParametersChanged { status, .. }
            | Self::SubscriptionCreated { status, .. }
            | Self::SubscriptionModified { status, .. }
            | Self::SubscriptionDeleted { status, .. }
            | Self::BrowseFinished { status, .. }
            | Self::BrowsePathResolved { status, .. }
            | Self::EndpointsDiscovered { status, .. }
            | Self::ServersDiscovered { status, .. }
            | Self::BulkReadFinished { status, .. }
            | Self::BulkWriteFinished { status, .. }
            | Self::NodeAdded { status, .. }
            | Self::NodeDeleted { status, .. }
            | Self::ReferenceAdded { status, .. }
            | Self::ReferenceDeleted { status, .. }
            | Self::ConnectionError { status, .. } => Some(*status),
            Self::HistoryDataAvailable { response } => Some(response.status),
            Self::DataChangeOccurred { value, .. } => Some(value.status),
            Self::EventOccurred { .. } | Self::StateChanged { .. } => None,
        }
    }

    /// Returns `true` for unsolicited notifications.
    pub const fn is_notification(&self) -> bool {
        matches!(self, Self::DataChangeOccurred { .. } | Self::EventOccurred { .. })
    }

    /// Returns the attribute a node-scoped event concerns.
    pub fn attribute(&self) -> Option<Attribute> {
        match self {
            Self::DataChangeOccurred { attribute, .. }
            | Self::MonitoringStatusChanged { attribute, .. }
            | Self::MonitoringParametersChanged { attribute, .. } => Some(*attribute),
            Self::EventOccurred { .. } => Some(Attribute::EventNotifier),
            _ => None,
        }
    }
}

// =============================================================================
// EventEnvelope / EventSink
// =============================================================================

/// A backend event with its correlation data.
#[derive(Debug, Clone)]
pub struct EventEnvelope {
    /// Handle of the node the event concerns.
    pub handle: Option<Handle>,
    /// Request the event answers.
    pub request_id: Option<RequestId>,
    /// The event.
    pub event: BackendEvent,
}

/// Sending half of the event bus, handed to the backend at connect.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<EventEnvelope>,
}

impl EventSink {
    /// Wraps a sender.
    pub fn new(tx: mpsc::UnboundedSender<EventEnvelope>) -> Self {
        Self { tx }
    }

    /// Creates a sink and the receiver the dispatcher drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<EventEnvelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    /// Emits the completion of the request identified by `tag`.
    ///
    /// Returns `false` if the dispatcher is gone.
    pub fn complete(&self, tag: RequestTag, event: BackendEvent) -> bool {
        self.send(EventEnvelope {
            handle: tag.handle,
            request_id: Some(tag.request_id),
            event,
        })
    }

    /// Emits a notification for the node behind `handle`.
    pub fn notify(&self, handle: Handle, event: BackendEvent) -> bool {
        self.send(EventEnvelope {
            handle: Some(handle),
            request_id: None,
            event,
        })
    }

    /// Emits a connection-level event.
    pub fn emit(&self, event: BackendEvent) -> bool {
        self.send(EventEnvelope {
            handle: None,
            request_id: None,
            event,
        })
    }

    /// Returns `true` if the receiving side is gone.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn send(&self, envelope: EventEnvelope) -> bool {
        let name = envelope.event.name();
        match self.tx.send(envelope) {
            Ok(()) => true,
            Err(_) => {
                trace!(event = name, "Event sink closed, dropping event");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sink_envelopes() {
        let (sink, mut rx) = EventSink::channel();
        let tag = RequestTag::new(Some(7), 42);
        assert!(sink.complete(
            tag,
            BackendEvent::BrowseFinished {
                references: Vec::new(),
                status: StatusCode::GOOD,
            }
        ));
        assert!(sink.emit(BackendEvent::StateChanged {
            state: ConnectionState::Connected
        }));

        let first = rx.recv().await.unwrap();
        assert_eq!(first.handle, Some(7));
        assert_eq!(first.request_id, Some(42));
        assert_eq!(first.event.name(), "BrowseFinished");

        let second = rx.recv().await.unwrap();
        assert_eq!(second.handle, None);
        assert!(second.event.status().is_none());

        drop(rx);
        assert!(sink.is_closed());
        assert!(!sink.emit(BackendEvent::StateChanged {
            state: ConnectionState::Disconnected
        }));
    }
}
