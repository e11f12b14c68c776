// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Connection
//!
//! The facade clients start from. A [`Connection`] owns one backend and the
//! engine in front of it, and hands out [`Node`]s.
//!
//! ```text
//! Connection ── connect ──▶ Backend
//!     │  namespace array snapshot (refreshed on connect)
//!     │  bulk read/write, discovery, node management
//!     └── node("ns=2;s=Demo.Temperature") ──▶ Node
//! ```
//!
//! On reconnect, subscriptions that are still alive are re-created on the
//! server and their items enabled again.
//!
//! # Example
//!
//! ```rust,ignore
//! let connection = Connection::from_name("simulated")?;
//! connection.connect_url("opc.tcp://localhost:4840").await?;
//!
//! let node = connection.node("ns=2;s=Demo.Temperature")?;
//! let result = node.read_attribute(Attribute::Value)?.await?;
//! println!("{}", result.value);
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::backend::{
    attribute_type, create_backend, verify_endpoint_description, Backend, BackendEvent, BackendKind,
};
use crate::completion::{expect_single, Completion};
use crate::engine::{Engine, EngineStatsSnapshot, EventStream};
use crate::error::{BackendError, ConnectionError, DispatchError, DispatchResult, SubscriptionError, UaResult};
use crate::monitoring::{SubscriptionSettings, SubscriptionType};
use crate::node::Node;
use crate::services::{
    AddNodeItem, AddNodeResult, AddReferenceItem, DeleteReferenceItem, ReadItem, ReadResult, WriteItem, WriteResult,
};
use crate::status::StatusCode;
use crate::subscription::Subscription;
use crate::types::{ApplicationDescription, ConnectionState, EndpointDescription, NodeId, Variant};
use crate::universal_node::{NamespaceArray, NamespaceSource, UniversalNode};

/// Name given to connections created without one.
pub const DEFAULT_CONNECTION_NAME: &str = "default";

// =============================================================================
// Connection
// =============================================================================

/// A client connection to one OPC UA server through one backend.
pub struct Connection {
    name: String,
    engine: Arc<Engine>,
    endpoint: Mutex<Option<EndpointDescription>>,
}

impl Connection {
    /// Creates a connection over `backend`.
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self::with_name(DEFAULT_CONNECTION_NAME, backend)
    }

    /// Creates a named connection over `backend`.
    pub fn with_name(name: impl Into<String>, backend: Arc<dyn Backend>) -> Self {
        Self {
            name: name.into(),
            engine: Engine::new(backend),
            endpoint: Mutex::new(None),
        }
    }

    /// Creates a connection over the backend registered under `backend`,
    /// e.g. `"simulated"` or `"opcua"`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownBackend` if no such backend is compiled in.
    pub fn from_name(backend: &str) -> UaResult<Self> {
        let kind: BackendKind = backend.parse()?;
        Ok(Self::new(create_backend(kind)?))
    }

    /// Returns the connection name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the backend name.
    pub fn backend_name(&self) -> &'static str {
        self.engine.backend().name()
    }

    /// Returns the connection state.
    pub fn state(&self) -> ConnectionState {
        self.engine.state()
    }

    /// Returns `true` if requests may be dispatched.
    pub fn is_connected(&self) -> bool {
        self.engine.is_connected()
    }

    /// Returns the endpoint of the last successful connect.
    pub fn endpoint(&self) -> Option<EndpointDescription> {
        self.endpoint.lock().clone()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Connects to `endpoint`.
    ///
    /// Refreshes the namespace array and restores live subscriptions.
    ///
    /// # Errors
    ///
    /// Fails if the endpoint is invalid, the connection is already up or
    /// the backend refuses.
    pub async fn connect(&self, endpoint: EndpointDescription) -> UaResult<()> {
        verify_endpoint_description(&endpoint)?;
        if self.is_connected() {
            return Err(ConnectionError::AlreadyConnected {
                endpoint: self
                    .endpoint()
                    .map_or_else(|| endpoint.endpoint_url.clone(), |current| current.endpoint_url),
            }
            .into());
        }

        info!(
            connection = %self.name,
            backend = self.backend_name(),
            endpoint = %endpoint,
            "Connecting"
        );
        self.engine.set_state(ConnectionState::Connecting);
        let sink = self.engine.start_dispatcher();
        if let Err(error) = self.engine.backend().connect(&endpoint, sink).await {
            self.engine.stop_dispatcher();
            self.engine.set_state(ConnectionState::Disconnected);
            error.log("connect");
            return Err(error);
        }
        self.engine.set_state(ConnectionState::Connected);
        *self.endpoint.lock() = Some(endpoint);

        if let Err(error) = self.update_namespace_array().await {
            warn!(connection = %self.name, error = %error, "Namespace array not refreshed");
        }
        let restored = self.restore_subscriptions().await;
        info!(connection = %self.name, restored, "Connected");
        Ok(())
    }

    /// Connects to an unsecured endpoint at `url`.
    ///
    /// # Errors
    ///
    /// See [`Connection::connect`].
    pub async fn connect_url(&self, url: &str) -> UaResult<()> {
        self.connect(EndpointDescription::new(url)).await
    }

    /// Disconnects. Pending requests resolve as abandoned; subscriptions
    /// stay alive client-side and are restored by the next connect.
    ///
    /// # Errors
    ///
    /// Returns the backend's error; the connection is down regardless.
    pub async fn disconnect(&self) -> UaResult<()> {
        if self.state() == ConnectionState::Disconnected {
            return Ok(());
        }
        self.engine.set_state(ConnectionState::Closing);
        let result = self.engine.backend().disconnect().await;
        self.engine.set_state(ConnectionState::Disconnected);
        let abandoned = self.engine.abandon_pending();
        info!(connection = %self.name, abandoned, "Disconnected");
        result
    }

    async fn restore_subscriptions(&self) -> usize {
        let mut restored = 0;
        for subscription in self.engine.live_subscriptions() {
            match subscription.restore().await {
                Ok(count) => restored += count,
                Err(error) => warn!(
                    connection = %self.name,
                    subscription_id = subscription.id(),
                    error = %error,
                    "Subscription not restored"
                ),
            }
        }
        restored
    }

    // =========================================================================
    // Namespaces
    // =========================================================================

    /// Returns the current namespace array snapshot.
    pub fn namespace_array(&self) -> Arc<NamespaceArray> {
        self.engine.namespaces()
    }

    /// Reads the server's namespace array (`ns=0;i=2255`) and swaps the
    /// snapshot.
    ///
    /// # Errors
    ///
    /// Fails if the read is rejected, returns a bad status or does not
    /// hold a string array.
    pub async fn update_namespace_array(&self) -> UaResult<Arc<NamespaceArray>> {
        let results = self
            .read_node_attributes(vec![ReadItem::value(NodeId::NAMESPACE_ARRAY)])?
            .await?;
        let result = results
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::internal("namespace array read returned no result"))?;
        if !result.is_good() {
            return Err(BackendError::status("read namespace array", result.status).into());
        }
        let uris: Vec<String> = result
            .value
            .as_array()
            .ok_or_else(|| BackendError::internal("namespace array is not an array"))?
            .iter()
            .filter_map(Variant::as_str)
            .map(str::to_string)
            .collect();
        debug!(connection = %self.name, namespaces = uris.len(), "Namespace array updated");
        self.engine.set_namespaces(NamespaceArray::new(uris));
        Ok(self.engine.namespaces())
    }

    // =========================================================================
    // Nodes
    // =========================================================================

    /// Creates a node from its canonical text form, e.g. `ns=2;s=Demo.Counter`.
    ///
    /// # Errors
    ///
    /// Fails if the text is not a valid node id.
    pub fn node(&self, node_id: &str) -> UaResult<Node> {
        Ok(self.node_from_id(node_id.parse()?))
    }

    /// Creates a node from a universal node, resolving its namespace URI
    /// against the current snapshot.
    ///
    /// # Errors
    ///
    /// Returns `UnresolvedNamespace` if the URI is not in the snapshot.
    pub fn node_from(&self, node: &UniversalNode) -> UaResult<Node> {
        let mut node = node.clone();
        let snapshot = self.namespace_array();
        node.resolve_namespace(Some(&snapshot));
        Ok(self.node_from_id(node.to_node_id()?))
    }

    /// Creates a node for `node_id`.
    pub fn node_from_id(&self, node_id: NodeId) -> Node {
        Node::new(self.engine.clone(), node_id)
    }

    // =========================================================================
    // Bulk attribute services
    // =========================================================================

    /// Reads arbitrary attributes of arbitrary nodes; results follow the
    /// order of `items`.
    pub fn read_node_attributes(&self, items: Vec<ReadItem>) -> DispatchResult<Completion<Vec<ReadResult>>> {
        if items.is_empty() {
            return Err(DispatchError::EmptyRequest {
                operation: "read_node_attributes",
            }
            .into());
        }
        let namespaces = self.engine.namespaces();
        let requested = items.clone();
        self.engine.request(
            None,
            1,
            "read_node_attributes",
            |backend, tag| backend.read_node_attributes(tag, items),
            move |request_id, events| {
                let (results, status) = expect_single(request_id, events, |event| match event {
                    BackendEvent::BulkReadFinished { results, status } => Ok((results, status)),
                    other => Err(other),
                })?;
                let results = if results.len() == requested.len() {
                    results
                } else {
                    let status = if status.is_good() { StatusCode::BAD_UNEXPECTED_ERROR } else { status };
                    requested.iter().map(|item| ReadResult::failed(item, status)).collect()
                };
                Ok(results
                    .into_iter()
                    .map(|mut result| {
                        result.namespace_name = namespaces
                            .uri(result.node_id.namespace_index)
                            .map(str::to_string);
                        result
                    })
                    .collect())
            },
        )
    }

    /// Writes arbitrary attributes of arbitrary nodes; results follow the
    /// order of `items`.
    ///
    /// Non-Value attributes are converted to their fixed type first.
    pub fn write_node_attributes(&self, items: Vec<WriteItem>) -> DispatchResult<Completion<Vec<WriteResult>>> {
        if items.is_empty() {
            return Err(DispatchError::EmptyRequest {
                operation: "write_node_attributes",
            }
            .into());
        }
        let items = items.into_iter().map(prepare_write).collect::<UaResult<Vec<_>>>()?;
        let requested = items.clone();
        self.engine.request(
            None,
            1,
            "write_node_attributes",
            |backend, tag| backend.write_node_attributes(tag, items),
            move |request_id, events| {
                let (results, status) = expect_single(request_id, events, |event| match event {
                    BackendEvent::BulkWriteFinished { results, status } => Ok((results, status)),
                    other => Err(other),
                })?;
                if results.len() == requested.len() {
                    return Ok(results);
                }
                let status = if status.is_good() { StatusCode::BAD_UNEXPECTED_ERROR } else { status };
                Ok(requested.iter().map(|item| WriteResult::new(item, status)).collect())
            },
        )
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Creates an exclusive subscription. Items join it through
    /// `MonitoringParameters::in_subscription`; it lives as long as the
    /// returned handle or any node monitoring in it.
    pub fn create_subscription(
        &self,
        settings: SubscriptionSettings,
    ) -> DispatchResult<Completion<Arc<Subscription>>> {
        Subscription::create(&self.engine, settings, SubscriptionType::Exclusive)
    }

    /// Returns the live subscriptions ordered by id.
    pub fn subscriptions(&self) -> Vec<Arc<Subscription>> {
        self.engine.live_subscriptions()
    }

    /// Returns a live subscription by id.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no live subscription has that id.
    pub fn subscription(&self, subscription_id: u32) -> UaResult<Arc<Subscription>> {
        self.engine
            .subscription(subscription_id)
            .ok_or_else(|| SubscriptionError::not_found(subscription_id).into())
    }

    // =========================================================================
    // Discovery
    // =========================================================================

    /// Lists the endpoints of the server at `url`.
    pub fn request_endpoints(&self, url: &str) -> DispatchResult<Completion<Vec<EndpointDescription>>> {
        self.engine.request(
            None,
            1,
            "get_endpoints",
            |backend, tag| backend.get_endpoints(tag, url),
            |request_id, events| {
                let (endpoints, status) = expect_single(request_id, events, |event| match event {
                    BackendEvent::EndpointsDiscovered { endpoints, status } => Ok((endpoints, status)),
                    other => Err(other),
                })?;
                if !status.is_good() {
                    return Err(BackendError::status("get_endpoints", status).into());
                }
                Ok(endpoints)
            },
        )
    }

    /// Lists the servers known to the discovery server at `url`.
    pub fn find_servers(&self, url: &str) -> DispatchResult<Completion<Vec<ApplicationDescription>>> {
        self.engine.request(
            None,
            1,
            "find_servers",
            |backend, tag| backend.find_servers(tag, url),
            |request_id, events| {
                let (servers, status) = expect_single(request_id, events, |event| match event {
                    BackendEvent::ServersDiscovered { servers, status } => Ok((servers, status)),
                    other => Err(other),
                })?;
                if !status.is_good() {
                    return Err(BackendError::status("find_servers", status).into());
                }
                Ok(servers)
            },
        )
    }

    // =========================================================================
    // Node management
    // =========================================================================

    /// Adds a node.
    pub fn add_node(&self, item: AddNodeItem) -> DispatchResult<Completion<AddNodeResult>> {
        if item.browse_name.name.is_empty() {
            return Err(DispatchError::rejected("add_node", "browse name is empty").into());
        }
        self.engine.request(
            None,
            1,
            "add_node",
            |backend, tag| backend.add_node(tag, item),
            |request_id, events| {
                expect_single(request_id, events, |event| match event {
                    BackendEvent::NodeAdded { node_id, status } => Ok(AddNodeResult { node_id, status }),
                    other => Err(other),
                })
            },
        )
    }

    /// Deletes a node.
    pub fn delete_node(&self, node_id: &NodeId, delete_target_references: bool) -> DispatchResult<Completion<StatusCode>> {
        self.engine.request(
            None,
            1,
            "delete_node",
            |backend, tag| backend.delete_node(tag, node_id, delete_target_references),
            |request_id, events| {
                expect_single(request_id, events, |event| match event {
                    BackendEvent::NodeDeleted { status, .. } => Ok(status),
                    other => Err(other),
                })
            },
        )
    }

    /// Adds a reference.
    pub fn add_reference(&self, item: AddReferenceItem) -> DispatchResult<Completion<StatusCode>> {
        self.engine.request(
            None,
            1,
            "add_reference",
            |backend, tag| backend.add_reference(tag, item),
            |request_id, events| {
                expect_single(request_id, events, |event| match event {
                    BackendEvent::ReferenceAdded { status, .. } => Ok(status),
                    other => Err(other),
                })
            },
        )
    }

    /// Deletes a reference.
    pub fn delete_reference(&self, item: DeleteReferenceItem) -> DispatchResult<Completion<StatusCode>> {
        self.engine.request(
            None,
            1,
            "delete_reference",
            |backend, tag| backend.delete_reference(tag, item),
            |request_id, events| {
                expect_single(request_id, events, |event| match event {
                    BackendEvent::ReferenceDeleted { status, .. } => Ok(status),
                    other => Err(other),
                })
            },
        )
    }

    // =========================================================================
    // Observability
    // =========================================================================

    /// Connection-level events: state changes, connection errors and
    /// completions of requests not issued by a node.
    pub fn events(&self) -> EventStream {
        self.engine.events()
    }

    /// Engine counters.
    pub fn stats(&self) -> EngineStatsSnapshot {
        self.engine.stats().snapshot()
    }

    /// Number of nodes with a registered handle.
    pub fn registered_nodes(&self) -> usize {
        self.engine.registered_handles()
    }
}

fn prepare_write(mut item: WriteItem) -> UaResult<WriteItem> {
    if item.value_type.is_none() {
        item.value_type = attribute_type(item.attribute);
    }
    item.value = item.typed_value()?;
    Ok(item)
}

impl NamespaceSource for Connection {
    fn namespace_array(&self) -> Arc<NamespaceArray> {
        self.engine.namespaces()
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("name", &self.name)
            .field("backend", &self.backend_name())
            .field("state", &self.state())
            .field("endpoint", &self.endpoint().map(|e| e.endpoint_url))
            .finish()
    }
}

// =============================================================================
// ConnectionRegistry
// =============================================================================

/// Named connections with one marked current.
///
/// The first connection inserted becomes current.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<String, Arc<Connection>>>,
    current: RwLock<Option<String>>,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a connection under its name, replacing and returning any
    /// previous one.
    pub fn insert(&self, connection: Arc<Connection>) -> Option<Arc<Connection>> {
        let name = connection.name().to_string();
        let previous = self.connections.write().insert(name.clone(), connection);
        let mut current = self.current.write();
        if current.is_none() {
            *current = Some(name);
        }
        previous
    }

    /// Returns a connection by name.
    pub fn get(&self, name: &str) -> Option<Arc<Connection>> {
        self.connections.read().get(name).cloned()
    }

    /// Removes a connection; clears the current slot if it pointed there.
    pub fn remove(&self, name: &str) -> Option<Arc<Connection>> {
        let removed = self.connections.write().remove(name);
        let mut current = self.current.write();
        if current.as_deref() == Some(name) {
            *current = None;
        }
        removed
    }

    /// Marks `name` as current.
    ///
    /// # Errors
    ///
    /// Returns `NotConnected` naming nothing if no such connection exists.
    pub fn set_current(&self, name: &str) -> UaResult<()> {
        if !self.connections.read().contains_key(name) {
            return Err(ConnectionError::backend_unavailable(name).into());
        }
        *self.current.write() = Some(name.to_string());
        Ok(())
    }

    /// Returns the current connection.
    pub fn current(&self) -> Option<Arc<Connection>> {
        let current = self.current.read().clone()?;
        self.get(&current)
    }

    /// Returns the registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.connections.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    /// Returns `true` if no connection is registered.
    pub fn is_empty(&self) -> bool {
        self.connections.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SimulatedBackend;
    use crate::types::{Attribute, MessageSecurityMode};

    fn simulated(name: &str) -> Arc<Connection> {
        Arc::new(Connection::with_name(name, Arc::new(SimulatedBackend::new())))
    }

    #[test]
    fn test_from_name() {
        let connection = Connection::from_name("simulated").unwrap();
        assert_eq!(connection.backend_name(), "simulated");
        assert_eq!(connection.name(), DEFAULT_CONNECTION_NAME);
        assert!(Connection::from_name("profibus").is_err());
    }

    #[tokio::test]
    async fn test_connect_refreshes_namespaces() {
        let connection = simulated("plant");
        connection.connect_url("opc.tcp://localhost:4840").await.unwrap();
        assert!(connection.is_connected());
        let namespaces = connection.namespace_array();
        assert_eq!(namespaces.index_of("urn:uanode:demo"), Some(2));

        let node = connection
            .node_from(&UniversalNode::with_namespace_name("urn:uanode:demo", "s=Demo.Counter"))
            .unwrap();
        assert_eq!(node.node_id(), &NodeId::string(2, "Demo.Counter"));

        let unknown = connection.node_from(&UniversalNode::with_namespace_name("urn:missing", "s=X"));
        assert!(unknown.is_err());
    }

    #[tokio::test]
    async fn test_connect_rejects_invalid_endpoint() {
        let connection = simulated("plant");
        let endpoint = EndpointDescription::new("opc.tcp://localhost:4840")
            .with_security_mode(MessageSecurityMode::Invalid);
        let err = connection.connect(endpoint).await.unwrap_err();
        assert!(err.to_string().contains("security mode"));
        assert_eq!(connection.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_double_connect_rejected() {
        let connection = simulated("plant");
        connection.connect_url("opc.tcp://localhost:4840").await.unwrap();
        assert!(connection.connect_url("opc.tcp://localhost:4840").await.is_err());
        connection.disconnect().await.unwrap();
        assert!(!connection.is_connected());
        connection.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_bulk_write_converts_fixed_types() {
        let connection = simulated("plant");
        connection.connect_url("opc.tcp://localhost:4840").await.unwrap();
        let results = connection
            .write_node_attributes(vec![
                WriteItem::new(NodeId::string(2, "Demo.Counter"), Attribute::DisplayName, "Counter A"),
                WriteItem::value(NodeId::string(2, "Demo.Pressure"), 2.0),
            ])
            .unwrap()
            .await
            .unwrap();
        assert_eq!(results[0].status, StatusCode::GOOD);
        assert_eq!(results[1].status, StatusCode::BAD_NOT_WRITABLE);
    }

    #[test]
    fn test_registry_current() {
        let registry = ConnectionRegistry::new();
        assert!(registry.current().is_none());
        registry.insert(simulated("a"));
        registry.insert(simulated("b"));
        assert_eq!(registry.current().unwrap().name(), "a");

        registry.set_current("b").unwrap();
        assert_eq!(registry.current().unwrap().name(), "b");
        assert!(registry.set_current("c").is_err());

        registry.remove("b");
        assert!(registry.current().is_none());
        assert_eq!(registry.names(), vec!["a".to_string()]);
    }
}
