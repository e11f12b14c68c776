// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Simulated Backend
//!
//! An in-process OPC UA server over an [`AddressSpace`].
//!
//! Requests are queued on a single worker task and answered in FIFO
//! order, so completions arrive asynchronously exactly as they would from
//! a live server. Subscriptions, monitored items, data change filters and
//! event filters are evaluated here.
//!
//! ## Test Hooks
//!
//! - [`SimulatedBackend::set_value`] changes a value and publishes data
//!   changes to every matching monitored item
//! - [`SimulatedBackend::raise_event`] fires an event at a source node
//! - [`SimulatedBackend::drop_connection`] simulates a lost connection
//! - Failure flags and interaction counters for verification

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use super::address_space::{AddressSpace, SIMULATION_NAMESPACE};
use super::{
    revise_publishing_interval, verify_endpoint_description, Backend, BackendEvent, EventSink, Handle,
    MonitoringChange, MonitoringRequest, RequestTag,
};
use crate::error::{BackendError, ConnectionError, DispatchError, DispatchResult, UaResult};
use crate::filter::{DeadbandType, EventFields, MonitoringFilter, SimpleAttributeOperand};
use crate::monitoring::{MonitoringParameters, SubscriptionSettings};
use crate::services::{
    AddNodeItem, AddReferenceItem, BrowseRequest, DeleteReferenceItem, HistoryReadRawRequest, ReadItem, ReadResult,
    RelativePathElement, TypedArgument, WriteItem, WriteResult,
};
use crate::status::StatusCode;
use crate::types::{
    ApplicationDescription, ApplicationType, Attribute, AttributeMask, ConnectionState, DataValue,
    EndpointDescription, LocalizedText, MessageSecurityMode, NodeClass, NodeId, Variant,
};

/// Default lower bound for publishing intervals, in milliseconds.
pub const DEFAULT_MIN_PUBLISHING_INTERVAL: f64 = 50.0;

/// Default cap on monitored items per subscription.
pub const DEFAULT_MAX_MONITORED_ITEMS: usize = 1000;

const SECURITY_POLICY_BASIC256SHA256: &str = "http://opcfoundation.org/UA/SecurityPolicy#Basic256Sha256";

type Job = Box<dyn FnOnce(&Shared, &EventSink) + Send>;

// =============================================================================
// Simulated server state
// =============================================================================

#[derive(Debug)]
struct SimulatedItem {
    handle: Handle,
    node_id: NodeId,
    attribute: Attribute,
    parameters: MonitoringParameters,
    last: Option<DataValue>,
}

#[derive(Debug)]
struct SimulatedSubscription {
    settings: SubscriptionSettings,
    items: HashMap<u32, SimulatedItem>,
}

/// State shared between the backend handle and its worker task.
#[derive(Debug)]
struct Shared {
    space: RwLock<AddressSpace>,
    subscriptions: Mutex<HashMap<u32, SimulatedSubscription>>,
    next_subscription_id: AtomicU32,
    next_item_id: AtomicU32,
    min_publishing_interval: f64,
    max_monitored_items: usize,
    notification_count: AtomicU64,
}

struct Worker {
    jobs: mpsc::UnboundedSender<Job>,
    task: JoinHandle<()>,
    sink: EventSink,
    endpoint: String,
}

// =============================================================================
// SimulatedEvent
// =============================================================================

/// An event raised through [`SimulatedBackend::raise_event`].
///
/// Fields are keyed by their browse path, e.g. `Severity` or `Message`.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedEvent {
    event_type: NodeId,
    fields: HashMap<String, Variant>,
    type_chain: Vec<NodeId>,
}

impl SimulatedEvent {
    /// Creates an event of `event_type` with the standard base event fields.
    pub fn new(event_type: NodeId, source_name: &str, message: &str, severity: u16) -> Self {
        let now = Utc::now();
        let mut fields = HashMap::new();
        fields.insert(
            "EventId".to_string(),
            Variant::ByteString(Uuid::new_v4().as_bytes().to_vec()),
        );
        fields.insert("EventType".to_string(), Variant::NodeId(event_type.clone()));
        fields.insert("SourceName".to_string(), Variant::from(source_name));
        fields.insert("Time".to_string(), Variant::DateTime(now));
        fields.insert("ReceiveTime".to_string(), Variant::DateTime(now));
        fields.insert(
            "Message".to_string(),
            Variant::LocalizedText(LocalizedText::new("", message)),
        );
        fields.insert("Severity".to_string(), Variant::UInt16(severity));
        Self {
            type_chain: vec![event_type.clone()],
            event_type,
            fields,
        }
    }

    /// Adds or replaces a field.
    pub fn with_field(mut self, name: &str, value: impl Into<Variant>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    /// Returns the event type.
    pub fn event_type(&self) -> &NodeId {
        &self.event_type
    }

    /// Returns a field by name.
    pub fn get(&self, name: &str) -> Option<&Variant> {
        self.fields.get(name)
    }
}

impl EventFields for SimulatedEvent {
    fn field(&self, operand: &SimpleAttributeOperand) -> Option<Variant> {
        self.fields.get(&operand.path_string()).cloned()
    }

    fn is_of_type(&self, type_id: &NodeId) -> bool {
        self.type_chain.contains(type_id)
    }
}

// =============================================================================
// SimulatedBackend
// =============================================================================

/// In-memory backend serving an [`AddressSpace`].
pub struct SimulatedBackend {
    shared: Arc<Shared>,
    worker: Mutex<Option<Worker>>,
    state: AtomicU8,

    /// Force connects to fail.
    fail_connection: AtomicBool,

    /// Refuse every dispatch.
    reject_requests: AtomicBool,

    connect_count: AtomicU64,
    disconnect_count: AtomicU64,
    request_count: AtomicU64,
}

impl Default for SimulatedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedBackend {
    /// Creates a backend serving the demo address space.
    pub fn new() -> Self {
        Self::with_address_space(AddressSpace::demo())
    }

    /// Creates a backend serving `space`.
    pub fn with_address_space(space: AddressSpace) -> Self {
        Self {
            shared: Arc::new(Shared {
                space: RwLock::new(space),
                subscriptions: Mutex::new(HashMap::new()),
                next_subscription_id: AtomicU32::new(1),
                next_item_id: AtomicU32::new(1),
                min_publishing_interval: DEFAULT_MIN_PUBLISHING_INTERVAL,
                max_monitored_items: DEFAULT_MAX_MONITORED_ITEMS,
                notification_count: AtomicU64::new(0),
            }),
            worker: Mutex::new(None),
            state: AtomicU8::new(ConnectionState::Disconnected.as_u8()),
            fail_connection: AtomicBool::new(false),
            reject_requests: AtomicBool::new(false),
            connect_count: AtomicU64::new(0),
            disconnect_count: AtomicU64::new(0),
            request_count: AtomicU64::new(0),
        }
    }

    /// Sets the minimum publishing interval subscriptions are revised to.
    ///
    /// Must be called before the backend is shared.
    pub fn with_min_publishing_interval(mut self, interval: f64) -> Self {
        if let Some(shared) = Arc::get_mut(&mut self.shared) {
            shared.min_publishing_interval = interval;
        }
        self
    }

    /// Sets the per-subscription monitored item cap.
    ///
    /// Must be called before the backend is shared.
    pub fn with_max_monitored_items(mut self, max: usize) -> Self {
        if let Some(shared) = Arc::get_mut(&mut self.shared) {
            shared.max_monitored_items = max;
        }
        self
    }

    // =========================================================================
    // Test hooks
    // =========================================================================

    /// Replaces a variable's value and publishes the change.
    ///
    /// # Errors
    ///
    /// Fails if the node is unknown or not a variable.
    pub fn set_value(&self, node_id: &NodeId, value: impl Into<Variant>) -> UaResult<()> {
        self.set_data_value(node_id, DataValue::new(value))
    }

    /// Replaces a variable's data value and publishes the change.
    ///
    /// # Errors
    ///
    /// Fails if the node is unknown or not a variable.
    pub fn set_data_value(&self, node_id: &NodeId, value: DataValue) -> UaResult<()> {
        self.shared
            .space
            .write()
            .set_value(node_id, value)
            .map_err(|status| BackendError::status("set_value", status))?;
        if let Some(sink) = self.sink() {
            self.shared.publish(&sink, node_id, Attribute::Value);
        }
        Ok(())
    }

    /// Returns the current value of a variable.
    pub fn value(&self, node_id: &NodeId) -> Option<DataValue> {
        let value = self.shared.space.read().read(node_id, Attribute::Value, None);
        value.is_good().then_some(value)
    }

    /// Raises an event at `source`; returns the number of notifications sent.
    ///
    /// Event items on `source` and on the Server object receive it when
    /// their filter admits it.
    pub fn raise_event(&self, source: &NodeId, event: SimulatedEvent) -> usize {
        let Some(sink) = self.sink() else {
            return 0;
        };
        let mut event = event.with_field("SourceNode", source.clone());
        event.type_chain = self.shared.space.read().type_chain(&event.event_type);
        self.shared.publish_event(&sink, source, &event)
    }

    /// Gives direct access to the address space.
    pub fn with_space<R>(&self, f: impl FnOnce(&mut AddressSpace) -> R) -> R {
        f(&mut self.shared.space.write())
    }

    /// Drops the connection as if the server went away.
    ///
    /// Server-side subscriptions are lost. Returns `false` if not connected.
    pub fn drop_connection(&self) -> bool {
        let Some(worker) = self.worker.lock().take() else {
            return false;
        };
        worker.task.abort();
        self.shared.subscriptions.lock().clear();
        self.set_state(ConnectionState::Disconnected);
        warn!(endpoint = %worker.endpoint, "Simulated connection lost");
        worker.sink.emit(BackendEvent::ConnectionError {
            status: StatusCode::BAD_CONNECTION_CLOSED,
            message: "simulated connection loss".to_string(),
        });
        worker.sink.emit(BackendEvent::StateChanged {
            state: ConnectionState::Disconnected,
        });
        true
    }

    /// Makes subsequent connects fail.
    pub fn set_fail_connection(&self, fail: bool) {
        self.fail_connection.store(fail, Ordering::SeqCst);
    }

    /// Makes subsequent dispatches fail synchronously.
    pub fn set_reject_requests(&self, reject: bool) {
        self.reject_requests.store(reject, Ordering::SeqCst);
    }

    /// Number of connect attempts.
    pub fn connect_count(&self) -> u64 {
        self.connect_count.load(Ordering::SeqCst)
    }

    /// Number of disconnects.
    pub fn disconnect_count(&self) -> u64 {
        self.disconnect_count.load(Ordering::SeqCst)
    }

    /// Number of accepted requests.
    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Number of notifications emitted.
    pub fn notification_count(&self) -> u64 {
        self.shared.notification_count.load(Ordering::SeqCst)
    }

    /// Number of live server-side subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.shared.subscriptions.lock().len()
    }

    /// Number of live monitored items across all subscriptions.
    pub fn monitored_item_count(&self) -> usize {
        self.shared.subscriptions.lock().values().map(|s| s.items.len()).sum()
    }

    /// Revised settings of a server-side subscription.
    pub fn subscription_settings(&self, subscription_id: u32) -> Option<SubscriptionSettings> {
        self.shared
            .subscriptions
            .lock()
            .get(&subscription_id)
            .map(|s| s.settings.clone())
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn set_state(&self, state: ConnectionState) {
        self.state.store(state.as_u8(), Ordering::SeqCst);
    }

    fn sink(&self) -> Option<EventSink> {
        self.worker.lock().as_ref().map(|worker| worker.sink.clone())
    }

    /// Queues `job` on the worker.
    fn submit<F>(&self, operation: &'static str, job: F) -> DispatchResult<()>
    where
        F: FnOnce(&Shared, &EventSink) + Send + 'static,
    {
        if self.reject_requests.load(Ordering::SeqCst) {
            return Err(DispatchError::rejected(operation, "requests are rejected by the simulated server").into());
        }
        let worker = self.worker.lock();
        let Some(worker) = worker.as_ref() else {
            return Err(DispatchError::NotConnected.into());
        };
        worker
            .jobs
            .send(Box::new(job))
            .map_err(|_| DispatchError::NotConnected)?;
        self.request_count.fetch_add(1, Ordering::SeqCst);
        trace!(operation, "Simulated request queued");
        Ok(())
    }
}

impl std::fmt::Debug for SimulatedBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedBackend")
            .field("state", &self.state())
            .field("subscriptions", &self.subscription_count())
            .field("requests", &self.request_count())
            .finish()
    }
}

impl Drop for SimulatedBackend {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.get_mut().take() {
            worker.task.abort();
        }
    }
}

// =============================================================================
// Service logic
// =============================================================================

impl Shared {
    fn read_result(&self, item: &ReadItem) -> ReadResult {
        let value = self
            .space
            .read()
            .read(&item.node_id, item.attribute, item.index_range.as_deref());
        ReadResult::from_data_value(item, value)
    }

    fn write_result(&self, sink: &EventSink, item: &WriteItem) -> WriteResult {
        let status = self.space.write().write(item);
        if status.is_good() {
            self.publish(sink, &item.node_id, item.attribute);
        }
        WriteResult::new(item, status)
    }

    fn revise_settings(&self, settings: &SubscriptionSettings) -> SubscriptionSettings {
        let mut revised = settings.clone();
        revised.publishing_interval =
            revise_publishing_interval(settings.publishing_interval, self.min_publishing_interval);
        revised.max_keep_alive_count = revised.max_keep_alive_count.max(1);
        revised.lifetime_count = revised.lifetime_count.max(revised.max_keep_alive_count.saturating_mul(3));
        revised
    }

    fn check_filter(&self, node_id: &NodeId, attribute: Attribute, filter: &MonitoringFilter) -> StatusCode {
        let space = self.space.read();
        let Some(node) = space.node(node_id) else {
            return StatusCode::BAD_NODE_ID_UNKNOWN;
        };
        match (attribute, filter) {
            (Attribute::EventNotifier, MonitoringFilter::Event(filter)) => {
                if node.node_class != NodeClass::Object && node.node_class != NodeClass::View {
                    return StatusCode::BAD_ATTRIBUTE_ID_INVALID;
                }
                if filter.validate().is_err() {
                    return StatusCode::BAD_MONITORED_ITEM_FILTER_INVALID;
                }
                StatusCode::GOOD
            }
            (Attribute::EventNotifier, _) | (_, MonitoringFilter::Event(_)) => StatusCode::BAD_FILTER_NOT_ALLOWED,
            (Attribute::Value, MonitoringFilter::DataChange(filter)) => {
                if filter.validate().is_err() {
                    return StatusCode::BAD_DEADBAND_FILTER_INVALID;
                }
                if filter.deadband_type == DeadbandType::Percent && node.eu_range.is_none() {
                    return StatusCode::BAD_DEADBAND_FILTER_INVALID;
                }
                node.read(attribute, None).status
            }
            (_, MonitoringFilter::DataChange(_)) => StatusCode::BAD_FILTER_NOT_ALLOWED,
            (_, MonitoringFilter::None) => node.read(attribute, None).status,
        }
    }

    fn revise_parameters(&self, settings: &SubscriptionSettings, parameters: &MonitoringParameters) -> MonitoringParameters {
        let mut revised = parameters.clone();
        if revised.sampling_interval < 0.0 {
            revised.sampling_interval = settings.publishing_interval;
        }
        revised.queue_size = revised.queue_size.max(1);
        revised.publishing_interval = settings.publishing_interval;
        revised
    }

    fn enable(&self, sink: &EventSink, tag: RequestTag, subscription_id: u32, requests: Vec<MonitoringRequest>) {
        let handle = tag.handle.unwrap_or_default();
        let mut initial = Vec::new();
        for request in requests {
            let (parameters, status) = self.enable_one(handle, subscription_id, &request);
            if status.is_good() && request.attribute != Attribute::EventNotifier {
                initial.push(request.attribute);
            }
            sink.complete(
                tag,
                BackendEvent::MonitoringStatusChanged {
                    subscription_id,
                    attribute: request.attribute,
                    change: MonitoringChange::Enabled,
                    parameters,
                    status,
                },
            );
            trace!(handle, subscription_id, attribute = %request.attribute, status = %status, "Simulated item enabled");
        }

        // Initial values follow the acknowledgements.
        let space = self.space.read();
        let mut subscriptions = self.subscriptions.lock();
        let Some(subscription) = subscriptions.get_mut(&subscription_id) else {
            return;
        };
        for item in subscription
            .items
            .values_mut()
            .filter(|item| item.handle == handle && item.last.is_none() && initial.contains(&item.attribute))
        {
            if !item.parameters.monitoring_mode.is_reporting() {
                continue;
            }
            let value = space.read(&item.node_id, item.attribute, item.parameters.index_range.as_deref());
            item.last = Some(value.clone());
            self.notification_count.fetch_add(1, Ordering::SeqCst);
            sink.notify(
                handle,
                BackendEvent::DataChangeOccurred {
                    subscription_id,
                    attribute: item.attribute,
                    value,
                },
            );
        }
    }

    fn enable_one(
        &self,
        handle: Handle,
        subscription_id: u32,
        request: &MonitoringRequest,
    ) -> (MonitoringParameters, StatusCode) {
        let status = self.check_filter(&request.node_id, request.attribute, &request.parameters.filter);
        let mut subscriptions = self.subscriptions.lock();
        let Some(subscription) = subscriptions.get_mut(&subscription_id) else {
            return (request.parameters.clone(), StatusCode::BAD_SUBSCRIPTION_ID_INVALID);
        };
        if !status.is_good() {
            return (request.parameters.clone(), status);
        }
        if subscription.items.len() >= self.max_monitored_items {
            return (request.parameters.clone(), StatusCode::BAD_TOO_MANY_MONITORED_ITEMS);
        }

        let mut parameters = self.revise_parameters(&subscription.settings, &request.parameters);
        let item_id = self.next_item_id.fetch_add(1, Ordering::SeqCst);
        parameters.monitored_item_id = item_id;
        subscription.items.insert(
            item_id,
            SimulatedItem {
                handle,
                node_id: request.node_id.clone(),
                attribute: request.attribute,
                parameters: parameters.clone(),
                last: None,
            },
        );
        (parameters, StatusCode::GOOD)
    }

    fn disable(&self, sink: &EventSink, tag: RequestTag, subscription_id: u32, items: Vec<(Attribute, u32)>) {
        for (attribute, item_id) in items {
            let removed = {
                let mut subscriptions = self.subscriptions.lock();
                match subscriptions.get_mut(&subscription_id) {
                    None => Err(StatusCode::BAD_SUBSCRIPTION_ID_INVALID),
                    Some(subscription) => subscription
                        .items
                        .remove(&item_id)
                        .map(|item| item.parameters)
                        .ok_or(StatusCode::BAD_MONITORED_ITEM_ID_INVALID),
                }
            };
            let (parameters, status) = match removed {
                Ok(parameters) => (parameters, StatusCode::GOOD),
                Err(status) => (
                    MonitoringParameters {
                        monitored_item_id: item_id,
                        ..MonitoringParameters::default()
                    },
                    status,
                ),
            };
            sink.complete(
                tag,
                BackendEvent::MonitoringStatusChanged {
                    subscription_id,
                    attribute,
                    change: MonitoringChange::Disabled,
                    parameters,
                    status,
                },
            );
        }
    }

    fn modify_item(
        &self,
        subscription_id: u32,
        attribute: Attribute,
        parameters: &MonitoringParameters,
    ) -> (MonitoringParameters, StatusCode) {
        let node_id = {
            let subscriptions = self.subscriptions.lock();
            let Some(subscription) = subscriptions.get(&subscription_id) else {
                return (parameters.clone(), StatusCode::BAD_SUBSCRIPTION_ID_INVALID);
            };
            match subscription.items.get(&parameters.monitored_item_id) {
                Some(item) if item.attribute == attribute => item.node_id.clone(),
                _ => return (parameters.clone(), StatusCode::BAD_MONITORED_ITEM_ID_INVALID),
            }
        };
        let status = self.check_filter(&node_id, attribute, &parameters.filter);
        if !status.is_good() {
            return (parameters.clone(), status);
        }

        let mut subscriptions = self.subscriptions.lock();
        let Some(subscription) = subscriptions.get_mut(&subscription_id) else {
            return (parameters.clone(), StatusCode::BAD_SUBSCRIPTION_ID_INVALID);
        };
        let revised = self.revise_parameters(&subscription.settings, parameters);
        match subscription.items.get_mut(&parameters.monitored_item_id) {
            Some(item) => {
                item.parameters = revised.clone();
                (revised, StatusCode::GOOD)
            }
            None => (parameters.clone(), StatusCode::BAD_MONITORED_ITEM_ID_INVALID),
        }
    }

    /// Publishes the current value of `node_id.attribute` to matching items.
    fn publish(&self, sink: &EventSink, node_id: &NodeId, attribute: Attribute) {
        let space = self.space.read();
        let eu_range = space.eu_range(node_id);
        let mut subscriptions = self.subscriptions.lock();
        for (subscription_id, subscription) in subscriptions.iter_mut() {
            if !subscription.settings.publishing_enabled {
                continue;
            }
            for item in subscription
                .items
                .values_mut()
                .filter(|item| item.attribute == attribute && &item.node_id == node_id)
            {
                if !item.parameters.monitoring_mode.is_reporting() {
                    continue;
                }
                let value = space.read(node_id, attribute, item.parameters.index_range.as_deref());
                let passes = match item.parameters.filter.as_data_change() {
                    Some(filter) => filter.passes(item.last.as_ref(), &value, eu_range),
                    None => item
                        .last
                        .as_ref()
                        .map_or(true, |last| last.value != value.value || last.status != value.status),
                };
                if !passes {
                    continue;
                }
                item.last = Some(value.clone());
                self.notification_count.fetch_add(1, Ordering::SeqCst);
                sink.notify(
                    item.handle,
                    BackendEvent::DataChangeOccurred {
                        subscription_id: *subscription_id,
                        attribute,
                        value,
                    },
                );
            }
        }
    }

    fn publish_event(&self, sink: &EventSink, source: &NodeId, event: &SimulatedEvent) -> usize {
        let mut sent = 0;
        let subscriptions = self.subscriptions.lock();
        for (subscription_id, subscription) in subscriptions.iter() {
            if !subscription.settings.publishing_enabled {
                continue;
            }
            for item in subscription.items.values().filter(|item| {
                item.attribute == Attribute::EventNotifier
                    && (&item.node_id == source || item.node_id == NodeId::SERVER)
                    && item.parameters.monitoring_mode.is_reporting()
            }) {
                let Some(filter) = item.parameters.filter.as_event() else {
                    continue;
                };
                let Some(fields) = filter.apply(event) else {
                    continue;
                };
                sent += 1;
                self.notification_count.fetch_add(1, Ordering::SeqCst);
                sink.notify(
                    item.handle,
                    BackendEvent::EventOccurred {
                        subscription_id: *subscription_id,
                        fields,
                    },
                );
            }
        }
        debug!(source = %source, event_type = %event.event_type, notifications = sent, "Simulated event raised");
        sent
    }
}

fn simulated_endpoints(url: &str) -> Vec<EndpointDescription> {
    let server = simulated_server(url);
    let mut endpoints = vec![
        EndpointDescription::new(url),
        EndpointDescription::new(url)
            .with_security_policy(SECURITY_POLICY_BASIC256SHA256)
            .with_security_mode(MessageSecurityMode::Sign),
        EndpointDescription::new(url)
            .with_security_policy(SECURITY_POLICY_BASIC256SHA256)
            .with_security_mode(MessageSecurityMode::SignAndEncrypt),
    ];
    for (level, endpoint) in endpoints.iter_mut().enumerate() {
        endpoint.security_level = level as u8;
        endpoint.server = server.clone();
    }
    endpoints
}

fn simulated_server(url: &str) -> ApplicationDescription {
    ApplicationDescription {
        application_uri: SIMULATION_NAMESPACE.to_string(),
        product_uri: "urn:uanode".to_string(),
        application_name: LocalizedText::new("en", "UaNode Simulated Server"),
        application_type: ApplicationType::Server,
        discovery_urls: vec![url.to_string()],
    }
}

// =============================================================================
// Backend implementation
// =============================================================================

#[async_trait]
impl Backend for SimulatedBackend {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    async fn connect(&self, endpoint: &EndpointDescription, sink: EventSink) -> UaResult<()> {
        self.connect_count.fetch_add(1, Ordering::SeqCst);
        verify_endpoint_description(endpoint)?;
        if let Some(worker) = self.worker.lock().as_ref() {
            return Err(ConnectionError::AlreadyConnected {
                endpoint: worker.endpoint.clone(),
            }
            .into());
        }
        if self.fail_connection.load(Ordering::SeqCst) {
            warn!(endpoint = %endpoint.endpoint_url, "Simulated connection failure");
            return Err(ConnectionError::refused(&endpoint.endpoint_url, "simulated connection failure").into());
        }
        self.set_state(ConnectionState::Connecting);

        // A new session starts without server-side subscriptions.
        self.shared.subscriptions.lock().clear();

        let (jobs, mut rx) = mpsc::unbounded_channel::<Job>();
        let shared = Arc::clone(&self.shared);
        let worker_sink = sink.clone();
        let task = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                job(&shared, &worker_sink);
            }
            trace!("Simulated worker stopped");
        });

        *self.worker.lock() = Some(Worker {
            jobs,
            task,
            sink: sink.clone(),
            endpoint: endpoint.endpoint_url.clone(),
        });
        self.set_state(ConnectionState::Connected);
        sink.emit(BackendEvent::StateChanged {
            state: ConnectionState::Connected,
        });
        info!(endpoint = %endpoint.endpoint_url, "Simulated backend connected");
        Ok(())
    }

    async fn disconnect(&self) -> UaResult<()> {
        let Some(worker) = self.worker.lock().take() else {
            return Ok(());
        };
        self.set_state(ConnectionState::Closing);
        worker.task.abort();
        self.shared.subscriptions.lock().clear();
        self.disconnect_count.fetch_add(1, Ordering::SeqCst);
        self.set_state(ConnectionState::Disconnected);
        worker.sink.emit(BackendEvent::StateChanged {
            state: ConnectionState::Disconnected,
        });
        info!(endpoint = %worker.endpoint, "Simulated backend disconnected");
        Ok(())
    }

    fn read_attributes(
        &self,
        tag: RequestTag,
        node_id: &NodeId,
        mask: AttributeMask,
        index_range: Option<&str>,
    ) -> DispatchResult<()> {
        let node_id = node_id.clone();
        let index_range = index_range.map(str::to_string);
        self.submit("read_attributes", move |shared, sink| {
            let results = mask
                .iter()
                .map(|attribute| {
                    let mut item = ReadItem::new(node_id.clone(), attribute);
                    item.index_range = index_range.clone();
                    shared.read_result(&item)
                })
                .collect();
            sink.complete(
                tag,
                BackendEvent::AttributesRead {
                    results,
                    status: StatusCode::GOOD,
                },
            );
        })
    }

    fn write_attributes(&self, tag: RequestTag, items: Vec<WriteItem>) -> DispatchResult<()> {
        self.submit("write_attributes", move |shared, sink| {
            let results = items.iter().map(|item| shared.write_result(sink, item)).collect();
            sink.complete(
                tag,
                BackendEvent::AttributesWritten {
                    results,
                    status: StatusCode::GOOD,
                },
            );
        })
    }

    fn read_node_attributes(&self, tag: RequestTag, items: Vec<ReadItem>) -> DispatchResult<()> {
        self.submit("read_node_attributes", move |shared, sink| {
            let results = items.iter().map(|item| shared.read_result(item)).collect();
            sink.complete(
                tag,
                BackendEvent::BulkReadFinished {
                    results,
                    status: StatusCode::GOOD,
                },
            );
        })
    }

    fn write_node_attributes(&self, tag: RequestTag, items: Vec<WriteItem>) -> DispatchResult<()> {
        self.submit("write_node_attributes", move |shared, sink| {
            let results = items.iter().map(|item| shared.write_result(sink, item)).collect();
            sink.complete(
                tag,
                BackendEvent::BulkWriteFinished {
                    results,
                    status: StatusCode::GOOD,
                },
            );
        })
    }

    fn create_subscription(&self, tag: RequestTag, settings: &SubscriptionSettings) -> DispatchResult<()> {
        let settings = settings.clone();
        self.submit("create_subscription", move |shared, sink| {
            if settings.validate().is_err() {
                sink.complete(
                    tag,
                    BackendEvent::SubscriptionCreated {
                        subscription_id: 0,
                        settings,
                        status: StatusCode::BAD_INVALID_ARGUMENT,
                    },
                );
                return;
            }
            let revised = shared.revise_settings(&settings);
            let subscription_id = shared.next_subscription_id.fetch_add(1, Ordering::SeqCst);
            shared.subscriptions.lock().insert(
                subscription_id,
                SimulatedSubscription {
                    settings: revised.clone(),
                    items: HashMap::new(),
                },
            );
            debug!(
                subscription_id,
                requested = settings.publishing_interval,
                revised = revised.publishing_interval,
                "Simulated subscription created"
            );
            sink.complete(
                tag,
                BackendEvent::SubscriptionCreated {
                    subscription_id,
                    settings: revised,
                    status: StatusCode::GOOD,
                },
            );
        })
    }

    fn modify_subscription(
        &self,
        tag: RequestTag,
        subscription_id: u32,
        settings: &SubscriptionSettings,
    ) -> DispatchResult<()> {
        let settings = settings.clone();
        self.submit("modify_subscription", move |shared, sink| {
            let revised = shared.revise_settings(&settings);
            let status = match shared.subscriptions.lock().get_mut(&subscription_id) {
                Some(subscription) => {
                    subscription.settings = revised.clone();
                    for item in subscription.items.values_mut() {
                        item.parameters.publishing_interval = revised.publishing_interval;
                    }
                    StatusCode::GOOD
                }
                None => StatusCode::BAD_SUBSCRIPTION_ID_INVALID,
            };
            sink.complete(
                tag,
                BackendEvent::SubscriptionModified {
                    subscription_id,
                    settings: revised,
                    status,
                },
            );
        })
    }

    fn delete_subscription(&self, tag: RequestTag, subscription_id: u32) -> DispatchResult<()> {
        self.submit("delete_subscription", move |shared, sink| {
            let status = match shared.subscriptions.lock().remove(&subscription_id) {
                Some(_) => StatusCode::GOOD,
                None => StatusCode::BAD_SUBSCRIPTION_ID_INVALID,
            };
            sink.complete(tag, BackendEvent::SubscriptionDeleted { subscription_id, status });
        })
    }

    fn enable_monitoring(
        &self,
        tag: RequestTag,
        subscription_id: u32,
        requests: Vec<MonitoringRequest>,
    ) -> DispatchResult<()> {
        self.submit("enable_monitoring", move |shared, sink| {
            shared.enable(sink, tag, subscription_id, requests);
        })
    }

    fn disable_monitoring(
        &self,
        tag: RequestTag,
        subscription_id: u32,
        items: Vec<(Attribute, u32)>,
    ) -> DispatchResult<()> {
        self.submit("disable_monitoring", move |shared, sink| {
            shared.disable(sink, tag, subscription_id, items);
        })
    }

    fn modify_monitoring(
        &self,
        tag: RequestTag,
        subscription_id: u32,
        attribute: Attribute,
        parameters: &MonitoringParameters,
    ) -> DispatchResult<()> {
        let parameters = parameters.clone();
        self.submit("modify_monitoring", move |shared, sink| {
            let (parameters, status) = shared.modify_item(subscription_id, attribute, &parameters);
            sink.complete(
                tag,
                BackendEvent::MonitoringParametersChanged {
                    subscription_id,
                    attribute,
                    parameters,
                    status,
                },
            );
        })
    }

    fn browse(&self, tag: RequestTag, node_id: &NodeId, request: &BrowseRequest) -> DispatchResult<()> {
        let node_id = node_id.clone();
        let request = request.clone();
        self.submit("browse", move |shared, sink| {
            let (references, status) = match shared.space.read().browse(&node_id, &request) {
                Ok(references) => (references, StatusCode::GOOD),
                Err(status) => (Vec::new(), status),
            };
            sink.complete(tag, BackendEvent::BrowseFinished { references, status });
        })
    }

    fn translate_browse_path(
        &self,
        tag: RequestTag,
        node_id: &NodeId,
        path: &[RelativePathElement],
    ) -> DispatchResult<()> {
        let node_id = node_id.clone();
        let path = path.to_vec();
        self.submit("translate_browse_path", move |shared, sink| {
            let (targets, status) = match shared.space.read().translate(&node_id, &path) {
                Ok(targets) if targets.is_empty() => (targets, StatusCode::BAD_NO_MATCH),
                Ok(targets) => (targets, StatusCode::GOOD),
                Err(status) => (Vec::new(), status),
            };
            sink.complete(tag, BackendEvent::BrowsePathResolved { path, targets, status });
        })
    }

    fn call_method(
        &self,
        tag: RequestTag,
        object_id: &NodeId,
        method_id: &NodeId,
        arguments: Vec<TypedArgument>,
    ) -> DispatchResult<()> {
        let object_id = object_id.clone();
        let method_id = method_id.clone();
        self.submit("call_method", move |shared, sink| {
            let arguments: Vec<Variant> = arguments
                .iter()
                .map(|argument| argument.typed_value().unwrap_or_else(|_| argument.value.clone()))
                .collect();
            let outcome = shared.space.read().call(&object_id, &method_id, &arguments);
            sink.complete(
                tag,
                BackendEvent::MethodCallFinished {
                    method_id,
                    outputs: outcome.outputs,
                    input_results: outcome.input_results,
                    status: outcome.status,
                },
            );
        })
    }

    fn history_read_raw(&self, tag: RequestTag, node_id: &NodeId, request: &HistoryReadRawRequest) -> DispatchResult<()> {
        let node_id = node_id.clone();
        let request = request.clone();
        self.submit("history_read_raw", move |shared, sink| {
            let response = shared.space.read().history_read(&node_id, &request);
            sink.complete(tag, BackendEvent::HistoryDataAvailable { response });
        })
    }

    fn get_endpoints(&self, tag: RequestTag, url: &str) -> DispatchResult<()> {
        let url = url.to_string();
        self.submit("get_endpoints", move |_, sink| {
            sink.complete(
                tag,
                BackendEvent::EndpointsDiscovered {
                    endpoints: simulated_endpoints(&url),
                    status: StatusCode::GOOD,
                },
            );
        })
    }

    fn find_servers(&self, tag: RequestTag, url: &str) -> DispatchResult<()> {
        let url = url.to_string();
        self.submit("find_servers", move |_, sink| {
            sink.complete(
                tag,
                BackendEvent::ServersDiscovered {
                    servers: vec![simulated_server(&url)],
                    status: StatusCode::GOOD,
                },
            );
        })
    }

    fn add_node(&self, tag: RequestTag, item: AddNodeItem) -> DispatchResult<()> {
        self.submit("add_node", move |shared, sink| {
            let (node_id, status) = match shared.space.write().add_node(&item) {
                Ok(node_id) => (node_id, StatusCode::GOOD),
                Err(status) => (item.requested_new_node_id.clone(), status),
            };
            sink.complete(tag, BackendEvent::NodeAdded { node_id, status });
        })
    }

    fn delete_node(&self, tag: RequestTag, node_id: &NodeId, delete_target_references: bool) -> DispatchResult<()> {
        let node_id = node_id.clone();
        self.submit("delete_node", move |shared, sink| {
            let status = shared.space.write().delete_node(&node_id, delete_target_references);
            sink.complete(tag, BackendEvent::NodeDeleted { node_id, status });
        })
    }

    fn add_reference(&self, tag: RequestTag, item: AddReferenceItem) -> DispatchResult<()> {
        self.submit("add_reference", move |shared, sink| {
            let status = shared.space.write().add_reference(&item);
            sink.complete(
                tag,
                BackendEvent::ReferenceAdded {
                    source_node_id: item.source_node_id,
                    target_node_id: item.target_node_id,
                    status,
                },
            );
        })
    }

    fn delete_reference(&self, tag: RequestTag, item: DeleteReferenceItem) -> DispatchResult<()> {
        self.submit("delete_reference", move |shared, sink| {
            let status = shared.space.write().delete_reference(&item);
            sink.complete(
                tag,
                BackendEvent::ReferenceDeleted {
                    source_node_id: item.source_node_id,
                    target_node_id: item.target_node_id,
                    status,
                },
            );
        })
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc::UnboundedReceiver;

    use super::*;
    use crate::backend::EventEnvelope;
    use crate::filter::{DataChangeFilter, EventFilter, FilterElement, FilterOperand, FilterOperator};

    fn demo(name: &str) -> NodeId {
        NodeId::string(2, name)
    }

    async fn connected() -> (SimulatedBackend, UnboundedReceiver<EventEnvelope>) {
        let backend = SimulatedBackend::new();
        let (sink, mut rx) = EventSink::channel();
        backend
            .connect(&EndpointDescription::new("opc.tcp://localhost:4840"), sink)
            .await
            .unwrap();
        let state = rx.recv().await.unwrap();
        assert!(matches!(
            state.event,
            BackendEvent::StateChanged {
                state: ConnectionState::Connected
            }
        ));
        (backend, rx)
    }

    async fn create_subscription(
        backend: &SimulatedBackend,
        rx: &mut UnboundedReceiver<EventEnvelope>,
        interval: f64,
    ) -> u32 {
        backend
            .create_subscription(RequestTag::new(None, 1), &SubscriptionSettings::with_interval(interval))
            .unwrap();
        match rx.recv().await.unwrap().event {
            BackendEvent::SubscriptionCreated { subscription_id, .. } => subscription_id,
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_requires_connection() {
        let backend = SimulatedBackend::new();
        let err = backend
            .browse(RequestTag::new(None, 1), &NodeId::OBJECTS_FOLDER, &BrowseRequest::default())
            .unwrap_err();
        assert!(err.to_string().to_lowercase().contains("not connected"));
    }

    #[tokio::test]
    async fn test_fail_connection() {
        let backend = SimulatedBackend::new();
        backend.set_fail_connection(true);
        let (sink, _rx) = EventSink::channel();
        assert!(backend
            .connect(&EndpointDescription::new("opc.tcp://localhost:4840"), sink)
            .await
            .is_err());
        assert_eq!(backend.connect_count(), 1);
        assert_eq!(backend.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_read_in_ordinal_order() {
        let (backend, mut rx) = connected().await;
        let mask: AttributeMask = [Attribute::Value, Attribute::BrowseName].into_iter().collect();
        backend
            .read_attributes(RequestTag::new(Some(4), 7), &demo("Demo.Counter"), mask, None)
            .unwrap();

        let envelope = rx.recv().await.unwrap();
        assert_eq!(envelope.handle, Some(4));
        assert_eq!(envelope.request_id, Some(7));
        let BackendEvent::AttributesRead { results, .. } = envelope.event else {
            panic!("expected AttributesRead");
        };
        assert_eq!(results[0].attribute, Attribute::BrowseName);
        assert_eq!(results[1].attribute, Attribute::Value);
    }

    #[tokio::test]
    async fn test_subscription_interval_revised() {
        let (backend, mut rx) = connected().await;
        let id = create_subscription(&backend, &mut rx, 10.0).await;
        assert_eq!(
            backend.subscription_settings(id).unwrap().publishing_interval,
            DEFAULT_MIN_PUBLISHING_INTERVAL
        );

        backend.delete_subscription(RequestTag::new(None, 2), id).unwrap();
        backend.delete_subscription(RequestTag::new(None, 3), id).unwrap();
        assert!(matches!(
            rx.recv().await.unwrap().event,
            BackendEvent::SubscriptionDeleted { status: StatusCode::GOOD, .. }
        ));
        assert!(matches!(
            rx.recv().await.unwrap().event,
            BackendEvent::SubscriptionDeleted {
                status: StatusCode::BAD_SUBSCRIPTION_ID_INVALID,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_monitoring_publishes_with_deadband() {
        let (backend, mut rx) = connected().await;
        let subscription_id = create_subscription(&backend, &mut rx, 100.0).await;
        let node = demo("Demo.Temperature");
        let parameters = MonitoringParameters::default()
            .with_filter(MonitoringFilter::DataChange(DataChangeFilter::absolute(1.0)));
        backend
            .enable_monitoring(
                RequestTag::new(Some(9), 2),
                subscription_id,
                vec![MonitoringRequest {
                    node_id: node.clone(),
                    attribute: Attribute::Value,
                    parameters,
                }],
            )
            .unwrap();

        let ack = rx.recv().await.unwrap();
        let BackendEvent::MonitoringStatusChanged { status, parameters, .. } = ack.event else {
            panic!("expected acknowledgement");
        };
        assert_eq!(status, StatusCode::GOOD);
        assert_ne!(parameters.monitored_item_id, 0);

        let initial = rx.recv().await.unwrap();
        assert_eq!(initial.handle, Some(9));
        assert!(initial.request_id.is_none());

        // Within the deadband: suppressed.
        backend.set_value(&node, 21.9).unwrap();
        backend.set_value(&node, 25.0).unwrap();
        let change = rx.recv().await.unwrap();
        let BackendEvent::DataChangeOccurred { value, .. } = change.event else {
            panic!("expected data change");
        };
        assert_eq!(value.value, Variant::Double(25.0));
        assert_eq!(backend.notification_count(), 2);
    }

    #[tokio::test]
    async fn test_event_filter_on_notifier() {
        let (backend, mut rx) = connected().await;
        let subscription_id = create_subscription(&backend, &mut rx, 100.0).await;
        let filter = EventFilter::new()
            .select(SimpleAttributeOperand::field("Message"))
            .select(SimpleAttributeOperand::field("Severity"))
            .where_element(FilterElement::new(
                FilterOperator::GreaterThanOrEqual,
                FilterOperand::field("Severity"),
                FilterOperand::literal(500u16),
            ));
        backend
            .enable_monitoring(
                RequestTag::new(Some(3), 2),
                subscription_id,
                vec![MonitoringRequest {
                    node_id: demo("Demo"),
                    attribute: Attribute::EventNotifier,
                    parameters: MonitoringParameters::default().with_filter(MonitoringFilter::Event(filter)),
                }],
            )
            .unwrap();
        assert!(matches!(
            rx.recv().await.unwrap().event,
            BackendEvent::MonitoringStatusChanged { status: StatusCode::GOOD, .. }
        ));

        let low = SimulatedEvent::new(NodeId::BASE_EVENT_TYPE, "Boiler", "warm", 100);
        let high = SimulatedEvent::new(NodeId::numeric(0, 2130), "Boiler", "overheated", 800);
        assert_eq!(backend.raise_event(&demo("Demo"), low), 0);
        assert_eq!(backend.raise_event(&demo("Demo"), high), 1);

        let BackendEvent::EventOccurred { fields, .. } = rx.recv().await.unwrap().event else {
            panic!("expected event");
        };
        assert_eq!(fields[0], Variant::LocalizedText(LocalizedText::new("", "overheated")));
        assert_eq!(fields[1], Variant::UInt16(800));
    }

    #[tokio::test]
    async fn test_filter_placement_checked() {
        let (backend, mut rx) = connected().await;
        let subscription_id = create_subscription(&backend, &mut rx, 100.0).await;
        backend
            .enable_monitoring(
                RequestTag::new(Some(1), 2),
                subscription_id,
                vec![MonitoringRequest {
                    node_id: demo("Demo.Counter"),
                    attribute: Attribute::Value,
                    parameters: MonitoringParameters::default().with_filter(MonitoringFilter::DataChange(
                        DataChangeFilter::percent(5.0),
                    )),
                }],
            )
            .unwrap();
        assert!(matches!(
            rx.recv().await.unwrap().event,
            BackendEvent::MonitoringStatusChanged {
                status: StatusCode::BAD_DEADBAND_FILTER_INVALID,
                ..
            }
        ));
        assert_eq!(backend.monitored_item_count(), 0);
    }

    #[tokio::test]
    async fn test_drop_connection_clears_subscriptions() {
        let (backend, mut rx) = connected().await;
        create_subscription(&backend, &mut rx, 100.0).await;
        assert_eq!(backend.subscription_count(), 1);

        assert!(backend.drop_connection());
        assert_eq!(backend.subscription_count(), 0);
        assert!(matches!(rx.recv().await.unwrap().event, BackendEvent::ConnectionError { .. }));
        assert!(matches!(
            rx.recv().await.unwrap().event,
            BackendEvent::StateChanged {
                state: ConnectionState::Disconnected
            }
        ));
        assert!(!backend.drop_connection());
    }

    #[tokio::test]
    async fn test_rejected_requests() {
        let (backend, _rx) = connected().await;
        backend.set_reject_requests(true);
        assert!(backend
            .get_endpoints(RequestTag::new(None, 1), "opc.tcp://localhost:4840")
            .is_err());
        assert_eq!(backend.request_count(), 0);
    }
}
