// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Live OPC UA backend built on the `opcua` client stack.
//!
//! The `opcua` session API is blocking, so every service call runs on a
//! dedicated worker thread that owns the client and session. Dispatch
//! methods only queue a job; the job performs the call and emits the
//! completion on the [`EventSink`].
//!
//! ```text
//! dispatch ──job──▶ worker thread ──Session::read/browse/...──▶ server
//!                        │
//!                        └──▶ EventSink ──▶ dispatcher
//! session publish thread ──Notifier──▶ EventSink (data changes, events)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! let backend = OpcUaBackend::with_settings(LiveSettings {
//!     trust_server_certs: true,
//!     ..Default::default()
//! });
//! let connection = Connection::new(Arc::new(backend));
//! connection.connect_url("opc.tcp://plc:4840").await?;
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{mpsc as std_mpsc, Arc};
use std::thread;

use async_trait::async_trait;
use opcua::client::prelude as ua;
use opcua::sync::RwLock as UaRwLock;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, info, trace, warn};

use super::{
    verify_endpoint_description, Backend, BackendEvent, EventSink, Handle, MonitoringChange, MonitoringRequest,
    RequestTag,
};
use crate::error::{BackendError, ConnectionError, DispatchError, DispatchResult, UaResult};
use crate::filter::{
    ContentFilter, DataChangeTrigger, DeadbandType, EventFilter, FilterOperand, FilterOperator, MonitoringFilter,
    SimpleAttributeOperand,
};
use crate::monitoring::{MonitoringParameters, SubscriptionSettings};
use crate::services::{
    AddNodeItem, AddReferenceItem, BrowsePathTarget, BrowseRequest, ContinuationPoint, DeleteReferenceItem,
    HistoryReadRawRequest, HistoryReadResponse, ReadItem, ReadResult, ReferenceDescription, RelativePathElement,
    TypedArgument, WriteItem, WriteResult,
};
use crate::status::StatusCode;
use crate::types::{
    ApplicationDescription, ApplicationType, Attribute, AttributeMask, ConnectionState, DataValue,
    EndpointDescription, LocalizedText, MessageSecurityMode, MonitoringMode, NodeClass, NodeId, NodeIdentifier,
    QualifiedName, UserTokenType, Variant,
};

type Job = Box<dyn FnOnce(&mut WorkerContext) + Send>;

// =============================================================================
// LiveSettings
// =============================================================================

/// Client-side settings of the live backend.
#[derive(Debug, Clone)]
pub struct LiveSettings {
    /// Application name presented to servers.
    pub application_name: String,
    /// Application URI presented to servers.
    pub application_uri: String,
    /// PKI directory for certificates.
    pub pki_dir: Option<PathBuf>,
    /// Accept any server certificate.
    pub trust_server_certs: bool,
    /// Create a self-signed keypair if none exists.
    pub create_sample_keypair: bool,
    /// Session reconnect attempts.
    pub session_retry_limit: i32,
    /// User name and password; anonymous when `None`.
    pub user_identity: Option<(String, String)>,
}

impl Default for LiveSettings {
    fn default() -> Self {
        Self {
            application_name: "uanode".to_string(),
            application_uri: "urn:uanode:client".to_string(),
            pki_dir: None,
            trust_server_certs: false,
            create_sample_keypair: true,
            session_retry_limit: 3,
            user_identity: None,
        }
    }
}

// =============================================================================
// Notification routing
// =============================================================================

#[derive(Debug, Clone, Copy)]
struct ItemRoute {
    handle: Handle,
    subscription_id: u32,
    attribute: Attribute,
}

/// Maps client handles to nodes, and server item ids to client handles.
#[derive(Debug, Default)]
struct Routes {
    by_client_handle: HashMap<u32, ItemRoute>,
    by_item_id: HashMap<u32, u32>,
    next_client_handle: u32,
}

impl Routes {
    fn allocate(&mut self, route: ItemRoute) -> u32 {
        self.next_client_handle = self.next_client_handle.wrapping_add(1).max(1);
        self.by_client_handle.insert(self.next_client_handle, route);
        self.next_client_handle
    }

    fn bind(&mut self, item_id: u32, client_handle: u32) {
        self.by_item_id.insert(item_id, client_handle);
    }

    fn release_item(&mut self, item_id: u32) {
        if let Some(client_handle) = self.by_item_id.remove(&item_id) {
            self.by_client_handle.remove(&client_handle);
        }
    }

    fn release_subscription(&mut self, subscription_id: u32) {
        self.by_client_handle
            .retain(|_, route| route.subscription_id != subscription_id);
        let live = &self.by_client_handle;
        self.by_item_id.retain(|_, client_handle| live.contains_key(client_handle));
    }

    fn clear(&mut self) {
        self.by_client_handle.clear();
        self.by_item_id.clear();
    }
}

/// Subscription callback forwarding notifications to the event sink.
struct Notifier {
    routes: Arc<Mutex<Routes>>,
    sink: EventSink,
}

impl ua::OnSubscriptionNotification for Notifier {
    fn on_data_change(&mut self, items: &[&ua::MonitoredItem]) {
        let routes = self.routes.lock();
        for item in items {
            let Some(route) = routes.by_client_handle.get(&item.client_handle()) else {
                trace!(client_handle = item.client_handle(), "Data change for unknown item");
                continue;
            };
            self.sink.notify(
                route.handle,
                BackendEvent::DataChangeOccurred {
                    subscription_id: route.subscription_id,
                    attribute: route.attribute,
                    value: from_ua_data_value(item.last_value()),
                },
            );
        }
    }

    fn on_event(&mut self, events: &ua::EventNotificationList) {
        let routes = self.routes.lock();
        for event in events.events.iter().flatten() {
            let Some(route) = routes.by_client_handle.get(&event.client_handle) else {
                continue;
            };
            let fields = event
                .event_fields
                .iter()
                .flatten()
                .map(from_ua_variant)
                .collect();
            self.sink.notify(
                route.handle,
                BackendEvent::EventOccurred {
                    subscription_id: route.subscription_id,
                    fields,
                },
            );
        }
    }
}

// =============================================================================
// Worker
// =============================================================================

struct WorkerContext {
    client: ua::Client,
    session: Arc<UaRwLock<ua::Session>>,
    sink: EventSink,
    routes: Arc<Mutex<Routes>>,
}

struct Worker {
    jobs: std_mpsc::Sender<Job>,
    thread: thread::JoinHandle<()>,
    endpoint: String,
}

fn build_client(settings: &LiveSettings) -> UaResult<ua::Client> {
    let mut builder = ua::ClientBuilder::new()
        .application_name(settings.application_name.as_str())
        .application_uri(settings.application_uri.as_str())
        .create_sample_keypair(settings.create_sample_keypair)
        .trust_server_certs(settings.trust_server_certs)
        .session_retry_limit(settings.session_retry_limit);
    if let Some(pki_dir) = &settings.pki_dir {
        builder = builder.pki_dir(pki_dir.clone());
    }
    builder
        .client()
        .ok_or_else(|| BackendError::internal("invalid opcua client configuration").into())
}

fn identity_token(settings: &LiveSettings, endpoint: &EndpointDescription) -> ua::IdentityToken {
    match &settings.user_identity {
        Some((user, password)) if endpoint.user_identity_tokens.contains(&UserTokenType::UserName) => {
            ua::IdentityToken::UserName(user.clone(), password.clone())
        }
        Some(_) => {
            warn!(endpoint = %endpoint.endpoint_url, "Endpoint does not accept user names, connecting anonymously");
            ua::IdentityToken::Anonymous
        }
        None => ua::IdentityToken::Anonymous,
    }
}

fn to_ua_security_mode(mode: MessageSecurityMode) -> ua::MessageSecurityMode {
    match mode {
        MessageSecurityMode::None => ua::MessageSecurityMode::None,
        MessageSecurityMode::Sign => ua::MessageSecurityMode::Sign,
        MessageSecurityMode::SignAndEncrypt => ua::MessageSecurityMode::SignAndEncrypt,
        MessageSecurityMode::Invalid => ua::MessageSecurityMode::Invalid,
    }
}

/// Runs on the worker thread: connects, reports readiness, then serves jobs
/// until the sender side is dropped.
fn run_worker(
    settings: LiveSettings,
    endpoint: EndpointDescription,
    sink: EventSink,
    routes: Arc<Mutex<Routes>>,
    jobs: std_mpsc::Receiver<Job>,
    ready: oneshot::Sender<UaResult<()>>,
) {
    let connected = (|| -> UaResult<(ua::Client, Arc<UaRwLock<ua::Session>>)> {
        let mut client = build_client(&settings)?;
        let offered = client
            .get_server_endpoints_from_url(endpoint.endpoint_url.as_str())
            .map_err(|status| ConnectionError::refused(&endpoint.endpoint_url, format!("GetEndpoints failed: {status}")))?;
        let mode = to_ua_security_mode(endpoint.security_mode);
        let selected = offered
            .into_iter()
            .find(|candidate| {
                candidate.security_policy_uri.as_ref() == endpoint.security_policy_uri && candidate.security_mode == mode
            })
            .ok_or_else(|| {
                ConnectionError::refused(
                    &endpoint.endpoint_url,
                    format!("no endpoint offers {} with {}", endpoint.security_policy_name(), endpoint.security_mode),
                )
            })?;
        let session = client
            .connect_to_endpoint(selected, identity_token(&settings, &endpoint))
            .map_err(|status| ConnectionError::refused(&endpoint.endpoint_url, status.to_string()))?;
        Ok((client, session))
    })();

    let (client, session) = match connected {
        Ok(connected) => connected,
        Err(error) => {
            let _ = ready.send(Err(error));
            return;
        }
    };

    {
        let status_sink = sink.clone();
        let mut session = session.write();
        session.set_connection_status_callback(ua::ConnectionStatusCallback::new(move |connected| {
            if !connected {
                status_sink.emit(BackendEvent::ConnectionError {
                    status: StatusCode::BAD_CONNECTION_CLOSED,
                    message: "session connection lost".to_string(),
                });
                status_sink.emit(BackendEvent::StateChanged {
                    state: ConnectionState::Disconnected,
                });
            }
        }));
    }
    let publish_loop = ua::Session::run_async(Arc::clone(&session));
    if ready.send(Ok(())).is_err() {
        session.read().disconnect();
        return;
    }

    let mut context = WorkerContext {
        client,
        session,
        sink,
        routes,
    };
    while let Ok(job) = jobs.recv() {
        job(&mut context);
    }

    let _ = publish_loop.send(ua::SessionCommand::Stop);
    context.session.read().disconnect();
    context.routes.lock().clear();
    debug!("opcua worker stopped");
}

// =============================================================================
// OpcUaBackend
// =============================================================================

/// Backend talking to a live OPC UA server.
pub struct OpcUaBackend {
    settings: LiveSettings,
    worker: Mutex<Option<Worker>>,
    routes: Arc<Mutex<Routes>>,
    state: AtomicU8,
}

impl OpcUaBackend {
    /// Creates a backend with default client settings.
    pub fn new() -> Self {
        Self::with_settings(LiveSettings::default())
    }

    /// Creates a backend with `settings`.
    pub fn with_settings(settings: LiveSettings) -> Self {
        Self {
            settings,
            worker: Mutex::new(None),
            routes: Arc::new(Mutex::new(Routes::default())),
            state: AtomicU8::new(ConnectionState::Disconnected.as_u8()),
        }
    }

    /// Returns the client settings.
    pub fn settings(&self) -> &LiveSettings {
        &self.settings
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.store(state.as_u8(), Ordering::SeqCst);
    }

    fn submit<F>(&self, operation: &'static str, job: F) -> DispatchResult<()>
    where
        F: FnOnce(&mut WorkerContext) + Send + 'static,
    {
        let worker = self.worker.lock();
        let Some(worker) = worker.as_ref() else {
            return Err(DispatchError::NotConnected.into());
        };
        worker
            .jobs
            .send(Box::new(job))
            .map_err(|_| DispatchError::NotConnected)?;
        trace!(operation, "opcua request queued");
        Ok(())
    }
}

impl Default for OpcUaBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for OpcUaBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpcUaBackend")
            .field("state", &self.state())
            .field("application_uri", &self.settings.application_uri)
            .finish()
    }
}

#[async_trait]
impl Backend for OpcUaBackend {
    fn name(&self) -> &'static str {
        "opcua"
    }

    fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    async fn connect(&self, endpoint: &EndpointDescription, sink: EventSink) -> UaResult<()> {
        verify_endpoint_description(endpoint)?;
        if let Some(worker) = self.worker.lock().as_ref() {
            return Err(ConnectionError::AlreadyConnected {
                endpoint: worker.endpoint.clone(),
            }
            .into());
        }
        self.set_state(ConnectionState::Connecting);
        info!(endpoint = %endpoint, "Connecting to OPC UA server");

        let (jobs_tx, jobs_rx) = std_mpsc::channel::<Job>();
        let (ready_tx, ready_rx) = oneshot::channel();
        let settings = self.settings.clone();
        let worker_endpoint = endpoint.clone();
        let worker_sink = sink.clone();
        let routes = Arc::clone(&self.routes);
        let spawned = thread::Builder::new()
            .name("uanode-opcua".to_string())
            .spawn(move || run_worker(settings, worker_endpoint, worker_sink, routes, jobs_rx, ready_tx));
        let thread = match spawned {
            Ok(thread) => thread,
            Err(error) => {
                self.set_state(ConnectionState::Disconnected);
                return Err(BackendError::internal(format!("failed to start opcua worker: {error}")).into());
            }
        };

        let outcome = ready_rx
            .await
            .unwrap_or_else(|_| Err(BackendError::internal("opcua worker exited during connect").into()));
        if let Err(error) = outcome {
            self.set_state(ConnectionState::Disconnected);
            let _ = thread.join();
            return Err(error);
        }

        *self.worker.lock() = Some(Worker {
            jobs: jobs_tx,
            thread,
            endpoint: endpoint.endpoint_url.clone(),
        });
        self.set_state(ConnectionState::Connected);
        sink.emit(BackendEvent::StateChanged {
            state: ConnectionState::Connected,
        });
        info!(endpoint = %endpoint.endpoint_url, "Connected to OPC UA server");
        Ok(())
    }

    async fn disconnect(&self) -> UaResult<()> {
        let Some(worker) = self.worker.lock().take() else {
            return Ok(());
        };
        self.set_state(ConnectionState::Closing);
        drop(worker.jobs);
        let joined = tokio::task::spawn_blocking(move || worker.thread.join()).await;
        self.set_state(ConnectionState::Disconnected);
        info!(endpoint = %worker.endpoint, "Disconnected from OPC UA server");
        match joined {
            Ok(Ok(())) => Ok(()),
            _ => Err(BackendError::internal("opcua worker panicked").into()),
        }
    }

    // =========================================================================
    // Attribute Services
    // =========================================================================

    fn read_attributes(
        &self,
        tag: RequestTag,
        node_id: &NodeId,
        mask: AttributeMask,
        index_range: Option<&str>,
    ) -> DispatchResult<()> {
        let items: Vec<ReadItem> = mask
            .iter()
            .map(|attribute| ReadItem {
                node_id: node_id.clone(),
                attribute,
                index_range: index_range.map(str::to_string),
            })
            .collect();
        self.submit("read_attributes", move |context| {
            let (results, status) = read_items(&context.session, &items);
            context
                .sink
                .complete(tag, BackendEvent::AttributesRead { results, status });
        })
    }

    fn write_attributes(&self, tag: RequestTag, items: Vec<WriteItem>) -> DispatchResult<()> {
        self.submit("write_attributes", move |context| {
            let (results, status) = write_items(&context.session, &items);
            context
                .sink
                .complete(tag, BackendEvent::AttributesWritten { results, status });
        })
    }

    fn read_node_attributes(&self, tag: RequestTag, items: Vec<ReadItem>) -> DispatchResult<()> {
        self.submit("read_node_attributes", move |context| {
            let (results, status) = read_items(&context.session, &items);
            context
                .sink
                .complete(tag, BackendEvent::BulkReadFinished { results, status });
        })
    }

    fn write_node_attributes(&self, tag: RequestTag, items: Vec<WriteItem>) -> DispatchResult<()> {
        self.submit("write_node_attributes", move |context| {
            let (results, status) = write_items(&context.session, &items);
            context
                .sink
                .complete(tag, BackendEvent::BulkWriteFinished { results, status });
        })
    }

    // =========================================================================
    // Subscriptions & Monitoring
    // =========================================================================

    fn create_subscription(&self, tag: RequestTag, settings: &SubscriptionSettings) -> DispatchResult<()> {
        let settings = settings.clone();
        self.submit("create_subscription", move |context| {
            use ua::SubscriptionService;
            let notifier = Notifier {
                routes: Arc::clone(&context.routes),
                sink: context.sink.clone(),
            };
            let created = context.session.read().create_subscription(
                settings.publishing_interval,
                settings.lifetime_count,
                settings.max_keep_alive_count,
                settings.max_notifications_per_publish,
                settings.priority,
                settings.publishing_enabled,
                notifier,
            );
            let (subscription_id, status) = match created {
                Ok(id) => (id, StatusCode::GOOD),
                Err(status) => (0, from_ua_status(status)),
            };
            debug!(subscription_id, %status, "Subscription created");
            context.sink.complete(
                tag,
                BackendEvent::SubscriptionCreated {
                    subscription_id,
                    settings,
                    status,
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
        self.submit("modify_subscription", move |context| {
            use ua::SubscriptionService;
            let status = status_of(context.session.read().modify_subscription(
                subscription_id,
                settings.publishing_interval,
                settings.lifetime_count,
                settings.max_keep_alive_count,
                settings.max_notifications_per_publish,
                settings.priority,
            ));
            context.sink.complete(
                tag,
                BackendEvent::SubscriptionModified {
                    subscription_id,
                    settings,
                    status,
                },
            );
        })
    }

    fn delete_subscription(&self, tag: RequestTag, subscription_id: u32) -> DispatchResult<()> {
        self.submit("delete_subscription", move |context| {
            use ua::SubscriptionService;
            let status = match context.session.read().delete_subscription(subscription_id) {
                Ok(status) | Err(status) => from_ua_status(status),
            };
            context.routes.lock().release_subscription(subscription_id);
            context
                .sink
                .complete(tag, BackendEvent::SubscriptionDeleted { subscription_id, status });
        })
    }

    fn enable_monitoring(
        &self,
        tag: RequestTag,
        subscription_id: u32,
        requests: Vec<MonitoringRequest>,
    ) -> DispatchResult<()> {
        let Some(handle) = tag.handle else {
            return Err(DispatchError::rejected("enable_monitoring", "monitoring requires a node handle").into());
        };
        self.submit("enable_monitoring", move |context| {
            use ua::MonitoredItemService;
            let client_handles: Vec<u32> = {
                let mut routes = context.routes.lock();
                requests
                    .iter()
                    .map(|request| {
                        routes.allocate(ItemRoute {
                            handle,
                            subscription_id,
                            attribute: request.attribute,
                        })
                    })
                    .collect()
            };
            let create: Vec<ua::MonitoredItemCreateRequest> = requests
                .iter()
                .zip(&client_handles)
                .map(|(request, client_handle)| ua::MonitoredItemCreateRequest {
                    item_to_monitor: to_ua_read_value_id(
                        &request.node_id,
                        request.attribute,
                        request.parameters.index_range.as_deref(),
                    ),
                    monitoring_mode: to_ua_monitoring_mode(request.parameters.monitoring_mode),
                    requested_parameters: to_ua_parameters(&request.parameters, *client_handle),
                })
                .collect();

            let outcome = context.session.read().create_monitored_items(
                subscription_id,
                ua::TimestampsToReturn::Both,
                &create,
            );
            let mut routes = context.routes.lock();
            for (index, request) in requests.into_iter().enumerate() {
                let client_handle = client_handles[index];
                let mut parameters = request.parameters;
                parameters.subscription_id = Some(subscription_id);
                let status = match &outcome {
                    Ok(results) => match results.get(index) {
                        Some(result) => {
                            let status = from_ua_status(result.status_code);
                            if status.is_good() {
                                parameters.monitored_item_id = result.monitored_item_id;
                                parameters.sampling_interval = result.revised_sampling_interval;
                                parameters.queue_size = result.revised_queue_size;
                                routes.bind(result.monitored_item_id, client_handle);
                            }
                            status
                        }
                        None => StatusCode::BAD_UNEXPECTED_ERROR,
                    },
                    Err(status) => from_ua_status(*status),
                };
                if !status.is_good() {
                    routes.by_client_handle.remove(&client_handle);
                }
                context.sink.complete(
                    tag,
                    BackendEvent::MonitoringStatusChanged {
                        subscription_id,
                        attribute: request.attribute,
                        change: MonitoringChange::Enabled,
                        parameters,
                        status,
                    },
                );
            }
        })
    }

    fn disable_monitoring(
        &self,
        tag: RequestTag,
        subscription_id: u32,
        items: Vec<(Attribute, u32)>,
    ) -> DispatchResult<()> {
        self.submit("disable_monitoring", move |context| {
            use ua::MonitoredItemService;
            let ids: Vec<u32> = items.iter().map(|(_, id)| *id).collect();
            let outcome = context.session.read().delete_monitored_items(subscription_id, &ids);
            let mut routes = context.routes.lock();
            for (index, (attribute, item_id)) in items.into_iter().enumerate() {
                let status = match &outcome {
                    Ok(statuses) => statuses
                        .get(index)
                        .copied()
                        .map_or(StatusCode::BAD_UNEXPECTED_ERROR, from_ua_status),
                    Err(status) => from_ua_status(*status),
                };
                routes.release_item(item_id);
                let parameters = MonitoringParameters {
                    subscription_id: Some(subscription_id),
                    monitored_item_id: item_id,
                    ..Default::default()
                };
                context.sink.complete(
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
        self.submit("modify_monitoring", move |context| {
            use ua::MonitoredItemService;
            let client_handle = context
                .routes
                .lock()
                .by_item_id
                .get(&parameters.monitored_item_id)
                .copied()
                .unwrap_or_default();
            let request = ua::MonitoredItemModifyRequest {
                monitored_item_id: parameters.monitored_item_id,
                requested_parameters: to_ua_parameters(&parameters, client_handle),
            };
            let outcome = context.session.read().modify_monitored_items(
                subscription_id,
                ua::TimestampsToReturn::Both,
                &[request],
            );
            let mut revised = parameters;
            let mut status = match &outcome {
                Ok(results) => results
                    .first()
                    .map_or(StatusCode::BAD_UNEXPECTED_ERROR, |result| {
                        revised.sampling_interval = result.revised_sampling_interval;
                        revised.queue_size = result.revised_queue_size;
                        from_ua_status(result.status_code)
                    }),
                Err(status) => from_ua_status(*status),
            };
            if status.is_good() {
                let mode = to_ua_monitoring_mode(revised.monitoring_mode);
                status = match context
                    .session
                    .read()
                    .set_monitoring_mode(subscription_id, mode, &[revised.monitored_item_id])
                {
                    Ok(statuses) => statuses.first().copied().map_or(StatusCode::GOOD, from_ua_status),
                    Err(status) => from_ua_status(status),
                };
            }
            context.sink.complete(
                tag,
                BackendEvent::MonitoringParametersChanged {
                    subscription_id,
                    attribute,
                    parameters: revised,
                    status,
                },
            );
        })
    }

    // =========================================================================
    // View & Method Services
    // =========================================================================

    fn browse(&self, tag: RequestTag, node_id: &NodeId, request: &BrowseRequest) -> DispatchResult<()> {
        let description = ua::BrowseDescription {
            node_id: to_ua_node_id(node_id),
            browse_direction: match request.direction {
                crate::types::BrowseDirection::Forward => ua::BrowseDirection::Forward,
                crate::types::BrowseDirection::Inverse => ua::BrowseDirection::Inverse,
                crate::types::BrowseDirection::Both => ua::BrowseDirection::Both,
            },
            reference_type_id: to_ua_node_id(&request.reference_type),
            include_subtypes: request.include_subtypes,
            node_class_mask: request.node_class_mask,
            result_mask: ua::BrowseDescriptionResultMask::all().bits(),
        };
        self.submit("browse", move |context| {
            use ua::ViewService;
            let (references, status) = match context.session.read().browse(&[description]) {
                Ok(Some(results)) => match results.into_iter().next() {
                    Some(result) => (
                        result
                            .references
                            .unwrap_or_default()
                            .iter()
                            .map(from_ua_reference)
                            .collect(),
                        from_ua_status(result.status_code),
                    ),
                    None => (Vec::new(), StatusCode::BAD_UNEXPECTED_ERROR),
                },
                Ok(None) => (Vec::new(), StatusCode::BAD_UNEXPECTED_ERROR),
                Err(status) => (Vec::new(), from_ua_status(status)),
            };
            context
                .sink
                .complete(tag, BackendEvent::BrowseFinished { references, status });
        })
    }

    fn translate_browse_path(
        &self,
        tag: RequestTag,
        node_id: &NodeId,
        path: &[RelativePathElement],
    ) -> DispatchResult<()> {
        let browse_path = ua::BrowsePath {
            starting_node: to_ua_node_id(node_id),
            relative_path: to_ua_relative_path(path),
        };
        let path = path.to_vec();
        self.submit("translate_browse_path", move |context| {
            use ua::ViewService;
            let (targets, status) = match context.session.read().translate_browse_paths_to_node_ids(&[browse_path]) {
                Ok(results) => match results.into_iter().next() {
                    Some(result) => (
                        result
                            .targets
                            .unwrap_or_default()
                            .iter()
                            .map(|target| BrowsePathTarget {
                                target_id: from_ua_node_id(&target.target_id.node_id),
                                remaining_path_index: target.remaining_path_index,
                            })
                            .collect(),
                        from_ua_status(result.status_code),
                    ),
                    None => (Vec::new(), StatusCode::BAD_UNEXPECTED_ERROR),
                },
                Err(status) => (Vec::new(), from_ua_status(status)),
            };
            context
                .sink
                .complete(tag, BackendEvent::BrowsePathResolved { path, targets, status });
        })
    }

    fn call_method(
        &self,
        tag: RequestTag,
        object_id: &NodeId,
        method_id: &NodeId,
        arguments: Vec<TypedArgument>,
    ) -> DispatchResult<()> {
        let inputs = arguments
            .iter()
            .map(|argument| argument.typed_value().map(|value| to_ua_variant(&value)))
            .collect::<UaResult<Vec<_>>>()?;
        let request = ua::CallMethodRequest {
            object_id: to_ua_node_id(object_id),
            method_id: to_ua_node_id(method_id),
            input_arguments: Some(inputs),
        };
        let method_id = method_id.clone();
        self.submit("call_method", move |context| {
            use ua::MethodService;
            let event = match context.session.read().call(request) {
                Ok(result) => BackendEvent::MethodCallFinished {
                    method_id,
                    outputs: result.output_arguments.iter().flatten().map(from_ua_variant).collect(),
                    input_results: result
                        .input_argument_results
                        .iter()
                        .flatten()
                        .copied()
                        .map(from_ua_status)
                        .collect(),
                    status: from_ua_status(result.status_code),
                },
                Err(status) => BackendEvent::MethodCallFinished {
                    method_id,
                    outputs: Vec::new(),
                    input_results: Vec::new(),
                    status: from_ua_status(status),
                },
            };
            context.sink.complete(tag, event);
        })
    }

    // =========================================================================
    // Optional Services
    // =========================================================================

    fn history_read_raw(
        &self,
        tag: RequestTag,
        node_id: &NodeId,
        request: &HistoryReadRawRequest,
    ) -> DispatchResult<()> {
        let details = ua::ReadRawModifiedDetails {
            is_read_modified: false,
            start_time: ua::DateTime::from(request.start),
            end_time: ua::DateTime::from(request.end),
            num_values_per_node: request.num_values_per_node,
            return_bounds: request.return_bounds,
        };
        let value_id = ua::HistoryReadValueId {
            node_id: to_ua_node_id(node_id),
            index_range: ua::UAString::null(),
            data_encoding: ua::QualifiedName::null(),
            continuation_point: request
                .continuation_point
                .as_ref()
                .map_or_else(ua::ByteString::null, |point| ua::ByteString::from(point.0.clone())),
        };
        let request = request.clone();
        self.submit("history_read_raw", move |context| {
            use ua::AttributeService;
            let outcome = context.session.read().history_read(
                ua::HistoryReadAction::ReadRawModifiedDetails(details),
                ua::TimestampsToReturn::Both,
                false,
                &[value_id],
            );
            let response = match outcome {
                Ok(results) => match results.into_iter().next() {
                    Some(result) => {
                        let data = result
                            .history_data
                            .decode_inner::<ua::HistoryData>(&ua::DecodingOptions::default())
                            .ok()
                            .and_then(|history| history.data_values)
                            .unwrap_or_default()
                            .iter()
                            .map(from_ua_data_value)
                            .collect();
                        HistoryReadResponse {
                            data,
                            status: from_ua_status(result.status_code),
                            continuation_point: result
                                .continuation_point
                                .value
                                .filter(|bytes| !bytes.is_empty())
                                .map(ContinuationPoint),
                            request,
                        }
                    }
                    None => HistoryReadResponse {
                        data: Vec::new(),
                        status: StatusCode::BAD_UNEXPECTED_ERROR,
                        continuation_point: None,
                        request,
                    },
                },
                Err(status) => HistoryReadResponse {
                    data: Vec::new(),
                    status: from_ua_status(status),
                    continuation_point: None,
                    request,
                },
            };
            context
                .sink
                .complete(tag, BackendEvent::HistoryDataAvailable { response });
        })
    }

    fn get_endpoints(&self, tag: RequestTag, url: &str) -> DispatchResult<()> {
        let url = url.to_string();
        self.submit("get_endpoints", move |context| {
            let (endpoints, status) = match context.client.get_server_endpoints_from_url(url.as_str()) {
                Ok(endpoints) => (endpoints.iter().map(from_ua_endpoint).collect(), StatusCode::GOOD),
                Err(status) => (Vec::new(), from_ua_status(status)),
            };
            context
                .sink
                .complete(tag, BackendEvent::EndpointsDiscovered { endpoints, status });
        })
    }

    fn find_servers(&self, tag: RequestTag, url: &str) -> DispatchResult<()> {
        let url = url.to_string();
        self.submit("find_servers", move |context| {
            let (servers, status) = match context.client.find_servers(url.as_str()) {
                Ok(servers) => (servers.iter().map(from_ua_application).collect(), StatusCode::GOOD),
                Err(status) => (Vec::new(), from_ua_status(status)),
            };
            context
                .sink
                .complete(tag, BackendEvent::ServersDiscovered { servers, status });
        })
    }

    fn add_node(&self, tag: RequestTag, item: AddNodeItem) -> DispatchResult<()> {
        let attributes = node_attributes(&item)?;
        let request = ua::AddNodesItem {
            parent_node_id: to_ua_node_id(&item.parent_node_id).into(),
            reference_type_id: to_ua_node_id(&item.reference_type),
            requested_new_node_id: to_ua_node_id(&item.requested_new_node_id).into(),
            browse_name: ua::QualifiedName::new(item.browse_name.namespace_index, item.browse_name.name.as_str()),
            node_class: to_ua_node_class(item.node_class),
            node_attributes: attributes,
            type_definition: to_ua_node_id(&item.type_definition).into(),
        };
        self.submit("add_node", move |context| {
            use ua::NodeManagementService;
            let (node_id, status) = match context.session.read().add_nodes(&[request]) {
                Ok(results) => results.first().map_or(
                    (NodeId::NULL, StatusCode::BAD_UNEXPECTED_ERROR),
                    |result| (from_ua_node_id(&result.added_node_id), from_ua_status(result.status_code)),
                ),
                Err(status) => (NodeId::NULL, from_ua_status(status)),
            };
            context.sink.complete(tag, BackendEvent::NodeAdded { node_id, status });
        })
    }

    fn delete_node(&self, tag: RequestTag, node_id: &NodeId, delete_target_references: bool) -> DispatchResult<()> {
        let request = ua::DeleteNodesItem {
            node_id: to_ua_node_id(node_id),
            delete_target_references,
        };
        let node_id = node_id.clone();
        self.submit("delete_node", move |context| {
            use ua::NodeManagementService;
            let status = first_status(context.session.read().delete_nodes(&[request]));
            context.sink.complete(tag, BackendEvent::NodeDeleted { node_id, status });
        })
    }

    fn add_reference(&self, tag: RequestTag, item: AddReferenceItem) -> DispatchResult<()> {
        let request = ua::AddReferencesItem {
            source_node_id: to_ua_node_id(&item.source_node_id),
            reference_type_id: to_ua_node_id(&item.reference_type),
            is_forward: item.is_forward,
            target_server_uri: ua::UAString::null(),
            target_node_id: to_ua_node_id(&item.target_node_id).into(),
            target_node_class: to_ua_node_class(item.target_node_class),
        };
        self.submit("add_reference", move |context| {
            use ua::NodeManagementService;
            let status = first_status(context.session.read().add_references(&[request]));
            context.sink.complete(
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
        let request = ua::DeleteReferencesItem {
            source_node_id: to_ua_node_id(&item.source_node_id),
            reference_type_id: to_ua_node_id(&item.reference_type),
            is_forward: item.is_forward,
            target_node_id: to_ua_node_id(&item.target_node_id).into(),
            delete_bidirectional: item.delete_bidirectional,
        };
        self.submit("delete_reference", move |context| {
            use ua::NodeManagementService;
            let status = first_status(context.session.read().delete_references(&[request]));
            context.sink.complete(
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

// =============================================================================
// Service helpers
// =============================================================================

fn read_items(session: &Arc<UaRwLock<ua::Session>>, items: &[ReadItem]) -> (Vec<ReadResult>, StatusCode) {
    use ua::AttributeService;
    let ids: Vec<ua::ReadValueId> = items
        .iter()
        .map(|item| to_ua_read_value_id(&item.node_id, item.attribute, item.index_range.as_deref()))
        .collect();
    match session.read().read(&ids, ua::TimestampsToReturn::Both, 0.0) {
        Ok(values) if values.len() == items.len() => (
            items
                .iter()
                .zip(values.iter())
                .map(|(item, value)| ReadResult::from_data_value(item, from_ua_data_value(value)))
                .collect(),
            StatusCode::GOOD,
        ),
        Ok(_) => failed_reads(items, StatusCode::BAD_UNEXPECTED_ERROR),
        Err(status) => failed_reads(items, from_ua_status(status)),
    }
}

fn failed_reads(items: &[ReadItem], status: StatusCode) -> (Vec<ReadResult>, StatusCode) {
    (items.iter().map(|item| ReadResult::failed(item, status)).collect(), status)
}

fn write_items(session: &Arc<UaRwLock<ua::Session>>, items: &[WriteItem]) -> (Vec<WriteResult>, StatusCode) {
    use ua::AttributeService;
    let values: Vec<ua::WriteValue> = items
        .iter()
        .map(|item| ua::WriteValue {
            node_id: to_ua_node_id(&item.node_id),
            attribute_id: item.attribute.wire_id(),
            index_range: item
                .index_range
                .as_deref()
                .map_or_else(ua::UAString::null, ua::UAString::from),
            value: ua::DataValue {
                value: Some(to_ua_variant(&item.value)),
                status: item.status.map(to_ua_status),
                source_timestamp: item.source_timestamp.map(ua::DateTime::from),
                source_picoseconds: None,
                server_timestamp: item.server_timestamp.map(ua::DateTime::from),
                server_picoseconds: None,
            },
        })
        .collect();
    match session.read().write(&values) {
        Ok(statuses) if statuses.len() == items.len() => (
            items
                .iter()
                .zip(statuses)
                .map(|(item, status)| WriteResult::new(item, from_ua_status(status)))
                .collect(),
            StatusCode::GOOD,
        ),
        Ok(_) => failed_writes(items, StatusCode::BAD_UNEXPECTED_ERROR),
        Err(status) => failed_writes(items, from_ua_status(status)),
    }
}

fn failed_writes(items: &[WriteItem], status: StatusCode) -> (Vec<WriteResult>, StatusCode) {
    (items.iter().map(|item| WriteResult::new(item, status)).collect(), status)
}

fn status_of(outcome: Result<(), ua::StatusCode>) -> StatusCode {
    match outcome {
        Ok(()) => StatusCode::GOOD,
        Err(status) => from_ua_status(status),
    }
}

fn first_status(outcome: Result<Vec<ua::StatusCode>, ua::StatusCode>) -> StatusCode {
    match outcome {
        Ok(statuses) => statuses
            .first()
            .copied()
            .map_or(StatusCode::BAD_UNEXPECTED_ERROR, from_ua_status),
        Err(status) => from_ua_status(status),
    }
}

fn node_attributes(item: &AddNodeItem) -> UaResult<ua::ExtensionObject> {
    let display_name = item
        .display_name
        .clone()
        .unwrap_or_else(|| LocalizedText::new("", item.browse_name.name.clone()));
    match item.node_class {
        NodeClass::Variable => {
            let value = item.value.clone().unwrap_or_default();
            let attributes = ua::VariableAttributes {
                specified_attributes: (ua::AttributesMask::DISPLAY_NAME
                    | ua::AttributesMask::VALUE
                    | ua::AttributesMask::ACCESS_LEVEL
                    | ua::AttributesMask::USER_ACCESS_LEVEL)
                    .bits(),
                display_name: to_ua_localized_text(&display_name),
                description: ua::LocalizedText::null(),
                write_mask: 0,
                user_write_mask: 0,
                value: to_ua_variant(&value),
                data_type: ua::NodeId::null(),
                value_rank: -1,
                array_dimensions: None,
                access_level: 3,
                user_access_level: 3,
                minimum_sampling_interval: 0.0,
                historizing: false,
            };
            Ok(ua::ExtensionObject::from_encodable(
                ua::ObjectId::VariableAttributes_Encoding_DefaultBinary,
                &attributes,
            ))
        }
        NodeClass::Object => {
            let attributes = ua::ObjectAttributes {
                specified_attributes: ua::AttributesMask::DISPLAY_NAME.bits(),
                display_name: to_ua_localized_text(&display_name),
                description: ua::LocalizedText::null(),
                write_mask: 0,
                user_write_mask: 0,
                event_notifier: 0,
            };
            Ok(ua::ExtensionObject::from_encodable(
                ua::ObjectId::ObjectAttributes_Encoding_DefaultBinary,
                &attributes,
            ))
        }
        other => Err(DispatchError::rejected("add_node", format!("node class {other:?} cannot be added")).into()),
    }
}

// =============================================================================
// Conversions
// =============================================================================

fn from_ua_status(status: ua::StatusCode) -> StatusCode {
    StatusCode(status.bits())
}

fn to_ua_status(status: StatusCode) -> ua::StatusCode {
    ua::StatusCode::from_bits_truncate(status.0)
}

fn to_ua_node_id(node_id: &NodeId) -> ua::NodeId {
    let ns = node_id.namespace_index;
    match &node_id.identifier {
        NodeIdentifier::Numeric(value) => ua::NodeId::new(ns, *value),
        NodeIdentifier::String(value) => ua::NodeId::new(ns, ua::UAString::from(value.as_str())),
        NodeIdentifier::Guid(value) => ua::NodeId::new(ns, ua::Guid::from_bytes(*value.as_bytes())),
        NodeIdentifier::Opaque(value) => ua::NodeId::new(ns, ua::ByteString::from(value.clone())),
    }
}

fn from_ua_node_id(node_id: &ua::NodeId) -> NodeId {
    let ns = node_id.namespace;
    match &node_id.identifier {
        ua::Identifier::Numeric(value) => NodeId::numeric(ns, *value),
        ua::Identifier::String(value) => NodeId::string(ns, value.as_ref()),
        ua::Identifier::Guid(value) => NodeId::guid(ns, uuid::Uuid::from_bytes(*value.as_bytes())),
        ua::Identifier::ByteString(value) => NodeId::opaque(ns, value.value.clone().unwrap_or_default()),
    }
}

fn to_ua_qualified_name(name: &QualifiedName) -> ua::QualifiedName {
    ua::QualifiedName::new(name.namespace_index, name.name.as_str())
}

fn from_ua_qualified_name(name: &ua::QualifiedName) -> QualifiedName {
    QualifiedName::new(name.namespace_index, name.name.as_ref())
}

fn to_ua_localized_text(text: &LocalizedText) -> ua::LocalizedText {
    ua::LocalizedText::new(text.locale.as_str(), text.text.as_str())
}

fn from_ua_localized_text(text: &ua::LocalizedText) -> LocalizedText {
    LocalizedText::new(text.locale.as_ref(), text.text.as_ref())
}

fn from_ua_datetime(value: &ua::DateTime) -> chrono::DateTime<chrono::Utc> {
    value.as_chrono()
}

fn to_ua_variant(value: &Variant) -> ua::Variant {
    match value {
        Variant::Empty => ua::Variant::Empty,
        Variant::Boolean(v) => ua::Variant::Boolean(*v),
        Variant::SByte(v) => ua::Variant::SByte(*v),
        Variant::Byte(v) => ua::Variant::Byte(*v),
        Variant::Int16(v) => ua::Variant::Int16(*v),
        Variant::UInt16(v) => ua::Variant::UInt16(*v),
        Variant::Int32(v) => ua::Variant::Int32(*v),
        Variant::UInt32(v) => ua::Variant::UInt32(*v),
        Variant::Int64(v) => ua::Variant::Int64(*v),
        Variant::UInt64(v) => ua::Variant::UInt64(*v),
        Variant::Float(v) => ua::Variant::Float(*v),
        Variant::Double(v) => ua::Variant::Double(*v),
        Variant::String(v) => ua::Variant::String(ua::UAString::from(v.as_str())),
        Variant::DateTime(v) => ua::Variant::DateTime(Box::new(ua::DateTime::from(*v))),
        Variant::Guid(v) => ua::Variant::Guid(Box::new(ua::Guid::from_bytes(*v.as_bytes()))),
        Variant::ByteString(v) => ua::Variant::ByteString(ua::ByteString::from(v.clone())),
        Variant::NodeId(v) => ua::Variant::NodeId(Box::new(to_ua_node_id(v))),
        Variant::StatusCode(v) => ua::Variant::StatusCode(to_ua_status(*v)),
        Variant::QualifiedName(v) => ua::Variant::QualifiedName(Box::new(to_ua_qualified_name(v))),
        Variant::LocalizedText(v) => ua::Variant::LocalizedText(Box::new(to_ua_localized_text(v))),
        Variant::Array(items) => {
            let values: Vec<ua::Variant> = items.iter().map(to_ua_variant).collect();
            let type_id = values.first().map_or(ua::VariantTypeId::Variant, ua::Variant::type_id);
            ua::Array::new(type_id, values)
                .map(|array| ua::Variant::Array(Box::new(array)))
                .unwrap_or(ua::Variant::Empty)
        }
    }
}

fn from_ua_variant(value: &ua::Variant) -> Variant {
    match value {
        ua::Variant::Empty => Variant::Empty,
        ua::Variant::Boolean(v) => Variant::Boolean(*v),
        ua::Variant::SByte(v) => Variant::SByte(*v),
        ua::Variant::Byte(v) => Variant::Byte(*v),
        ua::Variant::Int16(v) => Variant::Int16(*v),
        ua::Variant::UInt16(v) => Variant::UInt16(*v),
        ua::Variant::Int32(v) => Variant::Int32(*v),
        ua::Variant::UInt32(v) => Variant::UInt32(*v),
        ua::Variant::Int64(v) => Variant::Int64(*v),
        ua::Variant::UInt64(v) => Variant::UInt64(*v),
        ua::Variant::Float(v) => Variant::Float(*v),
        ua::Variant::Double(v) => Variant::Double(*v),
        ua::Variant::String(v) => Variant::String(v.as_ref().to_string()),
        ua::Variant::DateTime(v) => Variant::DateTime(from_ua_datetime(v)),
        ua::Variant::Guid(v) => Variant::Guid(uuid::Uuid::from_bytes(*v.as_bytes())),
        ua::Variant::ByteString(v) => Variant::ByteString(v.value.clone().unwrap_or_default()),
        ua::Variant::NodeId(v) => Variant::NodeId(from_ua_node_id(v)),
        ua::Variant::ExpandedNodeId(v) => Variant::NodeId(from_ua_node_id(&v.node_id)),
        ua::Variant::StatusCode(v) => Variant::StatusCode(from_ua_status(*v)),
        ua::Variant::QualifiedName(v) => Variant::QualifiedName(from_ua_qualified_name(v)),
        ua::Variant::LocalizedText(v) => Variant::LocalizedText(from_ua_localized_text(v)),
        ua::Variant::Array(array) => Variant::Array(array.values.iter().map(from_ua_variant).collect()),
        other => Variant::String(format!("{other:?}")),
    }
}

fn from_ua_data_value(value: &ua::DataValue) -> DataValue {
    DataValue {
        value: value.value.as_ref().map(from_ua_variant).unwrap_or_default(),
        status: value.status.map_or(StatusCode::GOOD, from_ua_status),
        source_timestamp: value.source_timestamp.as_ref().map(from_ua_datetime),
        server_timestamp: value.server_timestamp.as_ref().map(from_ua_datetime),
    }
}

fn to_ua_read_value_id(node_id: &NodeId, attribute: Attribute, index_range: Option<&str>) -> ua::ReadValueId {
    ua::ReadValueId {
        node_id: to_ua_node_id(node_id),
        attribute_id: attribute.wire_id(),
        index_range: index_range.map_or_else(ua::UAString::null, ua::UAString::from),
        data_encoding: ua::QualifiedName::null(),
    }
}

fn to_ua_node_class(node_class: NodeClass) -> ua::NodeClass {
    match node_class {
        NodeClass::Unspecified => ua::NodeClass::Unspecified,
        NodeClass::Object => ua::NodeClass::Object,
        NodeClass::Variable => ua::NodeClass::Variable,
        NodeClass::Method => ua::NodeClass::Method,
        NodeClass::ObjectType => ua::NodeClass::ObjectType,
        NodeClass::VariableType => ua::NodeClass::VariableType,
        NodeClass::ReferenceType => ua::NodeClass::ReferenceType,
        NodeClass::DataType => ua::NodeClass::DataType,
        NodeClass::View => ua::NodeClass::View,
    }
}

fn from_ua_reference(reference: &ua::ReferenceDescription) -> ReferenceDescription {
    ReferenceDescription {
        reference_type: from_ua_node_id(&reference.reference_type_id),
        is_forward: reference.is_forward,
        target_node_id: from_ua_node_id(&reference.node_id.node_id),
        browse_name: from_ua_qualified_name(&reference.browse_name),
        display_name: from_ua_localized_text(&reference.display_name),
        node_class: NodeClass::from_value(reference.node_class as i32).unwrap_or(NodeClass::Unspecified),
        type_definition: from_ua_node_id(&reference.type_definition.node_id),
    }
}

fn to_ua_relative_path(path: &[RelativePathElement]) -> ua::RelativePath {
    ua::RelativePath {
        elements: Some(
            path.iter()
                .map(|element| ua::RelativePathElement {
                    reference_type_id: to_ua_node_id(&element.reference_type),
                    is_inverse: element.is_inverse,
                    include_subtypes: element.include_subtypes,
                    target_name: to_ua_qualified_name(&element.target_name),
                })
                .collect(),
        ),
    }
}

fn from_ua_application(application: &ua::ApplicationDescription) -> ApplicationDescription {
    ApplicationDescription {
        application_uri: application.application_uri.as_ref().to_string(),
        product_uri: application.product_uri.as_ref().to_string(),
        application_name: from_ua_localized_text(&application.application_name),
        application_type: match application.application_type {
            ua::ApplicationType::Client => ApplicationType::Client,
            ua::ApplicationType::ClientAndServer => ApplicationType::ClientAndServer,
            ua::ApplicationType::DiscoveryServer => ApplicationType::DiscoveryServer,
            _ => ApplicationType::Server,
        },
        discovery_urls: application
            .discovery_urls
            .iter()
            .flatten()
            .map(|url| url.as_ref().to_string())
            .collect(),
    }
}

fn from_ua_endpoint(endpoint: &ua::EndpointDescription) -> EndpointDescription {
    EndpointDescription {
        endpoint_url: endpoint.endpoint_url.as_ref().to_string(),
        security_policy_uri: endpoint.security_policy_uri.as_ref().to_string(),
        security_mode: MessageSecurityMode::from_value(endpoint.security_mode as u32),
        security_level: endpoint.security_level,
        user_identity_tokens: endpoint
            .user_identity_tokens
            .iter()
            .flatten()
            .map(|policy| match policy.token_type {
                ua::UserTokenType::UserName => UserTokenType::UserName,
                ua::UserTokenType::Certificate => UserTokenType::Certificate,
                ua::UserTokenType::IssuedToken => UserTokenType::IssuedToken,
                _ => UserTokenType::Anonymous,
            })
            .collect(),
        server_certificate: endpoint.server_certificate.value.clone().unwrap_or_default(),
        server: from_ua_application(&endpoint.server),
    }
}

// =============================================================================
// Monitoring conversions
// =============================================================================

fn to_ua_monitoring_mode(mode: MonitoringMode) -> ua::MonitoringMode {
    match mode {
        MonitoringMode::Disabled => ua::MonitoringMode::Disabled,
        MonitoringMode::Sampling => ua::MonitoringMode::Sampling,
        MonitoringMode::Reporting => ua::MonitoringMode::Reporting,
    }
}

fn to_ua_parameters(parameters: &MonitoringParameters, client_handle: u32) -> ua::MonitoringParameters {
    ua::MonitoringParameters {
        client_handle,
        sampling_interval: parameters.sampling_interval,
        filter: to_ua_filter(&parameters.filter),
        queue_size: parameters.queue_size,
        discard_oldest: parameters.discard_oldest,
    }
}

fn to_ua_filter(filter: &MonitoringFilter) -> ua::ExtensionObject {
    match filter {
        MonitoringFilter::None => ua::ExtensionObject::null(),
        MonitoringFilter::DataChange(filter) => {
            let encoded = ua::DataChangeFilter {
                trigger: match filter.trigger {
                    DataChangeTrigger::Status => ua::DataChangeTrigger::Status,
                    DataChangeTrigger::StatusOrValue => ua::DataChangeTrigger::StatusValue,
                    DataChangeTrigger::StatusOrValueOrTimestamp => ua::DataChangeTrigger::StatusValueTimestamp,
                },
                deadband_type: match filter.deadband_type {
                    DeadbandType::None => 0,
                    DeadbandType::Absolute => 1,
                    DeadbandType::Percent => 2,
                },
                deadband_value: filter.deadband_value,
            };
            ua::ExtensionObject::from_encodable(ua::ObjectId::DataChangeFilter_Encoding_DefaultBinary, &encoded)
        }
        MonitoringFilter::Event(filter) => {
            ua::ExtensionObject::from_encodable(ua::ObjectId::EventFilter_Encoding_DefaultBinary, &to_ua_event_filter(filter))
        }
    }
}

fn to_ua_event_filter(filter: &EventFilter) -> ua::EventFilter {
    ua::EventFilter {
        select_clauses: Some(filter.select_clauses.iter().map(to_ua_simple_operand).collect()),
        where_clause: to_ua_content_filter(&filter.where_clause),
    }
}

fn to_ua_simple_operand(operand: &SimpleAttributeOperand) -> ua::SimpleAttributeOperand {
    ua::SimpleAttributeOperand {
        type_definition_id: to_ua_node_id(&operand.type_definition_id),
        browse_path: Some(operand.browse_path.iter().map(to_ua_qualified_name).collect()),
        attribute_id: operand.attribute.wire_id(),
        index_range: operand
            .index_range
            .as_deref()
            .map_or_else(ua::UAString::null, ua::UAString::from),
    }
}

fn to_ua_content_filter(filter: &ContentFilter) -> ua::ContentFilter {
    ua::ContentFilter {
        elements: Some(
            filter
                .elements
                .iter()
                .map(|element| ua::ContentFilterElement {
                    filter_operator: to_ua_operator(element.operator),
                    filter_operands: Some(element.operands.iter().map(to_ua_operand).collect()),
                })
                .collect(),
        ),
    }
}

fn to_ua_operand(operand: &FilterOperand) -> ua::ExtensionObject {
    match operand {
        FilterOperand::Literal(value) => ua::ExtensionObject::from_encodable(
            ua::ObjectId::LiteralOperand_Encoding_DefaultBinary,
            &ua::LiteralOperand {
                value: to_ua_variant(value),
            },
        ),
        FilterOperand::Element(index) => ua::ExtensionObject::from_encodable(
            ua::ObjectId::ElementOperand_Encoding_DefaultBinary,
            &ua::ElementOperand { index: *index },
        ),
        FilterOperand::SimpleAttribute(operand) => ua::ExtensionObject::from_encodable(
            ua::ObjectId::SimpleAttributeOperand_Encoding_DefaultBinary,
            &to_ua_simple_operand(operand),
        ),
        FilterOperand::Attribute(operand) => ua::ExtensionObject::from_encodable(
            ua::ObjectId::AttributeOperand_Encoding_DefaultBinary,
            &ua::AttributeOperand {
                node_id: to_ua_node_id(&operand.node_id),
                alias: ua::UAString::from(operand.alias.as_str()),
                browse_path: to_ua_relative_path(&operand.browse_path),
                attribute_id: operand.attribute.wire_id(),
                index_range: operand
                    .index_range
                    .as_deref()
                    .map_or_else(ua::UAString::null, ua::UAString::from),
            },
        ),
    }
}

fn to_ua_operator(operator: FilterOperator) -> ua::FilterOperator {
    match operator {
        FilterOperator::Equals => ua::FilterOperator::Equals,
        FilterOperator::IsNull => ua::FilterOperator::IsNull,
        FilterOperator::GreaterThan => ua::FilterOperator::GreaterThan,
        FilterOperator::LessThan => ua::FilterOperator::LessThan,
        FilterOperator::GreaterThanOrEqual => ua::FilterOperator::GreaterThanOrEqual,
        FilterOperator::LessThanOrEqual => ua::FilterOperator::LessThanOrEqual,
        FilterOperator::Like => ua::FilterOperator::Like,
        FilterOperator::Not => ua::FilterOperator::Not,
        FilterOperator::Between => ua::FilterOperator::Between,
        FilterOperator::InList => ua::FilterOperator::InList,
        FilterOperator::And => ua::FilterOperator::And,
        FilterOperator::Or => ua::FilterOperator::Or,
        FilterOperator::Cast => ua::FilterOperator::Cast,
        FilterOperator::InView => ua::FilterOperator::InView,
        FilterOperator::OfType => ua::FilterOperator::OfType,
        FilterOperator::RelatedTo => ua::FilterOperator::RelatedTo,
        FilterOperator::BitwiseAnd => ua::FilterOperator::BitwiseAnd,
        FilterOperator::BitwiseOr => ua::FilterOperator::BitwiseOr,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::DataChangeFilter;

    #[test]
    fn test_node_id_conversion() {
        let ids = [
            NodeId::numeric(0, 2255),
            NodeId::string(2, "Demo.Temperature"),
            NodeId::guid(1, uuid::Uuid::nil()),
            NodeId::opaque(3, vec![1, 2, 3]),
        ];
        for id in ids {
            assert_eq!(from_ua_node_id(&to_ua_node_id(&id)), id);
        }
    }

    #[test]
    fn test_variant_conversion() {
        let value = Variant::Array(vec![Variant::Int32(1), Variant::Int32(2)]);
        assert_eq!(from_ua_variant(&to_ua_variant(&value)), value);
        let text = Variant::LocalizedText(LocalizedText::new("en", "Pump"));
        assert_eq!(from_ua_variant(&to_ua_variant(&text)), text);
    }

    #[test]
    fn test_routes() {
        let mut routes = Routes::default();
        let route = ItemRoute {
            handle: 9,
            subscription_id: 4,
            attribute: Attribute::Value,
        };
        let client_handle = routes.allocate(route);
        routes.bind(100, client_handle);
        let other = routes.allocate(ItemRoute {
            subscription_id: 5,
            ..route
        });
        routes.bind(101, other);

        routes.release_item(100);
        assert!(!routes.by_client_handle.contains_key(&client_handle));

        routes.release_subscription(5);
        assert!(routes.by_client_handle.is_empty());
        assert!(routes.by_item_id.is_empty());
    }

    #[test]
    fn test_data_change_filter_encoded() {
        let filter = MonitoringFilter::DataChange(DataChangeFilter::absolute(0.5));
        assert!(!to_ua_filter(&filter).is_null());
        assert!(to_ua_filter(&MonitoringFilter::None).is_null());
    }

    #[tokio::test]
    async fn test_requires_connection() {
        let backend = OpcUaBackend::new();
        assert_eq!(backend.state(), ConnectionState::Disconnected);
        let err = backend
            .browse(RequestTag::new(None, 1), &NodeId::OBJECTS_FOLDER, &BrowseRequest::default())
            .unwrap_err();
        assert!(err.to_string().to_lowercase().contains("not connected"));
    }
}
