// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Request correlation engine.
//!
//! The engine sits between client objects and the [`Backend`]. It owns the
//! handle registry, the pending request table and the subscription table,
//! and runs one dispatcher task per connection that drains the backend's
//! event bus:
//!
//! ```text
//! Node ──request──▶ Engine ──dispatch──▶ Backend
//!   ▲                 │                     │
//!   │ Completion      │ pending table       │ EventSink
//!   └──── oneshot ◀───┴──── dispatcher ◀────┘
//! ```
//!
//! Events for a handle that is no longer registered are dropped and
//! counted; they never reach a released node. The one exception is the
//! enable acknowledgement of an item whose node was released while the
//! enable was in flight: the engine disables that item on the server.

pub(crate) mod registry;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::backend::{
    Backend, BackendEvent, EventEnvelope, EventSink, Handle, MonitoringChange, RequestId, RequestTag,
};
use crate::completion::Completion;
use crate::error::{DispatchError, DispatchResult, UaResult};
use crate::monitoring::SubscriptionType;
use crate::subscription::{AckOutcome, MonitoredItemKey, Subscription};
use crate::types::{Attribute, ConnectionState};
use crate::universal_node::NamespaceArray;

use registry::{Delivery, HandleRegistry, NodeRoute, PendingTable};

/// Buffered connection-level events before slow receivers lag.
const CONNECTION_EVENT_CAPACITY: usize = 1024;

// =============================================================================
// Statistics
// =============================================================================

/// Counters for the engine.
#[derive(Debug, Default)]
pub struct EngineStats {
    requests_dispatched: AtomicU64,
    requests_rejected: AtomicU64,
    completions_delivered: AtomicU64,
    completions_dropped: AtomicU64,
    notifications_forwarded: AtomicU64,
    notifications_dropped: AtomicU64,
}

impl EngineStats {
    fn record_dispatched(&self) {
        self.requests_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    fn record_rejected(&self) {
        self.requests_rejected.fetch_add(1, Ordering::Relaxed);
    }

    fn record_completion(&self) {
        self.completions_delivered.fetch_add(1, Ordering::Relaxed);
    }

    fn record_dropped_completion(&self) {
        self.completions_dropped.fetch_add(1, Ordering::Relaxed);
    }

    fn record_notification(&self) {
        self.notifications_forwarded.fetch_add(1, Ordering::Relaxed);
    }

    fn record_dropped_notification(&self) {
        self.notifications_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a point-in-time copy of the counters.
    pub fn snapshot(&self) -> EngineStatsSnapshot {
        EngineStatsSnapshot {
            requests_dispatched: self.requests_dispatched.load(Ordering::Relaxed),
            requests_rejected: self.requests_rejected.load(Ordering::Relaxed),
            completions_delivered: self.completions_delivered.load(Ordering::Relaxed),
            completions_dropped: self.completions_dropped.load(Ordering::Relaxed),
            notifications_forwarded: self.notifications_forwarded.load(Ordering::Relaxed),
            notifications_dropped: self.notifications_dropped.load(Ordering::Relaxed),
        }
    }

    /// Resets all counters.
    pub fn reset(&self) {
        self.requests_dispatched.store(0, Ordering::Relaxed);
        self.requests_rejected.store(0, Ordering::Relaxed);
        self.completions_delivered.store(0, Ordering::Relaxed);
        self.completions_dropped.store(0, Ordering::Relaxed);
        self.notifications_forwarded.store(0, Ordering::Relaxed);
        self.notifications_dropped.store(0, Ordering::Relaxed);
    }
}

/// Copy of the engine counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct EngineStatsSnapshot {
    /// Requests accepted and handed to the backend.
    pub requests_dispatched: u64,
    /// Requests the backend refused synchronously.
    pub requests_rejected: u64,
    /// Pending requests resolved.
    pub completions_delivered: u64,
    /// Completions nobody waited for, or for unregistered handles.
    pub completions_dropped: u64,
    /// Notifications forwarded to a monitoring node.
    pub notifications_forwarded: u64,
    /// Notifications without a monitored listener.
    pub notifications_dropped: u64,
}

// =============================================================================
// EventStream
// =============================================================================

/// A stream of backend events for one node or for the whole connection.
///
/// Slow receivers skip ahead when the buffer overflows.
#[derive(Debug)]
pub struct EventStream {
    receiver: broadcast::Receiver<BackendEvent>,
    attribute: Option<Attribute>,
}

impl EventStream {
    pub(crate) fn new(receiver: broadcast::Receiver<BackendEvent>) -> Self {
        Self {
            receiver,
            attribute: None,
        }
    }

    /// Only yields events concerning `attribute`.
    pub fn filter_attribute(mut self, attribute: Attribute) -> Self {
        self.attribute = Some(attribute);
        self
    }

    /// Receives the next event; `None` once the source is gone.
    pub async fn recv(&mut self) -> Option<BackendEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.accepts(&event) => return Some(event),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    warn!(count, "Event stream lagged, events dropped");
                }
            }
        }
    }

    /// Returns the next buffered event without waiting.
    pub fn try_recv(&mut self) -> Option<BackendEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.accepts(&event) => return Some(event),
                Ok(_) | Err(broadcast::error::TryRecvError::Lagged(_)) => {}
                Err(_) => return None,
            }
        }
    }

    fn accepts(&self, event: &BackendEvent) -> bool {
        match self.attribute {
            Some(attribute) => event.attribute() == Some(attribute),
            None => true,
        }
    }
}

// =============================================================================
// Engine
// =============================================================================

/// Shared state of one connection.
pub(crate) struct Engine {
    backend: Arc<dyn Backend>,
    state: AtomicU8,
    next_request_id: AtomicU64,
    handles: HandleRegistry,
    pending: PendingTable,
    subscriptions: Mutex<HashMap<u32, Weak<Subscription>>>,
    /// Items released while `Enabling`, keyed to their subscription id.
    orphans: Mutex<HashMap<MonitoredItemKey, u32>>,
    namespaces: RwLock<Arc<NamespaceArray>>,
    events: broadcast::Sender<BackendEvent>,
    stats: EngineStats,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl Engine {
    pub(crate) fn new(backend: Arc<dyn Backend>) -> Arc<Self> {
        let (events, _) = broadcast::channel(CONNECTION_EVENT_CAPACITY);
        Arc::new(Self {
            backend,
            state: AtomicU8::new(ConnectionState::Disconnected.as_u8()),
            next_request_id: AtomicU64::new(1),
            handles: HandleRegistry::new(),
            pending: PendingTable::new(),
            subscriptions: Mutex::new(HashMap::new()),
            orphans: Mutex::new(HashMap::new()),
            namespaces: RwLock::new(Arc::new(NamespaceArray::default())),
            events,
            stats: EngineStats::default(),
            dispatcher: Mutex::new(None),
        })
    }

    pub(crate) fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    // =========================================================================
    // State
    // =========================================================================

    pub(crate) fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn set_state(&self, state: ConnectionState) {
        let previous = ConnectionState::from_u8(self.state.swap(state.as_u8(), Ordering::AcqRel));
        if previous != state {
            debug!(from = %previous, to = %state, backend = self.backend.name(), "Connection state changed");
        }
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    pub(crate) fn ensure_connected(&self) -> DispatchResult<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(DispatchError::NotConnected.into())
        }
    }

    pub(crate) fn stats(&self) -> &EngineStats {
        &self.stats
    }

    pub(crate) fn events(&self) -> EventStream {
        EventStream::new(self.events.subscribe())
    }

    // =========================================================================
    // Namespaces
    // =========================================================================

    pub(crate) fn namespaces(&self) -> Arc<NamespaceArray> {
        self.namespaces.read().clone()
    }

    pub(crate) fn set_namespaces(&self, namespaces: NamespaceArray) {
        *self.namespaces.write() = Arc::new(namespaces);
    }

    // =========================================================================
    // Handles
    // =========================================================================

    pub(crate) fn register_route(&self, route: Arc<NodeRoute>) -> DispatchResult<Handle> {
        let handle = self
            .handles
            .register(route)
            .ok_or(DispatchError::HandleNotRegistered { handle: 0 })?;
        trace!(handle, "Handle registered");
        Ok(handle)
    }

    /// Unregisters a handle and discards its pending requests.
    pub(crate) fn release_handle(&self, handle: Handle) -> usize {
        self.handles.unregister(handle);
        self.pending.discard_handle(handle)
    }

    pub(crate) fn is_registered(&self, handle: Handle) -> bool {
        self.handles.contains(handle)
    }

    pub(crate) fn registered_handles(&self) -> usize {
        self.handles.len()
    }

    /// Drops a node's reference to `subscription` for one attribute.
    pub(crate) fn detach_route(&self, handle: Handle, attribute: Attribute, subscription: &Subscription) {
        if let Some(route) = self.handles.get(handle) {
            let released = route.release(attribute, subscription);
            drop(released);
        }
    }

    // =========================================================================
    // Requests
    // =========================================================================

    fn next_request_id(&self) -> RequestId {
        loop {
            let id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
            if id != RequestTag::UNTRACKED {
                return id;
            }
        }
    }

    /// Dispatches a request expecting `expected` completion events.
    ///
    /// Nothing reaches the backend unless the connection is up and the
    /// handle (if any) is registered.
    pub(crate) fn request<T, F, M>(
        &self,
        handle: Option<Handle>,
        expected: usize,
        operation: &'static str,
        issue: F,
        map: M,
    ) -> DispatchResult<Completion<T>>
    where
        F: FnOnce(&dyn Backend, RequestTag) -> DispatchResult<()>,
        M: FnOnce(RequestId, Vec<BackendEvent>) -> UaResult<T> + Send + 'static,
    {
        self.ensure_connected()?;
        if let Some(handle) = handle {
            if !self.handles.contains(handle) {
                return Err(DispatchError::HandleNotRegistered { handle }.into());
            }
        }

        let request_id = self.next_request_id();
        let rx = self.pending.insert(request_id, handle, expected);
        if let Err(error) = issue(self.backend.as_ref(), RequestTag::new(handle, request_id)) {
            self.pending.remove(request_id);
            self.stats.record_rejected();
            debug!(request_id, operation, error = %error, "Request rejected by backend");
            return Err(error);
        }

        self.stats.record_dispatched();
        trace!(request_id, ?handle, operation, expected, "Request dispatched");
        Ok(Completion::pending(request_id, rx, map))
    }

    /// Dispatches a request nobody waits on. Failures are logged only.
    pub(crate) fn fire_and_forget<F>(&self, handle: Option<Handle>, operation: &'static str, issue: F)
    where
        F: FnOnce(&dyn Backend, RequestTag) -> DispatchResult<()>,
    {
        if !self.is_connected() {
            return;
        }
        match issue(self.backend.as_ref(), RequestTag::untracked(handle)) {
            Ok(()) => self.stats.record_dispatched(),
            Err(error) => debug!(?handle, operation, error = %error, "Untracked request rejected"),
        }
    }

    /// Resolves every pending request as abandoned.
    ///
    /// Tasks waiting for an item to settle are woken and see the
    /// disconnected state.
    pub(crate) fn abandon_pending(&self) -> usize {
        self.orphans.lock().clear();
        for subscription in self.live_subscriptions() {
            subscription.wake_waiters();
        }
        self.pending.clear()
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    pub(crate) fn register_subscription(&self, subscription: &Arc<Subscription>) {
        self.subscriptions
            .lock()
            .insert(subscription.id(), Arc::downgrade(subscription));
    }

    /// Removes the entry for `id` if it still belongs to `subscription`.
    pub(crate) fn unregister_subscription(&self, id: u32, subscription: *const Subscription) {
        let mut subscriptions = self.subscriptions.lock();
        if subscriptions
            .get(&id)
            .is_some_and(|weak| std::ptr::eq(weak.as_ptr(), subscription))
        {
            subscriptions.remove(&id);
        }
    }

    pub(crate) fn subscription(&self, id: u32) -> Option<Arc<Subscription>> {
        self.subscriptions.lock().get(&id).and_then(Weak::upgrade)
    }

    pub(crate) fn live_subscriptions(&self) -> Vec<Arc<Subscription>> {
        let mut subscriptions = self.subscriptions.lock();
        subscriptions.retain(|_, weak| weak.strong_count() > 0);
        let mut live: Vec<_> = subscriptions.values().filter_map(Weak::upgrade).collect();
        live.sort_by_key(|s| s.id());
        live
    }

    /// Disables `key` on the server once its pending enable is
    /// acknowledged. Used for items whose node went away mid-enable.
    pub(crate) fn disable_when_enabled(&self, key: MonitoredItemKey, subscription_id: u32) {
        self.orphans.lock().insert(key, subscription_id);
    }

    #[cfg(test)]
    pub(crate) fn orphan_count(&self) -> usize {
        self.orphans.lock().len()
    }

    fn settle_orphan(&self, handle: Handle, event: &BackendEvent) {
        let BackendEvent::MonitoringStatusChanged {
            subscription_id,
            attribute,
            change: MonitoringChange::Enabled,
            parameters,
            status,
        } = event
        else {
            return;
        };
        let key = MonitoredItemKey::new(handle, *attribute);
        {
            let mut orphans = self.orphans.lock();
            if orphans.get(&key) != Some(subscription_id) {
                return;
            }
            orphans.remove(&key);
        }

        let item_id = parameters.monitored_item_id;
        if !status.is_good() || item_id == 0 {
            return;
        }
        let subscription_id = *subscription_id;
        let attribute = *attribute;
        debug!(handle, subscription_id, item_id, %attribute, "Disabling item of a released node");
        self.fire_and_forget(None, "disable_monitoring", |backend, tag| {
            backend.disable_monitoring(tag, subscription_id, vec![(attribute, item_id)])
        });
    }

    /// Finds a shared subscription for a requested publishing interval.
    pub(crate) fn find_shared(&self, publishing_interval: f64) -> Option<Arc<Subscription>> {
        self.live_subscriptions().into_iter().find(|subscription| {
            subscription.subscription_type() == SubscriptionType::Shared
                && subscription.matches_interval(publishing_interval)
        })
    }

    // =========================================================================
    // Dispatcher
    // =========================================================================

    /// Starts a dispatcher task and returns the sink feeding it.
    ///
    /// A previous dispatcher is stopped.
    pub(crate) fn start_dispatcher(self: &Arc<Self>) -> EventSink {
        let (sink, mut rx) = EventSink::channel();
        let engine = Arc::downgrade(self);
        let task = tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                let Some(engine) = engine.upgrade() else {
                    break;
                };
                engine.dispatch(envelope);
            }
            trace!("Dispatcher stopped");
        });
        if let Some(previous) = self.dispatcher.lock().replace(task) {
            previous.abort();
        }
        sink
    }

    pub(crate) fn stop_dispatcher(&self) {
        if let Some(task) = self.dispatcher.lock().take() {
            task.abort();
        }
    }

    /// Routes one envelope.
    pub(crate) fn dispatch(&self, envelope: EventEnvelope) {
        let EventEnvelope {
            handle,
            request_id,
            event,
        } = envelope;

        if let Some(handle) = handle {
            self.settle_orphan(handle, &event);
        }

        let route = match handle {
            Some(handle) => match self.handles.get(handle) {
                Some(route) => Some((handle, route)),
                None => {
                    if event.is_notification() {
                        self.stats.record_dropped_notification();
                    } else {
                        self.stats.record_dropped_completion();
                    }
                    debug!(handle, event = event.name(), "Dropping event for unregistered handle");
                    return;
                }
            },
            None => None,
        };

        match &event {
            BackendEvent::StateChanged { state } => {
                self.set_state(*state);
                if *state == ConnectionState::Disconnected {
                    let abandoned = self.abandon_pending();
                    if abandoned > 0 {
                        debug!(abandoned, "Pending requests abandoned on disconnect");
                    }
                }
            }
            BackendEvent::ConnectionError { status, message } => {
                warn!(status = %status, message = %message, backend = self.backend.name(), "Backend connection error");
            }
            _ => {}
        }

        if event.is_notification() {
            self.forward_notification(route, event);
            return;
        }

        match &route {
            Some((handle, route)) => {
                self.apply_acknowledgement(*handle, route, &event);
                route.publish(event.clone());
            }
            None => {
                let _ = self.events.send(event.clone());
            }
        }

        match request_id {
            None | Some(RequestTag::UNTRACKED) => {}
            Some(request_id) => match self.pending.deliver(request_id, event) {
                Delivery::Completed => self.stats.record_completion(),
                Delivery::Partial => {}
                Delivery::Unknown => {
                    self.stats.record_dropped_completion();
                    trace!(request_id, "Completion without a waiter");
                }
            },
        }
    }

    fn forward_notification(&self, route: Option<(Handle, Arc<NodeRoute>)>, event: BackendEvent) {
        let (subscription_id, attribute) = match &event {
            BackendEvent::DataChangeOccurred {
                subscription_id,
                attribute,
                ..
            } => (*subscription_id, *attribute),
            BackendEvent::EventOccurred { subscription_id, .. } => (*subscription_id, Attribute::EventNotifier),
            _ => return,
        };

        let monitored = route.and_then(|(handle, route)| {
            let subscription = self.subscription(subscription_id)?;
            subscription
                .item_state(&MonitoredItemKey::new(handle, attribute))
                .is_some_and(|state| state.is_monitored())
                .then_some((subscription, route))
        });

        match monitored {
            Some((subscription, route)) => {
                if let BackendEvent::DataChangeOccurred { value, .. } = &event {
                    route.update_cache(attribute, value.clone());
                }
                route.publish(event);
                subscription.record_notification();
                self.stats.record_notification();
            }
            None => {
                self.stats.record_dropped_notification();
                trace!(subscription_id, %attribute, "Notification without a monitored listener");
            }
        }
    }

    fn apply_acknowledgement(&self, handle: Handle, route: &NodeRoute, event: &BackendEvent) {
        match event {
            BackendEvent::AttributesRead { results, .. } => {
                for result in results.iter().filter(|r| r.is_good()) {
                    route.update_cache(result.attribute, result.data_value());
                }
            }
            BackendEvent::MonitoringStatusChanged {
                subscription_id,
                attribute,
                change,
                parameters,
                status,
            } => {
                let Some(subscription) = self.subscription(*subscription_id) else {
                    return;
                };
                let key = MonitoredItemKey::new(handle, *attribute);
                let outcome = subscription.acknowledge(&key, *change, *status, parameters);
                debug!(
                    handle,
                    subscription_id,
                    %attribute,
                    status = %status,
                    ?outcome,
                    "Monitoring acknowledged"
                );
                if outcome == AckOutcome::Removed {
                    let released = route.release(*attribute, &subscription);
                    drop(subscription);
                    drop(released);
                }
            }
            BackendEvent::MonitoringParametersChanged {
                subscription_id,
                attribute,
                parameters,
                status,
            } if status.is_good() => {
                if let Some(subscription) = self.subscription(*subscription_id) {
                    subscription.update_parameters(&MonitoredItemKey::new(handle, *attribute), parameters);
                }
            }
            _ => {}
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Some(task) = self.dispatcher.get_mut().take() {
            task.abort();
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("backend", &self.backend.name())
            .field("state", &self.state())
            .field("handles", &self.handles.len())
            .field("pending", &self.pending.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SimulatedBackend;
    use crate::monitoring::MonitoringParameters;
    use crate::status::StatusCode;
    use crate::types::NodeId;

    fn engine() -> Arc<Engine> {
        Engine::new(Arc::new(SimulatedBackend::new()))
    }

    #[test]
    fn test_request_requires_connection() {
        let engine = engine();
        let result = engine.request(None, 1, "browse", |_, _| Ok(()), |_, _| Ok(()));
        assert!(matches!(
            result,
            Err(crate::error::UaError::Dispatch(DispatchError::NotConnected))
        ));
        assert_eq!(engine.stats().snapshot().requests_dispatched, 0);
    }

    #[tokio::test]
    async fn test_dispatch_drops_unregistered_handle() {
        let engine = engine();
        engine.set_state(ConnectionState::Connected);

        let route = Arc::new(NodeRoute::new(NodeId::numeric(2, 7)));
        let handle = engine.register_route(route).unwrap();
        let completion = engine
            .request(Some(handle), 1, "delete_node", |_, _| Ok(()), |_, events| Ok(events.len()))
            .unwrap();
        let request_id = completion.request_id().unwrap();

        engine.release_handle(handle);
        engine.dispatch(EventEnvelope {
            handle: Some(handle),
            request_id: Some(request_id),
            event: BackendEvent::NodeDeleted {
                node_id: NodeId::numeric(2, 7),
                status: StatusCode::GOOD,
            },
        });

        assert!(completion.await.is_err());
        assert_eq!(engine.stats().snapshot().completions_dropped, 1);
    }

    #[tokio::test]
    async fn test_enable_acknowledgement_settles_released_item() {
        let engine = engine();
        engine.set_state(ConnectionState::Connected);
        let handle = engine
            .register_route(Arc::new(NodeRoute::new(NodeId::numeric(2, 9))))
            .unwrap();
        engine.disable_when_enabled(MonitoredItemKey::new(handle, Attribute::Value), 4);
        engine.release_handle(handle);

        let enabled = |subscription_id: u32| EventEnvelope {
            handle: Some(handle),
            request_id: Some(1),
            event: BackendEvent::MonitoringStatusChanged {
                subscription_id,
                attribute: Attribute::Value,
                change: MonitoringChange::Enabled,
                parameters: MonitoringParameters {
                    monitored_item_id: 11,
                    ..MonitoringParameters::default()
                },
                status: StatusCode::GOOD,
            },
        };
        engine.dispatch(enabled(5));
        assert_eq!(engine.orphan_count(), 1);
        engine.dispatch(enabled(4));
        assert_eq!(engine.orphan_count(), 0);
        assert_eq!(engine.stats().snapshot().completions_dropped, 2);

        engine.disable_when_enabled(MonitoredItemKey::new(handle, Attribute::DisplayName), 4);
        engine.dispatch(EventEnvelope {
            handle: None,
            request_id: None,
            event: BackendEvent::StateChanged {
                state: ConnectionState::Disconnected,
            },
        });
        assert_eq!(engine.orphan_count(), 0);
    }

    #[tokio::test]
    async fn test_connection_level_events_are_broadcast() {
        let engine = engine();
        let mut events = engine.events();
        engine.dispatch(EventEnvelope {
            handle: None,
            request_id: None,
            event: BackendEvent::StateChanged {
                state: ConnectionState::Connected,
            },
        });
        assert!(engine.is_connected());
        assert!(matches!(events.try_recv(), Some(BackendEvent::StateChanged { .. })));
    }

    #[tokio::test]
    async fn test_rejected_request_leaves_no_pending_entry() {
        let engine = engine();
        engine.set_state(ConnectionState::Connected);
        let result = engine.request(
            None,
            1,
            "browse",
            |_, _| Err(DispatchError::rejected("browse", "queue closed").into()),
            |_, _| Ok(()),
        );
        assert!(result.is_err());
        assert_eq!(engine.pending.len(), 0);
        assert_eq!(engine.stats().snapshot().requests_rejected, 1);
    }
}
