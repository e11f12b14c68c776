// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Subscriptions and monitored items.
//!
//! A [`Subscription`] groups monitored items that share one publishing
//! interval and exclusively owns them. Nodes hold an `Arc<Subscription>`
//! for every attribute they monitor; the engine only keeps `Weak`
//! references. When the last `Arc` goes away the subscription is deleted on
//! the server, which removes all of its items.
//!
//! # Item State Machine
//!
//! | From | Event | To |
//! |------|-------|----|
//! | Unmonitored | enable dispatched | Enabling |
//! | Enabling | good acknowledgement | Monitored |
//! | Enabling | bad acknowledgement | Unmonitored (item removed) |
//! | Monitored | disable dispatched | Disabling |
//! | Disabling | any acknowledgement | Unmonitored (item removed) |
//!
//! A failed enable is not retried. Requests that need the server item id
//! (modify, disable) wait for an `Enabling` item to settle first.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::backend::{BackendEvent, Handle, MonitoringChange, MonitoringRequest, RequestId};
use crate::completion::{expect_single, unexpected, Completion};
use crate::engine::Engine;
use crate::error::{BackendError, DispatchResult, UaResult};
use crate::monitoring::{MonitoringParameters, MonitoringState, SubscriptionSettings, SubscriptionType};
use crate::status::StatusCode;
use crate::types::{Attribute, NodeId};

// =============================================================================
// MonitoredItemKey / MonitoredItem
// =============================================================================

/// Identifies a monitored item within a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MonitoredItemKey {
    /// A monitored attribute value.
    Value {
        /// Node handle.
        handle: Handle,
        /// Attribute.
        attribute: Attribute,
    },
    /// A monitored event source.
    Event {
        /// Node handle.
        handle: Handle,
    },
}

impl MonitoredItemKey {
    /// Key for `attribute` of the node behind `handle`. `EventNotifier`
    /// denotes the node's event item.
    pub const fn new(handle: Handle, attribute: Attribute) -> Self {
        match attribute {
            Attribute::EventNotifier => Self::Event { handle },
            _ => Self::Value { handle, attribute },
        }
    }

    /// Returns the node handle.
    pub const fn handle(&self) -> Handle {
        match self {
            Self::Value { handle, .. } | Self::Event { handle } => *handle,
        }
    }

    /// Returns the monitored attribute.
    pub const fn attribute(&self) -> Attribute {
        match self {
            Self::Value { attribute, .. } => *attribute,
            Self::Event { .. } => Attribute::EventNotifier,
        }
    }

    /// Returns `true` for event items.
    pub const fn is_event(&self) -> bool {
        matches!(self, Self::Event { .. })
    }
}

impl fmt::Display for MonitoredItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value { handle, attribute } => write!(f, "{handle}/{attribute}"),
            Self::Event { handle } => write!(f, "{handle}/events"),
        }
    }
}

/// One monitored item.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitoredItem {
    /// Key.
    pub key: MonitoredItemKey,
    /// Monitored node.
    pub node_id: NodeId,
    /// Current parameters; `monitored_item_id` is the server id.
    pub parameters: MonitoringParameters,
    /// Lifecycle state.
    pub state: MonitoringState,
}

impl MonitoredItem {
    /// Returns the server-assigned item id (0 until acknowledged).
    pub fn server_id(&self) -> u32 {
        self.parameters.monitored_item_id
    }
}

/// How an acknowledgement changed an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AckOutcome {
    Monitored,
    Removed,
    Ignored,
}

/// Item counts by state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ItemCounts {
    /// All items.
    pub total: usize,
    /// Enable pending.
    pub enabling: usize,
    /// Monitored.
    pub monitored: usize,
    /// Disable pending.
    pub disabling: usize,
}

// =============================================================================
// Monitoring results
// =============================================================================

/// Result of enabling, modifying or disabling one attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitoringResult {
    /// Attribute.
    pub attribute: Attribute,
    /// Server status.
    pub status: StatusCode,
    /// Revised parameters.
    pub parameters: MonitoringParameters,
}

/// Result of a monitoring request covering several attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitoringOutcome {
    /// Good if every attribute succeeded, otherwise the first bad status.
    pub status: StatusCode,
    /// Per-attribute results.
    pub results: Vec<MonitoringResult>,
}

impl MonitoringOutcome {
    /// An outcome with nothing to report.
    pub fn good() -> Self {
        Self {
            status: StatusCode::GOOD,
            results: Vec::new(),
        }
    }

    /// Builds an outcome from per-attribute results.
    pub fn from_results(results: Vec<MonitoringResult>) -> Self {
        let status = results
            .iter()
            .map(|r| r.status)
            .find(|s| !s.is_good())
            .unwrap_or(StatusCode::GOOD);
        Self { status, results }
    }

    /// Combines two outcomes.
    pub fn merge(mut self, other: MonitoringOutcome) -> Self {
        self.results.extend(other.results);
        if self.status.is_good() {
            self.status = other.status;
        }
        self
    }

    /// Returns `true` if every attribute succeeded.
    pub fn is_good(&self) -> bool {
        self.status.is_good()
    }

    /// Returns the result for `attribute`.
    pub fn result(&self, attribute: Attribute) -> Option<&MonitoringResult> {
        self.results.iter().find(|r| r.attribute == attribute)
    }
}

/// Collects monitoring acknowledgements into an outcome.
pub(crate) fn collect_outcome(request_id: RequestId, events: Vec<BackendEvent>) -> UaResult<MonitoringOutcome> {
    let results = events
        .into_iter()
        .map(|event| match event {
            BackendEvent::MonitoringStatusChanged {
                attribute,
                parameters,
                status,
                ..
            }
            | BackendEvent::MonitoringParametersChanged {
                attribute,
                parameters,
                status,
                ..
            } => Ok(MonitoringResult {
                attribute,
                status,
                parameters,
            }),
            other => Err(unexpected(request_id, &other)),
        })
        .collect::<UaResult<Vec<_>>>()?;
    Ok(MonitoringOutcome::from_results(results))
}

fn created(request_id: RequestId, events: Vec<BackendEvent>) -> UaResult<(u32, SubscriptionSettings)> {
    let (subscription_id, settings, status) = expect_single(request_id, events, |event| match event {
        BackendEvent::SubscriptionCreated {
            subscription_id,
            settings,
            status,
        } => Ok((subscription_id, settings, status)),
        other => Err(other),
    })?;
    if !status.is_good() {
        return Err(BackendError::status("create_subscription", status).into());
    }
    Ok((subscription_id, settings))
}

// =============================================================================
// Subscription
// =============================================================================

/// A server subscription and the monitored items it owns.
pub struct Subscription {
    engine: Arc<Engine>,
    id: AtomicU32,
    subscription_type: SubscriptionType,
    requested: Mutex<SubscriptionSettings>,
    revised: Mutex<SubscriptionSettings>,
    items: Mutex<HashMap<MonitoredItemKey, MonitoredItem>>,
    notifications: AtomicU64,
    /// Bumped on every acknowledgement so waiters re-check item states.
    acknowledgements: watch::Sender<u64>,
}

impl Subscription {
    fn new(
        engine: Arc<Engine>,
        id: u32,
        requested: SubscriptionSettings,
        revised: SubscriptionSettings,
        subscription_type: SubscriptionType,
    ) -> Self {
        Self {
            engine,
            id: AtomicU32::new(id),
            subscription_type,
            requested: Mutex::new(requested),
            revised: Mutex::new(revised),
            items: Mutex::new(HashMap::new()),
            notifications: AtomicU64::new(0),
            acknowledgements: watch::channel(0).0,
        }
    }

    /// Creates a subscription on the server.
    ///
    /// The local subscription is built as soon as the server answers, even
    /// if the completion is dropped; it is then deleted again when the last
    /// handle to it goes away.
    pub(crate) fn create(
        engine: &Arc<Engine>,
        settings: SubscriptionSettings,
        subscription_type: SubscriptionType,
    ) -> DispatchResult<Completion<Arc<Subscription>>> {
        settings.validate()?;
        let owner = engine.clone();
        let requested = settings.clone();
        let pending = engine.request(
            None,
            1,
            "create_subscription",
            |backend, tag| backend.create_subscription(tag, &settings),
            created,
        )?;
        Ok(Completion::spawned(async move {
            let (id, revised) = pending.await?;
            info!(
                subscription_id = id,
                requested_interval = requested.publishing_interval,
                revised_interval = revised.publishing_interval,
                "Subscription created"
            );
            let subscription = Arc::new(Subscription::new(owner, id, requested, revised, subscription_type));
            subscription.engine.register_subscription(&subscription);
            Ok(subscription)
        }))
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Returns the server subscription id.
    pub fn id(&self) -> u32 {
        self.id.load(Ordering::Acquire)
    }

    /// Returns whether other items may join.
    pub fn subscription_type(&self) -> SubscriptionType {
        self.subscription_type
    }

    /// Returns the settings revised by the server.
    pub fn settings(&self) -> SubscriptionSettings {
        self.revised.lock().clone()
    }

    /// Returns the settings as requested.
    pub fn requested_settings(&self) -> SubscriptionSettings {
        self.requested.lock().clone()
    }

    /// Returns the revised publishing interval in milliseconds.
    pub fn publishing_interval(&self) -> f64 {
        self.revised.lock().publishing_interval
    }

    /// Returns `true` if an item asking for `interval` belongs here.
    pub fn matches_interval(&self, interval: f64) -> bool {
        let same = |a: f64, b: f64| (a - b).abs() < f64::EPSILON * a.abs().max(1.0);
        same(self.requested.lock().publishing_interval, interval) || same(self.publishing_interval(), interval)
    }

    /// Returns the number of items.
    pub fn item_count(&self) -> usize {
        self.items.lock().len()
    }

    /// Returns item counts by state.
    pub fn item_counts(&self) -> ItemCounts {
        let items = self.items.lock();
        let mut counts = ItemCounts {
            total: items.len(),
            ..Default::default()
        };
        for item in items.values() {
            match item.state {
                MonitoringState::Enabling => counts.enabling += 1,
                MonitoringState::Monitored => counts.monitored += 1,
                MonitoringState::Disabling => counts.disabling += 1,
                MonitoringState::Unmonitored => {}
            }
        }
        counts
    }

    /// Returns a snapshot of all items.
    pub fn items(&self) -> Vec<MonitoredItem> {
        self.items.lock().values().cloned().collect()
    }

    /// Returns a snapshot of one item.
    pub fn item(&self, key: &MonitoredItemKey) -> Option<MonitoredItem> {
        self.items.lock().get(key).cloned()
    }

    /// Returns the state of one item.
    pub fn item_state(&self, key: &MonitoredItemKey) -> Option<MonitoringState> {
        self.items.lock().get(key).map(|item| item.state)
    }

    /// Returns the number of notifications forwarded for this subscription.
    pub fn notification_count(&self) -> u64 {
        self.notifications.load(Ordering::Relaxed)
    }

    pub(crate) fn record_notification(&self) {
        self.notifications.fetch_add(1, Ordering::Relaxed);
    }

    // =========================================================================
    // Item bookkeeping
    // =========================================================================

    /// Adds an item in `Enabling`; returns `false` if one is already live.
    pub(crate) fn insert_enabling(&self, key: MonitoredItemKey, node_id: NodeId, parameters: MonitoringParameters) -> bool {
        let mut items = self.items.lock();
        if items.get(&key).is_some_and(|item| item.state != MonitoringState::Unmonitored) {
            return false;
        }
        items.insert(
            key,
            MonitoredItem {
                key,
                node_id,
                parameters,
                state: MonitoringState::Enabling,
            },
        );
        true
    }

    /// Moves a monitored item to `Disabling` and returns its server id.
    /// Items still `Enabling` have no server id yet and are left alone.
    pub(crate) fn begin_disable(&self, key: &MonitoredItemKey) -> Option<u32> {
        let mut items = self.items.lock();
        let item = items.get_mut(key)?;
        match item.state {
            MonitoringState::Monitored => {
                item.state = MonitoringState::Disabling;
                Some(item.server_id())
            }
            _ => None,
        }
    }

    /// Removes an item regardless of state.
    pub(crate) fn detach(&self, key: &MonitoredItemKey) -> Option<MonitoredItem> {
        let removed = self.items.lock().remove(key);
        self.wake_waiters();
        removed
    }

    /// Wakes tasks waiting in [`Subscription::settled_item`].
    pub(crate) fn wake_waiters(&self) {
        self.acknowledgements
            .send_modify(|generation| *generation = generation.wrapping_add(1));
    }

    /// Waits until the item has left `Enabling` and returns it, or `None`
    /// once it is gone.
    ///
    /// # Errors
    ///
    /// Returns `NotConnected` if the connection drops while waiting.
    pub(crate) async fn settled_item(&self, key: &MonitoredItemKey) -> UaResult<Option<MonitoredItem>> {
        let mut acknowledgements = self.acknowledgements.subscribe();
        loop {
            match self.item(key) {
                Some(item) if item.state == MonitoringState::Enabling => {}
                other => return Ok(other),
            }
            self.engine.ensure_connected()?;
            if acknowledgements.changed().await.is_err() {
                return Ok(self.item(key));
            }
        }
    }

    pub(crate) fn acknowledge(
        &self,
        key: &MonitoredItemKey,
        change: MonitoringChange,
        status: StatusCode,
        parameters: &MonitoringParameters,
    ) -> AckOutcome {
        let outcome = self.transition(key, change, status, parameters);
        self.wake_waiters();
        outcome
    }

    fn transition(
        &self,
        key: &MonitoredItemKey,
        change: MonitoringChange,
        status: StatusCode,
        parameters: &MonitoringParameters,
    ) -> AckOutcome {
        let mut items = self.items.lock();
        let Some(item) = items.get_mut(key) else {
            return AckOutcome::Ignored;
        };
        match (change, item.state) {
            (MonitoringChange::Enabled, MonitoringState::Enabling) if status.is_good() => {
                item.state = MonitoringState::Monitored;
                item.parameters = parameters.clone();
                AckOutcome::Monitored
            }
            (MonitoringChange::Enabled, MonitoringState::Enabling)
            | (MonitoringChange::Disabled, MonitoringState::Disabling) => {
                items.remove(key);
                AckOutcome::Removed
            }
            (MonitoringChange::Enabled, MonitoringState::Disabling) => {
                item.parameters.monitored_item_id = parameters.monitored_item_id;
                AckOutcome::Ignored
            }
            _ => AckOutcome::Ignored,
        }
    }

    pub(crate) fn update_parameters(&self, key: &MonitoredItemKey, parameters: &MonitoringParameters) {
        if let Some(item) = self.items.lock().get_mut(key) {
            if item.state == MonitoringState::Monitored {
                item.parameters = parameters.clone();
            }
        }
    }

    // =========================================================================
    // Server operations
    // =========================================================================

    /// Changes the publishing settings; resolves to the revised settings.
    pub fn modify(self: &Arc<Self>, settings: SubscriptionSettings) -> DispatchResult<Completion<SubscriptionSettings>> {
        settings.validate()?;
        let id = self.id();
        let weak: Weak<Subscription> = Arc::downgrade(self);
        let requested = settings.clone();
        self.engine.request(
            None,
            1,
            "modify_subscription",
            |backend, tag| backend.modify_subscription(tag, id, &settings),
            move |request_id, events| {
                let (revised, status) = expect_single(request_id, events, |event| match event {
                    BackendEvent::SubscriptionModified { settings, status, .. } => Ok((settings, status)),
                    other => Err(other),
                })?;
                if !status.is_good() {
                    return Err(BackendError::status("modify_subscription", status).into());
                }
                if let Some(subscription) = weak.upgrade() {
                    *subscription.requested.lock() = requested;
                    *subscription.revised.lock() = revised.clone();
                    for item in subscription.items.lock().values_mut() {
                        item.parameters.publishing_interval = revised.publishing_interval;
                    }
                    debug!(subscription_id = id, interval = revised.publishing_interval, "Subscription modified");
                }
                Ok(revised)
            },
        )
    }

    /// Recreates the subscription after a reconnect and re-enables its
    /// items. Returns the number of items monitored again.
    pub(crate) async fn restore(self: &Arc<Self>) -> UaResult<usize> {
        let previous = self.id();
        let requested = self.requested_settings();
        let (id, revised) = self
            .engine
            .request(
                None,
                1,
                "create_subscription",
                |backend, tag| backend.create_subscription(tag, &requested),
                created,
            )?
            .await?;

        self.engine.unregister_subscription(previous, Arc::as_ptr(self));
        self.id.store(id, Ordering::Release);
        *self.revised.lock() = revised;
        self.engine.register_subscription(self);

        let mut by_handle: HashMap<Handle, Vec<MonitoringRequest>> = HashMap::new();
        let mut dropped = Vec::new();
        {
            let mut items = self.items.lock();
            items.retain(|key, item| {
                if item.state == MonitoringState::Disabling || !self.engine.is_registered(key.handle()) {
                    dropped.push(*key);
                    return false;
                }
                item.state = MonitoringState::Enabling;
                by_handle.entry(key.handle()).or_default().push(MonitoringRequest {
                    node_id: item.node_id.clone(),
                    attribute: key.attribute(),
                    parameters: item.parameters.clone(),
                });
                true
            });
        }
        for key in dropped {
            self.engine.detach_route(key.handle(), key.attribute(), self);
        }

        let mut restored = 0;
        for (handle, requests) in by_handle {
            let count = requests.len();
            let completion = self.engine.request(
                Some(handle),
                count,
                "enable_monitoring",
                |backend, tag| backend.enable_monitoring(tag, id, requests),
                collect_outcome,
            );
            match completion {
                Ok(completion) => {
                    let outcome = completion.await?;
                    restored += outcome.results.iter().filter(|r| r.status.is_good()).count();
                }
                Err(error) => warn!(handle, subscription_id = id, error = %error, "Could not restore items"),
            }
        }

        info!(previous_id = previous, subscription_id = id, restored, "Subscription restored");
        Ok(restored)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let id = *self.id.get_mut();
        let items = self.items.get_mut().len();
        self.engine.unregister_subscription(id, self as *const Subscription);
        self.engine
            .fire_and_forget(None, "delete_subscription", |backend, tag| backend.delete_subscription(tag, id));
        debug!(subscription_id = id, items, "Subscription torn down");
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id())
            .field("type", &self.subscription_type)
            .field("publishing_interval", &self.publishing_interval())
            .field("items", &self.item_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SimulatedBackend;
    use crate::types::ConnectionState;
    use std::time::Duration;

    fn subscription() -> Subscription {
        let engine = Engine::new(Arc::new(SimulatedBackend::new()));
        Subscription::new(
            engine,
            7,
            SubscriptionSettings::with_interval(100.0),
            SubscriptionSettings::with_interval(250.0),
            SubscriptionType::Shared,
        )
    }

    #[test]
    fn test_key_kinds() {
        let value = MonitoredItemKey::new(4, Attribute::Value);
        let event = MonitoredItemKey::new(4, Attribute::EventNotifier);
        assert!(!value.is_event());
        assert!(event.is_event());
        assert_eq!(event.attribute(), Attribute::EventNotifier);
        assert_eq!(value.to_string(), "4/Value");
    }

    #[test]
    fn test_item_lifecycle() {
        let subscription = subscription();
        let key = MonitoredItemKey::new(1, Attribute::Value);
        assert!(subscription.insert_enabling(key, NodeId::numeric(2, 1), MonitoringParameters::default()));
        assert!(!subscription.insert_enabling(key, NodeId::numeric(2, 1), MonitoringParameters::default()));
        assert_eq!(subscription.item_state(&key), Some(MonitoringState::Enabling));

        let mut revised = MonitoringParameters::default();
        revised.monitored_item_id = 42;
        let outcome = subscription.acknowledge(&key, MonitoringChange::Enabled, StatusCode::GOOD, &revised);
        assert_eq!(outcome, AckOutcome::Monitored);
        assert_eq!(subscription.item(&key).unwrap().server_id(), 42);

        assert_eq!(subscription.begin_disable(&key), Some(42));
        assert_eq!(subscription.begin_disable(&key), None);
        let outcome = subscription.acknowledge(&key, MonitoringChange::Disabled, StatusCode::BAD_TIMEOUT, &revised);
        assert_eq!(outcome, AckOutcome::Removed);
        assert_eq!(subscription.item_count(), 0);
    }

    #[test]
    fn test_enabling_item_is_not_disabled() {
        let subscription = subscription();
        let key = MonitoredItemKey::new(3, Attribute::Value);
        subscription.insert_enabling(key, NodeId::numeric(2, 3), MonitoringParameters::default());
        assert_eq!(subscription.begin_disable(&key), None);
        assert_eq!(subscription.item_state(&key), Some(MonitoringState::Enabling));
    }

    #[tokio::test]
    async fn test_settled_item_waits_for_acknowledgement() {
        let subscription = Arc::new(subscription());
        subscription.engine.set_state(ConnectionState::Connected);
        let key = MonitoredItemKey::new(2, Attribute::Value);
        subscription.insert_enabling(key, NodeId::numeric(2, 5), MonitoringParameters::default());

        let waiter = {
            let subscription = subscription.clone();
            tokio::spawn(async move { subscription.settled_item(&key).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        let mut revised = MonitoringParameters::default();
        revised.monitored_item_id = 9;
        subscription.acknowledge(&key, MonitoringChange::Enabled, StatusCode::GOOD, &revised);
        let item = waiter.await.unwrap().unwrap().unwrap();
        assert_eq!(item.state, MonitoringState::Monitored);
        assert_eq!(item.server_id(), 9);
    }

    #[tokio::test]
    async fn test_settled_item_fails_without_connection() {
        let subscription = subscription();
        let key = MonitoredItemKey::new(2, Attribute::Value);
        assert!(subscription.settled_item(&key).await.unwrap().is_none());

        subscription.insert_enabling(key, NodeId::numeric(2, 5), MonitoringParameters::default());
        assert!(subscription.settled_item(&key).await.is_err());
    }

    #[test]
    fn test_failed_enable_removes_item() {
        let subscription = subscription();
        let key = MonitoredItemKey::new(1, Attribute::DisplayName);
        subscription.insert_enabling(key, NodeId::numeric(2, 1), MonitoringParameters::default());
        let outcome = subscription.acknowledge(
            &key,
            MonitoringChange::Enabled,
            StatusCode::BAD_ATTRIBUTE_ID_INVALID,
            &MonitoringParameters::default(),
        );
        assert_eq!(outcome, AckOutcome::Removed);
        assert!(subscription.item_state(&key).is_none());
    }

    #[test]
    fn test_interval_matching_and_counts() {
        let subscription = subscription();
        assert!(subscription.matches_interval(100.0));
        assert!(subscription.matches_interval(250.0));
        assert!(!subscription.matches_interval(500.0));

        subscription.insert_enabling(
            MonitoredItemKey::new(1, Attribute::Value),
            NodeId::numeric(2, 1),
            MonitoringParameters::default(),
        );
        let counts = subscription.item_counts();
        assert_eq!(counts.total, 1);
        assert_eq!(counts.enabling, 1);
    }

    #[test]
    fn test_outcome_merge() {
        let good = MonitoringOutcome::from_results(vec![MonitoringResult {
            attribute: Attribute::Value,
            status: StatusCode::GOOD,
            parameters: MonitoringParameters::default(),
        }]);
        let bad = MonitoringOutcome::from_results(vec![MonitoringResult {
            attribute: Attribute::DisplayName,
            status: StatusCode::BAD_NOT_SUPPORTED,
            parameters: MonitoringParameters::default(),
        }]);
        let merged = good.merge(bad);
        assert_eq!(merged.status, StatusCode::BAD_NOT_SUPPORTED);
        assert_eq!(merged.results.len(), 2);
        assert!(merged.result(Attribute::Value).unwrap().status.is_good());
    }
}
