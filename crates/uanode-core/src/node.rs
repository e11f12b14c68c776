// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Client-side node objects.
//!
//! A [`Node`] issues attribute, monitoring, browse, method and history
//! requests for one server node. It gets an opaque handle from the engine
//! on its first request; completions for that handle are routed back to
//! the node's [`Completion`]s and its [`EventStream`].
//!
//! Every request method returns `DispatchResult<Completion<T>>`: `Err`
//! means nothing reached the backend, `Ok` means the request is on its way
//! and the completion resolves with the server's answer.
//!
//! # Example
//!
//! ```rust,ignore
//! let node = connection.node("ns=2;s=Demo.Temperature")?;
//! let value = node.read_attribute(Attribute::Value)?.await?;
//!
//! let outcome = node
//!     .enable_monitoring(Attribute::Value.mask(), MonitoringParameters::with_intervals(500.0, 100.0))?
//!     .await?;
//! let mut events = node.events();
//! while let Some(event) = events.recv().await { /* ... */ }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, trace};

use crate::backend::{attribute_type, Backend, BackendEvent, Handle, MonitoringRequest, RequestId, RequestTag};
use crate::completion::{expect_single, Completion};
use crate::engine::registry::NodeRoute;
use crate::engine::{Engine, EventStream};
use crate::error::{ConfigurationError, DispatchError, DispatchResult, SubscriptionError, UaResult};
use crate::filter::{EventFilter, MonitoringFilter};
use crate::monitoring::{MonitoringParameterChange, MonitoringParameters, MonitoringState, SubscriptionType};
use crate::services::{
    BrowseRequest, BrowsePathTarget, HistoryReadRawRequest, HistoryReadResponse, ReadItem, ReadResult,
    ReferenceDescription, RelativePathElement, TypedArgument, WriteItem, WriteResult,
};
use crate::status::StatusCode;
use crate::subscription::{
    collect_outcome, MonitoredItem, MonitoredItemKey, MonitoringOutcome, MonitoringResult, Subscription,
};
use crate::types::{Attribute, AttributeMask, DataValue, NodeId, Variant};

// =============================================================================
// Result types
// =============================================================================

/// Result of a browse.
#[derive(Debug, Clone, PartialEq)]
pub struct BrowseResult {
    /// Service status.
    pub status: StatusCode,
    /// References found.
    pub references: Vec<ReferenceDescription>,
}

/// Result of resolving a relative browse path.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPath {
    /// Good only when the server returned a single, fully resolved target.
    /// `BadNoMatch` for no target or a single partial one,
    /// `BadTooManyMatches` for several targets of any kind.
    pub status: StatusCode,
    /// The matched node when `status` is Good.
    pub node_id: Option<NodeId>,
    /// Every target the server returned.
    pub targets: Vec<BrowsePathTarget>,
}

impl ResolvedPath {
    fn from_targets(status: StatusCode, targets: Vec<BrowsePathTarget>) -> Self {
        if !status.is_good() {
            return Self {
                status,
                node_id: None,
                targets,
            };
        }
        let (status, node_id) = match targets.as_slice() {
            [target] if target.is_fully_resolved() => (StatusCode::GOOD, Some(target.target_id.clone())),
            [] | [_] => (StatusCode::BAD_NO_MATCH, None),
            _ => (StatusCode::BAD_TOO_MANY_MATCHES, None),
        };
        Self {
            status,
            node_id,
            targets,
        }
    }
}

/// Result of a method call.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodResult {
    /// Call status.
    pub status: StatusCode,
    /// Output arguments.
    pub outputs: Vec<Variant>,
    /// Per-input-argument status.
    pub input_results: Vec<StatusCode>,
}

// =============================================================================
// Node
// =============================================================================

/// A client-side object for one server node.
///
/// Dropping the node disables its monitored items, releases its
/// subscriptions and unregisters its handle. Late completions for the
/// handle are dropped.
pub struct Node {
    engine: Arc<Engine>,
    route: Arc<NodeRoute>,
    handle: AtomicU64,
}

impl Node {
    pub(crate) fn new(engine: Arc<Engine>, node_id: NodeId) -> Self {
        Self {
            engine,
            route: Arc::new(NodeRoute::new(node_id)),
            handle: AtomicU64::new(0),
        }
    }

    /// Returns the node id.
    pub fn node_id(&self) -> &NodeId {
        self.route.node_id()
    }

    /// Returns the opaque handle, 0 until the first request.
    pub fn handle(&self) -> Handle {
        self.handle.load(Ordering::Acquire)
    }

    /// Returns `true` once the node has a registered handle.
    pub fn is_registered(&self) -> bool {
        let handle = self.handle();
        handle != 0 && self.engine.is_registered(handle)
    }

    fn ensure_handle(&self) -> DispatchResult<Handle> {
        let current = self.handle();
        if current != 0 {
            return Ok(current);
        }
        let handle = self.engine.register_route(self.route.clone())?;
        match self
            .handle
            .compare_exchange(0, handle, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {
                trace!(handle, node_id = %self.node_id(), "Node registered");
                Ok(handle)
            }
            Err(existing) => {
                self.engine.release_handle(handle);
                Ok(existing)
            }
        }
    }

    fn request<T, F, M>(&self, expected: usize, operation: &'static str, issue: F, map: M) -> DispatchResult<Completion<T>>
    where
        F: FnOnce(&dyn Backend, RequestTag) -> DispatchResult<()>,
        M: FnOnce(RequestId, Vec<BackendEvent>) -> UaResult<T> + Send + 'static,
    {
        self.engine.ensure_connected()?;
        let handle = self.ensure_handle()?;
        self.engine.request(Some(handle), expected, operation, issue, map)
    }

    // =========================================================================
    // Attribute reads
    // =========================================================================

    /// Reads the attributes in `mask`; one result per attribute in ordinal
    /// order.
    pub fn read_attributes(
        &self,
        mask: AttributeMask,
        index_range: Option<&str>,
    ) -> DispatchResult<Completion<Vec<ReadResult>>> {
        if mask.is_empty() {
            return Err(DispatchError::EmptyRequest {
                operation: "read_attributes",
            }
            .into());
        }
        let node_id = self.node_id().clone();
        let range = index_range.map(str::to_string);
        let namespace = self
            .engine
            .namespaces()
            .uri(node_id.namespace_index)
            .map(str::to_string);
        let target = self.node_id();
        self.request(
            1,
            "read_attributes",
            |backend, tag| backend.read_attributes(tag, target, mask, index_range),
            move |request_id, events| {
                let (results, status) = expect_single(request_id, events, |event| match event {
                    BackendEvent::AttributesRead { results, status } => Ok((results, status)),
                    other => Err(other),
                })?;
                if results.is_empty() && !status.is_good() {
                    return Ok(mask
                        .iter()
                        .map(|attribute| {
                            let mut item = ReadItem::new(node_id.clone(), attribute);
                            item.index_range = range.clone();
                            ReadResult::failed(&item, status)
                        })
                        .collect());
                }
                Ok(results
                    .into_iter()
                    .map(|mut result| {
                        result.namespace_name = namespace.clone();
                        result
                    })
                    .collect())
            },
        )
    }

    /// Reads one attribute.
    pub fn read_attribute(&self, attribute: Attribute) -> DispatchResult<Completion<ReadResult>> {
        self.read_single(attribute, None)
    }

    /// Reads part of an array attribute.
    pub fn read_attribute_range(&self, attribute: Attribute, index_range: &str) -> DispatchResult<Completion<ReadResult>> {
        self.read_single(attribute, Some(index_range))
    }

    fn read_single(&self, attribute: Attribute, index_range: Option<&str>) -> DispatchResult<Completion<ReadResult>> {
        let mut fallback = ReadItem::new(self.node_id().clone(), attribute);
        fallback.index_range = index_range.map(str::to_string);
        Ok(self.read_attributes(attribute.mask(), index_range)?.map(move |results| {
            results
                .into_iter()
                .find(|result| result.attribute == attribute)
                .unwrap_or_else(|| ReadResult::failed(&fallback, StatusCode::BAD_UNEXPECTED_ERROR))
        }))
    }

    /// Returns the last known value of an attribute.
    pub fn attribute(&self, attribute: Attribute) -> Option<DataValue> {
        self.route.cached(attribute)
    }

    /// Returns the last known value of the Value attribute.
    pub fn value(&self) -> Option<DataValue> {
        self.attribute(Attribute::Value)
    }

    // =========================================================================
    // Attribute writes
    // =========================================================================

    /// Writes one attribute.
    pub fn write_attribute(&self, attribute: Attribute, value: impl Into<Variant>) -> DispatchResult<Completion<WriteResult>> {
        let item = self.write_item(attribute, value.into(), None)?;
        self.write_single(item)
    }

    /// Writes part of an array attribute.
    pub fn write_attribute_range(
        &self,
        attribute: Attribute,
        index_range: &str,
        value: impl Into<Variant>,
    ) -> DispatchResult<Completion<WriteResult>> {
        let item = self.write_item(attribute, value.into(), Some(index_range))?;
        self.write_single(item)
    }

    /// Writes several attributes in one request; results follow input order.
    pub fn write_attributes<I>(&self, values: I) -> DispatchResult<Completion<Vec<WriteResult>>>
    where
        I: IntoIterator<Item = (Attribute, Variant)>,
    {
        let items = values
            .into_iter()
            .map(|(attribute, value)| self.write_item(attribute, value, None))
            .collect::<UaResult<Vec<_>>>()?;
        if items.is_empty() {
            return Err(DispatchError::EmptyRequest {
                operation: "write_attributes",
            }
            .into());
        }
        self.request(
            1,
            "write_attributes",
            |backend, tag| backend.write_attributes(tag, items),
            |request_id, events| {
                expect_single(request_id, events, |event| match event {
                    BackendEvent::AttributesWritten { results, .. } => Ok(results),
                    other => Err(other),
                })
            },
        )
    }

    fn write_single(&self, item: WriteItem) -> DispatchResult<Completion<WriteResult>> {
        let fallback = WriteResult::new(&item, StatusCode::BAD_UNEXPECTED_ERROR);
        self.request(
            1,
            "write_attributes",
            |backend, tag| backend.write_attributes(tag, vec![item]),
            move |request_id, events| {
                let (results, status) = expect_single(request_id, events, |event| match event {
                    BackendEvent::AttributesWritten { results, status } => Ok((results, status)),
                    other => Err(other),
                })?;
                Ok(results.into_iter().next().unwrap_or(WriteResult {
                    status: if status.is_good() { fallback.status } else { status },
                    ..fallback
                }))
            },
        )
    }

    fn write_item(&self, attribute: Attribute, value: Variant, index_range: Option<&str>) -> UaResult<WriteItem> {
        let mut item = WriteItem::new(self.node_id().clone(), attribute, value);
        if let Some(value_type) = attribute_type(attribute) {
            item = item.with_type(value_type);
        }
        if let Some(range) = index_range {
            item = item.with_index_range(range);
        }
        item.value = item.typed_value()?;
        Ok(item)
    }

    // =========================================================================
    // Monitoring
    // =========================================================================

    /// Starts monitoring the attributes in `mask`.
    ///
    /// Attributes that are already monitored get their parameters modified
    /// in place; if their enable is still pending, the modify follows its
    /// acknowledgement. The rest join the subscription named by
    /// `parameters.subscription_id`, a shared subscription with the same
    /// publishing interval, or a newly created one.
    pub fn enable_monitoring(
        &self,
        mask: AttributeMask,
        parameters: MonitoringParameters,
    ) -> DispatchResult<Completion<MonitoringOutcome>> {
        if mask.is_empty() {
            return Err(DispatchError::EmptyRequest {
                operation: "enable_monitoring",
            }
            .into());
        }
        parameters.validate()?;
        let is_event_filter = matches!(parameters.filter, MonitoringFilter::Event(_));
        if mask.contains(Attribute::EventNotifier) != is_event_filter {
            return Err(ConfigurationError::invalid_filter(
                "an event filter is required for EventNotifier and only allowed there",
            )
            .into());
        }

        self.engine.ensure_connected()?;
        let handle = self.ensure_handle()?;

        let mut parts = Vec::new();
        let mut fresh = Vec::new();
        for attribute in mask.iter() {
            let key = MonitoredItemKey::new(handle, attribute);
            let current = self
                .route
                .subscription(attribute)
                .and_then(|subscription| subscription.item_state(&key).map(|state| (subscription, state)));
            match current {
                Some((_, MonitoringState::Disabling)) => {
                    return Err(DispatchError::rejected(
                        "enable_monitoring",
                        format!("{attribute} is being disabled"),
                    )
                    .into());
                }
                Some((subscription, MonitoringState::Monitored)) => {
                    parts.push(modify_item(&self.engine, handle, &subscription, attribute, parameters.clone())?);
                }
                Some((subscription, MonitoringState::Enabling)) => {
                    let parameters = parameters.clone();
                    let part = self.after_enable(handle, subscription, attribute, move |engine, route, subscription, item| {
                        match item.map(|item| item.state) {
                            Some(MonitoringState::Monitored) => {
                                modify_item(engine, handle, &subscription, attribute, parameters)
                            }
                            Some(_) => Err(DispatchError::rejected(
                                "enable_monitoring",
                                format!("{attribute} is being disabled"),
                            )
                            .into()),
                            None => enable_items(engine, route, handle, subscription, vec![attribute], parameters),
                        }
                    });
                    parts.push(part);
                }
                _ => fresh.push(attribute),
            }
        }

        if !fresh.is_empty() {
            let existing = match parameters.subscription_id {
                Some(id) => Some(
                    self.engine
                        .subscription(id)
                        .ok_or_else(|| SubscriptionError::not_found(id))?,
                ),
                None if parameters.subscription_type == SubscriptionType::Shared => {
                    self.engine.find_shared(parameters.publishing_interval)
                }
                None => None,
            };

            let part = match existing {
                Some(subscription) => enable_items(&self.engine, &self.route, handle, subscription, fresh, parameters)?,
                None => {
                    let created = Subscription::create(
                        &self.engine,
                        parameters.subscription_settings(),
                        parameters.subscription_type,
                    )?;
                    let engine = self.engine.clone();
                    let route = self.route.clone();
                    Completion::spawned(async move {
                        let subscription = created.await?;
                        enable_items(&engine, &route, handle, subscription, fresh, parameters)?.await
                    })
                }
            };
            parts.push(part);
        }

        Ok(combine(parts))
    }

    /// Starts monitoring events of this node.
    pub fn enable_event_monitoring(
        &self,
        filter: EventFilter,
        parameters: MonitoringParameters,
    ) -> DispatchResult<Completion<MonitoringOutcome>> {
        self.enable_monitoring(
            Attribute::EventNotifier.mask(),
            parameters.with_filter(MonitoringFilter::Event(filter)),
        )
    }

    /// Runs `then` once the pending enable of `attribute` is acknowledged,
    /// passing the settled item (`None` if the enable failed).
    ///
    /// The continuation runs even if the completion is dropped.
    fn after_enable<F>(
        &self,
        handle: Handle,
        subscription: Arc<Subscription>,
        attribute: Attribute,
        then: F,
    ) -> Completion<MonitoringOutcome>
    where
        F: FnOnce(
                &Engine,
                &Arc<NodeRoute>,
                Arc<Subscription>,
                Option<MonitoredItem>,
            ) -> DispatchResult<Completion<MonitoringOutcome>>
            + Send
            + 'static,
    {
        let engine = self.engine.clone();
        let route = self.route.clone();
        let key = MonitoredItemKey::new(handle, attribute);
        trace!(handle, %attribute, "Waiting for pending enable");
        Completion::spawned(async move {
            let item = subscription.settled_item(&key).await?;
            then(engine.as_ref(), &route, subscription, item)?.await
        })
    }

    /// Stops monitoring the attributes in `mask`.
    ///
    /// Attributes that are not monitored are skipped; if none is, the
    /// completion resolves immediately with Good. Items whose enable is
    /// still pending are disabled once it is acknowledged. Without a
    /// connection the items are removed locally.
    pub fn disable_monitoring(&self, mask: AttributeMask) -> DispatchResult<Completion<MonitoringOutcome>> {
        let handle = self.handle();
        if handle == 0 {
            return Ok(Completion::ready(Ok(MonitoringOutcome::good())));
        }

        let connected = self.engine.is_connected();
        let mut parts = Vec::new();
        let mut groups: HashMap<u32, (Arc<Subscription>, Vec<(Attribute, u32)>)> = HashMap::new();
        for attribute in mask.iter() {
            let Some(subscription) = self.route.subscription(attribute) else {
                continue;
            };
            let key = MonitoredItemKey::new(handle, attribute);
            if !connected {
                teardown_local(&self.route, &subscription, key);
                continue;
            }
            if subscription.item_state(&key) == Some(MonitoringState::Enabling) {
                let part = self.after_enable(handle, subscription, attribute, move |engine, route, subscription, item| {
                    let completion = item
                        .filter(|item| item.state == MonitoringState::Monitored)
                        .and_then(|_| subscription.begin_disable(&key))
                        .and_then(|server_id| {
                            disable_items(engine, route, handle, &subscription, vec![(attribute, server_id)])
                        });
                    Ok(completion.unwrap_or_else(|| Completion::ready(Ok(MonitoringOutcome::good()))))
                });
                parts.push(part);
                continue;
            }
            if let Some(server_id) = subscription.begin_disable(&key) {
                groups
                    .entry(subscription.id())
                    .or_insert_with(|| (subscription.clone(), Vec::new()))
                    .1
                    .push((attribute, server_id));
            }
        }

        for (subscription, items) in groups.into_values() {
            parts.extend(disable_items(&self.engine, &self.route, handle, &subscription, items));
        }
        Ok(combine(parts))
    }

    /// Changes one monitoring parameter of an attribute in place.
    ///
    /// Subscription-level changes apply to the whole subscription, and so
    /// to every item sharing it.
    pub fn modify_monitoring(
        &self,
        attribute: Attribute,
        change: MonitoringParameterChange,
    ) -> DispatchResult<Completion<MonitoringOutcome>> {
        let handle = self.handle();
        let key = MonitoredItemKey::new(handle, attribute);
        let (subscription, item) = self
            .route
            .subscription(attribute)
            .and_then(|subscription| subscription.item(&key).map(|item| (subscription, item)))
            .filter(|(_, item)| matches!(item.state, MonitoringState::Monitored | MonitoringState::Enabling))
            .ok_or_else(|| DispatchError::rejected("modify_monitoring", format!("{attribute} is not monitored")))?;

        if change.is_subscription_level() {
            let mut settings = subscription.requested_settings();
            change.apply_to_settings(&mut settings);
            let mut parameters = item.parameters;
            return Ok(subscription.modify(settings)?.map(move |revised| {
                parameters.publishing_interval = revised.publishing_interval;
                MonitoringOutcome::from_results(vec![MonitoringResult {
                    attribute,
                    status: StatusCode::GOOD,
                    parameters,
                }])
            }));
        }

        let mut parameters = item.parameters;
        change.apply_to(&mut parameters);
        parameters.validate()?;
        self.engine.ensure_connected()?;
        if item.state == MonitoringState::Monitored {
            return modify_item(&self.engine, handle, &subscription, attribute, parameters);
        }

        Ok(self.after_enable(handle, subscription, attribute, move |engine, _, subscription, item| {
            let item = item
                .filter(|item| item.state == MonitoringState::Monitored)
                .ok_or_else(|| DispatchError::rejected("modify_monitoring", format!("{attribute} is not monitored")))?;
            let mut parameters = item.parameters;
            change.apply_to(&mut parameters);
            modify_item(engine, handle, &subscription, attribute, parameters)
        }))
    }

    /// Returns the monitoring state of an attribute.
    pub fn monitoring_status(&self, attribute: Attribute) -> MonitoringState {
        let handle = self.handle();
        if handle == 0 {
            return MonitoringState::Unmonitored;
        }
        self.route
            .subscription(attribute)
            .and_then(|subscription| subscription.item_state(&MonitoredItemKey::new(handle, attribute)))
            .unwrap_or(MonitoringState::Unmonitored)
    }

    /// Returns the current monitoring parameters of an attribute.
    pub fn monitoring_parameters(&self, attribute: Attribute) -> Option<MonitoringParameters> {
        let key = MonitoredItemKey::new(self.handle(), attribute);
        self.route
            .subscription(attribute)
            .and_then(|subscription| subscription.item(&key))
            .map(|item| item.parameters)
    }

    /// Returns the subscription monitoring an attribute.
    pub fn subscription(&self, attribute: Attribute) -> Option<Arc<Subscription>> {
        self.route.subscription(attribute)
    }

    // =========================================================================
    // Browse
    // =========================================================================

    /// Browses references of this node.
    pub fn browse(&self, request: &BrowseRequest) -> DispatchResult<Completion<BrowseResult>> {
        let node_id = self.node_id().clone();
        self.request(
            1,
            "browse",
            |backend, tag| backend.browse(tag, &node_id, request),
            |request_id, events| {
                expect_single(request_id, events, |event| match event {
                    BackendEvent::BrowseFinished { references, status } => Ok(BrowseResult { status, references }),
                    other => Err(other),
                })
            },
        )
    }

    /// Browses forward children over `reference_type` and its subtypes.
    pub fn browse_children(
        &self,
        reference_type: NodeId,
        node_class_mask: u32,
    ) -> DispatchResult<Completion<BrowseResult>> {
        self.browse(&BrowseRequest::children(reference_type, node_class_mask))
    }

    /// Resolves a relative path starting at this node.
    pub fn resolve_browse_path(&self, path: Vec<RelativePathElement>) -> DispatchResult<Completion<ResolvedPath>> {
        if path.is_empty() {
            return Err(DispatchError::EmptyRequest {
                operation: "resolve_browse_path",
            }
            .into());
        }
        let node_id = self.node_id().clone();
        self.request(
            1,
            "translate_browse_path",
            |backend, tag| backend.translate_browse_path(tag, &node_id, &path),
            |request_id, events| {
                expect_single(request_id, events, |event| match event {
                    BackendEvent::BrowsePathResolved { targets, status, .. } => {
                        Ok(ResolvedPath::from_targets(status, targets))
                    }
                    other => Err(other),
                })
            },
        )
    }

    // =========================================================================
    // Methods
    // =========================================================================

    /// Calls `method_id` on this object.
    pub fn call_method(&self, method_id: &NodeId, arguments: Vec<TypedArgument>) -> DispatchResult<Completion<MethodResult>> {
        for argument in &arguments {
            argument.typed_value()?;
        }
        let object_id = self.node_id().clone();
        self.request(
            1,
            "call_method",
            |backend, tag| backend.call_method(tag, &object_id, method_id, arguments),
            |request_id, events| {
                expect_single(request_id, events, |event| match event {
                    BackendEvent::MethodCallFinished {
                        outputs,
                        input_results,
                        status,
                        ..
                    } => Ok(MethodResult {
                        status,
                        outputs,
                        input_results,
                    }),
                    other => Err(other),
                })
            },
        )
    }

    // =========================================================================
    // History
    // =========================================================================

    /// Reads raw history between `start` and `end`.
    ///
    /// With `num_values > 0` the result is paged; continue with
    /// [`Node::read_history_raw_continue`].
    pub fn read_history_raw(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        num_values: u32,
        return_bounds: bool,
    ) -> DispatchResult<Completion<HistoryReadResponse>> {
        if end < start {
            return Err(ConfigurationError::invalid_parameter("end", "end is before start").into());
        }
        self.history(HistoryReadRawRequest {
            start,
            end,
            num_values_per_node: num_values,
            return_bounds,
            continuation_point: None,
        })
    }

    /// Requests the page following `response`.
    pub fn read_history_raw_continue(
        &self,
        response: &HistoryReadResponse,
    ) -> DispatchResult<Completion<HistoryReadResponse>> {
        let request = response
            .next_request()
            .ok_or_else(|| ConfigurationError::invalid_parameter("continuation_point", "no more history data"))?;
        self.history(request)
    }

    fn history(&self, request: HistoryReadRawRequest) -> DispatchResult<Completion<HistoryReadResponse>> {
        let node_id = self.node_id().clone();
        self.request(
            1,
            "history_read_raw",
            |backend, tag| backend.history_read_raw(tag, &node_id, &request),
            |request_id, events| {
                expect_single(request_id, events, |event| match event {
                    BackendEvent::HistoryDataAvailable { response } => Ok(response),
                    other => Err(other),
                })
            },
        )
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Returns a stream of every event routed to this node.
    pub fn events(&self) -> EventStream {
        EventStream::new(self.route.subscribe())
    }

    /// Returns a stream of events for one attribute.
    pub fn attribute_events(&self, attribute: Attribute) -> EventStream {
        self.events().filter_attribute(attribute)
    }
}

/// Adds items for `attributes` to `subscription` and dispatches the enable.
fn enable_items(
    engine: &Engine,
    route: &Arc<NodeRoute>,
    handle: Handle,
    subscription: Arc<Subscription>,
    attributes: Vec<Attribute>,
    parameters: MonitoringParameters,
) -> DispatchResult<Completion<MonitoringOutcome>> {
    let subscription_id = subscription.id();
    let mut requests = Vec::with_capacity(attributes.len());
    for attribute in attributes {
        let mut item_parameters = parameters.clone();
        item_parameters.subscription_id = Some(subscription_id);
        item_parameters.publishing_interval = subscription.publishing_interval();
        let key = MonitoredItemKey::new(handle, attribute);
        if !subscription.insert_enabling(key, route.node_id().clone(), item_parameters.clone()) {
            continue;
        }
        let previous = route.attach(attribute, subscription.clone());
        drop(previous);
        requests.push(MonitoringRequest {
            node_id: route.node_id().clone(),
            attribute,
            parameters: item_parameters,
        });
    }
    if requests.is_empty() {
        return Ok(Completion::ready(Ok(MonitoringOutcome::good())));
    }

    let attributes: Vec<Attribute> = requests.iter().map(|request| request.attribute).collect();
    let dispatched = engine.request(
        Some(handle),
        requests.len(),
        "enable_monitoring",
        |backend, tag| backend.enable_monitoring(tag, subscription_id, requests),
        collect_outcome,
    );
    if dispatched.is_err() {
        for attribute in attributes {
            subscription.detach(&MonitoredItemKey::new(handle, attribute));
            let released = route.release(attribute, &subscription);
            drop(released);
        }
    }
    dispatched
}

/// Sends new parameters for a monitored item, using its server id.
fn modify_item(
    engine: &Engine,
    handle: Handle,
    subscription: &Subscription,
    attribute: Attribute,
    mut parameters: MonitoringParameters,
) -> DispatchResult<Completion<MonitoringOutcome>> {
    let key = MonitoredItemKey::new(handle, attribute);
    if let Some(item) = subscription.item(&key) {
        parameters.monitored_item_id = item.server_id();
    }
    let subscription_id = subscription.id();
    parameters.subscription_id = Some(subscription_id);
    parameters.publishing_interval = subscription.publishing_interval();
    engine.request(
        Some(handle),
        1,
        "modify_monitoring",
        |backend, tag| backend.modify_monitoring(tag, subscription_id, attribute, &parameters),
        collect_outcome,
    )
}

/// Dispatches the disable for items already in `Disabling`. If it cannot
/// be sent the items are removed locally and `None` is returned.
fn disable_items(
    engine: &Engine,
    route: &NodeRoute,
    handle: Handle,
    subscription: &Subscription,
    items: Vec<(Attribute, u32)>,
) -> Option<Completion<MonitoringOutcome>> {
    let subscription_id = subscription.id();
    let attributes: Vec<Attribute> = items.iter().map(|(attribute, _)| *attribute).collect();
    let dispatched = engine.request(
        Some(handle),
        items.len(),
        "disable_monitoring",
        |backend, tag| backend.disable_monitoring(tag, subscription_id, items),
        collect_outcome,
    );
    match dispatched {
        Ok(completion) => Some(completion),
        Err(error) => {
            debug!(handle, subscription_id, error = %error, "Disable failed, removing items locally");
            for attribute in attributes {
                teardown_local(route, subscription, MonitoredItemKey::new(handle, attribute));
            }
            None
        }
    }
}

fn teardown_local(route: &NodeRoute, subscription: &Subscription, key: MonitoredItemKey) {
    subscription.detach(&key);
    let released = route.release(key.attribute(), subscription);
    drop(released);
}

fn combine(mut parts: Vec<Completion<MonitoringOutcome>>) -> Completion<MonitoringOutcome> {
    match parts.len() {
        0 => Completion::ready(Ok(MonitoringOutcome::good())),
        1 => parts
            .pop()
            .unwrap_or_else(|| Completion::ready(Ok(MonitoringOutcome::good()))),
        _ => Completion::deferred(async move {
            let mut outcome = MonitoringOutcome::good();
            for part in parts {
                outcome = outcome.merge(part.await?);
            }
            Ok(outcome)
        }),
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        let handle = *self.handle.get_mut();
        let subscriptions = self.route.take_subscriptions();
        if handle == 0 {
            return;
        }

        // Enabling items have no server id yet; the engine disables them on
        // acknowledgement. Register them before releasing the handle.
        let mut pending = Vec::new();
        for (attribute, subscription) in &subscriptions {
            let key = MonitoredItemKey::new(handle, *attribute);
            if subscription.item_state(&key) == Some(MonitoringState::Enabling) {
                self.engine.disable_when_enabled(key, subscription.id());
                pending.push(key);
            }
        }
        let discarded = self.engine.release_handle(handle);

        let mut groups: HashMap<u32, Vec<(Attribute, u32)>> = HashMap::new();
        for (attribute, subscription) in &subscriptions {
            let key = MonitoredItemKey::new(handle, *attribute);
            let Some(item) = subscription.detach(&key) else {
                continue;
            };
            if item.state == MonitoringState::Monitored && !pending.contains(&key) {
                groups
                    .entry(subscription.id())
                    .or_default()
                    .push((*attribute, item.server_id()));
            }
        }
        for (subscription_id, items) in groups {
            self.engine.fire_and_forget(Some(handle), "disable_monitoring", |backend, tag| {
                backend.disable_monitoring(tag, subscription_id, items)
            });
        }
        drop(subscriptions);
        trace!(handle, discarded, pending = pending.len(), "Node released");
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("node_id", self.node_id())
            .field("handle", &self.handle())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SimulatedBackend;
    use crate::error::UaError;
    use crate::types::ConnectionState;

    fn node() -> Node {
        let engine = Engine::new(Arc::new(SimulatedBackend::new()));
        Node::new(engine, NodeId::string(2, "Demo.Temperature"))
    }

    #[test]
    fn test_requests_require_connection() {
        let node = node();
        let err = node.read_attribute(Attribute::Value).unwrap_err();
        assert!(matches!(err, UaError::Dispatch(DispatchError::NotConnected)));
        assert_eq!(node.handle(), 0);
        assert!(!node.is_registered());
    }

    #[test]
    fn test_empty_mask_is_rejected() {
        let node = node();
        node.engine.set_state(ConnectionState::Connected);
        let err = node.read_attributes(AttributeMask::NONE, None).unwrap_err();
        assert!(matches!(err, UaError::Dispatch(DispatchError::EmptyRequest { .. })));
    }

    #[test]
    fn test_disable_without_monitoring_is_good() {
        let node = node();
        let completion = node.disable_monitoring(Attribute::Value.mask()).unwrap();
        assert!(completion.is_ready());
        assert_eq!(node.monitoring_status(Attribute::Value), MonitoringState::Unmonitored);
    }

    #[test]
    fn test_event_filter_placement() {
        let node = node();
        node.engine.set_state(ConnectionState::Connected);
        let err = node
            .enable_monitoring(Attribute::EventNotifier.mask(), MonitoringParameters::default())
            .unwrap_err();
        assert!(matches!(err, UaError::Configuration(ConfigurationError::InvalidFilter { .. })));
    }

    #[test]
    fn test_write_type_mismatch_is_rejected() {
        let node = node();
        node.engine.set_state(ConnectionState::Connected);
        let err = node.write_attribute(Attribute::AccessLevel, "not a byte").unwrap_err();
        assert!(matches!(err, UaError::Configuration(_)));
    }

    #[test]
    fn test_resolved_path_status() {
        let a = BrowsePathTarget::full_match(NodeId::numeric(2, 1));
        let b = BrowsePathTarget::full_match(NodeId::numeric(2, 2));
        let partial = BrowsePathTarget {
            target_id: NodeId::numeric(2, 3),
            remaining_path_index: 1,
        };

        let one = ResolvedPath::from_targets(StatusCode::GOOD, vec![a.clone()]);
        assert_eq!(one.status, StatusCode::GOOD);
        assert_eq!(one.node_id, Some(NodeId::numeric(2, 1)));

        let mixed = ResolvedPath::from_targets(StatusCode::GOOD, vec![a.clone(), partial.clone()]);
        assert_eq!(mixed.status, StatusCode::BAD_TOO_MANY_MATCHES);
        assert!(mixed.node_id.is_none());
        assert_eq!(mixed.targets.len(), 2);

        let none = ResolvedPath::from_targets(StatusCode::GOOD, vec![partial]);
        assert_eq!(none.status, StatusCode::BAD_NO_MATCH);
        assert!(none.node_id.is_none());
        let empty = ResolvedPath::from_targets(StatusCode::GOOD, Vec::new());
        assert_eq!(empty.status, StatusCode::BAD_NO_MATCH);

        let many = ResolvedPath::from_targets(StatusCode::GOOD, vec![a, b]);
        assert_eq!(many.status, StatusCode::BAD_TOO_MANY_MATCHES);
        assert!(many.node_id.is_none());

        let failed = ResolvedPath::from_targets(StatusCode::BAD_NODE_ID_UNKNOWN, Vec::new());
        assert_eq!(failed.status, StatusCode::BAD_NODE_ID_UNKNOWN);
    }
}
