// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Handle registry, pending request table and per-node routes.
//!
//! Every map here is guarded by a `parking_lot` lock that is only held for
//! the map operation itself.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, oneshot};

use crate::backend::{BackendEvent, Handle, RequestId};
use crate::subscription::Subscription;
use crate::types::{Attribute, DataValue, NodeId};

/// Buffered events per node stream before slow receivers lag.
pub(crate) const NODE_EVENT_CAPACITY: usize = 256;

// =============================================================================
// NodeRoute
// =============================================================================

/// Everything the dispatcher needs to deliver events to one node.
pub(crate) struct NodeRoute {
    node_id: NodeId,
    events: broadcast::Sender<BackendEvent>,
    cache: Mutex<HashMap<Attribute, DataValue>>,
    subscriptions: Mutex<HashMap<Attribute, Arc<Subscription>>>,
}

impl NodeRoute {
    pub(crate) fn new(node_id: NodeId) -> Self {
        let (events, _) = broadcast::channel(NODE_EVENT_CAPACITY);
        Self {
            node_id,
            events,
            cache: Mutex::new(HashMap::new()),
            subscriptions: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<BackendEvent> {
        self.events.subscribe()
    }

    /// Publishes to the node's stream; no receivers is not an error.
    pub(crate) fn publish(&self, event: BackendEvent) {
        let _ = self.events.send(event);
    }

    pub(crate) fn cached(&self, attribute: Attribute) -> Option<DataValue> {
        self.cache.lock().get(&attribute).cloned()
    }

    pub(crate) fn update_cache(&self, attribute: Attribute, value: DataValue) {
        self.cache.lock().insert(attribute, value);
    }

    pub(crate) fn subscription(&self, attribute: Attribute) -> Option<Arc<Subscription>> {
        self.subscriptions.lock().get(&attribute).cloned()
    }

    pub(crate) fn attach(&self, attribute: Attribute, subscription: Arc<Subscription>) -> Option<Arc<Subscription>> {
        self.subscriptions.lock().insert(attribute, subscription)
    }

    /// Removes the attribute's subscription if it is `subscription`.
    ///
    /// The reference is returned so the caller drops it outside the lock.
    pub(crate) fn release(&self, attribute: Attribute, subscription: &Subscription) -> Option<Arc<Subscription>> {
        let mut subscriptions = self.subscriptions.lock();
        match subscriptions.get(&attribute) {
            Some(current) if std::ptr::eq(Arc::as_ptr(current), subscription) => subscriptions.remove(&attribute),
            _ => None,
        }
    }

    pub(crate) fn take_subscriptions(&self) -> HashMap<Attribute, Arc<Subscription>> {
        std::mem::take(&mut *self.subscriptions.lock())
    }
}

impl std::fmt::Debug for NodeRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRoute")
            .field("node_id", &self.node_id)
            .field("receivers", &self.events.receiver_count())
            .finish()
    }
}

// =============================================================================
// HandleRegistry
// =============================================================================

/// Maps opaque handles to live node routes.
#[derive(Debug)]
pub(crate) struct HandleRegistry {
    next: AtomicU64,
    routes: RwLock<HashMap<Handle, Arc<NodeRoute>>>,
}

impl HandleRegistry {
    pub(crate) fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
            routes: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a route under a fresh handle; `None` once handles run out.
    pub(crate) fn register(&self, route: Arc<NodeRoute>) -> Option<Handle> {
        let handle = self.next.fetch_add(1, Ordering::Relaxed);
        if handle == 0 {
            return None;
        }
        self.routes.write().insert(handle, route);
        Some(handle)
    }

    pub(crate) fn unregister(&self, handle: Handle) -> Option<Arc<NodeRoute>> {
        self.routes.write().remove(&handle)
    }

    pub(crate) fn get(&self, handle: Handle) -> Option<Arc<NodeRoute>> {
        self.routes.read().get(&handle).cloned()
    }

    pub(crate) fn contains(&self, handle: Handle) -> bool {
        self.routes.read().contains_key(&handle)
    }

    pub(crate) fn len(&self) -> usize {
        self.routes.read().len()
    }
}

// =============================================================================
// PendingTable
// =============================================================================

struct PendingRequest {
    handle: Option<Handle>,
    expected: usize,
    events: Vec<BackendEvent>,
    tx: oneshot::Sender<Vec<BackendEvent>>,
}

/// Outcome of delivering one completion event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    /// All expected events arrived and the waiter was resolved.
    Completed,
    /// More events are expected.
    Partial,
    /// No such request, or nobody waits any more.
    Unknown,
}

/// Requests dispatched but not yet completed.
pub(crate) struct PendingTable {
    entries: Mutex<HashMap<RequestId, PendingRequest>>,
}

impl PendingTable {
    pub(crate) fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Records a request expecting `expected` completion events.
    pub(crate) fn insert(
        &self,
        request_id: RequestId,
        handle: Option<Handle>,
        expected: usize,
    ) -> oneshot::Receiver<Vec<BackendEvent>> {
        let (tx, rx) = oneshot::channel();
        self.entries.lock().insert(
            request_id,
            PendingRequest {
                handle,
                expected: expected.max(1),
                events: Vec::with_capacity(expected),
                tx,
            },
        );
        rx
    }

    pub(crate) fn remove(&self, request_id: RequestId) -> bool {
        self.entries.lock().remove(&request_id).is_some()
    }

    pub(crate) fn deliver(&self, request_id: RequestId, event: BackendEvent) -> Delivery {
        let finished = {
            let mut entries = self.entries.lock();
            let Some(pending) = entries.get_mut(&request_id) else {
                return Delivery::Unknown;
            };
            pending.events.push(event);
            if pending.events.len() < pending.expected {
                return Delivery::Partial;
            }
            entries.remove(&request_id)
        };

        match finished {
            Some(pending) => match pending.tx.send(pending.events) {
                Ok(()) => Delivery::Completed,
                Err(_) => Delivery::Unknown,
            },
            None => Delivery::Unknown,
        }
    }

    /// Drops every request issued for `handle`; their completions resolve
    /// as abandoned.
    pub(crate) fn discard_handle(&self, handle: Handle) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, pending| pending.handle != Some(handle));
        before - entries.len()
    }

    pub(crate) fn clear(&self) -> usize {
        let drained: Vec<_> = self.entries.lock().drain().collect();
        drained.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::StatusCode;

    fn event() -> BackendEvent {
        BackendEvent::NodeDeleted {
            node_id: NodeId::numeric(1, 1),
            status: StatusCode::GOOD,
        }
    }

    #[test]
    fn test_registry_handles_are_unique() {
        let registry = HandleRegistry::new();
        let a = registry.register(Arc::new(NodeRoute::new(NodeId::numeric(2, 1)))).unwrap();
        let b = registry.register(Arc::new(NodeRoute::new(NodeId::numeric(2, 2)))).unwrap();
        assert_ne!(a, 0);
        assert_ne!(a, b);
        assert!(registry.contains(a));
        assert!(registry.unregister(a).is_some());
        assert!(!registry.contains(a));
        assert!(registry.get(b).is_some());
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_pending_waits_for_expected_count() {
        let table = PendingTable::new();
        let rx = table.insert(10, Some(1), 2);
        assert_eq!(table.deliver(10, event()), Delivery::Partial);
        assert_eq!(table.deliver(10, event()), Delivery::Completed);
        assert_eq!(rx.await.unwrap().len(), 2);
        assert_eq!(table.deliver(10, event()), Delivery::Unknown);
    }

    #[tokio::test]
    async fn test_discard_handle() {
        let table = PendingTable::new();
        let rx = table.insert(1, Some(5), 1);
        let _other = table.insert(2, Some(6), 1);
        assert_eq!(table.discard_handle(5), 1);
        assert!(rx.await.is_err());
        assert_eq!(table.len(), 1);
        assert_eq!(table.clear(), 1);
    }
}
