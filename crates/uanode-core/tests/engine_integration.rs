// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Engine integration tests.
//!
//! These run the full client stack (connection, engine, nodes,
//! subscriptions) against the in-memory simulated backend.
//!
//! ```bash
//! cargo test -p uanode-core --test engine_integration
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use uanode_core::backend::simulated::SimulatedEvent;
use uanode_core::{
    Attribute, BackendEvent, ConnectionState, DataValue, DispatchError, EventFilter, EventStream, FilterElement,
    FilterOperand, FilterOperator, MonitoringParameterChange, MonitoringParameters, MonitoringState, NodeId,
    QualifiedName, ReadItem, RelativePathElement, SimpleAttributeOperand, SimulatedBackend, StatusCode,
    SubscriptionSettings, TypedArgument, UaError, UniversalNode, Variant, VariantType, WriteItem,
};
use uanode_core::Connection;

// =============================================================================
// Test Helpers
// =============================================================================

const ENDPOINT: &str = "opc.tcp://localhost:4840";
const DEMO_NAMESPACE: &str = "urn:uanode:demo";
const WAIT: Duration = Duration::from_secs(2);

async fn connected() -> (Arc<SimulatedBackend>, Connection) {
    connected_with(SimulatedBackend::new()).await
}

async fn connected_with(backend: SimulatedBackend) -> (Arc<SimulatedBackend>, Connection) {
    let backend = Arc::new(backend);
    let connection = Connection::new(backend.clone());
    connection.connect_url(ENDPOINT).await.unwrap();
    (backend, connection)
}

fn demo(name: &str) -> NodeId {
    NodeId::string(2, name)
}

/// Waits for the next data change, skipping completions.
async fn next_data_change(events: &mut EventStream) -> (u32, DataValue) {
    tokio::time::timeout(WAIT, async {
        loop {
            match events.recv().await {
                Some(BackendEvent::DataChangeOccurred {
                    subscription_id, value, ..
                }) => return (subscription_id, value),
                Some(_) => continue,
                None => panic!("event stream closed"),
            }
        }
    })
    .await
    .expect("no data change within timeout")
}

async fn next_event_fields(events: &mut EventStream) -> Vec<Variant> {
    tokio::time::timeout(WAIT, async {
        loop {
            match events.recv().await {
                Some(BackendEvent::EventOccurred { fields, .. }) => return fields,
                Some(_) => continue,
                None => panic!("event stream closed"),
            }
        }
    })
    .await
    .expect("no event within timeout")
}

// =============================================================================
// Addressing
// =============================================================================

#[test]
fn test_node_id_text_round_trip() {
    for text in [
        "ns=0;i=2255",
        "ns=2;s=Demo.Temperature",
        "ns=1;g=72962b91-fa75-4ae6-8d28-b404dc7daf63",
        "ns=3;b=AQID",
    ] {
        let node_id: NodeId = text.parse().unwrap();
        assert_eq!(node_id.to_string(), text);
    }
    assert!("ns=2;x=oops".parse::<NodeId>().is_err());
    assert!("ns=2".parse::<NodeId>().is_err());
}

#[tokio::test]
async fn test_namespace_resolution() {
    let (_backend, connection) = connected().await;

    let node = connection
        .node_from(&UniversalNode::with_namespace_name(DEMO_NAMESPACE, "s=Demo.Switch"))
        .unwrap();
    assert_eq!(node.node_id(), &demo("Demo.Switch"));

    let err = connection
        .node_from(&UniversalNode::with_namespace_name("urn:not:there", "s=Demo.Switch"))
        .unwrap_err();
    assert!(err.to_string().contains("urn:not:there"));
}

// =============================================================================
// Attribute services
// =============================================================================

#[tokio::test]
async fn test_read_write_value() {
    let (backend, connection) = connected().await;
    let node = connection.node("ns=2;s=Demo.Counter").unwrap();

    let written = node.write_attribute(Attribute::Value, 42i32).unwrap().await.unwrap();
    assert_eq!(written.status, StatusCode::GOOD);
    assert_eq!(backend.value(&demo("Demo.Counter")).unwrap().value, Variant::Int32(42));

    let read = node.read_attribute(Attribute::Value).unwrap().await.unwrap();
    assert_eq!(read.value, Variant::Int32(42));
    assert_eq!(read.namespace_name.as_deref(), Some(DEMO_NAMESPACE));
    assert_eq!(node.value().unwrap().value, Variant::Int32(42));
}

#[tokio::test]
async fn test_bulk_results_follow_request_order() {
    let (_backend, connection) = connected().await;
    let items = vec![
        ReadItem::value(demo("Demo.Message")),
        ReadItem::value(demo("Missing")),
        ReadItem::new(demo("Demo.Machine"), Attribute::BrowseName),
        ReadItem::value(demo("Demo.Array")).with_index_range("1:2"),
    ];
    let results = connection.read_node_attributes(items.clone()).unwrap().await.unwrap();

    assert_eq!(results.len(), items.len());
    for (item, result) in items.iter().zip(&results) {
        assert_eq!(result.node_id, item.node_id);
        assert_eq!(result.attribute, item.attribute);
    }
    assert_eq!(results[0].value, Variant::from("hello"));
    assert_eq!(results[1].status, StatusCode::BAD_NODE_ID_UNKNOWN);
    assert_eq!(results[1].value, Variant::Empty);
    assert!(results[1].source_timestamp.is_none());
    assert_eq!(results[2].value, Variant::QualifiedName(QualifiedName::new(2, "Machine")));
    assert_eq!(results[3].value, Variant::Array(vec![Variant::Int32(2), Variant::Int32(3)]));

    let writes = connection
        .write_node_attributes(vec![
            WriteItem::value(demo("Demo.Switch"), true),
            WriteItem::value(demo("Demo.Machine.SerialNumber"), "SN-9"),
        ])
        .unwrap()
        .await
        .unwrap();
    assert_eq!(writes[0].status, StatusCode::GOOD);
    assert_eq!(writes[1].status, StatusCode::BAD_NOT_WRITABLE);

    assert!(matches!(
        connection.read_node_attributes(Vec::new()),
        Err(UaError::Dispatch(DispatchError::EmptyRequest { .. }))
    ));
}

// =============================================================================
// Monitoring
// =============================================================================

#[tokio::test]
async fn test_value_monitoring_flow() {
    let (backend, connection) = connected().await;
    let node = connection.node("ns=2;s=Demo.Counter").unwrap();
    let mut events = node.attribute_events(Attribute::Value);

    let outcome = node
        .enable_monitoring(Attribute::Value.mask(), MonitoringParameters::with_intervals(100.0, 50.0))
        .unwrap()
        .await
        .unwrap();
    assert!(outcome.is_good());
    assert_eq!(node.monitoring_status(Attribute::Value), MonitoringState::Monitored);

    let (subscription_id, initial) = next_data_change(&mut events).await;
    assert_eq!(initial.value, Variant::Int32(0));
    assert_eq!(node.subscription(Attribute::Value).unwrap().id(), subscription_id);

    backend.set_value(&demo("Demo.Counter"), 7i32).unwrap();
    let (_, changed) = next_data_change(&mut events).await;
    assert_eq!(changed.value, Variant::Int32(7));
    assert_eq!(node.value().unwrap().value, Variant::Int32(7));

    let disabled = node.disable_monitoring(Attribute::Value.mask()).unwrap().await.unwrap();
    assert!(disabled.is_good());
    assert_eq!(node.monitoring_status(Attribute::Value), MonitoringState::Unmonitored);
    assert_eq!(backend.monitored_item_count(), 0);
}

#[tokio::test]
async fn test_disable_is_idempotent() {
    let (backend, connection) = connected().await;
    let node = connection.node("ns=2;s=Demo.Switch").unwrap();
    node.enable_monitoring(Attribute::Value.mask(), MonitoringParameters::default())
        .unwrap()
        .await
        .unwrap();

    let first = node.disable_monitoring(Attribute::Value.mask()).unwrap().await.unwrap();
    let second = node.disable_monitoring(Attribute::Value.mask()).unwrap().await.unwrap();
    assert!(first.is_good());
    assert!(second.is_good());
    assert!(second.results.is_empty());
    assert_eq!(backend.monitored_item_count(), 0);
}

#[tokio::test]
async fn test_enable_while_enabling_modifies_after_acknowledgement() {
    let (backend, connection) = connected().await;
    let subscription = connection
        .create_subscription(SubscriptionSettings::with_interval(200.0))
        .unwrap()
        .await
        .unwrap();
    let node = connection.node("ns=2;s=Demo.Counter").unwrap();
    let parameters = |sampling: f64| MonitoringParameters::with_intervals(200.0, sampling).in_subscription(subscription.id());

    let first = node.enable_monitoring(Attribute::Value.mask(), parameters(100.0)).unwrap();
    assert_eq!(node.monitoring_status(Attribute::Value), MonitoringState::Enabling);
    let second = node.enable_monitoring(Attribute::Value.mask(), parameters(40.0)).unwrap();

    assert!(first.await.unwrap().is_good());
    let second = second.await.unwrap();
    assert!(second.is_good(), "{second:?}");
    assert_eq!(node.monitoring_status(Attribute::Value), MonitoringState::Monitored);

    let current = node.monitoring_parameters(Attribute::Value).unwrap();
    assert_eq!(current.sampling_interval, 40.0);
    assert_ne!(current.monitored_item_id, 0);
    assert_eq!(second.result(Attribute::Value).unwrap().parameters.monitored_item_id, current.monitored_item_id);
    assert_eq!(backend.monitored_item_count(), 1);
}

#[tokio::test]
async fn test_disable_while_enabling_removes_server_item() {
    let (backend, connection) = connected().await;
    let subscription = connection
        .create_subscription(SubscriptionSettings::with_interval(200.0))
        .unwrap()
        .await
        .unwrap();
    let node = connection.node("ns=2;s=Demo.Counter").unwrap();

    let enabled = node
        .enable_monitoring(
            Attribute::Value.mask(),
            MonitoringParameters::default().in_subscription(subscription.id()),
        )
        .unwrap();
    let disabled = node.disable_monitoring(Attribute::Value.mask()).unwrap();

    assert!(enabled.await.unwrap().is_good());
    let disabled = disabled.await.unwrap();
    assert!(disabled.is_good(), "{disabled:?}");
    assert_eq!(disabled.results.len(), 1);
    assert_eq!(node.monitoring_status(Attribute::Value), MonitoringState::Unmonitored);
    assert_eq!(backend.monitored_item_count(), 0);
}

#[tokio::test]
async fn test_dropping_node_while_enabling_removes_server_item() {
    let (backend, connection) = connected().await;
    let keeper = connection.node("ns=2;s=Demo.Switch").unwrap();
    keeper
        .enable_monitoring(Attribute::Value.mask(), MonitoringParameters::with_intervals(300.0, 100.0))
        .unwrap()
        .await
        .unwrap();
    assert_eq!(backend.monitored_item_count(), 1);

    let node = connection.node("ns=2;s=Demo.Counter").unwrap();
    let pending = node
        .enable_monitoring(Attribute::Value.mask(), MonitoringParameters::with_intervals(300.0, 100.0))
        .unwrap();
    assert_eq!(node.monitoring_status(Attribute::Value), MonitoringState::Enabling);
    drop(pending);
    drop(node);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(backend.monitored_item_count(), 1);
    assert_eq!(backend.subscription_count(), 1);
    assert_eq!(keeper.subscription(Attribute::Value).unwrap().item_count(), 1);
}

#[tokio::test]
async fn test_dropped_create_subscription_leaves_nothing_behind() {
    let (backend, connection) = connected().await;
    let completion = connection
        .create_subscription(SubscriptionSettings::with_interval(500.0))
        .unwrap();
    drop(completion);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(connection.subscriptions().is_empty());
    assert_eq!(backend.subscription_count(), 0);
}

#[tokio::test]
async fn test_shared_subscription_by_interval() {
    let (backend, connection) = connected().await;
    let counter = connection.node("ns=2;s=Demo.Counter").unwrap();
    let switch = connection.node("ns=2;s=Demo.Switch").unwrap();
    let message = connection.node("ns=2;s=Demo.Message").unwrap();

    for node in [&counter, &switch] {
        node.enable_monitoring(Attribute::Value.mask(), MonitoringParameters::with_intervals(250.0, 100.0))
            .unwrap()
            .await
            .unwrap();
    }
    message
        .enable_monitoring(Attribute::Value.mask(), MonitoringParameters::with_intervals(1000.0, 100.0))
        .unwrap()
        .await
        .unwrap();

    let shared = counter.subscription(Attribute::Value).unwrap();
    assert_eq!(shared.id(), switch.subscription(Attribute::Value).unwrap().id());
    assert_ne!(shared.id(), message.subscription(Attribute::Value).unwrap().id());
    assert_eq!(shared.item_count(), 2);
    assert_eq!(backend.subscription_count(), 2);
}

#[tokio::test]
async fn test_publishing_interval_is_revised() {
    let (backend, connection) =
        connected_with(SimulatedBackend::new().with_min_publishing_interval(100.0)).await;

    let subscription = connection
        .create_subscription(SubscriptionSettings::with_interval(10.0))
        .unwrap()
        .await
        .unwrap();
    assert_eq!(subscription.publishing_interval(), 100.0);
    assert_eq!(subscription.requested_settings().publishing_interval, 10.0);
    assert_eq!(
        backend.subscription_settings(subscription.id()).unwrap().publishing_interval,
        100.0
    );

    let node = connection.node("ns=2;s=Demo.Counter").unwrap();
    node.enable_monitoring(
        Attribute::Value.mask(),
        MonitoringParameters::default().in_subscription(subscription.id()),
    )
    .unwrap()
    .await
    .unwrap();
    let outcome = node
        .modify_monitoring(Attribute::Value, MonitoringParameterChange::PublishingInterval(20.0))
        .unwrap()
        .await
        .unwrap();
    assert!(outcome.is_good());
    assert_eq!(subscription.publishing_interval(), 100.0);
}

#[tokio::test]
async fn test_event_monitoring_with_where_clause() {
    let (backend, connection) = connected().await;
    let folder = connection.node("ns=2;s=Demo").unwrap();
    let mut events = folder.attribute_events(Attribute::EventNotifier);

    let filter = EventFilter::new()
        .select(SimpleAttributeOperand::field("Message"))
        .select(SimpleAttributeOperand::field("Severity"))
        .where_element(FilterElement::new(
            FilterOperator::GreaterThanOrEqual,
            FilterOperand::field("Severity"),
            FilterOperand::literal(500u16),
        ));
    let outcome = folder
        .enable_event_monitoring(filter, MonitoringParameters::default())
        .unwrap()
        .await
        .unwrap();
    assert!(outcome.is_good());

    let source = demo("Demo");
    assert_eq!(
        backend.raise_event(&source, SimulatedEvent::new(NodeId::BASE_EVENT_TYPE, "Demo", "minor", 100)),
        0
    );
    assert_eq!(
        backend.raise_event(&source, SimulatedEvent::new(NodeId::BASE_EVENT_TYPE, "Demo", "overheat", 800)),
        1
    );

    let fields = next_event_fields(&mut events).await;
    assert_eq!(fields, vec![Variant::from("overheat"), Variant::UInt16(800)]);
}

#[tokio::test]
async fn test_filter_element_must_refer_backwards() {
    let (_backend, connection) = connected().await;
    let folder = connection.node("ns=2;s=Demo").unwrap();
    let filter = EventFilter::new()
        .select(SimpleAttributeOperand::field("Message"))
        .where_element(FilterElement::unary(FilterOperator::Not, FilterOperand::Element(0)));

    let err = folder
        .enable_event_monitoring(filter, MonitoringParameters::default())
        .unwrap_err();
    assert!(err.to_string().contains("element 0"));
    assert_eq!(folder.monitoring_status(Attribute::EventNotifier), MonitoringState::Unmonitored);
}

// =============================================================================
// View, method and history services
// =============================================================================

#[tokio::test]
async fn test_browse_children_and_path() {
    let (_backend, connection) = connected().await;
    let objects = connection.node_from_id(NodeId::OBJECTS_FOLDER);

    let children = objects.browse_children(NodeId::HIERARCHICAL_REFERENCES, 0).unwrap().await.unwrap();
    let names: Vec<&str> = children
        .references
        .iter()
        .map(|reference| reference.browse_name.name.as_str())
        .collect();
    assert!(names.contains(&"Server"));
    assert!(names.contains(&"Demo"));

    let resolved = objects
        .resolve_browse_path(vec![
            RelativePathElement::new(QualifiedName::new(2, "Demo")),
            RelativePathElement::new(QualifiedName::new(2, "Machine")),
            RelativePathElement::new(QualifiedName::new(2, "Speed")),
        ])
        .unwrap()
        .await
        .unwrap();
    assert_eq!(resolved.status, StatusCode::GOOD);
    assert_eq!(resolved.node_id, Some(demo("Demo.Machine.Speed")));

    let missing = objects
        .resolve_browse_path(vec![RelativePathElement::new(QualifiedName::new(2, "Nowhere"))])
        .unwrap()
        .await
        .unwrap();
    assert_eq!(missing.node_id, None);
    assert!(!missing.status.is_good());
}

#[tokio::test]
async fn test_method_call() {
    let (_backend, connection) = connected().await;
    let folder = connection.node("ns=2;s=Demo").unwrap();

    let result = folder
        .call_method(
            &demo("Demo.Add"),
            vec![
                TypedArgument::new(1.5, VariantType::Double),
                TypedArgument::new("2.5", VariantType::Double),
            ],
        )
        .unwrap()
        .await
        .unwrap();
    assert_eq!(result.status, StatusCode::GOOD);
    assert_eq!(result.outputs, vec![Variant::Double(4.0)]);

    let missing = folder
        .call_method(&demo("Demo.Add"), vec![TypedArgument::new(1.0, VariantType::Double)])
        .unwrap()
        .await
        .unwrap();
    assert_eq!(missing.status, StatusCode::BAD_ARGUMENTS_MISSING);

    assert!(folder
        .call_method(&demo("Demo.Add"), vec![TypedArgument::new("abc", VariantType::Double)])
        .is_err());
}

#[tokio::test]
async fn test_history_paging() {
    let (_backend, connection) = connected().await;
    let node = connection.node("ns=2;s=Demo.Temperature").unwrap();
    let end = Utc::now();
    let start = end - chrono::Duration::hours(1);

    let mut page = node.read_history_raw(start, end, 8, false).unwrap().await.unwrap();
    let mut total = page.data.len();
    let mut pages = 1;
    assert_eq!(page.data.len(), 8);
    while page.has_more_data() {
        page = node.read_history_raw_continue(&page).unwrap().await.unwrap();
        total += page.data.len();
        pages += 1;
    }
    assert_eq!(total, 20);
    assert_eq!(pages, 3);
    assert!(node.read_history_raw_continue(&page).is_err());
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test]
async fn test_dropped_node_abandons_pending_request() {
    let (_backend, connection) = connected().await;
    let node = connection.node("ns=2;s=Demo.Counter").unwrap();
    let completion = node.read_attribute(Attribute::Value).unwrap();
    drop(node);

    let err = completion.await.unwrap_err();
    assert!(matches!(err, UaError::Dispatch(DispatchError::Abandoned { .. })));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(connection.registered_nodes(), 0);
    assert!(connection.stats().completions_dropped >= 1);
}

#[tokio::test]
async fn test_requests_fail_when_disconnected() {
    let (_backend, connection) = connected().await;
    let node = connection.node("ns=2;s=Demo.Counter").unwrap();
    connection.disconnect().await.unwrap();

    assert_eq!(connection.state(), ConnectionState::Disconnected);
    let err = node.read_attribute(Attribute::Value).unwrap_err();
    assert!(matches!(err, UaError::Dispatch(DispatchError::NotConnected)));
}

#[tokio::test]
async fn test_subscriptions_restored_on_reconnect() {
    let (backend, connection) = connected().await;
    let node = connection.node("ns=2;s=Demo.Counter").unwrap();
    let mut events = node.attribute_events(Attribute::Value);
    node.enable_monitoring(Attribute::Value.mask(), MonitoringParameters::with_intervals(200.0, 100.0))
        .unwrap()
        .await
        .unwrap();
    let (before, _) = next_data_change(&mut events).await;

    let mut connection_events = connection.events();
    assert!(backend.drop_connection());
    tokio::time::timeout(WAIT, async {
        while let Some(event) = connection_events.recv().await {
            if matches!(event, BackendEvent::StateChanged { state: ConnectionState::Disconnected }) {
                break;
            }
        }
    })
    .await
    .unwrap();
    assert!(!connection.is_connected());
    assert_eq!(backend.subscription_count(), 0);

    connection.connect_url(ENDPOINT).await.unwrap();
    assert_eq!(backend.subscription_count(), 1);
    assert_eq!(node.monitoring_status(Attribute::Value), MonitoringState::Monitored);

    backend.set_value(&demo("Demo.Counter"), 11i32).unwrap();
    let value = loop {
        let (subscription_id, value) = next_data_change(&mut events).await;
        if value.value == Variant::Int32(11) {
            break (subscription_id, value);
        }
    };
    assert_eq!(node.subscription(Attribute::Value).unwrap().id(), value.0);
    assert_eq!(connection.subscriptions().len(), 1);
    assert!(before > 0);
}
