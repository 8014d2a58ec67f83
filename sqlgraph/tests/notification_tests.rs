//! Propagation of committed structural changes to other topology instances

#[path = "testutils/mod.rs"]
mod testutils;

use sqlgraph::notify::{MemoryBus, NotificationPublisher};
use sqlgraph::sql::{PostgresDialect, RecordingConnectionFactory};
use sqlgraph::{
    properties, AbstractLabel, EdgeDefinition, IndexType, LabelId, PartitionType,
    PropertyDefinition, PropertyType, Topology, TopologyChangeAction, TopologyConfig,
    TopologyListener,
};
use std::sync::Arc;
use testutils::event_recorder::EventRecorder;
use testutils::topology_fixture::{name_property, recording_topology, TopologyFixture};

fn publishing_primary(bus: &Arc<MemoryBus>) -> Arc<Topology> {
    Topology::builder(RecordingConnectionFactory::new(), PostgresDialect::new())
        .publisher(Arc::clone(bus) as Arc<dyn NotificationPublisher>)
        .build()
        .expect("Failed to open primary")
}

/// Schema `sales` with Customer -[placed]-> Order and an index on Order.name
fn create_sales(primary: &Arc<Topology>) {
    let mut tx = primary.begin().unwrap();
    tx.ensure_schema_exist("sales").unwrap();
    let customer = tx
        .ensure_vertex_label_exist("sales", "Customer", name_property())
        .unwrap();
    let order = tx
        .ensure_vertex_label_exist("sales", "Order", name_property())
        .unwrap();
    tx.ensure_edge_label_exist("sales", "placed", customer.id(), order.id(), Default::default())
        .unwrap();
    tx.ensure_index_exists(&*order, IndexType::Unique, &["name"])
        .unwrap();
    tx.commit().unwrap();
}

#[test]
fn test_replica_follows_primary() {
    let bus = MemoryBus::new();
    let primary = publishing_primary(&bus);
    let (_, replica) = recording_topology(TopologyConfig::replica());
    let events = EventRecorder::new();
    replica.register_listener(Arc::clone(&events) as Arc<dyn TopologyListener>);

    create_sales(&primary);
    assert_eq!(bus.len(), 1);

    let mut subscription = bus.subscribe();
    let applied = subscription.drain_into(&replica).unwrap();
    assert!(applied > 0);
    assert_eq!(applied, events.events().len());
    assert_eq!(subscription.cursor(), 1);
    assert_eq!(*replica.snapshot(), *primary.snapshot());

    let descriptions = events.descriptions();
    assert!(descriptions.contains(&"CREATE schema sales".to_string()));
    assert!(descriptions.contains(&"CREATE vertex label sales.Order".to_string()));
    assert!(descriptions.contains(&"CREATE edge role sales.Customer-[sales.placed]->".to_string()));
    assert_eq!(replica.foreign_keys(), primary.foreign_keys());
}

#[test]
fn test_partitioned_edge_label_reaches_replica() {
    let bus = MemoryBus::new();
    let primary = publishing_primary(&bus);
    let (_, replica) = recording_topology(TopologyConfig::replica());

    let mut tx = primary.begin().unwrap();
    let person = tx
        .ensure_vertex_label_exist("public", "Person", name_property())
        .unwrap();
    tx.ensure_partitioned_edge_label_exist(
        "public",
        "knows",
        person.id(),
        person.id(),
        properties([("since", PropertyDefinition::of(PropertyType::LocalDate))]),
        &["since"],
        EdgeDefinition::many_to_many(),
        PartitionType::Range,
        "since",
    )
    .unwrap();
    tx.commit().unwrap();

    bus.subscribe().drain_into(&replica).unwrap();
    let knows = replica.edge_label(&LabelId::new("public", "knows")).unwrap();
    assert_eq!(knows.partition_type(), PartitionType::Range);
    assert_eq!(knows.partition_expression(), Some("since"));
    assert_eq!(*replica.snapshot(), *primary.snapshot());
}

#[test]
fn test_applying_a_notification_twice_changes_nothing() {
    let bus = MemoryBus::new();
    let primary = publishing_primary(&bus);
    let (_, replica) = recording_topology(TopologyConfig::replica());
    create_sales(&primary);

    let notifications = bus.subscribe().poll().unwrap();
    assert_eq!(notifications.len(), 1);
    assert!(replica.apply_remote_notification(&notifications[0]).unwrap() > 0);
    let first = replica.snapshot();
    assert_eq!(replica.apply_remote_notification(&notifications[0]).unwrap(), 0);
    assert_eq!(*replica.snapshot(), *first);

    let mut subscription = bus.subscribe();
    subscription.drain_into(&replica).unwrap();
    subscription.rewind();
    assert_eq!(subscription.drain_into(&replica).unwrap(), 0);
    assert_eq!(*replica.snapshot(), *first);
}

#[test]
fn test_removals_propagate() {
    let bus = MemoryBus::new();
    let primary = publishing_primary(&bus);
    let (_, replica) = recording_topology(TopologyConfig::replica());
    let mut subscription = bus.subscribe();
    create_sales(&primary);
    subscription.drain_into(&replica).unwrap();

    let events = EventRecorder::new();
    replica.register_listener(Arc::clone(&events) as Arc<dyn TopologyListener>);
    let mut tx = primary.begin().unwrap();
    tx.remove_edge_label(&LabelId::new("sales", "placed"), false)
        .unwrap();
    tx.commit().unwrap();

    assert!(subscription.drain_into(&replica).unwrap() > 0);
    assert!(replica.edge_label(&LabelId::new("sales", "placed")).is_none());
    assert!(replica
        .vertex_label(&LabelId::new("sales", "Customer"))
        .unwrap()
        .out_edge_roles()
        .is_empty());
    assert!(replica.foreign_keys().is_empty());
    assert!(events.count(TopologyChangeAction::Delete) > 0);
    assert_eq!(*replica.snapshot(), *primary.snapshot());
}

#[test]
fn test_own_notifications_are_ignored() {
    let bus = MemoryBus::new();
    let primary = publishing_primary(&bus);
    create_sales(&primary);

    let before = primary.snapshot();
    let mut subscription = bus.subscribe();
    assert_eq!(subscription.drain_into(&primary).unwrap(), 0);
    assert_eq!(*primary.snapshot(), *before);
}

#[test]
fn test_replica_does_not_publish() {
    let bus = MemoryBus::new();
    let replica = Topology::builder(RecordingConnectionFactory::new(), PostgresDialect::new())
        .config(TopologyConfig::replica())
        .publisher(Arc::clone(&bus) as Arc<dyn NotificationPublisher>)
        .build()
        .unwrap();

    let mut tx = replica.begin().unwrap();
    tx.ensure_vertex_label_exist("public", "A", name_property())
        .unwrap();
    tx.commit().unwrap();
    assert!(bus.is_empty());
}

#[test]
fn test_refresh_reads_the_shared_log() {
    let fixture = TopologyFixture::new().expect("Failed to create fixture");
    let primary = fixture.topology();
    let other = fixture.open_node(TopologyConfig::default()).unwrap();
    assert_ne!(other.node_id(), primary.node_id());

    let mut tx = primary.begin().unwrap();
    let a = tx
        .ensure_vertex_label_exist("public", "A", name_property())
        .unwrap();
    let b = tx
        .ensure_vertex_label_exist("public", "B", name_property())
        .unwrap();
    tx.ensure_edge_label_exist("public", "ab", a.id(), b.id(), Default::default())
        .unwrap();
    tx.commit().unwrap();

    assert!(other.vertex_label(a.id()).is_none());
    assert!(other.refresh().unwrap() > 0);
    assert!(other.vertex_label(a.id()).is_some());
    assert_eq!(other.foreign_keys(), primary.foreign_keys());
    assert_eq!(other.refresh().unwrap(), 0);
    assert_eq!(primary.refresh().unwrap(), 0);
    assert_eq!(other.log_cursor(), primary.log_cursor());
}

#[test]
fn test_reopened_node_recovers_catalog() {
    let fixture = TopologyFixture::new().expect("Failed to create fixture");
    let topology = fixture.topology();

    let mut tx = topology.begin().unwrap();
    let a = tx
        .ensure_vertex_label_exist("public", "A", name_property())
        .unwrap();
    let b = tx
        .ensure_vertex_label_exist("public", "B", name_property())
        .unwrap();
    tx.ensure_edge_label_exist("public", "ab", a.id(), b.id(), Default::default())
        .unwrap();
    tx.commit().unwrap();

    let mut tx = topology.begin().unwrap();
    tx.rename_vertex_label(b.id(), "Bee").unwrap();
    tx.commit().unwrap();

    let reopened = fixture.open_node(TopologyConfig::strict()).unwrap();
    assert_eq!(*reopened.snapshot(), *topology.snapshot());
    assert!(reopened.vertex_label(&LabelId::new("public", "Bee")).is_some());
    assert!(reopened.vertex_label(b.id()).is_none());
    assert!(reopened.validate_topology().unwrap().is_empty());
}
