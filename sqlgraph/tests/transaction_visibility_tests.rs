//! Visibility of uncommitted structure and the schema-change gate

#[path = "testutils/mod.rs"]
mod testutils;

use serial_test::serial;
use sqlgraph::{AbstractLabel, LabelId, TopologyChangeAction, TopologyConfig, TopologyError};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use testutils::topology_fixture::{name_property, TopologyFixture};

#[test]
fn test_uncommitted_label_visible_only_to_its_transaction() {
    let fixture = TopologyFixture::new().expect("Failed to create fixture");
    let topology = fixture.topology();
    let a = LabelId::new("public", "A");

    let mut creator = topology.begin().unwrap();
    let observer = topology.begin().unwrap();
    creator
        .ensure_vertex_label_exist("public", "A", name_property())
        .unwrap();

    assert!(creator.vertex_label(&a).is_some());
    assert!(observer.vertex_label(&a).is_none());
    assert!(topology.vertex_label(&a).is_none());

    creator.commit().unwrap();
    assert!(observer.vertex_label(&a).is_some());
    assert!(topology.vertex_label(&a).is_some());
    observer.rollback().unwrap();
    assert!(fixture.table_exists("public.V_A"));
}

#[test]
fn test_rollback_discards_label() {
    let fixture = TopologyFixture::new().expect("Failed to create fixture");
    let topology = fixture.topology();
    let b = LabelId::new("public", "B");

    let mut tx = topology.begin().unwrap();
    tx.ensure_vertex_label_exist("public", "B", name_property())
        .unwrap();
    tx.rollback().unwrap();

    assert!(topology.vertex_label(&b).is_none());
    assert!(!fixture.table_exists("public.V_B"));
    assert!(!topology.is_schema_changing());
    assert!(fixture.events().events().is_empty());

    let tx = topology.begin().unwrap();
    assert!(tx.vertex_label(&b).is_none());
    tx.rollback().unwrap();
}

#[test]
fn test_commit_fires_events_in_dependency_order() {
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
    assert!(fixture.events().events().is_empty());
    tx.commit().unwrap();

    let descriptions = fixture.events().descriptions();
    let position = |text: &str| {
        descriptions
            .iter()
            .position(|d| d == text)
            .unwrap_or_else(|| panic!("missing event {}", text))
    };
    assert!(position("CREATE vertex label public.A") < position("CREATE property public.A.name"));
    assert!(position("CREATE property public.B.name") < position("CREATE edge role public.A-[public.ab]->"));
    assert_eq!(
        fixture.events().count(TopologyChangeAction::Create),
        descriptions.len()
    );
}

#[test]
#[serial]
fn test_gate_times_out_for_second_writer() {
    let config = TopologyConfig::default().with_schema_change_timeout(Duration::from_millis(50));
    let fixture = TopologyFixture::with_config(config).expect("Failed to create fixture");
    let topology = fixture.topology();

    let mut first = topology.begin().unwrap();
    first
        .ensure_vertex_label_exist("public", "A", name_property())
        .unwrap();

    let mut second = topology.begin().unwrap();
    let err = second
        .ensure_vertex_label_exist("public", "B", name_property())
        .unwrap_err();
    assert!(matches!(err, TopologyError::SchemaChangeTimeout(_)));
    assert!(!second.is_schema_changed());
    second.rollback().unwrap();

    first.commit().unwrap();
    assert!(!topology.is_schema_changing());
}

#[test]
#[serial]
fn test_second_writer_waits_for_commit() {
    let fixture = TopologyFixture::new().expect("Failed to create fixture");
    let topology = fixture.topology().clone();

    let mut first = topology.begin().unwrap();
    first
        .ensure_vertex_label_exist("public", "A", name_property())
        .unwrap();

    let (started, waiting) = mpsc::channel();
    let writer = {
        let topology = topology.clone();
        thread::spawn(move || {
            let mut second = topology.begin().unwrap();
            started.send(()).unwrap();
            second
                .ensure_vertex_label_exist("public", "B", name_property())
                .unwrap();
            let saw_a = second.vertex_label(&LabelId::new("public", "A")).is_some();
            second.commit().unwrap();
            saw_a
        })
    };

    waiting.recv().unwrap();
    thread::sleep(Duration::from_millis(50));
    assert!(topology.vertex_label(&LabelId::new("public", "B")).is_none());
    first.commit().unwrap();

    assert!(writer.join().unwrap());
    assert!(topology.vertex_label(&LabelId::new("public", "B")).is_some());
}
