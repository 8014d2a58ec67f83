//! Edge multiplicities enforced by the database on real rows

#[path = "testutils/mod.rs"]
mod testutils;

use sqlgraph::sql::SqlError;
use sqlgraph::{
    AbstractLabel, EdgeDefinition, LabelId, Multiplicity, TopologyError, Transaction, VertexRef,
};
use testutils::topology_fixture::{name_property, TopologyFixture};

fn is_constraint_violation(err: &TopologyError) -> bool {
    matches!(err, TopologyError::Sql(SqlError::ConstraintViolation(_)))
}

/// A -[ab]-> B with the given definition, plus A1, A2, B1, B2
fn fixture_with(definition: EdgeDefinition) -> (TopologyFixture, [VertexRef; 4]) {
    let fixture = TopologyFixture::new().expect("Failed to create fixture");
    let mut tx = fixture.topology().begin().unwrap();
    let a = tx
        .ensure_vertex_label_exist("public", "A", name_property())
        .unwrap();
    let b = tx
        .ensure_vertex_label_exist("public", "B", name_property())
        .unwrap();
    tx.ensure_edge_label_exist_with(
        "public",
        "ab",
        a.id(),
        b.id(),
        Default::default(),
        &[],
        definition,
    )
    .unwrap();
    tx.commit().unwrap();

    let mut tx = fixture.topology().begin().unwrap();
    let vertices = [
        tx.add_vertex(a.id(), &[("name", "a1".into())]).unwrap(),
        tx.add_vertex(a.id(), &[("name", "a2".into())]).unwrap(),
        tx.add_vertex(b.id(), &[("name", "b1".into())]).unwrap(),
        tx.add_vertex(b.id(), &[("name", "b2".into())]).unwrap(),
    ];
    tx.commit().unwrap();
    (fixture, vertices)
}

fn ab() -> LabelId {
    LabelId::new("public", "ab")
}

fn add(tx: &mut Transaction, out: &VertexRef, in_: &VertexRef) -> Result<i64, TopologyError> {
    tx.add_edge(&ab(), out, in_, &[])
}

#[test]
fn test_one_to_one_rejects_second_edge() {
    let one = Multiplicity::of(0, 1).unwrap();
    let (fixture, [a1, a2, b1, b2]) = fixture_with(EdgeDefinition::of(one, one));

    let mut tx = fixture.topology().begin().unwrap();
    add(&mut tx, &a1, &b1).unwrap();
    let err = add(&mut tx, &a1, &b2).unwrap_err();
    assert!(is_constraint_violation(&err), "unexpected error: {}", err);
    let err = add(&mut tx, &a2, &b1).unwrap_err();
    assert!(is_constraint_violation(&err), "unexpected error: {}", err);
    add(&mut tx, &a2, &b2).unwrap();
    assert_eq!(tx.out_edge_count(&ab(), &a1).unwrap(), 1);
    tx.commit().unwrap();

    assert_eq!(fixture.count_rows("public.E_ab"), 2);
}

#[test]
fn test_many_to_many_accepts_duplicates() {
    let (fixture, [a1, _, b1, b2]) = fixture_with(EdgeDefinition::many_to_many());

    let mut tx = fixture.topology().begin().unwrap();
    add(&mut tx, &a1, &b1).unwrap();
    add(&mut tx, &a1, &b1).unwrap();
    add(&mut tx, &a1, &b2).unwrap();
    assert_eq!(tx.out_edge_count(&ab(), &a1).unwrap(), 3);
    tx.commit().unwrap();
}

#[test]
fn test_unique_many_to_many_rejects_same_pair() {
    let unique = Multiplicity::many().with_unique(true);
    let (fixture, [a1, a2, b1, b2]) = fixture_with(EdgeDefinition::of(unique, unique));

    let mut tx = fixture.topology().begin().unwrap();
    add(&mut tx, &a1, &b1).unwrap();
    add(&mut tx, &a1, &b2).unwrap();
    add(&mut tx, &a2, &b1).unwrap();
    let err = add(&mut tx, &a1, &b1).unwrap_err();
    assert!(is_constraint_violation(&err), "unexpected error: {}", err);
    assert_eq!(tx.out_edge_count(&ab(), &a1).unwrap(), 2);
    tx.commit().unwrap();
}

#[test]
fn test_out_only_limit() {
    let definition = EdgeDefinition::of(Multiplicity::of(0, 1).unwrap(), Multiplicity::many());
    let (fixture, [a1, a2, b1, b2]) = fixture_with(definition);

    let mut tx = fixture.topology().begin().unwrap();
    add(&mut tx, &a1, &b1).unwrap();
    add(&mut tx, &a2, &b1).unwrap();
    let err = add(&mut tx, &a1, &b2).unwrap_err();
    assert!(is_constraint_violation(&err), "unexpected error: {}", err);
    tx.commit().unwrap();
    assert_eq!(fixture.count_rows("public.E_ab"), 2);
}

#[test]
fn test_invalid_multiplicity_is_rejected() {
    assert!(matches!(
        Multiplicity::of(0, -5),
        Err(TopologyError::InvalidArgument(_))
    ));
}
