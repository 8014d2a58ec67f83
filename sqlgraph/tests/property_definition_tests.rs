//! Property definition updates, renames and removals against SQLite

#[path = "testutils/mod.rs"]
mod testutils;

use sqlgraph::sql::SqlError;
use sqlgraph::{
    properties, AbstractLabel, IndexType, LabelId, Multiplicity, PropertyDefinition,
    PropertyType, TopologyChangeAction, TopologyElement, TopologyError,
};
use testutils::topology_fixture::{name_property, TopologyFixture};

fn required_name() -> PropertyDefinition {
    PropertyDefinition::of(PropertyType::String).with_multiplicity(Multiplicity::required())
}

#[test]
fn test_lifting_required_multiplicity() {
    let fixture = TopologyFixture::new().expect("Failed to create fixture");
    let topology = fixture.topology();

    let mut tx = topology.begin().unwrap();
    let person = tx
        .ensure_vertex_label_exist("public", "Person", properties([("name", required_name())]))
        .unwrap();
    tx.commit().unwrap();

    let mut tx = topology.begin().unwrap();
    let err = tx.add_vertex(person.id(), &[]).unwrap_err();
    assert!(
        matches!(err, TopologyError::Sql(SqlError::ConstraintViolation(_))),
        "unexpected error: {}",
        err
    );
    tx.rollback().unwrap();
    assert_eq!(fixture.count_rows("public.V_Person"), 0);

    fixture.events().take();
    let mut tx = topology.begin().unwrap();
    let column = tx
        .update_property_definition(
            &*person,
            "name",
            PropertyDefinition::of(PropertyType::String),
        )
        .unwrap();
    assert_eq!(column.multiplicity(), Multiplicity::optional());
    tx.commit().unwrap();

    let events = fixture.events().take();
    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event.action, TopologyChangeAction::Update);
    match (&event.element, &event.old) {
        (
            TopologyElement::Property { column: new, .. },
            Some(TopologyElement::Property { column: old, .. }),
        ) => {
            assert_eq!(new.multiplicity(), Multiplicity::optional());
            assert_eq!(old.multiplicity(), Multiplicity::required());
        }
        other => panic!("unexpected event elements: {:?}", other),
    }

    let mut tx = topology.begin().unwrap();
    tx.add_vertex(person.id(), &[]).unwrap();
    tx.commit().unwrap();
    assert_eq!(fixture.count_rows("public.V_Person"), 1);
    let committed = topology.vertex_label(person.id()).unwrap();
    assert!(!committed.property("name").unwrap().definition().is_required());
}

#[test]
fn test_same_definition_is_a_no_op() {
    let fixture = TopologyFixture::new().expect("Failed to create fixture");
    let topology = fixture.topology();

    let mut tx = topology.begin().unwrap();
    let person = tx
        .ensure_vertex_label_exist("public", "Person", name_property())
        .unwrap();
    tx.commit().unwrap();
    fixture.events().take();

    let mut tx = topology.begin().unwrap();
    tx.update_property_definition(
        &*person,
        "name",
        PropertyDefinition::of(PropertyType::String),
    )
    .unwrap();
    tx.commit().unwrap();
    assert!(fixture.events().events().is_empty());
}

#[test]
fn test_identifiers_are_immutable() {
    let fixture = TopologyFixture::new().expect("Failed to create fixture");
    let topology = fixture.topology();

    let mut tx = topology.begin().unwrap();
    let country = tx
        .ensure_vertex_label_exist_with_identifiers(
            "public",
            "Country",
            properties([("code", PropertyDefinition::of(PropertyType::String))]),
            &["code"],
        )
        .unwrap();
    tx.commit().unwrap();

    let mut tx = topology.begin().unwrap();
    let err = tx
        .update_property_definition(
            &*country,
            "code",
            PropertyDefinition::of(PropertyType::Integer),
        )
        .unwrap_err();
    assert!(matches!(err, TopologyError::IdentifierImmutable(_)));
    let err = tx
        .update_property_definition(&*country, "code", required_name())
        .unwrap_err();
    assert!(matches!(err, TopologyError::IdentifierImmutable(_)));
    tx.update_property_definition(
        &*country,
        "code",
        PropertyDefinition::of(PropertyType::String),
    )
    .unwrap();
    let err = tx.remove_property(&*country, "code", false).unwrap_err();
    assert!(matches!(err, TopologyError::IdentifierImmutable(_)));
    tx.rollback().unwrap();

    assert_eq!(
        topology.vertex_label(country.id()).unwrap().identifiers(),
        ["code".to_string()]
    );
}

#[test]
fn test_rename_identifier_renames_foreign_key_columns() {
    let fixture = TopologyFixture::new().expect("Failed to create fixture");
    let topology = fixture.topology();

    let mut tx = topology.begin().unwrap();
    let country = tx
        .ensure_vertex_label_exist_with_identifiers(
            "public",
            "Country",
            properties([
                ("code", PropertyDefinition::of(PropertyType::String)),
                ("name", PropertyDefinition::of(PropertyType::String)),
            ]),
            &["code"],
        )
        .unwrap();
    let city = tx
        .ensure_vertex_label_exist("public", "City", name_property())
        .unwrap();
    tx.ensure_edge_label_exist("public", "located", city.id(), country.id(), Default::default())
        .unwrap();
    tx.commit().unwrap();
    assert!(fixture
        .columns("public.E_located")
        .contains(&"public.Country.code__I".to_string()));

    let mut tx = topology.begin().unwrap();
    let err = tx.rename_property(&*country, "code", "name").unwrap_err();
    assert!(matches!(err, TopologyError::AlreadyExists(_)));
    tx.rename_property(&*country, "code", "iso").unwrap();
    tx.commit().unwrap();

    let country = topology.vertex_label(country.id()).unwrap();
    assert_eq!(country.identifiers(), ["iso".to_string()]);
    assert!(country.property("code").is_none());
    assert!(fixture.columns("public.V_Country").contains(&"iso".to_string()));
    let edge_columns = fixture.columns("public.E_located");
    assert!(edge_columns.contains(&"public.Country.iso__I".to_string()));
    assert!(!edge_columns.contains(&"public.Country.code__I".to_string()));

    let keys = topology.foreign_keys();
    let located = keys.get("public.E_located").unwrap();
    assert!(located
        .iter()
        .any(|key| key.columns == ["public.Country.iso__I".to_string()]));

    let mut tx = topology.begin().unwrap();
    let fr = tx.add_vertex(country.id(), &[("iso", "FR".into())]).unwrap();
    let paris = tx.add_vertex(city.id(), &[("name", "Paris".into())]).unwrap();
    tx.add_edge(&LabelId::new("public", "located"), &paris, &fr, &[])
        .unwrap();
    tx.commit().unwrap();
    assert_eq!(fixture.count_rows("public.E_located"), 1);
}

#[test]
fn test_remove_property_drops_covering_index() {
    let fixture = TopologyFixture::new().expect("Failed to create fixture");
    let topology = fixture.topology();

    let mut tx = topology.begin().unwrap();
    let person = tx
        .ensure_vertex_label_exist(
            "public",
            "Person",
            properties([
                ("name", PropertyDefinition::of(PropertyType::String)),
                ("age", PropertyDefinition::of(PropertyType::Integer)),
            ]),
        )
        .unwrap();
    let index = tx
        .ensure_index_exists(&*person, IndexType::NonUnique, &["name"])
        .unwrap();
    tx.commit().unwrap();
    assert!(topology
        .vertex_label(person.id())
        .unwrap()
        .indexes()
        .contains_key(&index.name));

    fixture.events().take();
    let mut tx = topology.begin().unwrap();
    tx.remove_property(&*person, "name", false).unwrap();
    tx.commit().unwrap();

    let person = topology.vertex_label(person.id()).unwrap();
    assert!(person.property("name").is_none());
    assert!(person.indexes().is_empty());
    assert_eq!(fixture.columns("public.V_Person"), ["ID", "age"]);
    let mut deleted = fixture.events().descriptions();
    deleted.sort();
    assert_eq!(
        deleted,
        [
            format!("DELETE index {} on public.Person", index.name),
            "DELETE property public.Person.name".to_string(),
        ]
    );
}

#[test]
fn test_remove_property_preserving_data() {
    let fixture = TopologyFixture::new().expect("Failed to create fixture");
    let topology = fixture.topology();

    let mut tx = topology.begin().unwrap();
    let person = tx
        .ensure_vertex_label_exist("public", "Person", name_property())
        .unwrap();
    tx.commit().unwrap();

    let mut tx = topology.begin().unwrap();
    tx.remove_property(&*person, "name", true).unwrap();
    tx.commit().unwrap();

    assert!(topology
        .vertex_label(person.id())
        .unwrap()
        .property("name")
        .is_none());
    assert!(fixture.columns("public.V_Person").contains(&"name".to_string()));
}
