//! Schema compilation properties checked across generated declarations.

use keybox_codec::ValueType;
use keybox_core::{KeyBoxError, SchemaRegistry, TypeCatalog, TypeDescriptor};
use keybox_testkit::prelude::*;
use proptest::prelude::*;
use std::sync::Arc;

fn single_type_catalog() -> Arc<TypeCatalog> {
    let mut catalog = TypeCatalog::new();
    catalog
        .register_all([
            TypeDescriptor::class("Generated"),
            TypeDescriptor::class("Mirror"),
        ])
        .unwrap();
    Arc::new(catalog)
}

proptest! {
    #![proptest_config(PropTestConfig::quick().to_proptest_config())]

    #[test]
    fn indices_are_dense_and_sorted_by_name(key in literal_key_strategy(8)) {
        let mut registry = SchemaRegistry::new(single_type_catalog());
        registry.declare_key("Generated", key.declaration()).unwrap();
        let schemas = registry.commit().unwrap();
        let schema = schemas.schema_of("Generated").unwrap();

        prop_assert_eq!(schema.len(), key.parts.len());
        let names: Vec<_> = schema.names().map(str::to_string).collect();
        prop_assert_eq!(names, key.sorted_names());
        for (position, part) in schema.parts().iter().enumerate() {
            prop_assert_eq!(part.definition().index(), position);
        }
    }

    #[test]
    fn redeclaring_always_fails(key in literal_key_strategy(3), alias_first in any::<bool>()) {
        let mut registry = SchemaRegistry::new(single_type_catalog());
        registry.declare_key("Mirror", key.declaration()).unwrap();
        let err = if alias_first {
            registry.declare_key_alias("Generated", "Mirror").unwrap();
            registry.declare_key("Generated", key.declaration()).unwrap_err()
        } else {
            registry.declare_key("Generated", key.declaration()).unwrap();
            registry.declare_key_alias("Generated", "Mirror").unwrap_err()
        };
        prop_assert!(
            matches!(&err, KeyBoxError::AlreadyMapped { type_name } if type_name == "Generated"),
            "unexpected error: {}",
            err
        );
    }

    #[test]
    fn literal_rings_report_values_in_index_order(key in literal_key_strategy(6)) {
        let mut catalog = TypeCatalog::new();
        catalog.register(TypeDescriptor::class("Generated")).unwrap();
        let declaration = key.declaration();
        let h = KeyBoxHarness::build(catalog, |schemas| {
            schemas.declare_key("Generated", declaration)?;
            Ok(())
        })
        .unwrap();

        let instance = h.create("Generated");
        let ring = h.ring(&instance);
        for (name, _, value) in &key.parts {
            prop_assert!(!ring.is_completed());
            ring.set(name, value.clone()).unwrap();
        }
        prop_assert!(ring.is_completed());
        prop_assert_eq!(ring.key_values().unwrap().into_inner(), key.values_in_index_order());
    }
}

#[test]
fn poco_schemas_follow_declaration_order() {
    let h = poco_harness();
    let declared: Vec<_> = h.schemas.declared_types().collect();
    assert_eq!(
        declared,
        [
            "Poco",
            "CompositePoco",
            "RelatedPoco",
            "ForeignPoco",
            "InterfacePoco",
            "AliasPoco"
        ]
    );
    for (id, name) in declared.iter().enumerate() {
        assert_eq!(h.registry.type_id_of(name), Some(id as u32));
        assert_eq!(h.registry.type_by_id(id as u32), Some(*name));
    }
}

#[test]
fn aliases_share_one_schema() {
    let h = poco_harness();
    let poco = h.schemas.schema_of("Poco").unwrap();
    let alias = h.schemas.schema_of("AliasPoco").unwrap();
    assert!(Arc::ptr_eq(poco, alias));
    assert_eq!(alias.owner(), "Poco");
}

#[test]
fn nullable_segments_fail_declaration() {
    let mut registry = SchemaRegistry::new(Arc::new(poco_catalog()));
    let err = registry
        .declare_key("NullablePoco", [("Code", "/Related/Code")])
        .unwrap_err();
    assert!(matches!(err, KeyBoxError::NullablePathSegment { .. }), "{err}");
    assert!(err.is_configuration_error());
}

#[test]
fn alias_cycle_names_the_first_repeated_type() {
    let mut catalog = TypeCatalog::new();
    catalog
        .register_all(["A", "B", "C"].map(TypeDescriptor::class))
        .unwrap();
    let mut registry = SchemaRegistry::new(Arc::new(catalog));
    registry
        .declare_key_alias("A", "B")
        .unwrap()
        .declare_key_alias("B", "C")
        .unwrap()
        .declare_key_alias("C", "A")
        .unwrap();
    let err = registry.commit().unwrap_err();
    assert_eq!(err.to_string(), "Example loop detected: A");
}

#[test]
fn dangling_alias_chain_lists_every_type() {
    let mut catalog = TypeCatalog::new();
    catalog
        .register_all(["A", "B", "C"].map(TypeDescriptor::class))
        .unwrap();
    let mut registry = SchemaRegistry::new(Arc::new(catalog));
    registry
        .declare_key_alias("B", "C")
        .unwrap()
        .declare_key_alias("A", "B")
        .unwrap();
    let err = registry.commit().unwrap_err();
    assert_eq!(err.to_string(), "Keys not mapped for: A, B, C");
}

#[test]
fn foreign_key_issues_are_reported_together() {
    let mut registry = SchemaRegistry::new(Arc::new(order_catalog()));
    registry
        .declare_key("Customer", [("Code", "/Code")])
        .unwrap()
        .declare_key("Order", [("Number", "/Number"), ("Region", "/Customer/Region")])
        .unwrap()
        .declare_key("OrderLine", [("Branch", "/Order/Branch"), ("Line", "/Line")])
        .unwrap();
    let err = registry.commit().unwrap_err();
    let KeyBoxError::InvalidForeignKeyPath { issues } = err else {
        panic!("expected InvalidForeignKeyPath, got {err}");
    };
    let mut found: Vec<_> = issues
        .iter()
        .map(|issue| (issue.type_name.as_str(), issue.missing_part.as_str()))
        .collect();
    found.sort_unstable();
    assert_eq!(found, [("Order", "Region"), ("OrderLine", "Branch")]);
    assert!(!registry.is_committed());
}

#[test]
fn part_types_come_from_the_catalog() {
    let h = order_harness();
    let line = h.schemas.schema_of("OrderLine").unwrap();
    let types: Vec<_> = line
        .parts()
        .iter()
        .map(|part| (part.name(), part.definition().value_type()))
        .collect();
    assert_eq!(
        types,
        [
            ("Client", ValueType::Text),
            ("Line", ValueType::Integer),
            ("Number", ValueType::Integer)
        ]
    );
}
