//! Canonicalization of instances through the object cache.

use keybox_codec::{EncodedKey, Value};
use keybox_core::{same_instance, Instance, KeyBoxError};
use keybox_testkit::prelude::*;

#[test]
fn second_add_fills_the_canonical_instance() {
    let h = order_harness();
    let first = h.create_with("Customer", &[("Code", "A".into()), ("Name", "Ada".into())]);
    let second = h.create_with(
        "Customer",
        &[
            ("Code", "A".into()),
            ("Name", "Other".into()),
            ("Rating", Value::Integer(5)),
        ],
    );

    let canonical = h.cache.add("Customer", &h.ring(&first), first.clone()).unwrap();
    assert!(same_instance(&canonical, &first));
    let merged = h.cache.add("Customer", &h.ring(&second), second.clone()).unwrap();
    assert!(same_instance(&merged, &first));

    assert_eq!(h.read(&first, "Name"), Value::from("Ada"));
    assert_eq!(h.read(&first, "Rating"), Value::Integer(5));
    assert_eq!(h.read(&second, "Name"), Value::from("Other"));
    assert_eq!(h.cache.len(), 1);
}

#[test]
fn adding_the_canonical_instance_again_is_a_no_op() {
    let h = order_harness();
    let customer = h.create_with("Customer", &[("Code", "A".into())]);
    let ring = h.ring(&customer);
    h.cache.add("Customer", &ring, customer.clone()).unwrap();
    let again = h.cache.add("Customer", &ring, customer.clone()).unwrap();
    assert!(same_instance(&again, &customer));
    assert_eq!(h.cache.len(), 1);
}

#[test]
fn incomplete_keys_cannot_be_looked_up() {
    let h = order_harness();
    let customer = h.create("Customer");
    let ring = h.ring(&customer);
    assert!(matches!(
        h.cache.try_get("Customer", &ring),
        Err(KeyBoxError::IncompleteKey { type_name }) if type_name == "Customer"
    ));
    assert!(matches!(
        h.cache.add("Customer", &ring, None::<Instance>),
        Err(KeyBoxError::NullValue)
    ));
}

#[test]
fn distinct_keys_stay_distinct() {
    let h = order_harness();
    for customer in scenarios::customers(&h, 4) {
        let canonical = h.cache.add("Customer", &h.ring(&customer), customer.clone()).unwrap();
        assert!(same_instance(&canonical, &customer));
    }
    assert_eq!(h.cache.len(), 4);
}

#[test]
fn instances_cached_under_an_interface_are_found_by_both_names() {
    let h = order_harness();
    let customer = h.create_with("Customer", &[("Code", "A".into())]);
    let ring = h.ring(&customer);
    h.cache.add("IParty", &ring, customer.clone()).unwrap();

    let by_interface = h.cache.try_get("IParty", &ring).unwrap().unwrap();
    let by_class = h.cache.try_get("Customer", &ring).unwrap().unwrap();
    assert!(same_instance(&by_interface, &customer));
    assert!(same_instance(&by_class, &customer));
}

#[test]
fn unrelated_declared_types_are_rejected() {
    let h = order_harness();
    let customer = h.create_with("Customer", &[("Code", "A".into())]);
    let ring = h.ring(&customer);
    assert!(matches!(
        h.cache.add("Order", &ring, customer),
        Err(KeyBoxError::TypeMismatch { .. })
    ));
}

#[test]
fn decoded_keys_resolve_to_the_canonical_instance() {
    let h = order_harness();
    let known = h.create_with("Customer", &[("Code", "ACME".into()), ("Name", "Acme".into())]);
    h.cache.add("Customer", &h.ring(&known), known.clone()).unwrap();

    let type_id = h.registry.type_id_of("Customer").unwrap();
    let bytes = EncodedKey::new(type_id, vec![Value::from("ACME")]).key_only(true).encode();
    let decoded = h.registry.decode_key(&bytes).unwrap();
    assert!(decoded.key_only);

    let found = h.cache.try_get(&decoded.type_name, &decoded.ring).unwrap().unwrap();
    assert!(same_instance(&found, &known));

    let stub = decoded.instance().expect("decoded source");
    let canonical = h.cache.add(&decoded.type_name, &decoded.ring, stub.clone()).unwrap();
    assert!(same_instance(&canonical, &known));
    assert!(!same_instance(&canonical, &stub));
    assert_eq!(h.read(&canonical, "Name"), Value::from("Acme"));
}
