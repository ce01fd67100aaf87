//! Benchmark utilities.

use keybox_codec::{EncodedKey, Value};
use keybox_core::Instance;
use keybox_testkit::KeyBoxHarness;
use rand::distributions::Alphanumeric;
use rand::Rng;

/// Generate a random customer code of `len` characters.
pub fn random_code(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Create `count` customers with random codes and attach their rings.
pub fn keyed_customers(harness: &KeyBoxHarness, count: usize) -> Vec<Instance> {
    (0..count)
        .map(|_| {
            let customer = harness.create_with("Customer", &[("Code", random_code(8).into())]);
            harness.ring(&customer);
            customer
        })
        .collect()
}

/// Generate `count` order line envelopes with random clients.
pub fn order_line_keys(type_id: u32, count: usize) -> Vec<EncodedKey> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|_| {
            EncodedKey::new(
                type_id,
                vec![
                    Value::from(random_code(6)),
                    Value::Integer(rng.gen_range(1..100)),
                    Value::Integer(rng.gen_range(1..10_000)),
                ],
            )
        })
        .collect()
}
