//! Property-based test generators using proptest.
//!
//! Provides strategies for key part names, part types and values that
//! respect the invariants key declarations rely on.

use keybox_codec::{Value, ValueType};
use proptest::prelude::*;
use std::collections::BTreeSet;

/// Strategy for generating valid key part names.
pub fn part_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Z][A-Za-z0-9_]{0,11}").expect("Invalid regex")
}

/// Strategy for generating 1..=`max` distinct part names, in arbitrary
/// declaration order.
pub fn part_names_strategy(max: usize) -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set(part_name_strategy(), 1..=max.max(1))
        .prop_map(|names: BTreeSet<String>| names.into_iter().collect::<Vec<_>>())
        .prop_shuffle()
}

/// Strategy for concrete part types (never [`ValueType::Any`]).
pub fn value_type_strategy() -> impl Strategy<Value = ValueType> {
    prop_oneof![
        Just(ValueType::Bool),
        Just(ValueType::Integer),
        Just(ValueType::Text),
        Just(ValueType::Bytes),
    ]
}

/// Strategy for non-null values accepted by `ty`.
pub fn value_strategy(ty: ValueType) -> BoxedStrategy<Value> {
    match ty {
        ValueType::Bool => any::<bool>().prop_map(Value::Bool).boxed(),
        ValueType::Integer => any::<i64>().prop_map(Value::Integer).boxed(),
        ValueType::Text => prop::string::string_regex("[a-zA-Z0-9 ]{0,16}")
            .expect("Invalid regex")
            .prop_map(Value::Text)
            .boxed(),
        ValueType::Bytes => prop::collection::vec(any::<u8>(), 0..16)
            .prop_map(Value::Bytes)
            .boxed(),
        ValueType::Any => prop_oneof![
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::Integer),
            "[a-z]{0,8}".prop_map(Value::Text),
        ]
        .boxed(),
    }
}

/// A literal key declaration together with one value per part.
#[derive(Debug, Clone)]
pub struct LiteralKey {
    /// `(name, type, value)` in declaration order.
    pub parts: Vec<(String, ValueType, Value)>,
}

impl LiteralKey {
    /// `(name, type)` pairs for `declare_key`.
    pub fn declaration(&self) -> Vec<(String, ValueType)> {
        self.parts
            .iter()
            .map(|(name, ty, _)| (name.clone(), *ty))
            .collect()
    }

    /// Part names sorted the way indices are assigned.
    pub fn sorted_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.parts.iter().map(|(name, _, _)| name.clone()).collect();
        names.sort();
        names
    }

    /// Values in index order.
    pub fn values_in_index_order(&self) -> Vec<Value> {
        let mut parts: Vec<_> = self.parts.iter().collect();
        parts.sort_by(|a, b| a.0.cmp(&b.0));
        parts.into_iter().map(|(_, _, value)| value.clone()).collect()
    }
}

/// Strategy for literal key declarations with up to `max_parts` parts.
pub fn literal_key_strategy(max_parts: usize) -> impl Strategy<Value = LiteralKey> {
    part_names_strategy(max_parts).prop_flat_map(|names| {
        let parts: Vec<_> = names
            .into_iter()
            .map(|name| {
                value_type_strategy().prop_flat_map(move |ty| {
                    let name = name.clone();
                    value_strategy(ty).prop_map(move |value| (name.clone(), ty, value))
                })
            })
            .collect();
        parts.prop_map(|parts| LiteralKey { parts })
    })
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn part_names_are_distinct(names in part_names_strategy(6)) {
            let unique: BTreeSet<_> = names.iter().collect();
            prop_assert_eq!(unique.len(), names.len());
            prop_assert!(!names.is_empty());
        }

        #[test]
        fn values_match_their_type(
            (ty, value) in value_type_strategy().prop_flat_map(|ty| (Just(ty), value_strategy(ty)))
        ) {
            prop_assert!(ty.accepts(&value));
            prop_assert!(!value.is_null());
        }

        #[test]
        fn literal_keys_order_by_name(key in literal_key_strategy(5)) {
            let names = key.sorted_names();
            let mut sorted = names.clone();
            sorted.sort();
            prop_assert_eq!(names, sorted);
            prop_assert_eq!(key.values_in_index_order().len(), key.parts.len());
        }
    }
}
