//! Ordered key value lists used as identity-map keys.

use keybox_codec::Value;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::ops::Index;

/// Hash of an empty key value list.
pub const EMPTY_KEY_HASH: u64 = 42;

/// The values of a key, in canonical part order.
///
/// Two lists are equal when they have the same length and pairwise equal
/// values. The hash folds per-value hashes as `acc + hash(v) * 7`, with null
/// contributing 0, so it does not depend on value order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyValues(Vec<Value>);

impl KeyValues {
    /// Wraps a list of values.
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    /// The values as a slice.
    pub fn as_slice(&self) -> &[Value] {
        &self.0
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether any value is null.
    pub fn has_null(&self) -> bool {
        self.0.iter().any(Value::is_null)
    }

    /// Unwraps the values.
    pub fn into_inner(self) -> Vec<Value> {
        self.0
    }

    /// The folded hash of the list.
    pub fn fold_hash(&self) -> u64 {
        if self.0.is_empty() {
            return EMPTY_KEY_HASH;
        }
        self.0
            .iter()
            .fold(0u64, |acc, value| acc.wrapping_add(value_hash(value).wrapping_mul(7)))
    }
}

fn value_hash(value: &Value) -> u64 {
    if value.is_null() {
        return 0;
    }
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

impl Hash for KeyValues {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.fold_hash());
    }
}

impl Index<usize> for KeyValues {
    type Output = Value;

    fn index(&self, index: usize) -> &Value {
        &self.0[index]
    }
}

impl From<Vec<Value>> for KeyValues {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

impl FromIterator<Value> for KeyValues {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a KeyValues {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
