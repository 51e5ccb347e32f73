//! Property-based test generators using proptest.
//!
//! The remote side encodes a single property value in several shapes.
//! These strategies produce every shape for the same underlying value.

use proptest::prelude::*;
use serde_json::{json, Value};

/// Wire shape of a property value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireShape {
    /// `["5"]`
    List,
    /// `{"100500": "5"}`
    Keyed,
    /// `"5"`
    Text,
    /// `5`
    Number,
}

/// Encodes a positive key in the given shape.
pub fn encode_key(key: i64, shape: WireShape) -> Value {
    match shape {
        WireShape::List => json!([key.to_string()]),
        WireShape::Keyed => json!({ "100500": key.to_string() }),
        WireShape::Text => json!(key.to_string()),
        WireShape::Number => json!(key),
    }
}

/// Strategy for wire shapes.
pub fn wire_shape_strategy() -> impl Strategy<Value = WireShape> {
    prop_oneof![
        Just(WireShape::List),
        Just(WireShape::Keyed),
        Just(WireShape::Text),
        Just(WireShape::Number),
    ]
}

/// Strategy for a positive key together with one of its encodings.
pub fn encoded_key_strategy() -> impl Strategy<Value = (i64, Value)> {
    (1i64..1_000_000, wire_shape_strategy()).prop_map(|(key, shape)| (key, encode_key(key, shape)))
}

/// Strategy for values that carry nothing.
pub fn empty_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        Just(json!([])),
        Just(json!({})),
        Just(json!("")),
        Just(json!("   ")),
        Just(json!([""])),
    ]
}

/// Strategy for display names.
pub fn name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Za-z][A-Za-z0-9 ]{0,23}")
        .expect("Invalid regex")
        .prop_map(|s| s.trim().to_string())
        .prop_filter("Name must not be empty", |s| !s.is_empty())
}

/// Strategy for a list of distinct `(key, name)` pairs.
pub fn catalog_strategy(max_len: usize) -> impl Strategy<Value = Vec<(i64, String)>> {
    prop::collection::btree_map(1i64..100_000, name_strategy(), 0..max_len).prop_map(|entries| {
        let mut seen = std::collections::HashSet::new();
        entries
            .into_iter()
            .filter(|(_, name)| seen.insert(name.clone()))
            .collect()
    })
}
