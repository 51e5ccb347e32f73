//! Builders for remote API payloads.

use serde_json::{json, Map, Value};

/// Builds a `lists.field.get` result holding one dictionary field.
///
/// `entries` are `(code, label)` pairs, kept in the given order.
pub fn field_dictionary(property: &str, list_id: i64, entries: &[(&str, &str)]) -> Value {
    let mut fields = Map::new();
    fields.insert(property.to_string(), dictionary_field(list_id, entries));
    Value::Object(fields)
}

/// Builds one field definition with a `DISPLAY_VALUES_FORM` dictionary.
pub fn dictionary_field(list_id: i64, entries: &[(&str, &str)]) -> Value {
    let values: Map<String, Value> = entries
        .iter()
        .map(|(code, label)| (code.to_string(), json!(label)))
        .collect();
    json!({
        "IBLOCK_ID": list_id,
        "TYPE": "L",
        "DISPLAY_VALUES_FORM": values,
    })
}

/// Builds a list element with an id and a name.
pub fn element(id: i64, name: &str) -> Value {
    json!({ "ID": id.to_string(), "NAME": name })
}

/// Sets `property` on a list element.
pub fn with_property(mut element: Value, property: &str, value: Value) -> Value {
    if let Value::Object(map) = &mut element {
        map.insert(property.to_string(), value);
    }
    element
}

/// Encodes a property the way list elements usually carry it:
/// a map from an internal value id to the value.
pub fn keyed(value: impl Into<Value>) -> Value {
    json!({ "100500": value.into() })
}

/// Builds a `user.get` item.
pub fn user(id: i64, first_name: &str, last_name: &str) -> Value {
    json!({ "ID": id.to_string(), "NAME": first_name, "LAST_NAME": last_name })
}
