//! Decoding of remote property values.
//!
//! List properties arrive in one of three shapes depending on the field
//! type and the remote version: a list (`["5"]`), a map from an internal
//! value id to the value (`{"100500": "5"}`), or a bare scalar (`"5"` or
//! `5`). Every reconciler goes through [`FieldValue`] so the shapes are
//! handled in one place.

use crate::catalog::FIELD_METHOD;
use crate::error::EngineResult;
use refsync_remote::RemoteClient;
use refsync_store::ExternalKey;
use serde_json::{json, Map, Value};

/// The shape of a remote property value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    /// Absent or null.
    Missing,
    /// A string, number or boolean.
    Scalar(&'a Value),
    /// A list of values.
    List(&'a [Value]),
    /// A map of internal value ids to values.
    Keyed(&'a Map<String, Value>),
}

impl<'a> FieldValue<'a> {
    /// Classifies a property value.
    pub fn of(value: Option<&'a Value>) -> Self {
        match value {
            None | Some(Value::Null) => FieldValue::Missing,
            Some(Value::Array(items)) => FieldValue::List(items),
            Some(Value::Object(map)) => FieldValue::Keyed(map),
            Some(scalar) => FieldValue::Scalar(scalar),
        }
    }

    /// Returns the first present scalar as trimmed text.
    ///
    /// Empty strings and empty containers count as absent.
    pub fn first(&self) -> Option<String> {
        match self {
            FieldValue::Missing => None,
            FieldValue::Scalar(value) => scalar_text(value),
            FieldValue::List(items) => items
                .iter()
                .find_map(|item| FieldValue::of(Some(item)).first()),
            FieldValue::Keyed(map) => map
                .values()
                .find_map(|item| FieldValue::of(Some(item)).first()),
        }
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Returns the first present scalar of a property value.
pub fn first_scalar(value: Option<&Value>) -> Option<String> {
    FieldValue::of(value).first()
}

/// Returns the first present value as a positive external key.
pub fn first_key(value: Option<&Value>) -> Option<ExternalKey> {
    first_scalar(value)
        .and_then(|text| text.parse::<ExternalKey>().ok())
        .filter(|key| *key > 0)
}

/// Returns the first present value as a dictionary code.
///
/// Numeric codes are normalized (`"007"` and `7` both become `"7"`).
pub(crate) fn first_code(value: Option<&Value>) -> Option<String> {
    first_scalar(value).map(normalize_code)
}

fn normalize_code(code: String) -> String {
    match code.parse::<i64>() {
        Ok(n) => n.to_string(),
        Err(_) => code,
    }
}

/// Returns the `ID` of a list element.
pub fn element_id(item: &Value) -> Option<ExternalKey> {
    first_key(item.get("ID"))
}

/// Returns the trimmed `NAME` of a list element.
pub fn element_name(item: &Value) -> Option<String> {
    first_scalar(item.get("NAME"))
}

/// A code to label dictionary taken from a field definition.
///
/// Entries keep the order the remote side sent them in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeDictionary {
    entries: Vec<(String, String)>,
}

impl DecodeDictionary {
    /// Builds a dictionary from `(code, label)` pairs.
    pub fn from_pairs<I, C, L>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (C, L)>,
        C: Into<String>,
        L: Into<String>,
    {
        Self {
            entries: pairs
                .into_iter()
                .map(|(code, label)| (normalize_code(code.into()), label.into()))
                .collect(),
        }
    }

    /// Reads the `DISPLAY_VALUES_FORM` of a field definition.
    ///
    /// Both a code to label object and a list of `{ID, VALUE}` objects are
    /// accepted.
    pub fn from_field(field: &Value) -> Self {
        let mut entries = Vec::new();
        match field.get("DISPLAY_VALUES_FORM") {
            Some(Value::Object(values)) => {
                for (code, label) in values {
                    let code = code.trim();
                    if !code.is_empty() {
                        entries.push((
                            normalize_code(code.to_string()),
                            scalar_text(label).unwrap_or_default(),
                        ));
                    }
                }
            }
            Some(Value::Array(values)) => {
                for value in values {
                    if let Some(code) = first_scalar(value.get("ID")) {
                        let label = first_scalar(value.get("VALUE")).unwrap_or_default();
                        entries.push((normalize_code(code), label));
                    }
                }
            }
            _ => {}
        }
        Self { entries }
    }

    /// Finds a dictionary among the fields returned by a field-definition call.
    ///
    /// With `property` set, that field is used. Otherwise the first field
    /// that belongs to `list_id` (when the field says which list it
    /// belongs to) and has a non-empty dictionary is used. Returns the
    /// field code with its dictionary.
    pub fn find(fields: &Value, property: Option<&str>, list_id: &str) -> Option<(String, Self)> {
        let fields = fields.as_object()?;

        if let Some(property) = property {
            return fields
                .get(property)
                .map(|field| (property.to_string(), Self::from_field(field)));
        }

        fields.iter().find_map(|(code, field)| {
            if !field.is_object() {
                return None;
            }
            if let Some(owner) = first_scalar(field.get("IBLOCK_ID")) {
                if owner != list_id {
                    return None;
                }
            }
            let dictionary = Self::from_field(field);
            (!dictionary.is_empty()).then(|| (code.clone(), dictionary))
        })
    }

    /// Loads the dictionary of `property` in list `list_id`.
    pub fn load(
        remote: &RemoteClient,
        list_type_id: &str,
        list_id: &str,
        property: &str,
    ) -> EngineResult<Self> {
        let fields = remote.call(
            FIELD_METHOD,
            &json!({ "IBLOCK_TYPE_ID": list_type_id, "IBLOCK_ID": list_id }),
        )?;
        Ok(Self::find(&fields, Some(property), list_id)
            .map(|(_, dictionary)| dictionary)
            .unwrap_or_default())
    }

    /// Returns the label for `code`.
    pub fn label(&self, code: &str) -> Option<&str> {
        let code = normalize_code(code.to_string());
        self.entries
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, label)| label.as_str())
    }

    /// Returns the entries in remote order.
    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the dictionary has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use refsync_testkit::{empty_value_strategy, encoded_key_strategy};

    #[test]
    fn shapes_normalize_to_first_value() {
        assert_eq!(first_scalar(Some(&json!(["5", "6"]))), Some("5".into()));
        assert_eq!(first_scalar(Some(&json!({"99973": "1469"}))), Some("1469".into()));
        assert_eq!(first_scalar(Some(&json!(" North "))), Some("North".into()));
        assert_eq!(first_scalar(Some(&json!(12))), Some("12".into()));
        assert_eq!(first_scalar(Some(&json!(["", "7"]))), Some("7".into()));
        assert_eq!(first_scalar(None), None);
    }

    #[test]
    fn keys_must_be_positive_integers() {
        assert_eq!(first_key(Some(&json!("42"))), Some(42));
        assert_eq!(first_key(Some(&json!("0"))), None);
        assert_eq!(first_key(Some(&json!("-3"))), None);
        assert_eq!(first_key(Some(&json!("abc"))), None);
    }

    #[test]
    fn codes_are_normalized() {
        assert_eq!(first_code(Some(&json!("007"))), Some("7".into()));
        assert_eq!(first_code(Some(&json!({"1": "Y"}))), Some("Y".into()));
    }

    #[test]
    fn dictionary_from_object_and_list() {
        let from_object = DecodeDictionary::from_field(&json!({
            "DISPLAY_VALUES_FORM": {"10": "Working", "11": "Broken"}
        }));
        assert_eq!(from_object.label("10"), Some("Working"));
        assert_eq!(from_object.label("011"), Some("Broken"));

        let from_list = DecodeDictionary::from_field(&json!({
            "DISPLAY_VALUES_FORM": [{"ID": "10", "VALUE": "Working"}]
        }));
        assert_eq!(from_list.label("10"), Some("Working"));
        assert_eq!(from_list.label("12"), None);
    }

    #[test]
    fn find_scans_for_first_non_empty_field_of_the_list() {
        let fields = json!({
            "NAME": {"IBLOCK_ID": 77, "TYPE": "S"},
            "PROPERTY_1": {"IBLOCK_ID": 78, "DISPLAY_VALUES_FORM": {"1": "Other list"}},
            "PROPERTY_2": {"IBLOCK_ID": 77, "DISPLAY_VALUES_FORM": {}},
            "PROPERTY_3": {"IBLOCK_ID": "77", "DISPLAY_VALUES_FORM": {"5": "North"}},
        });
        let (code, dictionary) = DecodeDictionary::find(&fields, None, "77").unwrap();
        assert_eq!(code, "PROPERTY_3");
        assert_eq!(dictionary.entries(), &[("5".to_string(), "North".to_string())]);

        let (code, dictionary) = DecodeDictionary::find(&fields, Some("PROPERTY_2"), "77").unwrap();
        assert_eq!(code, "PROPERTY_2");
        assert!(dictionary.is_empty());

        assert!(DecodeDictionary::find(&fields, None, "99").is_none());
    }

    proptest! {
        #[test]
        fn every_shape_decodes_to_the_key((key, encoded) in encoded_key_strategy()) {
            prop_assert_eq!(first_key(Some(&encoded)), Some(key));
        }

        #[test]
        fn empty_values_decode_to_none(value in empty_value_strategy()) {
            prop_assert_eq!(first_scalar(Some(&value)), None);
        }
    }
}
