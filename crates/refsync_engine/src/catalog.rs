//! Where each entity lives on the remote side.

use serde_json::{json, Value};

/// Method returning the field definitions of a list.
pub(crate) const FIELD_METHOD: &str = "lists.field.get";

/// Method returning the elements of a list.
pub(crate) const ELEMENT_METHOD: &str = "lists.element.get";

/// Where issue categories are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategorySource {
    /// The dictionary of a list field. Without a property, the first
    /// field with a non-empty dictionary is used.
    FieldDictionary {
        /// List holding the field.
        list_id: String,
        /// Field code.
        property: Option<String>,
    },
    /// The elements of a list.
    ElementList {
        /// List id.
        list_id: String,
    },
}

/// What to do with a local status label whose code has no label in the
/// remote dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StaleLabelPolicy {
    /// Clear the local label.
    #[default]
    Clear,
    /// Keep whatever label is stored locally.
    Keep,
}

/// Remote list ids and property codes for every entity kind.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// List type shared by every list.
    pub list_type_id: String,
    /// List whose field dictionary holds the locations.
    pub location_list_id: String,
    /// Field holding the location dictionary. When unset, the first
    /// non-empty dictionary of the list is used.
    pub location_property: Option<String>,
    /// List holding the assets.
    pub asset_list_id: String,
    /// Asset property referencing the owning location.
    pub asset_location_property: String,
    /// Asset status property, decoded through the list's dictionary.
    pub asset_status_property: Option<String>,
    /// List holding the issues.
    pub issue_list_id: String,
    /// Issue property referencing the owning category.
    pub issue_category_property: String,
    /// Issue status property, decoded through the list's dictionary.
    pub issue_status_property: Option<String>,
    /// Source of the issue categories.
    pub category_source: CategorySource,
    /// Method listing operators.
    pub operator_method: String,
    /// Handling of status codes missing from the dictionary.
    pub stale_labels: StaleLabelPolicy,
    /// Requested page length for paginated lists; zero leaves it to the
    /// remote side.
    pub page_size: u32,
}

impl CatalogConfig {
    /// Creates the default catalog.
    pub fn new() -> Self {
        Self {
            list_type_id: "bitrix_processes".to_string(),
            location_list_id: "77".to_string(),
            location_property: Some("PROPERTY_637".to_string()),
            asset_list_id: "77".to_string(),
            asset_location_property: "PROPERTY_637".to_string(),
            asset_status_property: Some("PROPERTY_645".to_string()),
            issue_list_id: "123".to_string(),
            issue_category_property: "PROPERTY_1091".to_string(),
            issue_status_property: Some("PROPERTY_1115".to_string()),
            category_source: CategorySource::FieldDictionary {
                list_id: "127".to_string(),
                property: None,
            },
            operator_method: "user.get".to_string(),
            stale_labels: StaleLabelPolicy::Clear,
            page_size: 0,
        }
    }

    /// Sets the category source.
    pub fn with_category_source(mut self, source: CategorySource) -> Self {
        self.category_source = source;
        self
    }

    /// Sets the stale label policy.
    pub fn with_stale_labels(mut self, policy: StaleLabelPolicy) -> Self {
        self.stale_labels = policy;
        self
    }

    /// Sets the field holding the location dictionary.
    pub fn with_location_property(mut self, property: impl Into<String>) -> Self {
        self.location_property = Some(property.into());
        self
    }

    /// Uses the first non-empty dictionary of the location list instead
    /// of a fixed field.
    pub fn with_location_scan(mut self) -> Self {
        self.location_property = None;
        self
    }

    /// Sets the requested page length.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Builds the parameters addressing `list_id`.
    pub(crate) fn list_params(&self, list_id: &str) -> Value {
        json!({ "IBLOCK_TYPE_ID": self.list_type_id, "IBLOCK_ID": list_id })
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self::new()
    }
}
