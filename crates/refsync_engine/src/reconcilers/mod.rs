//! Concrete reconcilers, one per entity kind.

mod assets;
mod categories;
mod issues;
mod locations;
mod operators;

pub use assets::AssetReconciler;
pub use categories::CategoryReconciler;
pub use issues::IssueReconciler;
pub use locations::LocationReconciler;
pub use operators::OperatorReconciler;

use crate::catalog::{CatalogConfig, StaleLabelPolicy};
use crate::decode::{first_code, DecodeDictionary};
use refsync_remote::RemoteClient;
use serde_json::Value;
use tracing::{info, warn};

/// How an upsert treats the local status label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusUpdate {
    /// Leave the stored label as it is.
    Keep,
    /// Overwrite the stored label.
    Set(Option<String>),
}

impl StatusUpdate {
    /// Applies the update to a stored label.
    pub(crate) fn apply(&self, current: &mut Option<String>) {
        if let StatusUpdate::Set(label) = self {
            current.clone_from(label);
        }
    }

    /// Returns the label for a freshly inserted row.
    pub(crate) fn initial(&self) -> Option<String> {
        match self {
            StatusUpdate::Keep => None,
            StatusUpdate::Set(label) => label.clone(),
        }
    }
}

/// The per-run status decoding context of assets and issues.
#[derive(Debug, Default)]
pub struct StatusContext {
    property: Option<String>,
    dictionary: Option<DecodeDictionary>,
    policy: StaleLabelPolicy,
}

impl StatusContext {
    /// Loads the status dictionary of `property` in `list_id`.
    ///
    /// A failed load is logged and leaves every label untouched.
    pub(crate) fn load(
        remote: &RemoteClient,
        catalog: &CatalogConfig,
        list_id: &str,
        property: Option<&str>,
    ) -> Self {
        let Some(property) = property else {
            return Self::default();
        };

        let dictionary =
            match DecodeDictionary::load(remote, &catalog.list_type_id, list_id, property) {
                Ok(dictionary) => {
                    info!(property, entries = dictionary.len(), "Loaded status dictionary");
                    Some(dictionary)
                }
                Err(e) => {
                    warn!(property, error = %e, "Status dictionary unavailable, keeping labels");
                    None
                }
            };

        Self {
            property: Some(property.to_string()),
            dictionary,
            policy: catalog.stale_labels,
        }
    }

    /// Decodes the status of one raw item.
    pub(crate) fn decode(&self, raw: &Value) -> StatusUpdate {
        let (Some(property), Some(dictionary)) = (&self.property, &self.dictionary) else {
            return StatusUpdate::Keep;
        };

        match first_code(raw.get(property.as_str())) {
            None => StatusUpdate::Set(None),
            Some(code) => match dictionary.label(&code) {
                Some(label) => StatusUpdate::Set(Some(label.to_string())),
                None => match self.policy {
                    StaleLabelPolicy::Clear => StatusUpdate::Set(None),
                    StaleLabelPolicy::Keep => StatusUpdate::Keep,
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context(policy: StaleLabelPolicy) -> StatusContext {
        StatusContext {
            property: Some("PROPERTY_645".into()),
            dictionary: Some(DecodeDictionary::from_pairs([("10", "Working")])),
            policy,
        }
    }

    #[test]
    fn status_labels_decode_through_dictionary() {
        let ctx = context(StaleLabelPolicy::Clear);
        assert_eq!(
            ctx.decode(&json!({"PROPERTY_645": {"1": "10"}})),
            StatusUpdate::Set(Some("Working".into()))
        );
        assert_eq!(ctx.decode(&json!({})), StatusUpdate::Set(None));
    }

    #[test]
    fn unknown_codes_follow_policy() {
        let raw = json!({"PROPERTY_645": "99"});
        assert_eq!(
            context(StaleLabelPolicy::Clear).decode(&raw),
            StatusUpdate::Set(None)
        );
        assert_eq!(context(StaleLabelPolicy::Keep).decode(&raw), StatusUpdate::Keep);
    }

    #[test]
    fn missing_dictionary_keeps_labels() {
        let ctx = StatusContext {
            property: Some("PROPERTY_645".into()),
            ..StatusContext::default()
        };
        assert_eq!(ctx.decode(&json!({"PROPERTY_645": "10"})), StatusUpdate::Keep);

        let mut label = Some("Old".to_string());
        StatusUpdate::Keep.apply(&mut label);
        assert_eq!(label.as_deref(), Some("Old"));
        StatusUpdate::Set(None).apply(&mut label);
        assert_eq!(label, None);
    }
}
