//! Issue categories.

use super::locations::{decode_named, dictionary_items};
use crate::catalog::{CatalogConfig, CategorySource, ELEMENT_METHOD, FIELD_METHOD};
use crate::decode::DecodeDictionary;
use crate::entity::EntityKind;
use crate::error::{EngineError, EngineResult};
use crate::reconcile::{EntityReconciler, RemoteBatch, UpsertOutcome};
use refsync_remote::RemoteClient;
use refsync_store::{Connection, ExternalKey, NewIssueCategory, Tables};
use serde_json::Value;
use tracing::{debug, info};

/// A decoded issue category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryItem {
    key: ExternalKey,
    name: String,
}

/// Reconciles issue categories from a field dictionary or an element list.
#[derive(Debug, Clone)]
pub struct CategoryReconciler {
    catalog: CatalogConfig,
}

impl CategoryReconciler {
    /// Creates a category reconciler.
    pub fn new(catalog: CatalogConfig) -> Self {
        Self { catalog }
    }
}

impl EntityReconciler for CategoryReconciler {
    type Item = CategoryItem;
    type Context = ();

    fn kind(&self) -> EntityKind {
        EntityKind::IssueCategory
    }

    fn fetch_remote(&self, remote: &RemoteClient) -> EngineResult<RemoteBatch<()>> {
        match &self.catalog.category_source {
            CategorySource::FieldDictionary { list_id, property } => {
                let fields = remote.call(FIELD_METHOD, &self.catalog.list_params(list_id))?;
                let (property, dictionary) =
                    DecodeDictionary::find(&fields, property.as_deref(), list_id).ok_or_else(
                        || EngineError::decode(format!("no category dictionary in list {list_id}")),
                    )?;
                info!(property = %property, entries = dictionary.len(), "Found category dictionary");
                Ok(RemoteBatch::plain(dictionary_items(&dictionary)))
            }
            CategorySource::ElementList { list_id } => {
                let envelope =
                    remote.call_envelope(ELEMENT_METHOD, &self.catalog.list_params(list_id))?;
                Ok(RemoteBatch::plain(envelope.items()))
            }
        }
    }

    fn decode_item(&self, raw: &Value, _: &()) -> EngineResult<Option<CategoryItem>> {
        decode_named(raw).map(|item| item.map(|(key, name)| CategoryItem { key, name }))
    }

    fn upsert(&self, conn: &Connection, item: &CategoryItem) -> EngineResult<UpsertOutcome> {
        let table = conn.categories();

        if let Some(mut row) = table.find_by_external_key(item.key)? {
            row.name.clone_from(&item.name);
            table.update(&row)?;
            return Ok(UpsertOutcome::Updated);
        }

        if let Some(mut row) = table.find_by_name(&item.name)? {
            debug!(name = %item.name, previous = ?row.external_key, key = item.key, "Relinking category");
            row.external_key = Some(item.key);
            table.update(&row)?;
            return Ok(UpsertOutcome::Updated);
        }

        table.insert(&NewIssueCategory {
            name: item.name.clone(),
            external_key: Some(item.key),
        })?;
        Ok(UpsertOutcome::Created)
    }
}
