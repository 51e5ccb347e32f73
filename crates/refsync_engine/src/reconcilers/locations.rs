//! Locations, read from the dictionary of a list field.

use crate::catalog::{CatalogConfig, FIELD_METHOD};
use crate::decode::{element_id, element_name, first_scalar, DecodeDictionary};
use crate::entity::EntityKind;
use crate::error::{EngineError, EngineResult};
use crate::reconcile::{EntityReconciler, RemoteBatch, UpsertOutcome};
use refsync_remote::RemoteClient;
use refsync_store::{Connection, ExternalKey, NewLocation, Tables};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

/// A decoded location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationItem {
    key: ExternalKey,
    name: String,
}

/// Reconciles locations.
///
/// The remote side keeps locations as the code to label dictionary of a
/// field on the asset list. Every dictionary entry becomes one item.
#[derive(Debug, Clone)]
pub struct LocationReconciler {
    catalog: CatalogConfig,
}

impl LocationReconciler {
    /// Creates a location reconciler.
    pub fn new(catalog: CatalogConfig) -> Self {
        Self { catalog }
    }
}

impl EntityReconciler for LocationReconciler {
    type Item = LocationItem;
    type Context = ();

    fn kind(&self) -> EntityKind {
        EntityKind::Location
    }

    fn fetch_remote(&self, remote: &RemoteClient) -> EngineResult<RemoteBatch<()>> {
        let list_id = &self.catalog.location_list_id;
        let fields = remote.call(FIELD_METHOD, &self.catalog.list_params(list_id))?;

        let (property, dictionary) =
            DecodeDictionary::find(&fields, self.catalog.location_property.as_deref(), list_id)
                .ok_or_else(|| {
                    EngineError::decode(format!("no location dictionary in list {list_id}"))
                })?;
        info!(property = %property, entries = dictionary.len(), "Found location dictionary");

        Ok(RemoteBatch::plain(dictionary_items(&dictionary)))
    }

    fn decode_item(&self, raw: &Value, _: &()) -> EngineResult<Option<LocationItem>> {
        decode_named(raw).map(|item| item.map(|(key, name)| LocationItem { key, name }))
    }

    fn upsert(&self, conn: &Connection, item: &LocationItem) -> EngineResult<UpsertOutcome> {
        let table = conn.locations();

        if let Some(mut row) = table.find_by_external_key(item.key)? {
            row.name.clone_from(&item.name);
            table.update(&row)?;
            return Ok(UpsertOutcome::Updated);
        }

        // Names are unique, so a name match is claimed even if it was
        // linked to another key before.
        if let Some(mut row) = table.find_by_name(&item.name)? {
            debug!(name = %item.name, previous = ?row.external_key, key = item.key, "Relinking location");
            row.external_key = Some(item.key);
            table.update(&row)?;
            return Ok(UpsertOutcome::Updated);
        }

        table.insert(&NewLocation {
            name: item.name.clone(),
            external_key: Some(item.key),
        })?;
        Ok(UpsertOutcome::Created)
    }
}

/// Turns dictionary entries into `{ID, NAME}` items.
pub(super) fn dictionary_items(dictionary: &DecodeDictionary) -> Vec<Value> {
    dictionary
        .entries()
        .iter()
        .map(|(code, label)| json!({ "ID": code, "NAME": label }))
        .collect()
}

/// Decodes an `{ID, NAME}` item of a dictionary or element list.
///
/// A non-numeric id is an error; a missing name is a skip.
pub(super) fn decode_named(raw: &Value) -> EngineResult<Option<(ExternalKey, String)>> {
    let id = first_scalar(raw.get("ID"));
    let Some(key) = element_id(raw) else {
        return Err(EngineError::decode(format!(
            "invalid id {}",
            id.as_deref().unwrap_or("<missing>")
        )));
    };
    match element_name(raw) {
        Some(name) => Ok(Some((key, name))),
        None => {
            warn!(key, "Skipping item without a name");
            Ok(None)
        }
    }
}
