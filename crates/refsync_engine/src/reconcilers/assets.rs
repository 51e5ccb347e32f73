//! Assets, read page by page from the asset list.

use super::locations::decode_named;
use super::{StatusContext, StatusUpdate};
use crate::catalog::{CatalogConfig, ELEMENT_METHOD};
use crate::decode::first_key;
use crate::entity::EntityKind;
use crate::error::{EngineError, EngineResult};
use crate::reconcile::{EntityReconciler, RemoteBatch, UpsertOutcome};
use refsync_remote::{RemoteClient, RemoteResult};
use refsync_store::{Connection, ExternalKey, NewAsset, Tables};
use serde_json::Value;
use tracing::{debug, warn};

/// A decoded asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetItem {
    key: ExternalKey,
    name: String,
    location_key: ExternalKey,
    status: StatusUpdate,
}

/// Reconciles assets.
///
/// Each asset names its location by external key; assets whose location
/// is not stored locally are recorded as errors and left out.
#[derive(Debug, Clone)]
pub struct AssetReconciler {
    catalog: CatalogConfig,
}

impl AssetReconciler {
    /// Creates an asset reconciler.
    pub fn new(catalog: CatalogConfig) -> Self {
        Self { catalog }
    }
}

impl EntityReconciler for AssetReconciler {
    type Item = AssetItem;
    type Context = StatusContext;

    fn kind(&self) -> EntityKind {
        EntityKind::Asset
    }

    fn fetch_remote(&self, remote: &RemoteClient) -> EngineResult<RemoteBatch<StatusContext>> {
        let list_id = &self.catalog.asset_list_id;
        let items = remote
            .paginate(
                ELEMENT_METHOD,
                self.catalog.list_params(list_id),
                self.catalog.page_size,
            )
            .collect::<RemoteResult<Vec<_>>>()?;

        let context = StatusContext::load(
            remote,
            &self.catalog,
            list_id,
            self.catalog.asset_status_property.as_deref(),
        );
        Ok(RemoteBatch { items, context })
    }

    fn decode_item(&self, raw: &Value, status: &StatusContext) -> EngineResult<Option<AssetItem>> {
        let Some((key, name)) = decode_named(raw)? else {
            return Ok(None);
        };
        let property = self.catalog.asset_location_property.as_str();
        let Some(location_key) = first_key(raw.get(property)) else {
            warn!(key, name = %name, property, "Skipping asset without a location");
            return Ok(None);
        };

        Ok(Some(AssetItem {
            key,
            name,
            location_key,
            status: status.decode(raw),
        }))
    }

    fn upsert(&self, conn: &Connection, item: &AssetItem) -> EngineResult<UpsertOutcome> {
        let location = conn
            .locations()
            .find_by_external_key(item.location_key)?
            .ok_or(EngineError::MissingParent {
                parent: EntityKind::Location,
                key: item.location_key,
            })?;
        let table = conn.assets();

        if let Some(mut row) = table.find_by_external_key(item.key)? {
            row.name.clone_from(&item.name);
            row.location_id = location.id;
            item.status.apply(&mut row.status);
            table.update(&row)?;
            return Ok(UpsertOutcome::Updated);
        }

        // Only unlinked rows are claimed by name; a linked row with the
        // same name belongs to another remote asset.
        let unlinked = table
            .find_by_name(location.id, &item.name)?
            .filter(|row| row.external_key.is_none());
        if let Some(mut row) = unlinked {
            debug!(name = %item.name, key = item.key, "Linking asset by name");
            row.external_key = Some(item.key);
            item.status.apply(&mut row.status);
            table.update(&row)?;
            return Ok(UpsertOutcome::Updated);
        }

        table.insert(&NewAsset {
            location_id: location.id,
            name: item.name.clone(),
            external_key: Some(item.key),
            status: item.status.initial(),
        })?;
        Ok(UpsertOutcome::Created)
    }
}
