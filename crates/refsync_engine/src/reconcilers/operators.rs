//! Operators, matched against the remote user directory.
//!
//! Operators are never created here: a local operator needs a messaging
//! identity and a secret, and the user directory carries neither. Remote
//! users are linked to existing operators by external key, then by full
//! name.

use crate::catalog::CatalogConfig;
use crate::decode::{element_id, first_scalar};
use crate::entity::EntityKind;
use crate::error::{EngineError, EngineResult};
use crate::reconcile::{EntityReconciler, RemoteBatch, UpsertOutcome};
use refsync_remote::{RemoteClient, RemoteResult};
use refsync_store::{Connection, ExternalKey, Tables};
use serde_json::{json, Value};
use tracing::{debug, warn};

/// A decoded remote user. An absent name part leaves the stored one as is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorItem {
    key: ExternalKey,
    first_name: Option<String>,
    last_name: Option<String>,
}

/// Reconciles operator profiles.
#[derive(Debug, Clone)]
pub struct OperatorReconciler {
    catalog: CatalogConfig,
}

impl OperatorReconciler {
    /// Creates an operator reconciler.
    pub fn new(catalog: CatalogConfig) -> Self {
        Self { catalog }
    }
}

impl EntityReconciler for OperatorReconciler {
    type Item = OperatorItem;
    type Context = ();

    fn kind(&self) -> EntityKind {
        EntityKind::Operator
    }

    fn fetch_remote(&self, remote: &RemoteClient) -> EngineResult<RemoteBatch<()>> {
        let items = remote
            .paginate(&self.catalog.operator_method, json!({}), self.catalog.page_size)
            .collect::<RemoteResult<Vec<_>>>()?;
        Ok(RemoteBatch::plain(items))
    }

    fn decode_item(&self, raw: &Value, _: &()) -> EngineResult<Option<OperatorItem>> {
        let Some(key) = element_id(raw) else {
            return Err(EngineError::decode(format!(
                "invalid user id {}",
                first_scalar(raw.get("ID")).as_deref().unwrap_or("<missing>")
            )));
        };
        let first_name = first_scalar(raw.get("NAME")).filter(|s| !s.is_empty());
        let last_name = first_scalar(raw.get("LAST_NAME")).filter(|s| !s.is_empty());
        if first_name.is_none() && last_name.is_none() {
            warn!(key, "Skipping user without a name");
            return Ok(None);
        }

        Ok(Some(OperatorItem {
            key,
            first_name,
            last_name,
        }))
    }

    fn upsert(&self, conn: &Connection, item: &OperatorItem) -> EngineResult<UpsertOutcome> {
        let table = conn.operators();

        if let Some(row) = table.find_by_external_key(item.key)? {
            let first_name = item.first_name.as_deref().unwrap_or(&row.first_name);
            let last_name = item.last_name.as_deref().unwrap_or(&row.last_name);
            table.update_profile(row.id, first_name, last_name, Some(item.key))?;
            return Ok(UpsertOutcome::Updated);
        }

        let first_name = item.first_name.as_deref().unwrap_or_default();
        let last_name = item.last_name.as_deref().unwrap_or_default();
        let unlinked = table
            .find_by_full_name(first_name, last_name)?
            .filter(|row| row.external_key.is_none());
        if let Some(row) = unlinked {
            debug!(operator = row.id, key = item.key, "Linking operator by name");
            table.update_profile(row.id, first_name, last_name, Some(item.key))?;
            return Ok(UpsertOutcome::Updated);
        }

        warn!(
            key = item.key,
            first_name,
            last_name,
            "No local operator for remote user"
        );
        Ok(UpsertOutcome::Unmatched)
    }
}
