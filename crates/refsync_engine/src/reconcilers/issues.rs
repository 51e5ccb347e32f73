//! Issues, read in a single call from the issue list.

use super::locations::decode_named;
use super::{StatusContext, StatusUpdate};
use crate::catalog::{CatalogConfig, ELEMENT_METHOD};
use crate::decode::first_key;
use crate::entity::EntityKind;
use crate::error::{EngineError, EngineResult};
use crate::reconcile::{EntityReconciler, RemoteBatch, UpsertOutcome};
use refsync_remote::RemoteClient;
use refsync_store::{Connection, ExternalKey, NewIssue, Tables};
use serde_json::Value;
use tracing::{debug, warn};

/// A decoded issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueItem {
    key: ExternalKey,
    name: String,
    category_key: ExternalKey,
    status: StatusUpdate,
}

/// Reconciles issues against their categories.
#[derive(Debug, Clone)]
pub struct IssueReconciler {
    catalog: CatalogConfig,
}

impl IssueReconciler {
    /// Creates an issue reconciler.
    pub fn new(catalog: CatalogConfig) -> Self {
        Self { catalog }
    }
}

impl EntityReconciler for IssueReconciler {
    type Item = IssueItem;
    type Context = StatusContext;

    fn kind(&self) -> EntityKind {
        EntityKind::Issue
    }

    fn fetch_remote(&self, remote: &RemoteClient) -> EngineResult<RemoteBatch<StatusContext>> {
        let list_id = &self.catalog.issue_list_id;
        let items = remote
            .call_envelope(ELEMENT_METHOD, &self.catalog.list_params(list_id))?
            .items();

        let context = StatusContext::load(
            remote,
            &self.catalog,
            list_id,
            self.catalog.issue_status_property.as_deref(),
        );
        Ok(RemoteBatch { items, context })
    }

    fn decode_item(&self, raw: &Value, status: &StatusContext) -> EngineResult<Option<IssueItem>> {
        let Some((key, name)) = decode_named(raw)? else {
            return Ok(None);
        };
        let property = self.catalog.issue_category_property.as_str();
        let Some(category_key) = first_key(raw.get(property)) else {
            warn!(key, name = %name, property, "Skipping issue without a category");
            return Ok(None);
        };

        Ok(Some(IssueItem {
            key,
            name,
            category_key,
            status: status.decode(raw),
        }))
    }

    fn upsert(&self, conn: &Connection, item: &IssueItem) -> EngineResult<UpsertOutcome> {
        let category = conn
            .categories()
            .find_by_external_key(item.category_key)?
            .ok_or(EngineError::MissingParent {
                parent: EntityKind::IssueCategory,
                key: item.category_key,
            })?;
        let table = conn.issues();

        if let Some(mut row) = table.find_by_external_key(item.key)? {
            row.name.clone_from(&item.name);
            row.category_id = category.id;
            item.status.apply(&mut row.status);
            table.update(&row)?;
            return Ok(UpsertOutcome::Updated);
        }

        let unlinked = table
            .find_by_name(category.id, &item.name)?
            .filter(|row| row.external_key.is_none());
        if let Some(mut row) = unlinked {
            debug!(name = %item.name, key = item.key, "Linking issue by name");
            row.external_key = Some(item.key);
            item.status.apply(&mut row.status);
            table.update(&row)?;
            return Ok(UpsertOutcome::Updated);
        }

        table.insert(&NewIssue {
            category_id: category.id,
            name: item.name.clone(),
            external_key: Some(item.key),
            status: item.status.initial(),
        })?;
        Ok(UpsertOutcome::Created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FIELD_METHOD;
    use crate::reconcile::{Reconcile, Reconciler};
    use refsync_testkit::{element, field_dictionary, with_property, TestRemote, TestStore};
    use serde_json::json;

    #[test]
    fn issues_link_to_categories_and_move_between_them() {
        let store = TestStore::new();
        let safety = store.add_category("Safety", Some(3));
        let hygiene = store.add_category("Hygiene", Some(4));
        let remote = TestRemote::new();
        remote
            .mock
            .respond_result(FIELD_METHOD, field_dictionary("PROPERTY_1115", 123, &[("1", "Open")]));
        let reconciler = Reconciler::new(
            IssueReconciler::new(CatalogConfig::new()),
            remote.client.clone(),
            store.store.clone(),
        );

        let issue = |category: &str| {
            let item = with_property(element(7, "No helmet"), "PROPERTY_1091", json!([category]));
            with_property(item, "PROPERTY_1115", json!("1"))
        };

        remote.mock.respond_result(ELEMENT_METHOD, json!([issue("3")]));
        let first = reconciler.reconcile();
        remote.mock.respond_result(ELEMENT_METHOD, json!([issue("4")]));
        let second = reconciler.reconcile();

        assert_eq!((first.created, second.updated), (1, 1));
        let row = store.read(|c| c.issues().find_by_external_key(7)).unwrap();
        assert_ne!(row.category_id, safety);
        assert_eq!(row.category_id, hygiene);
        assert_eq!(row.status.as_deref(), Some("Open"));
        assert_eq!(remote.mock.call_count(ELEMENT_METHOD), 2);
    }

    #[test]
    fn unknown_category_is_an_item_error() {
        let store = TestStore::new();
        let remote = TestRemote::new();
        let item = with_property(element(7, "No helmet"), "PROPERTY_1091", json!("3"));
        remote.mock.respond_result(ELEMENT_METHOD, json!({"items": [item]}));
        remote.mock.respond_result(FIELD_METHOD, json!({}));

        let report = Reconciler::new(
            IssueReconciler::new(CatalogConfig::new()),
            remote.client.clone(),
            store.store.clone(),
        )
        .reconcile();

        assert!(report.success);
        assert_eq!(report.created, 0);
        assert_eq!(
            report.errors,
            vec!["issue No helmet (ID: 7): category with external key 3 not found".to_string()]
        );
    }
}
