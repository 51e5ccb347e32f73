//! Integration tests for the local store.

use chrono::{TimeZone, Utc};
use refsync_store::{
    NewAsset, NewIssue, NewIssueCategory, NewLocation, NewOperator, NewSubmission, Store,
    StoreConfig, StoreError, Tables,
};
use tempfile::TempDir;

fn open() -> (TempDir, Store) {
    let dir = TempDir::new().unwrap();
    let store = Store::open(StoreConfig::new(dir.path().join("nested/store.db"))).unwrap();
    (dir, store)
}

#[test]
fn open_creates_parent_directories() {
    let (dir, _store) = open();
    assert!(dir.path().join("nested/store.db").exists());
}

#[test]
fn external_key_is_unique_per_table() {
    let (_dir, store) = open();
    let result: Result<(), StoreError> = store.transaction(|tx| {
        tx.categories().insert(&NewIssueCategory {
            name: "Safety".into(),
            external_key: Some(3),
        })?;
        tx.categories().insert(&NewIssueCategory {
            name: "Hygiene".into(),
            external_key: Some(3),
        })?;
        Ok(())
    });
    assert!(result.unwrap_err().is_constraint_violation());

    // Unlinked rows may coexist.
    store
        .transaction(|tx| {
            tx.categories().insert(&NewIssueCategory {
                name: "Safety".into(),
                external_key: None,
            })?;
            tx.categories().insert(&NewIssueCategory {
                name: "Hygiene".into(),
                external_key: None,
            })?;
            Ok::<_, StoreError>(())
        })
        .unwrap();
}

#[test]
fn child_rows_require_existing_parent() {
    let (_dir, store) = open();
    let result: Result<(), StoreError> = store.transaction(|tx| {
        tx.assets().insert(&NewAsset {
            location_id: 999,
            name: "Pump".into(),
            external_key: Some(12),
            status: None,
        })?;
        Ok(())
    });
    assert!(result.unwrap_err().is_constraint_violation());
}

#[test]
fn name_lookup_prefers_unlinked_rows() {
    let (_dir, store) = open();
    store
        .transaction(|tx| {
            let category_id = tx.categories().insert(&NewIssueCategory {
                name: "Safety".into(),
                external_key: Some(3),
            })?;
            tx.issues().insert(&NewIssue {
                category_id,
                name: "Leak".into(),
                external_key: Some(70),
                status: None,
            })?;
            let unlinked = tx.issues().insert(&NewIssue {
                category_id,
                name: "Leak".into(),
                external_key: None,
                status: None,
            })?;

            let found = tx.issues().find_by_name(category_id, "Leak")?.unwrap();
            assert_eq!(found.id, unlinked);
            Ok::<_, StoreError>(())
        })
        .unwrap();
}

#[test]
fn operator_profile_update_keeps_identity() {
    let (_dir, store) = open();
    let session = store.session().unwrap();
    let operators = session.connection().operators();

    let created = operators
        .insert(&NewOperator {
            first_name: "Ada".into(),
            last_name: "Byron".into(),
            messaging_id: "100200".into(),
        })
        .unwrap();
    operators
        .update_profile(created.id, "Ada", "Lovelace", Some(501))
        .unwrap();

    let stored = operators.find_by_external_key(501).unwrap().unwrap();
    assert_eq!(stored.last_name, "Lovelace");
    assert_eq!(stored.messaging_id, "100200");
    assert_eq!(stored.secret, created.secret);
    assert_eq!(
        operators.find_by_messaging_id("100200").unwrap().unwrap().id,
        created.id
    );
}

#[test]
fn update_of_missing_row_is_not_found() {
    let (_dir, store) = open();
    let session = store.session().unwrap();
    let err = session
        .connection()
        .locations()
        .update(&refsync_store::Location {
            id: 42,
            name: "Ghost".into(),
            external_key: None,
        })
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound { table: "locations", id: 42 }));
}

#[test]
fn submissions_round_trip_in_id_order() {
    let (_dir, store) = open();
    let created_at = Utc.with_ymd_and_hms(2023, 11, 14, 22, 13, 20).unwrap();
    let session = store.session().unwrap();
    let submissions = session.connection().submissions();

    let first = submissions
        .insert(&NewSubmission {
            location_key: 5,
            asset_key: 12,
            category_key: 3,
            issue_key: 7,
            comment: Some("Oil on floor".into()),
            file_names: Some(r#"["photo.jpg"]"#.into()),
            submitter: Some("100200".into()),
            created_at,
        })
        .unwrap();
    let second = submissions
        .insert(&NewSubmission {
            location_key: 5,
            asset_key: 13,
            category_key: 3,
            issue_key: 8,
            comment: None,
            file_names: None,
            submitter: None,
            created_at,
        })
        .unwrap();

    let pending = submissions.pending().unwrap();
    assert_eq!(pending.iter().map(|s| s.id).collect::<Vec<_>>(), vec![first, second]);
    assert_eq!(pending[0].created_at, created_at);
    assert_eq!(pending[0].file_names.as_deref(), Some(r#"["photo.jpg"]"#));

    assert!(submissions.delete(first).unwrap());
    assert!(!submissions.delete(first).unwrap());
    assert_eq!(submissions.count().unwrap(), 1);
}

#[test]
fn location_rename_keeps_external_key() {
    let (_dir, store) = open();
    let session = store.session().unwrap();
    let locations = session.connection().locations();
    let id = locations
        .insert(&NewLocation {
            name: "North".into(),
            external_key: Some(5),
        })
        .unwrap();

    let mut location = locations.find_by_external_key(5).unwrap().unwrap();
    assert_eq!(location.id, id);
    location.name = "North depot".into();
    locations.update(&location).unwrap();

    assert!(locations.find_by_name("North").unwrap().is_none());
    assert_eq!(
        locations.find_by_name("North depot").unwrap().unwrap().external_key,
        Some(5)
    );
}
