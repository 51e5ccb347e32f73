//! Integration tests for the sync orchestrator against a scripted remote.

use refsync_engine::{
    CatalogConfig, EntityKind, OrchestratorConfig, SyncOrchestrator, SyncSummary,
};
use refsync_remote::{HttpResponse, MockHttpClient};
use refsync_store::Tables;
use refsync_testkit::prelude::*;
use serde_json::{json, Value};
use std::collections::HashSet;

/// Routes every remote method the reconcilers use.
fn serve_remote(mock: &MockHttpClient) {
    mock.respond_with("lists.field.get", |body| {
        let result = match body["IBLOCK_ID"].as_str() {
            Some("77") => json!({
                "PROPERTY_637": dictionary_field(77, &[("5", "North"), ("6", "South")]),
                "PROPERTY_645": dictionary_field(77, &[("10", "Working"), ("11", "Broken")]),
            }),
            Some("127") => field_dictionary("PROPERTY_1200", 127, &[("3", "Safety"), ("4", "Hygiene")]),
            Some("123") => field_dictionary("PROPERTY_1115", 123, &[("1", "Open")]),
            _ => json!({}),
        };
        HttpResponse::json(200, &json!({ "result": result }))
    });

    mock.respond_with("lists.element.get", |body| {
        let result = match body["IBLOCK_ID"].as_str() {
            Some("77") => json!([
                with_property(
                    with_property(element(12, "Pump"), "PROPERTY_637", keyed("5")),
                    "PROPERTY_645",
                    keyed("10"),
                ),
                with_property(element(13, "Valve"), "PROPERTY_637", json!(["6"])),
            ]),
            Some("123") => json!([
                with_property(element(7, "No helmet"), "PROPERTY_1091", json!("3")),
                with_property(element(8, "Dirty floor"), "PROPERTY_1091", keyed(4)),
            ]),
            _ => json!([]),
        };
        HttpResponse::json(200, &json!({ "result": result }))
    });

    mock.serve_pages(
        "user.get",
        vec![user(1, "Ivan", "Petrov"), user(2, "Anna", "Sidorova")],
        1,
    );
}

fn orchestrator(store: &TestStore, remote: &TestRemote) -> SyncOrchestrator {
    SyncOrchestrator::new(
        store.store.clone(),
        remote.client.clone(),
        CatalogConfig::new(),
        OrchestratorConfig::new().with_workers(3),
    )
    .unwrap()
}

fn counts(summary: &SyncSummary, kind: EntityKind) -> (u64, u64) {
    let report = &summary.per_entity[&kind];
    (report.created, report.updated)
}

fn external_keys(store: &TestStore) -> Vec<Vec<Option<i64>>> {
    store.read(|c| {
        Ok(vec![
            c.locations().list()?.iter().map(|r| r.external_key).collect(),
            c.assets().list()?.iter().map(|r| r.external_key).collect(),
            c.categories().list()?.iter().map(|r| r.external_key).collect(),
            c.issues().list()?.iter().map(|r| r.external_key).collect(),
            c.operators().list()?.iter().map(|r| r.external_key).collect(),
        ])
    })
}

#[test]
fn full_sync_then_rerun_is_idempotent() {
    let store = TestStore::new();
    store.add_operator("Ivan", "Petrov", "tg-1");
    let remote = TestRemote::new();
    serve_remote(&remote.mock);
    let orchestrator = orchestrator(&store, &remote);

    let first = orchestrator.run_all();
    assert!(first.success, "{first}");
    assert_eq!(counts(&first, EntityKind::Location), (2, 0));
    assert_eq!(counts(&first, EntityKind::Asset), (2, 0));
    assert_eq!(counts(&first, EntityKind::IssueCategory), (2, 0));
    assert_eq!(counts(&first, EntityKind::Issue), (2, 0));
    assert_eq!(counts(&first, EntityKind::Operator), (0, 1));

    let second = orchestrator.run_all();
    assert!(second.success, "{second}");
    assert_eq!(second.totals.created, 0);
    assert_eq!(second.totals.updated, first.totals.created + first.totals.updated);

    let pump = store.read(|c| c.assets().find_by_external_key(12)).unwrap();
    assert_eq!(pump.status.as_deref(), Some("Working"));
    let location = store.read(|c| c.locations().find_by_external_key(5)).unwrap();
    assert_eq!(pump.location_id, location.id);
}

#[test]
fn external_keys_stay_unique() {
    let store = TestStore::new();
    store.add_location("North", None);
    store.add_category("Safety", Some(99));
    let remote = TestRemote::new();
    serve_remote(&remote.mock);
    let orchestrator = orchestrator(&store, &remote);

    for _ in 0..3 {
        orchestrator.run_all();
    }

    for keys in external_keys(&store) {
        let present: Vec<i64> = keys.into_iter().flatten().collect();
        let unique: HashSet<i64> = present.iter().copied().collect();
        assert_eq!(unique.len(), present.len());
    }
    assert_eq!(store.read(|c| c.locations().count()), 2);
}

#[test]
fn failed_location_run_skips_assets() {
    let store = TestStore::new();
    let remote = TestRemote::new();
    serve_remote(&remote.mock);
    let categories_only = |body: &Value| match body["IBLOCK_ID"].as_str() {
        Some("77") => HttpResponse::json(400, &json!({"error": "ERROR_ACCESS_DENIED"})),
        Some("127") => HttpResponse::json(
            200,
            &json!({"result": field_dictionary("PROPERTY_1200", 127, &[("3", "Safety")])}),
        ),
        _ => HttpResponse::json(200, &json!({"result": {}})),
    };
    remote.mock.respond_with("lists.field.get", categories_only);

    let summary = orchestrator(&store, &remote).run_all();

    assert!(!summary.success);
    assert!(!summary.per_entity[&EntityKind::Location].success);
    let assets = &summary.per_entity[&EntityKind::Asset];
    assert!(assets.skipped);
    assert_eq!((assets.created, assets.updated), (0, 0));
    assert!(assets.errors[0].contains("prerequisite location failed"));
    assert_eq!(store.read(|c| c.assets().count()), 0);

    assert!(summary.per_entity[&EntityKind::Issue].success);
    assert_eq!(counts(&summary, EntityKind::Issue), (1, 0));
}

#[test]
fn selected_child_without_parents_records_item_errors() {
    let store = TestStore::new();
    let remote = TestRemote::new();
    serve_remote(&remote.mock);

    let summary = orchestrator(&store, &remote).run_selected(&["assets"]);

    let assets = &summary.per_entity[&EntityKind::Asset];
    assert!(assets.success);
    assert_eq!(assets.created, 0);
    assert_eq!(assets.errors.len(), 2);
    assert_eq!(summary.per_entity.len(), 1);
    assert_eq!(remote.mock.call_count("user.get"), 0);
}

#[test]
fn transient_failures_are_retried() {
    let store = TestStore::new();
    store.add_operator("Anna", "Sidorova", "tg-2");
    let remote = TestRemote::new();
    serve_remote(&remote.mock);
    remote.mock.fail_next("user.get", 2);

    let summary = orchestrator(&store, &remote).run_kinds(&[EntityKind::Operator]);

    assert!(summary.success, "{summary}");
    assert_eq!(counts(&summary, EntityKind::Operator), (0, 1));
}

#[test]
fn exhausted_retries_fail_the_entity() {
    let store = TestStore::new();
    let remote = TestRemote::new();
    serve_remote(&remote.mock);
    remote.mock.fail_next("user.get", 3);

    let summary = orchestrator(&store, &remote).run_kinds(&[EntityKind::Operator]);

    assert!(!summary.success);
    assert_eq!(summary.totals.errors, 1);
    assert_eq!(remote.mock.call_count("user.get"), 3);
}
