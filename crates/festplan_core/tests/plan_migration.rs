use festplan_core::db::open_db_in_memory;
use festplan_core::{
    import_legacy_snapshot, ImportOutcome, PlanDocument, PlanService, ReadOutcome,
    SqlitePartitionStore, LEGACY_SNAPSHOT, VERSION_UNSET,
};
use serde_json::json;

fn seeded_service(legacy_body: serde_json::Value) -> PlanService<SqlitePartitionStore> {
    let conn = open_db_in_memory().unwrap();
    let store = SqlitePartitionStore::new(conn);
    store.seed_legacy_snapshot(LEGACY_SNAPSHOT, &legacy_body).unwrap();
    PlanService::new(store)
}

#[test]
fn first_read_imports_wrapped_legacy_snapshot() {
    let service = seeded_service(json!({
        "slots": {"2025-12-24_Abendessen": {"proposals": [{"name": "Raclette"}]}},
        "groceries": ["Milch"],
        "settings": {"organizerPin": "1234"},
    }));

    let (document, version) = match service.read(None) {
        ReadOutcome::Document { document, version } => (document, version),
        other => panic!("unexpected outcome: {other:?}"),
    };

    assert_ne!(version, VERSION_UNSET);
    assert_eq!(document.slots.len(), 1);
    assert!(document.slots.contains_key("2025-12-24_Abendessen"));
    assert_eq!(document.groceries, vec![json!("Milch")]);
    assert!(document.activity.is_empty());
    assert_eq!(document.settings, json!({"organizerPin": "1234"}));
}

#[test]
fn second_read_does_not_import_again() {
    let service = seeded_service(json!({
        "slots": {"a": {"proposals": []}},
        "groceries": ["Milk"],
    }));

    let first_version = service.read(None).version().to_string();
    let second = service.read(None);

    // A duplicate import would mint a fresh token; an unchanged token means
    // the snapshot was consumed exactly once.
    assert_eq!(second.version(), first_version);

    match second {
        ReadOutcome::Document { document, .. } => {
            assert_eq!(document.groceries, vec![json!("Milk")]);
            assert!(document.activity.is_empty());
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[test]
fn bare_slot_map_snapshot_is_accepted() {
    let service = seeded_service(json!({
        "2025-12-25_Dessert": {"proposals": [{"name": "Stollen"}]},
    }));

    match service.read(None) {
        ReadOutcome::Document { document, version } => {
            assert_ne!(version, VERSION_UNSET);
            assert!(document.slots.contains_key("2025-12-25_Dessert"));
            assert!(document.groceries.is_empty());
            assert_eq!(document.settings, json!({}));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[test]
fn malformed_snapshot_falls_back_to_empty_state() {
    let service = seeded_service(json!("not an object"));

    match service.read(None) {
        ReadOutcome::Document { document, version } => {
            assert_eq!(document, PlanDocument::empty());
            assert_eq!(version, VERSION_UNSET);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[test]
fn existing_metadata_shadows_legacy_snapshot() {
    let conn = open_db_in_memory().unwrap();
    let service = PlanService::new(SqlitePartitionStore::new(conn));

    let mut document = PlanDocument::empty();
    document.groceries = vec![json!("Zimt")];
    let version = service.write(&document, None).unwrap();

    // The monolith surfaces afterwards, e.g. restored from a backup.
    service
        .store()
        .seed_legacy_snapshot(
            LEGACY_SNAPSHOT,
            &json!({"slots": {"legacy": {"proposals": []}}}),
        )
        .unwrap();

    match service.read(None) {
        ReadOutcome::Document {
            document: loaded,
            version: read_version,
        } => {
            assert_eq!(read_version, version);
            assert_eq!(loaded.groceries, vec![json!("Zimt")]);
            assert!(loaded.slots.is_empty(), "legacy slots must not resurface");
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[test]
fn unconditional_first_save_imports_the_monolith_before_replacing_it() {
    let service = seeded_service(json!({
        "slots": {"legacy": {"proposals": []}},
        "groceries": ["Altbestand"],
    }));

    // No read has run yet; the save must not bypass initialization.
    let mut document = PlanDocument::empty();
    document.groceries = vec![json!("Zimt")];
    let version = service.write(&document, None).unwrap();
    assert_ne!(version, VERSION_UNSET);

    match service.read(None) {
        ReadOutcome::Document {
            document: loaded,
            version: read_version,
        } => {
            assert_eq!(read_version, version);
            assert_eq!(loaded.groceries, vec![json!("Zimt")]);
            assert!(loaded.slots.is_empty());
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[test]
fn import_after_initialization_reports_already_initialized() {
    let service = seeded_service(json!({
        "slots": {"legacy": {"proposals": []}},
    }));

    service.write(&PlanDocument::empty(), None).unwrap();

    let outcome = import_legacy_snapshot(service.store()).unwrap();
    assert_eq!(outcome, ImportOutcome::AlreadyInitialized);
}

#[test]
fn absent_snapshot_reports_no_legacy_data() {
    let conn = open_db_in_memory().unwrap();
    let store = SqlitePartitionStore::new(conn);

    let outcome = import_legacy_snapshot(&store).unwrap();
    assert_eq!(outcome, ImportOutcome::NoLegacyData);
}
