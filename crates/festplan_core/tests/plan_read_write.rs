use festplan_core::db::open_db_in_memory;
use festplan_core::{
    Collection, PartitionStore, PlanDocument, PlanService, ReadOutcome, SqlitePartitionStore,
    VersionGuard, WriteBatch, VERSION_UNSET,
};
use serde_json::json;

fn service() -> PlanService<SqlitePartitionStore> {
    let conn = open_db_in_memory().unwrap();
    PlanService::new(SqlitePartitionStore::new(conn))
}

fn sample_document() -> PlanDocument {
    let mut document = PlanDocument::empty();
    document.slots.insert(
        "2025-12-24_Abendessen".to_string(),
        json!({"proposals": [{"name": "Raclette", "votes": ["Eltern"]}]}),
    );
    document.slots.insert(
        "2025-12-25_Mittagessen".to_string(),
        json!({"proposals": [{"name": "Gans"}]}),
    );
    document.groceries = vec![json!("Milch"), json!({"text": "Käse", "isPlaceholder": false})];
    document.activity = vec![json!({"user": "Hamburg", "action": "add"})];
    document.settings = json!({"organizerPin": "1234"});
    document
}

#[test]
fn empty_state_baseline() {
    let service = service();

    match service.read(None) {
        ReadOutcome::Document { document, version } => {
            assert_eq!(document, PlanDocument::empty());
            assert_eq!(version, VERSION_UNSET);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[test]
fn empty_state_short_circuits_on_sentinel_version() {
    let service = service();

    match service.read(Some(VERSION_UNSET)) {
        ReadOutcome::NotModified { version } => assert_eq!(version, VERSION_UNSET),
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[test]
fn write_then_read_roundtrip() {
    let service = service();
    let document = sample_document();

    let version = service.write(&document, None).unwrap();
    assert_ne!(version, VERSION_UNSET);

    match service.read(None) {
        ReadOutcome::Document {
            document: loaded,
            version: read_version,
        } => {
            assert_eq!(loaded, document);
            assert_eq!(read_version, version);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    match service.read(Some(&version)) {
        ReadOutcome::NotModified {
            version: read_version,
        } => assert_eq!(read_version, version),
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[test]
fn successive_writes_mint_distinct_versions() {
    let service = service();
    let document = sample_document();

    let first = service.write(&document, None).unwrap();
    let second = service.write(&document, None).unwrap();

    assert_ne!(first, second);
    assert_ne!(first, VERSION_UNSET);
    assert_ne!(second, VERSION_UNSET);
}

#[test]
fn guarded_write_accepts_sentinel_on_fresh_store() {
    let service = service();

    let version = service
        .write(&sample_document(), Some(VERSION_UNSET))
        .unwrap();
    assert_ne!(version, VERSION_UNSET);
}

#[test]
fn stale_guarded_write_conflicts_and_mutates_nothing() {
    let service = service();

    let base = service.write(&sample_document(), None).unwrap();

    // Writer B lands first.
    let mut winning = sample_document();
    winning.groceries.push(json!("Lebkuchen"));
    let current = service.write(&winning, Some(&base)).unwrap();

    // Writer A still holds the old version.
    let mut losing = sample_document();
    losing.groceries.push(json!("Glühwein"));
    let err = service.write(&losing, Some(&base)).unwrap_err();
    assert!(err.is_conflict());

    match service.read(None) {
        ReadOutcome::Document { document, version } => {
            assert_eq!(document, winning);
            assert_eq!(version, current);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[test]
fn unguarded_writes_last_one_wins() {
    let service = service();

    service.write(&sample_document(), None).unwrap();

    let mut replacement = PlanDocument::empty();
    replacement.groceries = vec![json!("Tannenbaum")];
    let version = service.write(&replacement, None).unwrap();

    match service.read(None) {
        ReadOutcome::Document {
            document,
            version: read_version,
        } => {
            assert_eq!(document, replacement);
            assert_eq!(read_version, version);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[test]
fn omitted_slot_keys_are_removed_from_storage() {
    let service = service();

    let document = sample_document();
    let version = service.write(&document, None).unwrap();

    let mut trimmed = document.clone();
    trimmed.slots.remove("2025-12-24_Abendessen");
    service.write(&trimmed, Some(&version)).unwrap();

    let stored: Vec<String> = service
        .store()
        .fetch_collection(Collection::Slots)
        .unwrap()
        .into_iter()
        .map(|(key, _)| key)
        .collect();
    assert_eq!(stored, vec!["2025-12-25_Mittagessen".to_string()]);

    match service.read(None) {
        ReadOutcome::Document { document, .. } => {
            assert!(!document.slots.contains_key("2025-12-24_Abendessen"));
            assert!(document.slots.contains_key("2025-12-25_Mittagessen"));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[test]
fn conflicting_batch_commit_applies_no_ops() {
    let conn = open_db_in_memory().unwrap();
    let store = SqlitePartitionStore::new(conn);

    let batch = WriteBatch::new(VersionGuard::Equals("does-not-exist".to_string()))
        .upsert(Collection::Lists, "groceries", json!({"items": ["Milch"]}));
    let err = store.commit(batch).unwrap_err();
    assert!(err.is_conflict());

    assert!(store
        .fetch_unit(Collection::Lists, "groceries")
        .unwrap()
        .is_none());
}

#[test]
fn batch_mixing_deletes_and_upserts_applies_as_one() {
    let conn = open_db_in_memory().unwrap();
    let store = SqlitePartitionStore::new(conn);

    let seed = WriteBatch::new(VersionGuard::Unset)
        .upsert(Collection::Slots, "2025-12-24_Abendessen", json!({"proposals": []}))
        .upsert(Collection::Config, "metadata", json!({"version": "one"}));
    store.commit(seed).unwrap();

    let swap = WriteBatch::new(VersionGuard::Equals("one".to_string()))
        .delete(Collection::Slots, "2025-12-24_Abendessen")
        .upsert(Collection::Slots, "2025-12-25_Mittagessen", json!({"proposals": []}))
        .upsert(Collection::Config, "metadata", json!({"version": "two"}));
    store.commit(swap).unwrap();

    assert!(store
        .fetch_unit(Collection::Slots, "2025-12-24_Abendessen")
        .unwrap()
        .is_none());
    assert!(store
        .fetch_unit(Collection::Slots, "2025-12-25_Mittagessen")
        .unwrap()
        .is_some());
}

#[test]
fn unset_guard_commits_only_once() {
    let conn = open_db_in_memory().unwrap();
    let store = SqlitePartitionStore::new(conn);

    let first = WriteBatch::new(VersionGuard::Unset).upsert(
        Collection::Config,
        "metadata",
        json!({"version": "one"}),
    );
    store.commit(first).unwrap();

    let second = WriteBatch::new(VersionGuard::Unset).upsert(
        Collection::Config,
        "metadata",
        json!({"version": "two"}),
    );
    let err = store.commit(second).unwrap_err();
    assert!(err.is_conflict());
}
