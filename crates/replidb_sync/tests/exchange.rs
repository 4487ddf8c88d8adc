//! Full two-replica exchanges driven through the sync target surface.

use replidb_core::{Document, ObjectStoreDatabase};
use replidb_store::MemoryStore;
use replidb_sync::{ObjectStoreSyncTarget, SyncTarget};
use serde_json::json;

fn replica(uid: &str) -> ObjectStoreSyncTarget<MemoryStore> {
    let db = ObjectStoreDatabase::open(MemoryStore::new(), Some(uid)).unwrap();
    ObjectStoreSyncTarget::new(db)
}

/// Pushes everything the target has not seen from the source, then records
/// the new positions on both sides.
fn sync_one_way(
    source: &mut ObjectStoreSyncTarget<MemoryStore>,
    target: &mut ObjectStoreSyncTarget<MemoryStore>,
) {
    let source_uid = source.db().replica_uid().to_string();
    let target_uid = target.db().replica_uid().to_string();

    let info = target.sync_info(&source_uid).unwrap();
    let (source_gen, source_trans_id, changes) = source
        .changes_for(&target_uid, info.source_generation)
        .unwrap();

    let docs: Vec<(Document, u64, String)> = changes
        .into_iter()
        .map(|change| {
            let doc = source.db().get_doc(&change.doc_id, true).unwrap();
            (doc, change.generation, change.transaction_id)
        })
        .collect();

    let last_known = source.db().replica_gen_and_trans_id(&target_uid).0;
    let (new_gen, new_trans_id) = target.receive_docs(&source_uid, docs, last_known).unwrap();

    source
        .record_sync_info(&target_uid, new_gen, &new_trans_id)
        .unwrap();
    target
        .record_sync_info(&source_uid, source_gen, &source_trans_id)
        .unwrap();
}

#[test]
fn one_way_sync_transfers_documents() {
    let mut laptop = replica("laptop");
    let mut phone = replica("phone");

    let mut doc = Document::new("note-1", json!({"title": "groceries"}));
    laptop.db_mut().put_doc(&mut doc).unwrap();

    sync_one_way(&mut laptop, &mut phone);

    let received = phone.db().get_doc("note-1", false).unwrap();
    assert_eq!(received.rev(), doc.rev());
    assert_eq!(received.body(), doc.body());

    // Both sides know each other's position.
    assert_eq!(phone.db().replica_gen_and_trans_id("laptop").0, 1);
    assert_eq!(laptop.db().replica_gen_and_trans_id("phone").0, 1);
}

#[test]
fn repeated_sync_converges_without_new_changes() {
    let mut laptop = replica("laptop");
    let mut phone = replica("phone");

    let mut doc = Document::new("note-1", json!({"v": 1}));
    laptop.db_mut().put_doc(&mut doc).unwrap();

    sync_one_way(&mut laptop, &mut phone);
    let gen_after_first = phone.db().generation();

    // Nothing new: a second exchange applies nothing.
    sync_one_way(&mut laptop, &mut phone);
    assert_eq!(phone.db().generation(), gen_after_first);
}

#[test]
fn round_trip_edits_converge() {
    let mut laptop = replica("laptop");
    let mut phone = replica("phone");

    let mut doc = Document::new("note-1", json!({"v": 1}));
    laptop.db_mut().put_doc(&mut doc).unwrap();
    sync_one_way(&mut laptop, &mut phone);

    // Phone edits on top of the synced version.
    let mut on_phone = phone.db().get_doc("note-1", false).unwrap();
    on_phone.set_body(json!({"v": 2}));
    phone.db_mut().put_doc(&mut on_phone).unwrap();
    sync_one_way(&mut phone, &mut laptop);

    let on_laptop = laptop.db().get_doc("note-1", false).unwrap();
    assert_eq!(on_laptop.rev(), on_phone.rev());
    assert_eq!(on_laptop.body(), Some(&json!({"v": 2})));
    assert!(!on_laptop.has_conflicts());
}

#[test]
fn concurrent_edits_surface_as_conflict_and_resolve() {
    let mut laptop = replica("laptop");
    let mut phone = replica("phone");

    let mut doc = Document::new("note-1", json!({"v": 0}));
    laptop.db_mut().put_doc(&mut doc).unwrap();
    sync_one_way(&mut laptop, &mut phone);

    // Divergent edits on both replicas.
    let mut on_laptop = laptop.db().get_doc("note-1", false).unwrap();
    on_laptop.set_body(json!({"edited": "laptop"}));
    laptop.db_mut().put_doc(&mut on_laptop).unwrap();

    let mut on_phone = phone.db().get_doc("note-1", false).unwrap();
    on_phone.set_body(json!({"edited": "phone"}));
    phone.db_mut().put_doc(&mut on_phone).unwrap();

    sync_one_way(&mut laptop, &mut phone);

    // The phone saved the conflict rather than dropping a version.
    let conflicted = phone.db().get_doc("note-1", false).unwrap();
    assert!(conflicted.has_conflicts());
    let versions = phone.db().get_doc_conflicts("note-1");
    assert_eq!(versions.len(), 2);

    // Resolve on the phone, then push the resolution back.
    let revs: Vec<_> = versions.iter().map(|d| d.rev().clone()).collect();
    let mut resolved = Document::new("note-1", json!({"edited": "merged"}));
    phone.db_mut().resolve_doc(&mut resolved, &revs).unwrap();
    sync_one_way(&mut phone, &mut laptop);

    for t in [&laptop, &phone] {
        let doc = t.db().get_doc("note-1", false).unwrap();
        assert_eq!(doc.body(), Some(&json!({"edited": "merged"})));
        assert!(!doc.has_conflicts());
    }
}

#[test]
fn deletion_propagates_as_tombstone() {
    let mut laptop = replica("laptop");
    let mut phone = replica("phone");

    let mut doc = Document::new("note-1", json!({"v": 1}));
    laptop.db_mut().put_doc(&mut doc).unwrap();
    sync_one_way(&mut laptop, &mut phone);

    laptop.db_mut().delete_doc(&mut doc).unwrap();
    sync_one_way(&mut laptop, &mut phone);

    assert!(phone.db().get_doc("note-1", false).is_none());
    let tombstone = phone.db().get_doc("note-1", true).unwrap();
    assert!(tombstone.is_tombstone());
    assert_eq!(tombstone.rev(), doc.rev());
}
