//! Load, edit, save and reload cycles against the in-memory store.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use rust_decimal_macros::dec;

use reception_core::{LotKey, ProductId, SupplierId};
use reception_engine::{
    BoxEdit, EditSession, EngineConfig, PalletBox, ReceptionError, ReceptionMode, SavePayload,
    SessionState,
};
use reception_integration_tests::{MemoryStore, fixture_date, two_pallet_reception};

#[tokio::test]
async fn test_new_boxes_receive_ids_once() {
    let store = MemoryStore::new();
    let id = store.insert(two_pallet_reception(false)).await;
    let mut session = EditSession::load(&store.load(id).await.unwrap(), EngineConfig::default());

    let pallet = session.add_pallet().unwrap();
    let new_box = PalletBox::new(ProductId::new(8), "", dec!(3), dec!(2.5));
    session.add_box(pallet, new_box).unwrap();

    let SavePayload::Pallets(body) = session.begin_save().unwrap() else {
        panic!("expected pallets payload");
    };
    assert_eq!(body.pallets[2].id, None);
    assert_eq!(body.pallets[2].boxes[0].id, None);

    let saved = store.save(Some(id), &SavePayload::Pallets(body)).await;
    session.complete_save(saved).unwrap();

    let pallets = session.reception().pallets().unwrap();
    assert_eq!(pallets.len(), 3);
    let new_id = pallets[2].boxes[0].id.unwrap();
    assert!(session.snapshot().box_ids.contains(&new_id));

    // A second save sends the assigned ID back instead of creating the box again.
    session.set_notes("second pass").unwrap();
    let SavePayload::Pallets(body) = session.begin_save().unwrap() else {
        panic!("expected pallets payload");
    };
    assert_eq!(body.pallets[2].boxes[0].id, Some(new_id));
    let saved = store.save(Some(id), &SavePayload::Pallets(body)).await;
    session.complete_save(saved).unwrap();
    assert_eq!(session.reception().pallets().unwrap()[2].boxes.len(), 1);
}

#[tokio::test]
async fn test_edits_made_while_saving_are_kept_and_saved_next() {
    let store = MemoryStore::new();
    let id = store.insert(two_pallet_reception(false)).await;
    let mut session = EditSession::load(&store.load(id).await.unwrap(), EngineConfig::default());

    let pallet = session.add_pallet().unwrap();
    let new_box = PalletBox::new(ProductId::new(8), "", dec!(3), dec!(2.5));
    session.add_box(pallet, new_box).unwrap();
    session.set_notes("checked").unwrap();
    let payload = session.begin_save().unwrap();

    // The user keeps typing before persistence answers.
    session.set_notes("typed while saving").unwrap();
    let edit = BoxEdit {
        net_weight: Some(Some(dec!(2.75))),
        ..BoxEdit::default()
    };
    session.update_box(pallet, 0, edit).unwrap();

    let saved = store.save(Some(id), &payload).await;
    session.complete_save(saved).unwrap();

    assert_eq!(session.state(), SessionState::Editing);
    assert_eq!(session.reception().header.notes, "typed while saving");
    assert!(session.has_unsaved_changes());
    let stored = store.load(id).await.unwrap();
    let assigned = stored.pallets[2].boxes[0].id;
    let pallets = session.reception().pallets().unwrap();
    assert_eq!(pallets[2].boxes[0].id, assigned);
    assert_eq!(pallets[2].id, stored.pallets[2].id);

    // The next save updates the same pallet and box instead of creating them again.
    let payload = session.begin_save().unwrap();
    session
        .complete_save(store.save(Some(id), &payload).await)
        .unwrap();
    assert!(!session.has_unsaved_changes());

    let stored = store.load(id).await.unwrap();
    assert_eq!(stored.notes.as_deref(), Some("typed while saving"));
    assert_eq!(stored.pallets.len(), 3);
    assert_eq!(stored.pallets[2].boxes.len(), 1);
    assert_eq!(stored.pallets[2].boxes[0].id, assigned);
    assert_eq!(stored.pallets[2].boxes[0].net_weight, Some(dec!(2.75)));
}

#[tokio::test]
async fn test_failed_save_keeps_edits_and_can_retry() {
    let store = MemoryStore::new();
    let id = store.insert(two_pallet_reception(false)).await;
    let mut session = EditSession::load(&store.load(id).await.unwrap(), EngineConfig::default());

    session
        .update_box(
            1,
            1,
            BoxEdit {
                barcode: Some(Some("8412345678905".to_owned())),
                ..BoxEdit::default()
            },
        )
        .unwrap();

    store.fail_next_save("connection reset").await;
    let payload = session.begin_save().unwrap();
    let err = session
        .complete_save(store.save(Some(id), &payload).await)
        .unwrap_err();
    let ReceptionError::Persistence(message) = &err else {
        panic!("expected persistence error, got {err}");
    };
    assert_eq!(message, "connection reset");
    assert_eq!(session.state(), SessionState::Editing);
    assert!(session.has_unsaved_changes());

    let payload = session.begin_save().unwrap();
    session
        .complete_save(store.save(Some(id), &payload).await)
        .unwrap();
    assert!(!session.has_unsaved_changes());
    let stored = store.load(id).await.unwrap();
    assert_eq!(
        stored.pallets[1].boxes[1].barcode.as_deref(),
        Some("8412345678905")
    );
}

#[tokio::test]
async fn test_reloaded_reception_has_no_changes() {
    let store = MemoryStore::new();
    let id = store.insert(two_pallet_reception(false)).await;
    let mut session = EditSession::load(&store.load(id).await.unwrap(), EngineConfig::default());

    let payload = session.begin_save().unwrap();
    session
        .complete_save(store.save(Some(id), &payload).await)
        .unwrap();

    let reloaded = EditSession::load(&store.load(id).await.unwrap(), EngineConfig::default());
    assert_eq!(
        reception_engine::canonicalize(session.reception()),
        reception_engine::canonicalize(reloaded.reception())
    );
    assert!(!reloaded.has_unsaved_changes());
}

#[tokio::test]
async fn test_create_new_pallets_reception() {
    let store = MemoryStore::new();
    let mut session = EditSession::create(ReceptionMode::Pallets, EngineConfig::default());

    assert!(matches!(
        session.begin_save(),
        Err(ReceptionError::Validation(_))
    ));
    assert_eq!(session.state(), SessionState::Editing);

    session.set_supplier(Some(SupplierId::new(3))).unwrap();
    session.set_date(fixture_date()).unwrap();
    let pallet = session.add_pallet().unwrap();
    for _ in 0..2 {
        let full = PalletBox::new(ProductId::new(7), "L-24", dec!(21), dec!(20));
        session.add_box(pallet, full).unwrap();
    }
    session
        .set_price(&LotKey::new(ProductId::new(7), "L-24"), Some(dec!(2.4)))
        .unwrap();

    let payload = session.begin_save().unwrap();
    let saved = store.save(None, &payload).await.unwrap();
    assert!(saved.id.is_some());
    session.complete_save(Ok(saved)).unwrap();

    let summary = session.summary();
    assert_eq!(summary.box_count, 2);
    assert_eq!(summary.total_net_weight, dec!(40));
    assert_eq!(summary.total_amount, dec!(96));
    assert!(session.reception().id.is_some());
    assert!(!session.has_unsaved_changes());
}

#[tokio::test]
async fn test_discard_then_reload_is_clean() {
    let store = MemoryStore::new();
    let id = store.insert(two_pallet_reception(false)).await;
    let mut session = EditSession::load(&store.load(id).await.unwrap(), EngineConfig::default());

    session.remove_pallet(1).unwrap();
    assert!(session.has_unsaved_changes());
    session.discard().unwrap();
    assert!(!session.has_unsaved_changes());
    assert_eq!(session.reception().pallets().unwrap().len(), 2);
    assert!(matches!(
        session.begin_save(),
        Err(ReceptionError::SessionClosed)
    ));
}
