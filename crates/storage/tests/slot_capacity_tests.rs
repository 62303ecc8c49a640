// Capacity and allocation properties of the filesystem slot store.

use depotkeep_core::ItemId;
use depotkeep_storage::{FilesystemSlotStore, SLOT_CAPACITY, SlotStore, StorageError};
use std::collections::HashSet;
use tempfile::TempDir;

fn id(n: u64) -> ItemId {
    ItemId::new(n.to_string()).unwrap()
}

async fn file_names(dir: &std::path::Path) -> Vec<String> {
    let mut names = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await.unwrap();
    while let Some(entry) = entries.next_entry().await.unwrap() {
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    names
}

#[tokio::test]
async fn test_capacity_failure_leaves_store_untouched() {
    let temp_dir = TempDir::new().unwrap();
    let store = FilesystemSlotStore::new(temp_dir.path());

    let initial: Vec<ItemId> = (0..127).map(|n| id(1000 + n)).collect();
    store.add(&initial).await.unwrap();
    assert_eq!(store.count().await.unwrap(), 127);
    let before = file_names(temp_dir.path()).await;

    let err = store.add(&[id(5), id(6)]).await.unwrap_err();
    match err {
        StorageError::CapacityExceeded {
            requested,
            existing,
            capacity,
        } => {
            assert_eq!(requested, 2);
            assert_eq!(existing, 127);
            assert_eq!(capacity, SLOT_CAPACITY);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(file_names(temp_dir.path()).await, before);

    // One more still fits.
    store.add(&[id(5)]).await.unwrap();
    assert_eq!(store.count().await.unwrap(), SLOT_CAPACITY);
    assert_eq!(store.remaining().await.unwrap(), 0);
}

#[tokio::test]
async fn test_already_present_ids_do_not_need_capacity() {
    let temp_dir = TempDir::new().unwrap();
    let store = FilesystemSlotStore::new(temp_dir.path()).with_capacity(3);

    store.add(&[id(1), id(2), id(3)]).await.unwrap();
    // Full, but nothing new is requested.
    store.add(&[id(3), id(2)]).await.unwrap();
    assert!(store.add(&[id(3), id(4)]).await.is_err());
}

#[tokio::test]
async fn test_churn_keeps_slots_unique_and_bounded() {
    let temp_dir = TempDir::new().unwrap();
    let store = FilesystemSlotStore::new(temp_dir.path()).with_capacity(16);

    let mut next_id = 1u64;
    for round in 0..40u64 {
        let batch: Vec<ItemId> = (0..(round % 5 + 1)).map(|i| id(next_id + i)).collect();
        next_id += batch.len() as u64;
        let _ = store.add(&batch).await;

        if round % 3 == 0 {
            let listed = store.list().await.unwrap();
            let victims: Vec<ItemId> = listed.iter().step_by(2).map(|e| e.id.clone()).collect();
            store.remove_many(&victims).await.unwrap();
        }

        let listed = store.list().await.unwrap();
        assert!(listed.len() <= 16, "round {round}: {} slots", listed.len());

        let slots: HashSet<u32> = listed.iter().filter_map(|e| e.slot).collect();
        assert_eq!(slots.len(), listed.len(), "round {round}: duplicate slot");
        let contents: HashSet<&ItemId> = listed.iter().map(|e| &e.id).collect();
        assert_eq!(contents.len(), listed.len(), "round {round}: duplicate content");
    }
}

#[tokio::test]
async fn test_freed_slots_are_reused_lowest_first() {
    let temp_dir = TempDir::new().unwrap();
    let store = FilesystemSlotStore::new(temp_dir.path());

    store.add(&[id(10), id(11), id(12), id(13)]).await.unwrap();
    store.remove_many(&[id(10), id(12)]).await.unwrap();

    let outcome = store.add(&[id(20), id(21), id(22)]).await.unwrap();
    let slots: Vec<_> = outcome.added().iter().map(|e| e.slot).collect();
    assert_eq!(slots, vec![Some(0), Some(2), Some(4)]);
    assert_eq!(
        file_names(temp_dir.path()).await,
        vec!["0.txt", "1.txt", "2.txt", "3.txt", "4.txt"]
    );
}
