//! Key-value adapter failure modes and persistence.

mod common;

use std::sync::Arc;

use jotter_core::{
    NoteOrderBy, Pagination, SortOrder, StorageErrorKind, Tag, TagOrderBy,
};
use jotter_db::keyvalue::{NOTES_KEY, RELATIONS_KEY, TAGS_KEY};
use jotter_db::{FileStore, KeyValueStore, MemoryStore};

use common::{at, key_value_over, note, tag, tag_name};

#[tokio::test]
async fn test_quota_is_reported_distinctly() {
    let store = Arc::new(MemoryStore::with_quota(64));
    let h = key_value_over(store.clone());

    let err = h
        .repos
        .tags
        .save(&Tag::new(tag_name("a-rather-long-tag-name"), at(1)))
        .await
        .unwrap_err();

    assert!(err.is_quota_exceeded(), "{err}");
    assert_eq!(store.get_item(TAGS_KEY).await.unwrap(), None);
}

#[tokio::test]
async fn test_unreadable_collection_is_corrupted_not_empty() {
    let store = Arc::new(MemoryStore::new());
    store.set_item(NOTES_KEY, "{not json".to_string()).await.unwrap();
    let h = key_value_over(store);

    let err = h
        .repos
        .notes
        .find_all(Pagination::first(10), SortOrder::Desc, NoteOrderBy::UpdatedAt)
        .await
        .unwrap_err();

    assert_eq!(err.storage_kind(), Some(StorageErrorKind::Corrupted));
}

#[tokio::test]
async fn test_missing_keys_read_as_empty_collections() {
    let h = key_value_over(Arc::new(MemoryStore::new()));

    let notes = h
        .repos
        .notes
        .find_all(Pagination::first(10), SortOrder::Desc, NoteOrderBy::UpdatedAt)
        .await
        .unwrap();
    let tags = h
        .repos
        .tags
        .find_all(Pagination::first(10), SortOrder::Asc, TagOrderBy::Name)
        .await
        .unwrap();

    assert_eq!(notes.count, 0);
    assert_eq!(tags.count, 0);
}

#[tokio::test]
async fn test_relations_are_stored_apart_from_notes() {
    let store = Arc::new(MemoryStore::new());
    let h = key_value_over(store.clone());

    let a = tag(&h.repos, "a").await;
    note(&h.repos, "#a", &[&a], 1, 1).await;

    let raw = store.get_item(RELATIONS_KEY).await.unwrap().unwrap();
    let relations: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(relations.as_array().map(Vec::len), Some(1));
    assert_eq!(relations[0]["tagId"], a.id.to_string());
}

#[tokio::test]
async fn test_file_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();

    let saved = {
        let store = Arc::new(FileStore::open(dir.path(), None).await.unwrap());
        let h = key_value_over(store);
        let a = tag(&h.repos, "kept").await;
        note(&h.repos, "#kept", &[&a], 1, 2).await
    };

    let store = Arc::new(FileStore::open(dir.path(), None).await.unwrap());
    let h = key_value_over(store);

    let found = h.repos.notes.find_by_id(saved.id()).await.unwrap();
    assert_eq!(found, Some(saved));
    assert!(h
        .repos
        .tags
        .find_by_name(&tag_name("kept"))
        .await
        .unwrap()
        .is_some());
}
