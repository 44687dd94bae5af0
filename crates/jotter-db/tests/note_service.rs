//! Note use-cases end to end, on every backend.

mod common;

use jotter_core::{Document, NoteId, NoteSearch, Pagination, RevisionId, StoreError};

use common::tag_name;

fn tag_names(tags: &[jotter_core::Tag]) -> Vec<(String, u32)> {
    tags.iter()
        .map(|t| (t.name.as_str().to_string(), t.usage_count))
        .collect()
}

#[tokio::test]
async fn test_missing_notes_are_not_found() {
    for h in common::all().await {
        let service = h.service();
        let id = NoteId::new();

        let err = service.get_note(id).await.unwrap_err();
        assert!(
            matches!(err, StoreError::NotFound { entity: "Note", .. }),
            "{}: {err}",
            h.name
        );

        let err = service
            .update_content(id, Document::from_plain_text("x"))
            .await
            .unwrap_err();
        assert!(err.is_not_found(), "{}", h.name);

        let err = service.restore_revision(RevisionId::new()).await.unwrap_err();
        assert!(
            matches!(err, StoreError::NotFound { entity: "Revision", .. }),
            "{}: {err}",
            h.name
        );
    }
}

#[tokio::test]
async fn test_update_content_syncs_tags() {
    for h in common::all().await {
        let service = h.service();
        let note = service.create_note().await.unwrap();

        let updated = service
            .update_content(note.id(), Document::from_plain_text("Pie #recipe #dessert"))
            .await
            .unwrap();
        assert_eq!(updated.text(), "Pie #recipe #dessert");
        assert_eq!(updated.tag_ids().len(), 2, "{}", h.name);

        let second = service.create_note().await.unwrap();
        service
            .update_content(second.id(), Document::from_plain_text("Soup #recipe"))
            .await
            .unwrap();

        let usage = h.repos.tag_queries.find_with_usage().await.unwrap();
        assert_eq!(
            tag_names(&usage),
            vec![("recipe".to_string(), 2), ("dessert".to_string(), 1)],
            "{}",
            h.name
        );

        service
            .update_content(note.id(), Document::from_plain_text("Pie, no tags"))
            .await
            .unwrap();
        let reloaded = service.get_note(note.id()).await.unwrap();
        assert!(reloaded.tag_ids().is_empty(), "{}", h.name);

        let recipe = h
            .repos
            .tags
            .find_by_name(&tag_name("recipe"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(recipe.usage_count, 1, "{}", h.name);
    }
}

#[tokio::test]
async fn test_cleanup_removes_only_unused_tags() {
    for h in common::all().await {
        let service = h.service();
        let note = service.create_note().await.unwrap();
        service
            .update_content(note.id(), Document::from_plain_text("#keep #drop"))
            .await
            .unwrap();
        service
            .update_content(note.id(), Document::from_plain_text("#keep"))
            .await
            .unwrap();

        assert_eq!(service.cleanup_unused_tags().await.unwrap(), 1, "{}", h.name);
        assert_eq!(service.cleanup_unused_tags().await.unwrap(), 0, "{}", h.name);

        let left = h.repos.tag_queries.find_with_usage().await.unwrap();
        assert_eq!(tag_names(&left), vec![("keep".to_string(), 1)], "{}", h.name);
    }
}

#[tokio::test]
async fn test_restore_revision_brings_back_content_and_tags() {
    for h in common::all().await {
        let service = h.service();
        let note = service.create_note().await.unwrap();
        service
            .update_content(note.id(), Document::from_plain_text("First #old"))
            .await
            .unwrap();
        let revision = service.save_revision(note.id()).await.unwrap();

        service
            .update_content(note.id(), Document::from_plain_text("Second #new"))
            .await
            .unwrap();

        let restored = service.restore_revision(revision.id).await.unwrap();
        assert_eq!(restored.text(), "First #old", "{}", h.name);

        let old = h
            .repos
            .tags
            .find_by_name(&tag_name("old"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            restored.tag_ids().iter().copied().collect::<Vec<_>>(),
            vec![old.id],
            "{}",
            h.name
        );
    }
}

#[tokio::test]
async fn test_delete_note_removes_its_revisions() {
    for h in common::all().await {
        let service = h.service();
        let note = service.create_note().await.unwrap();
        service.save_revision(note.id()).await.unwrap();

        service.delete_note(note.id()).await.unwrap();

        assert!(service.revisions(note.id()).await.unwrap().is_empty(), "{}", h.name);
        assert!(service.get_note(note.id()).await.unwrap_err().is_not_found());
    }
}

#[tokio::test]
async fn test_search_through_the_service() {
    for h in common::all().await {
        let service = h.service();
        for text in ["Apple pie #dessert", "apple juice", "Pear tart #dessert"] {
            let note = service.create_note().await.unwrap();
            service
                .update_content(note.id(), Document::from_plain_text(text))
                .await
                .unwrap();
        }
        let dessert = h
            .repos
            .tags
            .find_by_name(&tag_name("dessert"))
            .await
            .unwrap()
            .unwrap();

        let page = service
            .search(
                NoteSearch::new(Pagination::first(10))
                    .query("APPLE")
                    .tags([dessert.id]),
            )
            .await
            .unwrap();

        assert_eq!(page.count, 1, "{}", h.name);
        assert_eq!(page.items[0].text(), "Apple pie #dessert", "{}", h.name);
    }
}
