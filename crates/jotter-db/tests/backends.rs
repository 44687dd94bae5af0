//! Behaviour every backend must share.
//!
//! Each test runs the same steps against the relational, embedded and
//! key-value adapters and expects identical results.

mod common;

use jotter_core::{
    NoteOrderBy, NoteSearch, Pagination, Revision, SortOrder, StoreError, Tag, TagId, TagOrderBy,
    UnitOfWorkExt,
};

use common::{at, ids, note, note_with_id, tag, tag_name};

#[tokio::test]
async fn test_note_round_trips_with_tags() {
    for h in common::all().await {
        let recipe = tag(&h.repos, "recipe").await;
        let saved = note(&h.repos, "Apple pie #recipe", &[&recipe], 10, 20).await;

        let found = h.repos.notes.find_by_id(saved.id()).await.unwrap();
        assert_eq!(found, Some(saved), "{}", h.name);
    }
}

#[tokio::test]
async fn test_missing_note_is_none() {
    for h in common::all().await {
        let found = h.repos.notes.find_by_id(Default::default()).await.unwrap();
        assert_eq!(found, None, "{}", h.name);
    }
}

#[tokio::test]
async fn test_unfiltered_search_equals_find_all() {
    for h in common::all().await {
        let a = tag(&h.repos, "a").await;
        note(&h.repos, "first", &[&a], 1, 30).await;
        note(&h.repos, "second", &[], 2, 10).await;
        note(&h.repos, "third", &[&a], 3, 20).await;

        for (order, order_by) in [
            (SortOrder::Desc, NoteOrderBy::UpdatedAt),
            (SortOrder::Asc, NoteOrderBy::CreatedAt),
        ] {
            let all = h
                .repos
                .notes
                .find_all(Pagination::unbounded(), order, order_by)
                .await
                .unwrap();
            let searched = h
                .repos
                .note_queries
                .combined_search(
                    &NoteSearch::new(Pagination::unbounded())
                        .order(order)
                        .order_by(order_by),
                )
                .await
                .unwrap();

            assert_eq!(searched, all, "{}", h.name);
            assert_eq!(searched.count, 3, "{}", h.name);
        }
    }
}

#[tokio::test]
async fn test_tag_filter_requires_every_tag() {
    for h in common::all().await {
        let a = tag(&h.repos, "a").await;
        let b = tag(&h.repos, "b").await;
        let both = note(&h.repos, "both", &[&a, &b], 1, 1).await;
        let only_a = note(&h.repos, "only a", &[&a], 2, 2).await;
        note(&h.repos, "only b", &[&b], 3, 3).await;

        let page = h
            .repos
            .note_queries
            .combined_search(&NoteSearch::new(Pagination::first(10)).tags([a.id, b.id]))
            .await
            .unwrap();
        assert_eq!(ids(&page.items), vec![both.id()], "{}", h.name);
        assert_eq!(page.count, 1, "{}", h.name);

        let page = h
            .repos
            .note_queries
            .combined_search(&NoteSearch::new(Pagination::first(10)).tags([a.id]))
            .await
            .unwrap();
        assert_eq!(ids(&page.items), vec![only_a.id(), both.id()], "{}", h.name);
    }
}

#[tokio::test]
async fn test_unknown_tag_in_filter_matches_nothing() {
    for h in common::all().await {
        let a = tag(&h.repos, "a").await;
        note(&h.repos, "tagged", &[&a], 1, 1).await;

        let page = h
            .repos
            .note_queries
            .combined_search(&NoteSearch::new(Pagination::first(10)).tags([a.id, TagId::new()]))
            .await
            .unwrap();
        assert!(page.items.is_empty(), "{}", h.name);
        assert_eq!(page.count, 0, "{}", h.name);
    }
}

#[tokio::test]
async fn test_text_filter_is_case_insensitive_and_combines_with_tags() {
    for h in common::all().await {
        let dessert = tag(&h.repos, "dessert").await;
        let pie = note(&h.repos, "Apple PIE #dessert", &[&dessert], 1, 1).await;
        note(&h.repos, "apple cider", &[], 2, 2).await;
        note(&h.repos, "Banana bread #dessert", &[&dessert], 3, 3).await;

        let page = h
            .repos
            .note_queries
            .combined_search(&NoteSearch::new(Pagination::first(10)).query("  aPPle "))
            .await
            .unwrap();
        assert_eq!(page.count, 2, "{}", h.name);

        let page = h
            .repos
            .note_queries
            .combined_search(
                &NoteSearch::new(Pagination::first(10))
                    .query("apple")
                    .tags([dessert.id]),
            )
            .await
            .unwrap();
        assert_eq!(ids(&page.items), vec![pie.id()], "{}", h.name);
    }
}

#[tokio::test]
async fn test_like_wildcards_are_literal() {
    for h in common::all().await {
        note(&h.repos, "100% done", &[], 1, 1).await;
        note(&h.repos, "1000 done", &[], 2, 2).await;
        note(&h.repos, "snake_case", &[], 3, 3).await;
        note(&h.repos, "snakeXcase", &[], 4, 4).await;

        for (query, expected) in [("0%", 1), ("e_c", 1)] {
            let page = h
                .repos
                .note_queries
                .combined_search(&NoteSearch::new(Pagination::first(10)).query(query))
                .await
                .unwrap();
            assert_eq!(page.count, expected, "{} {query}", h.name);
        }
    }
}

#[tokio::test]
async fn test_pages_partition_the_result_and_count_ignores_paging() {
    for h in common::all().await {
        for n in 0..5 {
            note(&h.repos, &format!("note {n}"), &[], n, 100 + n).await;
        }

        let mut seen = Vec::new();
        for page_no in 1..=3 {
            let page = h
                .repos
                .note_queries
                .combined_search(&NoteSearch::new(Pagination::new(page_no, 2).unwrap()))
                .await
                .unwrap();
            assert_eq!(page.count, 5, "{}", h.name);
            seen.extend(page.items);
        }

        let everything = h
            .repos
            .notes
            .find_all(Pagination::unbounded(), SortOrder::Desc, NoteOrderBy::UpdatedAt)
            .await
            .unwrap();
        assert_eq!(ids(&seen), ids(&everything.items), "{}", h.name);

        let beyond = h
            .repos
            .note_queries
            .combined_search(&NoteSearch::new(Pagination::new(4, 2).unwrap()))
            .await
            .unwrap();
        assert!(beyond.items.is_empty(), "{}", h.name);
        assert_eq!(beyond.count, 5, "{}", h.name);

        let zero = h
            .repos
            .note_queries
            .combined_search(&NoteSearch::new(Pagination::first(0)))
            .await
            .unwrap();
        assert!(zero.items.is_empty(), "{}", h.name);
        assert_eq!(zero.count, 5, "{}", h.name);
    }
}

#[tokio::test]
async fn test_equal_timestamps_break_ties_by_id_ascending() {
    for h in common::all().await {
        let mut expected = Vec::new();
        for _ in 0..4 {
            expected.push(note(&h.repos, "same time", &[], 50, 50).await.id());
        }
        expected.sort();

        for order in [SortOrder::Asc, SortOrder::Desc] {
            let page = h
                .repos
                .note_queries
                .combined_search(&NoteSearch::new(Pagination::unbounded()).order(order))
                .await
                .unwrap();
            assert_eq!(ids(&page.items), expected, "{} {order:?}", h.name);
        }
    }
}

#[tokio::test]
async fn test_resaving_a_note_rewrites_its_relations() {
    for h in common::all().await {
        let a = tag(&h.repos, "a").await;
        let b = tag(&h.repos, "b").await;
        let first = note(&h.repos, "#a", &[&a], 1, 1).await;
        let second = note_with_id(&h.repos, first.id(), "#b", &[&b], 1, 2).await;

        let found = h.repos.notes.find_by_id(first.id()).await.unwrap().unwrap();
        assert_eq!(found, second, "{}", h.name);

        let usage = h.repos.tag_queries.find_with_usage().await.unwrap();
        let by_name: Vec<(&str, u32)> = usage
            .iter()
            .map(|t| (t.name.as_str(), t.usage_count))
            .collect();
        assert_eq!(by_name, vec![("b", 1), ("a", 0)], "{}", h.name);
    }
}

#[tokio::test]
async fn test_saving_a_note_with_an_unknown_tag_is_a_relation_conflict() {
    for h in common::all().await {
        let ghost = Tag::new(tag_name("ghost"), at(1));
        let err = h
            .repos
            .notes
            .save(&jotter_core::Note::restore(
                Default::default(),
                Default::default(),
                String::new(),
                [ghost.id].into_iter().collect(),
                at(1),
                at(1),
            ))
            .await
            .unwrap_err();

        assert!(
            matches!(err, StoreError::Conflict { entity: "Relation", .. }),
            "{}: {err}",
            h.name
        );
    }
}

#[tokio::test]
async fn test_deleting_a_note_drops_its_relations() {
    for h in common::all().await {
        let a = tag(&h.repos, "a").await;
        let doomed = note(&h.repos, "#a", &[&a], 1, 1).await;

        h.repos.notes.delete(doomed.id()).await.unwrap();
        h.repos.notes.delete(doomed.id()).await.unwrap();

        assert_eq!(h.repos.notes.find_by_id(doomed.id()).await.unwrap(), None);
        let unused = h.repos.tags.find_unused().await.unwrap();
        assert_eq!(unused.len(), 1, "{}", h.name);
        assert_eq!(unused[0].id, a.id, "{}", h.name);
    }
}

#[tokio::test]
async fn test_deleting_a_tag_unlinks_it_from_notes() {
    for h in common::all().await {
        let a = tag(&h.repos, "a").await;
        let b = tag(&h.repos, "b").await;
        let tagged = note(&h.repos, "#a #b", &[&a, &b], 1, 1).await;

        h.repos.tags.delete(a.id).await.unwrap();

        let found = h.repos.notes.find_by_id(tagged.id()).await.unwrap().unwrap();
        assert_eq!(
            found.tag_ids().iter().copied().collect::<Vec<_>>(),
            vec![b.id],
            "{}",
            h.name
        );
    }
}

#[tokio::test]
async fn test_tag_lookups() {
    for h in common::all().await {
        let a = tag(&h.repos, "alpha").await;
        let b = tag(&h.repos, "beta").await;

        assert_eq!(h.repos.tags.find_by_id(a.id).await.unwrap(), Some(a.clone()));
        assert_eq!(
            h.repos.tags.find_by_name(&tag_name("beta")).await.unwrap(),
            Some(b.clone())
        );
        assert_eq!(h.repos.tags.find_by_name(&tag_name("gamma")).await.unwrap(), None);

        let mut expected = vec![a.clone(), b.clone()];
        expected.sort_by(|x, y| x.id.cmp(&y.id));
        let found = h
            .repos
            .tags
            .find_by_ids(&[b.id, TagId::new(), a.id])
            .await
            .unwrap();
        assert_eq!(found, expected, "{}", h.name);
        assert!(h.repos.tags.find_by_ids(&[]).await.unwrap().is_empty());

        let page = h
            .repos
            .tags
            .find_all(Pagination::first(1), SortOrder::Asc, TagOrderBy::Name)
            .await
            .unwrap();
        assert_eq!(page.items, vec![a], "{}", h.name);
        assert_eq!(page.count, 2, "{}", h.name);
    }
}

#[tokio::test]
async fn test_duplicate_tag_name_is_a_tag_conflict() {
    for h in common::all().await {
        tag(&h.repos, "dup").await;

        let err = h
            .repos
            .tags
            .save(&Tag::new(tag_name("dup"), at(2)))
            .await
            .unwrap_err();
        assert!(
            matches!(err, StoreError::Conflict { entity: "Tag", .. }),
            "{}: {err}",
            h.name
        );
    }
}

#[tokio::test]
async fn test_tag_search_by_name_fragment() {
    for h in common::all().await {
        tag(&h.repos, "Recipe").await;
        tag(&h.repos, "prerequisite").await;
        tag(&h.repos, "work").await;

        let found: Vec<String> = h
            .repos
            .tag_queries
            .search_by_name("RE", 10)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.name.as_str().to_string())
            .collect();
        assert_eq!(found, vec!["Recipe", "prerequisite"], "{}", h.name);

        let limited = h.repos.tag_queries.search_by_name("e", 1).await.unwrap();
        assert_eq!(limited.len(), 1, "{}", h.name);
    }
}

#[tokio::test]
async fn test_delete_many_counts_existing_tags() {
    for h in common::all().await {
        let a = tag(&h.repos, "a").await;
        let b = tag(&h.repos, "b").await;

        let removed = h
            .repos
            .tags
            .delete_many(&[a.id, b.id, TagId::new()])
            .await
            .unwrap();
        assert_eq!(removed, 2, "{}", h.name);
        assert_eq!(h.repos.tags.delete_many(&[]).await.unwrap(), 0);
    }
}

#[tokio::test]
async fn test_revisions_are_newest_first_and_pruned() {
    for h in common::all().await {
        let n = note(&h.repos, "draft", &[], 1, 1).await;
        let mut saved = Vec::new();
        for millis in [100, 300, 200] {
            let revision = Revision::snapshot(&n, at(millis));
            h.repos.revisions.save(&revision).await.unwrap();
            saved.push(revision);
        }

        let listed = h.repos.revisions.find_by_note(n.id()).await.unwrap();
        let times: Vec<i64> = listed.iter().map(|r| r.saved_at.timestamp_millis()).collect();
        assert_eq!(times, vec![300, 200, 100], "{}", h.name);
        assert_eq!(
            h.repos.revisions.find_by_id(saved[0].id).await.unwrap(),
            Some(saved[0].clone())
        );

        assert_eq!(h.repos.revisions.prune(n.id(), 1).await.unwrap(), 2, "{}", h.name);
        let left = h.repos.revisions.find_by_note(n.id()).await.unwrap();
        assert_eq!(left, vec![saved[1].clone()], "{}", h.name);

        assert_eq!(h.repos.revisions.delete_by_note(n.id()).await.unwrap(), 1);
        assert!(h.repos.revisions.find_by_note(n.id()).await.unwrap().is_empty());
    }
}

#[tokio::test]
async fn test_failed_unit_of_work_rolls_back_only_on_atomic_backends() {
    for h in common::all().await {
        let draft = jotter_core::Note::new(at(1));
        let id = draft.id();

        let result: Result<(), StoreError> = h
            .provider
            .run(move |repos| async move {
                repos.notes.save(&draft).await?;
                Err(StoreError::corrupted("step two failed"))
            })
            .await;
        assert!(result.is_err());

        let found = h.repos.notes.find_by_id(id).await.unwrap();
        if h.capability().is_atomic() {
            assert_eq!(found, None, "{}", h.name);
        } else {
            assert!(found.is_some(), "{}", h.name);
        }
    }
}

#[tokio::test]
async fn test_committed_unit_of_work_is_visible() {
    for h in common::all().await {
        let a = Tag::new(tag_name("a"), at(1));
        let tagged = {
            let mut n = jotter_core::Note::new(at(1));
            n.set_tag_ids([a.id]);
            n
        };
        let expected = tagged.clone();

        h.provider
            .run(move |repos| async move {
                repos.tags.save(&a).await?;
                repos.notes.save(&tagged).await?;
                Ok(())
            })
            .await
            .unwrap();

        let found = h.repos.notes.find_by_id(expected.id()).await.unwrap();
        assert_eq!(found, Some(expected), "{}", h.name);
    }
}
