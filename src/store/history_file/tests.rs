// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Nereid and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::collections::BTreeSet;

use futures_util::future::join_all;
use rstest::{fixture, rstest};
use tempfile::TempDir;

use super::{HistoryStore, StoreError, StoreErrorKind, WriteDurability};
use crate::model::{CollectionName, DiagramPatch, EntryId};

struct HistoryTestCtx {
    _tmp: TempDir,
    store: HistoryStore,
}

impl HistoryTestCtx {
    fn new() -> Self {
        let tmp = tempfile::Builder::new().prefix("nereid-live-history").tempdir().unwrap();
        let store = HistoryStore::new(tmp.path().join("data"));
        Self { _tmp: tmp, store }
    }
}

#[fixture]
fn ctx() -> HistoryTestCtx {
    HistoryTestCtx::new()
}

fn name(value: &str) -> CollectionName {
    CollectionName::new(value).unwrap()
}

#[rstest]
#[tokio::test]
async fn missing_file_reads_as_empty_history(ctx: HistoryTestCtx) {
    assert!(ctx.store.get_diagrams(None).await.unwrap().is_empty());
    assert!(ctx.store.get_collections().await.unwrap().is_empty());
    assert!(!ctx.store.history_path().exists());
}

#[rstest]
#[tokio::test]
async fn save_round_trips_fields(ctx: HistoryTestCtx) {
    let saved = ctx
        .store
        .save_diagram("graph TD;A-->B", "flow", Some(name("docs")))
        .await
        .unwrap();

    let all = ctx.store.get_diagrams(None).await.unwrap();
    assert_eq!(all.len(), 1);
    let entry = &all[0];
    assert_eq!(entry.id(), saved.id());
    assert_eq!(entry.diagram(), "graph TD;A-->B");
    assert_eq!(entry.title(), "flow");
    assert_eq!(entry.collection().map(CollectionName::as_str), Some("docs"));
    assert_eq!(entry.created_at(), entry.updated_at());

    assert_eq!(ctx.store.get_collections().await.unwrap(), vec![name("docs")]);
}

#[rstest]
#[tokio::test]
async fn titles_and_names_come_back_verbatim(ctx: HistoryTestCtx) {
    ctx.store
        .save_diagram("graph TD;A-->B", " flow ", Some(name("Project X")))
        .await
        .unwrap();

    let entry = ctx.store.get_diagrams(Some("Project X")).await.unwrap().remove(0);
    assert_eq!(entry.title(), " flow ");
    assert_eq!(entry.collection().map(CollectionName::as_str), Some("Project X"));
}

#[rstest]
#[tokio::test]
async fn saved_ids_are_pairwise_distinct(ctx: HistoryTestCtx) {
    let mut ids = BTreeSet::new();
    for i in 0..20 {
        let entry = ctx.store.save_diagram("graph TD", &format!("t{i}"), None).await.unwrap();
        assert!(ids.insert(entry.id().clone()));
    }
    assert_eq!(ctx.store.get_diagrams(None).await.unwrap().len(), 20);
}

#[rstest]
#[tokio::test]
async fn listing_keeps_insertion_order(ctx: HistoryTestCtx) {
    for title in ["first", "second", "third"] {
        ctx.store.save_diagram("graph TD", title, None).await.unwrap();
    }
    let titles = ctx
        .store
        .get_diagrams(None)
        .await
        .unwrap()
        .iter()
        .map(|entry| entry.title().to_owned())
        .collect::<Vec<_>>();
    assert_eq!(titles, ["first", "second", "third"]);
}

#[rstest]
#[tokio::test]
async fn update_changes_only_supplied_fields(ctx: HistoryTestCtx) {
    let saved = ctx
        .store
        .save_diagram("graph TD;A-->B", "flow", Some(name("docs")))
        .await
        .unwrap();

    let patch = DiagramPatch {
        title: Some("renamed".to_owned()),
        ..DiagramPatch::default()
    };
    let updated = ctx.store.update_diagram(saved.id(), patch).await.unwrap();

    assert_eq!(updated.title(), "renamed");
    assert_eq!(updated.diagram(), saved.diagram());
    assert_eq!(updated.collection(), saved.collection());
    assert_eq!(updated.created_at(), saved.created_at());
    assert!(updated.updated_at() >= saved.updated_at());

    let reloaded = ctx.store.get_diagram(saved.id()).await.unwrap();
    assert_eq!(reloaded, updated);
}

#[rstest]
#[tokio::test]
async fn update_unknown_id_is_not_found(ctx: HistoryTestCtx) {
    let err = ctx
        .store
        .update_diagram(&EntryId::new("missing").unwrap(), DiagramPatch::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), StoreErrorKind::NotFound);
}

#[rstest]
#[tokio::test]
async fn delete_is_final_and_second_delete_fails(ctx: HistoryTestCtx) {
    let keep = ctx.store.save_diagram("graph TD", "keep", None).await.unwrap();
    let gone = ctx.store.save_diagram("graph LR", "gone", None).await.unwrap();

    ctx.store.delete_diagram(gone.id()).await.unwrap();

    let ids = ctx
        .store
        .get_diagrams(None)
        .await
        .unwrap()
        .into_iter()
        .map(|entry| entry.id().clone())
        .collect::<Vec<_>>();
    assert_eq!(ids, vec![keep.id().clone()]);

    let err = ctx.store.delete_diagram(gone.id()).await.unwrap_err();
    assert!(matches!(err, StoreError::DiagramNotFound { .. }));
}

#[rstest]
#[tokio::test]
async fn move_into_new_collection_creates_it(ctx: HistoryTestCtx) {
    let saved = ctx.store.save_diagram("graph TD", "flow", None).await.unwrap();
    ctx.store.save_diagram("graph LR", "other", None).await.unwrap();

    ctx.store.move_diagram(saved.id(), Some(name("project-x"))).await.unwrap();

    let in_collection = ctx.store.get_diagrams(Some("project-x")).await.unwrap();
    assert_eq!(in_collection.len(), 1);
    assert_eq!(in_collection[0].id(), saved.id());
    assert_eq!(in_collection[0].collection().map(CollectionName::as_str), Some("project-x"));

    let all = ctx.store.get_diagrams(None).await.unwrap();
    assert_eq!(all.len(), 2);
    assert!(all.iter().any(|entry| entry.id() == saved.id()));

    assert!(ctx.store.get_collections().await.unwrap().contains(&name("project-x")));
}

#[rstest]
#[tokio::test]
async fn move_to_none_clears_collection(ctx: HistoryTestCtx) {
    let saved = ctx.store.save_diagram("graph TD", "flow", Some(name("a"))).await.unwrap();
    let moved = ctx.store.move_diagram(saved.id(), None).await.unwrap();
    assert_eq!(moved.collection(), None);
    assert!(ctx.store.get_diagrams(Some("a")).await.unwrap().is_empty());
    // The collection outlives its last entry.
    assert_eq!(ctx.store.get_collections().await.unwrap(), vec![name("a")]);
}

#[rstest]
#[tokio::test]
async fn collection_filter_is_case_sensitive(ctx: HistoryTestCtx) {
    ctx.store.save_diagram("graph TD", "upper", Some(name("Docs"))).await.unwrap();
    ctx.store.save_diagram("graph TD", "lower", Some(name("docs"))).await.unwrap();

    let upper = ctx.store.get_diagrams(Some("Docs")).await.unwrap();
    assert_eq!(upper.len(), 1);
    assert_eq!(upper[0].title(), "upper");
}

#[rstest]
#[tokio::test]
async fn create_collection_conflicts_on_existing_name(ctx: HistoryTestCtx) {
    ctx.store.create_collection(name("empty")).await.unwrap();
    let err = ctx.store.create_collection(name("empty")).await.unwrap_err();
    assert_eq!(err.kind(), StoreErrorKind::Conflict);

    assert_eq!(ctx.store.get_collections().await.unwrap(), vec![name("empty")]);
    assert!(ctx.store.get_diagrams(Some("empty")).await.unwrap().is_empty());
}

#[rstest]
#[tokio::test]
async fn delete_collection_uncollects_entries(ctx: HistoryTestCtx) {
    let saved = ctx.store.save_diagram("graph TD", "flow", Some(name("tmp"))).await.unwrap();

    ctx.store.delete_collection("tmp").await.unwrap();

    assert!(ctx.store.get_collections().await.unwrap().is_empty());
    let entry = ctx.store.get_diagram(saved.id()).await.unwrap();
    assert_eq!(entry.collection(), None);

    let err = ctx.store.delete_collection("tmp").await.unwrap_err();
    assert_eq!(err.kind(), StoreErrorKind::NotFound);
}

#[rstest]
#[tokio::test]
async fn corrupt_file_is_a_storage_error_and_left_intact(ctx: HistoryTestCtx) {
    std::fs::create_dir_all(ctx.store.root()).unwrap();
    std::fs::write(ctx.store.history_path(), "{ not json").unwrap();

    let err = ctx.store.save_diagram("graph TD", "flow", None).await.unwrap_err();
    assert_eq!(err.kind(), StoreErrorKind::Storage);
    assert!(matches!(err, StoreError::Json { .. }));

    let raw = std::fs::read_to_string(ctx.store.history_path()).unwrap();
    assert_eq!(raw, "{ not json");
}

#[rstest]
#[tokio::test]
async fn unknown_version_is_rejected(ctx: HistoryTestCtx) {
    std::fs::create_dir_all(ctx.store.root()).unwrap();
    std::fs::write(ctx.store.history_path(), r#"{"version": 99, "diagrams": []}"#).unwrap();

    let err = ctx.store.get_diagrams(None).await.unwrap_err();
    assert!(matches!(err, StoreError::UnsupportedVersion { found: 99, .. }));
}

#[rstest]
#[tokio::test]
async fn unwritable_root_surfaces_storage_error(ctx: HistoryTestCtx) {
    // A regular file where the data directory should be.
    std::fs::write(ctx.store.root(), "not a dir").unwrap();

    let err = ctx.store.save_diagram("graph TD", "flow", None).await.unwrap_err();
    assert_eq!(err.kind(), StoreErrorKind::Storage);
}

#[rstest]
#[tokio::test]
async fn collections_referenced_only_by_entries_are_repaired(ctx: HistoryTestCtx) {
    std::fs::create_dir_all(ctx.store.root()).unwrap();
    let raw = serde_json::json!({
        "version": 1,
        "collections": ["a", "a"],
        "diagrams": [{
            "id": "e1",
            "diagram": "graph TD",
            "title": "flow",
            "collection": "b",
            "createdAt": "2026-01-01T00:00:00Z",
            "updatedAt": "2026-01-01T00:00:00Z"
        }]
    });
    std::fs::write(ctx.store.history_path(), raw.to_string()).unwrap();

    assert_eq!(ctx.store.get_collections().await.unwrap(), vec![name("a"), name("b")]);
}

#[rstest]
#[tokio::test]
async fn durable_writes_persist(ctx: HistoryTestCtx) {
    let store = ctx.store.clone().with_durability(WriteDurability::Durable);
    store.save_diagram("graph TD", "flow", None).await.unwrap();

    let reopened = HistoryStore::new(store.root());
    assert_eq!(reopened.get_diagrams(None).await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_saves_do_not_lose_updates() {
    let ctx = HistoryTestCtx::new();
    let root = ctx.store.root().to_path_buf();

    // Separate handles on the same file share one gate.
    let tasks = (0..32).map(|i| {
        let store = if i % 2 == 0 { ctx.store.clone() } else { HistoryStore::new(&root) };
        tokio::spawn(async move { store.save_diagram("graph TD", &format!("t{i}"), None).await })
    });

    for result in join_all(tasks).await {
        result.unwrap().unwrap();
    }

    assert_eq!(ctx.store.get_diagrams(None).await.unwrap().len(), 32);
}

#[tokio::test(flavor = "current_thread")]
async fn reads_and_writes_run_on_a_current_thread_runtime() {
    let ctx = HistoryTestCtx::new();
    let store = ctx.store.clone().with_durability(WriteDurability::Durable);

    let (saved, listed) = tokio::join!(
        store.save_diagram("graph TD", "flow", None),
        store.get_diagrams(None)
    );
    saved.unwrap();
    assert!(listed.unwrap().len() <= 1);
    assert_eq!(store.get_diagrams(None).await.unwrap().len(), 1);
}

#[cfg(unix)]
#[rstest]
fn symlinked_roots_share_one_gate(ctx: HistoryTestCtx) {
    let real = ctx._tmp.path().join("real");
    let link = ctx._tmp.path().join("link");
    std::fs::create_dir_all(&real).unwrap();
    std::os::unix::fs::symlink(&real, &link).unwrap();

    let direct = HistoryStore::new(&real);
    let aliased = HistoryStore::new(&link);
    assert!(std::sync::Arc::ptr_eq(&direct.gate, &aliased.gate));

    // Roots that do not exist yet resolve through their existing parent.
    let nested_direct = HistoryStore::new(real.join("data"));
    let nested_aliased = HistoryStore::new(link.join("data"));
    assert!(std::sync::Arc::ptr_eq(&nested_direct.gate, &nested_aliased.gate));
    assert!(!std::sync::Arc::ptr_eq(&direct.gate, &nested_direct.gate));
}
