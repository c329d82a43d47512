use super::*;
use crate::vectordb::{VectorIndex, VectorPoint};

fn docker_docs() -> Vec<SkillDocument> {
    vec![
        SkillDocument::new("a", "docker helper")
            .with_description("Manage containers")
            .with_tags(["containers", "devops"])
            .with_source("github")
            .with_category("devops")
            .with_quality(0.9),
        SkillDocument::new("b", "docker compose tool")
            .with_description("Multi-container apps")
            .with_source("local")
            .with_category("devops")
            .with_quality(0.4),
        SkillDocument::new("c", "spreadsheet formulas")
            .with_description("Excel tips, not docker related")
            .with_category("office")
            .with_quality(0.7),
    ]
}

fn ids(docs: &[SkillDocument]) -> Vec<String> {
    let mut ids: Vec<String> = docs.iter().map(|d| d.id.clone()).collect();
    ids.sort();
    ids
}

fn all_ids() -> Vec<String> {
    ["a", "b", "c"].iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_fts_query_quotes_terms() {
    assert_eq!(fts_query("Docker helper").as_deref(), Some("\"docker\" OR \"helper\""));
    assert_eq!(
        fts_query("name:foo\" OR bar* docker docker").as_deref(),
        Some("\"name\" OR \"foo\" OR \"or\" OR \"bar\" OR \"docker\"")
    );
    assert_eq!(fts_query("  -- ** "), None);
}

#[test]
fn test_document_filter_matching() {
    let doc = &docker_docs()[0];
    assert!(doc.matches(&SearchFilters::default()));
    assert!(doc.matches(&SearchFilters::default().with_min_quality(0.9)));
    assert!(!doc.matches(&SearchFilters::default().with_min_quality(0.91)));
    assert!(doc.matches(&SearchFilters::default().with_source("github")));
    assert!(!doc.matches(&SearchFilters::default().with_category("office")));
}

#[test]
fn test_embedding_text_joins_fields() {
    let doc = SkillDocument::new("x", "name")
        .with_description("desc")
        .with_tags(["t1", "t2"]);
    assert_eq!(doc.embedding_text(), "name desc t1 t2");
    assert_eq!(SkillDocument::new("y", "only").embedding_text(), "only");
}

#[tokio::test]
async fn test_sqlite_upsert_and_get_by_ids() {
    let store = SqliteSkillStore::open_in_memory(4).expect("open");
    assert_eq!(store.upsert_many(docker_docs()).await.unwrap(), 3);
    assert_eq!(store.count().await.unwrap(), 3);

    let docs = store
        .get_by_ids(
            &["a".to_string(), "missing".to_string()],
            &SearchFilters::default(),
        )
        .await
        .unwrap();
    assert_eq!(docs, vec![docker_docs()[0].clone()]);

    assert!(
        store
            .get_by_ids(&[], &SearchFilters::default())
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_sqlite_filters_applied_in_query() {
    let store = SqliteSkillStore::open_in_memory(4).unwrap();
    store.upsert_many(docker_docs()).await.unwrap();

    let quality = store
        .get_by_ids(&all_ids(), &SearchFilters::default().with_min_quality(0.5))
        .await
        .unwrap();
    assert_eq!(ids(&quality), ["a", "c"]);

    let devops_local = store
        .get_by_ids(
            &all_ids(),
            &SearchFilters::default()
                .with_category("devops")
                .with_source("local"),
        )
        .await
        .unwrap();
    assert_eq!(ids(&devops_local), ["b"]);
}

#[tokio::test]
async fn test_sqlite_keyword_search_ranks_name_matches_first() {
    let store = SqliteSkillStore::open_in_memory(4).unwrap();
    store.upsert_many(docker_docs()).await.unwrap();

    let hits = KeywordIndex::search(&store, "docker", 10).await.unwrap();
    let hit_ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();

    assert_eq!(hits.len(), 3);
    assert_eq!(hit_ids[2], "c", "description-only match ranks last");
    assert!(hits.windows(2).all(|w| w[0].score <= w[1].score));
    assert!(hits.iter().all(|h| h.score < 0.0));

    let limited = KeywordIndex::search(&store, "docker", 1).await.unwrap();
    assert_eq!(limited.len(), 1);
}

#[tokio::test]
async fn test_sqlite_keyword_search_ignores_fts_syntax() {
    let store = SqliteSkillStore::open_in_memory(4).unwrap();
    store.upsert_many(docker_docs()).await.unwrap();

    let hits = KeywordIndex::search(&store, "name:docker* AND (\"", 10)
        .await
        .expect("malformed FTS syntax must not error");
    assert!(!hits.is_empty());

    assert!(
        KeywordIndex::search(&store, "!!!", 10)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_sqlite_reupsert_replaces_fts_row() {
    let store = SqliteSkillStore::open_in_memory(4).unwrap();
    store.upsert(SkillDocument::new("a", "docker helper")).await.unwrap();
    store.upsert(SkillDocument::new("a", "kubernetes helper")).await.unwrap();

    assert!(
        KeywordIndex::search(&store, "docker", 10)
            .await
            .unwrap()
            .is_empty()
    );
    let hits = KeywordIndex::search(&store, "kubernetes", 10).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_sqlite_vector_index() {
    let store = SqliteSkillStore::open_in_memory(3).unwrap();
    store
        .upsert_vectors(vec![
            VectorPoint::new("x", vec![1.0, 0.0, 0.0]),
            VectorPoint::new("y", vec![0.0, 1.0, 0.0]),
        ])
        .await
        .unwrap();

    let hits = store.find_similar(vec![0.9, 0.1, 0.0], 5).await.unwrap();
    assert_eq!(hits[0].id, "x");
    assert_eq!(hits.len(), 2);

    assert!(
        store
            .upsert_vectors(vec![VectorPoint::new("z", vec![1.0])])
            .await
            .is_err()
    );

    store.delete_vectors(vec!["x".to_string()]).await.unwrap();
    let hits = store.find_similar(vec![1.0, 0.0, 0.0], 5).await.unwrap();
    assert_eq!(hits.len(), 1);
}

#[tokio::test]
async fn test_sqlite_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db").join("skills.db");
    {
        let store = SqliteSkillStore::open(&path, 3).unwrap();
        store.upsert_many(docker_docs()).await.unwrap();
    }

    let store = SqliteSkillStore::open(&path, 3).unwrap();
    assert_eq!(store.count().await.unwrap(), 3);
    assert!(!KeywordIndex::search(&store, "compose", 5).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_in_memory_store_keyword_and_filters() {
    let store = InMemorySkillStore::new();
    store.upsert_many(docker_docs()).await.unwrap();

    let hits = store.search("docker", 10).await.unwrap();
    let hit_ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
    assert_eq!(hit_ids, ["a", "b", "c"]);
    assert_eq!(hits[0].score, -3.0);
    assert_eq!(hits[2].score, -1.0);

    let filtered = store
        .get_by_ids(&all_ids(), &SearchFilters::default().with_min_quality(0.5))
        .await
        .unwrap();
    assert_eq!(ids(&filtered), ["a", "c"]);
}

#[tokio::test]
async fn test_in_memory_keyword_failure_switch() {
    let store = InMemorySkillStore::new();
    store.set_keyword_failing(true);

    assert!(matches!(
        store.search("docker", 10).await,
        Err(StorageError::Unavailable(_))
    ));
    assert_eq!(store.keyword_query_count(), 1);
}
