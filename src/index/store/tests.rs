use super::*;
use tempfile::TempDir;

fn entry(vector: Vec<f32>, content: &str, page: Option<u32>, chunk_index: u32) -> IndexEntry {
    IndexEntry {
        vector,
        chunk: Chunk {
            content: content.to_string(),
            source: PathBuf::from("docs/guide.pdf"),
            page,
            chunk_index,
        },
    }
}

fn sample_index() -> VectorIndex {
    let entries = vec![
        entry(vec![0.0, 0.0, 1.0], "restart the router", Some(0), 0),
        entry(vec![0.5, 0.5, 0.0], "check the cable", Some(2), 1),
        entry(vec![1.0, 0.0, 0.0], "call support", None, 0),
    ];
    VectorIndex::from_entries(entries, DistanceMetric::Cosine)
        .expect("index should assemble")
        .with_chunking(ChunkingConfig::new(500, 50))
}

#[tokio::test]
async fn save_then_load_preserves_everything() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let index = sample_index();

    index.save(temp_dir.path()).await.expect("save should succeed");
    let loaded = VectorIndex::load(temp_dir.path())
        .await
        .expect("load should succeed");

    assert_eq!(loaded.len(), 3);
    assert_eq!(loaded.dimension(), 3);
    assert_eq!(loaded.metric(), DistanceMetric::Cosine);
    assert_eq!(loaded.chunking(), Some(&ChunkingConfig::new(500, 50)));
    assert_eq!(loaded.entries(), index.entries());
    assert_eq!(
        loaded.built_at().timestamp_millis(),
        index.built_at().timestamp_millis()
    );

    let query = [0.9, 0.1, 0.0];
    assert_eq!(
        loaded.search(&query, 3).expect("search loaded"),
        index.search(&query, 3).expect("search original")
    );
}

#[tokio::test]
async fn save_overwrites_previous_index() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    sample_index()
        .save(temp_dir.path())
        .await
        .expect("first save should succeed");

    let replacement = VectorIndex::from_entries(
        vec![entry(vec![1.0, 1.0], "only entry", None, 0)],
        DistanceMetric::L2,
    )
    .expect("index should assemble");
    replacement
        .save(temp_dir.path())
        .await
        .expect("second save should succeed");

    let loaded = VectorIndex::load(temp_dir.path())
        .await
        .expect("load should succeed");
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded.dimension(), 2);
    assert_eq!(loaded.metric(), DistanceMetric::L2);
    assert!(loaded.chunking().is_none());
}

#[tokio::test]
async fn load_missing_directory_is_not_found() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let missing = temp_dir.path().join("nope");

    match VectorIndex::load(&missing).await {
        Err(AssistError::NotFound { path }) => assert_eq!(path, missing),
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn load_directory_without_index_is_not_found() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    let result = VectorIndex::load(temp_dir.path()).await;
    assert!(matches!(result, Err(AssistError::NotFound { .. })));
}

#[tokio::test]
async fn empty_index_is_not_saved() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let result = VectorIndex::empty(DistanceMetric::L2)
        .save(temp_dir.path())
        .await;
    assert!(matches!(result, Err(AssistError::Index(_))));
}

#[tokio::test]
async fn chunks_table_without_rows_is_rejected() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    sample_index()
        .save(temp_dir.path())
        .await
        .expect("save should succeed");

    let store = IndexStore::open(temp_dir.path())
        .await
        .expect("store should open");
    store
        .write_table(CHUNKS_TABLE, RecordBatch::new_empty(chunks_schema(3)))
        .await
        .expect("empty table should be written");

    let result = VectorIndex::load(temp_dir.path()).await;
    assert!(matches!(result, Err(AssistError::Index(_))));
}
