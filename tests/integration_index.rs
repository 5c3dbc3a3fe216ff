#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// Index persistence tests against a real LanceDB directory

use std::fs;
use std::path::PathBuf;

use support_assist::AssistError;
use support_assist::commands::index_documents;
use support_assist::config::{Config, EmbeddingProvider};
use support_assist::embeddings::{ChunkingConfig, HashingEmbedder};
use support_assist::index::{DistanceMetric, VectorIndex};
use tempfile::TempDir;

fn config_for(temp_dir: &TempDir, metric: DistanceMetric) -> Config {
    let mut config = Config {
        base_dir: temp_dir.path().to_path_buf(),
        ..Config::default()
    };
    config.embedding.provider = EmbeddingProvider::Hashing;
    config.embedding.dimension = 128;
    config.chunking = ChunkingConfig::new(80, 20);
    config.retrieval.metric = metric;
    config
}

fn write_knowledge_base(temp_dir: &TempDir) -> PathBuf {
    let docs = temp_dir.path().join("kb");
    fs::create_dir_all(&docs).expect("should create kb dir");
    fs::write(
        docs.join("accounts.md"),
        "To reset a password, open Settings, choose Security and press Reset password. \
         A confirmation email arrives within five minutes. If it does not, check the spam folder.",
    )
    .expect("should write doc");
    fs::write(
        docs.join("billing.txt"),
        "Invoices are issued on the first day of each month. Refunds take up to ten business days.",
    )
    .expect("should write doc");
    docs
}

#[tokio::test]
async fn saved_index_answers_like_the_original() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = config_for(&temp_dir, DistanceMetric::Cosine);
    let docs = write_knowledge_base(&temp_dir);
    let embedder = HashingEmbedder::new(128);

    let (index, _) = index_documents(&docs, &config, &embedder).expect("index should build");
    index
        .save(&config.index_path())
        .await
        .expect("save should succeed");

    let loaded = VectorIndex::load(&config.index_path())
        .await
        .expect("load should succeed");

    assert_eq!(config.index_path(), temp_dir.path().join("index"));
    assert_eq!(loaded.len(), index.len());
    assert_eq!(loaded.metric(), DistanceMetric::Cosine);
    assert_eq!(loaded.chunking(), Some(&ChunkingConfig::new(80, 20)));

    for question in ["how do I reset my password", "when do refunds arrive", "spam"] {
        let query = embedder.embed_text(question);
        assert_eq!(
            loaded.search(&query, 4).expect("search loaded"),
            index.search(&query, 4).expect("search original"),
            "results differ for {question:?}"
        );
    }
}

#[tokio::test]
async fn missing_index_reports_its_path() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = config_for(&temp_dir, DistanceMetric::L2);

    let error = VectorIndex::load(&config.index_path())
        .await
        .expect_err("there is no index yet");

    assert!(matches!(error, AssistError::NotFound { .. }));
    assert!(
        error
            .to_string()
            .contains(&config.index_path().display().to_string())
    );
}

#[tokio::test]
async fn forced_rebuild_replaces_contents() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = config_for(&temp_dir, DistanceMetric::L2);
    let docs = write_knowledge_base(&temp_dir);
    let embedder = HashingEmbedder::new(128);

    let (first, _) = index_documents(&docs, &config, &embedder).expect("first build");
    first
        .save(&config.index_path())
        .await
        .expect("first save");

    fs::remove_file(docs.join("billing.txt")).expect("should remove doc");
    let (second, _) = index_documents(&docs, &config, &embedder).expect("second build");
    second
        .save(&config.index_path())
        .await
        .expect("second save");

    let loaded = VectorIndex::load(&config.index_path())
        .await
        .expect("load should succeed");
    assert_eq!(loaded.len(), second.len());
    assert!(
        loaded
            .entries()
            .iter()
            .all(|e| e.chunk.source.ends_with("accounts.md"))
    );
}
