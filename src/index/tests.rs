use super::*;
use std::path::PathBuf;

/// Embeds a text as its position in a fixed table, so distances are exact
struct TableEmbedder;

impl Embedder for TableEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        match text {
            "origin" => Ok(vec![0.0, 0.0]),
            "east" => Ok(vec![1.0, 0.0]),
            "north" => Ok(vec![0.0, 1.0]),
            "far" => Ok(vec![5.0, 5.0]),
            "east again" => Ok(vec![1.0, 0.0]),
            other => Err(AssistError::Provider(format!("unknown text {other}"))),
        }
    }
}

fn chunk(content: &str, chunk_index: u32) -> Chunk {
    Chunk {
        content: content.to_string(),
        source: PathBuf::from("kb/manual.txt"),
        page: None,
        chunk_index,
    }
}

fn chunks(contents: &[&str]) -> Vec<Chunk> {
    contents
        .iter()
        .enumerate()
        .map(|(i, c)| chunk(c, i as u32))
        .collect()
}

#[test]
fn l2_is_squared_euclidean() {
    assert_eq!(DistanceMetric::L2.distance(&[0.0, 0.0], &[3.0, 4.0]), 25.0);
    assert_eq!(DistanceMetric::L2.distance(&[1.0, 2.0], &[1.0, 2.0]), 0.0);
}

#[test]
fn cosine_distance() {
    let same = DistanceMetric::Cosine.distance(&[1.0, 0.0], &[2.0, 0.0]);
    let orthogonal = DistanceMetric::Cosine.distance(&[1.0, 0.0], &[0.0, 3.0]);
    let zero = DistanceMetric::Cosine.distance(&[0.0, 0.0], &[1.0, 0.0]);

    assert!(same.abs() < 1e-6);
    assert!((orthogonal - 1.0).abs() < 1e-6);
    assert_eq!(zero, 1.0);
}

#[test]
fn metric_names_round_trip() {
    for metric in [DistanceMetric::L2, DistanceMetric::Cosine] {
        assert_eq!(DistanceMetric::parse(metric.as_str()), Some(metric));
    }
    assert_eq!(DistanceMetric::parse("dot"), None);
    assert_eq!(DistanceMetric::default(), DistanceMetric::L2);
}

#[test]
fn build_keeps_chunk_order_and_dimension() {
    let index = VectorIndex::build(
        chunks(&["origin", "east", "north"]),
        &TableEmbedder,
        DistanceMetric::L2,
    )
    .expect("index should build");

    assert_eq!(index.len(), 3);
    assert_eq!(index.dimension(), 2);
    assert_eq!(index.metric(), DistanceMetric::L2);
    assert!(index.chunking().is_none());
    let contents: Vec<&str> = index
        .entries()
        .iter()
        .map(|e| e.chunk.content.as_str())
        .collect();
    assert_eq!(contents, vec!["origin", "east", "north"]);
}

#[test]
fn build_propagates_embedder_errors() {
    let result = VectorIndex::build(chunks(&["origin", "???"]), &TableEmbedder, DistanceMetric::L2);
    assert!(matches!(result, Err(AssistError::Provider(_))));
}

#[test]
fn mixed_dimensions_are_rejected() {
    let entries = vec![
        IndexEntry {
            vector: vec![1.0, 2.0],
            chunk: chunk("a", 0),
        },
        IndexEntry {
            vector: vec![1.0, 2.0, 3.0],
            chunk: chunk("b", 1),
        },
    ];
    let result = VectorIndex::from_entries(entries, DistanceMetric::L2);
    assert!(matches!(result, Err(AssistError::Index(_))));
}

#[test]
fn search_orders_by_distance() {
    let index = VectorIndex::build(
        chunks(&["far", "north", "origin"]),
        &TableEmbedder,
        DistanceMetric::L2,
    )
    .expect("index should build");

    let hits = index.search(&[0.1, 0.0], 2).expect("search should succeed");
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].chunk.content, "origin");
    assert_eq!(hits[1].chunk.content, "north");
    assert!(hits[0].distance <= hits[1].distance);
}

#[test]
fn ties_keep_insertion_order() {
    let index = VectorIndex::build(
        chunks(&["east", "north", "east again"]),
        &TableEmbedder,
        DistanceMetric::L2,
    )
    .expect("index should build");

    let hits = index.search(&[1.0, 0.0], 3).expect("search should succeed");
    let order: Vec<&str> = hits.iter().map(|h| h.chunk.content.as_str()).collect();
    assert_eq!(order, vec!["east", "east again", "north"]);

    // Repeating the query gives the same answer
    let again = index.search(&[1.0, 0.0], 3).expect("search should succeed");
    assert_eq!(hits, again);
}

#[test]
fn search_edge_cases() {
    let index = VectorIndex::build(chunks(&["origin", "east"]), &TableEmbedder, DistanceMetric::L2)
        .expect("index should build");

    assert!(index.search(&[0.0, 0.0], 0).expect("k = 0").is_empty());
    assert_eq!(index.search(&[0.0, 0.0], 10).expect("large k").len(), 2);
    assert!(matches!(
        index.search(&[0.0, 0.0, 0.0], 1),
        Err(AssistError::Index(_))
    ));

    let empty = VectorIndex::empty(DistanceMetric::Cosine);
    assert!(empty.is_empty());
    assert!(empty.search(&[1.0], 3).expect("empty index").is_empty());

    let built_empty =
        VectorIndex::build(Vec::new(), &TableEmbedder, DistanceMetric::L2).expect("empty build");
    assert!(built_empty.is_empty());
}

#[test]
fn handle_swap_bumps_generation_and_keeps_old_snapshots() {
    let first = VectorIndex::build(chunks(&["origin"]), &TableEmbedder, DistanceMetric::L2)
        .expect("index should build");
    let second = VectorIndex::build(chunks(&["east", "north"]), &TableEmbedder, DistanceMetric::L2)
        .expect("index should build");

    let handle = IndexHandle::new(first);
    assert_eq!(handle.generation(), 1);

    let before = handle.snapshot();
    let generation = handle.swap(second);

    assert_eq!(generation, 2);
    assert_eq!(handle.generation(), 2);
    assert_eq!(before.len(), 1);
    assert_eq!(handle.snapshot().len(), 2);
}
