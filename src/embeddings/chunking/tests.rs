use super::*;

fn sample_documents() -> Vec<Document> {
    vec![
        Document::new("docs/sky.txt", "The sky is blue. The grass is green."),
        Document::new("docs/manual.pdf", "Press and hold the power button for ten seconds.")
            .with_page(3),
    ]
}

#[test]
fn sky_document_windows() {
    let config = ChunkingConfig::new(20, 5);
    let windows = split_text("The sky is blue. The grass is green.", &config);

    assert_eq!(
        windows,
        vec!["The sky is blue. The", ". The grass is green", "green."]
            .into_iter()
            .map(String::from)
            .collect::<Vec<_>>()
    );
    assert!(windows[0].contains("sky is blue"));
}

#[test]
fn chunk_count_matches_formula() {
    for (chunk_size, chunk_overlap) in [(20, 5), (10, 0), (7, 6), (100, 20), (3, 1)] {
        let config = ChunkingConfig::new(chunk_size, chunk_overlap);
        for len in 1..=250 {
            let text = "x".repeat(len);
            let windows = split_text(&text, &config);

            let expected = if len <= chunk_size {
                1
            } else {
                (len - chunk_overlap).div_ceil(chunk_size - chunk_overlap)
            };
            assert_eq!(
                windows.len(),
                expected,
                "len {len}, size {chunk_size}, overlap {chunk_overlap}"
            );
            assert_eq!(expected_chunk_count(len, &config), expected);
        }
    }
}

#[test]
fn consecutive_windows_overlap() {
    let config = ChunkingConfig::new(12, 4);
    let text: String = ('a'..='z').cycle().take(70).collect();
    let windows = split_text(&text, &config);

    for pair in windows.windows(2) {
        let prev: Vec<char> = pair[0].chars().collect();
        let next: Vec<char> = pair[1].chars().collect();
        assert_eq!(prev.len(), 12);
        assert_eq!(&prev[prev.len() - 4..], &next[..4]);
    }
    assert!(windows.iter().all(|w| w.chars().count() <= 12));

    // Reassembling without the overlaps restores the text
    let mut rebuilt: String = windows[0].clone();
    for window in &windows[1..] {
        rebuilt.extend(window.chars().skip(4));
    }
    assert_eq!(rebuilt, text);
}

#[test]
fn short_text_is_single_chunk() {
    let config = ChunkingConfig::new(800, 120);
    let windows = split_text("Reboot the router.", &config);
    assert_eq!(windows, vec!["Reboot the router.".to_string()]);
}

#[test]
fn multibyte_characters_are_not_split() {
    let config = ChunkingConfig::new(4, 1);
    let windows = split_text("héllo wörld ✓✓", &config);

    assert!(windows.iter().all(|w| w.chars().count() <= 4));
    assert_eq!(windows[0], "héll");
    assert_eq!(windows[1], "lo w");
}

#[test]
fn blank_documents_produce_no_chunks() {
    let config = ChunkingConfig::default();
    assert!(split_text("", &config).is_empty());
    assert!(split_text("   \n\t", &config).is_empty());
}

#[test]
fn empty_document_list() {
    let chunks = split_documents(&[], &ChunkingConfig::default()).expect("should split");
    assert!(chunks.is_empty());
}

#[test]
fn metadata_is_preserved() {
    let config = ChunkingConfig::new(20, 5);
    let chunks = split_documents(&sample_documents(), &config).expect("should split");

    let sky: Vec<_> = chunks
        .iter()
        .filter(|c| c.source == PathBuf::from("docs/sky.txt"))
        .collect();
    assert_eq!(sky.len(), 3);
    assert!(sky.iter().all(|c| c.page.is_none()));
    assert_eq!(
        sky.iter().map(|c| c.chunk_index).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );

    let manual: Vec<_> = chunks
        .iter()
        .filter(|c| c.source == PathBuf::from("docs/manual.pdf"))
        .collect();
    assert!(!manual.is_empty());
    assert!(manual.iter().all(|c| c.page == Some(3)));
    assert_eq!(manual[0].chunk_index, 0);
}

#[test]
fn splitting_is_deterministic() {
    let config = ChunkingConfig::new(20, 5);
    let first = split_documents(&sample_documents(), &config).expect("should split");
    let second = split_documents(&sample_documents(), &config).expect("should split");
    assert_eq!(first, second);
}

#[test]
fn invalid_config_is_rejected() {
    let docs = sample_documents();
    assert!(matches!(
        split_documents(&docs, &ChunkingConfig::new(10, 10)),
        Err(AssistError::Config(_))
    ));
    assert!(matches!(
        split_documents(&docs, &ChunkingConfig::new(0, 0)),
        Err(AssistError::Config(_))
    ));
}
