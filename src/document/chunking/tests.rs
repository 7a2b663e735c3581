use super::*;
use crate::document::extractor::page_marker;

fn paged_text(pages: &[&str]) -> String {
    pages
        .iter()
        .enumerate()
        .map(|(i, page)| format!("\n{}\n{}", page_marker(i as u32 + 1), page))
        .collect()
}

fn words(count: usize) -> String {
    (0..count).map(|i| format!("word{:05}", i)).join(" ")
}

#[test]
fn normalize_whitespace_collapses_runs() {
    assert_eq!(
        normalize_whitespace("  hello \n\n\t world  \r\n again "),
        "hello world again"
    );
    assert_eq!(normalize_whitespace(" \n\t "), "");
}

#[test]
fn empty_input_produces_no_chunks() {
    let config = ChunkingConfig::default();
    assert!(chunk_text("", "empty.pdf", &config).is_empty());
    assert!(chunk_text("   \n  ", "empty.pdf", &config).is_empty());
}

#[test]
fn short_page_is_a_single_chunk() {
    let config = ChunkingConfig::default();
    let text = paged_text(&["  A short   first page.  "]);

    let chunks = chunk_text(&text, "short.pdf", &config);

    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].content, "A short first page.");
    assert_eq!(
        chunks[0].metadata,
        ChunkMetadata {
            filename: "short.pdf".to_string(),
            page: Some(1),
            chunk_id: 0,
            sub_chunk: None,
        }
    );
}

#[test]
fn page_exactly_at_chunk_size_is_not_split() {
    let config = ChunkingConfig {
        chunk_size: 100,
        chunk_overlap: 0,
    };
    let body = "x".repeat(100);
    let chunks = chunk_text(&paged_text(&[&body]), "edge.pdf", &config);

    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].metadata.sub_chunk, None);
}

#[test]
fn long_page_is_split_into_word_windows() {
    let config = ChunkingConfig::default();
    // 250 nine-character words, far over 1000 characters, 100 words per window
    let text = paged_text(&[&words(250)]);

    let chunks = chunk_text(&text, "long.pdf", &config);

    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks[0].content.split(' ').count(), 100);
    assert_eq!(chunks[1].content.split(' ').count(), 100);
    assert_eq!(chunks[2].content.split(' ').count(), 50);

    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.metadata.page, Some(1));
        assert_eq!(chunk.metadata.sub_chunk, Some(i as u32));
    }
}

#[test]
fn split_count_is_ceiling_of_words_over_window() {
    let config = ChunkingConfig {
        chunk_size: 200,
        chunk_overlap: 0,
    };

    for word_count in [21, 40, 41, 99, 100, 101] {
        let chunks = chunk_text(&paged_text(&[&words(word_count)]), "n.pdf", &config);
        assert_eq!(
            chunks.len(),
            word_count.div_ceil(config.window_words()),
            "word count {}",
            word_count
        );
    }
}

#[test]
fn chunk_ids_are_contiguous_across_pages() {
    let config = ChunkingConfig::default();
    let long = words(300);
    let text = paged_text(&["first page", &long, "third page", &long]);

    let chunks = chunk_text(&text, "doc.pdf", &config);

    let ids = chunks.iter().map(|c| c.metadata.chunk_id).collect::<Vec<_>>();
    let expected = (0..chunks.len() as u32).collect::<Vec<_>>();
    assert_eq!(ids, expected);
}

#[test]
fn sub_chunk_restarts_on_each_page() {
    let config = ChunkingConfig::default();
    let long = words(150);
    let text = paged_text(&[&long, &long]);

    let chunks = chunk_text(&text, "doc.pdf", &config);

    let tags = chunks
        .iter()
        .map(|c| (c.metadata.page, c.metadata.sub_chunk))
        .collect::<Vec<_>>();
    assert_eq!(
        tags,
        vec![
            (Some(1), Some(0)),
            (Some(1), Some(1)),
            (Some(2), Some(0)),
            (Some(2), Some(1)),
        ]
    );
}

#[test]
fn three_page_document_with_long_middle_page() {
    let config = ChunkingConfig::default();
    let middle = words(300);
    let text = paged_text(&["Introduction page.", &middle, "Closing page."]);

    let chunks = chunk_text(&text, "report.pdf", &config);

    assert_eq!(chunks.len(), 5);
    assert_eq!(chunks[0].metadata.page, Some(1));
    assert_eq!(chunks[0].metadata.sub_chunk, None);
    for (i, chunk) in chunks[1..4].iter().enumerate() {
        assert_eq!(chunk.metadata.page, Some(2));
        assert_eq!(chunk.metadata.sub_chunk, Some(i as u32));
    }
    assert_eq!(chunks[4].metadata.page, Some(3));
    assert_eq!(chunks[4].content, "Closing page.");
}

#[test]
fn chunks_preserve_every_non_whitespace_character() {
    let config = ChunkingConfig {
        chunk_size: 120,
        chunk_overlap: 0,
    };
    let pages = [
        "Alpha beta, gamma! Δelta ε.",
        "A much longer page: lorem ipsum dolor sit amet, consectetur adipiscing elit, sed do \
         eiusmod tempor incididunt ut labore et dolore magna aliqua. Ut enim ad minim veniam, \
         quis nostrud exercitation ullamco laboris nisi ut aliquip ex ea commodo consequat.",
        "   trailing\tpage\n\nwith   gaps ",
    ];

    let chunks = chunk_text(&paged_text(&pages), "lossless.pdf", &config);

    let strip = |s: &str| s.chars().filter(|c| !c.is_whitespace()).collect::<String>();
    let reconstructed = strip(&chunks.iter().map(|c| c.content.as_str()).join(""));
    let original = strip(&pages.join(""));
    assert_eq!(reconstructed, original);
}

#[test]
fn unparseable_page_header_falls_back_to_position() {
    let config = ChunkingConfig::default();
    let text = "--- Page 1 --- first --- Page two --- second";

    let chunks = chunk_text(text, "odd.pdf", &config);

    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].metadata.page, Some(1));
    assert_eq!(chunks[1].metadata.page, Some(2));
    assert_eq!(chunks[1].content, "two --- second");
}

#[test]
fn text_before_first_marker_is_page_zero() {
    let config = ChunkingConfig::default();
    let text = format!("preamble{}", paged_text(&["body"]));

    let chunks = chunk_text(&text, "pre.pdf", &config);

    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].content, "preamble");
    assert_eq!(chunks[0].metadata.page, Some(0));
    assert_eq!(chunks[1].metadata.page, Some(1));
}

#[test]
fn blank_pages_are_skipped() {
    let config = ChunkingConfig::default();
    let text = paged_text(&["first", "   ", "third"]);

    let chunks = chunk_text(&text, "blank.pdf", &config);

    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[1].metadata.page, Some(3));
    assert_eq!(chunks[1].metadata.chunk_id, 1);
}

#[test]
fn overlap_repeats_trailing_words() {
    let config = ChunkingConfig {
        chunk_size: 100,
        chunk_overlap: 3,
    };
    let text = paged_text(&[&words(24)]);

    let chunks = chunk_text(&text, "overlap.pdf", &config);

    // window 10, step 7: [0..10], [7..17], [14..24]
    assert_eq!(chunks.len(), 3);
    let first = chunks[0].content.split(' ').collect::<Vec<_>>();
    let second = chunks[1].content.split(' ').collect::<Vec<_>>();
    assert_eq!(first[7..], second[..3]);
    assert!(chunks[2].content.ends_with("word00023"));
}
