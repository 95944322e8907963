/*!
 * Tests for structure-aware chunking
 */

use epubtrans::translation::chunker::split_segments;
use epubtrans::translation::{LocaleAttributes, MarkupChunker, reassemble};

use crate::common::xhtml_chapter;

fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn body_of(paragraphs: usize, words: usize) -> String {
    (0..paragraphs)
        .map(|i| format!("<p>{}</p>\n", vec![format!("w{}", i); words].join(" ")))
        .collect()
}

#[test]
fn test_split_acrossSizes_shouldReconstructBody() {
    let body = body_of(40, 7);
    for max in [1, 10, 50, 120, 400, 10_000] {
        let chunks = MarkupChunker::new(max).split_body(&body);
        assert_eq!(normalize(&chunks.join(" ")), normalize(&body), "max = {}", max);
    }
}

#[test]
fn test_split_acrossSizes_shouldRespectLimitUnlessSingleSegment() {
    let body = format!("{}<div>{}</div>\n{}", body_of(10, 3), "x".repeat(300), body_of(10, 12));
    for max in [30, 80, 200] {
        let chunker = MarkupChunker::new(max);
        for chunk in chunker.split_body(&body) {
            let oversized = chunk.chars().count() > max;
            assert!(
                !oversized || split_segments(&chunk).len() == 1,
                "chunk of {} chars exceeds {} with several segments",
                chunk.chars().count(),
                max
            );
        }
    }
}

#[test]
fn test_split_withLongBodyAndOneSplitPoint_shouldYieldTwoChunks() {
    let first = format!("<p>{}</p>", "a".repeat(9000 - 7));
    let second = format!("<p>{}</p>", "b".repeat(20000 - 9000 - 1 - 7));
    let body = format!("{}\n{}", first, second);
    assert_eq!(body.chars().count(), 20000);

    let chunks = MarkupChunker::new(14000).split_body(&body);

    assert_eq!(chunks.len(), 2);
    assert!(chunks[0].chars().count() <= 14000);
    assert_eq!(chunks[0], first);
    assert_eq!(chunks[1], second);
}

#[test]
fn test_split_withTagsWithoutWhitespace_shouldNotCut() {
    let body = "<p>one</p><p>two</p>";
    assert_eq!(split_segments(body), vec![body]);
}

#[test]
fn test_split_withoutBody_shouldTreatWholeFileAsOneChunk() {
    let markup = "<svg><text>Title page</text></svg>";
    let chunked = MarkupChunker::new(5).split(markup);

    assert!(!chunked.has_structural_skeleton());
    assert_eq!(chunked.chunks, vec![markup.to_string()]);
}

#[test]
fn test_reassemble_withoutTranslation_shouldRoundTripChapter() {
    let chapter = xhtml_chapter("One", &["Hello there.", "General Kenobi.", "You are a bold one."]);
    let chunked = MarkupChunker::new(30).split(&chapter);
    assert!(chunked.chunks.len() > 1);

    let locale = LocaleAttributes::for_language("ar");
    let rebuilt = reassemble(chunked.skeleton.as_ref(), &chunked.chunks, &locale);

    let body = |markup: &str| normalize(markup.split("<body>").nth(1).unwrap_or_default());
    assert_eq!(body(&rebuilt), body(&chapter));
    assert!(rebuilt.contains(r#"dir="rtl""#));
    assert!(rebuilt.contains(r#"lang="ar""#));
}
