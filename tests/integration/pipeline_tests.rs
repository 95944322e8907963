/*!
 * Integration tests for the resumable chapter pipeline.
 *
 * Every test runs the whole pipeline over an in-memory archive with a
 * scripted provider, checking remote calls, cache contents and progress.
 */

use std::sync::Arc;

use epubtrans::app_config::SchedulingMode;
use epubtrans::errors::PipelineError;
use epubtrans::pipeline::PipelineState;
use epubtrans::providers::mock::{MockLatency, MockProvider};
use epubtrans::store::{MemoryStore, ProgressRecord, ProgressStore, StateStore};
use epubtrans::translation::ChunkKey;

use crate::common::{CrashingStore, MemoryArchive, test_pipeline, test_settings, xhtml_chapter};

/// Paragraph length keeps exactly one paragraph per chunk at this limit
const ONE_PARAGRAPH_PER_CHUNK: usize = 30;

fn two_chapter_book() -> MemoryArchive {
    MemoryArchive::new(&[
        (
            "OEBPS/ch1.xhtml",
            xhtml_chapter("One", &["Paragraph number one.", "Paragraph number two.", "Paragraph number six."]),
        ),
        ("OEBPS/ch2.xhtml", xhtml_chapter("Two", &["The only paragraph."])),
    ])
}

#[tokio::test]
async fn test_run_withTwoChapters_shouldBatchChunksAndFinishAtChapterTwo() {
    let provider = Arc::new(MockProvider::working().with_latency(MockLatency::Fixed { delay_ms: 10 }));
    let store = Arc::new(MemoryStore::new());
    let pipeline = test_pipeline(provider.clone(), store.clone(), test_settings(2, ONE_PARAGRAPH_PER_CHUNK));
    let mut archive = two_chapter_book();

    let summary = pipeline.run(&mut archive, "book.epub").await.unwrap();

    assert_eq!(summary.chunks.translated, 4);
    assert_eq!(provider.request_count(), 4);
    assert_eq!(provider.max_in_flight(), 2);

    let texts: Vec<String> = provider.calls().into_iter().map(|c| c.text).collect();
    assert_eq!(
        texts,
        vec![
            "\n<p>Paragraph number one.</p>",
            "<p>Paragraph number two.</p>",
            "<p>Paragraph number six.</p>",
            "\n<p>The only paragraph.</p>",
        ]
    );

    assert_eq!(
        store.load_progress().await.unwrap(),
        Some(ProgressRecord::new("book.epub", 2))
    );
    assert_eq!(
        store.chunk_keys(),
        vec![
            "OEBPS/ch1.xhtml_chk_0",
            "OEBPS/ch1.xhtml_chk_1",
            "OEBPS/ch1.xhtml_chk_2",
            "OEBPS/ch2.xhtml_chk_0",
        ]
    );

    let chapter = archive.chapter("OEBPS/ch1.xhtml");
    assert!(chapter.contains(r#"dir="rtl""#));
    assert!(chapter.contains("[TRANSLATED] <p>Paragraph number two.</p>"));
    assert_eq!(pipeline.state(), PipelineState::Completed);
}

#[tokio::test]
async fn test_run_afterCrashMidChapter_shouldResumeAtLastCompletedChapter() {
    let memory = Arc::new(MemoryStore::new());
    let book = MemoryArchive::new(&[
        ("OEBPS/ch1.xhtml", xhtml_chapter("One", &["Paragraph number one.", "Paragraph number two."])),
        (
            "OEBPS/ch2.xhtml",
            xhtml_chapter("Two", &["Paragraph number three.", "Paragraph number four.", "Paragraph number five."]),
        ),
    ]);

    // Chunk writes 1 and 2 finish chapter one; write 4 fails inside chapter two
    let crashing = Arc::new(CrashingStore::new(memory.clone(), 4));
    let first_provider = Arc::new(MockProvider::working());
    let first = test_pipeline(first_provider, crashing, test_settings(2, ONE_PARAGRAPH_PER_CHUNK));
    let mut archive = book.clone();

    let result = first.run(&mut archive, "book.epub").await;

    assert!(matches!(result, Err(PipelineError::Store(_))));
    assert_eq!(first.state(), PipelineState::Failed);
    assert_eq!(
        memory.load_progress().await.unwrap(),
        Some(ProgressRecord::new("book.epub", 1))
    );
    assert_eq!(memory.chunk_count(), 3);

    let second_provider = Arc::new(MockProvider::working());
    let second = test_pipeline(second_provider.clone(), memory.clone(), test_settings(2, ONE_PARAGRAPH_PER_CHUNK));
    let mut archive = book.clone();

    let summary = second.run(&mut archive, "book.epub").await.unwrap();

    assert_eq!(summary.resumed_from, 1);
    assert_eq!(summary.chunks.cached, 3);
    assert_eq!(summary.chunks.translated, 2);
    assert_eq!(second_provider.request_count(), 2);
    assert!(
        archive
            .chapter("OEBPS/ch1.xhtml")
            .contains("[TRANSLATED] <p>Paragraph number two.</p>"),
        "completed chapters are rebuilt from the cache"
    );
    assert_eq!(
        memory.load_progress().await.unwrap(),
        Some(ProgressRecord::new("book.epub", 2))
    );
}

#[tokio::test]
async fn test_run_withStoreFailingFromFirstWrite_shouldStopSendingChunks() {
    for scheduling in [SchedulingMode::Batched, SchedulingMode::Sliding] {
        let memory = Arc::new(MemoryStore::new());
        let crashing = Arc::new(CrashingStore::new(memory.clone(), 1));
        let provider = Arc::new(MockProvider::working());
        let mut settings = test_settings(1, ONE_PARAGRAPH_PER_CHUNK);
        settings.scheduling = scheduling;
        let pipeline = test_pipeline(provider.clone(), crashing, settings);
        let mut archive = MemoryArchive::new(&[(
            "OEBPS/ch1.xhtml",
            xhtml_chapter(
                "One",
                &[
                    "Paragraph number one.",
                    "Paragraph number two.",
                    "Paragraph number three.",
                    "Paragraph number four.",
                    "Paragraph number five.",
                ],
            ),
        )]);

        let result = pipeline.run(&mut archive, "book.epub").await;

        assert!(matches!(result, Err(PipelineError::Store(_))), "{:?}", scheduling);
        assert_eq!(provider.request_count(), 1, "{:?}", scheduling);
        assert_eq!(memory.chunk_count(), 0);
        assert!(archive.writes.is_empty());
        assert_eq!(memory.load_progress().await.unwrap(), None);
    }
}

#[tokio::test]
async fn test_run_withCachedChunks_shouldMakeNoRemoteCalls() {
    let store = Arc::new(MemoryStore::new());
    let first = test_pipeline(
        Arc::new(MockProvider::working()),
        store.clone(),
        test_settings(2, ONE_PARAGRAPH_PER_CHUNK),
    );
    let mut translated = two_chapter_book();
    first.run(&mut translated, "book.epub").await.unwrap();

    // Another identity forces a full pass from chapter zero
    let provider = Arc::new(MockProvider::working());
    let second = test_pipeline(provider.clone(), store.clone(), test_settings(2, ONE_PARAGRAPH_PER_CHUNK));
    let mut archive = two_chapter_book();

    let summary = second.run(&mut archive, "renamed.epub").await.unwrap();

    assert_eq!(summary.resumed_from, 0);
    assert_eq!(summary.chunks.cached, 4);
    assert_eq!(provider.request_count(), 0);
    assert_eq!(archive.chapters, translated.chapters);
}

#[tokio::test]
async fn test_run_withChangedChunkSize_shouldNotReuseStaleEntries() {
    let store = Arc::new(MemoryStore::new());
    let first = test_pipeline(
        Arc::new(MockProvider::working()),
        store.clone(),
        test_settings(2, ONE_PARAGRAPH_PER_CHUNK),
    );
    first.run(&mut two_chapter_book(), "book.epub").await.unwrap();

    let provider = Arc::new(MockProvider::working());
    let second = test_pipeline(provider.clone(), store.clone(), test_settings(2, 14000));
    let mut archive = two_chapter_book();

    let summary = second.run(&mut archive, "other.epub").await.unwrap();

    assert_eq!(summary.chunks.cached, 0);
    assert_eq!(provider.request_count(), 2);
    assert_eq!(second.cache().stats().2, 2);
}

#[tokio::test]
async fn test_clearAll_thenRun_shouldStartOverWithFreshCalls() {
    let store = Arc::new(MemoryStore::new());
    let first = test_pipeline(
        Arc::new(MockProvider::working()),
        store.clone(),
        test_settings(2, ONE_PARAGRAPH_PER_CHUNK),
    );
    first.run(&mut two_chapter_book(), "book.epub").await.unwrap();

    store.clear_all().await.unwrap();
    let stats = store.stats().await.unwrap();
    assert_eq!(stats.chunk_count, 0);
    assert!(stats.progress.is_none());

    let provider = Arc::new(MockProvider::working());
    let second = test_pipeline(provider.clone(), store.clone(), test_settings(2, ONE_PARAGRAPH_PER_CHUNK));
    let summary = second.run(&mut two_chapter_book(), "book.epub").await.unwrap();

    assert_eq!(summary.resumed_from, 0);
    assert_eq!(provider.request_count(), 4);
}

#[tokio::test]
async fn test_run_withFallbacksCached_shouldNotRetryThemOnResume() {
    let store = Arc::new(MemoryStore::new());
    let failing = test_pipeline(
        Arc::new(MockProvider::failing()),
        store.clone(),
        test_settings(2, ONE_PARAGRAPH_PER_CHUNK),
    );
    let summary = failing.run(&mut two_chapter_book(), "book.epub").await.unwrap();
    assert_eq!(summary.chunks.fallbacks, 4);
    assert_eq!(store.stats().await.unwrap().fallback_count, 4);

    let provider = Arc::new(MockProvider::working());
    let rerun = test_pipeline(provider.clone(), store.clone(), test_settings(2, ONE_PARAGRAPH_PER_CHUNK));
    let mut archive = two_chapter_book();
    rerun.run(&mut archive, "book.epub").await.unwrap();

    assert_eq!(provider.request_count(), 0);
    assert!(!archive.chapter("OEBPS/ch2.xhtml").contains("[TRANSLATED]"));
}

#[tokio::test]
async fn test_run_withFallbacksNotCached_shouldRetryThemOnResume() {
    let mut settings = test_settings(2, ONE_PARAGRAPH_PER_CHUNK);
    settings.cache_fallbacks = false;

    let store = Arc::new(MemoryStore::new());
    let failing = test_pipeline(Arc::new(MockProvider::failing()), store.clone(), settings.clone());
    failing.run(&mut two_chapter_book(), "book.epub").await.unwrap();
    assert_eq!(store.chunk_count(), 0);

    let provider = Arc::new(MockProvider::working());
    let rerun = test_pipeline(provider.clone(), store.clone(), settings);
    let mut archive = two_chapter_book();
    let summary = rerun.run(&mut archive, "book.epub").await.unwrap();

    assert_eq!(summary.resumed_from, 2);
    assert_eq!(provider.request_count(), 4);
    assert!(archive.chapter("OEBPS/ch2.xhtml").contains("[TRANSLATED]"));
}

#[tokio::test]
async fn test_run_withVariableLatency_shouldKeepChunkOrderInChapter() {
    let provider = Arc::new(
        MockProvider::working().with_latency(MockLatency::Decreasing { start_ms: 40, step_ms: 10 }),
    );
    let store = Arc::new(MemoryStore::new());
    let mut settings = test_settings(3, ONE_PARAGRAPH_PER_CHUNK);
    settings.scheduling = epubtrans::app_config::SchedulingMode::Sliding;
    let pipeline = test_pipeline(provider, store, settings);
    let mut archive = two_chapter_book();

    pipeline.run(&mut archive, "book.epub").await.unwrap();

    let chapter = archive.chapter("OEBPS/ch1.xhtml");
    let one = chapter.find("number one").unwrap();
    let two = chapter.find("number two").unwrap();
    let six = chapter.find("number six").unwrap();
    assert!(one < two && two < six);
}

#[tokio::test]
async fn test_cacheKey_shouldUsePersistedLayout() {
    assert_eq!(ChunkKey::new("OEBPS/ch1.xhtml", 3).as_str(), "OEBPS/ch1.xhtml_chk_3");
}
