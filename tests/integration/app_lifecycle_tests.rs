/*!
 * Integration tests for the controller: real EPUB files on disk, the SQLite
 * state store and a scripted provider.
 */

use std::path::Path;
use std::sync::Arc;

use epubtrans::app_config::Config;
use epubtrans::app_controller::{Controller, FileOutcome, FolderSummary, ISSUES_LOG_FILE};
use epubtrans::archive::{Archive, EpubArchive};
use epubtrans::database::{DatabaseConnection, Repository};
use epubtrans::providers::mock::MockProvider;
use epubtrans::store::ProgressRecord;

use crate::common::{TEST_KEYS, build_epub, xhtml_chapter};

fn test_config() -> Config {
    let mut config = Config::default();
    config.translation.api_keys = TEST_KEYS.iter().map(|k| k.to_string()).collect();
    config.translation.max_chunk_size = 40;
    config.translation.max_retries = 2;
    config.translation.rate_limit_backoff_ms = 0;
    config.translation.failure_backoff_ms = 0;
    config
}

fn controller(db_path: &Path, provider: Arc<MockProvider>) -> Controller {
    let repository = Repository::new(DatabaseConnection::open(db_path).unwrap());
    Controller::with_store(test_config(), Arc::new(repository)).with_provider(provider)
}

fn write_book(dir: &Path, name: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    let bytes = build_epub(&[
        ("ch1.xhtml", xhtml_chapter("One", &["It was a dark night.", "The wind howled."])),
        ("ch2.xhtml", xhtml_chapter("Two", &["Morning came."])),
    ]);
    std::fs::write(&path, bytes).unwrap();
    path
}

#[tokio::test]
async fn test_run_withEpubOnDisk_shouldWriteTranslatedBook() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_book(dir.path(), "novel.epub");
    let provider = Arc::new(MockProvider::working());
    let controller = controller(&dir.path().join("state.db"), provider.clone());

    let outcome = controller.run(input, dir.path().to_path_buf(), false).await.unwrap();

    let FileOutcome::Translated { output_path, chunks } = outcome else {
        panic!("expected a translated book");
    };
    assert_eq!(output_path, dir.path().join("novel_AR.epub"));
    assert_eq!(chunks.translated, 3);
    assert_eq!(provider.request_count(), 3);

    let book = EpubArchive::open(&output_path).unwrap();
    let chapter = book.read_chapter("OEBPS/ch1.xhtml").unwrap();
    assert!(chapter.contains(r#"lang="ar" xml:lang="ar" dir="rtl""#));
    assert!(chapter.contains("[TRANSLATED] <p>The wind howled.</p>"));
    assert!(chapter.contains("<title>One</title>"));

    let stats = controller.stats().await.unwrap();
    assert_eq!(stats.chunk_count, 3);
    assert_eq!(stats.progress, Some(ProgressRecord::new("novel.epub", 2)));
    assert!(!dir.path().join(ISSUES_LOG_FILE).exists());
}

#[tokio::test]
async fn test_run_twiceWithForce_shouldServeEverythingFromDatabase() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_book(dir.path(), "novel.epub");
    let db = dir.path().join("state.db");

    controller(&db, Arc::new(MockProvider::working()))
        .run(input.clone(), dir.path().to_path_buf(), false)
        .await
        .unwrap();

    let provider = Arc::new(MockProvider::working());
    let outcome = controller(&db, provider.clone())
        .run(input, dir.path().to_path_buf(), true)
        .await
        .unwrap();

    assert!(matches!(outcome, FileOutcome::Translated { chunks, .. } if chunks.cached == 3));
    assert_eq!(provider.request_count(), 0);
}

#[tokio::test]
async fn test_run_withFailingProvider_shouldWriteIssuesLog() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_book(dir.path(), "novel.epub");
    let controller = controller(&dir.path().join("state.db"), Arc::new(MockProvider::failing()));

    let outcome = controller.run(input, dir.path().to_path_buf(), false).await.unwrap();

    assert!(matches!(outcome, FileOutcome::Translated { chunks, .. } if chunks.fallbacks == 3));
    let log = std::fs::read_to_string(dir.path().join(ISSUES_LOG_FILE)).unwrap();
    assert!(log.contains("Translation issues - novel.epub"));
    assert!(log.contains("ERROR: Translation failed after 2 attempts"));
}

#[tokio::test]
async fn test_run_withBrokenEpub_shouldFailWithoutOutput() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("broken.epub");
    std::fs::write(&input, b"not a zip").unwrap();
    let controller = controller(&dir.path().join("state.db"), Arc::new(MockProvider::working()));

    let result = controller.run(input, dir.path().to_path_buf(), false).await;

    assert!(result.is_err());
    assert!(!dir.path().join("broken_AR.epub").exists());
}

#[tokio::test]
async fn test_runFolder_shouldTranslateSkipAndCountFailures() {
    let dir = tempfile::tempdir().unwrap();
    write_book(dir.path(), "a.epub");
    write_book(dir.path(), "b.epub");
    std::fs::write(dir.path().join("b_AR.epub"), b"already done").unwrap();
    std::fs::write(dir.path().join("c.epub"), b"not a zip").unwrap();
    let controller = controller(&dir.path().join("state.db"), Arc::new(MockProvider::working()));

    let summary = controller.run_folder(dir.path().to_path_buf(), false).await.unwrap();

    assert_eq!(
        summary,
        FolderSummary {
            processed: 1,
            skipped: 1,
            failed: 1
        }
    );
    assert!(dir.path().join("a_AR.epub").exists());
    let log = std::fs::read_to_string(dir.path().join(ISSUES_LOG_FILE)).unwrap();
    assert!(log.contains("1 processed, 1 skipped, 1 errors"));
}

#[tokio::test]
async fn test_clearState_shouldForgetProgressAndChunks() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_book(dir.path(), "novel.epub");
    let controller = controller(&dir.path().join("state.db"), Arc::new(MockProvider::working()));
    controller.run(input, dir.path().to_path_buf(), false).await.unwrap();

    controller.clear_state().await.unwrap();

    let stats = controller.stats().await.unwrap();
    assert_eq!(stats.chunk_count, 0);
    assert!(stats.progress.is_none());
}
