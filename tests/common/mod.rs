/*!
 * Common test utilities for the epubtrans test suite
 */

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use epubtrans::app_config::SchedulingMode;
use epubtrans::archive::{Archive, Chapter};
use epubtrans::errors::ArchiveError;
use epubtrans::events::EventLog;
use epubtrans::pipeline::{Pipeline, PipelineSettings};
use epubtrans::providers::mock::MockProvider;
use epubtrans::store::{CachedChunk, ChunkStore, MemoryStore, ProgressRecord, ProgressStore, StateStore, StoreStats};
use epubtrans::translation::{CredentialPool, PromptTemplate, RetryPolicy, RetryingTranslator, TranslationClient};

/// Keys handed to every test translator
pub const TEST_KEYS: [&str; 3] = ["key-a", "key-b", "key-c"];

/// XHTML chapter whose body holds one `<p>` per paragraph, one per line
pub fn xhtml_chapter(title: &str, paragraphs: &[&str]) -> String {
    let body: String = paragraphs.iter().map(|p| format!("<p>{}</p>\n", p)).collect();
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<html xmlns="http://www.w3.org/1999/xhtml" lang="en" xml:lang="en">
<head><title>{}</title></head>
<body>
{}</body>
</html>"#,
        title, body
    )
}

/// Archive of named chapters held in memory, in insertion order
#[derive(Debug, Clone)]
pub struct MemoryArchive {
    order: Vec<String>,
    pub chapters: HashMap<String, String>,
    pub writes: Vec<String>,
}

impl MemoryArchive {
    pub fn new(chapters: &[(&str, String)]) -> Self {
        Self {
            order: chapters.iter().map(|(path, _)| path.to_string()).collect(),
            chapters: chapters.iter().map(|(path, markup)| (path.to_string(), markup.clone())).collect(),
            writes: Vec::new(),
        }
    }

    pub fn chapter(&self, path: &str) -> &str {
        &self.chapters[path]
    }
}

impl Archive for MemoryArchive {
    fn list_chapters(&self) -> Vec<Chapter> {
        self.order
            .iter()
            .enumerate()
            .map(|(order, path)| Chapter {
                path: path.clone(),
                href: path.clone(),
                order,
            })
            .collect()
    }

    fn read_chapter(&self, path: &str) -> Result<String, ArchiveError> {
        self.chapters
            .get(path)
            .cloned()
            .ok_or_else(|| ArchiveError::MissingEntry(path.to_string()))
    }

    fn write_chapter(&mut self, path: &str, markup: String) -> Result<(), ArchiveError> {
        self.writes.push(path.to_string());
        self.chapters.insert(path.to_string(), markup);
        Ok(())
    }

    fn finalize(&self) -> Result<Vec<u8>, ArchiveError> {
        let joined: Vec<&str> = self.order.iter().map(|p| self.chapters[p].as_str()).collect();
        Ok(joined.join("\n").into_bytes())
    }
}

/// State store that fails every chunk write from the `fail_at`-th on
pub struct CrashingStore {
    inner: Arc<MemoryStore>,
    puts: AtomicUsize,
    fail_at: usize,
}

impl CrashingStore {
    pub fn new(inner: Arc<MemoryStore>, fail_at: usize) -> Self {
        Self {
            inner,
            puts: AtomicUsize::new(0),
            fail_at,
        }
    }
}

#[async_trait]
impl ChunkStore for CrashingStore {
    async fn get_chunk(&self, key: &str) -> Result<Option<CachedChunk>> {
        self.inner.get_chunk(key).await
    }

    async fn put_chunk(&self, key: &str, chunk: &CachedChunk) -> Result<()> {
        let n = self.puts.fetch_add(1, Ordering::SeqCst) + 1;
        if n >= self.fail_at {
            anyhow::bail!("simulated crash while writing {}", key);
        }
        self.inner.put_chunk(key, chunk).await
    }
}

#[async_trait]
impl ProgressStore for CrashingStore {
    async fn load_progress(&self) -> Result<Option<ProgressRecord>> {
        self.inner.load_progress().await
    }

    async fn save_progress(&self, record: &ProgressRecord) -> Result<()> {
        self.inner.save_progress(record).await
    }
}

#[async_trait]
impl StateStore for CrashingStore {
    async fn clear_all(&self) -> Result<()> {
        self.inner.clear_all().await
    }

    async fn stats(&self) -> Result<StoreStats> {
        self.inner.stats().await
    }
}

/// Pipeline settings for tests
pub fn test_settings(max_concurrency: usize, max_chunk_size: usize) -> PipelineSettings {
    PipelineSettings {
        model: "test-model".to_string(),
        max_concurrency,
        max_chunk_size,
        scheduling: SchedulingMode::Batched,
        cache_fallbacks: true,
        target_language: "ar".to_string(),
    }
}

/// Translator over `provider` with the test keys and no waits between attempts
pub fn test_translator(provider: Arc<MockProvider>, max_retries: u32, events: EventLog) -> RetryingTranslator {
    let client = TranslationClient::new(
        provider,
        PromptTemplate::new("English", "Arabic"),
        Duration::from_secs(5),
    );
    let pool = CredentialPool::new(TEST_KEYS).expect("test keys are valid");
    RetryingTranslator::new(client, Arc::new(pool), RetryPolicy::immediate(max_retries), events)
}

/// Pipeline over `store` with the given settings
pub fn test_pipeline<S>(provider: Arc<MockProvider>, store: Arc<S>, settings: PipelineSettings) -> Pipeline
where
    S: StateStore + 'static,
{
    let events = EventLog::new();
    Pipeline::new(test_translator(provider, 3, events.clone()), store, settings, events)
}

/// Minimal EPUB: `chapters` are (file name under OEBPS, markup) in spine order
pub fn build_epub(chapters: &[(&str, String)]) -> Vec<u8> {
    let container = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

    let manifest: String = chapters
        .iter()
        .enumerate()
        .map(|(i, (name, _))| {
            format!(
                r#"    <item id="ch{}" href="{}" media-type="application/xhtml+xml"/>
"#,
                i, name
            )
        })
        .collect();
    let spine: String = (0..chapters.len())
        .map(|i| format!("    <itemref idref=\"ch{}\"/>\n", i))
        .collect();
    let package = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0">
  <manifest>
    <item id="css" href="style.css" media-type="text/css"/>
{}  </manifest>
  <spine>
{}  </spine>
</package>"#,
        manifest, spine
    );

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let stored = FileOptions::default().compression_method(CompressionMethod::Stored);
    let deflated = FileOptions::default().compression_method(CompressionMethod::Deflated);

    writer.start_file("mimetype", stored).expect("zip write");
    writer.write_all(b"application/epub+zip").expect("zip write");
    writer.start_file("META-INF/container.xml", deflated).expect("zip write");
    writer.write_all(container.as_bytes()).expect("zip write");
    writer.start_file("OEBPS/content.opf", deflated).expect("zip write");
    writer.write_all(package.as_bytes()).expect("zip write");
    writer.start_file("OEBPS/style.css", deflated).expect("zip write");
    writer.write_all(b"p { margin: 0 }").expect("zip write");
    for (name, markup) in chapters {
        writer.start_file(format!("OEBPS/{}", name), deflated).expect("zip write");
        writer.write_all(markup.as_bytes()).expect("zip write");
    }

    writer.finish().expect("zip finish").into_inner()
}
