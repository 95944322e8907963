/*!
 * Resumable chapter pipeline.
 *
 * The pipeline drives one book through its chapters in spine order:
 * chunk, translate every chunk through the cache, reassemble, write the
 * chapter back and persist `next_chapter_index`. A failure anywhere other
 * than a single chunk's translation aborts the run and leaves the progress
 * record at the last completed chapter.
 *
 * Chapters before the resume point were completed by an earlier run. Their
 * chunks are all in the cache, so they are rebuilt from it without remote
 * calls and the final archive is complete.
 */

use anyhow::Result;
use log::debug;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

use crate::app_config::{Config, SchedulingMode};
use crate::archive::{Archive, Chapter};
use crate::errors::PipelineError;
use crate::events::EventLog;
use crate::language_utils;
use crate::providers::{self, Provider};
use crate::store::{ProgressRecord, ProgressStore, StateStore};
use crate::translation::{
    Chunk, ChunkCache, ConcurrencyLimitedBatcher, CredentialPool, LocaleAttributes, MarkupChunker, PromptTemplate,
    RetryPolicy, RetryingTranslator, TranslationClient, TranslationOutcome, reassemble,
};

/// Where a run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    /// Reading the progress record and rebuilding completed chapters
    Resuming,
    /// Chunking and translating chapter `i`
    PerChapter(usize),
    /// Putting chapter `i` back together
    Reassembling(usize),
    /// Recording that chapter `i` is done
    PersistingProgress(usize),
    Completed,
    Failed,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Settings the pipeline needs from the configuration
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Model identifier passed to the provider
    pub model: String,
    /// In-flight translation limit per chapter
    pub max_concurrency: usize,
    /// Maximum chunk size in characters
    pub max_chunk_size: usize,
    /// Chunk scheduling inside a chapter
    pub scheduling: SchedulingMode,
    /// Whether fallbacks are cached
    pub cache_fallbacks: bool,
    /// Target language code for the locale attributes
    pub target_language: String,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.translation.get_model(),
            max_concurrency: config.translation.max_concurrency,
            max_chunk_size: config.translation.max_chunk_size,
            scheduling: config.translation.scheduling,
            cache_fallbacks: config.translation.cache_fallbacks,
            target_language: config.target_language.clone(),
        }
    }
}

/// How a chunk's text was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkSource {
    Cached,
    Translated,
    Fallback,
}

/// Chunk counters of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkTally {
    /// Chunks translated by the service in this run
    pub translated: usize,
    /// Chunks served from the cache
    pub cached: usize,
    /// Chunks left untranslated after exhausting retries
    pub fallbacks: usize,
}

impl ChunkTally {
    fn record(&mut self, source: ChunkSource) {
        match source {
            ChunkSource::Cached => self.cached += 1,
            ChunkSource::Translated => self.translated += 1,
            ChunkSource::Fallback => self.fallbacks += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.translated + self.cached + self.fallbacks
    }
}

/// Result of a completed run
#[derive(Clone)]
pub struct RunSummary {
    /// Document identity used for the progress record
    pub document_name: String,
    /// Chapters in the book
    pub chapter_count: usize,
    /// Chapter index the run resumed from
    pub resumed_from: usize,
    /// Chunk counters
    pub chunks: ChunkTally,
    /// Serialized archive with every chapter replaced
    pub artifact: Vec<u8>,
}

impl fmt::Debug for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunSummary")
            .field("document_name", &self.document_name)
            .field("chapter_count", &self.chapter_count)
            .field("resumed_from", &self.resumed_from)
            .field("chunks", &self.chunks)
            .field("artifact_bytes", &self.artifact.len())
            .finish()
    }
}

/// Percent-complete callback: (percent, status text)
pub type ProgressCallback = Box<dyn Fn(u8, &str) + Send + Sync>;

/// Chapter-by-chapter translation driver
pub struct Pipeline {
    translator: RetryingTranslator,
    cache: ChunkCache,
    store: Arc<dyn StateStore>,
    batcher: ConcurrencyLimitedBatcher,
    chunker: MarkupChunker,
    locale: LocaleAttributes,
    model: String,
    events: EventLog,
    on_progress: Option<ProgressCallback>,
    state: Mutex<PipelineState>,
    transitions: Mutex<Vec<PipelineState>>,
}

impl Pipeline {
    /// Create a pipeline over `store`, which backs both the chunk cache and the progress record
    pub fn new<S>(translator: RetryingTranslator, store: Arc<S>, settings: PipelineSettings, events: EventLog) -> Self
    where
        S: StateStore + 'static,
    {
        let cache = ChunkCache::new(store.clone(), settings.max_chunk_size, settings.cache_fallbacks);

        Self {
            translator,
            cache,
            store,
            batcher: ConcurrencyLimitedBatcher::new(settings.max_concurrency, settings.scheduling),
            chunker: MarkupChunker::new(settings.max_chunk_size),
            locale: LocaleAttributes::for_language(&settings.target_language),
            model: settings.model,
            events,
            on_progress: None,
            state: Mutex::new(PipelineState::Idle),
            transitions: Mutex::new(vec![PipelineState::Idle]),
        }
    }

    /// Build the provider, credential pool and translator described by `config`
    pub fn from_config<S>(config: &Config, store: Arc<S>, events: EventLog) -> Result<Self>
    where
        S: StateStore + 'static,
    {
        let provider = providers::from_config(&config.translation);
        let translator = build_translator(config, provider, events.clone())?;
        Ok(Self::new(translator, store, PipelineSettings::from_config(config), events))
    }

    /// Report percent-complete through `callback`
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(u8, &str) + Send + Sync + 'static,
    {
        self.on_progress = Some(Box::new(callback));
        self
    }

    pub fn state(&self) -> PipelineState {
        *self.state.lock()
    }

    /// Every state entered so far, in order
    pub fn transitions(&self) -> Vec<PipelineState> {
        self.transitions.lock().clone()
    }

    pub fn cache(&self) -> &ChunkCache {
        &self.cache
    }

    /// Translate every chapter of `archive` and serialize the result
    ///
    /// `document_name` identifies the book in the progress record; a record
    /// for another document is ignored and overwritten.
    pub async fn run(&self, archive: &mut dyn Archive, document_name: &str) -> Result<RunSummary, PipelineError> {
        match self.run_chapters(archive, document_name).await {
            Ok(summary) => {
                self.transition(PipelineState::Completed);
                Ok(summary)
            }
            Err(error) => {
                self.transition(PipelineState::Failed);
                self.events.error(format!("Fatal error: {}", error));
                Err(error)
            }
        }
    }

    async fn run_chapters(&self, archive: &mut dyn Archive, document_name: &str) -> Result<RunSummary, PipelineError> {
        self.transition(PipelineState::Resuming);

        let chapters = archive.list_chapters();
        let total = chapters.len();
        let start = self.resume_point(document_name, total).await?;
        let mut tally = ChunkTally::default();

        if start > 0 {
            self.events.info(format!("Resuming from chapter {}/{}", start + 1, total));
            for chapter in &chapters[..start] {
                let chunks = self.translate_chapter(archive, chapter, None).await?;
                tally = merge(tally, chunks);
            }
        }

        for (i, chapter) in chapters.iter().enumerate().skip(start) {
            self.transition(PipelineState::PerChapter(i));
            self.report(
                percent(i, total),
                &format!("Translating chapter {}/{}: {}", i + 1, total, chapter.href),
            );

            let chunks = self.translate_chapter(archive, chapter, Some(i)).await?;
            tally = merge(tally, chunks);

            self.transition(PipelineState::PersistingProgress(i));
            self.store
                .save_progress(&ProgressRecord::new(document_name, i + 1))
                .await?;
            debug!("Chapter {} done, progress saved", chapter.path);
        }

        self.report(100, "Preparing the translated book");
        let artifact = archive.finalize()?;

        if tally.fallbacks > 0 {
            self.events.warning(format!(
                "{} chunk(s) were left untranslated after exhausting retries",
                tally.fallbacks
            ));
        }
        self.events.success(format!(
            "Translated {} chapter(s): {} chunk(s) translated, {} from cache",
            total, tally.translated, tally.cached
        ));

        Ok(RunSummary {
            document_name: document_name.to_string(),
            chapter_count: total,
            resumed_from: start,
            chunks: tally,
            artifact,
        })
    }

    /// First chapter to translate, from a progress record of the same document
    async fn resume_point(&self, document_name: &str, total: usize) -> Result<usize, PipelineError> {
        match self.store.load_progress().await? {
            Some(record) if record.document_name == document_name => {
                Ok(record.next_chapter_index.min(total))
            }
            Some(record) => {
                debug!(
                    "Ignoring progress of another document ({}), starting from the first chapter",
                    record.document_name
                );
                Ok(0)
            }
            None => Ok(0),
        }
    }

    /// Chunk, translate and write back one chapter; `index` is set for chapters of the current pass
    async fn translate_chapter(
        &self,
        archive: &mut dyn Archive,
        chapter: &Chapter,
        index: Option<usize>,
    ) -> Result<ChunkTally, PipelineError> {
        let markup = archive.read_chapter(&chapter.path)?;
        let (chunks, skeleton) = self.chunker.split(&markup).into_chunks(&chapter.path);
        debug!("Chapter {} split into {} chunk(s)", chapter.path, chunks.len());

        if chunks.is_empty() && skeleton.is_none() {
            debug!("Chapter {} has nothing to translate, kept as is", chapter.path);
            return Ok(ChunkTally::default());
        }

        let results = self
            .batcher
            .try_run(chunks, |chunk| self.translate_chunk(chunk))
            .await?;

        let mut tally = ChunkTally::default();
        let mut translated = Vec::with_capacity(results.len());
        for (text, source) in results {
            tally.record(source);
            translated.push(text);
        }

        if let Some(i) = index {
            self.transition(PipelineState::Reassembling(i));
        }
        let output = reassemble(skeleton.as_ref(), &translated, &self.locale);
        archive.write_chapter(&chapter.path, output)?;

        Ok(tally)
    }

    /// Cached text, or a fresh translation written through to the cache
    async fn translate_chunk(&self, chunk: Chunk) -> Result<(String, ChunkSource)> {
        if let Some(text) = self.cache.get(&chunk).await? {
            return Ok((text, ChunkSource::Cached));
        }

        let outcome = self.translator.translate(&chunk.text, &self.model).await;
        self.cache.put(&chunk, &outcome).await?;

        let source = match outcome {
            TranslationOutcome::Translated(_) => ChunkSource::Translated,
            TranslationOutcome::Fallback(_) => ChunkSource::Fallback,
        };
        Ok((outcome.into_text(), source))
    }

    fn transition(&self, next: PipelineState) {
        let mut state = self.state.lock();
        debug!("Pipeline state {:?} -> {:?}", *state, next);
        *state = next;
        self.transitions.lock().push(next);
    }

    fn report(&self, percent: u8, status: &str) {
        if let Some(callback) = &self.on_progress {
            callback(percent, status);
        }
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("model", &self.model)
            .field("batcher", &self.batcher)
            .field("chunker", &self.chunker)
            .field("locale", &self.locale)
            .field("state", &self.state())
            .finish()
    }
}

/// Translator for `config` over `provider`: credential pool, prompt and retry policy
pub fn build_translator(config: &Config, provider: Arc<dyn Provider>, events: EventLog) -> Result<RetryingTranslator> {
    let template = PromptTemplate::new(
        &language_utils::get_language_name(&config.source_language)?,
        &language_utils::get_language_name(&config.target_language)?,
    );
    let client = TranslationClient::new(provider, template, config.translation.timeout());
    let credentials = Arc::new(CredentialPool::new(config.translation.credentials())?);

    Ok(RetryingTranslator::new(
        client,
        credentials,
        RetryPolicy::from_config(&config.translation),
        events,
    ))
}

fn percent(index: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((index * 100 + total / 2) / total).min(100) as u8
}

fn merge(a: ChunkTally, b: ChunkTally) -> ChunkTally {
    ChunkTally {
        translated: a.translated + b.translated,
        cached: a.cached + b.cached,
        fallbacks: a.fallbacks + b.fallbacks,
    }
}
