/*!
 * Durable state seams.
 *
 * The pipeline persists two kinds of state: translated chunks keyed by
 * `ChunkKey`, and a single progress record. Both live behind async traits so
 * the SQLite repository and the in-memory store are interchangeable.
 */

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Resume point of a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressRecord {
    /// Identity of the document being translated (its file name)
    pub document_name: String,
    /// Index of the first chapter not yet completed
    pub next_chapter_index: usize,
}

impl ProgressRecord {
    pub fn new(document_name: impl Into<String>, next_chapter_index: usize) -> Self {
        Self {
            document_name: document_name.into(),
            next_chapter_index,
        }
    }
}

/// Stored translation of one chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedChunk {
    /// Translated text, or the source text for a fallback
    pub translated_text: String,
    /// Hash of the source text and chunking parameters it was produced from
    pub source_hash: String,
    /// Whether this is an untranslated fallback
    pub is_fallback: bool,
}

/// Store statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Number of cached chunks
    pub chunk_count: usize,
    /// Number of cached chunks that are fallbacks
    pub fallback_count: usize,
    /// Current progress record
    pub progress: Option<ProgressRecord>,
    /// When the progress record was last written
    pub progress_updated_at: Option<DateTime<Utc>>,
}

/// Translated chunk storage
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Look up a chunk by its key
    async fn get_chunk(&self, key: &str) -> Result<Option<CachedChunk>>;

    /// Insert or replace a chunk
    async fn put_chunk(&self, key: &str, chunk: &CachedChunk) -> Result<()>;
}

/// Single-record progress storage
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Read the progress record, if any
    async fn load_progress(&self) -> Result<Option<ProgressRecord>>;

    /// Overwrite the progress record
    async fn save_progress(&self, record: &ProgressRecord) -> Result<()>;
}

/// Full state store used by the pipeline and the controller
#[async_trait]
pub trait StateStore: ChunkStore + ProgressStore {
    /// Remove the progress record and every cached chunk
    async fn clear_all(&self) -> Result<()>;

    /// Summary of the stored state
    async fn stats(&self) -> Result<StoreStats>;
}

#[derive(Debug, Default)]
struct MemoryState {
    chunks: HashMap<String, CachedChunk>,
    progress: Option<(ProgressRecord, DateTime<Utc>)>,
}

/// In-memory state store for tests and dry runs
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached chunks
    pub fn chunk_count(&self) -> usize {
        self.state.read().chunks.len()
    }

    /// Keys of all cached chunks, sorted
    pub fn chunk_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.state.read().chunks.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl ChunkStore for MemoryStore {
    async fn get_chunk(&self, key: &str) -> Result<Option<CachedChunk>> {
        Ok(self.state.read().chunks.get(key).cloned())
    }

    async fn put_chunk(&self, key: &str, chunk: &CachedChunk) -> Result<()> {
        self.state.write().chunks.insert(key.to_string(), chunk.clone());
        Ok(())
    }
}

#[async_trait]
impl ProgressStore for MemoryStore {
    async fn load_progress(&self) -> Result<Option<ProgressRecord>> {
        Ok(self.state.read().progress.as_ref().map(|(record, _)| record.clone()))
    }

    async fn save_progress(&self, record: &ProgressRecord) -> Result<()> {
        self.state.write().progress = Some((record.clone(), Utc::now()));
        Ok(())
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn clear_all(&self) -> Result<()> {
        let mut state = self.state.write();
        state.chunks.clear();
        state.progress = None;
        Ok(())
    }

    async fn stats(&self) -> Result<StoreStats> {
        let state = self.state.read();
        Ok(StoreStats {
            chunk_count: state.chunks.len(),
            fallback_count: state.chunks.values().filter(|c| c.is_fallback).count(),
            progress: state.progress.as_ref().map(|(record, _)| record.clone()),
            progress_updated_at: state.progress.as_ref().map(|(_, at)| *at),
        })
    }
}
