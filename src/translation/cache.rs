/*!
 * Durable chunk cache.
 *
 * Write-through memo in front of the retrying translator. Entries are keyed
 * by `"<chapterPath>_chk_<index>"` and carry a hash of the source text and
 * the chunk size that produced them, so an entry left over from a different
 * chunking of the chapter is treated as a miss instead of being reused.
 */

use anyhow::Result;
use log::debug;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::chunker::Chunk;
use super::retry::TranslationOutcome;
use crate::store::{CachedChunk, ChunkStore};

/// Stable cache identifier of a chunk
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChunkKey(String);

impl ChunkKey {
    /// Key for chunk `index` of `chapter_path`
    pub fn new(chapter_path: &str, index: usize) -> Self {
        Self(format!("{}_chk_{}", chapter_path, index))
    }

    pub fn for_chunk(chunk: &Chunk) -> Self {
        Self::new(&chunk.chapter_path, chunk.index)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hex SHA-256 over the chunk size and the source text
pub fn source_hash(text: &str, max_chunk_size: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(max_chunk_size.to_le_bytes());
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Cache lookup and write policy over a chunk store
pub struct ChunkCache {
    /// Backing store
    store: Arc<dyn ChunkStore>,
    /// Chunk size the current chunks were produced with
    max_chunk_size: usize,
    /// Whether fallbacks are written like translations
    cache_fallbacks: bool,
    /// Cache hit counter
    hits: AtomicUsize,
    /// Cache miss counter, stale entries included
    misses: AtomicUsize,
    /// Entries found with a different source hash
    stale: AtomicUsize,
}

impl ChunkCache {
    /// Create a new chunk cache
    pub fn new(store: Arc<dyn ChunkStore>, max_chunk_size: usize, cache_fallbacks: bool) -> Self {
        Self {
            store,
            max_chunk_size,
            cache_fallbacks,
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
            stale: AtomicUsize::new(0),
        }
    }

    /// Cached translation for a chunk, if a current entry exists
    pub async fn get(&self, chunk: &Chunk) -> Result<Option<String>> {
        let key = ChunkKey::for_chunk(chunk);
        let expected = source_hash(&chunk.text, self.max_chunk_size);

        match self.store.get_chunk(key.as_str()).await? {
            Some(entry) if entry.source_hash == expected => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!("Cache hit for {}", key);
                Ok(Some(entry.translated_text))
            }
            Some(_) => {
                self.stale.fetch_add(1, Ordering::Relaxed);
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!("Stale cache entry for {}, translating again", key);
                Ok(None)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    /// Record the outcome for a chunk; returns whether it was written
    pub async fn put(&self, chunk: &Chunk, outcome: &TranslationOutcome) -> Result<bool> {
        if outcome.is_fallback() && !self.cache_fallbacks {
            debug!("Not caching fallback for {}", ChunkKey::for_chunk(chunk));
            return Ok(false);
        }

        let entry = CachedChunk {
            translated_text: outcome.text().to_string(),
            source_hash: source_hash(&chunk.text, self.max_chunk_size),
            is_fallback: outcome.is_fallback(),
        };
        self.store.put_chunk(ChunkKey::for_chunk(chunk).as_str(), &entry).await?;
        Ok(true)
    }

    /// Get cache statistics as (hits, misses, stale)
    pub fn stats(&self) -> (usize, usize, usize) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
            self.stale.load(Ordering::Relaxed),
        )
    }
}

impl fmt::Debug for ChunkCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (hits, misses, stale) = self.stats();
        f.debug_struct("ChunkCache")
            .field("max_chunk_size", &self.max_chunk_size)
            .field("cache_fallbacks", &self.cache_fallbacks)
            .field("hits", &hits)
            .field("misses", &misses)
            .field("stale", &stale)
            .finish()
    }
}
