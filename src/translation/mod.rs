/*!
 * Chunk translation building blocks.
 *
 * This module contains the pieces the pipeline composes to translate one
 * chapter. It is split into several submodules:
 *
 * - `chunker`: Structure-aware splitting of chapter markup
 * - `prompts`: The constant instruction template
 * - `core`: Single provider call with timeout and response sanitization
 * - `credentials`: Round-robin API key rotation
 * - `retry`: Retrying translator with fallback to the source text
 * - `cache`: Durable chunk cache with source-hash validation
 * - `batch`: Concurrency-limited, order-preserving scheduling
 * - `reassembly`: Putting translated chunks back into the chapter
 */

// Re-export main types for easier usage
pub use self::batch::ConcurrencyLimitedBatcher;
pub use self::cache::{ChunkCache, ChunkKey};
pub use self::chunker::{Chunk, ChunkedChapter, MarkupChunker};
pub use self::core::TranslationClient;
pub use self::credentials::CredentialPool;
pub use self::prompts::PromptTemplate;
pub use self::reassembly::{LocaleAttributes, Skeleton, reassemble};
pub use self::retry::{RetryPolicy, RetryingTranslator, TranslationOutcome};

// Submodules
pub mod batch;
pub mod cache;
pub mod chunker;
pub mod core;
pub mod credentials;
pub mod prompts;
pub mod reassembly;
pub mod retry;
