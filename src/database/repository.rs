/*!
 * Repository layer for database operations.
 *
 * This module provides the SQLite implementation of the state store traits,
 * abstracting away the SQL details.
 */

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use rusqlite::{OptionalExtension, params};

use super::connection::DatabaseConnection;
use super::schema::PROGRESS_SENTINEL_ID;
use crate::store::{CachedChunk, ChunkStore, ProgressRecord, ProgressStore, StateStore, StoreStats};

/// Repository for database operations
#[derive(Clone)]
pub struct Repository {
    /// Database connection
    db: DatabaseConnection,
}

impl Repository {
    /// Create a new repository with the given database connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create a repository with an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self> {
        let db = DatabaseConnection::open_in_memory()?;
        Ok(Self::new(db))
    }

    fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(value).ok().map(|t| t.with_timezone(&Utc))
    }
}

#[async_trait]
impl ChunkStore for Repository {
    async fn get_chunk(&self, key: &str) -> Result<Option<CachedChunk>> {
        let key = key.to_string();

        self.db
            .execute_async(move |conn| {
                let chunk = conn
                    .query_row(
                        "SELECT translated_text, source_hash, is_fallback FROM chunks WHERE chunk_key = ?1",
                        [&key],
                        |row| {
                            Ok(CachedChunk {
                                translated_text: row.get(0)?,
                                source_hash: row.get(1)?,
                                is_fallback: row.get(2)?,
                            })
                        },
                    )
                    .optional()
                    .with_context(|| format!("Failed to read chunk {}", key))?;
                Ok(chunk)
            })
            .await
    }

    async fn put_chunk(&self, key: &str, chunk: &CachedChunk) -> Result<()> {
        let key = key.to_string();
        let chunk = chunk.clone();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO chunks (chunk_key, translated_text, source_hash, is_fallback, created_at)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    ON CONFLICT(chunk_key) DO UPDATE SET
                        translated_text = excluded.translated_text,
                        source_hash = excluded.source_hash,
                        is_fallback = excluded.is_fallback,
                        created_at = excluded.created_at
                    "#,
                    params![
                        key,
                        chunk.translated_text,
                        chunk.source_hash,
                        chunk.is_fallback,
                        Utc::now().to_rfc3339()
                    ],
                )
                .with_context(|| format!("Failed to write chunk {}", key))?;
                debug!("Stored chunk {}", key);
                Ok(())
            })
            .await
    }
}

#[async_trait]
impl ProgressStore for Repository {
    async fn load_progress(&self) -> Result<Option<ProgressRecord>> {
        self.db
            .execute_async(|conn| {
                let record = conn
                    .query_row(
                        "SELECT document_name, next_chapter_index FROM progress WHERE id = ?1",
                        [PROGRESS_SENTINEL_ID],
                        |row| {
                            Ok(ProgressRecord {
                                document_name: row.get(0)?,
                                next_chapter_index: row.get::<_, i64>(1)? as usize,
                            })
                        },
                    )
                    .optional()
                    .context("Failed to read progress")?;
                Ok(record)
            })
            .await
    }

    async fn save_progress(&self, record: &ProgressRecord) -> Result<()> {
        let record = record.clone();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO progress (id, document_name, next_chapter_index, updated_at)
                    VALUES (?1, ?2, ?3, ?4)
                    ON CONFLICT(id) DO UPDATE SET
                        document_name = excluded.document_name,
                        next_chapter_index = excluded.next_chapter_index,
                        updated_at = excluded.updated_at
                    "#,
                    params![
                        PROGRESS_SENTINEL_ID,
                        record.document_name,
                        record.next_chapter_index as i64,
                        Utc::now().to_rfc3339()
                    ],
                )
                .context("Failed to write progress")?;
                Ok(())
            })
            .await
    }
}

#[async_trait]
impl StateStore for Repository {
    async fn clear_all(&self) -> Result<()> {
        self.db
            .transaction_async(|tx| {
                let chunks = tx.execute("DELETE FROM chunks", [])?;
                tx.execute("DELETE FROM progress", [])?;
                debug!("Cleared progress and {} cached chunks", chunks);
                Ok(())
            })
            .await
            .context("Failed to clear translation state")
    }

    async fn stats(&self) -> Result<StoreStats> {
        self.db
            .execute_async(|conn| {
                let (chunk_count, fallback_count): (i64, i64) = conn.query_row(
                    "SELECT COUNT(*), COALESCE(SUM(is_fallback), 0) FROM chunks",
                    [],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )?;

                let progress = conn
                    .query_row(
                        "SELECT document_name, next_chapter_index, updated_at FROM progress WHERE id = ?1",
                        [PROGRESS_SENTINEL_ID],
                        |row| {
                            Ok((
                                ProgressRecord {
                                    document_name: row.get(0)?,
                                    next_chapter_index: row.get::<_, i64>(1)? as usize,
                                },
                                row.get::<_, String>(2)?,
                            ))
                        },
                    )
                    .optional()?;

                let (progress, progress_updated_at) = match progress {
                    Some((record, updated_at)) => (Some(record), Self::parse_timestamp(&updated_at)),
                    None => (None, None),
                };

                Ok(StoreStats {
                    chunk_count: chunk_count as usize,
                    fallback_count: fallback_count as usize,
                    progress,
                    progress_updated_at,
                })
            })
            .await
    }
}
