//! Legacy fuzzy memory: untyped free-text notes with FTS5 search.
//!
//! The [`MemoryEngine`] is the sole gateway to the `memories` table. Reads
//! go straight through the pool. Writes go through a single-writer actor
//! backed by an [`mpsc`] channel to prevent SQLite write contention.
//!
//! This layer is best-effort. Callers treat its failures as "no memories"
//! and never rely on a write having landed.

pub mod search;
pub mod writer;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tokio::sync::{mpsc, oneshot};
use tracing::info;

use self::writer::WriteOp;

// ---------------------------------------------------------------------------
// Domain types
// ---------------------------------------------------------------------------

/// Kind of memory stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryKind {
    /// A travel preference mirrored from the structured store.
    Preference,
    /// Anything else the assistant chose to remember (bookings, searches, notes).
    Note,
}

impl MemoryKind {
    /// Returns the string representation stored in SQLite.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Preference => "preference",
            Self::Note => "note",
        }
    }

    /// Parse from a SQLite text value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not a recognised kind.
    pub fn parse(s: &str) -> Result<Self, MemoryError> {
        match s {
            "preference" => Ok(Self::Preference),
            "note" => Ok(Self::Note),
            other => Err(MemoryError::InvalidEnum {
                field: "kind",
                value: other.to_owned(),
            }),
        }
    }
}

/// A memory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Memory {
    /// Database row id (`None` for entries not yet persisted).
    pub id: Option<i64>,
    /// Owning user.
    pub user_id: String,
    /// Kind of memory.
    pub kind: MemoryKind,
    /// Text content.
    pub content: String,
    /// ISO-8601 creation timestamp (set by SQLite on insert).
    pub created_at: Option<String>,
}

impl Memory {
    /// A not-yet-persisted entry.
    pub fn new(user_id: &str, kind: MemoryKind, content: &str) -> Self {
        Self {
            id: None,
            user_id: user_id.to_owned(),
            kind,
            content: content.to_owned(),
            created_at: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from memory engine operations.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Write channel is closed (writer actor stopped).
    #[error("memory writer channel closed")]
    WriterClosed,

    /// An invalid enum value was read from the database.
    #[error("invalid {field} value: {value:?}")]
    InvalidEnum {
        /// Which field contained the bad value.
        field: &'static str,
        /// The unexpected value.
        value: String,
    },

    /// Content exceeds the maximum allowed size.
    #[error("content too large: {size} bytes exceeds {max} byte limit")]
    ContentTooLarge {
        /// Actual content size in bytes.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },
}

// ---------------------------------------------------------------------------
// Backend seam
// ---------------------------------------------------------------------------

/// Read/write surface of the fuzzy memory layer as seen by the engine.
#[async_trait]
pub trait MemoryBackend: Send + Sync {
    /// Most recent memory contents for a user, newest first.
    async fn recall(&self, user_id: &str, limit: usize) -> Result<Vec<String>, MemoryError>;

    /// Full-text search over a user's memories.
    async fn search(
        &self,
        user_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<String>, MemoryError>;

    /// Queue a new memory for a user.
    async fn remember(&self, user_id: &str, content: &str) -> Result<(), MemoryError>;

    /// Queue removal of memories containing `content`.
    async fn forget(&self, user_id: &str, content: &str) -> Result<(), MemoryError>;

    /// Queue removal of all of a user's memories.
    async fn forget_all(&self, user_id: &str) -> Result<(), MemoryError>;
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Writer channel capacity, bounded to provide backpressure.
const WRITER_CHANNEL_CAPACITY: usize = 1024;

/// Maximum allowed content size in bytes for a single memory.
pub const MAX_CONTENT_SIZE: usize = 16 * 1024;

/// SQLite-backed fuzzy memory with serialized writes.
pub struct MemoryEngine {
    /// Connection pool for reads.
    db: SqlitePool,
    /// Channel to the single-writer actor.
    writer_tx: mpsc::Sender<WriteOp>,
    /// Writer actor join handle (held so we can await on shutdown).
    writer_handle: tokio::task::JoinHandle<()>,
}

impl std::fmt::Debug for MemoryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryEngine").finish_non_exhaustive()
    }
}

impl MemoryEngine {
    /// Create a new memory engine backed by the given SQLite pool.
    ///
    /// Spawns the single-writer actor as a background Tokio task.
    pub fn new(db: SqlitePool) -> Self {
        let (writer_tx, writer_rx) = mpsc::channel(WRITER_CHANNEL_CAPACITY);
        let writer_handle = tokio::spawn(writer::run_writer(db.clone(), writer_rx));
        info!("memory engine initialised");
        Self {
            db,
            writer_tx,
            writer_handle,
        }
    }

    /// Persist a new memory entry via the writer actor.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::ContentTooLarge`] for oversized content or
    /// [`MemoryError::WriterClosed`] if the writer actor has stopped.
    pub async fn save_memory(&self, memory: Memory) -> Result<(), MemoryError> {
        if memory.content.len() > MAX_CONTENT_SIZE {
            return Err(MemoryError::ContentTooLarge {
                size: memory.content.len(),
                max: MAX_CONTENT_SIZE,
            });
        }
        self.send(WriteOp::Save(memory)).await
    }

    /// Wait until every write queued before this call has been applied.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::WriterClosed`] if the writer actor has stopped.
    pub async fn flush(&self) -> Result<(), MemoryError> {
        let (tx, rx) = oneshot::channel();
        self.send(WriteOp::Flush(tx)).await?;
        rx.await.map_err(|_| MemoryError::WriterClosed)
    }

    /// Memories for a user, newest first.
    pub async fn recent(&self, user_id: &str, limit: usize) -> Result<Vec<Memory>, MemoryError> {
        search::recent(&self.db, user_id, limit).await
    }

    /// FTS5 search over a user's memories, best match first.
    pub async fn search_memories(
        &self,
        user_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Memory>, MemoryError> {
        search::search(&self.db, user_id, query, limit).await
    }

    /// Returns a reference to the underlying SQLite pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.db
    }

    /// Gracefully shut down the writer actor.
    ///
    /// Drops the sender channel and awaits the writer task to drain.
    pub async fn shutdown(self) {
        drop(self.writer_tx);
        let _ = self.writer_handle.await;
        info!("memory engine shut down");
    }

    async fn send(&self, op: WriteOp) -> Result<(), MemoryError> {
        self.writer_tx
            .send(op)
            .await
            .map_err(|_| MemoryError::WriterClosed)
    }
}

#[async_trait]
impl MemoryBackend for MemoryEngine {
    async fn recall(&self, user_id: &str, limit: usize) -> Result<Vec<String>, MemoryError> {
        let memories = self.recent(user_id, limit).await?;
        Ok(memories.into_iter().map(|m| m.content).collect())
    }

    async fn search(
        &self,
        user_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<String>, MemoryError> {
        let memories = self.search_memories(user_id, query, limit).await?;
        Ok(memories.into_iter().map(|m| m.content).collect())
    }

    async fn remember(&self, user_id: &str, content: &str) -> Result<(), MemoryError> {
        self.save_memory(Memory::new(user_id, MemoryKind::Preference, content))
            .await
    }

    async fn forget(&self, user_id: &str, content: &str) -> Result<(), MemoryError> {
        // An empty needle would match every row.
        if content.trim().is_empty() {
            return Ok(());
        }
        self.send(WriteOp::DeleteMatching {
            user_id: user_id.to_owned(),
            content: content.to_owned(),
        })
        .await
    }

    async fn forget_all(&self, user_id: &str) -> Result<(), MemoryError> {
        self.send(WriteOp::Clear {
            user_id: user_id.to_owned(),
        })
        .await
    }
}
