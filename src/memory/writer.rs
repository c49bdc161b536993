//! Single-writer actor for serialized SQLite writes.
//!
//! All memory mutations flow through this actor via an
//! [`mpsc`](tokio::sync::mpsc) channel. This prevents SQLite write contention
//! while allowing concurrent reads through the connection pool.

use sqlx::SqlitePool;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, trace};

use super::Memory;

/// Operations that can be sent to the write actor.
#[derive(Debug)]
pub enum WriteOp {
    /// Persist a new memory.
    Save(Memory),

    /// Remove a user's memories whose content contains `content`
    /// (case-insensitive).
    DeleteMatching {
        /// Owning user.
        user_id: String,
        /// Substring to match.
        content: String,
    },

    /// Remove all of a user's memories.
    Clear {
        /// Owning user.
        user_id: String,
    },

    /// Signal once every earlier operation has been applied.
    Flush(oneshot::Sender<()>),
}

/// Run the single-writer actor loop.
///
/// Processes [`WriteOp`] messages until the sender half is dropped.
/// Each operation is executed as an individual SQL statement.
pub async fn run_writer(db: SqlitePool, mut rx: mpsc::Receiver<WriteOp>) {
    while let Some(op) = rx.recv().await {
        if let WriteOp::Flush(done) = op {
            // Receiver may have given up waiting.
            let _ = done.send(());
            continue;
        }
        if let Err(err) = handle_op(&db, &op).await {
            error!(?op, error = %err, "memory write failed");
        }
    }
    trace!("memory writer actor stopped");
}

async fn handle_op(db: &SqlitePool, op: &WriteOp) -> Result<(), sqlx::Error> {
    match op {
        WriteOp::Save(memory) => {
            sqlx::query("INSERT INTO memories (user_id, kind, content) VALUES (?1, ?2, ?3)")
                .bind(&memory.user_id)
                .bind(memory.kind.as_str())
                .bind(&memory.content)
                .execute(db)
                .await?;
            trace!(user_id = %memory.user_id, kind = memory.kind.as_str(), "memory saved");
        }

        WriteOp::DeleteMatching { user_id, content } => {
            let removed = sqlx::query(
                "DELETE FROM memories WHERE user_id = ?1 AND instr(lower(content), lower(?2)) > 0",
            )
            .bind(user_id)
            .bind(content)
            .execute(db)
            .await?
            .rows_affected();
            trace!(user_id, removed, "memories deleted");
        }

        WriteOp::Clear { user_id } => {
            let removed = sqlx::query("DELETE FROM memories WHERE user_id = ?1")
                .bind(user_id)
                .execute(db)
                .await?
                .rows_affected();
            trace!(user_id, removed, "memories cleared");
        }

        WriteOp::Flush(_) => {}
    }
    Ok(())
}
