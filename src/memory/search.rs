//! Read paths over the `memories` table: recency listing and FTS5 search.

use sqlx::SqlitePool;

use super::{Memory, MemoryError, MemoryKind};

/// Raw row returned by memory queries.
///
/// Fields: `(id, user_id, kind, content, created_at)`.
type MemoryRow = (i64, String, String, String, String);

/// A user's memories, newest first.
pub async fn recent(
    db: &SqlitePool,
    user_id: &str,
    limit: usize,
) -> Result<Vec<Memory>, MemoryError> {
    let limit_i64 = i64::try_from(limit).unwrap_or(i64::MAX);
    let rows: Vec<MemoryRow> = sqlx::query_as(
        "SELECT id, user_id, kind, content, created_at \
         FROM memories \
         WHERE user_id = ?1 \
         ORDER BY id DESC \
         LIMIT ?2",
    )
    .bind(user_id)
    .bind(limit_i64)
    .fetch_all(db)
    .await?;

    rows.into_iter().map(row_to_memory).collect()
}

/// Full-text search via FTS5 MATCH, scoped to one user.
///
/// Sanitises the query for FTS5 syntax, then joins against the `memories`
/// table to return full [`Memory`] rows ordered by FTS5 rank.
pub async fn search(
    db: &SqlitePool,
    user_id: &str,
    query: &str,
    limit: usize,
) -> Result<Vec<Memory>, MemoryError> {
    let sanitised = sanitise_fts5_query(query);
    if sanitised.is_empty() {
        return Ok(Vec::new());
    }

    let limit_i64 = i64::try_from(limit).unwrap_or(i64::MAX);
    let rows: Vec<MemoryRow> = sqlx::query_as(
        "SELECT m.id, m.user_id, m.kind, m.content, m.created_at \
         FROM memories_fts f \
         JOIN memories m ON f.rowid = m.id \
         WHERE memories_fts MATCH ?1 \
           AND m.user_id = ?2 \
         ORDER BY f.rank \
         LIMIT ?3",
    )
    .bind(&sanitised)
    .bind(user_id)
    .bind(limit_i64)
    .fetch_all(db)
    .await?;

    rows.into_iter().map(row_to_memory).collect()
}

/// Convert a raw query row tuple into a [`Memory`].
fn row_to_memory(row: MemoryRow) -> Result<Memory, MemoryError> {
    let (id, user_id, kind, content, created_at) = row;
    Ok(Memory {
        id: Some(id),
        user_id,
        kind: MemoryKind::parse(&kind)?,
        content,
        created_at: Some(created_at),
    })
}

/// Sanitise a user query string for FTS5 MATCH syntax.
///
/// FTS5 treats certain characters as operators. We strip them to avoid
/// syntax errors while preserving the search intent.
pub(crate) fn sanitise_fts5_query(query: &str) -> String {
    let cleaned: String = query
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == ' ' || c == '_' {
                c
            } else {
                ' '
            }
        })
        .collect();

    // FTS5 keyword operators that cause parse errors when used as search terms.
    const FTS5_KEYWORDS: &[&str] = &["OR", "NOT", "AND", "NEAR"];

    cleaned
        .split_whitespace()
        .filter(|t| !FTS5_KEYWORDS.contains(t))
        .collect::<Vec<_>>()
        .join(" ")
}
