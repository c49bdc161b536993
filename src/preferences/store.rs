//! Structured preference store backed by the `preferences` table.
//!
//! Writes canonicalize the statement first. For exclusive categories the
//! delete of prior rows and the insert of the new row run in one
//! transaction, so concurrent writers can never leave two live rows.

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};

use super::canonical::{canonicalize, infer_category, strip_wrappers};
use super::{PreferenceCategory, PreferenceError, PreferenceRecord, MAX_PREFERENCE_SIZE};

/// Raw row from the `preferences` table.
///
/// Fields: `(id, user_id, category, raw_text, canonical_text, created_at)`.
type PreferenceRow = (String, String, String, String, String, String);

const SELECT_COLUMNS: &str =
    "SELECT id, user_id, category, raw_text, canonical_text, created_at FROM preferences";

/// Newest first; rowid breaks ties between rows written in the same microsecond.
const NEWEST_FIRST: &str = "ORDER BY created_at DESC, rowid DESC";

/// Authoritative, typed preference storage.
#[derive(Debug, Clone)]
pub struct PreferenceStore {
    db: SqlitePool,
}

impl PreferenceStore {
    /// Wrap an already-migrated pool.
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Returns a reference to the underlying SQLite pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.db
    }

    /// Store a preference statement.
    ///
    /// With `category = None` the category is inferred from the text.
    /// Exclusive categories replace any earlier row for the same user.
    ///
    /// # Errors
    ///
    /// Returns [`PreferenceError::EmptyText`] for blank input,
    /// [`PreferenceError::TooLarge`] for oversized input, or a database error.
    pub async fn add(
        &self,
        user_id: &str,
        category: Option<PreferenceCategory>,
        raw_text: &str,
    ) -> Result<PreferenceRecord, PreferenceError> {
        let (record, _replaced) = self.add_superseding(user_id, category, raw_text).await?;
        Ok(record)
    }

    /// Like [`add`](Self::add), but also returns the rows an exclusive
    /// category write removed, newest first.
    ///
    /// # Errors
    ///
    /// Same as [`add`](Self::add).
    pub async fn add_superseding(
        &self,
        user_id: &str,
        category: Option<PreferenceCategory>,
        raw_text: &str,
    ) -> Result<(PreferenceRecord, Vec<PreferenceRecord>), PreferenceError> {
        if raw_text.len() > MAX_PREFERENCE_SIZE {
            return Err(PreferenceError::TooLarge {
                size: raw_text.len(),
                max: MAX_PREFERENCE_SIZE,
            });
        }
        let stripped = strip_wrappers(raw_text);
        let canonical_text = canonicalize(&stripped);
        if canonical_text.is_empty() {
            return Err(PreferenceError::EmptyText);
        }
        let category = category.unwrap_or_else(|| infer_category(&stripped));

        let record = PreferenceRecord {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_owned(),
            category,
            raw_text: raw_text.trim().to_owned(),
            canonical_text,
            created_at: Utc::now(),
        };

        let mut tx = self.db.begin().await?;
        let mut replaced = Vec::new();
        if category.is_exclusive() {
            // The delete must be the first statement so the transaction takes
            // the write lock up front and waits on busy_timeout.
            let rows: Vec<PreferenceRow> = sqlx::query_as(
                "DELETE FROM preferences WHERE user_id = ?1 AND category = ?2 \
                 RETURNING id, user_id, category, raw_text, canonical_text, created_at",
            )
            .bind(user_id)
            .bind(category.as_str())
            .fetch_all(&mut *tx)
            .await?;
            replaced = rows
                .into_iter()
                .map(row_to_record)
                .collect::<Result<Vec<_>, _>>()?;
            replaced.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            if !replaced.is_empty() {
                debug!(
                    user_id,
                    category = category.as_str(),
                    replaced = replaced.len(),
                    "superseded exclusive preference"
                );
            }
        }
        sqlx::query(
            "INSERT INTO preferences (id, user_id, category, raw_text, canonical_text, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&record.id)
        .bind(&record.user_id)
        .bind(category.as_str())
        .bind(&record.raw_text)
        .bind(&record.canonical_text)
        .bind(format_timestamp(&record.created_at))
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        info!(
            user_id,
            category = category.as_str(),
            canonical = %record.canonical_text,
            "preference stored"
        );
        Ok((record, replaced))
    }

    /// All preferences for a user, newest first.
    pub async fn list(&self, user_id: &str) -> Result<Vec<PreferenceRecord>, PreferenceError> {
        let sql = format!("{SELECT_COLUMNS} WHERE user_id = ?1 {NEWEST_FIRST}");
        let rows: Vec<PreferenceRow> = sqlx::query_as(&sql).bind(user_id).fetch_all(&self.db).await?;
        rows.into_iter().map(row_to_record).collect()
    }

    /// Preferences of one category for a user, newest first.
    pub async fn list_category(
        &self,
        user_id: &str,
        category: PreferenceCategory,
    ) -> Result<Vec<PreferenceRecord>, PreferenceError> {
        let sql = format!("{SELECT_COLUMNS} WHERE user_id = ?1 AND category = ?2 {NEWEST_FIRST}");
        let rows: Vec<PreferenceRow> = sqlx::query_as(&sql)
            .bind(user_id)
            .bind(category.as_str())
            .fetch_all(&self.db)
            .await?;
        rows.into_iter().map(row_to_record).collect()
    }

    /// The most recent preference of a category, if any.
    pub async fn latest(
        &self,
        user_id: &str,
        category: PreferenceCategory,
    ) -> Result<Option<PreferenceRecord>, PreferenceError> {
        let sql =
            format!("{SELECT_COLUMNS} WHERE user_id = ?1 AND category = ?2 {NEWEST_FIRST} LIMIT 1");
        let row: Option<PreferenceRow> = sqlx::query_as(&sql)
            .bind(user_id)
            .bind(category.as_str())
            .fetch_optional(&self.db)
            .await?;
        row.map(row_to_record).transpose()
    }

    /// Delete preferences whose raw or canonical text matches `text`.
    ///
    /// Matching is case-insensitive and also accepts the canonical form of
    /// `text`, so "I prefer business class" removes "Cabin class: Business".
    /// Returns the number of rows removed.
    pub async fn delete_matching(&self, user_id: &str, text: &str) -> Result<u64, PreferenceError> {
        let stripped = strip_wrappers(text);
        let canonical = canonicalize(&stripped);
        let removed = sqlx::query(
            "DELETE FROM preferences WHERE user_id = ?1 AND ( \
                 lower(raw_text) = lower(?2) \
                 OR lower(canonical_text) = lower(?2) \
                 OR lower(canonical_text) = lower(?3))",
        )
        .bind(user_id)
        .bind(&stripped)
        .bind(&canonical)
        .execute(&self.db)
        .await?
        .rows_affected();
        info!(user_id, removed, "preferences deleted by text");
        Ok(removed)
    }

    /// A single preference by id, if it belongs to `user_id`.
    pub async fn get(
        &self,
        user_id: &str,
        id: &str,
    ) -> Result<Option<PreferenceRecord>, PreferenceError> {
        let sql = format!("{SELECT_COLUMNS} WHERE user_id = ?1 AND id = ?2");
        let row: Option<PreferenceRow> = sqlx::query_as(&sql)
            .bind(user_id)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        row.map(row_to_record).transpose()
    }

    /// Delete a single preference by id. Returns whether a row was removed.
    pub async fn delete_by_id(&self, user_id: &str, id: &str) -> Result<bool, PreferenceError> {
        let removed = sqlx::query("DELETE FROM preferences WHERE user_id = ?1 AND id = ?2")
            .bind(user_id)
            .bind(id)
            .execute(&self.db)
            .await?
            .rows_affected();
        Ok(removed > 0)
    }

    /// Delete every preference of one category. Returns the number removed.
    pub async fn delete_category(
        &self,
        user_id: &str,
        category: PreferenceCategory,
    ) -> Result<u64, PreferenceError> {
        let removed = sqlx::query("DELETE FROM preferences WHERE user_id = ?1 AND category = ?2")
            .bind(user_id)
            .bind(category.as_str())
            .execute(&self.db)
            .await?
            .rows_affected();
        info!(user_id, category = category.as_str(), removed, "preference category cleared");
        Ok(removed)
    }

    /// Delete all preferences for a user. Returns the number removed.
    pub async fn clear_all(&self, user_id: &str) -> Result<u64, PreferenceError> {
        let removed = sqlx::query("DELETE FROM preferences WHERE user_id = ?1")
            .bind(user_id)
            .execute(&self.db)
            .await?
            .rows_affected();
        info!(user_id, removed, "all preferences cleared");
        Ok(removed)
    }
}

/// Fixed-width RFC 3339 so lexical order matches chronological order.
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn row_to_record(row: PreferenceRow) -> Result<PreferenceRecord, PreferenceError> {
    let (id, user_id, category, raw_text, canonical_text, created_at) = row;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|_| PreferenceError::InvalidTimestamp(created_at.clone()))?
        .with_timezone(&Utc);
    Ok(PreferenceRecord {
        id,
        user_id,
        category: PreferenceCategory::parse(&category)?,
        raw_text,
        canonical_text,
        created_at,
    })
}
