// SQLite-backed violation ledger.
//
// Tables:
// - safety_violations: append-only log of flagged attachments per user
//
// Timestamps are stored as RFC 3339 strings (UTC), which order
// lexicographically, so the window query is a plain string comparison.
// The pool gives every gate invocation read-your-writes visibility: an
// append followed by a count in the same invocation observes the fresh row.

use crate::core::moderation::{LedgerError, NewViolation, Violation, ViolationLedger};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Row, Sqlite};
use std::path::Path;

pub struct SqliteViolationStore {
    pool: Pool<Sqlite>,
}

impl SqliteViolationStore {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        // Ensure the file exists if it's a file path
        let path_str = database_url.trim_start_matches("sqlite://");
        if !database_url.contains(":memory:") && !Path::new(path_str).exists() {
            if let Some(parent) = Path::new(path_str).parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::File::create(path_str)?;
        }

        let conn_str = if database_url.starts_with("sqlite:") {
            database_url.to_string()
        } else {
            format!("sqlite://{}", database_url)
        };

        let pool = SqlitePoolOptions::new().connect(&conn_str).await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub fn from_pool(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Run database migrations to create required tables.
    pub async fn migrate(&self) -> Result<(), LedgerError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS safety_violations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                violation_type TEXT NOT NULL,
                details TEXT NOT NULL DEFAULT '{}',
                occurred_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_safety_violations_user_time
                ON safety_violations(user_id, occurred_at);
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| LedgerError::StorageError(e.to_string()))?;

        Ok(())
    }

    fn row_to_violation(row: &sqlx::sqlite::SqliteRow) -> Result<Violation, LedgerError> {
        let violation_type_str: String = row.get("violation_type");
        let violation_type = violation_type_str
            .parse()
            .map_err(LedgerError::StorageError)?;

        let details_str: String = row.get("details");
        let details = serde_json::from_str(&details_str)
            .map_err(|e| LedgerError::StorageError(e.to_string()))?;

        let occurred_at_str: String = row.get("occurred_at");
        let occurred_at = DateTime::parse_from_rfc3339(&occurred_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| LedgerError::StorageError(e.to_string()))?;

        Ok(Violation {
            id: row.get("id"),
            user_id: row.get::<i64, _>("user_id") as u64,
            violation_type,
            details,
            occurred_at,
        })
    }
}

#[async_trait]
impl ViolationLedger for SqliteViolationStore {
    async fn append(&self, violation: NewViolation) -> Result<Violation, LedgerError> {
        let details = serde_json::to_string(&violation.details)
            .map_err(|e| LedgerError::StorageError(e.to_string()))?;

        let result = sqlx::query(
            r#"
            INSERT INTO safety_violations (user_id, violation_type, details, occurred_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(violation.user_id as i64)
        .bind(violation.violation_type.to_string())
        .bind(&details)
        .bind(violation.occurred_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| LedgerError::StorageError(e.to_string()))?;

        Ok(Violation {
            id: result.last_insert_rowid(),
            user_id: violation.user_id,
            violation_type: violation.violation_type,
            details: violation.details,
            occurred_at: violation.occurred_at,
        })
    }

    async fn count_since(&self, user_id: u64, since: DateTime<Utc>) -> Result<u64, LedgerError> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS violation_count
            FROM safety_violations
            WHERE user_id = ? AND occurred_at >= ?
            "#,
        )
        .bind(user_id as i64)
        .bind(since.to_rfc3339())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| LedgerError::StorageError(e.to_string()))?;

        let count: i64 = row.get("violation_count");
        Ok(count as u64)
    }

    async fn recent_for_user(
        &self,
        user_id: u64,
        limit: u32,
    ) -> Result<Vec<Violation>, LedgerError> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, violation_type, details, occurred_at
            FROM safety_violations
            WHERE user_id = ?
            ORDER BY occurred_at DESC
            LIMIT ?
            "#,
        )
        .bind(user_id as i64)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| LedgerError::StorageError(e.to_string()))?;

        rows.iter().map(Self::row_to_violation).collect()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::moderation::ViolationType;

    async fn temp_store() -> (tempfile::TempDir, SqliteViolationStore) {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("violations.db");
        let store = SqliteViolationStore::new(db_path.to_str().unwrap())
            .await
            .unwrap();
        (dir, store)
    }

    fn new_violation(user_id: u64, occurred_at: DateTime<Utc>) -> NewViolation {
        NewViolation {
            user_id,
            violation_type: ViolationType::InappropriateImage,
            details: serde_json::json!({ "reason": "nudity", "confidence": 0.9 }),
            occurred_at,
        }
    }

    #[tokio::test]
    async fn test_append_assigns_ids_and_roundtrips() {
        let (_dir, store) = temp_store().await;
        let now = Utc::now();

        let first = store.append(new_violation(1, now)).await.unwrap();
        let second = store.append(new_violation(1, now)).await.unwrap();

        assert!(second.id > first.id);

        let history = store.recent_for_user(1, 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].violation_type, ViolationType::InappropriateImage);
        assert_eq!(history[0].details["reason"], "nudity");
    }

    #[tokio::test]
    async fn test_count_since_respects_sliding_window() {
        let (_dir, store) = temp_store().await;
        let now = Utc::now();

        store
            .append(new_violation(1, now - chrono::Duration::hours(25)))
            .await
            .unwrap();
        store
            .append(new_violation(1, now - chrono::Duration::hours(2)))
            .await
            .unwrap();
        store.append(new_violation(1, now)).await.unwrap();

        let since = now - chrono::Duration::hours(24);
        assert_eq!(store.count_since(1, since).await.unwrap(), 2);

        // Other users are unaffected.
        assert_eq!(store.count_since(2, since).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_count_since_is_inclusive_at_the_boundary() {
        let (_dir, store) = temp_store().await;
        let at = Utc::now();

        store.append(new_violation(1, at)).await.unwrap();

        assert_eq!(store.count_since(1, at).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_count_since_stable_without_appends() {
        let (_dir, store) = temp_store().await;
        let now = Utc::now();
        store.append(new_violation(1, now)).await.unwrap();
        let since = now - chrono::Duration::hours(24);

        let first = store.count_since(1, since).await.unwrap();
        let second = store.count_since(1, since).await.unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_recent_for_user_orders_and_limits() {
        let (_dir, store) = temp_store().await;
        let now = Utc::now();

        for hours_ago in [30i64, 10, 2] {
            store
                .append(new_violation(1, now - chrono::Duration::hours(hours_ago)))
                .await
                .unwrap();
        }

        let history = store.recent_for_user(1, 2).await.unwrap();

        assert_eq!(history.len(), 2);
        assert!(history[0].occurred_at > history[1].occurred_at);
    }

    #[tokio::test]
    async fn test_concurrent_appends_are_both_visible() {
        let (_dir, store) = temp_store().await;
        let now = Utc::now();

        let (a, b) = tokio::join!(
            store.append(new_violation(1, now)),
            store.append(new_violation(1, now)),
        );
        a.unwrap();
        b.unwrap();

        let since = now - chrono::Duration::hours(24);
        assert_eq!(store.count_since(1, since).await.unwrap(), 2);
    }
}
