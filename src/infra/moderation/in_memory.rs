// In-memory implementation of the violation ledger.
//
// Useful for tests and for running the CLI without touching a database.
// DashMap keeps appends from concurrent gate invocations safe without an
// explicit lock; ids come from a single atomic counter.

use crate::core::moderation::{LedgerError, NewViolation, Violation, ViolationLedger};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};

pub struct InMemoryViolationStore {
    /// Maps user_id -> append-only violation log
    violations: DashMap<u64, Vec<Violation>>,
    next_id: AtomicI64,
}

impl InMemoryViolationStore {
    pub fn new() -> Self {
        Self {
            violations: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }
}

impl Default for InMemoryViolationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ViolationLedger for InMemoryViolationStore {
    async fn append(&self, violation: NewViolation) -> Result<Violation, LedgerError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let stored = Violation {
            id,
            user_id: violation.user_id,
            violation_type: violation.violation_type,
            details: violation.details,
            occurred_at: violation.occurred_at,
        };

        self.violations
            .entry(violation.user_id)
            .or_default()
            .push(stored.clone());

        Ok(stored)
    }

    async fn count_since(&self, user_id: u64, since: DateTime<Utc>) -> Result<u64, LedgerError> {
        Ok(self
            .violations
            .get(&user_id)
            .map(|log| log.iter().filter(|v| v.occurred_at >= since).count() as u64)
            .unwrap_or(0))
    }

    async fn recent_for_user(
        &self,
        user_id: u64,
        limit: u32,
    ) -> Result<Vec<Violation>, LedgerError> {
        let mut log = self
            .violations
            .get(&user_id)
            .map(|v| v.clone())
            .unwrap_or_default();

        log.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
        log.truncate(limit as usize);
        Ok(log)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::moderation::ViolationType;

    fn new_violation(user_id: u64, occurred_at: DateTime<Utc>) -> NewViolation {
        NewViolation {
            user_id,
            violation_type: ViolationType::InappropriateImage,
            details: serde_json::json!({}),
            occurred_at,
        }
    }

    #[tokio::test]
    async fn test_append_and_count() {
        let store = InMemoryViolationStore::new();
        let now = Utc::now();

        store.append(new_violation(1, now)).await.unwrap();
        store
            .append(new_violation(1, now - chrono::Duration::hours(25)))
            .await
            .unwrap();

        let count = store
            .count_since(1, now - chrono::Duration::hours(24))
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_recent_for_user_is_most_recent_first() {
        let store = InMemoryViolationStore::new();
        let now = Utc::now();

        store
            .append(new_violation(1, now - chrono::Duration::hours(5)))
            .await
            .unwrap();
        store.append(new_violation(1, now)).await.unwrap();

        let history = store.recent_for_user(1, 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(history[0].occurred_at > history[1].occurred_at);
    }
}
