//! The warehouse write contract and an in-memory implementation.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::keys::Dimension;
use crate::rows::{DimensionUpsert, FactRow};
use crate::WarehouseError;

/// Write contract the Dimensional Model Builder relies on.
///
/// The builder always calls `upsert_dimensions` strictly before the
/// `insert_facts` call whose rows reference the upserted keys. A sink that
/// cannot offer multi-table atomicity is still safe under that ordering:
/// a failure between the two calls leaves committed dimensions that the
/// retried batch re-upserts idempotently.
#[async_trait]
pub trait WarehouseSink: Send + Sync {
    /// Upsert dimension rows, idempotent by natural key.
    ///
    /// # Errors
    ///
    /// Returns a transient [`WarehouseError`] when the sink is unavailable.
    async fn upsert_dimensions(&self, rows: &[DimensionUpsert]) -> Result<(), WarehouseError>;

    /// Append fact rows. Every referenced surrogate key must already be
    /// committed to its dimension table.
    ///
    /// # Errors
    ///
    /// Returns a transient [`WarehouseError`] when the sink is unavailable.
    async fn insert_facts(&self, rows: &[FactRow]) -> Result<(), WarehouseError>;
}

#[derive(Debug, Default)]
struct MemoryTables {
    /// natural key → surrogate key, per dimension.
    dimensions: BTreeMap<Dimension, BTreeMap<String, i64>>,
    facts: Vec<FactRow>,
}

/// In-memory sink for tests: real tables, inspectable, with fact-insert
/// failure injection for crash-recovery scenarios.
#[derive(Debug, Default)]
pub struct MemorySink {
    tables: Mutex<MemoryTables>,
    fail_fact_inserts: AtomicU32,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` `insert_facts` calls fail with a transient error,
    /// simulating a crash after dimension commit but before fact commit.
    pub fn fail_next_fact_inserts(&self, n: u32) {
        self.fail_fact_inserts.store(n, Ordering::SeqCst);
    }

    /// Snapshot of one dimension table as (natural key, surrogate key) pairs.
    ///
    /// # Panics
    ///
    /// Panics if the table mutex is poisoned.
    #[must_use]
    pub fn dimension_rows(&self, dimension: Dimension) -> Vec<(String, i64)> {
        let tables = self.tables.lock().expect("memory sink mutex poisoned");
        tables
            .dimensions
            .get(&dimension)
            .map(|m| m.iter().map(|(k, &v)| (k.clone(), v)).collect())
            .unwrap_or_default()
    }

    /// Snapshot of the fact table.
    ///
    /// # Panics
    ///
    /// Panics if the table mutex is poisoned.
    #[must_use]
    pub fn facts(&self) -> Vec<FactRow> {
        let tables = self.tables.lock().expect("memory sink mutex poisoned");
        tables.facts.clone()
    }

    #[must_use]
    pub fn fact_count(&self) -> usize {
        self.facts().len()
    }

    /// Post-commit join check: `true` when every foreign key on every fact
    /// row resolves to an existing dimension row.
    #[must_use]
    pub fn referential_integrity_holds(&self) -> bool {
        let tables = self.tables.lock().expect("memory sink mutex poisoned");
        tables.facts.iter().all(|fact| {
            Dimension::ALL.iter().all(|&dim| {
                let key = fact.key_for(dim);
                tables
                    .dimensions
                    .get(&dim)
                    .is_some_and(|m| m.values().any(|&v| v == key))
            })
        })
    }
}

#[async_trait]
impl WarehouseSink for MemorySink {
    async fn upsert_dimensions(&self, rows: &[DimensionUpsert]) -> Result<(), WarehouseError> {
        let mut tables = self.tables.lock().expect("memory sink mutex poisoned");
        for row in rows {
            tables
                .dimensions
                .entry(row.dimension)
                .or_default()
                .entry(row.natural_key.clone())
                .or_insert(row.surrogate_key);
        }
        Ok(())
    }

    async fn insert_facts(&self, rows: &[FactRow]) -> Result<(), WarehouseError> {
        if self
            .fail_fact_inserts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(WarehouseError::SinkUnavailable(
                "injected fact-insert failure".to_string(),
            ));
        }
        let mut tables = self.tables.lock().expect("memory sink mutex poisoned");
        tables.facts.extend(rows.iter().cloned());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn upsert(dim: Dimension, key: i64, natural: &str) -> DimensionUpsert {
        DimensionUpsert {
            dimension: dim,
            surrogate_key: key,
            natural_key: natural.to_string(),
        }
    }

    fn fact(mention_id: &str) -> FactRow {
        FactRow {
            mention_id: mention_id.to_string(),
            date_key: 1,
            community_key: 1,
            ai_model_key: 1,
            sentiment_key: 1,
            topic_key: 1,
            author_key: 1,
            sentiment_score: 0.5,
            polarity: 0.2,
            subjectivity: 0.4,
            engagement_score: 3.0,
            parent_type: "post".to_string(),
            topics: vec!["coding".to_string()],
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn dimension_upsert_is_idempotent_by_natural_key() {
        let sink = MemorySink::new();
        sink.upsert_dimensions(&[upsert(Dimension::AiModel, 1, "Claude")])
            .await
            .unwrap();
        // Replay of the same natural key, even with a different staged key,
        // must not overwrite the committed mapping.
        sink.upsert_dimensions(&[upsert(Dimension::AiModel, 9, "Claude")])
            .await
            .unwrap();

        let rows = sink.dimension_rows(Dimension::AiModel);
        assert_eq!(rows, vec![("Claude".to_string(), 1)]);
    }

    #[tokio::test]
    async fn injected_failures_consume_and_recover() {
        let sink = MemorySink::new();
        sink.upsert_dimensions(&[
            upsert(Dimension::Date, 1, "2025-03-14"),
            upsert(Dimension::Community, 1, "r/artificial"),
            upsert(Dimension::AiModel, 1, "Claude"),
            upsert(Dimension::Sentiment, 1, "positive"),
            upsert(Dimension::Topic, 1, "coding"),
            upsert(Dimension::Author, 1, "alice"),
        ])
        .await
        .unwrap();

        sink.fail_next_fact_inserts(1);
        let err = sink.insert_facts(&[fact("m1")]).await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(sink.fact_count(), 0);

        sink.insert_facts(&[fact("m1")]).await.unwrap();
        assert_eq!(sink.fact_count(), 1);
        assert!(sink.referential_integrity_holds());
    }

    #[tokio::test]
    async fn integrity_check_catches_dangling_keys() {
        let sink = MemorySink::new();
        // Fact references keys that were never committed to any dimension.
        sink.insert_facts(&[fact("m1")]).await.unwrap();
        assert!(!sink.referential_integrity_holds());
    }
}
