//! Staged row types handed to a [`crate::WarehouseSink`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::keys::Dimension;

/// One dimension-row upsert: a surrogate key paired with its natural key.
/// Idempotent by natural key: re-upserting an existing natural key is a
/// no-op at the sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionUpsert {
    pub dimension: Dimension,
    pub surrogate_key: i64,
    pub natural_key: String,
}

/// One fact row, referencing the surrogate keys of all six dimensions.
///
/// Every key here must already exist in its dimension table when the row is
/// inserted; the builder's commit ordering guarantees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactRow {
    pub mention_id: String,
    pub date_key: i64,
    pub community_key: i64,
    pub ai_model_key: i64,
    pub sentiment_key: i64,
    pub topic_key: i64,
    pub author_key: i64,
    pub sentiment_score: f32,
    pub polarity: f32,
    pub subjectivity: f32,
    pub engagement_score: f64,
    pub parent_type: String,
    /// Full multi-label tag set; the `topic_key` FK covers the primary tag only.
    pub topics: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl FactRow {
    /// The surrogate key this row holds for `dimension`.
    #[must_use]
    pub fn key_for(&self, dimension: Dimension) -> i64 {
        match dimension {
            Dimension::Date => self.date_key,
            Dimension::Community => self.community_key,
            Dimension::AiModel => self.ai_model_key,
            Dimension::Sentiment => self.sentiment_key,
            Dimension::Topic => self.topic_key,
            Dimension::Author => self.author_key,
        }
    }
}

/// One window's worth of staged writes: all dimension upserts, then all fact
/// rows that reference them. Committed as one logical unit, dimensions first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StagedBatch {
    pub dimensions: Vec<DimensionUpsert>,
    pub facts: Vec<FactRow>,
}

impl StagedBatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty() && self.facts.is_empty()
    }
}
