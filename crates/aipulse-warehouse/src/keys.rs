//! Surrogate-key allocation for the six dimensions.
//!
//! The natural-key→surrogate-key mapping is a stable bijection for the
//! lifetime of the warehouse: once assigned, a surrogate key is never
//! reassigned or reused for a different natural key. The maps are owned
//! exclusively by the [`crate::DimensionalModelBuilder`].

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// The six dimensions of the discussion star schema. `Ord` so dimensions can
/// key ordered maps (the in-memory sink stores its tables that way).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Date,
    Community,
    AiModel,
    Sentiment,
    Topic,
    Author,
}

impl Dimension {
    pub const ALL: [Dimension; 6] = [
        Dimension::Date,
        Dimension::Community,
        Dimension::AiModel,
        Dimension::Sentiment,
        Dimension::Topic,
        Dimension::Author,
    ];

    /// Dimension table name in the warehouse.
    #[must_use]
    pub fn table(self) -> &'static str {
        match self {
            Dimension::Date => "dim_date",
            Dimension::Community => "dim_community",
            Dimension::AiModel => "dim_ai_model",
            Dimension::Sentiment => "dim_sentiment",
            Dimension::Topic => "dim_topic",
            Dimension::Author => "dim_author",
        }
    }

    /// Surrogate-key column name, shared between the dimension table and the
    /// fact table's foreign-key column.
    #[must_use]
    pub fn key_column(self) -> &'static str {
        match self {
            Dimension::Date => "date_key",
            Dimension::Community => "community_key",
            Dimension::AiModel => "ai_model_key",
            Dimension::Sentiment => "sentiment_key",
            Dimension::Topic => "topic_key",
            Dimension::Author => "author_key",
        }
    }

    /// Natural-key column name in the dimension table.
    #[must_use]
    pub fn natural_column(self) -> &'static str {
        match self {
            Dimension::Date => "calendar_date",
            Dimension::Community => "community_name",
            Dimension::AiModel => "model_name",
            Dimension::Sentiment => "sentiment_label",
            Dimension::Topic => "topic_tag",
            Dimension::Author => "author_handle",
        }
    }
}

#[derive(Debug, Default)]
struct DimMap {
    keys: HashMap<String, i64>,
    next: i64,
}

impl DimMap {
    fn resolve(&mut self, natural_key: &str) -> (i64, bool) {
        if let Some(&key) = self.keys.get(natural_key) {
            return (key, false);
        }
        self.next += 1;
        let key = self.next;
        self.keys.insert(natural_key.to_string(), key);
        (key, true)
    }

    fn preload(&mut self, natural_key: &str, key: i64) {
        self.keys.insert(natural_key.to_string(), key);
        self.next = self.next.max(key);
    }
}

/// Mutex-guarded natural-key→surrogate-key maps, one per dimension.
///
/// Two workers may observe the same new natural key in the same instant;
/// the single lock guarantees they resolve to the same surrogate key.
#[derive(Debug, Default)]
pub struct SurrogateKeys {
    inner: Mutex<HashMap<Dimension, DimMap>>,
}

impl SurrogateKeys {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `natural_key`, allocating the next unused key (starting at 1,
    /// monotonically increasing, never reused) when absent. Returns the key
    /// and whether it was newly allocated.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned, which can only happen after
    /// a panic while holding the lock.
    pub fn resolve(&self, dimension: Dimension, natural_key: &str) -> (i64, bool) {
        let mut maps = self.inner.lock().expect("surrogate key mutex poisoned");
        maps.entry(dimension).or_default().resolve(natural_key)
    }

    /// Seed a mapping loaded from the warehouse at startup, so keys survive
    /// process restarts. Also advances the allocation counter past `key`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn preload(&self, dimension: Dimension, natural_key: &str, key: i64) {
        let mut maps = self.inner.lock().expect("surrogate key mutex poisoned");
        maps.entry(dimension).or_default().preload(natural_key, key);
    }

    /// Number of distinct natural keys currently mapped for `dimension`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn len(&self, dimension: Dimension) -> usize {
        let maps = self.inner.lock().expect("surrogate key mutex poisoned");
        maps.get(&dimension).map_or(0, |m| m.keys.len())
    }

    #[must_use]
    pub fn is_empty(&self, dimension: Dimension) -> bool {
        self.len(dimension) == 0
    }
}
