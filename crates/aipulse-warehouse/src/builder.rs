//! The Dimensional Model Builder: enriched mentions in, star-schema rows out.
//!
//! Commit protocol per batch: resolve surrogate keys and stage all dimension
//! upserts, stage all fact rows referencing them, then commit dimensions
//! strictly before facts. A partial failure after dimension commit is safe
//! to retry (dimension upserts are idempotent by natural key); the staged
//! batch itself, not a re-staging, is what gets retried, so newly allocated
//! keys always reach the sink.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use aipulse_core::EnrichedMention;

use crate::fallback::FallbackStore;
use crate::keys::{Dimension, SurrogateKeys};
use crate::rows::{DimensionUpsert, FactRow, StagedBatch};
use crate::sink::WarehouseSink;
use crate::WarehouseError;

const MAX_DELAY_MS: u64 = 60_000;

/// Outcome of one committed batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub facts: usize,
    /// Dimension upserts the batch carried (one per distinct natural key it
    /// references; most are no-ops at the sink).
    pub dimension_upserts: usize,
}

/// Owns the surrogate-key maps (exclusively; no other component touches
/// them) and drives the two-phase commit against a [`WarehouseSink`].
pub struct DimensionalModelBuilder {
    keys: SurrogateKeys,
    sink: Arc<dyn WarehouseSink>,
    fallback: FallbackStore,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl DimensionalModelBuilder {
    #[must_use]
    pub fn new(
        sink: Arc<dyn WarehouseSink>,
        fallback: FallbackStore,
        max_retries: u32,
        backoff_base_ms: u64,
    ) -> Self {
        Self {
            keys: SurrogateKeys::new(),
            sink,
            fallback,
            max_retries,
            backoff_base_ms,
        }
    }

    /// The builder's key maps, e.g. for preloading from the warehouse at
    /// startup via [`crate::PgSink::load_existing_keys`].
    #[must_use]
    pub fn keys(&self) -> &SurrogateKeys {
        &self.keys
    }

    /// Resolve keys for one batch and stage its writes. An upsert is staged
    /// for every distinct natural key the batch references, whether or not
    /// the key was already resolved by an earlier window: that window's
    /// commit may not have reached the sink yet, and a batch that carries all
    /// of its own dimension rows can never insert a fact ahead of them.
    /// Redundant upserts are idempotent at the sink.
    #[must_use]
    pub fn stage(&self, batch: &[EnrichedMention]) -> StagedBatch {
        let mut staged = StagedBatch::default();
        let mut staged_keys: HashSet<(Dimension, String)> = HashSet::new();
        for mention in batch {
            let date_natural = mention.raw.created_date().to_string();
            let date_key =
                self.resolve_staged(&mut staged, &mut staged_keys, Dimension::Date, &date_natural);
            let community_key = self.resolve_staged(
                &mut staged,
                &mut staged_keys,
                Dimension::Community,
                &mention.raw.platform_community,
            );
            let ai_model_key = self.resolve_staged(
                &mut staged,
                &mut staged_keys,
                Dimension::AiModel,
                &mention.raw.mentioned_model,
            );
            let sentiment_key = self.resolve_staged(
                &mut staged,
                &mut staged_keys,
                Dimension::Sentiment,
                mention.sentiment_label.as_str(),
            );
            let topic_key = self.resolve_staged(
                &mut staged,
                &mut staged_keys,
                Dimension::Topic,
                mention.primary_topic(),
            );
            let author_key = self.resolve_staged(
                &mut staged,
                &mut staged_keys,
                Dimension::Author,
                &mention.raw.author_handle,
            );

            staged.facts.push(FactRow {
                mention_id: mention.raw.mention_id.clone(),
                date_key,
                community_key,
                ai_model_key,
                sentiment_key,
                topic_key,
                author_key,
                sentiment_score: mention.sentiment_score,
                polarity: mention.polarity,
                subjectivity: mention.subjectivity,
                engagement_score: mention.raw.engagement_score,
                parent_type: mention.raw.parent_type.as_str().to_string(),
                topics: mention.topics.iter().cloned().collect(),
                created_at: mention.raw.created_at,
            });
        }
        staged
    }

    fn resolve_staged(
        &self,
        staged: &mut StagedBatch,
        staged_keys: &mut HashSet<(Dimension, String)>,
        dimension: Dimension,
        natural_key: &str,
    ) -> i64 {
        let (key, _) = self.keys.resolve(dimension, natural_key);
        if staged_keys.insert((dimension, natural_key.to_string())) {
            staged.dimensions.push(DimensionUpsert {
                dimension,
                surrogate_key: key,
                natural_key: natural_key.to_string(),
            });
        }
        key
    }

    /// Stage and durably commit one batch of enriched mentions as a single
    /// logical unit.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError::RetryCeiling`] when transient sink failures
    /// exhaust the retry budget; the staged batch has then been persisted to
    /// the fallback store and intake should pause. Non-transient errors are
    /// returned as-is.
    pub async fn commit_batch(
        &self,
        batch: &[EnrichedMention],
    ) -> Result<BatchStats, WarehouseError> {
        if batch.is_empty() {
            return Ok(BatchStats::default());
        }
        let staged = self.stage(batch);
        let stats = BatchStats {
            facts: staged.facts.len(),
            dimension_upserts: staged.dimensions.len(),
        };

        match self.commit_staged(&staged).await {
            Ok(()) => {
                tracing::info!(
                    facts = stats.facts,
                    dimension_upserts = stats.dimension_upserts,
                    "batch committed"
                );
                Ok(stats)
            }
            Err(err) if err.is_transient() => {
                // Retry budget exhausted on a transient failure: park the
                // batch for manual replay and signal the pause upstream.
                let persisted_to = self.fallback.persist(&staged)?;
                tracing::error!(
                    error = %err,
                    persisted_to = %persisted_to.display(),
                    "sink retry ceiling hit, batch parked; pausing intake"
                );
                Err(WarehouseError::RetryCeiling {
                    attempts: self.max_retries + 1,
                    persisted_to,
                })
            }
            Err(err) => Err(err),
        }
    }

    /// Commit an already-staged batch: dimensions strictly before facts,
    /// retrying transient failures with exponential back-off and jitter.
    /// Used directly when replaying fallback batches.
    ///
    /// # Errors
    ///
    /// Returns the last transient [`WarehouseError`] once retries are
    /// exhausted, or a non-transient error immediately.
    pub async fn commit_staged(&self, staged: &StagedBatch) -> Result<(), WarehouseError> {
        if staged.is_empty() {
            return Ok(());
        }
        let mut attempt = 0u32;
        loop {
            match self.try_commit(staged).await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    if !err.is_transient() || attempt >= self.max_retries {
                        return Err(err);
                    }
                    attempt += 1;
                    let computed = self
                        .backoff_base_ms
                        .saturating_mul(1u64 << (attempt - 1).min(10));
                    let capped = computed.min(MAX_DELAY_MS);
                    #[allow(
                        clippy::cast_possible_truncation,
                        clippy::cast_sign_loss,
                        clippy::cast_precision_loss
                    )]
                    let delay_ms = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
                    tracing::warn!(
                        attempt,
                        max_retries = self.max_retries,
                        delay_ms,
                        error = %err,
                        "sink transient error, retrying batch after back-off"
                    );
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
            }
        }
    }

    async fn try_commit(&self, staged: &StagedBatch) -> Result<(), WarehouseError> {
        // Dimensions first. Never the reverse: a fact row must not reach the
        // sink before the dimension rows it references.
        self.sink.upsert_dimensions(&staged.dimensions).await?;
        self.sink.insert_facts(&staged.facts).await?;
        Ok(())
    }

    /// Replay every batch in the fallback store, removing files that commit.
    /// Returns the number of batches replayed.
    ///
    /// # Errors
    ///
    /// Stops at the first batch that fails to commit and returns its error.
    pub async fn replay_fallback(&self) -> Result<usize, WarehouseError> {
        let mut replayed = 0usize;
        for path in self.fallback.list()? {
            let staged = self.fallback.load(&path)?;
            self.commit_staged(&staged).await?;
            self.fallback.remove(&path)?;
            tracing::info!(path = %path.display(), "fallback batch replayed");
            replayed += 1;
        }
        Ok(replayed)
    }
}
