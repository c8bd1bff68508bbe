//! The enrichment consumer: one windowing loop per transport partition.

use std::sync::Arc;
use std::time::{Duration, Instant};

use aipulse_classifier::{classify_with_retry, Classifier};
use aipulse_core::{AppConfig, EnrichedMention, RawMention};
use aipulse_warehouse::DimensionalModelBuilder;
use tokio::sync::watch;

use crate::dedup::Deduplicator;
use crate::error::PipelineError;
use crate::transport::{Delivery, MentionTransport};

const MAX_TRANSPORT_DELAY_MS: u64 = 60_000;

/// Per-worker pipeline settings, usually derived from [`AppConfig`].
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    pub window_max_items: usize,
    pub window_max_wait: Duration,
    pub classifier_max_retries: u32,
    pub classifier_backoff_base_ms: u64,
    pub transport_max_retries: u32,
    pub transport_backoff_base_ms: u64,
}

impl ConsumerConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            window_max_items: config.window_max_items,
            window_max_wait: Duration::from_secs(config.window_max_wait_secs),
            classifier_max_retries: config.classifier_max_retries,
            classifier_backoff_base_ms: config.classifier_backoff_base_ms,
            transport_max_retries: config.transport_max_retries,
            transport_backoff_base_ms: config.transport_backoff_base_ms,
        }
    }
}

/// How a window ended. `Shutdown` and `Closed` terminate the worker after
/// the final window commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WindowEnd {
    Full,
    Deadline,
    Shutdown,
    Closed,
}

/// Drains one partition: deduplicate, window, classify, hand the window to
/// the builder, then acknowledge offsets.
pub struct EnrichmentConsumer<T: MentionTransport> {
    partition: usize,
    transport: T,
    dedup: Arc<Deduplicator>,
    classifier: Arc<dyn Classifier>,
    builder: Arc<DimensionalModelBuilder>,
    config: ConsumerConfig,
}

impl<T: MentionTransport> EnrichmentConsumer<T> {
    #[must_use]
    pub fn new(
        partition: usize,
        transport: T,
        dedup: Arc<Deduplicator>,
        classifier: Arc<dyn Classifier>,
        builder: Arc<DimensionalModelBuilder>,
        config: ConsumerConfig,
    ) -> Self {
        Self {
            partition,
            transport,
            dedup,
            classifier,
            builder,
            config,
        }
    }

    /// Run the windowing loop until shutdown is signalled or the transport
    /// closes. The in-flight window always finishes its commit and ack
    /// before the worker exits (graceful drain).
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] when the classifier or sink retry ceiling
    /// is hit, or when transport reads fail beyond the retry budget. Offsets
    /// for the failed window are not acknowledged, so the transport will
    /// redeliver.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), PipelineError> {
        tracing::info!(partition = self.partition, "consumer worker started");
        loop {
            let (window, end) = self.fill_window(&mut shutdown).await?;
            if !window.is_empty() {
                self.process_window(window).await?;
            }
            match end {
                WindowEnd::Full | WindowEnd::Deadline => {}
                WindowEnd::Shutdown => {
                    tracing::info!(partition = self.partition, "worker drained after shutdown");
                    return Ok(());
                }
                WindowEnd::Closed => {
                    tracing::info!(partition = self.partition, "transport closed, worker done");
                    return Ok(());
                }
            }
        }
    }

    /// Accumulate deliveries until the item threshold is reached OR the max
    /// wait elapses, whichever first.
    async fn fill_window(
        &self,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<(Vec<Delivery>, WindowEnd), PipelineError> {
        let deadline = Instant::now() + self.config.window_max_wait;
        let mut window = Vec::new();
        loop {
            if window.len() >= self.config.window_max_items {
                return Ok((window, WindowEnd::Full));
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok((window, WindowEnd::Deadline));
            }
            tokio::select! {
                changed = shutdown.changed() => {
                    // A dropped sender counts as shutdown.
                    if changed.is_err() || *shutdown.borrow() {
                        return Ok((window, WindowEnd::Shutdown));
                    }
                }
                next = self.next_with_retry(remaining) => match next {
                    Ok(Some(delivery)) => window.push(delivery),
                    Ok(None) => return Ok((window, WindowEnd::Deadline)),
                    Err(PipelineError::TransportClosed) => {
                        return Ok((window, WindowEnd::Closed));
                    }
                    Err(err) => return Err(err),
                },
            }
        }
    }

    /// One transport read with bounded retries on transient errors. A closed
    /// transport propagates immediately; exhausting the budget is fatal, so
    /// the consumer halts rather than silently dropping data.
    async fn next_with_retry(
        &self,
        max_wait: Duration,
    ) -> Result<Option<Delivery>, PipelineError> {
        let mut attempt = 0u32;
        loop {
            match self.transport.next(max_wait).await {
                Ok(delivery) => return Ok(delivery),
                Err(PipelineError::TransportClosed) => return Err(PipelineError::TransportClosed),
                Err(err) => {
                    if attempt >= self.config.transport_max_retries {
                        tracing::error!(
                            partition = self.partition,
                            error = %err,
                            "transport unreachable beyond retry budget, halting"
                        );
                        return Err(err);
                    }
                    attempt += 1;
                    let computed = self
                        .config
                        .transport_backoff_base_ms
                        .saturating_mul(1u64 << (attempt - 1).min(10));
                    let capped = computed.min(MAX_TRANSPORT_DELAY_MS);
                    #[allow(
                        clippy::cast_possible_truncation,
                        clippy::cast_sign_loss,
                        clippy::cast_precision_loss
                    )]
                    let delay_ms = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
                    tracing::warn!(
                        partition = self.partition,
                        attempt,
                        delay_ms,
                        error = %err,
                        "transport read error, retrying after back-off"
                    );
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
            }
        }
    }

    /// Process one closed window: claim IDs in the dedup set, classify the
    /// survivors as one batch, commit them through the builder as one unit,
    /// then acknowledge every offset the window contained (duplicates
    /// included: they were consumed, just dropped).
    async fn process_window(&self, window: Vec<Delivery>) -> Result<(), PipelineError> {
        let total = window.len();
        let max_offset = window.iter().map(|d| d.offset).max();

        // Claim before classification: an ID is marked the moment a worker
        // takes it, so a concurrent redelivery on another partition can
        // never be double-processed.
        let fresh: Vec<RawMention> = window
            .into_iter()
            .filter(|d| self.dedup.check_and_mark(&d.mention.mention_id))
            .map(|d| d.mention)
            .collect();
        let duplicates = total - fresh.len();

        if !fresh.is_empty() {
            let texts: Vec<&str> = fresh.iter().map(|m| m.body.as_str()).collect();
            let classifications = classify_with_retry(
                self.classifier.as_ref(),
                &texts,
                self.config.classifier_max_retries,
                self.config.classifier_backoff_base_ms,
            )
            .await?;

            let enriched: Vec<EnrichedMention> = fresh
                .into_iter()
                .zip(classifications)
                .map(|(raw, c)| EnrichedMention {
                    raw,
                    sentiment_label: c.sentiment_label,
                    sentiment_score: c.sentiment_score,
                    polarity: c.polarity,
                    subjectivity: c.subjectivity,
                    topics: c.topics,
                })
                .collect();

            let stats = self.builder.commit_batch(&enriched).await?;
            tracing::info!(
                partition = self.partition,
                window_items = total,
                duplicates,
                facts = stats.facts,
                dimension_upserts = stats.dimension_upserts,
                "window committed"
            );
        } else {
            tracing::debug!(
                partition = self.partition,
                window_items = total,
                "window contained only duplicates"
            );
        }

        // Offsets advance only after the commit above has returned.
        if let Some(offset) = max_offset {
            self.transport.ack(offset).await?;
        }
        Ok(())
    }
}
