//! Enrichment pipeline: transport drain, deduplication, windowing, and the
//! hand-off to the dimensional model builder.
//!
//! One [`EnrichmentConsumer`] runs per transport partition; workers share
//! the [`Deduplicator`] and the builder. Transport offsets are acknowledged
//! only after the builder has durably committed the window, which gives the
//! pipeline at-least-once semantics end to end.

pub mod consumer;
pub mod dedup;
pub mod error;
pub mod transport;

pub use consumer::{ConsumerConfig, EnrichmentConsumer};
pub use dedup::Deduplicator;
pub use error::PipelineError;
pub use transport::{ChannelTransport, Delivery, MentionTransport};
