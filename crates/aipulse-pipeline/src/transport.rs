//! The durable-transport boundary.
//!
//! The broker itself is external; the pipeline sees one partition per worker
//! through [`MentionTransport`]. Delivery is at-least-once and unordered
//! across partitions; offsets are per partition and acknowledged only after
//! the warehouse commit for the window that contained them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use aipulse_core::RawMention;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::sync::Mutex;

use crate::error::PipelineError;

/// One message as pulled from a partition.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub offset: u64,
    pub mention: RawMention,
}

/// One exclusively-owned transport partition.
#[async_trait]
pub trait MentionTransport: Send + Sync {
    /// Wait up to `max_wait` for the next delivery. `Ok(None)` means the
    /// wait elapsed with no data.
    ///
    /// # Errors
    ///
    /// [`PipelineError::TransportClosed`] when no more data will ever arrive;
    /// [`PipelineError::Transport`] for transient read failures.
    async fn next(&self, max_wait: Duration) -> Result<Option<Delivery>, PipelineError>;

    /// Acknowledge every offset up to and including `offset`. Called once
    /// per window, strictly after the warehouse commit.
    ///
    /// # Errors
    ///
    /// [`PipelineError::Transport`] if the acknowledgment cannot be recorded.
    async fn ack(&self, offset: u64) -> Result<(), PipelineError>;
}

#[async_trait]
impl<T: MentionTransport + ?Sized> MentionTransport for std::sync::Arc<T> {
    async fn next(&self, max_wait: Duration) -> Result<Option<Delivery>, PipelineError> {
        (**self).next(max_wait).await
    }

    async fn ack(&self, offset: u64) -> Result<(), PipelineError> {
        (**self).ack(offset).await
    }
}

/// In-memory partition backed by a tokio mpsc channel. Used by tests and by
/// the CLI's stdin feed; a broker-backed implementation slots in behind the
/// same trait.
pub struct ChannelTransport {
    rx: Mutex<mpsc::Receiver<Delivery>>,
    acked: AtomicU64,
}

impl ChannelTransport {
    /// Create a partition and the sender that feeds it.
    #[must_use]
    pub fn pair(buffer: usize) -> (mpsc::Sender<Delivery>, Self) {
        let (tx, rx) = mpsc::channel(buffer);
        (
            tx,
            Self {
                rx: Mutex::new(rx),
                acked: AtomicU64::new(0),
            },
        )
    }

    /// Highest acknowledged offset, 0 when nothing is acked yet.
    #[must_use]
    pub fn acked_offset(&self) -> u64 {
        self.acked.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MentionTransport for ChannelTransport {
    async fn next(&self, max_wait: Duration) -> Result<Option<Delivery>, PipelineError> {
        let mut rx = self.rx.lock().await;
        match tokio::time::timeout(max_wait, rx.recv()).await {
            Ok(Some(delivery)) => Ok(Some(delivery)),
            Ok(None) => Err(PipelineError::TransportClosed),
            Err(_elapsed) => Ok(None),
        }
    }

    async fn ack(&self, offset: u64) -> Result<(), PipelineError> {
        self.acked.fetch_max(offset, Ordering::SeqCst);
        Ok(())
    }
}
