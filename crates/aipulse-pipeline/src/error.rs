use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Transient transport failure; retried with back-off up to a ceiling,
    /// then fatal.
    #[error("transport error: {0}")]
    Transport(String),

    /// The transport has no more data and never will (e.g. the producer side
    /// of an in-memory channel was dropped). Workers drain and exit cleanly.
    #[error("transport closed")]
    TransportClosed,

    #[error(transparent)]
    Classifier(#[from] aipulse_classifier::ClassifierError),

    #[error(transparent)]
    Warehouse(#[from] aipulse_warehouse::WarehouseError),
}
