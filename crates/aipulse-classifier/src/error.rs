use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClassifierError {
    /// Transient resource exhaustion (e.g. model OOM, inference queue full).
    /// The whole batch failed atomically; callers retry the whole batch.
    #[error("classifier resources exhausted: {0}")]
    Exhausted(String),

    /// The underlying model returned a result set that does not line up with
    /// the input batch. Contract violation; never retried.
    #[error("classifier returned {got} results for a batch of {expected}")]
    LengthMismatch { expected: usize, got: usize },
}

impl ClassifierError {
    /// `true` for failures worth retrying after a back-off delay.
    ///
    /// [`ClassifierError::LengthMismatch`] is a hard stop: retrying a model
    /// that violates the one-result-per-item contract will not fix it.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            ClassifierError::Exhausted(_) => true,
            ClassifierError::LengthMismatch { .. } => false,
        }
    }
}
