//! Whole-batch retry with exponential back-off and jitter.
//!
//! [`classify_with_retry`] wraps a [`Classifier`] call and retries transient
//! failures ([`ClassifierError::Exhausted`]). Contract violations are
//! returned immediately without any retry.

use std::time::Duration;

use crate::adapter::{Classification, Classifier};
use crate::error::ClassifierError;

const MAX_DELAY_MS: u64 = 60_000;

/// Classify `batch` with up to `max_retries` additional attempts on
/// transient errors. The batch is retried as a whole; the [`Classifier`]
/// contract has no partial results to resume from.
///
/// Back-off schedule with `backoff_base_ms = 500`:
///
/// | Attempt | Sleep before next attempt    |
/// |---------|------------------------------|
/// | 1       | 500 ms × 2⁰ ± 25 % jitter   |
/// | 2       | 500 ms × 2¹ ± 25 % jitter   |
/// | 3       | 500 ms × 2² ± 25 % jitter   |
///
/// Delay is capped at 60 s.
///
/// # Errors
///
/// Returns the last [`ClassifierError`] once retries are exhausted, or a
/// non-transient error immediately. A result set whose length does not match
/// the batch is converted to [`ClassifierError::LengthMismatch`].
pub async fn classify_with_retry<C>(
    classifier: &C,
    batch: &[&str],
    max_retries: u32,
    backoff_base_ms: u64,
) -> Result<Vec<Classification>, ClassifierError>
where
    C: Classifier + ?Sized,
{
    let mut attempt = 0u32;
    loop {
        match classifier.classify(batch) {
            Ok(results) if results.len() == batch.len() => return Ok(results),
            Ok(results) => {
                return Err(ClassifierError::LengthMismatch {
                    expected: batch.len(),
                    got: results.len(),
                })
            }
            Err(err) => {
                if !err.is_transient() || attempt >= max_retries {
                    return Err(err);
                }
                attempt += 1;
                let computed = backoff_base_ms.saturating_mul(1u64 << (attempt - 1).min(10));
                let capped = computed.min(MAX_DELAY_MS);
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    clippy::cast_precision_loss
                )]
                let delay_ms = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_ms,
                    batch_len = batch.len(),
                    error = %err,
                    "classifier transient error, retrying batch after back-off"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::adapter::LexiconClassifier;

    /// Fails with a transient error for the first `fail_times` calls, then
    /// delegates to the lexicon classifier.
    struct FlakyClassifier {
        fail_times: u32,
        calls: AtomicU32,
    }

    impl Classifier for FlakyClassifier {
        fn classify(&self, batch: &[&str]) -> Result<Vec<Classification>, ClassifierError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_times {
                return Err(ClassifierError::Exhausted("inference queue full".into()));
            }
            LexiconClassifier::new().classify(batch)
        }
    }

    /// Always drops the last result, violating the length contract.
    struct TruncatingClassifier {
        calls: AtomicU32,
    }

    impl Classifier for TruncatingClassifier {
        fn classify(&self, batch: &[&str]) -> Result<Vec<Classification>, ClassifierError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut results = LexiconClassifier::new().classify(batch)?;
            results.pop();
            Ok(results)
        }
    }

    #[test]
    fn exhausted_is_transient() {
        assert!(ClassifierError::Exhausted("oom".into()).is_transient());
    }

    #[test]
    fn length_mismatch_is_not_transient() {
        assert!(!ClassifierError::LengthMismatch {
            expected: 2,
            got: 1
        }
        .is_transient());
    }

    #[tokio::test]
    async fn succeeds_immediately_on_first_try() {
        let classifier = FlakyClassifier {
            fail_times: 0,
            calls: AtomicU32::new(0),
        };
        let results = classify_with_retry(&classifier, &["great"], 3, 0)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_then_succeeds() {
        let classifier = FlakyClassifier {
            fail_times: 2,
            calls: AtomicU32::new(0),
        };
        let results = classify_with_retry(&classifier, &["great", "bad"], 3, 0)
            .await
            .unwrap();
        assert_eq!(results.len(), 2, "should succeed after retries");
        assert_eq!(
            classifier.calls.load(Ordering::SeqCst),
            3,
            "should have been called 3 times (2 failures + 1 success)"
        );
    }

    #[tokio::test]
    async fn exhausted_ceiling_returns_last_error() {
        let classifier = FlakyClassifier {
            fail_times: 10,
            calls: AtomicU32::new(0),
        };
        let err = classify_with_retry(&classifier, &["great"], 2, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, ClassifierError::Exhausted(_)));
        assert_eq!(
            classifier.calls.load(Ordering::SeqCst),
            3,
            "1 initial + 2 retries"
        );
    }

    #[tokio::test]
    async fn length_mismatch_is_not_retried() {
        let classifier = TruncatingClassifier {
            calls: AtomicU32::new(0),
        };
        let err = classify_with_retry(&classifier, &["great", "bad"], 3, 0)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClassifierError::LengthMismatch {
                expected: 2,
                got: 1
            }
        ));
        assert_eq!(
            classifier.calls.load(Ordering::SeqCst),
            1,
            "contract violations must not be retried"
        );
    }
}
