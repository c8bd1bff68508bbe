//! The [`Classifier`] trait and the default lexicon-based implementation.

use std::collections::BTreeSet;

use aipulse_core::SentimentLabel;

use crate::error::ClassifierError;
use crate::scorer::{lexicon_polarity, lexicon_subjectivity};
use crate::topics::tag_topics;

/// Polarity beyond this magnitude is labelled positive/negative; inside it,
/// neutral.
const NEUTRAL_BAND: f32 = 0.05;

/// One classification result, attached to exactly one input text.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub sentiment_label: SentimentLabel,
    /// Model confidence for the label, in `[0.0, 1.0]`.
    pub sentiment_score: f32,
    /// Polarity in `[-1.0, 1.0]`.
    pub polarity: f32,
    /// Subjectivity in `[0.0, 1.0]`.
    pub subjectivity: f32,
    pub topics: BTreeSet<String>,
}

impl Classification {
    /// The defined degraded-input default: neutral label, zero scores, no
    /// topics. Used for empty text after normalization instead of failing
    /// the batch.
    #[must_use]
    pub fn neutral_default() -> Self {
        Self {
            sentiment_label: SentimentLabel::Neutral,
            sentiment_score: 0.0,
            polarity: 0.0,
            subjectivity: 0.0,
            topics: BTreeSet::new(),
        }
    }
}

/// The opaque text-classification boundary.
///
/// Contract: `classify` returns exactly one result per input item, in input
/// order, never partial results. A transient failure fails the whole batch
/// atomically (callers retry via [`crate::classify_with_retry`]); degenerate
/// single items degrade to [`Classification::neutral_default`] instead.
///
/// Implementations must be stateless with respect to calls: the pipeline
/// invokes one shared instance from multiple workers concurrently.
pub trait Classifier: Send + Sync {
    /// Classify a batch of texts.
    ///
    /// # Errors
    ///
    /// Returns [`ClassifierError::Exhausted`] on transient resource
    /// exhaustion (the whole batch fails, nothing is partially classified).
    fn classify(&self, batch: &[&str]) -> Result<Vec<Classification>, ClassifierError>;
}

/// Default classifier: domain lexicon for sentiment, keyword matching for
/// topics. Pure computation, no external calls, trivially concurrent.
#[derive(Debug, Default, Clone)]
pub struct LexiconClassifier;

impl LexiconClassifier {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn classify_one(text: &str) -> Classification {
        // Original case is preserved for scoring; topic matching lowercases
        // internally.
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Classification::neutral_default();
        }

        let polarity = lexicon_polarity(trimmed);
        let subjectivity = lexicon_subjectivity(trimmed);
        let topics = tag_topics(trimmed);

        let (sentiment_label, sentiment_score) = if polarity > NEUTRAL_BAND {
            (SentimentLabel::Positive, polarity.abs())
        } else if polarity < -NEUTRAL_BAND {
            (SentimentLabel::Negative, polarity.abs())
        } else {
            // Confidence in "neutral" shrinks as polarity approaches the band.
            (SentimentLabel::Neutral, 1.0 - polarity.abs())
        };

        Classification {
            sentiment_label,
            sentiment_score: sentiment_score.clamp(0.0, 1.0),
            polarity,
            subjectivity,
            topics,
        }
    }
}

impl Classifier for LexiconClassifier {
    fn classify(&self, batch: &[&str]) -> Result<Vec<Classification>, ClassifierError> {
        Ok(batch.iter().map(|text| Self::classify_one(text)).collect())
    }
}
