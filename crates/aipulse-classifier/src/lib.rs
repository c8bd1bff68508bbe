//! Classifier adapter for the aipulse pipeline.
//!
//! Wraps an opaque text-classification function behind the [`Classifier`]
//! trait: one batched, synchronous call per window, exactly one result per
//! input item, in input order. The default implementation scores mentions
//! with a domain lexicon and tags topics by keyword; swapping in a real
//! model is a matter of implementing the trait.

pub mod adapter;
pub mod error;
pub mod retry;
pub mod scorer;
pub mod topics;

pub use adapter::{Classification, Classifier, LexiconClassifier};
pub use error::ClassifierError;
pub use retry::classify_with_retry;
pub use scorer::lexicon_polarity;
pub use topics::tag_topics;
