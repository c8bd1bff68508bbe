//! Shared data-model types and configuration for the aipulse pipeline.
//!
//! A *mention* is one social-platform post or comment referencing a tracked
//! AI assistant. [`RawMention`] is the immutable record produced upstream;
//! [`EnrichedMention`] is the same record after classification has attached
//! sentiment and topic signals.

mod app_config;
mod config;

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};

/// Whether a mention originated as a top-level post or a comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParentType {
    Post,
    Comment,
}

impl ParentType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ParentType::Post => "post",
            ParentType::Comment => "comment",
        }
    }
}

impl std::str::FromStr for ParentType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "post" => Ok(ParentType::Post),
            "comment" => Ok(ParentType::Comment),
            other => Err(CoreError::InvalidParentType(other.to_string())),
        }
    }
}

/// Sentiment bucket assigned by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

impl SentimentLabel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Neutral => "neutral",
            SentimentLabel::Negative => "negative",
        }
    }
}

impl std::str::FromStr for SentimentLabel {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "positive" => Ok(SentimentLabel::Positive),
            "neutral" => Ok(SentimentLabel::Neutral),
            "negative" => Ok(SentimentLabel::Negative),
            other => Err(CoreError::InvalidSentimentLabel(other.to_string())),
        }
    }
}

/// One raw mention as delivered by the transport. Immutable once produced.
///
/// `mention_id` is globally unique and source-assigned; the pipeline never
/// generates or rewrites it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMention {
    pub mention_id: String,
    pub platform_community: String,
    pub author_handle: String,
    pub created_at: DateTime<Utc>,
    pub body: String,
    pub parent_type: ParentType,
    /// Which AI assistant the mention references, e.g. `"Claude"`.
    pub mentioned_model: String,
    pub engagement_score: f64,
}

impl RawMention {
    /// Calendar date of `created_at` in UTC. Natural key of the Date dimension.
    #[must_use]
    pub fn created_date(&self) -> NaiveDate {
        self.created_at.date_naive()
    }
}

/// A mention after classification. Produced exactly once per distinct
/// `mention_id` that survives deduplication; immutable thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedMention {
    pub raw: RawMention,
    pub sentiment_label: SentimentLabel,
    /// Model confidence for `sentiment_label`, in `[0.0, 1.0]`.
    pub sentiment_score: f32,
    /// Polarity in `[-1.0, 1.0]`.
    pub polarity: f32,
    /// Subjectivity in `[0.0, 1.0]`.
    pub subjectivity: f32,
    /// Multi-label topic tags. Sorted so the first tag is the deterministic
    /// primary topic used for the Topic dimension.
    pub topics: BTreeSet<String>,
}

impl EnrichedMention {
    /// The single topic tag used as the Topic dimension's natural key:
    /// the lexicographically first tag, or `"general"` when untagged.
    #[must_use]
    pub fn primary_topic(&self) -> &str {
        self.topics
            .iter()
            .next()
            .map_or("general", String::as_str)
    }
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid parent type: {0}")]
    InvalidParentType(String),
    #[error("invalid sentiment label: {0}")]
    InvalidSentimentLabel(String),
}

/// Configuration loading failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use chrono::TimeZone;

    use super::*;

    fn mention(body: &str) -> RawMention {
        RawMention {
            mention_id: "t3_abc123".to_string(),
            platform_community: "r/artificial".to_string(),
            author_handle: "alice".to_string(),
            created_at: Utc.with_ymd_and_hms(2025, 3, 14, 15, 9, 26).unwrap(),
            body: body.to_string(),
            parent_type: ParentType::Post,
            mentioned_model: "Claude".to_string(),
            engagement_score: 12.0,
        }
    }

    #[test]
    fn parent_type_round_trips_through_str() {
        assert_eq!(ParentType::from_str("post").unwrap(), ParentType::Post);
        assert_eq!(
            ParentType::from_str("comment").unwrap(),
            ParentType::Comment
        );
        assert!(ParentType::from_str("thread").is_err());
    }

    #[test]
    fn sentiment_label_round_trips_through_str() {
        for label in [
            SentimentLabel::Positive,
            SentimentLabel::Neutral,
            SentimentLabel::Negative,
        ] {
            assert_eq!(SentimentLabel::from_str(label.as_str()).unwrap(), label);
        }
        assert!(SentimentLabel::from_str("mixed").is_err());
    }

    #[test]
    fn created_date_truncates_to_calendar_date() {
        let m = mention("Claude is great");
        assert_eq!(
            m.created_date(),
            NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()
        );
    }

    #[test]
    fn primary_topic_is_first_sorted_tag() {
        let mut e = EnrichedMention {
            raw: mention("coding with Claude"),
            sentiment_label: SentimentLabel::Positive,
            sentiment_score: 0.8,
            polarity: 0.4,
            subjectivity: 0.5,
            topics: BTreeSet::new(),
        };
        assert_eq!(e.primary_topic(), "general");

        e.topics.insert("performance".to_string());
        e.topics.insert("coding".to_string());
        assert_eq!(e.primary_topic(), "coding");
    }

    #[test]
    fn raw_mention_serde_round_trip() {
        let m = mention("GPT-4 is okay");
        let json = serde_json::to_string(&m).unwrap();
        let back: RawMention = serde_json::from_str(&json).unwrap();
        assert_eq!(back.mention_id, m.mention_id);
        assert_eq!(back.parent_type, ParentType::Post);
        assert_eq!(back.created_at, m.created_at);
    }

    #[test]
    fn parent_type_serializes_lowercase() {
        let json = serde_json::to_string(&ParentType::Comment).unwrap();
        assert_eq!(json, "\"comment\"");
    }
}
