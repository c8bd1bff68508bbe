//! Keyword-based multi-label topic tagging.

use std::collections::BTreeSet;

/// Topic tags with the lowercase keywords that trigger them.
///
/// Matching is done against the lowercased mention body, so multi-word
/// keywords match across whitespace as written.
const TOPIC_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "coding",
        &[
            "code",
            "coding",
            "programming",
            "debug",
            "refactor",
            "compiler",
            "script",
        ],
    ),
    (
        "writing",
        &["essay", "writing", "blog post", "draft", "copywriting"],
    ),
    (
        "performance",
        &["fast", "slow", "latency", "speed", "benchmark", "tokens per second"],
    ),
    (
        "pricing",
        &["price", "pricing", "subscription", "expensive", "cheap", "free tier"],
    ),
    (
        "accuracy",
        &["hallucinat", "accurate", "accuracy", "wrong answer", "factual"],
    ),
    (
        "safety",
        &["refused", "refuses", "censored", "guardrail", "jailbreak", "safety"],
    ),
    (
        "comparison",
        &[" vs ", "versus", "better than", "compared to", "switch from"],
    ),
    (
        "context",
        &["context window", "context length", "token limit", "memory"],
    ),
];

/// Tag a mention body with zero or more topics.
///
/// The input is lowercased before matching; topic tags are returned sorted
/// (a `BTreeSet`), which makes the primary-topic choice deterministic
/// downstream. Unmatched text yields the empty set.
#[must_use]
pub fn tag_topics(text: &str) -> BTreeSet<String> {
    let lowered = text.to_lowercase();
    let mut tags = BTreeSet::new();
    for &(tag, keywords) in TOPIC_KEYWORDS {
        if keywords.iter().any(|kw| lowered.contains(kw)) {
            tags.insert(tag.to_string());
        }
    }
    tags
}
