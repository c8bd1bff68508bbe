//! Domain-specific lexicon scorer for AI-assistant discussion sentiment.

/// Domain-specific word weights.
///
/// Keys are lowercase single words. Values in `(0.0, 1.0]` are positive,
/// in `[-1.0, 0.0)` are negative. The final polarity is clamped to `[-1.0, 1.0]`.
pub(crate) const LEXICON: &[(&str, f32)] = &[
    // Positive signals
    ("great", 0.4),
    ("good", 0.3),
    ("excellent", 0.5),
    ("amazing", 0.5),
    ("impressive", 0.4),
    ("helpful", 0.4),
    ("useful", 0.3),
    ("smart", 0.3),
    ("fast", 0.3),
    ("love", 0.5),
    ("loved", 0.5),
    ("best", 0.5),
    ("recommend", 0.4),
    ("accurate", 0.4),
    ("reliable", 0.4),
    ("improved", 0.3),
    ("better", 0.2),
    ("win", 0.4),
    ("incredible", 0.5),
    ("okay", 0.1),
    // Negative signals
    ("bad", -0.4),
    ("terrible", -0.6),
    ("worst", -0.6),
    ("useless", -0.6),
    ("slow", -0.3),
    ("expensive", -0.3),
    ("hallucinate", -0.5),
    ("hallucinates", -0.5),
    ("hallucination", -0.5),
    ("wrong", -0.4),
    ("broken", -0.5),
    ("buggy", -0.5),
    ("lazy", -0.4),
    ("overrated", -0.5),
    ("disappointing", -0.5),
    ("disappointed", -0.5),
    ("nerfed", -0.5),
    ("downgrade", -0.4),
    ("refused", -0.3),
    ("refuses", -0.3),
    ("censored", -0.4),
    ("scam", -0.7),
    ("worse", -0.3),
];

/// Score a text string's polarity using the domain lexicon.
///
/// Splits text into lowercase words, sums matching weights, and clamps
/// the result to `[-1.0, 1.0]`. Returns `0.0` for empty or unknown text.
#[must_use]
pub fn lexicon_polarity(text: &str) -> f32 {
    let mut score = 0.0_f32;
    for word in text.split_whitespace() {
        let w = word
            .trim_matches(|c: char| !c.is_alphabetic())
            .to_lowercase();
        for &(lex_word, weight) in LEXICON {
            if w == lex_word {
                score += weight;
                break;
            }
        }
    }
    score.clamp(-1.0, 1.0)
}

/// Fraction of words carrying any lexicon weight, as a subjectivity proxy
/// in `[0.0, 1.0]`. Empty text scores `0.0`.
#[must_use]
pub fn lexicon_subjectivity(text: &str) -> f32 {
    let mut total = 0usize;
    let mut opinionated = 0usize;
    for word in text.split_whitespace() {
        total += 1;
        let w = word
            .trim_matches(|c: char| !c.is_alphabetic())
            .to_lowercase();
        if LEXICON.iter().any(|&(lex_word, _)| w == lex_word) {
            opinionated += 1;
        }
    }
    if total == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let ratio = opinionated as f32 / total as f32;
    ratio.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_returns_zero() {
        assert_eq!(lexicon_polarity(""), 0.0);
    }

    #[test]
    fn whitespace_only_returns_zero() {
        assert_eq!(lexicon_polarity("   "), 0.0);
    }

    #[test]
    fn unknown_text_returns_zero() {
        assert_eq!(lexicon_polarity("the quick brown fox"), 0.0);
    }

    #[test]
    fn positive_keyword_returns_positive() {
        let score = lexicon_polarity("Claude is great at this");
        assert!(score > 0.0, "expected positive score, got {score}");
    }

    #[test]
    fn negative_keyword_returns_negative() {
        let score = lexicon_polarity("the model hallucinates constantly");
        assert!(score < 0.0, "expected negative score, got {score}");
    }

    #[test]
    fn mixed_text_returns_intermediate() {
        let score = lexicon_polarity("great model but the api is broken");
        // great (+0.4) + broken (-0.5) = -0.1
        assert!(
            score > -1.0 && score < 1.0,
            "expected intermediate score, got {score}"
        );
    }

    #[test]
    fn score_clamps_to_positive_one() {
        let text = "great excellent best love recommend amazing impressive helpful reliable";
        let score = lexicon_polarity(text);
        assert_eq!(score, 1.0, "expected score clamped to 1.0, got {score}");
    }

    #[test]
    fn score_clamps_to_negative_one() {
        let text = "terrible worst useless broken buggy overrated disappointing scam";
        let score = lexicon_polarity(text);
        assert_eq!(score, -1.0, "expected score clamped to -1.0, got {score}");
    }

    #[test]
    fn punctuation_stripped_from_words() {
        // "great!" should match "great"
        let score = lexicon_polarity("great!");
        assert!(
            score > 0.0,
            "expected positive score for 'great!', got {score}"
        );
    }

    #[test]
    fn subjectivity_zero_for_empty_text() {
        assert_eq!(lexicon_subjectivity(""), 0.0);
    }

    #[test]
    fn subjectivity_counts_opinionated_fraction() {
        // 1 of 4 words carries weight
        let s = lexicon_subjectivity("this model is great");
        assert!((s - 0.25).abs() < f32::EPSILON, "expected 0.25, got {s}");
    }

    #[test]
    fn subjectivity_stays_in_unit_range() {
        let s = lexicon_subjectivity("great terrible amazing worst");
        assert!((0.0..=1.0).contains(&s));
        assert_eq!(s, 1.0);
    }
}
