//! Keyword tables driving the rule-based text analytics.
//!
//! The tables are plain, immutable data injected into the analyzers at
//! construction, so deployments can ship their own vocabulary and tests can
//! substitute small fixtures. `Lexicon::default()` returns the built-in
//! trainer-feedback set.

use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// One topic category: a display name plus the keywords counted toward it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicEntry {
    pub name: String,
    pub keywords: Vec<String>,
}

impl TopicEntry {
    pub fn new(name: &str, keywords: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            keywords: words(keywords),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Lexicon {
    pub positive_words: Vec<String>,
    pub negative_words: Vec<String>,
    pub neutral_words: Vec<String>,
    pub topics: Vec<TopicEntry>,
    pub positive_emoji: Vec<char>,
    pub negative_emoji: Vec<char>,
    /// Words excluded from key-phrase extraction. Tokens of three characters
    /// or fewer are dropped regardless, so only longer words belong here.
    pub stop_words: Vec<String>,
    /// Substrings marking a checkbox selection as favorable.
    pub positive_selection_terms: Vec<String>,
    /// Substrings marking a checkbox selection as unfavorable.
    pub negative_selection_terms: Vec<String>,
}

impl Default for Lexicon {
    fn default() -> Self {
        BUILT_IN.clone()
    }
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| w.to_string()).collect()
}

static BUILT_IN: LazyLock<Lexicon> = LazyLock::new(|| Lexicon {
    positive_words: words(&[
        "excellent",
        "great",
        "wonderful",
        "amazing",
        "fantastic",
        "awesome",
        "good",
        "helpful",
        "clear",
        "engaging",
        "knowledgeable",
        "outstanding",
        "brilliant",
        "superb",
        "effective",
        "informative",
        "enjoyable",
        "valuable",
        "insightful",
        "professional",
    ]),
    negative_words: words(&[
        "terrible",
        "awful",
        "bad",
        "poor",
        "boring",
        "confusing",
        "unhelpful",
        "disappointing",
        "useless",
        "unclear",
        "disorganized",
        "frustrating",
        "dull",
        "weak",
        "ineffective",
        "dry",
        "rushed",
        "monotonous",
        "shallow",
        "waste",
    ]),
    neutral_words: words(&[
        "okay",
        "fine",
        "average",
        "decent",
        "normal",
        "standard",
        "typical",
        "moderate",
        "fair",
        "acceptable",
        "adequate",
        "reasonable",
    ]),
    topics: vec![
        TopicEntry::new(
            "content",
            &[
                "content",
                "material",
                "topic",
                "subject",
                "curriculum",
                "information",
                "examples",
                "depth",
                "slides",
                "exercises",
            ],
        ),
        TopicEntry::new(
            "delivery",
            &[
                "delivery",
                "presentation",
                "explanation",
                "explained",
                "communication",
                "voice",
                "style",
                "articulate",
                "speaking",
            ],
        ),
        TopicEntry::new(
            "pacing",
            &[
                "pace",
                "pacing",
                "speed",
                "fast",
                "slow",
                "rushed",
                "timing",
                "schedule",
                "duration",
                "breaks",
            ],
        ),
        TopicEntry::new(
            "engagement",
            &[
                "engaging",
                "interactive",
                "interesting",
                "participation",
                "discussion",
                "involvement",
                "attention",
                "energy",
                "questions",
            ],
        ),
        TopicEntry::new(
            "logistics",
            &[
                "room",
                "venue",
                "equipment",
                "audio",
                "video",
                "setup",
                "handouts",
                "platform",
                "registration",
                "organization",
            ],
        ),
    ],
    positive_emoji: vec![
        '😀', '😁', '😂', '😊', '😍', '🙂', '😄', '😃', '🥰', '😎', '👍', '👏', '💪', '🙌', '❤',
        '🎉', '💯', '⭐', '✨', '🔥',
    ],
    negative_emoji: vec![
        '😞', '😢', '😡', '😠', '😤', '😭', '🙁', '☹', '😩', '😫', '😒', '😕', '👎', '💔',
    ],
    stop_words: words(&[
        "the", "and", "was", "were", "that", "this", "with", "have", "from", "they", "been",
        "their", "would", "there", "could", "about", "which", "when", "what", "your", "will",
        "more", "very", "than", "then", "them", "some", "into", "just", "also", "because",
        "really", "quite", "being", "other", "each", "most", "such",
    ]),
    positive_selection_terms: words(&[
        "helpful",
        "clear",
        "engaging",
        "organized",
        "knowledgeable",
        "interactive",
        "effective",
        "prepared",
        "friendly",
        "professional",
        "responsive",
    ]),
    negative_selection_terms: words(&[
        "boring",
        "confusing",
        "unprepared",
        "disorganized",
        "unclear",
        "rushed",
        "monotone",
        "unhelpful",
        "distracted",
    ]),
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tables_are_populated() {
        let lexicon = Lexicon::default();
        assert_eq!(lexicon.positive_words.len(), 20);
        assert_eq!(lexicon.negative_words.len(), 20);
        assert_eq!(lexicon.topics.len(), 5);
        assert!(!lexicon.positive_emoji.is_empty());
        assert!(!lexicon.stop_words.is_empty());
    }

    #[test]
    fn test_lexicon_deserializes_partial_yaml() {
        // Unlisted tables fall back to the built-in defaults.
        let yaml = r#"
positive_words: ["sehr_gut"]
negative_words: ["schlecht"]
"#;
        let lexicon: Lexicon = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(lexicon.positive_words, vec!["sehr_gut".to_string()]);
        assert_eq!(lexicon.negative_words, vec!["schlecht".to_string()]);
        assert_eq!(lexicon.topics.len(), 5);
    }

    #[test]
    fn test_no_overlap_between_polarity_tables() {
        let lexicon = Lexicon::default();
        for word in &lexicon.positive_words {
            assert!(!lexicon.negative_words.contains(word), "overlap: {}", word);
            assert!(!lexicon.neutral_words.contains(word), "overlap: {}", word);
        }
        for word in &lexicon.negative_words {
            assert!(!lexicon.neutral_words.contains(word), "overlap: {}", word);
        }
    }
}
