//! Rule-based text analytics over free-form feedback.
//!
//! Everything here is deterministic keyword matching against a [`Lexicon`].
//! A single [`TextAnalyzer::analyze`] pass produces sentiment, topic
//! relevance, emoji statistics, a readability estimate, and repeated key
//! phrases. The analyzer never fails: degenerate input yields a zeroed
//! [`TextAnalysis`].

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::lexicon::Lexicon;

// ============================================================================
// Tuning constants
// ============================================================================

/// Upper bound on sentiment confidence for polarized text.
const SENTIMENT_CONFIDENCE_CAP: f64 = 0.9;

/// Multiplier applied to the winning-polarity ratio to obtain confidence.
const SENTIMENT_CONFIDENCE_FACTOR: f64 = 1.2;

/// Lower bound on confidence when the verdict is neutral.
const NEUTRAL_CONFIDENCE_FLOOR: f64 = 0.3;

/// Keyword mentions at which a topic is considered fully relevant.
const TOPIC_SATURATION_MENTIONS: f64 = 3.0;

/// Maximum number of key phrases reported per text.
const KEY_PHRASE_LIMIT: usize = 5;

/// Minimum token length (in characters) for key-phrase candidates.
const KEY_PHRASE_MIN_TOKEN_CHARS: usize = 4;

// ============================================================================
// Result types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SentimentLabel::Positive => write!(f, "positive"),
            SentimentLabel::Neutral => write!(f, "neutral"),
            SentimentLabel::Negative => write!(f, "negative"),
        }
    }
}

/// Polarity verdict for one text. `score` is in [-1.0, 1.0].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentimentResult {
    pub score: f64,
    pub label: SentimentLabel,
    pub confidence: f64,
}

impl SentimentResult {
    fn neutral_silent() -> Self {
        Self {
            score: 0.0,
            label: SentimentLabel::Neutral,
            confidence: 0.0,
        }
    }
}

/// How strongly one catalog topic shows up in a text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicRelevance {
    pub topic: String,
    /// Saturating share in [0.0, 1.0], full at three mentions.
    pub relevance: f64,
    pub mentions: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmojiBreakdown {
    pub positive: usize,
    pub negative: usize,
    pub neutral: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmojiAnalysis {
    pub count: usize,
    /// Shannon entropy over the emoji frequency distribution, 0.0 when at
    /// most one distinct emoji is present.
    pub entropy: f64,
    pub sentiment: SentimentLabel,
    /// Distinct emoji divided by total emoji, 0.0 when none.
    pub diversity: f64,
    pub breakdown: EmojiBreakdown,
}

impl EmojiAnalysis {
    fn empty() -> Self {
        Self {
            count: 0,
            entropy: 0.0,
            sentiment: SentimentLabel::Neutral,
            diversity: 0.0,
            breakdown: EmojiBreakdown::default(),
        }
    }
}

/// Full analysis output for one piece of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextAnalysis {
    pub sentiment: SentimentResult,
    pub topics: Vec<TopicRelevance>,
    pub emoji_analysis: EmojiAnalysis,
    pub word_count: usize,
    /// Heuristic ease-of-reading score in [0.0, 100.0], higher is simpler.
    pub readability_score: f64,
    pub key_phrases: Vec<String>,
}

// ============================================================================
// Tokenization
// ============================================================================

/// Pre-tokenized view of one input text, shared by the analysis passes.
struct PreparedText {
    /// Whitespace-separated chunks in the raw text, punctuation included.
    word_count: usize,
    /// Lowercased words with boundary punctuation stripped, empties dropped.
    tokens: Vec<String>,
    /// Non-empty `.`/`!`/`?` segments, never below one for non-empty text.
    sentence_count: usize,
}

impl PreparedText {
    fn new(text: &str) -> Self {
        let word_count = text.split_whitespace().count();
        let tokens: Vec<String> = text
            .split_whitespace()
            .map(|w| {
                w.trim_matches(|c: char| !c.is_alphanumeric())
                    .to_lowercase()
            })
            .filter(|w| !w.is_empty())
            .collect();
        let sentence_count = text
            .split(['.', '!', '?'])
            .filter(|s| !s.trim().is_empty())
            .count()
            .max(1);
        Self {
            word_count,
            tokens,
            sentence_count,
        }
    }
}

fn is_emoji(c: char) -> bool {
    matches!(
        u32::from(c),
        0x1F300..=0x1F5FF
            | 0x1F600..=0x1F64F
            | 0x1F680..=0x1F6FF
            | 0x1F900..=0x1F9FF
            | 0x1FA70..=0x1FAFF
            | 0x2600..=0x26FF
            | 0x2700..=0x27BF
            | 0x2B00..=0x2BFF
    )
}

// ============================================================================
// Analyzer
// ============================================================================

/// Stateless analysis engine; build once and share behind an `Arc`.
pub struct TextAnalyzer {
    positive: HashSet<String>,
    negative: HashSet<String>,
    neutral: HashSet<String>,
    stop_words: HashSet<String>,
    topics: Vec<(String, HashSet<String>)>,
    positive_emoji: HashSet<char>,
    negative_emoji: HashSet<char>,
}

impl Default for TextAnalyzer {
    fn default() -> Self {
        Self::new(&Lexicon::default())
    }
}

impl TextAnalyzer {
    pub fn new(lexicon: &Lexicon) -> Self {
        let to_set = |list: &[String]| list.iter().cloned().collect::<HashSet<String>>();
        Self {
            positive: to_set(&lexicon.positive_words),
            negative: to_set(&lexicon.negative_words),
            neutral: to_set(&lexicon.neutral_words),
            stop_words: to_set(&lexicon.stop_words),
            topics: lexicon
                .topics
                .iter()
                .map(|t| (t.name.clone(), to_set(&t.keywords)))
                .collect(),
            positive_emoji: lexicon.positive_emoji.iter().copied().collect(),
            negative_emoji: lexicon.negative_emoji.iter().copied().collect(),
        }
    }

    /// Runs every analysis pass over `text`.
    pub fn analyze(&self, text: &str) -> TextAnalysis {
        let prepared = PreparedText::new(text);
        TextAnalysis {
            sentiment: self.sentiment_of(&prepared),
            topics: self.topics_of(&prepared),
            emoji_analysis: self.emoji_of(text),
            word_count: prepared.word_count,
            readability_score: readability_of(&prepared),
            key_phrases: self.key_phrases_of(&prepared),
        }
    }

    /// Shorthand when only the polarity verdict is needed.
    pub fn sentiment(&self, text: &str) -> SentimentResult {
        self.sentiment_of(&PreparedText::new(text))
    }

    fn sentiment_of(&self, prepared: &PreparedText) -> SentimentResult {
        let mut positive = 0usize;
        let mut negative = 0usize;
        let mut neutral = 0usize;
        for token in &prepared.tokens {
            if self.positive.contains(token) {
                positive += 1;
            } else if self.negative.contains(token) {
                negative += 1;
            } else if self.neutral.contains(token) {
                neutral += 1;
            }
        }

        let total = positive + negative + neutral;
        if total == 0 {
            return SentimentResult::neutral_silent();
        }
        let total = total as f64;

        if positive > negative && positive > neutral {
            let ratio = positive as f64 / total;
            SentimentResult {
                score: ratio,
                label: SentimentLabel::Positive,
                confidence: (ratio * SENTIMENT_CONFIDENCE_FACTOR).min(SENTIMENT_CONFIDENCE_CAP),
            }
        } else if negative > positive && negative > neutral {
            let ratio = negative as f64 / total;
            SentimentResult {
                score: -ratio,
                label: SentimentLabel::Negative,
                confidence: (ratio * SENTIMENT_CONFIDENCE_FACTOR).min(SENTIMENT_CONFIDENCE_CAP),
            }
        } else {
            // Ties between polarities land here as well.
            SentimentResult {
                score: 0.0,
                label: SentimentLabel::Neutral,
                confidence: (neutral as f64 / total).max(NEUTRAL_CONFIDENCE_FLOOR),
            }
        }
    }

    fn topics_of(&self, prepared: &PreparedText) -> Vec<TopicRelevance> {
        let mut found: Vec<TopicRelevance> = Vec::new();
        for (name, keywords) in &self.topics {
            let mentions = prepared
                .tokens
                .iter()
                .filter(|t| keywords.contains(*t))
                .count();
            if mentions == 0 {
                continue;
            }
            found.push(TopicRelevance {
                topic: name.clone(),
                relevance: (mentions as f64 / TOPIC_SATURATION_MENTIONS).min(1.0),
                mentions,
            });
        }
        // Stable sort keeps catalog order for equal relevance.
        found.sort_by(|a, b| {
            b.relevance
                .partial_cmp(&a.relevance)
                .unwrap_or(Ordering::Equal)
        });
        found
    }

    fn emoji_of(&self, text: &str) -> EmojiAnalysis {
        let emoji: Vec<char> = text.chars().filter(|c| is_emoji(*c)).collect();
        if emoji.is_empty() {
            return EmojiAnalysis::empty();
        }

        let mut freq: HashMap<char, usize> = HashMap::new();
        let mut breakdown = EmojiBreakdown::default();
        for &e in &emoji {
            *freq.entry(e).or_insert(0) += 1;
            if self.positive_emoji.contains(&e) {
                breakdown.positive += 1;
            } else if self.negative_emoji.contains(&e) {
                breakdown.negative += 1;
            } else {
                breakdown.neutral += 1;
            }
        }

        let count = emoji.len();
        let entropy = if freq.len() <= 1 {
            0.0
        } else {
            freq.values()
                .map(|&n| {
                    let p = n as f64 / count as f64;
                    -p * p.log2()
                })
                .sum()
        };
        let sentiment = if breakdown.positive > breakdown.negative
            && breakdown.positive > breakdown.neutral
        {
            SentimentLabel::Positive
        } else if breakdown.negative > breakdown.positive
            && breakdown.negative > breakdown.neutral
        {
            SentimentLabel::Negative
        } else {
            // Ties between categories land here as well.
            SentimentLabel::Neutral
        };

        EmojiAnalysis {
            count,
            entropy,
            sentiment,
            diversity: freq.len() as f64 / count as f64,
            breakdown,
        }
    }

    fn key_phrases_of(&self, prepared: &PreparedText) -> Vec<String> {
        let candidates: Vec<&String> = prepared
            .tokens
            .iter()
            .filter(|t| {
                t.chars().count() >= KEY_PHRASE_MIN_TOKEN_CHARS && !self.stop_words.contains(*t)
            })
            .collect();

        let mut counts: HashMap<String, usize> = HashMap::new();
        for pair in candidates.windows(2) {
            let phrase = format!("{} {}", pair[0], pair[1]);
            *counts.entry(phrase).or_insert(0) += 1;
        }

        let mut repeated: Vec<(String, usize)> =
            counts.into_iter().filter(|(_, n)| *n > 1).collect();
        repeated.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        repeated
            .into_iter()
            .take(KEY_PHRASE_LIMIT)
            .map(|(phrase, _)| phrase)
            .collect()
    }
}

fn readability_of(prepared: &PreparedText) -> f64 {
    if prepared.word_count == 0 {
        return 0.0;
    }
    let avg_word_len = if prepared.tokens.is_empty() {
        0.0
    } else {
        let chars: usize = prepared.tokens.iter().map(|t| t.chars().count()).sum();
        chars as f64 / prepared.tokens.len() as f64
    };
    let avg_sentence_len = prepared.word_count as f64 / prepared.sentence_count as f64;
    (100.0 - avg_word_len * 5.0 - avg_sentence_len * 2.0).clamp(0.0, 100.0)
}
