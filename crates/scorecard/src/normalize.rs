//! Per-question-type normalization of raw answer values onto the 0-5 scale.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::debug;

use crate::config::{OptionOrder, ScoringConfig};
use crate::records::{AnswerValue, Question, QuestionKind};
use crate::text::TextAnalyzer;

/// Canonical upper bound of the rating scale every answer is mapped onto.
pub const RATING_SCALE_MAX: f64 = 5.0;

/// Matches a standalone 1-10 integer embedded in free text, e.g. "8 out of 10".
static EMBEDDED_SCALE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(10|[1-9])\b").expect("embedded scale pattern compiles"));

/// One answer reduced to a weighted rating on the canonical 0-5 scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedRating {
    pub score: f64,
    pub weight: f64,
    pub kind: QuestionKind,
}

impl NormalizedRating {
    fn zero(weight: f64, kind: QuestionKind) -> Self {
        Self {
            score: 0.0,
            weight,
            kind,
        }
    }
}

/// Maps raw answer values to [`NormalizedRating`]s. Malformed input degrades
/// to a zero-score rating or to no contribution, never to an error.
pub struct NumericNormalizer {
    analyzer: Arc<TextAnalyzer>,
    option_order: OptionOrder,
    text_signal_weight: f64,
    fallback_signal_weight: f64,
    positive_selection_terms: Vec<String>,
    negative_selection_terms: Vec<String>,
}

impl NumericNormalizer {
    pub fn new(
        analyzer: Arc<TextAnalyzer>,
        config: &ScoringConfig,
        positive_selection_terms: Vec<String>,
        negative_selection_terms: Vec<String>,
    ) -> Self {
        Self {
            analyzer,
            option_order: config.option_order,
            text_signal_weight: config.text_signal_weight,
            fallback_signal_weight: config.fallback_signal_weight,
            positive_selection_terms,
            negative_selection_terms,
        }
    }

    /// Maps a numeric value onto `[0.0, 1.0]`.
    ///
    /// A scale declared on the question wins; otherwise values above five
    /// imply a 1-10 scale and anything else a 1-5 scale. The lower bound of
    /// the scale is always one.
    pub fn unit_score(&self, value: f64, question: &Question) -> f64 {
        let max = question.max_scale.unwrap_or(if value > RATING_SCALE_MAX {
            10.0
        } else {
            5.0
        });
        if max <= 1.0 {
            return 0.0;
        }
        ((value - 1.0) / (max - 1.0)).clamp(0.0, 1.0)
    }

    /// Reduces one answer value to a weighted 0-5 rating.
    ///
    /// Returns `None` when the answer carries no ratable signal at all
    /// (empty text, or checkbox selections matching no keyword on either
    /// side); those answers simply do not contribute to averages.
    pub fn normalize(
        &self,
        value: &AnswerValue,
        question: &Question,
        weight: f64,
    ) -> Option<NormalizedRating> {
        let kind = question.kind;
        match kind {
            QuestionKind::Rating | QuestionKind::Scale | QuestionKind::Number => {
                Some(match value.as_number() {
                    Some(v) => NormalizedRating {
                        score: self.unit_score(v, question) * RATING_SCALE_MAX,
                        weight,
                        kind,
                    },
                    None => NormalizedRating::zero(weight, kind),
                })
            }
            QuestionKind::MultipleChoice => Some(self.normalize_choice(value, question, weight)),
            QuestionKind::Checkbox => self.normalize_checkbox(value, question, weight),
            QuestionKind::Text | QuestionKind::TextArea => {
                let text = value.as_text()?;
                if text.trim().is_empty() {
                    return None;
                }
                Some(self.sentiment_rating(text, self.text_signal_weight, kind))
            }
            QuestionKind::Other => Some(self.normalize_other(value, question, weight)),
        }
    }

    /// Position of the chosen option within the declared list, mapped to 0-5
    /// according to the configured option ordering.
    fn normalize_choice(
        &self,
        value: &AnswerValue,
        question: &Question,
        weight: f64,
    ) -> NormalizedRating {
        let kind = question.kind;
        let Some(chosen) = value.as_text() else {
            return NormalizedRating::zero(weight, kind);
        };
        let Some(options) = question.options.as_deref().filter(|o| !o.is_empty()) else {
            debug!(
                question_id = %question.id,
                "multiple-choice question has no option list, scoring zero"
            );
            return NormalizedRating::zero(weight, kind);
        };
        let Some(index) = options.iter().position(|o| o == chosen) else {
            debug!(
                question_id = %question.id,
                option = %chosen,
                "answer option not in declared list, scoring zero"
            );
            return NormalizedRating::zero(weight, kind);
        };

        let count = options.len() as f64;
        let unit = match self.option_order {
            OptionOrder::WorstToBest => (index as f64 + 1.0) / count,
            OptionOrder::BestToWorst => (count - index as f64) / count,
        };
        NormalizedRating {
            score: unit * RATING_SCALE_MAX,
            weight,
            kind,
        }
    }

    /// Favorable-vs-unfavorable ratio over the selected checkbox options.
    /// Selections matching neither keyword side are ignored.
    fn normalize_checkbox(
        &self,
        value: &AnswerValue,
        question: &Question,
        weight: f64,
    ) -> Option<NormalizedRating> {
        let kind = question.kind;
        let Some(selections) = value.as_selections() else {
            return Some(NormalizedRating::zero(weight, kind));
        };

        let mut favorable = 0usize;
        let mut unfavorable = 0usize;
        for selection in selections {
            let lowered = selection.to_lowercase();
            // Negated terms embed their positive stems ("unclear" contains
            // "clear"), so the unfavorable side must be checked first.
            if self
                .negative_selection_terms
                .iter()
                .any(|t| lowered.contains(t))
            {
                unfavorable += 1;
            } else if self
                .positive_selection_terms
                .iter()
                .any(|t| lowered.contains(t))
            {
                favorable += 1;
            }
        }

        let matched = favorable + unfavorable;
        if matched == 0 {
            return None;
        }
        Some(NormalizedRating {
            score: favorable as f64 / matched as f64 * RATING_SCALE_MAX,
            weight,
            kind,
        })
    }

    /// Unrecognized question types: prefer an embedded 1-10 integer, then
    /// sentiment at a reduced weight, then the zero-score default.
    fn normalize_other(
        &self,
        value: &AnswerValue,
        question: &Question,
        weight: f64,
    ) -> NormalizedRating {
        let kind = question.kind;
        if let Some(v) = value.as_number() {
            return NormalizedRating {
                score: self.unit_score(v, question) * RATING_SCALE_MAX,
                weight,
                kind,
            };
        }
        if let Some(text) = value.as_text() {
            if let Some(found) = EMBEDDED_SCALE.find(text) {
                // The pattern only admits integers 1 through 10.
                let v: f64 = found.as_str().parse().unwrap_or(1.0);
                return NormalizedRating {
                    score: (v - 1.0) / 9.0 * RATING_SCALE_MAX,
                    weight,
                    kind,
                };
            }
            if !text.trim().is_empty() {
                return self.sentiment_rating(text, self.fallback_signal_weight, kind);
            }
        }
        NormalizedRating::zero(weight, kind)
    }

    /// Maps a sentiment score in [-1, 1] to the 0-5 scale around the 2.5
    /// midpoint.
    fn sentiment_rating(&self, text: &str, weight: f64, kind: QuestionKind) -> NormalizedRating {
        let sentiment = self.analyzer.sentiment(text);
        NormalizedRating {
            score: (2.5 + sentiment.score * 1.5).clamp(0.0, RATING_SCALE_MAX),
            weight,
            kind,
        }
    }
}
