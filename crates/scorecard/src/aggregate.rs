//! Weighted aggregation of responses into dashboard-ready score reports.
//!
//! [`ScoreAggregator::aggregate`] is a pure function of its inputs: it walks
//! every answer of every response, routes each through the normalizer,
//! blends three scoring channels into a coarse 0-100 score, and derives
//! trend plus improvement suggestions. Missing or malformed data degrades
//! to sentinels, never to errors.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ScoringConfig;
use crate::lexicon::Lexicon;
use crate::normalize::{NumericNormalizer, RATING_SCALE_MAX};
use crate::records::{Question, QuestionKind, Response};
use crate::text::TextAnalyzer;
use crate::trend::{Trend, TrendTracker};

// ============================================================================
// Suggestion copy
// ============================================================================

const SUGGEST_GENERAL_REVIEW: &str =
    "Overall ratings are below expectations. Review training content and delivery for a broad refresh.";

const SUGGEST_ALL_HEALTHY: &str =
    "Ratings look healthy across the board. Keep up the good work.";

// ============================================================================
// Report types
// ============================================================================

/// One of the three blended scoring channels, as a unit score plus its
/// relative weight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelScore {
    pub score: f64,
    pub weight: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelBreakdown {
    pub numeric: ChannelScore,
    pub sentiment: ChannelScore,
    pub engagement: ChannelScore,
}

/// Coarse dashboard aggregate on a 0-100 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateScore {
    pub overall_score: u8,
    pub breakdown: ChannelBreakdown,
    pub total_responses: usize,
    /// Linear in response count, saturating at 100.
    pub confidence: u8,
}

/// Average, count, and 1-5 bucket histogram for one question kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeStats {
    pub average: f64,
    pub count: usize,
    /// Always carries all five buckets, zero-filled.
    pub distribution: BTreeMap<u8, u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingBreakdown {
    pub by_question_type: BTreeMap<QuestionKind, TypeStats>,
    pub trend: Trend,
    /// Mean of the most recent trend window, absent with too little history.
    pub recent_average: Option<f64>,
    /// Mean over every per-response trend point.
    pub overall_average: Option<f64>,
    pub improvement_suggestions: Vec<String>,
}

/// Complete output of one aggregation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    /// Weighted 0-5 average over every ratable answer, `None` when not a
    /// single answer carried ratable signal.
    #[serde(rename = "overallAverageScore")]
    pub overall_average: Option<f64>,
    pub breakdown: RatingBreakdown,
    #[serde(rename = "aggregateScore")]
    pub aggregate: AggregateScore,
}

// ============================================================================
// Accumulation
// ============================================================================

struct TypeAccum {
    sum: f64,
    count: usize,
    distribution: BTreeMap<u8, u32>,
}

impl TypeAccum {
    fn new() -> Self {
        Self {
            sum: 0.0,
            count: 0,
            distribution: (1..=5u8).map(|bucket| (bucket, 0)).collect(),
        }
    }

    fn add(&mut self, score: f64) {
        self.sum += score;
        self.count += 1;
        *self.distribution.entry(bucket_of(score)).or_insert(0) += 1;
    }

    fn into_stats(self) -> TypeStats {
        TypeStats {
            average: self.sum / self.count as f64,
            count: self.count,
            distribution: self.distribution,
        }
    }
}

fn bucket_of(score: f64) -> u8 {
    (score.round() as i64).clamp(1, 5) as u8
}

// ============================================================================
// Aggregator
// ============================================================================

/// Stateless scoring engine. Construct once with the lexicon and config,
/// then call [`aggregate`](Self::aggregate) per form.
pub struct ScoreAggregator {
    analyzer: Arc<TextAnalyzer>,
    normalizer: NumericNormalizer,
    config: ScoringConfig,
}

impl Default for ScoreAggregator {
    fn default() -> Self {
        Self::new(ScoringConfig::default(), &Lexicon::default())
    }
}

impl ScoreAggregator {
    pub fn new(config: ScoringConfig, lexicon: &Lexicon) -> Self {
        let analyzer = Arc::new(TextAnalyzer::new(lexicon));
        let normalizer = NumericNormalizer::new(
            Arc::clone(&analyzer),
            &config,
            lexicon.positive_selection_terms.clone(),
            lexicon.negative_selection_terms.clone(),
        );
        Self {
            analyzer,
            normalizer,
            config,
        }
    }

    /// Text analytics engine sharing this aggregator's lexicon.
    pub fn analyzer(&self) -> Arc<TextAnalyzer> {
        Arc::clone(&self.analyzer)
    }

    pub fn normalizer(&self) -> &NumericNormalizer {
        &self.normalizer
    }

    /// Scores `responses` against the `questions` schema.
    ///
    /// Answers referencing unknown questions are skipped, answers without
    /// ratable signal contribute nothing, and an empty response slice yields
    /// the zeroed sentinel report.
    pub fn aggregate(&self, responses: &[Response], questions: &[Question]) -> ScoreReport {
        if responses.is_empty() {
            return self.empty_report();
        }

        let mut ordered: Vec<&Response> = responses.iter().collect();
        ordered.sort_by_key(|r| r.submitted_at);
        let by_id: HashMap<&str, &Question> =
            questions.iter().map(|q| (q.id.as_str(), q)).collect();

        let mut weighted_total = 0.0;
        let mut weight_total = 0.0;
        let mut numeric_units: Vec<f64> = Vec::new();
        let mut sentiment_units: Vec<f64> = Vec::new();
        let mut text_word_counts: Vec<usize> = Vec::new();
        let mut per_type: BTreeMap<QuestionKind, TypeAccum> = BTreeMap::new();
        let mut tracker = TrendTracker::new(self.config.trend);

        for response in &ordered {
            let mut response_scores: Vec<f64> = Vec::new();
            for answer in &response.answers {
                let Some(question) = by_id.get(answer.question_id.as_str()) else {
                    debug!(
                        question_id = %answer.question_id,
                        "answer references an unknown question, skipping"
                    );
                    continue;
                };

                if question.kind.is_text() {
                    if let Some(text) = answer.value.as_text() {
                        if !text.trim().is_empty() {
                            text_word_counts.push(text.split_whitespace().count());
                        }
                    }
                }

                let Some(rated) = self.normalizer.normalize(&answer.value, question, 1.0) else {
                    continue;
                };
                weighted_total += rated.score * rated.weight;
                weight_total += rated.weight;
                response_scores.push(rated.score);

                let unit = rated.score / RATING_SCALE_MAX;
                if rated.kind.is_text() {
                    sentiment_units.push(unit);
                } else {
                    numeric_units.push(unit);
                }
                per_type
                    .entry(rated.kind)
                    .or_insert_with(TypeAccum::new)
                    .add(rated.score);
            }

            if !response_scores.is_empty() {
                let mean = response_scores.iter().sum::<f64>() / response_scores.len() as f64;
                tracker.record(&response.form_id, response.submitted_at, mean);
            }
        }

        let overall_average = if weight_total > 0.0 {
            Some((weighted_total / weight_total).clamp(0.0, RATING_SCALE_MAX))
        } else {
            None
        };

        let numeric = self.channel(&numeric_units, self.config.numeric_channel_weight);
        let sentiment = self.channel(&sentiment_units, self.config.sentiment_channel_weight);
        let engagement = ChannelScore {
            score: self.engagement_score(&text_word_counts),
            weight: self.config.engagement_channel_weight,
        };
        let blended = numeric.score * numeric.weight
            + sentiment.score * sentiment.weight
            + engagement.score * engagement.weight;

        let aggregate = AggregateScore {
            overall_score: (blended * 100.0).round() as u8,
            breakdown: ChannelBreakdown {
                numeric,
                sentiment,
                engagement,
            },
            total_responses: responses.len(),
            confidence: self.confidence(responses.len()),
        };

        let by_question_type: BTreeMap<QuestionKind, TypeStats> = per_type
            .into_iter()
            .map(|(kind, accum)| (kind, accum.into_stats()))
            .collect();
        let improvement_suggestions = self.suggestions(overall_average, &by_question_type);

        // All responses handed to one aggregation belong to one form; the
        // earliest response pins the id the trend history was keyed under.
        let form_id = ordered[0].form_id.as_str();
        let breakdown = RatingBreakdown {
            by_question_type,
            trend: tracker.classify(form_id),
            recent_average: tracker.recent_average(form_id),
            overall_average: tracker.overall_average(form_id),
            improvement_suggestions,
        };

        ScoreReport {
            overall_average,
            breakdown,
            aggregate,
        }
    }

    fn channel(&self, units: &[f64], weight: f64) -> ChannelScore {
        let score = if units.is_empty() {
            self.config.empty_channel_default
        } else {
            units.iter().sum::<f64>() / units.len() as f64
        };
        ChannelScore { score, weight }
    }

    /// Average words per text answer against the saturation basis; the
    /// neutral default applies when no text answers exist.
    fn engagement_score(&self, word_counts: &[usize]) -> f64 {
        if word_counts.is_empty() {
            return self.config.empty_channel_default;
        }
        let average = word_counts.iter().sum::<usize>() as f64 / word_counts.len() as f64;
        (average / self.config.engagement_word_basis).min(1.0)
    }

    fn confidence(&self, response_count: usize) -> u8 {
        let saturation = self.config.confidence_saturation.max(1) as f64;
        ((response_count as f64 / saturation).min(1.0) * 100.0).round() as u8
    }

    /// Rule list over the overall and per-type averages. Rules accumulate in
    /// a fixed order; when none fires a single healthy note is emitted.
    fn suggestions(
        &self,
        overall_average: Option<f64>,
        by_type: &BTreeMap<QuestionKind, TypeStats>,
    ) -> Vec<String> {
        let mut suggestions = Vec::new();
        if let Some(average) = overall_average {
            if average < self.config.low_overall_threshold {
                suggestions.push(SUGGEST_GENERAL_REVIEW.to_string());
            }
        }
        for (kind, stats) in by_type {
            if stats.average < self.config.low_type_threshold {
                suggestions.push(format!(
                    "Ratings for {kind} questions are low. Focus improvement efforts on the areas they cover."
                ));
            } else if stats.average > self.config.high_type_threshold {
                suggestions.push(format!(
                    "Ratings for {kind} questions are consistently strong. Keep the current approach."
                ));
            }
        }
        if suggestions.is_empty() {
            suggestions.push(SUGGEST_ALL_HEALTHY.to_string());
        }
        suggestions
    }

    fn empty_report(&self) -> ScoreReport {
        let zero = |weight: f64| ChannelScore { score: 0.0, weight };
        ScoreReport {
            overall_average: None,
            breakdown: RatingBreakdown {
                by_question_type: BTreeMap::new(),
                trend: Trend::Stable,
                recent_average: None,
                overall_average: None,
                improvement_suggestions: Vec::new(),
            },
            aggregate: AggregateScore {
                overall_score: 0,
                breakdown: ChannelBreakdown {
                    numeric: zero(self.config.numeric_channel_weight),
                    sentiment: zero(self.config.sentiment_channel_weight),
                    engagement: zero(self.config.engagement_channel_weight),
                },
                total_responses: 0,
                confidence: 0,
            },
        }
    }
}
