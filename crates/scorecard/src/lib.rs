//! Deterministic feedback scoring for training-survey responses.
//!
//! The crate turns raw survey responses into dashboard-ready reports in
//! three stages: [`TextAnalyzer`] runs rule-based analytics over free text,
//! [`NumericNormalizer`] maps each answer kind onto a canonical 0-5 rating,
//! and [`ScoreAggregator`] blends everything into weighted aggregates,
//! per-type statistics, trend classification, and improvement suggestions.
//! All stages are synchronous, side-effect-free, and never fail on malformed
//! input.

pub mod aggregate;
pub mod config;
pub mod lexicon;
pub mod normalize;
pub mod records;
pub mod text;
pub mod trend;

pub use aggregate::{
    AggregateScore, ChannelBreakdown, ChannelScore, RatingBreakdown, ScoreAggregator, ScoreReport,
    TypeStats,
};
pub use config::{OptionOrder, ScoringConfig, TrendConfig};
pub use lexicon::{Lexicon, TopicEntry};
pub use normalize::{NormalizedRating, NumericNormalizer, RATING_SCALE_MAX};
pub use records::{Answer, AnswerValue, Question, QuestionKind, Response};
pub use text::{
    EmojiAnalysis, EmojiBreakdown, SentimentLabel, SentimentResult, TextAnalysis, TextAnalyzer,
    TopicRelevance,
};
pub use trend::{Trend, TrendPoint, TrendTracker};
