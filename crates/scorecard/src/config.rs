//! Tunable weights and thresholds for the scoring pipeline.

use serde::{Deserialize, Serialize};

/// How a multiple-choice option list maps onto the rating scale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionOrder {
    /// First option is the worst outcome, last option the best.
    #[default]
    WorstToBest,
    /// First option is the best outcome, last option the worst.
    BestToWorst,
}

/// Parameters for trend classification over the rating history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendConfig {
    /// History points required before a trend is reported at all.
    pub min_points: usize,
    /// Size of the recent and prior windows that are compared.
    pub window: usize,
    /// Absolute window-mean difference that counts as movement.
    pub delta: f64,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            min_points: 10,
            window: 5,
            delta: 0.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Channel weights for the blended 0-100 aggregate score.
    pub numeric_channel_weight: f64,
    pub sentiment_channel_weight: f64,
    pub engagement_channel_weight: f64,
    /// Unit score substituted for a channel that received no signals.
    pub empty_channel_default: f64,
    /// Average words per text answer at which engagement saturates.
    pub engagement_word_basis: f64,
    /// Response count at which aggregate confidence reaches 100.
    pub confidence_saturation: usize,
    /// Weight given to ratings derived from free-text sentiment.
    pub text_signal_weight: f64,
    /// Weight given to sentiment fallback on unrecognized question types.
    pub fallback_signal_weight: f64,
    pub option_order: OptionOrder,
    pub trend: TrendConfig,
    /// Overall average below this triggers the broad improvement suggestion.
    pub low_overall_threshold: f64,
    /// Per-question-type average below this triggers a targeted suggestion.
    pub low_type_threshold: f64,
    /// Per-question-type average above this earns a keep-it-up note.
    pub high_type_threshold: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            numeric_channel_weight: 0.6,
            sentiment_channel_weight: 0.3,
            engagement_channel_weight: 0.1,
            empty_channel_default: 0.5,
            engagement_word_basis: 50.0,
            confidence_saturation: 10,
            text_signal_weight: 0.5,
            fallback_signal_weight: 0.3,
            option_order: OptionOrder::default(),
            trend: TrendConfig::default(),
            low_overall_threshold: 3.0,
            low_type_threshold: 2.5,
            high_type_threshold: 4.5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_match_documented_weights() {
        let config = ScoringConfig::default();
        assert_eq!(config.numeric_channel_weight, 0.6);
        assert_eq!(config.sentiment_channel_weight, 0.3);
        assert_eq!(config.engagement_channel_weight, 0.1);
        assert_eq!(config.confidence_saturation, 10);
        assert_eq!(config.option_order, OptionOrder::WorstToBest);
        assert_eq!(config.trend.min_points, 10);
    }

    #[test]
    fn test_partial_yaml_overrides_keep_other_defaults() {
        let yaml = r#"
numeric_channel_weight: 0.5
option_order: best_to_worst
trend:
  delta: 0.5
"#;
        let config: ScoringConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.numeric_channel_weight, 0.5);
        assert_eq!(config.option_order, OptionOrder::BestToWorst);
        assert_eq!(config.trend.delta, 0.5);
        assert_eq!(config.trend.window, 5);
        assert_eq!(config.sentiment_channel_weight, 0.3);
    }
}
