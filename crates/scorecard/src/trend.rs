//! Per-form rating history and trend classification.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::TrendConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Improving,
    Declining,
    Stable,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trend::Improving => write!(f, "improving"),
            Trend::Declining => write!(f, "declining"),
            Trend::Stable => write!(f, "stable"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub at: DateTime<Utc>,
    pub rating: f64,
}

/// Chronological rating history keyed by form id.
///
/// Points arriving out of order are inserted at their chronological
/// position, so classification always compares genuinely recent windows.
#[derive(Debug, Clone)]
pub struct TrendTracker {
    config: TrendConfig,
    history: HashMap<String, Vec<TrendPoint>>,
}

impl TrendTracker {
    pub fn new(config: TrendConfig) -> Self {
        Self {
            config,
            history: HashMap::new(),
        }
    }

    pub fn record(&mut self, form_id: &str, at: DateTime<Utc>, rating: f64) {
        let points = self.history.entry(form_id.to_string()).or_default();
        let point = TrendPoint { at, rating };
        match points.last() {
            Some(last) if last.at > at => {
                let index = points.partition_point(|p| p.at <= at);
                points.insert(index, point);
            }
            _ => points.push(point),
        }
    }

    /// Compares the mean of the most recent window against the window before
    /// it. Histories shorter than `min_points` (or than two full windows)
    /// always classify as stable.
    pub fn classify(&self, form_id: &str) -> Trend {
        let Some(points) = self.history.get(form_id) else {
            return Trend::Stable;
        };
        let window = self.config.window;
        if points.len() < self.config.min_points || points.len() < window * 2 {
            return Trend::Stable;
        }

        let recent = mean(&points[points.len() - window..]);
        let prior = mean(&points[points.len() - window * 2..points.len() - window]);
        let diff = recent - prior;
        if diff > self.config.delta {
            Trend::Improving
        } else if diff < -self.config.delta {
            Trend::Declining
        } else {
            Trend::Stable
        }
    }

    /// Mean of the most recent window, or `None` with fewer points than one
    /// full window.
    pub fn recent_average(&self, form_id: &str) -> Option<f64> {
        let points = self.history.get(form_id)?;
        if points.len() < self.config.window {
            return None;
        }
        Some(mean(&points[points.len() - self.config.window..]))
    }

    pub fn overall_average(&self, form_id: &str) -> Option<f64> {
        let points = self.history.get(form_id)?;
        if points.is_empty() {
            return None;
        }
        Some(mean(points))
    }

    pub fn point_count(&self, form_id: &str) -> usize {
        self.history.get(form_id).map_or(0, Vec::len)
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }
}

fn mean(points: &[TrendPoint]) -> f64 {
    if points.is_empty() {
        return 0.0;
    }
    points.iter().map(|p| p.rating).sum::<f64>() / points.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    const FORM: &str = "form-1";

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, minute, 0).unwrap()
    }

    fn tracker_with(ratings: &[f64]) -> TrendTracker {
        let mut tracker = TrendTracker::new(TrendConfig::default());
        for (i, rating) in ratings.iter().enumerate() {
            tracker.record(FORM, at(i as u32), *rating);
        }
        tracker
    }

    #[test]
    fn test_fewer_than_min_points_is_always_stable() {
        let tracker = tracker_with(&[1.0, 5.0, 1.0, 5.0, 1.0, 5.0, 1.0, 5.0, 1.0]);
        assert_eq!(tracker.classify(FORM), Trend::Stable);
    }

    #[test]
    fn test_rising_window_means_improving() {
        let tracker = tracker_with(&[3.0, 3.0, 3.0, 3.0, 3.0, 3.4, 3.4, 3.4, 3.4, 3.4]);
        assert_eq!(tracker.classify(FORM), Trend::Improving);
    }

    #[test]
    fn test_falling_window_means_declining() {
        let tracker = tracker_with(&[4.0, 4.0, 4.0, 4.0, 4.0, 3.5, 3.5, 3.5, 3.5, 3.5]);
        assert_eq!(tracker.classify(FORM), Trend::Declining);
    }

    #[test]
    fn test_movement_within_delta_is_stable() {
        let tracker = tracker_with(&[3.0, 3.0, 3.0, 3.0, 3.0, 3.2, 3.2, 3.2, 3.2, 3.2]);
        assert_eq!(tracker.classify(FORM), Trend::Stable);
    }

    #[test]
    fn test_only_trailing_windows_are_compared() {
        // Early low points are ignored once two full recent windows exist.
        let tracker = tracker_with(&[
            1.0, 1.0, 1.0, 1.0, 1.0, 3.0, 3.0, 3.0, 3.0, 3.0, 4.0, 4.0, 4.0, 4.0, 4.0,
        ]);
        assert_eq!(tracker.classify(FORM), Trend::Improving);
    }

    #[test]
    fn test_recent_average_needs_a_full_window() {
        let tracker = tracker_with(&[4.0, 4.0, 4.0, 4.0]);
        assert_eq!(tracker.recent_average(FORM), None);

        let tracker = tracker_with(&[1.0, 1.0, 4.0, 4.0, 4.0, 4.0, 4.0]);
        assert_eq!(tracker.recent_average(FORM), Some(4.0));
    }

    #[test]
    fn test_overall_average_covers_all_points() {
        let tracker = tracker_with(&[2.0, 4.0]);
        assert_eq!(tracker.overall_average(FORM), Some(3.0));
        assert_eq!(tracker.overall_average("missing"), None);
    }

    #[test]
    fn test_out_of_order_points_are_inserted_chronologically() {
        let mut tracker = TrendTracker::new(TrendConfig::default());
        for minute in [5u32, 6, 7, 8, 9] {
            tracker.record(FORM, at(minute), 4.0);
        }
        // A late-arriving earlier batch must not count as "recent".
        for minute in [0u32, 1, 2, 3, 4] {
            tracker.record(FORM, at(minute), 1.0);
        }
        assert_eq!(tracker.recent_average(FORM), Some(4.0));
        assert_eq!(tracker.classify(FORM), Trend::Improving);
    }

    #[test]
    fn test_unknown_form_is_stable_and_empty() {
        let tracker = TrendTracker::new(TrendConfig::default());
        assert_eq!(tracker.classify("nope"), Trend::Stable);
        assert_eq!(tracker.recent_average("nope"), None);
        assert_eq!(tracker.point_count("nope"), 0);
    }

    #[test]
    fn test_clear_drops_history() {
        let mut tracker = tracker_with(&[3.0, 3.0, 3.0]);
        assert_eq!(tracker.point_count(FORM), 3);
        tracker.clear();
        assert_eq!(tracker.point_count(FORM), 0);
    }
}
