//! Symptom trend series
//!
//! Chart data and weekly summary for one symptom over the most recent
//! check-ins. A check-in that lacks the symptom counts as a rating of 0,
//! both in the chart and in the average.

use crate::storage::SurveyRecord;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Number of most recent check-ins a trend covers
pub const TREND_WINDOW: usize = 7;

/// Direction of the latest change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrendLabel {
    Improving,
    Declining,
    Stable,
    NotEnoughData,
}

impl TrendLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendLabel::Improving => "Improving",
            TrendLabel::Declining => "Declining",
            TrendLabel::Stable => "Stable",
            TrendLabel::NotEnoughData => "Not enough data",
        }
    }
}

impl std::fmt::Display for TrendLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One chart point
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub timestamp: DateTime<Utc>,
    /// Short weekday name, e.g. "Mon"
    pub label: String,
    pub rating: u8,
}

/// Chart and weekly summary for one symptom
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendSeries {
    pub symptom: String,
    pub points: Vec<TrendPoint>,
    /// Mean of the chart ratings to one decimal; `None` with no history
    pub weekly_average: Option<f64>,
    pub trend: TrendLabel,
}

impl TrendSeries {
    /// Compute the series from the full history (oldest first)
    pub fn compute(history: &[SurveyRecord], symptom: &str) -> Self {
        let points = recent(history)
            .iter()
            .map(|record| TrendPoint {
                timestamp: record.timestamp,
                label: record.timestamp.format("%a").to_string(),
                rating: rating_or_zero(record, symptom),
            })
            .collect();

        Self {
            symptom: symptom.to_string(),
            points,
            weekly_average: weekly_average(history, symptom),
            trend: trend_label(history, symptom),
        }
    }

    /// Ratings in chart order
    pub fn ratings(&self) -> Vec<u8> {
        self.points.iter().map(|p| p.rating).collect()
    }
}

/// Mean rating over the last `TREND_WINDOW` check-ins, one decimal
pub fn weekly_average(history: &[SurveyRecord], symptom: &str) -> Option<f64> {
    let window = recent(history);
    if window.is_empty() {
        return None;
    }
    let sum: u32 = window
        .iter()
        .map(|r| rating_or_zero(r, symptom) as u32)
        .sum();
    Some(round_one_decimal(sum as f64 / window.len() as f64))
}

/// Compare the two most recent check-ins
pub fn trend_label(history: &[SurveyRecord], symptom: &str) -> TrendLabel {
    let [.., previous, latest] = history else {
        return TrendLabel::NotEnoughData;
    };

    let latest = rating_or_zero(latest, symptom);
    let previous = rating_or_zero(previous, symptom);

    match latest.cmp(&previous) {
        std::cmp::Ordering::Equal => TrendLabel::Stable,
        std::cmp::Ordering::Greater => TrendLabel::Improving,
        std::cmp::Ordering::Less => TrendLabel::Declining,
    }
}

fn recent(history: &[SurveyRecord]) -> &[SurveyRecord] {
    &history[history.len().saturating_sub(TREND_WINDOW)..]
}

fn rating_or_zero(record: &SurveyRecord, symptom: &str) -> u8 {
    record.rating_for(symptom).unwrap_or(0)
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
