//! History Aggregation
//!
//! Reduces the stored check-ins and chat log into derived views:
//!
//! - **calendar**: Unwell-day markers and the monthly sick-day count
//! - **trend**: Per-symptom chart series, weekly average and trend label
//!
//! Every view is a pure function of a `HistorySnapshot`; nothing here
//! writes to storage, so views can be recomputed whenever they are shown.

mod calendar;
mod trend;

pub use calendar::{
    is_unwell_survey, mentions_sickness, CalendarMarking, DayMark, MarkSource, MonthSummary,
    SICKNESS_KEYWORDS, UNWELL_THRESHOLD,
};
pub use trend::{trend_label, weekly_average, TrendLabel, TrendPoint, TrendSeries, TREND_WINDOW};

use crate::storage::{ChatRecord, HealthRepository, SurveyRecord};

/// Point-in-time copy of both histories
#[derive(Debug, Clone, Default)]
pub struct HistorySnapshot {
    pub surveys: Vec<SurveyRecord>,
    pub chats: Vec<ChatRecord>,
}

impl HistorySnapshot {
    pub fn calendar(&self) -> CalendarMarking {
        CalendarMarking::from_history(&self.surveys, &self.chats)
    }

    pub fn trend(&self, symptom: &str) -> TrendSeries {
        TrendSeries::compute(&self.surveys, symptom)
    }
}

/// Loads snapshots from the repository and derives views from them
#[derive(Clone)]
pub struct HistoryAggregator {
    repo: HealthRepository,
}

impl HistoryAggregator {
    pub fn new(repo: HealthRepository) -> Self {
        Self { repo }
    }

    /// Read both histories; unreadable data yields empty lists
    pub async fn snapshot(&self) -> HistorySnapshot {
        let surveys = self.repo.survey_history().await;
        let chats = self.repo.chat_history().await;

        tracing::debug!(
            surveys = surveys.len(),
            chats = chats.len(),
            "Loaded history snapshot"
        );

        HistorySnapshot { surveys, chats }
    }

    /// Unwell-day marking over the whole history
    pub async fn calendar(&self) -> CalendarMarking {
        self.snapshot().await.calendar()
    }

    /// Sick-day count for one month
    pub async fn month_summary(&self, year: i32, month: u32) -> MonthSummary {
        self.calendar().await.month_summary(year, month)
    }

    /// Trend series for one symptom
    pub async fn trend(&self, symptom: &str) -> TrendSeries {
        let surveys = self.repo.survey_history().await;
        TrendSeries::compute(&surveys, symptom)
    }
}
