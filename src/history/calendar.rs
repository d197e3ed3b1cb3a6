//! Unwell-day calendar
//!
//! Marks the dates on which the user reported feeling unwell, either through
//! a low check-in average or by mentioning a sickness keyword in chat.

use crate::storage::{ChatRecord, Sender, SurveyRecord};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;

/// Check-ins averaging below this mark the day
pub const UNWELL_THRESHOLD: f64 = 6.0;

/// Substrings in a user chat line that mark the day
pub const SICKNESS_KEYWORDS: [&str; 9] = [
    "sick", "ill", "unwell", "fever", "pain", "ache", "nausea", "vomit", "headache",
];

/// Which rule marked a day first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkSource {
    Survey,
    Chat,
}

impl std::fmt::Display for MarkSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarkSource::Survey => write!(f, "survey"),
            MarkSource::Chat => write!(f, "chat"),
        }
    }
}

/// Calendar entry for a marked day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DayMark {
    pub marked: bool,
    pub source: MarkSource,
}

/// Set of unwell days, keyed by UTC date
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CalendarMarking {
    days: BTreeMap<NaiveDate, DayMark>,
}

impl CalendarMarking {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the marking from a full history snapshot
    ///
    /// Surveys are applied before chats, so a day hit by both reports
    /// `MarkSource::Survey`.
    pub fn from_history(surveys: &[SurveyRecord], chats: &[ChatRecord]) -> Self {
        let mut marking = Self::new();

        for record in surveys.iter().filter(|r| is_unwell_survey(r)) {
            marking.mark(record.timestamp.date_naive(), MarkSource::Survey);
        }

        for record in chats
            .iter()
            .filter(|r| r.sender == Sender::User && mentions_sickness(&r.text))
        {
            marking.mark(record.timestamp.date_naive(), MarkSource::Chat);
        }

        marking
    }

    /// Mark a day; returns false if it was already marked
    pub fn mark(&mut self, date: NaiveDate, source: MarkSource) -> bool {
        if self.days.contains_key(&date) {
            return false;
        }
        self.days.insert(
            date,
            DayMark {
                marked: true,
                source,
            },
        );
        true
    }

    pub fn is_marked(&self, date: NaiveDate) -> bool {
        self.days.contains_key(&date)
    }

    pub fn get(&self, date: NaiveDate) -> Option<&DayMark> {
        self.days.get(&date)
    }

    /// Marked dates in ascending order
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.days.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Number of marked days in the given month
    pub fn sick_days_in_month(&self, year: i32, month: u32) -> usize {
        self.days
            .keys()
            .filter(|d| d.year() == year && d.month() == month)
            .count()
    }

    /// Summary for the displayed month
    pub fn month_summary(&self, year: i32, month: u32) -> MonthSummary {
        MonthSummary {
            year,
            month,
            sick_days: self.sick_days_in_month(year, month),
        }
    }
}

/// Unwell-day count for one calendar month
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MonthSummary {
    pub year: i32,
    pub month: u32,
    pub sick_days: usize,
}

impl std::fmt::Display for MonthSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "You reported feeling unwell {} {} this month",
            self.sick_days,
            if self.sick_days == 1 { "day" } else { "days" }
        )
    }
}

/// Whether a check-in's average rating marks its day
pub fn is_unwell_survey(record: &SurveyRecord) -> bool {
    record
        .average_rating()
        .map(|avg| avg < UNWELL_THRESHOLD)
        .unwrap_or(false)
}

/// Case-insensitive substring match against the sickness keywords
///
/// Plain substring matching, so "still" matches "ill".
pub fn mentions_sickness(text: &str) -> bool {
    let lower = text.to_lowercase();
    SICKNESS_KEYWORDS.iter().any(|k| lower.contains(k))
}
