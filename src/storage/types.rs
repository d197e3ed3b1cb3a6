//! Core record types for the HealthScore store
//!
//! This module defines the values persisted in the key-value store:
//! - `SymptomRating`: one rated symptom within a check-in
//! - `SurveyRecord`: a submitted check-in
//! - `ChatRecord`: one line of the assistant conversation log
//! - `StorageKey`: the fixed set of keys the app reads and writes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lowest valid rating (worst)
pub const MIN_RATING: u8 = 1;
/// Highest valid rating (best)
pub const MAX_RATING: u8 = 10;

/// Symptoms asked on every check-in, in display order
pub const DEFAULT_SYMPTOMS: [&str; 5] = [
    "Overall Health",
    "Energy Level",
    "Pain Level",
    "Mood",
    "Sleep Quality",
];

/// Rating each questionnaire slider starts at
pub const DEFAULT_RATING: u8 = 5;

/// Keys used in the key-value store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
    /// RFC 3339 instant of the last submission that started a cooldown
    LastSubmissionTime,
    /// Literal `"true"` once the morning check-in is done
    CompletedMorningSurvey,
    /// Literal `"true"` once the evening check-in is done
    CompletedEveningSurvey,
    /// JSON array of `SurveyRecord`
    SymptomsHistory,
    /// JSON array of `ChatRecord`
    ChatHistory,
    /// JSON array holding the current chat transcript
    Messages,
}

impl StorageKey {
    /// The key string as stored
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKey::LastSubmissionTime => "lastSubmissionTime",
            StorageKey::CompletedMorningSurvey => "completedMorningSurvey",
            StorageKey::CompletedEveningSurvey => "completedEveningSurvey",
            StorageKey::SymptomsHistory => "symptomsHistory",
            StorageKey::ChatHistory => "chatHistory",
            StorageKey::Messages => "messages",
        }
    }

    /// Get all keys for iteration
    pub fn all() -> &'static [StorageKey] {
        &[
            StorageKey::LastSubmissionTime,
            StorageKey::CompletedMorningSurvey,
            StorageKey::CompletedEveningSurvey,
            StorageKey::SymptomsHistory,
            StorageKey::ChatHistory,
            StorageKey::Messages,
        ]
    }
}

impl std::fmt::Display for StorageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single rated symptom
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SymptomRating {
    pub name: String,
    /// 1 = worst, 10 = best
    pub rating: u8,
}

impl SymptomRating {
    pub fn new(name: impl Into<String>, rating: u8) -> Self {
        Self {
            name: name.into(),
            rating,
        }
    }

    /// Check the rating is on the 1-10 scale
    pub fn is_valid(&self) -> bool {
        (MIN_RATING..=MAX_RATING).contains(&self.rating)
    }

    /// Human-readable band for the rating
    pub fn description(&self) -> &'static str {
        rating_description(self.rating)
    }

    /// The default questionnaire, every symptom at the default rating
    pub fn defaults() -> Vec<SymptomRating> {
        DEFAULT_SYMPTOMS
            .iter()
            .map(|name| SymptomRating::new(*name, DEFAULT_RATING))
            .collect()
    }
}

/// Describe a rating the way the questionnaire labels its sliders
pub fn rating_description(rating: u8) -> &'static str {
    match rating {
        0..=2 => "Very Poor",
        3..=4 => "Poor",
        5..=6 => "Fair",
        7..=8 => "Good",
        _ => "Excellent",
    }
}

/// A submitted check-in
///
/// Immutable once created; appended to `symptomsHistory` and only removed
/// by a full data reset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SurveyRecord {
    pub timestamp: DateTime<Utc>,
    pub symptoms: Vec<SymptomRating>,
    #[serde(rename = "isMorningSurvey", default)]
    pub is_morning: bool,
}

impl SurveyRecord {
    pub fn new(timestamp: DateTime<Utc>, symptoms: Vec<SymptomRating>, is_morning: bool) -> Self {
        Self {
            timestamp,
            symptoms,
            is_morning,
        }
    }

    /// Mean rating over all symptoms, `None` for an empty record
    pub fn average_rating(&self) -> Option<f64> {
        if self.symptoms.is_empty() {
            return None;
        }
        let total: u32 = self.symptoms.iter().map(|s| s.rating as u32).sum();
        Some(total as f64 / self.symptoms.len() as f64)
    }

    /// Rating for a symptom by exact name
    pub fn rating_for(&self, symptom: &str) -> Option<u8> {
        self.symptoms
            .iter()
            .find(|s| s.name == symptom)
            .map(|s| s.rating)
    }
}

/// Who wrote a chat line
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Ai,
}

impl std::fmt::Display for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sender::User => write!(f, "user"),
            Sender::Ai => write!(f, "ai"),
        }
    }
}

/// One line of the chat log
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatRecord {
    pub timestamp: DateTime<Utc>,
    pub text: String,
    pub sender: Sender,
}

impl ChatRecord {
    pub fn new(timestamp: DateTime<Utc>, text: impl Into<String>, sender: Sender) -> Self {
        Self {
            timestamp,
            text: text.into(),
            sender,
        }
    }

    /// A user line stamped now
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Utc::now(), text, Sender::User)
    }

    /// An assistant line stamped now
    pub fn ai(text: impl Into<String>) -> Self {
        Self::new(Utc::now(), text, Sender::Ai)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_storage_key_names() {
        assert_eq!(StorageKey::LastSubmissionTime.as_str(), "lastSubmissionTime");
        assert_eq!(StorageKey::SymptomsHistory.to_string(), "symptomsHistory");
        assert_eq!(StorageKey::all().len(), 6);
    }

    #[test]
    fn test_rating_validation() {
        assert!(SymptomRating::new("Mood", 1).is_valid());
        assert!(SymptomRating::new("Mood", 10).is_valid());
        assert!(!SymptomRating::new("Mood", 0).is_valid());
        assert!(!SymptomRating::new("Mood", 11).is_valid());
    }

    #[test]
    fn test_rating_description() {
        assert_eq!(rating_description(1), "Very Poor");
        assert_eq!(rating_description(4), "Poor");
        assert_eq!(rating_description(6), "Fair");
        assert_eq!(rating_description(8), "Good");
        assert_eq!(rating_description(9), "Excellent");
    }

    #[test]
    fn test_default_questionnaire() {
        let defaults = SymptomRating::defaults();
        assert_eq!(defaults.len(), 5);
        assert_eq!(defaults[0].name, "Overall Health");
        assert!(defaults.iter().all(|s| s.rating == DEFAULT_RATING));
    }

    #[test]
    fn test_average_rating() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        let record = SurveyRecord::new(
            ts,
            vec![SymptomRating::new("Mood", 4), SymptomRating::new("Sleep Quality", 7)],
            true,
        );
        assert_eq!(record.average_rating(), Some(5.5));
        assert_eq!(record.rating_for("Mood"), Some(4));
        assert_eq!(record.rating_for("Pain Level"), None);

        let empty = SurveyRecord::new(ts, vec![], true);
        assert_eq!(empty.average_rating(), None);
    }

    #[test]
    fn test_survey_record_wire_format() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        let record = SurveyRecord::new(ts, vec![SymptomRating::new("Mood", 6)], false);
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["isMorningSurvey"], false);
        assert_eq!(json["symptoms"][0]["name"], "Mood");
        assert_eq!(json["timestamp"], "2024-03-01T08:00:00Z");
    }

    #[test]
    fn test_chat_record_sender_format() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        let record = ChatRecord::new(ts, "I have a headache", Sender::User);
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"sender\":\"user\""));

        let restored: ChatRecord = serde_json::from_str(
            r#"{"timestamp":"2024-03-01T08:00:00.000Z","text":"hello","sender":"ai"}"#,
        )
        .unwrap();
        assert_eq!(restored.sender, Sender::Ai);
    }
}
