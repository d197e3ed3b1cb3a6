//! Typed access to the key-value store
//!
//! `HealthRepository` turns the raw string blobs into cadence flags, survey
//! records and chat records. Reads used for display never fail: a storage or
//! parse error is logged and the caller gets the default (empty history, no
//! cadence flags). Writes propagate their errors.

use crate::cadence::CadenceState;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::store::KeyValueStore;
use crate::storage::types::{ChatRecord, StorageKey, SurveyRecord};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

const TRUE: &str = "true";

/// Typed repository over a `KeyValueStore`
#[derive(Clone)]
pub struct HealthRepository {
    store: Arc<dyn KeyValueStore>,
}

impl HealthRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// The underlying store
    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    // ============================================
    // Cadence flags
    // ============================================

    /// Load the cadence flags, failing on unreadable values
    pub async fn try_load_cadence_state(&self) -> StorageResult<CadenceState> {
        let last_submission = match self.store.get(StorageKey::LastSubmissionTime).await? {
            Some(raw) => Some(parse_instant(StorageKey::LastSubmissionTime, &raw)?),
            None => None,
        };
        let completed_morning = self.flag(StorageKey::CompletedMorningSurvey).await?;
        let completed_evening = self.flag(StorageKey::CompletedEveningSurvey).await?;

        Ok(CadenceState {
            last_submission,
            completed_morning,
            completed_evening,
        })
    }

    /// Load the cadence flags, falling back to the initial state on error
    pub async fn load_cadence_state(&self) -> CadenceState {
        match self.try_load_cadence_state().await {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read cadence state, using initial state");
                CadenceState::default()
            }
        }
    }

    /// Write the cadence flags; cleared flags are removed from the store
    pub async fn save_cadence_state(&self, state: &CadenceState) -> StorageResult<()> {
        match state.last_submission {
            Some(ts) => {
                self.store
                    .set(
                        StorageKey::LastSubmissionTime,
                        ts.to_rfc3339_opts(SecondsFormat::Millis, true),
                    )
                    .await?
            }
            None => self.store.remove(StorageKey::LastSubmissionTime).await?,
        }
        self.set_flag(StorageKey::CompletedMorningSurvey, state.completed_morning)
            .await?;
        self.set_flag(StorageKey::CompletedEveningSurvey, state.completed_evening)
            .await?;
        Ok(())
    }

    async fn flag(&self, key: StorageKey) -> StorageResult<bool> {
        Ok(self.store.get(key).await?.as_deref() == Some(TRUE))
    }

    async fn set_flag(&self, key: StorageKey, value: bool) -> StorageResult<()> {
        if value {
            self.store.set(key, TRUE.to_string()).await
        } else {
            self.store.remove(key).await
        }
    }

    // ============================================
    // Survey history
    // ============================================

    /// All check-ins in submission order; empty on any read failure
    pub async fn survey_history(&self) -> Vec<SurveyRecord> {
        self.read_list_or_empty(StorageKey::SymptomsHistory).await
    }

    /// Append a check-in to the history
    pub async fn append_survey(&self, record: SurveyRecord) -> StorageResult<()> {
        self.append_raw(StorageKey::SymptomsHistory, std::slice::from_ref(&record))
            .await
    }

    /// Remove the most recent check-in if it is the one stamped `timestamp`
    ///
    /// Returns whether an entry was removed. Older entries are left untouched.
    pub async fn remove_last_survey(&self, timestamp: DateTime<Utc>) -> StorageResult<bool> {
        let mut values = self.read_raw(StorageKey::SymptomsHistory).await?;
        let matches = values
            .last()
            .and_then(|v| serde_json::from_value::<SurveyRecord>(v.clone()).ok())
            .map(|r| r.timestamp == timestamp)
            .unwrap_or(false);
        if !matches {
            return Ok(false);
        }
        values.pop();
        self.write_list(StorageKey::SymptomsHistory, &values).await?;
        Ok(true)
    }

    // ============================================
    // Chat history
    // ============================================

    /// The chat log in write order; empty on any read failure
    pub async fn chat_history(&self) -> Vec<ChatRecord> {
        self.read_list_or_empty(StorageKey::ChatHistory).await
    }

    /// Append chat lines to the log
    pub async fn append_chat(&self, records: &[ChatRecord]) -> StorageResult<()> {
        if records.is_empty() {
            return Ok(());
        }
        self.append_raw(StorageKey::ChatHistory, records).await
    }

    // ============================================
    // Reset
    // ============================================

    /// Remove every key the app owns
    pub async fn clear_all(&self) -> StorageResult<()> {
        for key in StorageKey::all() {
            self.store.remove(*key).await?;
        }
        tracing::info!("Cleared all stored health data");
        Ok(())
    }

    // ============================================
    // JSON list helpers
    // ============================================

    /// Read a JSON array stored under `key`
    ///
    /// A missing key is an empty list. Elements that do not decode as `T`
    /// are skipped with a warning; a value that is not an array is an error.
    pub async fn read_list<T: DeserializeOwned>(&self, key: StorageKey) -> StorageResult<Vec<T>> {
        let values = self.read_raw(key).await?;

        let total = values.len();
        let items: Vec<T> = values
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect();

        if items.len() < total {
            tracing::warn!(
                key = %key,
                skipped = total - items.len(),
                "Skipped unreadable entries"
            );
        }

        Ok(items)
    }

    /// Read the JSON array under `key` without decoding its elements
    async fn read_raw(&self, key: StorageKey) -> StorageResult<Vec<serde_json::Value>> {
        let Some(raw) = self.store.get(key).await? else {
            return Ok(Vec::new());
        };

        serde_json::from_str(&raw).map_err(|e| StorageError::Corruption {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    /// Append to the array under `key`, keeping existing elements verbatim
    ///
    /// Entries this version cannot decode are carried over unchanged.
    async fn append_raw<T: Serialize>(&self, key: StorageKey, items: &[T]) -> StorageResult<()> {
        let mut values = self.read_raw(key).await?;
        for item in items {
            values.push(serde_json::to_value(item)?);
        }
        self.write_list(key, &values).await
    }

    async fn read_list_or_empty<T: DeserializeOwned>(&self, key: StorageKey) -> Vec<T> {
        match self.read_list(key).await {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to load list, using empty");
                Vec::new()
            }
        }
    }

    /// Write a JSON array under `key`
    pub async fn write_list<T: Serialize>(&self, key: StorageKey, items: &[T]) -> StorageResult<()> {
        let raw = serde_json::to_string(items)?;
        self.store.set(key, raw).await
    }
}

fn parse_instant(key: StorageKey, raw: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::Corruption {
            key: key.to_string(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::store::MemoryStore;
    use crate::storage::types::{Sender, SymptomRating};
    use chrono::TimeZone;

    fn repo() -> HealthRepository {
        HealthRepository::new(Arc::new(MemoryStore::new()))
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, hour, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_empty_store_defaults() {
        let repo = repo();
        assert_eq!(repo.load_cadence_state().await, CadenceState::default());
        assert!(repo.survey_history().await.is_empty());
        assert!(repo.chat_history().await.is_empty());
    }

    #[tokio::test]
    async fn test_cadence_state_roundtrip() {
        let repo = repo();
        let state = CadenceState {
            last_submission: Some(at(8)),
            completed_morning: true,
            completed_evening: false,
        };
        repo.save_cadence_state(&state).await.unwrap();

        assert_eq!(repo.load_cadence_state().await, state);
        assert_eq!(
            repo.store()
                .get(StorageKey::CompletedMorningSurvey)
                .await
                .unwrap()
                .as_deref(),
            Some("true")
        );
        assert_eq!(
            repo.store()
                .get(StorageKey::CompletedEveningSurvey)
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_bad_timestamp_falls_back_to_initial_state() {
        let repo = repo();
        repo.store()
            .set(StorageKey::LastSubmissionTime, "yesterday".to_string())
            .await
            .unwrap();
        repo.store()
            .set(StorageKey::CompletedMorningSurvey, "true".to_string())
            .await
            .unwrap();

        assert!(repo.try_load_cadence_state().await.is_err());
        assert_eq!(repo.load_cadence_state().await, CadenceState::default());
    }

    #[tokio::test]
    async fn test_append_survey_keeps_order() {
        let repo = repo();
        for hour in [8, 20] {
            repo.append_survey(SurveyRecord::new(
                at(hour),
                vec![SymptomRating::new("Mood", 7)],
                hour == 8,
            ))
            .await
            .unwrap();
        }

        let history = repo.survey_history().await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].timestamp, at(8));
        assert!(history[0].is_morning);
        assert!(!history[1].is_morning);
    }

    #[tokio::test]
    async fn test_corrupt_history_reads_empty_but_refuses_append() {
        let repo = repo();
        repo.store()
            .set(StorageKey::SymptomsHistory, "{broken".to_string())
            .await
            .unwrap();

        assert!(repo.survey_history().await.is_empty());

        let result = repo
            .append_survey(SurveyRecord::new(at(8), vec![], true))
            .await;
        assert!(matches!(result, Err(StorageError::Corruption { .. })));
    }

    #[tokio::test]
    async fn test_unreadable_entries_are_skipped() {
        let repo = repo();
        repo.store()
            .set(
                StorageKey::SymptomsHistory,
                r#"[{"symptoms":[{"name":"Mood","rating":5}],"isMorningSurvey":true},
                    {"timestamp":"2024-05-10T08:00:00.000Z","symptoms":[{"name":"Mood","rating":5}],"isMorningSurvey":true}]"#
                    .to_string(),
            )
            .await
            .unwrap();

        let history = repo.survey_history().await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].timestamp, at(8));
    }

    #[tokio::test]
    async fn test_append_keeps_unreadable_entries() {
        let repo = repo();
        repo.store()
            .set(
                StorageKey::SymptomsHistory,
                r#"[{"timestamp":"2024-05-09T08:00:00.000Z","symptoms":[{"name":"Mood","rating":5.5}],"isMorningSurvey":true}]"#
                    .to_string(),
            )
            .await
            .unwrap();

        repo.append_survey(SurveyRecord::new(at(8), vec![SymptomRating::new("Mood", 6)], true))
            .await
            .unwrap();

        let raw = repo
            .store()
            .get(StorageKey::SymptomsHistory)
            .await
            .unwrap()
            .unwrap();
        let values: Vec<serde_json::Value> = serde_json::from_str(&raw).unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(values[0]["timestamp"], "2024-05-09T08:00:00.000Z");
        assert_eq!(values[0]["symptoms"][0]["rating"], 5.5);
        assert_eq!(repo.survey_history().await.len(), 1);

        repo.store()
            .set(StorageKey::ChatHistory, r#"[{"text":"no sender"}]"#.to_string())
            .await
            .unwrap();
        repo.append_chat(&[ChatRecord::new(at(9), "hello", Sender::User)])
            .await
            .unwrap();
        let raw = repo.store().get(StorageKey::ChatHistory).await.unwrap().unwrap();
        let values: Vec<serde_json::Value> = serde_json::from_str(&raw).unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(values[0]["text"], "no sender");
    }

    #[tokio::test]
    async fn test_remove_last_survey_only_matches_newest() {
        let repo = repo();
        for hour in [8, 20] {
            repo.append_survey(SurveyRecord::new(at(hour), vec![], hour == 8))
                .await
                .unwrap();
        }

        assert!(!repo.remove_last_survey(at(8)).await.unwrap());
        assert!(repo.remove_last_survey(at(20)).await.unwrap());

        let history = repo.survey_history().await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].timestamp, at(8));
    }

    #[tokio::test]
    async fn test_append_chat_and_clear_all() {
        let repo = repo();
        repo.append_chat(&[
            ChatRecord::new(at(9), "I feel sick", Sender::User),
            ChatRecord::new(at(9), "Sorry to hear that", Sender::Ai),
        ])
        .await
        .unwrap();
        assert_eq!(repo.chat_history().await.len(), 2);

        repo.save_cadence_state(&CadenceState {
            last_submission: Some(at(8)),
            completed_morning: true,
            completed_evening: false,
        })
        .await
        .unwrap();

        repo.clear_all().await.unwrap();
        assert!(repo.chat_history().await.is_empty());
        assert_eq!(repo.load_cadence_state().await, CadenceState::default());
    }
}
