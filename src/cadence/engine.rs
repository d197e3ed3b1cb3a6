//! Survey Cadence Engine
//!
//! Decides whether a check-in may be submitted, records submissions and
//! resets, and owns the one timer that keeps a live status fresh.

use crate::cadence::state::{CadenceRules, CadenceState, CadenceStatus, Countdown, Phase};
use crate::cadence::ticker::{self, CadenceTicker};
use crate::storage::{HealthRepository, StorageError, SurveyRecord, SymptomRating};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::watch;

/// Gatekeeper for check-in submissions
pub struct CadenceEngine {
    repo: HealthRepository,
    rules: CadenceRules,
    ticker: Mutex<Option<CadenceTicker>>,
}

impl CadenceEngine {
    /// Create an engine over the given repository
    pub fn new(repo: HealthRepository, rules: CadenceRules) -> Self {
        Self {
            repo,
            rules,
            ticker: Mutex::new(None),
        }
    }

    /// The active rule set
    pub fn rules(&self) -> &CadenceRules {
        &self.rules
    }

    /// Current status
    pub async fn status(&self) -> CadenceStatus {
        self.status_at(Utc::now()).await
    }

    /// Status as of `now`
    ///
    /// Unreadable stored flags fall back to the initial state, so a storage
    /// problem never locks the user out.
    pub async fn status_at(&self, now: DateTime<Utc>) -> CadenceStatus {
        let state = self.repo.load_cadence_state().await;
        self.rules.evaluate(&state, now)
    }

    /// Submit a check-in now
    pub async fn submit(&self, symptoms: Vec<SymptomRating>) -> CadenceResult<SurveyRecord> {
        self.submit_at(symptoms, Utc::now()).await
    }

    /// Submit a check-in as of `now`
    ///
    /// The record is appended to the history first; the cadence flags are
    /// written only once the record is safely stored. If the flags cannot be
    /// written the record is taken back out, so a failed submission never
    /// leaves a stored check-in behind an open window.
    pub async fn submit_at(
        &self,
        symptoms: Vec<SymptomRating>,
        now: DateTime<Utc>,
    ) -> CadenceResult<SurveyRecord> {
        validate(&symptoms)?;

        let state = self.repo.load_cadence_state().await;
        let status = self.rules.evaluate(&state, now);
        if !status.can_submit {
            tracing::debug!(stage = %status.stage, "Rejected check-in during cooldown");
            return Err(CadenceError::NotAvailable {
                remaining: status.remaining,
            });
        }

        let record = SurveyRecord::new(now, symptoms, status.phase == Phase::Morning);
        self.repo.append_survey(record.clone()).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to save check-in");
            e
        })?;

        let next = self.rules.after_submission(&state, status.phase, now);
        if let Err(e) = self.repo.save_cadence_state(&next).await {
            tracing::error!(error = %e, "Failed to save cadence state, withdrawing check-in");
            self.withdraw(&record, &state).await;
            return Err(e.into());
        }

        tracing::info!(
            phase = %status.phase,
            symptoms = record.symptoms.len(),
            average = record.average_rating().unwrap_or_default(),
            "Recorded check-in"
        );

        Ok(record)
    }

    /// Undo a half-finished submission, best effort
    async fn withdraw(&self, record: &SurveyRecord, previous: &CadenceState) {
        match self.repo.remove_last_survey(record.timestamp).await {
            Ok(true) => {}
            Ok(false) => tracing::warn!("Check-in to withdraw was not the newest entry"),
            Err(e) => tracing::error!(error = %e, "Failed to withdraw check-in"),
        }
        if let Err(e) = self.repo.save_cadence_state(previous).await {
            tracing::error!(error = %e, "Failed to restore cadence state");
        }
    }

    /// Clear all cadence flags and return to the morning check-in
    pub async fn reset(&self) -> CadenceResult<CadenceStatus> {
        self.repo.save_cadence_state(&CadenceState::default()).await?;
        tracing::info!("Survey cadence reset");
        Ok(self.status().await)
    }

    /// End the current cooldown early
    pub async fn skip_cooldown(&self) -> CadenceResult<CadenceStatus> {
        let state = self.repo.load_cadence_state().await;
        let next = self.rules.after_skip(&state);
        self.repo.save_cadence_state(&next).await?;
        tracing::info!(completed_morning = next.completed_morning, "Skipped survey cooldown");
        Ok(self.status().await)
    }

    /// Start the status timer, replacing any running one
    ///
    /// The returned receiver sees a fresh status every `tick`. The timer
    /// stops on `stop_ticker`, when every receiver is dropped, or when the
    /// engine itself is dropped.
    pub async fn start_ticker(
        self: &Arc<Self>,
        tick: std::time::Duration,
    ) -> watch::Receiver<CadenceStatus> {
        let initial = self.status().await;
        let (ticker, rx) = ticker::spawn(Arc::downgrade(self), tick, initial);

        let mut slot = self.ticker.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = slot.replace(ticker) {
            previous.cancel();
        }
        rx
    }

    /// Stop the status timer if one is running
    pub fn stop_ticker(&self) {
        let mut slot = self.ticker.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(ticker) = slot.take() {
            ticker.cancel();
            tracing::debug!("Cadence ticker stopped");
        }
    }

    /// Whether a status timer is currently running
    pub fn is_ticking(&self) -> bool {
        let slot = self.ticker.lock().unwrap_or_else(|e| e.into_inner());
        slot.as_ref().map(|t| !t.is_finished()).unwrap_or(false)
    }
}

impl Drop for CadenceEngine {
    fn drop(&mut self) {
        self.stop_ticker();
    }
}

fn validate(symptoms: &[SymptomRating]) -> CadenceResult<()> {
    if symptoms.is_empty() {
        return Err(CadenceError::EmptySurvey);
    }
    if let Some(bad) = symptoms.iter().find(|s| !s.is_valid()) {
        return Err(CadenceError::InvalidRating {
            name: bad.name.clone(),
            rating: bad.rating,
        });
    }
    Ok(())
}

fn wait_suffix(remaining: &Option<Countdown>) -> String {
    match remaining {
        Some(r) => format!(", next survey available in {}", r.hhmm()),
        None => ", reset the survey to start a new cycle".to_string(),
    }
}

/// Errors from cadence operations
#[derive(Debug, Error)]
pub enum CadenceError {
    #[error("Check-in not available yet{}", wait_suffix(.remaining))]
    NotAvailable { remaining: Option<Countdown> },

    #[error("Rating {rating} for {name} is outside 1-10")]
    InvalidRating { name: String, rating: u8 },

    #[error("A check-in needs at least one symptom rating")]
    EmptySurvey,

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type alias for cadence operations
pub type CadenceResult<T> = Result<T, CadenceError>;
