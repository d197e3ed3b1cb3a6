//! Cadence state and rules
//!
//! `CadenceState` is what gets stored. Everything else here (stage, phase,
//! countdown) is derived from it and the current time by `CadenceRules`,
//! and is never persisted.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Stored cadence flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CadenceState {
    /// When the last cooldown started
    pub last_submission: Option<DateTime<Utc>>,
    /// Morning check-in done for the current cycle
    pub completed_morning: bool,
    /// Evening check-in done for the current cycle
    pub completed_evening: bool,
}

/// Which rule set gates check-ins
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CadencePolicy {
    /// Morning then evening, a cooldown after the morning check-in
    #[default]
    Phased,
    /// One check-in per cooldown window, no morning/evening distinction
    Daily,
}

impl std::fmt::Display for CadencePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CadencePolicy::Phased => write!(f, "phased"),
            CadencePolicy::Daily => write!(f, "daily"),
        }
    }
}

impl std::str::FromStr for CadencePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "phased" => Ok(CadencePolicy::Phased),
            "daily" => Ok(CadencePolicy::Daily),
            other => Err(format!("unknown cadence policy: {}", other)),
        }
    }
}

/// Morning or evening slot of the daily cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Morning,
    Evening,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Morning => write!(f, "morning"),
            Phase::Evening => write!(f, "evening"),
        }
    }
}

/// Position in the check-in cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CadenceStage {
    AwaitingMorning,
    MorningCooldown,
    AwaitingEvening,
    /// Both check-ins done; only an explicit reset leaves this stage
    EveningCooldown,
}

impl std::fmt::Display for CadenceStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CadenceStage::AwaitingMorning => write!(f, "awaiting_morning"),
            CadenceStage::MorningCooldown => write!(f, "morning_cooldown"),
            CadenceStage::AwaitingEvening => write!(f, "awaiting_evening"),
            CadenceStage::EveningCooldown => write!(f, "evening_cooldown"),
        }
    }
}

/// Time left until the next check-in opens
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Countdown {
    seconds: i64,
}

impl Countdown {
    /// Build from a duration; negative durations clamp to zero
    pub fn from_duration(duration: Duration) -> Self {
        Self {
            seconds: duration.num_seconds().max(0),
        }
    }

    pub fn as_duration(&self) -> Duration {
        Duration::seconds(self.seconds)
    }

    pub fn hours(&self) -> i64 {
        self.seconds / 3600
    }

    pub fn minutes(&self) -> i64 {
        (self.seconds % 3600) / 60
    }

    pub fn seconds(&self) -> i64 {
        self.seconds % 60
    }

    /// `HH:MM`, floored
    pub fn hhmm(&self) -> String {
        format!("{:02}:{:02}", self.hours(), self.minutes())
    }

    /// `HH:MM:SS`, floored
    pub fn hhmmss(&self) -> String {
        format!(
            "{:02}:{:02}:{:02}",
            self.hours(),
            self.minutes(),
            self.seconds()
        )
    }
}

impl std::fmt::Display for Countdown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.hhmm())
    }
}

/// Derived view of the cadence at one instant
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CadenceStatus {
    pub policy: CadencePolicy,
    pub stage: CadenceStage,
    /// Phase the next (or current) check-in belongs to
    pub phase: Phase,
    pub can_submit: bool,
    pub remaining: Option<Countdown>,
    /// When the current cooldown ends
    pub opens_at: Option<DateTime<Utc>>,
}

impl CadenceStatus {
    fn open(policy: CadencePolicy, stage: CadenceStage, phase: Phase) -> Self {
        Self {
            policy,
            stage,
            phase,
            can_submit: true,
            remaining: None,
            opens_at: None,
        }
    }

    /// Title shown above the check-in button
    pub fn headline(&self) -> &'static str {
        match (self.can_submit, self.stage, self.phase) {
            (true, _, Phase::Morning) => "Morning Health Check-in",
            (true, _, Phase::Evening) => "Evening Health Check-in",
            (false, CadenceStage::EveningCooldown, _) => "Next Check-in Available Soon",
            (false, _, Phase::Evening) => "Evening Survey Available Soon",
            (false, _, Phase::Morning) => "Next Check-in Available Soon",
        }
    }

    /// Line shown under the headline
    pub fn prompt(&self) -> String {
        if let Some(remaining) = self.remaining {
            return format!("Next survey available in: {}", remaining.hhmm());
        }
        match (self.can_submit, self.phase) {
            (true, Phase::Morning) => "How are you feeling this morning?".to_string(),
            (true, Phase::Evening) => "How did you feel throughout the day?".to_string(),
            (false, _) => "Reset the survey to start a new day.".to_string(),
        }
    }
}

/// Cadence rule set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CadenceRules {
    pub policy: CadencePolicy,
    /// Cooldown between the morning and evening check-ins
    pub phase_cooldown: Duration,
    /// Cooldown between check-ins under the daily policy
    pub daily_cooldown: Duration,
}

impl Default for CadenceRules {
    fn default() -> Self {
        Self {
            policy: CadencePolicy::Phased,
            phase_cooldown: Duration::hours(12),
            daily_cooldown: Duration::hours(24),
        }
    }
}

impl CadenceRules {
    pub fn new(policy: CadencePolicy) -> Self {
        Self {
            policy,
            ..Default::default()
        }
    }

    /// The cooldown the active policy applies after a submission
    pub fn cooldown(&self) -> Duration {
        match self.policy {
            CadencePolicy::Phased => self.phase_cooldown,
            CadencePolicy::Daily => self.daily_cooldown,
        }
    }

    /// Derive the status at `now`
    ///
    /// Cooldown expiry is evaluated here on every call; nothing is written
    /// back when a cooldown ends.
    pub fn evaluate(&self, state: &CadenceState, now: DateTime<Utc>) -> CadenceStatus {
        match self.policy {
            CadencePolicy::Phased => self.evaluate_phased(state, now),
            CadencePolicy::Daily => self.evaluate_daily(state, now),
        }
    }

    fn evaluate_phased(&self, state: &CadenceState, now: DateTime<Utc>) -> CadenceStatus {
        let policy = self.policy;

        if !state.completed_morning {
            return CadenceStatus::open(policy, CadenceStage::AwaitingMorning, Phase::Morning);
        }

        if state.completed_evening {
            return CadenceStatus {
                policy,
                stage: CadenceStage::EveningCooldown,
                phase: Phase::Evening,
                can_submit: false,
                remaining: None,
                opens_at: None,
            };
        }

        match state.last_submission {
            Some(last) => match self.cooldown_remaining(last, now) {
                Some(remaining) => CadenceStatus {
                    policy,
                    stage: CadenceStage::MorningCooldown,
                    phase: Phase::Evening,
                    can_submit: false,
                    remaining: Some(remaining),
                    opens_at: Some(last + self.cooldown()),
                },
                None => CadenceStatus::open(policy, CadenceStage::AwaitingEvening, Phase::Evening),
            },
            None => CadenceStatus::open(policy, CadenceStage::AwaitingEvening, Phase::Evening),
        }
    }

    fn evaluate_daily(&self, state: &CadenceState, now: DateTime<Utc>) -> CadenceStatus {
        let policy = self.policy;

        match state
            .last_submission
            .and_then(|last| self.cooldown_remaining(last, now).map(|r| (last, r)))
        {
            Some((last, remaining)) => CadenceStatus {
                policy,
                stage: CadenceStage::MorningCooldown,
                phase: Phase::Morning,
                can_submit: false,
                remaining: Some(remaining),
                opens_at: Some(last + self.cooldown()),
            },
            None => CadenceStatus::open(policy, CadenceStage::AwaitingMorning, Phase::Morning),
        }
    }

    /// Remaining cooldown, `None` once it has fully elapsed
    fn cooldown_remaining(&self, last: DateTime<Utc>, now: DateTime<Utc>) -> Option<Countdown> {
        let cooldown = self.cooldown();
        let elapsed = now - last;
        if elapsed >= cooldown {
            return None;
        }
        // A clock that moved backwards never extends the wait past one cooldown
        let remaining = (cooldown - elapsed).min(cooldown);
        Some(Countdown::from_duration(remaining))
    }

    /// State after a check-in for `phase` submitted at `now`
    pub fn after_submission(&self, state: &CadenceState, phase: Phase, now: DateTime<Utc>) -> CadenceState {
        match (self.policy, phase) {
            (CadencePolicy::Daily, _) => CadenceState {
                last_submission: Some(now),
                ..*state
            },
            (CadencePolicy::Phased, Phase::Morning) => CadenceState {
                last_submission: Some(now),
                completed_morning: true,
                completed_evening: false,
            },
            (CadencePolicy::Phased, Phase::Evening) => CadenceState {
                last_submission: None,
                completed_morning: true,
                completed_evening: true,
            },
        }
    }

    /// State after ending the current cooldown early
    ///
    /// With the morning done this opens the evening check-in right away;
    /// otherwise it is the same as a full cadence reset.
    pub fn after_skip(&self, state: &CadenceState) -> CadenceState {
        match self.policy {
            CadencePolicy::Phased if state.completed_morning => CadenceState {
                last_submission: None,
                completed_morning: true,
                completed_evening: false,
            },
            CadencePolicy::Phased => CadenceState::default(),
            CadencePolicy::Daily => CadenceState {
                last_submission: None,
                ..*state
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_initial_state_awaits_morning() {
        let rules = CadenceRules::default();
        let status = rules.evaluate(&CadenceState::default(), t0());

        assert_eq!(status.stage, CadenceStage::AwaitingMorning);
        assert_eq!(status.phase, Phase::Morning);
        assert!(status.can_submit);
        assert_eq!(status.remaining, None);
    }

    #[test]
    fn test_morning_cooldown_then_evening() {
        let rules = CadenceRules::default();
        let state = rules.after_submission(&CadenceState::default(), Phase::Morning, t0());

        let status = rules.evaluate(&state, t0() + Duration::minutes(90) + Duration::seconds(15));
        assert_eq!(status.stage, CadenceStage::MorningCooldown);
        assert!(!status.can_submit);
        assert_eq!(status.remaining.unwrap().hhmm(), "10:29");
        assert_eq!(status.opens_at, Some(t0() + Duration::hours(12)));

        let just_before = rules.evaluate(&state, t0() + Duration::hours(12) - Duration::seconds(1));
        assert!(!just_before.can_submit);
        assert_eq!(just_before.remaining.unwrap().hhmmss(), "00:00:01");

        let status = rules.evaluate(&state, t0() + Duration::hours(12));
        assert_eq!(status.stage, CadenceStage::AwaitingEvening);
        assert_eq!(status.phase, Phase::Evening);
        assert!(status.can_submit);
    }

    #[test]
    fn test_morning_done_without_timestamp_opens_evening() {
        let rules = CadenceRules::default();
        let state = CadenceState {
            last_submission: None,
            completed_morning: true,
            completed_evening: false,
        };
        let status = rules.evaluate(&state, t0());
        assert_eq!(status.stage, CadenceStage::AwaitingEvening);
        assert!(status.can_submit);
    }

    #[test]
    fn test_evening_submission_closes_cycle() {
        let rules = CadenceRules::default();
        let morning = rules.after_submission(&CadenceState::default(), Phase::Morning, t0());
        let evening_at = t0() + Duration::hours(13);
        let state = rules.after_submission(&morning, Phase::Evening, evening_at);

        assert_eq!(state.last_submission, None);
        assert!(state.completed_evening);

        let status = rules.evaluate(&state, evening_at + Duration::days(3));
        assert_eq!(status.stage, CadenceStage::EveningCooldown);
        assert!(!status.can_submit);
        assert_eq!(status.remaining, None);
        assert_eq!(status.headline(), "Next Check-in Available Soon");
        assert_eq!(status.prompt(), "Reset the survey to start a new day.");
    }

    #[test]
    fn test_initial_state_opens_morning() {
        let rules = CadenceRules::default();
        let state = rules.after_submission(&CadenceState::default(), Phase::Morning, t0());
        assert!(!rules.evaluate(&state, t0()).can_submit);

        let status = rules.evaluate(&CadenceState::default(), t0());
        assert!(status.can_submit);
        assert_eq!(status.phase, Phase::Morning);
    }

    #[test]
    fn test_skip_cooldown_opens_evening() {
        let rules = CadenceRules::default();
        let state = rules.after_submission(&CadenceState::default(), Phase::Morning, t0());
        let skipped = rules.after_skip(&state);

        let status = rules.evaluate(&skipped, t0() + Duration::minutes(1));
        assert_eq!(status.stage, CadenceStage::AwaitingEvening);
        assert!(status.can_submit);

        assert_eq!(rules.after_skip(&CadenceState::default()), CadenceState::default());
    }

    #[test]
    fn test_daily_policy_uses_24_hour_window() {
        let rules = CadenceRules::new(CadencePolicy::Daily);
        let state = rules.after_submission(&CadenceState::default(), Phase::Morning, t0());
        assert!(!state.completed_morning);

        let status = rules.evaluate(&state, t0() + Duration::hours(12));
        assert_eq!(status.stage, CadenceStage::MorningCooldown);
        assert_eq!(status.phase, Phase::Morning);
        assert_eq!(status.remaining.unwrap().hhmm(), "12:00");
        assert_eq!(status.headline(), "Next Check-in Available Soon");

        let status = rules.evaluate(&state, t0() + Duration::hours(24));
        assert_eq!(status.stage, CadenceStage::AwaitingMorning);
        assert!(status.can_submit);
    }

    #[test]
    fn test_clock_moving_backwards_caps_countdown() {
        let rules = CadenceRules::default();
        let state = rules.after_submission(&CadenceState::default(), Phase::Morning, t0());
        let status = rules.evaluate(&state, t0() - Duration::hours(2));
        assert_eq!(status.remaining.unwrap().hhmm(), "12:00");
    }

    #[test]
    fn test_status_text() {
        let rules = CadenceRules::default();
        let status = rules.evaluate(&CadenceState::default(), t0());
        assert_eq!(status.headline(), "Morning Health Check-in");
        assert_eq!(status.prompt(), "How are you feeling this morning?");

        let state = rules.after_submission(&CadenceState::default(), Phase::Morning, t0());
        let status = rules.evaluate(&state, t0() + Duration::hours(1));
        assert_eq!(status.headline(), "Evening Survey Available Soon");
        assert_eq!(status.prompt(), "Next survey available in: 11:00");

        let status = rules.evaluate(&state, t0() + Duration::hours(12));
        assert_eq!(status.headline(), "Evening Health Check-in");
        assert_eq!(status.prompt(), "How did you feel throughout the day?");
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!("Daily".parse::<CadencePolicy>().unwrap(), CadencePolicy::Daily);
        assert_eq!("phased".parse::<CadencePolicy>().unwrap(), CadencePolicy::Phased);
        assert!("hourly".parse::<CadencePolicy>().is_err());
    }
}
