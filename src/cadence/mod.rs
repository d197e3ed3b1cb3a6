//! Survey Cadence
//!
//! Rules for when a check-in may be taken:
//!
//! - **state**: Stored flags, policies, and the pure status evaluation
//! - **engine**: Submission, reset, and cooldown skipping over the repository
//! - **ticker**: The engine-owned timer that republishes the status
//!
//! # State machine (phased policy)
//!
//! ```text
//! AWAITING_MORNING ──submit──▶ MORNING_COOLDOWN ──12h──▶ AWAITING_EVENING
//!        ▲                                                      │
//!        └──────────── reset ◀── EVENING_COOLDOWN ◀──submit─────┘
//! ```
//!
//! The daily policy uses one 24h cooldown keyed off the last submission.

mod engine;
mod state;
mod ticker;

pub use engine::{CadenceEngine, CadenceError, CadenceResult};
pub use state::{
    CadencePolicy, CadenceRules, CadenceStage, CadenceState, CadenceStatus, Countdown, Phase,
};
