//! # HealthScore
//!
//! Health check-in core: scheduled symptom surveys, an AI chat assistant,
//! and history views derived from what the user reported.
//!
//! ## Modules
//!
//! - [`cadence`]: When a check-in may be taken, with an engine-owned timer
//! - [`history`]: Unwell-day calendar and per-symptom trends
//! - [`chat`]: Remote chat providers and the conversation session
//! - [`storage`]: Key-value persistence and the typed repository
//! - [`config`]: TOML configuration with environment overrides
//! - [`context`]: The application context wiring it all together
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use healthscore::{AppContext, Config};
//! use healthscore::storage::SymptomRating;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let ctx = AppContext::open(Config::load_default()).await?;
//!
//!     let status = ctx.cadence.status().await;
//!     println!("{}: {}", status.headline(), status.prompt());
//!
//!     if status.can_submit {
//!         ctx.cadence.submit(SymptomRating::defaults()).await?;
//!     }
//!
//!     let trend = ctx.history().trend("Overall Health").await;
//!     println!("Trend: {}", trend.trend);
//!
//!     Ok(())
//! }
//! ```

pub mod cadence;
pub mod chat;
pub mod config;
pub mod context;
pub mod history;
pub mod storage;

// Re-export top-level types for convenience
pub use cadence::{
    CadenceEngine, CadenceError, CadencePolicy, CadenceResult, CadenceStage, CadenceStatus,
    Countdown, Phase,
};

pub use chat::{ChatError, ChatMessage, ChatService, ChatSession, ContentPart, ImagePayload};

pub use config::{Config, ConfigError};

pub use context::AppContext;

pub use history::{CalendarMarking, HistoryAggregator, MonthSummary, TrendLabel, TrendSeries};

pub use storage::{
    ChatRecord, FileStore, HealthRepository, KeyValueStore, MemoryStore, StorageError,
    StorageResult, SurveyRecord, SymptomRating,
};
