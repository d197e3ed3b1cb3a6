//! HealthScore Storage
//!
//! This module provides local persistence for check-ins, chat logs and
//! cadence flags:
//!
//! - **types**: Record types (SurveyRecord, ChatRecord) and the fixed key set
//! - **store**: The async `KeyValueStore` contract plus file and memory backends
//! - **repository**: Typed reads/writes with fall-back-to-default semantics
//! - **error**: Error types
//!
//! # Layout
//!
//! ```text
//! HealthRepository → KeyValueStore (get/set/remove strings)
//!                      ├── FileStore   (<data_dir>/store.json)
//!                      └── MemoryStore
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use healthscore::storage::{FileStore, HealthRepository};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = FileStore::open("./healthscore_data").await?;
//!     let repo = HealthRepository::new(Arc::new(store));
//!
//!     let history = repo.survey_history().await;
//!     println!("{} check-ins recorded", history.len());
//!
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod repository;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use error::{StorageError, StorageResult};
pub use repository::HealthRepository;
pub use store::{FileStore, KeyValueStore, MemoryStore, STORE_FILE};
pub use types::{
    rating_description, ChatRecord, Sender, StorageKey, SurveyRecord, SymptomRating,
    DEFAULT_RATING, DEFAULT_SYMPTOMS, MAX_RATING, MIN_RATING,
};
