//! Chat Assistant
//!
//! Remote chat providers and the session that records conversations.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐   ChatRequest    ┌──────────────────────────┐
//! │ ChatSession │ ───────────────▶ │ dyn ChatService          │
//! │ (transcript)│ ◀─────────────── │  ├─ OpenAiClient         │
//! └──────┬──────┘   reply text     │  └─ GeminiClient         │
//!        │                         └──────────────────────────┘
//!        ▼
//!  HealthRepository (messages, chatHistory)
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use healthscore::chat::{ChatSession, OpenAiClient, OpenAiConfig};
//! use healthscore::storage::{HealthRepository, MemoryStore};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let repo = HealthRepository::new(Arc::new(MemoryStore::new()));
//! let provider = Arc::new(OpenAiClient::new(OpenAiConfig::with_api_key("sk-..."))?);
//!
//! let mut session = ChatSession::load(repo, provider).await;
//! let reply = session.send("I have a headache", None).await?;
//! println!("{}", reply.text());
//! # Ok(())
//! # }
//! ```

mod gemini;
mod openai;
mod session;
mod types;

pub use gemini::{GeminiClient, GeminiConfig};
pub use openai::{OpenAiClient, OpenAiConfig, DEFAULT_ANALYSIS_PROMPT};
pub use session::{extract_suggestions, ChatSession, APOLOGY, GREETING};
pub use types::{ChatMessage, ChatRequest, ContentPart, ImagePayload, Role};

use crate::storage::StorageError;
use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

/// A remote model that answers one chat turn
#[async_trait]
pub trait ChatService: Send + Sync {
    /// Provider name for logs
    fn name(&self) -> &str;

    /// Produce the assistant reply for a request
    async fn complete(&self, request: ChatRequest) -> Result<String, ChatError>;
}

/// Errors from chat providers and the chat session
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Chat provider unavailable")]
    Unavailable,

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Request timeout")]
    Timeout,

    #[error("No response received from the assistant")]
    EmptyResponse,

    #[error("Cannot read image {path:?}: {reason}")]
    ImageAccess { path: PathBuf, reason: String },

    #[error("Permission denied for {0:?}")]
    PermissionDenied(PathBuf),

    #[error("Message is empty")]
    EmptyMessage,

    #[error("Chat provider not configured: {0}")]
    NotConfigured(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl ChatError {
    /// Text shown to the user in place of a reply
    pub fn apology(&self) -> &'static str {
        APOLOGY
    }

    /// Errors raised before any request was sent
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            ChatError::EmptyMessage | ChatError::ImageAccess { .. } | ChatError::PermissionDenied(_)
        )
    }
}

/// Map a transport error to the provider error taxonomy
pub(crate) fn map_send_error(e: reqwest::Error) -> ChatError {
    if e.is_timeout() {
        ChatError::Timeout
    } else if e.is_connect() {
        ChatError::Unavailable
    } else {
        ChatError::Request(e)
    }
}

/// Turn a non-success response into `ChatError::ApiError`
pub(crate) async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ChatError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    Err(ChatError::ApiError {
        status: status.as_u16(),
        message: text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(ChatError::EmptyMessage.is_input_error());
        assert!(ChatError::PermissionDenied(PathBuf::from("/x.png")).is_input_error());
        assert!(!ChatError::Timeout.is_input_error());
        assert_eq!(ChatError::Unavailable.apology(), APOLOGY);
    }

    #[test]
    fn test_error_display() {
        let err = ChatError::ApiError {
            status: 401,
            message: "bad key".to_string(),
        };
        assert_eq!(err.to_string(), "API error 401: bad key");
    }
}
