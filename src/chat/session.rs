//! Conversation session
//!
//! Holds the transcript, calls the provider, and records every completed
//! exchange in the chat history used for unwell-day detection.

use super::types::{ChatMessage, ChatRequest, ImagePayload, Role};
use super::{ChatError, ChatService};
use crate::storage::{ChatRecord, HealthRepository, Sender, StorageKey};
use regex::Regex;
use std::sync::{Arc, OnceLock};

/// First assistant message of a fresh transcript
pub const GREETING: &str = "Hello, I'm your medical assistant. How can I help you today?";

/// Shown in place of a reply when the provider fails
pub const APOLOGY: &str =
    "I apologize, but I'm having trouble responding right now. Please try again.";

/// Chat transcript bound to one provider
pub struct ChatSession {
    repo: HealthRepository,
    provider: Arc<dyn ChatService>,
    messages: Vec<ChatMessage>,
}

impl ChatSession {
    /// Start a new transcript containing only the greeting
    pub fn new(repo: HealthRepository, provider: Arc<dyn ChatService>) -> Self {
        Self {
            repo,
            provider,
            messages: vec![ChatMessage::assistant(GREETING)],
        }
    }

    /// Resume the saved transcript, or start fresh if none is readable
    pub async fn load(repo: HealthRepository, provider: Arc<dyn ChatService>) -> Self {
        let saved = match repo.read_list::<ChatMessage>(StorageKey::Messages).await {
            Ok(messages) => messages,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load chat transcript, starting fresh");
                Vec::new()
            }
        };

        let mut session = Self::new(repo, provider);
        if !saved.is_empty() {
            session.messages = saved;
        }
        session
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Send one user turn and return the assistant reply
    ///
    /// On any provider or storage failure the transcript is restored to its
    /// state before the call. The chat history is appended last, so a failed
    /// send never leaves lines behind for unwell-day detection.
    pub async fn send(
        &mut self,
        text: &str,
        image: Option<ImagePayload>,
    ) -> Result<ChatMessage, ChatError> {
        let text = text.trim();
        if text.is_empty() && image.is_none() {
            return Err(ChatError::EmptyMessage);
        }

        let snapshot = self.messages.clone();
        let request = ChatRequest::new(text)
            .with_history(snapshot.clone())
            .with_image(image.clone());
        let user_message = ChatMessage::user(text, image);
        self.messages.push(user_message.clone());

        match self.exchange(request, &user_message).await {
            Ok(reply) => Ok(reply),
            Err(e) => {
                tracing::warn!(
                    provider = self.provider.name(),
                    error = %e,
                    "Chat request failed, rolling back transcript"
                );
                self.messages = snapshot;
                if matches!(e, ChatError::Storage(_)) {
                    if let Err(restore) = self.save().await {
                        tracing::warn!(error = %restore, "Failed to restore saved transcript");
                    }
                }
                Err(e)
            }
        }
    }

    async fn exchange(
        &mut self,
        request: ChatRequest,
        user_message: &ChatMessage,
    ) -> Result<ChatMessage, ChatError> {
        let raw = self.provider.complete(request).await?;
        let (clean, suggestions) = extract_suggestions(raw.trim());
        let reply = ChatMessage::assistant(clean).with_suggestions(suggestions);

        self.messages.push(reply.clone());
        self.save().await?;

        self.repo
            .append_chat(&[
                ChatRecord::new(user_message.timestamp, user_message.text(), Sender::User),
                ChatRecord::new(reply.timestamp, reply.text(), Sender::Ai),
            ])
            .await?;

        tracing::info!(
            provider = self.provider.name(),
            suggestions = reply.suggestions.len(),
            "Chat reply received"
        );
        Ok(reply)
    }

    /// Persist the transcript under the `messages` key
    pub async fn save(&self) -> Result<(), ChatError> {
        self.repo
            .write_list(StorageKey::Messages, &self.messages)
            .await?;
        Ok(())
    }

    /// Drop the transcript back to the greeting
    pub async fn clear(&mut self) -> Result<(), ChatError> {
        self.messages = vec![ChatMessage::assistant(GREETING)];
        self.save().await
    }

    /// Number of turns sent by the user
    pub fn user_turns(&self) -> usize {
        self.messages.iter().filter(|m| m.role == Role::User).count()
    }
}

fn option_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\[([^\]]+)\]").ok())
        .as_ref()
}

/// Split bracketed options out of a reply
///
/// `"Is it [Front] [Back]?"` becomes `("Is it  ?", ["Front", "Back"])`.
pub fn extract_suggestions(text: &str) -> (String, Vec<String>) {
    let Some(re) = option_pattern() else {
        return (text.to_string(), Vec::new());
    };

    let suggestions = re
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .collect();
    let clean = re.replace_all(text, "").trim().to_string();

    (clean, suggestions)
}
