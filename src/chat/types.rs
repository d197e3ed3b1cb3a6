//! Chat message types
//!
//! Provider-neutral conversation model. Content is a list of tagged parts,
//! so a single user turn can carry text and an attached image.

use super::ChatError;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

/// Speaker of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Base64-encoded image with its mime type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePayload {
    pub mime_type: String,
    pub data: String,
}

impl ImagePayload {
    pub fn new(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }

    /// Read an image file, guessing the mime type from its extension
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, ChatError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::PermissionDenied {
                ChatError::PermissionDenied(path.to_path_buf())
            } else {
                ChatError::ImageAccess {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                }
            }
        })?;

        let mime = mime_guess::from_path(path).first_or_octet_stream();
        Ok(Self::new(mime.essence_str(), &bytes))
    }

    /// `data:` URL form, as accepted by OpenAI's `image_url`
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

/// One piece of message content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentPart {
    Text { text: String },
    Image { image: ImagePayload },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    pub fn image(image: ImagePayload) -> Self {
        ContentPart::Image { image }
    }
}

/// A message in the conversation transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub parts: Vec<ContentPart>,
    pub timestamp: DateTime<Utc>,
    /// Bracketed options offered with an assistant reply
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

impl ChatMessage {
    pub fn new(role: Role, parts: Vec<ContentPart>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            parts,
            timestamp: Utc::now(),
            suggestions: Vec::new(),
        }
    }

    /// A user turn; an empty text part is dropped when an image is attached
    pub fn user(text: impl Into<String>, image: Option<ImagePayload>) -> Self {
        let text = text.into();
        let mut parts = Vec::with_capacity(2);
        if !text.is_empty() || image.is_none() {
            parts.push(ContentPart::text(text));
        }
        if let Some(image) = image {
            parts.push(ContentPart::image(image));
        }
        Self::new(Role::User, parts)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, vec![ContentPart::text(text)])
    }

    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }

    /// Concatenated text parts
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                ContentPart::Text { text } => Some(text.as_str()),
                ContentPart::Image { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn image(&self) -> Option<&ImagePayload> {
        self.parts.iter().find_map(|p| match p {
            ContentPart::Image { image } => Some(image),
            ContentPart::Text { .. } => None,
        })
    }
}

/// A single completion request
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub prompt: String,
    /// Prior transcript, oldest first
    pub history: Vec<ChatMessage>,
    pub image: Option<ImagePayload>,
}

impl ChatRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            history: Vec::new(),
            image: None,
        }
    }

    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.history = history;
        self
    }

    pub fn with_image(mut self, image: Option<ImagePayload>) -> Self {
        self.image = image;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_content_part_tagging() {
        let json = serde_json::to_value(ContentPart::text("hi")).unwrap();
        assert_eq!(json["type"], "text");
        assert_eq!(json["text"], "hi");

        let part = ContentPart::image(ImagePayload::new("image/png", b"abc"));
        let json = serde_json::to_value(&part).unwrap();
        assert_eq!(json["type"], "image");
        assert_eq!(json["image"]["mime_type"], "image/png");
    }

    #[test]
    fn test_image_only_user_message() {
        let msg = ChatMessage::user("", Some(ImagePayload::new("image/png", b"abc")));
        assert_eq!(msg.parts.len(), 1);
        assert!(matches!(msg.parts[0], ContentPart::Image { .. }));
        assert_eq!(msg.text(), "");

        let msg = ChatMessage::user("look", Some(ImagePayload::new("image/png", b"abc")));
        assert_eq!(msg.parts.len(), 2);
    }

    #[test]
    fn test_data_url() {
        let image = ImagePayload::new("image/jpeg", b"abc");
        assert_eq!(image.data_url(), "data:image/jpeg;base64,YWJj");
    }

    #[test]
    fn test_message_text_and_image() {
        let msg = ChatMessage::user("look at this", Some(ImagePayload::new("image/png", b"x")));
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.text(), "look at this");
        assert!(msg.image().is_some());

        let reply = ChatMessage::assistant("ok");
        assert!(reply.image().is_none());
        assert_ne!(msg.id, reply.id);
    }

    #[tokio::test]
    async fn test_image_from_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rash.png");
        tokio::fs::write(&path, b"abc").await.unwrap();

        let image = ImagePayload::from_path(&path).await.unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.data, "YWJj");
    }

    #[tokio::test]
    async fn test_missing_image() {
        let dir = TempDir::new().unwrap();
        let err = ImagePayload::from_path(dir.path().join("none.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::ImageAccess { .. }));
    }
}
