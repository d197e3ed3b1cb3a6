//! OpenAI chat-completions client

use super::types::{ChatMessage, ChatRequest, ImagePayload, Role};
use super::{check_status, map_send_error, ChatError, ChatService};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a medical AI assistant. Your responses should be:
1. Brief and clear
2. Focused on actionable medical advice
3. Include disclaimers when necessary
4. Professional but approachable

When analyzing images:
1. Look for visible symptoms or conditions
2. Describe what you observe clinically
3. Suggest relevant follow-up questions
4. Provide preliminary assessment with appropriate medical disclaimers";

/// Prompt used by `analyze_image` when the caller gives none
pub const DEFAULT_ANALYSIS_PROMPT: &str =
    "What do you observe in this medical image? Please provide a clinical assessment.";

const ANALYSIS_MAX_TOKENS: u32 = 1024;

/// Configuration for the OpenAI client
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    /// e.g. "https://api.openai.com/v1"
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub request_timeout_ms: u64,
    pub system_prompt: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o".to_string(),
            temperature: 0.7,
            max_tokens: 1024,
            request_timeout_ms: 30_000,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

impl OpenAiConfig {
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }
}

/// OpenAI chat-completions client
pub struct OpenAiClient {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Result<Self, ChatError> {
        if config.api_key.is_empty() {
            return Err(ChatError::NotConfigured("missing OpenAI API key".to_string()));
        }

        let client = Client::builder()
            .timeout(std::time::Duration::from_millis(config.request_timeout_ms))
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    fn build_body(&self, request: &ChatRequest) -> CompletionRequest {
        let mut messages = Vec::with_capacity(request.history.len() + 2);
        messages.push(WireMessage {
            role: Role::System.as_str(),
            content: WireContent::Text(self.config.system_prompt.clone()),
        });

        for msg in &request.history {
            messages.push(wire_message(msg));
        }

        messages.push(WireMessage {
            role: Role::User.as_str(),
            content: user_content(&request.prompt, request.image.as_ref()),
        });

        CompletionRequest {
            model: self.config.model.clone(),
            messages,
            temperature: Some(self.config.temperature),
            max_tokens: self.config.max_tokens,
        }
    }

    fn analysis_body(&self, image: &ImagePayload, prompt: &str) -> CompletionRequest {
        CompletionRequest {
            model: self.config.model.clone(),
            messages: vec![
                WireMessage {
                    role: Role::System.as_str(),
                    content: WireContent::Text(self.config.system_prompt.clone()),
                },
                WireMessage {
                    role: Role::User.as_str(),
                    content: user_content(prompt, Some(image)),
                },
            ],
            temperature: None,
            max_tokens: ANALYSIS_MAX_TOKENS,
        }
    }

    /// One-off clinical description of a single image
    ///
    /// Not part of any conversation: nothing is read from or written to a
    /// transcript or the chat history.
    pub async fn analyze_image(
        &self,
        image: &ImagePayload,
        prompt: Option<&str>,
    ) -> Result<String, ChatError> {
        let prompt = prompt
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(DEFAULT_ANALYSIS_PROMPT);

        tracing::debug!(
            model = %self.config.model,
            mime_type = %image.mime_type,
            "Sending image analysis request"
        );

        self.send_completion(&self.analysis_body(image, prompt)).await
    }

    async fn send_completion(&self, body: &CompletionRequest) -> Result<String, ChatError> {
        let url = format!("{}/chat/completions", self.config.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(map_send_error)?;

        let result: CompletionResponse = check_status(response).await?.json().await?;

        result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or(ChatError::EmptyResponse)
    }
}

#[async_trait]
impl ChatService for OpenAiClient {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: ChatRequest) -> Result<String, ChatError> {
        let body = self.build_body(&request);

        tracing::debug!(
            model = %self.config.model,
            history = request.history.len(),
            image = request.image.is_some(),
            "Sending chat completion request"
        );

        self.send_completion(&body).await
    }
}

fn wire_message(msg: &ChatMessage) -> WireMessage {
    let content = match msg.role {
        Role::User => user_content(&msg.text(), msg.image()),
        Role::System | Role::Assistant => WireContent::Text(msg.text()),
    };
    WireMessage {
        role: msg.role.as_str(),
        content,
    }
}

fn user_content(text: &str, image: Option<&ImagePayload>) -> WireContent {
    let Some(image) = image else {
        return WireContent::Text(text.to_string());
    };

    let mut parts = Vec::with_capacity(2);
    if !text.is_empty() {
        parts.push(WirePart::Text {
            text: text.to_string(),
        });
    }
    parts.push(WirePart::ImageUrl {
        image_url: ImageUrl {
            url: image.data_url(),
        },
    });
    WireContent::Parts(parts)
}

// ============================================
// Request/Response DTOs
// ============================================

#[derive(Debug, Serialize)]
struct CompletionRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: WireContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum WireContent {
    Text(String),
    Parts(Vec<WirePart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WirePart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> OpenAiClient {
        OpenAiClient::new(OpenAiConfig::with_api_key("test-key")).unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = OpenAiConfig::default();
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.max_tokens, 1024);
        assert!((config.temperature - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn test_missing_key_is_not_configured() {
        let result = OpenAiClient::new(OpenAiConfig::default());
        assert!(matches!(result, Err(ChatError::NotConfigured(_))));
    }

    #[test]
    fn test_text_request_body() {
        let request = ChatRequest::new("I feel dizzy").with_history(vec![
            ChatMessage::assistant("Hello"),
            ChatMessage::user("hi", None),
        ]);
        let body = serde_json::to_value(client().build_body(&request)).unwrap();

        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["max_tokens"], 1024);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[1]["role"], "assistant");
        assert_eq!(messages[1]["content"], "Hello");
        assert_eq!(messages[3]["role"], "user");
        assert_eq!(messages[3]["content"], "I feel dizzy");
    }

    #[test]
    fn test_image_request_body() {
        let request = ChatRequest::new("What is this rash?")
            .with_image(Some(ImagePayload::new("image/jpeg", b"abc")));
        let body = serde_json::to_value(client().build_body(&request)).unwrap();

        let content = &body["messages"][1]["content"];
        assert_eq!(content[0]["type"], "text");
        assert_eq!(content[0]["text"], "What is this rash?");
        assert_eq!(content[1]["type"], "image_url");
        assert_eq!(content[1]["image_url"]["url"], "data:image/jpeg;base64,YWJj");
    }

    #[test]
    fn test_image_only_message_has_no_text_part() {
        let request =
            ChatRequest::new("").with_image(Some(ImagePayload::new("image/png", b"abc")));
        let body = serde_json::to_value(client().build_body(&request)).unwrap();

        let content = body["messages"][1]["content"].as_array().unwrap();
        assert_eq!(content.len(), 1);
        assert_eq!(content[0]["type"], "image_url");
    }

    #[test]
    fn test_analysis_request_body() {
        let image = ImagePayload::new("image/jpeg", b"abc");
        let body = serde_json::to_value(client().analysis_body(&image, DEFAULT_ANALYSIS_PROMPT))
            .unwrap();

        assert_eq!(body["max_tokens"], 1024);
        assert!(body.get("temperature").is_none());
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[0]["content"], DEFAULT_SYSTEM_PROMPT);
        assert_eq!(messages[1]["role"], "user");
        assert_eq!(messages[1]["content"][0]["text"], DEFAULT_ANALYSIS_PROMPT);
        assert_eq!(
            messages[1]["content"][1]["image_url"]["url"],
            "data:image/jpeg;base64,YWJj"
        );
    }

    #[test]
    fn test_analysis_ignores_small_max_tokens_setting() {
        let mut config = OpenAiConfig::with_api_key("test-key");
        config.max_tokens = 200;
        let client = OpenAiClient::new(config).unwrap();
        let body = client.analysis_body(&ImagePayload::new("image/png", b"x"), "Describe");
        assert_eq!(body.max_tokens, 1024);
    }
}
