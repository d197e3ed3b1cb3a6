//! Gemini generateContent client
//!
//! Gemini receives the whole conversation flattened into one prompt.

use super::types::{ChatMessage, ChatRequest, Role};
use super::{check_status, map_send_error, ChatError, ChatService};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a concise, professional medical AI assistant. Keep conversations efficient and focused:

1. Analyze symptoms in 1-2 sentences, incorporating any available survey data about the user's health status.

2. Ask only the most relevant questions (maximum 4-6 total) to reach a conclusion. Use multiple choice when appropriate:
\"I see you're experiencing headaches. Is it [Front of head] [Back of head] [Temples]?\"

3. After gathering key information, provide:
- Brief assessment
- 1-2 clear recommendations
- Short medical disclaimer when needed

Keep responses natural and conversational. If the user has completed a recent health survey, reference that data to avoid redundant questions.";

/// Configuration for the Gemini client
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_output_tokens: u32,
    pub request_timeout_ms: u64,
    pub system_prompt: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-pro".to_string(),
            temperature: 0.7,
            top_k: 40,
            top_p: 0.8,
            max_output_tokens: 200,
            request_timeout_ms: 30_000,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

impl GeminiConfig {
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }
}

/// Gemini REST client
pub struct GeminiClient {
    client: Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self, ChatError> {
        if config.api_key.is_empty() {
            return Err(ChatError::NotConfigured("missing Gemini API key".to_string()));
        }

        let client = Client::builder()
            .timeout(std::time::Duration::from_millis(config.request_timeout_ms))
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    /// System prompt, prior turns, then the new message, separated by blank lines
    fn flatten_prompt(&self, request: &ChatRequest) -> String {
        let mut sections = Vec::with_capacity(request.history.len() + 2);
        sections.push(self.config.system_prompt.clone());
        sections.extend(request.history.iter().filter_map(history_line));
        if !request.prompt.is_empty() {
            sections.push(format!("User: {}", request.prompt));
        }
        sections.join("\n\n")
    }

    fn build_body(&self, request: &ChatRequest) -> GenerateRequest {
        let mut parts = vec![Part::Text {
            text: self.flatten_prompt(request),
        }];
        if let Some(image) = &request.image {
            parts.push(Part::InlineData {
                inline_data: InlineData {
                    mime_type: image.mime_type.clone(),
                    data: image.data.clone(),
                },
            });
        }

        GenerateRequest {
            contents: vec![Content { parts }],
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
                top_k: self.config.top_k,
                top_p: self.config.top_p,
                max_output_tokens: self.config.max_output_tokens,
            },
        }
    }
}

fn history_line(msg: &ChatMessage) -> Option<String> {
    let speaker = match msg.role {
        Role::User => "User",
        Role::Assistant => "Assistant",
        Role::System => return None,
    };
    let text = msg.text();
    if text.is_empty() {
        return None;
    }
    Some(format!("{}: {}", speaker, text))
}

#[async_trait]
impl ChatService for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn complete(&self, request: ChatRequest) -> Result<String, ChatError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.base_url, self.config.model
        );
        let body = self.build_body(&request);

        tracing::debug!(
            model = %self.config.model,
            history = request.history.len(),
            image = request.image.is_some(),
            "Sending generateContent request"
        );

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.config.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(map_send_error)?;

        let result: GenerateResponse = check_status(response).await?.json().await?;

        let text: String = result
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ChatError::EmptyResponse);
        }
        Ok(text)
    }
}

// ============================================
// Request/Response DTOs
// ============================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Debug, Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_k: u32,
    top_p: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}
