//! Application Context
//!
//! Built once at startup from `Config` and passed to every component.
//! Cloning is cheap; all members are shared.

use crate::cadence::CadenceEngine;
use crate::chat::{ChatError, ChatService, ChatSession, GeminiClient, OpenAiClient};
use crate::config::{ChatConfig, ChatProvider, Config};
use crate::history::HistoryAggregator;
use crate::storage::{FileStore, HealthRepository, KeyValueStore, StorageResult};
use std::path::PathBuf;
use std::sync::Arc;

/// Shared handles for one running instance
#[derive(Clone)]
pub struct AppContext {
    /// Loaded configuration
    pub config: Arc<Config>,
    /// Backing key-value store
    pub store: Arc<dyn KeyValueStore>,
    /// Typed access to stored health data
    pub repo: HealthRepository,
    /// Check-in cadence engine (owns the status timer)
    pub cadence: Arc<CadenceEngine>,
    /// Remote chat provider, if one is configured
    pub chat: Option<Arc<dyn ChatService>>,
}

impl AppContext {
    /// Open the file store in the configured data directory
    pub async fn open(config: Config) -> StorageResult<Self> {
        let data_dir = expand_home(&config.storage.data_dir);
        let store = FileStore::open(&data_dir).await?;
        tracing::info!(path = ?store.path(), "Opened health store");
        Ok(Self::with_store(config, Arc::new(store)))
    }

    /// Build a context over an existing store
    pub fn with_store(config: Config, store: Arc<dyn KeyValueStore>) -> Self {
        let chat = build_chat_service(&config.chat);
        Self::with_parts(config, store, chat)
    }

    /// Build a context with an explicit chat provider
    pub fn with_parts(
        config: Config,
        store: Arc<dyn KeyValueStore>,
        chat: Option<Arc<dyn ChatService>>,
    ) -> Self {
        let repo = HealthRepository::new(store.clone());
        let cadence = Arc::new(CadenceEngine::new(repo.clone(), config.cadence.rules()));

        Self {
            config: Arc::new(config),
            store,
            repo,
            cadence,
            chat,
        }
    }

    pub fn history(&self) -> HistoryAggregator {
        HistoryAggregator::new(self.repo.clone())
    }

    /// Resume the saved chat transcript with the configured provider
    pub async fn chat_session(&self) -> Result<ChatSession, ChatError> {
        let provider = self.chat.clone().ok_or_else(|| {
            ChatError::NotConfigured(format!("provider {:?}", self.config.chat.provider))
        })?;
        Ok(ChatSession::load(self.repo.clone(), provider).await)
    }

    /// OpenAI client for one-off image analysis
    ///
    /// Analysis always goes to OpenAI, whichever provider drives the chat.
    pub fn image_analyzer(&self) -> Result<OpenAiClient, ChatError> {
        OpenAiClient::new(self.config.chat.openai.client_config())
    }

    /// Stop background work
    pub fn shutdown(&self) {
        self.cadence.stop_ticker();
        tracing::debug!("Application context shut down");
    }
}

/// Create the configured chat provider
///
/// A provider without an API key is logged and left unset.
pub fn build_chat_service(config: &ChatConfig) -> Option<Arc<dyn ChatService>> {
    let result: Result<Arc<dyn ChatService>, ChatError> = match config.provider {
        ChatProvider::None => return None,
        ChatProvider::OpenAi => {
            OpenAiClient::new(config.openai.client_config()).map(|c| Arc::new(c) as Arc<dyn ChatService>)
        }
        ChatProvider::Gemini => {
            GeminiClient::new(config.gemini.client_config()).map(|c| Arc::new(c) as Arc<dyn ChatService>)
        }
    };

    match result {
        Ok(service) => {
            tracing::debug!(provider = service.name(), "Chat provider ready");
            Some(service)
        }
        Err(e) => {
            tracing::warn!("Chat disabled: {}", e);
            None
        }
    }
}

/// Expand a leading `~/` to the home directory
fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cadence::CadenceStage;
    use crate::storage::{MemoryStore, SymptomRating};
    use tempfile::TempDir;

    fn config() -> Config {
        let mut config = Config::default();
        config.chat.provider = ChatProvider::None;
        config
    }

    #[tokio::test]
    async fn test_components_share_store() {
        let ctx = AppContext::with_store(config(), Arc::new(MemoryStore::new()));

        ctx.cadence
            .submit(vec![SymptomRating::new("Mood", 2)])
            .await
            .unwrap();

        assert_eq!(ctx.cadence.status().await.stage, CadenceStage::MorningCooldown);
        assert_eq!(ctx.repo.survey_history().await.len(), 1);
        assert_eq!(ctx.history().calendar().await.len(), 1);
    }

    #[tokio::test]
    async fn test_chat_requires_provider() {
        let ctx = AppContext::with_store(config(), Arc::new(MemoryStore::new()));
        assert!(ctx.chat.is_none());
        assert!(matches!(
            ctx.chat_session().await,
            Err(ChatError::NotConfigured(_))
        ));
    }

    #[test]
    fn test_provider_without_key_is_disabled() {
        let mut chat = ChatConfig::default();
        chat.provider = ChatProvider::OpenAi;
        assert!(build_chat_service(&chat).is_none());

        chat.openai.api_key = "sk-test".to_string();
        let service = build_chat_service(&chat).unwrap();
        assert_eq!(service.name(), "openai");
    }

    #[tokio::test]
    async fn test_open_file_store() {
        let dir = TempDir::new().unwrap();
        let mut config = config();
        config.storage.data_dir = dir.path().to_string_lossy().to_string();

        let ctx = AppContext::open(config.clone()).await.unwrap();
        ctx.cadence.submit(SymptomRating::defaults()).await.unwrap();
        ctx.shutdown();

        let reopened = AppContext::open(config).await.unwrap();
        assert_eq!(reopened.repo.survey_history().await.len(), 1);
        assert!(!reopened.cadence.status().await.can_submit);
    }

    #[test]
    fn test_image_analyzer_needs_openai_key() {
        let ctx = AppContext::with_store(config(), Arc::new(MemoryStore::new()));
        assert!(matches!(
            ctx.image_analyzer(),
            Err(ChatError::NotConfigured(_))
        ));

        let mut config = config();
        config.chat.openai.api_key = "sk-test".to_string();
        let ctx = AppContext::with_store(config, Arc::new(MemoryStore::new()));
        assert!(ctx.image_analyzer().is_ok());
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home("/var/data"), PathBuf::from("/var/data"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~/hs"), home.join("hs"));
        }
    }
}
