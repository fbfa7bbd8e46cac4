use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::storage::{KeyValueStore, StorageResult};

pub const SETTINGS_KEY: &str = "settings";
pub const SESSION_ID_KEY: &str = "sessionId";

pub const CUSTOM_MODEL: &str = "custom";

/// Model choices offered by the popup, with the endpoint each one implies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelPreset {
    Gpt35Turbo,
    Gpt4,
    Claude3Haiku,
}

impl ModelPreset {
    pub const ALL: [ModelPreset; 3] = [
        ModelPreset::Gpt35Turbo,
        ModelPreset::Gpt4,
        ModelPreset::Claude3Haiku,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ModelPreset::Gpt35Turbo => "gpt-3.5-turbo",
            ModelPreset::Gpt4 => "gpt-4",
            ModelPreset::Claude3Haiku => "claude-3-haiku",
        }
    }

    pub fn api_url(&self) -> &'static str {
        match self {
            ModelPreset::Gpt35Turbo | ModelPreset::Gpt4 => {
                "https://api.openai.com/v1/chat/completions"
            }
            ModelPreset::Claude3Haiku => "https://api.anthropic.com/v1/messages",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }
}

const FALLBACK_ENDPOINT: &str = "https://api.example.com/chat";

/// Process-wide user settings, persisted under [`SETTINGS_KEY`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub api_key: String,
    pub api_endpoint: String,
    pub model_name: String,
    pub use_summary: bool,
    pub use_transcript: bool,
}

impl Default for Settings {
    fn default() -> Self {
        let preset = ModelPreset::Gpt35Turbo;
        Self {
            api_key: String::new(),
            api_endpoint: preset.api_url().to_string(),
            model_name: preset.name().to_string(),
            use_summary: true,
            use_transcript: true,
        }
    }
}

impl Settings {
    /// Applies a model choice. `custom` keeps the caller's endpoint; known
    /// presets and unknown names get their implied endpoint.
    pub fn select_model(&mut self, model_name: &str, custom_endpoint: Option<&str>) {
        self.model_name = model_name.trim().to_string();
        self.api_endpoint = if self.model_name == CUSTOM_MODEL {
            custom_endpoint
                .map(|e| e.trim().to_string())
                .unwrap_or_else(|| self.api_endpoint.clone())
        } else {
            ModelPreset::from_name(&self.model_name)
                .map(|p| p.api_url())
                .unwrap_or(FALLBACK_ENDPOINT)
                .to_string()
        };
    }

    /// API key with the last four characters visible.
    pub fn masked_api_key(&self) -> String {
        let chars: Vec<char> = self.api_key.chars().collect();
        if chars.len() <= 4 {
            return "*".repeat(chars.len());
        }
        let visible: String = chars[chars.len() - 4..].iter().collect();
        format!("{}{}", "*".repeat(chars.len() - 4), visible)
    }
}

#[derive(Clone)]
pub struct SettingsStore {
    store: Arc<dyn KeyValueStore>,
}

impl SettingsStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Stored settings, or defaults when none were saved or the entry is malformed.
    pub async fn load(&self) -> StorageResult<Settings> {
        let Some(raw) = self.store.get(SETTINGS_KEY).await? else {
            return Ok(Settings::default());
        };
        Ok(serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(error = %e, "malformed settings, using defaults");
            Settings::default()
        }))
    }

    pub async fn save(&self, settings: &Settings) -> StorageResult<()> {
        self.store
            .set(SETTINGS_KEY, serde_json::to_string(settings)?)
            .await
    }

    /// Writes defaults if nothing is stored yet (first install).
    pub async fn ensure_defaults(&self) -> StorageResult<Settings> {
        if self.store.get(SETTINGS_KEY).await?.is_none() {
            let settings = Settings::default();
            self.save(&settings).await?;
            info!("settings initialised with defaults");
            return Ok(settings);
        }
        self.load().await
    }

    /// Per-install session identifier, generated once and kept thereafter.
    pub async fn session_id(&self) -> StorageResult<String> {
        if let Some(id) = self.store.get(SESSION_ID_KEY).await? {
            if !id.trim().is_empty() {
                return Ok(id);
            }
        }
        let id = Uuid::new_v4().to_string();
        self.store.set(SESSION_ID_KEY, id.clone()).await?;
        info!(session_id = %id, "generated session id");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn test_select_model() {
        let mut settings = Settings::default();
        settings.select_model("claude-3-haiku", None);
        assert_eq!(settings.api_endpoint, "https://api.anthropic.com/v1/messages");

        settings.select_model("custom", Some(" https://llm.local/v1 "));
        assert_eq!(settings.api_endpoint, "https://llm.local/v1");

        settings.select_model("mystery", None);
        assert_eq!(settings.api_endpoint, "https://api.example.com/chat");
    }

    #[test]
    fn test_masked_api_key() {
        let settings = Settings {
            api_key: "sk-12345678".to_string(),
            ..Settings::default()
        };
        assert_eq!(settings.masked_api_key(), "*******5678");
    }

    #[tokio::test]
    async fn test_load_defaults_and_roundtrip() {
        let store = SettingsStore::new(Arc::new(MemoryStore::new()));
        assert_eq!(store.load().await.unwrap(), Settings::default());

        let mut settings = Settings::default();
        settings.api_key = "key".to_string();
        settings.use_summary = false;
        store.save(&settings).await.unwrap();
        assert_eq!(store.load().await.unwrap(), settings);
    }

    #[tokio::test]
    async fn test_partial_settings_fill_defaults() {
        let kv = Arc::new(MemoryStore::new());
        kv.set(SETTINGS_KEY, r#"{"apiKey":"k"}"#.to_string())
            .await
            .unwrap();
        let settings = SettingsStore::new(kv).load().await.unwrap();
        assert_eq!(settings.api_key, "k");
        assert!(settings.use_transcript);
    }

    #[tokio::test]
    async fn test_session_id_is_stable() {
        let store = SettingsStore::new(Arc::new(MemoryStore::new()));
        let first = store.session_id().await.unwrap();
        let second = store.session_id().await.unwrap();
        assert_eq!(first, second);
        assert!(Uuid::parse_str(&first).is_ok());
    }
}
