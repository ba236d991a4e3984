//! LLM configuration types.

use hr_core::AppConfig;

/// Settings needed to construct a completion client.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub provider: String,
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub timeout_secs: u64,
}

impl LlmSettings {
    /// Extract the generation model settings from the application config.
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            provider: config.models.llm_provider.clone(),
            endpoint: config.models.openai_api_base.clone(),
            api_key: config.credentials.openai_api_key.clone(),
            model: config.models.generation_model.clone(),
            temperature: config.models.temperature,
            max_tokens: config.models.max_tokens,
            timeout_secs: config.models.request_timeout_secs,
        }
    }
}

/// Provider type enum for matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderType {
    OpenAI,
}

impl ProviderType {
    /// Parse provider type from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Some(Self::OpenAI),
            _ => None,
        }
    }

    /// Get the canonical provider name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAI => "openai",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_type_parsing() {
        assert_eq!(ProviderType::parse("openai"), Some(ProviderType::OpenAI));
        assert_eq!(ProviderType::parse("OpenAI"), Some(ProviderType::OpenAI));
        assert_eq!(ProviderType::parse("ollama"), None);
    }

    #[test]
    fn test_settings_from_config() {
        let mut config = AppConfig::default();
        config.credentials.openai_api_key = Some("sk-test".to_string());

        let settings = LlmSettings::from_config(&config);
        assert_eq!(settings.provider, "openai");
        assert_eq!(settings.model, "gpt-4-turbo-preview");
        assert_eq!(settings.temperature, 0.1);
        assert_eq!(settings.api_key.as_deref(), Some("sk-test"));
    }
}
