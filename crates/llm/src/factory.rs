//! LLM provider factory.

use crate::client::LlmClient;
use crate::providers::OpenAiClient;
use crate::types::{LlmSettings, ProviderType};
use hr_core::{AppError, AppResult};
use std::sync::Arc;

/// Create an LLM client for the configured provider.
///
/// # Errors
/// Returns error if the provider is unknown, the API key is missing, or the
/// HTTP client cannot be built.
pub fn create_client(settings: &LlmSettings) -> AppResult<Arc<dyn LlmClient>> {
    match ProviderType::parse(&settings.provider) {
        Some(ProviderType::OpenAI) => {
            let api_key = settings.api_key.as_deref().ok_or_else(|| {
                AppError::Config("OpenAI provider requires API key".to_string())
            })?;
            let client = OpenAiClient::new(&settings.endpoint, api_key, settings.timeout_secs)?;
            Ok(Arc::new(client))
        }
        None => Err(AppError::Config(format!(
            "Unknown provider: {}",
            settings.provider
        ))),
    }
}
