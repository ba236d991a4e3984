//! Embedding provider trait and factory.

use hr_core::{AppConfig, AppError, AppResult};
use std::sync::Arc;

use super::providers::{MockProvider, OpenAiEmbeddingProvider};

/// Trait for embedding providers.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Provider name (e.g., "openai", "mock")
    fn provider_name(&self) -> &str;

    fn model_name(&self) -> &str;

    /// Length of every vector this provider returns
    fn dimensions(&self) -> usize;

    /// Embed texts, returning one vector per input in input order.
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;

    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut results = self.embed_batch(&[text.to_string()]).await?;
        results
            .pop()
            .ok_or_else(|| AppError::Embedding("No embedding returned".to_string()))
    }
}

/// Create the embedding provider named by `models.embedding_provider`.
pub fn create_provider(config: &AppConfig) -> AppResult<Arc<dyn EmbeddingProvider>> {
    let models = &config.models;
    match models.embedding_provider.as_str() {
        "openai" => {
            let api_key = config.credentials.openai_api_key.clone().ok_or_else(|| {
                AppError::MissingEnv(vec![hr_core::config::ENV_OPENAI_API_KEY.to_string()])
            })?;
            let provider = OpenAiEmbeddingProvider::new(
                &models.openai_api_base,
                api_key,
                &models.embedding_model,
                models.embedding_dims,
                models.request_timeout_secs,
            )?;
            Ok(Arc::new(provider))
        }

        "mock" => Ok(Arc::new(MockProvider::new(models.embedding_dims))),

        other => Err(AppError::Config(format!(
            "Unknown embedding provider: '{}'. Supported providers: openai, mock",
            other
        ))),
    }
}
