//! Relevance reranking of retrieved candidates.

mod cohere;

pub use cohere::CohereReranker;

use crate::types::RetrievalUnit;
use hr_core::{AppConfig, AppError, AppResult};
use std::sync::Arc;

/// Reorders candidates by a relevance model distinct from embedding
/// distance.
#[async_trait::async_trait]
pub trait Reranker: Send + Sync {
    fn provider_name(&self) -> &str;

    /// Return at most `top_n` of `candidates`, most relevant first.
    async fn rerank(
        &self,
        query: &str,
        candidates: Vec<RetrievalUnit>,
        top_n: usize,
    ) -> AppResult<Vec<RetrievalUnit>>;
}

/// Keeps retrieval order and truncates to `top_n`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughReranker;

#[async_trait::async_trait]
impl Reranker for PassthroughReranker {
    fn provider_name(&self) -> &str {
        "none"
    }

    async fn rerank(
        &self,
        _query: &str,
        mut candidates: Vec<RetrievalUnit>,
        top_n: usize,
    ) -> AppResult<Vec<RetrievalUnit>> {
        candidates.truncate(top_n);
        Ok(candidates)
    }
}

/// Create the reranker named by `models.rerank_provider`.
pub fn create_reranker(config: &AppConfig) -> AppResult<Arc<dyn Reranker>> {
    let models = &config.models;
    match models.rerank_provider.as_str() {
        "cohere" => {
            let api_key = config.credentials.cohere_api_key.clone().ok_or_else(|| {
                AppError::MissingEnv(vec![hr_core::config::ENV_COHERE_API_KEY.to_string()])
            })?;
            Ok(Arc::new(CohereReranker::new(
                &models.cohere_api_base,
                api_key,
                &models.rerank_model,
                models.request_timeout_secs,
            )?))
        }
        "none" => Ok(Arc::new(PassthroughReranker)),
        other => Err(AppError::Config(format!(
            "Unknown rerank provider: '{}'. Supported providers: cohere, none",
            other
        ))),
    }
}
