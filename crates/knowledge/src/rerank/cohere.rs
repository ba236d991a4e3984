//! Cohere rerank provider.
//!
//! API: `POST {base}/rerank`

use super::Reranker;
use crate::types::RetrievalUnit;
use hr_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: Vec<&'a str>,
    top_n: usize,
}

#[derive(Debug, Deserialize)]
struct RerankResponse {
    results: Vec<RerankResult>,
}

#[derive(Debug, Deserialize)]
struct RerankResult {
    index: usize,
    #[serde(default)]
    relevance_score: f32,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

pub struct CohereReranker {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl CohereReranker {
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout_secs: u64,
    ) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AppError::Rerank(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    /// Map ranked indices back onto the candidates, preserving the
    /// provider's order.
    fn apply(
        response: RerankResponse,
        candidates: Vec<RetrievalUnit>,
        top_n: usize,
    ) -> AppResult<Vec<RetrievalUnit>> {
        let mut slots: Vec<Option<RetrievalUnit>> = candidates.into_iter().map(Some).collect();
        let mut ranked = Vec::with_capacity(response.results.len().min(top_n));

        for result in response.results.into_iter().take(top_n) {
            let unit = slots
                .get_mut(result.index)
                .and_then(Option::take)
                .ok_or_else(|| {
                    AppError::Rerank(format!(
                        "Cohere returned invalid or repeated index {}",
                        result.index
                    ))
                })?;
            tracing::trace!(index = result.index, score = result.relevance_score, "Reranked");
            ranked.push(unit);
        }

        Ok(ranked)
    }
}

#[async_trait::async_trait]
impl Reranker for CohereReranker {
    fn provider_name(&self) -> &str {
        "cohere"
    }

    async fn rerank(
        &self,
        query: &str,
        candidates: Vec<RetrievalUnit>,
        top_n: usize,
    ) -> AppResult<Vec<RetrievalUnit>> {
        if candidates.is_empty() || top_n == 0 {
            return Ok(Vec::new());
        }

        let body = RerankRequest {
            model: &self.model,
            query,
            documents: candidates.iter().map(|u| u.text.as_str()).collect(),
            top_n: top_n.min(candidates.len()),
        };

        tracing::debug!(
            model = %self.model,
            candidates = candidates.len(),
            top_n,
            "Sending rerank request to Cohere"
        );

        let response = self
            .client
            .post(format!("{}/rerank", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Rerank(format!("Failed to send request to Cohere: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorBody>(&text)
                .map(|e| e.message)
                .unwrap_or(text);
            return Err(AppError::Rerank(format!(
                "Cohere API error ({}): {}",
                status, detail
            )));
        }

        let parsed: RerankResponse = response
            .json()
            .await
            .map_err(|e| AppError::Rerank(format!("Failed to parse Cohere response: {}", e)))?;

        Self::apply(parsed, candidates, top_n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FragmentMetadata, UnitKind};

    fn units(texts: &[&str]) -> Vec<RetrievalUnit> {
        texts
            .iter()
            .map(|t| {
                let metadata = FragmentMetadata {
                    file_name: "a.pdf".to_string(),
                    ..Default::default()
                }
                .complete();
                RetrievalUnit::new(*t, metadata, UnitKind::Base)
            })
            .collect()
    }

    fn response(raw: &str) -> RerankResponse {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn test_apply_reorders() {
        let parsed = response(
            r#"{"id": "x", "results": [
                {"index": 2, "relevance_score": 0.9},
                {"index": 0, "relevance_score": 0.4}
            ]}"#,
        );
        let ranked = CohereReranker::apply(parsed, units(&["甲", "乙", "丙"]), 10).unwrap();
        let texts: Vec<&str> = ranked.iter().map(|u| u.text.as_str()).collect();
        assert_eq!(texts, vec!["丙", "甲"]);
    }

    #[test]
    fn test_apply_respects_top_n() {
        let parsed = response(
            r#"{"results": [{"index": 1, "relevance_score": 0.9}, {"index": 0, "relevance_score": 0.1}]}"#,
        );
        let ranked = CohereReranker::apply(parsed, units(&["甲", "乙"]), 1).unwrap();
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].text, "乙");
    }

    #[test]
    fn test_out_of_range_index_is_error() {
        let parsed = response(r#"{"results": [{"index": 5, "relevance_score": 0.9}]}"#);
        assert!(CohereReranker::apply(parsed, units(&["甲"]), 3).is_err());
    }

    #[test]
    fn test_request_body() {
        let body = RerankRequest {
            model: "rerank-multilingual-v3.0",
            query: "試用期",
            documents: vec!["第一條"],
            top_n: 1,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["documents"][0], "第一條");
        assert_eq!(json["top_n"], 1);
    }

    #[tokio::test]
    async fn test_empty_candidates_skip_request() {
        // Unroutable base: any request would fail
        let reranker = CohereReranker::new("http://127.0.0.1:9", "key", "m", 1).unwrap();
        assert!(reranker.rerank("q", Vec::new(), 5).await.unwrap().is_empty());
    }
}
