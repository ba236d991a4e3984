//! LLM summaries for table units.
//!
//! A table's summary is written in front of the table text, so the
//! embedding carries the table's subject as well as its cells.

use crate::types::{RetrievalUnit, UnitKind};
use futures::stream::{self, StreamExt};
use hr_core::{AppConfig, AppError, AppResult};
use hr_llm::{LlmClient, LlmRequest};
use hr_prompt::{build_prompt, load_prompt, PromptDefinition, TABLE_SUMMARY_PROMPT_ID};
use std::collections::HashMap;
use std::sync::Arc;

pub struct TableSummarizer {
    llm: Arc<dyn LlmClient>,
    prompt: PromptDefinition,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl TableSummarizer {
    pub fn new(llm: Arc<dyn LlmClient>, config: &AppConfig) -> AppResult<Self> {
        let prompt = load_prompt(&config.prompts_dir(), TABLE_SUMMARY_PROMPT_ID)?;
        Ok(Self {
            llm,
            prompt,
            model: config.models.generation_model.clone(),
            temperature: config.models.temperature,
            max_tokens: config.models.max_tokens,
        })
    }

    pub async fn summarize(&self, table: &str) -> AppResult<String> {
        let mut vars = HashMap::new();
        vars.insert("table".to_string(), table.to_string());
        let built = build_prompt(&self.prompt, vars)?;

        let mut request = LlmRequest::new(built.user, self.model.clone())
            .with_temperature(built.temperature.unwrap_or(self.temperature));
        if let Some(system) = built.system {
            request = request.with_system(system);
        }
        if let Some(max_tokens) = self.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }

        let response = self.llm.complete(&request).await?;
        let summary = response.content.trim();
        if summary.is_empty() {
            return Err(AppError::Llm("Empty table summary".to_string()));
        }
        Ok(summary.to_string())
    }

    /// Prefix a summary onto every object unit, `workers` calls at a time.
    ///
    /// A unit whose summary fails keeps its raw table text. Returns the
    /// number of units summarized.
    pub async fn annotate(&self, units: &mut [RetrievalUnit], workers: usize) -> usize {
        let tables: Vec<(usize, String)> = units
            .iter()
            .enumerate()
            .filter(|(_, u)| u.kind == UnitKind::Object)
            .map(|(i, u)| (i, u.text.clone()))
            .collect();
        if tables.is_empty() {
            return 0;
        }

        tracing::debug!(tables = tables.len(), "Summarizing tables");
        let summaries: Vec<(usize, AppResult<String>)> = stream::iter(tables)
            .map(|(i, text)| async move { (i, self.summarize(&text).await) })
            .buffered(workers.max(1))
            .collect()
            .await;

        let mut summarized = 0;
        for (i, summary) in summaries {
            let unit = &mut units[i];
            match summary {
                Ok(summary) => {
                    unit.text = format!("{}\n{}", summary, unit.text);
                    summarized += 1;
                }
                Err(e) => tracing::warn!(
                    file = %unit.metadata.file_name,
                    page = unit.metadata.page,
                    "Table summary failed, embedding the raw table: {}",
                    e
                ),
            }
        }
        summarized
    }
}
