//! Answer synthesis with tree summarization.
//!
//! Retrieved units are serialized into numbered context blocks. When all
//! blocks fit in one call the answer prompt runs once. Otherwise the blocks
//! are packed into budget-sized chunks, each chunk is summarized against the
//! question, and the summaries are packed again until a single chunk
//! remains. Nothing is truncated.

use crate::types::RetrievalUnit;
use futures::future::try_join_all;
use hr_core::{AppConfig, AppError, AppResult};
use hr_llm::{LlmClient, LlmRequest, LlmUsage};
use hr_prompt::{build_prompt, load_prompt, PromptDefinition, ANSWER_PROMPT_ID, CHUNK_SUMMARY_PROMPT_ID};
use std::collections::HashMap;
use std::sync::Arc;

const BLOCK_SEPARATOR: &str = "\n\n";

/// Reply the summary prompt asks for when a chunk has nothing on the question.
const IRRELEVANT_SUMMARY: &str = "無相關內容";

/// Generation parameters and context limits.
#[derive(Debug, Clone)]
pub struct SynthesisSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    /// Largest context, in characters, sent in one call
    pub max_context_chars: usize,
    /// Summarization rounds allowed before giving up
    pub max_tree_depth: usize,
}

impl SynthesisSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model: config.models.generation_model.clone(),
            temperature: config.models.temperature,
            max_tokens: config.models.max_tokens,
            max_context_chars: config.retrieval.max_context_chars,
            max_tree_depth: config.retrieval.max_tree_depth,
        }
    }
}

pub struct AnswerSynthesizer {
    llm: Arc<dyn LlmClient>,
    answer_prompt: PromptDefinition,
    summary_prompt: PromptDefinition,
    settings: SynthesisSettings,
}

impl AnswerSynthesizer {
    /// Load the answer and summary prompts for the configured workspace.
    pub fn new(llm: Arc<dyn LlmClient>, config: &AppConfig) -> AppResult<Self> {
        let prompts_dir = config.prompts_dir();
        Ok(Self::with_prompts(
            llm,
            load_prompt(&prompts_dir, ANSWER_PROMPT_ID)?,
            load_prompt(&prompts_dir, CHUNK_SUMMARY_PROMPT_ID)?,
            SynthesisSettings::from_config(config),
        ))
    }

    pub fn with_prompts(
        llm: Arc<dyn LlmClient>,
        answer_prompt: PromptDefinition,
        summary_prompt: PromptDefinition,
        settings: SynthesisSettings,
    ) -> Self {
        Self {
            llm,
            answer_prompt,
            summary_prompt,
            settings,
        }
    }

    /// Produce a plain-text answer to `question` from `units`.
    pub async fn synthesize(&self, question: &str, units: &[RetrievalUnit]) -> AppResult<String> {
        let budget = self.settings.max_context_chars.max(1);
        let mut blocks = context_blocks(units);
        let mut usage = LlmUsage::default();

        for round in 0..=self.settings.max_tree_depth {
            let chunks = pack(&blocks, budget);
            if chunks.len() <= 1 {
                let context = chunks.into_iter().next().unwrap_or_default();
                tracing::debug!(round, context_chars = context.chars().count(), "Synthesizing answer");
                let (answer, answer_usage) = self.run(&self.answer_prompt, question, context).await?;
                usage += answer_usage;
                tracing::info!(
                    rounds = round,
                    total_tokens = usage.total_tokens,
                    "Answer synthesized"
                );
                return Ok(answer);
            }

            if round == self.settings.max_tree_depth {
                break;
            }

            tracing::info!(round, chunks = chunks.len(), "Context exceeds budget, summarizing chunks");
            let summaries = try_join_all(
                chunks
                    .into_iter()
                    .map(|chunk| self.run(&self.summary_prompt, question, chunk)),
            )
            .await?;

            blocks = summaries
                .into_iter()
                .map(|(summary, summary_usage)| {
                    usage += summary_usage;
                    summary
                })
                .filter(|s| !s.is_empty() && !is_irrelevant(s))
                .collect();
        }

        Err(AppError::Query(format!(
            "Context did not fit in {} characters after {} summarization rounds",
            budget, self.settings.max_tree_depth
        )))
    }

    async fn run(
        &self,
        prompt: &PromptDefinition,
        question: &str,
        context: String,
    ) -> AppResult<(String, LlmUsage)> {
        let mut vars = HashMap::new();
        vars.insert("question".to_string(), question.to_string());
        vars.insert("context".to_string(), context);
        let built = build_prompt(prompt, vars)?;

        let temperature = built.temperature.unwrap_or(self.settings.temperature);
        let mut request =
            LlmRequest::new(built.user, self.settings.model.clone()).with_temperature(temperature);
        if let Some(system) = built.system {
            request = request.with_system(system);
        }
        if let Some(max_tokens) = self.settings.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }

        let response = self.llm.complete(&request).await?;
        tracing::debug!(
            prompt = %prompt.id,
            tokens = response.usage.total_tokens,
            "Completion received"
        );
        if response.is_truncated() {
            tracing::warn!(prompt = %prompt.id, "Completion stopped at the token limit");
        }
        Ok((response.content.trim().to_string(), response.usage))
    }
}

/// True when a summary only says the chunk has nothing on the question,
/// ignoring quotes and trailing punctuation.
fn is_irrelevant(summary: &str) -> bool {
    summary
        .trim_matches(|c: char| c.is_whitespace() || "「」『』\"'“”。.！!，,".contains(c))
        == IRRELEVANT_SUMMARY
}

/// One numbered block per unit, headed by its file, section and page.
pub fn context_blocks(units: &[RetrievalUnit]) -> Vec<String> {
    units
        .iter()
        .enumerate()
        .map(|(i, unit)| {
            format!(
                "［來源 {}］《{}》 {} 第{}頁\n{}",
                i + 1,
                unit.metadata.file_name,
                unit.metadata.section,
                unit.metadata.page,
                unit.text
            )
        })
        .collect()
}

/// Greedily pack blocks into chunks of at most `budget` characters.
///
/// A block longer than the budget is split on character boundaries.
pub fn pack(blocks: &[String], budget: usize) -> Vec<String> {
    let sep = BLOCK_SEPARATOR.chars().count();
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    let pieces = blocks.iter().flat_map(|block| split_chars(block, budget));
    for piece in pieces {
        let len = piece.chars().count();
        let needed = if current.is_empty() { len } else { len + sep };

        if !current.is_empty() && current_len + needed > budget {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if !current.is_empty() {
            current.push_str(BLOCK_SEPARATOR);
            current_len += sep;
        }
        current.push_str(&piece);
        current_len += len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn split_chars(text: &str, budget: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= budget {
        return vec![text.to_string()];
    }
    chars
        .chunks(budget)
        .map(|c| c.iter().collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FragmentMetadata, UnitKind};
    use hr_llm::{LlmResponse, LlmUsage};
    use std::sync::Mutex;

    /// Records prompts and answers summaries with a short marker.
    struct RecordingLlm {
        prompts: Mutex<Vec<String>>,
        temperatures: Mutex<Vec<Option<f32>>>,
    }

    impl RecordingLlm {
        fn new() -> Self {
            Self {
                prompts: Mutex::new(Vec::new()),
                temperatures: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl LlmClient for RecordingLlm {
        fn provider_name(&self) -> &str {
            "recording"
        }

        async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
            self.temperatures.lock().unwrap().push(request.temperature);
            let mut prompts = self.prompts.lock().unwrap();
            prompts.push(request.prompt.clone());
            let content = if request.prompt.contains("無相關內容") {
                format!("摘要{}", prompts.len())
            } else {
                "最終回答".to_string()
            };
            Ok(LlmResponse {
                content,
                model: request.model.clone(),
                usage: LlmUsage::new(1, 1),
                finish_reason: None,
            })
        }
    }

    fn unit(text: &str, page: u32) -> RetrievalUnit {
        let metadata = FragmentMetadata {
            file_name: "請假規則.pdf".to_string(),
            page: Some(page),
            section: Some("第二條 婚假".to_string()),
            ..Default::default()
        }
        .complete();
        RetrievalUnit::new(text, metadata, UnitKind::Base)
    }

    fn synthesizer(llm: Arc<RecordingLlm>, budget: usize, depth: usize) -> AnswerSynthesizer {
        let mut config = AppConfig::default();
        config.workspace = std::env::temp_dir().join("hr-advisor-no-prompts");
        config.retrieval.max_context_chars = budget;
        config.retrieval.max_tree_depth = depth;
        AnswerSynthesizer::new(llm, &config).unwrap()
    }

    #[test]
    fn test_context_block_format() {
        let blocks = context_blocks(&[unit("婚假八日", 3)]);
        assert_eq!(blocks, vec!["［來源 1］《請假規則.pdf》 第二條 婚假 第3頁\n婚假八日"]);
    }

    #[test]
    fn test_irrelevant_summary_variants() {
        for reply in ["無相關內容", "「無相關內容」", "無相關內容。", " 『無相關內容』！\n", "\"無相關內容\""] {
            assert!(is_irrelevant(reply), "{reply}");
        }
        assert!(!is_irrelevant("無相關內容，但第三條提到婚假"));
        assert!(!is_irrelevant("婚假八日"));
    }

    #[test]
    fn test_pack_respects_budget() {
        let blocks: Vec<String> = (0..5).map(|i| format!("{}", i).repeat(10)).collect();
        let chunks = pack(&blocks, 25);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= 25));
        assert_eq!(chunks.concat().replace(BLOCK_SEPARATOR, ""), blocks.concat());
    }

    #[test]
    fn test_pack_splits_oversized_block_on_char_boundary() {
        let chunks = pack(&["假".repeat(7)], 3);
        assert_eq!(chunks, vec!["假假假", "假假假", "假"]);
    }

    #[tokio::test]
    async fn test_single_call_when_context_fits() {
        let llm = Arc::new(RecordingLlm::new());
        let synth = synthesizer(Arc::clone(&llm), 24_000, 6);

        let answer = synth.synthesize("婚假幾天？", &[unit("婚假八日", 1)]).await.unwrap();

        assert_eq!(answer, "最終回答");
        let prompts = llm.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("婚假幾天？"));
        assert!(prompts[0].contains("［來源 1］《請假規則.pdf》"));
    }

    #[tokio::test]
    async fn test_tree_summarization_with_small_budget() {
        let llm = Arc::new(RecordingLlm::new());
        let synth = synthesizer(Arc::clone(&llm), 60, 6);
        let units: Vec<RetrievalUnit> = (1..=4)
            .map(|p| unit(&"勞工結婚者給予婚假八日工資照給".repeat(2), p))
            .collect();

        let answer = synth.synthesize("婚假幾天？", &units).await.unwrap();

        assert_eq!(answer, "最終回答");
        let prompts = llm.prompts.lock().unwrap();
        let summaries = prompts.iter().filter(|p| p.contains("無相關內容")).count();
        assert!(summaries >= 2);
        let last = prompts.last().unwrap();
        assert!(!last.contains("無相關內容"));
        assert!(last.contains("摘要"));
    }

    #[tokio::test]
    async fn test_depth_exhausted_is_error() {
        let llm = Arc::new(RecordingLlm::new());
        let synth = synthesizer(Arc::clone(&llm), 60, 0);
        let units: Vec<RetrievalUnit> = (1..=3).map(|p| unit(&"條文".repeat(30), p)).collect();

        let err = synth.synthesize("問題", &units).await.unwrap_err();
        assert!(matches!(err, AppError::Query(_)));
        assert!(llm.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_no_units_still_answers() {
        let llm = Arc::new(RecordingLlm::new());
        let synth = synthesizer(Arc::clone(&llm), 100, 2);
        assert_eq!(synth.synthesize("問題", &[]).await.unwrap(), "最終回答");
    }

    #[tokio::test]
    async fn test_summary_prompt_temperature_overrides_config() {
        let llm = Arc::new(RecordingLlm::new());
        let synth = synthesizer(Arc::clone(&llm), 60, 6);
        let units: Vec<RetrievalUnit> = (1..=3).map(|p| unit(&"條文".repeat(30), p)).collect();

        synth.synthesize("問題", &units).await.unwrap();

        let prompts = llm.prompts.lock().unwrap();
        let temperatures = llm.temperatures.lock().unwrap();
        for (prompt, temperature) in prompts.iter().zip(temperatures.iter()) {
            let expected = if prompt.contains("無相關內容") {
                0.0
            } else {
                AppConfig::default().models.temperature
            };
            assert_eq!(*temperature, Some(expected));
        }
    }
}
