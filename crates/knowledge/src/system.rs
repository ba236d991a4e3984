//! The advisor pipeline: ingestion and question answering behind one lock.

use crate::chunk::{ElementDecomposer, MarkdownElementDecomposer, TableSummarizer};
use crate::embeddings::{create_provider, EmbeddingProvider};
use crate::index::{IndexHandle, VectorIndex};
use crate::node_builder::{NodeBuilder, ParsedDocument};
use crate::parser::{collect_document_paths, create_parser, DocumentParser};
use crate::progress::ProgressReporter;
use crate::rag::{collect_sources, render, AnswerSynthesizer};
use crate::rerank::{create_reranker, Reranker};
use crate::store::{open_store, VectorStore};
use crate::types::{IngestReport, RetrievalUnit, SourceIndex, UnitKind};
use chrono::Utc;
use hr_core::{AppConfig, AppError, AppResult};
use hr_llm::{create_client, LlmClient, LlmSettings};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

pub const INGEST_SUCCESS_MESSAGE: &str = "文件處理完成！系統已準備就緒。";
pub const NOT_INDEXED_MESSAGE: &str = "請先上傳並處理PDF文件！";

/// The external collaborators the pipeline is assembled from.
pub struct SystemParts {
    pub parser: Arc<dyn DocumentParser>,
    pub decomposer: Arc<dyn ElementDecomposer>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub store: Arc<dyn VectorStore>,
    pub llm: Arc<dyn LlmClient>,
    pub reranker: Arc<dyn Reranker>,
}

impl SystemParts {
    /// Construct every collaborator named by configuration.
    pub async fn from_config(config: &AppConfig) -> AppResult<Self> {
        Ok(Self {
            parser: create_parser(config)?,
            decomposer: Arc::new(MarkdownElementDecomposer::new(config.ingestion.chunk_size)),
            embedder: create_provider(config)?,
            store: open_store(config).await?,
            llm: create_client(&LlmSettings::from_config(config))?,
            reranker: create_reranker(config)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemStatus {
    /// Initialized, nothing ingested yet
    Ready,
    Indexed {
        table: String,
        units: usize,
        files: usize,
    },
}

struct Indexed {
    handle: IndexHandle,
    sources: SourceIndex,
}

struct State {
    generation: u64,
    current: Option<Indexed>,
}

/// Owns the collaborators and the current index.
///
/// Every operation takes the state lock, so at most one ingestion or query
/// runs at a time. A failed ingestion leaves the previous index serving.
pub struct HrSystem {
    parser: Arc<dyn DocumentParser>,
    node_builder: NodeBuilder,
    index: VectorIndex,
    reranker: Arc<dyn Reranker>,
    synthesizer: AnswerSynthesizer,
    similarity_top_k: usize,
    rerank_top_n: usize,
    progress: ProgressReporter,
    state: Mutex<State>,
}

impl HrSystem {
    /// Check configuration and credentials, then build the pipeline.
    pub async fn new(config: &AppConfig) -> AppResult<Self> {
        config.validate()?;
        config.require_credentials()?;
        let parts = SystemParts::from_config(config).await?;
        Self::from_parts(config, parts)
    }

    pub fn from_parts(config: &AppConfig, parts: SystemParts) -> AppResult<Self> {
        let mut node_builder = NodeBuilder::new(parts.decomposer, config.ingestion.workers);
        if config.ingestion.summarize_tables {
            node_builder = node_builder
                .with_table_summarizer(TableSummarizer::new(Arc::clone(&parts.llm), config)?);
        }
        let synthesizer = AnswerSynthesizer::new(parts.llm, config)?;

        tracing::info!(
            parser = parts.parser.name(),
            embedder = parts.embedder.provider_name(),
            store = parts.store.backend_name(),
            reranker = parts.reranker.provider_name(),
            "HR advisor initialized"
        );

        Ok(Self {
            parser: parts.parser,
            node_builder,
            index: VectorIndex::new(parts.store, parts.embedder, &config.store.table_name),
            reranker: parts.reranker,
            synthesizer,
            similarity_top_k: config.retrieval.similarity_top_k,
            rerank_top_n: config.retrieval.rerank_top_n,
            progress: ProgressReporter::noop(),
            state: Mutex::new(State {
                generation: 0,
                current: None,
            }),
        })
    }

    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.node_builder = self.node_builder.with_progress(progress.clone());
        self.index = self.index.with_progress(progress.clone());
        self.progress = progress;
        self
    }

    pub async fn status(&self) -> SystemStatus {
        let state = self.state.lock().await;
        match &state.current {
            None => SystemStatus::Ready,
            Some(indexed) => SystemStatus::Indexed {
                table: indexed.handle.table.clone(),
                units: indexed.handle.unit_count,
                files: indexed.sources.len(),
            },
        }
    }

    /// Parse, decompose and index `paths`, replacing the current index.
    pub async fn ingest(&self, paths: &[PathBuf]) -> AppResult<IngestReport> {
        let mut state = self.state.lock().await;
        let start = Instant::now();

        let generation = state.generation + 1;
        let (indexed, report) = self
            .rebuild(paths, generation)
            .await
            .map_err(|e| match e {
                AppError::Ingestion(_) => e,
                other => AppError::Ingestion(other.to_string()),
            })?;

        state.generation = generation;
        let handle = indexed.handle.clone();
        state.current = Some(indexed);
        self.index.prune(&handle).await;

        let report = IngestReport {
            duration_secs: start.elapsed().as_secs_f64(),
            completed_at: Utc::now(),
            ..report
        };
        tracing::info!(
            files = report.files.len(),
            units = report.unit_count(),
            table = %report.table,
            duration_secs = report.duration_secs,
            "Ingestion complete"
        );
        Ok(report)
    }

    async fn rebuild(&self, paths: &[PathBuf], generation: u64) -> AppResult<(Indexed, IngestReport)> {
        let files = collect_document_paths(paths)?;
        if files.is_empty() {
            return Err(AppError::Ingestion("No supported documents found".to_string()));
        }

        tracing::info!(files = files.len(), parser = self.parser.name(), "Starting ingestion");

        let total = files.len() as u64;
        let mut documents = Vec::with_capacity(files.len());
        for (i, path) in files.iter().enumerate() {
            let fragments = self.parser.parse(path).await?;
            tracing::debug!(file = %path.display(), fragments = fragments.len(), "Parsed");
            self.progress
                .parse(i as u64 + 1, Some(total), &path.display().to_string());
            documents.push(ParsedDocument {
                path: path.clone(),
                fragments,
            });
        }
        let fragments = documents.iter().map(|d| d.fragments.len()).sum();

        let built = self.node_builder.build(&documents).await?;
        let base_units = built.count(UnitKind::Base);
        let object_units = built.count(UnitKind::Object);

        let handle = self.index.build(built.units, generation).await?;

        let report = IngestReport {
            files,
            fragments,
            base_units,
            object_units,
            table: handle.table.clone(),
            generation,
            duration_secs: 0.0,
            completed_at: Utc::now(),
        };
        Ok((
            Indexed {
                handle,
                sources: built.sources,
            },
            report,
        ))
    }

    /// Answer `question` against the current index, with citations.
    pub async fn answer(&self, question: &str) -> AppResult<String> {
        let state = self.state.lock().await;
        match &state.current {
            None => Err(AppError::Query(NOT_INDEXED_MESSAGE.to_string())),
            Some(indexed) => self.answer_with(indexed, question).await,
        }
    }

    async fn answer_with(&self, indexed: &Indexed, question: &str) -> AppResult<String> {
        self.run_query(indexed, question)
            .await
            .map_err(|e| match e {
                AppError::Query(_) => e,
                other => AppError::Query(other.to_string()),
            })
    }

    async fn run_query(&self, indexed: &Indexed, question: &str) -> AppResult<String> {
        tracing::info!(table = %indexed.handle.table, "Answering question");

        let candidates: Vec<RetrievalUnit> = self
            .index
            .retrieve(&indexed.handle, question, self.similarity_top_k)
            .await?
            .into_iter()
            .map(|scored| scored.unit)
            .collect();
        let retrieved = candidates.len();

        let context = self
            .reranker
            .rerank(question, candidates, self.rerank_top_n)
            .await?;
        tracing::debug!(retrieved, reranked = context.len(), "Context selected");

        let answer = self.synthesizer.synthesize(question, &context).await?;
        let sources = collect_sources(&context, &indexed.sources);
        Ok(render(&answer, &sources))
    }

    /// Ingest and report the outcome as a user-facing message.
    pub async fn process_files(&self, paths: &[PathBuf]) -> String {
        match self.ingest(paths).await {
            Ok(_) => INGEST_SUCCESS_MESSAGE.to_string(),
            Err(e) => {
                tracing::error!("Ingestion failed: {}", e);
                format!("處理文件時發生錯誤：{}", e.detail())
            }
        }
    }

    /// Answer and report the outcome as a user-facing message.
    pub async fn ask_question(&self, question: &str) -> String {
        let state = self.state.lock().await;
        let Some(indexed) = &state.current else {
            return NOT_INDEXED_MESSAGE.to_string();
        };

        match self.answer_with(indexed, question).await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::error!("Question failed: {}", e);
                format!("回答問題時發生錯誤：{}", e.detail())
            }
        }
    }
}
