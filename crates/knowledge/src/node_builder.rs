//! Turns parsed documents into retrieval units with complete metadata.

use crate::chunk::{Element, ElementDecomposer, TableSummarizer};
use crate::metadata::{file_name_of, label_fragment};
use crate::progress::ProgressReporter;
use crate::types::{
    DocumentSourceEntry, FragmentMetadata, RawFragment, RetrievalUnit, SourceIndex, UnitKind,
};
use futures::stream::{self, StreamExt};
use hr_core::{AppError, AppResult};
use std::path::PathBuf;
use std::sync::Arc;

/// Parser output for one file.
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub path: PathBuf,
    pub fragments: Vec<RawFragment>,
}

/// Units plus the source map they reference.
#[derive(Debug, Clone, Default)]
pub struct BuiltNodes {
    pub units: Vec<RetrievalUnit>,
    pub sources: SourceIndex,
}

impl BuiltNodes {
    pub fn count(&self, kind: UnitKind) -> usize {
        self.units.iter().filter(|u| u.kind == kind).count()
    }
}

struct Job {
    label: FragmentMetadata,
    text: String,
}

pub struct NodeBuilder {
    decomposer: Arc<dyn ElementDecomposer>,
    summarizer: Option<TableSummarizer>,
    workers: usize,
    progress: ProgressReporter,
}

impl NodeBuilder {
    /// `workers` bounds how many fragments are decomposed at once.
    pub fn new(decomposer: Arc<dyn ElementDecomposer>, workers: usize) -> Self {
        Self {
            decomposer,
            summarizer: None,
            workers: workers.max(1),
            progress: ProgressReporter::noop(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    /// Summarize table units before they are returned.
    pub fn with_table_summarizer(mut self, summarizer: TableSummarizer) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    /// Build units for every fragment of every document.
    ///
    /// Output order follows input order (document, then fragment, then
    /// element) regardless of the worker count. A fragment that cannot be
    /// decomposed still yields one base unit holding its whole text.
    pub async fn build(&self, documents: &[ParsedDocument]) -> AppResult<BuiltNodes> {
        let mut sources = SourceIndex::new();
        let mut jobs = Vec::new();

        for doc in documents {
            let path = doc.path.display().to_string();
            sources
                .entry(path.clone())
                .or_insert_with(|| DocumentSourceEntry {
                    title: file_name_of(&doc.path),
                    path,
                });

            for (i, fragment) in doc.fragments.iter().enumerate() {
                jobs.push(Job {
                    label: label_fragment(&doc.path, i as u32 + 1, fragment),
                    text: fragment.text.clone(),
                });
            }
        }

        let total = jobs.len() as u64;
        tracing::debug!(
            fragments = total,
            workers = self.workers,
            "Decomposing fragments"
        );

        let results: Vec<(Job, AppResult<Vec<Element>>)> = stream::iter(jobs)
            .map(|job| {
                let decomposer = Arc::clone(&self.decomposer);
                async move {
                    tokio::task::spawn_blocking(move || {
                        let elements = decomposer.decompose(&job.text);
                        (job, elements)
                    })
                    .await
                    .map_err(|e| AppError::Ingestion(format!("Decomposition task failed: {}", e)))
                }
            })
            .buffered(self.workers)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect::<AppResult<Vec<_>>>()?;

        let mut units = Vec::new();
        for (done, (job, elements)) in results.into_iter().enumerate() {
            match elements {
                Ok(elements) => {
                    for element in elements {
                        units.push(RetrievalUnit::new(
                            element.text,
                            job.label.clone().complete(),
                            element.kind,
                        ));
                    }
                }
                Err(e) => {
                    let metadata = job.label.complete();
                    tracing::warn!(
                        file = %metadata.file_name,
                        page = metadata.page,
                        "Element decomposition failed, keeping fragment as one unit: {}",
                        e
                    );
                    if !job.text.trim().is_empty() {
                        units.push(RetrievalUnit::new(job.text, metadata, UnitKind::Base));
                    }
                }
            }
            self.progress.chunk(done as u64 + 1, Some(total), units.len() as u32);
        }

        if let Some(summarizer) = &self.summarizer {
            let summarized = summarizer.annotate(&mut units, self.workers).await;
            tracing::debug!(summarized, "Table summaries attached");
        }

        tracing::info!(
            "Built {} units from {} documents",
            units.len(),
            documents.len()
        );

        Ok(BuiltNodes { units, sources })
    }
}
