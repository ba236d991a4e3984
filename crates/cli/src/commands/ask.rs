//! One-shot ask: initialize, ingest and answer in a single invocation.

use clap::Args;
use hr_core::{config::AppConfig, AppError, AppResult};
use hr_knowledge::{HrSystem, ProgressEvent, ProgressReporter};
use std::path::PathBuf;
use std::sync::Arc;

/// Ingest documents and answer one question
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: String,

    /// Documents (or directories) to ingest before answering
    #[arg(short, long = "file", required = true, num_args = 1..)]
    pub files: Vec<PathBuf>,

    /// Print ingestion progress to stderr
    #[arg(long)]
    pub progress: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");

        let question = self.question.trim();
        if question.is_empty() {
            return Err(AppError::Query("請輸入問題！".to_string()));
        }

        let mut system = HrSystem::new(config).await?;
        if self.progress {
            system = system.with_progress(ProgressReporter::new(Arc::new(|event: ProgressEvent| {
                eprintln!("{}", event.format_simple());
            })));
        }

        let report = system.ingest(&self.files).await?;
        tracing::debug!(
            "Ingested {} files into {} ({} units) in {:.2}s",
            report.files.len(),
            report.table,
            report.unit_count(),
            report.duration_secs
        );

        let answer = system.answer(question).await?;

        if self.json {
            let output = serde_json::json!({
                "question": question,
                "answer": answer,
                "table": report.table,
                "files": report.files,
                "baseUnits": report.base_units,
                "objectUnits": report.object_units,
                "durationSecs": report.duration_secs,
            });
            let json = serde_json::to_string_pretty(&output)
                .map_err(|e| AppError::Serialization(e.to_string()))?;
            println!("{}", json);
        } else {
            println!("{}", answer);
        }

        Ok(())
    }
}
