//! Configuration check.

use clap::Args;
use hr_core::{config::AppConfig, AppResult};

/// Validate configuration and print the masked credential report
#[derive(Args, Debug)]
pub struct CheckCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl CheckCommand {
    /// Print the report, then fail if any required key is missing.
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing check command");
        config.validate()?;

        let report = config.credential_report();
        if self.json {
            let output = serde_json::json!({
                "workspace": config.workspace,
                "parser": config.parser.backend.to_string(),
                "llmProvider": config.models.llm_provider,
                "embeddingProvider": config.models.embedding_provider,
                "rerankProvider": config.models.rerank_provider,
                "table": config.store.table_name,
                "credentials": report,
            });
            let json = serde_json::to_string_pretty(&output)
                .map_err(|e| hr_core::AppError::Serialization(e.to_string()))?;
            println!("{}", json);
        } else {
            println!("Parser: {}", config.parser.backend);
            println!(
                "Models: {} / {} / {}",
                config.models.generation_model,
                config.models.embedding_model,
                config.models.rerank_model
            );
            println!("Table: {}", config.store.table_name);
            for line in &report {
                println!("{}", line);
            }
        }

        config.require_credentials()
    }
}
