//! HR Advisor CLI
//!
//! Front end for the regulatory question-answering pipeline: an interactive
//! session, a one-shot ask and a configuration check.

mod commands;

use clap::{Parser, Subcommand};
use commands::{AskCommand, CheckCommand, SessionCommand};
use hr_core::{config::ParserBackend, logging, AppConfig};
use std::path::PathBuf;

/// HR Advisor - answers questions about HR regulations with citations
#[derive(Parser, Debug)]
#[command(name = "hr-advisor")]
#[command(about = "Answer HR regulatory questions from PDF documents", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "HR_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "HR_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Document parser (llamaparse, local)
    #[arg(short, long, global = true)]
    parser: Option<String>,

    /// Vector table base name
    #[arg(short, long, global = true)]
    table: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Interactive session: initialize, ingest documents, ask questions
    Session(SessionCommand),

    /// Ingest documents and answer one question
    Ask(AskCommand),

    /// Validate configuration and report credentials
    Check(CheckCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let parser = cli
        .parser
        .as_deref()
        .map(str::parse::<ParserBackend>)
        .transpose()?;

    let config = AppConfig::load_from(cli.workspace.as_deref(), cli.config.as_deref())?
        .with_overrides(
            parser,
            cli.table,
            cli.log_level,
            cli.verbose,
            cli.no_color,
        );

    logging::init_logging(config.log_level.as_deref(), config.no_color)?;

    tracing::info!("HR advisor starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Parser: {}", config.parser.backend);
    tracing::debug!("Table: {}", config.store.table_name);

    let command_name = match &cli.command {
        Commands::Session(_) => "session",
        Commands::Ask(_) => "ask",
        Commands::Check(_) => "check",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Session(cmd) => cmd.execute(&config).await,
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Check(cmd) => cmd.execute(&config),
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    Ok(result?)
}
