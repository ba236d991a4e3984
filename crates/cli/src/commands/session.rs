//! Interactive session.
//!
//! Each line typed at the prompt maps onto one orchestrator call and the
//! orchestrator's message is printed as-is.

use clap::Args;
use hr_core::{config::AppConfig, AppResult};
use hr_knowledge::{HrSystem, ProgressEvent, ProgressReporter, SystemStatus};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

pub const NOT_INITIALIZED: &str = "請先初始化系統！";
pub const NO_FILES: &str = "請選擇文件！";
pub const NO_QUESTION: &str = "請輸入問題！";
pub const INIT_SUCCESS: &str = "系統初始化成功！請上傳PDF文件。";

const HELP: &str = "\
可用指令：
  init                 初始化系統
  ingest <路徑…>       處理PDF文件（可指定多個文件或目錄）
  ask <問題>           提問
  status               顯示系統狀態
  help                 顯示說明
  quit                 離開";

/// Interactive loop: init, ingest, ask
#[derive(Args, Debug)]
pub struct SessionCommand {
    /// Initialize the system before the first prompt
    #[arg(long)]
    pub init: bool,

    /// Print ingestion progress to stderr
    #[arg(long)]
    pub progress: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Init,
    Ingest(Vec<PathBuf>),
    Ask(String),
    Status,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

impl Action {
    /// Parse one input line. A line that is not a command is a question.
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let (head, rest) = match line.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (line, ""),
        };

        match head {
            "" => Action::Empty,
            "init" => Action::Init,
            "ingest" => Action::Ingest(rest.split_whitespace().map(PathBuf::from).collect()),
            "ask" => Action::Ask(rest.to_string()),
            "status" => Action::Status,
            "help" | "?" => Action::Help,
            "quit" | "exit" => Action::Quit,
            _ if head.starts_with('/') || head.starts_with('-') => {
                Action::Unknown(head.to_string())
            }
            _ => Action::Ask(line.to_string()),
        }
    }
}

/// Holds the orchestrator once `init` succeeds.
pub struct Frontend {
    config: AppConfig,
    progress: bool,
    system: Option<HrSystem>,
}

impl Frontend {
    pub fn new(config: AppConfig, progress: bool) -> Self {
        Self {
            config,
            progress,
            system: None,
        }
    }

    pub async fn initialize(&mut self) -> String {
        match HrSystem::new(&self.config).await {
            Ok(system) => {
                let system = if self.progress {
                    system.with_progress(ProgressReporter::new(Arc::new(
                        |event: ProgressEvent| eprintln!("{}", event.format_simple()),
                    )))
                } else {
                    system
                };
                self.system = Some(system);
                INIT_SUCCESS.to_string()
            }
            Err(e) => {
                tracing::error!("Initialization failed: {}", e);
                format!("初始化失敗：{}", e)
            }
        }
    }

    /// Run one action. `None` ends the session.
    pub async fn handle(&mut self, action: Action) -> Option<String> {
        let reply = match action {
            Action::Quit => return None,
            Action::Empty => String::new(),
            Action::Help => HELP.to_string(),
            Action::Unknown(cmd) => format!("未知指令：{}\n{}", cmd, HELP),
            Action::Init => self.initialize().await,
            Action::Status => match &self.system {
                None => NOT_INITIALIZED.to_string(),
                Some(system) => match system.status().await {
                    SystemStatus::Ready => INIT_SUCCESS.to_string(),
                    SystemStatus::Indexed {
                        table,
                        units,
                        files,
                    } => format!("已索引 {} 個文件，共 {} 個片段（{}）", files, units, table),
                },
            },
            Action::Ingest(paths) => match &self.system {
                None => NOT_INITIALIZED.to_string(),
                Some(_) if paths.is_empty() => NO_FILES.to_string(),
                Some(system) => system.process_files(&paths).await,
            },
            Action::Ask(question) => match &self.system {
                None => NOT_INITIALIZED.to_string(),
                Some(_) if question.trim().is_empty() => NO_QUESTION.to_string(),
                Some(system) => system.ask_question(question.trim()).await,
            },
        };
        Some(reply)
    }
}

impl SessionCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Starting interactive session");

        let mut frontend = Frontend::new(config.clone(), self.progress);
        let mut stdout = tokio::io::stdout();

        let intro = if self.init {
            frontend.initialize().await
        } else {
            HELP.to_string()
        };
        stdout.write_all(format!("{}\n", intro).as_bytes()).await?;

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            stdout.write_all("> ".as_bytes()).await?;
            stdout.flush().await?;

            let Some(line) = lines.next_line().await? else {
                break;
            };

            match frontend.handle(Action::parse(&line)).await {
                None => break,
                Some(reply) if reply.is_empty() => {}
                Some(reply) => stdout.write_all(format!("{}\n", reply).as_bytes()).await?,
            }
        }

        tracing::info!("Session ended");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(temp: &TempDir) -> AppConfig {
        AppConfig::load_with(Some(temp.path().to_path_buf()), None, |_| None).unwrap()
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(Action::parse("init"), Action::Init);
        assert_eq!(Action::parse("  status "), Action::Status);
        assert_eq!(Action::parse("quit"), Action::Quit);
        assert_eq!(Action::parse(""), Action::Empty);
        assert_eq!(
            Action::parse("ingest a.pdf  docs/b.pdf"),
            Action::Ingest(vec![PathBuf::from("a.pdf"), PathBuf::from("docs/b.pdf")])
        );
        assert_eq!(Action::parse("ingest"), Action::Ingest(vec![]));
        assert_eq!(
            Action::parse("ask 婚假有幾天？"),
            Action::Ask("婚假有幾天？".to_string())
        );
        assert_eq!(Action::parse("ask"), Action::Ask(String::new()));
    }

    #[test]
    fn test_bare_line_is_a_question() {
        assert_eq!(
            Action::parse("試用期 最長 多久"),
            Action::Ask("試用期 最長 多久".to_string())
        );
        assert_eq!(Action::parse("/reset"), Action::Unknown("/reset".to_string()));
    }

    #[tokio::test]
    async fn test_actions_before_init() {
        let temp = TempDir::new().unwrap();
        let mut frontend = Frontend::new(config(&temp), false);

        for action in [
            Action::Ingest(vec![PathBuf::from("a.pdf")]),
            Action::Ask("婚假".to_string()),
            Action::Status,
        ] {
            assert_eq!(frontend.handle(action).await.unwrap(), NOT_INITIALIZED);
        }
        assert!(frontend.handle(Action::Quit).await.is_none());
    }

    #[tokio::test]
    async fn test_init_failure_lists_missing_keys() {
        let temp = TempDir::new().unwrap();
        let mut frontend = Frontend::new(config(&temp), false);

        let reply = frontend.handle(Action::Init).await.unwrap();
        assert!(reply.starts_with("初始化失敗：缺少必要的環境變量: "));
        assert!(reply.contains("HR_VECTOR_STORE_URI"));
        assert_eq!(
            frontend.handle(Action::Ask("婚假".to_string())).await.unwrap(),
            NOT_INITIALIZED
        );
    }
}
