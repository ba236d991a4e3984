//! Configuration management for the HR advisor.
//!
//! Sources are merged in this order (later wins):
//! - Built-in defaults
//! - `.env` in the workspace (never overrides the process environment)
//! - YAML config file (`.hr-advisor/config.yaml` or `HR_CONFIG`)
//! - Environment variables
//! - Command-line flags (`with_overrides`)
//!
//! One `AppConfig` is built at startup and passed by reference into every
//! component constructor.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{AppError, AppResult};

pub const ENV_LLAMA_CLOUD_API_KEY: &str = "LLAMA_CLOUD_API_KEY";
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_COHERE_API_KEY: &str = "COHERE_API_KEY";
pub const ENV_VECTOR_STORE_URI: &str = "HR_VECTOR_STORE_URI";

/// Parsing hints handed to the hosted parser for HR regulatory documents.
pub const DEFAULT_PARSING_INSTRUCTIONS: &str = "這是人力資源法規文件，請特別注意：
1. 精確擷取所有法規條文和數字要求（如請假天數、薪資計算等）
2. 保留完整的章節結構和條文編號
3. 標記所有關鍵定義、權利義務和程序要求
4. 特別注意特殊情況的規定（如颱風假、性騷擾防治等）
5. 提取所有申請流程、期限和必要文件的要求
6. 確保保留每個段落的頁碼和章節資訊";

/// Main application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Workspace root (contains `.hr-advisor/` and an optional `.env`)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    pub credentials: Credentials,
    pub models: ModelSettings,
    pub parser: ParserSettings,
    pub retrieval: RetrievalSettings,
    pub ingestion: IngestionSettings,
    pub store: StoreSettings,
}

/// Provider secrets. `Debug` never prints them in full.
#[derive(Clone, Default)]
pub struct Credentials {
    pub llama_cloud_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub cohere_api_key: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |v: &Option<String>| v.as_deref().map(mask_secret);
        f.debug_struct("Credentials")
            .field("llama_cloud_api_key", &show(&self.llama_cloud_api_key))
            .field("openai_api_key", &show(&self.openai_api_key))
            .field("cohere_api_key", &show(&self.cohere_api_key))
            .finish()
    }
}

/// Model identifiers and endpoints.
#[derive(Debug, Clone)]
pub struct ModelSettings {
    /// Chat completion provider ("openai")
    pub llm_provider: String,
    pub openai_api_base: String,
    pub generation_model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,

    /// Embedding provider ("openai" or "mock")
    pub embedding_provider: String,
    pub embedding_model: String,
    pub embedding_dims: usize,

    /// Rerank provider ("cohere")
    pub rerank_provider: String,
    pub rerank_model: String,
    pub cohere_api_base: String,

    pub request_timeout_secs: u64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            llm_provider: "openai".to_string(),
            openai_api_base: "https://api.openai.com/v1".to_string(),
            generation_model: "gpt-4-turbo-preview".to_string(),
            temperature: 0.1,
            max_tokens: None,
            embedding_provider: "openai".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            embedding_dims: 1536,
            rerank_provider: "cohere".to_string(),
            rerank_model: "rerank-multilingual-v3.0".to_string(),
            cohere_api_base: "https://api.cohere.com/v2".to_string(),
            request_timeout_secs: 120,
        }
    }
}

/// Which document parser backs ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParserBackend {
    /// Hosted LlamaParse service (markdown output)
    LlamaParse,
    /// Local text extraction, no network access
    Local,
}

impl FromStr for ParserBackend {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "llamaparse" => Ok(ParserBackend::LlamaParse),
            "local" => Ok(ParserBackend::Local),
            other => Err(AppError::Config(format!(
                "Unknown parser backend: {}. Supported: llamaparse, local",
                other
            ))),
        }
    }
}

impl fmt::Display for ParserBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParserBackend::LlamaParse => write!(f, "llamaparse"),
            ParserBackend::Local => write!(f, "local"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParserSettings {
    pub backend: ParserBackend,
    pub llama_cloud_api_base: String,
    pub instructions: String,
    pub poll_interval_ms: u64,
    pub timeout_secs: u64,
}

impl Default for ParserSettings {
    fn default() -> Self {
        Self {
            backend: ParserBackend::LlamaParse,
            llama_cloud_api_base: "https://api.cloud.llamaindex.ai/api/v1".to_string(),
            instructions: DEFAULT_PARSING_INSTRUCTIONS.to_string(),
            poll_interval_ms: 1000,
            timeout_secs: 600,
        }
    }
}

/// Query-time sizes.
#[derive(Debug, Clone)]
pub struct RetrievalSettings {
    /// Candidates fetched from the vector index
    pub similarity_top_k: usize,
    /// Candidates kept after reranking
    pub rerank_top_n: usize,
    /// Character budget of one synthesis call's context
    pub max_context_chars: usize,
    /// Maximum number of summarization rounds
    pub max_tree_depth: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            similarity_top_k: 20,
            rerank_top_n: 10,
            max_context_chars: 24_000,
            max_tree_depth: 6,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IngestionSettings {
    /// Parallel element decomposition workers
    pub workers: usize,
    /// Target size of a prose element, in characters
    pub chunk_size: usize,
    /// Ask the LLM for a summary of each table before embedding it
    pub summarize_tables: bool,
}

impl Default for IngestionSettings {
    fn default() -> Self {
        Self {
            workers: 1,
            chunk_size: 1024,
            summarize_tables: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreSettings {
    /// LanceDB URI or local directory
    pub uri: Option<String>,
    /// Logical table name; generations are suffixed to it
    pub table_name: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            uri: None,
            table_name: "hr_regulations".to_string(),
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    models: Option<ModelsFile>,
    parser: Option<ParserFile>,
    retrieval: Option<RetrievalFile>,
    ingestion: Option<IngestionFile>,
    store: Option<StoreFile>,
    logging: Option<LoggingFile>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelsFile {
    llm_provider: Option<String>,
    openai_api_base: Option<String>,
    generation_model: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    embedding_provider: Option<String>,
    embedding_model: Option<String>,
    embedding_dims: Option<usize>,
    rerank_provider: Option<String>,
    rerank_model: Option<String>,
    cohere_api_base: Option<String>,
    request_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParserFile {
    backend: Option<ParserBackend>,
    llama_cloud_api_base: Option<String>,
    instructions: Option<String>,
    poll_interval_ms: Option<u64>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RetrievalFile {
    similarity_top_k: Option<usize>,
    rerank_top_n: Option<usize>,
    max_context_chars: Option<usize>,
    max_tree_depth: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IngestionFile {
    workers: Option<usize>,
    chunk_size: Option<usize>,
    summarize_tables: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreFile {
    uri: Option<String>,
    table_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LoggingFile {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            log_level: None,
            verbose: false,
            no_color: false,
            credentials: Credentials::default(),
            models: ModelSettings::default(),
            parser: ParserSettings::default(),
            retrieval: RetrievalSettings::default(),
            ingestion: IngestionSettings::default(),
            store: StoreSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration for the current directory from `.env`, the YAML
    /// file and the process environment.
    ///
    /// # Example
    /// ```no_run
    /// use hr_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Table: {}", config.store.table_name);
    /// ```
    pub fn load() -> AppResult<Self> {
        Self::load_from(None, None)
    }

    /// Load configuration for an explicit workspace and/or config file.
    ///
    /// `HR_WORKSPACE` and `HR_CONFIG` are consulted when the arguments are
    /// `None`.
    pub fn load_from(workspace: Option<&Path>, config_file: Option<&Path>) -> AppResult<Self> {
        let workspace = workspace
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("HR_WORKSPACE").ok().map(PathBuf::from));

        let dotenv_dir = workspace
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
        let dotenv_path = dotenv_dir.join(".env");
        if dotenv_path.exists() {
            dotenvy::from_path(&dotenv_path).map_err(|e| {
                AppError::Config(format!("Failed to read {:?}: {}", dotenv_path, e))
            })?;
        }

        Self::load_with(workspace, config_file.map(Path::to_path_buf), |key| {
            std::env::var(key).ok()
        })
    }

    /// Build a configuration from an explicit variable lookup.
    ///
    /// `load_from` passes the process environment; tests pass a map.
    pub fn load_with<F>(
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        lookup: F,
    ) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(workspace) = workspace {
            config.workspace = workspace;
        }

        config.config_file = config_file.or_else(|| lookup("HR_CONFIG").map(PathBuf::from));

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = match config.config_file {
            Some(ref cf) => cf.clone(),
            None => config.advisor_dir().join("config.yaml"),
        };

        if config_path.exists() {
            config.merge_yaml(&config_path)?;
        } else if config.config_file.is_some() {
            return Err(AppError::Config(format!(
                "Config file not found: {:?}",
                config_path
            )));
        }

        config.merge_env(&lookup)?;

        Ok(config)
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(&mut self, path: &Path) -> AppResult<()> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        if let Some(m) = file.models {
            let s = &mut self.models;
            set(&mut s.llm_provider, m.llm_provider);
            set(&mut s.openai_api_base, m.openai_api_base);
            set(&mut s.generation_model, m.generation_model);
            set(&mut s.temperature, m.temperature);
            if m.max_tokens.is_some() {
                s.max_tokens = m.max_tokens;
            }
            set(&mut s.embedding_provider, m.embedding_provider);
            set(&mut s.embedding_model, m.embedding_model);
            set(&mut s.embedding_dims, m.embedding_dims);
            set(&mut s.rerank_provider, m.rerank_provider);
            set(&mut s.rerank_model, m.rerank_model);
            set(&mut s.cohere_api_base, m.cohere_api_base);
            set(&mut s.request_timeout_secs, m.request_timeout_secs);
        }

        if let Some(p) = file.parser {
            let s = &mut self.parser;
            set(&mut s.backend, p.backend);
            set(&mut s.llama_cloud_api_base, p.llama_cloud_api_base);
            set(&mut s.instructions, p.instructions);
            set(&mut s.poll_interval_ms, p.poll_interval_ms);
            set(&mut s.timeout_secs, p.timeout_secs);
        }

        if let Some(r) = file.retrieval {
            let s = &mut self.retrieval;
            set(&mut s.similarity_top_k, r.similarity_top_k);
            set(&mut s.rerank_top_n, r.rerank_top_n);
            set(&mut s.max_context_chars, r.max_context_chars);
            set(&mut s.max_tree_depth, r.max_tree_depth);
        }

        if let Some(i) = file.ingestion {
            set(&mut self.ingestion.workers, i.workers);
            set(&mut self.ingestion.chunk_size, i.chunk_size);
            set(&mut self.ingestion.summarize_tables, i.summarize_tables);
        }

        if let Some(st) = file.store {
            if st.uri.is_some() {
                self.store.uri = st.uri;
            }
            set(&mut self.store.table_name, st.table_name);
        }

        if let Some(logging) = file.logging {
            if let Some(level) = logging.level {
                self.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                self.no_color = !color;
            }
        }

        Ok(())
    }

    /// Environment variables override YAML config.
    fn merge_env<F>(&mut self, lookup: &F) -> AppResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        self.credentials.llama_cloud_api_key = non_empty(ENV_LLAMA_CLOUD_API_KEY);
        self.credentials.openai_api_key = non_empty(ENV_OPENAI_API_KEY);
        self.credentials.cohere_api_key = non_empty(ENV_COHERE_API_KEY);

        if let Some(uri) = non_empty(ENV_VECTOR_STORE_URI) {
            self.store.uri = Some(uri);
        }
        if let Some(table) = non_empty("HR_TABLE_NAME") {
            self.store.table_name = table;
        }
        if let Some(base) = non_empty("OPENAI_API_BASE") {
            self.models.openai_api_base = base;
        }
        if let Some(base) = non_empty("COHERE_API_BASE") {
            self.models.cohere_api_base = base;
        }
        if let Some(base) = non_empty("LLAMA_CLOUD_API_BASE") {
            self.parser.llama_cloud_api_base = base;
        }
        if let Some(model) = non_empty("HR_EMBEDDING_MODEL") {
            self.models.embedding_model = model;
        }
        if let Some(dims) = non_empty("HR_EMBEDDING_DIMS") {
            self.models.embedding_dims = dims.trim().parse().map_err(|_| {
                AppError::Config(format!("HR_EMBEDDING_DIMS is not a number: {}", dims))
            })?;
        }
        if let Some(provider) = non_empty("HR_EMBEDDING_PROVIDER") {
            self.models.embedding_provider = provider;
        }
        if let Some(model) = non_empty("HR_GENERATION_MODEL") {
            self.models.generation_model = model;
        }
        if let Some(model) = non_empty("HR_RERANK_MODEL") {
            self.models.rerank_model = model;
        }
        if let Some(provider) = non_empty("HR_RERANK_PROVIDER") {
            self.models.rerank_provider = provider;
        }
        if let Some(parser) = non_empty("HR_PARSER") {
            self.parser.backend = parser.parse()?;
        }
        if let Some(level) = non_empty("RUST_LOG") {
            self.log_level = Some(level);
        }
        if lookup("NO_COLOR").is_some() {
            self.no_color = true;
        }

        Ok(())
    }

    /// Apply CLI overrides to the configuration.
    pub fn with_overrides(
        mut self,
        parser: Option<ParserBackend>,
        table_name: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(parser) = parser {
            self.parser.backend = parser;
        }

        if let Some(table_name) = table_name {
            self.store.table_name = table_name;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Path to the `.hr-advisor` directory.
    pub fn advisor_dir(&self) -> PathBuf {
        self.workspace.join(".hr-advisor")
    }

    /// Directory holding prompt overrides.
    pub fn prompts_dir(&self) -> PathBuf {
        self.advisor_dir().join("prompts")
    }

    /// Keys that must be present for the configured providers, in a fixed
    /// order.
    pub fn required_keys(&self) -> Vec<&'static str> {
        let mut keys = Vec::new();
        if self.parser.backend == ParserBackend::LlamaParse {
            keys.push(ENV_LLAMA_CLOUD_API_KEY);
        }
        if self.models.llm_provider == "openai" || self.models.embedding_provider == "openai" {
            keys.push(ENV_OPENAI_API_KEY);
        }
        if self.models.rerank_provider == "cohere" {
            keys.push(ENV_COHERE_API_KEY);
        }
        keys.push(ENV_VECTOR_STORE_URI);
        keys
    }

    fn value_of(&self, key: &str) -> Option<&str> {
        match key {
            ENV_LLAMA_CLOUD_API_KEY => self.credentials.llama_cloud_api_key.as_deref(),
            ENV_OPENAI_API_KEY => self.credentials.openai_api_key.as_deref(),
            ENV_COHERE_API_KEY => self.credentials.cohere_api_key.as_deref(),
            ENV_VECTOR_STORE_URI => self.store.uri.as_deref(),
            _ => None,
        }
    }

    /// Fail with every missing required key at once.
    pub fn require_credentials(&self) -> AppResult<()> {
        let missing: Vec<String> = self
            .required_keys()
            .into_iter()
            .filter(|key| self.value_of(key).is_none())
            .map(str::to_string)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(AppError::MissingEnv(missing))
        }
    }

    /// One line per required key, with secrets masked.
    pub fn credential_report(&self) -> Vec<String> {
        self.required_keys()
            .into_iter()
            .map(|key| match self.value_of(key) {
                Some(value) if key == ENV_VECTOR_STORE_URI => format!("{}: {}", key, value),
                Some(value) => format!("{}: {}", key, mask_secret(value)),
                None => format!("{}: 未設置", key),
            })
            .collect()
    }

    /// Validate tunables and provider names.
    pub fn validate(&self) -> AppResult<()> {
        let known_llm = ["openai"];
        if !known_llm.contains(&self.models.llm_provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown LLM provider: {}. Supported: {}",
                self.models.llm_provider,
                known_llm.join(", ")
            )));
        }

        let known_embedding = ["openai", "mock"];
        if !known_embedding.contains(&self.models.embedding_provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown embedding provider: {}. Supported: {}",
                self.models.embedding_provider,
                known_embedding.join(", ")
            )));
        }

        let known_rerank = ["cohere", "none"];
        if !known_rerank.contains(&self.models.rerank_provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown rerank provider: {}. Supported: {}",
                self.models.rerank_provider,
                known_rerank.join(", ")
            )));
        }

        if self.models.embedding_dims == 0 {
            return Err(AppError::Config(
                "Embedding dimension must be positive".to_string(),
            ));
        }
        if self.retrieval.similarity_top_k == 0 || self.retrieval.rerank_top_n == 0 {
            return Err(AppError::Config(
                "similarityTopK and rerankTopN must be positive".to_string(),
            ));
        }
        if self.retrieval.max_context_chars < 256 {
            return Err(AppError::Config(format!(
                "maxContextChars too small: {}",
                self.retrieval.max_context_chars
            )));
        }
        if self.retrieval.max_tree_depth == 0 {
            return Err(AppError::Config(
                "maxTreeDepth must be at least 1".to_string(),
            ));
        }
        if self.ingestion.workers == 0 || self.ingestion.chunk_size == 0 {
            return Err(AppError::Config(
                "Ingestion workers and chunkSize must be positive".to_string(),
            ));
        }
        if self.store.table_name.trim().is_empty() {
            return Err(AppError::Config("Table name is empty".to_string()));
        }

        Ok(())
    }
}

fn set<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

/// Render a secret for logs: first and last four characters around `***`,
/// or just `***` for values of eight characters or fewer.
pub fn mask_secret(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() > 8 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}***{}", head, tail)
    } else {
        "***".to_string()
    }
}
