//! Document parsing: file path → page fragments.
//!
//! Two backends:
//! - [`LlamaParseClient`]: hosted LlamaParse service, markdown per page
//! - [`LocalPdfParser`]: offline text extraction with `pdf-extract`

use crate::types::RawFragment;
use hr_core::config::ParserBackend;
use hr_core::{AppConfig, AppError, AppResult};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

/// Input document format, by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Markdown,
    PlainText,
}

impl DocumentFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(Self::Pdf),
            "md" | "markdown" => Some(Self::Markdown),
            "txt" => Some(Self::PlainText),
            _ => None,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Markdown => "text/markdown",
            Self::PlainText => "text/plain",
        }
    }
}

/// Parser collaborator: turns one file into ordered fragments.
#[async_trait::async_trait]
pub trait DocumentParser: Send + Sync {
    fn name(&self) -> &str;

    async fn parse(&self, path: &Path) -> AppResult<Vec<RawFragment>>;
}

/// Build the parser selected by configuration.
pub fn create_parser(config: &AppConfig) -> AppResult<Arc<dyn DocumentParser>> {
    match config.parser.backend {
        ParserBackend::LlamaParse => {
            let api_key = config
                .credentials
                .llama_cloud_api_key
                .as_deref()
                .ok_or_else(|| AppError::MissingEnv(vec!["LLAMA_CLOUD_API_KEY".to_string()]))?;
            Ok(Arc::new(LlamaParseClient::new(
                &config.parser.llama_cloud_api_base,
                api_key,
                &config.parser.instructions,
                Duration::from_millis(config.parser.poll_interval_ms),
                Duration::from_secs(config.parser.timeout_secs),
                Duration::from_secs(config.models.request_timeout_secs),
            )?))
        }
        ParserBackend::Local => Ok(Arc::new(LocalPdfParser)),
    }
}

/// Expand the given paths into the documents to ingest.
///
/// Files are taken as given; directories contribute every supported file
/// below them in sorted order. Duplicates keep their first position.
pub fn collect_document_paths(paths: &[PathBuf]) -> AppResult<Vec<PathBuf>> {
    let mut out: Vec<PathBuf> = Vec::new();

    for path in paths {
        if path.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(path)
                .follow_links(false)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .map(|e| e.into_path())
                .filter(|p| DocumentFormat::from_path(p).is_some())
                .collect();
            found.sort();
            debug!("Found {} documents under {:?}", found.len(), path);
            out.extend(found);
        } else if path.is_file() {
            out.push(path.clone());
        } else {
            return Err(AppError::Parse(format!("File not found: {}", path.display())));
        }
    }

    let mut seen = std::collections::HashSet::new();
    out.retain(|p| seen.insert(p.clone()));
    Ok(out)
}

// ---------------------------------------------------------------------------
// LlamaParse
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct UploadResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct JobStatus {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JsonResult {
    #[serde(default)]
    pages: Vec<JsonPage>,
}

#[derive(Debug, Deserialize)]
struct JsonPage {
    #[serde(default)]
    page: Option<u32>,
    #[serde(default)]
    md: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

/// Client for the hosted LlamaParse API.
pub struct LlamaParseClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    instructions: String,
    poll_interval: Duration,
    timeout: Duration,
}

impl LlamaParseClient {
    pub fn new(
        base_url: &str,
        api_key: &str,
        instructions: &str,
        poll_interval: Duration,
        timeout: Duration,
        request_timeout: Duration,
    ) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| AppError::Parse(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            instructions: instructions.to_string(),
            poll_interval,
            timeout,
        })
    }

    async fn upload(&self, path: &Path) -> AppResult<String> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| AppError::Parse(format!("Failed to read {}: {}", path.display(), e)))?;

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(crate::metadata::file_name_of(path))
            .mime_str(
                DocumentFormat::from_path(path)
                    .unwrap_or(DocumentFormat::Pdf)
                    .mime_type(),
            )
            .map_err(|e| AppError::Parse(format!("Invalid upload part: {}", e)))?;

        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("result_type", "markdown")
            .text("parsing_instruction", self.instructions.clone());

        let response = self
            .client
            .post(format!("{}/parsing/upload", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::Parse(format!("LlamaParse upload failed: {}", e)))?;

        let upload: UploadResponse = Self::read_json(response, "upload").await?;
        Ok(upload.id)
    }

    async fn wait_for_job(&self, job_id: &str) -> AppResult<()> {
        let started = Instant::now();
        loop {
            let response = self
                .client
                .get(format!("{}/parsing/job/{}", self.base_url, job_id))
                .bearer_auth(&self.api_key)
                .send()
                .await
                .map_err(|e| AppError::Parse(format!("LlamaParse status request failed: {}", e)))?;

            let status: JobStatus = Self::read_json(response, "status").await?;
            match status.status.as_str() {
                "SUCCESS" => return Ok(()),
                "ERROR" | "CANCELED" => {
                    return Err(AppError::Parse(format!(
                        "LlamaParse job {} ended with {}: {}",
                        job_id,
                        status.status,
                        status.error_message.unwrap_or_default()
                    )))
                }
                other => debug!(job_id, status = other, "LlamaParse job pending"),
            }

            if started.elapsed() >= self.timeout {
                return Err(AppError::Parse(format!(
                    "LlamaParse job {} did not finish within {}s",
                    job_id,
                    self.timeout.as_secs()
                )));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn fetch_pages(&self, job_id: &str) -> AppResult<Vec<RawFragment>> {
        let response = self
            .client
            .get(format!("{}/parsing/job/{}/result/json", self.base_url, job_id))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| AppError::Parse(format!("LlamaParse result request failed: {}", e)))?;

        let result: JsonResult = Self::read_json(response, "result").await?;
        Ok(pages_to_fragments(result.pages))
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
        step: &str,
    ) -> AppResult<T> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Parse(format!(
                "LlamaParse {} error ({}): {}",
                step, status, body
            )));
        }
        response
            .json()
            .await
            .map_err(|e| AppError::Parse(format!("Failed to decode LlamaParse {}: {}", step, e)))
    }
}

fn pages_to_fragments(pages: Vec<JsonPage>) -> Vec<RawFragment> {
    pages
        .into_iter()
        .enumerate()
        .map(|(i, page)| {
            let text = page.md.or(page.text).unwrap_or_default();
            RawFragment::new(text).with_index(page.page.unwrap_or(i as u32 + 1))
        })
        .collect()
}

#[async_trait::async_trait]
impl DocumentParser for LlamaParseClient {
    fn name(&self) -> &str {
        "llamaparse"
    }

    #[instrument(skip(self), fields(file = %path.display()))]
    async fn parse(&self, path: &Path) -> AppResult<Vec<RawFragment>> {
        info!("Uploading document to LlamaParse");
        let job_id = self.upload(path).await?;
        self.wait_for_job(&job_id).await?;
        let fragments = self.fetch_pages(&job_id).await?;
        info!(pages = fragments.len(), "LlamaParse finished");
        Ok(fragments)
    }
}

// ---------------------------------------------------------------------------
// Local
// ---------------------------------------------------------------------------

/// Offline parser. PDFs yield one fragment per page; text and markdown
/// files are split on form feeds.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalPdfParser;

impl LocalPdfParser {
    fn extract_pdf(path: &Path) -> AppResult<Vec<String>> {
        // pdf-extract panics on some malformed inputs
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            pdf_extract::extract_text_by_pages(path)
        }));

        match result {
            Ok(Ok(pages)) => Ok(pages),
            Ok(Err(e)) => Err(AppError::Parse(format!(
                "Failed to extract text from {}: {}",
                path.display(),
                e
            ))),
            Err(_) => Err(AppError::Parse(format!(
                "PDF extractor crashed on {}",
                path.display()
            ))),
        }
    }
}

#[async_trait::async_trait]
impl DocumentParser for LocalPdfParser {
    fn name(&self) -> &str {
        "local"
    }

    #[instrument(skip(self), fields(file = %path.display()))]
    async fn parse(&self, path: &Path) -> AppResult<Vec<RawFragment>> {
        let format = DocumentFormat::from_path(path).ok_or_else(|| {
            AppError::Parse(format!("Unsupported document type: {}", path.display()))
        })?;

        let pages = match format {
            DocumentFormat::Pdf => {
                let owned = path.to_path_buf();
                tokio::task::spawn_blocking(move || Self::extract_pdf(&owned))
                    .await
                    .map_err(|e| AppError::Parse(format!("PDF extraction task failed: {}", e)))??
            }
            DocumentFormat::Markdown | DocumentFormat::PlainText => {
                let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
                    AppError::Parse(format!("Failed to read {}: {}", path.display(), e))
                })?;
                raw.split('\u{c}').map(str::to_string).collect()
            }
        };

        if pages.iter().all(|p| p.trim().is_empty()) {
            warn!("No extractable text found");
        }

        Ok(pages
            .into_iter()
            .enumerate()
            .map(|(i, text)| RawFragment::new(text).with_index(i as u32 + 1))
            .collect())
    }
}
