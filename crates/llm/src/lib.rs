//! LLM integration crate for the HR advisor.
//!
//! Provides a provider-agnostic completion interface and an
//! OpenAI-compatible chat completion client.
//!
//! # Example
//! ```no_run
//! use hr_llm::{LlmClient, LlmRequest, providers::OpenAiClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OpenAiClient::new("https://api.openai.com/v1", "sk-...", 60)?;
//! let request = LlmRequest::new("特休假如何計算？", "gpt-4-turbo-preview");
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;
pub mod types;

// Re-export main types
pub use client::{LlmClient, LlmRequest, LlmResponse, LlmUsage, Role};
pub use factory::create_client;
pub use providers::OpenAiClient;
pub use types::{LlmSettings, ProviderType};
