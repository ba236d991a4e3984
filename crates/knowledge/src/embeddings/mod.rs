//! Embedding providers.
//!
//! Every retrieval unit and every question is embedded by the same provider
//! so that stored and query vectors share one dimensionality.

pub mod provider;
pub mod providers;

pub use provider::{create_provider, EmbeddingProvider};
pub use providers::{MockProvider, OpenAiEmbeddingProvider};
