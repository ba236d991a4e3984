//! Cross-component scenarios for the ingestion and answering pipeline.

mod pipeline;
