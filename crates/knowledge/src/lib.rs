//! Regulatory knowledge pipeline for the HR advisor.
//!
//! Ingestion parses documents into fragments, decomposes them into
//! retrieval units with complete metadata and writes them to a vector
//! index. Questions are answered by retrieving and reranking units,
//! synthesizing an answer and appending deduplicated citations.
//!
//! [`HrSystem`] ties the stages together.

pub mod chunk;
pub mod embeddings;
pub mod index;
pub mod metadata;
pub mod node_builder;
pub mod parser;
pub mod progress;
pub mod rag;
pub mod rerank;
pub mod store;
pub mod system;
pub mod types;

#[cfg(test)]
mod tests;

pub use index::{IndexHandle, VectorIndex};
pub use node_builder::{BuiltNodes, NodeBuilder, ParsedDocument};
pub use progress::{ProgressEvent, ProgressReporter};
pub use system::{HrSystem, SystemParts, SystemStatus};
pub use types::{
    DocumentSource, DocumentSourceEntry, FragmentMetadata, IngestReport, RawFragment,
    RetrievalUnit, ScoredUnit, SourceIndex, UnitKind, UnitMetadata,
};
