//! Vector store abstraction.
//!
//! A store is a session over named tables. Each table holds retrieval units
//! with their embeddings and answers exhaustive nearest-neighbour queries.

mod lance;
mod memory;

pub use lance::LanceDbStore;
pub use memory::InMemoryStore;

use crate::types::{RetrievalUnit, ScoredUnit};
use hr_core::{AppConfig, AppError, AppResult};
use std::sync::Arc;

/// Distance metric used for similarity search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceMetric {
    L2,
}

/// Index built over the embedding column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    /// No ANN structure; every query scans all rows
    Flat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub dimensions: usize,
    pub metric: DistanceMetric,
    pub index: IndexKind,
}

impl TableSchema {
    pub fn flat_l2(dimensions: usize) -> Self {
        Self {
            dimensions,
            metric: DistanceMetric::L2,
            index: IndexKind::Flat,
        }
    }
}

#[async_trait::async_trait]
pub trait VectorStore: Send + Sync {
    fn backend_name(&self) -> &str;

    /// Names of every table in the store, sorted.
    async fn list_tables(&self) -> AppResult<Vec<String>>;

    /// Drop `name` if it exists. Dropping a missing table is not an error.
    async fn drop_table_if_exists(&self, name: &str) -> AppResult<()>;

    /// Create an empty table. Fails if `name` already exists.
    async fn create_table(&self, name: &str, schema: &TableSchema) -> AppResult<()>;

    /// Append units in order. Every unit must carry an embedding of the
    /// table's dimension.
    async fn insert(&self, name: &str, units: &[RetrievalUnit]) -> AppResult<()>;

    async fn count_rows(&self, name: &str) -> AppResult<usize>;

    /// The `k` rows nearest to `vector`, sorted by ascending distance with
    /// insertion order breaking ties. A tie at the `k`-th distance keeps
    /// the rows inserted first.
    async fn query(&self, name: &str, vector: &[f32], k: usize) -> AppResult<Vec<ScoredUnit>>;
}

/// Open the store named by configuration: LanceDB at `store.uri`.
pub async fn open_store(config: &AppConfig) -> AppResult<Arc<dyn VectorStore>> {
    let uri = config.store.uri.as_deref().ok_or_else(|| {
        AppError::MissingEnv(vec![hr_core::config::ENV_VECTOR_STORE_URI.to_string()])
    })?;
    let store = LanceDbStore::connect(uri).await?;
    Ok(Arc::new(store))
}

/// Check an embedding against a table's dimension before writing it.
pub(crate) fn embedding_of<'a>(unit: &'a RetrievalUnit, dimensions: usize) -> AppResult<&'a [f32]> {
    let embedding = unit
        .embedding
        .as_deref()
        .ok_or_else(|| AppError::Store(format!("Unit {} has no embedding", unit.id)))?;

    if embedding.len() != dimensions {
        return Err(AppError::Store(format!(
            "Embedding dimension mismatch: expected {}, got {}",
            dimensions,
            embedding.len()
        )));
    }
    Ok(embedding)
}

/// Order by distance, then by insertion position.
pub(crate) fn sort_scored(results: &mut [ScoredUnit]) {
    results.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.seq.cmp(&b.seq))
    });
}
