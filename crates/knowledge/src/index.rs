//! Generation-based vector index over a [`VectorStore`].
//!
//! Each rebuild writes a fresh table named `{base}_{generation}`. The new
//! table is validated before callers swap to it, so a failed rebuild never
//! disturbs the index that is currently serving queries.

use crate::embeddings::EmbeddingProvider;
use crate::progress::ProgressReporter;
use crate::store::{TableSchema, VectorStore};
use crate::types::{RetrievalUnit, ScoredUnit};
use hr_core::{AppError, AppResult};
use std::sync::Arc;

/// Units embedded per provider call while building.
const EMBED_BATCH: usize = 64;

/// A built, validated table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexHandle {
    pub table: String,
    pub generation: u64,
    pub dimensions: usize,
    pub unit_count: usize,
}

pub struct VectorIndex {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    base_table: String,
    progress: ProgressReporter,
}

impl VectorIndex {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        base_table: impl Into<String>,
    ) -> Self {
        Self {
            store,
            embedder,
            base_table: base_table.into(),
            progress: ProgressReporter::noop(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    pub fn dimensions(&self) -> usize {
        self.embedder.dimensions()
    }

    pub fn table_name(&self, generation: u64) -> String {
        format!("{}_{}", self.base_table, generation)
    }

    /// Embed `units` and write them to the table for `generation`.
    ///
    /// On any failure the partially written table is dropped and the error
    /// returned; tables of other generations are not touched.
    pub async fn build(&self, units: Vec<RetrievalUnit>, generation: u64) -> AppResult<IndexHandle> {
        let table = self.table_name(generation);

        match self.build_table(&table, units, generation).await {
            Ok(handle) => Ok(handle),
            Err(e) => {
                if let Err(cleanup) = self.store.drop_table_if_exists(&table).await {
                    tracing::warn!("Failed to drop partial table '{}': {}", table, cleanup);
                }
                Err(e)
            }
        }
    }

    async fn build_table(
        &self,
        table: &str,
        mut units: Vec<RetrievalUnit>,
        generation: u64,
    ) -> AppResult<IndexHandle> {
        let dimensions = self.dimensions();
        let total = units.len() as u64;

        tracing::info!(
            table,
            units = units.len(),
            provider = self.embedder.provider_name(),
            model = self.embedder.model_name(),
            "Building vector index"
        );

        self.store.drop_table_if_exists(table).await?;

        let mut done = 0u64;
        for batch in units.chunks_mut(EMBED_BATCH) {
            let texts: Vec<String> = batch.iter().map(|u| u.text.clone()).collect();
            let vectors = self.embedder.embed_batch(&texts).await?;
            if vectors.len() != batch.len() {
                return Err(AppError::Embedding(format!(
                    "Provider returned {} embeddings for {} texts",
                    vectors.len(),
                    batch.len()
                )));
            }

            for (unit, vector) in batch.iter_mut().zip(vectors) {
                if vector.len() != dimensions {
                    return Err(AppError::Config(format!(
                        "Embedding model '{}' returned {} dimensions, expected {}",
                        self.embedder.model_name(),
                        vector.len(),
                        dimensions
                    )));
                }
                unit.embedding = Some(vector);
            }

            done += batch.len() as u64;
            self.progress
                .embed(done, Some(total), self.embedder.model_name());
        }

        self.store
            .create_table(table, &TableSchema::flat_l2(dimensions))
            .await?;
        self.store.insert(table, &units).await?;
        self.progress.index(total, Some(total), table);

        let handle = IndexHandle {
            table: table.to_string(),
            generation,
            dimensions,
            unit_count: units.len(),
        };
        self.validate(&handle, &units).await?;

        tracing::info!(table, units = handle.unit_count, "Vector index ready");
        Ok(handle)
    }

    /// Check row count and, when non-empty, that a probe query answers.
    async fn validate(&self, handle: &IndexHandle, units: &[RetrievalUnit]) -> AppResult<()> {
        let rows = self.store.count_rows(&handle.table).await?;
        if rows != handle.unit_count {
            return Err(AppError::Store(format!(
                "Table '{}' holds {} rows, expected {}",
                handle.table, rows, handle.unit_count
            )));
        }

        if let Some(probe) = units.first().and_then(|u| u.embedding.as_deref()) {
            let hits = self.store.query(&handle.table, probe, 1).await?;
            if hits.is_empty() {
                return Err(AppError::Store(format!(
                    "Table '{}' returned no rows for a probe query",
                    handle.table
                )));
            }
        }
        Ok(())
    }

    /// The `k` units nearest to `query`, by ascending L2 distance.
    pub async fn retrieve(
        &self,
        handle: &IndexHandle,
        query: &str,
        k: usize,
    ) -> AppResult<Vec<ScoredUnit>> {
        let vector = self.embedder.embed(query).await?;
        if vector.len() != handle.dimensions {
            return Err(AppError::Config(format!(
                "Query embedding has {} dimensions but index '{}' was built with {}",
                vector.len(),
                handle.table,
                handle.dimensions
            )));
        }

        let results = self.store.query(&handle.table, &vector, k).await?;
        tracing::debug!(
            table = %handle.table,
            k,
            returned = results.len(),
            "Retrieved candidates"
        );
        Ok(results)
    }

    /// True for `{base}_{generation}` names of this index.
    fn is_generation_table(&self, name: &str) -> bool {
        name.strip_prefix(self.base_table.as_str())
            .and_then(|rest| rest.strip_prefix('_'))
            .is_some_and(|g| !g.is_empty() && g.bytes().all(|b| b.is_ascii_digit()))
    }

    /// Drop every generation of this index except `keep`, including tables
    /// left by earlier processes. Failures are logged, not returned.
    pub async fn prune(&self, keep: &IndexHandle) -> usize {
        let names = match self.store.list_tables().await {
            Ok(names) => names,
            Err(e) => {
                tracing::warn!("Failed to list tables for pruning: {}", e);
                return 0;
            }
        };

        let mut dropped = 0;
        for name in names
            .iter()
            .filter(|n| n.as_str() != keep.table && self.is_generation_table(n))
        {
            match self.store.drop_table_if_exists(name).await {
                Ok(()) => {
                    tracing::debug!("Dropped superseded table '{}'", name);
                    dropped += 1;
                }
                Err(e) => tracing::warn!("Failed to drop superseded table '{}': {}", name, e),
            }
        }
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::MockProvider;
    use crate::store::InMemoryStore;
    use crate::types::{FragmentMetadata, UnitKind};

    fn units(texts: &[&str]) -> Vec<RetrievalUnit> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let metadata = FragmentMetadata {
                    file_name: "規章.pdf".to_string(),
                    page: Some(i as u32 + 1),
                    ..Default::default()
                }
                .complete();
                RetrievalUnit::new(*t, metadata, UnitKind::Base)
            })
            .collect()
    }

    fn index(store: Arc<InMemoryStore>, dims: usize) -> VectorIndex {
        VectorIndex::new(store, Arc::new(MockProvider::new(dims)), "hr")
    }

    /// Returns vectors one element short.
    #[derive(Debug)]
    struct ShortProvider;

    #[async_trait::async_trait]
    impl EmbeddingProvider for ShortProvider {
        fn provider_name(&self) -> &str {
            "short"
        }
        fn model_name(&self) -> &str {
            "short-v1"
        }
        fn dimensions(&self) -> usize {
            4
        }
        async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![0.0; 3]).collect())
        }
    }

    #[tokio::test]
    async fn test_build_and_retrieve() {
        let store = Arc::new(InMemoryStore::new());
        let index = index(Arc::clone(&store), 128);

        let handle = index
            .build(units(&["第一條 試用期為三個月", "第二條 婚假八日"]), 1)
            .await
            .unwrap();
        assert_eq!(handle.table, "hr_1");
        assert_eq!(handle.unit_count, 2);

        let results = index.retrieve(&handle, "試用期", 1).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].unit.text, "第一條 試用期為三個月");
    }

    #[tokio::test]
    async fn test_rebuild_preserves_units() {
        let store = Arc::new(InMemoryStore::new());
        let index = index(Arc::clone(&store), 64);
        let input = units(&["甲", "乙", "丙"]);

        let first = index.build(input.clone(), 1).await.unwrap();
        let second = index.build(input.clone(), 2).await.unwrap();
        assert_eq!(first.unit_count, second.unit_count);

        let mut stored = index.retrieve(&second, "甲", 10).await.unwrap();
        stored.sort_by_key(|s| s.seq);
        for (scored, original) in stored.iter().zip(&input) {
            assert_eq!(scored.unit.id, original.id);
            assert_eq!(scored.unit.text, original.text);
            assert_eq!(scored.unit.metadata, original.metadata);
        }
    }

    #[tokio::test]
    async fn test_failed_build_drops_partial_table() {
        let store = Arc::new(InMemoryStore::new());
        let good = index(Arc::clone(&store), 4);
        good.build(units(&["甲"]), 1).await.unwrap();

        let bad = VectorIndex::new(Arc::clone(&store) as Arc<dyn VectorStore>, Arc::new(ShortProvider), "hr");
        let err = bad.build(units(&["乙"]), 2).await.unwrap_err();
        assert!(err.is_config());
        assert_eq!(store.table_names(), vec!["hr_1".to_string()]);
    }

    #[tokio::test]
    async fn test_query_dimension_mismatch_is_config_error() {
        let store = Arc::new(InMemoryStore::new());
        let handle = index(Arc::clone(&store), 8)
            .build(units(&["甲"]), 1)
            .await
            .unwrap();

        let other = index(Arc::clone(&store), 16);
        let err = other.retrieve(&handle, "甲", 1).await.unwrap_err();
        assert!(err.is_config());
    }

    #[tokio::test]
    async fn test_empty_build() {
        let store = Arc::new(InMemoryStore::new());
        let handle = index(Arc::clone(&store), 8).build(Vec::new(), 3).await.unwrap();
        assert_eq!(handle.unit_count, 0);
        assert_eq!(store.count_rows("hr_3").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_prune_keeps_only_current_generation() {
        let store = Arc::new(InMemoryStore::new());
        store.create_table("hr_7", &TableSchema::flat_l2(8)).await.unwrap();
        store.create_table("hr_notes", &TableSchema::flat_l2(8)).await.unwrap();
        store.create_table("hrx_1", &TableSchema::flat_l2(8)).await.unwrap();

        let index = index(Arc::clone(&store), 8);
        index.build(units(&["甲"]), 1).await.unwrap();
        let current = index.build(units(&["乙"]), 2).await.unwrap();

        assert_eq!(index.prune(&current).await, 2);
        assert_eq!(
            store.table_names(),
            vec!["hr_2".to_string(), "hr_notes".to_string(), "hrx_1".to_string()]
        );
    }
}
