//! In-process vector store with exhaustive L2 search.

use super::{embedding_of, sort_scored, TableSchema, VectorStore};
use crate::types::{RetrievalUnit, ScoredUnit};
use hr_core::{AppError, AppResult};
use std::collections::HashMap;
use std::sync::RwLock;

struct MemoryTable {
    dimensions: usize,
    rows: Vec<RetrievalUnit>,
}

/// Keeps tables in memory. Used by tests and for throwaway sessions.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<HashMap<String, MemoryTable>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of existing tables, sorted.
    pub fn table_names(&self) -> Vec<String> {
        let tables = self.tables.read().unwrap_or_else(|e| e.into_inner());
        let mut names: Vec<String> = tables.keys().cloned().collect();
        names.sort();
        names
    }
}

fn l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

fn missing(name: &str) -> AppError {
    AppError::Store(format!("Table '{}' does not exist", name))
}

#[async_trait::async_trait]
impl VectorStore for InMemoryStore {
    fn backend_name(&self) -> &str {
        "memory"
    }

    async fn list_tables(&self) -> AppResult<Vec<String>> {
        Ok(self.table_names())
    }

    async fn drop_table_if_exists(&self, name: &str) -> AppResult<()> {
        let mut tables = self.tables.write().unwrap_or_else(|e| e.into_inner());
        tables.remove(name);
        Ok(())
    }

    async fn create_table(&self, name: &str, schema: &TableSchema) -> AppResult<()> {
        let mut tables = self.tables.write().unwrap_or_else(|e| e.into_inner());
        if tables.contains_key(name) {
            return Err(AppError::Store(format!("Table '{}' already exists", name)));
        }
        tables.insert(
            name.to_string(),
            MemoryTable {
                dimensions: schema.dimensions,
                rows: Vec::new(),
            },
        );
        Ok(())
    }

    async fn insert(&self, name: &str, units: &[RetrievalUnit]) -> AppResult<()> {
        let mut tables = self.tables.write().unwrap_or_else(|e| e.into_inner());
        let table = tables.get_mut(name).ok_or_else(|| missing(name))?;
        for unit in units {
            embedding_of(unit, table.dimensions)?;
        }
        table.rows.extend(units.iter().cloned());
        Ok(())
    }

    async fn count_rows(&self, name: &str) -> AppResult<usize> {
        let tables = self.tables.read().unwrap_or_else(|e| e.into_inner());
        tables
            .get(name)
            .map(|t| t.rows.len())
            .ok_or_else(|| missing(name))
    }

    async fn query(&self, name: &str, vector: &[f32], k: usize) -> AppResult<Vec<ScoredUnit>> {
        let tables = self.tables.read().unwrap_or_else(|e| e.into_inner());
        let table = tables.get(name).ok_or_else(|| missing(name))?;

        if vector.len() != table.dimensions {
            return Err(AppError::Store(format!(
                "Query dimension mismatch: expected {}, got {}",
                table.dimensions,
                vector.len()
            )));
        }

        let mut results: Vec<ScoredUnit> = table
            .rows
            .iter()
            .enumerate()
            .filter_map(|(seq, unit)| {
                unit.embedding.as_deref().map(|e| ScoredUnit {
                    unit: unit.clone(),
                    distance: l2(vector, e),
                    seq: seq as u64,
                })
            })
            .collect();

        sort_scored(&mut results);
        results.truncate(k);
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FragmentMetadata, UnitKind};

    fn unit(text: &str, embedding: Vec<f32>) -> RetrievalUnit {
        let metadata = FragmentMetadata {
            file_name: "a.pdf".to_string(),
            ..Default::default()
        }
        .complete();
        let mut unit = RetrievalUnit::new(text, metadata, UnitKind::Base);
        unit.embedding = Some(embedding);
        unit
    }

    #[tokio::test]
    async fn test_ties_broken_by_insertion_order() {
        let store = InMemoryStore::new();
        store.create_table("t", &TableSchema::flat_l2(2)).await.unwrap();
        store
            .insert(
                "t",
                &[
                    unit("first", vec![1.0, 0.0]),
                    unit("second", vec![0.0, 1.0]),
                    unit("nearest", vec![0.1, 0.0]),
                ],
            )
            .await
            .unwrap();

        let results = store.query("t", &[0.0, 0.0], 3).await.unwrap();
        let texts: Vec<&str> = results.iter().map(|r| r.unit.text.as_str()).collect();
        assert_eq!(texts, vec!["nearest", "first", "second"]);
    }

    #[tokio::test]
    async fn test_k_larger_than_table() {
        let store = InMemoryStore::new();
        store.create_table("t", &TableSchema::flat_l2(1)).await.unwrap();
        store.insert("t", &[unit("only", vec![2.0])]).await.unwrap();

        let results = store.query("t", &[0.0], 20).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!((results[0].distance - 2.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_create_existing_table_fails() {
        let store = InMemoryStore::new();
        store.create_table("t", &TableSchema::flat_l2(1)).await.unwrap();
        assert!(store.create_table("t", &TableSchema::flat_l2(1)).await.is_err());

        store.drop_table_if_exists("t").await.unwrap();
        store.drop_table_if_exists("t").await.unwrap();
        assert!(store.table_names().is_empty());
    }

    #[tokio::test]
    async fn test_unembedded_unit_rejected() {
        let store = InMemoryStore::new();
        store.create_table("t", &TableSchema::flat_l2(2)).await.unwrap();
        let mut bare = unit("x", vec![0.0, 0.0]);
        bare.embedding = None;
        assert!(store.insert("t", &[bare]).await.is_err());
        assert_eq!(store.count_rows("t").await.unwrap(), 0);
    }
}
