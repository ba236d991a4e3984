//! LanceDB-backed vector store.

use super::{embedding_of, sort_scored, TableSchema, VectorStore};
use crate::types::{RetrievalUnit, ScoredUnit, UnitKind, UnitMetadata};
use arrow_array::{
    Array, BinaryArray, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator,
    StringArray, UInt64Array,
};
use arrow_schema::{DataType, Field, Schema};
use futures::TryStreamExt;
use hr_core::{AppError, AppResult};
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType, Table};
use std::sync::Arc;
use uuid::Uuid;

const DISTANCE_COLUMN: &str = "_distance";

pub struct LanceDbStore {
    conn: Connection,
    uri: String,
}

impl LanceDbStore {
    /// Connect to a LanceDB database. `uri` is a local directory or a
    /// remote (`db://`, `s3://`) location.
    pub async fn connect(uri: &str) -> AppResult<Self> {
        let conn = lancedb::connect(uri)
            .execute()
            .await
            .map_err(|e| AppError::Store(format!("Failed to connect to LanceDB at {}: {}", uri, e)))?;

        tracing::debug!("Connected to LanceDB at {}", uri);

        Ok(Self {
            conn,
            uri: uri.to_string(),
        })
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    fn create_schema(dimensions: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Binary, false),
            Field::new("text", DataType::Binary, false),
            Field::new(
                "embedding",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    dimensions as i32,
                ),
                false,
            ),
            Field::new("kind", DataType::Utf8, false),
            // Typed unit metadata serialized as JSON
            Field::new("metadata", DataType::Utf8, false),
            Field::new("seq", DataType::UInt64, false),
        ]))
    }

    async fn open(&self, name: &str) -> AppResult<Table> {
        self.conn
            .open_table(name)
            .execute()
            .await
            .map_err(|e| AppError::Store(format!("Failed to open table '{}': {}", name, e)))
    }

    fn dimensions_of(table_schema: &Schema) -> AppResult<usize> {
        match table_schema
            .field_with_name("embedding")
            .map(|f| f.data_type().clone())
        {
            Ok(DataType::FixedSizeList(_, size)) => Ok(size as usize),
            _ => Err(AppError::Store("Table has no fixed-size embedding column".to_string())),
        }
    }

    fn units_to_batch(
        units: &[RetrievalUnit],
        dimensions: usize,
        first_seq: u64,
    ) -> AppResult<RecordBatch> {
        let schema = Self::create_schema(dimensions);

        let mut values = Vec::with_capacity(units.len() * dimensions);
        let mut metadata = Vec::with_capacity(units.len());
        for unit in units {
            values.extend_from_slice(embedding_of(unit, dimensions)?);
            metadata.push(serde_json::to_string(&unit.metadata)?);
        }

        let ids: Vec<&[u8]> = units.iter().map(|u| u.id.as_bytes().as_slice()).collect();
        let texts: Vec<&[u8]> = units.iter().map(|u| u.text.as_bytes()).collect();
        let kinds: Vec<&str> = units.iter().map(|u| u.kind.as_str()).collect();
        let seqs: Vec<u64> = (0..units.len() as u64).map(|i| first_seq + i).collect();

        let embeddings = FixedSizeListArray::try_new(
            Arc::new(Field::new("item", DataType::Float32, true)),
            dimensions as i32,
            Arc::new(Float32Array::from(values)),
            None,
        )
        .map_err(|e| AppError::Store(format!("Failed to create embedding column: {}", e)))?;

        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(BinaryArray::from(ids)),
                Arc::new(BinaryArray::from(texts)),
                Arc::new(embeddings),
                Arc::new(StringArray::from(kinds)),
                Arc::new(StringArray::from(metadata)),
                Arc::new(UInt64Array::from(seqs)),
            ],
        )
        .map_err(|e| AppError::Store(format!("Failed to create RecordBatch: {}", e)))
    }

    fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> AppResult<&'a T> {
        batch
            .column_by_name(name)
            .and_then(|c| c.as_any().downcast_ref::<T>())
            .ok_or_else(|| AppError::Store(format!("Invalid {} column", name)))
    }

    async fn nearest(table: &Table, vector: &[f32], limit: usize) -> AppResult<Vec<ScoredUnit>> {
        let batches = table
            .query()
            .nearest_to(vector.to_vec())
            .map_err(|e| AppError::Store(format!("Failed to create query: {}", e)))?
            .distance_type(DistanceType::L2)
            .bypass_vector_index()
            .limit(limit)
            .execute()
            .await
            .map_err(|e| AppError::Store(format!("Failed to execute search: {}", e)))?
            .try_collect::<Vec<RecordBatch>>()
            .await
            .map_err(|e| AppError::Store(format!("Failed to collect results: {}", e)))?;

        let mut rows = Vec::new();
        for batch in &batches {
            rows.extend(Self::batch_to_scored(batch)?);
        }
        Ok(rows)
    }

    fn batch_to_scored(batch: &RecordBatch) -> AppResult<Vec<ScoredUnit>> {
        let ids = Self::column::<BinaryArray>(batch, "id")?;
        let texts = Self::column::<BinaryArray>(batch, "text")?;
        let embeddings = Self::column::<FixedSizeListArray>(batch, "embedding")?;
        let kinds = Self::column::<StringArray>(batch, "kind")?;
        let metadata = Self::column::<StringArray>(batch, "metadata")?;
        let seqs = Self::column::<UInt64Array>(batch, "seq")?;
        let distances = Self::column::<Float32Array>(batch, DISTANCE_COLUMN)?;

        (0..batch.num_rows())
            .map(|row| {
                let id = Uuid::from_slice(ids.value(row))
                    .map_err(|e| AppError::Store(format!("Invalid unit id: {}", e)))?;
                let text = String::from_utf8(texts.value(row).to_vec())
                    .map_err(|e| AppError::Store(format!("Invalid unit text: {}", e)))?;
                let kind = UnitKind::parse(kinds.value(row)).ok_or_else(|| {
                    AppError::Store(format!("Unknown unit kind '{}'", kinds.value(row)))
                })?;
                let metadata: UnitMetadata = serde_json::from_str(metadata.value(row))?;

                let vector = embeddings.value(row);
                let embedding = vector
                    .as_any()
                    .downcast_ref::<Float32Array>()
                    .map(|v| v.values().to_vec())
                    .ok_or_else(|| AppError::Store("Invalid embedding values".to_string()))?;

                Ok(ScoredUnit {
                    unit: RetrievalUnit {
                        id,
                        text,
                        embedding: Some(embedding),
                        metadata,
                        kind,
                    },
                    distance: distances.value(row),
                    seq: seqs.value(row),
                })
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl VectorStore for LanceDbStore {
    fn backend_name(&self) -> &str {
        "lancedb"
    }

    async fn list_tables(&self) -> AppResult<Vec<String>> {
        let mut names = self
            .conn
            .table_names()
            .execute()
            .await
            .map_err(|e| AppError::Store(format!("Failed to list tables: {}", e)))?;
        names.sort();
        Ok(names)
    }

    async fn drop_table_if_exists(&self, name: &str) -> AppResult<()> {
        let names = self.list_tables().await?;

        if names.iter().any(|n| n == name) {
            self.conn
                .drop_table(name, &[])
                .await
                .map_err(|e| AppError::Store(format!("Failed to drop table '{}': {}", name, e)))?;
            tracing::debug!("Dropped table '{}'", name);
        }
        Ok(())
    }

    async fn create_table(&self, name: &str, schema: &TableSchema) -> AppResult<()> {
        // LanceDB tables without an ANN index are searched exhaustively,
        // which is the flat L2 layout `schema` asks for.
        let arrow_schema = Self::create_schema(schema.dimensions);
        let empty = RecordBatch::new_empty(arrow_schema.clone());

        self.conn
            .create_table(name, RecordBatchIterator::new(vec![Ok(empty)], arrow_schema))
            .execute()
            .await
            .map_err(|e| AppError::Store(format!("Failed to create table '{}': {}", name, e)))?;

        tracing::debug!(dimensions = schema.dimensions, "Created table '{}'", name);
        Ok(())
    }

    async fn insert(&self, name: &str, units: &[RetrievalUnit]) -> AppResult<()> {
        if units.is_empty() {
            return Ok(());
        }

        let table = self.open(name).await?;
        let dimensions = Self::dimensions_of(
            &table
                .schema()
                .await
                .map_err(|e| AppError::Store(format!("Failed to read schema: {}", e)))?,
        )?;
        let first_seq = table
            .count_rows(None)
            .await
            .map_err(|e| AppError::Store(format!("Failed to count rows: {}", e)))?
            as u64;

        let batch = Self::units_to_batch(units, dimensions, first_seq)?;
        let schema = batch.schema();
        table
            .add(RecordBatchIterator::new(vec![Ok(batch)], schema))
            .execute()
            .await
            .map_err(|e| AppError::Store(format!("Failed to insert into '{}': {}", name, e)))?;

        tracing::debug!("Inserted {} units into '{}'", units.len(), name);
        Ok(())
    }

    async fn count_rows(&self, name: &str) -> AppResult<usize> {
        self.open(name)
            .await?
            .count_rows(None)
            .await
            .map_err(|e| AppError::Store(format!("Failed to count rows: {}", e)))
    }

    async fn query(&self, name: &str, vector: &[f32], k: usize) -> AppResult<Vec<ScoredUnit>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let table = self.open(name).await?;

        // LanceDB breaks distance ties arbitrarily at its limit, so widen the
        // fetch until the row after the k-th is strictly farther.
        let mut fetch = k.saturating_mul(2);
        let mut results = loop {
            let mut rows = Self::nearest(&table, vector, fetch).await?;
            sort_scored(&mut rows);
            let exhausted = rows.len() < fetch;
            if exhausted || rows[fetch - 1].distance > rows[k - 1].distance {
                break rows;
            }
            tracing::debug!(fetch, "Distance tie at the limit, widening search");
            fetch = fetch.saturating_mul(2);
        };
        results.truncate(k);

        tracing::debug!("Retrieved {} rows from '{}' (k={})", results.len(), name, k);
        Ok(results)
    }
}
