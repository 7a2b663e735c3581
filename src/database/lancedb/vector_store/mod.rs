
use super::ChunkRecord;
use crate::config::Config;
use crate::document::ChunkMetadata;
use crate::{RagError, Result};
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::{Connection, DistanceType, Table};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Vector database store using LanceDB for cosine similarity search
pub struct VectorStore {
    connection: Connection,
    table_name: String,
    vector_dimension: Mutex<usize>,
}

/// Search result from vector similarity search
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub content: String,
    pub metadata: ChunkMetadata,
    /// Cosine distance, 0 for identical direction
    pub distance: f32,
    /// `1 - distance`, clamped to `[0, 1]`
    pub similarity_score: f32,
}

impl VectorStore {
    /// Open the collection under `path`, creating the database and table if needed.
    /// An existing table keeps its vector dimension; a new one uses `default_dimension`.
    #[inline]
    pub async fn new(path: &Path, collection: &str, default_dimension: usize) -> Result<Self> {
        debug!("Initializing LanceDB at path: {:?}", path);

        std::fs::create_dir_all(path).map_err(|e| {
            RagError::Database(format!("Failed to create vector database directory: {}", e))
        })?;

        let uri = format!("file://{}", path.display());
        let connection = lancedb::connect(&uri).execute().await.map_err(|e| {
            error!("Failed to connect to LanceDB: {}", e);
            RagError::Database(format!("Failed to connect to LanceDB: {}", e))
        })?;

        let store = Self {
            connection,
            table_name: collection.to_string(),
            vector_dimension: Mutex::new(default_dimension),
        };
        store.initialize_table(default_dimension).await?;

        info!("Vector store '{}' initialized", collection);
        Ok(store)
    }

    #[inline]
    pub async fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            &config.vector_database_path(),
            &config.storage.collection,
            config.ollama.embedding_dimension as usize,
        )
        .await
    }

    #[inline]
    pub fn collection(&self) -> &str {
        &self.table_name
    }

    #[inline]
    pub async fn vector_dimension(&self) -> usize {
        *self.vector_dimension.lock().await
    }

    async fn initialize_table(&self, default_dimension: usize) -> Result<()> {
        if self.table_exists().await? {
            let dimension = self.detect_existing_vector_dimension().await?;
            *self.vector_dimension.lock().await = dimension;
            info!(
                "Opened existing collection '{}' with {} dimensions",
                self.table_name, dimension
            );
            return Ok(());
        }

        self.create_table(default_dimension).await?;
        info!(
            "Created collection '{}' with {} dimensions",
            self.table_name, default_dimension
        );
        Ok(())
    }

    async fn table_exists(&self) -> Result<bool> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to list tables: {}", e)))?;
        Ok(table_names.contains(&self.table_name))
    }

    async fn create_table(&self, vector_dim: usize) -> Result<()> {
        self.connection
            .create_empty_table(&self.table_name, create_schema(vector_dim)?)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to create table: {}", e)))?;
        Ok(())
    }

    async fn open_table(&self) -> Result<Table> {
        self.connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to open table: {}", e)))
    }

    async fn detect_existing_vector_dimension(&self) -> Result<usize> {
        let schema = self
            .open_table()
            .await?
            .schema()
            .await
            .map_err(|e| RagError::Database(format!("Failed to get table schema: {}", e)))?;

        schema
            .fields()
            .iter()
            .find(|field| field.name() == "vector")
            .and_then(|field| match field.data_type() {
                DataType::FixedSizeList(_, size) => usize::try_from(*size).ok(),
                _ => None,
            })
            .ok_or_else(|| {
                RagError::Database("Could not find vector column or determine dimension".to_string())
            })
    }

    /// Insert records in one batch. All vectors must share one dimension; a
    /// non-empty collection only accepts its existing dimension, an empty one
    /// is recreated to match.
    #[inline]
    pub async fn insert(&self, records: &[ChunkRecord]) -> Result<()> {
        let Some(first) = records.first() else {
            debug!("No records to insert");
            return Ok(());
        };

        let vector_dim = first.vector.len();
        if vector_dim == 0 {
            return Err(RagError::Database("Cannot store empty vectors".to_string()));
        }
        if let Some(bad) = records.iter().find(|r| r.vector.len() != vector_dim) {
            return Err(RagError::Database(format!(
                "Record {} has {} dimensions, expected {}",
                bad.id,
                bad.vector.len(),
                vector_dim
            )));
        }

        let mut current_dim = self.vector_dimension.lock().await;
        if *current_dim != vector_dim {
            let existing = self.count().await?;
            if existing > 0 {
                return Err(RagError::Database(format!(
                    "Vector dimension mismatch: collection '{}' stores {} dimensions, got {}",
                    self.table_name, *current_dim, vector_dim
                )));
            }

            info!(
                "Empty collection switching from {} to {} dimensions",
                *current_dim, vector_dim
            );
            self.drop_table_if_exists().await?;
            self.create_table(vector_dim).await?;
            *current_dim = vector_dim;
        }

        let record_batch = create_record_batch(records, vector_dim)?;
        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);

        self.open_table()
            .await?
            .add(reader)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to insert chunks: {}", e)))?;

        info!("Stored {} chunks in '{}'", records.len(), self.table_name);
        Ok(())
    }

    /// Up to `limit` nearest chunks by cosine distance, nearest first
    #[inline]
    pub async fn query(&self, query_vector: &[f32], limit: usize) -> Result<Vec<SearchResult>> {
        debug!("Searching for similar vectors with limit: {}", limit);

        if limit == 0 || self.count().await? == 0 {
            return Ok(Vec::new());
        }

        let dimension = self.vector_dimension().await;
        if query_vector.len() != dimension {
            return Err(RagError::Database(format!(
                "Query vector has {} dimensions, collection stores {}",
                query_vector.len(),
                dimension
            )));
        }

        let results = self
            .open_table()
            .await?
            .vector_search(query_vector)
            .map_err(|e| RagError::Database(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .distance_type(DistanceType::Cosine)
            .limit(limit)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to execute search: {}", e)))?;

        let mut search_results = Vec::new();
        for batch in collect_batches(results).await? {
            search_results.extend(parse_search_batch(&batch)?);
        }

        debug!("Found {} similar chunks", search_results.len());
        Ok(search_results)
    }

    /// Metadata of every stored chunk
    #[inline]
    pub async fn list_all(&self) -> Result<Vec<ChunkMetadata>> {
        let results = self
            .open_table()
            .await?
            .query()
            .select(Select::columns(&["filename", "page", "chunk_id", "sub_chunk"]))
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to scan table: {}", e)))?;

        let mut metadata = Vec::new();
        for batch in collect_batches(results).await? {
            metadata.extend(parse_metadata_columns(&batch)?);
        }
        Ok(metadata)
    }

    /// Remove every chunk of `filename`, returning how many were removed
    #[inline]
    pub async fn delete_by_filename(&self, filename: &str) -> Result<usize> {
        debug!("Deleting chunks for document: {}", filename);

        let table = self.open_table().await?;
        let predicate = format!("filename = '{}'", filename.replace('\'', "''"));

        let matching = table
            .count_rows(Some(predicate.clone()))
            .await
            .map_err(|e| RagError::Database(format!("Failed to count rows: {}", e)))?;
        if matching == 0 {
            return Ok(0);
        }

        table
            .delete(&predicate)
            .await
            .map_err(|e| RagError::Database(format!("Failed to delete chunks: {}", e)))?;

        info!("Deleted {} chunks for document: {}", matching, filename);
        Ok(matching)
    }

    #[inline]
    pub async fn count(&self) -> Result<usize> {
        self.open_table()
            .await?
            .count_rows(None)
            .await
            .map_err(|e| RagError::Database(format!("Failed to count rows: {}", e)))
    }

    /// True when the collection exists and can be read
    #[inline]
    pub async fn validate_integrity(&self) -> bool {
        debug!("Validating database integrity");

        match self.table_exists().await {
            Ok(true) => {}
            Ok(false) => {
                warn!("Collection '{}' missing during integrity check", self.table_name);
                return false;
            }
            Err(e) => {
                error!("Failed to list tables during integrity check: {}", e);
                return false;
            }
        }

        match self.count().await {
            Ok(count) => {
                debug!("Database integrity check passed, {} rows found", count);
                true
            }
            Err(e) => {
                error!("Integrity check failed: {}", e);
                false
            }
        }
    }

    async fn drop_table_if_exists(&self) -> Result<()> {
        if self.table_exists().await? {
            info!("Dropping collection '{}'", self.table_name);
            self.connection
                .drop_table(&self.table_name)
                .await
                .map_err(|e| RagError::Database(format!("Failed to drop table: {}", e)))?;
        }
        Ok(())
    }
}

fn create_schema(vector_dim: usize) -> Result<Arc<Schema>> {
    Ok(Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, true)),
                list_size(vector_dim)?,
            ),
            false,
        ),
        Field::new("filename", DataType::Utf8, false),
        Field::new("page", DataType::UInt32, true),
        Field::new("chunk_id", DataType::UInt32, false),
        Field::new("sub_chunk", DataType::UInt32, true),
        Field::new("content", DataType::Utf8, false),
        Field::new("created_at", DataType::Utf8, false),
    ])))
}

fn list_size(vector_dim: usize) -> Result<i32> {
    i32::try_from(vector_dim)
        .map_err(|_| RagError::Database(format!("Unsupported vector dimension: {}", vector_dim)))
}

fn create_record_batch(records: &[ChunkRecord], vector_dim: usize) -> Result<RecordBatch> {
    let flat_values = records
        .iter()
        .flat_map(|r| r.vector.iter().copied())
        .collect::<Vec<f32>>();
    let field = Arc::new(Field::new("item", DataType::Float32, true));
    let vector_array = FixedSizeListArray::try_new(
        field,
        list_size(vector_dim)?,
        Arc::new(Float32Array::from(flat_values)),
        None,
    )
    .map_err(|e| RagError::Database(format!("Failed to create vector array: {}", e)))?;

    let arrays: Vec<Arc<dyn Array>> = vec![
        Arc::new(StringArray::from_iter_values(
            records.iter().map(|r| r.id.as_str()),
        )),
        Arc::new(vector_array),
        Arc::new(StringArray::from_iter_values(
            records.iter().map(|r| r.metadata.filename.as_str()),
        )),
        Arc::new(UInt32Array::from(
            records.iter().map(|r| r.metadata.page).collect::<Vec<_>>(),
        )),
        Arc::new(UInt32Array::from(
            records.iter().map(|r| r.metadata.chunk_id).collect::<Vec<_>>(),
        )),
        Arc::new(UInt32Array::from(
            records.iter().map(|r| r.metadata.sub_chunk).collect::<Vec<_>>(),
        )),
        Arc::new(StringArray::from_iter_values(
            records.iter().map(|r| r.content.as_str()),
        )),
        Arc::new(StringArray::from_iter_values(
            records.iter().map(|r| r.created_at.as_str()),
        )),
    ];

    RecordBatch::try_new(create_schema(vector_dim)?, arrays)
        .map_err(|e| RagError::Database(format!("Failed to create record batch: {}", e)))
}

async fn collect_batches(
    results: lancedb::arrow::SendableRecordBatchStream,
) -> Result<Vec<RecordBatch>> {
    results
        .try_collect::<Vec<_>>()
        .await
        .map_err(|e| RagError::Database(format!("Failed to read result stream: {}", e)))
}

fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .ok_or_else(|| RagError::Database(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| RagError::Database(format!("Invalid {} column type", name)))
}

fn optional(values: &UInt32Array, row: usize) -> Option<u32> {
    (!values.is_null(row)).then(|| values.value(row))
}

fn parse_metadata_columns(batch: &RecordBatch) -> Result<Vec<ChunkMetadata>> {
    let filenames = column::<StringArray>(batch, "filename")?;
    let pages = column::<UInt32Array>(batch, "page")?;
    let chunk_ids = column::<UInt32Array>(batch, "chunk_id")?;
    let sub_chunks = column::<UInt32Array>(batch, "sub_chunk")?;

    Ok((0..batch.num_rows())
        .map(|row| ChunkMetadata {
            filename: filenames.value(row).to_string(),
            page: optional(pages, row),
            chunk_id: chunk_ids.value(row),
            sub_chunk: optional(sub_chunks, row),
        })
        .collect())
}

fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<SearchResult>> {
    let metadata = parse_metadata_columns(batch)?;
    let contents = column::<StringArray>(batch, "content")?;
    let distances = column::<Float32Array>(batch, "_distance").ok();

    Ok(metadata
        .into_iter()
        .enumerate()
        .map(|(row, metadata)| {
            let distance = distances
                .filter(|d| !d.is_null(row))
                .map_or(0.0, |d| d.value(row));

            SearchResult {
                content: contents.value(row).to_string(),
                metadata,
                distance,
                similarity_score: (1.0 - distance).clamp(0.0, 1.0),
            }
        })
        .collect())
}
