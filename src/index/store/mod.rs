#[cfg(test)]
mod tests;

use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
    UInt64Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use lancedb::Connection;
use lancedb::query::ExecutableQuery;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use super::{DistanceMetric, IndexEntry, VectorIndex};
use crate::embeddings::{Chunk, ChunkingConfig};
use crate::{AssistError, Result};

const CHUNKS_TABLE: &str = "chunks";
const MANIFEST_TABLE: &str = "manifest";

/// LanceDB database directory holding one persisted index
pub struct IndexStore {
    connection: Connection,
    path: PathBuf,
}

fn index_error(context: &str, error: impl std::fmt::Display) -> AssistError {
    AssistError::Index(format!("{}: {}", context, error))
}

impl IndexStore {
    /// Open `dir`, creating it if needed
    #[inline]
    pub async fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(|e| {
            AssistError::Index(format!(
                "Failed to create index directory {}: {}",
                dir.display(),
                e
            ))
        })?;
        Self::connect(dir).await
    }

    /// Open `dir` only if it already holds a saved index
    #[inline]
    pub async fn open_existing(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(AssistError::NotFound {
                path: dir.to_path_buf(),
            });
        }

        let store = Self::connect(dir).await?;
        let tables = store.table_names().await?;
        if !tables.iter().any(|name| name == CHUNKS_TABLE) {
            return Err(AssistError::NotFound {
                path: dir.to_path_buf(),
            });
        }
        Ok(store)
    }

    async fn connect(dir: &Path) -> Result<Self> {
        let uri = dir.to_string_lossy().into_owned();
        debug!("Connecting to LanceDB at {}", uri);

        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| index_error("Failed to connect to LanceDB", e))?;

        Ok(Self {
            connection,
            path: dir.to_path_buf(),
        })
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn table_names(&self) -> Result<Vec<String>> {
        self.connection
            .table_names()
            .execute()
            .await
            .map_err(|e| index_error("Failed to list tables", e))
    }

    async fn drop_table_if_exists(&self, name: &str) -> Result<()> {
        if self.table_names().await?.iter().any(|t| t == name) {
            debug!("Dropping existing {} table", name);
            self.connection
                .drop_table(name)
                .await
                .map_err(|e| index_error("Failed to drop table", e))?;
        }
        Ok(())
    }

    async fn write_table(&self, name: &str, batch: RecordBatch) -> Result<()> {
        self.drop_table_if_exists(name).await?;

        // Created together with its rows so readers never see an empty table
        let schema = batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(batch)), schema);
        self.connection
            .create_table(name, reader)
            .execute()
            .await
            .map_err(|e| index_error("Failed to create table", e))?;
        Ok(())
    }

    async fn read_table(&self, name: &str) -> Result<Vec<RecordBatch>> {
        let table = self
            .connection
            .open_table(name)
            .execute()
            .await
            .map_err(|e| index_error("Failed to open table", e))?;

        let stream = table
            .query()
            .execute()
            .await
            .map_err(|e| index_error("Failed to scan table", e))?;

        stream
            .try_collect()
            .await
            .map_err(|e| index_error("Failed to read rows", e))
    }

    /// Replace whatever is stored with `index`
    #[inline]
    pub async fn save(&self, index: &VectorIndex) -> Result<()> {
        if index.is_empty() {
            return Err(AssistError::Index(
                "Refusing to save an empty index".to_string(),
            ));
        }

        // Manifest goes first so a half-written save never looks complete
        self.drop_table_if_exists(CHUNKS_TABLE).await?;
        self.write_table(MANIFEST_TABLE, manifest_batch(index)?)
            .await?;
        self.write_table(CHUNKS_TABLE, chunks_batch(index)?).await?;

        info!(
            "Saved {} entries to {}",
            index.len(),
            self.path.display()
        );
        Ok(())
    }

    #[inline]
    pub async fn load(&self) -> Result<VectorIndex> {
        let manifest = parse_manifest(&self.read_table(MANIFEST_TABLE).await?)?;

        let mut rows = Vec::new();
        for batch in self.read_table(CHUNKS_TABLE).await? {
            rows.extend(parse_chunks(&batch, manifest.dimension)?);
        }
        if rows.is_empty() {
            return Err(AssistError::Index(format!(
                "Index at {} has no entries",
                self.path.display()
            )));
        }
        rows.sort_by_key(|(position, _)| *position);

        let entries = rows.into_iter().map(|(_, entry)| entry).collect();
        let mut index = VectorIndex::from_entries(entries, manifest.metric)?
            .with_built_at(manifest.built_at);
        if let Some(chunking) = manifest.chunking {
            index = index.with_chunking(chunking);
        }

        info!(
            "Loaded {} entries from {}",
            index.len(),
            self.path.display()
        );
        Ok(index)
    }
}

fn chunks_schema(dimension: usize) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("position", DataType::UInt64, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, false)),
                dimension as i32,
            ),
            false,
        ),
        Field::new("content", DataType::Utf8, false),
        Field::new("source", DataType::Utf8, false),
        Field::new("page", DataType::UInt32, true),
        Field::new("chunk_index", DataType::UInt32, false),
    ]))
}

fn manifest_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("chunk_size", DataType::UInt64, true),
        Field::new("chunk_overlap", DataType::UInt64, true),
        Field::new("metric", DataType::Utf8, false),
        Field::new("dimension", DataType::UInt64, false),
        Field::new("built_at", DataType::Utf8, false),
    ]))
}

fn chunks_batch(index: &VectorIndex) -> Result<RecordBatch> {
    let entries = index.entries();
    let dimension = index.dimension();

    let positions: Vec<u64> = (0..entries.len() as u64).collect();
    let mut flat_values = Vec::with_capacity(entries.len() * dimension);
    let mut contents = Vec::with_capacity(entries.len());
    let mut sources = Vec::with_capacity(entries.len());
    let mut pages = Vec::with_capacity(entries.len());
    let mut chunk_indices = Vec::with_capacity(entries.len());

    for entry in entries {
        flat_values.extend_from_slice(&entry.vector);
        contents.push(entry.chunk.content.as_str());
        sources.push(entry.chunk.source.to_string_lossy().into_owned());
        pages.push(entry.chunk.page);
        chunk_indices.push(entry.chunk.chunk_index);
    }

    let field = Arc::new(Field::new("item", DataType::Float32, false));
    let vector_array = FixedSizeListArray::try_new(
        field,
        dimension as i32,
        Arc::new(Float32Array::from(flat_values)),
        None,
    )
    .map_err(|e| index_error("Failed to create vector array", e))?;

    let arrays: Vec<Arc<dyn Array>> = vec![
        Arc::new(UInt64Array::from(positions)),
        Arc::new(vector_array),
        Arc::new(StringArray::from(contents)),
        Arc::new(StringArray::from(sources)),
        Arc::new(UInt32Array::from(pages)),
        Arc::new(UInt32Array::from(chunk_indices)),
    ];

    RecordBatch::try_new(chunks_schema(dimension), arrays)
        .map_err(|e| index_error("Failed to create record batch", e))
}

fn manifest_batch(index: &VectorIndex) -> Result<RecordBatch> {
    let chunking = index.chunking();
    let arrays: Vec<Arc<dyn Array>> = vec![
        Arc::new(UInt64Array::from(vec![
            chunking.map(|c| c.chunk_size as u64),
        ])),
        Arc::new(UInt64Array::from(vec![
            chunking.map(|c| c.chunk_overlap as u64),
        ])),
        Arc::new(StringArray::from(vec![index.metric().as_str()])),
        Arc::new(UInt64Array::from(vec![index.dimension() as u64])),
        Arc::new(StringArray::from(vec![index.built_at().to_rfc3339()])),
    ];

    RecordBatch::try_new(manifest_schema(), arrays)
        .map_err(|e| index_error("Failed to create manifest batch", e))
}

#[derive(Debug)]
struct Manifest {
    chunking: Option<ChunkingConfig>,
    metric: DistanceMetric,
    dimension: usize,
    built_at: DateTime<Utc>,
}

fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .ok_or_else(|| AssistError::Index(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| AssistError::Index(format!("Invalid {} column type", name)))
}

fn parse_manifest(batches: &[RecordBatch]) -> Result<Manifest> {
    let batch = batches
        .iter()
        .find(|b| b.num_rows() > 0)
        .ok_or_else(|| AssistError::Index("Index manifest is empty".to_string()))?;

    let chunk_sizes = column::<UInt64Array>(batch, "chunk_size")?;
    let chunk_overlaps = column::<UInt64Array>(batch, "chunk_overlap")?;
    let metrics = column::<StringArray>(batch, "metric")?;
    let dimensions = column::<UInt64Array>(batch, "dimension")?;
    let built_ats = column::<StringArray>(batch, "built_at")?;

    let chunking = if chunk_sizes.is_null(0) || chunk_overlaps.is_null(0) {
        None
    } else {
        Some(ChunkingConfig::new(
            chunk_sizes.value(0) as usize,
            chunk_overlaps.value(0) as usize,
        ))
    };

    let metric = DistanceMetric::parse(metrics.value(0)).ok_or_else(|| {
        AssistError::Index(format!("Unknown distance metric: {}", metrics.value(0)))
    })?;

    let built_at = DateTime::parse_from_rfc3339(built_ats.value(0))
        .map_err(|e| index_error("Invalid built_at timestamp", e))?
        .with_timezone(&Utc);

    Ok(Manifest {
        chunking,
        metric,
        dimension: dimensions.value(0) as usize,
        built_at,
    })
}

fn parse_chunks(batch: &RecordBatch, dimension: usize) -> Result<Vec<(u64, IndexEntry)>> {
    let positions = column::<UInt64Array>(batch, "position")?;
    let vectors = column::<FixedSizeListArray>(batch, "vector")?;
    let contents = column::<StringArray>(batch, "content")?;
    let sources = column::<StringArray>(batch, "source")?;
    let pages = column::<UInt32Array>(batch, "page")?;
    let chunk_indices = column::<UInt32Array>(batch, "chunk_index")?;

    if vectors.value_length() as usize != dimension {
        return Err(AssistError::Index(format!(
            "Stored vectors have dimension {}, manifest says {}",
            vectors.value_length(),
            dimension
        )));
    }

    let mut rows = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let values = vectors.value(row);
        let values = values
            .as_any()
            .downcast_ref::<Float32Array>()
            .ok_or_else(|| AssistError::Index("Invalid vector item type".to_string()))?;

        let chunk = Chunk {
            content: contents.value(row).to_string(),
            source: PathBuf::from(sources.value(row)),
            page: if pages.is_null(row) {
                None
            } else {
                Some(pages.value(row))
            },
            chunk_index: chunk_indices.value(row),
        };

        rows.push((
            positions.value(row),
            IndexEntry {
                vector: values.values().to_vec(),
                chunk,
            },
        ));
    }
    Ok(rows)
}
