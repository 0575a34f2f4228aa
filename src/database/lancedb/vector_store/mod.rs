
use arrow::array::RecordBatchIterator;
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::index::Index;
use lancedb::index::scalar::BTreeIndexBuilder;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType, Table};
use std::path::Path;
use tracing::{debug, info, warn};

use super::{
    DISTANCE_COLUMN, VECTOR_COLUMN, create_schema, parse_scored_batch, points_to_batch,
    schema_dimension, split_filter, sql_literal,
};
use crate::database::vector::{
    CollectionStatus, IndexPoint, PayloadFilter, ScoredPoint, VectorIndex, collection_name, rank,
};
use crate::{LoreError, Result};

/// Vector index backed by an embedded LanceDB directory
#[derive(Clone)]
pub struct VectorStore {
    connection: Connection,
}

impl std::fmt::Debug for VectorStore {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStore")
            .field("uri", &self.connection.uri())
            .finish()
    }
}

impl VectorStore {
    /// Open (creating if needed) the LanceDB directory at `path`
    #[inline]
    pub async fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path).map_err(|e| {
            LoreError::Index(format!("Failed to create vector database directory: {}", e))
        })?;

        let uri = path.display().to_string();
        debug!("Connecting to LanceDB at {}", uri);

        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| LoreError::Index(format!("Failed to connect to LanceDB: {}", e)))?;

        Ok(Self { connection })
    }

    async fn open_table_if_exists(&self, name: &str) -> Result<Option<Table>> {
        if !self.table_exists(name).await? {
            return Ok(None);
        }

        let table = self
            .connection
            .open_table(name)
            .execute()
            .await
            .map_err(|e| LoreError::Index(format!("Failed to open table {}: {}", name, e)))?;
        Ok(Some(table))
    }

    async fn table_exists(&self, name: &str) -> Result<bool> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| LoreError::Index(format!("Failed to list tables: {}", e)))?;
        Ok(table_names.iter().any(|existing| existing == name))
    }

    async fn table_dimension(table: &Table) -> Result<usize> {
        let schema = table
            .schema()
            .await
            .map_err(|e| LoreError::Index(format!("Failed to get table schema: {}", e)))?;

        schema_dimension(&schema).ok_or_else(|| {
            LoreError::Index(format!(
                "Table {} has no fixed-size vector column",
                table.name()
            ))
        })
    }

    async fn create_table(&self, name: &str, vector_size: usize) -> Result<()> {
        self.connection
            .create_empty_table(name, create_schema(vector_size)?)
            .execute()
            .await
            .map_err(|e| LoreError::Index(format!("Failed to create table {}: {}", name, e)))?;
        Ok(())
    }

    async fn drop_table(&self, name: &str) -> Result<()> {
        self.connection
            .drop_table(name)
            .await
            .map_err(|e| LoreError::Index(format!("Failed to drop table {}: {}", name, e)))
    }

    /// Build the scalar index on `doc_id` once the table holds data
    async fn ensure_document_index(table: &Table) {
        let has_index = match table.list_indices().await {
            Ok(indices) => indices
                .iter()
                .any(|index| index.columns.iter().any(|column| column == "doc_id")),
            Err(e) => {
                warn!("Could not list indices on {}: {}", table.name(), e);
                return;
            }
        };
        if has_index {
            return;
        }

        match table
            .create_index(&["doc_id"], Index::BTree(BTreeIndexBuilder::default()))
            .execute()
            .await
        {
            Ok(()) => debug!("Created doc_id index on {}", table.name()),
            Err(e) => warn!("Could not create doc_id index on {}: {}", table.name(), e),
        }
    }
}

#[async_trait]
impl VectorIndex for VectorStore {
    #[inline]
    async fn ensure_collection(
        &self,
        kb_id: &str,
        vector_size: usize,
    ) -> Result<CollectionStatus> {
        let name = collection_name(kb_id);

        let status = match self.open_table_if_exists(&name).await? {
            Some(table) => {
                let existing = Self::table_dimension(&table).await?;
                if existing == vector_size {
                    debug!("Collection {} already has {} dimensions", name, vector_size);
                    return Ok(CollectionStatus::Unchanged);
                }

                warn!(
                    "Collection {} has {} dimensions but {} were requested, recreating",
                    name, existing, vector_size
                );
                self.drop_table(&name).await?;
                CollectionStatus::Recreated { previous: existing }
            }
            None => CollectionStatus::Created,
        };

        self.create_table(&name, vector_size).await?;
        info!("Collection {} ready with {} dimensions", name, vector_size);
        Ok(status)
    }

    #[inline]
    async fn delete_collection(&self, kb_id: &str) -> Result<bool> {
        let name = collection_name(kb_id);
        if !self.table_exists(&name).await? {
            return Ok(false);
        }

        self.drop_table(&name).await?;
        info!("Dropped collection {}", name);
        Ok(true)
    }

    #[inline]
    async fn upsert(&self, kb_id: &str, points: Vec<IndexPoint>) -> Result<()> {
        let name = collection_name(kb_id);
        let table = self
            .open_table_if_exists(&name)
            .await?
            .ok_or_else(|| LoreError::Index(format!("Collection {} does not exist", name)))?;

        if points.is_empty() {
            return Ok(());
        }

        let dimension = Self::table_dimension(&table).await?;
        let batch = points_to_batch(kb_id, dimension, &points)?;
        let schema = batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(batch)), schema);

        let mut merge = table.merge_insert(&["id"]);
        merge
            .when_matched_update_all(None)
            .when_not_matched_insert_all();
        merge
            .execute(Box::new(reader))
            .await
            .map_err(|e| LoreError::Index(format!("Failed to upsert into {}: {}", name, e)))?;

        debug!("Upserted {} points into {}", points.len(), name);
        Self::ensure_document_index(&table).await;
        Ok(())
    }

    #[inline]
    async fn search(
        &self,
        kb_id: &str,
        query: &[f32],
        top_k: usize,
        filter: Option<&PayloadFilter>,
    ) -> Result<Vec<ScoredPoint>> {
        let name = collection_name(kb_id);
        let Some(table) = self.open_table_if_exists(&name).await? else {
            debug!("Search against missing collection {}", name);
            return Ok(Vec::new());
        };
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let dimension = Self::table_dimension(&table).await?;
        if query.len() != dimension {
            return Err(LoreError::Index(format!(
                "Query has {} dimensions, collection {} expects {}",
                query.len(),
                name,
                dimension
            )));
        }

        let (predicate, residual) =
            filter.map_or_else(|| (None, PayloadFilter::new()), split_filter);

        // Residual criteria are applied after decoding, so widen the candidate set
        let limit = if residual.is_empty() {
            top_k
        } else {
            table
                .count_rows(predicate.clone())
                .await
                .map_err(|e| LoreError::Index(format!("Failed to count rows: {}", e)))?
                .max(top_k)
        };

        let mut vector_query = table
            .vector_search(query)
            .map_err(|e| LoreError::Index(format!("Failed to create vector search: {}", e)))?
            .column(VECTOR_COLUMN)
            .distance_type(DistanceType::Cosine)
            .limit(limit);
        if let Some(predicate) = predicate {
            debug!("Search predicate on {}: {}", name, predicate);
            vector_query = vector_query.only_if(predicate);
        }

        let mut stream = vector_query
            .execute()
            .await
            .map_err(|e| LoreError::Index(format!("Failed to execute search: {}", e)))?;

        let mut hits = Vec::new();
        while let Some(batch) = stream
            .try_next()
            .await
            .map_err(|e| LoreError::Index(format!("Failed to read result stream: {}", e)))?
        {
            if batch.column_by_name(DISTANCE_COLUMN).is_none() {
                warn!("Search results from {} carry no distance column", name);
            }
            hits.extend(
                parse_scored_batch(&batch)?
                    .into_iter()
                    .filter(|hit| residual.matches(&hit.payload)),
            );
        }

        debug!("Search in {} returned {} hits", name, hits.len());
        Ok(rank(hits, top_k))
    }

    #[inline]
    async fn delete_points_for_document(&self, kb_id: &str, doc_id: &str) -> Result<()> {
        let name = collection_name(kb_id);
        let Some(table) = self.open_table_if_exists(&name).await? else {
            return Ok(());
        };

        let predicate = format!("doc_id = {}", sql_literal(doc_id));
        table
            .delete(&predicate)
            .await
            .map_err(|e| LoreError::Index(format!("Failed to delete points: {}", e)))?;

        info!("Deleted points for document {} from {}", doc_id, name);
        Ok(())
    }

    #[inline]
    async fn collection_dimension(&self, kb_id: &str) -> Result<Option<usize>> {
        match self.open_table_if_exists(&collection_name(kb_id)).await? {
            Some(table) => Ok(Some(Self::table_dimension(&table).await?)),
            None => Ok(None),
        }
    }

    #[inline]
    async fn count_points(&self, kb_id: &str) -> Result<usize> {
        match self.open_table_if_exists(&collection_name(kb_id)).await? {
            Some(table) => table
                .count_rows(None)
                .await
                .map_err(|e| LoreError::Index(format!("Failed to count rows: {}", e))),
            None => Ok(0),
        }
    }
}
