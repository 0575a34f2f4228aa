// Indexer module
// Sequences storage, extraction, chunking, embedding and index writes for one document


use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{Config, RetrievalConfig};
use crate::database::sqlite::Database;
use crate::database::sqlite::models::{
    Document, KnowledgeBase, NewChunk, NewDocument, NewKnowledgeBase,
};
use crate::database::vector::{CollectionStatus, IndexPoint, Payload, VectorIndex};
use crate::database::VectorStore;
use crate::embeddings::{
    ChunkingConfig, Embedder, TextChunk, chunk_text, embedder_from_config, validate_embeddings,
};
use crate::extract::{ExtractedDocument, ExtractionError, ExtractorDispatcher};
use crate::retrieval::Retriever;
use crate::storage::FileStore;
use crate::{LoreError, Result};

/// One uploaded file
#[derive(Debug, Clone, PartialEq)]
pub struct IngestRequest {
    pub filename: String,
    pub content_type: Option<String>,
    pub content: Vec<u8>,
    /// Caller-supplied tags carried onto every chunk
    pub metadata: Payload,
}

impl IngestRequest {
    #[inline]
    pub fn new(filename: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content_type: None,
            content,
            metadata: Payload::new(),
        }
    }

    #[inline]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    #[inline]
    pub fn with_metadata(mut self, metadata: Payload) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Result of a successful ingestion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOutcome {
    pub document_id: String,
    pub chunk_count: usize,
    pub vector_dimension: usize,
    pub collection_status: CollectionStatus,
}

/// Whether the vector index followed a record deletion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexCleanup {
    Succeeded,
    /// The records are gone but index points may be orphaned
    Failed(String),
}

impl IndexCleanup {
    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentDeletion {
    pub document_id: String,
    pub chunks_removed: i64,
    pub index_cleanup: IndexCleanup,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnowledgeBaseDeletion {
    pub kb_id: String,
    pub documents_removed: usize,
    pub index_cleanup: IndexCleanup,
}

/// Ingestion orchestrator and owner of the shared pipeline components
pub struct Indexer {
    database: Database,
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    files: FileStore,
    extractors: Arc<ExtractorDispatcher>,
    chunking: ChunkingConfig,
    kb_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Indexer {
    #[inline]
    pub fn new(
        database: Database,
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
        files: FileStore,
        chunking: ChunkingConfig,
    ) -> Self {
        Self {
            database,
            index,
            embedder,
            files,
            extractors: Arc::new(ExtractorDispatcher::new()),
            chunking,
            kb_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Open the record store, LanceDB and file store under the configured base directory
    #[inline]
    pub async fn from_config(config: &Config) -> Result<Self> {
        config
            .validate()
            .map_err(|e| LoreError::Config(e.to_string()))?;

        let database = Database::open(&config.database_path()).await?;
        let index = VectorStore::open(&config.vector_database_path()).await?;
        let embedder = embedder_from_config(config)?;
        let files = FileStore::new(config.files_path());

        info!(
            "Indexer ready in {} using embedding model {}",
            config.get_base_dir().display(),
            embedder.model_name()
        );

        Ok(Self::new(
            database,
            Arc::new(index),
            embedder,
            files,
            config.chunking,
        ))
    }

    #[inline]
    pub fn database(&self) -> &Database {
        &self.database
    }

    #[inline]
    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    #[inline]
    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// A retriever over the same embedder and index used for ingestion
    #[inline]
    pub fn retriever(&self, config: &RetrievalConfig) -> Retriever {
        Retriever::new(Arc::clone(&self.embedder), Arc::clone(&self.index), config)
    }

    #[inline]
    pub async fn create_knowledge_base(
        &self,
        name: &str,
        description: Option<String>,
    ) -> Result<KnowledgeBase> {
        let kb = self
            .database
            .create_knowledge_base(NewKnowledgeBase {
                name: name.to_string(),
                description,
            })
            .await?;
        info!("Created knowledge base {} ({})", kb.name, kb.id);
        Ok(kb)
    }

    #[inline]
    pub async fn list_knowledge_bases(&self) -> Result<Vec<KnowledgeBase>> {
        self.database.list_knowledge_bases().await
    }

    /// Documents of an existing knowledge base
    #[inline]
    pub async fn list_documents(&self, kb_id: &str) -> Result<Vec<Document>> {
        self.database.require_knowledge_base(kb_id).await?;
        self.database.list_documents(kb_id).await
    }

    /// Run one end-to-end ingestion.
    ///
    /// A failing step aborts the rest. Work already done is left in place:
    /// a stored blob without a document, or records without index points.
    #[inline]
    pub async fn ingest(&self, kb_id: &str, request: IngestRequest) -> Result<IngestOutcome> {
        self.database.require_knowledge_base(kb_id).await?;

        let stored = self.files.put(&request.content).await?;
        debug!(
            "Stored '{}' as {} ({} bytes)",
            request.filename, stored.sha256, stored.size
        );

        let extracted = self.extract(&request).await?;
        let chunks = chunk_text(&extracted.text, &self.chunking)?;
        if chunks.is_empty() {
            return Err(ExtractionError::Empty {
                filename: request.filename,
            }
            .into());
        }
        info!(
            "Extracted '{}' as {} into {} chunks",
            request.filename,
            extracted.meta.source_type,
            chunks.len()
        );

        let document_id = Uuid::new_v4().to_string();
        let extraction_meta = extracted.meta.to_map();
        let new_chunks = build_chunks(
            kb_id,
            &document_id,
            &request.filename,
            &extraction_meta,
            &request.metadata,
            &chunks,
        )?;

        let new_document = NewDocument {
            id: document_id.clone(),
            kb_id: kb_id.to_string(),
            filename: request.filename.clone(),
            content_type: request.content_type.clone(),
            sha256: stored.sha256,
            size_bytes: to_i64(stored.size, "file size")?,
            storage_path: stored.locator.display().to_string(),
            extraction_meta,
            user_meta: request.metadata,
        };
        self.database
            .create_document_with_chunks(&new_document, &new_chunks)
            .await?;

        let texts: Vec<String> = new_chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;
        let vector_dimension = validate_embeddings(texts.len(), &vectors)?;
        debug!(
            "Embedded {} chunks with {} ({} dimensions)",
            texts.len(),
            self.embedder.model_name(),
            vector_dimension
        );

        let points: Vec<IndexPoint> = new_chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexPoint {
                id: chunk.id.clone(),
                vector,
                payload: index_payload(kb_id, &document_id, chunk),
            })
            .collect();

        let collection_status = {
            let lock = self.kb_lock(kb_id).await;
            let _guard = lock.lock().await;
            let status = self
                .index
                .ensure_collection(kb_id, vector_dimension)
                .await?;
            if let CollectionStatus::Recreated { previous } = status {
                warn!(
                    "Knowledge base {} changed from {} to {} dimensions, earlier vectors were discarded",
                    kb_id, previous, vector_dimension
                );
            }
            self.index.upsert(kb_id, points).await?;
            status
        };

        info!(
            "Ingested '{}' into knowledge base {} as document {}",
            request.filename, kb_id, document_id
        );

        Ok(IngestOutcome {
            document_id,
            chunk_count: new_chunks.len(),
            vector_dimension,
            collection_status,
        })
    }

    /// Delete a document's records, then best-effort remove its index points
    #[inline]
    pub async fn delete_document(&self, document_id: &str) -> Result<DocumentDeletion> {
        let document = self.database.require_document(document_id).await?;
        let chunks_removed = self.database.count_chunks_for_document(document_id).await?;
        self.database.delete_document(document_id).await?;

        let index_cleanup = {
            let lock = self.kb_lock(&document.kb_id).await;
            let _guard = lock.lock().await;
            cleanup_outcome(
                self.index
                    .delete_points_for_document(&document.kb_id, document_id)
                    .await,
                "document",
                document_id,
            )
        };

        info!(
            "Deleted document {} with {} chunks",
            document_id, chunks_removed
        );
        Ok(DocumentDeletion {
            document_id: document_id.to_string(),
            chunks_removed,
            index_cleanup,
        })
    }

    /// Delete a knowledge base's records, then best-effort drop its collection
    #[inline]
    pub async fn delete_knowledge_base(&self, kb_id: &str) -> Result<KnowledgeBaseDeletion> {
        self.database.require_knowledge_base(kb_id).await?;
        let documents_removed = self.database.list_documents(kb_id).await?.len();
        self.database.delete_knowledge_base(kb_id).await?;

        let index_cleanup = {
            let lock = self.kb_lock(kb_id).await;
            let _guard = lock.lock().await;
            cleanup_outcome(
                self.index.delete_collection(kb_id).await.map(|_| ()),
                "knowledge base",
                kb_id,
            )
        };
        self.kb_locks.lock().await.remove(kb_id);

        info!(
            "Deleted knowledge base {} with {} documents",
            kb_id, documents_removed
        );
        Ok(KnowledgeBaseDeletion {
            kb_id: kb_id.to_string(),
            documents_removed,
            index_cleanup,
        })
    }

    async fn extract(&self, request: &IngestRequest) -> Result<ExtractedDocument> {
        let extractors = Arc::clone(&self.extractors);
        let filename = request.filename.clone();
        let content_type = request.content_type.clone();
        let content = request.content.clone();

        let extracted = tokio::task::spawn_blocking(move || {
            extractors.extract(&filename, content_type.as_deref(), &content)
        })
        .await
        .map_err(|e| ExtractionError::Task(e.to_string()))??;

        Ok(extracted)
    }

    async fn kb_lock(&self, kb_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.kb_locks.lock().await;
        Arc::clone(locks.entry(kb_id.to_string()).or_default())
    }
}

/// Chunk records with their carried metadata. Caller tags override
/// extraction metadata, which overrides the base fields.
fn build_chunks(
    kb_id: &str,
    document_id: &str,
    filename: &str,
    extraction_meta: &Payload,
    user_meta: &Payload,
    chunks: &[TextChunk],
) -> Result<Vec<NewChunk>> {
    chunks
        .iter()
        .map(|chunk| {
            let chunk_index = to_i64(chunk.index, "chunk index")?;
            let mut payload = Payload::new();
            payload.insert("kb_id".to_string(), json!(kb_id));
            payload.insert("doc_id".to_string(), json!(document_id));
            payload.insert("chunk_index".to_string(), json!(chunk_index));
            payload.insert("filename".to_string(), json!(filename));
            payload.extend(extraction_meta.clone());
            payload.extend(user_meta.clone());

            Ok(NewChunk {
                id: Uuid::new_v4().to_string(),
                chunk_index,
                text: chunk.text.clone(),
                start_offset: chunk.start.map(|s| to_i64(s, "offset")).transpose()?,
                end_offset: chunk.end.map(|e| to_i64(e, "offset")).transpose()?,
                payload,
            })
        })
        .collect()
}

/// Index payload: carried metadata plus the ids and text retrieval needs
fn index_payload(kb_id: &str, document_id: &str, chunk: &NewChunk) -> Payload {
    let mut payload = chunk.payload.clone();
    payload.insert("chunk_id".to_string(), json!(chunk.id));
    payload.insert("kb_id".to_string(), json!(kb_id));
    payload.insert("doc_id".to_string(), json!(document_id));
    payload.insert("text".to_string(), json!(chunk.text));
    payload.insert(
        "start".to_string(),
        chunk.start_offset.map_or(Value::Null, Value::from),
    );
    payload.insert(
        "end".to_string(),
        chunk.end_offset.map_or(Value::Null, Value::from),
    );
    payload
}

fn cleanup_outcome(result: Result<()>, entity: &str, id: &str) -> IndexCleanup {
    match result {
        Ok(()) => IndexCleanup::Succeeded,
        Err(e) => {
            warn!(
                "Index cleanup failed for {} {}, points may be orphaned: {}",
                entity, id, e
            );
            IndexCleanup::Failed(e.to_string())
        }
    }
}

fn to_i64<T: TryInto<i64>>(value: T, what: &str) -> Result<i64> {
    value
        .try_into()
        .map_err(|_| LoreError::Other(anyhow::anyhow!("{} does not fit in i64", what)))
}
