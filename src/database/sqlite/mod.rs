use anyhow::Context;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use tracing::{debug, info};

use crate::database::sqlite::models::{
    Chunk, Document, KnowledgeBase, NewChunk, NewDocument, NewKnowledgeBase,
};
use crate::database::sqlite::queries::{ChunkQueries, DocumentQueries, KnowledgeBaseQueries};
use crate::{LoreError, Result};


pub mod models;
pub mod queries;

pub type DbPool = Pool<Sqlite>;

/// File name of the record store inside a data directory
pub const DATABASE_FILE_NAME: &str = "metadata.db";

/// Record store for knowledge bases, documents and chunks
#[derive(Debug, Clone)]
pub struct Database {
    pool: DbPool,
}

fn database_error(error: anyhow::Error) -> LoreError {
    LoreError::Database(format!("{:#}", error))
}

impl Database {
    #[inline]
    pub async fn new<P: AsRef<Path>>(database_path: P) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .context("Failed to create database connection pool")
            .map_err(database_error)?;

        let database = Self { pool };
        database.run_migrations().await?;

        Ok(database)
    }

    #[inline]
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    #[inline]
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("src/database/sqlite/migrations")
            .run(&self.pool)
            .await
            .context("Failed to run schema migration")
            .map_err(database_error)?;

        debug!("Database migrations completed successfully");
        Ok(())
    }

    /// Open the database file, creating its parent directory first
    #[inline]
    pub async fn open(database_path: &Path) -> Result<Self> {
        if let Some(parent) = database_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                LoreError::Database(format!(
                    "Failed to create database directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        Self::new(database_path).await
    }

    #[inline]
    pub async fn initialize_from_config_dir(config_dir: &Path) -> Result<Self> {
        Self::open(&config_dir.join(DATABASE_FILE_NAME)).await
    }

    // Knowledge base operations
    #[inline]
    pub async fn create_knowledge_base(&self, new_kb: NewKnowledgeBase) -> Result<KnowledgeBase> {
        KnowledgeBaseQueries::create(&self.pool, new_kb)
            .await
            .map_err(database_error)
    }

    #[inline]
    pub async fn list_knowledge_bases(&self) -> Result<Vec<KnowledgeBase>> {
        KnowledgeBaseQueries::list_all(&self.pool)
            .await
            .map_err(database_error)
    }

    #[inline]
    pub async fn get_knowledge_base(&self, id: &str) -> Result<Option<KnowledgeBase>> {
        KnowledgeBaseQueries::get_by_id(&self.pool, id)
            .await
            .map_err(database_error)
    }

    /// Like `get_knowledge_base`, but absence is an error
    #[inline]
    pub async fn require_knowledge_base(&self, id: &str) -> Result<KnowledgeBase> {
        self.get_knowledge_base(id)
            .await?
            .ok_or_else(|| LoreError::not_found("Knowledge base", id))
    }

    #[inline]
    pub async fn delete_knowledge_base(&self, id: &str) -> Result<bool> {
        KnowledgeBaseQueries::delete(&self.pool, id)
            .await
            .map_err(database_error)
    }

    // Document operations
    #[inline]
    pub async fn create_document_with_chunks(
        &self,
        new_doc: &NewDocument,
        chunks: &[NewChunk],
    ) -> Result<Document> {
        DocumentQueries::create_with_chunks(&self.pool, new_doc, chunks)
            .await
            .map_err(database_error)
    }

    #[inline]
    pub async fn get_document(&self, id: &str) -> Result<Option<Document>> {
        DocumentQueries::get_by_id(&self.pool, id)
            .await
            .map_err(database_error)
    }

    #[inline]
    pub async fn require_document(&self, id: &str) -> Result<Document> {
        self.get_document(id)
            .await?
            .ok_or_else(|| LoreError::not_found("Document", id))
    }

    #[inline]
    pub async fn list_documents(&self, kb_id: &str) -> Result<Vec<Document>> {
        DocumentQueries::list_by_knowledge_base(&self.pool, kb_id)
            .await
            .map_err(database_error)
    }

    #[inline]
    pub async fn delete_document(&self, id: &str) -> Result<bool> {
        DocumentQueries::delete(&self.pool, id)
            .await
            .map_err(database_error)
    }

    // Chunk operations
    #[inline]
    pub async fn get_chunk(&self, id: &str) -> Result<Option<Chunk>> {
        ChunkQueries::get_by_id(&self.pool, id)
            .await
            .map_err(database_error)
    }

    #[inline]
    pub async fn list_chunks(&self, doc_id: &str) -> Result<Vec<Chunk>> {
        ChunkQueries::list_by_document(&self.pool, doc_id)
            .await
            .map_err(database_error)
    }

    #[inline]
    pub async fn count_chunks_for_document(&self, doc_id: &str) -> Result<i64> {
        ChunkQueries::count_by_document(&self.pool, doc_id)
            .await
            .map_err(database_error)
    }

    #[inline]
    pub async fn count_chunks_for_knowledge_base(&self, kb_id: &str) -> Result<i64> {
        ChunkQueries::count_by_knowledge_base(&self.pool, kb_id)
            .await
            .map_err(database_error)
    }
}
