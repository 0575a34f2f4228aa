#[cfg(test)]
mod tests;

use super::models::*;
use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

pub struct KnowledgeBaseQueries;

impl KnowledgeBaseQueries {
    #[inline]
    pub async fn create(pool: &SqlitePool, new_kb: NewKnowledgeBase) -> Result<KnowledgeBase> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        sqlx::query(
            "INSERT INTO knowledge_bases (id, name, description, created_date) VALUES (?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&new_kb.name)
        .bind(&new_kb.description)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create knowledge base")?;

        debug!("Created knowledge base {} ({})", new_kb.name, id);

        Self::get_by_id(pool, &id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve created knowledge base"))
    }

    #[inline]
    pub async fn get_by_id(pool: &SqlitePool, id: &str) -> Result<Option<KnowledgeBase>> {
        let row = sqlx::query(
            "SELECT id, name, description, created_date FROM knowledge_bases WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get knowledge base by id")?;

        row.as_ref().map(KnowledgeBase::from_row).transpose()
    }

    #[inline]
    pub async fn list_all(pool: &SqlitePool) -> Result<Vec<KnowledgeBase>> {
        let rows = sqlx::query(
            "SELECT id, name, description, created_date FROM knowledge_bases ORDER BY created_date, name",
        )
        .fetch_all(pool)
        .await
        .context("Failed to list knowledge bases")?;

        rows.iter().map(KnowledgeBase::from_row).collect()
    }

    /// Delete a knowledge base; documents and chunks cascade
    #[inline]
    pub async fn delete(pool: &SqlitePool, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM knowledge_bases WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await
            .context("Failed to delete knowledge base")?;

        Ok(result.rows_affected() > 0)
    }
}

pub struct DocumentQueries;

const DOCUMENT_COLUMNS: &str = "id, kb_id, filename, content_type, sha256, size_bytes, storage_path, extraction_meta, user_meta, created_date";

impl DocumentQueries {
    /// Insert a document and all of its chunks in one transaction
    #[inline]
    pub async fn create_with_chunks(
        pool: &SqlitePool,
        new_doc: &NewDocument,
        chunks: &[NewChunk],
    ) -> Result<Document> {
        let now = Utc::now().naive_utc();
        let mut tx = pool.begin().await.context("Failed to begin transaction")?;

        sqlx::query(
            "INSERT INTO documents (id, kb_id, filename, content_type, sha256, size_bytes, storage_path, extraction_meta, user_meta, created_date)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&new_doc.id)
        .bind(&new_doc.kb_id)
        .bind(&new_doc.filename)
        .bind(&new_doc.content_type)
        .bind(&new_doc.sha256)
        .bind(new_doc.size_bytes)
        .bind(&new_doc.storage_path)
        .bind(encode_json(&new_doc.extraction_meta)?)
        .bind(encode_json(&new_doc.user_meta)?)
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to create document")?;

        for chunk in chunks {
            sqlx::query(
                "INSERT INTO chunks (id, kb_id, doc_id, chunk_index, text, start_offset, end_offset, payload, created_date)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&chunk.id)
            .bind(&new_doc.kb_id)
            .bind(&new_doc.id)
            .bind(chunk.chunk_index)
            .bind(&chunk.text)
            .bind(chunk.start_offset)
            .bind(chunk.end_offset)
            .bind(encode_json(&chunk.payload)?)
            .bind(now)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to create chunk {}", chunk.chunk_index))?;
        }

        tx.commit().await.context("Failed to commit document")?;

        debug!(
            "Created document {} with {} chunks",
            new_doc.id,
            chunks.len()
        );

        Self::get_by_id(pool, &new_doc.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve created document"))
    }

    #[inline]
    pub async fn get_by_id(pool: &SqlitePool, id: &str) -> Result<Option<Document>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM documents WHERE id = ?",
            DOCUMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get document by id")?;

        row.as_ref().map(Document::from_row).transpose()
    }

    #[inline]
    pub async fn list_by_knowledge_base(pool: &SqlitePool, kb_id: &str) -> Result<Vec<Document>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM documents WHERE kb_id = ? ORDER BY created_date, filename",
            DOCUMENT_COLUMNS
        ))
        .bind(kb_id)
        .fetch_all(pool)
        .await
        .context("Failed to list documents")?;

        rows.iter().map(Document::from_row).collect()
    }

    /// Delete a document; its chunks cascade
    #[inline]
    pub async fn delete(pool: &SqlitePool, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await
            .context("Failed to delete document")?;

        Ok(result.rows_affected() > 0)
    }
}

pub struct ChunkQueries;

const CHUNK_COLUMNS: &str =
    "id, kb_id, doc_id, chunk_index, text, start_offset, end_offset, payload, created_date";

impl ChunkQueries {
    #[inline]
    pub async fn get_by_id(pool: &SqlitePool, id: &str) -> Result<Option<Chunk>> {
        let row = sqlx::query(&format!("SELECT {} FROM chunks WHERE id = ?", CHUNK_COLUMNS))
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("Failed to get chunk by id")?;

        row.as_ref().map(Chunk::from_row).transpose()
    }

    #[inline]
    pub async fn list_by_document(pool: &SqlitePool, doc_id: &str) -> Result<Vec<Chunk>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM chunks WHERE doc_id = ? ORDER BY chunk_index",
            CHUNK_COLUMNS
        ))
        .bind(doc_id)
        .fetch_all(pool)
        .await
        .context("Failed to list chunks")?;

        rows.iter().map(Chunk::from_row).collect()
    }

    #[inline]
    pub async fn count_by_document(pool: &SqlitePool, doc_id: &str) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE doc_id = ?")
            .bind(doc_id)
            .fetch_one(pool)
            .await
            .context("Failed to count chunks for document")
    }

    #[inline]
    pub async fn count_by_knowledge_base(pool: &SqlitePool, kb_id: &str) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE kb_id = ?")
            .bind(kb_id)
            .fetch_one(pool)
            .await
            .context("Failed to count chunks for knowledge base")
    }
}
