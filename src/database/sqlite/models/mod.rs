
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeBase {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_date: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewKnowledgeBase {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub kb_id: String,
    pub filename: String,
    pub content_type: Option<String>,
    pub sha256: String,
    pub size_bytes: i64,
    pub storage_path: String,
    pub extraction_meta: Map<String, Value>,
    pub user_meta: Map<String, Value>,
    pub created_date: NaiveDateTime,
}

/// Document row to insert; ids are assigned by the caller so chunk
/// payloads can reference them before anything is written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDocument {
    pub id: String,
    pub kb_id: String,
    pub filename: String,
    pub content_type: Option<String>,
    pub sha256: String,
    pub size_bytes: i64,
    pub storage_path: String,
    pub extraction_meta: Map<String, Value>,
    pub user_meta: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub kb_id: String,
    pub doc_id: String,
    pub chunk_index: i64,
    pub text: String,
    pub start_offset: Option<i64>,
    pub end_offset: Option<i64>,
    pub payload: Map<String, Value>,
    pub created_date: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewChunk {
    pub id: String,
    pub chunk_index: i64,
    pub text: String,
    pub start_offset: Option<i64>,
    pub end_offset: Option<i64>,
    pub payload: Map<String, Value>,
}

impl KnowledgeBase {
    pub(crate) fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            created_date: row.try_get("created_date")?,
        })
    }
}

impl Document {
    pub(crate) fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            kb_id: row.try_get("kb_id")?,
            filename: row.try_get("filename")?,
            content_type: row.try_get("content_type")?,
            sha256: row.try_get("sha256")?,
            size_bytes: row.try_get("size_bytes")?,
            storage_path: row.try_get("storage_path")?,
            extraction_meta: decode_json(row, "extraction_meta")?,
            user_meta: decode_json(row, "user_meta")?,
            created_date: row.try_get("created_date")?,
        })
    }
}

impl Chunk {
    pub(crate) fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            kb_id: row.try_get("kb_id")?,
            doc_id: row.try_get("doc_id")?,
            chunk_index: row.try_get("chunk_index")?,
            text: row.try_get("text")?,
            start_offset: row.try_get("start_offset")?,
            end_offset: row.try_get("end_offset")?,
            payload: decode_json(row, "payload")?,
            created_date: row.try_get("created_date")?,
        })
    }
}

pub(crate) fn encode_json(map: &Map<String, Value>) -> Result<String> {
    serde_json::to_string(map).context("Failed to encode JSON column")
}

fn decode_json(row: &SqliteRow, column: &str) -> Result<Map<String, Value>> {
    let raw: String = row.try_get(column)?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to decode JSON column {}", column))
}
