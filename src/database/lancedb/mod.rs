// LanceDB vector database module
// One table per knowledge base; the full payload rides along as JSON


pub mod vector_store;

pub use vector_store::VectorStore;

use arrow::array::{Array, FixedSizeListArray, Float32Array, StringArray, UInt32Array};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use serde_json::Value;
use std::sync::Arc;

use crate::database::vector::{FilterCondition, IndexPoint, Payload, PayloadFilter, ScoredPoint};
use crate::{LoreError, Result};

pub(crate) const VECTOR_COLUMN: &str = "vector";
pub(crate) const DISTANCE_COLUMN: &str = "_distance";

/// Create the table schema for the given vector dimension
#[inline]
pub fn create_schema(vector_dim: usize) -> Result<SchemaRef> {
    let size = i32::try_from(vector_dim)
        .map_err(|_| LoreError::Index(format!("Vector dimension {} is too large", vector_dim)))?;

    Ok(Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new(
            VECTOR_COLUMN,
            DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, false)), size),
            false,
        ),
        Field::new("kb_id", DataType::Utf8, false),
        Field::new("doc_id", DataType::Utf8, false),
        Field::new("chunk_index", DataType::UInt32, true),
        Field::new("text", DataType::Utf8, false),
        Field::new("payload", DataType::Utf8, false),
    ])))
}

/// Read the vector dimension from a table schema
#[inline]
pub fn schema_dimension(schema: &Schema) -> Option<usize> {
    schema
        .field_with_name(VECTOR_COLUMN)
        .ok()
        .and_then(|field| match field.data_type() {
            DataType::FixedSizeList(_, size) => usize::try_from(*size).ok(),
            _ => None,
        })
}

/// Convert points into one record batch for the given knowledge base
#[inline]
pub fn points_to_batch(
    kb_id: &str,
    vector_dim: usize,
    points: &[IndexPoint],
) -> Result<RecordBatch> {
    let len = points.len();
    let mut ids = Vec::with_capacity(len);
    let mut kb_ids = Vec::with_capacity(len);
    let mut doc_ids = Vec::with_capacity(len);
    let mut chunk_indices = Vec::with_capacity(len);
    let mut texts = Vec::with_capacity(len);
    let mut payloads = Vec::with_capacity(len);
    let mut flat_values = Vec::with_capacity(len * vector_dim);

    for point in points {
        if point.vector.len() != vector_dim {
            return Err(LoreError::Index(format!(
                "Point {} has {} dimensions, collection expects {}",
                point.id,
                point.vector.len(),
                vector_dim
            )));
        }

        ids.push(point.id.as_str());
        kb_ids.push(kb_id);
        doc_ids.push(payload_str(&point.payload, "doc_id").unwrap_or_default());
        chunk_indices.push(
            point
                .payload
                .get("chunk_index")
                .and_then(Value::as_u64)
                .and_then(|index| u32::try_from(index).ok()),
        );
        texts.push(payload_str(&point.payload, "text").unwrap_or_default());
        payloads.push(
            serde_json::to_string(&point.payload)
                .map_err(|e| LoreError::Index(format!("Failed to encode payload: {}", e)))?,
        );
        flat_values.extend_from_slice(&point.vector);
    }

    let schema = create_schema(vector_dim)?;
    let size = i32::try_from(vector_dim)
        .map_err(|_| LoreError::Index(format!("Vector dimension {} is too large", vector_dim)))?;
    let field = Arc::new(Field::new("item", DataType::Float32, false));
    let vector_array = FixedSizeListArray::try_new(
        field,
        size,
        Arc::new(Float32Array::from(flat_values)),
        None,
    )
    .map_err(|e| LoreError::Index(format!("Failed to create vector array: {}", e)))?;

    let arrays: Vec<Arc<dyn Array>> = vec![
        Arc::new(StringArray::from(ids)),
        Arc::new(vector_array),
        Arc::new(StringArray::from(kb_ids)),
        Arc::new(StringArray::from(doc_ids)),
        Arc::new(UInt32Array::from(chunk_indices)),
        Arc::new(StringArray::from(texts)),
        Arc::new(StringArray::from(payloads)),
    ];

    RecordBatch::try_new(schema, arrays)
        .map_err(|e| LoreError::Index(format!("Failed to create record batch: {}", e)))
}

/// Parse a search result batch; similarity is `1 - cosine distance`
#[inline]
pub fn parse_scored_batch(batch: &RecordBatch) -> Result<Vec<ScoredPoint>> {
    let ids = string_column(batch, "id")?;
    let payloads = string_column(batch, "payload")?;
    let distances = batch
        .column_by_name(DISTANCE_COLUMN)
        .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

    let mut results = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let payload: Payload = serde_json::from_str(payloads.value(row))
            .map_err(|e| LoreError::Index(format!("Corrupt payload for row {}: {}", row, e)))?;

        let distance = distances.map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) });

        results.push(ScoredPoint {
            id: ids.value(row).to_string(),
            score: 1.0 - distance,
            payload,
        });
    }

    Ok(results)
}

/// Quote a string literal for a LanceDB SQL predicate
#[inline]
pub fn sql_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Split a payload filter into a SQL predicate over mirrored columns and
/// the criteria that must be checked against the decoded payload
#[inline]
pub fn split_filter(filter: &PayloadFilter) -> (Option<String>, PayloadFilter) {
    let mut clauses = Vec::new();
    let mut residual = PayloadFilter::new();

    for (key, condition) in filter.conditions() {
        let column = match key.as_str() {
            "kb_id" | "doc_id" => Some((key.as_str(), ColumnKind::Text)),
            "chunk_id" => Some(("id", ColumnKind::Text)),
            "chunk_index" => Some(("chunk_index", ColumnKind::Unsigned)),
            _ => None,
        };

        let clause = column.and_then(|(column, kind)| condition_clause(column, kind, condition));
        match clause {
            Some(clause) => clauses.push(clause),
            None => residual = residual.with_condition(key.clone(), condition.clone()),
        }
    }

    let predicate = (!clauses.is_empty()).then(|| clauses.join(" AND "));
    (predicate, residual)
}

#[derive(Clone, Copy)]
enum ColumnKind {
    Text,
    Unsigned,
}

fn literal(kind: ColumnKind, value: &Value) -> Option<String> {
    match kind {
        ColumnKind::Text => value.as_str().map(sql_literal),
        ColumnKind::Unsigned => value.as_u64().map(|n| n.to_string()),
    }
}

fn condition_clause(column: &str, kind: ColumnKind, condition: &FilterCondition) -> Option<String> {
    match condition {
        FilterCondition::Exact(value) => {
            literal(kind, value).map(|lit| format!("{} = {}", column, lit))
        }
        FilterCondition::AnyOf(values) if values.is_empty() => None,
        FilterCondition::AnyOf(values) => {
            let literals = values
                .iter()
                .map(|value| literal(kind, value))
                .collect::<Option<Vec<_>>>()?;
            Some(format!("{} IN ({})", column, literals.join(", ")))
        }
    }
}

fn payload_str<'a>(payload: &'a Payload, key: &str) -> Option<&'a str> {
    payload.get(key).and_then(Value::as_str)
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| LoreError::Index(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| LoreError::Index(format!("Invalid {} column type", name)))
}
