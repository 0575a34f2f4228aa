// Vector index contract shared by the LanceDB and in-memory backends


use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::Result;

/// Open string-keyed payload stored beside each vector
pub type Payload = Map<String, Value>;

/// One vector to write; `id` is the chunk id
#[derive(Debug, Clone, PartialEq)]
pub struct IndexPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: Payload,
}

/// One search hit, `score` is cosine similarity (higher is better)
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPoint {
    pub id: String,
    pub score: f32,
    pub payload: Payload,
}

/// What `ensure_collection` had to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionStatus {
    Created,
    Unchanged,
    /// The existing collection had another dimensionality and was dropped
    Recreated { previous: usize },
}

/// Per-knowledge-base collection lifecycle plus point operations
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Create the collection, or drop and recreate it if its dimensionality differs
    async fn ensure_collection(&self, kb_id: &str, vector_size: usize)
    -> Result<CollectionStatus>;

    /// Returns whether a collection existed
    async fn delete_collection(&self, kb_id: &str) -> Result<bool>;

    /// Insert or replace points by id. The collection must exist.
    async fn upsert(&self, kb_id: &str, points: Vec<IndexPoint>) -> Result<()>;

    /// Top-k cosine search ordered by descending score.
    /// A missing collection yields no results.
    async fn search(
        &self,
        kb_id: &str,
        query: &[f32],
        top_k: usize,
        filter: Option<&PayloadFilter>,
    ) -> Result<Vec<ScoredPoint>>;

    async fn delete_points_for_document(&self, kb_id: &str, doc_id: &str) -> Result<()>;

    async fn collection_dimension(&self, kb_id: &str) -> Result<Option<usize>>;

    async fn count_points(&self, kb_id: &str) -> Result<usize>;
}

/// Collection name for a knowledge base
#[inline]
pub fn collection_name(kb_id: &str) -> String {
    let sanitized: String = kb_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("kb_{}", sanitized)
}

/// A single payload criterion
#[derive(Debug, Clone, PartialEq)]
pub enum FilterCondition {
    Exact(Value),
    AnyOf(Vec<Value>),
}

impl FilterCondition {
    #[inline]
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            FilterCondition::Exact(expected) => expected == value,
            FilterCondition::AnyOf(options) => options.contains(value),
        }
    }
}

/// Conjunction of payload criteria
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PayloadFilter {
    conditions: Vec<(String, FilterCondition)>,
}

impl PayloadFilter {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a JSON object: arrays mean "any of", anything else an exact match
    #[inline]
    pub fn from_json(object: &Map<String, Value>) -> Self {
        let conditions = object
            .iter()
            .map(|(key, value)| {
                let condition = match value {
                    Value::Array(options) => FilterCondition::AnyOf(options.clone()),
                    other => FilterCondition::Exact(other.clone()),
                };
                (key.clone(), condition)
            })
            .collect();
        Self { conditions }
    }

    #[inline]
    pub fn exact(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions
            .push((key.into(), FilterCondition::Exact(value.into())));
        self
    }

    #[inline]
    pub fn any_of(mut self, key: impl Into<String>, values: Vec<Value>) -> Self {
        self.conditions
            .push((key.into(), FilterCondition::AnyOf(values)));
        self
    }

    #[inline]
    pub fn with_condition(mut self, key: impl Into<String>, condition: FilterCondition) -> Self {
        self.conditions.push((key.into(), condition));
        self
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    #[inline]
    pub fn conditions(&self) -> &[(String, FilterCondition)] {
        &self.conditions
    }

    /// True when every criterion is satisfied; missing keys never match
    #[inline]
    pub fn matches(&self, payload: &Payload) -> bool {
        self.conditions.iter().all(|(key, condition)| {
            payload
                .get(key)
                .is_some_and(|value| condition.accepts(value))
        })
    }
}

/// Cosine similarity; zero-length or zero-norm input scores 0
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0_f32;
    let mut norm_a = 0.0_f32;
    let mut norm_b = 0.0_f32;
    for (x, y) in a.iter().zip(b) {
        dot = x.mul_add(*y, dot);
        norm_a = x.mul_add(*x, norm_a);
        norm_b = y.mul_add(*y, norm_b);
    }

    let denominator = norm_a.sqrt() * norm_b.sqrt();
    if denominator == 0.0 {
        0.0
    } else {
        dot / denominator
    }
}

/// Sort hits by descending score and keep the first `top_k`
#[inline]
pub fn rank(mut hits: Vec<ScoredPoint>, top_k: usize) -> Vec<ScoredPoint> {
    hits.sort_by(|a, b| b.score.total_cmp(&a.score));
    hits.truncate(top_k);
    hits
}
