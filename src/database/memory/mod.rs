
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::database::vector::{
    CollectionStatus, IndexPoint, PayloadFilter, ScoredPoint, VectorIndex, collection_name,
    cosine_similarity, rank,
};
use crate::{LoreError, Result};

#[derive(Debug, Default)]
struct Collection {
    dimension: usize,
    points: HashMap<String, IndexPoint>,
}

/// Brute-force cosine index held in process memory
#[derive(Debug, Default)]
pub struct MemoryVectorIndex {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryVectorIndex {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorIndex for MemoryVectorIndex {
    #[inline]
    async fn ensure_collection(
        &self,
        kb_id: &str,
        vector_size: usize,
    ) -> Result<CollectionStatus> {
        let name = collection_name(kb_id);
        let mut collections = self.collections.write().await;

        let status = match collections.get(&name) {
            Some(existing) if existing.dimension == vector_size => {
                return Ok(CollectionStatus::Unchanged);
            }
            Some(existing) => CollectionStatus::Recreated {
                previous: existing.dimension,
            },
            None => CollectionStatus::Created,
        };

        info!(
            "Collection {} {:?} with {} dimensions",
            name, status, vector_size
        );
        collections.insert(
            name,
            Collection {
                dimension: vector_size,
                points: HashMap::new(),
            },
        );
        Ok(status)
    }

    #[inline]
    async fn delete_collection(&self, kb_id: &str) -> Result<bool> {
        let removed = self
            .collections
            .write()
            .await
            .remove(&collection_name(kb_id))
            .is_some();
        Ok(removed)
    }

    #[inline]
    async fn upsert(&self, kb_id: &str, points: Vec<IndexPoint>) -> Result<()> {
        let name = collection_name(kb_id);
        let mut collections = self.collections.write().await;
        let collection = collections
            .get_mut(&name)
            .ok_or_else(|| LoreError::Index(format!("Collection {} does not exist", name)))?;

        if let Some(point) = points
            .iter()
            .find(|p| p.vector.len() != collection.dimension)
        {
            return Err(LoreError::Index(format!(
                "Point {} has {} dimensions, collection {} expects {}",
                point.id,
                point.vector.len(),
                name,
                collection.dimension
            )));
        }

        debug!("Upserting {} points into {}", points.len(), name);
        for point in points {
            collection.points.insert(point.id.clone(), point);
        }
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
        let collections = self.collections.read().await;
        let Some(collection) = collections.get(&name) else {
            debug!("Search against missing collection {}", name);
            return Ok(Vec::new());
        };

        if query.len() != collection.dimension {
            return Err(LoreError::Index(format!(
                "Query has {} dimensions, collection {} expects {}",
                query.len(),
                name,
                collection.dimension
            )));
        }

        let hits = collection
            .points
            .values()
            .filter(|point| filter.is_none_or(|f| f.matches(&point.payload)))
            .map(|point| ScoredPoint {
                id: point.id.clone(),
                score: cosine_similarity(query, &point.vector),
                payload: point.payload.clone(),
            })
            .collect();

        Ok(rank(hits, top_k))
    }

    #[inline]
    async fn delete_points_for_document(&self, kb_id: &str, doc_id: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        if let Some(collection) = collections.get_mut(&collection_name(kb_id)) {
            collection.points.retain(|_, point| {
                point.payload.get("doc_id").and_then(|v| v.as_str()) != Some(doc_id)
            });
        }
        Ok(())
    }

    #[inline]
    async fn collection_dimension(&self, kb_id: &str) -> Result<Option<usize>> {
        Ok(self
            .collections
            .read()
            .await
            .get(&collection_name(kb_id))
            .map(|c| c.dimension))
    }

    #[inline]
    async fn count_points(&self, kb_id: &str) -> Result<usize> {
        Ok(self
            .collections
            .read()
            .await
            .get(&collection_name(kb_id))
            .map_or(0, |c| c.points.len()))
    }
}
