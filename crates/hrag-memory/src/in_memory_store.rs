use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::RwLock;

use crate::vector_store::{
    FieldValue, ScoredVectorPoint, VectorFilter, VectorPoint, VectorStore, VectorStoreError,
};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

struct StoredPoint {
    vector: Vec<f32>,
    payload: HashMap<String, serde_json::Value>,
}

struct InMemoryCollection {
    vector_size: usize,
    points: HashMap<String, StoredPoint>,
}

/// Process-local [`VectorStore`] with brute-force cosine search.
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, InMemoryCollection>>,
}

impl InMemoryVectorStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }

    /// Number of points stored in `collection`, zero if it does not exist.
    #[must_use]
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .map(|cols| cols.get(collection).map_or(0, |c| c.points.len()))
            .unwrap_or(0)
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryVectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryVectorStore").finish_non_exhaustive()
    }
}

pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn matches_filter(payload: &HashMap<String, serde_json::Value>, filter: &VectorFilter) -> bool {
    let must = filter.must.iter().all(|cond| {
        payload
            .get(&cond.field)
            .is_some_and(|val| field_matches(val, &cond.value))
    });
    let must_not = filter.must_not.iter().any(|cond| {
        payload
            .get(&cond.field)
            .is_some_and(|val| field_matches(val, &cond.value))
    });
    must && !must_not
}

fn field_matches(val: &serde_json::Value, expected: &FieldValue) -> bool {
    match expected {
        FieldValue::Integer(i) => val.as_i64() == Some(*i),
        FieldValue::Text(s) => val.as_str() == Some(s.as_str()),
    }
}

impl VectorStore for InMemoryVectorStore {
    fn ensure_collection(
        &self,
        collection: &str,
        vector_size: u64,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let vector_size = usize::try_from(vector_size)
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            let mut cols = self
                .collections
                .write()
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            cols.entry(collection)
                .or_insert_with(|| InMemoryCollection {
                    vector_size,
                    points: HashMap::new(),
                });
            Ok(())
        })
    }

    fn collection_exists(&self, collection: &str) -> BoxFuture<'_, Result<bool, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let cols = self
                .collections
                .read()
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            Ok(cols.contains_key(&collection))
        })
    }

    fn delete_collection(&self, collection: &str) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let mut cols = self
                .collections
                .write()
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            cols.remove(&collection);
            Ok(())
        })
    }

    fn upsert(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let mut cols = self
                .collections
                .write()
                .map_err(|e| VectorStoreError::Upsert(e.to_string()))?;
            let col = cols.get_mut(&collection).ok_or_else(|| {
                VectorStoreError::Upsert(format!("collection {collection} not found"))
            })?;
            if let Some(bad) = points.iter().find(|p| p.vector.len() != col.vector_size) {
                return Err(VectorStoreError::Upsert(format!(
                    "point {} has dimension {}, collection {collection} expects {}",
                    bad.id,
                    bad.vector.len(),
                    col.vector_size
                )));
            }
            for p in points {
                col.points.insert(
                    p.id,
                    StoredPoint {
                        vector: p.vector,
                        payload: p.payload,
                    },
                );
            }
            Ok(())
        })
    }

    fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: u64,
        filter: Option<VectorFilter>,
    ) -> BoxFuture<'_, Result<Vec<ScoredVectorPoint>, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let cols = self
                .collections
                .read()
                .map_err(|e| VectorStoreError::Search(e.to_string()))?;
            let col = cols.get(&collection).ok_or_else(|| {
                VectorStoreError::Search(format!("collection {collection} not found"))
            })?;

            let empty_filter = VectorFilter::default();
            let f = filter.as_ref().unwrap_or(&empty_filter);

            let mut scored: Vec<ScoredVectorPoint> = col
                .points
                .iter()
                .filter(|(_, sp)| matches_filter(&sp.payload, f))
                .map(|(id, sp)| ScoredVectorPoint {
                    id: id.clone(),
                    score: cosine_similarity(&vector, &sp.vector),
                    payload: sp.payload.clone(),
                })
                .collect();

            scored.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
            scored.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
            Ok(scored)
        })
    }

    fn delete_by_ids(
        &self,
        collection: &str,
        ids: Vec<String>,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            if ids.is_empty() {
                return Ok(());
            }
            let mut cols = self
                .collections
                .write()
                .map_err(|e| VectorStoreError::Delete(e.to_string()))?;
            let col = cols.get_mut(&collection).ok_or_else(|| {
                VectorStoreError::Delete(format!("collection {collection} not found"))
            })?;
            for id in &ids {
                col.points.remove(id);
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_store::FieldCondition;

    fn point(id: &str, vector: Vec<f32>, generation: i64) -> VectorPoint {
        VectorPoint {
            id: id.into(),
            vector,
            payload: HashMap::from([("generation".into(), serde_json::json!(generation))]),
        }
    }

    #[tokio::test]
    async fn ensure_collection_is_idempotent() {
        let store = InMemoryVectorStore::new();
        assert!(!store.collection_exists("chunks").await.unwrap());
        store.ensure_collection("chunks", 3).await.unwrap();
        store.ensure_collection("chunks", 3).await.unwrap();
        assert!(store.collection_exists("chunks").await.unwrap());
    }

    #[tokio::test]
    async fn delete_collection_removes() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection("chunks", 3).await.unwrap();
        store.delete_collection("chunks").await.unwrap();
        assert!(!store.collection_exists("chunks").await.unwrap());
    }

    #[tokio::test]
    async fn search_orders_by_cosine_similarity() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection("chunks", 3).await.unwrap();
        store
            .upsert(
                "chunks",
                vec![
                    point("a", vec![1.0, 0.0, 0.0], 1),
                    point("b", vec![0.6, 0.8, 0.0], 1),
                    point("c", vec![0.0, 0.0, 1.0], 1),
                ],
            )
            .await
            .unwrap();

        let results = store
            .search("chunks", vec![1.0, 0.0, 0.0], 2, None)
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "a");
        assert_eq!(results[1].id, "b");
        assert!((results[0].score - 1.0).abs() < f32::EPSILON);
        assert!((results[1].score - 0.6).abs() < 1e-6);
    }

    #[tokio::test]
    async fn search_filters_by_generation() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection("chunks", 2).await.unwrap();
        store
            .upsert(
                "chunks",
                vec![point("old", vec![1.0, 0.0], 1), point("new", vec![0.9, 0.1], 2)],
            )
            .await
            .unwrap();

        let filter = VectorFilter::must_match("generation", FieldValue::Integer(2));
        let results = store
            .search("chunks", vec![1.0, 0.0], 10, Some(filter))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "new");
    }

    #[tokio::test]
    async fn must_not_excludes_matches() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection("chunks", 2).await.unwrap();
        store
            .upsert(
                "chunks",
                vec![point("a", vec![1.0, 0.0], 1), point("b", vec![1.0, 0.0], 2)],
            )
            .await
            .unwrap();
        let filter = VectorFilter {
            must: vec![],
            must_not: vec![FieldCondition {
                field: "generation".into(),
                value: FieldValue::Integer(1),
            }],
        };
        let results = store
            .search("chunks", vec![1.0, 0.0], 10, Some(filter))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "b");
    }

    #[tokio::test]
    async fn upsert_rejects_wrong_dimension() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection("chunks", 3).await.unwrap();
        let err = store
            .upsert("chunks", vec![point("a", vec![1.0], 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, VectorStoreError::Upsert(_)));
    }

    #[tokio::test]
    async fn upsert_same_id_overwrites() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection("chunks", 2).await.unwrap();
        store
            .upsert("chunks", vec![point("a", vec![1.0, 0.0], 1)])
            .await
            .unwrap();
        store
            .upsert("chunks", vec![point("a", vec![0.0, 1.0], 1)])
            .await
            .unwrap();
        assert_eq!(store.len("chunks"), 1);
    }

    #[tokio::test]
    async fn delete_by_ids_removes_points() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection("chunks", 2).await.unwrap();
        store
            .upsert("chunks", vec![point("a", vec![1.0, 0.0], 1)])
            .await
            .unwrap();
        store.delete_by_ids("chunks", vec!["a".into()]).await.unwrap();
        assert_eq!(store.len("chunks"), 0);
    }

    #[tokio::test]
    async fn search_missing_collection_errors() {
        let store = InMemoryVectorStore::new();
        let err = store.search("nope", vec![1.0], 1, None).await.unwrap_err();
        assert!(matches!(err, VectorStoreError::Search(_)));
    }

    #[test]
    fn cosine_similarity_orthogonal_and_zero() {
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < f32::EPSILON);
        assert!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).abs() < f32::EPSILON);
    }
}
