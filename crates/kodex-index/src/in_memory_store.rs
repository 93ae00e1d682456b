use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use crate::config::DistanceMetric;
use crate::error::StoreError;
use crate::store::{BoxFuture, Point, VectorStore};

struct StoredPoint {
    vector: Vec<f32>,
    payload: HashMap<String, serde_json::Value>,
}

struct InMemoryCollection {
    dimension: u64,
    distance: DistanceMetric,
    points: BTreeMap<u64, StoredPoint>,
}

/// Process-local [`VectorStore`] for dry runs and tests.
pub struct InMemoryStore {
    collections: RwLock<HashMap<String, InMemoryCollection>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }

    /// Stored point ids of `collection` in ascending order.
    #[must_use]
    pub fn point_ids(&self, collection: &str) -> Vec<u64> {
        self.collections
            .read()
            .ok()
            .and_then(|cols| cols.get(collection).map(|c| c.points.keys().copied().collect()))
            .unwrap_or_default()
    }

    #[must_use]
    pub fn point_count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .ok()
            .and_then(|cols| cols.get(collection).map(|c| c.points.len()))
            .unwrap_or(0)
    }

    #[must_use]
    pub fn payload(&self, collection: &str, id: u64) -> Option<HashMap<String, serde_json::Value>> {
        let cols = self.collections.read().ok()?;
        cols.get(collection)?
            .points
            .get(&id)
            .map(|p| p.payload.clone())
    }

    #[must_use]
    pub fn vector(&self, collection: &str, id: u64) -> Option<Vec<f32>> {
        let cols = self.collections.read().ok()?;
        cols.get(collection)?.points.get(&id).map(|p| p.vector.clone())
    }

    /// Dimension and metric the collection was created with.
    #[must_use]
    pub fn collection_params(&self, collection: &str) -> Option<(u64, DistanceMetric)> {
        let cols = self.collections.read().ok()?;
        cols.get(collection).map(|c| (c.dimension, c.distance))
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore").finish_non_exhaustive()
    }
}

impl VectorStore for InMemoryStore {
    fn list_collections(&self) -> BoxFuture<'_, Result<Vec<String>, StoreError>> {
        Box::pin(async move {
            let cols = self
                .collections
                .read()
                .map_err(|e| StoreError::Connection(e.to_string()))?;
            let mut names: Vec<String> = cols.keys().cloned().collect();
            names.sort();
            Ok(names)
        })
    }

    fn delete_collection(&self, name: &str) -> BoxFuture<'_, Result<(), StoreError>> {
        let name = name.to_owned();
        Box::pin(async move {
            let mut cols = self
                .collections
                .write()
                .map_err(|e| StoreError::Collection(e.to_string()))?;
            cols.remove(&name);
            Ok(())
        })
    }

    fn create_collection(
        &self,
        name: &str,
        dimension: u64,
        distance: DistanceMetric,
    ) -> BoxFuture<'_, Result<(), StoreError>> {
        let name = name.to_owned();
        Box::pin(async move {
            let mut cols = self
                .collections
                .write()
                .map_err(|e| StoreError::Collection(e.to_string()))?;
            if cols.contains_key(&name) {
                return Err(StoreError::Collection(format!(
                    "collection {name} already exists"
                )));
            }
            cols.insert(
                name,
                InMemoryCollection {
                    dimension,
                    distance,
                    points: BTreeMap::new(),
                },
            );
            Ok(())
        })
    }

    fn upsert(
        &self,
        collection: &str,
        points: Vec<Point>,
    ) -> BoxFuture<'_, Result<(), StoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let mut cols = self
                .collections
                .write()
                .map_err(|e| StoreError::Upsert(e.to_string()))?;
            let col = cols.get_mut(&collection).ok_or_else(|| {
                StoreError::Upsert(format!("collection {collection} not found"))
            })?;
            if let Some(bad) = points
                .iter()
                .find(|p| p.vector.len() as u64 != col.dimension)
            {
                return Err(StoreError::Upsert(format!(
                    "point {} has dimension {}, collection expects {}",
                    bad.id,
                    bad.vector.len(),
                    col.dimension
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
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(id: u64, dim: usize) -> Point {
        Point {
            id,
            vector: vec![1.0; dim],
            payload: HashMap::from([("id".to_string(), serde_json::json!(id))]),
        }
    }

    #[tokio::test]
    async fn lifecycle_create_upsert_delete() {
        let store = InMemoryStore::new();
        store
            .create_collection("code", 4, DistanceMetric::Dot)
            .await
            .unwrap();
        assert_eq!(store.list_collections().await.unwrap(), vec!["code"]);
        assert_eq!(store.collection_params("code"), Some((4, DistanceMetric::Dot)));

        store
            .upsert("code", vec![point(1, 4), point(0, 4)])
            .await
            .unwrap();
        assert_eq!(store.point_ids("code"), vec![0, 1]);

        store.delete_collection("code").await.unwrap();
        assert!(store.list_collections().await.unwrap().is_empty());
        // absent collection: still Ok
        store.delete_collection("code").await.unwrap();
    }

    #[tokio::test]
    async fn upsert_overwrites_by_id() {
        let store = InMemoryStore::new();
        store
            .create_collection("code", 2, DistanceMetric::Cosine)
            .await
            .unwrap();
        store.upsert("code", vec![point(3, 2)]).await.unwrap();
        let mut again = point(3, 2);
        again.vector = vec![0.0, 2.0];
        store.upsert("code", vec![again]).await.unwrap();
        assert_eq!(store.point_count("code"), 1);
        assert_eq!(store.vector("code", 3), Some(vec![0.0, 2.0]));
    }

    #[tokio::test]
    async fn upsert_rejects_missing_collection_and_wrong_dimension() {
        let store = InMemoryStore::new();
        let err = store.upsert("nope", vec![point(0, 2)]).await.unwrap_err();
        assert!(matches!(err, StoreError::Upsert(_)));

        store
            .create_collection("code", 3, DistanceMetric::Cosine)
            .await
            .unwrap();
        let err = store.upsert("code", vec![point(0, 2)]).await.unwrap_err();
        assert!(err.to_string().contains("dimension 2"));
        assert_eq!(store.point_count("code"), 0);
    }

    #[tokio::test]
    async fn create_twice_fails() {
        let store = InMemoryStore::new();
        store
            .create_collection("code", 3, DistanceMetric::Cosine)
            .await
            .unwrap();
        let err = store
            .create_collection("code", 3, DistanceMetric::Cosine)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Collection(_)));
    }
}
