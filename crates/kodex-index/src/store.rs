//! Vector store abstraction and its Qdrant adapter.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use qdrant_client::{Qdrant, QdrantError};
use qdrant_client::qdrant::{
    CreateCollectionBuilder, Distance, PointStruct, UpsertPointsBuilder, VectorParamsBuilder,
};

use crate::config::{DistanceMetric, StoreConfig};
use crate::error::StoreError;

pub(crate) type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One record written to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub id: u64,
    pub vector: Vec<f32>,
    pub payload: HashMap<String, serde_json::Value>,
}

/// Collection lifecycle and batched upserts.
///
/// Upserts are keyed by point id, so redelivering a batch overwrites rather
/// than duplicates.
pub trait VectorStore: Send + Sync {
    fn list_collections(&self) -> BoxFuture<'_, Result<Vec<String>, StoreError>>;

    /// Remove `name`; succeeds when the collection is already absent.
    fn delete_collection(&self, name: &str) -> BoxFuture<'_, Result<(), StoreError>>;

    fn create_collection(
        &self,
        name: &str,
        dimension: u64,
        distance: DistanceMetric,
    ) -> BoxFuture<'_, Result<(), StoreError>>;

    fn upsert(&self, collection: &str, points: Vec<Point>)
    -> BoxFuture<'_, Result<(), StoreError>>;
}

/// [`VectorStore`] backed by a Qdrant server over gRPC.
#[derive(Clone)]
pub struct QdrantStore {
    client: Qdrant,
    timeout: Duration,
}

impl std::fmt::Debug for QdrantStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QdrantStore")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl QdrantStore {
    /// Build a client for `config.url`. No request is made until first use.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connection`] if the client cannot be configured.
    pub fn new(config: &StoreConfig) -> Result<Self, StoreError> {
        let client = Qdrant::from_url(&config.url)
            .api_key(config.api_key.clone())
            .timeout(config.timeout())
            .build()
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(Self {
            client,
            timeout: config.timeout(),
        })
    }
}

/// gRPC status codes that mean the server could not serve the call right
/// now: cancelled, deadline exceeded, resource exhausted, aborted,
/// unavailable.
const RETRYABLE_CODES: [i32; 5] = [1, 4, 8, 10, 14];

fn status_code(e: &QdrantError) -> Option<i32> {
    match e {
        QdrantError::ResponseError { status } => Some(i32::from(status.code())),
        _ => None,
    }
}

/// Map a client error to [`StoreError::Connection`] when the call may
/// succeed on retry, and to `rejected` otherwise.
fn classify(
    code: Option<i32>,
    message: String,
    rejected: impl FnOnce(String) -> StoreError,
) -> StoreError {
    if code.is_some_and(|c| RETRYABLE_CODES.contains(&c)) {
        StoreError::Connection(message)
    } else {
        rejected(message)
    }
}

fn qdrant_distance(metric: DistanceMetric) -> Distance {
    match metric {
        DistanceMetric::Cosine => Distance::Cosine,
        DistanceMetric::Dot => Distance::Dot,
        DistanceMetric::Euclid => Distance::Euclid,
        DistanceMetric::Manhattan => Distance::Manhattan,
    }
}

fn to_point_struct(point: Point) -> Result<PointStruct, StoreError> {
    let object: serde_json::Map<String, serde_json::Value> = point.payload.into_iter().collect();
    let payload: HashMap<String, qdrant_client::qdrant::Value> =
        serde_json::from_value(serde_json::Value::Object(object))
            .map_err(|e| StoreError::Payload(e.to_string()))?;
    Ok(PointStruct::new(point.id, point.vector, payload))
}

impl VectorStore for QdrantStore {
    fn list_collections(&self) -> BoxFuture<'_, Result<Vec<String>, StoreError>> {
        Box::pin(async move {
            let response = self
                .client
                .list_collections()
                .await
                .map_err(|e| StoreError::Connection(e.to_string()))?;
            Ok(response.collections.into_iter().map(|c| c.name).collect())
        })
    }

    fn delete_collection(&self, name: &str) -> BoxFuture<'_, Result<(), StoreError>> {
        let name = name.to_owned();
        Box::pin(async move {
            self.client
                .delete_collection(name.as_str())
                .await
                .map_err(|e| {
                    classify(status_code(&e), format!("delete {name}: {e}"), StoreError::Collection)
                })?;
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
            self.client
                .create_collection(
                    CreateCollectionBuilder::new(name.as_str())
                        .vectors_config(VectorParamsBuilder::new(dimension, qdrant_distance(distance))),
                )
                .await
                .map_err(|e| {
                    classify(status_code(&e), format!("create {name}: {e}"), StoreError::Collection)
                })?;
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
            let points = points
                .into_iter()
                .map(to_point_struct)
                .collect::<Result<Vec<_>, _>>()?;
            self.client
                .upsert_points(UpsertPointsBuilder::new(collection, points).wait(true))
                .await
                .map_err(|e| classify(status_code(&e), e.to_string(), StoreError::Upsert))?;
            Ok(())
        })
    }
}
