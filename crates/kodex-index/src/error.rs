//! Error types for kodex-index.

use std::time::Duration;

use crate::pipeline::RunSummary;

/// Failure reported by a [`VectorStore`](crate::store::VectorStore) call.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Store could not be reached.
    #[error("connection error: {0}")]
    Connection(String),

    /// Call did not finish within the configured per-call timeout.
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),

    /// Collection lifecycle operation was rejected.
    #[error("collection error: {0}")]
    Collection(String),

    /// Upsert was rejected by the store.
    #[error("upsert error: {0}")]
    Upsert(String),

    /// Payload could not be converted to the store's representation.
    #[error("payload error: {0}")]
    Payload(String),
}

impl StoreError {
    /// Connection-class failures worth retrying.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Timeout(_))
    }
}

/// Failure of one vectorization call. Always batch-scoped.
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    #[error("embedding request failed: {0}")]
    Request(String),

    #[error("embedding call timed out after {0:?}")]
    Timeout(Duration),

    #[error("embedding model returned no vectors")]
    Empty,

    #[error("expected {expected} vectors, got {got}")]
    CountMismatch { expected: usize, got: usize },
}

/// Class of a run-level fatal failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Run configuration or ignore spec is unusable.
    InvalidConfig,
    /// Collection could not be deleted or created.
    CollectionSetup,
    /// Store stayed unreachable after retries.
    StoreUnreachable,
    /// Vectors do not have the configured dimension.
    DimensionMismatch,
    /// Worker or task failure inside the pipeline itself.
    Internal,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::InvalidConfig => "invalid configuration",
            Self::CollectionSetup => "collection setup failed",
            Self::StoreUnreachable => "store unreachable",
            Self::DimensionMismatch => "vector dimension mismatch",
            Self::Internal => "internal error",
        })
    }
}

/// Fatal outcome of [`run_ingestion`](crate::pipeline::run_ingestion).
///
/// `progress` holds the counters reached before the run stopped; batches
/// upserted before the failure stay in the store.
#[derive(Debug, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct RunFailure {
    pub kind: FailureKind,
    pub message: String,
    pub progress: RunSummary,
}

impl RunFailure {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>, progress: RunSummary) -> Self {
        Self {
            kind,
            message: message.into(),
            progress,
        }
    }
}
