//! Ingestion pipeline: scan a source tree, extract code units, embed them in
//! batches and upsert them into a vector store.
//!
//! The single entry point is [`run_ingestion`]. Store and embedding backends
//! sit behind the [`VectorStore`] and [`Embedder`] traits; [`QdrantStore`]
//! and [`OllamaEmbedder`] are the production adapters and [`InMemoryStore`]
//! serves dry runs and tests.

pub mod batcher;
pub mod config;
pub mod embedder;
pub mod error;
pub mod extractor;
pub mod filter;
pub mod in_memory_store;
pub mod payload;
pub mod pipeline;
pub mod retry;
pub mod store;

pub use config::{DistanceMetric, EmbeddingConfig, IngestConfig, StoreConfig};
pub use embedder::{Embedder, OllamaEmbedder};
pub use error::{EmbedError, FailureKind, RunFailure, StoreError};
pub use filter::{Discovered, IgnoreRules, IngestFilter, ScanTarget, SkipReason};
pub use in_memory_store::InMemoryStore;
pub use pipeline::{RunState, RunSummary, run_ingestion};
pub use retry::RetryPolicy;
pub use store::{Point, QdrantStore, VectorStore};
