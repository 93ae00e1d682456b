//! Run configuration threaded into [`run_ingestion`](crate::pipeline::run_ingestion).

use std::path::PathBuf;
use std::time::Duration;

use kodex_parser::Language;
use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

pub const DEFAULT_COLLECTION: &str = "kodex_code_units";

fn default_qdrant_url() -> String {
    "http://localhost:6334".into()
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.into()
}

fn default_store_timeout_secs() -> u64 {
    30
}

fn default_upsert_concurrency() -> usize {
    2
}

fn default_embedding_url() -> String {
    "http://localhost:11434".into()
}

fn default_embedding_model() -> String {
    "nomic-embed-text".into()
}

fn default_dimension() -> u64 {
    768
}

fn default_max_length() -> usize {
    512
}

fn default_batch_size() -> usize {
    8
}

fn default_embedding_timeout_secs() -> u64 {
    60
}

fn default_queue_capacity() -> usize {
    256
}

fn default_workers() -> usize {
    std::thread::available_parallelism().map_or(4, std::num::NonZero::get)
}

/// Similarity metric of the collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    #[default]
    Cosine,
    Dot,
    Euclid,
    Manhattan,
}

impl std::fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Cosine => "cosine",
            Self::Dot => "dot",
            Self::Euclid => "euclid",
            Self::Manhattan => "manhattan",
        })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(default = "default_qdrant_url")]
    pub url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_collection")]
    pub collection_name: String,
    #[serde(default)]
    pub distance: DistanceMetric,
    #[serde(default = "default_store_timeout_secs")]
    pub timeout_secs: u64,
    /// Upserts of different batches allowed in flight at once.
    #[serde(default = "default_upsert_concurrency")]
    pub upsert_concurrency: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: default_qdrant_url(),
            api_key: None,
            collection_name: default_collection(),
            distance: DistanceMetric::default(),
            timeout_secs: default_store_timeout_secs(),
            upsert_concurrency: default_upsert_concurrency(),
        }
    }
}

impl StoreConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_url")]
    pub base_url: String,
    #[serde(default = "default_embedding_model")]
    pub model_name: String,
    /// Vector size; the collection is created with it and every returned
    /// vector must match it.
    #[serde(default = "default_dimension")]
    pub dimension: u64,
    /// Maximum input length in tokens; longer texts are truncated by the client.
    #[serde(default = "default_max_length")]
    pub max_length: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: default_embedding_url(),
            model_name: default_embedding_model(),
            dimension: default_dimension(),
            max_length: default_max_length(),
            batch_size: default_batch_size(),
            timeout_secs: default_embedding_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Everything one ingestion run needs besides its store and embedder.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub source_dir: PathBuf,
    /// Gitignore-style pattern text, matched relative to `source_dir`.
    pub ignore_spec: String,
    /// Language allowlist; empty admits all supported languages.
    pub languages: Vec<Language>,
    pub workers: usize,
    /// Capacity of the scan queue and of the extraction output channel.
    pub queue_capacity: usize,
    pub store: StoreConfig,
    pub embedding: EmbeddingConfig,
    pub retry: RetryPolicy,
}

impl IngestConfig {
    #[must_use]
    pub fn new(source_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            ignore_spec: String::new(),
            languages: Vec::new(),
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            store: StoreConfig::default(),
            embedding: EmbeddingConfig::default(),
            retry: RetryPolicy::default(),
        }
    }

    /// Structural checks performed before anything touches the store.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid setting.
    pub fn validate(&self) -> Result<(), String> {
        if !self.source_dir.is_dir() {
            return Err(format!(
                "source directory {} does not exist",
                self.source_dir.display()
            ));
        }
        let positive = [
            ("embedding.batch_size", self.embedding.batch_size),
            ("processing.parallel_workers", self.workers),
            ("processing.queue_capacity", self.queue_capacity),
            ("qdrant.upsert_concurrency", self.store.upsert_concurrency),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, v)| *v == 0) {
            return Err(format!("{name} must be greater than 0"));
        }
        if self.embedding.dimension == 0 {
            return Err("embedding.dimension must be greater than 0".into());
        }
        if self.retry.max_attempts == 0 {
            return Err("retry.max_attempts must be greater than 0".into());
        }
        if self.store.collection_name.trim().is_empty() {
            return Err("qdrant.collection_name must not be empty".into());
        }
        Ok(())
    }
}
