use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, bail};
use kodex_index::{EmbeddingConfig, IngestConfig, RetryPolicy, StoreConfig};
use kodex_parser::Language;
use serde::{Deserialize, Serialize};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub qdrant: StoreConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub processing: ProcessingConfig,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct InputConfig {
    #[serde(default = "default_source_dir")]
    pub source_dir: PathBuf,
    /// Resolved against `source_dir` when relative.
    #[serde(default = "default_ignore_file")]
    pub ignore_file: PathBuf,
}

fn default_source_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_ignore_file() -> PathBuf {
    PathBuf::from(".ragignore")
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            source_dir: default_source_dir(),
            ignore_file: default_ignore_file(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ProcessingConfig {
    #[serde(default = "default_workers")]
    pub parallel_workers: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Language ids; empty means every supported language.
    #[serde(default)]
    pub languages: Vec<String>,
}

fn default_workers() -> usize {
    std::thread::available_parallelism().map_or(4, std::num::NonZero::get)
}

fn default_queue_capacity() -> usize {
    256
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            parallel_workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            languages: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, falling back to defaults when the
    /// file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).context("failed to read config file")?;
        toml::from_str::<Self>(&content).context("failed to parse config file")
    }

    /// Apply `KODEX_*` environment overrides. Returns one message per
    /// variable whose value was rejected and left unapplied.
    pub fn apply_env_overrides(&mut self) -> Vec<String> {
        let mut rejected = Vec::new();

        if let Ok(v) = std::env::var("KODEX_SOURCE_DIR") {
            self.input.source_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("KODEX_IGNORE_FILE") {
            self.input.ignore_file = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("KODEX_QDRANT_URL") {
            self.qdrant.url = v;
        }
        if let Ok(v) = std::env::var("KODEX_QDRANT_API_KEY") {
            self.qdrant.api_key = Some(v).filter(|k| !k.is_empty());
        }
        if let Ok(v) = std::env::var("KODEX_COLLECTION") {
            self.qdrant.collection_name = v;
        }
        if let Ok(v) = std::env::var("KODEX_EMBEDDING_URL") {
            self.embedding.base_url = v;
        }
        if let Ok(v) = std::env::var("KODEX_EMBEDDING_MODEL") {
            self.embedding.model_name = v;
        }
        if let Some(dimension) = parsed_env("KODEX_EMBEDDING_DIMENSION", &mut rejected) {
            self.embedding.dimension = dimension;
        }
        if let Some(size) = parsed_env("KODEX_BATCH_SIZE", &mut rejected) {
            self.embedding.batch_size = size;
        }
        if let Some(workers) = parsed_env("KODEX_WORKERS", &mut rejected) {
            self.processing.parallel_workers = workers;
        }
        if let Ok(v) = std::env::var("KODEX_LANGUAGES") {
            self.processing.languages = split_list(&v);
        }
        if let Ok(v) = std::env::var("KODEX_LOG_LEVEL") {
            if LOG_LEVELS.contains(&v.to_ascii_lowercase().as_str()) {
                self.logging.level = v.to_ascii_lowercase();
            } else {
                rejected.push(format!("ignoring invalid KODEX_LOG_LEVEL value: {v}"));
            }
        }
        rejected
    }

    /// # Errors
    ///
    /// Returns an error naming the first invalid setting.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.input.source_dir.is_dir() {
            bail!(
                "input.source_dir {} is not a directory",
                self.input.source_dir.display()
            );
        }
        if !(self.qdrant.url.starts_with("http://") || self.qdrant.url.starts_with("https://")) {
            bail!("qdrant.url must be an http(s) URL, got {}", self.qdrant.url);
        }
        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            bail!(
                "logging.level must be one of {}, got {}",
                LOG_LEVELS.join(", "),
                self.logging.level
            );
        }
        if self.embedding.batch_size == 0 {
            bail!("embedding.batch_size must be greater than 0");
        }
        if self.embedding.dimension == 0 {
            bail!("embedding.dimension must be greater than 0");
        }
        if self.processing.parallel_workers == 0 {
            bail!("processing.parallel_workers must be greater than 0");
        }
        if self.processing.queue_capacity == 0 {
            bail!("processing.queue_capacity must be greater than 0");
        }
        if self.retry.max_attempts == 0 {
            bail!("retry.max_attempts must be greater than 0");
        }
        self.languages()?;
        Ok(())
    }

    /// Configured language allowlist.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown language id.
    pub fn languages(&self) -> anyhow::Result<Vec<Language>> {
        self.processing
            .languages
            .iter()
            .map(|id| Language::from_str(id).context("processing.languages"))
            .collect()
    }

    #[must_use]
    pub fn ignore_path(&self) -> PathBuf {
        self.input.source_dir.join(&self.input.ignore_file)
    }

    /// Library run configuration for this file config.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown language id.
    pub fn to_ingest(&self, ignore_spec: String) -> anyhow::Result<IngestConfig> {
        let mut ingest = IngestConfig::new(&self.input.source_dir);
        ingest.ignore_spec = ignore_spec;
        ingest.languages = self.languages()?;
        ingest.workers = self.processing.parallel_workers;
        ingest.queue_capacity = self.processing.queue_capacity;
        ingest.store = self.qdrant.clone();
        ingest.embedding = self.embedding.clone();
        ingest.retry = self.retry;
        Ok(ingest)
    }
}

fn parsed_env<T: FromStr>(key: &str, rejected: &mut Vec<String>) -> Option<T> {
    let v = std::env::var(key).ok()?;
    match v.trim().parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            rejected.push(format!("ignoring invalid {key} value: {v}"));
            None
        }
    }
}

pub fn split_list(v: &str) -> Vec<String> {
    v.split(',')
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
        .collect()
}
