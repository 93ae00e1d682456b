//! Vectorization client contract and the Ollama adapter.

use std::future::Future;

use ollama_rs::Ollama;
use ollama_rs::generation::embeddings::request::{EmbeddingsInput, GenerateEmbeddingsRequest};

use crate::config::EmbeddingConfig;
use crate::error::EmbedError;

/// Rough budget used to turn a token limit into a character limit.
const CHARS_PER_TOKEN: usize = 4;

/// Turns code texts into fixed-size vectors, one per input, in input order.
pub trait Embedder: Send + Sync {
    /// # Errors
    ///
    /// Returns an [`EmbedError`] when the model cannot be reached or answers
    /// with the wrong number of vectors.
    fn embed_batch(
        &self,
        texts: &[String],
    ) -> impl Future<Output = Result<Vec<Vec<f32>>, EmbedError>> + Send;
}

#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    client: Ollama,
    model: String,
    max_chars: usize,
}

impl OllamaEmbedder {
    #[must_use]
    pub fn new(config: &EmbeddingConfig) -> Self {
        let (host, port) = parse_host_port(&config.base_url);
        Self {
            client: Ollama::new(host, port),
            model: config.model_name.clone(),
            max_chars: config.max_length.saturating_mul(CHARS_PER_TOKEN),
        }
    }
}

impl Embedder for OllamaEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let input: Vec<String> = texts
            .iter()
            .map(|t| truncate_chars(t, self.max_chars).to_owned())
            .collect();
        let request =
            GenerateEmbeddingsRequest::new(self.model.clone(), EmbeddingsInput::Multiple(input));

        let response = self
            .client
            .generate_embeddings(request)
            .await
            .map_err(|e| EmbedError::Request(format!("Ollama embedding request failed: {e}")))?;

        check_count(response.embeddings, texts.len())
    }
}

/// Vectors must pair 1:1 with the texts they were computed for.
pub(crate) fn check_count(vectors: Vec<Vec<f32>>, expected: usize) -> Result<Vec<Vec<f32>>, EmbedError> {
    if vectors.is_empty() && expected > 0 {
        return Err(EmbedError::Empty);
    }
    if vectors.len() != expected {
        return Err(EmbedError::CountMismatch {
            expected,
            got: vectors.len(),
        });
    }
    Ok(vectors)
}

/// Longest prefix of `text` with at most `max_chars` characters.
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    text.char_indices()
        .nth(max_chars)
        .map_or(text, |(idx, _)| &text[..idx])
}

fn parse_host_port(url: &str) -> (String, u16) {
    let url = url.trim_end_matches('/');
    if let Some(colon_pos) = url.rfind(':')
        && let Ok(port) = url[colon_pos + 1..].parse::<u16>()
    {
        return (url[..colon_pos].to_string(), port);
    }
    (url.to_string(), 11434)
}
