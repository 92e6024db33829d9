use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{RagError, Result};
use crate::http::JsonClient;

/// Turns text into vectors.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts. The default issues one request per text.
    fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

/// Client for the `/embed` model-serving endpoint.
///
/// Every call goes to the network; nothing is cached and nothing is retried.
pub struct HttpEmbedder {
    http: JsonClient,
    url: String,
    dimension: Option<usize>,
}

impl HttpEmbedder {
    pub fn new(url: impl Into<String>, dimension: Option<usize>) -> Result<Self> {
        let http = JsonClient::new().map_err(RagError::EmbeddingService)?;
        Ok(Self { http, url: url.into(), dimension })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        Self::new(cfg.api_url.embed_api_url.clone(), Some(cfg.index().dimension))
    }
}

impl Embedder for HttpEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let res: EmbedResponse = self
            .http
            .post_json(&self.url, &EmbedRequest { text })
            .map_err(RagError::EmbeddingService)?;
        if res.embedding.is_empty() {
            return Err(RagError::EmbeddingService("empty embedding in response".to_string()));
        }
        if let Some(expected) = self.dimension {
            if res.embedding.len() != expected {
                return Err(RagError::EmbeddingService(format!(
                    "expected {} dimensions, got {}",
                    expected,
                    res.embedding.len()
                )));
            }
        }
        Ok(res.embedding)
    }
}
