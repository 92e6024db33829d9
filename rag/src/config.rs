use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{RagError, Result};

pub const DEFAULT_CONFIG_PATH: &str = "configs/app_config.yaml";

/// Application settings, loaded once per process and shared read-only.
///
/// The layout mirrors `configs/app_config.yaml` section by section.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    pub directories: Directories,
    pub vectordb_config: VectorDbConfig,
    pub embeddings: EmbeddingsConfig,
    pub llm: LlmConfig,
    pub api_url: ApiUrls,
    #[serde(default)]
    pub pinecone: PineconeConfig,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Directories {
    pub documents_dir: PathBuf,
    pub uploaded_documents_dir: PathBuf,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct VectorDbConfig {
    pub text_splitter: TextSplitterConfig,
    pub index: IndexConfig,
    pub retrieved_docs: RetrievedDocsConfig,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
pub struct TextSplitterConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct IndexConfig {
    pub index_name: String,
    pub cloud: String,
    pub region: String,
    #[serde(default = "default_dimension")]
    pub dimension: usize,
    #[serde(default = "default_metric")]
    pub metric: String,
    #[serde(default = "default_ready_timeout_secs")]
    pub ready_timeout_secs: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
pub struct RetrievedDocsConfig {
    pub k: usize,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct EmbeddingsConfig {
    pub embed_model_id: String,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct LlmConfig {
    pub gen_model_id: String,
    pub temperature: f32,
    pub max_new_tokens: u32,
    pub device_map: String,
    pub system_prompt: String,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ApiUrls {
    pub llm_api_url: String,
    pub embed_api_url: String,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct PineconeConfig {
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_control_plane_url")]
    pub control_plane_url: String,
}

impl Default for PineconeConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            control_plane_url: default_control_plane_url(),
        }
    }
}

fn default_dimension() -> usize {
    1024
}

fn default_metric() -> String {
    "cosine".to_string()
}

fn default_ready_timeout_secs() -> u64 {
    300
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_api_key_env() -> String {
    "PINECONE_API_KEY".to_string()
}

fn default_control_plane_url() -> String {
    "https://api.pinecone.io".to_string()
}

impl Config {
    /// Load `.env` (if present) and then the YAML file named by
    /// `RAGCHAT_CONFIG`, falling back to [`DEFAULT_CONFIG_PATH`].
    pub fn from_env() -> Result<Self> {
        Self::load_env_file();
        let path = env::var("RAGCHAT_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load(path)
    }

    /// Load `.env` from the working directory if there is one. Variables
    /// already set in the process environment are kept.
    pub fn load_env_file() {
        let _ = dotenvy::dotenv();
    }

    /// Read and validate the configuration file at `path`.
    ///
    /// `RAGCHAT_LLM_API_URL` and `RAGCHAT_EMBED_API_URL` override the
    /// endpoint URLs from the file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| RagError::ConfigLoad {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let mut cfg = Self::from_yaml_str(&raw, &path.display().to_string())?;
        if let Ok(url) = env::var("RAGCHAT_LLM_API_URL") {
            cfg.api_url.llm_api_url = url;
        }
        if let Ok(url) = env::var("RAGCHAT_EMBED_API_URL") {
            cfg.api_url.embed_api_url = url;
        }
        Ok(cfg)
    }

    /// Parse and validate a YAML document. `origin` only labels errors.
    pub fn from_yaml_str(raw: &str, origin: &str) -> Result<Self> {
        let cfg: Config = serde_yaml::from_str(raw).map_err(|e| RagError::ConfigLoad {
            path: origin.to_string(),
            message: e.to_string(),
        })?;
        cfg.validate().map_err(|message| RagError::ConfigLoad {
            path: origin.to_string(),
            message,
        })?;
        Ok(cfg)
    }

    fn validate(&self) -> std::result::Result<(), String> {
        let splitter = &self.vectordb_config.text_splitter;
        if splitter.chunk_size == 0 {
            return Err("chunk_size must be greater than zero".to_string());
        }
        if splitter.chunk_overlap >= splitter.chunk_size {
            return Err(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                splitter.chunk_overlap, splitter.chunk_size
            ));
        }
        if self.vectordb_config.retrieved_docs.k == 0 {
            return Err("k must be greater than zero".to_string());
        }
        if self.vectordb_config.index.dimension == 0 {
            return Err("index dimension must be greater than zero".to_string());
        }
        if self.llm.temperature <= 0.0 {
            return Err(format!("temperature must be positive, got {}", self.llm.temperature));
        }
        if self.llm.max_new_tokens == 0 {
            return Err("max_new_tokens must be greater than zero".to_string());
        }
        Ok(())
    }

    pub fn chunk_size(&self) -> usize {
        self.vectordb_config.text_splitter.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.vectordb_config.text_splitter.chunk_overlap
    }

    pub fn top_k(&self) -> usize {
        self.vectordb_config.retrieved_docs.k
    }

    pub fn index(&self) -> &IndexConfig {
        &self.vectordb_config.index
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const SAMPLE: &str = r#"
directories:
  documents_dir: data/documents
  uploaded_documents_dir: data/uploaded_documents
vectordb_config:
  text_splitter:
    chunk_size: 1000
    chunk_overlap: 100
  index:
    index_name: rag-chatbot
    cloud: aws
    region: us-east-1
  retrieved_docs:
    k: 3
embeddings:
  embed_model_id: BAAI/bge-large-en-v1.5
llm:
  gen_model_id: google/gemma-3-1b-it
  temperature: 0.2
  max_new_tokens: 512
  device_map: cpu
  system_prompt: You are a helpful assistant.
api_url:
  llm_api_url: http://127.0.0.1:5000/generate
  embed_api_url: http://127.0.0.1:5000/embed
"#;

    #[test]
    fn parses_sample_with_defaults() {
        let cfg = Config::from_yaml_str(SAMPLE, "sample").expect("sample config should parse");
        assert_eq!(cfg.chunk_size(), 1000);
        assert_eq!(cfg.chunk_overlap(), 100);
        assert_eq!(cfg.top_k(), 3);
        assert_eq!(cfg.index().dimension, 1024);
        assert_eq!(cfg.index().metric, "cosine");
        assert_eq!(cfg.pinecone.api_key_env, "PINECONE_API_KEY");
        assert_eq!(cfg.directories.documents_dir, PathBuf::from("data/documents"));
    }

    #[test]
    fn rejects_overlap_not_smaller_than_size() {
        let raw = SAMPLE.replace("chunk_overlap: 100", "chunk_overlap: 1000");
        let err = Config::from_yaml_str(&raw, "sample").expect_err("overlap == size must fail");
        assert!(matches!(err, RagError::ConfigLoad { .. }));
        assert!(err.to_string().contains("chunk_overlap"));
    }

    #[test]
    fn rejects_missing_required_key() {
        let raw = SAMPLE.replace("    region: us-east-1\n", "");
        let err = Config::from_yaml_str(&raw, "sample").expect_err("missing region must fail");
        assert!(matches!(err, RagError::ConfigLoad { .. }));
        assert!(err.to_string().contains("region"));
    }

    #[test]
    fn device_map_is_required() {
        let raw = SAMPLE.replace("  device_map: cpu\n", "");
        let err = Config::from_yaml_str(&raw, "sample").expect_err("missing device_map must fail");
        assert!(matches!(err, RagError::ConfigLoad { .. }));
        assert!(err.to_string().contains("device_map"));
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = Config::load("does/not/exist.yaml").expect_err("missing file must fail");
        assert!(matches!(err, RagError::ConfigLoad { .. }));
    }
}
