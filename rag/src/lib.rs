mod answer_query;
mod build_prompt;
mod chat_history;
mod chunk_text;
mod clean_uploads;
mod config;
mod embed_text;
mod error;
mod generate;
mod http;
mod ingest_documents;
mod load_documents;
mod retrieve_chunks;
mod store_pinecone;
mod upload_documents;
mod vector_index;

use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use answer_query::{answer_query, Answer};
pub use build_prompt::{build_prompt_with_context, format_context_from_hits};
pub use chat_history::{ChatHistory, Message, Role};
pub use chunk_text::{chunk_document, Chunk, TextSplitter};
pub use clean_uploads::{remove_uploaded_documents_directory, remove_uploaded_documents_namespace, reset_uploads};
pub use config::{
    ApiUrls, Config, Directories, EmbeddingsConfig, IndexConfig, LlmConfig, PineconeConfig,
    RetrievedDocsConfig, TextSplitterConfig, VectorDbConfig, DEFAULT_CONFIG_PATH,
};
pub use embed_text::{Embedder, HttpEmbedder};
pub use error::{DocumentLoadError, RagError, Result};
pub use generate::{count_tokens, Generation, Generator, HttpGenerator, TokenUsage};
pub use ingest_documents::{document_key, ensure_index, ingest_documents, IngestReport};
pub use load_documents::{load_document, load_documents, Document, LoadedDocuments, Page};
pub use retrieve_chunks::{retrieve_top, Hit};
pub use store_pinecone::PineconeIndex;
pub use upload_documents::{upload_documents, UPLOAD_SUCCESS, UPLOAD_WRONG_NAMESPACE};
pub use vector_index::{
    IndexSpec, IndexStats, InMemoryIndex, Match, Namespace, Record, RecordMetadata, VectorIndex,
};

/// Everything one process needs to ingest and answer: the configuration and
/// the three remote collaborators, each shared behind an `Arc`.
#[derive(Clone)]
pub struct Rag {
    cfg: Arc<Config>,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    index: Arc<dyn VectorIndex>,
}

impl Rag {
    pub fn new(
        cfg: Arc<Config>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        index: Arc<dyn VectorIndex>,
    ) -> Self {
        Self { cfg, embedder, generator, index }
    }

    /// HTTP model clients plus a Pinecone index.
    pub fn from_config(cfg: Arc<Config>) -> Result<Self> {
        let index = Arc::new(PineconeIndex::from_config(&cfg)?);
        Self::with_index(cfg, index)
    }

    /// HTTP model clients plus a process-local index that starts empty.
    pub fn offline(cfg: Arc<Config>) -> Result<Self> {
        Self::with_index(cfg, Arc::new(InMemoryIndex::new()))
    }

    fn with_index(cfg: Arc<Config>, index: Arc<dyn VectorIndex>) -> Result<Self> {
        let embedder = Arc::new(HttpEmbedder::from_config(&cfg)?);
        let generator = Arc::new(HttpGenerator::from_config(&cfg)?);
        Ok(Self::new(cfg, embedder, generator, index))
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn answer(&self, prompt: &str, namespace: Namespace, history: &mut ChatHistory) -> Result<Answer> {
        answer_query(
            &self.cfg,
            self.embedder.as_ref(),
            self.generator.as_ref(),
            self.index.as_ref(),
            prompt,
            namespace.as_str(),
            history,
        )
    }

    pub fn ingest(&self, dir: &Path, namespace: Namespace) -> Result<IngestReport> {
        ingest_documents(&self.cfg, self.embedder.as_ref(), self.index.as_ref(), dir, namespace.as_str())
    }

    /// Ingest `documents_dir` into the pre-processed namespace.
    pub fn ingest_preprocessed(&self) -> Result<IngestReport> {
        self.ingest(&self.cfg.directories.documents_dir, Namespace::Preprocessed)
    }

    pub fn upload(
        &self,
        files: &[PathBuf],
        selected: Namespace,
        history: &mut ChatHistory,
    ) -> Result<Option<IngestReport>> {
        upload_documents(&self.cfg, self.embedder.as_ref(), self.index.as_ref(), files, selected, history)
    }

    pub fn reset_uploads(&self) -> Result<()> {
        reset_uploads(&self.cfg, self.index.as_ref())
    }
}
