use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::chunk_text::{chunk_document, Chunk, TextSplitter};
use crate::config::Config;
use crate::embed_text::Embedder;
use crate::error::{DocumentLoadError, RagError, Result};
use crate::load_documents::load_documents;
use crate::vector_index::{IndexSpec, Record, RecordMetadata, VectorIndex};

/// What one ingestion run wrote and what it skipped.
#[derive(Debug, Default)]
pub struct IngestReport {
    pub namespace: String,
    pub documents: usize,
    pub chunks_written: usize,
    pub failures: Vec<DocumentLoadError>,
}

/// Create the configured index if it does not exist yet and wait until it
/// reports ready.
pub fn ensure_index(cfg: &Config, index: &dyn VectorIndex) -> Result<()> {
    let index_cfg = cfg.index();
    if index.index_exists(&index_cfg.index_name)? {
        return Ok(());
    }

    info!(index = %index_cfg.index_name, "creating vector index");
    let spec = IndexSpec {
        name: index_cfg.index_name.clone(),
        dimension: index_cfg.dimension,
        metric: index_cfg.metric.clone(),
        cloud: index_cfg.cloud.clone(),
        region: index_cfg.region.clone(),
    };
    index.create_index(&spec)?;

    let interval = Duration::from_millis(index_cfg.poll_interval_ms);
    let deadline = Instant::now() + Duration::from_secs(index_cfg.ready_timeout_secs);
    loop {
        if index.is_ready(&spec.name)? {
            info!(index = %spec.name, "vector index ready");
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(RagError::IndexProvisioning {
                index: spec.name,
                message: format!("not ready after {}s", index_cfg.ready_timeout_secs),
            });
        }
        thread::sleep(interval);
    }
}

/// Load, chunk and embed every document in `dir`, then replace the contents
/// of `namespace` with the result.
///
/// Files that fail to load are skipped and listed in the report. Existing
/// entries in the namespace are deleted before the new ones are written, so
/// running this twice over the same directory leaves the same entries.
/// Records whose dimension does not match the index are rejected before
/// anything is deleted.
pub fn ingest_documents(
    cfg: &Config,
    embedder: &dyn Embedder,
    index: &dyn VectorIndex,
    dir: &Path,
    namespace: &str,
) -> Result<IngestReport> {
    ensure_index(cfg, index)?;
    let index_name = &cfg.index().index_name;

    info!(dir = %dir.display(), "loading documents");
    let loaded = load_documents(dir)?;

    info!(documents = loaded.documents.len(), "splitting documents into chunks");
    let splitter = TextSplitter::from_config(cfg);
    let chunks: Vec<Chunk> = loaded
        .documents
        .iter()
        .flat_map(|doc| chunk_document(doc, &splitter))
        .filter(|chunk| !chunk.text.trim().is_empty())
        .collect();

    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let vectors = embedder.embed_many(&texts)?;
    if vectors.len() != chunks.len() {
        return Err(RagError::EmbeddingService(format!(
            "expected {} embeddings, got {}",
            chunks.len(),
            vectors.len()
        )));
    }
    let records: Vec<Record> = chunks.into_iter().zip(vectors).map(|(c, v)| to_record(c, v)).collect();

    let stats = index.describe_index_stats(index_name)?;
    let dimension = if stats.dimension > 0 { stats.dimension } else { cfg.index().dimension };
    if let Some(bad) = records.iter().find(|r| r.values.len() != dimension) {
        warn!(namespace, id = %bad.id, "embedding dimension mismatch, keeping existing entries");
        return Err(RagError::EmbeddingService(format!(
            "record '{}' has dimension {}, index '{}' expects {}",
            bad.id,
            bad.values.len(),
            index_name,
            dimension
        )));
    }

    let existing = stats.vector_count(namespace);
    if existing > 0 {
        info!(namespace, existing, "purging namespace before re-ingestion");
        index.delete_all(index_name, namespace)?;
    }

    info!(namespace, chunks = records.len(), "saving chunks in the vector index");
    index.upsert(index_name, namespace, &records)?;

    Ok(IngestReport {
        namespace: namespace.to_string(),
        documents: loaded.documents.len(),
        chunks_written: records.len(),
        failures: loaded.failures,
    })
}

/// ASCII-only key for a source file name: a readable slug plus the first 12
/// hex digits of the SHA-256 of the full name.
pub fn document_key(source: &str) -> String {
    let mut slug = String::with_capacity(source.len());
    for c in source.chars() {
        if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
            slug.push(c.to_ascii_lowercase());
        } else if c.is_whitespace() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_matches('-');
    let slug = if slug.is_empty() { "doc" } else { slug };
    let digest = format!("{:x}", Sha256::digest(source.as_bytes()));
    format!("{}-{}", slug, &digest[..12])
}

fn record_id(chunk: &Chunk) -> String {
    let key = document_key(&chunk.source_document);
    match chunk.page {
        Some(page) => format!("{}#p{}#c{}", key, page, chunk.chunk_index),
        None => format!("{}#c{}", key, chunk.chunk_index),
    }
}

fn to_record(chunk: Chunk, values: Vec<f32>) -> Record {
    let id = record_id(&chunk);
    debug!(id = %id, start = chunk.start, "prepared record");
    Record {
        id,
        values,
        metadata: RecordMetadata {
            text: chunk.text,
            source: chunk.source_document,
            page: chunk.page,
            chunk_index: chunk.chunk_index,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_keys_are_ascii_and_stable() {
        let key = document_key("Résumé 2024.pdf");
        assert!(key.is_ascii());
        assert!(key.starts_with("rsum-2024.pdf-"));
        assert_eq!(key, document_key("Résumé 2024.pdf"));
        assert_ne!(document_key("résumé.pdf"), document_key("rsum.pdf"));
        assert!(document_key("報告.pdf").starts_with(".pdf-"));
        assert!(document_key("報告").starts_with("doc-"));
    }

    #[test]
    fn record_ids_carry_page_and_chunk() {
        let chunk = Chunk {
            text: "body".to_string(),
            source_document: "a.pdf".to_string(),
            page: Some(2),
            chunk_index: 5,
            start: 0,
        };
        assert_eq!(record_id(&chunk), format!("{}#p2#c5", document_key("a.pdf")));
    }
}
