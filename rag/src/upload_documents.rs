use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::chat_history::ChatHistory;
use crate::config::Config;
use crate::embed_text::Embedder;
use crate::error::{DocumentLoadError, Result};
use crate::ingest_documents::{ingest_documents, IngestReport};
use crate::vector_index::{Namespace, VectorIndex};

pub const UPLOAD_SUCCESS: &str = "The document(s) have been successfully uploaded!";
pub const UPLOAD_WRONG_NAMESPACE: &str =
    "You should first select 'Uploaded document(s)' as the RAG source to upload document(s).";

/// Move `files` into the upload directory and re-ingest that directory into
/// the uploaded-documents namespace.
///
/// Nothing is moved or ingested unless `selected` is [`Namespace::Uploaded`];
/// in that case a hint is appended to `history` and `None` is returned.
pub fn upload_documents(
    cfg: &Config,
    embedder: &dyn Embedder,
    index: &dyn VectorIndex,
    files: &[PathBuf],
    selected: Namespace,
    history: &mut ChatHistory,
) -> Result<Option<IngestReport>> {
    if selected != Namespace::Uploaded {
        history.push_assistant(UPLOAD_WRONG_NAMESPACE);
        return Ok(None);
    }

    let upload_dir = &cfg.directories.uploaded_documents_dir;
    fs::create_dir_all(upload_dir)?;
    for file in files {
        move_into(file, upload_dir)?;
    }
    info!(files = files.len(), dir = %upload_dir.display(), "moved uploaded documents");

    let report = ingest_documents(cfg, embedder, index, upload_dir, Namespace::Uploaded.as_str())?;

    let mut reply = UPLOAD_SUCCESS.to_string();
    if !report.failures.is_empty() {
        let skipped: Vec<String> = report.failures.iter().map(describe_failure).collect();
        reply.push_str(&format!("\nSkipped: {}", skipped.join("; ")));
    }
    history.push_assistant(reply);
    Ok(Some(report))
}

fn describe_failure(err: &DocumentLoadError) -> String {
    let name = err
        .path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| err.path.display().to_string());
    format!("{} ({})", name, err.message)
}

// rename fails across filesystems, so fall back to copy + remove.
fn move_into(file: &Path, dir: &Path) -> Result<()> {
    let name = file
        .file_name()
        .ok_or_else(|| DocumentLoadError::new(file, "not a file path"))?;
    let target = dir.join(name);
    if fs::rename(file, &target).is_err() {
        fs::copy(file, &target).map_err(|e| DocumentLoadError::new(file, e.to_string()))?;
        fs::remove_file(file)?;
    }
    Ok(())
}
