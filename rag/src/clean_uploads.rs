use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use tracing::info;

use crate::config::Config;
use crate::error::Result;
use crate::vector_index::{Namespace, VectorIndex};

/// Give the session a clean slate for uploads: remove the upload directory
/// and purge the uploaded-documents namespace. Safe to call repeatedly.
pub fn reset_uploads(cfg: &Config, index: &dyn VectorIndex) -> Result<()> {
    remove_uploaded_documents_directory(&cfg.directories.uploaded_documents_dir)?;
    remove_uploaded_documents_namespace(cfg, index)
}

pub fn remove_uploaded_documents_directory(dir: &Path) -> Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => {
            info!(dir = %dir.display(), "removed uploaded documents directory");
            Ok(())
        }
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

pub fn remove_uploaded_documents_namespace(cfg: &Config, index: &dyn VectorIndex) -> Result<()> {
    let index_name = &cfg.index().index_name;
    if !index.index_exists(index_name)? {
        return Ok(());
    }
    let namespace = Namespace::Uploaded.as_str();
    let stats = index.describe_index_stats(index_name)?;
    if stats.namespaces.contains_key(namespace) {
        index.delete_all(index_name, namespace)?;
        info!(namespace, "purged uploaded documents namespace");
    }
    Ok(())
}
