use std::any::Any;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{DocumentLoadError, RagError, Result};

/// Extracted text of one page. Plain-text files have a single unnumbered page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Page {
    pub number: Option<usize>,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Document {
    /// File name, used as the source label in the index.
    pub source: String,
    pub path: PathBuf,
    pub pages: Vec<Page>,
}

/// Outcome of loading a directory: the documents that parsed and the files
/// that did not.
#[derive(Debug, Default)]
pub struct LoadedDocuments {
    pub documents: Vec<Document>,
    pub failures: Vec<DocumentLoadError>,
}

/// Load every file directly inside `dir` (no recursion), in file-name order.
///
/// Files that cannot be parsed are collected in
/// [`LoadedDocuments::failures`] and do not stop the rest of the batch.
/// Hidden files are ignored.
pub fn load_documents(dir: &Path) -> Result<LoadedDocuments> {
    if !dir.is_dir() {
        return Err(RagError::DocumentLoad(DocumentLoadError::new(dir, "directory not found")));
    }

    let mut loaded = LoadedDocuments::default();
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !e.file_name().to_string_lossy().starts_with('.'));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let path = err.path().map(Path::to_path_buf).unwrap_or_else(|| dir.to_path_buf());
                warn!(path = %path.display(), error = %err, "skipping unreadable entry");
                loaded.failures.push(DocumentLoadError::new(path, err.to_string()));
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        match load_document(entry.path()) {
            Ok(document) => {
                info!(document = %document.source, pages = document.pages.len(), "loaded document");
                loaded.documents.push(document);
            }
            Err(err) => {
                warn!(path = %err.path.display(), error = %err.message, "skipping document");
                loaded.failures.push(err);
            }
        }
    }

    Ok(loaded)
}

/// Load one file. PDFs are split per page; `.txt` and `.md` are one page.
pub fn load_document(path: &Path) -> std::result::Result<Document, DocumentLoadError> {
    let source = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    let pages = match ext.as_str() {
        "pdf" => {
            let bytes = fs::read(path).map_err(|e| DocumentLoadError::new(path, e.to_string()))?;
            extract_pdf_pages(&bytes).map_err(|message| DocumentLoadError::new(path, message))?
        }
        "txt" | "md" => {
            let text = fs::read_to_string(path).map_err(|e| DocumentLoadError::new(path, e.to_string()))?;
            vec![Page { number: None, text }]
        }
        other => {
            return Err(DocumentLoadError::new(path, format!("unsupported file type '{}'", other)));
        }
    };

    if pages.iter().all(|p| p.text.trim().is_empty()) {
        return Err(DocumentLoadError::new(path, "no extractable text"));
    }

    Ok(Document { source, path: path.to_path_buf(), pages })
}

fn extract_pdf_pages(bytes: &[u8]) -> std::result::Result<Vec<Page>, String> {
    // pdf-extract panics on some malformed inputs instead of returning an error.
    let pages = catch_quietly(|| pdf_extract::extract_text_from_mem_by_pages(bytes))
        .map_err(|message| format!("PDF parser panicked: {}", message))?
        .map_err(|e| e.to_string())?;

    Ok(pages
        .into_iter()
        .enumerate()
        .filter(|(_, page_text)| !page_text.trim().is_empty())
        .map(|(i, text)| Page { number: Some(i + 1), text })
        .collect())
}

static PANIC_HOOK: Mutex<()> = Mutex::new(());

/// Run `f` and turn a panic into its message. While `f` runs the panic hook
/// only logs, so nothing is printed over the terminal UI.
fn catch_quietly<T>(f: impl FnOnce() -> T) -> std::result::Result<T, String> {
    let _guard = PANIC_HOOK.lock().unwrap_or_else(PoisonError::into_inner);
    let previous = panic::take_hook();
    panic::set_hook(Box::new(|info| debug!(%info, "caught panic in document parser")));
    let result = panic::catch_unwind(AssertUnwindSafe(f));
    panic::set_hook(previous);
    result.map_err(|payload| panic_message(payload.as_ref()))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.docx");
        fs::write(&path, "text").unwrap();
        let err = load_document(&path).unwrap_err();
        assert!(err.message.contains("unsupported"));
        assert_eq!(err.path, path);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let err = load_documents(Path::new("no/such/dir")).unwrap_err();
        assert!(matches!(err, RagError::DocumentLoad(_)));
    }

    #[test]
    fn panics_become_errors_without_reaching_the_previous_hook() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let reached = Arc::new(AtomicUsize::new(0));
        let counter = reached.clone();
        let original = panic::take_hook();
        panic::set_hook(Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let err = catch_quietly(|| -> u8 { panic!("broken xref table") }).unwrap_err();
        assert_eq!(err, "broken xref table");
        assert_eq!(reached.load(Ordering::SeqCst), 0);
        assert_eq!(catch_quietly(|| 7), Ok(7));

        // The previous hook is back in place afterwards.
        let _ = panic::catch_unwind(|| panic!("outside the parser"));
        assert_eq!(reached.load(Ordering::SeqCst), 1);

        panic::set_hook(original);
    }
}
