//! Document ingestion: load text files and chunk them into passages
//!
//! Plain text and Markdown are supported. A form feed (`\x0c`) marks a page
//! break, which is how text exported from paged formats keeps its pages.

mod splitter;
mod tokens;

pub use splitter::{TextSplitter, DEFAULT_SEPARATORS};
pub use tokens::{split_by_tokens, TokenSpans, TokenSplitter};

use crate::config::ChunkingConfig;
use crate::retrieval::{Metadata, Passage, LOCATOR_KEY, SOURCE_KEY};
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// File extensions picked up from directories
pub const SUPPORTED_EXTENSIONS: &[&str] = &["txt", "md", "markdown"];

const PAGE_BREAK: char = '\u{000C}';

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Unsupported file type: {0} (supported: txt, md, markdown)")]
    UnsupportedFile(PathBuf),

    #[error("No documents found in {0:?}")]
    NoDocuments(Vec<PathBuf>),

    #[error("Tokenization failed: {0}")]
    Tokenization(String),
}

/// A loaded document, split into pages
#[derive(Debug, Clone)]
pub struct Document {
    pub source_id: String,
    pub pages: Vec<String>,
}

impl Document {
    pub fn from_text(source_id: impl Into<String>, text: &str) -> Self {
        Self {
            source_id: source_id.into(),
            pages: text.split(PAGE_BREAK).map(str::to_string).collect(),
        }
    }

    pub fn is_paged(&self) -> bool {
        self.pages.len() > 1
    }
}

/// Load every supported document under the given files and directories
///
/// Directories are walked recursively in sorted order without following
/// symlinked directories; unsupported files inside them are skipped. An explicitly named unsupported file is an error.
pub fn load_documents(paths: &[PathBuf]) -> Result<Vec<Document>, IngestError> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            collect_files(path, &mut files)?;
        } else if is_supported(path) {
            files.push(path.clone());
        } else if path.exists() {
            return Err(IngestError::UnsupportedFile(path.clone()));
        } else {
            return Err(IngestError::Io {
                path: path.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
            });
        }
    }

    let mut documents = Vec::with_capacity(files.len());
    for file in files {
        let text = std::fs::read_to_string(&file).map_err(|e| IngestError::Io {
            path: file.clone(),
            source: e,
        })?;
        tracing::debug!("Loaded {} ({} chars)", file.display(), text.len());
        documents.push(Document::from_text(file.display().to_string(), &text));
    }

    if documents.is_empty() {
        return Err(IngestError::NoDocuments(paths.to_vec()));
    }

    tracing::info!("Loaded {} documents", documents.len());
    Ok(documents)
}

fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), IngestError> {
    let walker = WalkDir::new(dir)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter();

    for entry in walker {
        let entry = entry.map_err(|e| IngestError::Io {
            path: e.path().unwrap_or(dir).to_path_buf(),
            source: e.into(),
        })?;

        // Symlinked files are read through; symlinked directories are not walked
        let path = entry.path();
        if entry.file_type().is_dir() || !path.is_file() {
            continue;
        }

        if is_supported(path) {
            files.push(path.to_path_buf());
        } else {
            tracing::debug!("Skipping unsupported file: {}", path.display());
        }
    }

    Ok(())
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Chunk documents into passages
///
/// Each passage records its source path and a locator: `page-<n>` (1-based)
/// for paged documents, otherwise `chunk-<n>`.
pub fn chunk_documents(documents: &[Document], config: &ChunkingConfig) -> Vec<Passage> {
    let splitter = TextSplitter::new(config.chunk_size, config.chunk_overlap);
    let mut passages = Vec::new();

    for document in documents {
        let mut chunk_index = 0;
        for (page_index, page) in document.pages.iter().enumerate() {
            for chunk in splitter.split(page) {
                let mut metadata = Metadata::new();
                metadata.insert(
                    SOURCE_KEY.to_string(),
                    Value::String(document.source_id.clone()),
                );
                let locator = if document.is_paged() {
                    format!("page-{}", page_index + 1)
                } else {
                    format!("chunk-{}", chunk_index)
                };
                metadata.insert(LOCATOR_KEY.to_string(), Value::String(locator));
                metadata.insert("chunk".to_string(), Value::from(chunk_index));

                passages.push(Passage::with_metadata(chunk, metadata));
                chunk_index += 1;
            }
        }
    }

    tracing::info!(
        "Split {} documents into {} passages",
        documents.len(),
        passages.len()
    );
    passages
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_page_breaks() {
        let doc = Document::from_text("a.txt", "page one\u{000C}page two");
        assert!(doc.is_paged());
        assert_eq!(doc.pages, vec!["page one", "page two"]);
    }

    #[test]
    fn test_chunk_locators() {
        let config = ChunkingConfig::default();
        let paged = Document::from_text("paged.txt", "first\u{000C}second");
        let flat = Document::from_text("flat.md", "only");

        let passages = chunk_documents(&[paged, flat], &config);

        assert_eq!(passages.len(), 3);
        assert_eq!(passages[0].locator(), Some("page-1"));
        assert_eq!(passages[1].locator(), Some("page-2"));
        assert_eq!(passages[2].locator(), Some("chunk-0"));
        assert_eq!(passages[2].source_id(), Some("flat.md"));
    }

    #[test]
    fn test_load_directory_skips_unsupported() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("a.txt"), "alpha").unwrap();
        std::fs::write(temp.path().join("b.bin"), [0u8, 1, 2]).unwrap();
        std::fs::create_dir(temp.path().join("nested")).unwrap();
        std::fs::write(temp.path().join("nested/c.md"), "# gamma").unwrap();

        let docs = load_documents(&[temp.path().to_path_buf()]).unwrap();

        assert_eq!(docs.len(), 2);
        assert!(docs[0].source_id.ends_with("a.txt"));
        assert!(docs[1].source_id.ends_with("c.md"));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_loop_walked_once() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("a.txt"), "alpha").unwrap();
        std::os::unix::fs::symlink(temp.path(), temp.path().join("loop")).unwrap();

        let docs = load_documents(&[temp.path().to_path_buf()]).unwrap();

        assert_eq!(docs.len(), 1);
        assert!(docs[0].source_id.ends_with("a.txt"));
    }

    #[test]
    fn test_explicit_unsupported_file() {
        let temp = TempDir::new().unwrap();
        let pdf = temp.path().join("report.pdf");
        std::fs::write(&pdf, b"%PDF-1.4").unwrap();

        assert!(matches!(
            load_documents(&[pdf]),
            Err(IngestError::UnsupportedFile(_))
        ));
    }

    #[test]
    fn test_empty_directory() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            load_documents(&[temp.path().to_path_buf()]),
            Err(IngestError::NoDocuments(_))
        ));
    }
}
