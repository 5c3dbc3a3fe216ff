// Document loading module
// Discovers knowledge base files and loads them as plain text documents


use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File extensions accepted into the knowledge base
pub const SUPPORTED_EXTENSIONS: &[&str] = &["txt", "md", "pdf"];

/// A loaded knowledge base document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Path the content was read from
    pub source: PathBuf,
    /// Raw text content
    pub content: String,
    /// Zero-based page number, only set for paged formats such as PDF
    pub page: Option<u32>,
}

impl Document {
    #[inline]
    pub fn new(source: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            content: content.into(),
            page: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }
}

/// A file that could not be loaded, with the reason
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of loading a set of files
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub documents: Vec<Document>,
    pub skipped: Vec<SkippedFile>,
}

/// Find every supported file below `path`
///
/// A path naming a single file is returned as-is, whatever its extension.
/// Hidden files and directories are skipped. Results are sorted so that
/// repeated builds see documents in the same order.
#[inline]
pub fn find_files(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut results = Vec::new();
    walk_dir(path, &mut results)
        .with_context(|| format!("Failed to scan document directory: {}", path.display()))?;
    results.sort();

    debug!("Found {} document(s) under {}", results.len(), path.display());
    Ok(results)
}

fn walk_dir(current: &Path, results: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(current)? {
        let entry = entry?;
        let file_name = entry.file_name();

        if file_name.to_string_lossy().starts_with('.') {
            continue;
        }

        let entry_path = entry.path();
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            walk_dir(&entry_path, results)?;
        } else if entry_path.is_file() && is_supported(&entry_path) {
            results.push(entry_path);
        }
    }

    Ok(())
}

/// Check whether a path has a supported extension (case-insensitive)
#[inline]
pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
}

/// Load every path, skipping the ones that fail
///
/// Failures are logged and reported, never returned as an error, so one bad
/// file cannot abort an indexing run.
#[inline]
pub fn load_documents(paths: &[PathBuf]) -> LoadReport {
    info!("Loading {} document(s)...", paths.len());

    let mut report = LoadReport::default();

    for path in paths {
        match load_file(path) {
            Ok(documents) => report.documents.extend(documents),
            Err(e) => {
                warn!("Failed to load {}: {:#}", path.display(), e);
                report.skipped.push(SkippedFile {
                    path: path.clone(),
                    reason: format!("{:#}", e),
                });
            }
        }
    }

    info!(
        "Loaded {} document(s), skipped {} file(s)",
        report.documents.len(),
        report.skipped.len()
    );
    report
}

/// Load a single file into one or more documents
#[inline]
pub fn load_file(path: &Path) -> Result<Vec<Document>> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "txt" | "md" => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read text file: {}", path.display()))?;
            Ok(vec![Document::new(path, content)])
        }
        "pdf" => load_pdf(path),
        other => Err(anyhow::anyhow!("Unsupported file type: {:?}", other)),
    }
}

/// Load a PDF as one document per page
fn load_pdf(path: &Path) -> Result<Vec<Document>> {
    let mut pdf = pdf_oxide::PdfDocument::open(path)
        .with_context(|| format!("Failed to open PDF: {}", path.display()))?;

    let page_count = pdf
        .page_count()
        .with_context(|| format!("Failed to read page count: {}", path.display()))?;

    let mut documents = Vec::with_capacity(page_count);
    for page in 0..page_count {
        let text = pdf
            .extract_text(page)
            .with_context(|| format!("Failed to extract page {} of {}", page + 1, path.display()))?;
        let page_number = u32::try_from(page).context("PDF page number out of range")?;
        documents.push(Document::new(path, text).with_page(page_number));
    }

    debug!("Loaded {} page(s) from {}", documents.len(), path.display());
    Ok(documents)
}
