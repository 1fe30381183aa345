//! Loading uploaded files into [`Document`]s.
//!
//! Files are parsed straight from memory. The parser for a file is chosen
//! from a [`ParserRegistry`] keyed by lower-cased extension, so new formats
//! can be registered without touching [`DocumentLoader`].

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::document::{Document, DocumentMetadata, Page};
use crate::error::{RagError, Result};

/// An uploaded file: its original name and full contents.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Original filename, used as the `source` of every derived document.
    pub name: String,
    /// Raw file contents.
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    /// Create an upload from a name and its bytes.
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self { name: name.into(), bytes: bytes.into() }
    }

    /// The lower-cased extension of the filename, if any.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name).extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase)
    }
}

/// A text unit produced by a [`DocumentParser`].
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedUnit {
    /// Extracted text.
    pub text: String,
    /// Page the text came from.
    pub page: Page,
}

/// Extracts text units from the raw bytes of one file format.
pub trait DocumentParser: Send + Sync {
    /// A short name for logs and error messages.
    fn name(&self) -> &str;

    /// Parse file contents into text units in reading order.
    ///
    /// The returned message describes why the file could not be parsed.
    fn parse(&self, bytes: &[u8]) -> std::result::Result<Vec<ParsedUnit>, String>;
}

/// Parses PDF files into one unit per page.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfParser;

impl DocumentParser for PdfParser {
    fn name(&self) -> &str {
        "pdf"
    }

    fn parse(&self, bytes: &[u8]) -> std::result::Result<Vec<ParsedUnit>, String> {
        // pdf-extract panics on some malformed inputs instead of returning an error.
        let pages = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(bytes))
            .map_err(|_| "malformed PDF".to_string())?
            .map_err(|e| e.to_string())?;
        Ok(pages
            .into_iter()
            .enumerate()
            .map(|(index, text)| ParsedUnit { text, page: Page::Number(index) })
            .collect())
    }
}

/// Parses UTF-8 text files (Markdown, plain text) into a single unit.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextParser;

impl DocumentParser for TextParser {
    fn name(&self) -> &str {
        "text"
    }

    fn parse(&self, bytes: &[u8]) -> std::result::Result<Vec<ParsedUnit>, String> {
        let text = std::str::from_utf8(bytes).map_err(|e| format!("invalid UTF-8: {e}"))?;
        Ok(vec![ParsedUnit { text: text.to_string(), page: Page::NotApplicable }])
    }
}

/// Maps file extensions to parsers.
#[derive(Clone)]
pub struct ParserRegistry {
    parsers: HashMap<String, Arc<dyn DocumentParser>>,
}

impl ParserRegistry {
    /// An empty registry. Every file is skipped until a parser is registered.
    pub fn empty() -> Self {
        Self { parsers: HashMap::new() }
    }

    /// Register a parser for an extension (without the leading dot).
    /// Replaces any parser previously registered for it.
    pub fn register(mut self, extension: &str, parser: Arc<dyn DocumentParser>) -> Self {
        let key = extension.trim_start_matches('.').to_ascii_lowercase();
        self.parsers.insert(key, parser);
        self
    }

    /// Look up the parser for an extension.
    pub fn get(&self, extension: &str) -> Option<&Arc<dyn DocumentParser>> {
        self.parsers.get(extension)
    }

    /// Registered extensions, sorted.
    pub fn extensions(&self) -> Vec<&str> {
        let mut extensions: Vec<&str> = self.parsers.keys().map(String::as_str).collect();
        extensions.sort_unstable();
        extensions
    }
}

impl Default for ParserRegistry {
    /// PDF and Markdown.
    fn default() -> Self {
        Self::empty().register("pdf", Arc::new(PdfParser)).register("md", Arc::new(TextParser))
    }
}

impl std::fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParserRegistry").field("extensions", &self.extensions()).finish()
    }
}

/// A file that failed to load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadFailure {
    /// Original filename.
    pub source: String,
    /// Why the file could not be loaded.
    pub message: String,
}

/// Outcome of loading a batch of uploads.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    /// Documents from every file that loaded, in upload order.
    pub documents: Vec<Document>,
    /// Files whose parser failed.
    pub failures: Vec<LoadFailure>,
    /// Files with no registered parser.
    pub skipped: Vec<String>,
}

enum FileOutcome {
    Loaded(Vec<Document>),
    Skipped,
}

/// Turns uploads into [`Document`]s tagged with source and page.
#[derive(Debug, Clone, Default)]
pub struct DocumentLoader {
    registry: ParserRegistry,
}

impl DocumentLoader {
    /// Create a loader that dispatches through the given registry.
    pub fn new(registry: ParserRegistry) -> Self {
        Self { registry }
    }

    /// Return a reference to the parser registry.
    pub fn registry(&self) -> &ParserRegistry {
        &self.registry
    }

    /// Load every file, isolating failures.
    ///
    /// A file that fails to parse is reported in [`LoadReport::failures`]
    /// and does not stop the rest of the batch.
    pub fn load(&self, files: &[UploadedFile]) -> LoadReport {
        let mut report = LoadReport::default();
        for (file_index, file) in files.iter().enumerate() {
            match self.load_file(file_index, file) {
                Ok(FileOutcome::Loaded(documents)) => report.documents.extend(documents),
                Ok(FileOutcome::Skipped) => report.skipped.push(file.name.clone()),
                Err(failure) => {
                    warn!(source = %failure.source, error = %failure.message, "skipping unreadable file");
                    report.failures.push(failure);
                }
            }
        }

        info!(
            files = files.len(),
            document_count = report.documents.len(),
            failed = report.failures.len(),
            skipped = report.skipped.len(),
            "loaded upload batch"
        );
        report
    }

    /// Load every file, aborting on the first one that fails to parse.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Load`] naming the first file that failed.
    pub fn load_strict(&self, files: &[UploadedFile]) -> Result<Vec<Document>> {
        let mut documents = Vec::new();
        for (file_index, file) in files.iter().enumerate() {
            let outcome = self.load_file(file_index, file).map_err(|failure| RagError::Load {
                source_name: failure.source,
                message: failure.message,
            })?;
            if let FileOutcome::Loaded(loaded) = outcome {
                documents.extend(loaded);
            }
        }
        Ok(documents)
    }

    fn load_file(
        &self,
        file_index: usize,
        file: &UploadedFile,
    ) -> std::result::Result<FileOutcome, LoadFailure> {
        let Some(parser) = file.extension().and_then(|ext| self.registry.get(&ext)) else {
            debug!(source = %file.name, "no parser registered for file, skipping");
            return Ok(FileOutcome::Skipped);
        };

        let units = parser.parse(&file.bytes).map_err(|message| LoadFailure {
            source: file.name.clone(),
            message: format!("{} parser: {message}", parser.name()),
        })?;

        debug!(source = %file.name, parser = parser.name(), units = units.len(), "parsed file");

        let documents = units
            .into_iter()
            .enumerate()
            .map(|(unit_index, unit)| Document {
                id: format!("{file_index}:{}#{unit_index}", file.name),
                text: unit.text,
                metadata: DocumentMetadata { source: file.name.clone(), page: unit.page },
            })
            .collect();
        Ok(FileOutcome::Loaded(documents))
    }
}
