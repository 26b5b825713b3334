//! Text extraction.
//!
//! The pipeline depends only on [`TextExtractor`]. [`DocumentExtractor`] is
//! the default: it sends PDFs to [`PdfExtractor`] (lopdf) and everything else
//! to [`PlainTextExtractor`].

use lopdf::Document;
use tracing::debug;

use resume_core::error::{ResumeError, Result};

/// Leading bytes of every PDF file.
const PDF_MAGIC: &[u8] = b"%PDF";

/// Converts raw document bytes into plain text.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, filename: &str, bytes: &[u8]) -> Result<String>;
}

/// Extractor for text documents.
///
/// Decodes UTF-8, replacing invalid sequences. Input containing NUL bytes is
/// treated as binary and rejected.
#[derive(Debug, Clone, Default)]
pub struct PlainTextExtractor;

impl PlainTextExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, filename: &str, bytes: &[u8]) -> Result<String> {
        if bytes.contains(&0) {
            return Err(ResumeError::Extraction(format!(
                "{} looks like a binary document in an unsupported format",
                filename
            )));
        }
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}

/// Extracts the text layer of a PDF, page by page.
///
/// Scanned PDFs without a text layer are an `Extraction` error.
#[derive(Debug, Clone, Default)]
pub struct PdfExtractor;

impl PdfExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl TextExtractor for PdfExtractor {
    fn extract(&self, filename: &str, bytes: &[u8]) -> Result<String> {
        let doc = Document::load_mem(bytes).map_err(|e| {
            ResumeError::Extraction(format!("Failed to load PDF {}: {}", filename, e))
        })?;

        let pages = doc.get_pages();
        let mut text = String::new();
        for page_num in pages.keys() {
            match doc.extract_text(&[*page_num]) {
                Ok(page_text) => {
                    let trimmed = page_text.trim();
                    if !trimmed.is_empty() {
                        if !text.is_empty() {
                            text.push('\n');
                        }
                        text.push_str(trimmed);
                    }
                }
                Err(e) => debug!(filename, page = page_num, error = %e, "Skipping unreadable PDF page"),
            }
        }

        if text.is_empty() {
            return Err(ResumeError::Extraction(format!(
                "{} has no text layer ({} pages); scanned documents are not supported",
                filename,
                pages.len()
            )));
        }
        Ok(text)
    }
}

/// Chooses an extractor per upload: PDF by magic bytes or `.pdf` extension,
/// plain text otherwise.
#[derive(Debug, Clone, Default)]
pub struct DocumentExtractor {
    pdf: PdfExtractor,
    plain: PlainTextExtractor,
}

impl DocumentExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    fn is_pdf(filename: &str, bytes: &[u8]) -> bool {
        bytes.starts_with(PDF_MAGIC) || filename.to_ascii_lowercase().ends_with(".pdf")
    }
}

impl TextExtractor for DocumentExtractor {
    fn extract(&self, filename: &str, bytes: &[u8]) -> Result<String> {
        if Self::is_pdf(filename, bytes) {
            self.pdf.extract(filename, bytes)
        } else {
            self.plain.extract(filename, bytes)
        }
    }
}
