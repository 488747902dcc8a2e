//! Text extraction from uploaded contract files.
//!
//! Plain text is passed through as-is; PDFs are read page by page through a
//! [`PdfBackend`], which defaults to the pdf-extract crate.

use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("unsupported format {0:?}. Please upload a .pdf or .txt file.")]
    UnsupportedFormat(String),
    #[error("this document appears to be an image or contains no readable text. Please try pasting the text instead.")]
    EmptyDocument,
    #[error("failed to read file: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse PDF: {0}")]
    Pdf(String),
}

/// The two accepted upload formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    PlainText,
    Pdf,
}

impl MediaType {
    /// Resolve a declared MIME type
    pub fn from_mime(mime: &str) -> Result<Self, ExtractError> {
        let essence = mime.split(';').next().unwrap_or("").trim();
        match essence.to_ascii_lowercase().as_str() {
            "text/plain" => Ok(MediaType::PlainText),
            "application/pdf" => Ok(MediaType::Pdf),
            _ => Err(ExtractError::UnsupportedFormat(mime.to_string())),
        }
    }

    /// Resolve from a file extension
    pub fn from_path(path: &Path) -> Result<Self, ExtractError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        match extension.as_str() {
            "txt" => Ok(MediaType::PlainText),
            "pdf" => Ok(MediaType::Pdf),
            _ => Err(ExtractError::UnsupportedFormat(path.display().to_string())),
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            MediaType::PlainText => "text/plain",
            MediaType::Pdf => "application/pdf",
        }
    }
}

/// A parsed paginated document
pub trait PagedDocument {
    fn page_count(&self) -> usize;

    /// Text fragments of a page in document order. Pages are 1-based.
    fn page_fragments(&mut self, page: usize) -> Result<Vec<String>, ExtractError>;
}

/// Parser for paginated documents
pub trait PdfBackend: Send + Sync {
    fn open(&self, bytes: &[u8]) -> Result<Box<dyn PagedDocument>, ExtractError>;
}

/// [`PdfBackend`] using the pdf-extract crate.
///
/// The fragments of a page are its non-blank lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfExtractBackend;

struct ExtractedPages {
    pages: Vec<String>,
}

impl PagedDocument for ExtractedPages {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_fragments(&mut self, page: usize) -> Result<Vec<String>, ExtractError> {
        let text = page
            .checked_sub(1)
            .and_then(|i| self.pages.get(i))
            .ok_or_else(|| ExtractError::Pdf(format!("page {page} out of range")))?;
        Ok(text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }
}

impl PdfBackend for PdfExtractBackend {
    fn open(&self, bytes: &[u8]) -> Result<Box<dyn PagedDocument>, ExtractError> {
        // pdf-extract panics on some malformed inputs
        let pages = panic::catch_unwind(AssertUnwindSafe(|| {
            pdf_extract::extract_text_from_mem_by_pages(bytes)
        }))
        .map_err(|_| ExtractError::Pdf("the document is malformed".to_string()))?
        .map_err(|e| ExtractError::Pdf(e.to_string()))?;

        Ok(Box::new(ExtractedPages { pages }))
    }
}

/// Turns uploaded files into contract text.
pub struct TextExtractor {
    pdf: Box<dyn PdfBackend>,
}

impl Default for TextExtractor {
    fn default() -> Self {
        Self::new(Box::new(PdfExtractBackend))
    }
}

impl TextExtractor {
    pub fn new(pdf: Box<dyn PdfBackend>) -> Self {
        Self { pdf }
    }

    /// Read a file and extract its text, picking the format from the extension
    pub fn extract_path(
        &self,
        path: &Path,
        on_status: Option<&dyn Fn(&str)>,
    ) -> Result<String, ExtractError> {
        let media = MediaType::from_path(path)?;
        if let Some(status) = on_status {
            status("Reading file...");
        }
        let bytes = std::fs::read(path)?;
        self.extract(&bytes, media, on_status)
    }

    /// Extract the text of an uploaded document.
    ///
    /// Fails with [`ExtractError::EmptyDocument`] when nothing but whitespace
    /// comes out, which usually means a scanned PDF without a text layer.
    pub fn extract(
        &self,
        bytes: &[u8],
        media: MediaType,
        on_status: Option<&dyn Fn(&str)>,
    ) -> Result<String, ExtractError> {
        debug!(media = media.mime(), bytes = bytes.len(), "extracting text");
        let text = match media {
            MediaType::PlainText => String::from_utf8_lossy(bytes).into_owned(),
            MediaType::Pdf => self.extract_pdf(bytes, on_status)?,
        };

        if text.trim().is_empty() {
            return Err(ExtractError::EmptyDocument);
        }
        Ok(text)
    }

    fn extract_pdf(
        &self,
        bytes: &[u8],
        on_status: Option<&dyn Fn(&str)>,
    ) -> Result<String, ExtractError> {
        let mut document = self.pdf.open(bytes)?;
        let total = document.page_count();
        let mut pages = Vec::with_capacity(total);

        for page in 1..=total {
            let fragments = document.page_fragments(page)?;
            debug!(page, total, fragments = fragments.len(), "extracted page");
            pages.push(fragments.join(" "));

            if let Some(status) = on_status {
                status(&format!("Extracted text from PDF (Page {page}/{total})..."));
            }
        }

        Ok(pages.join("\n"))
    }
}
