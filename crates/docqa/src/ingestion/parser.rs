//! Text extraction for PDF, Word and plain-text uploads

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::types::FileType;

/// Extracted document text with page provenance
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDocument {
    /// File type
    pub file_type: FileType,
    /// Extracted text content
    pub content: String,
    /// Page start offsets into `content`; empty for page-less sources
    pub pages: Vec<PageSpan>,
    /// Total pages (PDF only)
    pub total_pages: Option<u32>,
}

/// Where a page starts in the extracted text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSpan {
    /// Page number (1-indexed)
    pub page_number: u32,
    /// Byte offset of the first character of the page
    pub char_offset: usize,
}

impl ParsedDocument {
    /// Plain document without page boundaries
    pub fn unpaged(file_type: FileType, content: String) -> Self {
        Self {
            file_type,
            content,
            pages: Vec::new(),
            total_pages: None,
        }
    }

    /// Join per-page texts, recording where each page starts
    pub fn from_pages(file_type: FileType, pages: Vec<String>) -> Self {
        let total = pages.len() as u32;
        let mut content = String::new();
        let mut spans = Vec::with_capacity(pages.len());

        for (i, page) in pages.into_iter().enumerate() {
            let page = page.trim();
            if page.is_empty() {
                continue;
            }
            if !content.is_empty() {
                content.push_str("\n\n");
            }
            spans.push(PageSpan {
                page_number: i as u32 + 1,
                char_offset: content.len(),
            });
            content.push_str(page);
        }

        Self {
            file_type,
            content,
            pages: spans,
            total_pages: Some(total),
        }
    }

    /// Whether any text was extracted
    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
    }
}

/// Turns raw file bytes of one type into text
pub trait TextExtractor: Send + Sync {
    /// File type handled by this extractor
    fn file_type(&self) -> FileType;

    /// Extract text from file bytes
    fn extract(&self, filename: &str, data: &[u8]) -> Result<ParsedDocument>;
}

/// PDF extraction: pdf-extract per page, lopdf as fallback
pub struct PdfExtractor;

/// Word (.docx) extraction via docx-rs
pub struct DocxExtractor;

/// UTF-8 text extraction
pub struct PlainTextExtractor;

impl TextExtractor for PdfExtractor {
    fn file_type(&self) -> FileType {
        FileType::Pdf
    }

    #[cfg(feature = "pdf")]
    fn extract(&self, filename: &str, data: &[u8]) -> Result<ParsedDocument> {
        let pages = match pdf_extract::extract_text_from_mem_by_pages(data) {
            Ok(pages) => pages,
            Err(e) => {
                tracing::warn!("pdf-extract failed for '{}': {}, trying lopdf", filename, e);
                Self::extract_with_lopdf(filename, data)?
            }
        };

        let pages = pages.iter().map(|p| cleanup_pdf_text(p)).collect();
        Ok(ParsedDocument::from_pages(FileType::Pdf, pages))
    }

    #[cfg(not(feature = "pdf"))]
    fn extract(&self, _filename: &str, _data: &[u8]) -> Result<ParsedDocument> {
        Err(Error::UnsupportedFileType(
            "pdf (built without the `pdf` feature)".to_string(),
        ))
    }
}

#[cfg(feature = "pdf")]
impl PdfExtractor {
    /// Fallback PDF text extraction using lopdf directly
    fn extract_with_lopdf(filename: &str, data: &[u8]) -> Result<Vec<String>> {
        let doc = lopdf::Document::load_mem(data)
            .map_err(|e| Error::file_parse(filename, format!("Failed to load PDF: {}", e)))?;

        let mut pages = Vec::new();
        for page_number in doc.get_pages().keys() {
            match doc.extract_text(&[*page_number]) {
                Ok(text) => pages.push(text),
                Err(e) => {
                    tracing::debug!("Could not extract page {} of '{}': {}", page_number, filename, e);
                    pages.push(String::new());
                }
            }
        }

        if pages.iter().all(|p| p.trim().is_empty()) {
            return Err(Error::file_parse(
                filename,
                "PDF appears to be image-based or has no extractable text",
            ));
        }

        Ok(pages)
    }
}

impl TextExtractor for DocxExtractor {
    fn file_type(&self) -> FileType {
        FileType::Word
    }

    #[cfg(feature = "docx")]
    fn extract(&self, filename: &str, data: &[u8]) -> Result<ParsedDocument> {
        let doc = docx_rs::read_docx(data).map_err(|e| Error::file_parse(filename, e.to_string()))?;

        let mut content = String::new();
        for child in doc.document.children {
            match child {
                docx_rs::DocumentChild::Paragraph(p) => {
                    push_paragraph(&mut content, &p);
                }
                docx_rs::DocumentChild::Table(table) => {
                    for row in table.rows {
                        let docx_rs::TableChild::TableRow(row) = row;
                        for cell in row.cells {
                            let docx_rs::TableRowChild::TableCell(cell) = cell;
                            for child in cell.children {
                                if let docx_rs::TableCellContent::Paragraph(p) = child {
                                    push_paragraph(&mut content, &p);
                                }
                            }
                        }
                    }
                }
                _ => {}
            }
        }

        Ok(ParsedDocument::unpaged(FileType::Word, content))
    }

    #[cfg(not(feature = "docx"))]
    fn extract(&self, _filename: &str, _data: &[u8]) -> Result<ParsedDocument> {
        Err(Error::UnsupportedFileType(
            "docx (built without the `docx` feature)".to_string(),
        ))
    }
}

#[cfg(feature = "docx")]
fn push_paragraph(content: &mut String, paragraph: &docx_rs::Paragraph) {
    for child in &paragraph.children {
        if let docx_rs::ParagraphChild::Run(run) = child {
            for child in &run.children {
                if let docx_rs::RunChild::Text(t) = child {
                    content.push_str(&t.text);
                }
            }
        }
    }
    content.push('\n');
}

impl TextExtractor for PlainTextExtractor {
    fn file_type(&self) -> FileType {
        FileType::Text
    }

    fn extract(&self, filename: &str, data: &[u8]) -> Result<ParsedDocument> {
        let content = match std::str::from_utf8(data) {
            Ok(text) => text.to_string(),
            Err(_) => {
                tracing::warn!("'{}' is not valid UTF-8, decoding lossily", filename);
                String::from_utf8_lossy(data).into_owned()
            }
        };
        // Strip a leading BOM
        let content = content.trim_start_matches('\u{feff}').to_string();

        Ok(ParsedDocument::unpaged(FileType::Text, content))
    }
}

/// Dispatches uploads to the extractor for their file type
pub struct FileParser;

impl FileParser {
    /// Extractor for a file type
    pub fn extractor(file_type: FileType) -> &'static dyn TextExtractor {
        match file_type {
            FileType::Pdf => &PdfExtractor,
            FileType::Word => &DocxExtractor,
            FileType::Text => &PlainTextExtractor,
        }
    }

    /// Parse a file based on its extension
    pub fn parse(filename: &str, data: &[u8]) -> Result<ParsedDocument> {
        let file_type = FileType::from_filename(filename).ok_or_else(|| {
            let ext = filename.rsplit_once('.').map(|(_, e)| e).unwrap_or("");
            Error::UnsupportedFileType(format!(
                "'{}' (extension '{}'); supported: pdf, docx, txt",
                filename, ext
            ))
        })?;

        Self::extractor(file_type).extract(filename, data)
    }
}

/// Normalise PDF text: drop NULs, expand ligatures, trim lines
#[cfg_attr(not(feature = "pdf"), allow(dead_code))]
fn cleanup_pdf_text(text: &str) -> String {
    text.replace('\0', "")
        .replace('\u{FB01}', "fi")
        .replace('\u{FB02}', "fl")
        .replace('\u{FB00}', "ff")
        .replace('\u{FB03}', "ffi")
        .replace('\u{FB04}', "ffl")
        .replace('\u{00A0}', " ")
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// SHA-256 of the uploaded bytes, hex encoded
pub fn hash_content(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
