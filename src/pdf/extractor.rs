//! Reading-order page text extraction

use super::content::{Interpreter, LayoutSink};
use super::font::FontCache;
use crate::config::ExtractionConfig;
use crate::error::{Error, Result};
use lopdf::Document;
use serde::Serialize;
use std::io::Read;
use std::path::Path;

/// A `TJ` gap wider than this share of the font's space width becomes a space
const GAP_SPACE_RATIO: f64 = 0.3;

/// Text of one page
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageText {
    /// Page number (1-indexed)
    pub page_number: u32,
    pub text: String,
}

/// Result of extracting a page range
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractedText {
    /// Pages in increasing page order
    pub pages: Vec<PageText>,
    /// Total pages in the document, regardless of the requested range
    pub page_count: u32,
}

impl ExtractedText {
    /// All page buffers joined by newlines
    pub fn full_text(&self) -> String {
        self.pages
            .iter()
            .map(|page| page.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// An open PDF document together with the fonts decoded from it
pub struct PdfReader {
    document: Document,
    fonts: FontCache,
}

impl PdfReader {
    /// Open a PDF file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(Error::PdfNotFound {
                path: path.display().to_string(),
            });
        }

        let data = std::fs::read(path)?;
        Self::open_bytes(&data)
    }

    /// Open a PDF from any reader
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::open_bytes(&data)
    }

    /// Open a PDF from bytes
    pub fn open_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < 4 || &data[0..4] != b"%PDF" {
            return Err(Error::InvalidPdf {
                reason: "Not a valid PDF file".to_string(),
            });
        }

        let mut document = Document::load_mem(data).map_err(|e| Error::InvalidPdf {
            reason: e.to_string(),
        })?;

        if document.is_encrypted() {
            document.decrypt("").map_err(|e| Error::InvalidPdf {
                reason: format!("encrypted document: {}", e),
            })?;
        }

        let reader = Self {
            document,
            fonts: FontCache::default(),
        };
        tracing::debug!(pages = reader.page_count(), "PDF opened");
        Ok(reader)
    }

    /// Total number of pages
    pub fn page_count(&self) -> u32 {
        self.document.get_pages().len() as u32
    }

    /// Extract one text buffer per page in the configured range.
    ///
    /// The range is clamped to the document; a range past the last page
    /// yields no pages. The first page whose content cannot be interpreted
    /// aborts extraction with [`Error::PageParse`].
    pub fn extract_text(&mut self, config: &ExtractionConfig) -> Result<ExtractedText> {
        config.validate()?;

        let Self { document, fonts } = self;
        let pages = document.get_pages();
        let page_count = pages.len() as u32;
        let first = config.page_min.max(1);
        let last = config.page_max.min(page_count);
        tracing::debug!(page_count, first, last, "extracting page text");

        let mut extracted = Vec::new();
        if first <= last {
            for (&page_number, &page_id) in pages.range(first..=last) {
                let mut builder = PageTextBuilder::new(config);
                Interpreter::new(document, fonts, &mut builder, page_number).run_page(page_id)?;
                extracted.push(PageText {
                    page_number,
                    text: builder.finish(page_number),
                });
            }
        }

        tracing::debug!(pages = extracted.len(), fonts = fonts.len(), "page text extracted");
        Ok(ExtractedText {
            pages: extracted,
            page_count,
        })
    }
}

/// Extract page text from a PDF byte stream in one call
pub fn extract_text<R: Read>(reader: R, config: &ExtractionConfig) -> Result<ExtractedText> {
    PdfReader::from_reader(reader)?.extract_text(config)
}

/// Accumulates one page buffer from layout events
struct PageTextBuilder<'c> {
    config: &'c ExtractionConfig,
    text: String,
}

impl<'c> PageTextBuilder<'c> {
    fn new(config: &'c ExtractionConfig) -> Self {
        Self {
            config,
            text: String::new(),
        }
    }

    fn push_space(&mut self) {
        if !self.text.is_empty() && !self.text.ends_with([' ', '\n']) {
            self.text.push(' ');
        }
    }

    fn finish(self, page_number: u32) -> String {
        if self.config.show_page_numbers {
            format!("--- Page {} ---\n{}", page_number, self.text)
        } else {
            self.text
        }
    }
}

impl LayoutSink for PageTextBuilder<'_> {
    fn gap(&mut self, gap: f64, space_width: f64) {
        if gap > GAP_SPACE_RATIO * space_width {
            self.push_space();
        }
    }

    fn line_break(&mut self) {
        let trimmed = self.text.trim_end_matches(' ').len();
        self.text.truncate(trimmed);
        if !self.text.is_empty() && !self.text.ends_with('\n') {
            self.text.push('\n');
        }
    }

    fn glyph(&mut self, x: f64, text: &str) {
        if !self.config.contains_x(x) {
            return;
        }
        for ch in text.chars() {
            if ch == ' ' {
                self.push_space();
            } else {
                self.text.push(ch);
            }
        }
    }
}
