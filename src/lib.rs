//! PDF facts library
//!
//! This crate turns report PDFs into material for retrieval indexes:
//! - `pdf::extract_text`: reading-order text per page from content streams
//! - `table::reconstruct_tables`: year-indexed tables recovered from page text
//! - `table::parse_html_tables`: tables from layout-analysis HTML
//! - `to_contexts`: one natural-language sentence per table row
//!
//! ```no_run
//! use pdf_facts::{pdf, table, ExtractionConfig};
//!
//! # fn main() -> pdf_facts::Result<()> {
//! let file = std::fs::File::open("report.pdf")?;
//! let extracted = pdf::extract_text(file, &ExtractionConfig::default())?;
//! for page in &extracted.pages {
//!     for table in table::reconstruct_tables(&page.text) {
//!         for context in table.to_contexts() {
//!             println!("{}", context);
//!         }
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod pdf;
pub mod table;

pub use config::{parse_page_range, ExtractionConfig};
pub use error::{Error, Result};
pub use pdf::{ExtractedText, PageText, PdfReader};
pub use table::{parse_html_tables, reconstruct_tables, HtmlTable, Number, Table};
