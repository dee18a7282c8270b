//! Error types for pdf-facts

use thiserror::Error;

/// Result type alias for pdf-facts
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for pdf-facts
#[derive(Error, Debug)]
pub enum Error {
    /// PDF file not found
    #[error("PDF file not found: {path}")]
    PdfNotFound { path: String },

    /// Input is not a PDF, or the document could not be opened
    #[error("Invalid PDF file: {reason}")]
    InvalidPdf { reason: String },

    /// A page's content stream could not be read or interpreted
    #[error("Failed to parse page {page}: {reason}")]
    PageParse { page: u32, reason: String },

    /// Invalid page range
    #[error("Invalid page range: {range}")]
    InvalidPageRange { range: String },

    /// Invalid extraction configuration
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// Internal invariant violated while rebuilding a free-text table
    #[error("Table structure error: {reason}")]
    TableStructure { reason: String },

    /// HTML table parsing could not be set up
    #[error("HTML table error: {reason}")]
    Html { reason: String },

    /// lopdf error
    #[error("PDF reader error: {0}")]
    Lopdf(#[from] lopdf::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Page number (1-indexed) for page-scoped failures.
    ///
    /// Callers use this to skip a broken page and keep the rest of the document.
    pub fn page(&self) -> Option<u32> {
        match self {
            Error::PageParse { page, .. } => Some(*page),
            _ => None,
        }
    }

    /// Whether the failure is confined to a single page
    pub fn is_page_failure(&self) -> bool {
        self.page().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_scoped_errors() {
        let err = Error::PageParse {
            page: 7,
            reason: "bad operator".to_string(),
        };
        assert_eq!(err.page(), Some(7));
        assert!(err.is_page_failure());
        assert_eq!(err.to_string(), "Failed to parse page 7: bad operator");

        let err = Error::InvalidPdf {
            reason: "missing header".to_string(),
        };
        assert_eq!(err.page(), None);
        assert!(!err.is_page_failure());
    }
}
