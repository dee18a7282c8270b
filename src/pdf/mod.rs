//! PDF processing layer
//!
//! Page text is produced by interpreting content streams with lopdf and
//! resolving glyphs through each font's ToUnicode map, encoding, or embedded
//! TrueType glyph names.

mod content;
mod encoding;
mod extractor;
mod font;
mod glyph;
mod object;
mod spacing;

#[cfg(test)]
pub(crate) mod testing;

pub use extractor::{extract_text, ExtractedText, PageText, PdfReader};
