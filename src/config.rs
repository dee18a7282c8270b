//! Extraction configuration

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Default first page (1-indexed)
pub const DEFAULT_PAGE_MIN: u32 = 1;
/// Default last page (1-indexed, clamped to the document's page count)
pub const DEFAULT_PAGE_MAX: u32 = 1000;

/// Configuration for content-stream text extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// First page to extract (1-indexed, inclusive)
    pub page_min: u32,
    /// Last page to extract (1-indexed, inclusive)
    pub page_max: u32,
    /// Left edge of the horizontal device-space window (inclusive), `None` for unbounded
    pub x_range_min: Option<f64>,
    /// Right edge of the horizontal device-space window (exclusive), `None` for unbounded
    pub x_range_max: Option<f64>,
    /// Prepend a `--- Page N ---` marker line to each page buffer
    pub show_page_numbers: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            page_min: DEFAULT_PAGE_MIN,
            page_max: DEFAULT_PAGE_MAX,
            x_range_min: None,
            x_range_max: None,
            show_page_numbers: false,
        }
    }
}

impl ExtractionConfig {
    /// Parse a (possibly partial) JSON config, filling in defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Restrict extraction to pages `min..=max`
    pub fn with_pages(mut self, min: u32, max: u32) -> Self {
        self.page_min = min;
        self.page_max = max;
        self
    }

    /// Restrict extraction to pages given as a range string (e.g., "3-7" or "5")
    pub fn with_page_range(self, range: &str) -> Result<Self> {
        let (min, max) = parse_page_range(range)?;
        Ok(self.with_pages(min, max))
    }

    /// Keep only glyphs whose device-space x lies in `[min, max)`
    pub fn with_x_range(mut self, min: f64, max: f64) -> Self {
        self.x_range_min = Some(min);
        self.x_range_max = Some(max);
        self
    }

    /// Toggle page-number marker lines
    pub fn with_page_numbers(mut self, show: bool) -> Self {
        self.show_page_numbers = show;
        self
    }

    /// Check that the configured ranges are usable
    pub fn validate(&self) -> Result<()> {
        if self.page_min == 0 {
            return Err(Error::InvalidConfig {
                reason: "page_min is 1-indexed and must be at least 1".to_string(),
            });
        }
        if self.page_min > self.page_max {
            return Err(Error::InvalidConfig {
                reason: format!(
                    "page_min ({}) is greater than page_max ({})",
                    self.page_min, self.page_max
                ),
            });
        }
        if let (Some(min), Some(max)) = (self.x_range_min, self.x_range_max) {
            if min.partial_cmp(&max) != Some(std::cmp::Ordering::Less) {
                return Err(Error::InvalidConfig {
                    reason: format!("empty horizontal window [{}, {})", min, max),
                });
            }
        }
        Ok(())
    }

    /// Whether a device-space x coordinate falls inside the horizontal window
    pub fn contains_x(&self, x: f64) -> bool {
        self.x_range_min.map_or(true, |min| x >= min)
            && self.x_range_max.map_or(true, |max| x < max)
    }
}

/// Parse a contiguous page range string (e.g., "1-5" or "3") into `(min, max)`
pub fn parse_page_range(range: &str) -> Result<(u32, u32)> {
    let invalid = || Error::InvalidPageRange {
        range: range.to_string(),
    };

    let part = range.trim();
    let (start, end) = match part.split_once('-') {
        Some((start, end)) => (start.trim(), end.trim()),
        None => (part, part),
    };

    let start: u32 = start.parse().map_err(|_| invalid())?;
    let end: u32 = end.parse().map_err(|_| invalid())?;

    if start < 1 || start > end {
        return Err(invalid());
    }

    Ok((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ExtractionConfig::default();
        assert_eq!(config.page_min, 1);
        assert_eq!(config.page_max, 1000);
        assert!(!config.show_page_numbers);
        assert!(config.contains_x(f64::MIN));
        assert!(config.contains_x(1.0e9));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_page_range() {
        assert_eq!(parse_page_range("1-3").unwrap(), (1, 3));
        assert_eq!(parse_page_range(" 4 - 9 ").unwrap(), (4, 9));
        assert_eq!(parse_page_range("5").unwrap(), (5, 5));
    }

    #[test]
    fn test_parse_page_range_invalid() {
        assert!(parse_page_range("0-3").is_err()); // 0 is invalid
        assert!(parse_page_range("5-3").is_err()); // Start > End
        assert!(parse_page_range("abc").is_err()); // Not a number
        assert!(parse_page_range("1-").is_err());
    }

    #[test]
    fn test_x_window_is_half_open() {
        let config = ExtractionConfig::default().with_x_range(50.0, 300.0);
        assert!(config.contains_x(50.0));
        assert!(config.contains_x(299.9));
        assert!(!config.contains_x(300.0));
        assert!(!config.contains_x(49.9));
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let config =
            ExtractionConfig::from_json(r#"{"page_max": 4, "x_range_max": 320.5}"#).unwrap();
        assert_eq!(config.page_min, 1);
        assert_eq!(config.page_max, 4);
        assert_eq!(config.x_range_min, None);
        assert_eq!(config.x_range_max, Some(320.5));
    }

    #[test]
    fn test_validate_rejects_bad_ranges() {
        assert!(matches!(
            ExtractionConfig::default().with_pages(0, 3).validate(),
            Err(Error::InvalidConfig { .. })
        ));
        assert!(matches!(
            ExtractionConfig::default().with_pages(5, 2).validate(),
            Err(Error::InvalidConfig { .. })
        ));
        assert!(matches!(
            ExtractionConfig::default().with_x_range(10.0, 10.0).validate(),
            Err(Error::InvalidConfig { .. })
        ));
        assert!(ExtractionConfig::from_json(r#"{"page_min": 0}"#).is_err());
    }

    #[test]
    fn test_with_page_range() {
        let config = ExtractionConfig::default().with_page_range("2-6").unwrap();
        assert_eq!((config.page_min, config.page_max), (2, 6));
        assert!(ExtractionConfig::default().with_page_range("x").is_err());
    }
}
