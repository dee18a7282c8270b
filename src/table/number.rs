//! Numeric cell parsing shared by the free-text and HTML table paths

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

/// Earliest value accepted as a header year
pub const MIN_YEAR: f64 = 1900.0;
/// Latest value accepted as a header year
pub const MAX_YEAR: f64 = 2100.0;

/// Cells meaning "no value for this year"
const NOT_AVAILABLE: [&str; 3] = ["-—", "—", "-"];

/// Plain integer or decimal, optionally signed
static PLAIN_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)$").expect("valid regex"));

/// Integer grouped with thousands commas (e.g., 1,666,777), optional decimals
static GROUPED_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?\d{1,3}(,\d{3})+(\.\d+)?$").expect("valid regex"));

/// A parsed table cell.
///
/// `valid == false` means "not available" (dash, em-dash, N/A, empty). The
/// original text is kept because formatting tells a formatted quantity such as
/// `2,020` apart from the bare year `2020`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Number {
    pub value: f64,
    pub valid: bool,
    pub original_text: String,
}

impl Number {
    fn parsed(value: f64, original_text: &str) -> Self {
        Self {
            value,
            valid: true,
            original_text: original_text.to_string(),
        }
    }

    /// The "not available" cell
    pub fn not_available() -> Self {
        Self::default()
    }

    /// Whether this cell reads as a calendar year usable as a column header
    pub fn is_valid_year(&self) -> bool {
        self.valid
            && (MIN_YEAR..=MAX_YEAR).contains(&self.value)
            && !self.original_text.contains(',')
    }

    /// The year this cell denotes, if it is one
    pub fn year(&self) -> Option<i32> {
        self.is_valid_year().then_some(self.value as i32)
    }
}

/// Parse a cell as a number.
///
/// Plain and thousands-grouped numbers parse directly. Otherwise one trailing
/// `*`, one embedded comma and a ` (baseline)` suffix are stripped, in that
/// order, before a final attempt. Returns `None` for anything else.
pub fn parse_number(text: &str) -> Option<Number> {
    let trimmed = text.trim();

    if PLAIN_NUMBER.is_match(trimmed) {
        return trimmed.parse().ok().map(|value| Number::parsed(value, trimmed));
    }
    if GROUPED_NUMBER.is_match(trimmed) {
        let value = trimmed.replace(',', "").parse().ok()?;
        return Some(Number::parsed(value, trimmed));
    }

    let mut cleaned = trimmed.strip_suffix('*').unwrap_or(trimmed).to_string();
    if let Some(pos) = cleaned.find(',') {
        cleaned.remove(pos);
    }
    let cleaned = cleaned.strip_suffix(" (baseline)").unwrap_or(&cleaned).trim();

    if PLAIN_NUMBER.is_match(cleaned) {
        cleaned.parse().ok().map(|value| Number::parsed(value, trimmed))
    } else {
        None
    }
}

/// Parse a cell as a number, accepting the "not available" markers.
///
/// `Some(Number { valid: false, .. })` for a dash, em-dash, `N/A` or an empty
/// cell; `None` when the text is neither a number nor a marker.
pub fn parse_number_or_not_available(text: &str) -> Option<Number> {
    let trimmed = text.trim();
    if trimmed.is_empty()
        || NOT_AVAILABLE.contains(&trimmed)
        || trimmed.eq_ignore_ascii_case("n/a")
    {
        return Some(Number::not_available());
    }
    parse_number(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("—")]
    #[case("-—")]
    #[case("-")]
    #[case("N/A")]
    #[case("n/a")]
    #[case("")]
    #[case("   ")]
    fn test_not_available_markers(#[case] text: &str) {
        assert_eq!(parse_number_or_not_available(text), Some(Number::default()));
    }

    #[rstest]
    #[case("%")]
    #[case("tCO2e")]
    #[case("Scope 1")]
    #[case("inf")]
    #[case("NaN")]
    #[case("1e5")]
    fn test_not_a_number(#[case] text: &str) {
        assert_eq!(parse_number_or_not_available(text), None);
        assert_eq!(parse_number(text), None);
    }

    #[test]
    fn test_grouped_number() {
        assert_eq!(
            parse_number("1,666,777"),
            Some(Number {
                value: 1666777.0,
                valid: true,
                original_text: "1,666,777".to_string(),
            })
        );
    }

    #[rstest]
    #[case("42", 42.0)]
    #[case("-3.5", -3.5)]
    #[case(" 0.25 ", 0.25)]
    #[case("77,476", 77476.0)]
    #[case("12.5*", 12.5)]
    #[case("1,234*", 1234.0)]
    #[case("5,400 (baseline)", 5400.0)]
    #[case("2019 (baseline)", 2019.0)]
    #[case("12345,6", 123456.0)]
    fn test_number_forms(#[case] text: &str, #[case] expected: f64) {
        let number = parse_number(text).expect("should parse");
        assert!(number.valid);
        assert!((number.value - expected).abs() < 1e-9);
        assert_eq!(number.original_text, text.trim());
    }

    #[rstest]
    #[case("1999", true)]
    #[case("1900", true)]
    #[case("2100", true)]
    #[case("2150", false)]
    #[case("1899", false)]
    #[case("2,020", false)]
    #[case("2020*", true)]
    fn test_valid_year(#[case] text: &str, #[case] expected: bool) {
        let number = parse_number(text).expect("should parse");
        assert_eq!(number.is_valid_year(), expected);
    }

    #[test]
    fn test_not_available_is_never_a_year() {
        assert!(!Number::not_available().is_valid_year());
        assert_eq!(parse_number("2022").and_then(|n| n.year()), Some(2022));
    }
}
