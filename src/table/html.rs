//! HTML table parsing and context flattening
//!
//! Layout-analysis services hand back tables as HTML fragments. They are
//! parsed into plain string grids here; numeric meaning is only attached when
//! a grid is flattened into context sentences.

use super::freetext::Table;
use super::number::parse_number;
use crate::error::{Error, Result};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Doubled attribute quoting left behind by JSON round-trips: `=""v""`
static DOUBLED_QUOTES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"=""([^"]*)"""#).expect("valid regex"));

/// A table as a grid of cell strings
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HtmlTable {
    /// Caption promoted from a short first row, empty if none
    pub title: String,
    /// Header row first, then data rows
    pub rows: Vec<Vec<String>>,
}

impl HtmlTable {
    /// Flatten into one context sentence per data row.
    ///
    /// Each sentence reads `label: header1: value1, header2: value2`. Header
    /// cells holding a valid year are rendered as `For year <year>`. Empty
    /// cells are skipped, and rows left without any value are omitted.
    pub fn to_contexts(&self) -> Vec<String> {
        let Some((header, data)) = self.rows.split_first() else {
            return Vec::new();
        };
        if data.is_empty() || header.is_empty() {
            return Vec::new();
        }

        data.iter()
            .filter_map(|row| {
                let (label, cells) = row.split_first()?;
                let parts: Vec<String> = cells
                    .iter()
                    .enumerate()
                    .filter_map(|(i, cell)| {
                        let value = cell.trim();
                        if value.is_empty() {
                            return None;
                        }
                        let column = header.get(i + 1).map(String::as_str).unwrap_or_default();
                        Some(format!("{}: {}", column_label(column), value))
                    })
                    .collect();
                (!parts.is_empty()).then(|| format!("{}: {}", label, parts.join(", ")))
            })
            .collect()
    }
}

fn column_label(header: &str) -> String {
    match parse_number(header).and_then(|n| n.year()) {
        Some(year) => format!("For year {}", year),
        None => header.to_string(),
    }
}

impl From<&Table> for HtmlTable {
    fn from(table: &Table) -> Self {
        let header = std::iter::once(table.title.clone())
            .chain(table.years().into_iter().map(|year| year.to_string()))
            .collect();

        let rows = table.rows.iter().map(|row| {
            let label = if row.unit.is_empty() {
                row.name.clone()
            } else {
                format!("{} ({})", row.name, row.unit)
            };
            std::iter::once(label)
                .chain(row.year_values.iter().map(|yv| {
                    if yv.number.valid {
                        yv.number.original_text.clone()
                    } else {
                        String::new()
                    }
                }))
                .collect()
        });

        Self {
            title: table.title.clone(),
            rows: std::iter::once(header).chain(rows).collect(),
        }
    }
}

/// Text carried down from a `rowspan` cell
#[derive(Debug)]
struct Span {
    text: String,
    remaining: usize,
}

/// Parse every table in an HTML fragment.
///
/// Rows whose cells are all empty split the grid, so one `<table>` element
/// may yield several tables. A first row narrower than the second is taken
/// as the table's title.
pub fn parse_html_tables(html: &str) -> Result<Vec<HtmlTable>> {
    let table_selector = selector("table")?;

    let document = Html::parse_fragment(&unescape(html));
    let mut grids: Vec<Vec<Vec<String>>> = Vec::new();

    for table in document.select(&table_selector) {
        let mut spans: BTreeMap<usize, Span> = BTreeMap::new();
        let mut current: Vec<Vec<String>> = Vec::new();

        for tr in table_rows(table) {
            let row = read_row(tr, &mut spans);
            if row.iter().all(String::is_empty) {
                if row.is_empty() {
                    tracing::debug!("table row without cells treated as a boundary");
                }
                if !current.is_empty() {
                    grids.push(std::mem::take(&mut current));
                }
                continue;
            }
            current.push(row);
        }

        if !current.is_empty() {
            grids.push(current);
        }
    }

    let tables: Vec<HtmlTable> = grids.into_iter().map(promote_title).collect();
    tracing::debug!(tables = tables.len(), "HTML tables parsed");
    Ok(tables)
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| Error::Html {
        reason: format!("bad selector '{}': {:?}", css, e),
    })
}

/// Strip the quoting artifacts of an HTML string that went through JSON
fn unescape(html: &str) -> String {
    let trimmed = html.trim();
    let unwrapped = trimmed
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(trimmed);
    let unescaped = unwrapped.replace("\\\"", "\"");
    DOUBLED_QUOTES.replace_all(&unescaped, "=\"$1\"").into_owned()
}

/// Rows of `table` itself, directly or through a row group. Rows of tables
/// nested in its cells are left to those tables.
fn table_rows(table: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    let mut rows = Vec::new();
    for child in table.children().filter_map(ElementRef::wrap) {
        match child.value().name() {
            "tr" => rows.push(child),
            "thead" | "tbody" | "tfoot" => rows.extend(
                child
                    .children()
                    .filter_map(ElementRef::wrap)
                    .filter(|row| row.value().name() == "tr"),
            ),
            _ => {}
        }
    }
    rows
}

fn read_row(tr: ElementRef<'_>, spans: &mut BTreeMap<usize, Span>) -> Vec<String> {
    let mut row = Vec::new();
    let cells = tr
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|cell| matches!(cell.value().name(), "td" | "th"));

    for cell in cells {
        splice_spans(&mut row, spans);

        let text = cell_text(cell);
        if let Some(raw) = cell.value().attr("rowspan") {
            match raw.trim().parse::<usize>() {
                Ok(count) if count > 1 => {
                    spans.insert(
                        row.len(),
                        Span {
                            text: text.clone(),
                            remaining: count - 1,
                        },
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(rowspan = raw, error = %e, "ignoring malformed rowspan");
                }
            }
        }
        row.push(text);
    }

    splice_spans(&mut row, spans);
    row
}

/// Fill the next columns of `row` from spans still covering them
fn splice_spans(row: &mut Vec<String>, spans: &mut BTreeMap<usize, Span>) {
    while let Some(span) = spans.get_mut(&row.len()) {
        if span.remaining == 0 {
            break;
        }
        span.remaining -= 1;
        row.push(span.text.clone());
    }
    spans.retain(|_, span| span.remaining > 0);
}

fn cell_text(cell: ElementRef<'_>) -> String {
    let mut text = String::new();
    collect_text(cell, &mut text);
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Text under `element`, skipping nested tables
fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(nested) = ElementRef::wrap(child) {
            if nested.value().name() != "table" {
                collect_text(nested, out);
            }
        }
    }
}

fn promote_title(mut rows: Vec<Vec<String>>) -> HtmlTable {
    let title = match rows.as_slice() {
        [first, second, ..] if first.len() < second.len() => rows.remove(0).join(" "),
        _ => String::new(),
    };
    HtmlTable { title, rows }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|row| row.iter().map(|cell| cell.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_rowspan_expands_into_following_rows() {
        let html = r#"<table>
            <tr><td>Category</td><td>Metric</td><td>2022</td></tr>
            <tr><td rowspan="3">Emissions</td><td>Scope 1</td><td>10</td></tr>
            <tr><td>Scope 2</td><td>20</td></tr>
            <tr><td>Scope 3</td><td>30</td></tr>
            <tr><td>Water</td><td>Withdrawal</td><td>5</td></tr>
        </table>"#;
        let tables = parse_html_tables(html).unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(
            tables[0].rows,
            grid(&[
                &["Category", "Metric", "2022"],
                &["Emissions", "Scope 1", "10"],
                &["Emissions", "Scope 2", "20"],
                &["Emissions", "Scope 3", "30"],
                &["Water", "Withdrawal", "5"],
            ])
        );
    }

    #[test]
    fn test_rowspan_in_trailing_column() {
        let html = r#"<table>
            <tr><td>a</td><td rowspan="2">note</td></tr>
            <tr><td>b</td></tr>
        </table>"#;
        let tables = parse_html_tables(html).unwrap();
        assert_eq!(tables[0].rows, grid(&[&["a", "note"], &["b", "note"]]));
    }

    #[test]
    fn test_malformed_rowspan_is_ignored() {
        let html = r#"<table>
            <tr><td rowspan="two">x</td><td>1</td></tr>
            <tr><td>y</td><td>2</td></tr>
        </table>"#;
        let tables = parse_html_tables(html).unwrap();
        assert_eq!(tables[0].rows, grid(&[&["x", "1"], &["y", "2"]]));
    }

    #[test]
    fn test_empty_row_splits_tables() {
        let html = r#"<table>
            <tr><td>Energy</td><td>2021</td></tr>
            <tr><td>Electricity</td><td>4</td></tr>
            <tr><td></td><td> </td></tr>
            <tr><td>Water</td><td>2021</td></tr>
            <tr><td>Withdrawal</td><td>7</td></tr>
        </table>"#;
        let tables = parse_html_tables(html).unwrap();
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[1].rows[0], vec!["Water", "2021"]);
    }

    #[test]
    fn test_short_first_row_becomes_title() {
        let html = r#"<table>
            <tr><th>GHG emissions (tCO2e)</th></tr>
            <tr><th></th><th>2021</th><th>2022</th></tr>
            <tr><td>Scope 1</td><td>1,200</td><td>1,100</td></tr>
        </table>"#;
        let tables = parse_html_tables(html).unwrap();
        assert_eq!(tables[0].title, "GHG emissions (tCO2e)");
        assert_eq!(tables[0].rows.len(), 2);
        assert_eq!(
            tables[0].to_contexts(),
            vec!["Scope 1: For year 2021: 1,200, For year 2022: 1,100".to_string()]
        );
    }

    #[test]
    fn test_unescapes_json_quoting() {
        let html = r#""<table><tr><td colspan=""2"">Total</td><td>9</td></tr><tr><td>a</td><td>b</td></tr></table>""#;
        let tables = parse_html_tables(html).unwrap();
        assert_eq!(tables[0].rows[0], vec!["Total", "9"]);

        let html = r#"<table><tr><td rowspan=\"2\">k</td><td>1</td></tr><tr><td>2</td></tr></table>"#;
        let tables = parse_html_tables(html).unwrap();
        assert_eq!(tables[0].rows, grid(&[&["k", "1"], &["k", "2"]]));
    }

    #[test]
    fn test_cell_whitespace_is_collapsed() {
        let html = "<table><tr><td>  Total\n   Scope <b>1</b> </td>\
            <td>77,<i>476</i></td></tr></table>";
        let tables = parse_html_tables(html).unwrap();
        assert_eq!(tables[0].rows[0], vec!["Total Scope 1", "77,476"]);
    }

    #[test]
    fn test_nested_table_stays_out_of_outer_rows() {
        let html = r#"<table>
            <tr><td>Site</td><td>2022</td></tr>
            <tr><td>Plant A<table><tr><td>inner</td><td>1</td></tr></table></td><td>12</td></tr>
        </table>"#;
        let tables = parse_html_tables(html).unwrap();
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].rows, grid(&[&["Site", "2022"], &["Plant A", "12"]]));
        assert_eq!(tables[1].rows, grid(&[&["inner", "1"]]));
    }

    #[test]
    fn test_row_groups_are_walked() {
        let html = "<table><thead><tr><th>Metric</th><th>2022</th></tr></thead>\
                    <tbody><tr><td>Water</td><td>3</td></tr></tbody></table>";
        let tables = parse_html_tables(html).unwrap();
        assert_eq!(tables[0].rows, grid(&[&["Metric", "2022"], &["Water", "3"]]));
    }

    #[test]
    fn test_no_tables() {
        assert!(parse_html_tables("<p>No tables here</p>").unwrap().is_empty());
        assert!(parse_html_tables("").unwrap().is_empty());
    }

    #[test]
    fn test_contexts_with_year_header() {
        let table = HtmlTable {
            title: String::new(),
            rows: grid(&[&["...", "2022"], &["Total Scope 1", "77,476"]]),
        };
        assert_eq!(
            table.to_contexts(),
            vec!["Total Scope 1: For year 2022: 77,476".to_string()]
        );
    }

    #[test]
    fn test_contexts_keep_non_year_headers() {
        let table = HtmlTable {
            title: String::new(),
            rows: grid(&[
                &["Site", "Unit", "2,020", "FY2021"],
                &["Plant A", "MWh", "", "12"],
                &["Plant B", "", " ", ""],
            ]),
        };
        assert_eq!(
            table.to_contexts(),
            vec!["Plant A: Unit: MWh, FY2021: 12".to_string()]
        );
    }

    #[test]
    fn test_contexts_need_a_data_row_and_header() {
        let header_only = HtmlTable {
            title: String::new(),
            rows: grid(&[&["Metric", "2022"]]),
        };
        assert!(header_only.to_contexts().is_empty());

        let empty_header = HtmlTable {
            title: String::new(),
            rows: vec![Vec::new(), vec!["Scope 1".to_string(), "5".to_string()]],
        };
        assert!(empty_header.to_contexts().is_empty());

        assert!(HtmlTable::default().to_contexts().is_empty());
    }
}
