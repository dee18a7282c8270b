//! Heuristic reconstruction of multi-year tables from flattened page text
//!
//! Text extraction linearizes a visual table into one cell per line:
//!
//! ```text
//! GHG emissions
//! Unit
//! 2020
//! 2021
//! Scope 1
//! tCO2e
//! 12,345
//! 11,234
//! ```
//!
//! The scanner walks the lines once through an explicit phase machine
//! (`SeekingHeader` → `CollectingYears` → `InRow`) and recovers
//! category × year → value records. Anything that does not fit the pattern
//! ends the current table; absence of a table is never an error.

use super::html::HtmlTable;
use super::number::{parse_number, parse_number_or_not_available, Number};
use crate::error::{Error, Result};
use serde::Serialize;

/// How far past a row's first line the numeric run may start
const NAME_LOOKAHEAD: usize = 5;

/// Header line announcing an explicit unit column
const UNIT_MARKER: &str = "unit";

/// One value of a row, paired with its header year
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearValue {
    pub year: i32,
    pub number: Number,
}

/// One category of a recovered table
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TableRow {
    pub name: String,
    pub unit: String,
    pub year_values: Vec<YearValue>,
}

/// A table recovered from free text
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    pub title: String,
    pub rows: Vec<TableRow>,
}

impl Table {
    /// Header years in column order (taken from the first row)
    pub fn years(&self) -> Vec<i32> {
        self.rows
            .first()
            .map(|row| row.year_values.iter().map(|yv| yv.year).collect())
            .unwrap_or_default()
    }

    /// Flatten into one retrieval context sentence per row
    pub fn to_contexts(&self) -> Vec<String> {
        HtmlTable::from(self).to_contexts()
    }
}

/// Header resolved for the table currently being scanned
#[derive(Debug, Clone)]
struct Header {
    title: String,
    unit_column: bool,
    years: Vec<i32>,
}

#[derive(Debug)]
enum Phase {
    SeekingHeader {
        from: usize,
    },
    CollectingYears {
        header: Header,
        at: usize,
    },
    InRow {
        header: Header,
        rows: Vec<TableRow>,
        at: usize,
    },
    Done,
}

/// Recover every table on a page. Never fails: internal invariant violations
/// are logged and the tables completed before them are returned.
pub fn reconstruct_tables(page_text: &str) -> Vec<Table> {
    let mut scanner = Scanner::new(page_text);
    match scanner.run() {
        Ok(()) => {}
        Err(e) => {
            tracing::warn!(error = %e, "free-text table reconstruction aborted");
        }
    }
    scanner.tables
}

/// Recover every table on a page, surfacing internal invariant violations
pub fn try_reconstruct_tables(page_text: &str) -> Result<Vec<Table>> {
    let mut scanner = Scanner::new(page_text);
    scanner.run()?;
    Ok(scanner.tables)
}

struct Scanner<'a> {
    lines: Vec<&'a str>,
    tables: Vec<Table>,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            lines: text
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .collect(),
            tables: Vec::new(),
        }
    }

    fn run(&mut self) -> Result<()> {
        let mut phase = Phase::SeekingHeader { from: 0 };
        loop {
            phase = match phase {
                Phase::SeekingHeader { from } => self.seek_header(from),
                Phase::CollectingYears { header, at } => self.collect_years(header, at),
                Phase::InRow { header, rows, at } => self.scan_row(header, rows, at)?,
                Phase::Done => break,
            };
        }
        tracing::debug!(tables = self.tables.len(), "free-text tables recovered");
        Ok(())
    }

    fn is_numeric(&self, index: usize) -> bool {
        self.lines
            .get(index)
            .is_some_and(|line| parse_number_or_not_available(line).is_some())
    }

    fn is_unit_marker(&self, index: usize) -> bool {
        self.lines
            .get(index)
            .is_some_and(|line| line.eq_ignore_ascii_case(UNIT_MARKER))
    }

    fn is_year(&self, index: usize) -> bool {
        self.lines
            .get(index)
            .and_then(|line| parse_number(line))
            .is_some_and(|n| n.is_valid_year())
    }

    fn seek_header(&self, from: usize) -> Phase {
        if from >= self.lines.len() {
            return Phase::Done;
        }
        let first_year = (from..self.lines.len()).find(|&i| self.is_year(i));
        // a unit header only wins when no year-header run starts before it
        let unit_line = (from..first_year.unwrap_or(self.lines.len()))
            .find(|&i| self.is_unit_marker(i));

        if let Some(unit_line) = unit_line {
            let title = self.lines[from..unit_line]
                .iter()
                .rev()
                .find(|line| parse_number(line).is_none())
                .map(|line| line.to_string())
                .unwrap_or_default();
            return Phase::CollectingYears {
                header: Header {
                    title,
                    unit_column: true,
                    years: Vec::new(),
                },
                at: unit_line + 1,
            };
        }

        match first_year {
            Some(first_year) => {
                let title = first_year
                    .checked_sub(1)
                    .filter(|&prev| prev >= from && !self.is_numeric(prev))
                    .map(|prev| self.lines[prev].to_string())
                    .unwrap_or_default();
                Phase::CollectingYears {
                    header: Header {
                        title,
                        unit_column: false,
                        years: Vec::new(),
                    },
                    at: first_year,
                }
            }
            None => Phase::Done,
        }
    }

    fn collect_years(&self, mut header: Header, start: usize) -> Phase {
        let mut at = start;
        while let Some(number) = self.lines.get(at).and_then(|line| parse_number(line)) {
            if let Some(year) = number.year() {
                header.years.push(year);
            } else if header.unit_column && number.value < super::number::MIN_YEAR {
                // footnote marker between header years
            } else {
                break;
            }
            at += 1;
        }

        if header.years.is_empty() {
            // "unit" line without years: keep looking after it
            return Phase::SeekingHeader { from: start };
        }
        if at >= self.lines.len() || self.is_numeric(at) {
            // the year run is not followed by a row name
            return Phase::SeekingHeader { from: at };
        }

        tracing::trace!(title = %header.title, years = ?header.years, "table header");
        Phase::InRow {
            header,
            rows: Vec::new(),
            at,
        }
    }

    /// First index `j` in `(at, at + NAME_LOOKAHEAD]` where lines `j` and
    /// `j + 1` are both numeric or not-available. A unit marker before the
    /// run belongs to the next table's header.
    fn find_numeric_run(&self, at: usize) -> Option<usize> {
        let last = (at + NAME_LOOKAHEAD).min(self.lines.len().saturating_sub(2));
        for j in at + 1..=last {
            if self.is_unit_marker(j) {
                return None;
            }
            if self.is_numeric(j) && self.is_numeric(j + 1) {
                return Some(j);
            }
        }
        None
    }

    fn scan_row(&mut self, header: Header, mut rows: Vec<TableRow>, at: usize) -> Result<Phase> {
        let run = if self.is_numeric(at) || self.is_unit_marker(at) {
            None
        } else {
            self.find_numeric_run(at)
        };

        let Some(run) = run else {
            self.finish_table(header, rows);
            return Ok(Phase::SeekingHeader { from: at });
        };

        let (name_lines, unit) = if header.unit_column && run - at >= 2 {
            (&self.lines[at..run - 1], self.lines[run - 1].to_string())
        } else {
            (&self.lines[at..run], String::new())
        };
        let name = name_lines.join(" ");

        let capacity = header.years.len() + 1;
        let mut cells = Vec::with_capacity(capacity);
        let mut next = run;
        while cells.len() < capacity {
            match self
                .lines
                .get(next)
                .and_then(|line| parse_number_or_not_available(line))
            {
                Some(number) => cells.push(number),
                None => break,
            }
            next += 1;
        }

        if cells.len() == capacity {
            drop_footnote(&mut cells);
        }

        let row = pair_with_years(name, unit, cells, &header.years)?;
        rows.push(row);

        if self.is_numeric(next) {
            // numeric run longer than the header allows
            self.finish_table(header, rows);
            return Ok(Phase::SeekingHeader { from: next });
        }

        Ok(Phase::InRow {
            header,
            rows,
            at: next,
        })
    }

    fn finish_table(&mut self, header: Header, rows: Vec<TableRow>) {
        if rows.is_empty() {
            tracing::trace!(title = %header.title, "header without rows, no table");
            return;
        }
        self.tables.push(Table {
            title: header.title,
            rows,
        });
    }
}

/// Remove the spurious extra cell from a run holding one value more than the
/// header has years: the smallest valid value (first occurrence on ties), or
/// the trailing cell when no value is valid.
fn drop_footnote(cells: &mut Vec<Number>) {
    let smallest = cells
        .iter()
        .enumerate()
        .filter(|(_, n)| n.valid)
        .fold(None::<(usize, f64)>, |best, (i, n)| match best {
            Some((_, value)) if value <= n.value => best,
            _ => Some((i, n.value)),
        })
        .map(|(i, _)| i);

    match smallest {
        Some(index) => {
            cells.remove(index);
        }
        None => {
            cells.pop();
        }
    }
}

fn pair_with_years(
    name: String,
    unit: String,
    cells: Vec<Number>,
    years: &[i32],
) -> Result<TableRow> {
    if cells.len() > years.len() {
        return Err(Error::TableStructure {
            reason: format!(
                "row '{}' holds {} values for {} header years",
                name,
                cells.len(),
                years.len()
            ),
        });
    }

    let year_values = years
        .iter()
        .zip(cells)
        .map(|(&year, number)| YearValue { year, number })
        .collect();

    Ok(TableRow {
        name,
        unit,
        year_values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn values(row: &TableRow) -> Vec<(i32, Option<f64>)> {
        row.year_values
            .iter()
            .map(|yv| (yv.year, yv.number.valid.then_some(yv.number.value)))
            .collect()
    }

    #[test]
    fn test_unit_table() {
        let text = "\
Greenhouse gas emissions
Unit
2020
2021
2022
Scope 1
tCO2e
100
90
80
Scope 2
(market-based)
tCO2e
50
-
45
";
        let tables = reconstruct_tables(text);
        assert_eq!(tables.len(), 1);
        let table = &tables[0];
        assert_eq!(table.title, "Greenhouse gas emissions");
        assert_eq!(table.years(), vec![2020, 2021, 2022]);
        assert_eq!(table.rows.len(), 2);

        assert_eq!(table.rows[0].name, "Scope 1");
        assert_eq!(table.rows[0].unit, "tCO2e");
        assert_eq!(
            values(&table.rows[0]),
            vec![(2020, Some(100.0)), (2021, Some(90.0)), (2022, Some(80.0))]
        );

        assert_eq!(table.rows[1].name, "Scope 2 (market-based)");
        assert_eq!(table.rows[1].unit, "tCO2e");
        assert_eq!(
            values(&table.rows[1]),
            vec![(2020, Some(50.0)), (2021, None), (2022, Some(45.0))]
        );
    }

    #[test]
    fn test_title_skips_numeric_lines_before_unit() {
        let text = "Water withdrawal\n3\nUnit\n2021\n2022\nTotal\nML\n10\n12\n";
        let tables = reconstruct_tables(text);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].title, "Water withdrawal");
    }

    #[test]
    fn test_footnote_markers_in_year_header_are_skipped() {
        let text = "Energy\nUnit\n2021\n1\n2022\nElectricity\nMWh\n5\n6\n";
        let tables = reconstruct_tables(text);
        assert_eq!(tables[0].years(), vec![2021, 2022]);
        assert_eq!(
            values(&tables[0].rows[0]),
            vec![(2021, Some(5.0)), (2022, Some(6.0))]
        );
    }

    #[test]
    fn test_year_header_table_without_unit_column() {
        let text = "Employees by region\n2021\n2022\nEurope\n120\n130\nAsia Pacific\n80\n95\n";
        let tables = reconstruct_tables(text);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].title, "Employees by region");
        assert_eq!(tables[0].rows[0].name, "Europe");
        assert_eq!(tables[0].rows[0].unit, "");
        assert_eq!(tables[0].rows[1].name, "Asia Pacific");
        assert_eq!(
            values(&tables[0].rows[1]),
            vec![(2021, Some(80.0)), (2022, Some(95.0))]
        );
    }

    #[test]
    fn test_plain_prose_has_no_table() {
        let text = "We reduced emissions across all sites.\nThe program continues in 2024.\n";
        assert!(reconstruct_tables(text).is_empty());
        assert!(reconstruct_tables("").is_empty());
    }

    #[test]
    fn test_header_without_rows_is_abandoned() {
        let text = "Unit\n2021\n2022\nNo numbers follow this line\nNor this one\n";
        assert!(reconstruct_tables(text).is_empty());
    }

    #[test]
    fn test_extra_value_drops_minimum() {
        let text = "Waste\nUnit\n2020\n2021\n2022\nLandfill\nt\n300\n250\n2\n200\n";
        let tables = reconstruct_tables(text);
        assert_eq!(
            values(&tables[0].rows[0]),
            vec![(2020, Some(300.0)), (2021, Some(250.0)), (2022, Some(200.0))]
        );
    }

    #[test]
    fn test_extra_value_with_equal_values_drops_first() {
        let mut cells: Vec<Number> = ["7", "7", "7"]
            .iter()
            .filter_map(|t| parse_number(t))
            .collect();
        cells[1].original_text = "7*".to_string();
        drop_footnote(&mut cells);
        assert_eq!(cells.len(), 2);
        assert_eq!(cells[0].original_text, "7*");
    }

    #[test]
    fn test_extra_value_removes_legitimate_minimum() {
        // The heuristic cannot tell a real minimum from a footnote marker.
        let text = "Sites\nUnit\n2020\n2021\n2022\nAudited\ncount\n5\n10\n15\n7\n";
        let tables = reconstruct_tables(text);
        assert_eq!(
            values(&tables[0].rows[0]),
            vec![(2020, Some(10.0)), (2021, Some(15.0)), (2022, Some(7.0))]
        );
    }

    #[test]
    fn test_extra_value_all_not_available_drops_last() {
        let mut cells = vec![Number::not_available(); 3];
        cells[2].original_text = "last".to_string();
        drop_footnote(&mut cells);
        assert_eq!(cells, vec![Number::not_available(); 2]);
    }

    #[test]
    fn test_name_wraps_multiple_lines() {
        let text = "Emissions\nUnit\n2021\n2022\nTotal Scope 1\nand Scope 2\n\
            (location-based)\ntCO2e\n1,200\n1,100\n";
        let tables = reconstruct_tables(text);
        assert_eq!(tables[0].rows[0].name, "Total Scope 1 and Scope 2 (location-based)");
        assert_eq!(tables[0].rows[0].unit, "tCO2e");
    }

    #[test]
    fn test_name_beyond_lookahead_ends_table() {
        let text = "T\nUnit\n2021\n2022\nA\nB\nC\nD\nE\nF\nG\n1\n2\n";
        assert!(reconstruct_tables(text).is_empty());
    }

    #[test]
    fn test_multiple_tables_on_one_page() {
        let text = "\
Energy use
Unit
2021
2022
Electricity
MWh
10
20
Water use
Unit
2021
2022
Withdrawal
ML
3
4
";
        let tables = reconstruct_tables(text);
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].title, "Energy use");
        assert_eq!(tables[0].rows.len(), 1);
        assert_eq!(tables[1].title, "Water use");
        assert_eq!(tables[1].rows[0].name, "Withdrawal");
    }

    #[test]
    fn test_year_header_table_before_unit_table() {
        let text = "\
Employees by region
2021
2022
Europe
120
130
Asia
80
95
Energy use
Unit
2021
2022
Electricity
MWh
10
20
";
        let tables = reconstruct_tables(text);
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].title, "Employees by region");
        assert_eq!(tables[0].rows.len(), 2);
        assert_eq!(tables[0].rows[1].name, "Asia");
        assert_eq!(tables[1].title, "Energy use");
        assert_eq!(tables[1].rows[0].name, "Electricity");
        assert_eq!(tables[1].rows[0].unit, "MWh");
    }

    #[test]
    fn test_unit_title_never_comes_from_previous_table() {
        let text = "Headcount\n2021\n2022\nStaff\n5\n6\nUnit\n2021\n2022\nWater\nML\n1\n2\n";
        let tables = reconstruct_tables(text);
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].title, "Headcount");
        assert_eq!(
            values(&tables[0].rows[0]),
            vec![(2021, Some(5.0)), (2022, Some(6.0))]
        );
        assert_eq!(tables[1].title, "");
        assert_eq!(tables[1].rows[0].name, "Water");
        assert_eq!(tables[1].rows[0].unit, "ML");
    }

    #[test]
    fn test_short_row_pairs_leading_years() {
        let text = "Metric\nUnit\n2020\n2021\n2022\nIntensity\nratio\n0.5\n0.4\n\
            Closing remarks follow here.\n";
        let tables = reconstruct_tables(text);
        assert_eq!(
            values(&tables[0].rows[0]),
            vec![(2020, Some(0.5)), (2021, Some(0.4))]
        );
    }

    #[test]
    fn test_pair_with_years_rejects_overflow() {
        let cells = vec![Number::not_available(); 3];
        let result = pair_with_years("row".into(), String::new(), cells, &[2021, 2022]);
        assert!(matches!(result, Err(Error::TableStructure { .. })));
    }

    #[test]
    fn test_table_contexts() {
        let text = "Emissions\nUnit\n2021\n2022\nScope 1\ntCO2e\n1,200\n-\n";
        let tables = reconstruct_tables(text);
        assert_eq!(
            tables[0].to_contexts(),
            vec!["Scope 1 (tCO2e): For year 2021: 1,200".to_string()]
        );
    }
}
