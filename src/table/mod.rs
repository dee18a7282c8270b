//! Table recovery from page text and from HTML fragments

mod freetext;
mod html;
mod number;

pub use freetext::{reconstruct_tables, try_reconstruct_tables, Table, TableRow, YearValue};
pub use html::{parse_html_tables, HtmlTable};
pub use number::{parse_number, parse_number_or_not_available, Number, MAX_YEAR, MIN_YEAR};
