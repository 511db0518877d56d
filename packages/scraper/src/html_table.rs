//! HTML table extraction.
//!
//! Locates the BCRA data table on a page via CSS selector and reads the
//! cells named by each field's [`CellRef`] for one target date. A page
//! without the table (or without its body) is a legitimate "no data"
//! answer and yields an all-missing row.

use bcra_scraper_models::{CellRef, InstrumentSpec, WideRow};
use chrono::NaiveDate;
use scraper::{ElementRef, Html, Selector};

use crate::{
    ScrapeError,
    normalize::{format_day, normalize_decimal},
};

/// Class signature shared by the data tables on BCRA pages.
pub const DEFAULT_TABLE_SELECTOR: &str = "table.table-BCRA";

/// Result of parsing one page for one date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    /// A row carrying every field of the instrument. Fields not present on
    /// the page are missing.
    Parsed(WideRow),
    /// The table exists but does not have the shape the schema expects.
    Malformed(String),
}

impl ParseOutcome {
    /// Returns the parsed row, or an all-missing row for a malformed page.
    #[must_use]
    pub fn or_missing(self, date: NaiveDate, instrument: &InstrumentSpec) -> WideRow {
        match self {
            Self::Parsed(row) => row,
            Self::Malformed(reason) => {
                log::debug!(
                    "Malformed table for '{}' on {date}, treating as missing: {reason}",
                    instrument.id
                );
                WideRow::missing(date, instrument)
            }
        }
    }
}

/// Extracts [`WideRow`]s from BCRA data tables.
#[derive(Debug, Clone)]
pub struct TableParser {
    table: Selector,
    head: Selector,
    body: Selector,
    row: Selector,
    cell: Selector,
    require_head: bool,
    header_date: bool,
}

impl TableParser {
    /// Creates a parser for tables matching `table_selector`.
    ///
    /// # Errors
    ///
    /// * [`ScrapeError::InvalidSelector`] if the selector does not compile
    pub fn new(table_selector: &str) -> Result<Self, ScrapeError> {
        Ok(Self {
            table: parse_selector(table_selector)?,
            head: parse_selector("thead")?,
            body: parse_selector("tbody")?,
            row: parse_selector("tr")?,
            cell: parse_selector("td")?,
            require_head: false,
            header_date: false,
        })
    }

    /// Treats a table without `<thead>` as "no data".
    #[must_use]
    pub const fn with_head_required(mut self, require: bool) -> Self {
        self.require_head = require;
        self
    }

    /// Only accepts pages whose `<thead>` mentions the target date.
    ///
    /// Pages like the Libor one answer with the latest published table when
    /// the requested day has no data; the header date tells them apart.
    #[must_use]
    pub const fn with_header_date(mut self, check: bool) -> Self {
        self.header_date = check;
        self.require_head = self.require_head || check;
        self
    }

    /// Parses `markup` for `date`.
    #[must_use]
    pub fn parse(&self, markup: &str, date: NaiveDate, instrument: &InstrumentSpec) -> ParseOutcome {
        self.parse_document(&Html::parse_document(markup), date, instrument)
    }

    /// Parses one page holding a date range, yielding a row per day.
    ///
    /// Days the table does not list, and malformed results, become
    /// all-missing rows. A page without the table structure yields nothing.
    #[must_use]
    pub fn parse_days(
        &self,
        markup: &str,
        days: impl IntoIterator<Item = NaiveDate>,
        instrument: &InstrumentSpec,
    ) -> Vec<WideRow> {
        let document = Html::parse_document(markup);
        if !self.has_structure(&document) {
            log::debug!("No data table on the page for '{}'", instrument.id);
            return Vec::new();
        }
        days.into_iter()
            .map(|date| {
                self.parse_document(&document, date, instrument)
                    .or_missing(date, instrument)
            })
            .collect()
    }

    /// Whether the document has the table, its body and, when required, a
    /// header row.
    fn has_structure(&self, document: &Html) -> bool {
        document.select(&self.table).next().is_some_and(|table| {
            (!self.require_head || self.head_of(table).is_some())
                && table.select(&self.body).next().is_some()
        })
    }

    /// The `<thead>` of `table`, if it has at least one row.
    fn head_of<'a>(&self, table: ElementRef<'a>) -> Option<ElementRef<'a>> {
        table
            .select(&self.head)
            .next()
            .filter(|head| head.select(&self.row).next().is_some())
    }

    /// Parses an already-loaded document for `date`.
    ///
    /// Pages that hold a whole date range are loaded once and parsed for
    /// each day.
    #[must_use]
    pub fn parse_document(
        &self,
        document: &Html,
        date: NaiveDate,
        instrument: &InstrumentSpec,
    ) -> ParseOutcome {
        let mut row = WideRow::missing(date, instrument);

        let Some(table) = document.select(&self.table).next() else {
            return ParseOutcome::Parsed(row);
        };
        let head = self.head_of(table);
        if self.require_head && head.is_none() {
            return ParseOutcome::Parsed(row);
        }
        let Some(body) = table.select(&self.body).next() else {
            return ParseOutcome::Parsed(row);
        };

        let day = format_day(date);
        if self.header_date && !head.is_some_and(|h| text_of(h).contains(&day)) {
            return ParseOutcome::Parsed(row);
        }

        let rows: Vec<Vec<String>> = body
            .select(&self.row)
            .map(|tr| tr.select(&self.cell).map(text_of).collect::<Vec<_>>())
            .filter(|cells| !cells.is_empty())
            .collect();

        for field in &instrument.fields {
            let located = rows.iter().find(|cells| {
                let first = cells[0].as_str();
                match &field.cell {
                    CellRef::DateRow { .. } => first == day,
                    CellRef::LabeledRow { label, .. } => first == label,
                    CellRef::ContainingRow { label, .. } => first.contains(label.as_str()),
                }
            });
            let Some(cells) = located else {
                continue;
            };

            let column = field.cell.column();
            let Some(text) = cells.get(column) else {
                return ParseOutcome::Malformed(format!(
                    "row '{}' has {} cells, field '{}' reads cell {column}",
                    cells[0],
                    cells.len(),
                    field.name
                ));
            };
            let value = match normalize_decimal(text) {
                Ok(value) => value,
                Err(e) => return ParseOutcome::Malformed(format!("field '{}': {e}", field.name)),
            };
            if let Err(e) = row.set(&field.name, value) {
                return ParseOutcome::Malformed(e.to_string());
            }
        }

        ParseOutcome::Parsed(row)
    }
}

fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_owned()
}

fn parse_selector(selector: &str) -> Result<Selector, ScrapeError> {
    Selector::parse(selector).map_err(|e| ScrapeError::InvalidSelector {
        selector: selector.to_owned(),
        message: e.to_string(),
    })
}
