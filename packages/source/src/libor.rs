//! Libor rates by tenor.
//!
//! The page is requested one day at a time (`fecha`). It lists one row per
//! tenor (`30`, `60`, ...) and states the publication date in its header;
//! on days without publication it shows the latest table, which the header
//! date check rejects.

use bcra_scraper_models::{CellRef, DateRange, FieldSpec, InstrumentSchema, InstrumentSpec, Table, WideRow};
use bcra_scraper_panel::{reshape::tables_by_instrument, store::PanelLayout};
use bcra_scraper_scraper::{
    PageRequest,
    fetch::{RawContent, WorkUnit, per_date},
    html_table::{DEFAULT_TABLE_SELECTOR, TableParser},
    normalize::format_day,
};

use crate::{SourceError, config::DriverConfig, driver::Publication};

/// Identifier of the single Libor instrument.
pub const INSTRUMENT: &str = "libor";

/// Libor publication.
pub struct Libor {
    schema: InstrumentSchema,
    labels: Vec<(String, String)>,
    parser: TableParser,
}

impl Libor {
    /// Builds the publication from the `rates` map (tenor → column label).
    ///
    /// # Errors
    ///
    /// * [`SourceError::Scrape`] if the table parser cannot be built
    pub fn new(config: &DriverConfig) -> Result<Self, SourceError> {
        let fields = config
            .instrument_keys()
            .map(|tenor| {
                FieldSpec::new(
                    tenor,
                    CellRef::LabeledRow {
                        label: tenor.to_owned(),
                        column: 1,
                    },
                )
            })
            .collect();

        Ok(Self {
            schema: InstrumentSchema::new(vec![InstrumentSpec::new(INSTRUMENT, INSTRUMENT, fields)]),
            labels: config.instruments.clone(),
            parser: TableParser::new(DEFAULT_TABLE_SELECTOR)?.with_header_date(true),
        })
    }

    fn label(&self, tenor: &str) -> String {
        self.labels
            .iter()
            .find(|(key, _)| key == tenor)
            .map_or_else(|| tenor.to_owned(), |(_, label)| label.clone())
    }
}

impl Publication for Libor {
    fn schema(&self) -> &InstrumentSchema {
        &self.schema
    }

    fn panel_layout(&self) -> PanelLayout {
        PanelLayout::new(None, &["type"])
    }

    fn work_units(&self, range: &DateRange) -> Vec<WorkUnit> {
        per_date(range, &self.schema)
    }

    fn request(&self, unit: &WorkUnit, _range: &DateRange) -> PageRequest {
        let request = PageRequest::new(unit.label.clone());
        match unit.date {
            Some(date) => request.with_field("fecha", format_day(date)),
            None => request,
        }
    }

    /// Days without a published table produce no row.
    fn parse(&self, contents: &[RawContent], _range: &DateRange) -> Vec<WideRow> {
        contents
            .iter()
            .filter_map(|raw| {
                let date = raw.unit.date?;
                let instrument = self.schema.instrument(&raw.unit.instrument)?;
                let markup = raw.content.as_deref()?;
                let row = self
                    .parser
                    .parse(markup, date, instrument)
                    .or_missing(date, instrument);
                (!row.is_all_missing()).then_some(row)
            })
            .collect()
    }

    fn tables(&self, rows: &[WideRow]) -> Vec<Table> {
        tables_by_instrument(rows, &self.schema, |_, field| self.label(&field.name))
    }

    fn file_name(&self, _table: &str) -> String {
        "tasas-libor.csv".to_owned()
    }
}
