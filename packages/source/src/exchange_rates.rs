//! Pass (USD) and local-currency exchange rates per coin.
//!
//! One page per coin covers the whole range (`desde`/`hasta`). Each body
//! row is a day: pass rate in column 1, local rate in column 2. Output is
//! one table per rate with a column per coin.

use bcra_scraper_models::{CellRef, DateRange, FieldSpec, InstrumentSchema, InstrumentSpec, Table, WideRow};
use bcra_scraper_panel::{reshape::tables_by_field, store::PanelLayout};
use bcra_scraper_scraper::{
    PageRequest,
    fetch::{RawContent, WorkUnit, per_instrument},
    html_table::{DEFAULT_TABLE_SELECTOR, TableParser},
    normalize::format_day,
};

use crate::{
    SourceError,
    config::DriverConfig,
    driver::{COIN_SELECTOR, Publication},
};

/// Pass rate, in US dollars per unit.
pub const TP_USD: &str = "tp_usd";
/// Exchange rate in local currency per unit.
pub const TC_LOCAL: &str = "tc_local";

/// Exchange-rate publication.
pub struct ExchangeRates {
    schema: InstrumentSchema,
    parser: TableParser,
}

impl ExchangeRates {
    /// Builds the publication from the `coins` map.
    ///
    /// # Errors
    ///
    /// * [`SourceError::Scrape`] if the table parser cannot be built
    pub fn new(config: &DriverConfig) -> Result<Self, SourceError> {
        let instruments = config
            .instruments
            .iter()
            .map(|(coin, label)| {
                InstrumentSpec::new(
                    coin.clone(),
                    label.clone(),
                    vec![
                        FieldSpec::new(TP_USD, CellRef::DateRow { column: 1 }),
                        FieldSpec::new(TC_LOCAL, CellRef::DateRow { column: 2 }),
                    ],
                )
            })
            .collect();

        Ok(Self {
            schema: InstrumentSchema::new(instruments),
            parser: TableParser::new(DEFAULT_TABLE_SELECTOR)?.with_head_required(true),
        })
    }
}

impl Publication for ExchangeRates {
    fn schema(&self) -> &InstrumentSchema {
        &self.schema
    }

    fn panel_layout(&self) -> PanelLayout {
        PanelLayout::new(Some("coin"), &["type"])
    }

    fn work_units(&self, _range: &DateRange) -> Vec<WorkUnit> {
        per_instrument(&self.schema)
    }

    fn request(&self, unit: &WorkUnit, range: &DateRange) -> PageRequest {
        PageRequest::new(unit.label.clone())
            .with_selector(COIN_SELECTOR)
            .with_field("desde", format_day(range.start))
            .with_field("hasta", format_day(range.end))
    }

    /// Only days listed on a coin's page produce a row.
    fn parse(&self, contents: &[RawContent], range: &DateRange) -> Vec<WideRow> {
        contents
            .iter()
            .filter_map(|raw| {
                let instrument = self.schema.instrument(&raw.unit.instrument)?;
                let markup = raw.content.as_deref()?;
                Some(self.parser.parse_days(markup, range.days(), instrument))
            })
            .flatten()
            .filter(|row| !row.is_all_missing())
            .collect()
    }

    fn tables(&self, rows: &[WideRow]) -> Vec<Table> {
        tables_by_field(rows, &self.schema, &[TP_USD, TC_LOCAL])
    }

    /// `tables` only yields [`TP_USD`] and [`TC_LOCAL`].
    fn file_name(&self, table: &str) -> String {
        if table == TP_USD {
            "tipos-pase-usd-series.csv".to_owned()
        } else {
            "tipos-cambio-local-series.csv".to_owned()
        }
    }
}
