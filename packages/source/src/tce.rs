//! Retail exchange rates by banking entity (TCE).
//!
//! The page is requested per day and coin. Each body row is an entity with
//! twelve quotes: for each of 11, 13 and 15 hs, counter buy, counter sell,
//! electronic buy and electronic sell.

use bcra_scraper_models::{CellRef, DateRange, FieldSpec, InstrumentSchema, InstrumentSpec, Table, WideRow};
use bcra_scraper_panel::{reshape::tables_by_instrument, store::PanelLayout};
use bcra_scraper_scraper::{
    PageRequest,
    fetch::{RawContent, WorkUnit, per_date},
    html_table::{DEFAULT_TABLE_SELECTOR, TableParser},
    normalize::format_day,
};
use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, Display, EnumIter};

use crate::{
    SourceError,
    config::DriverConfig,
    driver::{COIN_SELECTOR, Publication},
};

/// Where the quote was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum Channel {
    /// Over the counter.
    Mostrador,
    /// Electronic banking.
    Electronico,
}

/// Side of the quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum Flow {
    /// Buy.
    Compra,
    /// Sell.
    Venta,
}

/// Time of the quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr, EnumIter)]
pub enum Hour {
    /// 11:00.
    #[strum(serialize = "11hs")]
    H11,
    /// 13:00.
    #[strum(serialize = "13hs")]
    H13,
    /// 15:00.
    #[strum(serialize = "15hs")]
    H15,
}

/// Cell index of a quote within an entity row.
#[must_use]
pub const fn column(channel: Channel, flow: Flow, hour: Hour) -> usize {
    let block = match hour {
        Hour::H11 => 0,
        Hour::H13 => 4,
        Hour::H15 => 8,
    };
    let offset = match (channel, flow) {
        (Channel::Mostrador, Flow::Compra) => 1,
        (Channel::Mostrador, Flow::Venta) => 2,
        (Channel::Electronico, Flow::Compra) => 3,
        (Channel::Electronico, Flow::Venta) => 4,
    };
    block + offset
}

/// Canonical field name of a quote.
#[must_use]
pub fn field_name(coin: &str, entity: &str, channel: Channel, flow: Flow, hour: Hour) -> String {
    format!("tc_ars_{coin}_{entity}_{channel}_{flow}_{hour}")
}

/// TCE publication.
pub struct Tce {
    schema: InstrumentSchema,
    parser: TableParser,
}

impl Tce {
    /// Builds the publication from the `coins` and `entities` maps.
    ///
    /// # Errors
    ///
    /// * [`SourceError::Scrape`] if the table parser cannot be built
    pub fn new(config: &DriverConfig) -> Result<Self, SourceError> {
        let instruments = config
            .instruments
            .iter()
            .map(|(coin, label)| {
                let mut fields = Vec::new();
                for (entity, entity_label) in &config.entities {
                    for flow in Flow::iter() {
                        for channel in Channel::iter() {
                            for hour in Hour::iter() {
                                fields.push(
                                    FieldSpec::new(
                                        field_name(coin, entity, channel, flow, hour),
                                        CellRef::ContainingRow {
                                            label: entity_label.clone(),
                                            column: column(channel, flow, hour),
                                        },
                                    )
                                    .with_dimensions(vec![
                                        entity.clone(),
                                        channel.to_string(),
                                        flow.to_string(),
                                        hour.to_string(),
                                    ]),
                                );
                            }
                        }
                    }
                }
                InstrumentSpec::new(coin.clone(), label.clone(), fields)
            })
            .collect();

        Ok(Self {
            schema: InstrumentSchema::new(instruments),
            parser: TableParser::new(DEFAULT_TABLE_SELECTOR)?,
        })
    }
}

impl Publication for Tce {
    fn schema(&self) -> &InstrumentSchema {
        &self.schema
    }

    fn panel_layout(&self) -> PanelLayout {
        PanelLayout::new(Some("coin"), &["entity", "channel", "flow", "hour"])
    }

    fn work_units(&self, range: &DateRange) -> Vec<WorkUnit> {
        per_date(range, &self.schema)
    }

    fn request(&self, unit: &WorkUnit, _range: &DateRange) -> PageRequest {
        let request = PageRequest::new(unit.label.clone()).with_selector(COIN_SELECTOR);
        match unit.date {
            Some(date) => request.with_field("fecha", format_day(date)),
            None => request,
        }
    }

    /// Every fetched day produces a row, even when the page had no quotes.
    fn parse(&self, contents: &[RawContent], _range: &DateRange) -> Vec<WideRow> {
        contents
            .iter()
            .filter_map(|raw| {
                let date = raw.unit.date?;
                let instrument = self.schema.instrument(&raw.unit.instrument)?;
                let markup = raw.content.as_deref()?;
                Some(
                    self.parser
                        .parse(markup, date, instrument)
                        .or_missing(date, instrument),
                )
            })
            .collect()
    }

    fn tables(&self, rows: &[WideRow]) -> Vec<Table> {
        tables_by_instrument(rows, &self.schema, |_, field| field.name.clone())
    }

    fn file_name(&self, table: &str) -> String {
        format!("tce-{}.csv", table.replace('_', "-"))
    }
}
