//! Local currency payment system (SML) rates.
//!
//! The page holds the full history for the selected coin, one row per day
//! with four rates. Each coin has its own set of rates, so only the coins
//! listed in [`coin_types`] are accepted.

use bcra_scraper_models::{CellRef, DateRange, FieldSpec, InstrumentSchema, InstrumentSpec, Table, WideRow};
use bcra_scraper_panel::{reshape::tables_by_instrument, store::PanelLayout};
use bcra_scraper_scraper::{
    PageRequest,
    fetch::{RawContent, WorkUnit, per_instrument},
    html_table::{DEFAULT_TABLE_SELECTOR, TableParser},
};

use crate::{
    SourceError,
    config::DriverConfig,
    driver::{COIN_SELECTOR, Publication},
};

const REFERENCE: &str = "Tipo de cambio de Referencia";

/// Rate types published for `coin`, in column order, or `None` for a coin
/// the SML page does not cover.
#[must_use]
pub fn coin_types(coin: &str) -> Option<[&'static str; 4]> {
    match coin {
        "peso_uruguayo" => Some([
            REFERENCE,
            "Tipo de cambio URINUSCA",
            "Tipo de cambio SML Peso Uruguayo",
            "Tipo de cambio SML Uruguayo Peso",
        ]),
        "real" => Some([
            REFERENCE,
            "Tipo de cambio PTAX",
            "Tipo de cambio SML Peso Real",
            "Tipo de cambio SML Real Peso",
        ]),
        _ => None,
    }
}

/// SML publication.
pub struct Sml {
    schema: InstrumentSchema,
    parser: TableParser,
}

impl Sml {
    /// Builds the publication from the `coins` map.
    ///
    /// # Errors
    ///
    /// * [`SourceError::InvalidConfiguration`] if a coin is not covered
    /// * [`SourceError::Scrape`] if the table parser cannot be built
    pub fn new(config: &DriverConfig) -> Result<Self, SourceError> {
        let instruments = config
            .instruments
            .iter()
            .map(|(coin, label)| {
                let types = coin_types(coin).ok_or_else(|| SourceError::InvalidConfiguration {
                    message: format!(
                        "The coin '{coin}' is not published by SML, expected peso_uruguayo or real"
                    ),
                })?;
                let fields = types
                    .iter()
                    .zip(1..)
                    .map(|(name, column)| FieldSpec::new(*name, CellRef::DateRow { column }))
                    .collect();
                Ok(InstrumentSpec::new(coin.clone(), label.clone(), fields))
            })
            .collect::<Result<Vec<_>, SourceError>>()?;

        Ok(Self {
            schema: InstrumentSchema::new(instruments),
            parser: TableParser::new(DEFAULT_TABLE_SELECTOR)?.with_head_required(true),
        })
    }
}

impl Publication for Sml {
    fn schema(&self) -> &InstrumentSchema {
        &self.schema
    }

    fn panel_layout(&self) -> PanelLayout {
        PanelLayout::new(Some("coin"), &["type"])
    }

    fn work_units(&self, _range: &DateRange) -> Vec<WorkUnit> {
        per_instrument(&self.schema)
    }

    fn request(&self, unit: &WorkUnit, _range: &DateRange) -> PageRequest {
        PageRequest::new(unit.label.clone()).with_selector(COIN_SELECTOR)
    }

    /// Every day of the range gets a row per coin whose page has the rates
    /// table, all-missing when the table does not list that day.
    fn parse(&self, contents: &[RawContent], range: &DateRange) -> Vec<WideRow> {
        let mut rows: Vec<WideRow> = contents
            .iter()
            .filter_map(|raw| {
                let instrument = self.schema.instrument(&raw.unit.instrument)?;
                let markup = raw.content.as_deref()?;
                Some(self.parser.parse_days(markup, range.days(), instrument))
            })
            .flatten()
            .collect();
        rows.sort_by_key(|row| (row.date, self.schema.position(&row.instrument)));
        rows
    }

    fn tables(&self, rows: &[WideRow]) -> Vec<Table> {
        tables_by_instrument(rows, &self.schema, |_, field| field.name.clone())
    }

    fn file_name(&self, table: &str) -> String {
        format!("sml-{}.csv", table.replace('_', "-"))
    }
}

#[cfg(test)]
mod tests {
    use bcra_scraper_models::FieldValue;
    use rust_decimal::Decimal;

    use super::*;
    use crate::{
        config::DriverKind,
        driver::Driver,
        testing::{StubFetcher, day, temp_path},
    };

    const URUGUAYO_PAGE: &str = r#"
        <table colspan="3" class="table table-BCRA table-bordered
        table-hover table-responsive">
            <thead>
                <tr>
                    <th>Fecha</th>
                    <th>Tipo de cambio de Referencia</th>
                    <th>Tipo de cambio URINUSCA</th>
                    <th>Tipo de cambio SML Peso Uruguayo</th>
                    <th>Tipo de cambio SML Uruguayo Peso</th>
                </tr>
            </thead>
            <tbody>
                <tr>
                    <td>11/04/2019</td>
                    <td>42,91170</td>
                    <td>34,12800</td>
                    <td>1,25740</td>
                    <td>0,79535</td>
                </tr>
            </tbody>
        </table>
    "#;

    const REAL_PAGE: &str = r#"
        <table colspan="3" class="table table-BCRA table-bordered table-hover table-responsive">
            <thead>
                <tr><th>Fecha</th><th>Tipo de cambio de Referencia</th><th>Tipo de cambio PTAX</th>
                    <th>Tipo de cambio SML Peso Real</th><th>Tipo de cambio SML Real Peso</th></tr>
            </thead>
            <tbody>
                <tr><td>11/04/2019</td><td>42,91170</td><td>3,83960</td><td>11,17610</td><td>0,08950</td></tr>
                <tr><td>12/04/2019</td><td>42,10000</td><td>3,80000</td><td>11,00000</td><td>0,09000</td></tr>
            </tbody>
        </table>
    "#;

    const EMPTY_PAGE: &str = r#"
        <table colspan="3" class="table table-BCRA table-bordered table-hover table-responsive">
            <thead></thead>
            <tbody></tbody>
        </table>
    "#;

    fn config(panel: &str) -> DriverConfig {
        let json = format!(
            r#"{{"sml": {{"url": "http://bcra/sml",
                "coins": {{"peso_uruguayo": "Peso Uruguayo", "real": "Real"}},
                "intermediate_panel_path": "{}"}}}}"#,
            temp_path(panel).display()
        );
        DriverConfig::from_json(&json, DriverKind::Sml).unwrap()
    }

    fn value(s: &str) -> FieldValue {
        FieldValue::Value(s.parse::<Decimal>().unwrap())
    }

    #[tokio::test]
    async fn one_table_per_coin() {
        let config = config("sml_tables");
        let fetcher = StubFetcher::new(vec![Some(URUGUAYO_PAGE), Some(REAL_PAGE)]);
        let mut driver = Driver::new(Sml::new(&config).unwrap(), fetcher, &config);

        let output = driver.run(day(2019, 4, 11), day(2019, 4, 11)).await.unwrap();
        let fetcher = driver.into_fetcher();
        std::fs::remove_file(&config.intermediate_panel_path).unwrap();

        let uruguayo = output.table("peso_uruguayo").unwrap();
        assert_eq!(
            uruguayo.header(),
            vec![
                "indice_tiempo",
                "Tipo de cambio de Referencia",
                "Tipo de cambio URINUSCA",
                "Tipo de cambio SML Peso Uruguayo",
                "Tipo de cambio SML Uruguayo Peso"
            ]
        );
        assert_eq!(uruguayo.rows.len(), 1);
        assert_eq!(uruguayo.value(0, "Tipo de cambio URINUSCA"), Some(value("34.12800")));
        assert_eq!(uruguayo.value(0, "Tipo de cambio SML Uruguayo Peso"), Some(value("0.79535")));

        let real = output.table("real").unwrap();
        assert_eq!(real.rows.len(), 1);
        assert_eq!(real.value(0, "Tipo de cambio PTAX"), Some(value("3.83960")));

        assert_eq!(fetcher.requests.len(), 2);
        assert!(fetcher.requests.iter().all(|r| r.fields.is_empty()));
        assert_eq!(fetcher.requests[1].input_value, "Real");
    }

    #[tokio::test]
    async fn unlisted_days_are_kept_as_missing_rows() {
        let config = config("sml_unlisted");
        let fetcher = StubFetcher::new(vec![Some(URUGUAYO_PAGE), Some(REAL_PAGE)]);
        let mut driver = Driver::new(Sml::new(&config).unwrap(), fetcher, &config);

        let output = driver.run(day(2019, 4, 11), day(2019, 4, 12)).await.unwrap();
        let panel = std::fs::read_to_string(&config.intermediate_panel_path).unwrap();
        std::fs::remove_file(&config.intermediate_panel_path).unwrap();

        let uruguayo = output.table("peso_uruguayo").unwrap();
        let dates: Vec<_> = uruguayo.rows.iter().map(|row| row.date).collect();
        assert_eq!(dates, vec![day(2019, 4, 11), day(2019, 4, 12)]);
        assert_eq!(uruguayo.value(0, "Tipo de cambio URINUSCA"), Some(value("34.12800")));
        assert!(uruguayo.rows[1].values.iter().all(FieldValue::is_missing));
        assert_eq!(output.table("real").unwrap().rows.len(), 2);
        assert!(panel.contains("2019-04-12,peso_uruguayo,Tipo de cambio URINUSCA,\n"));
    }

    #[tokio::test]
    async fn empty_table_has_no_rows() {
        let config = config("sml_empty_table");
        let fetcher = StubFetcher::new(vec![Some(EMPTY_PAGE), Some(EMPTY_PAGE)]);
        let mut driver = Driver::new(Sml::new(&config).unwrap(), fetcher, &config);

        let output = driver.run(day(2019, 4, 11), day(2019, 4, 11)).await.unwrap();
        std::fs::remove_file(&config.intermediate_panel_path).unwrap();

        assert!(output.is_empty());
    }

    #[tokio::test]
    async fn empty_range_fetches_nothing() {
        let config = config("sml_empty_range");
        let mut driver = Driver::new(Sml::new(&config).unwrap(), StubFetcher::new(vec![]), &config);

        let output = driver.run(day(2019, 4, 13), day(2019, 4, 12)).await.unwrap();
        let fetcher = driver.into_fetcher();
        std::fs::remove_file(&config.intermediate_panel_path).unwrap();

        assert!(output.is_empty());
        assert!(fetcher.requests.is_empty());
    }

    #[tokio::test]
    async fn cached_range_is_a_subset_of_the_panel() {
        let config = config("sml_cache");
        Driver::new(
            Sml::new(&config).unwrap(),
            StubFetcher::new(vec![Some(URUGUAYO_PAGE), Some(REAL_PAGE)]),
            &config,
        )
        .run(day(2019, 4, 11), day(2019, 4, 12))
        .await
        .unwrap();

        let output = Driver::new(Sml::new(&config).unwrap(), StubFetcher::new(vec![]), &config)
            .with_intermediate_panel(true)
            .run(day(2019, 4, 12), day(2019, 4, 12))
            .await
            .unwrap();
        std::fs::remove_file(&config.intermediate_panel_path).unwrap();

        let uruguayo = output.table("peso_uruguayo").unwrap();
        assert_eq!(uruguayo.rows.len(), 1);
        assert!(uruguayo.rows[0].values.iter().all(FieldValue::is_missing));
        let real = output.table("real").unwrap();
        assert_eq!(real.rows.len(), 1);
        assert_eq!(real.rows[0].date, day(2019, 4, 12));
        assert_eq!(real.value(0, "Tipo de cambio SML Real Peso"), Some(value("0.09000")));
    }

    #[test]
    fn rejects_uncovered_coins() {
        let json = r#"{"sml": {"url": "http://bcra/sml", "coins": {"guarani": "Guaraní"}}}"#;
        let config = DriverConfig::from_json(json, DriverKind::Sml).unwrap();

        let err = Sml::new(&config).err().unwrap();

        assert!(err.is_configuration());
        assert!(err.to_string().contains("guarani"));
    }

    #[test]
    fn file_names_follow_coin_keys() {
        let publication = Sml::new(&config("sml_names")).unwrap();
        assert_eq!(publication.file_name("peso_uruguayo"), "sml-peso-uruguayo.csv");
        assert_eq!(publication.file_name("real"), "sml-real.csv");
    }
}
