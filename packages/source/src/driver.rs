//! Running a publication end to end.
//!
//! A fresh run fetches every work unit, parses the pages, persists the
//! flattened points to the intermediate panel (replacing its contents) and
//! returns the parsed rows. A cached run reads the panel back and pivots it
//! for the requested range without touching the network.

use std::sync::Arc;

use bcra_scraper_models::{DateRange, DriverOutput, InstrumentSchema, Table, WideRow};
use bcra_scraper_panel::{
    reshape::{flatten, pivot},
    store::{PanelLayout, PanelStore},
};
use bcra_scraper_scraper::{
    PageFetcher, PageRequest,
    fetch::{FetchOrchestrator, RawContent, WorkUnit},
    http::HttpFormFetcher,
    progress::ProgressCallback,
};
use chrono::NaiveDate;

use crate::{
    SourceError,
    config::{DriverConfig, DriverKind},
    exchange_rates::ExchangeRates,
    libor::Libor,
    sml::Sml,
    tce::Tce,
};

/// Name of the `<select>` listing instruments on coin-based pages.
pub const COIN_SELECTOR: &str = "moneda";

/// What a driver needs to know about one BCRA publication.
pub trait Publication: Send + Sync {
    /// Instruments and fields tracked.
    fn schema(&self) -> &InstrumentSchema;

    /// Column layout of the intermediate panel.
    fn panel_layout(&self) -> PanelLayout;

    /// Pages to fetch for `range`. Never called for an empty range.
    fn work_units(&self, range: &DateRange) -> Vec<WorkUnit>;

    /// Form interaction for one unit.
    fn request(&self, unit: &WorkUnit, range: &DateRange) -> PageRequest;

    /// Turns fetched pages into wide rows.
    fn parse(&self, contents: &[RawContent], range: &DateRange) -> Vec<WideRow>;

    /// Shapes rows into output tables.
    fn tables(&self, rows: &[WideRow]) -> Vec<Table>;

    /// File an output table is written to.
    fn file_name(&self, table: &str) -> String;
}

/// Runs a [`Publication`] against a [`PageFetcher`].
pub struct Driver<P, F> {
    publication: P,
    orchestrator: FetchOrchestrator<F>,
    store: PanelStore,
    use_intermediate_panel: bool,
}

impl<P: Publication, F: PageFetcher> Driver<P, F> {
    /// Creates a driver using the attempt budget and panel path of `config`.
    #[must_use]
    pub fn new(publication: P, fetcher: F, config: &DriverConfig) -> Self {
        let store = PanelStore::new(&config.intermediate_panel_path, publication.panel_layout());
        Self {
            publication,
            orchestrator: FetchOrchestrator::new(fetcher, config.tries),
            store,
            use_intermediate_panel: false,
        }
    }

    /// Rebuilds results from the intermediate panel instead of fetching.
    #[must_use]
    pub const fn with_intermediate_panel(mut self, use_intermediate_panel: bool) -> Self {
        self.use_intermediate_panel = use_intermediate_panel;
        self
    }

    /// Reports fetch progress to `progress`.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.orchestrator = self.orchestrator.with_progress(progress);
        self
    }

    /// The publication being run.
    #[must_use]
    pub const fn publication(&self) -> &P {
        &self.publication
    }

    /// Number of fetch retries issued so far.
    #[must_use]
    pub const fn retries(&self) -> u32 {
        self.orchestrator.retries()
    }

    /// Returns the wrapped fetcher.
    pub fn into_fetcher(self) -> F {
        self.orchestrator.into_fetcher()
    }

    /// Produces the output tables for `[start, end]`.
    ///
    /// # Errors
    ///
    /// * [`SourceError::Panel`] if the intermediate panel cannot be read
    ///   (including when it does not exist) or written
    /// * [`SourceError::Scrape`] if a page cannot be fetched
    pub async fn run(&mut self, start: NaiveDate, end: NaiveDate) -> Result<DriverOutput, SourceError> {
        let range = DateRange::new(start, end);
        let schema = self.publication.schema();

        let rows = if self.use_intermediate_panel {
            log::info!(
                "Reading {start}..{end} from intermediate panel {}",
                self.store.path().display()
            );
            let points = self.store.read(schema)?;
            pivot(&points, schema, &range)
        } else {
            let units = if range.is_empty() {
                log::info!("Empty date range {start}..{end}, nothing to fetch");
                Vec::new()
            } else {
                self.publication.work_units(&range)
            };
            log::info!(
                "Fetching {} page(s) for {} day(s), {start}..{end}",
                units.len(),
                range.len()
            );

            let publication = &self.publication;
            let contents = self
                .orchestrator
                .fetch_all(units, |unit| publication.request(unit, &range))
                .await?;
            let rows = publication.parse(&contents, &range);
            self.store.write(&flatten(&rows, schema), schema)?;
            rows
        };

        log::info!("{} row(s) for {start}..{end}", rows.len());
        Ok(DriverOutput {
            tables: self.publication.tables(&rows),
        })
    }
}

/// An output table and the file it belongs in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    /// File name, relative to the output directory.
    pub file_name: String,
    /// Table contents.
    pub table: Table,
}

/// Options for [`run_command`].
pub struct RunOptions {
    /// First day, inclusive.
    pub start: NaiveDate,
    /// Last day, inclusive.
    pub end: NaiveDate,
    /// Rebuild from the intermediate panel instead of fetching.
    pub use_intermediate_panel: bool,
    /// Progress sink for fetching.
    pub progress: Arc<dyn ProgressCallback>,
}

/// Runs the command configured by `config` against the live site.
///
/// # Errors
///
/// Returns [`SourceError`] if the publication cannot be built from the
/// configuration or the run fails.
pub async fn run_command(
    config: &DriverConfig,
    options: RunOptions,
) -> Result<Vec<OutputFile>, SourceError> {
    let mut fetcher = HttpFormFetcher::new(config.url.clone());
    if let Some(timeout) = config.timeout {
        fetcher = fetcher.with_timeout(timeout);
    }

    match config.kind {
        DriverKind::Libor => run_publication(Libor::new(config)?, fetcher, config, options).await,
        DriverKind::ExchangeRates => {
            run_publication(ExchangeRates::new(config)?, fetcher, config, options).await
        }
        DriverKind::Sml => run_publication(Sml::new(config)?, fetcher, config, options).await,
        DriverKind::Tce => run_publication(Tce::new(config)?, fetcher, config, options).await,
    }
}

async fn run_publication<P: Publication, F: PageFetcher>(
    publication: P,
    fetcher: F,
    config: &DriverConfig,
    options: RunOptions,
) -> Result<Vec<OutputFile>, SourceError> {
    let mut driver = Driver::new(publication, fetcher, config)
        .with_intermediate_panel(options.use_intermediate_panel)
        .with_progress(options.progress);
    let output = driver.run(options.start, options.end).await?;
    if driver.retries() > 0 {
        log::warn!("{} fetch(es) were retried after timing out", driver.retries());
    }

    Ok(output
        .tables
        .into_iter()
        .map(|table| OutputFile {
            file_name: driver.publication().file_name(&table.name),
            table,
        })
        .collect())
}
