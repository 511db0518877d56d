//! Sequential fetching of work units with a fixed retry budget.
//!
//! A run is a list of [`WorkUnit`]s (one per instrument, or one per date and
//! instrument). Each unit is handed to a [`PageFetcher`] in order. Timeouts
//! are retried until the attempt budget is spent; structural failures abort
//! the run on the spot.

use std::{fmt, sync::Arc};

use bcra_scraper_models::{DateRange, InstrumentSchema};
use chrono::NaiveDate;

use crate::{
    FetchError, PageFetcher, PageRequest, ScrapeError,
    progress::{ProgressCallback, null_progress},
};

/// One page to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkUnit {
    /// Target date, for pages fetched one day at a time.
    pub date: Option<NaiveDate>,
    /// Instrument identifier.
    pub instrument: String,
    /// Text the page uses for the instrument.
    pub label: String,
}

impl fmt::Display for WorkUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.date {
            Some(date) => write!(f, "'{}' on {date}", self.instrument),
            None => write!(f, "'{}'", self.instrument),
        }
    }
}

/// Fetched markup for one unit. `None` when the page does not offer the
/// instrument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawContent {
    /// The unit this content answers.
    pub unit: WorkUnit,
    /// Page markup.
    pub content: Option<String>,
}

/// One unit per instrument, in declaration order.
#[must_use]
pub fn per_instrument(schema: &InstrumentSchema) -> Vec<WorkUnit> {
    schema
        .instruments()
        .iter()
        .map(|instrument| WorkUnit {
            date: None,
            instrument: instrument.id.clone(),
            label: instrument.label.clone(),
        })
        .collect()
}

/// One unit per day and instrument, date-major.
#[must_use]
pub fn per_date(range: &DateRange, schema: &InstrumentSchema) -> Vec<WorkUnit> {
    range
        .days()
        .flat_map(|date| {
            schema.instruments().iter().map(move |instrument| WorkUnit {
                date: Some(date),
                instrument: instrument.id.clone(),
                label: instrument.label.clone(),
            })
        })
        .collect()
}

/// Drives a [`PageFetcher`] over a list of work units.
pub struct FetchOrchestrator<F> {
    fetcher: F,
    attempts: u32,
    retries: u32,
    progress: Arc<dyn ProgressCallback>,
}

impl<F: PageFetcher> FetchOrchestrator<F> {
    /// Creates an orchestrator allowing `attempts` tries per unit (at least
    /// one).
    #[must_use]
    pub fn new(fetcher: F, attempts: u32) -> Self {
        Self {
            fetcher,
            attempts: attempts.max(1),
            retries: 0,
            progress: null_progress(),
        }
    }

    /// Reports per-unit progress to `progress`.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// Number of retries issued so far.
    #[must_use]
    pub const fn retries(&self) -> u32 {
        self.retries
    }

    /// Returns the wrapped fetcher.
    pub fn into_fetcher(self) -> F {
        self.fetcher
    }

    /// Fetches every unit in order, building each request with
    /// `build_request`.
    ///
    /// # Errors
    ///
    /// * [`ScrapeError::RetriesExhausted`] if every attempt for a unit timed
    ///   out
    /// * [`ScrapeError::ElementNotFound`] if the page lost an element the
    ///   interaction depends on
    /// * [`ScrapeError::Fetch`] for any other fetch failure
    pub async fn fetch_all<B>(
        &mut self,
        units: Vec<WorkUnit>,
        build_request: B,
    ) -> Result<Vec<RawContent>, ScrapeError>
    where
        B: Fn(&WorkUnit) -> PageRequest + Sync,
    {
        self.progress.set_total(units.len() as u64);
        let mut contents = Vec::with_capacity(units.len());

        for unit in units {
            self.progress.set_message(unit.to_string());
            let request = build_request(&unit);
            let content = self.fetch_unit(&unit, &request).await?;
            if content.is_none() {
                log::info!("{unit} is not offered by the page, skipping");
            }
            contents.push(RawContent { unit, content });
            self.progress.inc(1);
        }

        self.progress.finish(format!("{} page(s) fetched", contents.len()));
        Ok(contents)
    }

    async fn fetch_unit(
        &mut self,
        unit: &WorkUnit,
        request: &PageRequest,
    ) -> Result<Option<String>, ScrapeError> {
        let attempts = self.attempts;
        let mut attempt = 1;

        loop {
            match self.fetcher.fetch(request).await {
                Ok(content) => return Ok(content),
                Err(FetchError::Timeout { message }) if attempt < attempts => {
                    log::warn!(
                        "Timed out fetching {unit} (attempt {attempt}/{attempts}), retrying: {message}"
                    );
                    self.retries += 1;
                    attempt += 1;
                }
                Err(FetchError::Timeout { message }) => {
                    log::error!("Giving up on {unit} after {attempts} attempt(s): {message}");
                    return Err(ScrapeError::RetriesExhausted {
                        unit: unit.to_string(),
                        attempts,
                    });
                }
                Err(FetchError::ElementNotFound { element }) => {
                    return Err(ScrapeError::ElementNotFound {
                        unit: unit.to_string(),
                        element,
                    });
                }
                Err(FetchError::InvalidSelector { selector, message }) => {
                    return Err(ScrapeError::InvalidSelector { selector, message });
                }
                Err(source) => {
                    return Err(ScrapeError::Fetch {
                        unit: unit.to_string(),
                        source,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use async_trait::async_trait;
    use bcra_scraper_models::InstrumentSpec;

    use super::*;

    struct ScriptedFetcher {
        script: VecDeque<Result<Option<String>, FetchError>>,
        calls: usize,
    }

    impl ScriptedFetcher {
        fn new(script: Vec<Result<Option<String>, FetchError>>) -> Self {
            Self {
                script: script.into(),
                calls: 0,
            }
        }
    }

    #[async_trait]
    impl PageFetcher for ScriptedFetcher {
        async fn fetch(&mut self, _request: &PageRequest) -> Result<Option<String>, FetchError> {
            self.calls += 1;
            self.script
                .pop_front()
                .unwrap_or_else(|| Ok(Some("<html></html>".to_string())))
        }
    }

    fn timeout() -> Result<Option<String>, FetchError> {
        Err(FetchError::Timeout {
            message: "no answer".to_string(),
        })
    }

    fn unit(instrument: &str) -> WorkUnit {
        WorkUnit {
            date: None,
            instrument: instrument.to_string(),
            label: instrument.to_string(),
        }
    }

    fn request(unit: &WorkUnit) -> PageRequest {
        PageRequest::new(unit.label.clone()).with_selector("moneda")
    }

    fn schema() -> InstrumentSchema {
        InstrumentSchema::new(vec![
            InstrumentSpec::new("dolar", "Dolar Estadounidense", vec![]),
            InstrumentSpec::new("euro", "Euro", vec![]),
        ])
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2019, 4, d).unwrap()
    }

    #[tokio::test]
    async fn retries_timeouts_within_budget() {
        let fetcher = ScriptedFetcher::new(vec![timeout(), timeout(), Ok(Some("page".to_string()))]);
        let mut orchestrator = FetchOrchestrator::new(fetcher, 3);

        let contents = orchestrator.fetch_all(vec![unit("real")], request).await.unwrap();

        assert_eq!(orchestrator.retries(), 2);
        assert_eq!(contents[0].content.as_deref(), Some("page"));
        assert_eq!(orchestrator.into_fetcher().calls, 3);
    }

    #[tokio::test]
    async fn single_attempt_fails_without_retry() {
        let fetcher = ScriptedFetcher::new(vec![timeout(), Ok(Some("page".to_string()))]);
        let mut orchestrator = FetchOrchestrator::new(fetcher, 1);

        let err = orchestrator
            .fetch_all(vec![unit("real")], request)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ScrapeError::RetriesExhausted { ref unit, attempts: 1 } if unit == "'real'"
        ));
        assert_eq!(orchestrator.retries(), 0);
    }

    #[tokio::test]
    async fn invalid_selector_is_not_retried() {
        let fetcher = ScriptedFetcher::new(vec![Err(FetchError::InvalidSelector {
            selector: "select[name=\"mon\"eda\"]".to_string(),
            message: "unexpected token".to_string(),
        })]);
        let mut orchestrator = FetchOrchestrator::new(fetcher, 3);

        let err = orchestrator
            .fetch_all(vec![unit("real")], request)
            .await
            .unwrap_err();

        assert!(matches!(err, ScrapeError::InvalidSelector { .. }));
        assert_eq!(orchestrator.into_fetcher().calls, 1);
    }

    #[tokio::test]
    async fn missing_element_is_not_retried() {
        let fetcher = ScriptedFetcher::new(vec![Err(FetchError::ElementNotFound {
            element: "select[name=moneda]".to_string(),
        })]);
        let mut orchestrator = FetchOrchestrator::new(fetcher, 3);

        let err = orchestrator
            .fetch_all(vec![unit("real")], request)
            .await
            .unwrap_err();

        assert!(matches!(err, ScrapeError::ElementNotFound { .. }));
        assert_eq!(orchestrator.retries(), 0);
        assert_eq!(orchestrator.into_fetcher().calls, 1);
    }

    #[tokio::test]
    async fn unoffered_instrument_yields_empty_content() {
        let fetcher = ScriptedFetcher::new(vec![Ok(None)]);
        let mut orchestrator = FetchOrchestrator::new(fetcher, 1);

        let contents = orchestrator
            .fetch_all(vec![unit("libra"), unit("real")], request)
            .await
            .unwrap();

        assert_eq!(contents.len(), 2);
        assert_eq!(contents[0].content, None);
        assert_eq!(contents[0].unit.instrument, "libra");
        assert!(contents[1].content.is_some());
    }

    #[tokio::test]
    async fn no_units_means_no_calls() {
        let mut orchestrator = FetchOrchestrator::new(ScriptedFetcher::new(vec![]), 1);

        let contents = orchestrator.fetch_all(Vec::new(), request).await.unwrap();

        assert!(contents.is_empty());
        assert_eq!(orchestrator.into_fetcher().calls, 0);
    }

    #[test]
    fn per_date_is_date_major() {
        let units = per_date(&DateRange::new(day(1), day(2)), &schema());
        let keys: Vec<_> = units
            .iter()
            .map(|u| (u.date.unwrap(), u.instrument.as_str()))
            .collect();
        assert_eq!(
            keys,
            vec![
                (day(1), "dolar"),
                (day(1), "euro"),
                (day(2), "dolar"),
                (day(2), "euro"),
            ]
        );
    }

    #[test]
    fn per_date_over_empty_range_is_empty() {
        assert!(per_date(&DateRange::new(day(2), day(1)), &schema()).is_empty());
    }

    #[test]
    fn per_instrument_keeps_labels() {
        let units = per_instrument(&schema());
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].label, "Dolar Estadounidense");
        assert!(units[0].date.is_none());
    }
}
