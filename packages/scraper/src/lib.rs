#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Page fetching and table extraction for BCRA publications.
//!
//! The pieces compose leaves first:
//!
//! - [`normalize`] turns localized text (`1.234,56`, `15/03/2019`) into
//!   typed values.
//! - [`html_table`] locates the data table on a page and extracts one
//!   [`WideRow`](bcra_scraper_models::WideRow) per target date.
//! - [`fetch`] walks the work units of a run, retrying timeouts with a
//!   fixed attempt budget.
//! - [`http`] is the [`PageFetcher`] that talks to the BCRA site.
//!
//! Nothing in this crate touches the filesystem.

pub mod fetch;
pub mod html_table;
pub mod http;
pub mod normalize;
pub mod progress;

use async_trait::async_trait;

pub use normalize::NormalizeError;

/// Failures reported by a [`PageFetcher`] for a single request.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The page did not answer in time. Retried by the orchestrator.
    #[error("Timed out: {message}")]
    Timeout {
        /// Description of the underlying failure.
        message: String,
    },

    /// An element the form interaction depends on is absent from the page.
    #[error("Element not found: {element}")]
    ElementNotFound {
        /// Description of the missing element.
        element: String,
    },

    /// A selector built for the form interaction does not compile.
    #[error("Invalid CSS selector '{selector}': {message}")]
    InvalidSelector {
        /// The selector text.
        selector: String,
        /// Parser diagnostic.
        message: String,
    },

    /// Any other HTTP failure.
    #[error("HTTP error: {0}")]
    Http(#[source] reqwest::Error),
}

/// Errors that abort a scrape run.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    /// Every attempt for a unit timed out.
    #[error("Connection failed for {unit} after {attempts} attempt(s)")]
    RetriesExhausted {
        /// The unit that could not be fetched.
        unit: String,
        /// Number of attempts made.
        attempts: u32,
    },

    /// The page no longer has the structure the scraper expects.
    #[error("Page structure changed while fetching {unit}: {element}")]
    ElementNotFound {
        /// The unit being fetched.
        unit: String,
        /// Description of the missing element.
        element: String,
    },

    /// A non-retryable fetch failure.
    #[error("Fetch failed for {unit}: {source}")]
    Fetch {
        /// The unit being fetched.
        unit: String,
        /// The underlying failure.
        #[source]
        source: FetchError,
    },

    /// A CSS selector could not be compiled.
    #[error("Invalid CSS selector '{selector}': {message}")]
    InvalidSelector {
        /// The selector text.
        selector: String,
        /// Parser diagnostic.
        message: String,
    },
}

/// One form interaction against a BCRA page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// `name` of the `<select>` whose option is chosen, if the page has one.
    pub selector: Option<String>,
    /// Visible text of the option to choose (the instrument label).
    pub input_value: String,
    /// Additional form fields, typically dates formatted `DD/MM/YYYY`.
    pub fields: Vec<(String, String)>,
}

impl PageRequest {
    /// Creates a request with no selector and no extra fields.
    #[must_use]
    pub fn new(input_value: impl Into<String>) -> Self {
        Self {
            selector: None,
            input_value: input_value.into(),
            fields: Vec::new(),
        }
    }

    /// Sets the name of the `<select>` to drive.
    #[must_use]
    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    /// Adds a form field.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }
}

/// Retrieves page markup for a [`PageRequest`].
///
/// Implementations own whatever session state they need. `Ok(None)` means
/// the requested option is not offered by the page, which callers treat as
/// "no data" rather than a failure.
#[async_trait]
pub trait PageFetcher: Send {
    /// Performs the interaction and returns the resulting markup.
    ///
    /// # Errors
    ///
    /// * [`FetchError::Timeout`] if the site did not respond in time
    /// * [`FetchError::ElementNotFound`] if the page lacks the expected form
    /// * [`FetchError::InvalidSelector`] if the form selector does not compile
    /// * [`FetchError::Http`] for any other transport failure
    async fn fetch(&mut self, request: &PageRequest) -> Result<Option<String>, FetchError>;
}
