#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Scraper drivers for BCRA publications.
//!
//! Each publication (Libor, exchange rates, SML, TCE) implements
//! [`Publication`](driver::Publication): its instrument schema, how to ask
//! the page for each unit of work, how to read the answers and how to
//! shape the output tables. [`Driver`](driver::Driver) runs any of them,
//! either fetching fresh pages or rebuilding the result from the
//! intermediate panel.

pub mod config;
pub mod driver;
pub mod exchange_rates;
pub mod libor;
pub mod sml;
pub mod tce;

use bcra_scraper_panel::PanelError;
use bcra_scraper_scraper::ScrapeError;

/// Errors that can occur while running a driver.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The configuration file is unusable.
    #[error("{message}")]
    InvalidConfiguration {
        /// Description of what is wrong.
        message: String,
    },

    /// Fetching or parsing pages failed.
    #[error(transparent)]
    Scrape(#[from] ScrapeError),

    /// Reading or writing the intermediate panel failed.
    #[error(transparent)]
    Panel(#[from] PanelError),

    /// I/O error (file read/write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SourceError {
    /// Returns `true` for errors the user fixes by changing the
    /// configuration or the environment rather than retrying: invalid
    /// configuration, a missing intermediate panel, an unreachable page or
    /// a page whose structure changed.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfiguration { .. }
                | Self::Panel(PanelError::NotFound { .. })
                | Self::Scrape(
                    ScrapeError::RetriesExhausted { .. } | ScrapeError::ElementNotFound { .. }
                )
        )
    }
}
