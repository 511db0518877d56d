#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Reshaping and persistence of BCRA series.
//!
//! Scraped data moves between three shapes:
//!
//! - wide rows ([`WideRow`](bcra_scraper_models::WideRow)), one per date
//!   and instrument, as produced by the table parser;
//! - long-form points ([`TimeSeriesPoint`](bcra_scraper_models::TimeSeriesPoint)),
//!   persisted in the intermediate panel file ([`store`]);
//! - output tables ([`Table`](bcra_scraper_models::Table)), written as CSV
//!   ([`output`]).
//!
//! [`reshape`] converts between them.

pub mod output;
pub mod reshape;
pub mod store;

use std::path::PathBuf;

use bcra_scraper_scraper::NormalizeError;

/// Errors raised while reading or writing panel and output files.
#[derive(Debug, thiserror::Error)]
pub enum PanelError {
    /// The intermediate panel has not been written yet.
    #[error("The intermediate panel file does not exist: {}", path.display())]
    NotFound {
        /// Expected location of the file.
        path: PathBuf,
    },

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Reading or writing CSV failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A panel record does not match the expected layout.
    #[error("Invalid panel record at line {line}: {message}")]
    InvalidRecord {
        /// One-based line number in the file.
        line: u64,
        /// What is wrong with the record.
        message: String,
    },

    /// A stored date or value could not be parsed.
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
}
