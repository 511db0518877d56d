#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command line entry point for the BCRA scraper.
//!
//! Each subcommand scrapes one publication for a date range and writes its
//! tables as CSV files. Logging goes through
//! [`bcra_scraper_cli_utils::init_logger`] so log lines and the fetch
//! progress bar share the terminal.

use std::{
    path::{Path, PathBuf},
    process::ExitCode,
};

use bcra_scraper_cli_utils::{IndicatifProgress, MultiProgress};
use bcra_scraper_panel::output::write_tables;
use bcra_scraper_scraper::{NormalizeError, normalize::normalize_date};
use bcra_scraper_source::{
    config::{DriverConfig, DriverKind},
    driver::{OutputFile, RunOptions, run_command},
};
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "bcra_scraper", about = "Scraper for BCRA statistical publications")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Libor rates by tenor
    Libor(RunArgs),
    /// Pass and local-currency exchange rates per coin
    ExchangeRates(RunArgs),
    /// Local currency payment system (SML) rates
    Sml(RunArgs),
    /// Retail exchange rates by banking entity (TCE)
    Tce(RunArgs),
}

impl Commands {
    fn split(self) -> (DriverKind, RunArgs) {
        match self {
            Self::Libor(args) => (DriverKind::Libor, args),
            Self::ExchangeRates(args) => (DriverKind::ExchangeRates, args),
            Self::Sml(args) => (DriverKind::Sml, args),
            Self::Tce(args) => (DriverKind::Tce, args),
        }
    }
}

#[derive(Args)]
struct RunArgs {
    /// First day to scrape, DD/MM/YYYY (defaults to today)
    #[arg(long, value_parser = parse_day)]
    start_date: Option<NaiveDate>,
    /// Last day to scrape, DD/MM/YYYY (defaults to today)
    #[arg(long, value_parser = parse_day)]
    end_date: Option<NaiveDate>,
    /// JSON configuration file
    #[arg(long, default_value = "config.json")]
    config: PathBuf,
    /// Rebuild the output from the intermediate panel instead of scraping
    #[arg(long)]
    use_intermediate_panel: bool,
    /// Directory the CSV files are written to
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,
}

fn parse_day(value: &str) -> Result<NaiveDate, NormalizeError> {
    normalize_date(value)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let multi = bcra_scraper_cli_utils::init_logger();
    let cli = Cli::parse();
    let (kind, args) = cli.command.split();

    exit_code(run(kind, args, &multi).await)
}

fn exit_code(result: Result<(), Box<dyn std::error::Error>>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(
    kind: DriverKind,
    args: RunArgs,
    multi: &MultiProgress,
) -> Result<(), Box<dyn std::error::Error>> {
    let today = Local::now().date_naive();
    let config = DriverConfig::load(&args.config, kind)?;

    let options = RunOptions {
        start: args.start_date.unwrap_or(today),
        end: args.end_date.unwrap_or(today),
        use_intermediate_panel: args.use_intermediate_panel,
        progress: IndicatifProgress::pages_bar(multi, &format!("Scraping {kind}")),
    };
    log::info!("Running {kind} for {} to {}", options.start, options.end);

    let files = run_command(&config, options)
        .await
        .map_err(|e| -> Box<dyn std::error::Error> {
            if e.is_configuration() {
                format!("Configuration error: {e}").into()
            } else {
                e.into()
            }
        })?;

    write_outputs(&files, &args.output_dir)
}

fn write_outputs(files: &[OutputFile], dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if files.iter().all(|file| file.table.is_empty()) {
        println!("No results found");
        return Ok(());
    }

    let tables = files
        .iter()
        .map(|file| (file.file_name.as_str(), &file.table));
    for path in write_tables(dir, tables)? {
        println!("{}", path.display());
    }

    Ok(())
}
