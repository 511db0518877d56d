//! CSV output of wide-form tables.
//!
//! A run writes several files. They are staged next to their destination
//! and only moved into place once every one of them has been written, so a
//! failed run leaves the output directory as it was.

use std::path::{Path, PathBuf};

use bcra_scraper_models::Table;

use crate::PanelError;

/// Writes each `(file_name, table)` to `dir`, replacing existing files.
///
/// Dates are ISO formatted and missing values are empty cells. If any
/// table fails to write, no destination file is touched.
///
/// # Errors
///
/// * [`PanelError::Io`] / [`PanelError::Csv`] if a file cannot be written
///   or moved into place
pub fn write_tables<'a>(
    dir: &Path,
    tables: impl IntoIterator<Item = (&'a str, &'a Table)>,
) -> Result<Vec<PathBuf>, PanelError> {
    let mut staged: Vec<(PathBuf, PathBuf)> = Vec::new();

    for (file_name, table) in tables {
        let staging = dir.join(format!("{file_name}.tmp"));
        if let Err(e) = write_csv(&staging, table) {
            log::error!("Could not write '{}' to {}: {e}", table.name, dir.display());
            std::fs::remove_file(&staging).ok();
            for (pending, _) in &staged {
                std::fs::remove_file(pending).ok();
            }
            return Err(e);
        }
        log::debug!("Staged {} row(s) of '{}'", table.rows.len(), table.name);
        staged.push((staging, dir.join(file_name)));
    }

    staged
        .into_iter()
        .map(|(staging, path)| {
            std::fs::rename(&staging, &path)?;
            log::info!("Wrote {}", path.display());
            Ok(path)
        })
        .collect()
}

fn write_csv(path: &Path, table: &Table) -> Result<(), PanelError> {
    let mut writer = csv::Writer::from_path(path)?;

    writer.write_record(table.header())?;
    for row in &table.rows {
        let record = std::iter::once(row.date.to_string())
            .chain(row.values.iter().map(ToString::to_string));
        writer.write_record(record)?;
    }
    writer.flush()?;

    Ok(())
}
