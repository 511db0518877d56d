//! The intermediate panel: a long-form CSV cache of scraped points.
//!
//! Each record holds a date, the instrument (for drivers with more than
//! one), the field's dimension values and the value. Fresh runs rewrite the
//! whole file; nothing is merged with previous contents.

use std::path::{Path, PathBuf};

use bcra_scraper_models::{DATE_COLUMN, FieldValue, InstrumentSchema, TimeSeriesPoint};
use bcra_scraper_scraper::normalize::{normalize_date, normalize_decimal};

use crate::PanelError;

/// Name of the value column.
pub const VALUE_COLUMN: &str = "value";

/// Column layout of a panel file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelLayout {
    /// Column holding the instrument id. `None` for single-instrument
    /// drivers, whose points all belong to the schema's first instrument.
    pub instrument_column: Option<String>,
    /// Columns holding each field's dimension values, in order.
    pub dimension_columns: Vec<String>,
}

impl PanelLayout {
    /// Creates a layout.
    #[must_use]
    pub fn new(instrument_column: Option<&str>, dimension_columns: &[&str]) -> Self {
        Self {
            instrument_column: instrument_column.map(str::to_owned),
            dimension_columns: dimension_columns.iter().map(|&c| c.to_owned()).collect(),
        }
    }

    /// Full header row.
    #[must_use]
    pub fn header(&self) -> Vec<String> {
        std::iter::once(DATE_COLUMN.to_owned())
            .chain(self.instrument_column.iter().cloned())
            .chain(self.dimension_columns.iter().cloned())
            .chain(std::iter::once(VALUE_COLUMN.to_owned()))
            .collect()
    }
}

/// A panel file at a fixed path.
#[derive(Debug, Clone)]
pub struct PanelStore {
    path: PathBuf,
    layout: PanelLayout,
}

impl PanelStore {
    /// Creates a store for `path`. Nothing is touched on disk.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, layout: PanelLayout) -> Self {
        Self {
            path: path.into(),
            layout,
        }
    }

    /// Location of the panel file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replaces the file's contents with `points`, in the given order.
    ///
    /// # Errors
    ///
    /// * [`PanelError::InvalidRecord`] if a point's instrument or field is
    ///   not in `schema`, or its dimensions do not fit the layout
    /// * [`PanelError::Io`] / [`PanelError::Csv`] if the file cannot be
    ///   written
    pub fn write(
        &self,
        points: &[TimeSeriesPoint],
        schema: &InstrumentSchema,
    ) -> Result<(), PanelError> {
        let mut writer = csv::Writer::from_path(&self.path)?;
        writer.write_record(self.layout.header())?;

        for (i, point) in points.iter().enumerate() {
            let line = i as u64 + 2;
            let field = schema
                .instrument(&point.instrument)
                .and_then(|instrument| instrument.field(&point.field))
                .ok_or_else(|| PanelError::InvalidRecord {
                    line,
                    message: format!(
                        "field '{}' of '{}' is not in the schema",
                        point.field, point.instrument
                    ),
                })?;
            if field.dimensions.len() != self.layout.dimension_columns.len() {
                return Err(PanelError::InvalidRecord {
                    line,
                    message: format!(
                        "field '{}' has {} dimension(s), layout expects {}",
                        field.name,
                        field.dimensions.len(),
                        self.layout.dimension_columns.len()
                    ),
                });
            }

            let mut record = vec![point.date.to_string()];
            if self.layout.instrument_column.is_some() {
                record.push(point.instrument.clone());
            }
            record.extend(field.dimensions.iter().cloned());
            record.push(point.value.to_string());
            writer.write_record(&record)?;
        }

        writer.flush()?;
        log::info!(
            "Wrote {} point(s) to intermediate panel {}",
            points.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Reads every point, restoring the order they were produced in (the
    /// file stores them most recent first).
    ///
    /// Records whose instrument or dimensions are not in `schema` are
    /// skipped.
    ///
    /// # Errors
    ///
    /// * [`PanelError::NotFound`] if the file does not exist
    /// * [`PanelError::InvalidRecord`] if the header or a record does not
    ///   match the layout
    /// * [`PanelError::Normalize`] if a stored date or value is unreadable
    pub fn read(&self, schema: &InstrumentSchema) -> Result<Vec<TimeSeriesPoint>, PanelError> {
        if !self.path.exists() {
            return Err(PanelError::NotFound {
                path: self.path.clone(),
            });
        }

        let mut reader = csv::Reader::from_path(&self.path)?;
        let expected = self.layout.header();
        let header: Vec<String> = reader.headers()?.iter().map(str::to_owned).collect();
        if header != expected {
            return Err(PanelError::InvalidRecord {
                line: 1,
                message: format!(
                    "header is [{}], expected [{}]",
                    header.join(","),
                    expected.join(",")
                ),
            });
        }

        let default_instrument = schema.instruments().first().map(|i| i.id.as_str());
        let dims = self.layout.dimension_columns.len();
        let mut points = Vec::new();
        let mut skipped = 0_usize;

        for (i, result) in reader.records().enumerate() {
            let record = result?;
            let line = i as u64 + 2;
            if record.len() != expected.len() {
                return Err(PanelError::InvalidRecord {
                    line,
                    message: format!("{} column(s), expected {}", record.len(), expected.len()),
                });
            }

            let mut cells = record.iter();
            let date = normalize_date(cells.next().unwrap_or_default())?;
            let instrument_id = if self.layout.instrument_column.is_some() {
                cells.next()
            } else {
                default_instrument
            };
            let dimensions: Vec<&str> = cells.by_ref().take(dims).collect();
            let value = match cells.next() {
                Some(raw) => normalize_decimal(raw)?,
                None => FieldValue::Missing,
            };

            let field = instrument_id
                .and_then(|id| schema.instrument(id))
                .and_then(|instrument| instrument.field_by_dimensions(&dimensions));
            let (Some(instrument), Some(field)) = (instrument_id, field) else {
                skipped += 1;
                continue;
            };

            points.push(TimeSeriesPoint {
                date,
                instrument: instrument.to_owned(),
                field: field.name.clone(),
                value,
            });
        }

        if skipped > 0 {
            log::debug!(
                "Skipped {skipped} record(s) outside the schema in {}",
                self.path.display()
            );
        }
        log::info!(
            "Read {} point(s) from intermediate panel {}",
            points.len(),
            self.path.display()
        );

        points.reverse();
        Ok(points)
    }
}
