#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Core data model for BCRA publications.
//!
//! Scraped pages become [`WideRow`]s (one row per date and instrument, one
//! value per schema field). Rows are flattened into [`TimeSeriesPoint`]s for
//! the intermediate panel cache and reshaped into [`Table`]s for CSV output.
//! Every driver describes its instruments and fields with an
//! [`InstrumentSchema`].

use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Name of the date column in every output and panel file.
pub const DATE_COLUMN: &str = "indice_tiempo";

/// Errors raised when a row is built against the wrong schema.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// The field is not declared for the instrument.
    #[error("Unknown field '{field}' for instrument '{instrument}'")]
    UnknownField {
        /// Instrument identifier.
        instrument: String,
        /// Offending field name.
        field: String,
    },
}

// ── Values ───────────────────────────────────────────────────────────────

/// A single measured value: either a decimal or an explicit gap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum FieldValue {
    /// A published value.
    Value(Decimal),
    /// No value published (blank cell, placeholder dashes, absent row).
    #[default]
    Missing,
}

impl FieldValue {
    /// Returns `true` if no value was published.
    #[must_use]
    pub const fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }
}

/// Missing values render as an empty string, matching blank CSV cells.
impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => write!(f, "{value}"),
            Self::Missing => Ok(()),
        }
    }
}

// ── Dates ────────────────────────────────────────────────────────────────

/// Inclusive `[start, end]` range of calendar days.
///
/// A range whose start is after its end is empty rather than invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateRange {
    /// First day of the range.
    pub start: NaiveDate,
    /// Last day of the range (inclusive).
    pub end: NaiveDate,
}

impl DateRange {
    /// Creates a new range.
    #[must_use]
    pub const fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Returns `true` if the range contains no days.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    /// Returns `true` if `date` falls within the range.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Number of days in the range.
    #[must_use]
    pub fn len(&self) -> usize {
        if self.is_empty() {
            return 0;
        }
        usize::try_from((self.end - self.start).num_days() + 1).unwrap_or(0)
    }

    /// Iterates the range day by day in ascending order.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        let end = self.end;
        self.start.iter_days().take_while(move |day| *day <= end)
    }
}

// ── Long form ────────────────────────────────────────────────────────────

/// One `(date, instrument, field, value)` tuple of the intermediate panel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TimeSeriesPoint {
    /// Publication date.
    pub date: NaiveDate,
    /// Instrument identifier (coin key, or the driver's single instrument).
    pub instrument: String,
    /// Canonical field name.
    pub field: String,
    /// Measured value.
    pub value: FieldValue,
}

// ── Schema ───────────────────────────────────────────────────────────────

/// Where the table parser finds the cell holding a field's value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellRef {
    /// Column of the body row whose first cell is the target date
    /// (`DD/MM/YYYY`).
    DateRow {
        /// Zero-based cell index.
        column: usize,
    },
    /// Column of the body row whose first cell equals `label`.
    LabeledRow {
        /// Exact (trimmed) text of the row's first cell.
        label: String,
        /// Zero-based cell index.
        column: usize,
    },
    /// Column of the first body row whose first cell contains `label`.
    ContainingRow {
        /// Substring searched for in the row's first cell.
        label: String,
        /// Zero-based cell index.
        column: usize,
    },
}

impl CellRef {
    /// Zero-based cell index within the located row.
    #[must_use]
    pub const fn column(&self) -> usize {
        match self {
            Self::DateRow { column }
            | Self::LabeledRow { column, .. }
            | Self::ContainingRow { column, .. } => *column,
        }
    }
}

/// A single field tracked for an instrument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    /// Canonical field name (wide-form column key).
    pub name: String,
    /// Values written to the panel's key columns for this field.
    pub dimensions: Vec<String>,
    /// How to locate the value on a page.
    pub cell: CellRef,
}

impl FieldSpec {
    /// Creates a field whose only panel dimension is its own name.
    #[must_use]
    pub fn new(name: impl Into<String>, cell: CellRef) -> Self {
        let name = name.into();
        Self {
            dimensions: vec![name.clone()],
            name,
            cell,
        }
    }

    /// Replaces the panel dimensions.
    #[must_use]
    pub fn with_dimensions(mut self, dimensions: Vec<String>) -> Self {
        self.dimensions = dimensions;
        self
    }
}

/// An instrument and the fields scraped for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentSpec {
    /// Identifier used in panel files and output columns (e.g. `real`).
    pub id: String,
    /// Text shown by the source page (selector option, entity name).
    pub label: String,
    /// Ordered fields.
    pub fields: Vec<FieldSpec>,
}

impl InstrumentSpec {
    /// Creates an instrument.
    #[must_use]
    pub fn new(id: impl Into<String>, label: impl Into<String>, fields: Vec<FieldSpec>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            fields,
        }
    }

    /// Looks up a field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Looks up a field by its panel dimensions.
    #[must_use]
    pub fn field_by_dimensions(&self, dimensions: &[&str]) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| {
            f.dimensions.len() == dimensions.len()
                && f.dimensions.iter().zip(dimensions).all(|(a, b)| a == b)
        })
    }
}

/// The closed set of instruments and fields a driver works with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstrumentSchema {
    instruments: Vec<InstrumentSpec>,
}

impl InstrumentSchema {
    /// Creates a schema from instruments in declaration order.
    #[must_use]
    pub const fn new(instruments: Vec<InstrumentSpec>) -> Self {
        Self { instruments }
    }

    /// Instruments in declaration order.
    #[must_use]
    pub fn instruments(&self) -> &[InstrumentSpec] {
        &self.instruments
    }

    /// Looks up an instrument by id.
    #[must_use]
    pub fn instrument(&self, id: &str) -> Option<&InstrumentSpec> {
        self.instruments.iter().find(|i| i.id == id)
    }

    /// Declaration index of an instrument, used for stable ordering.
    #[must_use]
    pub fn position(&self, id: &str) -> Option<usize> {
        self.instruments.iter().position(|i| i.id == id)
    }
}

// ── Wide form ────────────────────────────────────────────────────────────

/// One parsed row: every field of an instrument for a single date.
///
/// Rows are always created from an [`InstrumentSpec`] so the field set is
/// complete; fields with no data hold [`FieldValue::Missing`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WideRow {
    /// Publication date.
    pub date: NaiveDate,
    /// Instrument identifier.
    pub instrument: String,
    fields: Vec<(String, FieldValue)>,
}

impl WideRow {
    /// Creates a row with every field of `instrument` set to missing.
    #[must_use]
    pub fn missing(date: NaiveDate, instrument: &InstrumentSpec) -> Self {
        Self {
            date,
            instrument: instrument.id.clone(),
            fields: instrument
                .fields
                .iter()
                .map(|f| (f.name.clone(), FieldValue::Missing))
                .collect(),
        }
    }

    /// Sets a field's value.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownField`] if the field is not part of the
    /// row's schema.
    pub fn set(&mut self, field: &str, value: FieldValue) -> Result<(), SchemaError> {
        let slot = self
            .fields
            .iter_mut()
            .find(|(name, _)| name == field)
            .ok_or_else(|| SchemaError::UnknownField {
                instrument: self.instrument.clone(),
                field: field.to_owned(),
            })?;
        slot.1 = value;
        Ok(())
    }

    /// Returns a field's value.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<FieldValue> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| *value)
    }

    /// Iterates `(field, value)` pairs in schema order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, FieldValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), *value))
    }

    /// Returns `true` if no field carries a value.
    #[must_use]
    pub fn is_all_missing(&self) -> bool {
        self.fields.iter().all(|(_, value)| value.is_missing())
    }
}

// ── Output ───────────────────────────────────────────────────────────────

/// One output row: a date and the values aligned with [`Table::columns`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    /// Date of the row.
    pub date: NaiveDate,
    /// Values aligned with the table columns.
    pub values: Vec<FieldValue>,
}

/// A named wide-form series, written as one CSV file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    /// Series name (e.g. `tc_local`, `peso_uruguayo`).
    pub name: String,
    /// Column labels, excluding the leading date column.
    pub columns: Vec<String>,
    /// Rows in chronological order.
    pub rows: Vec<TableRow>,
}

impl Table {
    /// Creates an empty table.
    #[must_use]
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows: Vec::new(),
        }
    }

    /// Full CSV header: the date column followed by every value column.
    #[must_use]
    pub fn header(&self) -> Vec<String> {
        std::iter::once(DATE_COLUMN.to_owned())
            .chain(self.columns.iter().cloned())
            .collect()
    }

    /// Returns the value of `column` in `row`, if both exist.
    #[must_use]
    pub fn value(&self, row: usize, column: &str) -> Option<FieldValue> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row)?.values.get(idx).copied()
    }

    /// Returns `true` if the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// The tables produced by one driver run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriverOutput {
    /// Output tables in the driver's declared order.
    pub tables: Vec<Table>,
}

impl DriverOutput {
    /// Looks up a table by name.
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Returns `true` if no table has any row.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.iter().all(Table::is_empty)
    }
}
