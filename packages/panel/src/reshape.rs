//! Conversions between wide rows, long-form points and output tables.
//!
//! All functions are pure. Rows and points referring to instruments or
//! fields outside the schema are ignored.

use std::collections::{BTreeMap, BTreeSet};

use bcra_scraper_models::{
    DateRange, FieldSpec, FieldValue, InstrumentSchema, InstrumentSpec, Table, TableRow,
    TimeSeriesPoint, WideRow,
};
use chrono::NaiveDate;

/// Explodes wide rows into one point per schema field.
///
/// Missing values are kept as points. The result is most recent first,
/// which is the order the intermediate panel is persisted in.
#[must_use]
pub fn flatten(rows: &[WideRow], schema: &InstrumentSchema) -> Vec<TimeSeriesPoint> {
    let mut points = Vec::new();

    for row in rows {
        let Some(instrument) = schema.instrument(&row.instrument) else {
            log::debug!("Skipping row for unknown instrument '{}'", row.instrument);
            continue;
        };
        for field in &instrument.fields {
            points.push(TimeSeriesPoint {
                date: row.date,
                instrument: instrument.id.clone(),
                field: field.name.clone(),
                value: row.get(&field.name).unwrap_or(FieldValue::Missing),
            });
        }
    }

    points.reverse();
    points
}

/// Rebuilds wide rows from points, inner-joining each instrument's series
/// on date.
///
/// A later point for the same `(date, instrument, field)` replaces an
/// earlier one. An instrument contributes a row for a date only when every
/// one of its fields has a point on that date, so an instrument with an
/// empty series contributes nothing. Rows are returned by ascending date,
/// then in instrument declaration order, restricted to `range`.
#[must_use]
pub fn pivot(
    points: &[TimeSeriesPoint],
    schema: &InstrumentSchema,
    range: &DateRange,
) -> Vec<WideRow> {
    // instrument position -> field position -> date -> value
    let mut series: Vec<Vec<BTreeMap<NaiveDate, FieldValue>>> = schema
        .instruments()
        .iter()
        .map(|instrument| vec![BTreeMap::new(); instrument.fields.len()])
        .collect();

    let mut ignored = 0_usize;
    for point in points {
        let slot = schema.position(&point.instrument).and_then(|i| {
            let instrument = &schema.instruments()[i];
            let f = instrument.fields.iter().position(|f| f.name == point.field)?;
            Some((i, f))
        });
        match slot {
            Some((i, f)) => {
                series[i][f].insert(point.date, point.value);
            }
            None => ignored += 1,
        }
    }
    if ignored > 0 {
        log::debug!("Ignored {ignored} point(s) outside the schema");
    }

    let mut rows = BTreeMap::new();
    for (i, (instrument, fields)) in schema.instruments().iter().zip(&series).enumerate() {
        for date in joined_dates(fields) {
            if !range.contains(date) {
                continue;
            }
            let row = fields.iter().zip(&instrument.fields).fold(
                WideRow::missing(date, instrument),
                |mut row, (values, field)| {
                    if let Some(value) = values.get(&date)
                        && let Err(e) = row.set(&field.name, *value)
                    {
                        log::warn!("{e}");
                    }
                    row
                },
            );
            rows.insert((date, i), row);
        }
    }

    rows.into_values().collect()
}

/// Dates present in every series. Empty if there are no series or any of
/// them is empty.
fn joined_dates(fields: &[BTreeMap<NaiveDate, FieldValue>]) -> Vec<NaiveDate> {
    let Some((first, rest)) = fields.split_first() else {
        return Vec::new();
    };
    first
        .keys()
        .copied()
        .filter(|date| rest.iter().all(|series| series.contains_key(date)))
        .collect()
}

/// One table per instrument, columns in field order.
///
/// `label` names each column; the table is named after the instrument.
#[must_use]
pub fn tables_by_instrument<L>(rows: &[WideRow], schema: &InstrumentSchema, label: L) -> Vec<Table>
where
    L: Fn(&InstrumentSpec, &FieldSpec) -> String,
{
    schema
        .instruments()
        .iter()
        .map(|instrument| {
            let columns = instrument
                .fields
                .iter()
                .map(|field| label(instrument, field))
                .collect();
            let mut table = Table::new(instrument.id.clone(), columns);
            table.rows = rows
                .iter()
                .filter(|row| row.instrument == instrument.id)
                .map(|row| TableRow {
                    date: row.date,
                    values: instrument
                        .fields
                        .iter()
                        .map(|field| row.get(&field.name).unwrap_or(FieldValue::Missing))
                        .collect(),
                })
                .collect();
            table
        })
        .collect()
}

/// One table per field, one column per instrument.
///
/// Each table has a row for every date any instrument has a row for;
/// instruments without a row on that date are missing.
#[must_use]
pub fn tables_by_field(rows: &[WideRow], schema: &InstrumentSchema, fields: &[&str]) -> Vec<Table> {
    let dates: BTreeSet<NaiveDate> = rows.iter().map(|row| row.date).collect();
    let instruments = schema.instruments();

    fields
        .iter()
        .map(|&field| {
            let columns = instruments.iter().map(|i| i.id.clone()).collect();
            let mut table = Table::new(field, columns);
            table.rows = dates
                .iter()
                .map(|&date| TableRow {
                    date,
                    values: instruments
                        .iter()
                        .map(|instrument| {
                            rows.iter()
                                .find(|row| row.date == date && row.instrument == instrument.id)
                                .and_then(|row| row.get(field))
                                .unwrap_or(FieldValue::Missing)
                        })
                        .collect(),
                })
                .collect();
            table
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use bcra_scraper_models::CellRef;
    use rust_decimal::Decimal;

    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2019, 4, d).unwrap()
    }

    fn value(s: &str) -> FieldValue {
        FieldValue::Value(s.parse::<Decimal>().unwrap())
    }

    fn schema() -> InstrumentSchema {
        let fields = || {
            vec![
                FieldSpec::new("tp_usd", CellRef::DateRow { column: 1 }),
                FieldSpec::new("tc_local", CellRef::DateRow { column: 2 }),
            ]
        };
        InstrumentSchema::new(vec![
            InstrumentSpec::new("dolar", "Dolar Estadounidense", fields()),
            InstrumentSpec::new("euro", "Euro", fields()),
        ])
    }

    fn row(date: NaiveDate, instrument: &str, tp: FieldValue, tc: FieldValue) -> WideRow {
        let schema = schema();
        let mut row = WideRow::missing(date, schema.instrument(instrument).unwrap());
        row.set("tp_usd", tp).unwrap();
        row.set("tc_local", tc).unwrap();
        row
    }

    fn point(date: NaiveDate, instrument: &str, field: &str, v: FieldValue) -> TimeSeriesPoint {
        TimeSeriesPoint {
            date,
            instrument: instrument.to_string(),
            field: field.to_string(),
            value: v,
        }
    }

    #[test]
    fn flatten_emits_every_field_most_recent_first() {
        let rows = vec![
            row(day(1), "dolar", value("43.12"), FieldValue::Missing),
            row(day(2), "dolar", value("43.50"), value("43.60")),
        ];

        let points = flatten(&rows, &schema());

        assert_eq!(points.len(), 4);
        assert_eq!(points[0].date, day(2));
        assert_eq!(points[3], point(day(1), "dolar", "tp_usd", value("43.12")));
        assert_eq!(points[2], point(day(1), "dolar", "tc_local", FieldValue::Missing));
    }

    #[test]
    fn pivot_inverts_flatten() {
        let rows = vec![
            row(day(1), "dolar", value("43.12"), FieldValue::Missing),
            row(day(1), "euro", value("48.40"), value("48.41")),
            row(day(2), "dolar", value("43.50"), value("43.60")),
            row(day(2), "euro", FieldValue::Missing, FieldValue::Missing),
        ];
        let schema = schema();

        let rebuilt = pivot(&flatten(&rows, &schema), &schema, &DateRange::new(day(1), day(2)));

        assert_eq!(rebuilt, rows);
    }

    #[test]
    fn pivot_filters_to_range() {
        let rows = vec![
            row(day(1), "dolar", value("1"), value("2")),
            row(day(2), "dolar", value("3"), value("4")),
            row(day(3), "dolar", value("5"), value("6")),
        ];
        let schema = schema();

        let rebuilt = pivot(&flatten(&rows, &schema), &schema, &DateRange::new(day(2), day(2)));

        assert_eq!(rebuilt, vec![rows[1].clone()]);
    }

    #[test]
    fn instrument_with_empty_series_contributes_nothing() {
        let points = vec![
            point(day(1), "dolar", "tp_usd", value("43.12")),
            point(day(1), "dolar", "tc_local", value("43.20")),
            point(day(1), "euro", "tp_usd", value("48.40")),
        ];

        let rebuilt = pivot(&points, &schema(), &DateRange::new(day(1), day(1)));

        assert_eq!(rebuilt.len(), 1);
        assert_eq!(rebuilt[0].instrument, "dolar");
    }

    #[test]
    fn dates_missing_from_one_series_are_dropped() {
        let points = vec![
            point(day(1), "dolar", "tp_usd", value("1")),
            point(day(2), "dolar", "tp_usd", value("2")),
            point(day(2), "dolar", "tc_local", value("3")),
        ];

        let rebuilt = pivot(&points, &schema(), &DateRange::new(day(1), day(2)));

        assert_eq!(rebuilt.len(), 1);
        assert_eq!(rebuilt[0].date, day(2));
    }

    #[test]
    fn last_duplicate_point_wins() {
        let points = vec![
            point(day(1), "dolar", "tp_usd", value("1")),
            point(day(1), "dolar", "tc_local", value("2")),
            point(day(1), "dolar", "tp_usd", value("9")),
        ];

        let rebuilt = pivot(&points, &schema(), &DateRange::new(day(1), day(1)));

        assert_eq!(rebuilt[0].get("tp_usd"), Some(value("9")));
    }

    #[test]
    fn unknown_points_are_ignored() {
        let points = vec![
            point(day(1), "libra", "tp_usd", value("1")),
            point(day(1), "dolar", "tp_usd", value("1")),
            point(day(1), "dolar", "tc_local", value("2")),
            point(day(1), "dolar", "spread", value("3")),
        ];

        let rebuilt = pivot(&points, &schema(), &DateRange::new(day(1), day(1)));

        assert_eq!(rebuilt.len(), 1);
        assert_eq!(rebuilt[0].fields().count(), 2);
    }

    #[test]
    fn tables_by_field_fill_gaps() {
        let rows = vec![
            row(day(1), "dolar", value("43.12"), value("43.20")),
            row(day(2), "euro", value("48.40"), value("48.41")),
        ];

        let tables = tables_by_field(&rows, &schema(), &["tc_local"]);

        assert_eq!(tables.len(), 1);
        let table = &tables[0];
        assert_eq!(table.name, "tc_local");
        assert_eq!(table.header(), vec!["indice_tiempo", "dolar", "euro"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.value(0, "dolar"), Some(value("43.20")));
        assert_eq!(table.value(0, "euro"), Some(FieldValue::Missing));
        assert_eq!(table.value(1, "euro"), Some(value("48.41")));
    }

    #[test]
    fn tables_by_instrument_use_labels() {
        let rows = vec![row(day(1), "euro", value("48.40"), value("48.41"))];

        let tables = tables_by_instrument(&rows, &schema(), |instrument, field| {
            format!("{}_{}", field.name, instrument.id)
        });

        assert_eq!(tables.len(), 2);
        assert!(tables[0].is_empty());
        assert_eq!(tables[1].columns, vec!["tp_usd_euro", "tc_local_euro"]);
        assert_eq!(tables[1].value(0, "tc_local_euro"), Some(value("48.41")));
    }
}
