//! Read-only table operations.
//!
//! Everything in this module is a pure function over `&Table`; the table is
//! never mutated and previews that reorder rows work on copied indices.

use crate::dataset::{Record, Table, SCHEMA};
use crate::error::AquaviewError;
use crate::models::{
    ColumnInfo, DescribeReport, NumericColumnStats, Preview, PreviewMode, PreviewRow,
    TableSummary, UniqueCount,
};

use byte_unit::{Byte, UnitType};
use ndarray::Array1;
use ndarray_stats::QuantileExt;
use rand::seq::index::sample as index_sample;
use std::collections::HashSet;
use validator::ValidationError;

/// Largest random sample a preview may request.
const MAX_SAMPLE_SIZE: usize = 100;

/// Numeric columns and their value extractors, in schema order.
const NUMERIC_COLUMNS: &[(&str, fn(&Record) -> Option<f64>)] = &[
    ("resolution_km", |r| r.resolution_km),
    ("cloud_fraction", |r| r.cloud_fraction),
    ("year", |r| Some(r.year as f64)),
    ("month", |r| Some(r.month as f64)),
];

/// Non-numeric columns and their value extractors, in schema order.
const TEXT_COLUMNS: &[(&str, fn(&Record) -> &str)] = &[
    ("granule_id", |r| &r.granule_id),
    ("start_date", |r| &r.start_date),
    ("satellite", |r| &r.satellite),
];

/// Return the table summary: dimensions, memory footprint and schema.
pub fn summary(table: &Table) -> TableSummary {
    let memory_bytes = table.memory_bytes();
    let memory_human = format!(
        "{:.2}",
        Byte::from_u64(memory_bytes).get_appropriate_unit(UnitType::Binary)
    );
    TableSummary {
        rows: table.rows(),
        columns: table.columns(),
        memory_bytes,
        memory_human,
        digest: table.digest().to_string(),
        column_types: SCHEMA
            .iter()
            .map(|column| ColumnInfo {
                name: column.name.to_string(),
                kind: column.kind.to_string(),
            })
            .collect(),
    }
}

/// Execute a preview request against the table.
///
/// The row-count-dependent bounds are enforced here: sample size is limited
/// to `min(100, rows)` and slices must satisfy `start < end <= rows`.
pub fn preview(table: &Table, mode: &PreviewMode) -> Result<Preview, AquaviewError> {
    let rows = table.rows();
    let indices: Vec<usize> = match *mode {
        PreviewMode::Head { rows: n } => (0..rows.min(n)).collect(),
        PreviewMode::Tail { rows: n } => (rows.saturating_sub(n)..rows).collect(),
        PreviewMode::Sample { size } => {
            let limit = rows.min(MAX_SAMPLE_SIZE);
            if size > limit {
                let mut error = ValidationError::new("sample size exceeds table limit");
                error.add_param("size".into(), &size);
                error.add_param("limit".into(), &limit);
                return Err(AquaviewError::PreviewOutOfBounds(error));
            }
            index_sample(&mut rand::thread_rng(), rows, size).into_vec()
        }
        PreviewMode::Slice { start, end } => {
            if start >= end || end > rows {
                let mut error = ValidationError::new("slice exceeds table bounds");
                error.add_param("start".into(), &start);
                error.add_param("end".into(), &end);
                error.add_param("rows".into(), &rows);
                return Err(AquaviewError::PreviewOutOfBounds(error));
            }
            (start..end).collect()
        }
    };
    let records = table.records();
    let rows = indices
        .into_iter()
        .map(|index| project_row(index, &records[index]))
        .collect();
    Ok(Preview { rows })
}

/// Project a record into its scalar preview form.
fn project_row(index: usize, record: &Record) -> PreviewRow {
    PreviewRow {
        index,
        granule_id: record.granule_id.clone(),
        start_date: record.start_date.clone(),
        satellite: record.satellite.clone(),
        resolution_km: record.resolution_km,
        cloud_fraction: record.cloud_fraction,
        year: record.year,
        month: record.month,
        has_image: record.image.is_some(),
    }
}

/// Compute descriptive statistics over numeric columns and unique-value
/// counts over non-numeric columns.
pub fn describe(table: &Table) -> DescribeReport {
    let numeric = NUMERIC_COLUMNS
        .iter()
        .map(|(name, extract)| describe_column(name, table, *extract))
        .collect();
    let non_numeric = TEXT_COLUMNS
        .iter()
        .map(|(name, extract)| {
            let unique: HashSet<&str> = table.records().iter().map(|r| extract(r)).collect();
            UniqueCount {
                column: name.to_string(),
                unique: unique.len(),
            }
        })
        .collect();
    DescribeReport {
        numeric,
        non_numeric,
    }
}

/// Statistics for one numeric column. NaN values count as missing.
fn describe_column(
    name: &str,
    table: &Table,
    extract: fn(&Record) -> Option<f64>,
) -> NumericColumnStats {
    let values: Vec<f64> = table
        .records()
        .iter()
        .filter_map(extract)
        .filter(|v| !v.is_nan())
        .collect();
    let count = values.len();
    if count == 0 {
        return NumericColumnStats {
            column: name.to_string(),
            count,
            mean: None,
            std: None,
            min: None,
            q25: None,
            q50: None,
            q75: None,
            max: None,
        };
    }
    let array = Array1::from_vec(values.clone());
    let mean = array.mean();
    // Sample standard deviation (ddof = 1).
    let std = if count > 1 { Some(array.std(1.0)) } else { None };
    let min = array.min().ok().copied();
    let max = array.max().ok().copied();
    let mut sorted = values;
    sorted.sort_by(|a, b| a.total_cmp(b));
    NumericColumnStats {
        column: name.to_string(),
        count,
        mean,
        std,
        min,
        q25: Some(quantile(&sorted, 0.25)),
        q50: Some(quantile(&sorted, 0.5)),
        q75: Some(quantile(&sorted, 0.75)),
        max,
    }
}

/// Linearly interpolated quantile of a non-empty sorted slice.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let position = q * (sorted.len() - 1) as f64;
    let low = position.floor() as usize;
    let high = position.ceil() as usize;
    if low == high {
        sorted[low]
    } else {
        let fraction = position - low as f64;
        sorted[low] + (sorted[high] - sorted[low]) * fraction
    }
}

/// Encode the full table as UTF-8 CSV: a header row followed by one row per
/// record, columns in schema order. Embedded images are hex-encoded so the
/// export round-trips losslessly.
pub fn to_csv(table: &Table) -> Result<Vec<u8>, AquaviewError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(SCHEMA.iter().map(|column| column.name))?;
    for record in table.records() {
        writer.write_record(&[
            record.granule_id.clone(),
            record.start_date.clone(),
            record.satellite.clone(),
            record.resolution_km.map(|v| v.to_string()).unwrap_or_default(),
            record.cloud_fraction.map(|v| v.to_string()).unwrap_or_default(),
            record.image.as_ref().map(hex::encode).unwrap_or_default(),
            record.year.to_string(),
            record.month.to_string(),
        ])?;
    }
    writer
        .into_inner()
        .map_err(|err| AquaviewError::CsvEncode(err.into_error().into()))
}
