//! Imagery table loading.
//!
//! The dataset is a MessagePack-serialised list of [Record]s produced by the
//! ingest tooling. Loading derives the `year` and `month` columns from the
//! `start_date` string and validates the schema before any consumer sees the
//! table.

use crate::error::AquaviewError;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use strum_macros::Display;

/// One row of the imagery table: a MODIS AQUA granule with its metadata and
/// an optional embedded PNG rendering.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Record {
    /// Granule identifier, e.g. `MYD021KM.A2020167.1845`
    pub granule_id: String,
    /// Acquisition start date, `YYYY-MM-DD...`
    pub start_date: String,
    /// Source platform name
    pub satellite: String,
    /// Spatial resolution in kilometres
    pub resolution_km: Option<f64>,
    /// Cloud fraction over the granule, 0..1
    pub cloud_fraction: Option<f64>,
    /// PNG-encoded rendering of the granule, if one was generated
    pub image: Option<Bytes>,
    /// Derived from `start_date` at load time, not persisted
    #[serde(skip)]
    pub year: i64,
    /// Derived from `start_date` at load time, not persisted
    #[serde(skip)]
    pub month: i64,
}

/// Declared type of a table column.
#[derive(Clone, Copy, Debug, Display, PartialEq, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Int,
    Float,
    Str,
    Image,
}

/// A column of the table schema.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnKind,
}

/// The fixed schema of the imagery table, derived columns last.
pub const SCHEMA: &[Column] = &[
    Column {
        name: "granule_id",
        kind: ColumnKind::Str,
    },
    Column {
        name: "start_date",
        kind: ColumnKind::Str,
    },
    Column {
        name: "satellite",
        kind: ColumnKind::Str,
    },
    Column {
        name: "resolution_km",
        kind: ColumnKind::Float,
    },
    Column {
        name: "cloud_fraction",
        kind: ColumnKind::Float,
    },
    Column {
        name: "image",
        kind: ColumnKind::Image,
    },
    Column {
        name: "year",
        kind: ColumnKind::Int,
    },
    Column {
        name: "month",
        kind: ColumnKind::Int,
    },
];

/// The in-memory imagery table.
///
/// Loaded once and treated as read-only by all consumers; any filtering
/// operates on copies of the row indices, never on the table itself.
#[derive(Clone, Debug)]
pub struct Table {
    records: Vec<Record>,
    /// Hex MD5 digest of the serialised content, used as a cache key.
    digest: String,
}

impl Table {
    /// Build a table from records, deriving the `year` and `month` columns.
    ///
    /// Fails with [AquaviewError::InvalidStartDate] if any record's start
    /// date is too short or has non-numeric year/month slices.
    pub fn from_records(mut records: Vec<Record>) -> Result<Self, AquaviewError> {
        for (index, record) in records.iter_mut().enumerate() {
            let (year, month) =
                derive_year_month(&record.start_date).ok_or_else(|| {
                    AquaviewError::InvalidStartDate {
                        index,
                        value: record.start_date.clone(),
                    }
                })?;
            record.year = year;
            record.month = month;
        }
        let digest = content_digest(&records);
        Ok(Self { records, digest })
    }

    /// All records, in load order.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.records.len()
    }

    /// Number of columns, including the derived ones.
    pub fn columns(&self) -> usize {
        SCHEMA.len()
    }

    /// Content digest identifying this table snapshot.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Approximate memory footprint in bytes: struct sizes plus heap
    /// allocations for strings and embedded images.
    pub fn memory_bytes(&self) -> u64 {
        let fixed = std::mem::size_of::<Record>() * self.records.len();
        let heap: usize = self
            .records
            .iter()
            .map(|r| {
                r.granule_id.len()
                    + r.start_date.len()
                    + r.satellite.len()
                    + r.image.as_ref().map_or(0, |img| img.len())
            })
            .sum();
        (fixed + heap) as u64
    }
}

/// Hex MD5 digest over every field of every record, in row order.
///
/// Identifies a table snapshot so that derived artifacts (the CSV export)
/// can be reused for identical content.
fn content_digest(records: &[Record]) -> String {
    let mut context = md5::Context::new();
    for record in records {
        context.consume(record.granule_id.as_bytes());
        context.consume([0]);
        context.consume(record.start_date.as_bytes());
        context.consume([0]);
        context.consume(record.satellite.as_bytes());
        context.consume([0]);
        context.consume(record.resolution_km.map_or(u64::MAX, f64::to_bits).to_le_bytes());
        context.consume(record.cloud_fraction.map_or(u64::MAX, f64::to_bits).to_le_bytes());
        match &record.image {
            Some(image) => context.consume(image),
            None => context.consume([0]),
        }
    }
    format!("{:x}", context.compute())
}

/// Derive `(year, month)` from a `YYYY-MM-DD...` date string.
///
/// Year is the integer value of the first 4 characters and month the integer
/// value of characters 5..7. This is deliberately a character-slice contract,
/// not a date parse: it matches how the table was built and keeps derived
/// values bit-identical with the ingest side.
pub fn derive_year_month(start_date: &str) -> Option<(i64, i64)> {
    let year = start_date.get(0..4)?.parse::<i64>().ok()?;
    let month = start_date.get(5..7)?.parse::<i64>().ok()?;
    Some((year, month))
}

/// Validate that the configured image column exists in the schema and is of
/// image kind, failing fast with [AquaviewError::SchemaMismatch] otherwise.
pub fn validate_image_column(column: &str) -> Result<(), AquaviewError> {
    let found = SCHEMA
        .iter()
        .any(|c| c.name == column && c.kind == ColumnKind::Image);
    if found {
        Ok(())
    } else {
        Err(AquaviewError::SchemaMismatch {
            column: column.to_string(),
        })
    }
}

/// Load the imagery table from a MessagePack file.
///
/// Deterministic for a fixed backing file. Propagates read and decode errors;
/// no partial table is ever returned.
pub fn load(path: &Path, image_column: &str) -> Result<Table, AquaviewError> {
    validate_image_column(image_column)?;
    let raw = fs::read(path).map_err(|err| AquaviewError::DatasetRead {
        path: path.display().to_string(),
        source: err,
    })?;
    let records: Vec<Record> =
        rmp_serde::from_slice(&raw).map_err(|err| AquaviewError::DatasetDecode {
            path: path.display().to_string(),
            source: err,
        })?;
    let table = Table::from_records(records)?;
    tracing::info!(
        rows = table.rows(),
        columns = table.columns(),
        digest = table.digest(),
        "loaded imagery table from {}",
        path.display()
    );
    Ok(table)
}

/// Serialise a table's records back to MessagePack bytes.
///
/// Used by the ingest tooling and tests to produce dataset files.
pub fn to_msgpack(records: &[Record]) -> Result<Vec<u8>, rmp_serde::encode::Error> {
    rmp_serde::to_vec_named(records)
}
