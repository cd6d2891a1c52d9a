//! Request and response models.
//!
//! Requests are explicit command objects: the preview modes and animation
//! parameters that the original dashboard selected through widgets arrive
//! here as validated JSON, and the handlers pass them to pure functions over
//! the table.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError, ValidationErrors};

/// Number of rows shown by the head/tail previews unless the caller asks for
/// something else.
fn default_preview_rows() -> usize {
    10
}

/// One of the four mutually exclusive table preview modes.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PreviewMode {
    /// First `rows` rows
    Head {
        #[serde(default = "default_preview_rows")]
        rows: usize,
    },
    /// Last `rows` rows
    Tail {
        #[serde(default = "default_preview_rows")]
        rows: usize,
    },
    /// Random sample of `size` rows
    Sample { size: usize },
    /// Explicit `[start, end)` row slice
    Slice { start: usize, end: usize },
}

impl Validate for PreviewMode {
    /// Validate the table-independent constraints of a preview request.
    ///
    /// Bounds that depend on the row count are checked when the preview is
    /// executed against a concrete table.
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        match self {
            PreviewMode::Head { rows } | PreviewMode::Tail { rows } => {
                if *rows == 0 {
                    errors.add("rows", ValidationError::new("rows must be greater than 0"));
                }
            }
            PreviewMode::Sample { size } => {
                if *size == 0 {
                    errors.add("size", ValidationError::new("size must be greater than 0"));
                }
            }
            PreviewMode::Slice { start, end } => {
                if start >= end {
                    let mut error = ValidationError::new("slice start must be less than end");
                    error.add_param("start".into(), start);
                    error.add_param("end".into(), end);
                    errors.add("slice", error);
                }
            }
        }
        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Animation playback rate in frames per second.
///
/// Only the rates offered by the dashboard are accepted.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Fps(f64);

/// The fixed set of supported playback rates.
pub const SUPPORTED_FPS: [f64; 5] = [1.0, 2.0, 5.0, 10.0, 15.0];

impl TryFrom<f64> for Fps {
    type Error = String;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if SUPPORTED_FPS.contains(&value) {
            Ok(Fps(value))
        } else {
            Err(format!(
                "unsupported fps {value}, expected one of {SUPPORTED_FPS:?}"
            ))
        }
    }
}

impl From<Fps> for f64 {
    fn from(fps: Fps) -> f64 {
        fps.0
    }
}

impl Fps {
    /// Per-frame display duration in milliseconds: `round(1000 / fps)`.
    pub fn frame_duration_ms(self) -> u32 {
        (1000.0 / self.0).round() as u32
    }
}

impl std::fmt::Display for Fps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.1}", self.0)
    }
}

/// Request data for the animation build.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize, Validate)]
#[serde(deny_unknown_fields)]
#[validate(schema(function = "validate_animation_request"))]
pub struct AnimationRequest {
    /// Inclusive year range `[start, end]`
    pub years: (i64, i64),
    /// Inclusive month range `[start, end]`
    pub months: (i64, i64),
    /// Playback rate
    pub fps: Fps,
}

/// Validate the filter ranges of an animation request.
fn validate_animation_request(request: &AnimationRequest) -> Result<(), ValidationError> {
    let (y0, y1) = request.years;
    if y0 > y1 {
        let mut error = ValidationError::new("year range start must not exceed end");
        error.add_param("years".into(), &request.years);
        return Err(error);
    }
    let (m0, m1) = request.months;
    if m0 > m1 || m0 < 1 || m1 > 12 {
        let mut error = ValidationError::new("month range must lie within [1, 12] and be ordered");
        error.add_param("months".into(), &request.months);
        return Err(error);
    }
    Ok(())
}

/// English month name for a 1-based month number, used in filter feedback.
pub fn month_name(month: i64) -> Option<&'static str> {
    const NAMES: [&str; 12] = [
        "January",
        "February",
        "March",
        "April",
        "May",
        "June",
        "July",
        "August",
        "September",
        "October",
        "November",
        "December",
    ];
    usize::try_from(month - 1).ok().and_then(|i| NAMES.get(i)).copied()
}

/// Per-column entry of the table summary.
#[derive(Debug, Deserialize, PartialEq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub kind: String,
}

/// Table summary: dimensions, footprint and schema.
#[derive(Debug, Deserialize, PartialEq, Serialize)]
pub struct TableSummary {
    pub rows: usize,
    pub columns: usize,
    pub memory_bytes: u64,
    /// Human-readable rendering of `memory_bytes`
    pub memory_human: String,
    pub digest: String,
    pub column_types: Vec<ColumnInfo>,
}

/// Scalar projection of one record, as returned by previews. The embedded
/// image is reported by presence only.
#[derive(Debug, Deserialize, PartialEq, Serialize)]
pub struct PreviewRow {
    /// Position of the row in the table
    pub index: usize,
    pub granule_id: String,
    pub start_date: String,
    pub satellite: String,
    pub resolution_km: Option<f64>,
    pub cloud_fraction: Option<f64>,
    pub year: i64,
    pub month: i64,
    pub has_image: bool,
}

/// Response to a preview request.
#[derive(Debug, Deserialize, PartialEq, Serialize)]
pub struct Preview {
    pub rows: Vec<PreviewRow>,
}

/// Descriptive statistics for one numeric column.
#[derive(Debug, Deserialize, PartialEq, Serialize)]
pub struct NumericColumnStats {
    pub column: String,
    /// Number of non-missing values
    pub count: usize,
    pub mean: Option<f64>,
    /// Sample standard deviation (ddof = 1)
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub q25: Option<f64>,
    pub q50: Option<f64>,
    pub q75: Option<f64>,
    pub max: Option<f64>,
}

/// Unique-value count for one non-numeric column.
#[derive(Debug, Deserialize, PartialEq, Serialize)]
pub struct UniqueCount {
    pub column: String,
    pub unique: usize,
}

/// Response to a describe request.
#[derive(Debug, Deserialize, PartialEq, Serialize)]
pub struct DescribeReport {
    pub numeric: Vec<NumericColumnStats>,
    pub non_numeric: Vec<UniqueCount>,
}
