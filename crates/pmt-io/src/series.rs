//! Sensor time-series import for the anomaly pipeline.
//!
//! One timestamp column followed by one column per feature. Decimal commas
//! are normalised like everywhere else; rows with unparseable values are
//! dropped with a warning rather than failing the file.

use crate::orders::parse_number;
use chrono::{DateTime, NaiveDateTime, Utc};
use ndarray::Array2;
use pmt_core::{PmtError, PmtResult};
use std::path::Path;
use tracing::warn;

/// A loaded sensor series: row-aligned timestamps, feature names, and the
/// (samples × features) value matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorSeries {
    pub timestamps: Vec<DateTime<Utc>>,
    pub feature_names: Vec<String>,
    pub values: Array2<f64>,
}

impl SensorSeries {
    pub fn n_samples(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.values.ncols()
    }
}

/// Load a series from CSV. The first column is the timestamp; every further
/// column is a feature.
pub fn load_sensor_series(path: &Path) -> PmtResult<SensorSeries> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| PmtError::Parse(format!("opening '{}': {e}", path.display())))?;

    let headers = reader
        .headers()
        .map_err(|e| PmtError::Parse(format!("reading headers: {e}")))?
        .clone();
    if headers.len() < 2 {
        return Err(PmtError::Parse(
            "sensor series needs a timestamp column and at least one feature".into(),
        ));
    }
    let feature_names: Vec<String> = headers.iter().skip(1).map(String::from).collect();

    let mut timestamps = Vec::new();
    let mut rows: Vec<Vec<f64>> = Vec::new();
    for (row_number, record) in reader.records().enumerate() {
        let record =
            record.map_err(|e| PmtError::Parse(format!("row {}: {e}", row_number + 2)))?;

        let stamp_raw = record.get(0).unwrap_or_default();
        let Some(timestamp) = parse_timestamp(stamp_raw) else {
            warn!(row = row_number + 2, value = stamp_raw, "dropping row with bad timestamp");
            continue;
        };

        let mut values = Vec::with_capacity(feature_names.len());
        let mut ok = true;
        for (j, name) in feature_names.iter().enumerate() {
            let raw = record.get(j + 1).unwrap_or_default();
            match parse_number(raw) {
                Some(value) => values.push(value),
                None => {
                    warn!(row = row_number + 2, column = %name, value = raw, "dropping row with bad value");
                    ok = false;
                    break;
                }
            }
        }
        if !ok {
            continue;
        }

        timestamps.push(timestamp);
        rows.push(values);
    }

    if rows.is_empty() {
        return Err(PmtError::InvalidInput(format!(
            "'{}' contains no usable samples",
            path.display()
        )));
    }

    let n_features = feature_names.len();
    let mut values = Array2::zeros((rows.len(), n_features));
    for (i, row) in rows.iter().enumerate() {
        for (j, v) in row.iter().enumerate() {
            values[[i, j]] = *v;
        }
    }

    Ok(SensorSeries {
        timestamps,
        feature_names,
        values,
    })
}

/// Accept RFC 3339 and the space-separated form without a zone (taken as UTC).
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if let Ok(stamp) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(stamp.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(naive.and_utc());
        }
    }
    None
}
