//! Anomaly detection over scored windows.
//!
//! Q catches windows the model cannot reconstruct; T² catches windows that
//! land in unusual latent regions even when reconstruction looks fine. Both
//! series are smoothed by a trailing rolling median and compared against
//! percentile thresholds computed on the detection batch itself.

use crate::train::TrainedDetector;
use crate::window::WindowSet;
use chrono::{DateTime, Utc};
use ndarray::Array2;
use pmt_core::{PmtError, PmtResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

/// Flag label carried on every detection row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Normal,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Normal => "normal",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One detection row, stamped at the window's last sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Window ordinal within the detection batch
    pub index: usize,
    /// Timestamp of the window end, when the caller supplied timestamps
    pub timestamp: Option<DateTime<Utc>>,
    /// Smoothed reconstruction-error statistic
    pub q: f64,
    /// Smoothed latent-norm statistic
    pub t2: f64,
    /// Raw (unsmoothed) reconstruction error
    pub reconstruction_error: f64,
    /// Raw (unsmoothed) latent distance
    pub latent_distance: f64,
    pub q_threshold: f64,
    pub t2_threshold: f64,
    pub is_anomaly: bool,
    pub severity: Severity,
}

/// Batch-level tallies of one detection run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionSummary {
    pub total_windows: usize,
    pub anomalies_detected: usize,
    pub anomaly_fraction: f64,
    pub mean_q: f64,
    pub mean_t2: f64,
    pub max_q: f64,
    pub max_t2: f64,
}

/// Full result of a detection run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionReport {
    pub detections: Vec<Detection>,
    pub q_threshold: f64,
    pub t2_threshold: f64,
    pub summary: DetectionSummary,
}

/// Run detection over a (samples × features) series.
///
/// `timestamps`, when given, must align with the series rows; each
/// detection is stamped with the timestamp of its window end. Thresholds
/// are the `threshold_percentile`-th percentile of the smoothed statistics
/// over this batch, and a window is anomalous when either smoothed
/// statistic exceeds its threshold.
pub fn detect_anomalies(
    detector: &mut TrainedDetector,
    series: &Array2<f64>,
    timestamps: Option<&[DateTime<Utc>]>,
    threshold_percentile: f64,
    rolling_window: usize,
) -> PmtResult<DetectionReport> {
    if let Some(stamps) = timestamps {
        if stamps.len() != series.nrows() {
            return Err(PmtError::InvalidInput(format!(
                "{} timestamps for {} samples",
                stamps.len(),
                series.nrows()
            )));
        }
    }
    if rolling_window == 0 {
        return Err(PmtError::Config("rolling window must be > 0".into()));
    }
    if !(0.0..=100.0).contains(&threshold_percentile) {
        return Err(PmtError::Config(format!(
            "percentile {threshold_percentile} outside [0, 100]"
        )));
    }

    let scaled = detector.scaler.transform(series)?;
    let windows = WindowSet::from_series(&scaled, detector.window_size)?;
    let (q_raw, t2_raw) = detector.score(windows.windows());

    let q_smooth = rolling_median(&q_raw, rolling_window);
    let t2_smooth = rolling_median(&t2_raw, rolling_window);

    let q_threshold = percentile(&q_smooth, threshold_percentile);
    let t2_threshold = percentile(&t2_smooth, threshold_percentile);

    let mut detections = Vec::with_capacity(windows.len());
    for i in 0..windows.len() {
        let is_anomaly = q_smooth[i] > q_threshold || t2_smooth[i] > t2_threshold;
        detections.push(Detection {
            index: i,
            timestamp: timestamps.map(|stamps| stamps[windows.end_index(i)]),
            q: q_smooth[i],
            t2: t2_smooth[i],
            reconstruction_error: q_raw[i],
            latent_distance: t2_raw[i],
            q_threshold,
            t2_threshold,
            is_anomaly,
            severity: if is_anomaly {
                Severity::Critical
            } else {
                Severity::Normal
            },
        });
    }

    let anomalies = detections.iter().filter(|d| d.is_anomaly).count();
    let summary = DetectionSummary {
        total_windows: detections.len(),
        anomalies_detected: anomalies,
        anomaly_fraction: anomalies as f64 / detections.len().max(1) as f64,
        mean_q: mean(&q_smooth),
        mean_t2: mean(&t2_smooth),
        max_q: q_smooth.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        max_t2: t2_smooth.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    };

    info!(
        windows = summary.total_windows,
        anomalies = summary.anomalies_detected,
        q_threshold,
        t2_threshold,
        "anomaly detection finished"
    );

    Ok(DetectionReport {
        detections,
        q_threshold,
        t2_threshold,
        summary,
    })
}

/// Trailing rolling median over up to `window` values, partial at the start.
pub(crate) fn rolling_median(values: &[f64], window: usize) -> Vec<f64> {
    let mut smoothed = Vec::with_capacity(values.len());
    for i in 0..values.len() {
        let start = (i + 1).saturating_sub(window);
        let mut slice = values[start..=i].to_vec();
        slice.sort_by(f64::total_cmp);
        let mid = slice.len() / 2;
        let median = if slice.len() % 2 == 1 {
            slice[mid]
        } else {
            0.5 * (slice[mid - 1] + slice[mid])
        };
        smoothed.push(median);
    }
    smoothed
}

/// Linear-interpolated percentile of an unsorted slice.
pub(crate) fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as f64;
    sorted[lower] + fraction * (sorted[upper] - sorted[lower])
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
