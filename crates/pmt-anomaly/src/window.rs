//! Sliding-window extraction.
//!
//! Windows slide with stride one over a standardized (samples × features)
//! series and are flattened row-major, so a window of length W over F
//! features becomes a W·F vector. Both auto-encoder variants consume the
//! flattened form; the convolutional one treats it as a single-channel
//! sequence.

use ndarray::Array2;
use pmt_core::{PmtError, PmtResult};

/// Flattened sliding windows plus the geometry they were cut with.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSet {
    /// (n_windows × window_size·n_features)
    windows: Array2<f64>,
    window_size: usize,
    n_features: usize,
}

impl WindowSet {
    /// Cut stride-1 windows of `window_size` samples from a standardized
    /// series. Fails when the series is shorter than one window.
    pub fn from_series(series: &Array2<f64>, window_size: usize) -> PmtResult<Self> {
        if window_size == 0 {
            return Err(PmtError::InvalidInput("window size must be > 0".into()));
        }
        let n_samples = series.nrows();
        let n_features = series.ncols();
        if n_features == 0 {
            return Err(PmtError::InvalidInput("series has no features".into()));
        }
        if n_samples < window_size {
            return Err(PmtError::InvalidInput(format!(
                "series of {n_samples} samples is shorter than one window of {window_size}"
            )));
        }

        let n_windows = n_samples - window_size + 1;
        let flat_len = window_size * n_features;
        let mut windows = Array2::zeros((n_windows, flat_len));
        for w in 0..n_windows {
            for offset in 0..window_size {
                for feature in 0..n_features {
                    windows[[w, offset * n_features + feature]] = series[[w + offset, feature]];
                }
            }
        }

        Ok(Self {
            windows,
            window_size,
            n_features,
        })
    }

    pub fn windows(&self) -> &Array2<f64> {
        &self.windows
    }

    pub fn len(&self) -> usize {
        self.windows.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.nrows() == 0
    }

    pub fn flat_len(&self) -> usize {
        self.window_size * self.n_features
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Index into the source series of the last sample of window `w`;
    /// detections are stamped at window end.
    pub fn end_index(&self, w: usize) -> usize {
        w + self.window_size - 1
    }

    /// Ordered train/validation split over whole windows.
    pub fn split(&self, validation_fraction: f64) -> (Array2<f64>, Array2<f64>) {
        let n_train =
            ((self.len() as f64) * (1.0 - validation_fraction)).floor() as usize;
        let n_train = n_train.min(self.len());
        let train = self.windows.slice(ndarray::s![..n_train, ..]).to_owned();
        let validation = self.windows.slice(ndarray::s![n_train.., ..]).to_owned();
        (train, validation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn windows_slide_with_stride_one() {
        let series = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let set = WindowSet::from_series(&series, 3).unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(set.windows().row(0).to_vec(), vec![1.0, 2.0, 3.0]);
        assert_eq!(set.windows().row(2).to_vec(), vec![3.0, 4.0, 5.0]);
        assert_eq!(set.end_index(0), 2);
        assert_eq!(set.end_index(2), 4);
    }

    #[test]
    fn multi_feature_windows_flatten_row_major() {
        let series = array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0]];
        let set = WindowSet::from_series(&series, 2).unwrap();
        assert_eq!(set.flat_len(), 4);
        assert_eq!(set.windows().row(0).to_vec(), vec![1.0, 10.0, 2.0, 20.0]);
        assert_eq!(set.windows().row(1).to_vec(), vec![2.0, 20.0, 3.0, 30.0]);
    }

    #[test]
    fn short_series_is_rejected() {
        let series = array![[1.0], [2.0]];
        assert!(WindowSet::from_series(&series, 3).is_err());
    }

    #[test]
    fn split_preserves_window_order() {
        let series = Array2::from_shape_fn((12, 1), |(i, _)| i as f64);
        let set = WindowSet::from_series(&series, 3).unwrap();
        assert_eq!(set.len(), 10);
        let (train, validation) = set.split(0.2);
        assert_eq!(train.nrows(), 8);
        assert_eq!(validation.nrows(), 2);
        assert_eq!(train.row(0)[0], 0.0);
        assert_eq!(validation.row(0)[0], 8.0);
    }
}
