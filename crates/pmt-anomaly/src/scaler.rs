//! Per-feature standardization.
//!
//! Statistics are fit on the training portion of a series and persisted with
//! the model, so detection batches are scaled exactly like the data the
//! auto-encoder learned on.

use ndarray::{Array2, Axis};
use pmt_core::{PmtError, PmtResult};
use serde::{Deserialize, Serialize};

/// Guard against division by a vanishing spread on constant features.
const MIN_STD: f64 = 1e-12;

/// Zero-mean unit-variance scaler, one (mean, std) pair per feature column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Vec<f64>,
    std: Vec<f64>,
}

impl StandardScaler {
    /// Fit on a (samples × features) matrix.
    pub fn fit(data: &Array2<f64>) -> PmtResult<Self> {
        if data.nrows() == 0 || data.ncols() == 0 {
            return Err(PmtError::InvalidInput(
                "cannot fit a scaler on an empty matrix".into(),
            ));
        }

        let n = data.nrows() as f64;
        let mean: Vec<f64> = data
            .mean_axis(Axis(0))
            .expect("non-empty by the guard above")
            .to_vec();
        let std: Vec<f64> = data
            .axis_iter(Axis(1))
            .zip(mean.iter())
            .map(|(column, &mu)| {
                let variance = column.iter().map(|v| (v - mu) * (v - mu)).sum::<f64>() / n;
                variance.sqrt().max(MIN_STD)
            })
            .collect();

        Ok(Self { mean, std })
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    /// Standardize a matrix column-wise with the fitted statistics.
    pub fn transform(&self, data: &Array2<f64>) -> PmtResult<Array2<f64>> {
        if data.ncols() != self.mean.len() {
            return Err(PmtError::InvalidInput(format!(
                "scaler fitted on {} features, got {}",
                self.mean.len(),
                data.ncols()
            )));
        }
        let mut scaled = data.clone();
        for (j, mut column) in scaled.axis_iter_mut(Axis(1)).enumerate() {
            column.mapv_inplace(|v| (v - self.mean[j]) / self.std[j]);
        }
        Ok(scaled)
    }
}
