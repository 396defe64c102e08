//! # pmt-anomaly: Sliding-Window Auto-Encoder Anomaly Detection
//!
//! Flags sensor windows whose reconstruction error (Q) or latent magnitude
//! (T²) lies above data-driven percentile thresholds. Together the two
//! statistics cover additive departures the model cannot reconstruct and
//! multiplicative ones that push windows into unusual latent regions.
//!
//! ## Pipeline
//!
//! 1. [`StandardScaler`] — per-feature standardization, fit on the training
//!    portion and persisted with the model;
//! 2. [`WindowSet`] — stride-1 sliding windows, flattened across features;
//! 3. [`train_autoencoder`] — mini-batch MSE training with Adam on a
//!    [`DenseAutoencoder`] or [`ConvAutoencoder`];
//! 4. [`detect_anomalies`] — Q/T² scoring, rolling-median smoothing,
//!    percentile thresholds, per-window [`Detection`] rows.
//!
//! The trainer drives networks only through the narrow [`AutoencoderNet`]
//! capability, so a different backend can be plugged in without touching
//! the training loop or the detection logic.

use ndarray::Array2;

pub mod conv;
pub mod dense;
pub mod detect;
mod layers;
pub mod scaler;
pub mod train;
pub mod window;

pub use conv::ConvAutoencoder;
pub use dense::DenseAutoencoder;
pub use detect::{
    detect_anomalies, Detection, DetectionReport, DetectionSummary, Severity,
};
pub use scaler::StandardScaler;
pub use train::{train_autoencoder, TrainedDetector};
pub use window::WindowSet;

/// Narrow training/inference capability of an auto-encoder backend.
///
/// `forward` returns the reconstruction and the latent codes of a batch and
/// caches whatever the backward pass needs; `backward` consumes the loss
/// gradient with respect to the reconstruction; `step` applies one
/// optimizer update from the stored gradients.
pub trait AutoencoderNet {
    fn input_dim(&self) -> usize;
    fn latent_dim(&self) -> usize;
    fn forward(&mut self, batch: &Array2<f64>) -> (Array2<f64>, Array2<f64>);
    fn backward(&mut self, grad_reconstruction: &Array2<f64>);
    fn step(&mut self, learning_rate: f64);
}
