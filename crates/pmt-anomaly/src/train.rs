//! Auto-encoder training.
//!
//! Mini-batch MSE training with Adam. The scaler is fit on the training
//! portion of the series only and persisted with the model, and the whole
//! run is seeded so a retrain reproduces the same weights.

use crate::conv::ConvAutoencoder;
use crate::dense::DenseAutoencoder;
use crate::scaler::StandardScaler;
use crate::window::WindowSet;
use crate::AutoencoderNet;
use ndarray::{s, Array2};
use pmt_core::{AutoencoderConfig, ModelArch, PmtError, PmtResult};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize, Deserialize)]
enum NetKind {
    Dense(DenseAutoencoder),
    Conv(ConvAutoencoder),
}

impl NetKind {
    fn as_net(&mut self) -> &mut dyn AutoencoderNet {
        match self {
            NetKind::Dense(net) => net,
            NetKind::Conv(net) => net,
        }
    }

    fn arch(&self) -> ModelArch {
        match self {
            NetKind::Dense(_) => ModelArch::Dense,
            NetKind::Conv(_) => ModelArch::Conv,
        }
    }
}

/// A trained auto-encoder bundled with the scaler and window geometry it
/// was fit with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedDetector {
    pub scaler: StandardScaler,
    pub window_size: usize,
    pub n_features: usize,
    pub latent_dim: usize,
    net: NetKind,
}

impl TrainedDetector {
    pub fn arch(&self) -> ModelArch {
        self.net.arch()
    }

    /// Per-window statistics on already-windowed data: Q is the mean squared
    /// reconstruction error, T² the mean squared latent coordinate.
    pub fn score(&mut self, windows: &Array2<f64>) -> (Vec<f64>, Vec<f64>) {
        let n = windows.nrows();
        let mut q = Vec::with_capacity(n);
        let mut t2 = Vec::with_capacity(n);

        // Bounded batches keep the activation caches small.
        let chunk = 256;
        let net = self.net.as_net();
        for start in (0..n).step_by(chunk) {
            let end = (start + chunk).min(n);
            let batch = windows.slice(s![start..end, ..]).to_owned();
            let (reconstruction, latent) = net.forward(&batch);
            for row in 0..(end - start) {
                let window = batch.row(row);
                let recon = reconstruction.row(row);
                let error = window
                    .iter()
                    .zip(recon.iter())
                    .map(|(x, y)| (x - y) * (x - y))
                    .sum::<f64>()
                    / window.len() as f64;
                q.push(error);

                let coords = latent.row(row);
                let distance =
                    coords.iter().map(|z| z * z).sum::<f64>() / coords.len() as f64;
                t2.push(distance);
            }
        }
        (q, t2)
    }

    /// Persist the model (weights + scaler + geometry) as JSON.
    pub fn save(&self, path: &Path) -> PmtResult<()> {
        let json = serde_json::to_string(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: &Path) -> PmtResult<Self> {
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }
}

/// Train an auto-encoder on a (samples × features) sensor series.
///
/// Windows are cut with stride one and split 80/20 (by window order, per
/// `validation_split`) into train and validation; per-epoch losses go to the
/// log. Returns the detector ready for [`crate::detect_anomalies`].
pub fn train_autoencoder(
    series: &Array2<f64>,
    config: &AutoencoderConfig,
    seed: u64,
) -> PmtResult<TrainedDetector> {
    let n_samples = series.nrows();
    if n_samples < config.window_size + 1 {
        return Err(PmtError::InvalidInput(format!(
            "series of {n_samples} samples is too short for windows of {}",
            config.window_size
        )));
    }

    // Fit the scaler on the training portion only; the validation tail must
    // not leak into the statistics.
    let fit_rows = ((n_samples as f64) * (1.0 - config.validation_split)).ceil() as usize;
    let fit_rows = fit_rows.clamp(config.window_size, n_samples);
    let scaler = StandardScaler::fit(&series.slice(s![..fit_rows, ..]).to_owned())?;
    let scaled = scaler.transform(series)?;

    let windows = WindowSet::from_series(&scaled, config.window_size)?;
    let flat_len = windows.flat_len();
    if config.model_arch == ModelArch::Conv && flat_len % 4 != 0 {
        return Err(PmtError::Config(format!(
            "conv architecture needs a window length divisible by 4, got {flat_len}"
        )));
    }

    let (train, validation) = windows.split(config.validation_split);
    if train.nrows() == 0 {
        return Err(PmtError::InvalidInput(
            "validation split left no training windows".into(),
        ));
    }

    info!(
        arch = %config.model_arch,
        windows = windows.len(),
        train = train.nrows(),
        validation = validation.nrows(),
        input_dim = flat_len,
        "training auto-encoder"
    );

    let mut rng = StdRng::seed_from_u64(seed);
    let mut net = match config.model_arch {
        ModelArch::Dense => NetKind::Dense(DenseAutoencoder::new(flat_len, config.latent_dim, &mut rng)),
        ModelArch::Conv => NetKind::Conv(ConvAutoencoder::new(flat_len, config.latent_dim, &mut rng)),
    };

    for epoch in 0..config.num_epochs {
        let train_loss = run_epoch(net.as_net(), &train, config, true);
        let val_loss = if validation.nrows() > 0 {
            Some(run_epoch(net.as_net(), &validation, config, false))
        } else {
            None
        };

        debug!(epoch = epoch + 1, train_loss, val_loss, "epoch finished");
        if (epoch + 1) % 10 == 0 {
            info!(
                epoch = epoch + 1,
                epochs = config.num_epochs,
                train_loss,
                "auto-encoder training progress"
            );
        }
    }

    Ok(TrainedDetector {
        scaler,
        window_size: config.window_size,
        n_features: windows.n_features(),
        latent_dim: config.latent_dim,
        net,
    })
}

/// One pass over `data` in order; updates weights only when `learn` is set.
/// Returns the mean per-window MSE.
fn run_epoch(
    net: &mut dyn AutoencoderNet,
    data: &Array2<f64>,
    config: &AutoencoderConfig,
    learn: bool,
) -> f64 {
    let n = data.nrows();
    let mut total_loss = 0.0;
    let mut batches = 0usize;

    for start in (0..n).step_by(config.batch_size) {
        let end = (start + config.batch_size).min(n);
        let batch = data.slice(s![start..end, ..]).to_owned();
        let (reconstruction, _) = net.forward(&batch);

        let diff = &reconstruction - &batch;
        let loss = diff.mapv(|v| v * v).mean().unwrap_or(0.0);
        total_loss += loss;
        batches += 1;

        if learn {
            let grad = diff * (2.0 / batch.len() as f64);
            net.backward(&grad);
            net.step(config.learning_rate);
        }
    }

    total_loss / batches.max(1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use pmt_core::AutoencoderConfig;

    fn smooth_series(n: usize) -> Array2<f64> {
        Array2::from_shape_fn((n, 1), |(i, _)| (i as f64 * 0.3).sin())
    }

    fn small_config(arch: ModelArch) -> AutoencoderConfig {
        let mut config = AutoencoderConfig::default();
        config.model_arch = arch;
        config.window_size = 8;
        config.latent_dim = 3;
        config.num_epochs = 5;
        config.batch_size = 16;
        config
    }

    #[test]
    fn dense_training_produces_a_scorer() {
        let series = smooth_series(200);
        let mut detector =
            train_autoencoder(&series, &small_config(ModelArch::Dense), 11).unwrap();
        assert_eq!(detector.arch(), ModelArch::Dense);
        assert_eq!(detector.n_features, 1);

        let scaled = detector.scaler.transform(&series).unwrap();
        let windows = WindowSet::from_series(&scaled, 8).unwrap();
        let (q, t2) = detector.score(windows.windows());
        assert_eq!(q.len(), windows.len());
        assert_eq!(t2.len(), windows.len());
        assert!(q.iter().all(|v| v.is_finite() && *v >= 0.0));
        assert!(t2.iter().all(|v| v.is_finite() && *v >= 0.0));
    }

    #[test]
    fn conv_training_produces_a_scorer() {
        let series = smooth_series(120);
        let mut detector = train_autoencoder(&series, &small_config(ModelArch::Conv), 11).unwrap();
        assert_eq!(detector.arch(), ModelArch::Conv);

        let scaled = detector.scaler.transform(&series).unwrap();
        let windows = WindowSet::from_series(&scaled, 8).unwrap();
        let (q, _) = detector.score(windows.windows());
        assert_eq!(q.len(), windows.len());
    }

    #[test]
    fn training_is_reproducible_per_seed() {
        let series = smooth_series(150);
        let config = small_config(ModelArch::Dense);
        let mut first = train_autoencoder(&series, &config, 21).unwrap();
        let mut second = train_autoencoder(&series, &config, 21).unwrap();

        let scaled = first.scaler.transform(&series).unwrap();
        let windows = WindowSet::from_series(&scaled, 8).unwrap();
        let (q1, _) = first.score(windows.windows());
        let (q2, _) = second.score(windows.windows());
        assert_eq!(q1, q2);
    }

    #[test]
    fn too_short_series_is_rejected() {
        let series = smooth_series(5);
        assert!(train_autoencoder(&series, &small_config(ModelArch::Dense), 0).is_err());
    }

    #[test]
    fn model_round_trips_through_disk() {
        let series = smooth_series(100);
        let mut detector =
            train_autoencoder(&series, &small_config(ModelArch::Dense), 4).unwrap();

        let file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        detector.save(file.path()).unwrap();
        let mut restored = TrainedDetector::load(file.path()).unwrap();

        let scaled = detector.scaler.transform(&series).unwrap();
        let windows = WindowSet::from_series(&scaled, 8).unwrap();
        let (q_before, _) = detector.score(windows.windows());
        let (q_after, _) = restored.score(windows.windows());
        assert_eq!(q_before, q_after);
    }
}
