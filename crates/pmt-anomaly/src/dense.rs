//! Dense (fully-connected) auto-encoder.
//!
//! Encoder funnels the flattened window through 32 → 16 → 8 hidden units
//! into the latent space; the decoder mirrors it back. ReLU between hidden
//! layers, linear heads on both ends.

use crate::layers::{relu_backward, relu_forward, Linear};
use crate::AutoencoderNet;
use ndarray::Array2;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

const HIDDEN: [usize; 3] = [32, 16, 8];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseAutoencoder {
    encoder: Vec<Linear>,
    decoder: Vec<Linear>,
    #[serde(skip)]
    encoder_masks: Vec<Array2<f64>>,
    #[serde(skip)]
    decoder_masks: Vec<Array2<f64>>,
    #[serde(skip)]
    step_count: usize,
}

impl DenseAutoencoder {
    pub fn new(input_dim: usize, latent_dim: usize, rng: &mut StdRng) -> Self {
        let mut encoder = Vec::with_capacity(HIDDEN.len() + 1);
        let mut previous = input_dim;
        for hidden in HIDDEN {
            encoder.push(Linear::new(previous, hidden, rng));
            previous = hidden;
        }
        encoder.push(Linear::new(previous, latent_dim, rng));

        let mut decoder = Vec::with_capacity(HIDDEN.len() + 1);
        let mut previous = latent_dim;
        for hidden in HIDDEN.iter().rev() {
            decoder.push(Linear::new(previous, *hidden, rng));
            previous = *hidden;
        }
        decoder.push(Linear::new(previous, input_dim, rng));

        Self {
            encoder,
            decoder,
            encoder_masks: Vec::new(),
            decoder_masks: Vec::new(),
            step_count: 0,
        }
    }
}

impl AutoencoderNet for DenseAutoencoder {
    fn input_dim(&self) -> usize {
        self.encoder[0].in_dim()
    }

    fn latent_dim(&self) -> usize {
        self.encoder[self.encoder.len() - 1].out_dim()
    }

    fn forward(&mut self, batch: &Array2<f64>) -> (Array2<f64>, Array2<f64>) {
        self.encoder_masks.clear();
        self.decoder_masks.clear();

        let mut hidden = batch.clone();
        let last = self.encoder.len() - 1;
        for (i, layer) in self.encoder.iter_mut().enumerate() {
            hidden = layer.forward(&hidden);
            if i < last {
                let (activated, mask) = relu_forward(&hidden);
                hidden = activated;
                self.encoder_masks.push(mask);
            }
        }
        let latent = hidden.clone();

        let last = self.decoder.len() - 1;
        for (i, layer) in self.decoder.iter_mut().enumerate() {
            hidden = layer.forward(&hidden);
            if i < last {
                let (activated, mask) = relu_forward(&hidden);
                hidden = activated;
                self.decoder_masks.push(mask);
            }
        }

        (hidden, latent)
    }

    fn backward(&mut self, grad_reconstruction: &Array2<f64>) {
        let mut grad = grad_reconstruction.clone();
        for i in (0..self.decoder.len()).rev() {
            grad = self.decoder[i].backward(&grad);
            if i > 0 {
                grad = relu_backward(&grad, &self.decoder_masks[i - 1]);
            }
        }
        for i in (0..self.encoder.len()).rev() {
            grad = self.encoder[i].backward(&grad);
            if i > 0 {
                grad = relu_backward(&grad, &self.encoder_masks[i - 1]);
            }
        }
    }

    fn step(&mut self, learning_rate: f64) {
        self.step_count += 1;
        for layer in self.encoder.iter_mut().chain(self.decoder.iter_mut()) {
            layer.step(learning_rate, self.step_count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn shapes_line_up() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut net = DenseAutoencoder::new(24, 5, &mut rng);
        let batch = Array2::ones((7, 24));
        let (reconstruction, latent) = net.forward(&batch);
        assert_eq!(reconstruction.dim(), (7, 24));
        assert_eq!(latent.dim(), (7, 5));
        assert_eq!(net.input_dim(), 24);
        assert_eq!(net.latent_dim(), 5);
    }

    #[test]
    fn training_reduces_reconstruction_loss() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut net = DenseAutoencoder::new(8, 3, &mut rng);
        // A fixed low-rank batch the net should memorize quickly.
        let batch = Array2::from_shape_fn((16, 8), |(i, j)| ((i + j) % 4) as f64 / 4.0);

        let mse = |recon: &Array2<f64>, target: &Array2<f64>| {
            let diff = recon - target;
            diff.mapv(|v| v * v).mean().unwrap()
        };

        let (initial_recon, _) = net.forward(&batch);
        let initial = mse(&initial_recon, &batch);

        let scale = 2.0 / (batch.len() as f64);
        for _ in 0..300 {
            let (recon, _) = net.forward(&batch);
            let grad = (&recon - &batch) * scale;
            net.backward(&grad);
            net.step(1e-2);
        }

        let (final_recon, _) = net.forward(&batch);
        let final_loss = mse(&final_recon, &batch);
        assert!(
            final_loss < initial * 0.5,
            "loss {final_loss} did not improve on {initial}"
        );
    }

    #[test]
    fn serde_preserves_forward_behavior() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut net = DenseAutoencoder::new(12, 4, &mut rng);
        let batch = Array2::from_shape_fn((3, 12), |(i, j)| (i * 12 + j) as f64 / 36.0);
        let (before, _) = net.forward(&batch);

        let json = serde_json::to_string(&net).unwrap();
        let mut restored: DenseAutoencoder = serde_json::from_str(&json).unwrap();
        let (after, _) = restored.forward(&batch);
        assert_eq!(before, after);
    }
}
