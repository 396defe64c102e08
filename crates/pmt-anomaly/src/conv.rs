//! 1-D convolutional auto-encoder.
//!
//! The flattened window is treated as a single-channel sequence. The encoder
//! chains Conv1d·ReLU·MaxPool(2) twice and a final Conv1d·ReLU, going
//! 1 → 16 → 8 → 4 channels, then projects linearly into the latent space.
//! The decoder mirrors it: a linear lift, two stride-2 transposed
//! convolutions restoring the length, and a kernel-3 transposed convolution
//! back to one channel. The third encoder stage has no pool so the two ×2
//! upsamples land exactly on the input length; the window length must be
//! divisible by 4.

use crate::layers::{adam_step_1d, adam_step_3d, Linear};
use crate::AutoencoderNet;
use ndarray::{s, Array1, Array2, Array3};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

/// 1-D convolution, unit stride, symmetric zero padding.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Conv1d {
    /// (out_channels × in_channels × kernel)
    weights: Array3<f64>,
    bias: Array1<f64>,
    padding: usize,
    #[serde(skip)]
    cached_padded: Vec<Array2<f64>>,
    #[serde(skip)]
    grad_weights: Option<Array3<f64>>,
    #[serde(skip)]
    grad_bias: Option<Array1<f64>>,
    #[serde(skip)]
    adam: Option<(Array3<f64>, Array3<f64>, Array1<f64>, Array1<f64>)>,
}

impl Conv1d {
    fn new(in_channels: usize, out_channels: usize, kernel: usize, padding: usize, rng: &mut StdRng) -> Self {
        let scale = 1.0 / ((in_channels * kernel) as f64).sqrt();
        Self {
            weights: Array3::random_using(
                (out_channels, in_channels, kernel),
                Uniform::new(-scale, scale),
                rng,
            ),
            bias: Array1::zeros(out_channels),
            padding,
            cached_padded: Vec::new(),
            grad_weights: None,
            grad_bias: None,
            adam: None,
        }
    }

    fn begin_batch(&mut self) {
        self.cached_padded.clear();
        self.grad_weights = Some(Array3::zeros(self.weights.raw_dim()));
        self.grad_bias = Some(Array1::zeros(self.bias.raw_dim()));
    }

    fn forward_sample(&mut self, input: &Array2<f64>) -> Array2<f64> {
        let (in_channels, length) = input.dim();
        let (out_channels, _, kernel) = self.weights.dim();
        let padded_len = length + 2 * self.padding;
        let out_len = padded_len - kernel + 1;

        let mut padded = Array2::zeros((in_channels, padded_len));
        padded
            .slice_mut(s![.., self.padding..self.padding + length])
            .assign(input);

        let mut output = Array2::zeros((out_channels, out_len));
        for o in 0..out_channels {
            for i in 0..out_len {
                let mut acc = self.bias[o];
                for c in 0..in_channels {
                    for k in 0..kernel {
                        acc += self.weights[[o, c, k]] * padded[[c, i + k]];
                    }
                }
                output[[o, i]] = acc;
            }
        }

        self.cached_padded.push(padded);
        output
    }

    fn backward_sample(&mut self, sample: usize, grad_output: &Array2<f64>) -> Array2<f64> {
        let padded = &self.cached_padded[sample];
        let (in_channels, padded_len) = padded.dim();
        let (out_channels, _, kernel) = self.weights.dim();
        let out_len = grad_output.ncols();
        let length = padded_len - 2 * self.padding;

        let grad_weights = self.grad_weights.as_mut().expect("begin_batch not called");
        let grad_bias = self.grad_bias.as_mut().expect("begin_batch not called");
        let mut grad_padded = Array2::zeros((in_channels, padded_len));

        for o in 0..out_channels {
            for i in 0..out_len {
                let g = grad_output[[o, i]];
                if g == 0.0 {
                    continue;
                }
                grad_bias[o] += g;
                for c in 0..in_channels {
                    for k in 0..kernel {
                        grad_weights[[o, c, k]] += g * padded[[c, i + k]];
                        grad_padded[[c, i + k]] += g * self.weights[[o, c, k]];
                    }
                }
            }
        }

        grad_padded
            .slice(s![.., self.padding..self.padding + length])
            .to_owned()
    }

    fn step(&mut self, learning_rate: f64, step: usize) {
        let (Some(grad_weights), Some(grad_bias)) = (&self.grad_weights, &self.grad_bias) else {
            return;
        };
        let (m_w, v_w, m_b, v_b) = self.adam.get_or_insert_with(|| {
            (
                Array3::zeros(self.weights.raw_dim()),
                Array3::zeros(self.weights.raw_dim()),
                Array1::zeros(self.bias.raw_dim()),
                Array1::zeros(self.bias.raw_dim()),
            )
        });
        adam_step_3d(&mut self.weights, grad_weights, m_w, v_w, learning_rate, step);
        adam_step_1d(&mut self.bias, grad_bias, m_b, v_b, learning_rate, step);
    }
}

/// Window-2 stride-2 max pooling with argmax routing for backprop.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct MaxPool1d {
    #[serde(skip)]
    cached_argmax: Vec<Array2<usize>>,
    #[serde(skip)]
    cached_in_len: usize,
}

impl MaxPool1d {
    fn begin_batch(&mut self) {
        self.cached_argmax.clear();
    }

    fn forward_sample(&mut self, input: &Array2<f64>) -> Array2<f64> {
        let (channels, length) = input.dim();
        let out_len = length / 2;
        self.cached_in_len = length;

        let mut output = Array2::zeros((channels, out_len));
        let mut argmax = Array2::zeros((channels, out_len));
        for c in 0..channels {
            for i in 0..out_len {
                let (left, right) = (input[[c, 2 * i]], input[[c, 2 * i + 1]]);
                if left >= right {
                    output[[c, i]] = left;
                    argmax[[c, i]] = 2 * i;
                } else {
                    output[[c, i]] = right;
                    argmax[[c, i]] = 2 * i + 1;
                }
            }
        }

        self.cached_argmax.push(argmax);
        output
    }

    fn backward_sample(&self, sample: usize, grad_output: &Array2<f64>) -> Array2<f64> {
        let argmax = &self.cached_argmax[sample];
        let (channels, out_len) = grad_output.dim();
        let mut grad_input = Array2::zeros((channels, self.cached_in_len));
        for c in 0..channels {
            for i in 0..out_len {
                grad_input[[c, argmax[[c, i]]]] += grad_output[[c, i]];
            }
        }
        grad_input
    }
}

/// 1-D transposed convolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConvTranspose1d {
    /// (in_channels × out_channels × kernel)
    weights: Array3<f64>,
    bias: Array1<f64>,
    stride: usize,
    padding: usize,
    #[serde(skip)]
    cached_input: Vec<Array2<f64>>,
    #[serde(skip)]
    grad_weights: Option<Array3<f64>>,
    #[serde(skip)]
    grad_bias: Option<Array1<f64>>,
    #[serde(skip)]
    adam: Option<(Array3<f64>, Array3<f64>, Array1<f64>, Array1<f64>)>,
}

impl ConvTranspose1d {
    fn new(
        in_channels: usize,
        out_channels: usize,
        kernel: usize,
        stride: usize,
        padding: usize,
        rng: &mut StdRng,
    ) -> Self {
        let scale = 1.0 / ((in_channels * kernel) as f64).sqrt();
        Self {
            weights: Array3::random_using(
                (in_channels, out_channels, kernel),
                Uniform::new(-scale, scale),
                rng,
            ),
            bias: Array1::zeros(out_channels),
            stride,
            padding,
            cached_input: Vec::new(),
            grad_weights: None,
            grad_bias: None,
            adam: None,
        }
    }

    fn out_len(&self, in_len: usize) -> usize {
        let kernel = self.weights.dim().2;
        (in_len - 1) * self.stride + kernel - 2 * self.padding
    }

    fn begin_batch(&mut self) {
        self.cached_input.clear();
        self.grad_weights = Some(Array3::zeros(self.weights.raw_dim()));
        self.grad_bias = Some(Array1::zeros(self.bias.raw_dim()));
    }

    fn forward_sample(&mut self, input: &Array2<f64>) -> Array2<f64> {
        let (in_channels, in_len) = input.dim();
        let (_, out_channels, kernel) = self.weights.dim();
        let full_len = (in_len - 1) * self.stride + kernel;
        let out_len = self.out_len(in_len);

        let mut full = Array2::zeros((out_channels, full_len));
        for c in 0..in_channels {
            for i in 0..in_len {
                let x = input[[c, i]];
                if x == 0.0 {
                    continue;
                }
                for o in 0..out_channels {
                    for k in 0..kernel {
                        full[[o, i * self.stride + k]] += self.weights[[c, o, k]] * x;
                    }
                }
            }
        }

        let mut output = full
            .slice(s![.., self.padding..self.padding + out_len])
            .to_owned();
        for o in 0..out_channels {
            for i in 0..out_len {
                output[[o, i]] += self.bias[o];
            }
        }

        self.cached_input.push(input.clone());
        output
    }

    fn backward_sample(&mut self, sample: usize, grad_output: &Array2<f64>) -> Array2<f64> {
        let input = &self.cached_input[sample];
        let (in_channels, in_len) = input.dim();
        let (_, out_channels, kernel) = self.weights.dim();
        let full_len = (in_len - 1) * self.stride + kernel;
        let out_len = grad_output.ncols();

        // Re-embed the cropped gradient into full (pre-padding) coordinates.
        let mut grad_full = Array2::zeros((out_channels, full_len));
        grad_full
            .slice_mut(s![.., self.padding..self.padding + out_len])
            .assign(grad_output);

        let grad_weights = self.grad_weights.as_mut().expect("begin_batch not called");
        let grad_bias = self.grad_bias.as_mut().expect("begin_batch not called");
        for o in 0..out_channels {
            for i in 0..out_len {
                grad_bias[o] += grad_output[[o, i]];
            }
        }

        let mut grad_input = Array2::zeros((in_channels, in_len));
        for c in 0..in_channels {
            for i in 0..in_len {
                let x = input[[c, i]];
                let mut acc = 0.0;
                for o in 0..out_channels {
                    for k in 0..kernel {
                        let g = grad_full[[o, i * self.stride + k]];
                        grad_weights[[c, o, k]] += g * x;
                        acc += g * self.weights[[c, o, k]];
                    }
                }
                grad_input[[c, i]] = acc;
            }
        }
        grad_input
    }

    fn step(&mut self, learning_rate: f64, step: usize) {
        let (Some(grad_weights), Some(grad_bias)) = (&self.grad_weights, &self.grad_bias) else {
            return;
        };
        let (m_w, v_w, m_b, v_b) = self.adam.get_or_insert_with(|| {
            (
                Array3::zeros(self.weights.raw_dim()),
                Array3::zeros(self.weights.raw_dim()),
                Array1::zeros(self.bias.raw_dim()),
                Array1::zeros(self.bias.raw_dim()),
            )
        });
        adam_step_3d(&mut self.weights, grad_weights, m_w, v_w, learning_rate, step);
        adam_step_1d(&mut self.bias, grad_bias, m_b, v_b, learning_rate, step);
    }
}

/// Per-sample ReLU mask storage for the convolutional stages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ReluStage {
    #[serde(skip)]
    masks: Vec<Array2<f64>>,
}

impl ReluStage {
    fn begin_batch(&mut self) {
        self.masks.clear();
    }

    fn forward_sample(&mut self, input: &Array2<f64>) -> Array2<f64> {
        let mask = input.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 });
        let out = input.mapv(|v| v.max(0.0));
        self.masks.push(mask);
        out
    }

    fn backward_sample(&self, sample: usize, grad: &Array2<f64>) -> Array2<f64> {
        grad * &self.masks[sample]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvAutoencoder {
    input_dim: usize,
    latent_dim: usize,
    conv1: Conv1d,
    relu1: ReluStage,
    pool1: MaxPool1d,
    conv2: Conv1d,
    relu2: ReluStage,
    pool2: MaxPool1d,
    conv3: Conv1d,
    relu3: ReluStage,
    fc_encode: Linear,
    fc_decode: Linear,
    deconv1: ConvTranspose1d,
    relu_d1: ReluStage,
    deconv2: ConvTranspose1d,
    relu_d2: ReluStage,
    deconv3: ConvTranspose1d,
    #[serde(skip)]
    step_count: usize,
}

impl ConvAutoencoder {
    /// `input_dim` must be divisible by 4 so the two pools and the two
    /// stride-2 upsamples cancel exactly.
    pub fn new(input_dim: usize, latent_dim: usize, rng: &mut StdRng) -> Self {
        debug_assert!(input_dim % 4 == 0, "conv window length must be divisible by 4");
        // After two pools the 4-channel feature map flattens back to input_dim.
        let conv_flat = (input_dim / 4) * 4;
        Self {
            input_dim,
            latent_dim,
            conv1: Conv1d::new(1, 16, 3, 1, rng),
            relu1: ReluStage::default(),
            pool1: MaxPool1d::default(),
            conv2: Conv1d::new(16, 8, 3, 1, rng),
            relu2: ReluStage::default(),
            pool2: MaxPool1d::default(),
            conv3: Conv1d::new(8, 4, 3, 1, rng),
            relu3: ReluStage::default(),
            fc_encode: Linear::new(conv_flat, latent_dim, rng),
            fc_decode: Linear::new(latent_dim, conv_flat, rng),
            deconv1: ConvTranspose1d::new(4, 8, 2, 2, 0, rng),
            relu_d1: ReluStage::default(),
            deconv2: ConvTranspose1d::new(8, 16, 2, 2, 0, rng),
            relu_d2: ReluStage::default(),
            deconv3: ConvTranspose1d::new(16, 1, 3, 1, 1, rng),
            step_count: 0,
        }
    }

    fn begin_batch(&mut self) {
        self.conv1.begin_batch();
        self.relu1.begin_batch();
        self.pool1.begin_batch();
        self.conv2.begin_batch();
        self.relu2.begin_batch();
        self.pool2.begin_batch();
        self.conv3.begin_batch();
        self.relu3.begin_batch();
        self.deconv1.begin_batch();
        self.relu_d1.begin_batch();
        self.deconv2.begin_batch();
        self.relu_d2.begin_batch();
        self.deconv3.begin_batch();
    }
}

impl AutoencoderNet for ConvAutoencoder {
    fn input_dim(&self) -> usize {
        self.input_dim
    }

    fn latent_dim(&self) -> usize {
        self.latent_dim
    }

    fn forward(&mut self, batch: &Array2<f64>) -> (Array2<f64>, Array2<f64>) {
        self.begin_batch();
        let n = batch.nrows();
        let quarter = self.input_dim / 4;

        // Convolutional encoder per sample, then one batched projection.
        let mut encoded_flat = Array2::zeros((n, quarter * 4));
        for (row, window) in batch.rows().into_iter().enumerate() {
            let x = window.to_owned().insert_axis(ndarray::Axis(0));
            let h = self.conv1.forward_sample(&x);
            let h = self.relu1.forward_sample(&h);
            let h = self.pool1.forward_sample(&h);
            let h = self.conv2.forward_sample(&h);
            let h = self.relu2.forward_sample(&h);
            let h = self.pool2.forward_sample(&h);
            let h = self.conv3.forward_sample(&h);
            let h = self.relu3.forward_sample(&h);
            for (flat_index, value) in h.iter().enumerate() {
                encoded_flat[[row, flat_index]] = *value;
            }
        }

        let latent = self.fc_encode.forward(&encoded_flat);
        let decoded_flat = self.fc_decode.forward(&latent);

        let mut reconstruction = Array2::zeros((n, self.input_dim));
        for row in 0..n {
            let h = decoded_flat
                .row(row)
                .to_owned()
                .into_shape((4, quarter))
                .expect("decoder lift has 4·(input_dim/4) elements");
            let h = self.deconv1.forward_sample(&h);
            let h = self.relu_d1.forward_sample(&h);
            let h = self.deconv2.forward_sample(&h);
            let h = self.relu_d2.forward_sample(&h);
            let h = self.deconv3.forward_sample(&h);
            for (flat_index, value) in h.iter().enumerate() {
                reconstruction[[row, flat_index]] = *value;
            }
        }

        (reconstruction, latent)
    }

    fn backward(&mut self, grad_reconstruction: &Array2<f64>) {
        let n = grad_reconstruction.nrows();
        let quarter = self.input_dim / 4;

        let mut grad_decoded_flat = Array2::zeros((n, quarter * 4));
        for row in 0..n {
            let g = grad_reconstruction
                .row(row)
                .to_owned()
                .insert_axis(ndarray::Axis(0));
            let g = self.deconv3.backward_sample(row, &g);
            let g = self.relu_d2.backward_sample(row, &g);
            let g = self.deconv2.backward_sample(row, &g);
            let g = self.relu_d1.backward_sample(row, &g);
            let g = self.deconv1.backward_sample(row, &g);
            for (flat_index, value) in g.iter().enumerate() {
                grad_decoded_flat[[row, flat_index]] = *value;
            }
        }

        let grad_latent = self.fc_decode.backward(&grad_decoded_flat);
        let grad_encoded_flat = self.fc_encode.backward(&grad_latent);

        for row in 0..n {
            let g = grad_encoded_flat
                .row(row)
                .to_owned()
                .into_shape((4, quarter))
                .expect("encoder flat map has 4·(input_dim/4) elements");
            let g = self.relu3.backward_sample(row, &g);
            let g = self.conv3.backward_sample(row, &g);
            let g = self.pool2.backward_sample(row, &g);
            let g = self.relu2.backward_sample(row, &g);
            let g = self.conv2.backward_sample(row, &g);
            let g = self.pool1.backward_sample(row, &g);
            let g = self.relu1.backward_sample(row, &g);
            let _ = self.conv1.backward_sample(row, &g);
        }
    }

    fn step(&mut self, learning_rate: f64) {
        self.step_count += 1;
        self.conv1.step(learning_rate, self.step_count);
        self.conv2.step(learning_rate, self.step_count);
        self.conv3.step(learning_rate, self.step_count);
        self.fc_encode.step(learning_rate, self.step_count);
        self.fc_decode.step(learning_rate, self.step_count);
        self.deconv1.step(learning_rate, self.step_count);
        self.deconv2.step(learning_rate, self.step_count);
        self.deconv3.step(learning_rate, self.step_count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn shapes_line_up_through_both_paths() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut net = ConvAutoencoder::new(16, 3, &mut rng);
        let batch = Array2::from_shape_fn((5, 16), |(i, j)| ((i + j) % 3) as f64);
        let (reconstruction, latent) = net.forward(&batch);
        assert_eq!(reconstruction.dim(), (5, 16));
        assert_eq!(latent.dim(), (5, 3));
    }

    #[test]
    fn pool_and_upsample_cancel_exactly() {
        // One pass through the geometry; any off-by-one in the transposed
        // convolutions would panic on shape mismatch.
        let mut rng = StdRng::seed_from_u64(1);
        for input_dim in [8, 24, 168] {
            let mut net = ConvAutoencoder::new(input_dim, 5, &mut rng);
            let batch = Array2::ones((2, input_dim));
            let (reconstruction, _) = net.forward(&batch);
            assert_eq!(reconstruction.ncols(), input_dim);
        }
    }

    #[test]
    fn training_reduces_reconstruction_loss() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut net = ConvAutoencoder::new(12, 4, &mut rng);
        let batch = Array2::from_shape_fn((8, 12), |(i, j)| ((i * 3 + j) % 5) as f64 / 5.0);

        let mse = |recon: &Array2<f64>, target: &Array2<f64>| {
            let diff = recon - target;
            diff.mapv(|v| v * v).mean().unwrap()
        };

        let (initial_recon, _) = net.forward(&batch);
        let initial = mse(&initial_recon, &batch);

        let scale = 2.0 / (batch.len() as f64);
        for _ in 0..200 {
            let (recon, _) = net.forward(&batch);
            let grad = (&recon - &batch) * scale;
            net.backward(&grad);
            net.step(1e-2);
        }

        let (final_recon, _) = net.forward(&batch);
        let final_loss = mse(&final_recon, &batch);
        assert!(
            final_loss < initial,
            "loss {final_loss} did not improve on {initial}"
        );
    }

    #[test]
    fn serde_preserves_forward_behavior() {
        let mut rng = StdRng::seed_from_u64(6);
        let mut net = ConvAutoencoder::new(8, 2, &mut rng);
        let batch = Array2::from_shape_fn((2, 8), |(i, j)| (i + j) as f64 / 8.0);
        let (before, _) = net.forward(&batch);

        let json = serde_json::to_string(&net).unwrap();
        let mut restored: ConvAutoencoder = serde_json::from_str(&json).unwrap();
        let (after, _) = restored.forward(&batch);
        assert_eq!(before, after);
    }
}
