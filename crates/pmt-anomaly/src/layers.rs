//! Shared building blocks: fully-connected layers, ReLU, and Adam updates.
//!
//! Parameters are serialized with the model; gradient caches and optimizer
//! moments are transient and rebuilt on first use after a reload.

use ndarray::{Array1, Array2, Axis, Zip};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

pub(crate) const ADAM_BETA1: f64 = 0.9;
pub(crate) const ADAM_BETA2: f64 = 0.999;
pub(crate) const ADAM_EPS: f64 = 1e-8;

/// Adam first/second moments for one weight matrix and its bias.
#[derive(Debug, Clone, Default)]
pub(crate) struct AdamMoments {
    m_weights: Option<Array2<f64>>,
    v_weights: Option<Array2<f64>>,
    m_bias: Option<Array1<f64>>,
    v_bias: Option<Array1<f64>>,
}

pub(crate) fn adam_step_2d(
    param: &mut Array2<f64>,
    grad: &Array2<f64>,
    m: &mut Array2<f64>,
    v: &mut Array2<f64>,
    learning_rate: f64,
    step: usize,
) {
    let correction1 = 1.0 - ADAM_BETA1.powi(step as i32);
    let correction2 = 1.0 - ADAM_BETA2.powi(step as i32);
    Zip::from(param)
        .and(grad)
        .and(m)
        .and(v)
        .for_each(|p, &g, m, v| {
            *m = ADAM_BETA1 * *m + (1.0 - ADAM_BETA1) * g;
            *v = ADAM_BETA2 * *v + (1.0 - ADAM_BETA2) * g * g;
            let m_hat = *m / correction1;
            let v_hat = *v / correction2;
            *p -= learning_rate * m_hat / (v_hat.sqrt() + ADAM_EPS);
        });
}

pub(crate) fn adam_step_3d(
    param: &mut ndarray::Array3<f64>,
    grad: &ndarray::Array3<f64>,
    m: &mut ndarray::Array3<f64>,
    v: &mut ndarray::Array3<f64>,
    learning_rate: f64,
    step: usize,
) {
    let correction1 = 1.0 - ADAM_BETA1.powi(step as i32);
    let correction2 = 1.0 - ADAM_BETA2.powi(step as i32);
    Zip::from(param)
        .and(grad)
        .and(m)
        .and(v)
        .for_each(|p, &g, m, v| {
            *m = ADAM_BETA1 * *m + (1.0 - ADAM_BETA1) * g;
            *v = ADAM_BETA2 * *v + (1.0 - ADAM_BETA2) * g * g;
            let m_hat = *m / correction1;
            let v_hat = *v / correction2;
            *p -= learning_rate * m_hat / (v_hat.sqrt() + ADAM_EPS);
        });
}

pub(crate) fn adam_step_1d(
    param: &mut Array1<f64>,
    grad: &Array1<f64>,
    m: &mut Array1<f64>,
    v: &mut Array1<f64>,
    learning_rate: f64,
    step: usize,
) {
    let correction1 = 1.0 - ADAM_BETA1.powi(step as i32);
    let correction2 = 1.0 - ADAM_BETA2.powi(step as i32);
    Zip::from(param)
        .and(grad)
        .and(m)
        .and(v)
        .for_each(|p, &g, m, v| {
            *m = ADAM_BETA1 * *m + (1.0 - ADAM_BETA1) * g;
            *v = ADAM_BETA2 * *v + (1.0 - ADAM_BETA2) * g * g;
            let m_hat = *m / correction1;
            let v_hat = *v / correction2;
            *p -= learning_rate * m_hat / (v_hat.sqrt() + ADAM_EPS);
        });
}

/// Fully-connected layer storing weights as (out × in).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Linear {
    weights: Array2<f64>,
    bias: Array1<f64>,
    #[serde(skip)]
    cached_input: Option<Array2<f64>>,
    #[serde(skip)]
    grad_weights: Option<Array2<f64>>,
    #[serde(skip)]
    grad_bias: Option<Array1<f64>>,
    #[serde(skip)]
    adam: AdamMoments,
}

impl Linear {
    /// Uniform init scaled by 1/√fan_in, zero bias.
    pub fn new(in_dim: usize, out_dim: usize, rng: &mut StdRng) -> Self {
        let scale = 1.0 / (in_dim as f64).sqrt();
        Self {
            weights: Array2::random_using((out_dim, in_dim), Uniform::new(-scale, scale), rng),
            bias: Array1::zeros(out_dim),
            cached_input: None,
            grad_weights: None,
            grad_bias: None,
            adam: AdamMoments::default(),
        }
    }

    pub fn in_dim(&self) -> usize {
        self.weights.ncols()
    }

    pub fn out_dim(&self) -> usize {
        self.weights.nrows()
    }

    /// Forward over a (batch × in) matrix, caching the input for backprop.
    pub fn forward(&mut self, input: &Array2<f64>) -> Array2<f64> {
        self.cached_input = Some(input.clone());
        input.dot(&self.weights.t()) + &self.bias
    }

    /// Inference-only forward, no caches touched.
    pub fn forward_inference(&self, input: &Array2<f64>) -> Array2<f64> {
        input.dot(&self.weights.t()) + &self.bias
    }

    /// Backward pass: stores parameter gradients, returns the input gradient.
    pub fn backward(&mut self, grad_output: &Array2<f64>) -> Array2<f64> {
        let input = self
            .cached_input
            .as_ref()
            .expect("backward called before forward");
        self.grad_weights = Some(grad_output.t().dot(input));
        self.grad_bias = Some(grad_output.sum_axis(Axis(0)));
        grad_output.dot(&self.weights)
    }

    /// Apply one Adam update from the stored gradients.
    pub fn step(&mut self, learning_rate: f64, step: usize) {
        let (Some(grad_weights), Some(grad_bias)) = (&self.grad_weights, &self.grad_bias) else {
            return;
        };

        let m_w = self
            .adam
            .m_weights
            .get_or_insert_with(|| Array2::zeros(self.weights.raw_dim()));
        let v_w = self
            .adam
            .v_weights
            .get_or_insert_with(|| Array2::zeros(self.weights.raw_dim()));
        adam_step_2d(&mut self.weights, grad_weights, m_w, v_w, learning_rate, step);

        let m_b = self
            .adam
            .m_bias
            .get_or_insert_with(|| Array1::zeros(self.bias.raw_dim()));
        let v_b = self
            .adam
            .v_bias
            .get_or_insert_with(|| Array1::zeros(self.bias.raw_dim()));
        adam_step_1d(&mut self.bias, grad_bias, m_b, v_b, learning_rate, step);
    }
}

/// ReLU forward returning the activation and its 0/1 mask.
pub(crate) fn relu_forward(input: &Array2<f64>) -> (Array2<f64>, Array2<f64>) {
    let mask = input.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 });
    (input.mapv(|v| v.max(0.0)), mask)
}

/// Route gradients through the stored ReLU mask.
pub(crate) fn relu_backward(grad_output: &Array2<f64>, mask: &Array2<f64>) -> Array2<f64> {
    grad_output * mask
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;

    #[test]
    fn linear_forward_shape_and_bias() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut layer = Linear::new(3, 2, &mut rng);
        let x = Array2::zeros((4, 3));
        let y = layer.forward(&x);
        assert_eq!(y.dim(), (4, 2));
        // Zero input hits the (zero) bias exactly.
        assert!(y.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn linear_gradient_matches_finite_difference() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut layer = Linear::new(2, 2, &mut rng);
        let x = array![[0.5, -1.0]];

        // Loss = sum(output); grad_output = ones.
        let loss = |layer: &Linear, x: &Array2<f64>| layer.forward_inference(x).sum();

        let _ = layer.forward(&x);
        let grad_input = layer.backward(&Array2::ones((1, 2)));

        let eps = 1e-6;
        for j in 0..2 {
            let mut bumped = x.clone();
            bumped[[0, j]] += eps;
            let numeric = (loss(&layer, &bumped) - loss(&layer, &x)) / eps;
            assert!(
                (numeric - grad_input[[0, j]]).abs() < 1e-5,
                "input grad {j}: numeric {numeric} vs analytic {}",
                grad_input[[0, j]]
            );
        }
    }

    #[test]
    fn adam_reduces_a_quadratic() {
        // Minimise (w - 3)² elementwise with repeated Adam steps.
        let mut param = array![[0.0]];
        let mut m = Array2::zeros((1, 1));
        let mut v = Array2::zeros((1, 1));
        for step in 1..=2000 {
            let grad = param.mapv(|w| 2.0 * (w - 3.0));
            adam_step_2d(&mut param, &grad, &mut m, &mut v, 0.01, step);
        }
        assert!((param[[0, 0]] - 3.0).abs() < 0.05, "got {}", param[[0, 0]]);
    }

    #[test]
    fn relu_masks_negatives() {
        let x = array![[1.0, -2.0], [0.0, 3.0]];
        let (y, mask) = relu_forward(&x);
        assert_eq!(y, array![[1.0, 0.0], [0.0, 3.0]]);
        let grad = relu_backward(&Array2::ones((2, 2)), &mask);
        assert_eq!(grad, array![[1.0, 0.0], [0.0, 1.0]]);
    }

    #[test]
    fn linear_round_trips_through_serde() {
        let mut rng = StdRng::seed_from_u64(2);
        let layer = Linear::new(4, 3, &mut rng);
        let json = serde_json::to_string(&layer).unwrap();
        let mut back: Linear = serde_json::from_str(&json).unwrap();
        let x = Array2::ones((2, 4));
        assert_eq!(layer.forward_inference(&x), back.forward(&x));
    }
}
