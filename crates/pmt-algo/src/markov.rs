//! Absorbing Markov chain degradation model.
//!
//! A bushing degrades along an ordinal chain: it either stays where it is or
//! moves one stage closer to Failure, which is absorbing. That gives the
//! transition matrix a bi-diagonal shape:
//!
//! ```text
//! ┌                              ┐
//! │ 1-λ₀   λ₀    0     0     0   │
//! │  0    1-λ₁   λ₁    0     0   │
//! │  0     0    1-λ₂   λ₂    0   │
//! │  0     0     0    1-λ₃   λ₃  │
//! │  0     0     0     0     1   │
//! └                              ┘
//! ```
//!
//! n-step state probabilities are computed in closed form (`e_i · Tⁿ` by
//! repeated squaring) so the evolutionary solver sees a noise-free objective;
//! Monte-Carlo trajectories are available for diagnostics.

use pmt_core::{HealthState, LinearSystemBackend, PmtError, PmtResult};
use rand::Rng;
use std::collections::BTreeMap;

/// Tolerance for the row-stochastic / probability-mass invariants.
const PROB_TOLERANCE: f64 = 1e-9;

/// Row-stochastic bi-diagonal transition matrix with an absorbing last state.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionMatrix {
    n_states: usize,
    rows: Vec<Vec<f64>>,
}

impl TransitionMatrix {
    /// Build the matrix from per-stage transition rates λ₀..λ_{N-2}.
    ///
    /// A rate vector of length n yields an (n+1)-state chain. Fails with
    /// `InvalidInput` when a rate is non-finite or outside [0, 1], or when
    /// the vector is empty.
    pub fn from_rates(rates: &[f64]) -> PmtResult<Self> {
        if rates.is_empty() {
            return Err(PmtError::InvalidInput(
                "transition rate vector is empty".into(),
            ));
        }
        for (i, rate) in rates.iter().enumerate() {
            if !rate.is_finite() || !(0.0..=1.0).contains(rate) {
                return Err(PmtError::InvalidInput(format!(
                    "transition rate λ{i} = {rate} outside [0, 1]"
                )));
            }
        }

        let n_states = rates.len() + 1;
        let mut rows = vec![vec![0.0; n_states]; n_states];
        for (i, &rate) in rates.iter().enumerate() {
            rows[i][i] = 1.0 - rate;
            rows[i][i + 1] = rate;
        }
        rows[n_states - 1][n_states - 1] = 1.0;

        Ok(Self { n_states, rows })
    }

    pub fn n_states(&self) -> usize {
        self.n_states
    }

    /// The stage rate λᵢ as stored on the super-diagonal.
    pub fn rate(&self, stage: usize) -> f64 {
        self.rows[stage][stage + 1]
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// Probability of being in each state after `n_cycles` steps from
    /// `initial_state`.
    ///
    /// Computed as `e_i · Tⁿ` with T raised by repeated squaring. The
    /// result is checked against the probability-vector invariant and a
    /// mass leak beyond 1e-9 is reported as `Numeric`.
    pub fn state_probabilities(
        &self,
        n_cycles: u64,
        initial_state: HealthState,
    ) -> PmtResult<Vec<f64>> {
        let initial = initial_state.value();
        if initial >= self.n_states {
            return Err(PmtError::InvalidInput(format!(
                "initial state {} out of range 0..{}",
                initial, self.n_states
            )));
        }

        let power = matrix_power(&self.rows, n_cycles);
        let probabilities = power[initial].clone();

        let sum: f64 = probabilities.iter().sum();
        if !sum.is_finite() || (sum - 1.0).abs() > PROB_TOLERANCE {
            return Err(PmtError::Numeric(format!(
                "probability mass {sum} after {n_cycles} cycles"
            )));
        }
        if probabilities.iter().any(|p| *p < -PROB_TOLERANCE) {
            return Err(PmtError::Numeric(format!(
                "negative state probability after {n_cycles} cycles"
            )));
        }

        Ok(probabilities)
    }

    /// Mean time to failure from `initial_state`, in cycles.
    ///
    /// Solves `(I - Q) x = 1` for the transient sub-matrix Q and reads the
    /// row sum of the fundamental matrix off the solution vector. Starting
    /// from the absorbing state the MTTF is zero by definition. Fails with
    /// `Numeric` when `I - Q` is singular (some stage has rate zero, so
    /// absorption is not certain).
    pub fn mean_time_to_failure(
        &self,
        initial_state: HealthState,
        backend: &dyn LinearSystemBackend,
    ) -> PmtResult<f64> {
        let initial = initial_state.value();
        if initial >= self.n_states {
            return Err(PmtError::InvalidInput(format!(
                "initial state {} out of range 0..{}",
                initial, self.n_states
            )));
        }
        if initial_state.is_absorbing(self.n_states) {
            return Ok(0.0);
        }

        let transient = self.n_states - 1;
        let mut i_minus_q = vec![vec![0.0; transient]; transient];
        for (i, row) in i_minus_q.iter_mut().enumerate() {
            for (j, value) in row.iter_mut().enumerate() {
                let identity = if i == j { 1.0 } else { 0.0 };
                *value = identity - self.rows[i][j];
            }
        }

        let ones = vec![1.0; transient];
        let expected_steps = backend
            .solve(&i_minus_q, &ones)
            .map_err(|e| PmtError::Numeric(format!("fundamental matrix: {e}")))?;

        Ok(expected_steps[initial])
    }

    /// Stationary distribution by power iteration.
    ///
    /// Starts from the uniform vector, iterates `π ← π·T` until the sup-norm
    /// change drops below `tolerance` or `max_iterations` is reached. For an
    /// absorbing chain with positive rates this converges to all mass on
    /// Failure.
    pub fn stationary_distribution(&self, tolerance: f64, max_iterations: usize) -> Vec<f64> {
        let mut state = vec![1.0 / self.n_states as f64; self.n_states];
        for _ in 0..max_iterations {
            let next = left_multiply(&state, &self.rows);
            let delta = state
                .iter()
                .zip(next.iter())
                .map(|(a, b)| (a - b).abs())
                .fold(0.0_f64, f64::max);
            state = next;
            if delta <= tolerance {
                break;
            }
        }
        state
    }

    /// Monte-Carlo endpoint distribution over `n_simulations` trajectories
    /// of at most `n_cycles` steps, stopping early on absorption.
    pub fn simulate_trajectories<R: Rng>(
        &self,
        n_cycles: u64,
        initial_state: HealthState,
        n_simulations: usize,
        rng: &mut R,
    ) -> TrajectoryDistribution {
        let absorbing = self.n_states - 1;
        let mut counts: BTreeMap<usize, usize> = BTreeMap::new();

        for _ in 0..n_simulations {
            let mut current = initial_state.value().min(absorbing);
            for _ in 0..n_cycles {
                if current == absorbing {
                    break;
                }
                let draw: f64 = rng.gen();
                let mut cumulative = 0.0;
                for (next, &p) in self.rows[current].iter().enumerate() {
                    cumulative += p;
                    if draw < cumulative {
                        current = next;
                        break;
                    }
                }
            }
            *counts.entry(current).or_insert(0) += 1;
        }

        TrajectoryDistribution {
            counts,
            n_simulations,
        }
    }
}

/// Endpoint tally of a trajectory simulation.
#[derive(Debug, Clone)]
pub struct TrajectoryDistribution {
    counts: BTreeMap<usize, usize>,
    n_simulations: usize,
}

impl TrajectoryDistribution {
    /// Relative frequency of each terminal state.
    pub fn frequencies(&self) -> BTreeMap<usize, f64> {
        self.counts
            .iter()
            .map(|(&state, &count)| (state, count as f64 / self.n_simulations as f64))
            .collect()
    }

    pub fn count(&self, state: usize) -> usize {
        self.counts.get(&state).copied().unwrap_or(0)
    }

    pub fn n_simulations(&self) -> usize {
        self.n_simulations
    }
}

/// `vector · matrix` for a row vector.
fn left_multiply(vector: &[f64], matrix: &[Vec<f64>]) -> Vec<f64> {
    let n = matrix.len();
    let mut result = vec![0.0; n];
    for (i, &v) in vector.iter().enumerate() {
        if v == 0.0 {
            continue;
        }
        for (j, r) in result.iter_mut().enumerate() {
            *r += v * matrix[i][j];
        }
    }
    result
}

fn multiply(a: &[Vec<f64>], b: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let n = a.len();
    let mut result = vec![vec![0.0; n]; n];
    for i in 0..n {
        for k in 0..n {
            let aik = a[i][k];
            if aik == 0.0 {
                continue;
            }
            for j in 0..n {
                result[i][j] += aik * b[k][j];
            }
        }
    }
    result
}

/// Tⁿ by repeated squaring; T⁰ = I.
fn matrix_power(matrix: &[Vec<f64>], mut exponent: u64) -> Vec<Vec<f64>> {
    let n = matrix.len();
    let mut result: Vec<Vec<f64>> = (0..n)
        .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
        .collect();
    let mut base = matrix.to_vec();

    while exponent > 0 {
        if exponent & 1 == 1 {
            result = multiply(&result, &base);
        }
        exponent >>= 1;
        if exponent > 0 {
            base = multiply(&base, &base);
        }
    }
    result
}
