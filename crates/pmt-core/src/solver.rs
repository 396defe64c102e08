//! Dense linear-system backends.
//!
//! The Markov model needs one dense solve per MTTF query: the fundamental
//! matrix row is obtained from `(I - Q) x = 1` rather than by inverting
//! `I - Q`. The backend seam keeps that solve swappable between a plain
//! Gaussian elimination and faer's partial-pivot LU.

use anyhow::{anyhow, Result};
use faer::{prelude::*, solvers::PartialPivLu, Mat};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Pivots smaller than this are treated as zero.
const PIVOT_EPS: f64 = 1e-12;

/// Trait for solving dense linear systems (Ax = b).
pub trait LinearSystemBackend: Send + Sync {
    /// Solve the linear system Ax = b
    fn solve(&self, matrix: &[Vec<f64>], rhs: &[f64]) -> Result<Vec<f64>>;
}

fn check_shape(matrix: &[Vec<f64>], rhs: &[f64]) -> Result<usize> {
    let n = matrix.len();
    if let Some(row) = matrix.iter().find(|row| row.len() != n) {
        return Err(anyhow!(
            "matrix is not square: {} rows but a row of {} columns",
            n,
            row.len()
        ));
    }
    if rhs.len() != n {
        return Err(anyhow!(
            "dimension mismatch: {n}x{n} matrix with rhs of length {}",
            rhs.len()
        ));
    }
    Ok(n)
}

#[derive(Debug, Clone, Default)]
pub struct GaussSolver;

impl LinearSystemBackend for GaussSolver {
    fn solve(&self, matrix: &[Vec<f64>], rhs: &[f64]) -> Result<Vec<f64>> {
        let n = check_shape(matrix, rhs)?;
        if n == 0 {
            return Ok(Vec::new());
        }

        // Work on the augmented system [A | b].
        let mut augmented: Vec<Vec<f64>> = matrix
            .iter()
            .zip(rhs.iter())
            .map(|(row, &b)| {
                let mut extended = row.clone();
                extended.push(b);
                extended
            })
            .collect();

        // Forward elimination with partial pivoting.
        for column in 0..n {
            let best = (column..n)
                .max_by(|&r, &s| {
                    augmented[r][column]
                        .abs()
                        .total_cmp(&augmented[s][column].abs())
                })
                .expect("column range is non-empty");
            if augmented[best][column].abs() < PIVOT_EPS {
                return Err(anyhow!(
                    "matrix is singular to working precision (column {column})"
                ));
            }
            augmented.swap(column, best);

            for row in column + 1..n {
                let factor = augmented[row][column] / augmented[column][column];
                if factor == 0.0 {
                    continue;
                }
                for k in column..=n {
                    let above = augmented[column][k];
                    augmented[row][k] -= factor * above;
                }
            }
        }

        // Back substitution on the upper-triangular remainder.
        let mut solution = vec![0.0; n];
        for row in (0..n).rev() {
            let tail: f64 = (row + 1..n)
                .map(|k| augmented[row][k] * solution[k])
                .sum();
            solution[row] = (augmented[row][n] - tail) / augmented[row][row];
        }

        Ok(solution)
    }
}

#[derive(Debug, Clone, Default)]
pub struct FaerSolver;

impl LinearSystemBackend for FaerSolver {
    fn solve(&self, matrix: &[Vec<f64>], rhs: &[f64]) -> Result<Vec<f64>> {
        let n = check_shape(matrix, rhs)?;
        if n == 0 {
            return Ok(Vec::new());
        }

        let mat = Mat::from_fn(n, n, |i, j| matrix[i][j]);
        let rhs_mat = Mat::from_fn(n, 1, |i, _| rhs[i]);
        let lu = PartialPivLu::new(mat.as_ref());
        let sol = lu.solve(&rhs_mat);

        // faer's LU does not report singularity, so check the residual.
        for i in 0..n {
            let mut acc = 0.0;
            for j in 0..n {
                acc += matrix[i][j] * sol.read(j, 0);
            }
            if !acc.is_finite() || (acc - rhs[i]).abs() > 1e-6 * (1.0 + rhs[i].abs()) {
                return Err(anyhow!("matrix is singular to working precision (faer)"));
            }
        }

        let mut solution = Vec::with_capacity(n);
        for i in 0..n {
            solution.push(sol.read(i, 0));
        }
        Ok(solution)
    }
}

/// Linear-system backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SolverKind {
    Gauss,
    #[default]
    Faer,
}

impl SolverKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SolverKind::Gauss => "gauss",
            SolverKind::Faer => "faer",
        }
    }

    pub fn available() -> &'static [&'static str] {
        &["gauss", "faer"]
    }

    pub fn build_solver(&self) -> Arc<dyn LinearSystemBackend> {
        match self {
            SolverKind::Gauss => Arc::new(GaussSolver),
            SolverKind::Faer => Arc::new(FaerSolver),
        }
    }
}

impl fmt::Display for SolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SolverKind {
    type Err = anyhow::Error;

    fn from_str(input: &str) -> Result<Self> {
        match input.to_ascii_lowercase().as_str() {
            "gauss" => Ok(SolverKind::Gauss),
            "faer" | "default" => Ok(SolverKind::Faer),
            other => Err(anyhow!(
                "unknown solver '{}'; supported values: {}",
                other,
                SolverKind::available().join(", ")
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solve_small(backend: &dyn LinearSystemBackend) -> Vec<f64> {
        // 2x + y = 5, x + 3y = 10 -> x = 1, y = 3
        let a = vec![vec![2.0, 1.0], vec![1.0, 3.0]];
        backend.solve(&a, &[5.0, 10.0]).unwrap()
    }

    #[test]
    fn gauss_solves_small_system() {
        let x = solve_small(&GaussSolver);
        assert!((x[0] - 1.0).abs() < 1e-9);
        assert!((x[1] - 3.0).abs() < 1e-9);
    }

    #[test]
    fn gauss_pivots_past_a_zero_diagonal() {
        // Leading zero forces a row swap before elimination can proceed.
        let a = vec![vec![0.0, 1.0], vec![1.0, 0.0]];
        let x = GaussSolver.solve(&a, &[2.0, 3.0]).unwrap();
        assert!((x[0] - 3.0).abs() < 1e-9);
        assert!((x[1] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn faer_matches_gauss() {
        let g = solve_small(&GaussSolver);
        let f = solve_small(&FaerSolver);
        for (a, b) in g.iter().zip(f.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn gauss_rejects_singular() {
        let a = vec![vec![1.0, 2.0], vec![2.0, 4.0]];
        let err = GaussSolver.solve(&a, &[1.0, 2.0]).unwrap_err();
        assert!(err.to_string().contains("singular"));
    }

    #[test]
    fn shape_errors_are_reported() {
        let ragged = vec![vec![1.0, 2.0], vec![3.0]];
        assert!(GaussSolver.solve(&ragged, &[1.0, 2.0]).is_err());
        let square = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        assert!(FaerSolver.solve(&square, &[1.0]).is_err());
    }

    #[test]
    fn kind_parses_and_builds() {
        let kind: SolverKind = "gauss".parse().unwrap();
        assert_eq!(kind.as_str(), "gauss");
        assert!(kind.build_solver().solve(&[vec![1.0]], &[1.0]).is_ok());
        assert!("simplex".parse::<SolverKind>().is_err());
    }
}
