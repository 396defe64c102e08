//! # pmt-algo: Decision Algorithms for Maintenance Planning
//!
//! The algorithmic core of the PMT planner: degradation modeling, objective
//! evaluation, multi-objective search, and frontier analysis.
//!
//! ## Pipeline
//!
//! | Stage | Type | Description |
//! |-------|------|-------------|
//! | Degradation | [`TransitionMatrix`] | Bi-diagonal absorbing Markov chain over health states |
//! | Evaluation | [`MaintenanceProblem`] | (cost, unavailability) of a candidate lead-time |
//! | Search | [`NsgaSolver`] | NSGA-II over the lead-time, seeded and deterministic |
//! | Analysis | [`ParetoFront`] + selection/hypervolume/filter | Pick one representative, measure frontier quality |
//!
//! The solver sees problems only through the narrow
//! [`MultiObjectiveProblem`] capability (variable bounds plus an evaluation
//! function), so alternative objective models can plug in without touching
//! the search.
//!
//! ## Example
//!
//! ```ignore
//! use pmt_algo::{MaintenanceProblem, NsgaSolver, SolveOptions, TransitionMatrix};
//! use pmt_core::{NsgaConfig, ProblemConfig};
//!
//! let matrix = TransitionMatrix::from_rates(&[0.01, 0.02, 0.03, 0.04])?;
//! let problem = MaintenanceProblem::new(matrix, costs, unavailability, &ProblemConfig::default())?;
//! let outcome = NsgaSolver::new(NsgaConfig::default()).solve(&problem, &SolveOptions::default())?;
//! println!("{} non-dominated lead-times", outcome.front.len());
//! ```

pub mod markov;
pub mod nsga;
pub mod pareto;
pub mod problem;

pub use markov::{TrajectoryDistribution, TransitionMatrix};
pub use nsga::{NsgaSolver, SolveOptions, SolverOutcome};
pub use pareto::{
    filter_front, hypervolume, select_solution, summarize_front, AxisStats, FrontSummary,
    FrontierFilter, ParetoFront, ParetoPoint, SelectionCriterion,
};
pub use problem::{MaintenanceProblem, MultiObjectiveProblem, ObjectivePair};
