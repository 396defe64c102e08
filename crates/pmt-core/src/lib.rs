//! # pmt-core: Predictive Maintenance Modeling Core
//!
//! Fundamental data structures shared by the PMT planner: health states,
//! maintenance work orders, planner configuration, the unified error type,
//! and the dense linear-system backends used by the degradation model.
//!
//! ## Design Philosophy
//!
//! Equipment condition is an **ordinal health state** on a short absorbing
//! chain: a bushing is Normal, passes through numbered degradation stages,
//! and ends in Failure, from which it never recovers. Everything downstream
//! (transition matrices, expected costs, maintenance dates) is derived from
//! that ordinal plus per-state rate/cost vectors carried by a
//! [`MaintenanceOrder`].
//!
//! There is no process-wide mutable state: configuration is a
//! [`PlannerConfig`] value loaded once and passed by reference into every
//! call, so a batch is a pure function of its inputs and seed.
//!
//! ## Modules
//!
//! - [`config`] - Planner configuration document (NSGA, problem, AE sections)
//! - [`error`] - Unified [`PmtError`]/[`PmtResult`] types
//! - [`order`] - Maintenance work orders and validation
//! - [`solver`] - Dense linear-system backends (Gauss, faer LU)

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod config;
pub mod error;
pub mod order;
pub mod solver;

pub use config::{
    load_config_from_path, AutoencoderConfig, CrossoverConfig, DefaultsConfig, ModelArch,
    MutationConfig, NsgaConfig, PlannerConfig, ProblemConfig,
};
pub use error::{PmtError, PmtResult};
pub use order::{AnalysisKind, MaintenanceOrder};
pub use solver::{FaerSolver, GaussSolver, LinearSystemBackend, SolverKind};

/// Ordinal health state of a bushing.
///
/// State 0 is Normal; the highest ordinal of a chain is the absorbing
/// Failure state. The ordinal is immutable and carries no chain length of
/// its own; range checks happen where the state meets a concrete model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HealthState(usize);

impl HealthState {
    #[inline]
    pub fn new(value: usize) -> Self {
        HealthState(value)
    }

    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }

    /// Whether this is the absorbing state of a chain with `n_states` states.
    #[inline]
    pub fn is_absorbing(&self, n_states: usize) -> bool {
        n_states > 0 && self.0 == n_states - 1
    }

    /// Human-readable name within a chain of `n_states` states.
    pub fn name(&self, n_states: usize) -> String {
        if self.is_absorbing(n_states) {
            "Failure".to_string()
        } else if self.0 == 0 {
            "Normal".to_string()
        } else {
            format!("Degraded {}", self.0)
        }
    }
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
