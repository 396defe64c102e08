//! Maintenance work orders.
//!
//! An order is the unit of work of the batch planner: one bushing, one
//! measured condition, one set of per-state degradation rates and costs.
//! Orders are validated up front and never mutated by the engine.

use crate::error::{PmtError, PmtResult};
use crate::HealthState;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which laboratory analysis produced the degradation rates for an order.
///
/// Dissolved-gas analysis (DGA) and physico-chemical (FQ) campaigns publish
/// separate rate/cost column families; the kind selects which family an
/// importer reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AnalysisKind {
    Dga,
    Fq,
}

impl AnalysisKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisKind::Dga => "DGA",
            AnalysisKind::Fq => "FQ",
        }
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisKind {
    type Err = PmtError;

    fn from_str(input: &str) -> PmtResult<Self> {
        match input.trim().to_ascii_uppercase().as_str() {
            "DGA" => Ok(AnalysisKind::Dga),
            "FQ" => Ok(AnalysisKind::Fq),
            other => Err(PmtError::InvalidInput(format!(
                "unknown analysis kind '{other}'; use DGA or FQ"
            ))),
        }
    }
}

/// One preventive-maintenance work order for a single bushing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceOrder {
    /// Order identifier, unique within a batch
    pub id: String,
    /// Which analysis campaign produced the rates
    pub kind: AnalysisKind,
    /// Health state observed at measurement time
    pub current_state: HealthState,
    /// Date of the condition measurement
    pub measured_at: NaiveDate,
    /// Per-stage transition rates λ₀..λ_{N-2}, each in [0, 1]
    pub transition_rates: Vec<f64>,
    /// Expected operational cost per state, length N
    pub operational_costs: Vec<f64>,
    /// Expected unavailability hours per state, length N
    pub unavailability_hours: Vec<f64>,
}

impl MaintenanceOrder {
    /// Check the vector-alignment and range invariants against a state count.
    pub fn validate(&self, n_states: usize) -> PmtResult<()> {
        if self.id.trim().is_empty() {
            return Err(PmtError::InvalidInput("order id is empty".into()));
        }
        if self.transition_rates.len() != n_states - 1 {
            return Err(PmtError::InvalidInput(format!(
                "order {}: expected {} transition rates, found {}",
                self.id,
                n_states - 1,
                self.transition_rates.len()
            )));
        }
        if self.operational_costs.len() != n_states {
            return Err(PmtError::InvalidInput(format!(
                "order {}: expected {} operational costs, found {}",
                self.id,
                n_states,
                self.operational_costs.len()
            )));
        }
        if self.unavailability_hours.len() != n_states {
            return Err(PmtError::InvalidInput(format!(
                "order {}: expected {} unavailability entries, found {}",
                self.id,
                n_states,
                self.unavailability_hours.len()
            )));
        }
        if self.current_state.value() >= n_states {
            return Err(PmtError::InvalidInput(format!(
                "order {}: state {} out of range 0..{}",
                self.id,
                self.current_state.value(),
                n_states
            )));
        }
        for (i, rate) in self.transition_rates.iter().enumerate() {
            if !rate.is_finite() || !(0.0..=1.0).contains(rate) {
                return Err(PmtError::InvalidInput(format!(
                    "order {}: rate λ{} = {} outside [0, 1]",
                    self.id, i, rate
                )));
            }
        }
        for (label, values) in [
            ("cost", &self.operational_costs),
            ("unavailability", &self.unavailability_hours),
        ] {
            if let Some(bad) = values.iter().find(|v| !v.is_finite() || **v < 0.0) {
                return Err(PmtError::InvalidInput(format!(
                    "order {}: negative or non-finite {label} {bad}",
                    self.id
                )));
            }
        }
        Ok(())
    }

    /// Days elapsed since the measurement, floored at zero for
    /// measurements dated in the future.
    pub fn time_offset_days(&self, today: NaiveDate) -> i64 {
        (today - self.measured_at).num_days().max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_order() -> MaintenanceOrder {
        MaintenanceOrder {
            id: "OS-1001".to_string(),
            kind: AnalysisKind::Dga,
            current_state: HealthState::new(0),
            measured_at: NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
            transition_rates: vec![0.01, 0.02, 0.03, 0.04],
            operational_costs: vec![10.0, 20.0, 30.0, 40.0, 1000.0],
            unavailability_hours: vec![2.0, 4.0, 8.0, 16.0, 48.0],
        }
    }

    #[test]
    fn valid_order_passes() {
        assert!(sample_order().validate(5).is_ok());
    }

    #[test]
    fn rate_out_of_range_is_invalid_input() {
        let mut order = sample_order();
        order.transition_rates[2] = 1.5;
        let err = order.validate(5).unwrap_err();
        assert!(matches!(err, PmtError::InvalidInput(_)));
        assert!(err.to_string().contains("λ2"));
    }

    #[test]
    fn negative_cost_rejected() {
        let mut order = sample_order();
        order.operational_costs[0] = -1.0;
        assert!(order.validate(5).is_err());
    }

    #[test]
    fn length_mismatch_rejected() {
        let mut order = sample_order();
        order.transition_rates.pop();
        assert!(order.validate(5).is_err());
    }

    #[test]
    fn state_out_of_range_rejected() {
        let mut order = sample_order();
        order.current_state = HealthState::new(7);
        assert!(order.validate(5).is_err());
    }

    #[test]
    fn offset_floors_future_measurements() {
        let order = sample_order();
        let before = NaiveDate::from_ymd_opt(2024, 12, 1).unwrap();
        assert_eq!(order.time_offset_days(before), 0);
        let after = NaiveDate::from_ymd_opt(2025, 1, 20).unwrap();
        assert_eq!(order.time_offset_days(after), 10);
    }

    #[test]
    fn kind_parses_case_insensitive() {
        assert_eq!("dga".parse::<AnalysisKind>().unwrap(), AnalysisKind::Dga);
        assert_eq!("FQ".parse::<AnalysisKind>().unwrap(), AnalysisKind::Fq);
        assert!("XY".parse::<AnalysisKind>().is_err());
    }
}
