//! Batch job records: schedule rows, per-order frontiers, and the error
//! side-channel.

use chrono::NaiveDate;
use pmt_algo::ParetoFront;
use serde::{Deserialize, Serialize};

/// One line of the optimized maintenance calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRow {
    pub order_id: String,
    /// Calendar date of the chosen intervention
    pub scheduled_date: NaiveDate,
    /// Chosen lead-time in days from "today"
    pub lead_time_days: i64,
    pub cost: f64,
    pub unavailability: f64,
    /// 1 = lowest cost, scheduled first
    pub priority: usize,
    /// True when the solver returned a timeout snapshot for this order
    pub partial: bool,
}

/// The full frontier an order's search produced, keyed by order id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderFrontier {
    pub order_id: String,
    pub front: ParetoFront,
}

/// A failed order and the reason it was skipped. Failures never mask the
/// successful rows of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderFailure {
    pub order_id: String,
    pub error: String,
}

/// Everything a batch run returns: the priority-ordered schedule, one
/// frontier per scheduled order, and the error side-channel.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub schedule: Vec<ScheduleRow>,
    pub frontiers: Vec<OrderFrontier>,
    pub failures: Vec<OrderFailure>,
}

impl BatchOutcome {
    pub fn is_complete_success(&self) -> bool {
        self.failures.is_empty()
    }
}
