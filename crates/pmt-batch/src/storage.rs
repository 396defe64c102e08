//! Storage seam between the batch driver and whatever persists its data.
//!
//! The driver only ever reads a batch of orders and writes schedule and
//! frontier rows; it has no opinion on the backing store. Implementations
//! live outside this crate (the CSV-backed one in `pmt-io`).

use crate::job::{OrderFrontier, ScheduleRow};
use pmt_core::{MaintenanceOrder, PmtResult};

pub trait Storage {
    /// Read the batch of orders to optimize.
    fn load_orders(&self) -> PmtResult<Vec<MaintenanceOrder>>;

    /// Persist the priority-ordered schedule.
    fn store_schedule(&self, rows: &[ScheduleRow]) -> PmtResult<()>;

    /// Persist the per-order Pareto frontiers.
    fn store_frontiers(&self, frontiers: &[OrderFrontier]) -> PmtResult<()>;
}
