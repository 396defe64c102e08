//! CSV-backed implementation of the batch driver's storage seam.

use crate::exporters::{write_frontiers_csv, write_schedule_csv};
use crate::mapping::FieldMapping;
use crate::orders::load_maintenance_orders;
use pmt_batch::{OrderFrontier, ScheduleRow, Storage};
use pmt_core::{MaintenanceOrder, PmtResult};
use std::path::PathBuf;
use tracing::warn;

/// Reads orders from one CSV/JSON file and writes results under an output
/// directory (`schedule.csv`, `pareto_frontiers.csv`).
#[derive(Debug, Clone)]
pub struct CsvStorage {
    orders_path: PathBuf,
    output_dir: PathBuf,
    mapping: FieldMapping,
    n_states: usize,
    default_unavailability: Option<Vec<f64>>,
}

impl CsvStorage {
    pub fn new(orders_path: PathBuf, output_dir: PathBuf, n_states: usize) -> Self {
        Self {
            orders_path,
            output_dir,
            mapping: FieldMapping::default(),
            n_states,
            default_unavailability: None,
        }
    }

    pub fn with_mapping(mut self, mapping: FieldMapping) -> Self {
        self.mapping = mapping;
        self
    }

    pub fn with_default_unavailability(mut self, hours: Vec<f64>) -> Self {
        self.default_unavailability = Some(hours);
        self
    }

    pub fn schedule_path(&self) -> PathBuf {
        self.output_dir.join("schedule.csv")
    }

    pub fn frontiers_path(&self) -> PathBuf {
        self.output_dir.join("pareto_frontiers.csv")
    }
}

impl Storage for CsvStorage {
    fn load_orders(&self) -> PmtResult<Vec<MaintenanceOrder>> {
        let import = load_maintenance_orders(
            &self.orders_path,
            &self.mapping,
            self.n_states,
            self.default_unavailability.as_deref(),
        )?;
        for failure in &import.failures {
            warn!(order_id = %failure.order_id, error = %failure.error, "order dropped at import");
        }
        Ok(import.orders)
    }

    fn store_schedule(&self, rows: &[ScheduleRow]) -> PmtResult<()> {
        write_schedule_csv(&self.schedule_path(), rows)
    }

    fn store_frontiers(&self, frontiers: &[OrderFrontier]) -> PmtResult<()> {
        write_frontiers_csv(&self.frontiers_path(), frontiers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pmt_algo::{ParetoFront, ParetoPoint};
    use std::fs;
    use std::io::Write;

    #[test]
    fn storage_round_trip_through_a_tempdir() {
        let dir = tempfile::tempdir().unwrap();
        let orders_path = dir.path().join("orders.csv");
        let mut file = fs::File::create(&orders_path).unwrap();
        writeln!(
            file,
            "order_id,kind,current_state,measured_at,\
dga_rate_0,dga_rate_1,dga_rate_2,dga_rate_3,\
dga_cost_0,dga_cost_1,dga_cost_2,dga_cost_3,dga_cost_4,\
dga_unavail_0,dga_unavail_1,dga_unavail_2,dga_unavail_3,dga_unavail_4"
        )
        .unwrap();
        writeln!(
            file,
            "OS-1,DGA,0,2025-01-10,0.01,0.02,0.03,0.04,10,20,30,40,1000,2,4,8,16,48"
        )
        .unwrap();

        let storage = CsvStorage::new(orders_path, dir.path().join("out"), 5);
        let orders = storage.load_orders().unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].id, "OS-1");

        let rows = vec![ScheduleRow {
            order_id: "OS-1".to_string(),
            scheduled_date: NaiveDate::from_ymd_opt(2025, 8, 1).unwrap(),
            lead_time_days: 45,
            cost: 99.0,
            unavailability: 3.0,
            priority: 1,
            partial: false,
        }];
        storage.store_schedule(&rows).unwrap();
        assert!(storage.schedule_path().exists());

        let frontiers = vec![OrderFrontier {
            order_id: "OS-1".to_string(),
            front: ParetoFront::from_points(vec![ParetoPoint {
                t_days: 45,
                cost: 99.0,
                unavailability: 3.0,
            }]),
        }];
        storage.store_frontiers(&frontiers).unwrap();
        assert!(storage.frontiers_path().exists());
    }
}
