//! # pmt-io: Import and Export for the PMT Planner
//!
//! Everything that crosses a file boundary lives here: maintenance-order
//! tables (CSV with DGA/FQ column families, or JSON), sensor time series
//! for the anomaly pipeline, and the result exporters. The batch driver
//! stays store-agnostic; [`CsvStorage`] plugs this crate into its
//! [`pmt_batch::Storage`] seam.

pub mod exporters;
pub mod mapping;
pub mod orders;
pub mod series;
pub mod storage;

pub use exporters::{
    write_detections_csv, write_frontiers_csv, write_json, write_schedule_csv,
};
pub use mapping::{load_mapping_from_path, FamilyColumns, FieldMapping};
pub use orders::{load_maintenance_orders, OrderImport};
pub use series::{load_sensor_series, SensorSeries};
pub use storage::CsvStorage;
