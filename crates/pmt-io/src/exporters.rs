//! Result exporters: schedule, frontiers, detections.
//!
//! CSV for spreadsheet consumers, JSON for downstream tooling. Writers
//! create parent directories so a fresh output root works out of the box.

use chrono::{DateTime, Utc};
use pmt_anomaly::Detection;
use pmt_batch::{OrderFrontier, ScheduleRow};
use pmt_core::{PmtError, PmtResult};
use serde::Serialize;
use std::fs;
use std::path::Path;

fn ensure_parent(path: &Path) -> PmtResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn csv_writer(path: &Path) -> PmtResult<csv::Writer<fs::File>> {
    ensure_parent(path)?;
    csv::Writer::from_path(path)
        .map_err(|e| PmtError::Parse(format!("creating '{}': {e}", path.display())))
}

/// Write the priority-ordered schedule as CSV.
pub fn write_schedule_csv(path: &Path, rows: &[ScheduleRow]) -> PmtResult<()> {
    #[derive(Serialize)]
    struct Record<'a> {
        priority: usize,
        order_id: &'a str,
        scheduled_date: String,
        lead_time_days: i64,
        cost: f64,
        unavailability: f64,
        partial: bool,
    }

    let mut writer = csv_writer(path)?;
    for row in rows {
        writer
            .serialize(Record {
                priority: row.priority,
                order_id: &row.order_id,
                scheduled_date: row.scheduled_date.format("%Y-%m-%d").to_string(),
                lead_time_days: row.lead_time_days,
                cost: row.cost,
                unavailability: row.unavailability,
                partial: row.partial,
            })
            .map_err(|e| PmtError::Parse(format!("writing schedule row: {e}")))?;
    }
    writer
        .flush()
        .map_err(|e| PmtError::Parse(format!("flushing schedule: {e}")))?;
    Ok(())
}

/// Write any serializable result as pretty JSON.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> PmtResult<()> {
    ensure_parent(path)?;
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}

/// Write every order's frontier as long-format CSV, one row per Pareto point.
pub fn write_frontiers_csv(path: &Path, frontiers: &[OrderFrontier]) -> PmtResult<()> {
    #[derive(Serialize)]
    struct Record<'a> {
        order_id: &'a str,
        t_days: i64,
        cost: f64,
        unavailability: f64,
    }

    let mut writer = csv_writer(path)?;
    for frontier in frontiers {
        for point in frontier.front.iter() {
            writer
                .serialize(Record {
                    order_id: &frontier.order_id,
                    t_days: point.t_days,
                    cost: point.cost,
                    unavailability: point.unavailability,
                })
                .map_err(|e| PmtError::Parse(format!("writing frontier row: {e}")))?;
        }
    }
    writer
        .flush()
        .map_err(|e| PmtError::Parse(format!("flushing frontiers: {e}")))?;
    Ok(())
}

/// Write detection rows as CSV.
pub fn write_detections_csv(path: &Path, detections: &[Detection]) -> PmtResult<()> {
    #[derive(Serialize)]
    struct Record {
        index: usize,
        timestamp: Option<DateTime<Utc>>,
        q: f64,
        t2: f64,
        q_threshold: f64,
        t2_threshold: f64,
        is_anomaly: bool,
        severity: &'static str,
    }

    let mut writer = csv_writer(path)?;
    for detection in detections {
        writer
            .serialize(Record {
                index: detection.index,
                timestamp: detection.timestamp,
                q: detection.q,
                t2: detection.t2,
                q_threshold: detection.q_threshold,
                t2_threshold: detection.t2_threshold,
                is_anomaly: detection.is_anomaly,
                severity: detection.severity.as_str(),
            })
            .map_err(|e| PmtError::Parse(format!("writing detection row: {e}")))?;
    }
    writer
        .flush()
        .map_err(|e| PmtError::Parse(format!("flushing detections: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pmt_algo::{ParetoFront, ParetoPoint};

    fn sample_rows() -> Vec<ScheduleRow> {
        vec![ScheduleRow {
            order_id: "OS-1".to_string(),
            scheduled_date: NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
            lead_time_days: 30,
            cost: 123.45,
            unavailability: 6.7,
            priority: 1,
            partial: false,
        }]
    }

    #[test]
    fn schedule_csv_has_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/schedule.csv");
        write_schedule_csv(&path, &sample_rows()).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "priority,order_id,scheduled_date,lead_time_days,cost,unavailability,partial"
        );
        assert!(lines.next().unwrap().starts_with("1,OS-1,2025-07-01,30,"));
    }

    #[test]
    fn frontier_csv_is_long_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fronts.csv");
        let frontiers = vec![OrderFrontier {
            order_id: "OS-1".to_string(),
            front: ParetoFront::from_points(vec![
                ParetoPoint {
                    t_days: 10,
                    cost: 100.0,
                    unavailability: 50.0,
                },
                ParetoPoint {
                    t_days: 50,
                    cost: 60.0,
                    unavailability: 70.0,
                },
            ]),
        }];
        write_frontiers_csv(&path, &frontiers).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 3);
        assert!(text.contains("OS-1,50,60"), "{text}");
    }

    #[test]
    fn json_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schedule.json");
        let rows = sample_rows();
        write_json(&path, &rows).unwrap();
        let back: Vec<ScheduleRow> =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back, rows);
    }
}
