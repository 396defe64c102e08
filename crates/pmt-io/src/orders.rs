//! Maintenance-order import from CSV and JSON tables.
//!
//! CSV rows carry both the DGA and FQ column families; each row's `kind`
//! selects the family that is read. Decimal separators are normalised to
//! `.` before parsing, because site exports routinely arrive with comma
//! decimals. Rows that fail to parse or validate go into the failure
//! side-channel; the rest of the file still imports.

use crate::mapping::FieldMapping;
use chrono::NaiveDate;
use csv::StringRecord;
use pmt_batch::OrderFailure;
use pmt_core::{AnalysisKind, HealthState, MaintenanceOrder, PmtError, PmtResult};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::warn;

/// Result of an import: the usable orders plus per-row failures.
#[derive(Debug, Clone, Default)]
pub struct OrderImport {
    pub orders: Vec<MaintenanceOrder>,
    pub failures: Vec<OrderFailure>,
}

/// Load orders from a CSV or JSON file, dispatching on the extension.
///
/// `default_unavailability` fills the per-state unavailability vector when
/// the file carries no such columns for a family.
pub fn load_maintenance_orders(
    path: &Path,
    mapping: &FieldMapping,
    n_states: usize,
    default_unavailability: Option<&[f64]>,
) -> PmtResult<OrderImport> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") => {
            load_orders_from_json(path, n_states)
        }
        _ => load_orders_from_csv(path, mapping, n_states, default_unavailability),
    }
}

fn load_orders_from_json(path: &Path, n_states: usize) -> PmtResult<OrderImport> {
    let data = fs::read_to_string(path)?;
    let parsed: Vec<MaintenanceOrder> = serde_json::from_str(&data)?;

    let mut import = OrderImport::default();
    for order in parsed {
        match order.validate(n_states) {
            Ok(()) => import.orders.push(order),
            Err(error) => {
                warn!(order_id = %order.id, %error, "skipping invalid order");
                import.failures.push(OrderFailure {
                    order_id: order.id.clone(),
                    error: error.to_string(),
                });
            }
        }
    }
    Ok(import)
}

fn load_orders_from_csv(
    path: &Path,
    mapping: &FieldMapping,
    n_states: usize,
    default_unavailability: Option<&[f64]>,
) -> PmtResult<OrderImport> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| PmtError::Parse(format!("opening '{}': {e}", path.display())))?;

    let headers = reader
        .headers()
        .map_err(|e| PmtError::Parse(format!("reading headers: {e}")))?
        .clone();
    let columns: HashMap<String, usize> = headers
        .iter()
        .enumerate()
        .map(|(i, name)| (name.to_string(), i))
        .collect();

    for required in [
        &mapping.order_id,
        &mapping.kind,
        &mapping.current_state,
        &mapping.measured_at,
    ] {
        if !columns.contains_key(required.as_str()) {
            return Err(PmtError::Parse(format!(
                "order table is missing required column '{required}'"
            )));
        }
    }

    let mut import = OrderImport::default();
    for (row_number, record) in reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(error) => {
                import.failures.push(OrderFailure {
                    order_id: format!("row {}", row_number + 2),
                    error: error.to_string(),
                });
                continue;
            }
        };

        let order_id = field(&record, &columns, &mapping.order_id)
            .unwrap_or_else(|_| format!("row {}", row_number + 2));
        match parse_row(
            &record,
            &columns,
            mapping,
            n_states,
            default_unavailability,
        ) {
            Ok(order) => match order.validate(n_states) {
                Ok(()) => import.orders.push(order),
                Err(error) => {
                    warn!(order_id = %order_id, %error, "skipping invalid order");
                    import.failures.push(OrderFailure {
                        order_id,
                        error: error.to_string(),
                    });
                }
            },
            Err(error) => {
                warn!(order_id = %order_id, %error, "skipping unparseable order row");
                import.failures.push(OrderFailure {
                    order_id,
                    error: error.to_string(),
                });
            }
        }
    }

    Ok(import)
}

fn parse_row(
    record: &StringRecord,
    columns: &HashMap<String, usize>,
    mapping: &FieldMapping,
    n_states: usize,
    default_unavailability: Option<&[f64]>,
) -> PmtResult<MaintenanceOrder> {
    let id = field(record, columns, &mapping.order_id)?;
    let kind: AnalysisKind = field(record, columns, &mapping.kind)?.parse()?;
    let state_raw = field(record, columns, &mapping.current_state)?;
    let current_state = state_raw
        .parse::<usize>()
        .map(HealthState::new)
        .map_err(|_| PmtError::Parse(format!("current state '{state_raw}' is not an integer")))?;
    let measured_at = parse_date(&field(record, columns, &mapping.measured_at)?)?;

    let family = mapping.family(kind);
    let transition_rates =
        read_vector(record, columns, &family.rate_prefix, n_states - 1)?;
    let operational_costs = read_vector(record, columns, &family.cost_prefix, n_states)?;
    // Fall back to configured defaults only when the column family is
    // absent altogether; malformed values in present columns stay errors.
    let unavail_present = columns.contains_key(&format!("{}0", family.unavailability_prefix));
    let unavailability_hours = if unavail_present {
        read_vector(record, columns, &family.unavailability_prefix, n_states)?
    } else if let Some(defaults) = default_unavailability {
        if defaults.len() != n_states {
            return Err(PmtError::Config(format!(
                "default unavailability vector has {} entries for {} states",
                defaults.len(),
                n_states
            )));
        }
        defaults.to_vec()
    } else {
        return Err(PmtError::Parse(format!(
            "missing column '{}0' and no configured default",
            family.unavailability_prefix
        )));
    };

    Ok(MaintenanceOrder {
        id,
        kind,
        current_state,
        measured_at,
        transition_rates,
        operational_costs,
        unavailability_hours,
    })
}

fn field(
    record: &StringRecord,
    columns: &HashMap<String, usize>,
    name: &str,
) -> PmtResult<String> {
    let index = columns
        .get(name)
        .ok_or_else(|| PmtError::Parse(format!("missing column '{name}'")))?;
    let value = record
        .get(*index)
        .ok_or_else(|| PmtError::Parse(format!("row is short of column '{name}'")))?;
    if value.is_empty() {
        return Err(PmtError::Parse(format!("column '{name}' is empty")));
    }
    Ok(value.to_string())
}

fn read_vector(
    record: &StringRecord,
    columns: &HashMap<String, usize>,
    prefix: &str,
    length: usize,
) -> PmtResult<Vec<f64>> {
    (0..length)
        .map(|i| {
            let name = format!("{prefix}{i}");
            let raw = field(record, columns, &name)?;
            parse_number(&raw)
                .ok_or_else(|| PmtError::Parse(format!("column '{name}': bad number '{raw}'")))
        })
        .collect()
}

/// Parse a number after normalising a decimal comma to a dot.
pub fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().replace(',', ".").parse().ok()
}

/// Accept ISO dates and the day-first form common in site exports.
pub fn parse_date(raw: &str) -> PmtResult<NaiveDate> {
    let trimmed = raw.trim();
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%d/%m/%Y"))
        .map_err(|_| PmtError::Parse(format!("unrecognised date '{trimmed}'")))
}
