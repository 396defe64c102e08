//! Column mappings for tabular order imports.
//!
//! DGA and FQ analysis campaigns publish separate rate/cost/unavailability
//! column families in the same table; an order's `kind` column selects which
//! family is read. The mapping is configurable so site-specific exports can
//! be imported without renaming columns.

use pmt_core::{AnalysisKind, PmtError, PmtResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Column prefixes of one analysis family. Rates are indexed by stage
/// (`<prefix>0..N-2`), costs and unavailability by state (`<prefix>0..N-1`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct FamilyColumns {
    pub rate_prefix: String,
    pub cost_prefix: String,
    pub unavailability_prefix: String,
}

impl Default for FamilyColumns {
    fn default() -> Self {
        Self {
            rate_prefix: "rate_".to_string(),
            cost_prefix: "cost_".to_string(),
            unavailability_prefix: "unavail_".to_string(),
        }
    }
}

impl FamilyColumns {
    fn with_family(family: &str) -> Self {
        Self {
            rate_prefix: format!("{family}_rate_"),
            cost_prefix: format!("{family}_cost_"),
            unavailability_prefix: format!("{family}_unavail_"),
        }
    }
}

/// Full column mapping of an order table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct FieldMapping {
    pub order_id: String,
    pub kind: String,
    pub current_state: String,
    pub measured_at: String,
    pub dga: FamilyColumns,
    pub fq: FamilyColumns,
}

impl Default for FieldMapping {
    fn default() -> Self {
        Self {
            order_id: "order_id".to_string(),
            kind: "kind".to_string(),
            current_state: "current_state".to_string(),
            measured_at: "measured_at".to_string(),
            dga: FamilyColumns::with_family("dga"),
            fq: FamilyColumns::with_family("fq"),
        }
    }
}

impl FieldMapping {
    /// The column family an order of `kind` reads from.
    pub fn family(&self, kind: AnalysisKind) -> &FamilyColumns {
        match kind {
            AnalysisKind::Dga => &self.dga,
            AnalysisKind::Fq => &self.fq,
        }
    }
}

/// Load a mapping document, dispatching on the file extension and falling
/// back to trying both formats.
pub fn load_mapping_from_path(path: &Path) -> PmtResult<FieldMapping> {
    let data = fs::read_to_string(path)?;
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
            serde_yaml::from_str(&data)
                .map_err(|e| PmtError::Config(format!("parsing field mapping yaml: {e}")))
        }
        Some(ext) if ext.eq_ignore_ascii_case("json") => serde_json::from_str(&data)
            .map_err(|e| PmtError::Config(format!("parsing field mapping json: {e}"))),
        _ => serde_yaml::from_str(&data)
            .or_else(|_| serde_json::from_str(&data))
            .map_err(|e| PmtError::Config(format!("parsing field mapping: {e}"))),
    }
}
