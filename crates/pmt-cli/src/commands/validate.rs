//! `pmt validate`: check an order table without optimizing anything.

use crate::cli::ValidateArgs;
use anyhow::{bail, Context, Result};
use pmt_core::{load_config_from_path, PlannerConfig};
use pmt_io::{load_maintenance_orders, load_mapping_from_path, FieldMapping};
use std::io::{self, Write};
use tabwriter::TabWriter;

pub fn run(args: &ValidateArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => load_config_from_path(path)
            .with_context(|| format!("loading config '{}'", path.display()))?,
        None => PlannerConfig::default(),
    };

    let n_states = config.problem.n_states;
    let defaults = config.defaults.unavailability_vector(n_states);
    let defaults = if config.defaults.unavailability_hours.is_empty() {
        None
    } else {
        Some(defaults.as_slice())
    };

    let mapping = match &args.mapping {
        Some(path) => load_mapping_from_path(path)
            .with_context(|| format!("loading mapping '{}'", path.display()))?,
        None => FieldMapping::default(),
    };

    let import = load_maintenance_orders(&args.input, &mapping, n_states, defaults)
        .with_context(|| format!("reading '{}'", args.input.display()))?;

    println!(
        "{}: {} valid order(s), {} rejected",
        args.input.display(),
        import.orders.len(),
        import.failures.len()
    );

    if !import.failures.is_empty() {
        let mut tw = TabWriter::new(io::stdout());
        writeln!(tw, "order\terror")?;
        for failure in &import.failures {
            writeln!(tw, "{}\t{}", failure.order_id, failure.error)?;
        }
        tw.flush()?;
        bail!("{} order(s) failed validation", import.failures.len());
    }
    Ok(())
}
