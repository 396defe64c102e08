//! `pmt optimize`: orders in, priority-ordered schedule out.

use crate::cli::OptimizeArgs;
use anyhow::{bail, Context, Result};
use chrono::Utc;
use pmt_algo::SelectionCriterion;
use pmt_batch::{optimize_orders, BatchOptions, Storage};
use pmt_core::{load_config_from_path, PlannerConfig};
use pmt_io::{load_mapping_from_path, write_json, CsvStorage};
use std::io::{self, Write};
use std::time::Duration;
use tabwriter::TabWriter;
use tracing::info;

pub fn run(args: &OptimizeArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => load_config_from_path(path)
            .with_context(|| format!("loading config '{}'", path.display()))?,
        None => PlannerConfig::default(),
    };

    let selection = parse_selection(args)?;

    let n_states = config.problem.n_states;
    let mut storage = CsvStorage::new(args.input.clone(), args.output.clone(), n_states);
    if let Some(mapping_path) = &args.mapping {
        let mapping = load_mapping_from_path(mapping_path)
            .with_context(|| format!("loading mapping '{}'", mapping_path.display()))?;
        storage = storage.with_mapping(mapping);
    }
    if !config.defaults.unavailability_hours.is_empty() {
        storage =
            storage.with_default_unavailability(config.defaults.unavailability_vector(n_states));
    }

    let orders = storage
        .load_orders()
        .with_context(|| format!("loading orders from '{}'", args.input.display()))?;
    if orders.is_empty() {
        bail!("no usable orders in '{}'", args.input.display());
    }
    info!(orders = orders.len(), "orders loaded");

    let mut options = BatchOptions::new(Utc::now().date_naive());
    options.selection = selection;
    options.master_seed = args.seed;
    options.threads = args.threads;
    options.order_timeout = args.timeout_secs.map(Duration::from_secs);

    let outcome = optimize_orders(&orders, &config, &options)?;

    storage.store_schedule(&outcome.schedule)?;
    storage.store_frontiers(&outcome.frontiers)?;
    write_json(&args.output.join("schedule.json"), &outcome)?;

    print_schedule(&outcome.schedule, args.top)?;
    if !outcome.failures.is_empty() {
        eprintln!("{} order(s) failed:", outcome.failures.len());
        for failure in &outcome.failures {
            eprintln!("  {}: {}", failure.order_id, failure.error);
        }
    }
    println!(
        "\n{} order(s) scheduled, {} failed; results in '{}'",
        outcome.schedule.len(),
        outcome.failures.len(),
        args.output.display()
    );
    Ok(())
}

fn parse_selection(args: &OptimizeArgs) -> Result<SelectionCriterion> {
    let criterion: SelectionCriterion = args.selection_criterion.parse()?;
    Ok(match criterion {
        SelectionCriterion::Balanced { .. } => SelectionCriterion::Balanced {
            cost_weight: args.cost_weight,
            unavailability_weight: args.unavailability_weight,
        },
        other => other,
    })
}

fn print_schedule(schedule: &[pmt_batch::ScheduleRow], top: usize) -> Result<()> {
    let mut tw = TabWriter::new(io::stdout());
    writeln!(tw, "rank\torder\tdate\tdays\tcost\tunavailability")?;
    for row in schedule.iter().take(top) {
        writeln!(
            tw,
            "{}\t{}\t{}\t{}\t{:.2}\t{:.2}",
            row.priority,
            row.order_id,
            row.scheduled_date.format("%Y-%m-%d"),
            row.lead_time_days,
            row.cost,
            row.unavailability
        )?;
    }
    tw.flush()?;
    Ok(())
}
