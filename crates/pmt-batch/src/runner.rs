//! Parallel batch driver.
//!
//! Each order is an isolated job: its Markov model, problem and solver share
//! nothing mutable with the rest of the batch, so orders fan out over a
//! rayon pool. Per-order RNG seeds are derived from the master seed and the
//! order id, and results are sorted into canonical order before priorities
//! are assigned, so the batch output is identical for any worker count.

use crate::job::{BatchOutcome, OrderFailure, OrderFrontier, ScheduleRow};
use anyhow::Context;
use chrono::{Duration as ChronoDuration, NaiveDate};
use pmt_algo::{
    select_solution, MaintenanceProblem, NsgaSolver, SelectionCriterion, SolveOptions,
    TransitionMatrix,
};
use pmt_core::{MaintenanceOrder, PlannerConfig, PmtResult};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Runtime controls of one batch run.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// How the representative solution is picked from each frontier
    pub selection: SelectionCriterion,
    /// Master seed; per-order sub-seeds are derived from it
    pub master_seed: u64,
    /// Worker threads; 0 auto-detects the CPU count
    pub threads: usize,
    /// Optional per-order solver time budget
    pub order_timeout: Option<Duration>,
    /// Cooperative cancellation flag shared with the workers
    pub cancel: Option<Arc<AtomicBool>>,
    /// The batch's notion of "today"; injected so runs are reproducible
    pub today: NaiveDate,
}

impl BatchOptions {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            selection: SelectionCriterion::default(),
            master_seed: 0,
            threads: 0,
            order_timeout: None,
            cancel: None,
            today,
        }
    }
}

/// Optimize a batch of orders into a priority-ordered maintenance schedule.
///
/// Configuration problems abort before any evaluation. Orders that fail
/// individually are logged and collected into the outcome's failure list
/// while the rest of the batch continues; a completed batch always returns
/// a (possibly empty) schedule alongside those failures.
pub fn optimize_orders(
    orders: &[MaintenanceOrder],
    config: &PlannerConfig,
    options: &BatchOptions,
) -> PmtResult<BatchOutcome> {
    config.validate()?;

    let thread_count = if options.threads == 0 {
        num_cpus::get()
    } else {
        options.threads
    };
    let pool = ThreadPoolBuilder::new()
        .num_threads(thread_count)
        .build()
        .context("building rayon thread pool for the batch run")?;

    info!(
        orders = orders.len(),
        threads = thread_count,
        seed = options.master_seed,
        "starting maintenance optimization batch"
    );

    let results: Vec<(String, PmtResult<OrderResult>)> = pool.install(|| {
        orders
            .par_iter()
            .map(|order| (order.id.clone(), run_order(order, config, options)))
            .collect()
    });

    let mut scheduled: Vec<(ScheduleRow, OrderFrontier)> = Vec::new();
    let mut failures: Vec<OrderFailure> = Vec::new();
    for (order_id, result) in results {
        match result {
            Ok(outcome) => scheduled.push((outcome.row, outcome.frontier)),
            Err(error) => {
                warn!(order_id = %order_id, %error, "order failed; batch continues");
                failures.push(OrderFailure {
                    order_id,
                    error: error.to_string(),
                });
            }
        }
    }

    // Canonical priority order: ascending cost, ties broken by order id so
    // the output is identical for any worker count. Rank 1 is the cheapest
    // order and the first to schedule.
    scheduled.sort_by(|a, b| {
        a.0.cost
            .total_cmp(&b.0.cost)
            .then_with(|| a.0.order_id.cmp(&b.0.order_id))
    });

    let mut schedule = Vec::with_capacity(scheduled.len());
    let mut frontiers = Vec::with_capacity(scheduled.len());
    for (rank, (mut row, frontier)) in scheduled.into_iter().enumerate() {
        row.priority = rank + 1;
        schedule.push(row);
        frontiers.push(frontier);
    }
    frontiers.sort_by(|a, b| a.order_id.cmp(&b.order_id));
    failures.sort_by(|a, b| a.order_id.cmp(&b.order_id));

    info!(
        scheduled = schedule.len(),
        failed = failures.len(),
        "maintenance optimization batch finished"
    );

    Ok(BatchOutcome {
        schedule,
        frontiers,
        failures,
    })
}

struct OrderResult {
    row: ScheduleRow,
    frontier: OrderFrontier,
}

/// Optimize one order: model, problem, solver, selection, calendar date.
fn run_order(
    order: &MaintenanceOrder,
    config: &PlannerConfig,
    options: &BatchOptions,
) -> PmtResult<OrderResult> {
    order.validate(config.problem.n_states)?;

    let matrix = TransitionMatrix::from_rates(&order.transition_rates)?;
    let offset = order.time_offset_days(options.today);
    let problem = MaintenanceProblem::new(
        matrix,
        order.operational_costs.clone(),
        order.unavailability_hours.clone(),
        &config.problem,
    )?
    .with_initial_state(order.current_state)
    .with_time_offset(offset);

    let solver = NsgaSolver::new(config.nsga.clone());
    let outcome = solver.solve(
        &problem,
        &SolveOptions {
            seed: derive_order_seed(options.master_seed, &order.id),
            timeout: options.order_timeout,
            cancel: options.cancel.clone(),
        },
    )?;

    let chosen_index = select_solution(&outcome.front, options.selection)?;
    let chosen = outcome.front.points()[chosen_index];

    // The measurement is `offset` days old, so the intervention lands at
    // today + t − offset; an overdue order clamps to today.
    let scheduled_date = options.today
        + ChronoDuration::days((chosen.t_days - offset).max(0));

    Ok(OrderResult {
        row: ScheduleRow {
            order_id: order.id.clone(),
            scheduled_date,
            lead_time_days: chosen.t_days,
            cost: chosen.cost,
            unavailability: chosen.unavailability,
            priority: 0,
            partial: outcome.partial,
        },
        frontier: OrderFrontier {
            order_id: order.id.clone(),
            front: outcome.front,
        },
    })
}

/// Per-order sub-seed, stable across worker counts and batch composition.
fn derive_order_seed(master_seed: u64, order_id: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    master_seed.hash(&mut hasher);
    order_id.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pmt_core::{AnalysisKind, HealthState, PmtError};
    use std::sync::atomic::Ordering;

    fn order(id: &str, rates: [f64; 4]) -> MaintenanceOrder {
        MaintenanceOrder {
            id: id.to_string(),
            kind: AnalysisKind::Dga,
            current_state: HealthState::new(0),
            measured_at: NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
            transition_rates: rates.to_vec(),
            operational_costs: vec![10.0, 20.0, 30.0, 40.0, 1000.0],
            unavailability_hours: vec![2.0, 4.0, 8.0, 16.0, 48.0],
        }
    }

    fn quick_config() -> PlannerConfig {
        let mut config = PlannerConfig::default();
        config.nsga.population_size = 30;
        config.nsga.offspring_size = 30;
        config.nsga.max_evaluations = 300;
        config
    }

    fn options() -> BatchOptions {
        let mut options = BatchOptions::new(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
        options.master_seed = 99;
        options.threads = 2;
        options
    }

    #[test]
    fn batch_schedules_orders_by_ascending_cost() {
        let orders = vec![
            order("OS-3", [0.05, 0.06, 0.07, 0.08]),
            order("OS-1", [0.001, 0.001, 0.001, 0.001]),
            order("OS-2", [0.01, 0.02, 0.03, 0.04]),
        ];
        let outcome = optimize_orders(&orders, &quick_config(), &options()).unwrap();

        assert_eq!(outcome.schedule.len(), 3);
        assert!(outcome.failures.is_empty());
        for (i, row) in outcome.schedule.iter().enumerate() {
            assert_eq!(row.priority, i + 1);
        }
        for pair in outcome.schedule.windows(2) {
            assert!(pair[0].cost <= pair[1].cost);
        }
        // Rank 1 carries the lowest cost of the batch.
        let min_cost = outcome
            .schedule
            .iter()
            .map(|r| r.cost)
            .fold(f64::INFINITY, f64::min);
        assert_eq!(outcome.schedule[0].cost, min_cost);
    }

    #[test]
    fn worker_count_does_not_change_the_output() {
        let orders = vec![
            order("OS-A", [0.01, 0.02, 0.03, 0.04]),
            order("OS-B", [0.02, 0.02, 0.02, 0.02]),
            order("OS-C", [0.005, 0.01, 0.02, 0.05]),
        ];
        let config = quick_config();

        let mut serial = options();
        serial.threads = 1;
        let mut parallel = options();
        parallel.threads = 4;

        let first = optimize_orders(&orders, &config, &serial).unwrap();
        let second = optimize_orders(&orders, &config, &parallel).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn same_seed_reproduces_the_batch() {
        let orders = vec![order("OS-A", [0.01, 0.02, 0.03, 0.04])];
        let config = quick_config();
        let first = optimize_orders(&orders, &config, &options()).unwrap();
        let second = optimize_orders(&orders, &config, &options()).unwrap();
        assert_eq!(first, second);

        let mut reseeded = options();
        reseeded.master_seed = 100;
        // A different master seed is allowed to land elsewhere, but the
        // schedule stays well-formed.
        let third = optimize_orders(&orders, &config, &reseeded).unwrap();
        assert_eq!(third.schedule.len(), 1);
    }

    #[test]
    fn malformed_orders_are_skipped_not_fatal() {
        let mut bad = order("OS-BAD", [0.01, 0.02, 0.03, 0.04]);
        bad.transition_rates[0] = 7.0;
        let orders = vec![bad, order("OS-GOOD", [0.01, 0.02, 0.03, 0.04])];

        let outcome = optimize_orders(&orders, &quick_config(), &options()).unwrap();
        assert_eq!(outcome.schedule.len(), 1);
        assert_eq!(outcome.schedule[0].order_id, "OS-GOOD");
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].order_id, "OS-BAD");
        assert!(outcome.failures[0].error.contains("Invalid input"));
        assert!(!outcome.is_complete_success());
    }

    #[test]
    fn invalid_config_aborts_before_any_work() {
        let mut config = quick_config();
        config.nsga.population_size = 0;
        let orders = vec![order("OS-A", [0.01, 0.02, 0.03, 0.04])];
        let result = optimize_orders(&orders, &config, &options());
        assert!(matches!(result, Err(PmtError::Config(_))));
    }

    #[test]
    fn cancellation_returns_failures_not_rows() {
        let cancel = Arc::new(AtomicBool::new(false));
        cancel.store(true, Ordering::Relaxed);
        let mut options = options();
        options.cancel = Some(cancel);

        let orders = vec![order("OS-A", [0.01, 0.02, 0.03, 0.04])];
        let outcome = optimize_orders(&orders, &quick_config(), &options).unwrap();
        assert!(outcome.schedule.is_empty());
        assert_eq!(outcome.failures.len(), 1);
        assert!(outcome.failures[0].error.contains("Cancelled"));
    }

    #[test]
    fn scheduled_date_subtracts_the_measurement_offset() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let orders = vec![order("OS-A", [0.0, 0.0, 0.0, 0.0])];
        let offset = (today - orders[0].measured_at).num_days();
        assert!(offset > 0);

        let mut opts = options();
        opts.today = today;
        let outcome = optimize_orders(&orders, &quick_config(), &opts).unwrap();
        let row = &outcome.schedule[0];
        let expected = today + ChronoDuration::days((row.lead_time_days - offset).max(0));
        assert_eq!(row.scheduled_date, expected);
    }

    #[test]
    fn sub_seeds_differ_per_order_and_stay_stable() {
        let a = derive_order_seed(1, "OS-1");
        let b = derive_order_seed(1, "OS-2");
        let c = derive_order_seed(2, "OS-1");
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, derive_order_seed(1, "OS-1"));
    }
}
