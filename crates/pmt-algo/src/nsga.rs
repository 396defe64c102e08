//! NSGA-II evolutionary search over the maintenance lead-time.
//!
//! A generational loop in the classic shape: binary tournament on
//! (rank, crowding distance), simulated-binary crossover, polynomial
//! mutation, merge parents and offspring, non-dominated sort, truncate by
//! rank then crowding. The decision space is the single continuous
//! lead-time variable; the population is small enough that the quadratic
//! dominance sort is the right tool.
//!
//! The solver is deterministic: the same seed and the same problem produce
//! a bit-identical frontier. Evaluations that fail numerically discard the
//! individual and still count against the budget; the order fails only if
//! the whole budget produced no valid solution.

use crate::pareto::{ParetoFront, ParetoPoint};
use crate::problem::MultiObjectiveProblem;
use pmt_core::{NsgaConfig, PmtError, PmtResult};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use web_time::Instant;

/// Values below this are treated as coincident variables in crossover.
const VARIABLE_EPS: f64 = 1e-14;

/// Runtime controls for one solver run; the search parameters themselves
/// live in [`NsgaConfig`].
#[derive(Debug, Clone, Default)]
pub struct SolveOptions {
    /// RNG seed; identical seeds reproduce identical frontiers
    pub seed: u64,
    /// Optional wall-clock budget; on expiry the best-known frontier is
    /// returned with `partial` set
    pub timeout: Option<Duration>,
    /// Cooperative cancellation flag, checked at evaluation boundaries
    pub cancel: Option<Arc<AtomicBool>>,
}

/// Result of one solver run.
#[derive(Debug, Clone)]
pub struct SolverOutcome {
    pub front: ParetoFront,
    /// Evaluation attempts spent, including numerically discarded ones
    pub evaluations: usize,
    /// True when a timeout cut the run short and the frontier is a snapshot
    pub partial: bool,
}

#[derive(Debug, Clone)]
struct Individual {
    variable: f64,
    cost: f64,
    unavailability: f64,
    rank: usize,
    crowding: f64,
}

/// NSGA-II solver over a [`MultiObjectiveProblem`].
#[derive(Debug, Clone)]
pub struct NsgaSolver {
    config: NsgaConfig,
}

impl NsgaSolver {
    pub fn new(config: NsgaConfig) -> Self {
        Self { config }
    }

    /// Run the generational loop to the evaluation budget and return the
    /// rank-0 front.
    pub fn solve<P: MultiObjectiveProblem>(
        &self,
        problem: &P,
        options: &SolveOptions,
    ) -> PmtResult<SolverOutcome> {
        if self.config.population_size == 0 {
            return Err(PmtError::Config("nsga.population_size must be > 0".into()));
        }
        if self.config.offspring_size == 0 {
            return Err(PmtError::Config("nsga.offspring_size must be > 0".into()));
        }

        let (lower, upper) = problem.variable_bounds();
        let mut rng = StdRng::seed_from_u64(options.seed);
        let started = Instant::now();
        let mut evaluations = 0usize;

        // Initial population: uniform draws over the variable box.
        let mut population: Vec<Individual> = Vec::with_capacity(self.config.population_size);
        while population.len() < self.config.population_size
            && evaluations < self.config.max_evaluations
        {
            self.check_cancelled(options)?;
            let variable = rng.gen_range(lower..=upper);
            evaluations += 1;
            if let Ok(pair) = problem.evaluate(variable) {
                population.push(Individual {
                    variable,
                    cost: pair.cost,
                    unavailability: pair.unavailability,
                    rank: 0,
                    crowding: 0.0,
                });
            }
        }
        if population.is_empty() {
            return Err(PmtError::Numeric(
                "no valid evaluation within the budget".into(),
            ));
        }
        assign_rank_and_crowding(&mut population);

        while evaluations < self.config.max_evaluations {
            self.check_cancelled(options)?;
            if let Some(timeout) = options.timeout {
                if started.elapsed() >= timeout {
                    return Ok(SolverOutcome {
                        front: extract_front(&population),
                        evaluations,
                        partial: true,
                    });
                }
            }

            let mut offspring: Vec<Individual> = Vec::with_capacity(self.config.offspring_size);
            while offspring.len() < self.config.offspring_size
                && evaluations < self.config.max_evaluations
            {
                let parent_a = tournament(&population, &mut rng);
                let parent_b = tournament(&population, &mut rng);
                let (child_a, child_b) = sbx_crossover(
                    population[parent_a].variable,
                    population[parent_b].variable,
                    lower,
                    upper,
                    self.config.crossover.probability,
                    self.config.crossover.distribution_index,
                    &mut rng,
                );

                for child in [child_a, child_b] {
                    if offspring.len() >= self.config.offspring_size
                        || evaluations >= self.config.max_evaluations
                    {
                        break;
                    }
                    self.check_cancelled(options)?;
                    let mutated = polynomial_mutation(
                        child,
                        lower,
                        upper,
                        // One decision variable, so the canonical 1/n rate
                        // mutates every child.
                        1.0,
                        self.config.mutation.distribution_index,
                        &mut rng,
                    );
                    evaluations += 1;
                    if let Ok(pair) = problem.evaluate(mutated) {
                        offspring.push(Individual {
                            variable: mutated,
                            cost: pair.cost,
                            unavailability: pair.unavailability,
                            rank: 0,
                            crowding: 0.0,
                        });
                    }
                }
            }

            population.extend(offspring);
            assign_rank_and_crowding(&mut population);
            truncate(&mut population, self.config.population_size);
        }

        Ok(SolverOutcome {
            front: extract_front(&population),
            evaluations,
            partial: false,
        })
    }

    fn check_cancelled(&self, options: &SolveOptions) -> PmtResult<()> {
        if let Some(flag) = &options.cancel {
            if flag.load(Ordering::Relaxed) {
                return Err(PmtError::Cancelled);
            }
        }
        Ok(())
    }
}

/// Collect rank 0 into a frontier, truncating variables to whole days.
fn extract_front(population: &[Individual]) -> ParetoFront {
    let mut points: Vec<ParetoPoint> = population
        .iter()
        .filter(|individual| individual.rank == 0)
        .map(|individual| ParetoPoint {
            t_days: individual.variable as i64,
            cost: individual.cost,
            unavailability: individual.unavailability,
        })
        .collect();
    // Canonical input order keeps day-duplicate collapsing deterministic.
    points.sort_by(|a, b| {
        a.cost
            .total_cmp(&b.cost)
            .then_with(|| a.t_days.cmp(&b.t_days))
    });
    ParetoFront::from_points(points)
}

fn dominates(a: &Individual, b: &Individual) -> bool {
    a.cost <= b.cost
        && a.unavailability <= b.unavailability
        && (a.cost < b.cost || a.unavailability < b.unavailability)
}

/// Non-dominated sorting followed by per-front crowding distances.
fn assign_rank_and_crowding(population: &mut [Individual]) {
    let n = population.len();
    let mut domination_count = vec![0usize; n];
    let mut dominated_by: Vec<Vec<usize>> = vec![Vec::new(); n];

    for i in 0..n {
        for j in (i + 1)..n {
            if dominates(&population[i], &population[j]) {
                dominated_by[i].push(j);
                domination_count[j] += 1;
            } else if dominates(&population[j], &population[i]) {
                dominated_by[j].push(i);
                domination_count[i] += 1;
            }
        }
    }

    let mut current: Vec<usize> = (0..n).filter(|&i| domination_count[i] == 0).collect();
    let mut rank = 0;
    while !current.is_empty() {
        let mut next: Vec<usize> = Vec::new();
        for &i in &current {
            population[i].rank = rank;
            for &j in &dominated_by[i] {
                domination_count[j] -= 1;
                if domination_count[j] == 0 {
                    next.push(j);
                }
            }
        }
        crowding_distance(population, &current);
        current = next;
        rank += 1;
    }
}

/// Crowding distance within one front: boundary solutions get infinity,
/// interior ones the sum of normalised neighbour spans per objective.
fn crowding_distance(population: &mut [Individual], front: &[usize]) {
    for &i in front {
        population[i].crowding = 0.0;
    }
    if front.len() <= 2 {
        for &i in front {
            population[i].crowding = f64::INFINITY;
        }
        return;
    }

    for objective in 0..2 {
        let value = |individual: &Individual| match objective {
            0 => individual.cost,
            _ => individual.unavailability,
        };

        let mut order: Vec<usize> = front.to_vec();
        order.sort_by(|&a, &b| value(&population[a]).total_cmp(&value(&population[b])));

        let span = value(&population[*order.last().unwrap()]) - value(&population[order[0]]);
        population[order[0]].crowding = f64::INFINITY;
        population[*order.last().unwrap()].crowding = f64::INFINITY;
        if span <= 0.0 {
            continue;
        }
        for window in order.windows(3) {
            let (prev, mid, next) = (window[0], window[1], window[2]);
            let delta = (value(&population[next]) - value(&population[prev])) / span;
            if population[mid].crowding.is_finite() {
                population[mid].crowding += delta;
            }
        }
    }
}

/// Binary tournament: lower rank wins, then higher crowding distance.
fn tournament(population: &[Individual], rng: &mut StdRng) -> usize {
    let a = rng.gen_range(0..population.len());
    let b = rng.gen_range(0..population.len());
    let better = |x: usize, y: usize| -> usize {
        if population[x].rank != population[y].rank {
            if population[x].rank < population[y].rank {
                x
            } else {
                y
            }
        } else if population[x].crowding >= population[y].crowding {
            x
        } else {
            y
        }
    };
    better(a, b)
}

/// Truncate to `capacity`, preferring lower rank then higher crowding.
fn truncate(population: &mut Vec<Individual>, capacity: usize) {
    population.sort_by(|a, b| {
        a.rank
            .cmp(&b.rank)
            .then_with(|| b.crowding.total_cmp(&a.crowding))
            .then_with(|| a.variable.total_cmp(&b.variable))
    });
    population.truncate(capacity);
}

/// Simulated-binary crossover on a single bounded variable.
fn sbx_crossover(
    parent_a: f64,
    parent_b: f64,
    lower: f64,
    upper: f64,
    probability: f64,
    distribution_index: f64,
    rng: &mut StdRng,
) -> (f64, f64) {
    if rng.gen::<f64>() > probability || (parent_a - parent_b).abs() <= VARIABLE_EPS {
        return (parent_a, parent_b);
    }

    let y1 = parent_a.min(parent_b);
    let y2 = parent_a.max(parent_b);
    let span = y2 - y1;
    let rand = rng.gen::<f64>();

    let spread = |beta: f64| -> f64 {
        let alpha = 2.0 - beta.powf(-(distribution_index + 1.0));
        if rand <= 1.0 / alpha {
            (rand * alpha).powf(1.0 / (distribution_index + 1.0))
        } else {
            (1.0 / (2.0 - rand * alpha)).powf(1.0 / (distribution_index + 1.0))
        }
    };

    let beta_low = 1.0 + 2.0 * (y1 - lower) / span;
    let child_a = 0.5 * ((y1 + y2) - spread(beta_low) * span);

    let beta_high = 1.0 + 2.0 * (upper - y2) / span;
    let child_b = 0.5 * ((y1 + y2) + spread(beta_high) * span);

    let child_a = child_a.clamp(lower, upper);
    let child_b = child_b.clamp(lower, upper);

    if rng.gen::<f64>() <= 0.5 {
        (child_b, child_a)
    } else {
        (child_a, child_b)
    }
}

/// Polynomial mutation with the usual boundary-aware perturbation.
fn polynomial_mutation(
    variable: f64,
    lower: f64,
    upper: f64,
    probability: f64,
    distribution_index: f64,
    rng: &mut StdRng,
) -> f64 {
    if rng.gen::<f64>() > probability {
        return variable;
    }

    let span = upper - lower;
    let delta_low = (variable - lower) / span;
    let delta_high = (upper - variable) / span;
    let rand = rng.gen::<f64>();
    let power = 1.0 / (distribution_index + 1.0);

    let delta = if rand <= 0.5 {
        let factor = 1.0 - delta_low;
        let value = 2.0 * rand + (1.0 - 2.0 * rand) * factor.powf(distribution_index + 1.0);
        value.powf(power) - 1.0
    } else {
        let factor = 1.0 - delta_high;
        let value =
            2.0 * (1.0 - rand) + 2.0 * (rand - 0.5) * factor.powf(distribution_index + 1.0);
        1.0 - value.powf(power)
    };

    (variable + delta * span).clamp(lower, upper)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::ObjectivePair;

    /// Analytic two-objective toy problem: cost falls with t,
    /// unavailability rises with t. The whole domain is Pareto-optimal.
    struct Tradeoff {
        fail_above: Option<f64>,
    }

    impl MultiObjectiveProblem for Tradeoff {
        fn variable_bounds(&self) -> (f64, f64) {
            (1.0, 3650.0)
        }

        fn evaluate(&self, lead_time: f64) -> PmtResult<ObjectivePair> {
            if let Some(limit) = self.fail_above {
                if lead_time > limit {
                    return Err(PmtError::Numeric("blown up".into()));
                }
            }
            let t = lead_time.floor();
            Ok(ObjectivePair {
                cost: 1000.0 / t,
                unavailability: t,
            })
        }
    }

    fn solver() -> NsgaSolver {
        let mut config = NsgaConfig::default();
        config.population_size = 40;
        config.offspring_size = 40;
        config.max_evaluations = 400;
        NsgaSolver::new(config)
    }

    #[test]
    fn zero_population_is_a_config_error() {
        let mut config = NsgaConfig::default();
        config.population_size = 0;
        let solver = NsgaSolver::new(config);
        let result = solver.solve(&Tradeoff { fail_above: None }, &SolveOptions::default());
        assert!(matches!(result, Err(PmtError::Config(_))));
    }

    #[test]
    fn frontier_is_mutually_non_dominated() {
        let outcome = solver()
            .solve(&Tradeoff { fail_above: None }, &SolveOptions::default())
            .unwrap();
        assert!(!outcome.front.is_empty());
        assert!(!outcome.partial);
        for a in outcome.front.iter() {
            for b in outcome.front.iter() {
                if a.t_days != b.t_days {
                    assert!(!a.dominates(b), "{a:?} dominates {b:?}");
                }
            }
        }
    }

    #[test]
    fn frontier_is_sorted_by_cost_without_day_duplicates() {
        let outcome = solver()
            .solve(&Tradeoff { fail_above: None }, &SolveOptions::default())
            .unwrap();
        let points = outcome.front.points();
        for pair in points.windows(2) {
            assert!(pair[0].cost <= pair[1].cost);
            assert_ne!(pair[0].t_days, pair[1].t_days);
        }
    }

    #[test]
    fn same_seed_reproduces_the_frontier() {
        let problem = Tradeoff { fail_above: None };
        let options = SolveOptions {
            seed: 42,
            ..SolveOptions::default()
        };
        let first = solver().solve(&problem, &options).unwrap();
        let second = solver().solve(&problem, &options).unwrap();
        assert_eq!(first.front, second.front);
        assert_eq!(first.evaluations, second.evaluations);
    }

    #[test]
    fn different_seeds_still_yield_valid_frontiers() {
        let problem = Tradeoff { fail_above: None };
        for seed in [1, 2, 99] {
            let options = SolveOptions {
                seed,
                ..SolveOptions::default()
            };
            let outcome = solver().solve(&problem, &options).unwrap();
            for a in outcome.front.iter() {
                for b in outcome.front.iter() {
                    if a.t_days != b.t_days {
                        assert!(!a.dominates(b));
                    }
                }
            }
        }
    }

    #[test]
    fn failed_evaluations_are_discarded_not_fatal() {
        // Anything above t = 2000 blows up; the survivors still form a front.
        let problem = Tradeoff {
            fail_above: Some(2000.0),
        };
        let outcome = solver().solve(&problem, &SolveOptions::default()).unwrap();
        assert!(!outcome.front.is_empty());
        assert!(outcome.front.iter().all(|p| p.t_days <= 2000));
    }

    #[test]
    fn all_failures_exhaust_the_budget() {
        let problem = Tradeoff {
            fail_above: Some(0.0),
        };
        let result = solver().solve(&problem, &SolveOptions::default());
        assert!(matches!(result, Err(PmtError::Numeric(_))));
    }

    #[test]
    fn cancellation_aborts_between_evaluations() {
        let cancel = Arc::new(AtomicBool::new(true));
        let options = SolveOptions {
            cancel: Some(cancel),
            ..SolveOptions::default()
        };
        let result = solver().solve(&Tradeoff { fail_above: None }, &options);
        assert!(matches!(result, Err(PmtError::Cancelled)));
    }

    #[test]
    fn zero_timeout_returns_partial_snapshot() {
        let options = SolveOptions {
            timeout: Some(Duration::from_secs(0)),
            ..SolveOptions::default()
        };
        let outcome = solver()
            .solve(&Tradeoff { fail_above: None }, &options)
            .unwrap();
        assert!(outcome.partial);
        assert!(!outcome.front.is_empty());
    }

    #[test]
    fn bounds_are_respected() {
        let outcome = solver()
            .solve(&Tradeoff { fail_above: None }, &SolveOptions::default())
            .unwrap();
        for point in outcome.front.iter() {
            assert!(point.t_days >= 1 && point.t_days <= 3650);
        }
    }
}
