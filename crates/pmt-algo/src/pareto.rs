//! Pareto frontier representation and analysis.
//!
//! The solver hands off its non-dominated set as an immutable
//! [`ParetoFront`], ordered by ascending cost with day-duplicates collapsed.
//! The analysis side picks one representative under a named criterion,
//! measures frontier quality as 2-D hypervolume, and filters by operational
//! constraints.

use pmt_core::{PmtError, PmtResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One non-dominated solution: a lead-time and its two objective values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParetoPoint {
    pub t_days: i64,
    pub cost: f64,
    pub unavailability: f64,
}

impl ParetoPoint {
    /// Weak Pareto dominance for minimisation, strict in at least one axis.
    pub fn dominates(&self, other: &ParetoPoint) -> bool {
        self.cost <= other.cost
            && self.unavailability <= other.unavailability
            && (self.cost < other.cost || self.unavailability < other.unavailability)
    }
}

/// An immutable set of mutually non-dominated solutions, sorted by
/// ascending cost (ties broken by lead-time).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParetoFront {
    points: Vec<ParetoPoint>,
}

impl ParetoFront {
    /// Normalise a raw solution set into a frontier: drop dominated points,
    /// collapse duplicates on the same day, sort by cost then lead-time.
    pub fn from_points(raw: Vec<ParetoPoint>) -> Self {
        let mut non_dominated: Vec<ParetoPoint> = Vec::with_capacity(raw.len());
        for candidate in &raw {
            if raw.iter().any(|other| other.dominates(candidate)) {
                continue;
            }
            if non_dominated.iter().any(|kept| kept.t_days == candidate.t_days) {
                continue;
            }
            non_dominated.push(*candidate);
        }
        non_dominated.sort_by(|a, b| {
            a.cost
                .total_cmp(&b.cost)
                .then_with(|| a.t_days.cmp(&b.t_days))
        });
        Self {
            points: non_dominated,
        }
    }

    pub fn points(&self) -> &[ParetoPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParetoPoint> {
        self.points.iter()
    }

    pub fn get(&self, index: usize) -> Option<&ParetoPoint> {
        self.points.get(index)
    }
}

/// How to pick one representative from the frontier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionCriterion {
    /// Argmin by cost
    MinCost,
    /// Argmin by unavailability
    MinUnavailability,
    /// Argmin of the weighted normalised objectives
    Balanced {
        cost_weight: f64,
        unavailability_weight: f64,
    },
    /// Maximum perpendicular distance to the chord through the extremes
    KneePoint,
}

impl Default for SelectionCriterion {
    fn default() -> Self {
        SelectionCriterion::KneePoint
    }
}

impl fmt::Display for SelectionCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionCriterion::MinCost => f.write_str("min_cost"),
            SelectionCriterion::MinUnavailability => f.write_str("min_unavailability"),
            SelectionCriterion::Balanced { .. } => f.write_str("balanced"),
            SelectionCriterion::KneePoint => f.write_str("knee_point"),
        }
    }
}

impl FromStr for SelectionCriterion {
    type Err = PmtError;

    fn from_str(input: &str) -> PmtResult<Self> {
        match input.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "min_cost" => Ok(SelectionCriterion::MinCost),
            "min_unavailability" => Ok(SelectionCriterion::MinUnavailability),
            "balanced" => Ok(SelectionCriterion::Balanced {
                cost_weight: 0.5,
                unavailability_weight: 0.5,
            }),
            "knee_point" => Ok(SelectionCriterion::KneePoint),
            other => Err(PmtError::Config(format!(
                "unknown selection criterion '{other}'; use min_cost, min_unavailability, balanced or knee_point"
            ))),
        }
    }
}

/// Pick the index of the representative solution under `criterion`.
///
/// Running the selection twice on the same frontier yields the same index.
/// Fails with `EmptyFrontier` when there is nothing to choose from.
pub fn select_solution(front: &ParetoFront, criterion: SelectionCriterion) -> PmtResult<usize> {
    if front.is_empty() {
        return Err(PmtError::EmptyFrontier);
    }

    let index = match criterion {
        SelectionCriterion::MinCost => argmin(front.points(), |p| p.cost),
        SelectionCriterion::MinUnavailability => argmin(front.points(), |p| p.unavailability),
        SelectionCriterion::Balanced {
            cost_weight,
            unavailability_weight,
        } => {
            let costs = normalize(front.points().iter().map(|p| p.cost));
            let unavail = normalize(front.points().iter().map(|p| p.unavailability));
            let scores: Vec<f64> = costs
                .iter()
                .zip(unavail.iter())
                .map(|(c, u)| cost_weight * c + unavailability_weight * u)
                .collect();
            argmin_value(&scores)
        }
        SelectionCriterion::KneePoint => knee_point(front),
    };

    Ok(index)
}

/// Knee point: the solution furthest from the straight line through the two
/// extreme frontier points, measured in min-max normalised objective space.
/// Invariant under strictly positive affine rescaling of either axis.
fn knee_point(front: &ParetoFront) -> usize {
    let n = front.len();
    if n <= 2 {
        return 0;
    }

    let costs = normalize(front.points().iter().map(|p| p.cost));
    let unavail = normalize(front.points().iter().map(|p| p.unavailability));

    let start = (costs[0], unavail[0]);
    let end = (costs[n - 1], unavail[n - 1]);
    let chord = (end.0 - start.0, end.1 - start.1);
    let chord_norm = (chord.0 * chord.0 + chord.1 * chord.1).sqrt();
    if chord_norm < 1e-12 {
        return 0;
    }

    let mut best_index = 0;
    let mut best_distance = -1.0;
    for i in 0..n {
        let to_point = (start.0 - costs[i], start.1 - unavail[i]);
        let distance = (chord.0 * to_point.1 - chord.1 * to_point.0).abs() / chord_norm;
        if distance > best_distance {
            best_distance = distance;
            best_index = i;
        }
    }
    best_index
}

/// 2-D hypervolume dominated by the frontier, bounded by `reference`
/// (defaults to 1.1× the frontier maxima). Zero for an empty frontier.
///
/// Walks the cost-sorted frontier from low to high cost, summing
/// axis-aligned rectangles; `prev_unav` tracks the unavailability edge of
/// the last accepted rectangle.
pub fn hypervolume(front: &ParetoFront, reference: Option<(f64, f64)>) -> f64 {
    if front.is_empty() {
        return 0.0;
    }

    let (ref_cost, ref_unav) = reference.unwrap_or_else(|| {
        let max_cost = front.points().iter().map(|p| p.cost).fold(f64::MIN, f64::max);
        let max_unav = front
            .points()
            .iter()
            .map(|p| p.unavailability)
            .fold(f64::MIN, f64::max);
        (max_cost * 1.1, max_unav * 1.1)
    });

    let mut volume = 0.0;
    let mut prev_unav = ref_unav;
    for point in front.iter() {
        let width = ref_cost - point.cost;
        let height = prev_unav - point.unavailability;
        if width > 0.0 && height > 0.0 {
            volume += width * height;
            prev_unav = point.unavailability;
        }
    }
    volume
}

/// Operational constraints for narrowing a frontier. All supplied bounds
/// must hold simultaneously.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrontierFilter {
    pub max_cost: Option<f64>,
    pub max_unavailability: Option<f64>,
    pub min_t_days: Option<i64>,
    pub max_t_days: Option<i64>,
}

impl FrontierFilter {
    fn accepts(&self, point: &ParetoPoint) -> bool {
        self.max_cost.map_or(true, |limit| point.cost <= limit)
            && self
                .max_unavailability
                .map_or(true, |limit| point.unavailability <= limit)
            && self.min_t_days.map_or(true, |limit| point.t_days >= limit)
            && self.max_t_days.map_or(true, |limit| point.t_days <= limit)
    }
}

/// Sub-frontier containing the points that satisfy every supplied bound.
pub fn filter_front(front: &ParetoFront, filter: &FrontierFilter) -> ParetoFront {
    ParetoFront {
        points: front
            .iter()
            .filter(|point| filter.accepts(point))
            .copied()
            .collect(),
    }
}

/// Per-axis descriptive statistics of a frontier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std: f64,
    pub median: f64,
}

/// Full frontier summary: statistics, the three landmark solutions, and
/// the hypervolume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrontSummary {
    pub n_solutions: usize,
    pub cost: AxisStats,
    pub unavailability: AxisStats,
    pub lead_time: AxisStats,
    pub min_cost_index: usize,
    pub min_unavailability_index: usize,
    pub knee_index: usize,
    pub hypervolume: f64,
}

/// Summarize a frontier. Fails with `EmptyFrontier` when there is nothing
/// to describe.
pub fn summarize_front(front: &ParetoFront) -> PmtResult<FrontSummary> {
    if front.is_empty() {
        return Err(PmtError::EmptyFrontier);
    }

    let costs: Vec<f64> = front.iter().map(|p| p.cost).collect();
    let unavail: Vec<f64> = front.iter().map(|p| p.unavailability).collect();
    let times: Vec<f64> = front.iter().map(|p| p.t_days as f64).collect();

    Ok(FrontSummary {
        n_solutions: front.len(),
        cost: axis_stats(&costs),
        unavailability: axis_stats(&unavail),
        lead_time: axis_stats(&times),
        min_cost_index: argmin(front.points(), |p| p.cost),
        min_unavailability_index: argmin(front.points(), |p| p.unavailability),
        knee_index: knee_point(front),
        hypervolume: hypervolume(front, None),
    })
}

fn axis_stats(values: &[f64]) -> AxisStats {
    let n = values.len() as f64;
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let median = if sorted.len() % 2 == 1 {
        sorted[sorted.len() / 2]
    } else {
        0.5 * (sorted[sorted.len() / 2 - 1] + sorted[sorted.len() / 2])
    };

    AxisStats {
        min,
        max,
        mean,
        std: variance.sqrt(),
        median,
    }
}

/// Min-max normalisation to [0, 1]; a degenerate span maps everything
/// to 0.5 so weights still act on the other axis.
fn normalize(values: impl Iterator<Item = f64>) -> Vec<f64> {
    let collected: Vec<f64> = values.collect();
    let min = collected.iter().copied().fold(f64::INFINITY, f64::min);
    let max = collected.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if (max - min).abs() < 1e-12 {
        return vec![0.5; collected.len()];
    }
    collected.iter().map(|v| (v - min) / (max - min)).collect()
}

fn argmin(points: &[ParetoPoint], key: impl Fn(&ParetoPoint) -> f64) -> usize {
    let mut best = 0;
    for (i, point) in points.iter().enumerate().skip(1) {
        if key(point) < key(&points[best]) {
            best = i;
        }
    }
    best
}

fn argmin_value(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, value) in values.iter().enumerate().skip(1) {
        if *value < values[best] {
            best = i;
        }
    }
    best
}
