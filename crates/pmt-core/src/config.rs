//! Planner configuration.
//!
//! One document, four sections: `nsga` for the evolutionary search, `problem`
//! for the objective model, `ae` for the anomaly auto-encoder, `defaults` for
//! per-state fallbacks. Loaded from YAML or JSON, validated before any
//! evaluation runs; unknown keys are rejected so a typo cannot silently fall
//! back to a default.

use crate::error::{PmtError, PmtResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PlannerConfig {
    pub nsga: NsgaConfig,
    pub problem: ProblemConfig,
    pub ae: AutoencoderConfig,
    pub defaults: DefaultsConfig,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            nsga: NsgaConfig::default(),
            problem: ProblemConfig::default(),
            ae: AutoencoderConfig::default(),
            defaults: DefaultsConfig::default(),
        }
    }
}

/// NSGA-II search parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct NsgaConfig {
    pub population_size: usize,
    pub offspring_size: usize,
    pub max_evaluations: usize,
    pub crossover: CrossoverConfig,
    pub mutation: MutationConfig,
}

impl Default for NsgaConfig {
    fn default() -> Self {
        Self {
            population_size: 200,
            offspring_size: 200,
            max_evaluations: 4000,
            crossover: CrossoverConfig::default(),
            mutation: MutationConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct CrossoverConfig {
    pub probability: f64,
    pub distribution_index: f64,
}

impl Default for CrossoverConfig {
    fn default() -> Self {
        Self {
            probability: 1.0,
            distribution_index: 20.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct MutationConfig {
    pub distribution_index: f64,
}

impl Default for MutationConfig {
    fn default() -> Self {
        Self {
            distribution_index: 20.0,
        }
    }
}

/// Objective-model parameters shared by every order in a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ProblemConfig {
    /// Inclusive lead-time bounds in days
    pub time_bounds: [i64; 2],
    /// Mobilisation premium of an immediate intervention
    pub base_cost: f64,
    /// Exponential decay of the intervention cost per day of lead-time
    pub decay_rate: f64,
    /// Number of health states, last one absorbing
    pub n_states: usize,
}

impl Default for ProblemConfig {
    fn default() -> Self {
        Self {
            time_bounds: [1, 3650],
            base_cost: 500.0,
            decay_rate: 0.05,
            n_states: 5,
        }
    }
}

/// Auto-encoder architecture selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelArch {
    Dense,
    Conv,
}

impl ModelArch {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelArch::Dense => "dense",
            ModelArch::Conv => "conv",
        }
    }
}

impl fmt::Display for ModelArch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelArch {
    type Err = PmtError;

    fn from_str(input: &str) -> PmtResult<Self> {
        match input.to_ascii_lowercase().as_str() {
            "dense" | "mlp" => Ok(ModelArch::Dense),
            "conv" | "cnn" => Ok(ModelArch::Conv),
            other => Err(PmtError::Config(format!(
                "unknown model architecture '{other}'; use dense or conv"
            ))),
        }
    }
}

/// Sliding-window auto-encoder parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct AutoencoderConfig {
    pub model_arch: ModelArch,
    pub latent_dim: usize,
    pub window_size: usize,
    pub num_epochs: usize,
    pub learning_rate: f64,
    pub batch_size: usize,
    pub validation_split: f64,
    pub threshold_percentile: f64,
    pub rolling_window: usize,
}

impl Default for AutoencoderConfig {
    fn default() -> Self {
        Self {
            model_arch: ModelArch::Dense,
            latent_dim: 5,
            window_size: 168,
            num_epochs: 50,
            learning_rate: 1e-3,
            batch_size: 32,
            validation_split: 0.2,
            threshold_percentile: 95.0,
            rolling_window: 12,
        }
    }
}

/// Per-state fallbacks applied when an order record omits a column family.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct DefaultsConfig {
    /// Unavailability hours keyed by state ordinal
    pub unavailability_hours: BTreeMap<usize, f64>,
}

impl DefaultsConfig {
    /// Materialize the per-state map as a dense vector of length `n_states`,
    /// zero-filling states without an entry.
    pub fn unavailability_vector(&self, n_states: usize) -> Vec<f64> {
        (0..n_states)
            .map(|state| self.unavailability_hours.get(&state).copied().unwrap_or(0.0))
            .collect()
    }
}

impl PlannerConfig {
    /// Range-check every section. Called once per batch, before any work.
    pub fn validate(&self) -> PmtResult<()> {
        let nsga = &self.nsga;
        if nsga.population_size == 0 {
            return Err(PmtError::Config("nsga.population_size must be > 0".into()));
        }
        if nsga.offspring_size == 0 {
            return Err(PmtError::Config("nsga.offspring_size must be > 0".into()));
        }
        if nsga.max_evaluations < nsga.population_size {
            return Err(PmtError::Config(format!(
                "nsga.max_evaluations ({}) must cover the initial population ({})",
                nsga.max_evaluations, nsga.population_size
            )));
        }
        if !(0.0..=1.0).contains(&nsga.crossover.probability) {
            return Err(PmtError::Config(format!(
                "nsga.crossover.probability {} outside [0, 1]",
                nsga.crossover.probability
            )));
        }
        if nsga.crossover.distribution_index <= 0.0 || nsga.mutation.distribution_index <= 0.0 {
            return Err(PmtError::Config(
                "distribution indices must be positive".into(),
            ));
        }

        let problem = &self.problem;
        let [lo, hi] = problem.time_bounds;
        if lo < 1 || hi <= lo {
            return Err(PmtError::Config(format!(
                "problem.time_bounds [{lo}, {hi}] must satisfy 1 <= lo < hi"
            )));
        }
        if problem.base_cost < 0.0 || problem.decay_rate < 0.0 {
            return Err(PmtError::Config(
                "problem.base_cost and problem.decay_rate must be non-negative".into(),
            ));
        }
        if problem.n_states < 2 {
            return Err(PmtError::Config(format!(
                "problem.n_states {} needs at least one transient and one absorbing state",
                problem.n_states
            )));
        }

        let ae = &self.ae;
        if ae.latent_dim == 0 || ae.window_size == 0 || ae.num_epochs == 0 || ae.batch_size == 0 {
            return Err(PmtError::Config(
                "ae.latent_dim, ae.window_size, ae.num_epochs and ae.batch_size must be > 0".into(),
            ));
        }
        if ae.model_arch == ModelArch::Conv && ae.window_size % 4 != 0 {
            return Err(PmtError::Config(format!(
                "ae.window_size {} must be divisible by 4 for the conv architecture",
                ae.window_size
            )));
        }
        if ae.learning_rate <= 0.0 {
            return Err(PmtError::Config("ae.learning_rate must be positive".into()));
        }
        if !(0.0..1.0).contains(&ae.validation_split) {
            return Err(PmtError::Config(format!(
                "ae.validation_split {} outside [0, 1)",
                ae.validation_split
            )));
        }
        if !(0.0..=100.0).contains(&ae.threshold_percentile) || ae.threshold_percentile == 0.0 {
            return Err(PmtError::Config(format!(
                "ae.threshold_percentile {} outside (0, 100]",
                ae.threshold_percentile
            )));
        }
        if ae.rolling_window == 0 {
            return Err(PmtError::Config("ae.rolling_window must be > 0".into()));
        }

        if let Some((state, hours)) = self
            .defaults
            .unavailability_hours
            .iter()
            .find(|(_, hours)| !hours.is_finite() || **hours < 0.0)
        {
            return Err(PmtError::Config(format!(
                "defaults.unavailability_hours[{state}] = {hours} must be non-negative"
            )));
        }

        Ok(())
    }
}

/// Load a configuration document, dispatching on the file extension and
/// falling back to trying both formats.
pub fn load_config_from_path(path: &Path) -> PmtResult<PlannerConfig> {
    let data = fs::read_to_string(path)?;
    let config: PlannerConfig = match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
            serde_yaml::from_str(&data)
                .map_err(|e| PmtError::Config(format!("parsing config yaml: {e}")))?
        }
        Some(ext) if ext.eq_ignore_ascii_case("json") => serde_json::from_str(&data)
            .map_err(|e| PmtError::Config(format!("parsing config json: {e}")))?,
        _ => serde_yaml::from_str(&data)
            .or_else(|_| serde_json::from_str(&data))
            .map_err(|e| PmtError::Config(format!("parsing config: {e}")))?,
    };
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_validate() {
        assert!(PlannerConfig::default().validate().is_ok());
    }

    #[test]
    fn default_values_match_contract() {
        let config = PlannerConfig::default();
        assert_eq!(config.nsga.population_size, 200);
        assert_eq!(config.nsga.max_evaluations, 4000);
        assert_eq!(config.nsga.crossover.probability, 1.0);
        assert_eq!(config.problem.time_bounds, [1, 3650]);
        assert_eq!(config.problem.base_cost, 500.0);
        assert_eq!(config.problem.n_states, 5);
        assert_eq!(config.ae.window_size, 168);
        assert_eq!(config.ae.threshold_percentile, 95.0);
        assert_eq!(config.ae.rolling_window, 12);
    }

    #[test]
    fn unknown_key_is_rejected() {
        let yaml = "nsga:\n  population_size: 10\n  popsize: 10\n";
        let parsed: Result<PlannerConfig, _> = serde_yaml::from_str(yaml);
        assert!(parsed.is_err());
    }

    #[test]
    fn out_of_range_values_are_config_errors() {
        let mut config = PlannerConfig::default();
        config.nsga.population_size = 0;
        assert!(matches!(config.validate(), Err(PmtError::Config(_))));

        let mut config = PlannerConfig::default();
        config.problem.time_bounds = [10, 10];
        assert!(config.validate().is_err());

        let mut config = PlannerConfig::default();
        config.ae.threshold_percentile = 120.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn conv_window_must_be_divisible_by_four() {
        let mut config = PlannerConfig::default();
        config.ae.model_arch = ModelArch::Conv;
        config.ae.window_size = 170;
        assert!(config.validate().is_err());
        config.ae.window_size = 168;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn defaults_map_materializes_dense_vector() {
        let mut defaults = DefaultsConfig::default();
        defaults.unavailability_hours.insert(0, 2.0);
        defaults.unavailability_hours.insert(4, 48.0);
        assert_eq!(
            defaults.unavailability_vector(5),
            vec![2.0, 0.0, 0.0, 0.0, 48.0]
        );
    }

    #[test]
    fn yaml_roundtrip_through_file() {
        let config = PlannerConfig::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();
        let loaded = load_config_from_path(file.path()).unwrap();
        assert_eq!(loaded, config);
    }
}
